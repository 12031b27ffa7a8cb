//! blastp invocation.
//!
//! The query is sent as fasta on the standard input of blastp and the tabular output is
//! restricted to the subject id and title, so each output line is one hit in rank order.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use super::Searcher;
use crate::errors::{FannotError, Result};
use crate::refdb::RefDb;
use crate::utils::idseq::IdSeq;

pub const DFT_BLASTP: &str = "blastp";
pub const DFT_EVALUE: f64 = 10.0;
pub const DFT_MAX_TARGET_SEQS: usize = 500;

/// blastp parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlastParams {
    /// name or path of the blastp program
    pub binary: String,
    pub evalue: f64,
    pub max_target_seqs: usize,
}

impl Default for BlastParams {
    fn default() -> Self {
        BlastParams { binary: DFT_BLASTP.to_string(), evalue: DFT_EVALUE, max_target_seqs: DFT_MAX_TARGET_SEQS }
    }
}

const OUTFMT: &str = "6 sseqid stitle";
// subject id given by blast to entries of a database built without -parse_seqids
const ORDINAL_ID_PREFIX: &str = "gnl|BL_ORD_ID|";

// fasta id of a hit : the ordinal ids are replaced by the first word of the title
fn hit_id<'a>(sseqid : &'a str, stitle : &'a str) -> &'a str {
    if sseqid.starts_with(ORDINAL_ID_PREFIX) {
        stitle.split_whitespace().next().unwrap_or(sseqid)
    } else {
        sseqid
    }
}

/// extract subject ids from "-outfmt 6 sseqid stitle" output.
/// An id appearing on several lines (several hsp) is kept once, at its first rank.
pub fn parse_hit_ids(output : &str) -> Vec<String> {
    let mut ids = Vec::<String>::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (sseqid, stitle) = line.split_once('\t').unwrap_or((line, ""));
        let id = hit_id(sseqid.trim(), stitle);
        if !ids.iter().any(|s| s == id) {
            ids.push(id.to_string());
        }
    }
    ids
} // end of parse_hit_ids

/// runs blastp against the blast index of the reference database
pub struct BlastSearch {
    params: BlastParams,
}

impl BlastSearch {
    pub fn new(params : BlastParams) -> Self {
        BlastSearch { params }
    }

    pub fn get_params(&self) -> &BlastParams {
        &self.params
    }

    fn search_error(query : &IdSeq, refdb : &RefDb, msg : String) -> FannotError {
        FannotError::Search { query: query.get_fasta_id().clone(), db: refdb.get_id().clone(), msg }
    }
} // end of impl BlastSearch

impl Searcher for BlastSearch {
    fn search(&self, query : &IdSeq, refdb : &RefDb) -> Result<Vec<String>> {
        let mut child = Command::new(&self.params.binary)
            .arg("-db")
            .arg(refdb.get_blastdb())
            .arg("-query")
            .arg("-")
            .arg("-outfmt")
            .arg(OUTFMT)
            .arg("-evalue")
            .arg(self.params.evalue.to_string())
            .arg("-max_target_seqs")
            .arg(self.params.max_target_seqs.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::search_error(query, refdb, format!("cannot run {} : {}", self.params.binary, e)))?;
        // stdin is closed when dropped at the end of the block.
        // A write error is kept until the child is reaped : if blastp exited early its stderr tells why.
        let write_res = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(query.to_fasta().as_bytes()),
            None => Ok(()),
        };
        let output = child.wait_with_output().map_err(|e| Self::search_error(query, refdb, e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("{} failed on query {} against {} : {}", self.params.binary, query.get_fasta_id(), refdb.get_id(), stderr.trim());
            let msg = format!("{} exited with {} : {}", self.params.binary, output.status, stderr.trim());
            return Err(Self::search_error(query, refdb, msg));
        }
        if let Err(e) = write_res {
            return Err(Self::search_error(query, refdb, format!("cannot send query : {}", e)));
        }
        let hits = parse_hit_ids(&String::from_utf8_lossy(&output.stdout));
        log::trace!("query {} : {} hits in {}", query.get_fasta_id(), hits.len(), refdb.get_id());
        Ok(hits)
    } // end of search
} // end of impl Searcher for BlastSearch

//==========================================================================================

#[cfg(test)]
mod tests {

    use super::*;
    use crate::refdb::RefDbFlags;
    use std::path::Path;

    #[test]
    fn test_parse_hit_ids() {
        let output = "sp|P25641|ATG15\tlipase ATG15\nP00001\tP00001 kinase\nsp|P25641|ATG15\tlipase ATG15\n\nP00002\n";
        let ids = parse_hit_ids(output);
        assert_eq!(ids, vec!["sp|P25641|ATG15", "P00001", "P00002"]);
        assert!(parse_hit_ids("").is_empty());
        // ordinal ids of databases built without -parse_seqids
        let output = "gnl|BL_ORD_ID|12\tP25641 lipase ATG15::ATG15\ngnl|BL_ORD_ID|3\tQ12345 kinase\n";
        assert_eq!(parse_hit_ids(output), vec!["P25641", "Q12345"]);
    }

    #[test]
    fn test_search_failure() {
        let refdb = RefDb::new("DB", "", Path::new("/nowhere/blastdb"), Path::new("/nowhere/protein.fasta"), RefDbFlags::default());
        let query = IdSeq::new("q1".to_string(), String::new(), b"MEQNRFKK".to_vec());
        // unknown program
        let params = BlastParams { binary: "blastp_not_installed_here".to_string(), ..Default::default() };
        let res = BlastSearch::new(params).search(&query, &refdb);
        assert!(matches!(res, Err(FannotError::Search { .. })));
        // program failing
        let params = BlastParams { binary: "false".to_string(), ..Default::default() };
        let res = BlastSearch::new(params).search(&query, &refdb);
        assert!(matches!(res, Err(FannotError::Search { .. })));
    }

    // a blastp that rejects its database and exits without reading the query
    #[cfg(unix)]
    #[test]
    fn test_search_early_exit_reports_stderr() {
        use std::os::unix::fs::PermissionsExt;
        //
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("blastp_bad_db.sh");
        std::fs::write(&script, "#!/bin/sh\necho \"BLAST Database error: No alias or index file found\" >&2\nexit 2\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let refdb = RefDb::new("DB", "", Path::new("/nowhere/blastdb"), Path::new("/nowhere/protein.fasta"), RefDbFlags::default());
        // far beyond a pipe buffer, the write fails once the child is gone
        let query = IdSeq::new("q1".to_string(), String::new(), vec![b'M'; 1 << 20]);
        let params = BlastParams { binary: script.to_string_lossy().to_string(), ..Default::default() };
        let searcher = BlastSearch::new(params);
        let mut res = searcher.search(&query, &refdb);
        // the script file may still be held open by a concurrent fork in another test thread
        for _ in 0..10 {
            match &res {
                Err(FannotError::Search { msg, .. }) if msg.contains("busy") => {
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    res = searcher.search(&query, &refdb);
                }
                _ => break,
            }
        }
        match res {
            Err(FannotError::Search { query, db, msg }) => {
                assert_eq!(query, "q1");
                assert_eq!(db, "DB");
                assert!(msg.contains("BLAST Database error"), "unexpected message : {}", msg);
                assert!(!msg.contains("Broken pipe"), "unexpected message : {}", msg);
            }
            other => panic!("expected a search error, got {:?}", other),
        }
    }
} // end of mod tests
