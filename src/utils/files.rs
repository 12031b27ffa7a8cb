//! This file contains fasta loading of queries and reference database entries.
//! Parsing is delegated to needletail, files can be gzipped.

use std::fs::OpenOptions;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use needletail::FastxReader;

use super::idseq::{IdSeq, SeqDict, SeqLookup};
use crate::errors::{FannotError, Result};

/// residues per line when writing fasta
const FASTA_LINE_WIDTH: usize = 60;

/// To keep track of sequences read
#[derive(Default)]
pub struct ProcessingState {
    /// nb sequences read
    pub nb_seq: usize,
    /// nb residues read
    pub nb_residues: usize,
}

impl ProcessingState {
    pub fn new() -> Self {
        ProcessingState::default()
    }
} // end of ProcessingState

// split a header line in fasta id and description
fn split_header(header : &[u8]) -> (String, String) {
    let header = String::from_utf8_lossy(header);
    let header = header.trim();
    match header.split_once(char::is_whitespace) {
        Some((id, desc)) => (id.to_string(), desc.trim().to_string()),
        None => (header.to_string(), String::new()),
    }
} // end of split_header

// drains a needletail reader
fn read_records(mut reader : Box<dyn FastxReader + '_>, state : &mut ProcessingState) -> Result<Vec<IdSeq>> {
    let mut sequences = Vec::<IdSeq>::new();
    while let Some(record) = reader.next() {
        let seqrec = record.map_err(|e| FannotError::Fasta(e.to_string()))?;
        let (id, desc) = split_header(seqrec.id());
        let seq: Vec<u8> = seqrec.seq().iter().map(|c| c.to_ascii_uppercase()).collect();
        if seq.is_empty() {
            return Err(FannotError::Fasta(format!("empty sequence for record {}", id)));
        }
        state.nb_seq += 1;
        state.nb_residues += seq.len();
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("read record {}, len : {}", id, seq.len());
        }
        sequences.push(IdSeq::new(id, desc, seq));
    }
    Ok(sequences)
} // end of read_records

/// parse fasta records from any reader
pub fn load_fasta_reader<R: Read + Send>(reader : R) -> Result<Vec<IdSeq>> {
    let fastx = needletail::parse_fastx_reader(reader).map_err(|e| FannotError::Fasta(e.to_string()))?;
    let mut state = ProcessingState::new();
    read_records(fastx, &mut state)
}

/// opens and parses a fasta file (possibly gzipped)
pub fn load_fasta_file(path : &Path) -> Result<Vec<IdSeq>> {
    log::debug!("loading fasta file {:?}", path);
    let fastx = needletail::parse_fastx_file(path).map_err(|e| FannotError::Fasta(format!("{:?} : {}", path, e)))?;
    let mut state = ProcessingState::new();
    let sequences = read_records(fastx, &mut state)?;
    log::info!("file {:?}, nb sequences : {}, nb residues : {}", path, state.nb_seq, state.nb_residues);
    Ok(sequences)
} // end of load_fasta_file

/// load the query sequences, their rank in file is their handle
pub fn load_queries(path : &Path) -> Result<SeqDict> {
    let sequences = load_fasta_file(path)?;
    Ok(SeqDict(sequences))
}

/// load all entries of a reference database fasta in a lookup keyed by fasta id
pub fn load_seq_lookup(path : &Path) -> Result<SeqLookup> {
    let sequences = load_fasta_file(path)?;
    let mut lookup = SeqLookup::new();
    for idseq in sequences {
        let id = idseq.get_fasta_id().clone();
        if !lookup.insert(idseq) {
            log::warn!("duplicated id {} in {:?}, keeping last record", id, path);
        }
    }
    Ok(lookup)
} // end of load_seq_lookup

/// dump sequences in fasta format, returns the number of records written
pub fn write_fasta(path : &Path, sequences : &[IdSeq]) -> Result<usize> {
    let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for idseq in sequences {
        write!(writer, ">{}", idseq.get_fasta_id())?;
        if !idseq.get_desc().is_empty() {
            write!(writer, " {}", idseq.get_desc())?;
        }
        writeln!(writer)?;
        for chunk in idseq.get_sequence().chunks(FASTA_LINE_WIDTH) {
            writer.write_all(chunk)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(sequences.len())
} // end of write_fasta

//=========================================================================================

#[cfg(test)]
mod tests {

    use super::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_split_header() {
        let (id, desc) = split_header(b"P25641 Putative lipase ATG15::ATG15::YCR068W::S. cerevisiae::");
        assert_eq!(id, "P25641");
        assert_eq!(desc, "Putative lipase ATG15::ATG15::YCR068W::S. cerevisiae::");
        let (id, desc) = split_header(b"seq1");
        assert_eq!(id, "seq1");
        assert!(desc.is_empty());
    }

    #[test]
    fn test_load_fasta_reader() {
        log_init_test();
        let data = ">q1 first query\nmeqnrf\nKKET\n>q2\nMDFKRT\n";
        let seqs = load_fasta_reader(data.as_bytes()).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0].get_fasta_id(), "q1");
        assert_eq!(seqs[0].get_desc(), "first query");
        assert_eq!(seqs[0].get_sequence(), b"MEQNRFKKET");
        assert_eq!(seqs[1].get_seq_len(), 6);
    }

    #[test]
    fn test_write_then_load_lookup() {
        log_init_test();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protein.fasta");
        let long: Vec<u8> = std::iter::repeat(b'A').take(150).collect();
        let seqs = vec![
            IdSeq::new("r1".to_string(), "a::b::c::d::e".to_string(), long.clone()),
            IdSeq::new("r2".to_string(), String::new(), b"MKV".to_vec()),
        ];
        assert_eq!(write_fasta(&path, &seqs).unwrap(), 2);
        let lookup = load_seq_lookup(&path).unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.get("r1").unwrap().get_sequence(), &long[..]);
        assert_eq!(lookup.get("r1").unwrap().get_desc(), "a::b::c::d::e");
    }
} // end of mod tests
