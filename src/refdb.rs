//! Reference database registry.
//!
//! A reference database is a directory containing :
//! - protein.fasta : the reference sequences, the header description of each record carries the annotation to transfer
//! - blastdb.* : the blast index built by makeblastdb from protein.fasta
//! - config.json : the metadata (this structure) with the policy flags used during annotation.
//!
//! Databases are designated by their id (the sub directory name) or by the path of a config.json file.

use std::fs::{self, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use serde_json::to_writer_pretty;

use crate::errors::{FannotError, Result};
use crate::utils::files::{load_fasta_file, write_fasta};

pub const FASTA_PATH: &str = "protein.fasta";
pub const BLASTDB_PATH: &str = "blastdb";
pub const JSON_PATH: &str = "config.json";
/// source name used in annotation notes when none is given
pub const DEFAULT_DB_NAME: &str = "uniprot";

fn default_db_name() -> String {
    DEFAULT_DB_NAME.to_string()
}

/// policy flags of a database
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RefDbFlags {
    /// the database contains the query proteins
    pub equal: bool,
    /// annotations from the database can overwrite previous annotations
    pub overwrite: bool,
    /// the database is reviewed (Swiss-Prot) or not (TrEMBL)
    pub reviewed: bool,
    /// gene names can be transferred to the queries
    pub gene_name: bool,
}

/// Metadata of a reference database.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RefDb {
    id: String,
    desc: String,
    root: PathBuf,
    source: PathBuf,
    blastdb: PathBuf,
    fasta: PathBuf,
    nprot: usize,
    equal: bool,
    over_write: bool,
    reviewed: bool,
    gene_name: bool,
    /// name of the source written in notes (DbName template field)
    #[serde(default = "default_db_name")]
    name: String,
}

impl RefDb {
    /// a database description pointing to an existing blast index and fasta.
    pub fn new(id : &str, desc : &str, blastdb : &Path, fasta : &Path, flags : RefDbFlags) -> Self {
        RefDb {
            id: id.to_string(),
            desc: desc.to_string(),
            root: fasta.parent().map(|p| p.to_path_buf()).unwrap_or_default(),
            source: fasta.to_path_buf(),
            blastdb: blastdb.to_path_buf(),
            fasta: fasta.to_path_buf(),
            nprot: 0,
            equal: flags.equal,
            over_write: flags.overwrite,
            reviewed: flags.reviewed,
            gene_name: flags.gene_name,
            name: default_db_name(),
        }
    }

    /// Builds a new database in outdir/id from a protein fasta file.
    /// The fasta is copied in the database directory, indexed with makeblastdb and the metadata dumped in config.json.
    /// makeblastdb is the name (or path) of the makeblastdb program.
    pub fn create_from_fasta(outdir : &Path, id : &str, source : &Path, desc : &str, flags : RefDbFlags, makeblastdb : &str) -> Result<Self> {
        if !source.is_file() {
            return Err(FannotError::RefDb(format!("the input source data file {:?} does not exist", source)));
        }
        if !outdir.exists() {
            log::info!("creating output directory {:?}", outdir);
            fs::create_dir_all(outdir)?;
        }
        let outdir = fs::canonicalize(outdir)?;
        let root = outdir.join(id);
        if root.exists() {
            return Err(FannotError::RefDb(format!("the refdb name {} is already used in the output directory {:?}", id, outdir)));
        }
        fs::create_dir(&root)?;
        //
        let fasta = root.join(FASTA_PATH);
        let sequences = load_fasta_file(source)?;
        let nprot = write_fasta(&fasta, &sequences)?;
        log::info!("refdb {} : copied {} proteins in {:?}", id, nprot, fasta);
        //
        let blastdb = root.join(BLASTDB_PATH);
        let output = Command::new(makeblastdb)
            .arg("-in")
            .arg(&fasta)
            .arg("-out")
            .arg(&blastdb)
            .arg("-dbtype")
            .arg("prot")
            .arg("-input_type")
            .arg("fasta")
            .output()
            .map_err(|e| FannotError::RefDb(format!("failed to run {} : {}", makeblastdb, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FannotError::RefDb(format!("{} failed : {}", makeblastdb, stderr.trim())));
        }
        //
        let refdb = RefDb {
            id: id.to_string(),
            desc: desc.to_string(),
            root,
            source: source.to_path_buf(),
            blastdb,
            fasta,
            nprot,
            equal: flags.equal,
            over_write: flags.overwrite,
            reviewed: flags.reviewed,
            gene_name: flags.gene_name,
            name: default_db_name(),
        };
        refdb.write_json()?;
        Ok(refdb)
    } // end of create_from_fasta

    /// dump metadata in root/config.json
    pub fn write_json(&self) -> Result<()> {
        let filepath = self.root.join(JSON_PATH);
        log::info!("dumping refdb {} in json file : {:?}", self.id, filepath);
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(&filepath)?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, &self)?;
        writer.flush()?;
        Ok(())
    }

    /// reload metadata from a json file
    pub fn read_json(filepath : &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(filepath)?;
        let refdb: RefDb = serde_json::from_reader(BufReader::new(file))?;
        log::debug!("reloaded refdb {} from {:?}", refdb.id, filepath);
        Ok(refdb)
    }

    pub fn set_name(&mut self, name : &str) {
        self.name = name.to_string();
    }

    pub fn get_id(&self) -> &String {
        &self.id
    }

    pub fn get_desc(&self) -> &String {
        &self.desc
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    pub fn get_blastdb(&self) -> &Path {
        &self.blastdb
    }

    pub fn get_fasta(&self) -> &Path {
        &self.fasta
    }

    pub fn get_nprot(&self) -> usize {
        self.nprot
    }

    pub fn is_equal(&self) -> bool {
        self.equal
    }

    pub fn is_overwrite(&self) -> bool {
        self.over_write
    }

    pub fn is_reviewed(&self) -> bool {
        self.reviewed
    }

    pub fn is_gene_name(&self) -> bool {
        self.gene_name
    }

    pub fn info_header() -> String {
        "ID\t#Proteins\tDescription".to_string()
    }

    pub fn info_line(&self) -> String {
        format!("{}\t{}\t{}", self.id, self.nprot, self.desc)
    }
} // end of impl RefDb

//==========================================================================================

/// Finds a database from an id and an optional directory.
/// If id ends with .json it is the path of the metadata file (tried as is then in dir).
/// Otherwise dir/id/config.json then id/config.json are tried.
pub fn find_refdb(id : &str, dir : Option<&Path>) -> Result<RefDb> {
    let dir = dir.unwrap_or_else(|| Path::new(""));
    let candidates: Vec<PathBuf> = if id.ends_with(".json") {
        vec![PathBuf::from(id), dir.join(id)]
    } else {
        vec![dir.join(id).join(JSON_PATH), Path::new(id).join(JSON_PATH)]
    };
    match candidates.iter().find(|p| p.is_file()) {
        Some(json) => RefDb::read_json(json),
        None => Err(FannotError::RefDb(format!("failed to find the DB with ID : {} (directory : {:?})", id, dir))),
    }
} // end of find_refdb

/// Finds the databases of a comma separated list of ids, keeping the order of the list.
pub fn find_refdbs(ids : &str, dir : Option<&Path>) -> Result<Vec<RefDb>> {
    ids.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).map(|id| find_refdb(id, dir)).collect()
}

/// Lists all databases (sub directories with a config.json) of a directory, sorted by id.
pub fn list_refdbs(dir : &Path) -> Result<Vec<RefDb>> {
    let mut refdbs = Vec::<RefDb>::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let json = path.join(JSON_PATH);
        if path.is_dir() && json.is_file() {
            refdbs.push(RefDb::read_json(&json)?);
        }
    }
    refdbs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(refdbs)
} // end of list_refdbs

//==========================================================================================

// end of mod tests
