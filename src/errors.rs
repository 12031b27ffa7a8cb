//! error type shared by all modules of the crate.
//!
//! Every variant is fatal for an annotation run: the coordinator stops dispatching
//! and the error goes up to the caller. Normal negative outcomes (no hit, no rule
//! matched, overwrite rejected) are never errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FannotError {
    #[error("io error : {0}")]
    Io(#[from] std::io::Error),

    #[error("json error : {0}")]
    Json(#[from] serde_json::Error),

    #[error("tsv error : {0}")]
    Csv(#[from] csv::Error),

    #[error("fasta parsing error : {0}")]
    Fasta(String),

    /// the similarity search engine could not be run or failed
    #[error("search failed for query {query} in database {db} : {msg}")]
    Search { query: String, db: String, msg: String },

    /// global aligner failure
    #[error("failed to align query {query} against ref {hit} : {msg}")]
    Align { query: String, hit: String, msg: String },

    /// search index and sequence store of a reference database are out of sync
    #[error("failed to find the hit {hit} in the reference DB ({db})")]
    MissingHit { hit: String, db: String },

    #[error("bad rule configuration : {0}")]
    RuleConfig(String),

    #[error("bad template {template} : {msg}")]
    Template { template: String, msg: String },

    /// a reference record description that is neither plain text nor a 5 fields refdb description
    #[error("failed to parse description of {id}, expected 1 or 5 elements, found {nb}")]
    Description { id: String, nb: usize },

    #[error("InterProScan parsing error : {0}")]
    Ips(String),

    #[error("reference database error : {0}")]
    RefDb(String),

    #[error("annotation worker failure : {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, FannotError>;
