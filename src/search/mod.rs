//! Adapters to the external engines used by annotation.
//!
//! - a [Searcher] returns the ranked ids of reference entries similar to a query (blastp),
//! - an [Aligner] returns the percent similarity of the global alignment of two sequences (needle).
//!
//! Both are called concurrently from the annotation workers, so they must be Sync.
//! Any failure of an engine is fatal for the run.

pub mod blast;
pub mod needle;

pub use blast::{BlastParams, BlastSearch};
pub use needle::{AlignParams, GlobalAligner, NeedleCommand};

use crate::errors::Result;
use crate::refdb::RefDb;
use crate::utils::idseq::IdSeq;

/// similarity search of a query in a reference database
pub trait Searcher: Sync {
    /// returns hit ids in rank order, best hit first. No hit is not an error.
    fn search(&self, query : &IdSeq, refdb : &RefDb) -> Result<Vec<String>>;
}

/// global pairwise alignment
pub trait Aligner: Sync {
    /// percent similarity (in [0,100]) of the optimal global alignment of query and hit
    fn similarity(&self, query : &IdSeq, hit : &IdSeq) -> Result<f64>;
}
