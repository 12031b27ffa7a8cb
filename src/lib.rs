//! Functional annotation of protein sequences.
//!
//! Queries are searched with blastp against an ordered list of reference databases, the first hits are
//! re-scored with a global alignment and the best hit is tested against ordered acceptance rules.
//! The annotation of the reference entry is then transferred to the query, formatted with templates.
//! Later databases can only refine an annotation when both the database and the matched rule allow overwrite.
//!
//! - [utils] : sequence loading and annotation parameters
//! - [refdb] : reference database metadata
//! - [search] : blastp and global alignment adapters
//! - [matcher] : best hit selection
//! - [annot] : descriptions, templates, decision engine and the multi threaded run
//! - [answer] : annotation results and their tabular dump
//! - [ips] : InterProScan predictions

pub mod annot;
pub mod answer;
pub mod errors;
pub mod ips;
pub mod matcher;
pub mod refdb;
pub mod search;
pub mod utils;
