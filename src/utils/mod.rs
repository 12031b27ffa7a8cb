//! contains utils used in loading sequences and parameters

pub mod files;
pub mod idseq;
pub mod parameters;

pub use files::*;
pub use idseq::*;
pub use parameters::*;
