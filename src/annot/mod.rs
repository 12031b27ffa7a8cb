//! Annotation of queries : reference descriptions, templates, decision engine and the multi database run.

pub mod decision;
pub mod description;
pub mod fannot;
pub mod format;

pub use decision::{decide, is_dispatch_eligible, resolve_prefix, Annotator, Decision};
pub use description::{Description, Field};
pub use fannot::Fannot;
pub use format::{Format, Formats};
