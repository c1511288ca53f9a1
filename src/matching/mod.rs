pub mod name;
pub mod temporal;

pub use name::{EngineKind, NameIndex, NameMatcher, SimilarityEngine};
pub use temporal::{DateRange, dates_match, overlaps};
