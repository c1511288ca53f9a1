pub mod franchise;
pub mod source;
