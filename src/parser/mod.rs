pub mod text;
pub mod title;

pub use title::{extract_franchise_keywords, normalize_title, slugify, tv_group_key};
