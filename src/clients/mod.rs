pub mod anilist;
pub mod catalog;
pub mod jikan;
pub mod rate_limit;
pub mod tvdb;

pub use catalog::{AltCatalog, CatalogError, EpisodeCatalog, MediaCatalog};
