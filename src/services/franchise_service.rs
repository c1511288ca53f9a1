//! Domain service for franchise runs.
//!
//! This module provides the [`FranchiseService`] trait, covering the three
//! stages of a run: fetching raw sources from the catalogs, building the
//! consolidated record graph, and rendering it as SQL.

use crate::builder::Build;
use crate::clients::CatalogError;
use crate::consolidate::ConsolidationError;
use crate::domain::AnilistId;
use crate::models::source::{CandidateSummary, FranchiseSources};
use std::path::PathBuf;
use thiserror::Error;

/// Domain errors for franchise runs.
#[derive(Debug, Error)]
pub enum FranchiseError {
    #[error("Nothing found for '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Consolidation(#[from] ConsolidationError),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl From<anyhow::Error> for FranchiseError {
    fn from(err: anyhow::Error) -> Self {
        Self::Cache(format!("{err:#}"))
    }
}

impl From<std::io::Error> for FranchiseError {
    fn from(err: std::io::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

/// Result of rendering one franchise.
#[derive(Debug, Clone)]
pub struct Generated {
    pub path: PathBuf,
    pub bytes: usize,
    pub build: Build,
}

#[async_trait::async_trait]
pub trait FranchiseService: Send + Sync {
    /// Lists primary-catalog candidates for a title.
    ///
    /// # Errors
    ///
    /// - Returns [`FranchiseError::Catalog`] when the search request fails
    async fn search(&self, title: &str) -> Result<Vec<CandidateSummary>, FranchiseError>;

    /// Crawls the franchise around `root` (or the best search hit for `title`),
    /// fetches the alternate and episode catalogs, and caches the result.
    ///
    /// Failures on individual related entries only reduce coverage.
    ///
    /// # Errors
    ///
    /// - Returns [`FranchiseError::NotFound`] if no root entry can be found
    /// - Returns [`FranchiseError::Catalog`] if the disambiguation search fails
    /// - Returns [`FranchiseError::Cache`] if the sources cannot be written
    async fn fetch(
        &self,
        title: &str,
        root: Option<AnilistId>,
    ) -> Result<FranchiseSources, FranchiseError>;

    /// Builds the consolidated graph from cached sources.
    ///
    /// # Errors
    ///
    /// - Returns [`FranchiseError::NotFound`] if `slug` was never fetched
    /// - Returns [`FranchiseError::Consolidation`] on a broken season invariant
    async fn process(&self, slug: &str) -> Result<Build, FranchiseError>;

    /// Builds and writes `<output_dir>/<slug>.sql`.
    ///
    /// # Errors
    ///
    /// Same as [`process`](Self::process), plus [`FranchiseError::Cache`] when
    /// the output file cannot be written.
    async fn generate(&self, slug: &str) -> Result<Generated, FranchiseError>;
}
