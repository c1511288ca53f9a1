use crate::domain::{AnilistId, MalId, MetadataProvider, TvdbId};
use crate::models::source::{AnilistWork, CandidateSummary, MalWork, TvdbCandidate, TvdbSeries};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{service} request failed: {source}")]
    Http {
        service: MetadataProvider,
        source: reqwest::Error,
    },

    #[error("{service} API error: {status} - {body}")]
    Status {
        service: MetadataProvider,
        status: u16,
        body: String,
    },

    #[error("{service} rate limit still exceeded after {attempts} attempts")]
    RateLimited {
        service: MetadataProvider,
        attempts: u32,
    },

    #[error("{service} returned an unreadable payload: {message}")]
    Decode {
        service: MetadataProvider,
        message: String,
    },

    #[error("{service} authentication failed: {message}")]
    Auth {
        service: MetadataProvider,
        message: String,
    },
}

impl CatalogError {
    #[must_use]
    pub const fn service(&self) -> MetadataProvider {
        match self {
            Self::Http { service, .. }
            | Self::Status { service, .. }
            | Self::RateLimited { service, .. }
            | Self::Decode { service, .. }
            | Self::Auth { service, .. } => *service,
        }
    }
}

/// The primary catalog: per-season entries with a typed relation graph.
#[async_trait::async_trait]
pub trait MediaCatalog: Send + Sync {
    async fn search(&self, title: &str) -> Result<Vec<CandidateSummary>, CatalogError>;

    /// `Ok(None)` when the catalog has no such entry.
    async fn fetch_work(&self, id: AnilistId) -> Result<Option<AnilistWork>, CatalogError>;
}

/// The alternate catalog, reached through the cross-reference on primary entries.
#[async_trait::async_trait]
pub trait AltCatalog: Send + Sync {
    async fn fetch_work(&self, id: MalId) -> Result<Option<MalWork>, CatalogError>;
}

/// The episode database, authoritative for season boundaries.
#[async_trait::async_trait]
pub trait EpisodeCatalog: Send + Sync {
    async fn search(&self, title: &str) -> Result<Vec<TvdbCandidate>, CatalogError>;

    async fn fetch_episode_structure(&self, id: TvdbId) -> Result<Option<TvdbSeries>, CatalogError>;
}
