//! On-disk cache of fetched franchise sources.
//!
//! One directory per franchise slug under the data directory, holding the
//! raw sources as pretty JSON. Resolution and SQL generation read from here,
//! so they can be re-run without touching the network.

use crate::models::source::FranchiseSources;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SOURCES_FILE: &str = "sources.json";

#[derive(Debug, Clone)]
pub struct SourceCache {
    root: PathBuf,
}

impl SourceCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.root.join(slug).join(SOURCES_FILE)
    }

    pub async fn save(&self, sources: &FranchiseSources) -> Result<PathBuf> {
        let path = self.path_for(&sources.slug);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(sources).context("Failed to serialize sources")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write sources: {}", path.display()))?;

        info!(
            slug = %sources.slug,
            path = %path.display(),
            entries = sources.anilist.len(),
            "Cached franchise sources"
        );
        Ok(path)
    }

    /// Cached sources for `slug`, or `None` if the franchise was never fetched.
    pub async fn load(&self, slug: &str) -> Result<Option<FranchiseSources>> {
        let path = self.path_for(slug);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(slug, path = %path.display(), "No cached sources");
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read sources: {}", path.display()))?;
        let sources = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse sources: {}", path.display()))?;
        Ok(Some(sources))
    }

    /// Slugs of every cached franchise, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut slugs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(slugs),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to list cache directory: {}", self.root.display())
                });
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.path().join(SOURCES_FILE).is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                slugs.push(name.to_string());
            }
        }

        slugs.sort();
        Ok(slugs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnilistId;
    use crate::models::source::{AnilistWork, Titles};
    use chrono::Utc;

    fn sources(slug: &str) -> FranchiseSources {
        FranchiseSources {
            slug: slug.to_string(),
            name: "Frieren".to_string(),
            root: AnilistId::new(154_587),
            keywords: vec!["frieren".to_string()],
            fetched_at: Utc::now(),
            anilist: vec![AnilistWork {
                id: AnilistId::new(154_587),
                titles: Titles {
                    romaji: Some("Sousou no Frieren".to_string()),
                    english: Some("Frieren: Beyond Journey's End".to_string()),
                    native: None,
                },
                ..AnilistWork::default()
            }],
            mal: Vec::new(),
            tvdb: Vec::new(),
            tvdb_links: Vec::new(),
            nodes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SourceCache::new(dir.path());

        let original = sources("frieren");
        let path = cache.save(&original).await.unwrap();
        assert_eq!(path, dir.path().join("frieren").join("sources.json"));

        let loaded = cache.load("frieren").await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_missing_slug_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SourceCache::new(dir.path());
        assert!(cache.load("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_cached_slugs() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SourceCache::new(dir.path().join("data"));
        assert!(cache.list().await.unwrap().is_empty());

        cache.save(&sources("frieren")).await.unwrap();
        cache.save(&sources("bocchi")).await.unwrap();
        std::fs::create_dir_all(dir.path().join("data").join("empty")).unwrap();

        assert_eq!(cache.list().await.unwrap(), vec!["bocchi", "frieren"]);
    }
}
