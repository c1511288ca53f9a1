//! Catalog-backed implementation of the `FranchiseService` trait.

use crate::builder::{Build, RecordBuilder};
use crate::cache::SourceCache;
use crate::clients::{AltCatalog, EpisodeCatalog, MediaCatalog};
use crate::config::MatchingConfig;
use crate::consolidate::{crawl, group_works, pick_series};
use crate::domain::{AnilistId, MalId};
use crate::matching::NameMatcher;
use crate::models::source::{
    AnilistWork, CandidateSummary, FranchiseSources, MalWork, MediaFormat, TvdbLink, TvdbSeries,
};
use crate::parser::title::{extract_franchise_keywords, slugify, strip_format_annotation};
use crate::services::franchise_service::{FranchiseError, FranchiseService, Generated};
use crate::sql;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct CatalogFranchiseService {
    anilist: Arc<dyn MediaCatalog>,
    jikan: Arc<dyn AltCatalog>,
    tvdb: Option<Arc<dyn EpisodeCatalog>>,
    cache: SourceCache,
    output_dir: PathBuf,
    matching: MatchingConfig,
    matcher: NameMatcher,
    builder: RecordBuilder,
}

impl CatalogFranchiseService {
    #[must_use]
    pub fn new(
        anilist: Arc<dyn MediaCatalog>,
        jikan: Arc<dyn AltCatalog>,
        tvdb: Option<Arc<dyn EpisodeCatalog>>,
        cache: SourceCache,
        output_dir: PathBuf,
        matching: MatchingConfig,
    ) -> Self {
        Self {
            anilist,
            jikan,
            tvdb,
            cache,
            output_dir,
            matcher: NameMatcher::new(matching.engine.build()),
            builder: RecordBuilder::new(&matching),
            matching,
        }
    }

    /// Best search hit for a title: highest title similarity, then broadcast
    /// formats, then the earliest start.
    fn disambiguate(&self, title: &str, candidates: &[CandidateSummary]) -> Option<AnilistId> {
        candidates
            .iter()
            .map(|c| {
                let score = self.matcher.best_score(title, c.titles.all());
                (c, score)
            })
            .max_by(|&(a, sa), &(b, sb)| {
                let broadcast = |c: &CandidateSummary| c.format.is_some_and(MediaFormat::is_broadcast);
                // Undated candidates count as the latest.
                let start = |c: &CandidateSummary| c.start_date.unwrap_or(NaiveDate::MAX);

                sa.total_cmp(&sb)
                    .then_with(|| broadcast(a).cmp(&broadcast(b)))
                    .then_with(|| start(b).cmp(&start(a)))
                    .then_with(|| b.id.cmp(&a.id))
            })
            .map(|(c, score)| {
                info!(id = %c.id, title = c.titles.preferred(), score, "Picked root entry");
                c.id
            })
    }

    async fn fetch_alternate(&self, works: &[AnilistWork]) -> Vec<MalWork> {
        let ids: BTreeSet<MalId> = works.iter().filter_map(|w| w.mal_id).collect();
        let mut fetched = Vec::with_capacity(ids.len());

        for id in ids {
            match self.jikan.fetch_work(id).await {
                Ok(Some(work)) => fetched.push(work),
                Ok(None) => warn!(mal_id = %id, "Alternate catalog entry not found"),
                Err(e) => warn!(mal_id = %id, error = %e, "Alternate catalog fetch failed, skipping"),
            }
        }

        fetched
    }

    async fn fetch_structures(
        &self,
        catalog: &dyn EpisodeCatalog,
        works: &[AnilistWork],
        franchise: &str,
    ) -> (Vec<TvdbSeries>, Vec<TvdbLink>) {
        let mut series: Vec<TvdbSeries> = Vec::new();
        let mut links = Vec::new();

        for group in group_works(works).into_iter().filter(|g| g.is_series()) {
            let members: Vec<&AnilistWork> = group
                .members
                .iter()
                .filter_map(|id| works.iter().find(|w| w.id == *id))
                .collect();
            let Some(first) = members.first() else {
                continue;
            };

            let query = strip_format_annotation(first.title());
            let candidates = match catalog.search(&query).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(work = %group.slug, error = %e, "Episode database search failed");
                    continue;
                }
            };

            let titles: Vec<&str> = members.iter().flat_map(|m| m.all_titles()).collect();
            let Some((tvdb_id, score)) = pick_series(
                &candidates,
                &titles,
                first.start_date,
                false,
                franchise,
                &self.matcher,
            ) else {
                info!(work = %group.slug, "No episode database series accepted");
                continue;
            };

            if !series.iter().any(|s| s.id == tvdb_id) {
                match catalog.fetch_episode_structure(tvdb_id).await {
                    Ok(Some(structure)) => series.push(structure),
                    Ok(None) => {
                        warn!(tvdb_id = %tvdb_id, "Episode database series not found");
                        continue;
                    }
                    Err(e) => {
                        warn!(tvdb_id = %tvdb_id, error = %e, "Episode structure fetch failed");
                        continue;
                    }
                }
            }

            info!(work = %group.slug, tvdb_id = %tvdb_id, score, "Linked episode database series");
            links.push(TvdbLink {
                anilist_id: first.id,
                tvdb_id,
            });
        }

        (series, links)
    }
}

#[async_trait::async_trait]
impl FranchiseService for CatalogFranchiseService {
    #[instrument(skip(self))]
    async fn search(&self, title: &str) -> Result<Vec<CandidateSummary>, FranchiseError> {
        Ok(self.anilist.search(title).await?)
    }

    #[instrument(skip(self))]
    async fn fetch(
        &self,
        title: &str,
        root: Option<AnilistId>,
    ) -> Result<FranchiseSources, FranchiseError> {
        let root = match root {
            Some(id) => id,
            None => {
                let candidates = self.anilist.search(title).await?;
                self.disambiguate(title, &candidates)
                    .ok_or_else(|| FranchiseError::NotFound(title.to_string()))?
            }
        };

        let keywords = extract_franchise_keywords(title);
        info!(root = %root, keywords = ?keywords, "Crawling relation graph");

        let crawled = crawl(
            self.anilist.as_ref(),
            root,
            &keywords,
            &self.matcher,
            self.matching.max_depth,
        )
        .await;
        if crawled.works.is_empty() {
            return Err(FranchiseError::NotFound(title.to_string()));
        }

        let mal = self.fetch_alternate(&crawled.works).await;
        let (tvdb, tvdb_links) = match &self.tvdb {
            Some(catalog) => {
                self.fetch_structures(catalog.as_ref(), &crawled.works, title)
                    .await
            }
            None => (Vec::new(), Vec::new()),
        };

        let sources = FranchiseSources {
            slug: slugify(title),
            name: title.to_string(),
            root,
            keywords,
            fetched_at: Utc::now(),
            anilist: crawled.works,
            mal,
            tvdb,
            tvdb_links,
            nodes: crawled.nodes,
        };

        self.cache.save(&sources).await?;
        Ok(sources)
    }

    #[instrument(skip(self))]
    async fn process(&self, slug: &str) -> Result<Build, FranchiseError> {
        let sources = self
            .cache
            .load(slug)
            .await?
            .ok_or_else(|| FranchiseError::NotFound(slug.to_string()))?;

        Ok(self.builder.build(&sources)?)
    }

    #[instrument(skip(self))]
    async fn generate(&self, slug: &str) -> Result<Generated, FranchiseError> {
        let build = self.process(slug).await?;
        let rendered = sql::render(&build.franchise);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{slug}.sql"));
        tokio::fs::write(&path, &rendered).await?;

        info!(slug, path = %path.display(), bytes = rendered.len(), "Wrote SQL");
        Ok(Generated {
            path,
            bytes: rendered.len(),
            build,
        })
    }
}
