//! End-to-end franchise runs against in-memory catalogs.

use chrono::NaiveDate;
use franchise_sync::cache::SourceCache;
use franchise_sync::clients::{AltCatalog, CatalogError, EpisodeCatalog, MediaCatalog};
use franchise_sync::config::MatchingConfig;
use franchise_sync::consolidate::{NodeState, RejectReason};
use franchise_sync::domain::{AnilistId, MalId, MetadataProvider, TvdbId};
use franchise_sync::models::source::{
    AnilistWork, CandidateSummary, MalRef, MalWork, MediaFormat, MediaKind, RelationEdge,
    RelationType, SeasonOrder, SourceStudio, Titles, TvdbCandidate, TvdbEpisode, TvdbLink,
    TvdbSeason, TvdbSeries,
};
use franchise_sync::services::{CatalogFranchiseService, FranchiseError, FranchiseService};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn titles(english: &str) -> Titles {
    Titles {
        romaji: None,
        english: Some(english.to_string()),
        native: None,
    }
}

fn edge(relation_type: RelationType, id: i32, title: &str, format: MediaFormat) -> RelationEdge {
    RelationEdge {
        relation_type,
        id: AnilistId::new(id),
        kind: MediaKind::Anime,
        format: Some(format),
        titles: titles(title),
    }
}

#[derive(Default)]
struct FakeAnilist {
    works: HashMap<AnilistId, AnilistWork>,
    failing: HashSet<AnilistId>,
    candidates: Vec<CandidateSummary>,
    fetches: Mutex<Vec<AnilistId>>,
}

#[async_trait::async_trait]
impl MediaCatalog for FakeAnilist {
    async fn search(&self, _title: &str) -> Result<Vec<CandidateSummary>, CatalogError> {
        Ok(self.candidates.clone())
    }

    async fn fetch_work(&self, id: AnilistId) -> Result<Option<AnilistWork>, CatalogError> {
        self.fetches.lock().unwrap().push(id);
        if self.failing.contains(&id) {
            return Err(CatalogError::Status {
                service: MetadataProvider::Anilist,
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.works.get(&id).cloned())
    }
}

#[derive(Default)]
struct FakeJikan {
    works: HashMap<MalId, MalWork>,
    fetches: Mutex<Vec<MalId>>,
}

#[async_trait::async_trait]
impl AltCatalog for FakeJikan {
    async fn fetch_work(&self, id: MalId) -> Result<Option<MalWork>, CatalogError> {
        self.fetches.lock().unwrap().push(id);
        Ok(self.works.get(&id).cloned())
    }
}

#[derive(Default)]
struct FakeTvdb {
    candidates: Vec<TvdbCandidate>,
    series: HashMap<TvdbId, TvdbSeries>,
    search_fails: bool,
}

#[async_trait::async_trait]
impl EpisodeCatalog for FakeTvdb {
    async fn search(&self, _title: &str) -> Result<Vec<TvdbCandidate>, CatalogError> {
        if self.search_fails {
            return Err(CatalogError::Auth {
                service: MetadataProvider::Tvdb,
                message: "token expired".to_string(),
            });
        }
        Ok(self.candidates.clone())
    }

    async fn fetch_episode_structure(
        &self,
        id: TvdbId,
    ) -> Result<Option<TvdbSeries>, CatalogError> {
        Ok(self.series.get(&id).cloned())
    }
}

/// Two cours of "Show", a movie, an unrelated alternative and a sequel the
/// catalog cannot serve.
fn show_anilist() -> FakeAnilist {
    let season_one = AnilistWork {
        id: AnilistId::new(1),
        mal_id: Some(MalId::new(101)),
        titles: titles("Show"),
        format: Some(MediaFormat::Tv),
        start_date: Some(date(2020, 1, 10)),
        end_date: Some(date(2020, 3, 27)),
        episodes: Some(12),
        studios: vec![SourceStudio {
            id: 7,
            name: "Studio Pierrot".to_string(),
            is_animation_studio: true,
        }],
        relations: vec![
            edge(RelationType::Sequel, 2, "Show Part 2", MediaFormat::Tv),
            edge(RelationType::SideStory, 3, "Show", MediaFormat::Movie),
            edge(RelationType::Alternative, 4, "Different Thing", MediaFormat::Tv),
            edge(RelationType::Sequel, 5, "Show Part 3", MediaFormat::Tv),
        ],
        ..AnilistWork::default()
    };
    let season_two = AnilistWork {
        id: AnilistId::new(2),
        mal_id: Some(MalId::new(101)),
        titles: titles("Show Part 2"),
        format: Some(MediaFormat::Tv),
        start_date: Some(date(2020, 4, 10)),
        end_date: Some(date(2020, 6, 26)),
        episodes: Some(12),
        relations: vec![edge(RelationType::Prequel, 1, "Show", MediaFormat::Tv)],
        ..AnilistWork::default()
    };
    let movie = AnilistWork {
        id: AnilistId::new(3),
        titles: titles("Show"),
        format: Some(MediaFormat::Movie),
        start_date: Some(date(2021, 8, 1)),
        relations: vec![edge(RelationType::Parent, 1, "Show", MediaFormat::Tv)],
        ..AnilistWork::default()
    };
    let unrelated = AnilistWork {
        id: AnilistId::new(4),
        titles: titles("Different Thing"),
        format: Some(MediaFormat::Tv),
        ..AnilistWork::default()
    };

    FakeAnilist {
        works: [season_one, season_two, movie, unrelated]
            .into_iter()
            .map(|w| (w.id, w))
            .collect(),
        failing: HashSet::from([AnilistId::new(5)]),
        candidates: vec![
            CandidateSummary {
                id: AnilistId::new(3),
                titles: titles("Show"),
                format: Some(MediaFormat::Movie),
                start_date: Some(date(2021, 8, 1)),
                episodes: Some(1),
            },
            CandidateSummary {
                id: AnilistId::new(1),
                titles: titles("Show"),
                format: Some(MediaFormat::Tv),
                start_date: Some(date(2020, 1, 10)),
                episodes: Some(12),
            },
        ],
        ..FakeAnilist::default()
    }
}

fn show_jikan() -> FakeJikan {
    let work = MalWork {
        id: MalId::new(101),
        title: "Show".to_string(),
        studios: vec![MalRef {
            mal_id: 1,
            name: "Studio Pierrot".to_string(),
        }],
        ..MalWork::default()
    };
    FakeJikan {
        works: HashMap::from([(work.id, work)]),
        ..FakeJikan::default()
    }
}

fn show_tvdb() -> FakeTvdb {
    let first = date(2020, 1, 10);
    let series = TvdbSeries {
        id: TvdbId::new(77),
        name: "Show".to_string(),
        year: Some(2020),
        first_aired: Some(first),
        seasons: vec![TvdbSeason {
            id: 1,
            number: 1,
            name: None,
            order: SeasonOrder::Aired,
        }],
        episodes: (0..24)
            .map(|i| TvdbEpisode {
                season_number: 1,
                number: i + 1,
                aired: Some(first + chrono::Duration::weeks(i64::from(i))),
            })
            .collect(),
        ..TvdbSeries::default()
    };

    FakeTvdb {
        candidates: vec![TvdbCandidate {
            id: TvdbId::new(77),
            name: "Show".to_string(),
            aliases: Vec::new(),
            year: Some(2020),
            first_aired: Some(first),
            is_movie: false,
        }],
        series: HashMap::from([(series.id, series)]),
        ..FakeTvdb::default()
    }
}

fn service(
    dir: &Path,
    anilist: Arc<FakeAnilist>,
    jikan: Arc<FakeJikan>,
    tvdb: Option<FakeTvdb>,
) -> CatalogFranchiseService {
    CatalogFranchiseService::new(
        anilist,
        jikan,
        tvdb.map(|t| Arc::new(t) as Arc<dyn EpisodeCatalog>),
        SourceCache::new(dir.join("data")),
        dir.join("sql"),
        MatchingConfig::default(),
    )
}

#[tokio::test]
async fn test_fetch_crawls_franchise_and_links_episode_database() {
    let dir = tempfile::tempdir().unwrap();
    let anilist = Arc::new(show_anilist());
    let jikan = Arc::new(show_jikan());
    let service = service(dir.path(), anilist.clone(), jikan.clone(), Some(show_tvdb()));

    let sources = service.fetch("Show", Some(AnilistId::new(1))).await.unwrap();

    assert_eq!(sources.slug, "show");
    let mut ids: Vec<i32> = sources.anilist.iter().map(|w| w.id.value()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);

    // Shared cross-reference is fetched once.
    assert_eq!(*jikan.fetches.lock().unwrap(), vec![MalId::new(101)]);
    assert_eq!(sources.mal.len(), 1);

    assert_eq!(
        sources.tvdb_links,
        vec![TvdbLink {
            anilist_id: AnilistId::new(1),
            tvdb_id: TvdbId::new(77),
        }]
    );
    assert_eq!(sources.tvdb.len(), 1);

    assert!(!anilist.fetches.lock().unwrap().contains(&AnilistId::new(4)));
    let failed = sources
        .nodes
        .iter()
        .find(|n| n.id == AnilistId::new(5))
        .unwrap();
    assert!(matches!(
        failed.state,
        NodeState::Rejected {
            reason: RejectReason::FetchFailed(_)
        }
    ));

    assert!(dir.path().join("data").join("show").join("sources.json").is_file());
}

#[tokio::test]
async fn test_search_hit_prefers_broadcast_root() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(
        dir.path(),
        Arc::new(show_anilist()),
        Arc::new(show_jikan()),
        None,
    );

    let sources = service.fetch("Show", None).await.unwrap();
    assert_eq!(sources.root, AnilistId::new(1));
}

#[tokio::test]
async fn test_empty_search_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let anilist = FakeAnilist {
        candidates: Vec::new(),
        ..show_anilist()
    };
    let service = service(dir.path(), Arc::new(anilist), Arc::new(show_jikan()), None);

    let err = service.fetch("Nothing Here", None).await.unwrap_err();
    assert!(matches!(err, FranchiseError::NotFound(_)));
}

#[tokio::test]
async fn test_process_unknown_slug_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(
        dir.path(),
        Arc::new(show_anilist()),
        Arc::new(show_jikan()),
        None,
    );

    let err = service.process("never-fetched").await.unwrap_err();
    assert!(matches!(err, FranchiseError::NotFound(slug) if slug == "never-fetched"));
}

#[tokio::test]
async fn test_generate_writes_verified_sql() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(
        dir.path(),
        Arc::new(show_anilist()),
        Arc::new(show_jikan()),
        Some(show_tvdb()),
    );

    service.fetch("Show", Some(AnilistId::new(1))).await.unwrap();
    let generated = service.generate("show").await.unwrap();

    assert_eq!(generated.path, dir.path().join("sql").join("show.sql"));
    let sql = std::fs::read_to_string(&generated.path).unwrap();
    assert_eq!(sql.len(), generated.bytes);
    assert!(sql.contains("BEGIN;"));
    assert!(sql.contains("\nCOMMIT;\n"));
    assert_eq!(sql.matches("INSERT INTO entries ").count(), 2);
    assert!(!sql.contains("has no authoritative"));

    let build = generated.build;
    let slugs: Vec<&str> = build
        .franchise
        .works
        .iter()
        .map(|w| w.slug.as_str())
        .collect();
    assert_eq!(slugs, vec!["show", "show-movie"]);
    assert_eq!(build.report.verified_seasons, 2);
    assert_eq!(build.franchise.companies.len(), 1);
}

#[tokio::test]
async fn test_episode_database_outage_leaves_seasons_unverified() {
    let dir = tempfile::tempdir().unwrap();
    let tvdb = FakeTvdb {
        search_fails: true,
        ..show_tvdb()
    };
    let service = service(
        dir.path(),
        Arc::new(show_anilist()),
        Arc::new(show_jikan()),
        Some(tvdb),
    );

    let sources = service.fetch("Show", Some(AnilistId::new(1))).await.unwrap();
    assert!(sources.tvdb_links.is_empty());

    let generated = service.generate("show").await.unwrap();
    assert_eq!(generated.build.report.unverified_seasons, 2);

    let sql = std::fs::read_to_string(&generated.path).unwrap();
    assert!(sql.contains("-- Season 1 has no authoritative episode-database match"));
    assert!(sql.contains("-- Season 2 has no authoritative episode-database match"));
}

#[tokio::test]
async fn test_brand_keyword_scopes_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let zero = AnilistWork {
        id: AnilistId::new(10),
        titles: titles("Fate/Zero"),
        format: Some(MediaFormat::Tv),
        start_date: Some(date(2011, 10, 2)),
        relations: vec![
            edge(RelationType::SideStory, 11, "Fate/Zero Cafe", MediaFormat::Ona),
            edge(RelationType::Alternative, 12, "Tsukihime", MediaFormat::Tv),
            RelationEdge {
                kind: MediaKind::Manga,
                ..edge(RelationType::Adaptation, 13, "Fate/Zero", MediaFormat::Manga)
            },
        ],
        ..AnilistWork::default()
    };
    let cafe = AnilistWork {
        id: AnilistId::new(11),
        titles: titles("Fate/Zero Cafe"),
        format: Some(MediaFormat::Ona),
        start_date: Some(date(2013, 12, 28)),
        ..AnilistWork::default()
    };
    let anilist = Arc::new(FakeAnilist {
        works: [zero, cafe].into_iter().map(|w| (w.id, w)).collect(),
        ..FakeAnilist::default()
    });
    let service = service(dir.path(), anilist.clone(), Arc::new(FakeJikan::default()), None);

    let sources = service
        .fetch("Fate/Zero", Some(AnilistId::new(10)))
        .await
        .unwrap();

    assert!(sources.keywords.contains(&"fate".to_string()));
    let ids: HashSet<i32> = sources.anilist.iter().map(|w| w.id.value()).collect();
    assert_eq!(ids, HashSet::from([10, 11]));
    assert_eq!(anilist.fetches.lock().unwrap().len(), 2);
    assert_eq!(sources.slug, "fate-zero");
}
