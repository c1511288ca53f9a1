//! Season consolidation: relation-graph traversal, title grouping and
//! reconciliation against the episode database.

pub mod grouping;
pub mod reconcile;
pub mod traversal;

pub use grouping::{WorkGroup, group_works};
pub use reconcile::{
    AuthoritativeSeason, CandidateMatch, SeasonMatch, authoritative_seasons, best_season_for,
    pick_series, reconcile,
};
pub use traversal::{Crawl, NodeRecord, NodeState, RejectReason, crawl};

use crate::models::franchise::Work;
use crate::models::source::MediaFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad classification of a catalog entry by its declared format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkClass {
    /// Candidate season of a consolidated series.
    TvSeason,
    Movie,
    Ova,
    Special,
    Other,
}

impl WorkClass {
    #[must_use]
    pub const fn of(format: Option<MediaFormat>) -> Self {
        match format {
            Some(MediaFormat::Tv | MediaFormat::TvShort) => Self::TvSeason,
            Some(MediaFormat::Movie) => Self::Movie,
            Some(MediaFormat::Ova | MediaFormat::Ona) => Self::Ova,
            Some(MediaFormat::Special) => Self::Special,
            _ => Self::Other,
        }
    }
}

/// Invariant violations in consolidated output. These mean the consolidation
/// logic itself is broken, never that the input was unusual.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsolidationError {
    #[error("work '{work}' has season number {number} more than once")]
    SeasonNumberCollision { work: String, number: u32 },

    #[error("work '{work}' seasons are not numbered 1..{count} in air-date order")]
    NonContiguousSeasons { work: String, count: usize },
}

/// Checks that a Work's seasons are unique, numbered `1..=N` and ordered by
/// air-date start (undated seasons last).
pub fn verify_seasons(work: &Work) -> Result<(), ConsolidationError> {
    let mut seen = std::collections::HashSet::new();
    for season in &work.seasons {
        if !seen.insert(season.number) {
            return Err(ConsolidationError::SeasonNumberCollision {
                work: work.slug.clone(),
                number: season.number,
            });
        }
    }

    let numbered = work
        .seasons
        .iter()
        .zip(1u32..)
        .all(|(season, expected)| season.number == expected);

    let ordered = work.seasons.windows(2).all(|pair| {
        match (pair[0].air_date_start, pair[1].air_date_start) {
            (Some(a), Some(b)) => a <= b,
            (Some(_) | None, None) => true,
            (None, Some(_)) => false,
        }
    });

    if numbered && ordered {
        Ok(())
    } else {
        Err(ConsolidationError::NonContiguousSeasons {
            work: work.slug.clone(),
            count: work.seasons.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnilistId, SourceIds};
    use crate::models::franchise::{MediaType, Season, WorkStatus};
    use chrono::NaiveDate;

    fn season(number: u32, start: Option<(i32, u32, u32)>) -> Season {
        Season {
            number,
            title: None,
            episode_count: None,
            air_date_start: start.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            air_date_end: None,
            anilist_id: AnilistId::new(i32::try_from(number).unwrap()),
            mal_id: None,
            tvdb_season: None,
        }
    }

    fn work(seasons: Vec<Season>) -> Work {
        Work {
            slug: "show".to_string(),
            title: "Show".to_string(),
            title_native: None,
            alternate_titles: Vec::new(),
            media_type: MediaType::Anime,
            format: Some(MediaFormat::Tv),
            ids: SourceIds::default(),
            status: WorkStatus::Released,
            release_date: None,
            end_date: None,
            episode_count: None,
            chapter_count: None,
            volume_count: None,
            source_material: None,
            genres: Vec::new(),
            tags: Vec::new(),
            description: None,
            consolidated: true,
            seasons,
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(WorkClass::of(Some(MediaFormat::TvShort)), WorkClass::TvSeason);
        assert_eq!(WorkClass::of(Some(MediaFormat::Ona)), WorkClass::Ova);
        assert_eq!(WorkClass::of(Some(MediaFormat::Music)), WorkClass::Other);
        assert_eq!(WorkClass::of(None), WorkClass::Other);
    }

    #[test]
    fn test_verify_accepts_contiguous() {
        let w = work(vec![
            season(1, Some((2019, 4, 6))),
            season(2, Some((2021, 10, 10))),
            season(3, None),
        ]);
        assert_eq!(verify_seasons(&w), Ok(()));
    }

    #[test]
    fn test_verify_rejects_collision() {
        let w = work(vec![season(1, Some((2019, 4, 6))), season(1, Some((2020, 1, 1)))]);
        assert_eq!(
            verify_seasons(&w),
            Err(ConsolidationError::SeasonNumberCollision {
                work: "show".to_string(),
                number: 1
            })
        );
    }

    #[test]
    fn test_verify_rejects_gap_and_disorder() {
        let gap = work(vec![season(1, Some((2019, 4, 6))), season(3, Some((2020, 1, 1)))]);
        assert!(verify_seasons(&gap).is_err());

        let disorder = work(vec![season(1, Some((2021, 4, 6))), season(2, Some((2020, 1, 1)))]);
        assert!(verify_seasons(&disorder).is_err());
    }
}
