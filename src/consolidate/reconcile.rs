//! Reconciliation of consolidated seasons against the episode database.
//!
//! The episode database is authoritative for season boundaries. Each of its
//! aired seasons gets a date span computed from its episodes' air dates, and
//! every primary-catalog candidate whose own range overlaps that span (and
//! whose titles belong to the franchise) is scored. A season may accept
//! several candidates: split-cour releases are listed as separate entries in
//! the primary catalog but as one season here.

use crate::constants::{scoring, thresholds};
use crate::domain::{AnilistId, TvdbId};
use crate::matching::temporal::{DateRange, overlaps};
use crate::matching::NameMatcher;
use crate::models::source::{AnilistWork, MediaFormat, SeasonOrder, TvdbCandidate, TvdbSeries};
use crate::parser::title::belongs_to_franchise;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An aired-order season with the span its episodes actually cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativeSeason {
    pub number: u32,
    pub span: DateRange,
    pub episode_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub id: AnilistId,
    pub score: i32,
}

/// Every candidate accepted for one authoritative season, by start date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonMatch {
    pub season: AuthoritativeSeason,
    pub matches: Vec<CandidateMatch>,
}

impl SeasonMatch {
    #[must_use]
    pub fn ids(&self) -> Vec<AnilistId> {
        self.matches.iter().map(|m| m.id).collect()
    }
}

/// Aired-order seasons numbered above zero that have at least one dated
/// episode. The nominal season name is ignored.
#[must_use]
pub fn authoritative_seasons(series: &TvdbSeries) -> Vec<AuthoritativeSeason> {
    let mut seasons: Vec<AuthoritativeSeason> = series
        .seasons
        .iter()
        .filter(|s| s.order == SeasonOrder::Aired && s.number > 0)
        .filter_map(|s| {
            let episodes = series.episodes.iter().filter(|e| e.season_number == s.number);
            let span = DateRange::spanning(episodes.clone().filter_map(|e| e.aired))?;
            Some(AuthoritativeSeason {
                number: s.number,
                span,
                episode_count: u32::try_from(episodes.count()).unwrap_or(u32::MAX),
            })
        })
        .collect();

    seasons.sort_by_key(|s| s.number);
    seasons.dedup_by_key(|s| s.number);
    seasons
}

fn is_reconcilable(format: Option<MediaFormat>) -> bool {
    matches!(
        format,
        None | Some(MediaFormat::Tv | MediaFormat::TvShort | MediaFormat::Special)
    )
}

fn franchise_check(candidate: &AnilistWork, franchise: &str, matcher: &NameMatcher) -> bool {
    let names = candidate.all_titles();
    let lower = franchise.to_lowercase();
    if !lower.is_empty() && names.iter().any(|n| n.to_lowercase().contains(&lower)) {
        return true;
    }

    let threshold = if candidate.format == Some(MediaFormat::Special) {
        thresholds::SPECIAL_FRANCHISE_MATCH
    } else {
        thresholds::SEASON_FRANCHISE_MATCH
    };
    matcher.best_score(franchise, names) >= threshold
}

/// Scores one candidate against one authoritative season. `None` when the
/// date ranges do not overlap within the tolerance.
#[must_use]
pub fn score_candidate(
    candidate: &AnilistWork,
    season: &AuthoritativeSeason,
    tolerance_days: i64,
) -> Option<i32> {
    let range = DateRange::from_bounds(candidate.start_date, candidate.end_date)?;
    if !overlaps(&range, &season.span, tolerance_days) {
        return None;
    }

    let mut score = scoring::SEASON_BASE;

    if range.is_point() {
        if season.span.contains(range.start) {
            score += scoring::POINT_INSIDE_SPAN;
        }
    } else {
        let shared = range.overlap_days(&season.span);
        if shared > scoring::LONG_OVERLAP_DAYS {
            score += scoring::LONG_OVERLAP;
        } else if shared > scoring::SHORT_OVERLAP_DAYS {
            score += scoring::SHORT_OVERLAP;
        }
    }

    let is_special = candidate.format == Some(MediaFormat::Special);
    match candidate.episodes {
        Some(eps) if is_special && eps <= scoring::SHORT_SPECIAL_MAX_EPISODES => {
            score += scoring::SHORT_SPECIAL;
        }
        Some(eps) => {
            let diff = eps.abs_diff(season.episode_count);
            if diff <= 2 {
                score += scoring::EPISODES_CLOSE;
            } else if diff <= 5 {
                score += scoring::EPISODES_NEAR;
            }
        }
        None => {}
    }

    Some(score)
}

/// Matches primary-catalog candidates to authoritative seasons.
///
/// Only broadcast formats, specials and entries without a format take part.
/// A season keeps every candidate that clears the acceptance score, not just
/// the best one.
#[must_use]
pub fn reconcile(
    series: &TvdbSeries,
    candidates: &[&AnilistWork],
    franchise: &str,
    matcher: &NameMatcher,
    tolerance_days: i64,
) -> Vec<SeasonMatch> {
    let mut pool: Vec<&AnilistWork> = candidates
        .iter()
        .copied()
        .filter(|c| is_reconcilable(c.format))
        .filter(|c| franchise_check(c, franchise, matcher))
        .collect();
    pool.sort_by_key(|c| (c.start_date.is_none(), c.start_date, c.id));

    authoritative_seasons(series)
        .into_iter()
        .filter_map(|season| {
            let matches: Vec<CandidateMatch> = pool
                .iter()
                .filter_map(|c| {
                    let score = score_candidate(c, &season, tolerance_days)?;
                    let accept = if c.format == Some(MediaFormat::Special) {
                        thresholds::SPECIAL_SEASON_ACCEPT
                    } else {
                        thresholds::SEASON_ACCEPT
                    };
                    if score >= accept {
                        Some(CandidateMatch { id: c.id, score })
                    } else {
                        debug!(
                            season = season.number,
                            candidate = %c.id,
                            score,
                            "Season candidate below acceptance score"
                        );
                        None
                    }
                })
                .collect();

            (!matches.is_empty()).then_some(SeasonMatch { season, matches })
        })
        .collect()
}

/// Authoritative season a candidate belongs to: the highest-scoring season
/// that listed it, the lower season number on ties.
#[must_use]
pub fn best_season_for(matches: &[SeasonMatch], id: AnilistId) -> Option<&SeasonMatch> {
    matches
        .iter()
        .filter_map(|m| m.matches.iter().find(|c| c.id == id).map(|c| (m, c.score)))
        .fold(None, |best: Option<(&SeasonMatch, i32)>, (m, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((m, score)),
        })
        .map(|(m, _)| m)
}

/// Picks the episode-database series for a Work.
///
/// Candidates are scored by best title similarity against the Work's titles,
/// adjusted for release year, first-air proximity and a movie/series mismatch.
/// The best candidate at or above the acceptance score that also passes the
/// franchise check wins.
#[must_use]
pub fn pick_series(
    candidates: &[TvdbCandidate],
    titles: &[&str],
    start: Option<NaiveDate>,
    is_movie: bool,
    franchise: &str,
    matcher: &NameMatcher,
) -> Option<(TvdbId, f64)> {
    let mut best: Option<(TvdbId, f64)> = None;

    for candidate in candidates {
        let names: Vec<&str> = std::iter::once(candidate.name.as_str())
            .chain(candidate.aliases.iter().map(String::as_str))
            .collect();
        if !belongs_to_franchise(&names, franchise, matcher) {
            continue;
        }

        let mut score = titles
            .iter()
            .map(|t| matcher.best_score(t, names.iter().copied()))
            .fold(0.0, f64::max);

        if let (Some(start), Some(year)) = (start, candidate.year)
            && start.year() == year
        {
            score += scoring::SAME_YEAR;
        }
        if let (Some(start), Some(aired)) = (start, candidate.first_aired)
            && (start - aired).num_days().abs() <= scoring::FIRST_AIRED_NEAR_DAYS
        {
            score += scoring::FIRST_AIRED_NEAR;
        }
        if candidate.is_movie != is_movie {
            score += scoring::FORMAT_MISMATCH;
        }

        debug!(candidate = %candidate.id, name = %candidate.name, score, "Scored series candidate");

        if score >= thresholds::SERIES_ACCEPT && best.is_none_or(|(_, top)| score > top) {
            best = Some((candidate.id, score));
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::source::{Titles, TvdbEpisode, TvdbSeason};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekly(season: u32, first: NaiveDate, count: u32) -> Vec<TvdbEpisode> {
        (0..count)
            .map(|i| TvdbEpisode {
                season_number: season,
                number: i + 1,
                aired: Some(first + chrono::Duration::weeks(i64::from(i))),
            })
            .collect()
    }

    fn series(episodes: Vec<TvdbEpisode>, seasons: &[(u32, SeasonOrder)]) -> TvdbSeries {
        TvdbSeries {
            id: TvdbId::new(1),
            name: "Show".to_string(),
            seasons: seasons
                .iter()
                .enumerate()
                .map(|(i, (number, order))| TvdbSeason {
                    id: i32::try_from(i).unwrap(),
                    number: *number,
                    name: None,
                    order: *order,
                })
                .collect(),
            episodes,
            ..TvdbSeries::default()
        }
    }

    fn candidate(
        id: i32,
        title: &str,
        format: MediaFormat,
        start: NaiveDate,
        end: Option<NaiveDate>,
        episodes: u32,
    ) -> AnilistWork {
        AnilistWork {
            id: AnilistId::new(id),
            titles: Titles {
                romaji: None,
                english: Some(title.to_string()),
                native: None,
            },
            format: Some(format),
            start_date: Some(start),
            end_date: end,
            episodes: Some(episodes),
            ..AnilistWork::default()
        }
    }

    #[test]
    fn test_authoritative_seasons_use_episode_dates() {
        let mut episodes = weekly(1, date(2020, 1, 10), 12);
        episodes.extend(weekly(0, date(2019, 1, 1), 2));
        episodes.extend(weekly(2, date(2021, 1, 8), 0));
        let s = series(
            episodes,
            &[
                (0, SeasonOrder::Aired),
                (1, SeasonOrder::Aired),
                (1, SeasonOrder::Absolute),
                (2, SeasonOrder::Aired),
            ],
        );

        let seasons = authoritative_seasons(&s);
        assert_eq!(seasons.len(), 1);
        assert_eq!(seasons[0].number, 1);
        assert_eq!(seasons[0].span.start, date(2020, 1, 10));
        assert_eq!(seasons[0].span.end, date(2020, 3, 27));
        assert_eq!(seasons[0].episode_count, 12);
    }

    #[test]
    fn test_split_cour_entries_both_match() {
        let s = series(weekly(1, date(2022, 1, 9), 24), &[(1, SeasonOrder::Aired)]);
        let part1 = candidate(1, "Show", MediaFormat::Tv, date(2022, 1, 9), Some(date(2022, 3, 27)), 12);
        let part2 = candidate(2, "Show Part 2", MediaFormat::Tv, date(2022, 4, 10), Some(date(2022, 6, 19)), 12);

        let matches = reconcile(&s, &[&part2, &part1], "Show", &NameMatcher::default(), 30);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].ids(), vec![AnilistId::new(1), AnilistId::new(2)]);
    }

    #[test]
    fn test_out_of_window_candidate_rejected() {
        let s = series(weekly(1, date(2020, 1, 10), 12), &[(1, SeasonOrder::Aired)]);
        let late = candidate(1, "Show", MediaFormat::Tv, date(2021, 1, 8), Some(date(2021, 3, 26)), 12);

        assert!(reconcile(&s, &[&late], "Show", &NameMatcher::default(), 30).is_empty());
    }

    #[test]
    fn test_short_special_inside_span() {
        let s = series(weekly(1, date(2020, 1, 10), 12), &[(1, SeasonOrder::Aired)]);
        let special = candidate(
            9,
            "Show: A Very Long Recap Special With Commentary",
            MediaFormat::Special,
            date(2020, 2, 20),
            None,
            1,
        );

        let season = &authoritative_seasons(&s)[0];
        assert_eq!(score_candidate(&special, season, 30), Some(70));

        let matches = reconcile(&s, &[&special], "Show", &NameMatcher::default(), 30);
        assert_eq!(matches[0].ids(), vec![AnilistId::new(9)]);
    }

    #[test]
    fn test_unrelated_title_fails_franchise_check() {
        let s = series(weekly(1, date(2020, 1, 10), 12), &[(1, SeasonOrder::Aired)]);
        let other = candidate(1, "Different Thing", MediaFormat::Tv, date(2020, 1, 10), Some(date(2020, 3, 27)), 12);

        assert!(reconcile(&s, &[&other], "Show", &NameMatcher::default(), 30).is_empty());
    }

    #[test]
    fn test_pick_series_prefers_same_year() {
        let candidates = vec![
            TvdbCandidate {
                id: TvdbId::new(10),
                name: "Show".to_string(),
                aliases: Vec::new(),
                year: Some(1998),
                first_aired: None,
                is_movie: false,
            },
            TvdbCandidate {
                id: TvdbId::new(20),
                name: "Show".to_string(),
                aliases: Vec::new(),
                year: Some(2020),
                first_aired: Some(date(2020, 1, 10)),
                is_movie: false,
            },
            TvdbCandidate {
                id: TvdbId::new(30),
                name: "Show".to_string(),
                aliases: Vec::new(),
                year: Some(2020),
                first_aired: Some(date(2020, 1, 10)),
                is_movie: true,
            },
        ];

        let picked = pick_series(
            &candidates,
            &["Show"],
            Some(date(2020, 1, 10)),
            false,
            "Show",
            &NameMatcher::default(),
        );
        assert_eq!(picked.map(|(id, _)| id), Some(TvdbId::new(20)));
    }

    #[test]
    fn test_pick_series_requires_franchise() {
        let candidates = vec![TvdbCandidate {
            id: TvdbId::new(10),
            name: "Something Else Entirely".to_string(),
            aliases: Vec::new(),
            year: Some(2020),
            first_aired: None,
            is_movie: false,
        }];
        assert!(
            pick_series(&candidates, &["Show"], None, false, "Show", &NameMatcher::default())
                .is_none()
        );
    }
}
