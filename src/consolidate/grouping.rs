use crate::consolidate::WorkClass;
use crate::domain::AnilistId;
use crate::models::source::{AnilistWork, MediaFormat};
use crate::parser::title::{slugify, strip_format_annotation, tv_group_key};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Catalog entries that become one canonical Work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkGroup {
    pub slug: String,
    pub class: WorkClass,
    /// Grouping key for series, empty for separate works.
    pub key: String,
    /// Ordered by start date with undated entries last; ties by catalog id.
    pub members: Vec<AnilistId>,
}

impl WorkGroup {
    #[must_use]
    pub fn is_series(&self) -> bool {
        self.class == WorkClass::TvSeason
    }

    #[must_use]
    pub fn contains(&self, id: AnilistId) -> bool {
        self.members.contains(&id)
    }
}

fn start_order(work: &AnilistWork) -> (bool, Option<NaiveDate>, AnilistId) {
    (work.start_date.is_none(), work.start_date, work.id)
}

fn collision_suffix(class: WorkClass, format: Option<MediaFormat>) -> String {
    match class {
        WorkClass::TvSeason => "tv".to_string(),
        WorkClass::Movie => "movie".to_string(),
        _ => format.map_or_else(|| "other".to_string(), |f| f.as_str().to_lowercase()),
    }
}

fn unique_slug(base: String, suffix: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.clone()) {
        return base;
    }

    let suffixed = format!("{base}-{suffix}");
    if taken.insert(suffixed.clone()) {
        return suffixed;
    }

    (2..)
        .map(|n| format!("{suffixed}-{n}"))
        .find(|candidate| taken.insert(candidate.clone()))
        .unwrap_or(suffixed)
}

/// Splits crawled entries into Works.
///
/// Broadcast entries sharing a [`tv_group_key`] become the seasons of one
/// series; every other entry is its own Work. Series come first, ordered by
/// their earliest season, then the separate works by start date. Slug
/// collisions get a format suffix (`-tv`, `-movie`, `-ova`, ...).
///
/// The result depends only on the set of entries, not on their order, so
/// running it again over the same entries gives the same groups and numbering.
#[must_use]
pub fn group_works(works: &[AnilistWork]) -> Vec<WorkGroup> {
    let mut sorted: Vec<&AnilistWork> = works.iter().collect();
    sorted.sort_by_key(|w| start_order(w));
    sorted.dedup_by_key(|w| w.id);

    let mut series: Vec<(String, Vec<&AnilistWork>)> = Vec::new();
    let mut separate: Vec<&AnilistWork> = Vec::new();

    for work in sorted {
        if WorkClass::of(work.format) != WorkClass::TvSeason {
            separate.push(work);
            continue;
        }

        let mut key = tv_group_key(work.title());
        if key.is_empty() {
            key = format!("#{}", work.id);
        }

        match series.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(work),
            None => series.push((key, vec![work])),
        }
    }

    let mut taken = HashSet::new();
    let mut groups = Vec::with_capacity(series.len() + separate.len());

    for (key, members) in series {
        let title = members.first().map(|w| w.title()).unwrap_or_default();
        let slug = unique_slug(
            slugify(&strip_format_annotation(title)),
            &collision_suffix(WorkClass::TvSeason, None),
            &mut taken,
        );
        debug!(slug = %slug, key = %key, seasons = members.len(), "Grouped series");

        groups.push(WorkGroup {
            slug,
            class: WorkClass::TvSeason,
            key,
            members: members.iter().map(|w| w.id).collect(),
        });
    }

    for work in separate {
        let class = WorkClass::of(work.format);
        let slug = unique_slug(
            slugify(&strip_format_annotation(work.title())),
            &collision_suffix(class, work.format),
            &mut taken,
        );

        groups.push(WorkGroup {
            slug,
            class,
            key: String::new(),
            members: vec![work.id],
        });
    }

    groups
}
