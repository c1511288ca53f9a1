//! Cross-catalog entity resolution for people, characters and companies.
//!
//! Records from the primary catalog seed a name index. Each alternate-catalog
//! record is then matched on its own against that index: first by a shared
//! alternate-catalog ID, then by exact normalized name, then by fuzzy name at a
//! per-class threshold. Alternate records are never matched against each
//! other, so the outcome does not depend on the order they arrive in.

use crate::matching::name::normalize;
use crate::matching::{NameIndex, NameMatcher};
use crate::models::franchise::{Character, Company, EntityIds, Person};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

mod slug;

pub use slug::SlugAllocator;

/// A canonical entity that can be merged with another record of itself.
pub trait Resolvable {
    /// Display name first, then any aliases worth indexing.
    fn names(&self) -> Vec<&str>;

    fn ids(&self) -> EntityIds;

    /// Fills fields this entity lacks from `other`. Populated fields are kept.
    fn absorb(&mut self, other: Self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityClass {
    Person,
    Character,
    Company,
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Person => "person",
            Self::Character => "character",
            Self::Company => "company",
        };
        f.write_str(name)
    }
}

/// How one alternate-catalog record was resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Its alternate-catalog ID was already known.
    KnownId(usize),
    Exact(usize),
    Fuzzy { index: usize, score: f64 },
    /// No match; a new canonical entity was created.
    Created(usize),
}

impl Resolution {
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::KnownId(i) | Self::Exact(i) | Self::Created(i) | Self::Fuzzy { index: i, .. } => i,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub primary: usize,
    pub known_id: usize,
    pub exact: usize,
    pub fuzzy: usize,
    pub created: usize,
}

/// Canonical entities of one class for one franchise run.
#[derive(Debug)]
pub struct EntityRegistry<T> {
    class: EntityClass,
    threshold: f64,
    entities: Vec<T>,
    by_primary: HashMap<i32, usize>,
    by_secondary: HashMap<i32, usize>,
    index: NameIndex<usize>,
    stats: ResolutionStats,
}

impl<T: Resolvable> EntityRegistry<T> {
    #[must_use]
    pub fn new(class: EntityClass, matcher: NameMatcher, threshold: f64) -> Self {
        Self {
            class,
            threshold,
            entities: Vec::new(),
            by_primary: HashMap::new(),
            by_secondary: HashMap::new(),
            index: NameIndex::new(matcher),
            stats: ResolutionStats::default(),
        }
    }

    /// Adds a primary-catalog record. A record whose primary ID is already
    /// registered is folded into the existing entity.
    pub fn insert_primary(&mut self, record: T) -> usize {
        let ids = record.ids();

        if let Some(&existing) = ids.anilist.and_then(|id| self.by_primary.get(&id)) {
            self.entities[existing].absorb(record);
            return existing;
        }

        let index = self.entities.len();
        for name in record.names() {
            self.index.add(name, index);
        }
        if let Some(id) = ids.anilist {
            self.by_primary.insert(id, index);
        }
        if let Some(id) = ids.mal {
            self.by_secondary.entry(id).or_insert(index);
        }

        self.entities.push(record);
        self.stats.primary += 1;
        index
    }

    /// Resolves a batch of alternate-catalog records against the primary index.
    ///
    /// The batch is sorted by alternate ID, then by normalized names, so that
    /// which record fills a missing field is fixed for a given input set.
    pub fn resolve_secondary<I>(&mut self, records: I) -> Vec<Resolution>
    where
        I: IntoIterator<Item = T>,
    {
        let mut records: Vec<T> = records.into_iter().collect();
        records.sort_by_cached_key(|r| {
            let names: Vec<String> = r.names().into_iter().map(normalize).collect();
            (r.ids().mal, names)
        });

        records
            .into_iter()
            .map(|record| self.resolve_one(record))
            .collect()
    }

    fn resolve_one(&mut self, record: T) -> Resolution {
        let mal = record.ids().mal;

        if let Some(&existing) = mal.and_then(|id| self.by_secondary.get(&id)) {
            self.entities[existing].absorb(record);
            self.stats.known_id += 1;
            return Resolution::KnownId(existing);
        }

        let matched = self.match_names(&record.names());
        let resolution = match matched {
            Some(resolution) => {
                match resolution {
                    Resolution::Fuzzy { score, .. } => {
                        debug!(class = %self.class, score, "Fuzzy cross-catalog match");
                        self.stats.fuzzy += 1;
                    }
                    _ => self.stats.exact += 1,
                }
                self.entities[resolution.index()].absorb(record);
                resolution
            }
            None => {
                debug!(
                    class = %self.class,
                    name = record.names().first().copied().unwrap_or_default(),
                    "No cross-catalog match, keeping as new entity"
                );
                let index = self.entities.len();
                self.entities.push(record);
                self.stats.created += 1;
                Resolution::Created(index)
            }
        };

        if let Some(id) = mal {
            self.by_secondary.insert(id, resolution.index());
        }

        resolution
    }

    /// Exact lookup over every name first, then the best fuzzy hit.
    fn match_names(&self, names: &[&str]) -> Option<Resolution> {
        if let Some(index) = names.iter().find_map(|n| self.index.lookup_exact(n)) {
            return Some(Resolution::Exact(index));
        }

        names
            .iter()
            .filter_map(|n| self.index.lookup_scored(n, self.threshold))
            .fold(None, |best: Option<(usize, f64)>, (index, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((index, score)),
            })
            .map(|(index, score)| Resolution::Fuzzy { index, score })
    }

    #[must_use]
    pub fn by_anilist(&self, id: i32) -> Option<usize> {
        self.by_primary.get(&id).copied()
    }

    #[must_use]
    pub fn by_mal(&self, id: i32) -> Option<usize> {
        self.by_secondary.get(&id).copied()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entities.get(index)
    }

    #[must_use]
    pub const fn stats(&self) -> ResolutionStats {
        self.stats
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn into_entities(self) -> Vec<T> {
        self.entities
    }
}

fn fill<V>(slot: &mut Option<V>, value: Option<V>) {
    if slot.is_none() {
        *slot = value;
    }
}

impl Resolvable for Person {
    fn names(&self) -> Vec<&str> {
        std::iter::once(self.name.as_str())
            .chain(self.native_name.as_deref())
            .collect()
    }

    fn ids(&self) -> EntityIds {
        self.ids
    }

    fn absorb(&mut self, other: Self) {
        self.ids.fill_from(other.ids);
        fill(&mut self.native_name, other.native_name);
        fill(&mut self.description, other.description);
        fill(&mut self.birth_date, other.birth_date);
        fill(&mut self.death_date, other.death_date);
        if self.occupations.is_empty() {
            self.occupations = other.occupations;
        }
    }
}

impl Resolvable for Character {
    fn names(&self) -> Vec<&str> {
        std::iter::once(self.name.as_str())
            .chain(self.native_name.as_deref())
            .chain(self.alternate_names.iter().map(String::as_str))
            .collect()
    }

    fn ids(&self) -> EntityIds {
        self.ids
    }

    fn absorb(&mut self, other: Self) {
        self.ids.fill_from(other.ids);
        fill(&mut self.native_name, other.native_name);
        fill(&mut self.description, other.description);

        let mut seen: HashSet<String> = self.alternate_names.iter().cloned().collect();
        seen.insert(self.name.clone());
        for name in std::iter::once(other.name).chain(other.alternate_names) {
            if !name.is_empty() && seen.insert(name.clone()) {
                self.alternate_names.push(name);
            }
        }
    }
}

impl Resolvable for Company {
    fn names(&self) -> Vec<&str> {
        vec![self.name.as_str()]
    }

    fn ids(&self) -> EntityIds {
        self.ids
    }

    fn absorb(&mut self, other: Self) {
        self.ids.fill_from(other.ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str, anilist: Option<i32>, mal: Option<i32>) -> Person {
        Person {
            slug: String::new(),
            name: name.to_string(),
            native_name: None,
            description: None,
            birth_date: None,
            death_date: None,
            occupations: Vec::new(),
            ids: EntityIds { anilist, mal },
        }
    }

    fn company(name: &str, anilist: Option<i32>, mal: Option<i32>) -> Company {
        Company {
            slug: String::new(),
            name: name.to_string(),
            ids: EntityIds { anilist, mal },
        }
    }

    fn registry() -> EntityRegistry<Person> {
        let mut registry =
            EntityRegistry::new(EntityClass::Person, NameMatcher::default(), 80.0);
        registry.insert_primary(person("Natsuki Hanae", Some(95991), None));
        registry.insert_primary(person("Akari Kitou", Some(119473), None));
        registry
    }

    #[test]
    fn test_reversed_name_resolves_exactly() {
        let mut registry = registry();
        let resolutions = registry.resolve_secondary(vec![person("Hanae, Natsuki", None, Some(20659))]);

        assert_eq!(resolutions, vec![Resolution::Exact(0)]);
        let merged = registry.get(0).unwrap();
        assert_eq!(merged.ids.mal, Some(20659));
        assert_eq!(merged.name, "Natsuki Hanae");
    }

    #[test]
    fn test_unmatched_record_is_retained() {
        let mut registry = registry();
        let resolutions =
            registry.resolve_secondary(vec![person("Kibutsuji, Muzan", None, Some(5))]);

        assert_eq!(resolutions, vec![Resolution::Created(2)]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.stats().created, 1);
    }

    #[test]
    fn test_records_without_alternate_id_fill_in_stable_order() {
        let kana = || {
            let mut p = person("Hanae, Natsuki", None, None);
            p.native_name = Some("はなえなつき".to_string());
            p
        };
        let kanji = || {
            let mut p = person("Hanae, Natsuki", None, None);
            p.native_name = Some("花江夏樹".to_string());
            p
        };

        let mut forward = registry();
        forward.resolve_secondary(vec![kana(), kanji()]);
        let mut backward = registry();
        backward.resolve_secondary(vec![kanji(), kana()]);

        assert_eq!(forward.get(0).unwrap().native_name.as_deref(), Some("はなえなつき"));
        assert_eq!(forward.get(0), backward.get(0));
    }

    #[test]
    fn test_duplicate_primary_ids_fold() {
        let mut registry = registry();
        let mut again = person("Natsuki Hanae", Some(95991), None);
        again.native_name = Some("花江夏樹".to_string());
        assert_eq!(registry.insert_primary(again), 0);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(0).unwrap().native_name.as_deref(), Some("花江夏樹"));
    }

    #[test]
    fn test_first_populated_field_wins() {
        let mut registry = registry();
        let mut a = person("Hanae, Natsuki", None, Some(2));
        a.description = Some("second".to_string());
        let mut b = person("Hanae Natsuki", None, Some(1));
        b.description = Some("first".to_string());

        registry.resolve_secondary(vec![a, b]);
        assert_eq!(registry.get(0).unwrap().description.as_deref(), Some("first"));
        assert_eq!(registry.get(0).unwrap().ids.mal, Some(1));
    }

    #[test]
    fn test_order_independent_grouping() {
        let batch = || {
            vec![
                person("Hanae, Natsuki", None, Some(20659)),
                person("Kitou, Akari", None, Some(41111)),
                person("Shimono, Hiro", None, Some(118)),
                person("Hanae Natsuki", None, Some(20659)),
            ]
        };

        let mut forward = registry();
        forward.resolve_secondary(batch());
        let mut reverse = registry();
        reverse.resolve_secondary(batch().into_iter().rev());

        assert_eq!(forward.into_entities(), reverse.into_entities());
    }

    #[test]
    fn test_known_mal_id_merges() {
        let mut registry = registry();
        registry.resolve_secondary(vec![person("Hiro Shimono", None, Some(118))]);
        let second = registry.resolve_secondary(vec![person("Shimono Hiro (young)", None, Some(118))]);
        assert_eq!(second, vec![Resolution::KnownId(2)]);
    }

    #[test]
    fn test_company_threshold_is_looser() {
        let mut companies =
            EntityRegistry::new(EntityClass::Company, NameMatcher::default(), 70.0);
        companies.insert_primary(company("A-1 Pictures", Some(561), None));
        companies.insert_primary(company("ufotable", Some(43), None));

        let resolutions = companies.resolve_secondary(vec![
            company("A-1 Pictures Inc.", None, Some(56)),
            company("Shueisha", None, Some(1365)),
        ]);

        assert!(matches!(resolutions[0], Resolution::Fuzzy { index: 0, .. }));
        assert_eq!(resolutions[1], Resolution::Created(2));
    }

    #[test]
    fn test_empty_name_never_matches() {
        let mut registry = registry();
        let resolutions = registry.resolve_secondary(vec![person("", None, Some(9))]);
        assert_eq!(resolutions, vec![Resolution::Created(2)]);
    }
}
