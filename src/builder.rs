//! Consolidated record builder.
//!
//! Turns the raw sources cached for one franchise into the canonical record
//! graph. Grouping decides the Works and Seasons, reconciliation annotates
//! seasons with the episode database's structure, and the entity registries
//! fold people, characters and companies from both media catalogs together.
//! The build is pure: the same sources always give the same graph.

use crate::config::MatchingConfig;
use crate::consolidate::{
    ConsolidationError, NodeRecord, NodeState, WorkClass, WorkGroup, best_season_for, group_works,
    reconcile, verify_seasons,
};
use crate::constants::limits::MIN_TAG_RANK;
use crate::domain::{AnilistId, SourceIds};
use crate::matching::NameMatcher;
use crate::models::franchise::{
    CastCredit, Character, Company, CompanyCredit, CompanyRole, ConsolidatedFranchise, Credit,
    EntityIds, MediaType, Person, Relationship, RelationshipKind, Season, VoiceRole, Work,
    WorkStatus,
};
use crate::models::source::{
    AnilistWork, CharacterRole, FranchiseSources, MalRef, MalWork, SourceCharacter, SourcePerson,
};
use crate::parser::text::{clean_description, flip_family_given, label, language_code};
use crate::parser::title::strip_format_annotation;
use crate::policy::{company_role_allowed, staff_role};
use crate::resolve::{EntityClass, EntityRegistry, ResolutionStats, SlugAllocator};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use tracing::{debug, info};

/// A special that reconciliation placed inside an authoritative season of a
/// series. The special stays its own Work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialPlacement {
    pub special: String,
    pub series: String,
    pub tvdb_season: u32,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub persons: ResolutionStats,
    pub characters: ResolutionStats,
    pub companies: ResolutionStats,
    pub verified_seasons: usize,
    pub unverified_seasons: usize,
    pub specials: Vec<SpecialPlacement>,
    /// Crawl nodes with their final placement.
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone)]
pub struct Build {
    pub franchise: ConsolidatedFranchise,
    pub report: BuildReport,
}

/// Entity reference recorded before resolution has settled on indices.
#[derive(Debug, Clone, Copy)]
enum EntityRef {
    Primary(usize),
    Mal(i32),
}

fn resolve_ref<T: crate::resolve::Resolvable>(
    registry: &EntityRegistry<T>,
    r: EntityRef,
) -> Option<usize> {
    match r {
        EntityRef::Primary(index) => Some(index),
        EntityRef::Mal(id) => registry.by_mal(id),
    }
}

/// Credits as collected from both catalogs, keyed by Work slug.
#[derive(Debug, Default)]
struct PendingCredits {
    staff: Vec<(String, EntityRef, String)>,
    cast: Vec<(String, EntityRef, CharacterRole)>,
    voices: Vec<(String, EntityRef, EntityRef, String)>,
    companies: Vec<(String, EntityRef, CompanyRole)>,
}

struct Registries {
    persons: EntityRegistry<Person>,
    characters: EntityRegistry<Character>,
    companies: EntityRegistry<Company>,
}

fn dedup_by_key<T, K, F>(items: &mut Vec<T>, key: F)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(key(item)));
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

fn primary_person(person: &SourcePerson) -> Person {
    Person {
        slug: String::new(),
        name: person.name.trim().to_string(),
        native_name: person.native_name.clone().filter(|n| !n.is_empty()),
        description: clean_description(person.description.as_deref()),
        birth_date: person.birth_date,
        death_date: person.death_date,
        occupations: person.occupations.clone(),
        ids: EntityIds {
            anilist: Some(person.id),
            mal: None,
        },
    }
}

fn primary_character(character: &SourceCharacter) -> Character {
    Character {
        slug: String::new(),
        name: character.name.trim().to_string(),
        native_name: character.native_name.clone().filter(|n| !n.is_empty()),
        alternate_names: character.alternative_names.clone(),
        description: clean_description(character.description.as_deref()),
        ids: EntityIds {
            anilist: Some(character.id),
            mal: None,
        },
    }
}

fn mal_person(r: &MalRef) -> Person {
    Person {
        slug: String::new(),
        name: flip_family_given(&r.name),
        native_name: None,
        description: None,
        birth_date: None,
        death_date: None,
        occupations: Vec::new(),
        ids: EntityIds {
            anilist: None,
            mal: Some(r.mal_id),
        },
    }
}

fn mal_character(r: &MalRef) -> Character {
    Character {
        slug: String::new(),
        name: flip_family_given(&r.name),
        native_name: None,
        alternate_names: Vec::new(),
        description: None,
        ids: EntityIds {
            anilist: None,
            mal: Some(r.mal_id),
        },
    }
}

fn mal_company(r: &MalRef) -> Company {
    Company {
        slug: String::new(),
        name: r.name.trim().to_string(),
        ids: EntityIds {
            anilist: None,
            mal: Some(r.mal_id),
        },
    }
}

fn sum_episodes<I: IntoIterator<Item = Option<u32>>>(counts: I) -> Option<u32> {
    counts
        .into_iter()
        .fold(None, |acc, n| match (acc, n) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        })
}

/// One Work from a group. Series get a Season per member, numbered by
/// position; other classes carry no seasons.
fn build_work(group: &WorkGroup, members: &[&AnilistWork]) -> Option<Work> {
    let first = *members.first()?;
    let last = *members.last()?;
    let title = strip_format_annotation(first.title());

    let mut alternate_titles = Vec::new();
    let mut genres = Vec::new();
    let mut tags = Vec::new();
    let mut ids = SourceIds::default();

    for member in members {
        for name in member.all_titles() {
            if name != title {
                push_unique(&mut alternate_titles, name.to_string());
            }
        }
        for genre in &member.genres {
            push_unique(&mut genres, label(genre));
        }
        for tag in member
            .tags
            .iter()
            .filter(|t| t.rank >= MIN_TAG_RANK && !t.is_spoiler)
        {
            push_unique(&mut tags, label(&tag.name));
        }
        ids.merge(&SourceIds::from_anilist(member.id, member.mal_id));
    }

    let seasons: Vec<Season> = if group.is_series() {
        members
            .iter()
            .zip(1u32..)
            .map(|(member, number)| Season {
                number,
                title: Some(member.title().to_string()).filter(|t| *t != title && !t.is_empty()),
                episode_count: member.episodes,
                air_date_start: member.start_date,
                air_date_end: member.end_date,
                anilist_id: member.id,
                mal_id: member.mal_id,
                tvdb_season: None,
            })
            .collect()
    } else {
        Vec::new()
    };

    Some(Work {
        slug: group.slug.clone(),
        title_native: first.titles.native.clone(),
        alternate_titles,
        media_type: MediaType::from_format(first.format),
        format: first.format,
        ids,
        status: WorkStatus::from_source(last.status),
        release_date: first.start_date,
        end_date: last.end_date,
        episode_count: sum_episodes(members.iter().map(|m| m.episodes)),
        chapter_count: first.chapters,
        volume_count: first.volumes,
        source_material: first.source_material.as_deref().map(label),
        genres,
        tags,
        description: clean_description(first.description.as_deref()),
        consolidated: group.is_series(),
        seasons,
        title,
    })
}

/// Builds the record graph for one franchise.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    matcher: NameMatcher,
    config: MatchingConfig,
}

impl RecordBuilder {
    #[must_use]
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            matcher: NameMatcher::new(config.engine.build()),
            config: config.clone(),
        }
    }

    /// Builds the consolidated graph. Only a broken season invariant fails
    /// the build; anything unmatched is kept with less coverage.
    pub fn build(&self, sources: &FranchiseSources) -> Result<Build, ConsolidationError> {
        let by_id: HashMap<AnilistId, &AnilistWork> =
            sources.anilist.iter().map(|w| (w.id, w)).collect();
        let groups = group_works(&sources.anilist);

        let mut built: Vec<(&WorkGroup, Vec<&AnilistWork>, Work)> = groups
            .iter()
            .filter_map(|group| {
                let members: Vec<&AnilistWork> = group
                    .members
                    .iter()
                    .filter_map(|id| by_id.get(id).copied())
                    .collect();
                let work = build_work(group, &members)?;
                Some((group, members, work))
            })
            .collect();

        let mut report = BuildReport {
            specials: self.reconcile_series(sources, &mut built),
            ..BuildReport::default()
        };

        for (_, _, work) in &built {
            verify_seasons(work)?;
            for season in &work.seasons {
                if season.is_verified() {
                    report.verified_seasons += 1;
                } else {
                    report.unverified_seasons += 1;
                }
            }
        }

        report.nodes = place_nodes(&sources.nodes, &built);

        let mut registries = Registries {
            persons: EntityRegistry::new(
                EntityClass::Person,
                self.matcher.clone(),
                self.config.person_threshold,
            ),
            characters: EntityRegistry::new(
                EntityClass::Character,
                self.matcher.clone(),
                self.config.character_threshold,
            ),
            companies: EntityRegistry::new(
                EntityClass::Company,
                self.matcher.clone(),
                self.config.company_threshold,
            ),
        };

        let mut pending = PendingCredits::default();
        collect_primary(&built, &mut registries, &mut pending);
        collect_secondary(sources, &built, &mut registries, &mut pending);

        report.persons = registries.persons.stats();
        report.characters = registries.characters.stats();
        report.companies = registries.companies.stats();

        let relationships = relationships(&built);
        let description = by_id
            .get(&sources.root)
            .and_then(|w| clean_description(w.description.as_deref()));

        let mut franchise = finish(registries, pending);
        franchise.slug.clone_from(&sources.slug);
        franchise.name.clone_from(&sources.name);
        franchise.description = description;
        franchise.relationships = relationships;
        franchise.works = built.into_iter().map(|(_, _, work)| work).collect();

        info!(
            franchise = %franchise.slug,
            works = franchise.works.len(),
            persons = franchise.persons.len(),
            characters = franchise.characters.len(),
            companies = franchise.companies.len(),
            verified_seasons = report.verified_seasons,
            unverified_seasons = report.unverified_seasons,
            "Built consolidated franchise"
        );

        Ok(Build { franchise, report })
    }

    /// Annotates series seasons with their authoritative season numbers and
    /// returns where matched specials fell.
    fn reconcile_series(
        &self,
        sources: &FranchiseSources,
        built: &mut [(&WorkGroup, Vec<&AnilistWork>, Work)],
    ) -> Vec<SpecialPlacement> {
        let specials: Vec<(&AnilistWork, String)> = built
            .iter()
            .filter(|(group, _, _)| group.class == WorkClass::Special)
            .filter_map(|(_, members, work)| members.first().map(|m| (*m, work.slug.clone())))
            .collect();

        let mut placements = Vec::new();

        for (group, members, work) in built.iter_mut().filter(|(g, _, _)| g.is_series()) {
            let Some(series) = sources
                .tvdb_links
                .iter()
                .find(|link| group.contains(link.anilist_id))
                .and_then(|link| sources.tvdb_series(link.tvdb_id))
            else {
                info!(
                    work = %work.slug,
                    seasons = work.seasons.len(),
                    "No authoritative season structure, numbering left unverified"
                );
                continue;
            };

            work.ids.tvdb = Some(series.id);

            let candidates: Vec<&AnilistWork> = members
                .iter()
                .copied()
                .chain(specials.iter().map(|(special, _)| *special))
                .collect();
            let matches = reconcile(
                series,
                &candidates,
                &work.title,
                &self.matcher,
                self.config.date_tolerance_days,
            );

            for season in &mut work.seasons {
                let Some(matched) = best_season_for(&matches, season.anilist_id) else {
                    debug!(work = %work.slug, season = season.number, "Season not reconciled");
                    continue;
                };
                season.tvdb_season = Some(matched.season.number);
                if season.episode_count.is_none() && matched.matches.len() == 1 {
                    season.episode_count = Some(matched.season.episode_count);
                }
            }
            work.episode_count = sum_episodes(work.seasons.iter().map(|s| s.episode_count));

            for (special, slug) in &specials {
                if let Some(matched) = best_season_for(&matches, special.id) {
                    placements.push(SpecialPlacement {
                        special: slug.clone(),
                        series: work.slug.clone(),
                        tvdb_season: matched.season.number,
                    });
                }
            }
        }

        placements
    }
}

fn place_nodes(nodes: &[NodeRecord], built: &[(&WorkGroup, Vec<&AnilistWork>, Work)]) -> Vec<NodeRecord> {
    let placement = |id: AnilistId| -> Option<NodeState> {
        built.iter().find_map(|(group, _, work)| {
            if !group.contains(id) {
                return None;
            }
            if group.is_series() {
                work.seasons
                    .iter()
                    .find(|s| s.anilist_id == id)
                    .map(|s| NodeState::ConsolidatedSeason {
                        work: work.slug.clone(),
                        season: s.number,
                    })
            } else {
                Some(NodeState::SeparateWork {
                    work: work.slug.clone(),
                })
            }
        })
    };

    nodes
        .iter()
        .map(|node| {
            let state = match node.state {
                NodeState::Classified { .. } => placement(node.id).unwrap_or_else(|| node.state.clone()),
                _ => node.state.clone(),
            };
            NodeRecord {
                id: node.id,
                depth: node.depth,
                state,
            }
        })
        .collect()
}

fn collect_primary(
    built: &[(&WorkGroup, Vec<&AnilistWork>, Work)],
    registries: &mut Registries,
    pending: &mut PendingCredits,
) {
    for (_, members, work) in built {
        for member in members {
            for studio in &member.studios {
                let role = if studio.is_animation_studio {
                    CompanyRole::AnimationStudio
                } else {
                    CompanyRole::Producer
                };
                let index = registries.companies.insert_primary(Company {
                    slug: String::new(),
                    name: studio.name.trim().to_string(),
                    ids: EntityIds {
                        anilist: Some(studio.id),
                        mal: None,
                    },
                });
                if company_role_allowed(role) {
                    pending
                        .companies
                        .push((work.slug.clone(), EntityRef::Primary(index), role));
                }
            }

            for edge in &member.staff {
                let Some(role) = staff_role(&edge.role) else {
                    continue;
                };
                let index = registries.persons.insert_primary(primary_person(&edge.person));
                pending
                    .staff
                    .push((work.slug.clone(), EntityRef::Primary(index), role));
            }

            for edge in &member.characters {
                let character = registries
                    .characters
                    .insert_primary(primary_character(&edge.character));
                pending
                    .cast
                    .push((work.slug.clone(), EntityRef::Primary(character), edge.role));

                for va in &edge.voice_actors {
                    let person = registries.persons.insert_primary(primary_person(&va.person));
                    pending.voices.push((
                        work.slug.clone(),
                        EntityRef::Primary(person),
                        EntityRef::Primary(character),
                        language_code(va.language.as_deref()),
                    ));
                }
            }
        }
    }
}

fn collect_secondary(
    sources: &FranchiseSources,
    built: &[(&WorkGroup, Vec<&AnilistWork>, Work)],
    registries: &mut Registries,
    pending: &mut PendingCredits,
) {
    let mut persons: BTreeMap<i32, Person> = BTreeMap::new();
    let mut characters: BTreeMap<i32, Character> = BTreeMap::new();
    let mut companies: BTreeMap<i32, Company> = BTreeMap::new();

    let mut mal_works: Vec<&MalWork> = sources.mal.iter().collect();
    mal_works.sort_by_key(|w| w.id);

    for mal in mal_works {
        let Some(slug) = built
            .iter()
            .find(|(_, _, work)| work.ids.mal.contains(&mal.id))
            .map(|(_, _, work)| work.slug.clone())
        else {
            debug!(mal_id = %mal.id, "Alternate catalog entry has no Work, skipping");
            continue;
        };

        let company_roles = [
            (&mal.studios, CompanyRole::AnimationStudio),
            (&mal.producers, CompanyRole::Producer),
            (&mal.licensors, CompanyRole::Licensor),
        ];
        for (refs, role) in company_roles {
            if !company_role_allowed(role) {
                continue;
            }
            for r in refs {
                companies.entry(r.mal_id).or_insert_with(|| mal_company(r));
                pending
                    .companies
                    .push((slug.clone(), EntityRef::Mal(r.mal_id), role));
            }
        }

        for edge in &mal.staff {
            let roles: Vec<String> = edge.positions.iter().filter_map(|p| staff_role(p)).collect();
            if roles.is_empty() {
                continue;
            }
            persons
                .entry(edge.person.mal_id)
                .or_insert_with(|| mal_person(&edge.person));
            for role in roles {
                pending
                    .staff
                    .push((slug.clone(), EntityRef::Mal(edge.person.mal_id), role));
            }
        }

        for edge in &mal.characters {
            let character = edge.character.mal_id;
            characters
                .entry(character)
                .or_insert_with(|| mal_character(&edge.character));
            pending
                .cast
                .push((slug.clone(), EntityRef::Mal(character), edge.role));

            for va in &edge.voice_actors {
                persons
                    .entry(va.person.mal_id)
                    .or_insert_with(|| mal_person(&va.person));
                pending.voices.push((
                    slug.clone(),
                    EntityRef::Mal(va.person.mal_id),
                    EntityRef::Mal(character),
                    language_code(Some(va.language.as_str())),
                ));
            }
        }
    }

    registries.persons.resolve_secondary(persons.into_values());
    registries.characters.resolve_secondary(characters.into_values());
    registries.companies.resolve_secondary(companies.into_values());
}

/// Allocates slugs and turns pending credits into slug-keyed records.
fn finish(registries: Registries, pending: PendingCredits) -> ConsolidatedFranchise {
    let Registries {
        persons,
        characters,
        companies,
    } = registries;

    let mut credits: Vec<(String, usize, String)> = pending
        .staff
        .into_iter()
        .filter_map(|(work, r, role)| Some((work, resolve_ref(&persons, r)?, role)))
        .collect();
    let mut cast: Vec<(String, usize, CharacterRole)> = pending
        .cast
        .into_iter()
        .filter_map(|(work, r, role)| Some((work, resolve_ref(&characters, r)?, role)))
        .collect();
    let mut voices: Vec<(String, usize, usize, String)> = pending
        .voices
        .into_iter()
        .filter_map(|(work, p, c, language)| {
            Some((
                work,
                resolve_ref(&persons, p)?,
                resolve_ref(&characters, c)?,
                language,
            ))
        })
        .collect();
    let mut company_credits: Vec<(String, usize, CompanyRole)> = pending
        .companies
        .into_iter()
        .filter_map(|(work, r, role)| Some((work, resolve_ref(&companies, r)?, role)))
        .collect();

    dedup_by_key(&mut credits, Clone::clone);
    dedup_by_key(&mut cast, |(work, character, _)| (work.clone(), *character));
    dedup_by_key(&mut voices, Clone::clone);
    dedup_by_key(&mut company_credits, Clone::clone);

    let mut persons = persons.into_entities();
    let mut characters = characters.into_entities();
    let mut companies = companies.into_entities();

    let mut slugs = SlugAllocator::new();
    for person in &mut persons {
        person.slug = slugs.allocate(&person.name);
    }
    let mut slugs = SlugAllocator::new();
    for character in &mut characters {
        character.slug = slugs.allocate(&character.name);
    }
    let mut slugs = SlugAllocator::new();
    for company in &mut companies {
        company.slug = slugs.allocate(&company.name);
    }

    ConsolidatedFranchise {
        credits: credits
            .into_iter()
            .map(|(work, person, role)| Credit {
                work,
                person: persons[person].slug.clone(),
                role,
            })
            .collect(),
        cast: cast
            .into_iter()
            .map(|(work, character, role)| CastCredit {
                work,
                character: characters[character].slug.clone(),
                role,
            })
            .collect(),
        voice_roles: voices
            .into_iter()
            .map(|(work, person, character, language)| VoiceRole {
                work,
                person: persons[person].slug.clone(),
                character: characters[character].slug.clone(),
                language,
            })
            .collect(),
        company_credits: company_credits
            .into_iter()
            .map(|(work, company, role)| CompanyCredit {
                work,
                company: companies[company].slug.clone(),
                role,
            })
            .collect(),
        persons,
        characters,
        companies,
        ..ConsolidatedFranchise::default()
    }
}

/// Relationships between distinct Works, from every member's relation edges.
/// Edges inside one consolidated series are dropped.
fn relationships(built: &[(&WorkGroup, Vec<&AnilistWork>, Work)]) -> Vec<Relationship> {
    let slug_of: HashMap<AnilistId, &str> = built
        .iter()
        .flat_map(|(group, _, work)| group.members.iter().map(|id| (*id, work.slug.as_str())))
        .collect();

    let mut edges: Vec<Relationship> = built
        .iter()
        .flat_map(|(_, members, work)| {
            let slug_of = &slug_of;
            members.iter().flat_map(move |member| {
                member.relations.iter().filter_map(move |edge| {
                    let kind = RelationshipKind::from_relation(edge.relation_type)?;
                    let target = *slug_of.get(&edge.id)?;
                    (target != work.slug).then(|| Relationship {
                        source: work.slug.clone(),
                        target: target.to_string(),
                        kind,
                    })
                })
            })
        })
        .collect();

    dedup_by_key(&mut edges, Clone::clone);
    edges
}
