use crate::domain::{AnilistId, MalId, SourceIds};
use crate::models::source::{CharacterRole, MediaFormat, RelationType, SourceStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Media type of a canonical Work, as the downstream schema names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Anime,
    Movie,
    Ova,
    Ona,
    Special,
    Music,
    Manga,
    LightNovel,
}

impl MediaType {
    #[must_use]
    pub const fn from_format(format: Option<MediaFormat>) -> Self {
        match format {
            Some(MediaFormat::Movie) => Self::Movie,
            Some(MediaFormat::Ova) => Self::Ova,
            Some(MediaFormat::Ona) => Self::Ona,
            Some(MediaFormat::Special) => Self::Special,
            Some(MediaFormat::Music) => Self::Music,
            Some(MediaFormat::Manga | MediaFormat::OneShot) => Self::Manga,
            Some(MediaFormat::Novel) => Self::LightNovel,
            Some(MediaFormat::Tv | MediaFormat::TvShort) | None => Self::Anime,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::Movie => "movie",
            Self::Ova => "ova",
            Self::Ona => "ona",
            Self::Special => "special",
            Self::Music => "music",
            Self::Manga => "manga",
            Self::LightNovel => "light_novel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Releasing,
    #[default]
    Released,
    Announced,
    Cancelled,
    Hiatus,
}

impl WorkStatus {
    /// Unknown statuses are treated as released.
    #[must_use]
    pub const fn from_source(status: Option<SourceStatus>) -> Self {
        match status {
            Some(SourceStatus::Releasing) => Self::Releasing,
            Some(SourceStatus::NotYetReleased) => Self::Announced,
            Some(SourceStatus::Cancelled) => Self::Cancelled,
            Some(SourceStatus::Hiatus) => Self::Hiatus,
            Some(SourceStatus::Finished) | None => Self::Released,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Releasing => "releasing",
            Self::Released => "released",
            Self::Announced => "announced",
            Self::Cancelled => "cancelled",
            Self::Hiatus => "hiatus",
        }
    }
}

/// A numbered subdivision of a consolidated Work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub number: u32,
    pub title: Option<String>,
    pub episode_count: Option<u32>,
    pub air_date_start: Option<NaiveDate>,
    pub air_date_end: Option<NaiveDate>,
    pub anilist_id: AnilistId,
    pub mal_id: Option<MalId>,
    /// Authoritative season this entry was reconciled to. `None` means the
    /// boundaries come from title grouping alone.
    pub tvdb_season: Option<u32>,
}

impl Season {
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.tvdb_season.is_some()
    }
}

/// One canonical conceptual release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub slug: String,
    pub title: String,
    pub title_native: Option<String>,
    pub alternate_titles: Vec<String>,
    pub media_type: MediaType,
    pub format: Option<MediaFormat>,
    pub ids: SourceIds,
    pub status: WorkStatus,
    pub release_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub episode_count: Option<u32>,
    pub chapter_count: Option<u32>,
    pub volume_count: Option<u32>,
    pub source_material: Option<String>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub consolidated: bool,
    pub seasons: Vec<Season>,
}

/// External IDs of a person, character or company.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIds {
    pub anilist: Option<i32>,
    pub mal: Option<i32>,
}

impl EntityIds {
    pub const fn fill_from(&mut self, other: Self) {
        if self.anilist.is_none() {
            self.anilist = other.anilist;
        }
        if self.mal.is_none() {
            self.mal = other.mal;
        }
    }

    /// Seen in both catalogs.
    #[must_use]
    pub const fn is_cross_referenced(&self) -> bool {
        self.anilist.is_some() && self.mal.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub slug: String,
    pub name: String,
    pub native_name: Option<String>,
    pub description: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub occupations: Vec<String>,
    pub ids: EntityIds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub slug: String,
    pub name: String,
    pub native_name: Option<String>,
    pub alternate_names: Vec<String>,
    pub description: Option<String>,
    pub ids: EntityIds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyRole {
    AnimationStudio,
    Producer,
    Licensor,
}

impl CompanyRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AnimationStudio => "animation_studio",
            Self::Producer => "producer",
            Self::Licensor => "licensor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub slug: String,
    pub name: String,
    pub ids: EntityIds,
}

/// Staff credit on a Work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credit {
    pub work: String,
    pub person: String,
    pub role: String,
}

/// Character appearing in a Work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CastCredit {
    pub work: String,
    pub character: String,
    pub role: CharacterRole,
}

/// A person voicing a character in a Work, in one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceRole {
    pub work: String,
    pub person: String,
    pub character: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyCredit {
    pub work: String,
    pub company: String,
    pub role: CompanyRole,
}

/// Relationship kind between two Works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Sequel,
    Prequel,
    Parent,
    SideStory,
    Alternative,
    Adaptation,
    Source,
    Summary,
    Compilation,
    SpinOff,
}

impl RelationshipKind {
    /// `None` for edge types that never become relationships.
    #[must_use]
    pub const fn from_relation(relation: RelationType) -> Option<Self> {
        match relation {
            RelationType::Sequel => Some(Self::Sequel),
            RelationType::Prequel => Some(Self::Prequel),
            RelationType::Parent => Some(Self::Parent),
            RelationType::SideStory => Some(Self::SideStory),
            RelationType::Alternative => Some(Self::Alternative),
            RelationType::Adaptation => Some(Self::Adaptation),
            RelationType::Source => Some(Self::Source),
            RelationType::Summary => Some(Self::Summary),
            RelationType::Compilation => Some(Self::Compilation),
            RelationType::SpinOff => Some(Self::SpinOff),
            RelationType::Character | RelationType::Contains | RelationType::Other => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequel => "sequel",
            Self::Prequel => "prequel",
            Self::Parent => "parent",
            Self::SideStory => "side_story",
            Self::Alternative => "alternative",
            Self::Adaptation => "adaptation",
            Self::Source => "source",
            Self::Summary => "summary",
            Self::Compilation => "compilation",
            Self::SpinOff => "spin_off",
        }
    }

    #[must_use]
    pub const fn is_continuation(self) -> bool {
        matches!(self, Self::Sequel | Self::Prequel)
    }
}

/// Directed edge between two distinct Works.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub kind: RelationshipKind,
}

/// The fully resolved record graph for one franchise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedFranchise {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub works: Vec<Work>,
    pub persons: Vec<Person>,
    pub characters: Vec<Character>,
    pub companies: Vec<Company>,
    pub credits: Vec<Credit>,
    pub cast: Vec<CastCredit>,
    pub voice_roles: Vec<VoiceRole>,
    pub company_credits: Vec<CompanyCredit>,
    pub relationships: Vec<Relationship>,
}

impl ConsolidatedFranchise {
    #[must_use]
    pub fn work(&self, slug: &str) -> Option<&Work> {
        self.works.iter().find(|w| w.slug == slug)
    }

    /// Slug of the Work that absorbed the given catalog entry.
    #[must_use]
    pub fn work_for(&self, id: AnilistId) -> Option<&str> {
        self.works
            .iter()
            .find(|w| w.ids.contains_anilist(id))
            .map(|w| w.slug.as_str())
    }

    /// Seasons that were never reconciled against the episode database.
    pub fn unverified_seasons(&self) -> impl Iterator<Item = (&Work, &Season)> {
        self.works
            .iter()
            .flat_map(|w| w.seasons.iter().map(move |s| (w, s)))
            .filter(|(_, s)| !s.is_verified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_format() {
        assert_eq!(MediaType::from_format(Some(MediaFormat::TvShort)), MediaType::Anime);
        assert_eq!(MediaType::from_format(Some(MediaFormat::OneShot)), MediaType::Manga);
        assert_eq!(MediaType::from_format(Some(MediaFormat::Novel)).as_str(), "light_novel");
        assert_eq!(MediaType::from_format(None), MediaType::Anime);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(WorkStatus::from_source(Some(SourceStatus::Finished)).as_str(), "released");
        assert_eq!(
            WorkStatus::from_source(Some(SourceStatus::NotYetReleased)).as_str(),
            "announced"
        );
        assert_eq!(WorkStatus::from_source(None), WorkStatus::Released);
    }

    #[test]
    fn test_relationship_kind_skips_other() {
        assert_eq!(
            RelationshipKind::from_relation(RelationType::SideStory).map(RelationshipKind::as_str),
            Some("side_story")
        );
        assert!(RelationshipKind::from_relation(RelationType::Character).is_none());
        assert!(RelationshipKind::from_relation(RelationType::Other).is_none());
        assert!(RelationshipKind::Prequel.is_continuation());
    }

    #[test]
    fn test_entity_ids_fill_keeps_first() {
        let mut ids = EntityIds {
            anilist: Some(1),
            mal: None,
        };
        ids.fill_from(EntityIds {
            anilist: Some(2),
            mal: Some(3),
        });
        assert_eq!(ids.anilist, Some(1));
        assert_eq!(ids.mal, Some(3));
        assert!(ids.is_cross_referenced());
    }
}
