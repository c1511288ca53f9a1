//! Typed raw records, one family per catalog.
//!
//! Clients decode each catalog's JSON into private wire structs and map them
//! onto these types. The resolution core only ever sees these shapes, so a
//! missing field is an `Option` or an empty `Vec` here rather than a lookup
//! that silently yields nothing.

use crate::consolidate::NodeRecord;
use crate::domain::{AnilistId, MalId, TvdbId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Declared release format in the GraphQL catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaFormat {
    Tv,
    TvShort,
    Movie,
    Special,
    Ova,
    Ona,
    Music,
    Manga,
    Novel,
    OneShot,
}

impl MediaFormat {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TV" => Some(Self::Tv),
            "TV_SHORT" => Some(Self::TvShort),
            "MOVIE" => Some(Self::Movie),
            "SPECIAL" => Some(Self::Special),
            "OVA" => Some(Self::Ova),
            "ONA" => Some(Self::Ona),
            "MUSIC" => Some(Self::Music),
            "MANGA" => Some(Self::Manga),
            "NOVEL" | "LIGHT NOVEL" => Some(Self::Novel),
            "ONE_SHOT" => Some(Self::OneShot),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tv => "TV",
            Self::TvShort => "TV_SHORT",
            Self::Movie => "MOVIE",
            Self::Special => "SPECIAL",
            Self::Ova => "OVA",
            Self::Ona => "ONA",
            Self::Music => "MUSIC",
            Self::Manga => "MANGA",
            Self::Novel => "NOVEL",
            Self::OneShot => "ONE_SHOT",
        }
    }

    /// Primary broadcast formats, the only ones that become seasons.
    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        matches!(self, Self::Tv | Self::TvShort)
    }
}

/// Top-level media type in the GraphQL catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaKind {
    #[default]
    Anime,
    Manga,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceStatus {
    Releasing,
    Finished,
    NotYetReleased,
    Cancelled,
    Hiatus,
}

impl SourceStatus {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RELEASING" => Some(Self::Releasing),
            "FINISHED" => Some(Self::Finished),
            "NOT_YET_RELEASED" => Some(Self::NotYetReleased),
            "CANCELLED" => Some(Self::Cancelled),
            "HIATUS" => Some(Self::Hiatus),
            _ => None,
        }
    }
}

/// Relation edge type declared by the GraphQL catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Sequel,
    Prequel,
    Parent,
    SideStory,
    Alternative,
    Adaptation,
    Source,
    Summary,
    Compilation,
    Character,
    Contains,
    SpinOff,
    Other,
}

impl RelationType {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "SEQUEL" => Self::Sequel,
            "PREQUEL" => Self::Prequel,
            "PARENT" => Self::Parent,
            "SIDE_STORY" => Self::SideStory,
            "ALTERNATIVE" => Self::Alternative,
            "ADAPTATION" => Self::Adaptation,
            "SOURCE" => Self::Source,
            "SUMMARY" => Self::Summary,
            "COMPILATION" => Self::Compilation,
            "CHARACTER" => Self::Character,
            "CONTAINS" => Self::Contains,
            "SPIN_OFF" => Self::SpinOff,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterRole {
    Main,
    #[default]
    Supporting,
}

impl CharacterRole {
    /// `MAIN` / `Main` are main roles, everything else is supporting.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("main") => Self::Main,
            _ => Self::Supporting,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Supporting => "supporting",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Titles {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

impl Titles {
    /// English title, falling back to romaji.
    #[must_use]
    pub fn preferred(&self) -> &str {
        self.english
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.romaji.as_deref())
            .unwrap_or_default()
    }

    /// Every non-empty title, English first.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        [&self.english, &self.romaji, &self.native]
            .into_iter()
            .filter_map(|t| t.as_deref())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTag {
    pub name: String,
    pub rank: u32,
    pub is_spoiler: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStudio {
    pub id: i32,
    pub name: String,
    pub is_animation_studio: bool,
}

/// A person as one catalog describes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePerson {
    pub id: i32,
    pub name: String,
    pub native_name: Option<String>,
    pub description: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    #[serde(default)]
    pub occupations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffEdge {
    pub role: String,
    pub person: SourcePerson,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCharacter {
    pub id: i32,
    pub name: String,
    pub native_name: Option<String>,
    #[serde(default)]
    pub alternative_names: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceActorEdge {
    pub person: SourcePerson,
    /// Catalog language name, for example `Japanese`.
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterEdge {
    pub role: CharacterRole,
    pub character: SourceCharacter,
    #[serde(default)]
    pub voice_actors: Vec<VoiceActorEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub relation_type: RelationType,
    pub id: AnilistId,
    pub kind: MediaKind,
    pub format: Option<MediaFormat>,
    pub titles: Titles,
}

/// One media record from the GraphQL catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnilistWork {
    pub id: AnilistId,
    pub mal_id: Option<MalId>,
    pub titles: Titles,
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub kind: MediaKind,
    pub format: Option<MediaFormat>,
    pub status: Option<SourceStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub episodes: Option<u32>,
    pub chapters: Option<u32>,
    pub volumes: Option<u32>,
    pub source_material: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<SourceTag>,
    #[serde(default)]
    pub studios: Vec<SourceStudio>,
    #[serde(default)]
    pub staff: Vec<StaffEdge>,
    #[serde(default)]
    pub characters: Vec<CharacterEdge>,
    #[serde(default)]
    pub relations: Vec<RelationEdge>,
}

impl AnilistWork {
    /// Display title: English, else romaji.
    #[must_use]
    pub fn title(&self) -> &str {
        self.titles.preferred()
    }

    /// Titles plus synonyms, for fuzzy franchise checks.
    #[must_use]
    pub fn all_titles(&self) -> Vec<&str> {
        self.titles
            .all()
            .chain(self.synonyms.iter().map(String::as_str))
            .collect()
    }
}

/// Summary row returned by a catalog search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: AnilistId,
    pub titles: Titles,
    pub format: Option<MediaFormat>,
    pub start_date: Option<NaiveDate>,
    pub episodes: Option<u32>,
}

/// A person or company reference in the REST catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalRef {
    pub mal_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalVoiceActor {
    pub person: MalRef,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalCharacterEdge {
    pub character: MalRef,
    pub role: CharacterRole,
    #[serde(default)]
    pub voice_actors: Vec<MalVoiceActor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalStaffEdge {
    pub person: MalRef,
    #[serde(default)]
    pub positions: Vec<String>,
}

/// One anime record from the REST catalog, with its cast and staff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalWork {
    pub id: MalId,
    pub title: String,
    pub title_english: Option<String>,
    pub title_japanese: Option<String>,
    pub format: Option<MediaFormat>,
    pub episodes: Option<u32>,
    pub aired_from: Option<NaiveDate>,
    pub aired_to: Option<NaiveDate>,
    #[serde(default)]
    pub studios: Vec<MalRef>,
    #[serde(default)]
    pub producers: Vec<MalRef>,
    #[serde(default)]
    pub licensors: Vec<MalRef>,
    #[serde(default)]
    pub characters: Vec<MalCharacterEdge>,
    #[serde(default)]
    pub staff: Vec<MalStaffEdge>,
}

/// Ordering a TVDB season belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonOrder {
    Aired,
    Dvd,
    Absolute,
    Other,
}

impl SeasonOrder {
    /// TVDB season-type ids: 1 aired, 2 dvd, 3 absolute.
    #[must_use]
    pub const fn from_type_id(id: i32) -> Self {
        match id {
            1 => Self::Aired,
            2 => Self::Dvd,
            3 => Self::Absolute,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvdbSeason {
    pub id: i32,
    pub number: u32,
    pub name: Option<String>,
    pub order: SeasonOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvdbEpisode {
    pub season_number: u32,
    pub number: u32,
    pub aired: Option<NaiveDate>,
}

/// Season and episode structure of one TVDB series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvdbSeries {
    pub id: TvdbId,
    pub name: String,
    pub year: Option<i32>,
    pub first_aired: Option<NaiveDate>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub seasons: Vec<TvdbSeason>,
    #[serde(default)]
    pub episodes: Vec<TvdbEpisode>,
}

/// Search hit from the episode database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvdbCandidate {
    pub id: TvdbId,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub year: Option<i32>,
    pub first_aired: Option<NaiveDate>,
    pub is_movie: bool,
}

/// Episode-database series picked for the series Work that contains
/// `anilist_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvdbLink {
    pub anilist_id: AnilistId,
    pub tvdb_id: TvdbId,
}

/// Everything fetched for one franchise run.
///
/// Stored on disk after a fetch so resolution can be re-run offline. Building
/// records from the same sources always gives the same output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FranchiseSources {
    pub slug: String,
    pub name: String,
    pub root: AnilistId,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    pub anilist: Vec<AnilistWork>,
    #[serde(default)]
    pub mal: Vec<MalWork>,
    #[serde(default)]
    pub tvdb: Vec<TvdbSeries>,
    #[serde(default)]
    pub tvdb_links: Vec<TvdbLink>,
    /// Traversal outcome for every node the crawl queued.
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}

impl FranchiseSources {
    #[must_use]
    pub fn anilist_work(&self, id: AnilistId) -> Option<&AnilistWork> {
        self.anilist.iter().find(|w| w.id == id)
    }

    #[must_use]
    pub fn mal_work(&self, id: MalId) -> Option<&MalWork> {
        self.mal.iter().find(|w| w.id == id)
    }

    #[must_use]
    pub fn tvdb_series(&self, id: TvdbId) -> Option<&TvdbSeries> {
        self.tvdb.iter().find(|s| s.id == id)
    }
}
