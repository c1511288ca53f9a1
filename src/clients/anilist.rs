use crate::clients::catalog::{CatalogError, MediaCatalog};
use crate::clients::rate_limit::Throttle;
use crate::config::AnilistConfig;
use crate::constants::USER_AGENT;
use crate::domain::{AnilistId, MalId, MetadataProvider};
use crate::models::source::{
    AnilistWork, CandidateSummary, CharacterEdge, CharacterRole, MediaFormat, MediaKind,
    RelationEdge, RelationType, SourceCharacter, SourcePerson, SourceStatus, SourceStudio,
    SourceTag, StaffEdge, Titles, VoiceActorEdge,
};
use crate::parser::text::fuzzy_date;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const SEARCH_QUERY: &str = r"
    query ($search: String) {
        Page(page: 1, perPage: 10) {
            media(search: $search, type: ANIME, sort: POPULARITY_DESC) {
                id
                title { romaji english native }
                format
                episodes
                startDate { year month day }
            }
        }
    }
";

const WORK_QUERY: &str = r"
    query ($id: Int) {
        Media(id: $id) {
            id
            idMal
            title { romaji english native }
            synonyms
            type
            format
            status
            startDate { year month day }
            endDate { year month day }
            episodes
            chapters
            volumes
            source
            description(asHtml: false)
            genres
            tags { name rank isMediaSpoiler }
            studios { nodes { id name isAnimationStudio } }
            staff(perPage: 25) {
                edges {
                    role
                    node {
                        id
                        name { full native }
                        description
                        dateOfBirth { year month day }
                        dateOfDeath { year month day }
                        primaryOccupations
                    }
                }
            }
            characters(sort: FAVOURITES_DESC, perPage: 25) {
                edges {
                    role
                    node { id name { full native alternative } description }
                    voiceActors {
                        id
                        name { full native }
                        languageV2
                    }
                }
            }
            relations {
                edges {
                    relationType
                    node { id type format title { romaji english native } }
                }
            }
        }
    }
";

#[derive(Serialize)]
struct GraphQLRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Serialize)]
struct SearchVariables<'a> {
    search: &'a str,
}

#[derive(Serialize)]
struct IdVariables {
    id: i32,
}

#[derive(Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Deserialize)]
struct Page {
    media: Vec<SearchMedia>,
}

#[derive(Deserialize)]
struct WorkData {
    #[serde(rename = "Media")]
    media: Option<Media>,
}

#[derive(Deserialize)]
struct FuzzyDate {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

fn to_date(date: Option<&FuzzyDate>) -> Option<NaiveDate> {
    date.and_then(|d| fuzzy_date(d.year, d.month, d.day))
}

#[derive(Deserialize)]
struct Title {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

impl From<Title> for Titles {
    fn from(t: Title) -> Self {
        Self {
            romaji: t.romaji,
            english: t.english,
            native: t.native,
        }
    }
}

#[derive(Deserialize)]
struct SearchMedia {
    id: i32,
    title: Title,
    format: Option<String>,
    episodes: Option<u32>,
    #[serde(rename = "startDate")]
    start_date: Option<FuzzyDate>,
}

#[derive(Deserialize)]
struct Media {
    id: i32,
    #[serde(rename = "idMal")]
    id_mal: Option<i32>,
    title: Title,
    synonyms: Option<Vec<String>>,
    #[serde(rename = "type")]
    media_type: Option<String>,
    format: Option<String>,
    status: Option<String>,
    #[serde(rename = "startDate")]
    start_date: Option<FuzzyDate>,
    #[serde(rename = "endDate")]
    end_date: Option<FuzzyDate>,
    episodes: Option<u32>,
    chapters: Option<u32>,
    volumes: Option<u32>,
    source: Option<String>,
    description: Option<String>,
    genres: Option<Vec<String>>,
    tags: Option<Vec<Tag>>,
    studios: Option<Connection<StudioNode>>,
    staff: Option<EdgeConnection<StaffEdgeWire>>,
    characters: Option<EdgeConnection<CharacterEdgeWire>>,
    relations: Option<EdgeConnection<RelationEdgeWire>>,
}

#[derive(Deserialize)]
struct Connection<T> {
    nodes: Vec<T>,
}

#[derive(Deserialize)]
struct EdgeConnection<T> {
    edges: Vec<T>,
}

#[derive(Deserialize)]
struct Tag {
    name: String,
    rank: Option<u32>,
    #[serde(rename = "isMediaSpoiler")]
    is_media_spoiler: Option<bool>,
}

#[derive(Deserialize)]
struct StudioNode {
    id: i32,
    name: String,
    #[serde(rename = "isAnimationStudio")]
    is_animation_studio: bool,
}

#[derive(Deserialize)]
struct Name {
    full: Option<String>,
    native: Option<String>,
    alternative: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct StaffNode {
    id: i32,
    name: Name,
    description: Option<String>,
    #[serde(rename = "dateOfBirth")]
    date_of_birth: Option<FuzzyDate>,
    #[serde(rename = "dateOfDeath")]
    date_of_death: Option<FuzzyDate>,
    #[serde(rename = "primaryOccupations")]
    primary_occupations: Option<Vec<String>>,
}

impl From<StaffNode> for SourcePerson {
    fn from(node: StaffNode) -> Self {
        Self {
            id: node.id,
            name: node.name.full.unwrap_or_default(),
            native_name: node.name.native,
            description: node.description,
            birth_date: to_date(node.date_of_birth.as_ref()),
            death_date: to_date(node.date_of_death.as_ref()),
            occupations: node.primary_occupations.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct StaffEdgeWire {
    role: Option<String>,
    node: StaffNode,
}

#[derive(Deserialize)]
struct VoiceActorNode {
    id: i32,
    name: Name,
    #[serde(rename = "languageV2")]
    language: Option<String>,
}

#[derive(Deserialize)]
struct CharacterNode {
    id: i32,
    name: Name,
    description: Option<String>,
}

#[derive(Deserialize)]
struct CharacterEdgeWire {
    role: Option<String>,
    node: CharacterNode,
    #[serde(rename = "voiceActors")]
    voice_actors: Option<Vec<VoiceActorNode>>,
}

#[derive(Deserialize)]
struct RelationNode {
    id: i32,
    #[serde(rename = "type")]
    media_type: Option<String>,
    format: Option<String>,
    title: Title,
}

#[derive(Deserialize)]
struct RelationEdgeWire {
    #[serde(rename = "relationType")]
    relation_type: Option<String>,
    node: RelationNode,
}

fn parse_kind(value: Option<&str>) -> MediaKind {
    match value {
        Some("MANGA") => MediaKind::Manga,
        _ => MediaKind::Anime,
    }
}

impl From<Media> for AnilistWork {
    fn from(m: Media) -> Self {
        let tags = m
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| SourceTag {
                name: t.name,
                rank: t.rank.unwrap_or_default(),
                is_spoiler: t.is_media_spoiler.unwrap_or_default(),
            })
            .collect();

        let studios = m
            .studios
            .map(|s| s.nodes)
            .unwrap_or_default()
            .into_iter()
            .map(|s| SourceStudio {
                id: s.id,
                name: s.name,
                is_animation_studio: s.is_animation_studio,
            })
            .collect();

        let staff = m
            .staff
            .map(|s| s.edges)
            .unwrap_or_default()
            .into_iter()
            .map(|e| StaffEdge {
                role: e.role.unwrap_or_default(),
                person: e.node.into(),
            })
            .collect();

        let characters = m
            .characters
            .map(|c| c.edges)
            .unwrap_or_default()
            .into_iter()
            .map(|e| CharacterEdge {
                role: CharacterRole::parse(e.role.as_deref()),
                character: SourceCharacter {
                    id: e.node.id,
                    name: e.node.name.full.unwrap_or_default(),
                    native_name: e.node.name.native,
                    alternative_names: e.node.name.alternative.unwrap_or_default(),
                    description: e.node.description,
                },
                voice_actors: e
                    .voice_actors
                    .unwrap_or_default()
                    .into_iter()
                    .map(|va| VoiceActorEdge {
                        person: SourcePerson {
                            id: va.id,
                            name: va.name.full.unwrap_or_default(),
                            native_name: va.name.native,
                            description: None,
                            birth_date: None,
                            death_date: None,
                            occupations: Vec::new(),
                        },
                        language: va.language,
                    })
                    .collect(),
            })
            .collect();

        let relations = m
            .relations
            .map(|r| r.edges)
            .unwrap_or_default()
            .into_iter()
            .map(|e| RelationEdge {
                relation_type: e
                    .relation_type
                    .as_deref()
                    .map_or(RelationType::Other, RelationType::parse),
                id: AnilistId::new(e.node.id),
                kind: parse_kind(e.node.media_type.as_deref()),
                format: e.node.format.as_deref().and_then(MediaFormat::parse),
                titles: e.node.title.into(),
            })
            .collect();

        Self {
            id: AnilistId::new(m.id),
            mal_id: m.id_mal.map(MalId::new),
            titles: m.title.into(),
            synonyms: m.synonyms.unwrap_or_default(),
            kind: parse_kind(m.media_type.as_deref()),
            format: m.format.as_deref().and_then(MediaFormat::parse),
            status: m.status.as_deref().and_then(SourceStatus::parse),
            start_date: to_date(m.start_date.as_ref()),
            end_date: to_date(m.end_date.as_ref()),
            episodes: m.episodes,
            chapters: m.chapters,
            volumes: m.volumes,
            source_material: m.source,
            description: m.description,
            genres: m.genres.unwrap_or_default(),
            tags,
            studios,
            staff,
            characters,
            relations,
        }
    }
}

#[derive(Clone)]
pub struct AnilistClient {
    client: Client,
    base_url: String,
    throttle: Arc<Throttle>,
}

impl Default for AnilistClient {
    fn default() -> Self {
        Self::new(&AnilistConfig::default())
    }
}

impl AnilistClient {
    #[must_use]
    pub fn new(config: &AnilistConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(config.request_timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.base_url.clone(),
            throttle: Arc::new(Throttle::new(MetadataProvider::Anilist, config.rate_limit())),
        }
    }

    async fn post<V, T>(&self, query: &str, variables: V) -> Result<Option<T>, CatalogError>
    where
        V: Serialize + Send + Sync,
        T: DeserializeOwned,
    {
        let request_body = GraphQLRequest { query, variables };

        let response = self
            .throttle
            .send(|| self.client.post(&self.base_url).json(&request_body))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                service: MetadataProvider::Anilist,
                status: status.as_u16(),
                body,
            });
        }

        let response: GraphQLResponse<T> =
            response.json().await.map_err(|e| CatalogError::Decode {
                service: MetadataProvider::Anilist,
                message: e.to_string(),
            })?;

        Ok(response.data)
    }
}

#[async_trait::async_trait]
impl MediaCatalog for AnilistClient {
    #[instrument(skip(self))]
    async fn search(&self, title: &str) -> Result<Vec<CandidateSummary>, CatalogError> {
        let data: Option<SearchData> = self
            .post(SEARCH_QUERY, SearchVariables { search: title })
            .await?;

        let candidates: Vec<CandidateSummary> = data
            .map(|d| d.page.media)
            .unwrap_or_default()
            .into_iter()
            .map(|m| CandidateSummary {
                id: AnilistId::new(m.id),
                titles: m.title.into(),
                format: m.format.as_deref().and_then(MediaFormat::parse),
                start_date: to_date(m.start_date.as_ref()),
                episodes: m.episodes,
            })
            .collect();

        debug!(count = candidates.len(), "AniList search finished");
        Ok(candidates)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn fetch_work(&self, id: AnilistId) -> Result<Option<AnilistWork>, CatalogError> {
        let data: Option<WorkData> = self
            .post(WORK_QUERY, IdVariables { id: id.value() })
            .await?;

        Ok(data.and_then(|d| d.media).map(AnilistWork::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_payload_mapping() {
        let payload = r#"{
            "data": {
                "Media": {
                    "id": 101922,
                    "idMal": 38000,
                    "title": { "romaji": "Kimetsu no Yaiba", "english": "Demon Slayer: Kimetsu no Yaiba", "native": null },
                    "synonyms": ["KnY"],
                    "type": "ANIME",
                    "format": "TV",
                    "status": "FINISHED",
                    "startDate": { "year": 2019, "month": 4, "day": 6 },
                    "endDate": { "year": 2019, "month": 9, "day": null },
                    "episodes": 26,
                    "genres": ["Action"],
                    "tags": [{ "name": "Demons", "rank": 91, "isMediaSpoiler": false }],
                    "studios": { "nodes": [{ "id": 43, "name": "ufotable", "isAnimationStudio": true }] },
                    "staff": { "edges": [{ "role": "Director", "node": { "id": 1, "name": { "full": "Haruo Sotozaki", "native": null }, "primaryOccupations": null } }] },
                    "characters": { "edges": [{
                        "role": "MAIN",
                        "node": { "id": 126071, "name": { "full": "Tanjiro Kamado", "native": null, "alternative": [] } },
                        "voiceActors": [{ "id": 95991, "name": { "full": "Natsuki Hanae", "native": null }, "languageV2": "Japanese" }]
                    }] },
                    "relations": { "edges": [{
                        "relationType": "SEQUEL",
                        "node": { "id": 112151, "type": "ANIME", "format": "MOVIE", "title": { "romaji": "Mugen Ressha-hen" } }
                    }] }
                }
            }
        }"#;

        let response: GraphQLResponse<WorkData> = serde_json::from_str(payload).unwrap();
        let work = AnilistWork::from(response.data.unwrap().media.unwrap());

        assert_eq!(work.id, AnilistId::new(101922));
        assert_eq!(work.mal_id, Some(MalId::new(38000)));
        assert_eq!(work.format, Some(MediaFormat::Tv));
        assert_eq!(work.end_date, NaiveDate::from_ymd_opt(2019, 9, 1));
        assert_eq!(work.tags[0].rank, 91);
        assert!(work.studios[0].is_animation_studio);
        assert_eq!(work.staff[0].role, "Director");
        assert_eq!(work.characters[0].role, CharacterRole::Main);
        assert_eq!(
            work.characters[0].voice_actors[0].language.as_deref(),
            Some("Japanese")
        );
        assert_eq!(work.relations[0].relation_type, RelationType::Sequel);
        assert_eq!(work.relations[0].format, Some(MediaFormat::Movie));
    }

    #[test]
    fn test_missing_media_is_absent() {
        let payload = r#"{ "data": { "Media": null } }"#;
        let response: GraphQLResponse<WorkData> = serde_json::from_str(payload).unwrap();
        assert!(response.data.and_then(|d| d.media).is_none());
    }
}
