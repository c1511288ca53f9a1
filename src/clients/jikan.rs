use crate::clients::catalog::{AltCatalog, CatalogError};
use crate::clients::rate_limit::Throttle;
use crate::config::JikanConfig;
use crate::constants::USER_AGENT;
use crate::domain::{MalId, MetadataProvider};
use crate::matching::temporal::parse_date;
use crate::models::source::{
    CharacterRole, MalCharacterEdge, MalRef, MalStaffEdge, MalVoiceActor, MalWork, MediaFormat,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct JikanResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct MalAnime {
    mal_id: i32,
    title: String,
    title_english: Option<String>,
    title_japanese: Option<String>,
    #[serde(rename = "type")]
    anime_type: Option<String>,
    episodes: Option<u32>,
    aired: Option<Aired>,
    studios: Option<Vec<MalGenericInfo>>,
    producers: Option<Vec<MalGenericInfo>>,
    licensors: Option<Vec<MalGenericInfo>>,
}

#[derive(Debug, Deserialize)]
struct Aired {
    from: Option<String>,
    to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MalGenericInfo {
    mal_id: i32,
    name: String,
}

impl From<MalGenericInfo> for MalRef {
    fn from(info: MalGenericInfo) -> Self {
        Self {
            mal_id: info.mal_id,
            name: info.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MalCharacterEntry {
    character: MalGenericInfo,
    role: Option<String>,
    #[serde(default)]
    voice_actors: Vec<MalVoiceActorEntry>,
}

#[derive(Debug, Deserialize)]
struct MalVoiceActorEntry {
    person: MalGenericInfo,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MalStaffEntry {
    person: MalGenericInfo,
    #[serde(default)]
    positions: Vec<String>,
}

fn parse_format(value: &str) -> Option<MediaFormat> {
    match value {
        "TV Special" => Some(MediaFormat::Special),
        other => MediaFormat::parse(other),
    }
}

fn refs(list: Option<Vec<MalGenericInfo>>) -> Vec<MalRef> {
    list.unwrap_or_default().into_iter().map(MalRef::from).collect()
}

fn build_work(
    anime: MalAnime,
    characters: Vec<MalCharacterEntry>,
    staff: Vec<MalStaffEntry>,
) -> MalWork {
    let (aired_from, aired_to) = anime.aired.map_or((None, None), |a| {
        (
            a.from.as_deref().and_then(parse_date),
            a.to.as_deref().and_then(parse_date),
        )
    });

    MalWork {
        id: MalId::new(anime.mal_id),
        title: anime.title,
        title_english: anime.title_english,
        title_japanese: anime.title_japanese,
        format: anime.anime_type.as_deref().and_then(parse_format),
        episodes: anime.episodes,
        aired_from,
        aired_to,
        studios: refs(anime.studios),
        producers: refs(anime.producers),
        licensors: refs(anime.licensors),
        characters: characters
            .into_iter()
            .map(|c| MalCharacterEdge {
                character: c.character.into(),
                role: CharacterRole::parse(c.role.as_deref()),
                voice_actors: c
                    .voice_actors
                    .into_iter()
                    .map(|va| MalVoiceActor {
                        person: va.person.into(),
                        language: va.language.unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect(),
        staff: staff
            .into_iter()
            .map(|s| MalStaffEdge {
                person: s.person.into(),
                positions: s.positions,
            })
            .collect(),
    }
}

#[derive(Clone)]
pub struct JikanClient {
    client: Client,
    base_url: String,
    throttle: Arc<Throttle>,
}

impl Default for JikanClient {
    fn default() -> Self {
        Self::new(&JikanConfig::default())
    }
}

impl JikanClient {
    #[must_use]
    pub fn new(config: &JikanConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(config.request_timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            throttle: Arc::new(Throttle::new(MetadataProvider::Jikan, config.rate_limit())),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.throttle.send(|| self.client.get(&url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                service: MetadataProvider::Jikan,
                status: status.as_u16(),
                body,
            });
        }

        let response: JikanResponse<T> =
            response.json().await.map_err(|e| CatalogError::Decode {
                service: MetadataProvider::Jikan,
                message: e.to_string(),
            })?;

        Ok(Some(response.data))
    }
}

#[async_trait::async_trait]
impl AltCatalog for JikanClient {
    #[instrument(skip(self), fields(id = %id))]
    async fn fetch_work(&self, id: MalId) -> Result<Option<MalWork>, CatalogError> {
        let Some(anime) = self
            .get::<MalAnime>(&format!("/anime/{id}/full"))
            .await?
        else {
            return Ok(None);
        };

        let characters: Vec<MalCharacterEntry> = self
            .get(&format!("/anime/{id}/characters"))
            .await?
            .unwrap_or_default();
        let staff: Vec<MalStaffEntry> = self
            .get(&format!("/anime/{id}/staff"))
            .await?
            .unwrap_or_default();

        debug!(
            characters = characters.len(),
            staff = staff.len(),
            "Fetched Jikan entry"
        );

        Ok(Some(build_work(anime, characters, staff)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_build_work_from_payloads() {
        let anime: JikanResponse<MalAnime> = serde_json::from_str(
            r#"{ "data": {
                "mal_id": 38000,
                "title": "Kimetsu no Yaiba",
                "title_english": "Demon Slayer: Kimetsu no Yaiba",
                "type": "TV",
                "episodes": 26,
                "aired": { "from": "2019-04-06T00:00:00+00:00", "to": "2019-09-28T00:00:00+00:00" },
                "studios": [{ "mal_id": 43, "name": "ufotable", "url": "https://myanimelist.net/anime/producer/43" }],
                "producers": [{ "mal_id": 17, "name": "Aniplex" }],
                "licensors": null
            } }"#,
        )
        .unwrap();
        let characters: JikanResponse<Vec<MalCharacterEntry>> = serde_json::from_str(
            r#"{ "data": [{
                "character": { "mal_id": 146156, "name": "Kamado, Tanjirou" },
                "role": "Main",
                "voice_actors": [{ "person": { "mal_id": 20659, "name": "Hanae, Natsuki" }, "language": "Japanese" }]
            }] }"#,
        )
        .unwrap();
        let staff: JikanResponse<Vec<MalStaffEntry>> = serde_json::from_str(
            r#"{ "data": [{ "person": { "mal_id": 1, "name": "Sotozaki, Haruo" }, "positions": ["Director", "Storyboard"] }] }"#,
        )
        .unwrap();

        let work = build_work(anime.data, characters.data, staff.data);

        assert_eq!(work.id, MalId::new(38000));
        assert_eq!(work.format, Some(MediaFormat::Tv));
        assert_eq!(work.aired_from, NaiveDate::from_ymd_opt(2019, 4, 6));
        assert_eq!(work.studios[0].name, "ufotable");
        assert!(work.licensors.is_empty());
        assert_eq!(work.characters[0].role, CharacterRole::Main);
        assert_eq!(work.characters[0].voice_actors[0].language, "Japanese");
        assert_eq!(work.staff[0].positions.len(), 2);
    }

    #[test]
    fn test_tv_special_format() {
        assert_eq!(parse_format("TV Special"), Some(MediaFormat::Special));
        assert_eq!(parse_format("Movie"), Some(MediaFormat::Movie));
        assert_eq!(parse_format("PV"), None);
    }
}
