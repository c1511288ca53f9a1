use crate::clients::catalog::{CatalogError, EpisodeCatalog};
use crate::clients::rate_limit::Throttle;
use crate::config::TvdbConfig;
use crate::constants::USER_AGENT;
use crate::domain::{MetadataProvider, TvdbId};
use crate::matching::temporal::parse_date;
use crate::models::source::{SeasonOrder, TvdbCandidate, TvdbEpisode, TvdbSeason, TvdbSeries};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

const SECONDS_PER_HOUR: u64 = 3600;

#[derive(Serialize)]
struct LoginRequest<'a> {
    apikey: &'a str,
}

#[derive(Deserialize)]
struct TvdbResponse<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Deserialize)]
struct SearchResult {
    tvdb_id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    year: Option<String>,
    first_air_time: Option<String>,
    #[serde(rename = "type")]
    result_type: Option<String>,
}

#[derive(Deserialize)]
struct SeriesExtended {
    id: i32,
    name: Option<String>,
    year: Option<String>,
    #[serde(rename = "firstAired")]
    first_aired: Option<String>,
    aliases: Option<Vec<Alias>>,
    seasons: Option<Vec<SeasonRecord>>,
    episodes: Option<Vec<EpisodeRecord>>,
}

#[derive(Deserialize)]
struct Alias {
    name: String,
}

#[derive(Deserialize)]
struct SeasonRecord {
    id: i32,
    number: Option<i32>,
    name: Option<String>,
    #[serde(rename = "type")]
    season_type: Option<SeasonType>,
}

#[derive(Deserialize)]
struct SeasonType {
    id: i32,
}

#[derive(Deserialize)]
struct EpisodeRecord {
    #[serde(rename = "seasonNumber")]
    season_number: Option<i32>,
    number: Option<i32>,
    aired: Option<String>,
}

fn non_negative(value: Option<i32>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

impl From<SeriesExtended> for TvdbSeries {
    fn from(s: SeriesExtended) -> Self {
        Self {
            id: TvdbId::new(s.id),
            name: s.name.unwrap_or_default(),
            year: s.year.as_deref().and_then(|y| y.trim().parse().ok()),
            first_aired: s.first_aired.as_deref().and_then(parse_date),
            aliases: s
                .aliases
                .unwrap_or_default()
                .into_iter()
                .map(|a| a.name)
                .collect(),
            seasons: s
                .seasons
                .unwrap_or_default()
                .into_iter()
                .filter_map(|season| {
                    Some(TvdbSeason {
                        id: season.id,
                        number: non_negative(season.number)?,
                        name: season.name,
                        order: season
                            .season_type
                            .map_or(SeasonOrder::Other, |t| SeasonOrder::from_type_id(t.id)),
                    })
                })
                .collect(),
            episodes: s
                .episodes
                .unwrap_or_default()
                .into_iter()
                .filter_map(|e| {
                    Some(TvdbEpisode {
                        season_number: non_negative(e.season_number)?,
                        number: non_negative(e.number).unwrap_or_default(),
                        aired: e.aired.as_deref().and_then(parse_date),
                    })
                })
                .collect(),
        }
    }
}

fn to_candidate(result: SearchResult) -> Option<TvdbCandidate> {
    let id = result.tvdb_id?.trim().parse().ok()?;
    Some(TvdbCandidate {
        id: TvdbId::new(id),
        name: result.name.unwrap_or_default(),
        aliases: result.aliases,
        year: result.year.as_deref().and_then(|y| y.trim().parse().ok()),
        first_aired: result.first_air_time.as_deref().and_then(parse_date),
        is_movie: result.result_type.as_deref() == Some("movie"),
    })
}

struct CachedToken {
    value: String,
    issued_at: Instant,
}

#[derive(Clone)]
pub struct TvdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    token_ttl: Duration,
    token: Arc<Mutex<Option<CachedToken>>>,
    throttle: Arc<Throttle>,
}

impl TvdbClient {
    #[must_use]
    pub fn new(config: &TvdbConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(config.request_timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            token_ttl: Duration::from_secs(config.token_ttl_hours * SECONDS_PER_HOUR),
            token: Arc::new(Mutex::new(None)),
            throttle: Arc::new(Throttle::new(MetadataProvider::Tvdb, config.rate_limit())),
        }
    }

    /// Returns the cached bearer token, logging in again once it is older than
    /// the configured lifetime.
    async fn token(&self) -> Result<String, CatalogError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.issued_at.elapsed() < self.token_ttl
        {
            return Ok(token.value.clone());
        }

        let url = format!("{}/login", self.base_url);
        let body = LoginRequest {
            apikey: &self.api_key,
        };
        let response = self
            .throttle
            .send(|| self.client.post(&url).json(&body))
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CatalogError::Auth {
                service: MetadataProvider::Tvdb,
                message: format!("login returned {status}"),
            });
        }

        let login: TvdbResponse<LoginData> =
            response.json().await.map_err(|e| CatalogError::Decode {
                service: MetadataProvider::Tvdb,
                message: e.to_string(),
            })?;
        let token = login.data.map(|d| d.token).ok_or_else(|| CatalogError::Auth {
            service: MetadataProvider::Tvdb,
            message: "login response carried no token".to_string(),
        })?;

        info!("Logged in to TVDB");
        *cached = Some(CachedToken {
            value: token.clone(),
            issued_at: Instant::now(),
        });
        Ok(token)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, CatalogError> {
        let token = self.token().await?;
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .throttle
            .send(|| self.client.get(&url).bearer_auth(&token))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::UNAUTHORIZED => {
                self.token.lock().await.take();
                return Err(CatalogError::Auth {
                    service: MetadataProvider::Tvdb,
                    message: "token rejected".to_string(),
                });
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(CatalogError::Status {
                    service: MetadataProvider::Tvdb,
                    status: status.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let response: TvdbResponse<T> =
            response.json().await.map_err(|e| CatalogError::Decode {
                service: MetadataProvider::Tvdb,
                message: e.to_string(),
            })?;

        Ok(response.data)
    }
}

#[async_trait::async_trait]
impl EpisodeCatalog for TvdbClient {
    #[instrument(skip(self))]
    async fn search(&self, title: &str) -> Result<Vec<TvdbCandidate>, CatalogError> {
        let path = format!("/search?query={}", urlencoding::encode(title));
        let results: Vec<SearchResult> = self.get(&path).await?.unwrap_or_default();

        let candidates: Vec<TvdbCandidate> = results.into_iter().filter_map(to_candidate).collect();
        debug!(count = candidates.len(), "TVDB search finished");
        Ok(candidates)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn fetch_episode_structure(
        &self,
        id: TvdbId,
    ) -> Result<Option<TvdbSeries>, CatalogError> {
        let series: Option<SeriesExtended> = self
            .get(&format!("/series/{id}/extended?meta=episodes"))
            .await?;
        Ok(series.map(TvdbSeries::from))
    }
}
