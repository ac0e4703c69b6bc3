//! Riot API client.
//!
//! # Purpose
//! The only component allowed to contact the upstream. Every logical call
//! follows the same read-through pattern: cache-check, fetch, cache-fill.
//! High-tier buckets are normalised (truncated to the top ten and stamped
//! with the enclosing tier) and enriched with display names before they are
//! served or cached.
use crate::cache::{CacheManager, ttl_for_kind};
use crate::config::GatewayConfig;
use crate::enrich::NameEnricher;
use crate::model::{
    Account, HighTier, LeagueEntriesPage, LeagueEntry, LeagueList, PAGE_SIZE,
    normalize_top_entries,
};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
const AUTH_HEADER: &str = "X-Riot-Token";

/// Upstream error taxonomy. Handlers match on the variant; nothing in the
/// serving path inspects error strings.
#[derive(Debug, Error)]
pub enum RiotError {
    #[error("resource not found upstream")]
    NotFound,
    #[error("upstream error: {status} - {body}")]
    Upstream { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Validation(String),
}

pub type RiotResult<T> = Result<T, RiotError>;

/// Capability contract for everything the handlers, the enrichment engine,
/// and the workers need from the upstream. Tests substitute in-memory fakes.
#[async_trait]
pub trait RiotApi: Send + Sync {
    async fn summoner_by_puuid(&self, puuid: &str) -> RiotResult<Value>;
    async fn account_by_puuid(&self, puuid: &str) -> RiotResult<Account>;
    async fn account_by_riot_id(&self, game_name: &str, tag_line: &str) -> RiotResult<Account>;
    async fn league(&self, tier: HighTier) -> RiotResult<LeagueList>;
    /// Like [`RiotApi::league`] but always fetches, so the refresh worker
    /// repopulates the cache instead of reading its own entry back.
    async fn refresh_league(&self, tier: HighTier) -> RiotResult<LeagueList>;
    async fn league_entries(
        &self,
        tier: &str,
        division: &str,
        page: u32,
    ) -> RiotResult<LeagueEntriesPage>;
    async fn league_by_puuid(&self, puuid: &str) -> RiotResult<Vec<LeagueEntry>>;
}

/// Regional aggregate base URL for account-scoped endpoints. Unknown regions
/// route to Americas.
pub fn account_api_url(region: &str) -> &'static str {
    match region {
        "BR1" | "LA1" | "LA2" | "NA1" => "https://americas.api.riotgames.com",
        "EUW1" | "EUN1" | "TR1" | "RU" => "https://europe.api.riotgames.com",
        "JP1" | "KR" => "https://asia.api.riotgames.com",
        "OC1" => "https://sea.api.riotgames.com",
        _ => "https://americas.api.riotgames.com",
    }
}

/// Build the by-riot-id account URL with percent-encoded path segments
/// (spaces become `%20`, never `+`).
fn riot_id_url(account_base: &str, game_name: &str, tag_line: &str) -> RiotResult<Url> {
    let mut url = Url::parse(account_base)
        .map_err(|err| RiotError::Validation(format!("invalid account base url: {err}")))?;
    url.path_segments_mut()
        .map_err(|_| RiotError::Validation("account base url cannot be a base".to_string()))?
        .pop_if_empty()
        .extend([
            "riot",
            "account",
            "v1",
            "accounts",
            "by-riot-id",
            game_name,
            tag_line,
        ]);
    Ok(url)
}

pub struct RiotClient {
    api_key: String,
    base_url: String,
    account_url: String,
    region: String,
    http: reqwest::Client,
    cache: Arc<CacheManager>,
    enricher: NameEnricher,
}

impl RiotClient {
    pub fn new(
        config: &GatewayConfig,
        cache: Arc<CacheManager>,
        enricher: NameEnricher,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;
        Ok(Self {
            api_key: config.riot_api_key.clone(),
            base_url: config.riot_base_url.trim_end_matches('/').to_string(),
            account_url: account_api_url(&config.riot_region).to_string(),
            region: config.riot_region.clone(),
            http,
            cache,
            enricher,
        })
    }

    /// Issue an authenticated GET and classify the response. 200 yields the
    /// body; 404 and other statuses map to their error variants.
    async fn fetch(&self, url: &str) -> RiotResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .header(AUTH_HEADER, &self.api_key)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RiotError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RiotError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Shared fetch half of the high-tier path: fetch, normalise, enrich,
    /// cache-fill.
    async fn fetch_league(&self, tier: HighTier, key: &str) -> RiotResult<LeagueList> {
        let url = format!("{}/tft/league/v1/{}", self.base_url, tier.as_str());
        let body = self.fetch(&url).await?;
        let mut list: LeagueList = serde_json::from_slice(&body)?;
        list.entries = normalize_top_entries(list.entries, tier.tier_name());
        list.entries = self.enricher.enrich(self, list.entries, tier.tier_name()).await;
        self.cache
            .set_json(key, &list, ttl_for_kind(tier.as_str()))
            .await;
        Ok(list)
    }
}

#[async_trait]
impl RiotApi for RiotClient {
    async fn summoner_by_puuid(&self, puuid: &str) -> RiotResult<Value> {
        let key = self.cache.fingerprint("summoner", &self.region, &[puuid]);
        if let Some(cached) = self.cache.get_json::<Value>(&key).await {
            return Ok(cached);
        }
        let url = format!(
            "{}/tft/summoner/v1/summoners/by-puuid/{}",
            self.base_url, puuid
        );
        let body = self.fetch(&url).await?;
        let value: Value = serde_json::from_slice(&body)?;
        self.cache
            .set_json(&key, &value, ttl_for_kind("summoner"))
            .await;
        Ok(value)
    }

    async fn account_by_puuid(&self, puuid: &str) -> RiotResult<Account> {
        let key = self
            .cache
            .fingerprint("account_by_puuid", &self.region, &[puuid]);
        if let Some(cached) = self.cache.get_json::<Account>(&key).await {
            return Ok(cached);
        }
        let url = format!(
            "{}/riot/account/v1/accounts/by-puuid/{}",
            self.account_url, puuid
        );
        let body = self.fetch(&url).await?;
        let account: Account = serde_json::from_slice(&body)?;
        self.cache
            .set_json(&key, &account, ttl_for_kind("account_by_puuid"))
            .await;
        Ok(account)
    }

    async fn account_by_riot_id(&self, game_name: &str, tag_line: &str) -> RiotResult<Account> {
        if game_name.is_empty() {
            return Err(RiotError::Validation("gameName is required".to_string()));
        }
        let tag_line = if tag_line.is_empty() {
            self.region.as_str()
        } else {
            tag_line
        };
        let key = self
            .cache
            .fingerprint("account_by_name", &self.region, &[game_name, tag_line]);
        if let Some(cached) = self.cache.get_json::<Account>(&key).await {
            return Ok(cached);
        }
        let url = riot_id_url(&self.account_url, game_name, tag_line)?;
        let body = self.fetch(url.as_str()).await?;
        let account: Account = serde_json::from_slice(&body)?;
        self.cache
            .set_json(&key, &account, ttl_for_kind("account_by_name"))
            .await;
        Ok(account)
    }

    async fn league(&self, tier: HighTier) -> RiotResult<LeagueList> {
        let key = self.cache.fingerprint(tier.as_str(), &self.region, &[]);
        if let Some(mut cached) = self.cache.get_json::<LeagueList>(&key).await {
            cached.entries = normalize_top_entries(cached.entries, tier.tier_name());
            cached.entries = self
                .enricher
                .enrich(self, cached.entries, tier.tier_name())
                .await;
            return Ok(cached);
        }
        self.fetch_league(tier, &key).await
    }

    async fn refresh_league(&self, tier: HighTier) -> RiotResult<LeagueList> {
        let key = self.cache.fingerprint(tier.as_str(), &self.region, &[]);
        self.fetch_league(tier, &key).await
    }

    async fn league_entries(
        &self,
        tier: &str,
        division: &str,
        page: u32,
    ) -> RiotResult<LeagueEntriesPage> {
        let page_param = page.to_string();
        let key = self
            .cache
            .fingerprint("entries", &self.region, &[tier, division, &page_param]);
        if let Some(mut cached) = self.cache.get_json::<LeagueEntriesPage>(&key).await {
            cached.entries = self.enricher.enrich(self, cached.entries, tier).await;
            return Ok(cached);
        }
        let url = format!(
            "{}/tft/league/v1/entries/{}/{}?page={}",
            self.base_url, tier, division, page
        );
        let body = self.fetch(&url).await?;
        let entries: Vec<LeagueEntry> = serde_json::from_slice(&body)?;
        let has_more = entries.len() == PAGE_SIZE;
        let entries = self.enricher.enrich(self, entries, tier).await;
        let result = LeagueEntriesPage {
            entries,
            page,
            tier: tier.to_string(),
            division: division.to_string(),
            has_more,
        };
        self.cache
            .set_json(&key, &result, ttl_for_kind("entries"))
            .await;
        Ok(result)
    }

    async fn league_by_puuid(&self, puuid: &str) -> RiotResult<Vec<LeagueEntry>> {
        let key = self
            .cache
            .fingerprint("league_by_puuid", &self.region, &[puuid]);
        if let Some(cached) = self.cache.get_json::<Vec<LeagueEntry>>(&key).await {
            return Ok(cached);
        }
        let url = format!("{}/tft/league/v1/by-puuid/{}", self.base_url, puuid);
        let body = self.fetch(&url).await?;
        let entries: Vec<LeagueEntry> = serde_json::from_slice(&body)?;
        self.cache
            .set_json(&key, &entries, ttl_for_kind("league_by_puuid"))
            .await;
        Ok(entries)
    }
}
