//! Domain types shared across the gateway.
//!
//! # Purpose
//! Ranking rows, ranking buckets, accounts, and the task envelopes carried on
//! the message bus. Field names serialize to the upstream's camelCase wire
//! form so cached payloads and responses are byte-compatible with what the
//! Riot API returns.
use serde::{Deserialize, Serialize};

/// Fixed truncation width for high-tier ranking buckets.
pub const TOP_N: usize = 10;

/// Full page size for paged league entries; a full page implies more pages.
pub const PAGE_SIZE: usize = 200;

/// Display-name slot sentinel: a name fetch is in flight on the worker pool.
pub const NAME_LOADING: &str = "Loading…";

/// Display-name slot sentinel: the row carries no opaque id to resolve.
pub const NAME_UNKNOWN: &str = "Unknown";

/// Queue the search endpoint surfaces as the player's ranked standing.
pub const RANKED_QUEUE: &str = "RANKED_TFT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntry {
    #[serde(default)]
    pub league_id: String,
    #[serde(default)]
    pub puuid: String,
    // Fallback identifier for payloads that predate puuid-keyed responses.
    #[serde(default)]
    pub summoner_id: String,
    #[serde(default)]
    pub summoner_name: String,
    #[serde(default)]
    pub queue_type: String,
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub league_points: i64,
    #[serde(default)]
    pub wins: i64,
    #[serde(default)]
    pub losses: i64,
    #[serde(default)]
    pub hot_streak: bool,
    #[serde(default)]
    pub veteran: bool,
    #[serde(default)]
    pub fresh_blood: bool,
    #[serde(default)]
    pub inactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mini_series: Option<MiniSeries>,
}

impl LeagueEntry {
    /// The stable identifier for this row: puuid, falling back to the legacy
    /// summoner id, empty when neither is present.
    pub fn unique_id(&self) -> &str {
        if !self.puuid.is_empty() {
            &self.puuid
        } else {
            &self.summoner_id
        }
    }

    /// True when the display-name slot holds an actual resolved name rather
    /// than being empty or carrying one of the sentinels.
    pub fn has_resolved_name(&self) -> bool {
        !self.summoner_name.is_empty()
            && self.summoner_name != NAME_LOADING
            && self.summoner_name != NAME_UNKNOWN
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniSeries {
    pub target: i64,
    pub wins: i64,
    pub losses: i64,
    pub progress: String,
}

/// A high-tier ranking bucket as served and cached: entries are truncated to
/// [`TOP_N`] and stamped with the enclosing tier before this struct leaves
/// the upstream client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueList {
    #[serde(default)]
    pub league_id: String,
    #[serde(default)]
    pub entries: Vec<LeagueEntry>,
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub queue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntriesPage {
    pub entries: Vec<LeagueEntry>,
    pub page: u32,
    pub tier: String,
    pub division: String,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub puuid: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub tag_line: String,
}

impl Account {
    /// User-facing composite name. The `#tag` suffix is omitted only when the
    /// tag line is empty.
    pub fn full_name(&self) -> String {
        if self.tag_line.is_empty() {
            self.game_name.clone()
        } else {
            format!("{}#{}", self.game_name, self.tag_line)
        }
    }
}

/// The three buckets that are truncated to [`TOP_N`] and refreshed by the
/// scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighTier {
    Challenger,
    Grandmaster,
    Master,
}

impl HighTier {
    pub const ALL: [HighTier; 3] = [
        HighTier::Challenger,
        HighTier::Grandmaster,
        HighTier::Master,
    ];

    /// Cache kind, URL path segment, admission key, and refresh-task type all
    /// share this lowercase form.
    pub fn as_str(self) -> &'static str {
        match self {
            HighTier::Challenger => "challenger",
            HighTier::Grandmaster => "grandmaster",
            HighTier::Master => "master",
        }
    }

    /// Tier constant stamped onto every entry in the bucket.
    pub fn tier_name(self) -> &'static str {
        match self {
            HighTier::Challenger => "CHALLENGER",
            HighTier::Grandmaster => "GRANDMASTER",
            HighTier::Master => "MASTER",
        }
    }
}

/// Truncate a high-tier bucket to [`TOP_N`] rows and stamp every row with the
/// enclosing tier. This is the single place truncation and tier stamping
/// happen; the upstream client applies it after every fetch and every cache
/// hit for high-tier buckets.
pub fn normalize_top_entries(mut entries: Vec<LeagueEntry>, tier: &str) -> Vec<LeagueEntry> {
    entries.truncate(TOP_N);
    for entry in &mut entries {
        entry.tier = tier.to_string();
    }
    entries
}

/// Bus envelope asking a name worker to resolve one player's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameFetchTask {
    pub puuid: String,
    pub region: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshKind {
    Challenger,
    Grandmaster,
    Master,
    Entries,
}

impl From<HighTier> for RefreshKind {
    fn from(tier: HighTier) -> Self {
        match tier {
            HighTier::Challenger => RefreshKind::Challenger,
            HighTier::Grandmaster => RefreshKind::Grandmaster,
            HighTier::Master => RefreshKind::Master,
        }
    }
}

/// Bus envelope asking a ranking worker to repopulate one cached bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingRefreshTask {
    #[serde(rename = "type")]
    pub kind: RefreshKind,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub division: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(puuid: &str, name: &str) -> LeagueEntry {
        LeagueEntry {
            league_id: "L1".into(),
            puuid: puuid.into(),
            summoner_id: String::new(),
            summoner_name: name.into(),
            queue_type: RANKED_QUEUE.into(),
            tier: String::new(),
            rank: "I".into(),
            league_points: 100,
            wins: 10,
            losses: 5,
            hot_streak: false,
            veteran: false,
            fresh_blood: false,
            inactive: false,
            mini_series: None,
        }
    }

    #[test]
    fn normalize_truncates_and_stamps_tier() {
        let entries: Vec<_> = (0..15).map(|i| entry(&format!("p{i}"), "")).collect();
        let normalized = normalize_top_entries(entries, "CHALLENGER");
        assert_eq!(normalized.len(), TOP_N);
        assert!(normalized.iter().all(|e| e.tier == "CHALLENGER"));
    }

    #[test]
    fn normalize_keeps_short_buckets_intact() {
        let entries = vec![entry("a", ""), entry("b", "")];
        let normalized = normalize_top_entries(entries, "MASTER");
        assert_eq!(normalized.len(), 2);
        assert!(normalized.iter().all(|e| e.tier == "MASTER"));
    }

    #[test]
    fn unique_id_prefers_puuid_then_summoner_id() {
        let mut row = entry("puuid-1", "");
        row.summoner_id = "sid-1".into();
        assert_eq!(row.unique_id(), "puuid-1");
        row.puuid.clear();
        assert_eq!(row.unique_id(), "sid-1");
        row.summoner_id.clear();
        assert_eq!(row.unique_id(), "");
    }

    #[test]
    fn sentinels_do_not_count_as_resolved_names() {
        assert!(entry("p", "Faker#KR1").has_resolved_name());
        assert!(!entry("p", "").has_resolved_name());
        assert!(!entry("p", NAME_LOADING).has_resolved_name());
        assert!(!entry("p", NAME_UNKNOWN).has_resolved_name());
    }

    #[test]
    fn full_name_omits_empty_tag() {
        let account = Account {
            puuid: "p".into(),
            game_name: "Player".into(),
            tag_line: "BR1".into(),
        };
        assert_eq!(account.full_name(), "Player#BR1");
        let untagged = Account {
            tag_line: String::new(),
            ..account
        };
        assert_eq!(untagged.full_name(), "Player");
    }

    #[test]
    fn league_entry_uses_upstream_field_names() {
        let raw = serde_json::json!({
            "leagueId": "abc",
            "puuid": "p-1",
            "summonerId": "s-1",
            "summonerName": "Player#BR1",
            "queueType": "RANKED_TFT",
            "tier": "GOLD",
            "rank": "II",
            "leaguePoints": 42,
            "wins": 7,
            "losses": 3,
            "hotStreak": true,
            "veteran": false,
            "freshBlood": false,
            "inactive": false,
            "miniSeries": {"target": 3, "wins": 1, "losses": 0, "progress": "WNN"}
        });
        let parsed: LeagueEntry = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(parsed.league_points, 42);
        assert!(parsed.hot_streak);
        assert_eq!(parsed.mini_series.as_ref().map(|m| m.target), Some(3));
        let encoded = serde_json::to_value(&parsed).expect("encode");
        assert_eq!(encoded, raw);
    }

    #[test]
    fn refresh_task_envelope_round_trips() {
        let task = RankingRefreshTask {
            kind: RefreshKind::Challenger,
            region: "BR1".into(),
            tier: None,
            division: None,
            page: None,
        };
        let raw = serde_json::to_value(&task).expect("encode");
        assert_eq!(raw["type"], "challenger");
        assert_eq!(raw["region"], "BR1");
        assert!(raw.get("tier").is_none());
    }
}
