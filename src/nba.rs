//! NBA game logs from the stats.nba.com JSON endpoints.
//!
//! Both endpoints answer in the same `resultSets[] { headers, rowSet }` shape,
//! so parsing goes through one header-indexed table reader.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::aggregate::{LineClassification, classify_values};
use crate::env_cfg::{env_parse, env_string};
use crate::http_cache::HttpCache;
use crate::http_client::http_client;

pub const DEFAULT_SEASON: &str = "2023-24";
pub const DEFAULT_GAMES: usize = 10;
const DEFAULT_BASE_URL: &str = "https://stats.nba.com/stats";

#[derive(Debug, Clone)]
pub struct NbaConfig {
    pub base_url: String,
    pub season: String,
    pub games: usize,
}

impl Default for NbaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            season: DEFAULT_SEASON.to_string(),
            games: DEFAULT_GAMES,
        }
    }
}

impl NbaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_string("NBA_STATS_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            season: env_string("NBA_SEASON").unwrap_or(defaults.season),
            games: env_parse::<usize>("NBA_GAMES")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.games),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NbaStat {
    Pts,
    Ast,
    Reb,
    Stl,
    Blk,
    Fg3m,
    FgPct,
    FtPct,
}

impl NbaStat {
    pub const ALL: [NbaStat; 8] = [
        NbaStat::Pts,
        NbaStat::Ast,
        NbaStat::Reb,
        NbaStat::Stl,
        NbaStat::Blk,
        NbaStat::Fg3m,
        NbaStat::FgPct,
        NbaStat::FtPct,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Self::Pts => "PTS",
            Self::Ast => "AST",
            Self::Reb => "REB",
            Self::Stl => "STL",
            Self::Blk => "BLK",
            Self::Fg3m => "FG3M",
            Self::FgPct => "FG_PCT",
            Self::FtPct => "FT_PCT",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pts => "Points",
            Self::Ast => "Assists",
            Self::Reb => "Rebounds",
            Self::Stl => "Steals",
            Self::Blk => "Blocks",
            Self::Fg3m => "Threes Made",
            Self::FgPct => "Field Goal %",
            Self::FtPct => "Free Throw %",
        }
    }
}

impl FromStr for NbaStat {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.column().eq_ignore_ascii_case(wanted) || s.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| anyhow!("unknown NBA stat '{wanted}'"))
    }
}

impl fmt::Display for NbaStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NbaPlayer {
    pub id: u64,
    pub full_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NbaGameLogRow {
    pub game_id: String,
    pub game_date: NaiveDate,
    pub matchup: String,
    pub stats: BTreeMap<NbaStat, f64>,
}

impl NbaGameLogRow {
    pub fn stat(&self, stat: NbaStat) -> Option<f64> {
        self.stats.get(&stat).copied()
    }
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "resultSets")]
    result_sets: Vec<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    name: String,
    headers: Vec<String>,
    #[serde(rename = "rowSet")]
    row_set: Vec<Vec<Value>>,
}

impl ResultSet {
    fn index(&self, header: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(header))
            .ok_or_else(|| anyhow!("result set '{}' has no {header} column", self.name))
    }
}

fn first_result_set(raw: &str) -> Result<ResultSet> {
    let parsed: StatsResponse = serde_json::from_str(raw).context("parse stats response")?;
    parsed
        .result_sets
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("stats response has no result sets"))
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses the `commonallplayers` index.
pub fn parse_players_json(raw: &str) -> Result<Vec<NbaPlayer>> {
    let set = first_result_set(raw)?;
    let id_idx = set.index("PERSON_ID")?;
    let name_idx = set.index("DISPLAY_FIRST_LAST")?;
    let status_idx = set.index("ROSTERSTATUS").ok();

    let mut out = Vec::with_capacity(set.row_set.len());
    for row in &set.row_set {
        let Some(id) = row.get(id_idx).and_then(value_f64).map(|v| v as u64) else {
            continue;
        };
        let Some(full_name) = row.get(name_idx).and_then(value_text) else {
            continue;
        };
        let is_active = status_idx
            .and_then(|idx| row.get(idx))
            .and_then(value_f64)
            .is_some_and(|v| v > 0.0);
        out.push(NbaPlayer {
            id,
            full_name,
            is_active,
        });
    }
    Ok(out)
}

/// Exact full-name match, ignoring case. Active players win over retired namesakes.
pub fn find_player_id(players: &[NbaPlayer], full_name: &str) -> Option<u64> {
    let wanted = full_name.trim();
    let mut matches = players
        .iter()
        .filter(|p| p.full_name.eq_ignore_ascii_case(wanted));
    let first = matches.next()?;
    if first.is_active {
        return Some(first.id);
    }
    Some(matches.find(|p| p.is_active).unwrap_or(first).id)
}

fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%b %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d"))
        .ok()
}

/// Parses a `playergamelog` response. Rows without a readable date are dropped.
pub fn parse_game_log_json(raw: &str) -> Result<Vec<NbaGameLogRow>> {
    let set = first_result_set(raw)?;
    let game_idx = set.index("Game_ID")?;
    let date_idx = set.index("GAME_DATE")?;
    let matchup_idx = set.index("MATCHUP")?;
    let stat_idx: Vec<(NbaStat, usize)> = NbaStat::ALL
        .into_iter()
        .filter_map(|stat| set.index(stat.column()).ok().map(|idx| (stat, idx)))
        .collect();

    let mut out = Vec::with_capacity(set.row_set.len());
    let mut skipped = 0usize;
    for row in &set.row_set {
        let Some(game_date) = row
            .get(date_idx)
            .and_then(value_text)
            .and_then(|d| parse_game_date(&d))
        else {
            skipped += 1;
            continue;
        };
        let stats = stat_idx
            .iter()
            .filter_map(|(stat, idx)| row.get(*idx).and_then(value_f64).map(|v| (*stat, v)))
            .filter(|(_, v)| v.is_finite())
            .collect();
        out.push(NbaGameLogRow {
            game_id: row.get(game_idx).and_then(value_text).unwrap_or_default(),
            game_date,
            matchup: row.get(matchup_idx).and_then(value_text).unwrap_or_default(),
            stats,
        });
    }
    if skipped > 0 {
        debug!(skipped, "game log rows without a date");
    }
    Ok(out)
}

/// The `n` most recent games, oldest first.
pub fn last_games(rows: &[NbaGameLogRow], n: usize) -> Vec<NbaGameLogRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| a.game_date.cmp(&b.game_date).then_with(|| a.game_id.cmp(&b.game_id)));
    let start = sorted.len().saturating_sub(n);
    sorted.split_off(start)
}

pub fn classify_games(rows: &[NbaGameLogRow], stat: NbaStat, line: f64) -> LineClassification {
    classify_values(rows.iter().map(|r| r.stat(stat)), line)
}

/// Mean of `stat` over whichever games are passed in, skipping missing values.
pub fn mean_stat(rows: &[NbaGameLogRow], stat: NbaStat) -> Option<f64> {
    let values: Vec<f64> = rows.iter().filter_map(|r| r.stat(stat)).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

const STATS_HEADERS: [(&str, &str); 4] = [
    ("Referer", "https://www.nba.com/"),
    ("Origin", "https://www.nba.com"),
    ("x-nba-stats-origin", "stats"),
    ("x-nba-stats-token", "true"),
];

#[derive(Debug)]
pub struct NbaClient {
    cfg: NbaConfig,
    cache: HttpCache,
}

impl NbaClient {
    pub fn new(cfg: NbaConfig, cache: HttpCache) -> Self {
        Self { cfg, cache }
    }

    pub fn from_env() -> Self {
        Self::new(NbaConfig::from_env(), HttpCache::from_env())
    }

    pub fn config(&self) -> &NbaConfig {
        &self.cfg
    }

    pub fn fetch_players(&self, season: &str) -> Result<Vec<NbaPlayer>> {
        let url = format!(
            "{}/commonallplayers?IsOnlyCurrentSeason=0&LeagueID=00&Season={season}",
            self.cfg.base_url
        );
        let body = self.cache.fetch_text(http_client()?, &url, &STATS_HEADERS)?;
        let players = parse_players_json(&body).context("parse player index")?;
        info!(season, players = players.len(), "nba player index loaded");
        Ok(players)
    }

    pub fn fetch_game_log(&self, player_id: u64, season: &str) -> Result<Vec<NbaGameLogRow>> {
        let url = format!(
            "{}/playergamelog?PlayerID={player_id}&Season={season}&SeasonType=Regular%20Season",
            self.cfg.base_url
        );
        let body = self.cache.fetch_text(http_client()?, &url, &STATS_HEADERS)?;
        let rows = parse_game_log_json(&body)
            .with_context(|| format!("parse game log for player {player_id}"))?;
        info!(player_id, season, games = rows.len(), "nba game log loaded");
        Ok(rows)
    }

    /// Resolves `full_name` and returns the last `games` games of `season`, oldest first.
    pub fn recent_games(&self, full_name: &str, season: &str, games: usize) -> Result<Vec<NbaGameLogRow>> {
        let players = self.fetch_players(season)?;
        let id = find_player_id(&players, full_name)
            .ok_or_else(|| anyhow!("no NBA player named '{full_name}'"))?;
        let log = self.fetch_game_log(id, season)?;
        Ok(last_games(&log, games))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_names_parse_by_column_or_label() {
        assert_eq!("pts".parse::<NbaStat>().unwrap(), NbaStat::Pts);
        assert_eq!("FG3M".parse::<NbaStat>().unwrap(), NbaStat::Fg3m);
        assert_eq!("free throw %".parse::<NbaStat>().unwrap(), NbaStat::FtPct);
        assert!("minutes".parse::<NbaStat>().is_err());
    }

    #[test]
    fn game_dates_accept_api_and_iso_forms() {
        let want = NaiveDate::from_ymd_opt(2023, 10, 25);
        assert_eq!(parse_game_date("OCT 25, 2023"), want);
        assert_eq!(parse_game_date("2023-10-25T00:00:00"), want);
        assert_eq!(parse_game_date("yesterday"), None);
    }

    #[test]
    fn active_player_preferred_on_name_clash() {
        let players = vec![
            NbaPlayer {
                id: 1,
                full_name: "Sam Example".into(),
                is_active: false,
            },
            NbaPlayer {
                id: 2,
                full_name: "Sam Example".into(),
                is_active: true,
            },
        ];
        assert_eq!(find_player_id(&players, "sam example"), Some(2));
        assert_eq!(find_player_id(&players, "Sam"), None);
    }
}
