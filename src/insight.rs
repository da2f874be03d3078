//! Narrative insight: a templated prompt built from computed averages and the
//! upcoming opponent, sent to an OpenAI-compatible chat completion endpoint.
//!
//! Everything here is best effort. `InsightClient::generate` never returns an
//! error; callers render whatever [`InsightOutcome`] comes back.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::env_cfg::{env_bool, env_parse, env_string};
use crate::http_client::http_client;
use crate::model::{PlayerId, PlayerWeek, StatField};
use crate::table::ScheduleTable;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u32 = 150;
const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct InsightConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl InsightConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_bool("INSIGHT_ENABLED", defaults.enabled),
            api_key: env_string("OPENAI_API_KEY"),
            model: env_string("INSIGHT_MODEL").unwrap_or(defaults.model),
            base_url: env_string("INSIGHT_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            max_tokens: env_parse::<u32>("INSIGHT_MAX_TOKENS")
                .unwrap_or(defaults.max_tokens)
                .clamp(16, 4096),
            temperature: env_parse::<f32>("INSIGHT_TEMPERATURE")
                .filter(|t| t.is_finite())
                .unwrap_or(defaults.temperature)
                .clamp(0.0, 2.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingGame {
    pub season: u16,
    pub week: u8,
    pub opponent: String,
    pub home: bool,
    pub gameday: Option<NaiveDate>,
}

/// Earliest week of `season` in which `team` has a game without a final score.
pub fn next_unplayed_game(schedule: &ScheduleTable, season: u16, team: &str) -> Option<UpcomingGame> {
    schedule
        .rows()
        .iter()
        .filter(|g| g.season == season && !g.is_played() && g.involves(team))
        .min_by_key(|g| (g.week, g.gameday))
        .and_then(|g| {
            Some(UpcomingGame {
                season: g.season,
                week: g.week,
                opponent: g.opponent_of(team)?.to_string(),
                home: g.home_team.eq_ignore_ascii_case(team),
                gameday: g.gameday,
            })
        })
}

/// Mean points scored against `team` in its completed games of `season`.
pub fn opponent_points_allowed(schedule: &ScheduleTable, season: u16, team: &str) -> Option<f64> {
    let allowed: Vec<f64> = schedule
        .rows()
        .iter()
        .filter(|g| g.season == season && g.is_played())
        .filter_map(|g| g.points_allowed_by(team))
        .map(f64::from)
        .collect();
    if allowed.is_empty() {
        return None;
    }
    Some(allowed.iter().sum::<f64>() / allowed.len() as f64)
}

/// Per-week total of `field` by every player who faced `team`, averaged over those weeks.
///
/// Merged rows can repeat a game once per roster season, so each
/// (player, season, week) is counted once, first row wins.
pub fn opponent_stat_allowed(
    rows: &[PlayerWeek],
    season: u16,
    team: &str,
    field: StatField,
) -> Option<f64> {
    let mut seen: HashSet<(&PlayerId, u8)> = HashSet::new();
    let mut per_week: BTreeMap<u8, f64> = BTreeMap::new();
    for row in rows
        .iter()
        .filter(|r| r.season() == season)
        .filter(|r| {
            r.game
                .opponent_team
                .as_deref()
                .is_some_and(|opp| opp.eq_ignore_ascii_case(team))
        })
    {
        if !seen.insert((&row.game.player_id, row.week())) {
            continue;
        }
        if let Some(value) = row.stat(field) {
            *per_week.entry(row.week()).or_default() += value;
        }
    }
    if per_week.is_empty() {
        return None;
    }
    Some(per_week.values().sum::<f64>() / per_week.len() as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsightContext {
    pub player: String,
    pub position: String,
    pub team: Option<String>,
    pub stat: StatField,
    pub season: u16,
    pub season_avg: f64,
    pub trailing_avg: f64,
    pub line: Option<f64>,
    pub upcoming: Option<UpcomingGame>,
    pub opponent_points_allowed: Option<f64>,
    pub opponent_stat_allowed: Option<f64>,
}

pub fn build_prompt(ctx: &InsightContext) -> String {
    let team = ctx.team.as_deref().unwrap_or("N/A");
    let mut lines = vec![
        format!(
            "You are an NFL analyst. In two or three sentences, give an outlook for {} ({}, {team}) in {}.",
            ctx.player,
            ctx.position,
            ctx.stat.label()
        ),
        format!(
            "{} season average: {:.1}. Last 3 games average: {:.1}.",
            ctx.season, ctx.season_avg, ctx.trailing_avg
        ),
    ];
    if let Some(line) = ctx.line {
        lines.push(format!("Betting line: {line:.1}."));
    }
    match ctx.upcoming.as_ref() {
        Some(game) => {
            let venue = if game.home { "vs" } else { "at" };
            lines.push(format!("Next game: week {} {venue} {}.", game.week, game.opponent));
            if let Some(points) = ctx.opponent_points_allowed {
                lines.push(format!("{} allow {points:.1} points per game.", game.opponent));
            }
            if let Some(allowed) = ctx.opponent_stat_allowed {
                lines.push(format!(
                    "{} allow {allowed:.1} {} per game.",
                    game.opponent,
                    ctx.stat.label().to_lowercase()
                ));
            }
        }
        None => lines.push("No upcoming game is scheduled.".to_string()),
    }
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightOutcome {
    Text(String),
    Unavailable(String),
    Failed(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    n: u8,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Pulls the first choice's trimmed text out of a chat completion body.
pub fn parse_chat_response(raw: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(raw).context("parse chat completion")?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| anyhow!("chat completion had no text"))
}

#[derive(Debug, Clone)]
pub struct InsightClient {
    cfg: InsightConfig,
}

impl InsightClient {
    pub fn new(cfg: InsightConfig) -> Self {
        Self { cfg }
    }

    pub fn from_env() -> Self {
        Self::new(InsightConfig::from_env())
    }

    pub fn generate(&self, prompt: &str) -> InsightOutcome {
        if !self.cfg.enabled {
            return InsightOutcome::Unavailable("insight disabled".to_string());
        }
        let Some(key) = self.cfg.api_key.as_deref() else {
            return InsightOutcome::Unavailable("OPENAI_API_KEY not set".to_string());
        };
        match self.request(key, prompt) {
            Ok(text) => {
                info!(model = %self.cfg.model, chars = text.len(), "insight generated");
                InsightOutcome::Text(text)
            }
            Err(err) => {
                warn!(error = %err, "insight request failed");
                InsightOutcome::Failed(format!("{err:#}"))
            }
        }
    }

    fn request(&self, key: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.cfg.base_url);
        let body = ChatRequest {
            model: &self.cfg.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
            n: 1,
        };
        let resp = http_client()?
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .with_context(|| format!("request {url}"))?;
        let status = resp.status();
        let text = resp.text().context("read chat completion body")?;
        if !status.is_success() {
            let snippet: String = text.trim().chars().take(220).collect();
            return Err(anyhow!("http {status}: {snippet}"));
        }
        parse_chat_response(&text)
    }
}
