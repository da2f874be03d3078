use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Player identifier normalized to a trimmed string, whatever the source cell type was.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Position {
    Qb,
    Rb,
    Wr,
    Te,
    Other(String),
}

impl Position {
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "QB" => Self::Qb,
            "RB" => Self::Rb,
            "WR" => Self::Wr,
            "TE" => Self::Te,
            _ => Self::Other(upper),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Qb => "QB",
            Self::Rb => "RB",
            Self::Wr => "WR",
            Self::Te => "TE",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const STORED_STATS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatField {
    PassingYards,
    PassingTds,
    Interceptions,
    RushingYards,
    RushingTds,
    ReceivingYards,
    ReceivingTds,
    Receptions,
    Targets,
    FumblesLost,
    FantasyPointsPpr,
    /// Derived: rushing plus receiving touchdowns.
    TotalTds,
}

impl StatField {
    /// Statistics carried on a weekly row, in chart-picker order.
    pub const STORED: [StatField; STORED_STATS] = [
        StatField::PassingYards,
        StatField::PassingTds,
        StatField::Interceptions,
        StatField::RushingYards,
        StatField::RushingTds,
        StatField::ReceivingYards,
        StatField::ReceivingTds,
        StatField::Receptions,
        StatField::Targets,
        StatField::FumblesLost,
        StatField::FantasyPointsPpr,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::PassingYards => "Passing Yards",
            Self::PassingTds => "Passing Touchdowns",
            Self::Interceptions => "Interceptions",
            Self::RushingYards => "Rushing Yards",
            Self::RushingTds => "Rushing Touchdowns",
            Self::ReceivingYards => "Receiving Yards",
            Self::ReceivingTds => "Receiving Touchdowns",
            Self::Receptions => "Receptions",
            Self::Targets => "Targets",
            Self::FumblesLost => "Fumbles Lost",
            Self::FantasyPointsPpr => "Fantasy Points PPR",
            Self::TotalTds => "Total Touchdowns",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::PassingYards => "passing_yards",
            Self::PassingTds => "passing_tds",
            Self::Interceptions => "interceptions",
            Self::RushingYards => "rushing_yards",
            Self::RushingTds => "rushing_tds",
            Self::ReceivingYards => "receiving_yards",
            Self::ReceivingTds => "receiving_tds",
            Self::Receptions => "receptions",
            Self::Targets => "targets",
            Self::FumblesLost => "fumbles_lost",
            Self::FantasyPointsPpr => "fantasy_points_ppr",
            Self::TotalTds => "total_tds",
        }
    }

    fn slot(self) -> Option<usize> {
        Self::STORED.iter().position(|f| *f == self)
    }
}

impl FromStr for StatField {
    type Err = anyhow::Error;

    /// Accepts either the column name (`receiving_yards`) or the label (`Receiving Yards`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim();
        Self::STORED
            .iter()
            .chain(std::iter::once(&Self::TotalTds))
            .copied()
            .find(|f| f.column().eq_ignore_ascii_case(needle) || f.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| anyhow!("unknown statistic `{needle}`"))
    }
}

impl fmt::Display for StatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counting stats for one game. `None` means the source had no value and is skipped by means.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatLine {
    values: [Option<f64>; STORED_STATS],
}

impl StatLine {
    pub fn get(&self, field: StatField) -> Option<f64> {
        match field {
            StatField::TotalTds => {
                Some(self.get(StatField::RushingTds)? + self.get(StatField::ReceivingTds)?)
            }
            other => other.slot().and_then(|idx| self.values[idx]),
        }
    }

    /// Derived fields are computed on read, so setting one is a no-op.
    pub fn set(&mut self, field: StatField, value: Option<f64>) {
        if let Some(idx) = field.slot() {
            self.values[idx] = value.filter(|v| v.is_finite());
        }
    }

    pub fn with(mut self, field: StatField, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    fn hash_bits<H: Hasher>(&self, state: &mut H) {
        for value in &self.values {
            value.map(f64::to_bits).hash(state);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerGame {
    pub player_id: PlayerId,
    pub player_name: Option<String>,
    pub position: Option<String>,
    pub team: Option<String>,
    pub opponent_team: Option<String>,
    pub season: u16,
    pub week: u8,
    pub season_type: Option<String>,
    pub game_date: Option<NaiveDate>,
    pub stats: StatLine,
}

impl PlayerGame {
    pub fn new(player_id: PlayerId, season: u16, week: u8) -> Self {
        Self {
            player_id,
            player_name: None,
            position: None,
            team: None,
            opponent_team: None,
            season,
            week,
            season_type: None,
            game_date: None,
            stats: StatLine::default(),
        }
    }

    pub fn stat(&self, field: StatField) -> Option<f64> {
        self.stats.get(field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub player_id: PlayerId,
    pub season: u16,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub team: Option<String>,
    pub headshot_url: Option<String>,
}

impl RosterEntry {
    pub fn full_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleGame {
    pub season: u16,
    pub week: u8,
    pub game_type: Option<String>,
    pub gameday: Option<NaiveDate>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
}

impl ScheduleGame {
    pub fn is_played(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team.eq_ignore_ascii_case(team) || self.away_team.eq_ignore_ascii_case(team)
    }

    pub fn opponent_of(&self, team: &str) -> Option<&str> {
        if self.home_team.eq_ignore_ascii_case(team) {
            Some(&self.away_team)
        } else if self.away_team.eq_ignore_ascii_case(team) {
            Some(&self.home_team)
        } else {
            None
        }
    }

    /// Points the given team gave up in this game, once it has been played.
    pub fn points_allowed_by(&self, team: &str) -> Option<u16> {
        if self.home_team.eq_ignore_ascii_case(team) {
            self.away_score
        } else if self.away_team.eq_ignore_ascii_case(team) {
            self.home_score
        } else {
            None
        }
    }
}

/// One weekly row after the roster join.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerWeek {
    pub game: PlayerGame,
    pub full_name: Option<String>,
    /// Roster position when the join found one, otherwise the weekly row's own.
    pub position: Option<String>,
    pub team: Option<String>,
    pub headshot_url: Option<String>,
}

impl PlayerWeek {
    pub fn season(&self) -> u16 {
        self.game.season
    }

    pub fn week(&self) -> u8 {
        self.game.week
    }

    pub fn stat(&self, field: StatField) -> Option<f64> {
        self.game.stat(field)
    }

    pub(crate) fn fingerprint(&self) -> u64 {
        let mut hasher = std::hash::DefaultHasher::new();
        let g = &self.game;
        g.player_id.hash(&mut hasher);
        g.player_name.hash(&mut hasher);
        g.position.hash(&mut hasher);
        g.team.hash(&mut hasher);
        g.opponent_team.hash(&mut hasher);
        g.season.hash(&mut hasher);
        g.week.hash(&mut hasher);
        g.season_type.hash(&mut hasher);
        g.game_date.hash(&mut hasher);
        g.stats.hash_bits(&mut hasher);
        self.full_name.hash(&mut hasher);
        self.position.hash(&mut hasher);
        self.team.hash(&mut hasher);
        self.headshot_url.hash(&mut hasher);
        hasher.finish()
    }
}

/// Inclusive range of seasons; the key for fetched tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeasonRange {
    first: u16,
    last: u16,
}

impl SeasonRange {
    pub const fn new(a: u16, b: u16) -> Self {
        if a <= b {
            Self { first: a, last: b }
        } else {
            Self { first: b, last: a }
        }
    }

    pub const fn single(season: u16) -> Self {
        Self::new(season, season)
    }

    pub fn first(&self) -> u16 {
        self.first
    }

    pub fn last(&self) -> u16 {
        self.last
    }

    pub fn contains(&self, season: u16) -> bool {
        (self.first..=self.last).contains(&season)
    }

    pub fn seasons(&self) -> std::ops::RangeInclusive<u16> {
        self.first..=self.last
    }
}

impl FromStr for SeasonRange {
    type Err = anyhow::Error;

    /// `2023` or `2020-2024`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let parse = |s: &str| {
            s.trim()
                .parse::<u16>()
                .map_err(|_| anyhow!("invalid season `{}` in `{raw}`", s.trim()))
        };
        match raw.split_once('-') {
            Some((a, b)) => Ok(Self::new(parse(a)?, parse(b)?)),
            None => Ok(Self::single(parse(raw)?)),
        }
    }
}

impl fmt::Display for SeasonRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_parse_uppercases() {
        assert_eq!(Position::parse(" qb "), Position::Qb);
        assert_eq!(Position::parse("te"), Position::Te);
        assert_eq!(Position::parse("k"), Position::Other("K".into()));
    }

    #[test]
    fn total_tds_needs_both_parts() {
        let line = StatLine::default()
            .with(StatField::RushingTds, 1.0)
            .with(StatField::ReceivingTds, 2.0);
        assert_eq!(line.get(StatField::TotalTds), Some(3.0));

        let partial = StatLine::default().with(StatField::RushingTds, 1.0);
        assert_eq!(partial.get(StatField::TotalTds), None);
    }

    #[test]
    fn stat_field_parses_column_or_label() {
        assert_eq!("receiving_yards".parse::<StatField>().unwrap(), StatField::ReceivingYards);
        assert_eq!("fantasy points ppr".parse::<StatField>().unwrap(), StatField::FantasyPointsPpr);
        assert!("xg".parse::<StatField>().is_err());
    }

    #[test]
    fn season_range_orders_bounds() {
        let range: SeasonRange = "2024-2020".parse().unwrap();
        assert_eq!(range.first(), 2020);
        assert_eq!(range.last(), 2024);
        assert_eq!(range.seasons().count(), 5);
        assert_eq!(range.to_string(), "2020-2024");
        assert_eq!("2023".parse::<SeasonRange>().unwrap(), SeasonRange::single(2023));
    }
}
