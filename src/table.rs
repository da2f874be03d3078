//! Raw column-oriented rows and their validation into typed tables.
//!
//! Every source (parquet download, synthetic league, tests) lands here as a
//! [`RawTable`]; the `from_raw` constructors check required columns once and
//! turn cells into the typed rows the aggregator works with.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::debug;

use crate::error::DataError;
use crate::model::{PlayerGame, PlayerId, RosterEntry, ScheduleGame, StatField, StatLine};

const FUMBLE_PARTS: [&str; 3] = [
    "rushing_fumbles_lost",
    "receiving_fumbles_lost",
    "sack_fumbles_lost",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(raw: &str) -> Self {
        Self::Text(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) if v.is_finite() => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            Self::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) if v.is_finite() => Some(if v.fract() == 0.0 {
                format!("{}", *v as i64)
            } else {
                v.to_string()
            }),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Text(s) => {
                let t = s.trim();
                let head = t.get(..10).unwrap_or(t);
                NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Self {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn require(&self, table: &'static str, field: &'static str) -> Result<usize, DataError> {
        self.column_index(field)
            .ok_or(DataError::MissingField { table, field })
    }
}

fn cell<'a>(row: &'a [Cell], idx: Option<usize>) -> Option<&'a Cell> {
    idx.and_then(|i| row.get(i))
}

fn text_at(row: &[Cell], idx: Option<usize>) -> Option<String> {
    cell(row, idx).and_then(Cell::as_text)
}

fn season_at(row: &[Cell], idx: usize) -> Option<u16> {
    row.get(idx)
        .and_then(Cell::as_i64)
        .and_then(|v| u16::try_from(v).ok())
}

fn week_at(row: &[Cell], idx: usize) -> Option<u8> {
    row.get(idx)
        .and_then(Cell::as_i64)
        .and_then(|v| u8::try_from(v).ok())
}

/// Weekly player stats, concatenated across seasons in source order.
#[derive(Debug, Clone, Default)]
pub struct WeeklyTable {
    stat_columns: BTreeSet<StatField>,
    has_position: bool,
    rows: Vec<PlayerGame>,
}

impl WeeklyTable {
    pub fn from_rows(
        rows: Vec<PlayerGame>,
        stat_columns: impl IntoIterator<Item = StatField>,
        has_position: bool,
    ) -> Self {
        Self {
            stat_columns: stat_columns.into_iter().collect(),
            has_position,
            rows,
        }
    }

    pub fn from_raw(raw: &RawTable) -> Result<Self, DataError> {
        const TABLE: &str = "weekly";
        let id_idx = raw.require(TABLE, "player_id")?;
        let season_idx = raw.require(TABLE, "season")?;
        let week_idx = raw.require(TABLE, "week")?;

        let name_idx = raw
            .column_index("player_display_name")
            .or_else(|| raw.column_index("player_name"));
        let position_idx = raw.column_index("position");
        let team_idx = raw
            .column_index("recent_team")
            .or_else(|| raw.column_index("team"));
        let opponent_idx = raw.column_index("opponent_team");
        let season_type_idx = raw.column_index("season_type");
        let date_idx = raw.column_index("game_date");

        let stat_idx: Vec<(StatField, usize)> = StatField::STORED
            .iter()
            .filter_map(|f| raw.column_index(f.column()).map(|idx| (*f, idx)))
            .collect();
        let fumble_parts: Vec<usize> = FUMBLE_PARTS
            .iter()
            .filter_map(|name| raw.column_index(name))
            .collect();
        let derive_fumbles =
            raw.column_index(StatField::FumblesLost.column()).is_none() && !fumble_parts.is_empty();

        let mut stat_columns: BTreeSet<StatField> = stat_idx.iter().map(|(f, _)| *f).collect();
        if derive_fumbles {
            stat_columns.insert(StatField::FumblesLost);
        }

        let mut rows = Vec::with_capacity(raw.len());
        let mut skipped = 0usize;
        for row in raw.rows() {
            let player_id = row
                .get(id_idx)
                .and_then(Cell::as_text)
                .map(PlayerId::new)
                .filter(|id| !id.is_empty());
            let (Some(player_id), Some(season), Some(week)) =
                (player_id, season_at(row, season_idx), week_at(row, week_idx))
            else {
                skipped += 1;
                continue;
            };

            let mut stats = StatLine::default();
            for (field, idx) in &stat_idx {
                stats.set(*field, row.get(*idx).and_then(Cell::as_f64));
            }
            if derive_fumbles {
                let parts: Vec<f64> = fumble_parts
                    .iter()
                    .filter_map(|idx| row.get(*idx).and_then(Cell::as_f64))
                    .collect();
                if !parts.is_empty() {
                    stats.set(StatField::FumblesLost, Some(parts.iter().sum()));
                }
            }

            rows.push(PlayerGame {
                player_id,
                player_name: text_at(row, name_idx),
                position: text_at(row, position_idx),
                team: text_at(row, team_idx),
                opponent_team: text_at(row, opponent_idx),
                season,
                week,
                season_type: text_at(row, season_type_idx),
                game_date: cell(row, date_idx).and_then(Cell::as_date),
                stats,
            });
        }
        if skipped > 0 {
            debug!(skipped, "weekly rows without usable player_id/season/week");
        }

        Ok(Self {
            stat_columns,
            has_position: position_idx.is_some(),
            rows,
        })
    }

    /// Appends another season's rows; column presence is the union of both.
    pub fn append(&mut self, other: WeeklyTable) {
        self.stat_columns.extend(other.stat_columns);
        self.has_position |= other.has_position;
        self.rows.extend(other.rows);
    }

    pub fn rows(&self) -> &[PlayerGame] {
        &self.rows
    }

    pub fn stat_columns(&self) -> &BTreeSet<StatField> {
        &self.stat_columns
    }

    pub fn has_stat(&self, field: StatField) -> bool {
        match field {
            StatField::TotalTds => {
                self.stat_columns.contains(&StatField::RushingTds)
                    && self.stat_columns.contains(&StatField::ReceivingTds)
            }
            other => self.stat_columns.contains(&other),
        }
    }

    pub fn has_position(&self) -> bool {
        self.has_position
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Seasonal rosters. Name columns are optional here; the merge step insists on them.
#[derive(Debug, Clone, Default)]
pub struct RosterTable {
    has_first_name: bool,
    has_last_name: bool,
    has_position: bool,
    rows: Vec<RosterEntry>,
}

impl RosterTable {
    pub fn from_rows(rows: Vec<RosterEntry>) -> Self {
        Self {
            has_first_name: true,
            has_last_name: true,
            has_position: true,
            rows,
        }
    }

    pub fn from_raw(raw: &RawTable) -> Result<Self, DataError> {
        const TABLE: &str = "roster";
        let id_idx = raw
            .column_index("player_id")
            .or_else(|| raw.column_index("gsis_id"))
            .ok_or(DataError::MissingField {
                table: TABLE,
                field: "player_id",
            })?;
        let season_idx = raw.require(TABLE, "season")?;

        let first_idx = raw.column_index("first_name");
        let last_idx = raw.column_index("last_name");
        let position_idx = raw.column_index("position");
        let team_idx = raw.column_index("team");
        let headshot_idx = raw.column_index("headshot_url");

        let mut rows = Vec::with_capacity(raw.len());
        for row in raw.rows() {
            let player_id = row
                .get(id_idx)
                .and_then(Cell::as_text)
                .map(PlayerId::new)
                .filter(|id| !id.is_empty());
            let (Some(player_id), Some(season)) = (player_id, season_at(row, season_idx)) else {
                continue;
            };
            rows.push(RosterEntry {
                player_id,
                season,
                first_name: text_at(row, first_idx),
                last_name: text_at(row, last_idx),
                position: text_at(row, position_idx),
                team: text_at(row, team_idx),
                headshot_url: text_at(row, headshot_idx),
            });
        }

        Ok(Self {
            has_first_name: first_idx.is_some(),
            has_last_name: last_idx.is_some(),
            has_position: position_idx.is_some(),
            rows,
        })
    }

    pub fn append(&mut self, other: RosterTable) {
        if self.rows.is_empty() {
            self.has_first_name = other.has_first_name;
            self.has_last_name = other.has_last_name;
            self.has_position = other.has_position;
        } else {
            self.has_first_name &= other.has_first_name;
            self.has_last_name &= other.has_last_name;
            self.has_position |= other.has_position;
        }
        self.rows.extend(other.rows);
    }

    pub fn rows(&self) -> &[RosterEntry] {
        &self.rows
    }

    pub fn has_first_name(&self) -> bool {
        self.has_first_name
    }

    pub fn has_last_name(&self) -> bool {
        self.has_last_name
    }

    pub fn has_position(&self) -> bool {
        self.has_position
    }

    /// Roster entry for a display name, preferring the given season.
    pub fn find_by_name(&self, full_name: &str, season: u16) -> Option<&RosterEntry> {
        let mut fallback = None;
        for entry in &self.rows {
            if entry.full_name().as_deref() != Some(full_name) {
                continue;
            }
            if entry.season == season {
                return Some(entry);
            }
            if fallback.is_none() {
                fallback = Some(entry);
            }
        }
        fallback
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleTable {
    rows: Vec<ScheduleGame>,
}

impl ScheduleTable {
    pub fn from_rows(rows: Vec<ScheduleGame>) -> Self {
        Self { rows }
    }

    pub fn from_raw(raw: &RawTable) -> Result<Self, DataError> {
        const TABLE: &str = "schedule";
        let season_idx = raw.require(TABLE, "season")?;
        let week_idx = raw.require(TABLE, "week")?;
        let home_idx = raw.require(TABLE, "home_team")?;
        let away_idx = raw.require(TABLE, "away_team")?;
        let home_score_idx = raw.column_index("home_score");
        let away_score_idx = raw.column_index("away_score");
        let game_type_idx = raw.column_index("game_type");
        let gameday_idx = raw.column_index("gameday");

        let score_at = |row: &[Cell], idx: Option<usize>| {
            cell(row, idx)
                .and_then(Cell::as_i64)
                .and_then(|v| u16::try_from(v).ok())
        };

        let mut rows = Vec::with_capacity(raw.len());
        for row in raw.rows() {
            let (Some(season), Some(week)) = (season_at(row, season_idx), week_at(row, week_idx))
            else {
                continue;
            };
            let (Some(home_team), Some(away_team)) =
                (text_at(row, Some(home_idx)), text_at(row, Some(away_idx)))
            else {
                continue;
            };
            rows.push(ScheduleGame {
                season,
                week,
                game_type: text_at(row, game_type_idx),
                gameday: cell(row, gameday_idx).and_then(Cell::as_date),
                home_team,
                away_team,
                home_score: score_at(row, home_score_idx),
                away_score: score_at(row, away_score_idx),
            });
        }
        Ok(Self { rows })
    }

    pub fn append(&mut self, other: ScheduleTable) {
        self.rows.extend(other.rows);
    }

    /// Keeps only games whose season passes the predicate.
    pub fn retain_seasons(&mut self, keep: impl Fn(u16) -> bool) {
        self.rows.retain(|g| keep(g.season));
    }

    pub fn rows(&self) -> &[ScheduleGame] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_cells_normalize_to_text() {
        assert_eq!(Cell::Int(42).as_text().as_deref(), Some("42"));
        assert_eq!(Cell::Float(42.0).as_text().as_deref(), Some("42"));
        assert_eq!(Cell::text(" 00-0033873 ").as_text().as_deref(), Some("00-0033873"));
        assert_eq!(Cell::text("   ").as_text(), None);
    }

    #[test]
    fn weekly_requires_key_columns() {
        let raw = RawTable::new(["player_id", "season"]);
        let err = WeeklyTable::from_raw(&raw).unwrap_err();
        assert_eq!(
            err,
            DataError::MissingField {
                table: "weekly",
                field: "week"
            }
        );
    }

    #[test]
    fn weekly_derives_fumbles_from_parts() {
        let mut raw = RawTable::new([
            "player_id",
            "season",
            "week",
            "rushing_fumbles_lost",
            "sack_fumbles_lost",
        ]);
        raw.push_row(vec![
            Cell::text("p1"),
            Cell::Int(2023),
            Cell::Int(1),
            Cell::Int(1),
            Cell::Float(1.0),
        ]);
        let table = WeeklyTable::from_raw(&raw).unwrap();
        assert!(table.has_stat(StatField::FumblesLost));
        assert_eq!(table.rows()[0].stat(StatField::FumblesLost), Some(2.0));
        assert!(!table.has_position());
    }

    #[test]
    fn weekly_skips_rows_without_keys() {
        let mut raw = RawTable::new(["player_id", "season", "week"]);
        raw.push_row(vec![Cell::Null, Cell::Int(2023), Cell::Int(1)]);
        raw.push_row(vec![Cell::text("p1"), Cell::Int(2023)]);
        raw.push_row(vec![Cell::text("p1"), Cell::Int(2023), Cell::Int(2)]);
        let table = WeeklyTable::from_raw(&raw).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].week, 2);
    }

    #[test]
    fn roster_accepts_gsis_id_alias() {
        let mut raw = RawTable::new(["gsis_id", "season", "first_name", "last_name"]);
        raw.push_row(vec![
            Cell::text("00-1"),
            Cell::Int(2022),
            Cell::text("Josh"),
            Cell::text("Allen"),
        ]);
        let table = RosterTable::from_raw(&raw).unwrap();
        assert_eq!(table.rows()[0].full_name().as_deref(), Some("Josh Allen"));
        assert!(!table.has_position());
    }

    #[test]
    fn appended_rosters_need_names_in_every_season() {
        let mut named = RawTable::new(["gsis_id", "season", "first_name", "last_name"]);
        named.push_row(vec![
            Cell::text("00-1"),
            Cell::Int(2022),
            Cell::text("Josh"),
            Cell::text("Allen"),
        ]);
        let mut bare = RawTable::new(["gsis_id", "season", "position"]);
        bare.push_row(vec![Cell::text("00-1"), Cell::Int(2023), Cell::text("QB")]);

        let mut table = RosterTable::default();
        table.append(RosterTable::from_raw(&named).unwrap());
        assert!(table.has_first_name() && table.has_last_name());
        assert!(!table.has_position());

        table.append(RosterTable::from_raw(&bare).unwrap());
        assert_eq!(table.rows().len(), 2);
        assert!(!table.has_first_name());
        assert!(!table.has_last_name());
        assert!(table.has_position());
    }
}
