use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::error::{DataError, LineError};
use crate::model::{PlayerId, PlayerWeek, Position, RosterEntry, StatField};
use crate::table::{RosterTable, WeeklyTable};

pub const DEFAULT_TRAILING_WINDOW: usize = 3;

/// Weekly rows joined with rosters, plus which stat columns the weekly source carried.
#[derive(Debug, Clone, Default)]
pub struct MergedStats {
    pub rows: Vec<PlayerWeek>,
    pub stat_columns: BTreeSet<StatField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub label: &'static str,
    pub field: StatField,
}

const QB_METRICS: &[MetricSpec] = &[
    MetricSpec {
        label: "Passing Yards",
        field: StatField::PassingYards,
    },
    MetricSpec {
        label: "Passing Touchdowns",
        field: StatField::PassingTds,
    },
    MetricSpec {
        label: "Rushing Touchdowns",
        field: StatField::RushingTds,
    },
];

const RB_METRICS: &[MetricSpec] = &[
    MetricSpec {
        label: "Rushing Yards",
        field: StatField::RushingYards,
    },
    MetricSpec {
        label: "Receiving Yards",
        field: StatField::ReceivingYards,
    },
    MetricSpec {
        label: "Total Touchdowns",
        field: StatField::TotalTds,
    },
];

const PASS_CATCHER_METRICS: &[MetricSpec] = &[
    MetricSpec {
        label: "Receiving Yards",
        field: StatField::ReceivingYards,
    },
    MetricSpec {
        label: "Receptions",
        field: StatField::Receptions,
    },
    MetricSpec {
        label: "Total Touchdowns",
        field: StatField::TotalTds,
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingSplit {
    pub trailing_avg: f64,
    pub season_avg: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineClassification {
    pub over: Vec<bool>,
    pub count_over: usize,
    pub count_total: usize,
    pub pct_over: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineVerdict {
    MostlyOver,
    MostlyUnder,
}

impl LineVerdict {
    pub fn arrow(self) -> &'static str {
        match self {
            Self::MostlyOver => "⬆️",
            Self::MostlyUnder => "⬇️",
        }
    }
}

/// Left-joins weekly rows with rosters on `player_id`.
///
/// Every roster entry sharing the player id produces a joined row; the entry
/// from the game's own season is emitted first so "keep first" de-duplication
/// downstream picks it. Exact duplicate rows are dropped here.
pub fn merge_player_roster(
    games: &WeeklyTable,
    rosters: &RosterTable,
) -> Result<MergedStats, DataError> {
    if !rosters.has_first_name() {
        return Err(DataError::MissingField {
            table: "roster",
            field: "first_name",
        });
    }
    if !rosters.has_last_name() {
        return Err(DataError::MissingField {
            table: "roster",
            field: "last_name",
        });
    }
    if !games.has_position() && !rosters.has_position() {
        return Err(DataError::UnresolvedPosition);
    }

    let mut by_player: HashMap<&PlayerId, Vec<&RosterEntry>> = HashMap::new();
    for entry in rosters.rows() {
        by_player.entry(&entry.player_id).or_default().push(entry);
    }

    let mut rows = Vec::with_capacity(games.len());
    for game in games.rows() {
        let Some(entries) = by_player.get(&game.player_id) else {
            rows.push(PlayerWeek {
                game: game.clone(),
                full_name: None,
                position: game.position.clone(),
                team: None,
                headshot_url: None,
            });
            continue;
        };

        let same_season = entries.iter().filter(|e| e.season == game.season);
        let other_seasons = entries.iter().filter(|e| e.season != game.season);
        for entry in same_season.chain(other_seasons) {
            let position = if rosters.has_position() {
                entry.position.clone().or_else(|| game.position.clone())
            } else {
                game.position.clone()
            };
            rows.push(PlayerWeek {
                game: game.clone(),
                full_name: entry.full_name(),
                position,
                team: entry.team.clone(),
                headshot_url: entry.headshot_url.clone(),
            });
        }
    }

    let joined = rows.len();
    let rows = dedup_exact(rows);
    debug!(joined, kept = rows.len(), "merged weekly stats with rosters");

    Ok(MergedStats {
        rows,
        stat_columns: games.stat_columns().clone(),
    })
}

fn dedup_exact(rows: Vec<PlayerWeek>) -> Vec<PlayerWeek> {
    let mut seen: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut out: Vec<PlayerWeek> = Vec::with_capacity(rows.len());
    for row in rows {
        let bucket = seen.entry(row.fingerprint()).or_default();
        if bucket.iter().any(|idx| out[*idx] == row) {
            continue;
        }
        bucket.push(out.len());
        out.push(row);
    }
    out
}

/// Headline metrics for a position string (case-insensitive). Unknown positions get none.
pub fn select_metrics(position: &str) -> &'static [MetricSpec] {
    metrics_for(&Position::parse(position))
}

pub fn metrics_for(position: &Position) -> &'static [MetricSpec] {
    match position {
        Position::Qb => QB_METRICS,
        Position::Rb => RB_METRICS,
        Position::Wr | Position::Te => PASS_CATCHER_METRICS,
        Position::Other(_) => &[],
    }
}

/// Mean of the last `window` rows against the mean of all rows.
///
/// `view` must be sorted by week and non-empty. Rows without a value for the
/// metric are skipped; a metric with no values at all averages to NaN.
pub fn trailing_vs_season(view: &[PlayerWeek], field: StatField, window: usize) -> TrailingSplit {
    debug_assert!(!view.is_empty(), "trailing_vs_season called on an empty view");
    let tail_start = view.len().saturating_sub(window);
    let trailing_avg = mean(view[tail_start..].iter().map(|r| r.stat(field)));
    let season_avg = mean(view.iter().map(|r| r.stat(field)));
    TrailingSplit {
        trailing_avg,
        season_avg,
        delta: trailing_avg - season_avg,
    }
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> f64 {
    let (sum, n) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Flags each row whose value is strictly above `threshold`.
pub fn threshold_classify(
    view: &[PlayerWeek],
    field: StatField,
    threshold: f64,
) -> LineClassification {
    classify_values(view.iter().map(|r| r.stat(field)), threshold)
}

/// Missing values count toward the total but never as over.
pub fn classify_values(
    values: impl IntoIterator<Item = Option<f64>>,
    threshold: f64,
) -> LineClassification {
    let over: Vec<bool> = values
        .into_iter()
        .map(|v| v.is_some_and(|v| v > threshold))
        .collect();
    let count_over = over.iter().filter(|o| **o).count();
    let count_total = over.len();
    let pct_over = if count_total > 0 {
        100.0 * count_over as f64 / count_total as f64
    } else {
        0.0
    };
    LineClassification {
        over,
        count_over,
        count_total,
        pct_over,
    }
}

pub fn line_verdict(classification: &LineClassification) -> LineVerdict {
    if classification.count_over as f64 > classification.count_total as f64 / 2.0 {
        LineVerdict::MostlyOver
    } else {
        LineVerdict::MostlyUnder
    }
}

/// Blank input means "no line"; anything else must be a number.
pub fn parse_line(raw: &str) -> Result<Option<f64>, LineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| LineError::NotANumber(trimmed.to_string()))
}

pub fn available_seasons(rows: &[PlayerWeek]) -> Vec<u16> {
    let set: BTreeSet<u16> = rows.iter().map(PlayerWeek::season).collect();
    set.into_iter().collect()
}

pub fn player_names(rows: &[PlayerWeek], season: u16) -> Vec<String> {
    let set: BTreeSet<&str> = rows
        .iter()
        .filter(|r| r.season() == season)
        .filter_map(|r| r.full_name.as_deref())
        .filter(|name| !name.trim().is_empty())
        .collect();
    set.into_iter().map(str::to_string).collect()
}

/// One player's season sorted by week, at most one row per (season, week).
///
/// Duplicate weeks keep the first merged row. The merge emits the game's own
/// season's roster entry ahead of other seasons, so that entry wins even when
/// it comes later in the roster source.
pub fn player_season_view(rows: &[PlayerWeek], season: u16, full_name: &str) -> Vec<PlayerWeek> {
    let mut view: Vec<PlayerWeek> = rows
        .iter()
        .filter(|r| r.season() == season && r.full_name.as_deref() == Some(full_name))
        .cloned()
        .collect();
    view.sort_by_key(PlayerWeek::week);
    let mut seen = HashSet::new();
    view.retain(|r| seen.insert((r.season(), r.week())));
    view
}

/// Chartable stats whose column exists in the weekly source, in picker order.
pub fn available_stats(stat_columns: &BTreeSet<StatField>) -> Vec<StatField> {
    StatField::STORED
        .iter()
        .copied()
        .filter(|f| stat_columns.contains(f))
        .collect()
}

/// The last `n` games by (season, week), oldest first.
pub fn recent_games(view: &[PlayerWeek], n: usize) -> Vec<PlayerWeek> {
    let mut sorted = view.to_vec();
    sorted.sort_by_key(|r| (r.season(), r.week()));
    let start = sorted.len().saturating_sub(n);
    sorted.split_off(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_handles_blank_numeric_and_text() {
        assert_eq!(parse_line("  "), Ok(None));
        assert_eq!(parse_line("52.5"), Ok(Some(52.5)));
        assert_eq!(parse_line("-3"), Ok(Some(-3.0)));
        assert_eq!(
            parse_line("fifty"),
            Err(LineError::NotANumber("fifty".to_string()))
        );
        assert!(parse_line("NaN").is_err());
    }

    #[test]
    fn verdict_needs_strict_majority() {
        let half = classify_values([Some(1.0), Some(3.0)], 2.0);
        assert_eq!(line_verdict(&half), LineVerdict::MostlyUnder);
        let most = classify_values([Some(3.0), Some(3.0), Some(1.0)], 2.0);
        assert_eq!(line_verdict(&most), LineVerdict::MostlyOver);
    }

    #[test]
    fn missing_values_count_as_not_over() {
        let c = classify_values([None, Some(12.0)], 10.0);
        assert_eq!(c.over, vec![false, true]);
        assert_eq!(c.count_total, 2);
        assert!((c.pct_over - 50.0).abs() < 1e-9);
    }

    #[test]
    fn mean_skips_missing() {
        assert_eq!(mean([Some(2.0), None, Some(4.0)].into_iter()), 3.0);
        assert!(mean([None, None].into_iter()).is_nan());
    }
}
