//! Everything one player page shows, computed up front so the caller only formats.

use std::fmt;

use chrono::NaiveDate;
use tracing::warn;

use crate::aggregate::{
    DEFAULT_TRAILING_WINDOW, LineClassification, LineVerdict, MergedStats, available_stats,
    line_verdict, parse_line, player_season_view, recent_games, select_metrics,
    threshold_classify, trailing_vs_season,
};
use crate::model::{PlayerWeek, StatField};
use crate::table::RosterTable;

const NOT_AVAILABLE: &str = "N/A";
pub const DEFAULT_RECENT_GAMES: usize = 5;

/// Box-score columns in display order, filtered to what the source carried.
const BOX_SCORE_STATS: [StatField; 10] = [
    StatField::FantasyPointsPpr,
    StatField::PassingYards,
    StatField::PassingTds,
    StatField::Interceptions,
    StatField::RushingYards,
    StatField::RushingTds,
    StatField::ReceivingYards,
    StatField::ReceivingTds,
    StatField::Receptions,
    StatField::Targets,
];

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub season: u16,
    pub player: String,
    pub chart_stat: Option<StatField>,
    /// Raw betting line text; blank means no line.
    pub line: Option<String>,
    pub recent_games: usize,
}

impl ReportRequest {
    pub fn new(season: u16, player: impl Into<String>) -> Self {
        Self {
            season,
            player: player.into(),
            chart_stat: None,
            line: None,
            recent_games: DEFAULT_RECENT_GAMES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerHeader {
    pub name: String,
    pub position: String,
    pub team: String,
    pub headshot_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricCard {
    pub label: &'static str,
    pub field: StatField,
    pub trailing_avg: f64,
    pub season_avg: f64,
    pub delta: f64,
}

impl MetricCard {
    pub fn value_text(&self) -> String {
        format!("{:.1}", self.trailing_avg)
    }

    pub fn delta_text(&self) -> String {
        format!("{:+.1}", self.delta)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricsState {
    Cards(Vec<MetricCard>),
    NoMetrics,
    NoData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxScoreRow {
    pub week: u8,
    pub game_date: Option<NaiveDate>,
    pub opponent: Option<String>,
    pub values: Vec<Option<f64>>,
}

impl BoxScoreRow {
    pub fn date_text(&self) -> String {
        self.game_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub week: u8,
    pub value: Option<f64>,
    pub over: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineAnalysis {
    pub line: f64,
    pub classification: LineClassification,
    pub verdict: LineVerdict,
}

impl LineAnalysis {
    pub fn summary(&self, player: &str) -> String {
        let c = &self.classification;
        format!(
            "{} {player} exceeded the line in {}/{} weeks ({:.1}% of games).",
            self.verdict.arrow(),
            c.count_over,
            c.count_total,
            c.pct_over
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineState {
    NoLine,
    Invalid(String),
    Analysis(LineAnalysis),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerReport {
    pub season: u16,
    pub header: PlayerHeader,
    pub metrics: MetricsState,
    pub box_columns: Vec<StatField>,
    pub box_score: Vec<BoxScoreRow>,
    pub recent: Vec<BoxScoreRow>,
    pub chart_stat: Option<StatField>,
    pub chart: Vec<ChartPoint>,
    pub line: LineState,
}

impl PlayerReport {
    pub fn has_data(&self) -> bool {
        !self.box_score.is_empty()
    }
}

fn header_for(rosters: &RosterTable, season: u16, name: &str, view: &[PlayerWeek]) -> PlayerHeader {
    let entry = rosters.find_by_name(name, season);
    let text = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(NOT_AVAILABLE)
            .to_string()
    };
    // A player missing from the roster still has a position on their weekly rows.
    let fallback = view.first();
    PlayerHeader {
        name: name.to_string(),
        position: text(
            entry
                .and_then(|e| e.position.as_deref())
                .or_else(|| fallback.and_then(|r| r.position.as_deref())),
        ),
        team: text(
            entry
                .and_then(|e| e.team.as_deref())
                .or_else(|| fallback.and_then(|r| r.team.as_deref())),
        ),
        headshot_url: entry
            .and_then(|e| e.headshot_url.clone())
            .filter(|url| !url.trim().is_empty()),
    }
}

fn box_row(row: &PlayerWeek, columns: &[StatField]) -> BoxScoreRow {
    BoxScoreRow {
        week: row.week(),
        game_date: row.game.game_date,
        opponent: row.game.opponent_team.clone(),
        values: columns.iter().map(|f| row.stat(*f)).collect(),
    }
}

pub fn build_report(merged: &MergedStats, rosters: &RosterTable, req: &ReportRequest) -> PlayerReport {
    let view = player_season_view(&merged.rows, req.season, &req.player);
    let header = header_for(rosters, req.season, &req.player, &view);

    let metrics = if view.is_empty() {
        MetricsState::NoData
    } else {
        let specs = select_metrics(&header.position);
        if specs.is_empty() {
            MetricsState::NoMetrics
        } else {
            MetricsState::Cards(
                specs
                    .iter()
                    .map(|spec| {
                        let split = trailing_vs_season(&view, spec.field, DEFAULT_TRAILING_WINDOW);
                        MetricCard {
                            label: spec.label,
                            field: spec.field,
                            trailing_avg: split.trailing_avg,
                            season_avg: split.season_avg,
                            delta: split.delta,
                        }
                    })
                    .collect(),
            )
        }
    };

    let box_columns: Vec<StatField> = BOX_SCORE_STATS
        .into_iter()
        .filter(|f| merged.stat_columns.contains(f))
        .collect();
    let box_score: Vec<BoxScoreRow> = view.iter().map(|r| box_row(r, &box_columns)).collect();
    let recent: Vec<BoxScoreRow> = recent_games(&view, req.recent_games)
        .iter()
        .map(|r| box_row(r, &box_columns))
        .collect();

    let chartable = available_stats(&merged.stat_columns);
    let chart_stat = match req.chart_stat {
        Some(stat) if chartable.contains(&stat) => Some(stat),
        Some(stat) => {
            warn!(stat = stat.column(), "stat not in weekly source, charting default");
            chartable.first().copied()
        }
        None => chartable.first().copied(),
    };

    let line = match req.line.as_deref().map(parse_line) {
        None | Some(Ok(None)) => LineState::NoLine,
        Some(Err(err)) => LineState::Invalid(err.to_string()),
        Some(Ok(Some(value))) => match chart_stat {
            Some(stat) if !view.is_empty() => {
                let classification = threshold_classify(&view, stat, value);
                let verdict = line_verdict(&classification);
                LineState::Analysis(LineAnalysis {
                    line: value,
                    classification,
                    verdict,
                })
            }
            _ => LineState::NoLine,
        },
    };

    let over = match &line {
        LineState::Analysis(a) => Some(a.classification.over.as_slice()),
        _ => None,
    };
    let chart = match chart_stat {
        Some(stat) => view
            .iter()
            .enumerate()
            .map(|(idx, row)| ChartPoint {
                week: row.week(),
                value: row.stat(stat),
                over: over.and_then(|o| o.get(idx).copied()),
            })
            .collect(),
        None => Vec::new(),
    };

    PlayerReport {
        season: req.season,
        header,
        metrics,
        box_columns,
        box_score,
        recent,
        chart_stat,
        chart,
        line,
    }
}

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

fn write_rows(
    f: &mut fmt::Formatter<'_>,
    columns: &[StatField],
    rows: &[BoxScoreRow],
) -> fmt::Result {
    write!(f, "{:>4}  {:<10}  {:<4}", "week", "date", "opp")?;
    for col in columns {
        write!(f, "  {:>8}", short_label(*col))?;
    }
    writeln!(f)?;
    for row in rows {
        write!(
            f,
            "{:>4}  {:<10}  {:<4}",
            row.week,
            row.date_text(),
            row.opponent.as_deref().unwrap_or("-")
        )?;
        for value in &row.values {
            write!(f, "  {:>8}", cell(*value))?;
        }
        writeln!(f)?;
    }
    Ok(())
}

fn short_label(field: StatField) -> &'static str {
    match field {
        StatField::FantasyPointsPpr => "ppr",
        StatField::PassingYards => "pass_yd",
        StatField::PassingTds => "pass_td",
        StatField::Interceptions => "int",
        StatField::RushingYards => "rush_yd",
        StatField::RushingTds => "rush_td",
        StatField::ReceivingYards => "rec_yd",
        StatField::ReceivingTds => "rec_td",
        StatField::Receptions => "rec",
        StatField::Targets => "tgt",
        StatField::FumblesLost => "fum",
        StatField::TotalTds => "tot_td",
    }
}

impl fmt::Display for PlayerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &self.header;
        writeln!(f, "## {} ({})", h.name, self.season)?;
        writeln!(f, "Position: {}", h.position)?;
        writeln!(f, "Team: {}", h.team)?;
        match h.headshot_url.as_deref() {
            Some(url) => writeln!(f, "Headshot: {url}")?,
            None => writeln!(f, "No image available.")?,
        }
        writeln!(f)?;

        match &self.metrics {
            MetricsState::NoData => {
                writeln!(f, "No data available for this player in the selected season.")?;
                return Ok(());
            }
            MetricsState::NoMetrics => writeln!(f, "No metrics available for this position.")?,
            MetricsState::Cards(cards) => {
                for card in cards {
                    writeln!(
                        f,
                        "{:<20} {:>7}  ({} vs season {:.1})",
                        card.label,
                        card.value_text(),
                        card.delta_text(),
                        card.season_avg
                    )?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "### Game-by-Game Stats")?;
        write_rows(f, &self.box_columns, &self.box_score)?;

        if !self.recent.is_empty() {
            writeln!(f)?;
            writeln!(f, "### Last {} Games", self.recent.len())?;
            write_rows(f, &self.box_columns, &self.recent)?;
        }

        if let Some(stat) = self.chart_stat {
            writeln!(f)?;
            writeln!(f, "### {} by Week", stat.label())?;
            for point in &self.chart {
                let mark = match point.over {
                    Some(true) => " over",
                    Some(false) => " under",
                    None => "",
                };
                writeln!(f, "week {:>2}: {:>8}{mark}", point.week, cell(point.value))?;
            }
        }

        match &self.line {
            LineState::NoLine => {}
            LineState::Invalid(msg) => {
                writeln!(f)?;
                writeln!(f, "Please enter a valid number for the betting line ({msg}).")?;
            }
            LineState::Analysis(analysis) => {
                writeln!(f)?;
                writeln!(f, "### Betting Line Analysis")?;
                writeln!(f, "{}", analysis.summary(&h.name))?;
            }
        }
        Ok(())
    }
}
