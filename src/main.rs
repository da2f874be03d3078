use anyhow::{Context, Result, anyhow};
use tracing::info;

use statline::aggregate::{
    DEFAULT_TRAILING_WINDOW, available_seasons, merge_player_roster, player_names,
    player_season_view, trailing_vs_season,
};
use statline::cli::{arg_value, has_flag, init};
use statline::demo_source::DemoSource;
use statline::env_cfg::env_string;
use statline::insight::{
    InsightClient, InsightContext, InsightOutcome, build_prompt, next_unplayed_game,
    opponent_points_allowed, opponent_stat_allowed,
};
use statline::model::{PlayerWeek, SeasonRange, StatField};
use statline::nflverse::NflverseSource;
use statline::report::{LineState, PlayerReport, ReportRequest, build_report};
use statline::season_cache::SeasonCache;
use statline::source::StatsSource;

const DEFAULT_SEASON: u16 = 2023;

fn main() -> Result<()> {
    init();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print_usage();
        return Ok(());
    }

    let requested_season = arg_value(&args, "--season")
        .map(|raw| raw.parse::<u16>().with_context(|| format!("invalid --season '{raw}'")))
        .transpose()?;
    let range = resolve_range(&args, requested_season)?;

    let source: Box<dyn StatsSource> = if has_flag(&args, "--demo") {
        Box::new(DemoSource::default())
    } else {
        Box::new(NflverseSource::from_env())
    };
    info!(source = source.name(), seasons = %range, "loading");

    let mut cache = SeasonCache::new();
    let weekly = cache.weekly(source.as_ref(), range)?;
    let rosters = cache.rosters(source.as_ref(), range)?;
    let merged = merge_player_roster(&weekly, &rosters).context("merge weekly stats with rosters")?;

    let seasons = available_seasons(&merged.rows);
    let season = match requested_season {
        Some(season) if seasons.contains(&season) => season,
        Some(season) => return Err(anyhow!("no weekly stats for season {season} in {range}")),
        None => seasons
            .last()
            .copied()
            .ok_or_else(|| anyhow!("no weekly stats for {range}"))?,
    };

    let names = player_names(&merged.rows, season);
    if has_flag(&args, "--list-players") {
        for name in &names {
            println!("{name}");
        }
        return Ok(());
    }

    let player = match arg_value(&args, "--player") {
        Some(name) => name,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("no players with a name in season {season}"))?,
    };
    let chart_stat = arg_value(&args, "--stat")
        .map(|raw| raw.parse::<StatField>())
        .transpose()?;

    let mut req = ReportRequest::new(season, player);
    req.chart_stat = chart_stat;
    req.line = arg_value(&args, "--line");
    let report = build_report(&merged, &rosters, &req);
    print!("{report}");

    if has_flag(&args, "--insight") && report.has_data() {
        println!();
        println!("### AI Insight");
        match insight_prompt(&mut cache, source.as_ref(), range, &merged.rows, &report) {
            Ok(Some(prompt)) => match InsightClient::from_env().generate(&prompt) {
                InsightOutcome::Text(text) => println!("{text}"),
                InsightOutcome::Unavailable(reason) => println!("Insight unavailable: {reason}"),
                InsightOutcome::Failed(reason) => println!("Insight failed: {reason}"),
            },
            Ok(None) => println!("Insight unavailable: no stat selected"),
            Err(err) => println!("Insight unavailable: {err:#}"),
        }
    }

    Ok(())
}

fn resolve_range(args: &[String], season: Option<u16>) -> Result<SeasonRange> {
    if let Some(raw) = arg_value(args, "--seasons").or_else(|| env_string("STATLINE_SEASONS")) {
        let range = raw.parse::<SeasonRange>()?;
        if let Some(season) = season.filter(|s| !range.contains(*s)) {
            return Err(anyhow!("--season {season} is outside {range}"));
        }
        return Ok(range);
    }
    Ok(SeasonRange::single(season.unwrap_or(DEFAULT_SEASON)))
}

fn insight_prompt(
    cache: &mut SeasonCache,
    source: &dyn StatsSource,
    range: SeasonRange,
    rows: &[PlayerWeek],
    report: &PlayerReport,
) -> Result<Option<String>> {
    let Some(stat) = report.chart_stat else {
        return Ok(None);
    };
    let season = report.season;
    let view = player_season_view(rows, season, &report.header.name);
    if view.is_empty() {
        return Ok(None);
    }
    let split = trailing_vs_season(&view, stat, DEFAULT_TRAILING_WINDOW);
    let team = view
        .last()
        .and_then(|r| r.game.team.clone().or_else(|| r.team.clone()))
        .filter(|t| !t.is_empty());

    let schedule = cache.schedules(source, range)?;
    let upcoming = team
        .as_deref()
        .and_then(|team| next_unplayed_game(&schedule, season, team));
    let (points_allowed, stat_allowed) = match upcoming.as_ref() {
        Some(game) => (
            opponent_points_allowed(&schedule, season, &game.opponent),
            opponent_stat_allowed(rows, season, &game.opponent, stat),
        ),
        None => (None, None),
    };
    let line = match &report.line {
        LineState::Analysis(analysis) => Some(analysis.line),
        _ => None,
    };

    Ok(Some(build_prompt(&InsightContext {
        player: report.header.name.clone(),
        position: report.header.position.clone(),
        team,
        stat,
        season,
        season_avg: split.season_avg,
        trailing_avg: split.trailing_avg,
        line,
        upcoming,
        opponent_points_allowed: points_allowed,
        opponent_stat_allowed: stat_allowed,
    })))
}

fn print_usage() {
    println!("statline: NFL player trends and betting-line history");
    println!();
    println!("  --season N           season to show (default: latest loaded)");
    println!("  --seasons A-B        seasons to load (or STATLINE_SEASONS)");
    println!("  --player \"Name\"      full name as on the roster");
    println!("  --stat COLUMN        stat to chart, e.g. receiving_yards");
    println!("  --line VALUE         betting line to compare against");
    println!("  --list-players       print player names for the season");
    println!("  --insight            ask the language model for an outlook");
    println!("  --demo               use the built-in synthetic league");
}
