use anyhow::{Context, Result, anyhow};

use statline::aggregate::{line_verdict, parse_line};
use statline::cli::{arg_value, init};
use statline::nba::{NbaClient, NbaStat, classify_games, mean_stat};

fn main() -> Result<()> {
    init();
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    let client = NbaClient::from_env();
    let cfg = client.config().clone();
    let player = arg_value(&args, "--player").ok_or_else(|| anyhow!("--player \"Full Name\" is required"))?;
    let stat = match arg_value(&args, "--stat") {
        Some(raw) => raw.parse::<NbaStat>()?,
        None => NbaStat::Pts,
    };
    let season = arg_value(&args, "--season").unwrap_or(cfg.season);
    let games = match arg_value(&args, "--games") {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("invalid --games '{raw}'"))?
            .max(1),
        None => cfg.games,
    };

    let rows = client.recent_games(&player, &season, games)?;
    if rows.is_empty() {
        println!("No games found for {player} in {season}.");
        return Ok(());
    }

    println!("## {player} ({season}) last {} games", rows.len());
    println!("{:<10}  {:<12}  {:>8}", "date", "matchup", stat.column());
    for row in &rows {
        let value = row
            .stat(stat)
            .map(|v| if stat.column().ends_with("_PCT") { format!("{v:.3}") } else { format!("{v:.0}") })
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10}  {:<12}  {:>8}",
            row.game_date.format("%Y-%m-%d"),
            row.matchup,
            value
        );
    }
    if let Some(avg) = mean_stat(&rows, stat) {
        println!("Average {}: {avg:.1}", stat.label());
    }

    let Some(raw_line) = arg_value(&args, "--line") else {
        return Ok(());
    };
    match parse_line(&raw_line) {
        Ok(Some(line)) => {
            let classification = classify_games(&rows, stat, line);
            let verdict = line_verdict(&classification);
            println!();
            println!(
                "{} {player} exceeded {line} {} in {}/{} games ({:.1}% of games).",
                verdict.arrow(),
                stat.label(),
                classification.count_over,
                classification.count_total,
                classification.pct_over
            );
        }
        Ok(None) => {}
        Err(err) => println!("Please enter a valid number for the betting line ({err})."),
    }
    Ok(())
}
