use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use statline::aggregate::{LineVerdict, line_verdict};
use statline::nba::{
    NbaStat, classify_games, find_player_id, last_games, mean_stat, parse_game_log_json,
    parse_players_json,
};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_player_index_fixture() {
    let raw = read_fixture("nba_players.json");
    let players = parse_players_json(&raw).expect("fixture should parse");
    assert_eq!(players.len(), 3);
    assert!(!players[0].is_active);
    assert_eq!(find_player_id(&players, "Shai Gilgeous-Alexander"), Some(1628983));
    assert_eq!(find_player_id(&players, "lebron james"), Some(2544));
    assert_eq!(find_player_id(&players, "Broken Row"), None);
}

#[test]
fn parses_game_log_fixture() {
    let raw = read_fixture("nba_gamelog.json");
    let rows = parse_game_log_json(&raw).expect("fixture should parse");
    // The row without a date is dropped.
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].game_id, "0022300104");
    assert_eq!(rows[0].matchup, "OKC vs. SAS");
    assert_eq!(rows[0].game_date, NaiveDate::from_ymd_opt(2023, 11, 3).unwrap());
    assert_eq!(rows[0].stat(NbaStat::Pts), Some(29.0));
    assert_eq!(rows[0].stat(NbaStat::FgPct), Some(0.55));
    assert_eq!(rows[1].stat(NbaStat::Fg3m), Some(0.0));
}

#[test]
fn last_games_keeps_most_recent_oldest_first() {
    let rows = parse_game_log_json(&read_fixture("nba_gamelog.json")).unwrap();
    let recent = last_games(&rows, 3);
    let dates: Vec<String> = recent
        .iter()
        .map(|r| r.game_date.format("%m-%d").to_string())
        .collect();
    assert_eq!(dates, vec!["10-30", "11-01", "11-03"]);
    assert_eq!(last_games(&rows, 10).len(), 5);
}

#[test]
fn classifies_points_against_line() {
    let rows = parse_game_log_json(&read_fixture("nba_gamelog.json")).unwrap();
    let recent = last_games(&rows, 5);
    let points = classify_games(&recent, NbaStat::Pts, 28.5);
    // 33, 23, 24, 33, 29 in date order.
    assert_eq!(points.over, vec![true, false, false, true, true]);
    assert_eq!(points.count_over, 3);
    assert_eq!(line_verdict(&points), LineVerdict::MostlyOver);

    let avg = mean_stat(&recent, NbaStat::Pts).unwrap();
    assert!((avg - 28.4).abs() < 1e-9);
}

#[test]
fn rejects_payload_without_result_sets() {
    assert!(parse_game_log_json(r#"{"resultSets": []}"#).is_err());
    assert!(parse_game_log_json("not json").is_err());
}
