use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use statline::aggregate::merge_player_roster;
use statline::insight::{
    InsightContext, UpcomingGame, build_prompt, next_unplayed_game, opponent_points_allowed,
    opponent_stat_allowed, parse_chat_response,
};
use statline::model::{PlayerGame, PlayerId, PlayerWeek, RosterEntry, ScheduleGame, StatField};
use statline::table::{RosterTable, ScheduleTable, WeeklyTable};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn game(week: u8, home: &str, away: &str, score: Option<(u16, u16)>) -> ScheduleGame {
    ScheduleGame {
        season: 2023,
        week,
        game_type: Some("REG".into()),
        gameday: NaiveDate::from_ymd_opt(2023, 9, 7 + u32::from(week) * 7 - 7),
        home_team: home.into(),
        away_team: away.into(),
        home_score: score.map(|(h, _)| h),
        away_score: score.map(|(_, a)| a),
    }
}

fn schedule() -> ScheduleTable {
    ScheduleTable::from_rows(vec![
        game(1, "MIA", "BUF", Some((20, 24))),
        game(1, "KC", "DET", Some((21, 20))),
        game(2, "BUF", "KC", Some((17, 30))),
        game(2, "DET", "MIA", Some((27, 10))),
        game(3, "KC", "MIA", None),
        game(3, "DET", "BUF", None),
        game(4, "MIA", "DET", None),
    ])
}

fn faced(week: u8, opponent: &str, yards: f64) -> PlayerWeek {
    let mut g = PlayerGame::new(PlayerId::new(format!("p{week}{yards}")), 2023, week);
    g.opponent_team = Some(opponent.into());
    g.stats = g.stats.with(StatField::ReceivingYards, yards);
    PlayerWeek {
        game: g,
        full_name: None,
        position: Some("WR".into()),
        team: None,
        headshot_url: None,
    }
}

#[test]
fn next_unplayed_game_is_earliest_open_week() {
    let next = next_unplayed_game(&schedule(), 2023, "MIA").expect("MIA has games left");
    assert_eq!(next.week, 3);
    assert_eq!(next.opponent, "KC");
    assert!(!next.home);
    assert!(next_unplayed_game(&schedule(), 2024, "MIA").is_none());
    assert!(next_unplayed_game(&schedule(), 2023, "SEA").is_none());
}

#[test]
fn points_allowed_averages_completed_games() {
    // KC gave up 20 to DET and 17 to BUF.
    assert_eq!(opponent_points_allowed(&schedule(), 2023, "KC"), Some(18.5));
    assert_eq!(opponent_points_allowed(&schedule(), 2023, "SEA"), None);
}

#[test]
fn stat_allowed_sums_per_week_then_averages() {
    let rows = vec![
        faced(1, "KC", 50.0),
        faced(1, "KC", 30.0),
        faced(2, "KC", 100.0),
        faced(2, "MIA", 999.0),
    ];
    let allowed = opponent_stat_allowed(&rows, 2023, "KC", StatField::ReceivingYards);
    assert_eq!(allowed, Some(90.0));
    assert_eq!(opponent_stat_allowed(&rows, 2022, "KC", StatField::ReceivingYards), None);
}

#[test]
fn prompt_mentions_averages_and_opponent() {
    let prompt = build_prompt(&InsightContext {
        player: "Pat Catcher".into(),
        position: "WR".into(),
        team: Some("MIA".into()),
        stat: StatField::ReceivingYards,
        season: 2023,
        season_avg: 72.25,
        trailing_avg: 88.0,
        line: Some(65.5),
        upcoming: Some(UpcomingGame {
            season: 2023,
            week: 3,
            opponent: "KC".into(),
            home: false,
            gameday: None,
        }),
        opponent_points_allowed: Some(18.5),
        opponent_stat_allowed: Some(90.0),
    });
    assert!(prompt.contains("Pat Catcher (WR, MIA)"));
    assert!(prompt.contains("2023 season average: 72.2") || prompt.contains("2023 season average: 72.3"));
    assert!(prompt.contains("Last 3 games average: 88.0"));
    assert!(prompt.contains("Betting line: 65.5"));
    assert!(prompt.contains("Next game: week 3 at KC"));
    assert!(prompt.contains("KC allow 18.5 points per game"));
    assert!(prompt.contains("KC allow 90.0 receiving yards per game"));
}

#[test]
fn prompt_without_schedule_says_so() {
    let prompt = build_prompt(&InsightContext {
        player: "Pat Catcher".into(),
        position: "WR".into(),
        team: None,
        stat: StatField::Receptions,
        season: 2023,
        season_avg: 5.0,
        trailing_avg: 6.0,
        line: None,
        upcoming: None,
        opponent_points_allowed: None,
        opponent_stat_allowed: None,
    });
    assert!(prompt.contains("(WR, N/A)"));
    assert!(prompt.contains("No upcoming game is scheduled."));
    assert!(!prompt.contains("Betting line"));
}

#[test]
fn parses_chat_completion_fixture() {
    let text = parse_chat_response(&read_fixture("chat_completion.json")).expect("fixture should parse");
    assert!(text.starts_with("Pat Catcher has cleared"));
    assert!(!text.ends_with('\n'));
}

#[test]
fn empty_choices_are_an_error() {
    assert!(parse_chat_response(r#"{"choices": []}"#).is_err());
    assert!(parse_chat_response(r#"{"choices": [{"message": {"content": "   "}}]}"#).is_err());
}

#[test]
fn stat_allowed_counts_each_game_once_across_roster_seasons() {
    let id = PlayerId::new("00-0042");
    let mut g = PlayerGame::new(id.clone(), 2023, 1);
    g.opponent_team = Some("KC".into());
    g.stats = g.stats.with(StatField::ReceivingYards, 50.0);
    let weekly = WeeklyTable::from_rows(vec![g], [StatField::ReceivingYards], false);
    let entry = |season: u16, team: &str| RosterEntry {
        player_id: id.clone(),
        season,
        first_name: Some("Pat".into()),
        last_name: Some("Mover".into()),
        position: Some("WR".into()),
        team: Some(team.into()),
        headshot_url: None,
    };
    let rosters = RosterTable::from_rows(vec![entry(2022, "BUF"), entry(2023, "MIA")]);
    let merged = merge_player_roster(&weekly, &rosters).unwrap();
    assert_eq!(merged.rows.len(), 2);

    let allowed = opponent_stat_allowed(&merged.rows, 2023, "KC", StatField::ReceivingYards);
    assert_eq!(allowed, Some(50.0));
}
