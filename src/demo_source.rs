//! Synthetic league for offline runs.
//!
//! Eight teams, one QB/RB/WR/TE each, a round-robin schedule and box scores
//! drawn from a seeded RNG so the same seed always produces the same league.
//! The final three weeks of the latest season are left unplayed.

use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::{
    PlayerGame, PlayerId, RosterEntry, ScheduleGame, SeasonRange, StatField, StatLine,
};
use crate::source::StatsSource;
use crate::table::{RosterTable, ScheduleTable, WeeklyTable};

const DEFAULT_SEED: u64 = 0x5747_4c4e;
const REGULAR_SEASON_WEEKS: u8 = 17;
const UNPLAYED_TAIL_WEEKS: u8 = 3;

const TEAMS: [&str; 8] = ["ARI", "BUF", "CHI", "DAL", "GB", "KC", "MIA", "SF"];
const POSITIONS: [&str; 4] = ["QB", "RB", "WR", "TE"];
const FIRST_NAMES: [&str; 8] = [
    "Avery", "Blake", "Casey", "Drew", "Emerson", "Finley", "Grey", "Harper",
];
const LAST_NAMES: [&str; 4] = ["Stone", "Rivers", "Hayes", "Brooks"];

#[derive(Debug, Clone)]
pub struct DemoSource {
    seed: u64,
}

impl Default for DemoSource {
    fn default() -> Self {
        Self { seed: DEFAULT_SEED }
    }
}

#[derive(Debug, Clone)]
struct DemoPlayer {
    id: PlayerId,
    first: &'static str,
    last: &'static str,
    position: &'static str,
    team: &'static str,
}

impl DemoSource {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    fn players(&self) -> Vec<DemoPlayer> {
        let mut out = Vec::with_capacity(TEAMS.len() * POSITIONS.len());
        for (t, team) in TEAMS.iter().enumerate() {
            for (p, position) in POSITIONS.iter().enumerate() {
                out.push(DemoPlayer {
                    id: PlayerId::new(format!("DEMO-{:02}{:02}", t, p)),
                    first: FIRST_NAMES[t],
                    last: LAST_NAMES[p],
                    position: *position,
                    team: *team,
                });
            }
        }
        out
    }

    fn latest_season(&self, seasons: SeasonRange) -> u16 {
        seasons.last()
    }

    fn season_schedule(&self, season: u16, latest: u16) -> Vec<ScheduleGame> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ (u64::from(season) << 16));
        let kickoff = season_kickoff(season);
        let mut out = Vec::new();
        for week in 1..=REGULAR_SEASON_WEEKS {
            let played = season < latest || week <= REGULAR_SEASON_WEEKS - UNPLAYED_TAIL_WEEKS;
            for (home, away) in round_robin_pairs(week) {
                out.push(ScheduleGame {
                    season,
                    week,
                    game_type: Some("REG".to_string()),
                    gameday: Some(kickoff + Duration::weeks(i64::from(week) - 1)),
                    home_team: TEAMS[home].to_string(),
                    away_team: TEAMS[away].to_string(),
                    home_score: played.then(|| rng.gen_range(10..=38)),
                    away_score: played.then(|| rng.gen_range(7..=35)),
                });
            }
        }
        out
    }
}

impl StatsSource for DemoSource {
    fn name(&self) -> &str {
        "demo"
    }

    fn weekly(&self, seasons: SeasonRange) -> Result<WeeklyTable> {
        let players = self.players();
        let latest = self.latest_season(seasons);
        let mut rows = Vec::new();
        for season in seasons.seasons() {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(u64::from(season)));
            for game in self.season_schedule(season, latest) {
                if !game.is_played() {
                    continue;
                }
                for player in players.iter().filter(|p| game.involves(p.team)) {
                    let opponent = game.opponent_of(player.team).map(str::to_string);
                    let mut row = PlayerGame::new(player.id.clone(), season, game.week);
                    row.player_name = Some(format!("{} {}", player.first, player.last));
                    row.position = Some(player.position.to_string());
                    row.team = Some(player.team.to_string());
                    row.opponent_team = opponent;
                    row.season_type = Some("REG".to_string());
                    row.game_date = game.gameday;
                    row.stats = box_score(player.position, &mut rng);
                    rows.push(row);
                }
            }
        }
        Ok(WeeklyTable::from_rows(rows, StatField::STORED, true))
    }

    fn rosters(&self, seasons: SeasonRange) -> Result<RosterTable> {
        let players = self.players();
        let mut rows = Vec::new();
        for season in seasons.seasons() {
            for player in &players {
                rows.push(RosterEntry {
                    player_id: player.id.clone(),
                    season,
                    first_name: Some(player.first.to_string()),
                    last_name: Some(player.last.to_string()),
                    position: Some(player.position.to_string()),
                    team: Some(player.team.to_string()),
                    headshot_url: None,
                });
            }
        }
        Ok(RosterTable::from_rows(rows))
    }

    fn schedules(&self, seasons: SeasonRange) -> Result<ScheduleTable> {
        let latest = self.latest_season(seasons);
        let rows = seasons
            .seasons()
            .flat_map(|season| self.season_schedule(season, latest))
            .collect();
        Ok(ScheduleTable::from_rows(rows))
    }
}

fn season_kickoff(season: u16) -> NaiveDate {
    let sept_first = NaiveDate::from_ymd_opt(i32::from(season), 9, 1).unwrap_or_default();
    // First Thursday on or after September 1st.
    let weekday = i64::from(sept_first.weekday().num_days_from_monday());
    sept_first + Duration::days((3 - weekday).rem_euclid(7))
}

/// Circle-method pairing: team 0 stays fixed, the rest rotate one slot per week.
fn round_robin_pairs(week: u8) -> Vec<(usize, usize)> {
    let n = TEAMS.len();
    let shift = usize::from(week - 1) % (n - 1);
    let mut ring: Vec<usize> = (1..n).collect();
    ring.rotate_left(shift);
    let mut slots = vec![0];
    slots.extend(ring);
    (0..n / 2)
        .map(|i| {
            let (a, b) = (slots[i], slots[n - 1 - i]);
            if week % 2 == 0 { (a, b) } else { (b, a) }
        })
        .collect()
}

fn box_score(position: &str, rng: &mut StdRng) -> StatLine {
    let mut line = StatLine::default();
    let mut set = |field: StatField, value: f64| line.set(field, Some(value));

    let (pass_yds, pass_td, ints) = if position == "QB" {
        (
            rng.gen_range(150..=360) as f64,
            rng.gen_range(0..=4) as f64,
            rng.gen_range(0..=2) as f64,
        )
    } else {
        (0.0, 0.0, 0.0)
    };
    let (rush_yds, rush_td) = match position {
        "QB" => (rng.gen_range(0..=45) as f64, f64::from(u8::from(rng.gen_bool(0.15)))),
        "RB" => (rng.gen_range(25..=150) as f64, rng.gen_range(0..=2) as f64),
        _ => (0.0, 0.0),
    };
    let (targets, catch_rate, yds_per_catch, rec_td_p): (u32, f64, f64, f64) = match position {
        "RB" => (rng.gen_range(1..=7), 0.8, 8.0, 0.1),
        "WR" => (rng.gen_range(4..=13), 0.65, 13.0, 0.35),
        "TE" => (rng.gen_range(2..=9), 0.7, 10.5, 0.25),
        _ => (0, 0.0, 0.0, 0.0),
    };
    let receptions = (0..targets).filter(|_| rng.gen_bool(catch_rate)).count() as f64;
    let rec_yds = (receptions * yds_per_catch * rng.gen_range(0.6..1.5)).round();
    let rec_td = if receptions > 0.0 && rng.gen_bool(rec_td_p) { 1.0 } else { 0.0 };
    let fumbles = f64::from(u8::from(rng.gen_bool(0.04)));

    set(StatField::PassingYards, pass_yds);
    set(StatField::PassingTds, pass_td);
    set(StatField::Interceptions, ints);
    set(StatField::RushingYards, rush_yds);
    set(StatField::RushingTds, rush_td);
    set(StatField::ReceivingYards, rec_yds);
    set(StatField::ReceivingTds, rec_td);
    set(StatField::Receptions, receptions);
    set(StatField::Targets, f64::from(targets));
    set(StatField::FumblesLost, fumbles);

    let ppr = 0.04 * pass_yds + 4.0 * pass_td - 2.0 * ints
        + 0.1 * (rush_yds + rec_yds)
        + 6.0 * (rush_td + rec_td)
        + receptions
        - 2.0 * fumbles;
    set(StatField::FantasyPointsPpr, (ppr * 100.0).round() / 100.0);
    line
}
