use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::env_cfg::{env_parse, env_string};
use crate::error::DataError;
use crate::http_cache::HttpCache;
use crate::http_client::http_client;
use crate::model::SeasonRange;
use crate::source::StatsSource;
use crate::table::{Cell, RawTable, RosterTable, ScheduleTable, WeeklyTable};

const NFLVERSE_RELEASES: &str = "https://github.com/nflverse/nflverse-data/releases/download";
const SEASON_PLACEHOLDER: &str = "{season}";
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone)]
pub struct NflverseConfig {
    /// URL template; `{season}` is replaced with the four-digit season.
    pub weekly_url: String,
    pub roster_url: String,
    /// One file covering every season.
    pub schedule_url: String,
    pub parallelism: usize,
}

impl Default for NflverseConfig {
    fn default() -> Self {
        Self {
            weekly_url: format!("{NFLVERSE_RELEASES}/player_stats/player_stats_{{season}}.parquet"),
            roster_url: format!("{NFLVERSE_RELEASES}/rosters/roster_{{season}}.parquet"),
            schedule_url: format!("{NFLVERSE_RELEASES}/schedules/games.parquet"),
            parallelism: 4,
        }
    }
}

impl NflverseConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            weekly_url: env_string("NFLVERSE_WEEKLY_URL").unwrap_or(defaults.weekly_url),
            roster_url: env_string("NFLVERSE_ROSTER_URL").unwrap_or(defaults.roster_url),
            schedule_url: env_string("NFLVERSE_SCHEDULE_URL").unwrap_or(defaults.schedule_url),
            parallelism: env_parse::<usize>("FETCH_PARALLELISM")
                .unwrap_or(defaults.parallelism)
                .clamp(1, 16),
        }
    }
}

/// nflverse release files, downloaded through the disk cache and decoded from parquet.
#[derive(Debug)]
pub struct NflverseSource {
    cfg: NflverseConfig,
    cache: HttpCache,
}

impl NflverseSource {
    pub fn new(cfg: NflverseConfig, cache: HttpCache) -> Self {
        Self { cfg, cache }
    }

    pub fn from_env() -> Self {
        Self::new(NflverseConfig::from_env(), HttpCache::from_env())
    }

    fn download(&self, url: &str) -> Result<RawTable> {
        let client = http_client()?;
        let path = self.cache.fetch_file(client, url, &[])?;
        read_parquet(&path).with_context(|| format!("decode parquet from {url}"))
    }

    /// Fetches one file per season in parallel and concatenates them in season order.
    /// A season that fails is skipped with a warning unless every season fails.
    fn per_season<T, F>(&self, template: &str, seasons: SeasonRange, parse: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&RawTable) -> Result<T, DataError> + Sync,
    {
        let wanted: Vec<u16> = seasons.seasons().collect();
        let fetch_one = |season: &u16| {
            let url = template.replace(SEASON_PLACEHOLDER, &season.to_string());
            let parsed = self
                .download(&url)
                .and_then(|raw| parse(&raw).map_err(anyhow::Error::from));
            (*season, parsed)
        };
        let results: Vec<(u16, Result<T>)> = with_fetch_pool(self.cfg.parallelism, || {
            wanted.par_iter().map(fetch_one).collect()
        });
        collect_seasons(results)
    }
}

/// Orders per-season results by season and drops the failed ones.
/// A [`DataError`] in any season is fatal; so is every season failing.
fn collect_seasons<T>(mut results: Vec<(u16, Result<T>)>) -> Result<Vec<T>> {
    results.sort_by_key(|(season, _)| *season);

    let mut out = Vec::with_capacity(results.len());
    let mut last_err = None;
    for (season, result) in results {
        match result {
            Ok(table) => out.push(table),
            Err(err) => {
                // A missing-column error means the file is unusable, not unavailable.
                if err.downcast_ref::<DataError>().is_some() {
                    return Err(err.context(format!("season {season}")));
                }
                warn!(season, error = %err, "season fetch failed");
                last_err = Some(err);
            }
        }
    }
    if out.is_empty() {
        return Err(last_err.unwrap_or_else(|| anyhow!("no seasons requested")));
    }
    Ok(out)
}

impl StatsSource for NflverseSource {
    fn name(&self) -> &str {
        "nflverse"
    }

    fn weekly(&self, seasons: SeasonRange) -> Result<WeeklyTable> {
        let parts = self.per_season(&self.cfg.weekly_url, seasons, WeeklyTable::from_raw)?;
        let mut table = WeeklyTable::default();
        for part in parts {
            table.append(part);
        }
        Ok(table)
    }

    fn rosters(&self, seasons: SeasonRange) -> Result<RosterTable> {
        let parts = self.per_season(&self.cfg.roster_url, seasons, RosterTable::from_raw)?;
        let mut table = RosterTable::default();
        for part in parts {
            table.append(part);
        }
        Ok(table)
    }

    fn schedules(&self, seasons: SeasonRange) -> Result<ScheduleTable> {
        let raw = self.download(&self.cfg.schedule_url)?;
        let mut table = ScheduleTable::from_raw(&raw)?;
        table.retain_seasons(|s| seasons.contains(s));
        info!(%seasons, games = table.len(), "schedule filtered");
        Ok(table)
    }
}

fn with_fetch_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}

/// Reads a flat parquet file into a [`RawTable`], addressing cells by column name.
pub fn read_parquet(path: &Path) -> Result<RawTable> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader")?;
    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let mut table = RawTable::new(columns);
    let width = table.columns().len();

    let iter = reader.get_row_iter(None).context("iterate parquet rows")?;
    for row in iter {
        let row = row.context("decode parquet row")?;
        let mut cells = vec![Cell::Null; width];
        for (name, field) in row.get_column_iter() {
            if let Some(idx) = table.column_index(name) {
                cells[idx] = cell_from_field(field);
            }
        }
        table.push_row(cells);
    }
    Ok(table)
}

fn cell_from_field(field: &Field) -> Cell {
    match field {
        Field::Null => Cell::Null,
        Field::Bool(v) => Cell::Bool(*v),
        Field::Byte(v) => Cell::Int(i64::from(*v)),
        Field::Short(v) => Cell::Int(i64::from(*v)),
        Field::Int(v) => Cell::Int(i64::from(*v)),
        Field::Long(v) => Cell::Int(*v),
        Field::UByte(v) => Cell::Int(i64::from(*v)),
        Field::UShort(v) => Cell::Int(i64::from(*v)),
        Field::UInt(v) => Cell::Int(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v).map(Cell::Int).unwrap_or(Cell::Null),
        Field::Float(v) => Cell::Float(f64::from(*v)),
        Field::Double(v) => Cell::Float(*v),
        Field::Str(v) => Cell::Text(v.clone()),
        Field::Date(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(Cell::Date)
            .unwrap_or(Cell::Null),
        _ => Cell::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parquet_dates_are_days_since_epoch() {
        assert_eq!(
            cell_from_field(&Field::Date(0)),
            Cell::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        );
        assert_eq!(
            cell_from_field(&Field::Date(19_613)),
            Cell::Date(NaiveDate::from_ymd_opt(2023, 9, 13).unwrap())
        );
    }

    #[test]
    fn default_templates_carry_season_placeholder() {
        let cfg = NflverseConfig::default();
        assert!(cfg.weekly_url.contains(SEASON_PLACEHOLDER));
        assert!(cfg.roster_url.contains(SEASON_PLACEHOLDER));
        assert!(!cfg.schedule_url.contains(SEASON_PLACEHOLDER));
    }

    #[test]
    fn failed_season_is_skipped_and_order_restored() {
        let results = vec![
            (2023, Ok("b")),
            (2021, Err(anyhow!("http 404"))),
            (2022, Ok("a")),
        ];
        assert_eq!(collect_seasons(results).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn every_season_failing_returns_last_error() {
        let results: Vec<(u16, Result<&str>)> = vec![
            (2022, Err(anyhow!("http 500"))),
            (2023, Err(anyhow!("http 404"))),
        ];
        let err = collect_seasons(results).unwrap_err();
        assert_eq!(err.to_string(), "http 404");

        let none: Vec<(u16, Result<&str>)> = Vec::new();
        assert!(collect_seasons(none).is_err());
    }

    #[test]
    fn missing_column_is_fatal_even_if_other_seasons_load() {
        let results = vec![
            (2022, Ok("a")),
            (
                2023,
                Err(anyhow::Error::from(DataError::MissingField {
                    table: "weekly",
                    field: "week",
                })),
            ),
        ];
        let err = collect_seasons(results).unwrap_err();
        assert_eq!(err.to_string(), "season 2023");
        assert!(err.downcast_ref::<DataError>().is_some());
    }
}
