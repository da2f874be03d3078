use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};

use statline::demo_source::DemoSource;
use statline::model::SeasonRange;
use statline::season_cache::SeasonCache;
use statline::source::StatsSource;
use statline::table::{RosterTable, ScheduleTable, WeeklyTable};

/// Delegates to the demo league and counts how often each table is fetched.
#[derive(Default)]
struct CountingSource {
    inner: DemoSource,
    weekly_calls: AtomicUsize,
    roster_calls: AtomicUsize,
    schedule_calls: AtomicUsize,
}

impl StatsSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    fn weekly(&self, seasons: SeasonRange) -> Result<WeeklyTable> {
        self.weekly_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.weekly(seasons)
    }

    fn rosters(&self, seasons: SeasonRange) -> Result<RosterTable> {
        self.roster_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.rosters(seasons)
    }

    fn schedules(&self, seasons: SeasonRange) -> Result<ScheduleTable> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.schedules(seasons)
    }
}

struct FailingSource;

impl StatsSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    fn weekly(&self, _: SeasonRange) -> Result<WeeklyTable> {
        Err(anyhow!("connection refused"))
    }

    fn rosters(&self, _: SeasonRange) -> Result<RosterTable> {
        Err(anyhow!("connection refused"))
    }

    fn schedules(&self, _: SeasonRange) -> Result<ScheduleTable> {
        Err(anyhow!("connection refused"))
    }
}

#[test]
fn fetches_once_per_range() {
    let source = CountingSource::default();
    let mut cache = SeasonCache::new();
    let range = SeasonRange::new(2022, 2023);

    let first = cache.weekly(&source, range).unwrap();
    let second = cache.weekly(&source, range).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(source.weekly_calls.load(Ordering::SeqCst), 1);

    cache.rosters(&source, range).unwrap();
    cache.rosters(&source, range).unwrap();
    cache.schedules(&source, range).unwrap();
    cache.schedules(&source, range).unwrap();
    assert_eq!(source.roster_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn distinct_ranges_are_distinct_keys() {
    let source = CountingSource::default();
    let mut cache = SeasonCache::new();
    cache.weekly(&source, SeasonRange::single(2023)).unwrap();
    cache.weekly(&source, SeasonRange::new(2023, 2022)).unwrap();
    cache.weekly(&source, SeasonRange::new(2022, 2023)).unwrap();
    assert_eq!(source.weekly_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn invalidate_and_clear_force_refetch() {
    let source = CountingSource::default();
    let mut cache = SeasonCache::new();
    let range = SeasonRange::single(2023);

    cache.weekly(&source, range).unwrap();
    cache.invalidate(range);
    cache.weekly(&source, range).unwrap();
    assert_eq!(source.weekly_calls.load(Ordering::SeqCst), 2);

    cache.clear();
    assert!(cache.is_empty());
    cache.weekly(&source, range).unwrap();
    assert_eq!(source.weekly_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn failures_are_not_cached() {
    let mut cache = SeasonCache::new();
    let err = cache
        .weekly(&FailingSource, SeasonRange::single(2023))
        .unwrap_err();
    assert!(format!("{err:#}").contains("connection refused"));
    assert!(cache.is_empty());
}
