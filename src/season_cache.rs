use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::model::SeasonRange;
use crate::source::StatsSource;
use crate::table::{RosterTable, ScheduleTable, WeeklyTable};

/// Fetched tables keyed by season range. Entries live until the caller invalidates them.
#[derive(Debug, Default)]
pub struct SeasonCache {
    weekly: HashMap<SeasonRange, Arc<WeeklyTable>>,
    rosters: HashMap<SeasonRange, Arc<RosterTable>>,
    schedules: HashMap<SeasonRange, Arc<ScheduleTable>>,
}

impl SeasonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weekly(
        &mut self,
        source: &dyn StatsSource,
        seasons: SeasonRange,
    ) -> Result<Arc<WeeklyTable>> {
        if let Some(hit) = self.weekly.get(&seasons) {
            return Ok(Arc::clone(hit));
        }
        let table = source
            .weekly(seasons)
            .with_context(|| format!("fetch weekly stats {seasons} from {}", source.name()))?;
        info!(source = source.name(), %seasons, rows = table.len(), "weekly stats loaded");
        let table = Arc::new(table);
        self.weekly.insert(seasons, Arc::clone(&table));
        Ok(table)
    }

    pub fn rosters(
        &mut self,
        source: &dyn StatsSource,
        seasons: SeasonRange,
    ) -> Result<Arc<RosterTable>> {
        if let Some(hit) = self.rosters.get(&seasons) {
            return Ok(Arc::clone(hit));
        }
        let table = source
            .rosters(seasons)
            .with_context(|| format!("fetch rosters {seasons} from {}", source.name()))?;
        info!(source = source.name(), %seasons, rows = table.rows().len(), "rosters loaded");
        let table = Arc::new(table);
        self.rosters.insert(seasons, Arc::clone(&table));
        Ok(table)
    }

    pub fn schedules(
        &mut self,
        source: &dyn StatsSource,
        seasons: SeasonRange,
    ) -> Result<Arc<ScheduleTable>> {
        if let Some(hit) = self.schedules.get(&seasons) {
            return Ok(Arc::clone(hit));
        }
        let table = source
            .schedules(seasons)
            .with_context(|| format!("fetch schedules {seasons} from {}", source.name()))?;
        info!(source = source.name(), %seasons, rows = table.len(), "schedules loaded");
        let table = Arc::new(table);
        self.schedules.insert(seasons, Arc::clone(&table));
        Ok(table)
    }

    pub fn invalidate(&mut self, seasons: SeasonRange) {
        self.weekly.remove(&seasons);
        self.rosters.remove(&seasons);
        self.schedules.remove(&seasons);
    }

    pub fn clear(&mut self) {
        self.weekly.clear();
        self.rosters.clear();
        self.schedules.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.weekly.is_empty() && self.rosters.is_empty() && self.schedules.is_empty()
    }
}
