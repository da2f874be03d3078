use anyhow::Result;

use crate::model::SeasonRange;
use crate::table::{RosterTable, ScheduleTable, WeeklyTable};

/// Where weekly stats, rosters and schedules come from.
///
/// Implementations return whole seasons in ascending order. Each call is
/// idempotent for a given range, which is what lets [`crate::season_cache::SeasonCache`]
/// hold on to the results.
pub trait StatsSource: Send + Sync {
    fn name(&self) -> &str;

    fn weekly(&self, seasons: SeasonRange) -> Result<WeeklyTable>;

    fn rosters(&self, seasons: SeasonRange) -> Result<RosterTable>;

    fn schedules(&self, seasons: SeasonRange) -> Result<ScheduleTable>;
}
