//! Sample-window usage analytics
//!
//! Unlike the session rollups in [`crate::aggregate`], these figures window
//! the raw samples first (by the sample's own timestamp) and then measure the
//! sessions inside the window, so a session crossing a month boundary
//! contributes its in-window part to each month.

use crate::aggregate::month_name;
use crate::grouping::{group_by, group_sessions};
use crate::sample::Sample;
use crate::session::reduce_session;
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Usage over an arbitrary set of samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodUsage {
    pub record_count: usize,
    pub total_hours: f64,
    pub total_energy_kwh: f64,
    pub max_power_kw: f64,
    pub avg_power_kw: f64,
}

/// Usage of one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyUsage {
    pub year: i32,
    pub month: u32,
    pub month_name: &'static str,
    #[serde(flatten)]
    pub usage: PeriodUsage,
}

/// Measure usage over `samples`; hours and energy are summed per session
pub fn period_usage<'a, I>(samples: I) -> PeriodUsage
where
    I: IntoIterator<Item = &'a Sample>,
{
    let records: Vec<&Sample> = samples.into_iter().collect();
    if records.is_empty() {
        return PeriodUsage::default();
    }

    let (total_hours, total_energy_kwh) = group_sessions(records.iter().copied())
        .into_iter()
        .map(|(id, group)| reduce_session(id, group))
        .fold((0.0, 0.0), |(hours, kwh), m| {
            (hours + m.duration_hours, kwh + m.energy_consumed_kwh)
        });

    PeriodUsage {
        record_count: records.len(),
        total_hours,
        total_energy_kwh,
        max_power_kw: records.iter().map(|s| s.power_kw).fold(0.0_f64, f64::max),
        avg_power_kw: records.iter().map(|s| s.power_kw).sum::<f64>() / records.len() as f64,
    }
}

/// Usage of all samples recorded in `year`
pub fn year_usage(samples: &[Sample], tz: Tz, year: i32) -> PeriodUsage {
    period_usage(
        samples
            .iter()
            .filter(|s| s.timestamp.with_timezone(&tz).year() == year),
    )
}

fn month_index(year: i32, month: u32) -> i64 {
    i64::from(year) * 12 + i64::from(month) - 1
}

/// Per-month usage over the last `months` calendar months, current month included.
///
/// Sorted newest month first; months without samples are omitted.
pub fn recent_monthly_usage(
    samples: &[Sample],
    tz: Tz,
    now: DateTime<Utc>,
    months: u32,
) -> Vec<MonthlyUsage> {
    let local_now = now.with_timezone(&tz);
    let first_month =
        month_index(local_now.year(), local_now.month()) - i64::from(months.max(1)) + 1;

    let in_window = samples.iter().filter_map(|s| {
        let local = s.timestamp.with_timezone(&tz);
        (month_index(local.year(), local.month()) >= first_month)
            .then_some(((local.year(), local.month()), s))
    });

    let mut rows: Vec<MonthlyUsage> = group_by(in_window, |(key, _)| *key)
        .into_iter()
        .map(|((year, month), group)| MonthlyUsage {
            year,
            month,
            month_name: month_name(month),
            usage: period_usage(group.into_iter().map(|(_, s)| s)),
        })
        .collect();
    rows.sort_by(|a, b| b.year.cmp(&a.year).then_with(|| b.month.cmp(&a.month)));
    rows
}
