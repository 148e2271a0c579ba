//! Calendar rollups of session measurements
//!
//! Sessions are folded into monthly, yearly and hour-of-day buckets by the
//! calendar fields of their start time in the report time zone. Only valid
//! sessions are folded, and the filter is applied once, before bucketing.

use crate::grouping::group_by;
use crate::session::SessionMeasurement;
use chrono::{DateTime, Datelike, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use utoipa::ToSchema;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Running totals of a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketTotals {
    pub total_energy_kwh: f64,
    pub total_cost: f64,
    pub session_count: usize,
    pub total_hours: f64,
}

impl BucketTotals {
    pub fn add(&mut self, m: &SessionMeasurement) {
        self.total_energy_kwh += m.energy_consumed_kwh;
        self.total_cost += m.total_cost;
        self.session_count += 1;
        self.total_hours += m.duration_hours;
    }

    pub fn fold<'a, I>(measurements: I) -> Self
    where
        I: IntoIterator<Item = &'a SessionMeasurement>,
    {
        let mut totals = Self::default();
        for m in measurements {
            totals.add(m);
        }
        totals
    }
}

/// One row of the monthly table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBucket {
    pub year: i32,
    /// 1-based month
    pub month: u32,
    /// e.g. "March '24"
    pub label: String,
    pub owner: Option<String>,
    #[serde(flatten)]
    pub totals: BucketTotals,
}

/// One row of the yearly table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyBucket {
    pub year: i32,
    pub owner: Option<String>,
    #[serde(flatten)]
    pub totals: BucketTotals,
}

/// Quantity summed per hour in the hourly histogram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HourlyMetric {
    #[default]
    Energy,
    Cost,
}

/// One bar of the hourly histogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPoint {
    pub hour: u32,
    /// e.g. "7:00"
    pub label: String,
    pub value: f64,
}

/// Hour-of-day distribution for one reference year; always 24 points, hour 0 first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyHistogram {
    pub year: i32,
    pub metric: HourlyMetric,
    pub points: Vec<HourlyPoint>,
}

impl HourlyHistogram {
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// `"<MonthName> '<YY>"`
pub fn month_label(year: i32, month: u32) -> String {
    let name = month_name(month);
    format!("{} '{:02}", name, year.rem_euclid(100))
}

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get((month as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("Unknown")
}

fn local_start(m: &SessionMeasurement, tz: Tz) -> Option<DateTime<Tz>> {
    m.start_time.map(|t| t.with_timezone(&tz))
}

fn valid(measurements: &[SessionMeasurement]) -> impl Iterator<Item = &SessionMeasurement> {
    measurements.iter().filter(|m| m.is_valid())
}

/// Owner names ascending; sessions without owner first
fn cmp_owner(a: Option<&String>, b: Option<&String>) -> Ordering {
    a.cmp(&b)
}

/// Monthly buckets keyed by (year, month, owner)
///
/// Sorted by year descending, month descending, owner ascending.
pub fn monthly_buckets(measurements: &[SessionMeasurement], tz: Tz) -> Vec<MonthlyBucket> {
    let keyed = valid(measurements).filter_map(|m| {
        local_start(m, tz).map(|start| ((start.year(), start.month(), m.owner.clone()), m))
    });

    let mut rows: Vec<MonthlyBucket> = group_by(keyed, |(key, _)| key.clone())
        .into_iter()
        .map(|((year, month, owner), group)| MonthlyBucket {
            year,
            month,
            label: month_label(year, month),
            owner,
            totals: BucketTotals::fold(group.into_iter().map(|(_, m)| m)),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.year
            .cmp(&a.year)
            .then_with(|| b.month.cmp(&a.month))
            .then_with(|| cmp_owner(a.owner.as_ref(), b.owner.as_ref()))
    });
    rows
}

/// Yearly buckets keyed by (year, owner)
///
/// Sorted by year descending, then owner ascending.
pub fn yearly_buckets(measurements: &[SessionMeasurement], tz: Tz) -> Vec<YearlyBucket> {
    let keyed = valid(measurements)
        .filter_map(|m| local_start(m, tz).map(|start| ((start.year(), m.owner.clone()), m)));

    let mut rows: Vec<YearlyBucket> = group_by(keyed, |(key, _)| key.clone())
        .into_iter()
        .map(|((year, owner), group)| YearlyBucket {
            year,
            owner,
            totals: BucketTotals::fold(group.into_iter().map(|(_, m)| m)),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.year
            .cmp(&a.year)
            .then_with(|| cmp_owner(a.owner.as_ref(), b.owner.as_ref()))
    });
    rows
}

/// Hour-of-day histogram of sessions starting in `year`
pub fn hourly_distribution(
    measurements: &[SessionMeasurement],
    tz: Tz,
    year: i32,
    metric: HourlyMetric,
) -> HourlyHistogram {
    let mut values = [0.0_f64; 24];
    for m in valid(measurements) {
        let Some(start) = local_start(m, tz) else {
            continue;
        };
        if start.year() != year {
            continue;
        }
        values[start.hour() as usize] += match metric {
            HourlyMetric::Energy => m.energy_consumed_kwh,
            HourlyMetric::Cost => m.total_cost,
        };
    }

    HourlyHistogram {
        year,
        metric,
        points: (0u32..)
            .zip(values)
            .map(|(hour, value)| HourlyPoint {
                hour,
                label: format!("{}:00", hour),
                value,
            })
            .collect(),
    }
}
