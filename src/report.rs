//! Report assembly
//!
//! Composes parsing, session reduction, calendar rollups and usage analytics
//! into the views served to the dashboards. Everything is recomputed from the
//! full sample set on every call; nothing here is cached or persisted.

use crate::aggregate::{
    HourlyHistogram, HourlyMetric, MonthlyBucket, YearlyBucket, hourly_distribution,
    monthly_buckets, yearly_buckets,
};
use crate::config::ReportConfig;
use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::sample::{Sample, SampleBatch};
use crate::session::{SessionMeasurement, SessionSeries, measure_sessions, session_series};
use crate::usage::{MonthlyUsage, PeriodUsage, recent_monthly_usage, year_usage};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeSet;

/// Grand totals over valid sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_energy_kwh: f64,
    pub total_sessions: usize,
    pub total_cost: f64,
    /// 0 when there are no valid sessions
    pub average_energy_per_session_kwh: f64,
    pub total_hours: f64,
    /// Sessions measured but left out of all totals
    pub ignored_sessions: usize,
}

/// Usage analytics section of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub current_year: PeriodUsage,
    pub monthly: Vec<MonthlyUsage>,
}

/// Full report for one viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub timezone: String,
    pub currency: String,
    /// Owner the report is scoped to; `None` for the admin view
    pub owner: Option<String>,
    pub reference_year: i32,
    pub summary: Summary,
    pub yearly: Vec<YearlyBucket>,
    pub monthly: Vec<MonthlyBucket>,
    pub hourly: HourlyHistogram,
    pub usage: UsageReport,
    /// Valid sessions, newest first
    pub sessions: Vec<SessionMeasurement>,
    pub skipped_samples: usize,
}

/// Per-request report parameters
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub owner: Option<String>,
    /// Reference year of the hourly histogram and usage summary; defaults to
    /// the current year in the report time zone
    pub year: Option<i32>,
    pub metric: HourlyMetric,
    pub now: DateTime<Utc>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            owner: None,
            year: None,
            metric: HourlyMetric::default(),
            now: Utc::now(),
        }
    }
}

impl ReportOptions {
    pub fn for_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }
}

/// Grand totals over the valid sessions among `measurements`
pub fn summarize(measurements: &[SessionMeasurement]) -> Summary {
    let mut summary = Summary::default();
    for m in measurements {
        if !m.is_valid() {
            summary.ignored_sessions += 1;
            continue;
        }
        summary.total_sessions += 1;
        summary.total_energy_kwh += m.energy_consumed_kwh;
        summary.total_cost += m.total_cost;
        summary.total_hours += m.duration_hours;
    }
    if summary.total_sessions > 0 {
        summary.average_energy_per_session_kwh =
            summary.total_energy_kwh / summary.total_sessions as f64;
    }
    summary
}

/// Ids of the sessions owned by `owner`
pub fn owner_sessions(samples: &[Sample], owner: &str) -> BTreeSet<String> {
    measure_sessions(samples)
        .into_iter()
        .filter(|m| m.owner.as_deref() == Some(owner))
        .map(|m| m.session_id)
        .collect()
}

/// Builds reports from decoded sample batches
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    tz: Tz,
    currency: String,
    recent_months: u32,
    logger: StructuredLogger,
}

impl ReportAssembler {
    pub fn new(tz: Tz, currency: impl Into<String>, recent_months: u32) -> Self {
        Self {
            tz,
            currency: currency.into(),
            recent_months,
            logger: get_logger_with_context(
                LogContext::new("report").with_field("tz", tz.name()),
            ),
        }
    }

    pub fn from_config(config: &ReportConfig) -> Result<Self> {
        Ok(Self::new(
            config.tz()?,
            config.currency_symbol.clone(),
            config.recent_months,
        ))
    }

    pub const fn tz(&self) -> Tz {
        self.tz
    }

    /// Session measurements in scope for `owner`, newest first
    pub fn sessions(&self, batch: &SampleBatch, owner: Option<&str>) -> Vec<SessionMeasurement> {
        let measurements = measure_sessions(&batch.samples);
        match owner {
            Some(owner) => measurements
                .into_iter()
                .filter(|m| m.owner.as_deref() == Some(owner))
                .collect(),
            None => measurements,
        }
    }

    /// Time series of one session; `None` when it does not exist or is
    /// not owned by `owner`
    pub fn session_detail(
        &self,
        batch: &SampleBatch,
        session_id: &str,
        owner: Option<&str>,
    ) -> Option<SessionSeries> {
        let series = session_series(&batch.samples, session_id)?;
        match owner {
            Some(owner) if series.measurement.owner.as_deref() != Some(owner) => {
                self.logger.debug(&format!(
                    "Session {} hidden from owner {}",
                    session_id, owner
                ));
                None
            }
            _ => Some(series),
        }
    }

    pub fn monthly(&self, batch: &SampleBatch, owner: Option<&str>) -> Vec<MonthlyBucket> {
        monthly_buckets(&self.sessions(batch, owner), self.tz)
    }

    pub fn yearly(&self, batch: &SampleBatch, owner: Option<&str>) -> Vec<YearlyBucket> {
        yearly_buckets(&self.sessions(batch, owner), self.tz)
    }

    pub fn hourly(&self, batch: &SampleBatch, options: &ReportOptions) -> HourlyHistogram {
        hourly_distribution(
            &self.sessions(batch, options.owner.as_deref()),
            self.tz,
            self.reference_year(options),
            options.metric,
        )
    }

    pub fn usage(&self, batch: &SampleBatch, options: &ReportOptions) -> UsageReport {
        let scoped = self.scoped_samples(batch, options.owner.as_deref());
        UsageReport {
            current_year: year_usage(&scoped, self.tz, self.reference_year(options)),
            monthly: recent_monthly_usage(&scoped, self.tz, options.now, self.recent_months),
        }
    }

    /// Assemble every view at once
    pub fn assemble(&self, batch: &SampleBatch, options: &ReportOptions) -> Report {
        let measurements = self.sessions(batch, options.owner.as_deref());
        let year = self.reference_year(options);
        let scoped = self.scoped_samples(batch, options.owner.as_deref());

        let summary = summarize(&measurements);
        self.logger.debug(&format!(
            "Assembled report: {} samples, {} valid sessions, {} ignored, {} skipped rows",
            scoped.len(),
            summary.total_sessions,
            summary.ignored_sessions,
            batch.skipped
        ));

        Report {
            generated_at: options.now,
            timezone: self.tz.name().to_string(),
            currency: self.currency.clone(),
            owner: options.owner.clone(),
            reference_year: year,
            summary,
            yearly: yearly_buckets(&measurements, self.tz),
            monthly: monthly_buckets(&measurements, self.tz),
            hourly: hourly_distribution(&measurements, self.tz, year, options.metric),
            usage: UsageReport {
                current_year: year_usage(&scoped, self.tz, year),
                monthly: recent_monthly_usage(&scoped, self.tz, options.now, self.recent_months),
            },
            sessions: measurements.into_iter().filter(SessionMeasurement::is_valid).collect(),
            skipped_samples: batch.skipped,
        }
    }

    fn reference_year(&self, options: &ReportOptions) -> i32 {
        options
            .year
            .unwrap_or_else(|| options.now.with_timezone(&self.tz).year())
    }

    fn scoped_samples(&self, batch: &SampleBatch, owner: Option<&str>) -> Vec<Sample> {
        match owner {
            Some(owner) => {
                let ids = owner_sessions(&batch.samples, owner);
                batch
                    .samples
                    .iter()
                    .filter(|s| ids.contains(&s.session_id))
                    .cloned()
                    .collect()
            }
            None => batch.samples.clone(),
        }
    }
}
