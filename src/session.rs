//! Charging session measurement
//!
//! This module reduces the samples of one charging session into a single
//! measurement: energy, duration, peak/average power and cost.
//!
//! Energy is always measured as the delta of the cumulative meter register
//! between the first and last sample of a session. Per-sample energy fields
//! are never summed, so every view derived from the same samples agrees.

use crate::grouping::group_sessions;
use crate::logging::get_logger;
use crate::sample::{Sample, SessionId};
use chrono::{DateTime, Utc};
use serde::Serialize;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Derived metrics of one charging session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeasurement {
    /// Session identifier
    pub session_id: SessionId,

    /// Owning entity (resident or station), if known
    pub owner: Option<String>,

    /// Timestamp of the first sample
    pub start_time: Option<DateTime<Utc>>,

    /// Timestamp of the last sample
    pub end_time: Option<DateTime<Utc>>,

    /// Number of samples the measurement was built from
    pub sample_count: usize,

    /// Energy delivered in this session (kWh)
    pub energy_consumed_kwh: f64,

    /// Time between first and last sample (hours)
    pub duration_hours: f64,

    /// Peak power recorded during session (kW)
    pub peak_power_kw: f64,

    /// Mean of the instantaneous power readings (kW)
    pub average_power_kw: f64,

    /// Sum of the per-sample incremental costs
    pub total_cost: f64,
}

impl SessionMeasurement {
    fn empty(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            owner: None,
            start_time: None,
            end_time: None,
            sample_count: 0,
            energy_consumed_kwh: 0.0,
            duration_hours: 0.0,
            peak_power_kw: 0.0,
            average_power_kw: 0.0,
            total_cost: 0.0,
        }
    }

    /// A session counts toward totals only if a positive energy delta was measured
    pub fn is_valid(&self) -> bool {
        self.sample_count >= 2 && self.energy_consumed_kwh > 0.0
    }
}

/// Reduce the samples of one session to a measurement.
///
/// Samples need not be sorted; they are ordered by timestamp with a stable
/// sort so equal timestamps keep their input order.
pub fn reduce_session<'a, I>(session_id: &str, samples: I) -> SessionMeasurement
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut ordered: Vec<&Sample> = samples.into_iter().collect();
    ordered.sort_by_key(|s| s.timestamp);

    let mut measurement = SessionMeasurement::empty(session_id);
    let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
        return measurement;
    };

    measurement.sample_count = ordered.len();
    measurement.start_time = Some(first.timestamp);
    measurement.end_time = Some(last.timestamp);
    measurement.owner = ordered.iter().find_map(|s| s.owner.clone());

    // A single reading carries no delta
    if ordered.len() < 2 {
        return measurement;
    }

    let elapsed_secs = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0;
    measurement.duration_hours = (elapsed_secs / SECONDS_PER_HOUR).max(0.0);

    let energy_delta = last.cumulative_energy_kwh - first.cumulative_energy_kwh;
    if energy_delta < 0.0 {
        get_logger("reducer")
            .for_session(session_id)
            .debug(&format!(
                "Meter register went backwards by {:.3} kWh; clamping to 0",
                -energy_delta
            ));
    }
    measurement.energy_consumed_kwh = energy_delta.max(0.0);

    measurement.peak_power_kw = ordered
        .iter()
        .map(|s| s.power_kw)
        .fold(0.0_f64, f64::max);
    measurement.average_power_kw =
        ordered.iter().map(|s| s.power_kw).sum::<f64>() / ordered.len() as f64;
    measurement.total_cost = ordered
        .iter()
        .map(|s| s.incremental_cost.unwrap_or(0.0))
        .sum();

    measurement
}

/// Group samples into sessions and reduce each of them.
///
/// The result is ordered by session start, newest first, then by session id.
pub fn measure_sessions(samples: &[Sample]) -> Vec<SessionMeasurement> {
    let mut measurements: Vec<SessionMeasurement> = group_sessions(samples)
        .into_iter()
        .map(|(session_id, group)| reduce_session(session_id, group))
        .collect();
    measurements.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    measurements
}

/// One session's readings in time order together with its measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSeries {
    pub measurement: SessionMeasurement,
    pub samples: Vec<Sample>,
}

/// Time series of the session `session_id`, or `None` if no sample belongs to it.
///
/// Samples are stable-sorted by timestamp, the same order the reducer uses.
pub fn session_series(samples: &[Sample], session_id: &str) -> Option<SessionSeries> {
    let mut ordered: Vec<Sample> = samples
        .iter()
        .filter(|s| s.session_id == session_id)
        .cloned()
        .collect();
    if ordered.is_empty() {
        return None;
    }
    ordered.sort_by_key(|s| s.timestamp);

    Some(SessionSeries {
        measurement: reduce_session(session_id, &ordered),
        samples: ordered,
    })
}
