//! Live station status
//!
//! The station controller rewrites a small JSON snapshot with its latest meter
//! values while a transaction is running. The station is considered to be
//! charging as long as that snapshot is fresh; once it goes stale the station
//! is available again. A snapshot that cannot be fetched at all leaves the
//! status unknown.

use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::sample::parse_timestamp;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Staleness threshold of the live snapshot
pub const DEFAULT_STALENESS_SECS: i64 = 120;

/// Inferred state of the station
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    #[default]
    Unknown,
    Available,
    Charging,
}

impl std::fmt::Display for StationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "Unknown",
            Self::Available => "Available",
            Self::Charging => "Charging",
        };
        f.write_str(s)
    }
}

/// Meter readings carried by the live snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotReadings {
    /// kW
    #[serde(rename = "Power.Active.Import", default)]
    pub power_active_import: Option<f64>,
    /// kWh
    #[serde(rename = "Energy.Active.Import.Register", default)]
    pub energy_register: Option<f64>,
    #[serde(rename = "Current.Offered", default)]
    pub current_offered: Option<f64>,
    #[serde(rename = "Current.Import.L1", default)]
    pub current_l1: Option<f64>,
    #[serde(rename = "Current.Import.L2", default)]
    pub current_l2: Option<f64>,
    #[serde(rename = "Current.Import.L3", default)]
    pub current_l3: Option<f64>,
    #[serde(rename = "Voltage.L1", default)]
    pub voltage_l1: Option<f64>,
    #[serde(rename = "Voltage.L2", default)]
    pub voltage_l2: Option<f64>,
    #[serde(rename = "Voltage.L3", default)]
    pub voltage_l3: Option<f64>,
}

/// Charging profile the station currently applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargingProfile {
    pub name: String,
    /// Limit in amps
    pub current_max_power: f64,
}

/// The live snapshot document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub timestamp: String,
    #[serde(default)]
    pub connector_id: Option<u32>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub data: SnapshotReadings,
    #[serde(default)]
    pub charging_profile: Option<ChargingProfile>,
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

impl LiveSnapshot {
    /// Snapshot timestamp as an instant; offset-less values are read in `tz`
    pub fn recorded_at(&self, tz: Tz) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.timestamp, tz)
    }

    /// Identifiers the snapshot can be matched against a viewer's sessions with
    pub fn session_refs(&self) -> impl Iterator<Item = &str> {
        self.transaction_id
            .as_deref()
            .into_iter()
            .chain(self.context.as_deref())
    }
}

/// Status published to consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub state: StationStatus,
    /// Whether the running session belongs to the viewer; absent for the admin
    /// view and when the station is not charging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_self: Option<bool>,
    /// When the last good snapshot was fetched
    pub last_update: Option<DateTime<Utc>>,
    /// Timestamp written into the last good snapshot
    pub snapshot_time: Option<DateTime<Utc>>,
    /// Last good snapshot
    pub snapshot: Option<LiveSnapshot>,
}

impl LiveStatus {
    pub fn power_kw(&self) -> Option<f64> {
        self.snapshot.as_ref().and_then(|s| s.data.power_active_import)
    }

    pub fn energy_register_kwh(&self) -> Option<f64> {
        self.snapshot.as_ref().and_then(|s| s.data.energy_register)
    }
}

/// Charging if the snapshot is younger than `threshold`, else available.
///
/// A snapshot dated in the future has a negative age and counts as fresh.
pub fn infer_state(
    snapshot_time: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold: chrono::Duration,
) -> StationStatus {
    if now - snapshot_time < threshold {
        StationStatus::Charging
    } else {
        StationStatus::Available
    }
}

/// Turns poll outcomes into the next published status
#[derive(Debug, Clone)]
pub struct StatusInferencer {
    threshold: chrono::Duration,
    tz: Tz,
    logger: StructuredLogger,
}

impl Default for StatusInferencer {
    fn default() -> Self {
        Self::new(chrono::Duration::seconds(DEFAULT_STALENESS_SECS), Tz::UTC)
    }
}

impl StatusInferencer {
    pub fn new(threshold: chrono::Duration, tz: Tz) -> Self {
        Self {
            threshold,
            tz,
            logger: get_logger("status"),
        }
    }

    /// Compute the status after one poll.
    ///
    /// On failure only the state changes; the last good snapshot and its
    /// update time are carried over from `previous`.
    pub fn infer(
        &self,
        previous: &LiveStatus,
        poll: Result<LiveSnapshot>,
        now: DateTime<Utc>,
    ) -> LiveStatus {
        let snapshot = match poll {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.logger.warn(&format!("Live snapshot unavailable: {}", e));
                return LiveStatus {
                    state: StationStatus::Unknown,
                    is_self: None,
                    ..previous.clone()
                };
            }
        };

        let snapshot_time = match snapshot.recorded_at(self.tz) {
            Ok(t) => t,
            Err(e) => {
                self.logger
                    .warn(&format!("Live snapshot has unreadable timestamp: {}", e));
                return LiveStatus {
                    state: StationStatus::Unknown,
                    is_self: None,
                    ..previous.clone()
                };
            }
        };

        let state = infer_state(snapshot_time, now, self.threshold);
        if state != previous.state {
            self.logger
                .info(&format!("Station status {} -> {}", previous.state, state));
        }

        LiveStatus {
            state,
            is_self: None,
            last_update: Some(now),
            snapshot_time: Some(snapshot_time),
            snapshot: Some(snapshot),
        }
    }
}

/// Viewer-specific copy of `status`.
///
/// `viewer_sessions` holds the session ids of the viewing resident; `None`
/// means the admin view.
pub fn refine_for_viewer(
    status: &LiveStatus,
    viewer_sessions: Option<&BTreeSet<String>>,
) -> LiveStatus {
    let is_self = match (status.state, viewer_sessions, status.snapshot.as_ref()) {
        (StationStatus::Charging, Some(ids), Some(snapshot)) => {
            Some(snapshot.session_refs().any(|r| ids.contains(r)))
        }
        (StationStatus::Charging, Some(_), None) => Some(false),
        _ => None,
    };
    LiveStatus {
        is_self,
        ..status.clone()
    }
}
