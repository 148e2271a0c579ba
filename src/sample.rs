//! Telemetry samples and their tolerant decoding
//!
//! The sample store hands out a JSON array of power-log rows. Each row is
//! decoded on its own so that one malformed reading never poisons the rest of
//! the collection: rows that fail are logged, counted and dropped.

use crate::error::{ChargeError, Result};
use crate::logging::get_logger;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a charging session (charge transaction)
pub type SessionId = String;

/// One telemetry reading belonging to a charging session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    /// Meter register, kWh; non-decreasing within a session
    pub cumulative_energy_kwh: f64,
    /// Instantaneous power, kW
    pub power_kw: f64,
    /// Precomputed cost attributable to this sample's delta
    pub incremental_cost: Option<f64>,
    /// Tariff at sample time, currency per kWh
    pub rate: Option<f64>,
    /// Owning entity (resident or station), when the store provides it
    pub owner: Option<String>,
}

/// Result of decoding a sample document
#[derive(Debug, Clone, Default)]
pub struct SampleBatch {
    pub samples: Vec<Sample>,
    /// Rows dropped because they could not be decoded
    pub skipped: usize,
}

impl SampleBatch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_session_id(self) -> Option<SessionId> {
        match self {
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Self::Text(_) => None,
        }
    }
}

/// Wire shape of a row; accepts both the documented camelCase names and the
/// backend power-log column names. Alternative keys may coexist on one row, the
/// first present one in declaration order wins.
#[derive(Debug, Deserialize)]
struct RawSample {
    #[serde(rename = "sessionId")]
    session_id: Option<RawId>,
    #[serde(rename = "session_id")]
    session_id_snake: Option<RawId>,
    charge_transaction_id: Option<RawId>,
    timestamp: Option<String>,
    created: Option<String>,
    #[serde(rename = "cumulativeEnergy")]
    cumulative_energy: Option<f64>,
    energy_kwh: Option<f64>,
    #[serde(rename = "instantaneousPower")]
    instantaneous_power: Option<f64>,
    power_kw: Option<f64>,
    #[serde(rename = "incrementalCost")]
    incremental_cost: Option<f64>,
    delta_power_cost: Option<f64>,
    rate: Option<f64>,
    kwh_rate: Option<f64>,
    owner: Option<String>,
    resident_name: Option<String>,
    #[serde(rename = "residentName")]
    resident_name_camel: Option<String>,
    card_name: Option<String>,
}

impl RawSample {
    fn into_sample(self, tz: Tz) -> Result<Sample> {
        let session_id = [
            self.session_id,
            self.session_id_snake,
            self.charge_transaction_id,
        ]
        .into_iter()
        .flatten()
        .find_map(RawId::into_session_id)
        .ok_or_else(|| ChargeError::validation("sessionId", "missing session identifier"))?;
        let timestamp = self
            .timestamp
            .or(self.created)
            .ok_or_else(|| ChargeError::validation("timestamp", "missing timestamp"))?;
        let timestamp = parse_timestamp(&timestamp, tz)?;
        let cumulative_energy_kwh =
            finite(self.cumulative_energy.or(self.energy_kwh), "cumulativeEnergy")?;
        let power_kw = finite(self.instantaneous_power.or(self.power_kw), "instantaneousPower")?;
        let owner = [
            self.owner,
            self.resident_name,
            self.resident_name_camel,
            self.card_name,
        ]
        .into_iter()
        .flatten()
        .find(|o| !o.trim().is_empty());

        Ok(Sample {
            session_id,
            timestamp,
            cumulative_energy_kwh,
            power_kw,
            incremental_cost: self
                .incremental_cost
                .or(self.delta_power_cost)
                .filter(|c| c.is_finite()),
            rate: self.rate.or(self.kwh_rate).filter(|r| r.is_finite()),
            owner,
        })
    }
}

fn finite(value: Option<f64>, field: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(ChargeError::validation(field, "not a finite number")),
        None => Err(ChargeError::validation(field, "missing value")),
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Offset-less timestamps (as written by the backend) are read as wall-clock
/// time in `tz`.
pub fn parse_timestamp(value: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            ChargeError::validation(
                "timestamp",
                format!("{} does not exist in {}", value, tz.name()),
            )
        })
}

/// Decode a sample document.
///
/// The document is either a flat array of samples or an array of charge
/// transactions carrying their samples under `power_logs`; in the latter
/// case the transaction's id and resident/card name fill in missing fields.
pub fn parse_samples(document: &Value, tz: Tz) -> Result<SampleBatch> {
    let logger = get_logger("samples");
    let rows = document.as_array().ok_or_else(|| {
        ChargeError::serialization("sample document must be a JSON array")
    })?;

    let mut batch = SampleBatch::default();
    for (index, row) in expand_transactions(rows).into_iter().enumerate() {
        let decoded = serde_json::from_value::<RawSample>(row)
            .map_err(ChargeError::from)
            .and_then(|raw| raw.into_sample(tz));
        match decoded {
            Ok(sample) => batch.samples.push(sample),
            Err(e) => {
                batch.skipped += 1;
                logger.warn(&format!("Skipping malformed sample #{}: {}", index, e));
            }
        }
    }

    logger.debug(&format!(
        "Decoded {} samples ({} skipped)",
        batch.samples.len(),
        batch.skipped
    ));
    Ok(batch)
}

/// Decode a sample document from raw bytes
pub fn parse_samples_slice(bytes: &[u8], tz: Tz) -> Result<SampleBatch> {
    let document: Value = serde_json::from_slice(bytes)?;
    parse_samples(&document, tz)
}

fn expand_transactions(rows: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(logs) = row.get("power_logs").and_then(Value::as_array) else {
            out.push(row.clone());
            continue;
        };
        let id = row.get("id").cloned();
        let owner = ["resident_name", "card_name"]
            .iter()
            .find_map(|key| row.get(*key).filter(|v| v.is_string()).cloned());
        for log in logs {
            let mut log = log.clone();
            if let Some(obj) = log.as_object_mut() {
                if let Some(ref id) = id {
                    let has_id = ["sessionId", "session_id", "charge_transaction_id"]
                        .iter()
                        .any(|key| obj.contains_key(*key));
                    if !has_id {
                        obj.insert("charge_transaction_id".to_string(), id.clone());
                    }
                }
                if let Some(ref owner) = owner {
                    let has_owner = ["owner", "resident_name", "residentName", "card_name"]
                        .iter()
                        .any(|key| obj.contains_key(*key));
                    if !has_owner {
                        obj.insert("owner".to_string(), owner.clone());
                    }
                }
            }
            out.push(log);
        }
    }
    out
}
