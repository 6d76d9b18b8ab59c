//! Record payloads and the persisted queue record.
//!
//! Payloads are validated once at ingress; downstream components never
//! re-derive validity from raw maps.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Destination;

/// Identifier of a queued record (SQLite rowid, monotonically assigned)
pub type RecordId = i64;

/// Shape of a payload, used for routing and queue eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    SensorReading,
    Registration,
    AssignmentQuery,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::SensorReading => "sensor_reading",
            RecordKind::Registration => "registration",
            RecordKind::AssignmentQuery => "assignment_query",
        }
    }
}

/// Normalized request payload handed to the dispatcher by the ingress layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordPayload {
    /// Soil sensor reading, bound for the datastore
    SensorReading(SensorReading),

    /// Device registration, bound for the remote API
    Registration(Registration),

    /// Assignment status lookup; read-only, never queued
    AssignmentQuery(AssignmentQuery),
}

impl RecordPayload {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPayload::SensorReading(_) => RecordKind::SensorReading,
            RecordPayload::Registration(_) => RecordKind::Registration,
            RecordPayload::AssignmentQuery(_) => RecordKind::AssignmentQuery,
        }
    }

    /// Destination this payload is delivered to on the direct path
    pub fn destination(&self) -> Destination {
        match self {
            RecordPayload::SensorReading(_) => Destination::Storage,
            RecordPayload::Registration(_) => Destination::RemoteApi,
            RecordPayload::AssignmentQuery(_) => Destination::RemoteApi,
        }
    }

    /// Whether failed delivery must preserve the payload in the queue
    pub fn is_write(&self) -> bool {
        !matches!(self, RecordPayload::AssignmentQuery(_))
    }

    /// Device that produced the payload
    pub fn machine_id(&self) -> &str {
        match self {
            RecordPayload::SensorReading(r) => &r.machine_id,
            RecordPayload::Registration(r) => &r.machine_id,
            RecordPayload::AssignmentQuery(q) => &q.machine_id,
        }
    }
}

/// One soil probe measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub machine_id: String,

    /// Device-reported sample time; the datastore fills in `now` if absent
    pub timestamp: Option<DateTime<Utc>>,

    pub moisture: f64,
    pub temperature: f64,
    pub conductivity: f64,
    pub ph: f64,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
}

/// Device metadata submitted at provisioning time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub machine_id: String,
    pub sensor_name: String,
    pub sensor_type: String,
    pub client_name: String,
    pub farm_name: String,
    pub zone_code: String,
    pub installation_date: Option<NaiveDate>,
}

/// Assignment status lookup for a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentQuery {
    pub machine_id: String,
}

/// Farm/zone assignment for a registered device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentInfo {
    pub machine_id: String,
    pub assigned: bool,
    pub farm_id: Option<i64>,
    pub zone_code: Option<String>,
    pub farm_name: Option<String>,
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    pub installation_date: Option<NaiveDate>,
}

/// A record persisted in the durable queue awaiting redelivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRecord {
    pub id: RecordId,
    pub destination: Destination,
    pub payload: RecordPayload,
    pub created_at: DateTime<Utc>,

    /// Delivery attempts made by the resync scheduler; monotone, capped
    /// at the configured retry budget
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(machine_id: &str) -> RecordPayload {
        RecordPayload::SensorReading(SensorReading {
            machine_id: machine_id.to_string(),
            timestamp: None,
            moisture: 41.2,
            temperature: 18.5,
            conductivity: 0.8,
            ph: 6.4,
            nitrogen: 12.0,
            phosphorus: 5.0,
            potassium: 9.0,
        })
    }

    #[test]
    fn test_payload_routing() {
        assert_eq!(reading("m1").destination(), Destination::Storage);
        assert!(reading("m1").is_write());

        let query = RecordPayload::AssignmentQuery(AssignmentQuery {
            machine_id: "m1".to_string(),
        });
        assert_eq!(query.destination(), Destination::RemoteApi);
        assert!(!query.is_write());
        assert_eq!(query.kind(), RecordKind::AssignmentQuery);
    }

    #[test]
    fn test_payload_serde_tagged() {
        let json = serde_json::to_value(reading("probe-7")).unwrap();
        assert_eq!(json["kind"], "sensor_reading");
        assert_eq!(json["machine_id"], "probe-7");

        let back: RecordPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.machine_id(), "probe-7");
    }
}
