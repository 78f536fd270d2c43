use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum AnomalyType {
    #[serde(rename = "Buddy Punching")]
    #[strum(serialize = "Buddy Punching")]
    BuddyPunching,
    #[serde(rename = "Unusual Hours")]
    #[strum(serialize = "Unusual Hours")]
    UnusualHours,
    #[serde(rename = "Rapid Punches")]
    #[strum(serialize = "Rapid Punches")]
    RapidPunches,
    #[serde(rename = "GPS Spoofing")]
    #[strum(serialize = "GPS Spoofing")]
    GpsSpoofing,
    #[serde(rename = "Device Tampering")]
    #[strum(serialize = "Device Tampering")]
    DeviceTampering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Review state. New anomalies are always `Pending`; the review workflow owns the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnomalyStatus {
    Pending,
    Investigating,
    Resolved,
    Dismissed,
}

/// Append-only audit flag raised by a punch heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: Uuid,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub status: AnomalyStatus,
    pub description: String,
    pub metadata: serde_json::Value,
    pub employee_id: u64,
    pub company_id: u64,
    pub created_at: DateTime<Utc>,
}

impl Anomaly {
    pub fn new(
        anomaly_type: AnomalyType,
        severity: Severity,
        description: impl Into<String>,
        metadata: serde_json::Value,
        employee_id: u64,
        company_id: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            anomaly_type,
            severity,
            status: AnomalyStatus::Pending,
            description: description.into(),
            metadata,
            employee_id,
            company_id,
            created_at,
        }
    }
}
