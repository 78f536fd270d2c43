use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A request to trust a new device for an employee, awaiting an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceChangeRequest {
    pub id: Uuid,
    pub employee_id: u64,
    pub company_id: u64,
    pub old_device_id: Option<String>,
    pub new_device_id: String,
    pub status: DeviceRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<u64>,
}
