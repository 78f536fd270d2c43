use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// What an employee is expected to do on one day of their schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(default)]
    pub is_weekoff: bool,
    pub shift_id: Option<u64>,
}

/// Fixed schedules repeat weekly and are keyed by English short weekday name
/// (`Mon`..`Sun`). Flexible schedules are keyed by `YYYY-MM` then `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "days")]
pub enum WorkSchedule {
    Fixed(BTreeMap<String, ScheduleEntry>),
    Flexible(BTreeMap<String, BTreeMap<String, ScheduleEntry>>),
}

impl Default for WorkSchedule {
    fn default() -> Self {
        WorkSchedule::Fixed(BTreeMap::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
pub enum MarkAttendanceFrom {
    Office,
    #[default]
    Anywhere,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SmartphoneMode {
    pub enabled: bool,
    #[serde(default)]
    pub mark_attendance_from: MarkAttendanceFrom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceMode {
    pub smartphone: SmartphoneMode,
    #[serde(default)]
    pub biometric: bool,
    #[serde(default)]
    pub kiosk: bool,
}

impl Default for AttendanceMode {
    fn default() -> Self {
        Self {
            smartphone: SmartphoneMode {
                enabled: true,
                mark_attendance_from: MarkAttendanceFrom::Anywhere,
            },
            biometric: false,
            kiosk: false,
        }
    }
}

impl AttendanceMode {
    pub fn requires_geofence(&self) -> bool {
        self.smartphone.enabled && self.smartphone.mark_attendance_from == MarkAttendanceFrom::Office
    }
}

/// Reminder settings carried for the mobile app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MobileAlarm {
    #[schema(example = "punch_in")]
    pub kind: String,
    /// Wall-clock `HH:MM`.
    #[schema(example = "09:45")]
    pub time: String,
    pub enabled: bool,
}

/// Per-employee attendance configuration. Daily records live in their own
/// table keyed by `(employee_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceLedger {
    pub employee_id: u64,
    pub company_id: Option<u64>,
    pub work_schedule: WorkSchedule,
    pub attendance_mode: AttendanceMode,
    pub mobile_alarms: Vec<MobileAlarm>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceLedger {
    pub fn new(employee_id: u64, company_id: Option<u64>, now: DateTime<Utc>) -> Self {
        Self {
            employee_id,
            company_id,
            work_schedule: WorkSchedule::default(),
            attendance_mode: AttendanceMode::default(),
            mobile_alarms: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schedules_are_tagged_by_variant_name() {
        let fixed: WorkSchedule = serde_json::from_value(json!({
            "type": "Fixed",
            "days": { "Mon": { "is_weekoff": false, "shift_id": 1 } }
        }))
        .unwrap();
        assert!(matches!(fixed, WorkSchedule::Fixed(ref days) if days["Mon"].shift_id == Some(1)));

        let flexible: WorkSchedule = serde_json::from_value(json!({
            "type": "Flexible",
            "days": { "2026-03": { "2026-03-02": { "is_weekoff": true, "shift_id": null } } }
        }))
        .unwrap();
        assert!(matches!(flexible, WorkSchedule::Flexible(ref months) if months["2026-03"]["2026-03-02"].is_weekoff));
    }
}
