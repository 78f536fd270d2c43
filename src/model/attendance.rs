use chrono::{DateTime, Datelike, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

/// Day-level attendance status stored on a [`DailyRecord`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString, ToSchema,
)]
pub enum AttendanceStatus {
    #[serde(rename = "Present")]
    #[strum(serialize = "Present")]
    Present,
    #[serde(rename = "Double Present")]
    #[strum(serialize = "Double Present")]
    DoublePresent,
    #[serde(rename = "Absent")]
    #[strum(serialize = "Absent")]
    Absent,
    #[serde(rename = "Half Day")]
    #[strum(serialize = "Half Day")]
    HalfDay,
    #[serde(rename = "Half Day Leave")]
    #[strum(serialize = "Half Day Leave")]
    HalfDayLeave,
    #[serde(rename = "Leave")]
    #[strum(serialize = "Leave")]
    Leave,
    #[serde(rename = "Paid Leave")]
    #[strum(serialize = "Paid Leave")]
    PaidLeave,
    #[serde(rename = "Unpaid Leave")]
    #[strum(serialize = "Unpaid Leave")]
    UnpaidLeave,
    #[serde(rename = "Sunday")]
    #[strum(serialize = "Sunday")]
    Sunday,
    #[serde(rename = "Week Off")]
    #[strum(serialize = "Week Off")]
    WeekOff,
    #[serde(rename = "Holiday")]
    #[strum(serialize = "Holiday")]
    Holiday,
}

/// Who last decided the record's `status`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatusSource {
    /// Default derived from the work schedule (nightly sweep).
    Schedule,
    /// Set by a punch-in.
    Punch,
    /// Administrative override.
    Manual,
}

/// Timing verdict attached to a punch. Punch-ins use Late/On Time/Early,
/// punch-outs use Early/Normal/Over Time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString, ToSchema,
)]
pub enum PunchStatus {
    #[serde(rename = "Late")]
    #[strum(serialize = "Late")]
    Late,
    #[serde(rename = "On Time")]
    #[strum(serialize = "On Time")]
    OnTime,
    #[serde(rename = "Early")]
    #[strum(serialize = "Early")]
    Early,
    #[serde(rename = "Normal")]
    #[strum(serialize = "Normal")]
    Normal,
    #[serde(rename = "Over Time")]
    #[strum(serialize = "Over Time")]
    OverTime,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString, ToSchema,
)]
pub enum PunchSource {
    Mobile,
    Web,
    Biometric,
    Kiosk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    #[schema(example = 23.8103)]
    pub lat: f64,
    #[schema(example = 90.4125)]
    pub lng: f64,
    #[schema(example = "Gulshan Ave, Dhaka", nullable = true)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchEvent {
    pub time: DateTime<Utc>,
    pub status: PunchStatus,
    pub source: PunchSource,
    pub photo_ref: Option<String>,
    pub location: Option<Location>,
}

/// Which side of the day a punch operation targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PunchSide {
    In,
    Out,
}

/// Trust state of the device used on a given day.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
    Trusted,
    Pending,
}

/// Progress of an employee's day as seen by the punch endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    None,
    In,
    Out,
    Completed,
}

/// Calendar month a record belongs to. Derived from the record date, never stored apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "{:04}-{:02}", year, month)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses `YYYY-MM`.
    pub fn parse(value: &str) -> Option<Self> {
        let (year, month) = value.split_once('-')?;
        if year.len() != 4 || month.len() != 2 {
            return None;
        }
        let year: i32 = year.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }
}

/// The single attendance entry for one employee on one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub employee_id: u64,
    pub company_id: u64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub status_source: StatusSource,
    pub punch_in: Option<PunchEvent>,
    pub punch_out: Option<PunchEvent>,
    pub device_status: Option<DeviceStatus>,
    pub leave_type_id: Option<u64>,
    pub remarks: Option<String>,
    /// Optimistic concurrency token; 0 means never persisted.
    pub version: u32,
    pub updated_at: DateTime<Utc>,
}

impl DailyRecord {
    pub fn new(
        employee_id: u64,
        company_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        status_source: StatusSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            employee_id,
            company_id,
            date,
            status,
            status_source,
            punch_in: None,
            punch_out: None,
            device_status: None,
            leave_type_id: None,
            remarks: None,
            version: 0,
            updated_at: now,
        }
    }

    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.date)
    }

    pub fn day_status(&self) -> DayStatus {
        match (&self.punch_in, &self.punch_out) {
            (None, _) => DayStatus::None,
            (Some(_), None) => DayStatus::In,
            (Some(_), Some(_)) => DayStatus::Completed,
        }
    }

    /// Ordering invariant: a punch-out only exists after a strictly earlier punch-in.
    pub fn is_consistent(&self) -> bool {
        match (&self.punch_in, &self.punch_out) {
            (None, Some(_)) => false,
            (Some(punch_in), Some(punch_out)) => punch_out.time > punch_in.time,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record() -> DailyRecord {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        DailyRecord::new(7, 1, date, AttendanceStatus::Absent, StatusSource::Schedule, Utc::now())
    }

    #[test]
    fn status_strings_match_stored_values() {
        assert_eq!(AttendanceStatus::WeekOff.to_string(), "Week Off");
        assert_eq!(
            AttendanceStatus::from_str("Half Day Leave").unwrap(),
            AttendanceStatus::HalfDayLeave
        );
        assert_eq!(PunchStatus::OverTime.to_string(), "Over Time");
        let v = serde_json::to_value(PunchStatus::OnTime).unwrap();
        assert_eq!(v, serde_json::json!("On Time"));
    }

    #[test]
    fn month_key_parses_and_formats() {
        let key = MonthKey::parse("2026-03").unwrap();
        assert_eq!(key.to_string(), "2026-03");
        assert!(key.contains(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
        assert!(MonthKey::parse("2026-13").is_none());
        assert!(MonthKey::parse("26-03").is_none());
    }

    #[test]
    fn punch_out_without_punch_in_is_inconsistent() {
        let mut r = record();
        let at = Utc::now();
        r.punch_out = Some(PunchEvent {
            time: at,
            status: PunchStatus::Normal,
            source: PunchSource::Web,
            photo_ref: None,
            location: None,
        });
        assert!(!r.is_consistent());

        r.punch_in = Some(PunchEvent {
            time: at,
            status: PunchStatus::OnTime,
            source: PunchSource::Web,
            photo_ref: None,
            location: None,
        });
        // equal instants are still out of order
        assert!(!r.is_consistent());
        assert_eq!(r.day_status(), DayStatus::Completed);
    }
}
