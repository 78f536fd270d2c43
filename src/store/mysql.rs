//! MySQL persistence for attendance state via SQLx.
//!
//! Schema lives in `migrations/0001_attendance.sql`. Daily records are a flat
//! table keyed by `(employee_id, date)`; year/month are stored only as an index.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, MySqlPool};
use uuid::Uuid;

use super::AttendanceStore;
use crate::error::{AttendanceError, AttendanceResult};
use crate::model::{
    anomaly::Anomaly,
    attendance::{DailyRecord, Location, MonthKey, PunchEvent},
    branch::Branch,
    device::DeviceChangeRequest,
    employee::EmployeeProfile,
    ledger::AttendanceLedger,
    shift::Shift,
};

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn parse_column<T: FromStr>(value: &str, column: &str) -> AttendanceResult<T> {
    value.parse::<T>().map_err(|_| {
        AttendanceError::Storage(sqlx::Error::Decode(
            format!("unexpected value {value:?} in column {column}").into(),
        ))
    })
}

fn parse_uuid(value: &str) -> AttendanceResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AttendanceError::Storage(sqlx::Error::Decode(Box::new(e))))
}

// -------------------- Rows --------------------

#[derive(FromRow)]
struct EmployeeRow {
    id: u64,
    company_id: Option<u64>,
    branch_id: Option<u64>,
    first_name: String,
    last_name: String,
    device_id: Option<String>,
    status: String,
}

#[derive(FromRow)]
struct BranchRow {
    id: u64,
    company_id: u64,
    name: String,
    lat: Option<f64>,
    lng: Option<f64>,
    radius_meters: Option<f64>,
}

#[derive(FromRow)]
struct ShiftRow {
    id: u64,
    company_id: u64,
    name: String,
    start_time: NaiveTime,
    end_time: NaiveTime,
    punch_in_rule: Option<String>,
    punch_out_rule: Option<String>,
}

#[derive(FromRow)]
struct LedgerRow {
    employee_id: u64,
    company_id: Option<u64>,
    work_schedule: String,
    attendance_mode: String,
    mobile_alarms: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct RecordRow {
    employee_id: u64,
    company_id: u64,
    date: NaiveDate,
    status: String,
    status_source: String,
    punch_in_time: Option<DateTime<Utc>>,
    punch_in_status: Option<String>,
    punch_in_source: Option<String>,
    punch_in_photo: Option<String>,
    punch_in_lat: Option<f64>,
    punch_in_lng: Option<f64>,
    punch_in_address: Option<String>,
    punch_out_time: Option<DateTime<Utc>>,
    punch_out_status: Option<String>,
    punch_out_source: Option<String>,
    punch_out_photo: Option<String>,
    punch_out_lat: Option<f64>,
    punch_out_lng: Option<f64>,
    punch_out_address: Option<String>,
    device_status: Option<String>,
    leave_type_id: Option<u64>,
    remarks: Option<String>,
    version: u32,
    updated_at: DateTime<Utc>,
}

#[allow(clippy::too_many_arguments)]
fn punch_from_columns(
    side: &str,
    time: Option<DateTime<Utc>>,
    status: Option<String>,
    source: Option<String>,
    photo_ref: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    address: Option<String>,
) -> AttendanceResult<Option<PunchEvent>> {
    let Some(time) = time else {
        return Ok(None);
    };
    let status = status.unwrap_or_default();
    let source = source.unwrap_or_default();
    let location = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Location { lat, lng, address }),
        _ => None,
    };
    Ok(Some(PunchEvent {
        time,
        status: parse_column(&status, &format!("punch_{side}_status"))?,
        source: parse_column(&source, &format!("punch_{side}_source"))?,
        photo_ref,
        location,
    }))
}

impl TryFrom<RecordRow> for DailyRecord {
    type Error = AttendanceError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let punch_in = punch_from_columns(
            "in",
            row.punch_in_time,
            row.punch_in_status,
            row.punch_in_source,
            row.punch_in_photo,
            row.punch_in_lat,
            row.punch_in_lng,
            row.punch_in_address,
        )?;
        let punch_out = punch_from_columns(
            "out",
            row.punch_out_time,
            row.punch_out_status,
            row.punch_out_source,
            row.punch_out_photo,
            row.punch_out_lat,
            row.punch_out_lng,
            row.punch_out_address,
        )?;
        let device_status = match row.device_status {
            Some(s) => Some(parse_column(&s, "device_status")?),
            None => None,
        };

        Ok(DailyRecord {
            employee_id: row.employee_id,
            company_id: row.company_id,
            date: row.date,
            status: parse_column(&row.status, "status")?,
            status_source: parse_column(&row.status_source, "status_source")?,
            punch_in,
            punch_out,
            device_status,
            leave_type_id: row.leave_type_id,
            remarks: row.remarks,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AnomalyRow {
    id: String,
    anomaly_type: String,
    severity: String,
    status: String,
    description: String,
    metadata: String,
    employee_id: u64,
    company_id: u64,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct DeviceRequestRow {
    id: String,
    employee_id: u64,
    company_id: u64,
    old_device_id: Option<String>,
    new_device_id: String,
    status: String,
    requested_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    decided_by: Option<u64>,
}

impl TryFrom<DeviceRequestRow> for DeviceChangeRequest {
    type Error = AttendanceError;

    fn try_from(row: DeviceRequestRow) -> Result<Self, Self::Error> {
        Ok(DeviceChangeRequest {
            id: parse_uuid(&row.id)?,
            employee_id: row.employee_id,
            company_id: row.company_id,
            old_device_id: row.old_device_id,
            new_device_id: row.new_device_id,
            status: parse_column(&row.status, "status")?,
            requested_at: row.requested_at,
            decided_at: row.decided_at,
            decided_by: row.decided_by,
        })
    }
}

const RECORD_COLUMNS: &str = r#"
    employee_id, company_id, date, status, status_source,
    punch_in_time, punch_in_status, punch_in_source, punch_in_photo,
    punch_in_lat, punch_in_lng, punch_in_address,
    punch_out_time, punch_out_status, punch_out_source, punch_out_photo,
    punch_out_lat, punch_out_lng, punch_out_address,
    device_status, leave_type_id, remarks, version, updated_at
"#;

const DEVICE_REQUEST_COLUMNS: &str = r#"
    id, employee_id, company_id, old_device_id, new_device_id,
    status, requested_at, decided_at, decided_by
"#;

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn employee(&self, employee_id: u64) -> AttendanceResult<Option<EmployeeProfile>> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT id, company_id, branch_id, first_name, last_name, device_id, status
            FROM employees
            WHERE id = ?
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| EmployeeProfile {
            id: r.id,
            company_id: r.company_id,
            branch_id: r.branch_id,
            first_name: r.first_name,
            last_name: r.last_name,
            device_id: r.device_id,
            status: r.status,
        }))
    }

    async fn company_exists(&self, company_id: u64) -> AttendanceResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM companies WHERE id = ? LIMIT 1)",
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn branch(&self, branch_id: u64) -> AttendanceResult<Option<Branch>> {
        let row = sqlx::query_as::<_, BranchRow>(
            "SELECT id, company_id, name, lat, lng, radius_meters FROM branches WHERE id = ?",
        )
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Branch {
            id: r.id,
            company_id: r.company_id,
            name: r.name,
            lat: r.lat,
            lng: r.lng,
            radius_meters: r.radius_meters,
        }))
    }

    async fn shift(&self, shift_id: u64) -> AttendanceResult<Option<Shift>> {
        let row = sqlx::query_as::<_, ShiftRow>(
            r#"
            SELECT id, company_id, name, start_time, end_time, punch_in_rule, punch_out_rule
            FROM shifts
            WHERE id = ?
            "#,
        )
        .bind(shift_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Shift {
            id: r.id,
            company_id: r.company_id,
            name: r.name,
            start: r.start_time,
            end: r.end_time,
            punch_in_rule: r.punch_in_rule,
            punch_out_rule: r.punch_out_rule,
        }))
    }

    async fn holiday(&self, company_id: u64, date: NaiveDate) -> AttendanceResult<Option<String>> {
        let name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM holidays WHERE company_id = ? AND date = ? LIMIT 1",
        )
        .bind(company_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(name)
    }

    async fn bind_device(&self, employee_id: u64, device_id: &str) -> AttendanceResult<()> {
        let result = sqlx::query("UPDATE employees SET device_id = ? WHERE id = ?")
            .bind(device_id)
            .bind(employee_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AttendanceError::not_found("Employee"));
        }
        Ok(())
    }

    async fn ledger(&self, employee_id: u64) -> AttendanceResult<Option<AttendanceLedger>> {
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT employee_id, company_id, work_schedule, attendance_mode, mobile_alarms,
                   created_at, updated_at
            FROM attendance_ledgers
            WHERE employee_id = ?
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(AttendanceLedger {
                employee_id: r.employee_id,
                company_id: r.company_id,
                work_schedule: serde_json::from_str(&r.work_schedule)?,
                attendance_mode: serde_json::from_str(&r.attendance_mode)?,
                mobile_alarms: serde_json::from_str(&r.mobile_alarms)?,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })),
            None => Ok(None),
        }
    }

    async fn save_ledger(&self, ledger: &AttendanceLedger) -> AttendanceResult<()> {
        let work_schedule = serde_json::to_string(&ledger.work_schedule)?;
        let attendance_mode = serde_json::to_string(&ledger.attendance_mode)?;
        let mobile_alarms = serde_json::to_string(&ledger.mobile_alarms)?;

        sqlx::query(
            r#"
            INSERT INTO attendance_ledgers
                (employee_id, company_id, work_schedule, attendance_mode, mobile_alarms,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                company_id = VALUES(company_id),
                work_schedule = VALUES(work_schedule),
                attendance_mode = VALUES(attendance_mode),
                mobile_alarms = VALUES(mobile_alarms),
                updated_at = VALUES(updated_at)
            "#,
        )
        .bind(ledger.employee_id)
        .bind(ledger.company_id)
        .bind(work_schedule)
        .bind(attendance_mode)
        .bind(mobile_alarms)
        .bind(ledger.created_at)
        .bind(ledger.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ledger_employee_ids(&self) -> AttendanceResult<Vec<u64>> {
        let ids = sqlx::query_scalar::<_, u64>(
            "SELECT employee_id FROM attendance_ledgers ORDER BY employee_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> AttendanceResult<Option<DailyRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records WHERE employee_id = ? AND date = ?"
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(employee_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(DailyRecord::try_from).transpose()
    }

    async fn records_for_month(
        &self,
        employee_id: u64,
        month: MonthKey,
    ) -> AttendanceResult<Vec<DailyRecord>> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM attendance_records
            WHERE employee_id = ? AND year = ? AND month = ?
            ORDER BY date
            "#
        );
        let rows = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(employee_id)
            .bind(month.year)
            .bind(month.month)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(DailyRecord::try_from).collect()
    }

    async fn save_record(&self, record: &DailyRecord) -> AttendanceResult<DailyRecord> {
        let punch_in = record.punch_in.as_ref();
        let punch_out = record.punch_out.as_ref();
        let in_location = punch_in.and_then(|p| p.location.as_ref());
        let out_location = punch_out.and_then(|p| p.location.as_ref());
        let next_version = record.version + 1;

        let query = if record.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO attendance_records
                    (status, status_source,
                     punch_in_time, punch_in_status, punch_in_source, punch_in_photo,
                     punch_in_lat, punch_in_lng, punch_in_address,
                     punch_out_time, punch_out_status, punch_out_source, punch_out_photo,
                     punch_out_lat, punch_out_lng, punch_out_address,
                     device_status, leave_type_id, remarks, version, updated_at,
                     company_id, year, month, employee_id, date)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
        } else {
            sqlx::query(
                r#"
                UPDATE attendance_records
                SET status = ?, status_source = ?,
                    punch_in_time = ?, punch_in_status = ?, punch_in_source = ?, punch_in_photo = ?,
                    punch_in_lat = ?, punch_in_lng = ?, punch_in_address = ?,
                    punch_out_time = ?, punch_out_status = ?, punch_out_source = ?, punch_out_photo = ?,
                    punch_out_lat = ?, punch_out_lng = ?, punch_out_address = ?,
                    device_status = ?, leave_type_id = ?, remarks = ?, version = ?, updated_at = ?,
                    company_id = ?, year = ?, month = ?
                WHERE employee_id = ? AND date = ? AND version = ?
                "#,
            )
        };

        let query = query
            .bind(record.status.to_string())
            .bind(record.status_source.to_string())
            .bind(punch_in.map(|p| p.time))
            .bind(punch_in.map(|p| p.status.to_string()))
            .bind(punch_in.map(|p| p.source.to_string()))
            .bind(punch_in.and_then(|p| p.photo_ref.clone()))
            .bind(in_location.map(|l| l.lat))
            .bind(in_location.map(|l| l.lng))
            .bind(in_location.and_then(|l| l.address.clone()))
            .bind(punch_out.map(|p| p.time))
            .bind(punch_out.map(|p| p.status.to_string()))
            .bind(punch_out.map(|p| p.source.to_string()))
            .bind(punch_out.and_then(|p| p.photo_ref.clone()))
            .bind(out_location.map(|l| l.lat))
            .bind(out_location.map(|l| l.lng))
            .bind(out_location.and_then(|l| l.address.clone()))
            .bind(record.device_status.map(|s| s.to_string()))
            .bind(record.leave_type_id)
            .bind(record.remarks.clone())
            .bind(next_version)
            .bind(record.updated_at)
            .bind(record.company_id)
            .bind(record.date.year())
            .bind(record.date.month())
            .bind(record.employee_id)
            .bind(record.date);

        let query = if record.version == 0 {
            query
        } else {
            query.bind(record.version)
        };

        match query.execute(&self.pool).await {
            Ok(result) if result.rows_affected() == 0 => Err(AttendanceError::VersionConflict),
            Ok(_) => {
                let mut saved = record.clone();
                saved.version = next_version;
                Ok(saved)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
                // duplicate (employee_id, date)
                Err(AttendanceError::VersionConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_anomaly(&self, anomaly: &Anomaly) -> AttendanceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO attendance_anomalies
                (id, anomaly_type, severity, status, description, metadata,
                 employee_id, company_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(anomaly.id.to_string())
        .bind(anomaly.anomaly_type.to_string())
        .bind(anomaly.severity.to_string())
        .bind(anomaly.status.to_string())
        .bind(&anomaly.description)
        .bind(anomaly.metadata.to_string())
        .bind(anomaly.employee_id)
        .bind(anomaly.company_id)
        .bind(anomaly.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn anomalies_for(&self, employee_id: u64) -> AttendanceResult<Vec<Anomaly>> {
        let rows = sqlx::query_as::<_, AnomalyRow>(
            r#"
            SELECT id, anomaly_type, severity, status, description, metadata,
                   employee_id, company_id, created_at
            FROM attendance_anomalies
            WHERE employee_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(Anomaly {
                    id: parse_uuid(&r.id)?,
                    anomaly_type: parse_column(&r.anomaly_type, "anomaly_type")?,
                    severity: parse_column(&r.severity, "severity")?,
                    status: parse_column(&r.status, "status")?,
                    description: r.description,
                    metadata: serde_json::from_str(&r.metadata)?,
                    employee_id: r.employee_id,
                    company_id: r.company_id,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn pending_device_request(
        &self,
        employee_id: u64,
        device_id: &str,
    ) -> AttendanceResult<Option<DeviceChangeRequest>> {
        let sql = format!(
            r#"
            SELECT {DEVICE_REQUEST_COLUMNS}
            FROM device_change_requests
            WHERE employee_id = ? AND new_device_id = ? AND status = 'pending'
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, DeviceRequestRow>(&sql)
            .bind(employee_id)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(DeviceChangeRequest::try_from).transpose()
    }

    async fn device_request(&self, id: Uuid) -> AttendanceResult<Option<DeviceChangeRequest>> {
        let sql = format!("SELECT {DEVICE_REQUEST_COLUMNS} FROM device_change_requests WHERE id = ?");
        let row = sqlx::query_as::<_, DeviceRequestRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(DeviceChangeRequest::try_from).transpose()
    }

    async fn save_device_request(&self, request: &DeviceChangeRequest) -> AttendanceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO device_change_requests
                (id, employee_id, company_id, old_device_id, new_device_id,
                 status, requested_at, decided_at, decided_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = VALUES(status),
                decided_at = VALUES(decided_at),
                decided_by = VALUES(decided_by)
            "#,
        )
        .bind(request.id.to_string())
        .bind(request.employee_id)
        .bind(request.company_id)
        .bind(request.old_device_id.clone())
        .bind(&request.new_device_id)
        .bind(request.status.to_string())
        .bind(request.requested_at)
        .bind(request.decided_at)
        .bind(request.decided_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
