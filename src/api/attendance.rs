use crate::attendance::ledger::{LedgerUpdate, PunchRequest, StatusChange};
use crate::auth::auth::AuthUser;
use crate::error::AttendanceError;
use crate::model::attendance::{
    AttendanceStatus, DailyRecord, DayStatus, Location, MonthKey, PunchSide, PunchSource,
};
use crate::model::ledger::{AttendanceMode, MobileAlarm, WorkSchedule};
use crate::state::AppState;
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Deserialize, ToSchema)]
pub struct PunchReq {
    /// Defaults to the caller's own employee profile.
    pub employee_id: Option<u64>,
    pub company_id: u64,
    pub source: PunchSource,
    pub photo_ref: Option<String>,
    pub location: Option<Location>,
    pub device_id: Option<String>,
    /// Client-observed punch time; defaults to the server clock. Employees may
    /// only submit recent times; HR and Admin may backfill.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct DayResponse {
    pub status: DayStatus,
    pub record: Option<DailyRecord>,
}

#[derive(Deserialize, IntoParams)]
pub struct MonthQuery {
    /// `YYYY-MM`; defaults to the current month.
    pub month: Option<String>,
}

#[derive(Serialize)]
pub struct MonthResponse {
    pub employee_id: u64,
    pub month: String,
    pub records: Vec<DailyRecord>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetPunchReq {
    #[schema(value_type = String, format = DateTime)]
    pub time: DateTime<Utc>,
    pub source: Option<PunchSource>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetStatusReq {
    pub status: AttendanceStatus,
    pub leave_type_id: Option<u64>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub changed: bool,
    pub record: DailyRecord,
}

#[derive(Deserialize, ToSchema)]
pub struct LedgerReq {
    /// `{"type": "Fixed", "days": {"Mon": {...}}}` or
    /// `{"type": "Flexible", "days": {"2026-03": {"2026-03-02": {...}}}}`
    #[schema(value_type = Object)]
    pub work_schedule: Option<WorkSchedule>,
    pub attendance_mode: Option<AttendanceMode>,
    pub mobile_alarms: Option<Vec<MobileAlarm>>,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyDeviceReq {
    pub employee_id: Option<u64>,
    pub device_id: String,
}

/// Record the next punch of the day
#[utoipa::path(
    post,
    path = "/api/attendance/punch",
    request_body = PunchReq,
    responses(
        (status = 200, description = "Punch recorded, or the day was already complete", body = Object, example = json!({
            "status": "in",
            "record": {
                "employee_id": 7,
                "company_id": 1,
                "date": "2026-03-02",
                "status": "Present",
                "status_source": "punch",
                "punch_in": { "time": "2026-03-02T04:15:00Z", "status": "Late", "source": "Mobile" },
                "punch_out": null,
                "version": 1
            }
        })),
        (status = 400, description = "Invalid punch", body = Object, example = json!({
            "message": "Punch out must be later than punch in"
        })),
        (status = 403, description = "Outside the office geofence", body = Object, example = json!({
            "message": "You are 150 meters away from the office, outside the allowed 100 meter radius",
            "distance_meters": 150.0
        })),
        (status = 404, description = "Employee or company not found"),
        (status = 422, description = "Office attendance without coordinates or branch location"),
        (status = 503, description = "Punch decision timed out")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<PunchReq>,
) -> actix_web::Result<impl Responder> {
    let body = body.into_inner();
    let employee_id = auth.target_employee(body.employee_id)?;

    let req = PunchRequest {
        employee_id,
        company_id: body.company_id,
        source: body.source,
        photo_ref: body.photo_ref,
        location: body.location,
        device_id: body.device_id,
        timestamp: body.timestamp,
        backfill: auth.role.is_attendance_admin(),
    };

    let outcome = state.ledger.record_punch(req, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Today's attendance state for an employee
#[utoipa::path(
    get,
    path = "/api/attendance/today/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "none | in | out | completed, with the record if any", body = Object, example = json!({
            "status": "none",
            "record": null
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let (status, record) = state.ledger.today(employee_id, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(DayResponse { status, record }))
}

/// Monthly attendance records
#[utoipa::path(
    get,
    path = "/api/attendance/records/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        MonthQuery
    ),
    responses(
        (status = 200, description = "Records of the month ordered by date", body = Object, example = json!({
            "employee_id": 7,
            "month": "2026-03",
            "records": []
        })),
        (status = 400, description = "Malformed month"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn month_records(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    auth.require_self_or_hr(employee_id)?;

    let month = match query.month.as_deref() {
        Some(raw) => MonthKey::parse(raw).ok_or_else(|| {
            AttendanceError::validation(format!("Invalid month {raw:?}, expected YYYY-MM"))
        })?,
        None => MonthKey::of(state.ledger.resolver().local_date(Utc::now())),
    };

    let records = state.ledger.month(employee_id, month).await?;
    Ok(HttpResponse::Ok().json(MonthResponse {
        employee_id,
        month: month.to_string(),
        records,
    }))
}

/// Backfill or correct one punch (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/records/{employee_id}/{date}/punch/{which}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Local date, YYYY-MM-DD"),
        ("which" = String, Path, description = "in | out")
    ),
    request_body = SetPunchReq,
    responses(
        (status = 200, description = "Updated record", body = Object),
        (status = 400, description = "Timestamp not on the date, or out of order"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Punch out without a punch in")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn set_punch(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<(u64, NaiveDate, PunchSide)>,
    body: web::Json<SetPunchReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let (employee_id, date, side) = path.into_inner();

    let record = state
        .ledger
        .admin_set_punch(
            employee_id,
            date,
            side,
            body.time,
            body.source.unwrap_or(PunchSource::Web),
            Utc::now(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Clear one punch (HR/Admin)
#[utoipa::path(
    delete,
    path = "/api/attendance/records/{employee_id}/{date}/punch/{which}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Local date, YYYY-MM-DD"),
        ("which" = String, Path, description = "in | out")
    ),
    responses(
        (status = 200, description = "Updated record", body = Object),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "No record for the date"),
        (status = 409, description = "Punch in cannot be cleared while a punch out exists", body = Object, example = json!({
            "message": "Delete the punch out before the punch in"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn delete_punch(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<(u64, NaiveDate, PunchSide)>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let (employee_id, date, side) = path.into_inner();

    let record = state
        .ledger
        .delete_punch(employee_id, date, side, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Override the day status (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/records/{employee_id}/{date}/status",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Local date, YYYY-MM-DD")
    ),
    request_body = SetStatusReq,
    responses(
        (status = 200, description = "`changed` is false when the status was already set", body = Object, example = json!({
            "changed": true,
            "record": { "status": "Paid Leave", "status_source": "manual" }
        })),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn set_status(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<(u64, NaiveDate)>,
    body: web::Json<SetStatusReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let (employee_id, date) = path.into_inner();

    let change = state
        .ledger
        .set_manual_status(employee_id, date, body.status, body.leave_type_id, Utc::now())
        .await?;
    let (changed, record) = match change {
        StatusChange::Changed(record) => (true, record),
        StatusChange::Unchanged(record) => (false, record),
    };
    Ok(HttpResponse::Ok().json(StatusResponse { changed, record }))
}

/// Configure schedule, attendance mode and alarms (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/ledger/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = LedgerReq,
    responses(
        (status = 200, description = "Stored ledger", body = Object),
        (status = 400, description = "Malformed schedule keys or alarm times"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn configure_ledger(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<LedgerReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let body = body.into_inner();

    let ledger = state
        .ledger
        .configure_ledger(
            path.into_inner(),
            LedgerUpdate {
                work_schedule: body.work_schedule,
                attendance_mode: body.attendance_mode,
                mobile_alarms: body.mobile_alarms,
            },
            Utc::now(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(ledger))
}

/// Flagged anomalies for an employee (HR/Admin)
#[utoipa::path(
    get,
    path = "/api/attendance/anomalies/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Anomalies, oldest first", body = Object, example = json!([{
            "anomaly_type": "Rapid Punches",
            "severity": "medium",
            "status": "pending",
            "description": "Punched out 60 seconds after punching in"
        }])),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn anomalies(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let anomalies = state.ledger.anomalies(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(anomalies))
}

/// Check the device an employee is signing in from
#[utoipa::path(
    post,
    path = "/api/attendance/device/verify",
    request_body = VerifyDeviceReq,
    responses(
        (status = 200, description = "Trusted, or pending administrator approval", body = Object, example = json!({
            "device_status": "pending",
            "request_id": "0f8e2a8c-7f3e-4d0c-9a43-1c2b7c8f5e11"
        })),
        (status = 400, description = "Empty device id"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn verify_device(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<VerifyDeviceReq>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.target_employee(body.employee_id)?;
    let verdict = state
        .devices
        .verify(employee_id, &body.device_id, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(verdict))
}

/// Approve a device change request (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/device/requests/{id}/approve",
    params(("id" = String, Path, description = "Device change request ID")),
    responses(
        (status = 200, description = "Request approved and device rebound", body = Object),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already decided")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn approve_device(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let request = state
        .devices
        .approve(path.into_inner(), auth.user_id, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

/// Reject a device change request (HR/Admin)
#[utoipa::path(
    put,
    path = "/api/attendance/device/requests/{id}/reject",
    params(("id" = String, Path, description = "Device change request ID")),
    responses(
        (status = 200, description = "Request rejected; the old device stays bound", body = Object),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already decided")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn reject_device(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let request = state
        .devices
        .reject(path.into_inner(), auth.user_id, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

/// Run the daily initializer now (Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/sweep",
    responses(
        (status = 200, description = "Sweep report", body = crate::attendance::initializer::SweepReport),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn run_sweep(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let report = state.initializer.run(Utc::now()).await?;
    Ok(HttpResponse::Ok().json(report))
}
