use crate::api::attendance::{LedgerReq, PunchReq, SetPunchReq, SetStatusReq, VerifyDeviceReq};
use crate::attendance::initializer::SweepReport;
use crate::model::attendance::{
    AttendanceStatus, DayStatus, Location, PunchSide, PunchSource, PunchStatus, StatusSource,
};
use crate::model::ledger::{AttendanceMode, MarkAttendanceFrom, MobileAlarm, SmartphoneMode};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Attendance API",
        version = "1.0.0",
        description = r#"
## Attendance Engine

Tracks each employee's working day from the first punch to the last.

### 🔹 Key Features
- **Punching**
  - Punch in and out from mobile, web, biometric or kiosk channels
  - Office geofencing for self-located punches
- **Daily Records**
  - Today's state and a monthly record view per employee
  - Administrative backfill, punch removal and status overrides
- **Fraud Review**
  - Buddy punching, unusual hours, rapid punches, GPS spoofing and device tampering flags
  - Device change requests with approval
- **Nightly Initialization**
  - Every ledger gets a default status for the day (Absent, Week Off, Sunday or Holiday)

### 🔐 Security
All endpoints require a **JWT Bearer** access token.
Employees act on their own attendance; **Admin** and **HR** act on anyone's.
"#,
    ),
    paths(
        crate::api::attendance::punch,
        crate::api::attendance::today,
        crate::api::attendance::month_records,
        crate::api::attendance::set_punch,
        crate::api::attendance::delete_punch,
        crate::api::attendance::set_status,
        crate::api::attendance::configure_ledger,
        crate::api::attendance::anomalies,
        crate::api::attendance::verify_device,
        crate::api::attendance::approve_device,
        crate::api::attendance::reject_device,
        crate::api::attendance::run_sweep
    ),
    components(
        schemas(
            PunchReq,
            SetPunchReq,
            SetStatusReq,
            LedgerReq,
            VerifyDeviceReq,
            SweepReport,
            Location,
            PunchSource,
            PunchSide,
            PunchStatus,
            AttendanceStatus,
            StatusSource,
            DayStatus,
            AttendanceMode,
            SmartphoneMode,
            MarkAttendanceFrom,
            MobileAlarm
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance tracking APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
