//! Persistence seam for the attendance engine.
//!
//! `MySqlStore` is used when `DATABASE_URL` is set; otherwise the service runs
//! on `MemoryStore` and state does not survive restarts.

mod memory;
mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::AttendanceResult;
use crate::model::{
    anomaly::Anomaly,
    attendance::{DailyRecord, MonthKey},
    branch::Branch,
    device::DeviceChangeRequest,
    employee::EmployeeProfile,
    ledger::AttendanceLedger,
    shift::Shift,
};

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    // ---------- directory lookups owned by other services ----------
    async fn employee(&self, employee_id: u64) -> AttendanceResult<Option<EmployeeProfile>>;
    async fn company_exists(&self, company_id: u64) -> AttendanceResult<bool>;
    async fn branch(&self, branch_id: u64) -> AttendanceResult<Option<Branch>>;
    async fn shift(&self, shift_id: u64) -> AttendanceResult<Option<Shift>>;
    /// Name of the company holiday on `date`, if any.
    async fn holiday(&self, company_id: u64, date: NaiveDate) -> AttendanceResult<Option<String>>;
    async fn bind_device(&self, employee_id: u64, device_id: &str) -> AttendanceResult<()>;

    // ---------- ledgers ----------
    async fn ledger(&self, employee_id: u64) -> AttendanceResult<Option<AttendanceLedger>>;
    async fn save_ledger(&self, ledger: &AttendanceLedger) -> AttendanceResult<()>;
    async fn ledger_employee_ids(&self) -> AttendanceResult<Vec<u64>>;

    // ---------- daily records ----------
    async fn record(&self, employee_id: u64, date: NaiveDate)
    -> AttendanceResult<Option<DailyRecord>>;
    async fn records_for_month(
        &self,
        employee_id: u64,
        month: MonthKey,
    ) -> AttendanceResult<Vec<DailyRecord>>;
    /// Compare-and-swap on `record.version`: version 0 inserts and requires the
    /// row to be absent, otherwise the stored version must match. Returns the
    /// stored record with its bumped version, or `VersionConflict`.
    async fn save_record(&self, record: &DailyRecord) -> AttendanceResult<DailyRecord>;

    // ---------- anomalies ----------
    async fn insert_anomaly(&self, anomaly: &Anomaly) -> AttendanceResult<()>;
    async fn anomalies_for(&self, employee_id: u64) -> AttendanceResult<Vec<Anomaly>>;

    // ---------- device change requests ----------
    async fn pending_device_request(
        &self,
        employee_id: u64,
        device_id: &str,
    ) -> AttendanceResult<Option<DeviceChangeRequest>>;
    async fn device_request(&self, id: Uuid) -> AttendanceResult<Option<DeviceChangeRequest>>;
    async fn save_device_request(&self, request: &DeviceChangeRequest) -> AttendanceResult<()>;
}
