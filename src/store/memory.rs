//! In-memory storage backend using DashMap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use super::AttendanceStore;
use crate::error::{AttendanceError, AttendanceResult};
use crate::model::{
    anomaly::Anomaly,
    attendance::{DailyRecord, MonthKey},
    branch::Branch,
    device::{DeviceChangeRequest, DeviceRequestStatus},
    employee::EmployeeProfile,
    ledger::AttendanceLedger,
    shift::Shift,
};

#[derive(Default)]
struct Inner {
    employees: DashMap<u64, EmployeeProfile>,
    companies: DashSet<u64>,
    branches: DashMap<u64, Branch>,
    shifts: DashMap<u64, Shift>,
    holidays: DashMap<(u64, NaiveDate), String>,
    ledgers: DashMap<u64, AttendanceLedger>,
    records: DashMap<(u64, NaiveDate), DailyRecord>,
    anomalies: DashMap<Uuid, Anomaly>,
    device_requests: DashMap<Uuid, DeviceChangeRequest>,
    reject_anomaly_writes: AtomicBool,
    record_write_delay_ms: AtomicU64,
}

/// Cheaply cloneable; all clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_company(&self, company_id: u64) {
        self.inner.companies.insert(company_id);
    }

    pub fn insert_employee(&self, employee: EmployeeProfile) {
        self.inner.employees.insert(employee.id, employee);
    }

    pub fn insert_branch(&self, branch: Branch) {
        self.inner.branches.insert(branch.id, branch);
    }

    pub fn insert_shift(&self, shift: Shift) {
        self.inner.shifts.insert(shift.id, shift);
    }

    pub fn insert_holiday(&self, company_id: u64, date: NaiveDate, name: &str) {
        self.inner
            .holidays
            .insert((company_id, date), name.to_string());
    }

    /// Makes every anomaly write fail, for exercising best-effort emission.
    pub fn reject_anomaly_writes(&self, reject: bool) {
        self.inner
            .reject_anomaly_writes
            .store(reject, Ordering::SeqCst);
    }

    /// Slows every record write down, like a loaded database.
    pub fn delay_record_writes(&self, delay: Duration) {
        self.inner
            .record_write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn record_count(&self) -> usize {
        self.inner.records.len()
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn employee(&self, employee_id: u64) -> AttendanceResult<Option<EmployeeProfile>> {
        Ok(self
            .inner
            .employees
            .get(&employee_id)
            .map(|e| e.value().clone()))
    }

    async fn company_exists(&self, company_id: u64) -> AttendanceResult<bool> {
        Ok(self.inner.companies.contains(&company_id))
    }

    async fn branch(&self, branch_id: u64) -> AttendanceResult<Option<Branch>> {
        Ok(self.inner.branches.get(&branch_id).map(|b| b.value().clone()))
    }

    async fn shift(&self, shift_id: u64) -> AttendanceResult<Option<Shift>> {
        Ok(self.inner.shifts.get(&shift_id).map(|s| s.value().clone()))
    }

    async fn holiday(&self, company_id: u64, date: NaiveDate) -> AttendanceResult<Option<String>> {
        Ok(self
            .inner
            .holidays
            .get(&(company_id, date))
            .map(|h| h.value().clone()))
    }

    async fn bind_device(&self, employee_id: u64, device_id: &str) -> AttendanceResult<()> {
        match self.inner.employees.get_mut(&employee_id) {
            Some(mut employee) => {
                employee.device_id = Some(device_id.to_string());
                Ok(())
            }
            None => Err(AttendanceError::not_found("Employee")),
        }
    }

    async fn ledger(&self, employee_id: u64) -> AttendanceResult<Option<AttendanceLedger>> {
        Ok(self
            .inner
            .ledgers
            .get(&employee_id)
            .map(|l| l.value().clone()))
    }

    async fn save_ledger(&self, ledger: &AttendanceLedger) -> AttendanceResult<()> {
        self.inner.ledgers.insert(ledger.employee_id, ledger.clone());
        Ok(())
    }

    async fn ledger_employee_ids(&self) -> AttendanceResult<Vec<u64>> {
        let mut ids: Vec<u64> = self.inner.ledgers.iter().map(|l| *l.key()).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> AttendanceResult<Option<DailyRecord>> {
        Ok(self
            .inner
            .records
            .get(&(employee_id, date))
            .map(|r| r.value().clone()))
    }

    async fn records_for_month(
        &self,
        employee_id: u64,
        month: MonthKey,
    ) -> AttendanceResult<Vec<DailyRecord>> {
        let mut records: Vec<DailyRecord> = self
            .inner
            .records
            .iter()
            .filter(|r| r.key().0 == employee_id && month.contains(r.key().1))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn save_record(&self, record: &DailyRecord) -> AttendanceResult<DailyRecord> {
        let delay_ms = self.inner.record_write_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let mut next = record.clone();
        next.version = record.version + 1;

        match self.inner.records.entry((record.employee_id, record.date)) {
            Entry::Occupied(mut slot) => {
                if record.version == 0 || slot.get().version != record.version {
                    return Err(AttendanceError::VersionConflict);
                }
                slot.insert(next.clone());
            }
            Entry::Vacant(slot) => {
                if record.version != 0 {
                    return Err(AttendanceError::VersionConflict);
                }
                slot.insert(next.clone());
            }
        }
        Ok(next)
    }

    async fn insert_anomaly(&self, anomaly: &Anomaly) -> AttendanceResult<()> {
        if self.inner.reject_anomaly_writes.load(Ordering::SeqCst) {
            return Err(AttendanceError::Storage(sqlx::Error::PoolClosed));
        }
        self.inner.anomalies.insert(anomaly.id, anomaly.clone());
        Ok(())
    }

    async fn anomalies_for(&self, employee_id: u64) -> AttendanceResult<Vec<Anomaly>> {
        let mut anomalies: Vec<Anomaly> = self
            .inner
            .anomalies
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .map(|a| a.value().clone())
            .collect();
        anomalies.sort_by_key(|a| a.created_at);
        Ok(anomalies)
    }

    async fn pending_device_request(
        &self,
        employee_id: u64,
        device_id: &str,
    ) -> AttendanceResult<Option<DeviceChangeRequest>> {
        Ok(self
            .inner
            .device_requests
            .iter()
            .find(|r| {
                r.employee_id == employee_id
                    && r.new_device_id == device_id
                    && r.status == DeviceRequestStatus::Pending
            })
            .map(|r| r.value().clone()))
    }

    async fn device_request(&self, id: Uuid) -> AttendanceResult<Option<DeviceChangeRequest>> {
        Ok(self.inner.device_requests.get(&id).map(|r| r.value().clone()))
    }

    async fn save_device_request(&self, request: &DeviceChangeRequest) -> AttendanceResult<()> {
        self.inner
            .device_requests
            .insert(request.id, request.clone());
        Ok(())
    }
}
