//! Device trust: the first device an employee uses is bound to them; any other
//! device needs an administrator's approval before it is trusted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::anomaly::AnomalyDetector;
use super::ledger::{commit_record, company_for};
use super::locks::EmployeeLocks;
use super::shift_resolver::ShiftResolver;
use super::side_effects::SideEffects;
use crate::error::{AttendanceError, AttendanceResult};
use crate::model::{
    attendance::{AttendanceStatus, DailyRecord, DeviceStatus, StatusSource},
    device::{DeviceChangeRequest, DeviceRequestStatus},
    employee::EmployeeProfile,
};
use crate::store::AttendanceStore;
use crate::utils::lookup_cache::Lookups;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "device_status", rename_all = "lowercase")]
pub enum DeviceVerdict {
    Trusted,
    Pending { request_id: Uuid },
}

pub struct DeviceGuard {
    store: Arc<dyn AttendanceStore>,
    lookups: Lookups,
    resolver: ShiftResolver,
    locks: EmployeeLocks,
    effects: SideEffects,
    detector: AnomalyDetector,
}

impl DeviceGuard {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        lookups: Lookups,
        resolver: ShiftResolver,
        locks: EmployeeLocks,
        effects: SideEffects,
    ) -> Self {
        Self {
            store,
            lookups,
            resolver,
            locks,
            effects,
            detector: AnomalyDetector,
        }
    }

    async fn employee(&self, employee_id: u64) -> AttendanceResult<EmployeeProfile> {
        self.store
            .employee(employee_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Employee"))
    }

    pub async fn verify(
        &self,
        employee_id: u64,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> AttendanceResult<DeviceVerdict> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(AttendanceError::validation("device_id must not be empty"));
        }
        let employee = self.employee(employee_id).await?;

        match employee.device_id.as_deref() {
            None => {
                self.store.bind_device(employee_id, device_id).await?;
                info!(employee_id, device_id, "Bound first device");
                return Ok(DeviceVerdict::Trusted);
            }
            Some(bound) if bound == device_id => return Ok(DeviceVerdict::Trusted),
            Some(_) => {}
        }

        let ledger = self.store.ledger(employee_id).await?;
        let company_id = company_for(ledger.as_ref(), &employee)?;

        let request = match self
            .store
            .pending_device_request(employee_id, device_id)
            .await?
        {
            Some(existing) => existing,
            None => {
                let request = DeviceChangeRequest {
                    id: Uuid::new_v4(),
                    employee_id,
                    company_id,
                    old_device_id: employee.device_id.clone(),
                    new_device_id: device_id.to_string(),
                    status: DeviceRequestStatus::Pending,
                    requested_at: now,
                    decided_at: None,
                    decided_by: None,
                };
                self.store.save_device_request(&request).await?;
                self.effects.record(self.detector.device_tampering(
                    employee_id,
                    company_id,
                    employee.device_id.as_deref(),
                    device_id,
                    now,
                ));
                warn!(
                    employee_id,
                    device_id,
                    request_id = %request.id,
                    "Unrecognised device, change request opened"
                );
                request
            }
        };

        let default_status = match &ledger {
            Some(ledger) => {
                let date = self.resolver.local_date(now);
                self.lookups
                    .default_status(&self.resolver, ledger, company_id, date)
                    .await?
            }
            None => AttendanceStatus::Absent,
        };
        self.mark_today(employee_id, company_id, DeviceStatus::Pending, Some(default_status), now)
            .await?;

        Ok(DeviceVerdict::Pending {
            request_id: request.id,
        })
    }

    /// Sets today's device status. Creates the record only when a default
    /// status is supplied.
    async fn mark_today(
        &self,
        employee_id: u64,
        company_id: u64,
        device_status: DeviceStatus,
        default_status: Option<AttendanceStatus>,
        now: DateTime<Utc>,
    ) -> AttendanceResult<()> {
        let date = self.resolver.local_date(now);
        let _guard = self.locks.acquire(employee_id).await;
        commit_record(self.store.as_ref(), employee_id, date, |current| {
            let mut record = match (current, default_status) {
                (Some(record), _) if record.device_status == Some(device_status) => {
                    return Ok(None);
                }
                (Some(record), _) => record,
                (None, Some(status)) => DailyRecord::new(
                    employee_id,
                    company_id,
                    date,
                    status,
                    StatusSource::Schedule,
                    now,
                ),
                (None, None) => return Ok(None),
            };
            record.device_status = Some(device_status);
            record.updated_at = now;
            Ok(Some(record))
        })
        .await?;
        Ok(())
    }

    async fn pending_request(&self, request_id: Uuid) -> AttendanceResult<DeviceChangeRequest> {
        let request = self
            .store
            .device_request(request_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Device change request"))?;
        if request.status != DeviceRequestStatus::Pending {
            return Err(AttendanceError::StateConflict(format!(
                "Device change request is already {}",
                request.status
            )));
        }
        Ok(request)
    }

    pub async fn approve(
        &self,
        request_id: Uuid,
        decided_by: u64,
        now: DateTime<Utc>,
    ) -> AttendanceResult<DeviceChangeRequest> {
        let mut request = self.pending_request(request_id).await?;
        self.store
            .bind_device(request.employee_id, &request.new_device_id)
            .await?;

        request.status = DeviceRequestStatus::Approved;
        request.decided_at = Some(now);
        request.decided_by = Some(decided_by);
        self.store.save_device_request(&request).await?;

        self.mark_today(
            request.employee_id,
            request.company_id,
            DeviceStatus::Trusted,
            None,
            now,
        )
        .await?;
        info!(
            employee_id = request.employee_id,
            request_id = %request.id,
            decided_by,
            "Device change approved"
        );
        Ok(request)
    }

    pub async fn reject(
        &self,
        request_id: Uuid,
        decided_by: u64,
        now: DateTime<Utc>,
    ) -> AttendanceResult<DeviceChangeRequest> {
        let mut request = self.pending_request(request_id).await?;
        request.status = DeviceRequestStatus::Rejected;
        request.decided_at = Some(now);
        request.decided_by = Some(decided_by);
        self.store.save_device_request(&request).await?;
        info!(
            employee_id = request.employee_id,
            request_id = %request.id,
            decided_by,
            "Device change rejected"
        );
        Ok(request)
    }
}
