use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache;

use crate::attendance::shift_resolver::{self, ResolvedDay, ShiftResolver};
use crate::error::AttendanceResult;
use crate::model::{
    attendance::AttendanceStatus, branch::Branch, ledger::AttendanceLedger, shift::Shift,
};
use crate::store::AttendanceStore;

/// Shift and branch definitions change rarely and are read on every punch.
#[derive(Clone)]
pub struct Lookups {
    store: Arc<dyn AttendanceStore>,
    shifts: Cache<u64, Shift>,
    branches: Cache<u64, Branch>,
}

impl Lookups {
    pub fn new(store: Arc<dyn AttendanceStore>, ttl: Duration) -> Self {
        Self {
            store,
            shifts: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
            branches: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn shift(&self, shift_id: u64) -> AttendanceResult<Option<Shift>> {
        if let Some(shift) = self.shifts.get(&shift_id).await {
            return Ok(Some(shift));
        }
        let shift = self.store.shift(shift_id).await?;
        if let Some(s) = &shift {
            self.shifts.insert(shift_id, s.clone()).await;
        }
        Ok(shift)
    }

    pub async fn branch(&self, branch_id: u64) -> AttendanceResult<Option<Branch>> {
        if let Some(branch) = self.branches.get(&branch_id).await {
            return Ok(Some(branch));
        }
        let branch = self.store.branch(branch_id).await?;
        if let Some(b) = &branch {
            self.branches.insert(branch_id, b.clone()).await;
        }
        Ok(branch)
    }

    /// Schedule entry + shift definition for `date`, resolved to instants.
    pub async fn resolve_day(
        &self,
        resolver: &ShiftResolver,
        ledger: &AttendanceLedger,
        date: NaiveDate,
    ) -> AttendanceResult<Option<ResolvedDay>> {
        let shift_id = ShiftResolver::entry(&ledger.work_schedule, date).and_then(|e| e.shift_id);
        let shift = match shift_id {
            Some(id) => self.shift(id).await?,
            None => None,
        };
        Ok(resolver.resolve(&ledger.work_schedule, date, shift.as_ref()))
    }

    /// Status for a day nobody has punched.
    pub async fn default_status(
        &self,
        resolver: &ShiftResolver,
        ledger: &AttendanceLedger,
        company_id: u64,
        date: NaiveDate,
    ) -> AttendanceResult<AttendanceStatus> {
        let day = self.resolve_day(resolver, ledger, date).await?;
        let is_holiday = self.store.holiday(company_id, date).await?.is_some();
        Ok(shift_resolver::default_status(date, day.as_ref(), is_holiday))
    }
}
