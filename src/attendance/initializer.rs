//! Nightly sweep that gives every ledger a record for the day with its
//! schedule-derived default status.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use futures::{StreamExt, stream};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use super::ledger::{Committed, commit_record};
use super::locks::EmployeeLocks;
use super::shift_resolver::ShiftResolver;
use crate::error::AttendanceResult;
use crate::model::attendance::{DailyRecord, StatusSource};
use crate::store::AttendanceStore;
use crate::utils::lookup_cache::Lookups;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub untouched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl SweepReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            processed: 0,
            created: 0,
            updated: 0,
            untouched: 0,
            skipped: 0,
            failed: 0,
            cancelled: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Untouched,
    Skipped,
    Cancelled,
}

pub struct DailyInitializer {
    store: Arc<dyn AttendanceStore>,
    lookups: Lookups,
    resolver: ShiftResolver,
    locks: EmployeeLocks,
    concurrency: usize,
    overrides_manual: bool,
    shutdown: watch::Receiver<bool>,
}

impl DailyInitializer {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        lookups: Lookups,
        resolver: ShiftResolver,
        locks: EmployeeLocks,
        concurrency: usize,
        overrides_manual: bool,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            lookups,
            resolver,
            locks,
            concurrency: concurrency.max(1),
            overrides_manual,
            shutdown,
        }
    }

    pub fn resolver(&self) -> &ShiftResolver {
        &self.resolver
    }

    /// Sweeps every ledger for the local date of `now`. Running it twice for the
    /// same date changes nothing the second time.
    pub async fn run(&self, now: DateTime<Utc>) -> AttendanceResult<SweepReport> {
        let date = self.resolver.local_date(now);
        let employee_ids = self.store.ledger_employee_ids().await?;
        info!(%date, ledgers = employee_ids.len(), "Starting attendance sweep");

        let outcomes: Vec<(u64, AttendanceResult<Outcome>)> = stream::iter(employee_ids)
            .map(|employee_id| async move {
                (employee_id, self.initialize(employee_id, date, now).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = SweepReport::new(date);
        for (employee_id, outcome) in outcomes {
            report.processed += 1;
            match outcome {
                Ok(Outcome::Created) => report.created += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Untouched) => report.untouched += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Ok(Outcome::Cancelled) => report.cancelled += 1,
                Err(e) => {
                    error!(employee_id, %date, error = %e, "Sweep failed for employee");
                    report.failed += 1;
                }
            }
        }

        info!(
            %date,
            processed = report.processed,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            cancelled = report.cancelled,
            "Attendance sweep finished"
        );
        Ok(report)
    }

    async fn initialize(
        &self,
        employee_id: u64,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> AttendanceResult<Outcome> {
        if *self.shutdown.borrow() {
            return Ok(Outcome::Cancelled);
        }

        let Some(ledger) = self.store.ledger(employee_id).await? else {
            return Ok(Outcome::Skipped);
        };
        let employee = self.store.employee(employee_id).await?;
        if employee.as_ref().is_some_and(|e| !e.is_active()) {
            return Ok(Outcome::Skipped);
        }
        let Some(company_id) = ledger
            .company_id
            .or_else(|| employee.as_ref().and_then(|e| e.company_id))
        else {
            warn!(employee_id, "Ledger has no company, skipping");
            return Ok(Outcome::Skipped);
        };

        let default_status = self
            .lookups
            .default_status(&self.resolver, &ledger, company_id, date)
            .await?;

        let _guard = self.locks.acquire(employee_id).await;
        let mut created = false;
        let committed = commit_record(self.store.as_ref(), employee_id, date, |current| {
            match current {
                None => {
                    created = true;
                    Ok(Some(DailyRecord::new(
                        employee_id,
                        company_id,
                        date,
                        default_status,
                        StatusSource::Schedule,
                        now,
                    )))
                }
                Some(record)
                    if record.punch_in.is_some()
                        || (record.status_source == StatusSource::Manual
                            && !self.overrides_manual)
                        || record.status == default_status =>
                {
                    Ok(None)
                }
                Some(mut record) => {
                    created = false;
                    record.status = default_status;
                    record.status_source = StatusSource::Schedule;
                    record.updated_at = now;
                    Ok(Some(record))
                }
            }
        })
        .await?;

        Ok(match committed {
            Committed::Saved(_) if created => Outcome::Created,
            Committed::Saved(_) => Outcome::Updated,
            Committed::Unchanged(_) => Outcome::Untouched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        attendance::{AttendanceStatus, PunchEvent, PunchSource, PunchStatus},
        employee::EmployeeProfile,
        ledger::{AttendanceLedger, ScheduleEntry, WorkSchedule},
    };
    use crate::store::MemoryStore;
    use chrono::{FixedOffset, TimeZone};
    use std::collections::BTreeMap;

    // 2026-03-07 is a Saturday
    fn saturday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap()
    }

    fn saturday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    async fn seed(store: &MemoryStore, employee_id: u64, weekoff_saturday: bool) {
        store.insert_company(1);
        store.insert_employee(EmployeeProfile {
            id: employee_id,
            company_id: Some(1),
            branch_id: None,
            first_name: "Nadia".into(),
            last_name: format!("{employee_id}"),
            device_id: None,
            status: "active".into(),
        });
        let mut days = BTreeMap::new();
        days.insert(
            "Sat".to_string(),
            ScheduleEntry {
                is_weekoff: weekoff_saturday,
                shift_id: None,
            },
        );
        let mut ledger = AttendanceLedger::new(employee_id, Some(1), saturday_noon());
        ledger.work_schedule = WorkSchedule::Fixed(days);
        store.save_ledger(&ledger).await.unwrap();
    }

    fn initializer(
        store: &MemoryStore,
        overrides_manual: bool,
    ) -> (DailyInitializer, watch::Sender<bool>) {
        let shared: Arc<dyn AttendanceStore> = Arc::new(store.clone());
        let (tx, rx) = watch::channel(false);
        let init = DailyInitializer::new(
            shared.clone(),
            Lookups::new(shared, std::time::Duration::from_secs(60)),
            ShiftResolver::new(FixedOffset::east_opt(0).unwrap()),
            EmployeeLocks::new(),
            4,
            overrides_manual,
            rx,
        );
        (init, tx)
    }

    #[tokio::test]
    async fn creates_defaults_and_is_idempotent() {
        let store = MemoryStore::new();
        seed(&store, 1, true).await;
        seed(&store, 2, false).await;
        let (init, _tx) = initializer(&store, false);

        let first = init.run(saturday_noon()).await.unwrap();
        assert_eq!(first.processed, 2);
        assert_eq!(first.created, 2);

        let weekoff = store.record(1, saturday()).await.unwrap().unwrap();
        assert_eq!(weekoff.status, AttendanceStatus::WeekOff);
        let absent = store.record(2, saturday()).await.unwrap().unwrap();
        assert_eq!(absent.status, AttendanceStatus::Absent);

        let second = init.run(saturday_noon()).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.untouched, 2);
        assert_eq!(store.record(1, saturday()).await.unwrap().unwrap(), weekoff);
    }

    #[tokio::test]
    async fn holiday_wins_over_week_off() {
        let store = MemoryStore::new();
        seed(&store, 1, true).await;
        store.insert_holiday(1, saturday(), "Independence Day");
        let (init, _tx) = initializer(&store, false);

        init.run(saturday_noon()).await.unwrap();
        let record = store.record(1, saturday()).await.unwrap().unwrap();
        assert_eq!(record.status, AttendanceStatus::Holiday);
    }

    #[tokio::test]
    async fn never_downgrades_a_punched_day() {
        let store = MemoryStore::new();
        seed(&store, 1, true).await;
        let mut record = DailyRecord::new(
            1,
            1,
            saturday(),
            AttendanceStatus::Present,
            StatusSource::Punch,
            saturday_noon(),
        );
        record.punch_in = Some(PunchEvent {
            time: Utc.with_ymd_and_hms(2026, 3, 7, 9, 0, 0).unwrap(),
            status: PunchStatus::OnTime,
            source: PunchSource::Web,
            photo_ref: None,
            location: None,
        });
        let stored = store.save_record(&record).await.unwrap();
        let (init, _tx) = initializer(&store, true);

        let report = init.run(saturday_noon()).await.unwrap();
        assert_eq!(report.untouched, 1);
        assert_eq!(store.record(1, saturday()).await.unwrap().unwrap(), stored);
    }

    #[tokio::test]
    async fn manual_status_is_sticky_unless_overridden() {
        let store = MemoryStore::new();
        seed(&store, 1, true).await;
        let record = DailyRecord::new(
            1,
            1,
            saturday(),
            AttendanceStatus::PaidLeave,
            StatusSource::Manual,
            saturday_noon(),
        );
        store.save_record(&record).await.unwrap();

        let (sticky, _tx) = initializer(&store, false);
        sticky.run(saturday_noon()).await.unwrap();
        let kept = store.record(1, saturday()).await.unwrap().unwrap();
        assert_eq!(kept.status, AttendanceStatus::PaidLeave);

        let (overriding, _tx) = initializer(&store, true);
        let report = overriding.run(saturday_noon()).await.unwrap();
        assert_eq!(report.updated, 1);
        let replaced = store.record(1, saturday()).await.unwrap().unwrap();
        assert_eq!(replaced.status, AttendanceStatus::WeekOff);
        assert_eq!(replaced.status_source, StatusSource::Schedule);
    }

    #[tokio::test]
    async fn shutdown_cancels_remaining_ledgers() {
        let store = MemoryStore::new();
        seed(&store, 1, false).await;
        seed(&store, 2, false).await;
        let (init, tx) = initializer(&store, false);
        tx.send(true).unwrap();

        let report = init.run(saturday_noon()).await.unwrap();
        assert_eq!(report.cancelled, 2);
        assert_eq!(store.record_count(), 0);
    }

    async fn reschedule(store: &MemoryStore, employee_id: u64, day: &str, is_weekoff: bool) {
        let mut ledger = store.ledger(employee_id).await.unwrap().unwrap();
        ledger.work_schedule = WorkSchedule::Fixed(BTreeMap::from([(
            day.to_string(),
            ScheduleEntry {
                is_weekoff,
                shift_id: None,
            },
        )]));
        store.save_ledger(&ledger).await.unwrap();
    }

    #[tokio::test]
    async fn sunday_weekoff_is_recorded_as_sunday() {
        let store = MemoryStore::new();
        seed(&store, 1, false).await;
        reschedule(&store, 1, "Sun", true).await;
        let (init, _tx) = initializer(&store, false);

        // 2026-03-08 is a Sunday
        let sunday_noon = Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap();
        let report = init.run(sunday_noon).await.unwrap();
        assert_eq!(report.created, 1);

        let sunday = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let record = store.record(1, sunday).await.unwrap().unwrap();
        assert_eq!(record.status, AttendanceStatus::Sunday);
        assert_eq!(record.status_source, StatusSource::Schedule);
        assert!(record.punch_in.is_none());
    }

    #[tokio::test]
    async fn schedule_change_updates_an_unpunched_day() {
        let store = MemoryStore::new();
        seed(&store, 1, false).await;
        let (init, _tx) = initializer(&store, false);

        init.run(saturday_noon()).await.unwrap();
        let absent = store.record(1, saturday()).await.unwrap().unwrap();
        assert_eq!(absent.status, AttendanceStatus::Absent);

        reschedule(&store, 1, "Sat", true).await;
        let report = init.run(saturday_noon()).await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.created, 0);

        let weekoff = store.record(1, saturday()).await.unwrap().unwrap();
        assert_eq!(weekoff.status, AttendanceStatus::WeekOff);
        assert_eq!(weekoff.status_source, StatusSource::Schedule);
        assert!(weekoff.version > absent.version);
    }
}
