//! The punch state machine: owns each employee's daily record and moves it
//! through none → in → completed.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use super::anomaly::{AnomalyDetector, PunchContext};
use super::geofence::{GeofenceValidator, GeofenceVerdict};
use super::locks::EmployeeLocks;
use super::notify::PunchNotification;
use super::shift_resolver::{ResolvedDay, ShiftResolver, weekday_key};
use super::side_effects::SideEffects;
use crate::error::{AttendanceError, AttendanceResult};
use crate::model::{
    anomaly::Anomaly,
    attendance::{
        AttendanceStatus, DailyRecord, DayStatus, Location, MonthKey, PunchEvent, PunchSide,
        PunchSource, PunchStatus, StatusSource,
    },
    employee::EmployeeProfile,
    ledger::{AttendanceLedger, AttendanceMode, MobileAlarm, WorkSchedule},
};
use crate::store::AttendanceStore;
use crate::utils::lookup_cache::Lookups;

/// Optimistic write attempts before giving up with `VersionConflict`.
pub const SAVE_ATTEMPTS: usize = 3;
/// How far ahead of the server clock a client timestamp may be.
pub const MAX_CLOCK_SKEW_MINUTES: i64 = 5;
/// How far behind the server clock an employee's own timestamp may be.
pub const DEFAULT_MAX_PUNCH_AGE_MINUTES: i64 = 15;
/// Budget for everything a punch does before its record is written.
pub const DEFAULT_DECISION_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct PunchRequest {
    pub employee_id: u64,
    pub company_id: u64,
    pub source: PunchSource,
    pub photo_ref: Option<String>,
    pub location: Option<Location>,
    pub device_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Submitted by an administrator; `timestamp` may then be arbitrarily old.
    pub backfill: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PunchOutcome {
    pub status: DayStatus,
    pub record: DailyRecord,
}

#[derive(Debug, Clone)]
pub enum StatusChange {
    Changed(DailyRecord),
    Unchanged(DailyRecord),
}

#[derive(Debug, Clone, Default)]
pub struct LedgerUpdate {
    pub work_schedule: Option<WorkSchedule>,
    pub attendance_mode: Option<AttendanceMode>,
    pub mobile_alarms: Option<Vec<MobileAlarm>>,
}

pub(crate) enum Committed {
    Saved(DailyRecord),
    Unchanged(Option<DailyRecord>),
}

/// Everything a punch settles before writing, with the employee lock held.
struct PreparedPunch {
    employee: EmployeeProfile,
    date: NaiveDate,
    day: Option<ResolvedDay>,
    _guard: OwnedMutexGuard<()>,
}

enum PunchPlan {
    Write(PreparedPunch),
    Completed(DailyRecord),
}

/// Read-modify-write of one daily record with versioned retries. `build`
/// returns the record to store, or `None` to leave things as they are. Callers
/// hold the employee lock; retries only cover writers outside this process.
pub(crate) async fn commit_record<F>(
    store: &dyn AttendanceStore,
    employee_id: u64,
    date: NaiveDate,
    mut build: F,
) -> AttendanceResult<Committed>
where
    F: FnMut(Option<DailyRecord>) -> AttendanceResult<Option<DailyRecord>>,
{
    for attempt in 1..=SAVE_ATTEMPTS {
        let current = store.record(employee_id, date).await?;
        let Some(next) = build(current.clone())? else {
            return Ok(Committed::Unchanged(current));
        };
        if !next.is_consistent() {
            return Err(AttendanceError::validation(
                "Punch out must be later than punch in",
            ));
        }

        match store.save_record(&next).await {
            Ok(saved) => return Ok(Committed::Saved(saved)),
            Err(AttendanceError::VersionConflict) => {
                warn!(employee_id, %date, attempt, "Daily record changed concurrently, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Err(AttendanceError::VersionConflict)
}

pub fn punch_in_status(at: DateTime<Utc>, day: Option<&ResolvedDay>) -> PunchStatus {
    match day.and_then(|d| d.window) {
        Some(window) if at > window.start => PunchStatus::Late,
        _ => PunchStatus::OnTime,
    }
}

pub fn punch_out_status(at: DateTime<Utc>, day: Option<&ResolvedDay>) -> PunchStatus {
    match day.and_then(|d| d.window) {
        Some(window) if at < window.end => PunchStatus::Early,
        Some(window) if at <= window.end_grace => PunchStatus::Normal,
        _ => PunchStatus::OverTime,
    }
}

fn ensure_channel_enabled(mode: &AttendanceMode, source: PunchSource) -> AttendanceResult<()> {
    let enabled = match source {
        PunchSource::Mobile => mode.smartphone.enabled,
        PunchSource::Biometric => mode.biometric,
        PunchSource::Kiosk => mode.kiosk,
        PunchSource::Web => true,
    };
    if enabled {
        Ok(())
    } else {
        Err(AttendanceError::validation(format!(
            "{source} attendance is not enabled for this employee"
        )))
    }
}

fn validate_location(location: &Location) -> AttendanceResult<()> {
    let valid = location.lat.is_finite()
        && location.lng.is_finite()
        && (-90.0..=90.0).contains(&location.lat)
        && (-180.0..=180.0).contains(&location.lng);
    if valid {
        Ok(())
    } else {
        Err(AttendanceError::validation("Location coordinates are out of range"))
    }
}

fn validate_schedule(schedule: &WorkSchedule) -> AttendanceResult<()> {
    match schedule {
        WorkSchedule::Fixed(days) => {
            let weekdays: Vec<&str> = [
                chrono::Weekday::Mon,
                chrono::Weekday::Tue,
                chrono::Weekday::Wed,
                chrono::Weekday::Thu,
                chrono::Weekday::Fri,
                chrono::Weekday::Sat,
                chrono::Weekday::Sun,
            ]
            .into_iter()
            .map(weekday_key)
            .collect();
            if let Some(bad) = days.keys().find(|k| !weekdays.contains(&k.as_str())) {
                return Err(AttendanceError::validation(format!(
                    "Unknown weekday {bad:?}, expected one of {}",
                    weekdays.join(", ")
                )));
            }
        }
        WorkSchedule::Flexible(months) => {
            for (month, days) in months {
                let key = MonthKey::parse(month).ok_or_else(|| {
                    AttendanceError::validation(format!("Invalid month key {month:?}, expected YYYY-MM"))
                })?;
                for day in days.keys() {
                    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| {
                        AttendanceError::validation(format!(
                            "Invalid date key {day:?}, expected YYYY-MM-DD"
                        ))
                    })?;
                    if !key.contains(date) {
                        return Err(AttendanceError::validation(format!(
                            "Date {day} is filed under month {month}"
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_alarms(alarms: &[MobileAlarm]) -> AttendanceResult<()> {
    for alarm in alarms {
        NaiveTime::parse_from_str(&alarm.time, "%H:%M").map_err(|_| {
            AttendanceError::validation(format!("Invalid alarm time {:?}, expected HH:MM", alarm.time))
        })?;
    }
    Ok(())
}

pub(crate) fn company_for(
    ledger: Option<&AttendanceLedger>,
    employee: &EmployeeProfile,
) -> AttendanceResult<u64> {
    ledger
        .and_then(|l| l.company_id)
        .or(employee.company_id)
        .ok_or_else(|| {
            AttendanceError::Configuration(format!(
                "employee {} is not linked to a company",
                employee.id
            ))
        })
}

pub struct PunchLedger {
    store: Arc<dyn AttendanceStore>,
    lookups: Lookups,
    resolver: ShiftResolver,
    geofence: GeofenceValidator,
    locks: EmployeeLocks,
    effects: SideEffects,
    detector: AnomalyDetector,
    decision_timeout: std::time::Duration,
    max_punch_age: Duration,
}

impl PunchLedger {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        lookups: Lookups,
        resolver: ShiftResolver,
        geofence: GeofenceValidator,
        locks: EmployeeLocks,
        effects: SideEffects,
    ) -> Self {
        Self {
            store,
            lookups,
            resolver,
            geofence,
            locks,
            effects,
            detector: AnomalyDetector,
            decision_timeout: DEFAULT_DECISION_TIMEOUT,
            max_punch_age: Duration::minutes(DEFAULT_MAX_PUNCH_AGE_MINUTES),
        }
    }

    /// Deadline for a punch's lock wait, lookups and geofence check. The
    /// record write itself always runs to completion.
    pub fn with_decision_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.decision_timeout = timeout;
        self
    }

    pub fn with_max_punch_age(mut self, age: Duration) -> Self {
        self.max_punch_age = age;
        self
    }

    pub fn resolver(&self) -> &ShiftResolver {
        &self.resolver
    }

    pub fn effects(&self) -> &SideEffects {
        &self.effects
    }

    async fn employee(&self, employee_id: u64) -> AttendanceResult<EmployeeProfile> {
        self.store
            .employee(employee_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Employee"))
    }

    async fn ledger_or_create(
        &self,
        employee: &EmployeeProfile,
        now: DateTime<Utc>,
    ) -> AttendanceResult<AttendanceLedger> {
        if let Some(ledger) = self.store.ledger(employee.id).await? {
            return Ok(ledger);
        }
        let _guard = self.locks.acquire(employee.id).await;
        if let Some(ledger) = self.store.ledger(employee.id).await? {
            return Ok(ledger);
        }
        let ledger = AttendanceLedger::new(employee.id, employee.company_id, now);
        self.store.save_ledger(&ledger).await?;
        info!(employee_id = employee.id, "Created attendance ledger");
        Ok(ledger)
    }

    /// Day a punch at `at` belongs to, with its resolved schedule and current
    /// record. A punch after midnight still closes the previous day's
    /// overnight shift while that day is open.
    async fn punch_date(
        &self,
        ledger: &AttendanceLedger,
        employee_id: u64,
        at: DateTime<Utc>,
    ) -> AttendanceResult<(NaiveDate, Option<ResolvedDay>, Option<DailyRecord>)> {
        let date = self.resolver.local_date(at);
        let current = self.store.record(employee_id, date).await?;

        let punched_today = current.as_ref().is_some_and(|r| r.punch_in.is_some());
        if let (false, Some(previous)) = (punched_today, date.pred_opt()) {
            let open = self
                .store
                .record(employee_id, previous)
                .await?
                .filter(|r| r.punch_in.is_some() && r.punch_out.is_none());
            if let Some(open) = open {
                let day = self
                    .lookups
                    .resolve_day(&self.resolver, ledger, previous)
                    .await?;
                let closes = day
                    .as_ref()
                    .and_then(|d| d.window)
                    .is_some_and(|w| self.resolver.closes_overnight(previous, &w, at));
                if closes {
                    debug!(employee_id, %previous, "Punch closes an overnight shift");
                    return Ok((previous, day, Some(open)));
                }
            }
        }

        let day = self
            .lookups
            .resolve_day(&self.resolver, ledger, date)
            .await?;
        Ok((date, day, current))
    }

    async fn prepare_punch(
        &self,
        req: &PunchRequest,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AttendanceResult<PunchPlan> {
        let employee = self.employee(req.employee_id).await?;
        if !self.store.company_exists(req.company_id).await? {
            return Err(AttendanceError::not_found("Company"));
        }
        if employee.company_id.is_some_and(|c| c != req.company_id) {
            return Err(AttendanceError::not_found("Employee"));
        }
        if !employee.is_active() {
            return Err(AttendanceError::validation("Employee is not active"));
        }

        let ledger = self.ledger_or_create(&employee, now).await?;
        ensure_channel_enabled(&ledger.attendance_mode, req.source)?;

        let guard = self.locks.acquire(employee.id).await;
        let (date, day, current) = self.punch_date(&ledger, employee.id, at).await?;

        if let Some(record) = current {
            if record.day_status() == DayStatus::Completed {
                debug!(employee_id = employee.id, %date, "Day already completed");
                return Ok(PunchPlan::Completed(record));
            }
        }

        self.check_geofence(&employee, &ledger, req, now).await?;
        Ok(PunchPlan::Write(PreparedPunch {
            employee,
            date,
            day,
            _guard: guard,
        }))
    }

    /// Records the next punch of the day for an employee.
    pub async fn record_punch(
        &self,
        req: PunchRequest,
        now: DateTime<Utc>,
    ) -> AttendanceResult<PunchOutcome> {
        let at = req.timestamp.unwrap_or(now);
        if at > now + Duration::minutes(MAX_CLOCK_SKEW_MINUTES) {
            return Err(AttendanceError::validation("Punch timestamp is in the future"));
        }
        if !req.backfill && at < now - self.max_punch_age {
            return Err(AttendanceError::validation(
                "Punch timestamp is too old; ask an administrator to backfill it",
            ));
        }
        if let Some(location) = &req.location {
            validate_location(location)?;
        }

        let plan = tokio::time::timeout(self.decision_timeout, self.prepare_punch(&req, at, now))
            .await
            .map_err(|_| {
                warn!(employee_id = req.employee_id, "Punch decision timed out");
                AttendanceError::Timeout
            })??;
        let prepared = match plan {
            PunchPlan::Write(prepared) => prepared,
            PunchPlan::Completed(record) => {
                return Ok(PunchOutcome {
                    status: DayStatus::Completed,
                    record,
                });
            }
        };
        let PreparedPunch {
            employee,
            date,
            day,
            _guard,
        } = prepared;

        let event = |status: PunchStatus| PunchEvent {
            time: at,
            status,
            source: req.source,
            photo_ref: req.photo_ref.clone(),
            location: req.location.clone(),
        };

        let committed = commit_record(self.store.as_ref(), employee.id, date, |current| {
            match current {
                Some(record) if record.punch_out.is_some() => Ok(None),
                Some(mut record) if record.punch_in.is_some() => {
                    record.punch_out = Some(event(punch_out_status(at, day.as_ref())));
                    record.updated_at = now;
                    Ok(Some(record))
                }
                current => {
                    let mut record = current.unwrap_or_else(|| {
                        DailyRecord::new(
                            employee.id,
                            req.company_id,
                            date,
                            AttendanceStatus::Present,
                            StatusSource::Punch,
                            now,
                        )
                    });
                    record.punch_in = Some(event(punch_in_status(at, day.as_ref())));
                    record.status = AttendanceStatus::Present;
                    record.status_source = StatusSource::Punch;
                    record.updated_at = now;
                    Ok(Some(record))
                }
            }
        })
        .await?;

        let record = match committed {
            Committed::Saved(record) => record,
            Committed::Unchanged(Some(record)) => {
                return Ok(PunchOutcome {
                    status: DayStatus::Completed,
                    record,
                });
            }
            Committed::Unchanged(None) => return Err(AttendanceError::VersionConflict),
        };

        let (side, punch) = match (&record.punch_out, &record.punch_in) {
            (Some(out), _) => (PunchSide::Out, out.clone()),
            (None, Some(punch_in)) => (PunchSide::In, punch_in.clone()),
            (None, None) => return Err(AttendanceError::VersionConflict),
        };

        info!(
            employee_id = employee.id,
            %date,
            side = %side,
            status = %punch.status,
            source = %punch.source,
            "Punch recorded"
        );

        self.effects.evaluate(PunchContext {
            employee_id: employee.id,
            company_id: record.company_id,
            side,
            at,
            source: req.source,
            bound_device_id: employee.device_id.clone(),
            reported_device_id: req.device_id.clone(),
            day,
            punch_in_at: match side {
                PunchSide::Out => record.punch_in.as_ref().map(|p| p.time),
                PunchSide::In => None,
            },
            detected_at: now,
        });
        self.effects.notify(PunchNotification {
            employee_name: employee.full_name(),
            branch_id: employee.branch_id,
            status: format!(
                "Punch {} - {}",
                if side == PunchSide::In { "In" } else { "Out" },
                punch.status
            ),
            photo: punch.photo_ref.clone(),
            address: punch.location.as_ref().and_then(|l| l.address.clone()),
            lat: punch.location.as_ref().map(|l| l.lat),
            lng: punch.location.as_ref().map(|l| l.lng),
            event_time: at,
        });

        Ok(PunchOutcome {
            status: match side {
                PunchSide::In => DayStatus::In,
                PunchSide::Out => DayStatus::Out,
            },
            record,
        })
    }

    async fn check_geofence(
        &self,
        employee: &EmployeeProfile,
        ledger: &AttendanceLedger,
        req: &PunchRequest,
        now: DateTime<Utc>,
    ) -> AttendanceResult<()> {
        if !GeofenceValidator::applies(&ledger.attendance_mode, req.source) {
            return Ok(());
        }

        let branch_id = employee.branch_id.ok_or_else(|| {
            AttendanceError::Configuration(format!(
                "employee {} has no branch for office attendance",
                employee.id
            ))
        })?;
        let branch = self
            .lookups
            .branch(branch_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("Branch"))?;

        match self.geofence.validate(
            &ledger.attendance_mode,
            req.source,
            req.location.as_ref(),
            &branch,
        ) {
            Ok(GeofenceVerdict::Inside { distance_meters }) => {
                debug!(employee_id = employee.id, distance_meters, "Punch inside geofence");
                Ok(())
            }
            Ok(GeofenceVerdict::NotRequired) => Ok(()),
            Err(AttendanceError::GeofenceViolation {
                distance_meters,
                radius_meters,
            }) => {
                warn!(
                    employee_id = employee.id,
                    branch_id,
                    distance_meters,
                    radius_meters,
                    "Punch rejected outside geofence"
                );
                self.effects.record(self.detector.gps_spoofing(
                    employee.id,
                    req.company_id,
                    distance_meters,
                    radius_meters,
                    req.location.as_ref(),
                    now,
                ));
                Err(AttendanceError::GeofenceViolation {
                    distance_meters,
                    radius_meters,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Backfills one side of a day with an administrator-supplied instant.
    pub async fn admin_set_punch(
        &self,
        employee_id: u64,
        date: NaiveDate,
        side: PunchSide,
        at: DateTime<Utc>,
        source: PunchSource,
        now: DateTime<Utc>,
    ) -> AttendanceResult<DailyRecord> {
        if at > now + Duration::minutes(MAX_CLOCK_SKEW_MINUTES) {
            return Err(AttendanceError::validation("Punch timestamp is in the future"));
        }
        let employee = self.employee(employee_id).await?;
        let ledger = self.ledger_or_create(&employee, now).await?;
        let company_id = company_for(Some(&ledger), &employee)?;
        let day = self
            .lookups
            .resolve_day(&self.resolver, &ledger, date)
            .await?;

        let on_date = self.resolver.local_date(at) == date;
        let overnight_out = side == PunchSide::Out
            && day
                .as_ref()
                .and_then(|d| d.window)
                .is_some_and(|w| self.resolver.closes_overnight(date, &w, at));
        if !on_date && !overnight_out {
            return Err(AttendanceError::validation(format!(
                "Timestamp {at} does not fall on {date}"
            )));
        }

        let _guard = self.locks.acquire(employee_id).await;

        let committed = commit_record(self.store.as_ref(), employee_id, date, |current| {
            match side {
                PunchSide::In => {
                    let mut record = current.unwrap_or_else(|| {
                        DailyRecord::new(
                            employee_id,
                            company_id,
                            date,
                            AttendanceStatus::Present,
                            StatusSource::Punch,
                            now,
                        )
                    });
                    if record.punch_out.as_ref().is_some_and(|out| at >= out.time) {
                        return Err(AttendanceError::validation(
                            "Punch in must be earlier than the existing punch out",
                        ));
                    }
                    record.punch_in = Some(PunchEvent {
                        time: at,
                        status: punch_in_status(at, day.as_ref()),
                        source,
                        photo_ref: None,
                        location: None,
                    });
                    record.status = AttendanceStatus::Present;
                    record.status_source = StatusSource::Punch;
                    record.updated_at = now;
                    Ok(Some(record))
                }
                PunchSide::Out => {
                    let Some(mut record) = current.filter(|r| r.punch_in.is_some()) else {
                        return Err(AttendanceError::StateConflict(
                            "Punch out requires an existing punch in".to_string(),
                        ));
                    };
                    if record.punch_in.as_ref().is_some_and(|p| at <= p.time) {
                        return Err(AttendanceError::validation(
                            "Punch out must be later than punch in",
                        ));
                    }
                    record.punch_out = Some(PunchEvent {
                        time: at,
                        status: punch_out_status(at, day.as_ref()),
                        source,
                        photo_ref: None,
                        location: None,
                    });
                    record.updated_at = now;
                    Ok(Some(record))
                }
            }
        })
        .await?;

        match committed {
            Committed::Saved(record) => {
                info!(employee_id, %date, side = %side, "Punch set by administrator");
                Ok(record)
            }
            Committed::Unchanged(_) => Err(AttendanceError::VersionConflict),
        }
    }

    /// Clears one side of a day. Clearing the punch-in returns the day to Absent.
    pub async fn delete_punch(
        &self,
        employee_id: u64,
        date: NaiveDate,
        side: PunchSide,
        now: DateTime<Utc>,
    ) -> AttendanceResult<DailyRecord> {
        self.employee(employee_id).await?;
        let _guard = self.locks.acquire(employee_id).await;

        let committed = commit_record(self.store.as_ref(), employee_id, date, |current| {
            let Some(mut record) = current else {
                return Err(AttendanceError::not_found("Attendance record"));
            };
            match side {
                PunchSide::In => {
                    if record.punch_in.is_none() {
                        return Ok(None);
                    }
                    if record.punch_out.is_some() {
                        return Err(AttendanceError::StateConflict(
                            "Delete the punch out before the punch in".to_string(),
                        ));
                    }
                    record.punch_in = None;
                    record.status = AttendanceStatus::Absent;
                    record.status_source = StatusSource::Schedule;
                }
                PunchSide::Out => {
                    if record.punch_out.is_none() {
                        return Ok(None);
                    }
                    record.punch_out = None;
                }
            }
            record.updated_at = now;
            Ok(Some(record))
        })
        .await?;

        match committed {
            Committed::Saved(record) => {
                info!(employee_id, %date, side = %side, "Punch deleted");
                Ok(record)
            }
            Committed::Unchanged(Some(record)) => Ok(record),
            Committed::Unchanged(None) => Err(AttendanceError::not_found("Attendance record")),
        }
    }

    /// Administrative status override. Re-applying the current status is a no-op.
    pub async fn set_manual_status(
        &self,
        employee_id: u64,
        date: NaiveDate,
        status: AttendanceStatus,
        leave_type_id: Option<u64>,
        now: DateTime<Utc>,
    ) -> AttendanceResult<StatusChange> {
        let employee = self.employee(employee_id).await?;
        let ledger = self.ledger_or_create(&employee, now).await?;
        let company_id = company_for(Some(&ledger), &employee)?;

        let _guard = self.locks.acquire(employee_id).await;
        let committed = commit_record(self.store.as_ref(), employee_id, date, |current| {
            match current {
                Some(record)
                    if record.status == status
                        && (leave_type_id.is_none() || record.leave_type_id == leave_type_id) =>
                {
                    Ok(None)
                }
                current => {
                    let mut record = current.unwrap_or_else(|| {
                        DailyRecord::new(
                            employee_id,
                            company_id,
                            date,
                            status,
                            StatusSource::Manual,
                            now,
                        )
                    });
                    record.status = status;
                    record.status_source = StatusSource::Manual;
                    if leave_type_id.is_some() {
                        record.leave_type_id = leave_type_id;
                    }
                    record.updated_at = now;
                    Ok(Some(record))
                }
            }
        })
        .await?;

        match committed {
            Committed::Saved(record) => {
                info!(employee_id, %date, status = %status, "Status set manually");
                Ok(StatusChange::Changed(record))
            }
            Committed::Unchanged(Some(record)) => Ok(StatusChange::Unchanged(record)),
            Committed::Unchanged(None) => Err(AttendanceError::VersionConflict),
        }
    }

    pub async fn today(
        &self,
        employee_id: u64,
        now: DateTime<Utc>,
    ) -> AttendanceResult<(DayStatus, Option<DailyRecord>)> {
        self.employee(employee_id).await?;
        let date = self.resolver.local_date(now);
        let record = self.store.record(employee_id, date).await?;
        let status = record
            .as_ref()
            .map(DailyRecord::day_status)
            .unwrap_or(DayStatus::None);
        Ok((status, record))
    }

    pub async fn month(
        &self,
        employee_id: u64,
        month: MonthKey,
    ) -> AttendanceResult<Vec<DailyRecord>> {
        self.employee(employee_id).await?;
        self.store.records_for_month(employee_id, month).await
    }

    pub async fn anomalies(&self, employee_id: u64) -> AttendanceResult<Vec<Anomaly>> {
        self.employee(employee_id).await?;
        self.store.anomalies_for(employee_id).await
    }

    /// Administrative write of schedule, mode and alarms; creates the ledger on first use.
    pub async fn configure_ledger(
        &self,
        employee_id: u64,
        update: LedgerUpdate,
        now: DateTime<Utc>,
    ) -> AttendanceResult<AttendanceLedger> {
        let employee = self.employee(employee_id).await?;
        let _guard = self.locks.acquire(employee_id).await;
        let mut ledger = match self.store.ledger(employee_id).await? {
            Some(ledger) => ledger,
            None => AttendanceLedger::new(employee_id, employee.company_id, now),
        };

        if let Some(schedule) = update.work_schedule {
            validate_schedule(&schedule)?;
            ledger.work_schedule = schedule;
        }
        if let Some(mode) = update.attendance_mode {
            ledger.attendance_mode = mode;
        }
        if let Some(alarms) = update.mobile_alarms {
            validate_alarms(&alarms)?;
            ledger.mobile_alarms = alarms;
        }
        if ledger.company_id.is_none() {
            ledger.company_id = employee.company_id;
        }
        ledger.updated_at = now;

        self.store.save_ledger(&ledger).await?;
        info!(employee_id, "Attendance ledger configured");
        Ok(ledger)
    }
}
