//! Maps a work schedule and a calendar date to the shift window that applies.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc, Weekday};

use crate::model::{
    attendance::AttendanceStatus,
    ledger::{ScheduleEntry, WorkSchedule},
    shift::Shift,
};

/// Minutes after shift end during which a punch-out still counts as Normal.
pub const PUNCH_OUT_GRACE_MINUTES: i64 = 30;
/// Hours past an overnight shift's grace period during which a punch on the
/// following calendar day still closes that shift.
pub const OVERNIGHT_PUNCH_OUT_MARGIN_HOURS: i64 = 4;

/// A shift resolved to absolute instants for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub end_grace: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDay {
    pub date: NaiveDate,
    pub window: Option<ShiftWindow>,
    pub is_weekoff: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ShiftResolver {
    offset: FixedOffset,
}

impl ShiftResolver {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date of `at` in the deployment's local time.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Schedule entry for `date`, if the schedule has one.
    pub fn entry(schedule: &WorkSchedule, date: NaiveDate) -> Option<&ScheduleEntry> {
        match schedule {
            WorkSchedule::Fixed(days) => days.get(weekday_key(date.weekday())),
            WorkSchedule::Flexible(months) => months
                .get(&month_key(date))
                .and_then(|days| days.get(&date_key(date))),
        }
    }

    /// Resolves the day. `shift` must be the shift referenced by the day's
    /// entry (if any). Returns `None` when the schedule says nothing usable
    /// about the date: no entry, or a working day with no resolvable shift.
    pub fn resolve(
        &self,
        schedule: &WorkSchedule,
        date: NaiveDate,
        shift: Option<&Shift>,
    ) -> Option<ResolvedDay> {
        let entry = Self::entry(schedule, date)?;

        let window = match (entry.shift_id, shift) {
            (Some(id), Some(shift)) if shift.id == id => self.window(date, shift),
            _ => None,
        };

        if entry.is_weekoff {
            return Some(ResolvedDay {
                date,
                window,
                is_weekoff: true,
            });
        }

        window.map(|window| ResolvedDay {
            date,
            window: Some(window),
            is_weekoff: false,
        })
    }

    /// Anchors a shift's wall-clock times on `date`. A shift whose end is not
    /// after its start runs past midnight.
    pub fn window(&self, date: NaiveDate, shift: &Shift) -> Option<ShiftWindow> {
        let start = date
            .and_time(shift.start)
            .and_local_timezone(self.offset)
            .single()?
            .with_timezone(&Utc);
        let mut end = date
            .and_time(shift.end)
            .and_local_timezone(self.offset)
            .single()?
            .with_timezone(&Utc);
        if end <= start {
            end += Duration::days(1);
        }

        Some(ShiftWindow {
            start,
            end,
            end_grace: end + Duration::minutes(PUNCH_OUT_GRACE_MINUTES),
        })
    }

    /// Whether a punch at `at`, on a later calendar day than `date`, still
    /// belongs to the shift `window` anchored on `date`. Only shifts that run
    /// past midnight qualify.
    pub fn closes_overnight(&self, date: NaiveDate, window: &ShiftWindow, at: DateTime<Utc>) -> bool {
        self.local_date(window.end) > date
            && self.local_date(at) > date
            && at <= window.end_grace + Duration::hours(OVERNIGHT_PUNCH_OUT_MARGIN_HOURS)
    }
}

/// Status a day gets when nobody punched: Holiday, then Sunday/Week Off, else Absent.
pub fn default_status(
    date: NaiveDate,
    day: Option<&ResolvedDay>,
    is_holiday: bool,
) -> AttendanceStatus {
    if is_holiday {
        return AttendanceStatus::Holiday;
    }
    match day {
        Some(day) if day.is_weekoff && date.weekday() == Weekday::Sun => AttendanceStatus::Sunday,
        Some(day) if day.is_weekoff => AttendanceStatus::WeekOff,
        _ => AttendanceStatus::Absent,
    }
}

/// English short weekday name, independent of the process locale.
pub fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use std::collections::BTreeMap;

    fn shift(id: u64, start: (u32, u32), end: (u32, u32)) -> Shift {
        Shift {
            id,
            company_id: 1,
            name: "General".into(),
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            punch_in_rule: None,
            punch_out_rule: None,
        }
    }

    fn entry(is_weekoff: bool, shift_id: Option<u64>) -> ScheduleEntry {
        ScheduleEntry {
            is_weekoff,
            shift_id,
        }
    }

    fn fixed_week() -> WorkSchedule {
        let mut days = BTreeMap::new();
        for day in ["Mon", "Tue", "Wed", "Thu", "Fri"] {
            days.insert(day.to_string(), entry(false, Some(1)));
        }
        days.insert("Sat".to_string(), entry(false, None));
        days.insert("Sun".to_string(), entry(true, None));
        WorkSchedule::Fixed(days)
    }

    fn utc() -> ShiftResolver {
        ShiftResolver::new(FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn fixed_schedule_resolves_by_weekday() {
        // 2026-03-02 is a Monday
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let day = utc()
            .resolve(&fixed_week(), date, Some(&shift(1, (10, 0), (19, 0))))
            .unwrap();

        let window = day.window.unwrap();
        assert!(!day.is_weekoff);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 3, 2, 19, 0, 0).unwrap());
        assert_eq!(window.end_grace, Utc.with_ymd_and_hms(2026, 3, 2, 19, 30, 0).unwrap());
    }

    #[test]
    fn fixed_weekoff_and_unassigned_days() {
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let day = utc().resolve(&fixed_week(), sunday, None).unwrap();
        assert!(day.is_weekoff);
        assert!(day.window.is_none());
        assert_eq!(default_status(sunday, Some(&day), false), AttendanceStatus::Sunday);

        let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert!(utc().resolve(&fixed_week(), saturday, None).is_none());
        assert_eq!(default_status(saturday, None, false), AttendanceStatus::Absent);
    }

    #[test]
    fn flexible_schedule_needs_month_and_date_entries() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let mut days = BTreeMap::new();
        days.insert("2026-03-04".to_string(), entry(true, None));
        let mut months = BTreeMap::new();
        months.insert("2026-03".to_string(), days);
        let schedule = WorkSchedule::Flexible(months);

        let day = utc().resolve(&schedule, date, None).unwrap();
        assert!(day.is_weekoff);
        // a Wednesday weekoff is reported as Week Off, not Sunday
        assert_eq!(default_status(date, Some(&day), false), AttendanceStatus::WeekOff);

        let missing_date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert!(utc().resolve(&schedule, missing_date, None).is_none());
        let missing_month = NaiveDate::from_ymd_opt(2026, 4, 4).unwrap();
        assert!(utc().resolve(&schedule, missing_month, None).is_none());
    }

    #[test]
    fn overnight_shift_ends_next_day() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let window = utc().window(date, &shift(2, (22, 0), (6, 0))).unwrap();
        assert_eq!(window.end, Utc.with_ymd_and_hms(2026, 3, 3, 6, 0, 0).unwrap());
    }

    #[test]
    fn next_morning_punch_closes_only_overnight_shifts() {
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let night = utc().window(monday, &shift(2, (22, 0), (6, 0))).unwrap();
        let tuesday = |h, m| Utc.with_ymd_and_hms(2026, 3, 3, h, m, 0).unwrap();

        assert!(utc().closes_overnight(monday, &night, tuesday(6, 10)));
        // grace ends 06:30, the margin runs to 10:30
        assert!(utc().closes_overnight(monday, &night, tuesday(10, 30)));
        assert!(!utc().closes_overnight(monday, &night, tuesday(10, 31)));
        // same-day punches are not carried anywhere
        let late_monday = Utc.with_ymd_and_hms(2026, 3, 2, 23, 0, 0).unwrap();
        assert!(!utc().closes_overnight(monday, &night, late_monday));

        let day = utc().window(monday, &shift(1, (10, 0), (19, 0))).unwrap();
        assert!(!utc().closes_overnight(monday, &day, tuesday(0, 30)));
    }

    #[test]
    fn local_offset_shifts_instants_and_dates() {
        let ist = ShiftResolver::new(FixedOffset::east_opt(5 * 3600 + 1800).unwrap());
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let window = ist.window(date, &shift(1, (10, 0), (19, 0))).unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 2, 4, 30, 0).unwrap());

        // 20:00 UTC on the 2nd is already the 3rd in +05:30
        let late = Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap();
        assert_eq!(ist.local_date(late), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
    }

    #[test]
    fn holiday_wins_over_weekoff() {
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let day = utc().resolve(&fixed_week(), sunday, None).unwrap();
        assert_eq!(default_status(sunday, Some(&day), true), AttendanceStatus::Holiday);
    }
}
