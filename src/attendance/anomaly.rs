//! Heuristics that flag suspicious punches for human review.
//!
//! Detection is pure: it turns a [`PunchContext`] into anomaly records. Writing
//! them is the side-effect worker's job.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use super::shift_resolver::ResolvedDay;
use crate::model::{
    anomaly::{Anomaly, AnomalyType, Severity},
    attendance::{Location, PunchSide, PunchSource},
};

/// How far outside the shift window a punch may land before it is unusual.
pub const UNUSUAL_HOURS_MARGIN_HOURS: i64 = 4;
/// A punch-out this soon after the punch-in is suspicious.
pub const RAPID_PUNCH_SECONDS: i64 = 120;

/// Snapshot of a committed punch handed to the detector.
#[derive(Debug, Clone)]
pub struct PunchContext {
    pub employee_id: u64,
    pub company_id: u64,
    pub side: PunchSide,
    pub at: DateTime<Utc>,
    pub source: PunchSource,
    pub bound_device_id: Option<String>,
    pub reported_device_id: Option<String>,
    pub day: Option<ResolvedDay>,
    /// Punch-in of the same record, for punch-outs.
    pub punch_in_at: Option<DateTime<Utc>>,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyDetector;

impl AnomalyDetector {
    pub fn evaluate(&self, ctx: &PunchContext) -> Vec<Anomaly> {
        [
            self.buddy_punching(ctx),
            self.unusual_hours(ctx),
            self.rapid_punches(ctx),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn buddy_punching(&self, ctx: &PunchContext) -> Option<Anomaly> {
        let bound = ctx.bound_device_id.as_deref()?;
        let reported = ctx.reported_device_id.as_deref()?;
        if bound == reported {
            return None;
        }

        Some(Anomaly::new(
            AnomalyType::BuddyPunching,
            Severity::High,
            format!(
                "Punch {} recorded from device {reported} while the employee is bound to {bound}",
                ctx.side
            ),
            json!({
                "bound_device_id": bound,
                "reported_device_id": reported,
                "side": ctx.side,
                "source": ctx.source,
                "punch_time": ctx.at,
            }),
            ctx.employee_id,
            ctx.company_id,
            ctx.detected_at,
        ))
    }

    fn unusual_hours(&self, ctx: &PunchContext) -> Option<Anomaly> {
        let day = ctx.day.as_ref()?;

        let description = if day.is_weekoff {
            format!("Punch {} recorded on a week off", ctx.side)
        } else {
            let window = day.window?;
            let margin = Duration::hours(UNUSUAL_HOURS_MARGIN_HOURS);
            if ctx.at < window.start - margin {
                format!(
                    "Punch {} more than {UNUSUAL_HOURS_MARGIN_HOURS} hours before shift start",
                    ctx.side
                )
            } else if ctx.at > window.end + margin {
                format!(
                    "Punch {} more than {UNUSUAL_HOURS_MARGIN_HOURS} hours after shift end",
                    ctx.side
                )
            } else {
                return None;
            }
        };

        Some(Anomaly::new(
            AnomalyType::UnusualHours,
            Severity::Medium,
            description,
            json!({
                "side": ctx.side,
                "punch_time": ctx.at,
                "date": day.date,
                "is_weekoff": day.is_weekoff,
                "shift_start": day.window.map(|w| w.start),
                "shift_end": day.window.map(|w| w.end),
            }),
            ctx.employee_id,
            ctx.company_id,
            ctx.detected_at,
        ))
    }

    fn rapid_punches(&self, ctx: &PunchContext) -> Option<Anomaly> {
        if ctx.side != PunchSide::Out {
            return None;
        }
        let punch_in_at = ctx.punch_in_at?;
        let elapsed = (ctx.at - punch_in_at).num_seconds();
        if elapsed >= RAPID_PUNCH_SECONDS {
            return None;
        }

        Some(Anomaly::new(
            AnomalyType::RapidPunches,
            Severity::Medium,
            format!("Punch out {elapsed} seconds after punch in"),
            json!({
                "punch_in": punch_in_at,
                "punch_out": ctx.at,
                "elapsed_seconds": elapsed,
            }),
            ctx.employee_id,
            ctx.company_id,
            ctx.detected_at,
        ))
    }

    pub fn gps_spoofing(
        &self,
        employee_id: u64,
        company_id: u64,
        distance_meters: f64,
        radius_meters: f64,
        location: Option<&Location>,
        detected_at: DateTime<Utc>,
    ) -> Anomaly {
        Anomaly::new(
            AnomalyType::GpsSpoofing,
            Severity::High,
            format!(
                "Punch attempted {distance_meters:.0} meters from the branch, outside the {radius_meters:.0} meter geofence"
            ),
            json!({
                "distance_meters": distance_meters,
                "radius_meters": radius_meters,
                "lat": location.map(|l| l.lat),
                "lng": location.map(|l| l.lng),
                "address": location.and_then(|l| l.address.as_deref()),
            }),
            employee_id,
            company_id,
            detected_at,
        )
    }

    pub fn device_tampering(
        &self,
        employee_id: u64,
        company_id: u64,
        old_device_id: Option<&str>,
        new_device_id: &str,
        detected_at: DateTime<Utc>,
    ) -> Anomaly {
        Anomaly::new(
            AnomalyType::DeviceTampering,
            Severity::High,
            format!("Login from unrecognised device {new_device_id}; change request awaits approval"),
            json!({
                "old_device_id": old_device_id,
                "new_device_id": new_device_id,
            }),
            employee_id,
            company_id,
            detected_at,
        )
    }
}
