//! Great-circle distance check between a punch and its branch.

use crate::error::{AttendanceError, AttendanceResult};
use crate::model::{
    attendance::{Location, PunchSource},
    branch::Branch,
    ledger::AttendanceMode,
};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two `(lat, lng)` points in degrees.
pub fn haversine_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = lng2 - lng1;

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeofenceVerdict {
    NotRequired,
    Inside { distance_meters: f64 },
}

#[derive(Debug, Clone, Copy)]
pub struct GeofenceValidator {
    default_radius_meters: f64,
}

impl GeofenceValidator {
    pub fn new(default_radius_meters: f64) -> Self {
        Self {
            default_radius_meters,
        }
    }

    /// Office-mode smartphone attendance is checked for sources that report
    /// their own position; biometric and kiosk terminals sit in the branch.
    pub fn applies(mode: &AttendanceMode, source: PunchSource) -> bool {
        mode.requires_geofence() && matches!(source, PunchSource::Mobile | PunchSource::Web)
    }

    pub fn radius_for(&self, branch: &Branch) -> f64 {
        branch
            .radius_meters
            .filter(|r| *r > 0.0)
            .unwrap_or(self.default_radius_meters)
    }

    pub fn validate(
        &self,
        mode: &AttendanceMode,
        source: PunchSource,
        location: Option<&Location>,
        branch: &Branch,
    ) -> AttendanceResult<GeofenceVerdict> {
        if !Self::applies(mode, source) {
            return Ok(GeofenceVerdict::NotRequired);
        }

        let location = location.ok_or_else(|| {
            AttendanceError::Configuration(
                "office attendance requires the punch location".to_string(),
            )
        })?;
        let (Some(branch_lat), Some(branch_lng)) = (branch.lat, branch.lng) else {
            return Err(AttendanceError::Configuration(format!(
                "branch {} has no registered coordinates",
                branch.id
            )));
        };

        let distance_meters =
            haversine_meters((location.lat, location.lng), (branch_lat, branch_lng));
        let radius_meters = self.radius_for(branch);

        if distance_meters > radius_meters {
            return Err(AttendanceError::GeofenceViolation {
                distance_meters,
                radius_meters,
            });
        }
        Ok(GeofenceVerdict::Inside { distance_meters })
    }
}
