use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: u64,
    pub company_id: u64,
    pub name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Geofence radius in meters; `None` falls back to the configured default.
    pub radius_meters: Option<f64>,
}
