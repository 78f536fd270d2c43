pub mod anomaly;
pub mod device;
pub mod geofence;
pub mod initializer;
pub mod ledger;
pub mod locks;
pub mod notify;
pub mod scheduler;
pub mod shift_resolver;
pub mod side_effects;
