pub mod anomaly;
pub mod attendance;
pub mod branch;
pub mod device;
pub mod employee;
pub mod ledger;
pub mod role;
pub mod shift;
