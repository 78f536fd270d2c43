use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;

use crate::attendance::{
    device::DeviceGuard, geofence::GeofenceValidator, initializer::DailyInitializer,
    ledger::PunchLedger, locks::EmployeeLocks, notify::notifier_for, shift_resolver::ShiftResolver,
    side_effects::SideEffects,
};
use crate::config::Config;
use crate::store::AttendanceStore;
use crate::utils::lookup_cache::Lookups;

const LOOKUP_TTL: Duration = Duration::from_secs(5 * 60);

/// Engine components shared by every HTTP worker.
pub struct AppState {
    pub store: Arc<dyn AttendanceStore>,
    pub ledger: PunchLedger,
    pub devices: DeviceGuard,
    pub initializer: Arc<DailyInitializer>,
}

impl AppState {
    /// Must be called inside a tokio runtime; spawns the side-effect worker.
    pub fn new(
        config: &Config,
        store: Arc<dyn AttendanceStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let notifier = notifier_for(config.notify_webhook_url.as_deref())?;
        let effects = SideEffects::spawn(store.clone(), notifier);
        let lookups = Lookups::new(store.clone(), LOOKUP_TTL);
        let resolver = ShiftResolver::new(config.tz_offset);
        let locks = EmployeeLocks::new();

        let ledger = PunchLedger::new(
            store.clone(),
            lookups.clone(),
            resolver,
            GeofenceValidator::new(config.default_geofence_radius_m),
            locks.clone(),
            effects.clone(),
        )
        .with_decision_timeout(config.punch_timeout())
        .with_max_punch_age(config.punch_max_age());
        let devices = DeviceGuard::new(
            store.clone(),
            lookups.clone(),
            resolver,
            locks.clone(),
            effects,
        );
        let initializer = Arc::new(DailyInitializer::new(
            store.clone(),
            lookups,
            resolver,
            locks,
            config.sweep_concurrency,
            config.sweep_overrides_manual,
            shutdown,
        ));

        Ok(Self {
            store,
            ledger,
            devices,
            initializer,
        })
    }
}
