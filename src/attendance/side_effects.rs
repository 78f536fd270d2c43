//! Work that follows a punch commit: anomaly detection and writes, and
//! notifications. Anomalies drain through one worker; notifications go
//! through their own worker and run concurrently up to a fixed bound, so a
//! slow notifier never delays an anomaly write. Nothing here can reach back
//! into the request that enqueued it.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, error, warn};

use super::anomaly::{AnomalyDetector, PunchContext};
use super::notify::{Notifier, PunchNotification};
use crate::model::anomaly::Anomaly;
use crate::store::AttendanceStore;

/// Effects each queue holds before new ones are dropped.
pub const EFFECT_QUEUE_CAPACITY: usize = 1024;
/// Notifications in flight at once.
pub const NOTIFY_CONCURRENCY: usize = 8;

enum AnomalyWork {
    Evaluate(Box<PunchContext>),
    Record(Box<Anomaly>),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct SideEffects {
    anomalies: mpsc::Sender<AnomalyWork>,
    notifications: mpsc::Sender<PunchNotification>,
}

impl SideEffects {
    /// Spawns both workers on the current tokio runtime.
    pub fn spawn(store: Arc<dyn AttendanceStore>, notifier: Arc<dyn Notifier>) -> Self {
        let (anomaly_tx, anomaly_rx) = mpsc::channel(EFFECT_QUEUE_CAPACITY);
        let (notify_tx, notify_rx) = mpsc::channel(EFFECT_QUEUE_CAPACITY);
        tokio::spawn(run_anomaly_worker(anomaly_rx, store, AnomalyDetector));
        tokio::spawn(run_notify_worker(
            notify_rx,
            notifier,
            Arc::new(Semaphore::new(NOTIFY_CONCURRENCY)),
        ));
        Self {
            anomalies: anomaly_tx,
            notifications: notify_tx,
        }
    }

    pub fn evaluate(&self, ctx: PunchContext) {
        enqueue(&self.anomalies, AnomalyWork::Evaluate(Box::new(ctx)), "anomaly");
    }

    pub fn record(&self, anomaly: Anomaly) {
        enqueue(&self.anomalies, AnomalyWork::Record(Box::new(anomaly)), "anomaly");
    }

    pub fn notify(&self, notification: PunchNotification) {
        enqueue(&self.notifications, notification, "notification");
    }

    /// Resolves once every anomaly enqueued before this call has been handled.
    /// Notifications are not waited for.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.anomalies.send(AnomalyWork::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

fn enqueue<T>(tx: &mpsc::Sender<T>, item: T, kind: &'static str) {
    match tx.try_send(item) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!(kind, "Side-effect queue full; dropping effect"),
        Err(TrySendError::Closed(_)) => warn!(kind, "Side-effect worker stopped; dropping effect"),
    }
}

async fn run_anomaly_worker(
    mut rx: mpsc::Receiver<AnomalyWork>,
    store: Arc<dyn AttendanceStore>,
    detector: AnomalyDetector,
) {
    while let Some(work) = rx.recv().await {
        match work {
            AnomalyWork::Evaluate(ctx) => {
                for anomaly in detector.evaluate(&ctx) {
                    write_anomaly(store.as_ref(), &anomaly).await;
                }
            }
            AnomalyWork::Record(anomaly) => write_anomaly(store.as_ref(), &anomaly).await,
            AnomalyWork::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Anomaly worker exiting");
}

async fn run_notify_worker(
    mut rx: mpsc::Receiver<PunchNotification>,
    notifier: Arc<dyn Notifier>,
    permits: Arc<Semaphore>,
) {
    while let Some(notification) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let notifier = notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                error!(error = %e, employee = %notification.employee_name, "Punch notification failed");
            }
            drop(permit);
        });
    }
    debug!("Notification worker exiting");
}

async fn write_anomaly(store: &dyn AttendanceStore, anomaly: &Anomaly) {
    match store.insert_anomaly(anomaly).await {
        Ok(()) => debug!(
            employee_id = anomaly.employee_id,
            anomaly_type = %anomaly.anomaly_type,
            "Anomaly recorded"
        ),
        Err(e) => error!(
            error = %e,
            employee_id = anomaly.employee_id,
            anomaly_type = %anomaly.anomaly_type,
            "Failed to record anomaly"
        ),
    }
}
