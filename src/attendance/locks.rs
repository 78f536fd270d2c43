//! Per-employee mutual exclusion for daily-record updates. Live punches and
//! the nightly sweep take the same lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct EmployeeLocks {
    inner: Arc<Mutex<HashMap<u64, Weak<AsyncMutex<()>>>>>,
}

impl EmployeeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, employee_id: u64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            match map.get(&employee_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    // drop entries nobody holds or waits on
                    map.retain(|_, weak| weak.strong_count() > 0);
                    let lock = Arc::new(AsyncMutex::new(()));
                    map.insert(employee_id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_employee_is_serialized() {
        let locks = EmployeeLocks::new();
        let guard = locks.acquire(1).await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _g = contender.acquire(1).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        // a different employee is not blocked
        let _other = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2))
            .await
            .unwrap();

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }
}
