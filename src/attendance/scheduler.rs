use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::watch;
use tracing::{error, info};

use super::initializer::DailyInitializer;

/// Time left until the next local midnight.
pub fn until_next_midnight(now: DateTime<Utc>, offset: FixedOffset) -> Duration {
    let next = now
        .with_timezone(&offset)
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|d| d.and_local_timezone(offset).single());

    match next {
        Some(midnight) => (midnight.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::from_secs(60)),
        None => Duration::from_secs(60 * 60),
    }
}

/// Runs the sweep at every local midnight until `shutdown` flips or its sender is dropped.
pub async fn run_nightly(
    initializer: Arc<DailyInitializer>,
    offset: FixedOffset,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let wait = until_next_midnight(Utc::now(), offset);
        info!(seconds = wait.as_secs(), "Next attendance sweep scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                info!("Attendance sweep scheduler stopping");
                return;
            }
        }

        if let Err(e) = initializer.run(Utc::now()).await {
            error!(error = %e, "Nightly attendance sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn midnight_follows_the_configured_offset() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 17, 30, 0).unwrap();

        let utc = until_next_midnight(now, FixedOffset::east_opt(0).unwrap());
        assert_eq!(utc, Duration::from_secs(6 * 3600 + 30 * 60));

        // 23:30 in Dhaka
        let dhaka = until_next_midnight(now, FixedOffset::east_opt(6 * 3600).unwrap());
        assert_eq!(dhaka, Duration::from_secs(30 * 60));
    }

    #[test]
    fn exactly_midnight_waits_a_full_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap();
        let wait = until_next_midnight(now, FixedOffset::east_opt(0).unwrap());
        assert_eq!(wait, Duration::from_secs(24 * 3600));
    }
}
