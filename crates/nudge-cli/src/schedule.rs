use crate::lock::DispatchLock;
use chrono::Utc;
use chrono_tz::Tz;
use nudge_core::dispatch::DispatchEngine;
use nudge_core::messaging::MessagingPort;
use nudge_core::repository::ReminderRepository;
use nudge_core::time::now_minute_in;
use std::path::Path;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info, warn};

/// Seconds past the minute boundary at which a tick fires.
const SECS_AFTER_MINUTE: u64 = 1;

/// Time from `now_ms` until `secs_after_min` seconds past the next minute
/// boundary (or the current one, if that point is still ahead).
pub fn start_delay(now_ms: i64, secs_after_min: u64) -> Duration {
    let secs_into_minute = (now_ms.div_euclid(1000)).rem_euclid(60) as u64;
    if secs_into_minute < secs_after_min {
        Duration::from_secs(secs_after_min - secs_into_minute)
    } else {
        Duration::from_secs(60 - secs_into_minute + secs_after_min)
    }
}

/// Runs one dispatch pass per minute until Ctrl-C.
pub async fn run_minutely<R, M>(engine: &DispatchEngine<R, M>, lock_path: &Path, tz: Tz)
where
    R: ReminderRepository + Send + Sync,
    M: MessagingPort,
{
    let delay = start_delay(Utc::now().timestamp_millis(), SECS_AFTER_MINUTE);
    info!(delay_secs = delay.as_secs(), "Scheduler started");

    tokio::select! {
        _ = sleep(delay) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Scheduler stopped");
            return;
        }
    }

    let mut minutely = interval(Duration::from_secs(60));
    minutely.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = minutely.tick() => tick(engine, lock_path, tz).await,
            _ = tokio::signal::ctrl_c() => {
                info!("Scheduler stopped");
                break;
            }
        }
    }
}

async fn tick<R, M>(engine: &DispatchEngine<R, M>, lock_path: &Path, tz: Tz)
where
    R: ReminderRepository + Send + Sync,
    M: MessagingPort,
{
    let _lock = match DispatchLock::try_acquire(lock_path) {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            warn!("Another dispatch holds the lock, skipping this minute");
            return;
        }
        Err(err) => {
            error!(error = %err, path = %lock_path.display(), "Cannot open dispatch lock");
            return;
        }
    };

    if let Err(err) = engine.dispatch(Some(now_minute_in(&tz))).await {
        error!(error = %err, "Dispatch pass failed");
    }
}
