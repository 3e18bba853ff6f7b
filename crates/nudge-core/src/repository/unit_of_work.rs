//! Retry wrapper for transactional units of work.
//!
//! A unit of work opens its own transaction and commits it before returning.
//! Dropping an uncommitted sqlx transaction rolls it back, so a failed attempt
//! leaves nothing behind and the unit can simply run again.

use crate::error::CoreError;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Retries granted to a unit of work after a transient failure.
pub const TRANSIENT_RETRIES: u32 = 1;

/// Runs `unit`, retrying up to `max_retries` times after `delay` when it fails
/// with a transient (lock contention) error. Other errors return immediately.
pub async fn execute<T, F, Fut>(
    operation: &str,
    max_retries: u32,
    delay: Duration,
    mut unit: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0;
    loop {
        match unit().await {
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(operation, attempt, error = %err, "Store contention, retrying unit of work");
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    error!(operation, error = %err, "Store contention persisted, giving up");
                }
                return Err(err);
            }
            ok => return ok,
        }
    }
}
