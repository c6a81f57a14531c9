use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stampdesk_agent::{IntakeError, IntakeRuntime};
use tokio::task::JoinHandle;
use tracing::warn;

/// Periodically drops sessions idle for longer than `idle`.
pub fn spawn(runtime: Arc<IntakeRuntime>, idle: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            if let Err(error) = sweep_once(&runtime, idle).await {
                warn!(
                    event_name = "intake.session.sweep_failed",
                    error = %error,
                    "idle session sweep failed"
                );
            }
        }
    })
}

pub async fn sweep_once(runtime: &IntakeRuntime, idle: Duration) -> Result<usize, IntakeError> {
    let cutoff =
        chrono::Duration::from_std(idle).ok().and_then(|idle| Utc::now().checked_sub_signed(idle));
    // An idle window beyond the calendar never expires anything.
    let Some(cutoff) = cutoff else {
        return Ok(0);
    };
    runtime.expire_idle(cutoff).await
}
