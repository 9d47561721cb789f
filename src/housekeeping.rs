use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::repository::RepositoryState;

/// How often the binary purges expired sessions.
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// sweep_expired_sessions
///
/// One purge pass. Failures are logged and swallowed: expiry is enforced lazily at resolve
/// time, so a missed sweep only leaves dead rows behind for a while.
pub async fn sweep_expired_sessions(repo: &RepositoryState) -> u64 {
    match repo.delete_expired_sessions().await {
        Ok(removed) => {
            if removed > 0 {
                tracing::info!(removed, "purged expired sessions");
            } else {
                tracing::debug!("no expired sessions to purge");
            }
            removed
        }
        Err(e) => {
            tracing::error!(error = %e, "session sweep failed");
            0
        }
    }
}

/// spawn_session_sweeper
///
/// Runs `sweep_expired_sessions` every `every`, starting one period after the call. The task
/// lives until the returned handle is aborted or the runtime shuts down.
pub fn spawn_session_sweeper(repo: RepositoryState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_expired_sessions(&repo).await;
        }
    })
}
