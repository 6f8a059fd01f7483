use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use missive_api::auth::SessionPolicy;
use missive_db::Database;

/// Background task that deletes expired and idle sessions.
pub async fn run_session_sweeper(db: Arc<Database>, policy: SessionPolicy, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        let db = db.clone();
        let swept = tokio::task::spawn_blocking(move || {
            db.purge_expired_sessions(chrono::Utc::now().timestamp(), policy.idle_timeout_secs)
        })
        .await;

        match swept {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Cleanup: purged {} expired sessions", count);
                }
            }
            Ok(Err(e)) => warn!("Cleanup error: {}", e),
            Err(e) => warn!("Cleanup task failed: {}", e),
        }
    }
}
