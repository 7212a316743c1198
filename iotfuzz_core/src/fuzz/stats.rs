use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Default, Clone, Debug, Serialize, Deserialize)]
/// Counters collected while a session is running.
pub struct SessionStats {
    /// The transport title, e.g. `tcp_client (10.0.0.2:502)`
    pub title: String,

    /// The total number of iterations that have been performed.
    pub total_executions: u64,

    /// Iterations the target answered.
    pub total_responses: u64,

    /// Responses whose content was not seen before in this session.
    pub total_unique_responses: u64,

    /// Iterations that ran into the response timeout.
    pub total_timeouts: u64,

    /// Iterations that failed for any reason, timeouts included.
    pub total_errors: u64,

    /// Number of times a closed connection had to be opened again.
    pub reconnects: u64,

    /// Unix timestamp in millis when the session was started.
    pub started_at_ms: Option<u64>,

    /// Runtime of the finished session in millis.
    pub elapsed_ms: Option<u64>,

    /// A boolean indicating whether the session is currently running.
    pub running: bool,
}

impl SessionStats {
    pub(crate) fn start(&mut self, title: String) {
        self.title = title;
        self.running = true;
        self.started_at_ms = Some(unix_millis());
    }

    pub(crate) fn finish(&mut self) {
        self.running = false;
        if let Some(started) = self.started_at_ms {
            self.elapsed_ms = Some(unix_millis().saturating_sub(started));
        }
    }
}

/// Shared stats type, can be read by the caller while the session is running
pub type StatsType = Arc<RwLock<SessionStats>>;

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
