//! Repository query latency and connection pool gauges.
//!
//! Query names follow `<verb>_<table>`, e.g. `append_approval_event` or
//! `page_location_logs`, and become the `query` label of
//! `database_query_duration_seconds`.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::db::APPLICATION_NAME;

/// Queries slower than this are logged in addition to being recorded.
pub const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(500);

pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);
}

/// Pool gauges, refreshed on every `/metrics` scrape.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();
    let active = size.saturating_sub(idle);

    gauge!("database_connections_active", "pool" => APPLICATION_NAME).set(active as f64);
    gauge!("database_connections_idle", "pool" => APPLICATION_NAME).set(idle as f64);
    gauge!("database_connections_total", "pool" => APPLICATION_NAME).set(size as f64);
}

fn is_slow(elapsed: Duration) -> bool {
    elapsed >= SLOW_QUERY_THRESHOLD
}

/// Times one repository call.
///
/// ```ignore
/// let timer = QueryTimer::new("find_mold");
/// let result = sqlx::query_as::<_, MoldEntity>(...).fetch_optional(&pool).await;
/// timer.record();
/// ```
///
/// Error paths that return early drop the timer without recording, so the
/// histogram only holds completed calls.
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        let elapsed = self.start.elapsed();
        if is_slow(elapsed) {
            warn!(
                query = self.query_name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow database query"
            );
        }
        record_query_duration(self.query_name, elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_keeps_name() {
        let timer = QueryTimer::new("append_approval_event");
        assert_eq!(timer.query_name, "append_approval_event");
    }

    #[test]
    fn test_slow_query_threshold() {
        assert!(!is_slow(Duration::from_millis(20)));
        assert!(is_slow(SLOW_QUERY_THRESHOLD));
        assert!(is_slow(Duration::from_secs(2)));
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        QueryTimer::new("page_location_logs").record();
    }
}
