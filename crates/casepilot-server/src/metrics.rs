//! Prometheus-compatible counters for the investigation API.

use casepilot_core::{RunResult, RunStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    http_requests_total: AtomicU64,
    http_errors_total: AtomicU64,
    investigations_total: AtomicU64,
    investigations_escalated_total: AtomicU64,
    investigations_failed_total: AtomicU64,
    tool_calls_total: AtomicU64,
    tokens_total: AtomicU64,
    replays_triggered_total: AtomicU64,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                http_errors_total: AtomicU64::new(0),
                investigations_total: AtomicU64::new(0),
                investigations_escalated_total: AtomicU64::new(0),
                investigations_failed_total: AtomicU64::new(0),
                tool_calls_total: AtomicU64::new(0),
                tokens_total: AtomicU64::new(0),
                replays_triggered_total: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn inc_http_requests(&self) {
        self.inner
            .http_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_http_errors(&self) {
        self.inner.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a finished primary investigation.
    pub fn record_run(&self, run: &RunResult) {
        let m = &self.inner;
        m.investigations_total.fetch_add(1, Ordering::Relaxed);
        match run.status {
            RunStatus::Escalated => {
                m.investigations_escalated_total
                    .fetch_add(1, Ordering::Relaxed);
            }
            RunStatus::Failed => {
                m.investigations_failed_total.fetch_add(1, Ordering::Relaxed);
            }
            RunStatus::Completed => {}
        }
        m.tool_calls_total
            .fetch_add(run.tool_calls.len() as u64, Ordering::Relaxed);
        m.tokens_total.fetch_add(run.token_count, Ordering::Relaxed);
    }

    pub fn inc_replays_triggered(&self) {
        self.inner
            .replays_triggered_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Render metrics in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let m = &self.inner;
        format!(
            r#"# HELP casepilot_uptime_seconds Time since the server started.
# TYPE casepilot_uptime_seconds gauge
casepilot_uptime_seconds {}
# HELP casepilot_http_requests_total Total HTTP requests served.
# TYPE casepilot_http_requests_total counter
casepilot_http_requests_total {}
# HELP casepilot_http_errors_total Total HTTP errors (4xx/5xx).
# TYPE casepilot_http_errors_total counter
casepilot_http_errors_total {}
# HELP casepilot_investigations_total Primary investigations run.
# TYPE casepilot_investigations_total counter
casepilot_investigations_total {}
# HELP casepilot_investigations_escalated_total Investigations ending escalated.
# TYPE casepilot_investigations_escalated_total counter
casepilot_investigations_escalated_total {}
# HELP casepilot_investigations_failed_total Investigations ending failed.
# TYPE casepilot_investigations_failed_total counter
casepilot_investigations_failed_total {}
# HELP casepilot_tool_calls_total Tool invocations made by primary investigations.
# TYPE casepilot_tool_calls_total counter
casepilot_tool_calls_total {}
# HELP casepilot_tokens_total Backend tokens consumed by primary investigations.
# TYPE casepilot_tokens_total counter
casepilot_tokens_total {}
# HELP casepilot_replays_triggered_total Replay sessions triggered.
# TYPE casepilot_replays_triggered_total counter
casepilot_replays_triggered_total {}
"#,
            self.uptime_secs(),
            m.http_requests_total.load(Ordering::Relaxed),
            m.http_errors_total.load(Ordering::Relaxed),
            m.investigations_total.load(Ordering::Relaxed),
            m.investigations_escalated_total.load(Ordering::Relaxed),
            m.investigations_failed_total.load(Ordering::Relaxed),
            m.tool_calls_total.load(Ordering::Relaxed),
            m.tokens_total.load(Ordering::Relaxed),
            m.replays_triggered_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
