use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::logger::{AUDIT_TARGET, METRICS_TARGET};

/// Counters for one adapter instance.
#[derive(Default)]
pub struct Metrics {
    pub calls_total: AtomicU64,
    pub calls_failed_total: AtomicU64,
    pub calls_slow_total: AtomicU64,
    pub records_returned_total: AtomicU64,
    pub writes_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub calls_total: u64,
    pub calls_failed_total: u64,
    pub calls_slow_total: u64,
    pub records_returned_total: u64,
    pub writes_total: u64,
}

/// Records native-call timings and mutation audit lines.
pub struct Telemetry {
    slow_call_ms: u64,
    audit: bool,
    pub metrics: Metrics,
    // For tests we can capture audit lines in-memory
    audit_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

impl Telemetry {
    #[must_use]
    pub fn new(slow_call_ms: u64, audit: bool) -> Self {
        Self { slow_call_ms, audit, metrics: Metrics::default(), audit_sink: RwLock::new(None) }
    }

    pub fn set_audit_sink_for_tests(&self, sink: Arc<RwLock<Vec<String>>>) {
        *self.audit_sink.write() = Some(sink);
    }

    /// Account for one native call against `collection`.
    pub fn log_call(&self, op: &str, collection: &str, elapsed: Duration, ok: bool, records: usize) {
        let m = &self.metrics;
        m.calls_total.fetch_add(1, Ordering::Relaxed);
        if !ok {
            m.calls_failed_total.fetch_add(1, Ordering::Relaxed);
        }
        m.records_returned_total
            .fetch_add(u64::try_from(records).unwrap_or(u64::MAX), Ordering::Relaxed);
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let slow = duration_ms >= self.slow_call_ms;
        if slow {
            m.calls_slow_total.fetch_add(1, Ordering::Relaxed);
            log::warn!("slow native call: op={op} collection={collection} duration_ms={duration_ms}");
        }
        let line = serde_json::json!({
            "op": op,
            "collection": collection,
            "duration_ms": duration_ms,
            "ok": ok,
            "records": records,
            "slow": slow
        });
        log::debug!(target: METRICS_TARGET, "{line}");
    }

    pub fn log_audit(&self, op: &str, collection: &str, affected: u64) {
        self.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
        if !self.audit {
            return;
        }
        let line = serde_json::json!({
            "ts": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "op": op,
            "collection": collection,
            "affected": affected
        })
        .to_string();
        let sink = self.audit_sink.read().clone();
        if let Some(sink) = sink {
            sink.write().push(line.clone());
        }
        log::info!(target: AUDIT_TARGET, "{line}");
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let m = &self.metrics;
        MetricsSnapshot {
            calls_total: m.calls_total.load(Ordering::Relaxed),
            calls_failed_total: m.calls_failed_total.load(Ordering::Relaxed),
            calls_slow_total: m.calls_slow_total.load(Ordering::Relaxed),
            records_returned_total: m.records_returned_total.load(Ordering::Relaxed),
            writes_total: m.writes_total.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn metrics_text(&self) -> String {
        // OpenMetrics/Prometheus exposition format (no types/HELP for brevity)
        let s = self.snapshot();
        format!(
            "nexus_adapter_calls_total {}\n\
             nexus_adapter_calls_failed_total {}\n\
             nexus_adapter_calls_slow_total {}\n\
             nexus_adapter_records_returned_total {}\n\
             nexus_adapter_writes_total {}\n",
            s.calls_total,
            s.calls_failed_total,
            s.calls_slow_total,
            s.records_returned_total,
            s.writes_total,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_and_failed_calls_are_counted() {
        let t = Telemetry::new(10, true);
        t.log_call("find", "users", Duration::from_millis(1), true, 3);
        t.log_call("find", "users", Duration::from_millis(50), false, 0);
        let s = t.snapshot();
        assert_eq!(s.calls_total, 2);
        assert_eq!(s.calls_failed_total, 1);
        assert_eq!(s.calls_slow_total, 1);
        assert_eq!(s.records_returned_total, 3);
        assert!(t.metrics_text().contains("nexus_adapter_calls_total 2"));
    }

    #[test]
    fn audit_sink_captures_lines_only_when_enabled() {
        let sink = Arc::new(RwLock::new(Vec::new()));
        let on = Telemetry::new(500, true);
        on.set_audit_sink_for_tests(sink.clone());
        on.log_audit("update", "users", 2);
        assert_eq!(sink.read().len(), 1);
        assert!(sink.read()[0].contains("\"op\":\"update\""));

        let off_sink = Arc::new(RwLock::new(Vec::new()));
        let off = Telemetry::new(500, false);
        off.set_audit_sink_for_tests(off_sink.clone());
        off.log_audit("destroy", "users", 1);
        assert!(off_sink.read().is_empty());
        assert_eq!(off.snapshot().writes_total, 1);
    }
}
