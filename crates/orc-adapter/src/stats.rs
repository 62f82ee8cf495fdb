use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::AdapterStatsSnapshot;

/// Lock-free invocation counters (§4.E: "Statistics are lock-free
/// counters; rates are derived").
#[derive(Default)]
pub struct AdapterStats {
    total_executions: AtomicU64,
    total_errors: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl AdapterStats {
    pub fn record(&self, duration_ms: u64, failed: bool) {
        self.total_executions.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
        if failed {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> AdapterStatsSnapshot {
        let total_executions = self.total_executions.load(Ordering::Relaxed);
        let total_errors = self.total_errors.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);
        let error_rate = if total_executions == 0 {
            0.0
        } else {
            total_errors as f64 / total_executions as f64
        };
        AdapterStatsSnapshot {
            total_executions,
            total_errors,
            total_duration_ms,
            error_rate,
        }
    }
}
