//! Request counters for the daemon

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Download,
    Convert,
}

/// Global metrics collector
#[derive(Default)]
pub struct Metrics {
    pub total_requests: AtomicU64,
    pub successful_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub total_latency_ms: AtomicU64,

    // Per-operation counters
    pub download_count: AtomicU64,
    pub convert_count: AtomicU64,

    // Pipeline events
    pub probe_fallbacks: AtomicU64,
    pub watermarks_skipped: AtomicU64,
    pub artifacts_reaped: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, op: Operation, success: bool, latency_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        match op {
            Operation::Download => self.download_count.fetch_add(1, Ordering::Relaxed),
            Operation::Convert => self.convert_count.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_probe_fallback(&self) {
        self.probe_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_watermark_skipped(&self) {
        self.watermarks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reaped(&self) {
        self.artifacts_reaped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            error_rate: if total > 0 { failed as f64 / total as f64 } else { 0.0 },
            avg_latency_ms: if total > 0 { total_latency / total } else { 0 },
            operations: OperationMetrics {
                download: self.download_count.load(Ordering::Relaxed),
                convert: self.convert_count.load(Ordering::Relaxed),
            },
            pipeline: PipelineMetrics {
                probe_fallbacks: self.probe_fallbacks.load(Ordering::Relaxed),
                watermarks_skipped: self.watermarks_skipped.load(Ordering::Relaxed),
                artifacts_reaped: self.artifacts_reaped.load(Ordering::Relaxed),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_rate: f64,
    pub avg_latency_ms: u64,
    pub operations: OperationMetrics,
    pub pipeline: PipelineMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetrics {
    pub download: u64,
    pub convert: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub probe_fallbacks: u64,
    pub watermarks_skipped: u64,
    pub artifacts_reaped: u64,
}

/// Timer for tracking operation latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
