//! Timing helpers for resource operations
//!
//! ```rust
//! use conduit_tracing::performance::{record_transfer, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("upload", Some(100));
//! // ... enqueue copies, wait ...
//! drop(span); // logged only if it took at least 100μs
//!
//! record_transfer(4096, "H2D", 250);
//! ```

use std::time::Instant;
use tracing::Level;

/// RAII guard that times a region and logs it on drop
///
/// Nothing is logged when the region is shorter than the optional threshold.
pub struct PerformanceSpan {
    name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Start timing `name` at debug level
    pub fn new(name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        Self::with_level(Level::DEBUG, name, threshold_us)
    }

    /// Start timing `name` at `level`
    pub fn with_level(level: Level, name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = name.into();
        let span = match level {
            Level::TRACE => tracing::trace_span!("perf", name = %name),
            Level::DEBUG => tracing::debug_span!("perf", name = %name),
            Level::INFO => tracing::info_span!("perf", name = %name),
            Level::WARN => tracing::warn_span!("perf", name = %name),
            Level::ERROR => tracing::error_span!("perf", name = %name),
        };
        Self::from_span(name, threshold_us, span)
    }

    /// Start timing `name` under an existing span, keeping its fields
    pub fn from_span(name: impl Into<String>, threshold_us: Option<u64>, span: tracing::Span) -> Self {
        Self {
            name: name.into(),
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Span the completion event is logged under
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Enter the span so nested events are attributed to it
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();
        if self.threshold_us.is_none_or(|t| elapsed_us >= t) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Record a memory allocation
///
/// * `platform` - Backend that served the allocation ("host", "threads", "cuda")
pub fn record_allocation(size_bytes: usize, platform: &str, alignment: usize, duration_us: u64) {
    tracing::debug!(
        event = "allocation",
        size_bytes,
        size_kb = size_bytes as f64 / 1024.0,
        platform,
        alignment,
        duration_us,
        "memory_allocation"
    );
}

/// Record a copy with its bandwidth
///
/// * `direction` - "H2D", "D2H", "D2D" or "H2H"
pub fn record_transfer(bytes: usize, direction: &str, duration_us: u64) {
    let bandwidth_mbps = bandwidth_mbps(bytes, duration_us);

    tracing::debug!(
        event = "transfer",
        bytes,
        direction,
        duration_us,
        duration_ms = duration_us as f64 / 1000.0,
        bandwidth_mbps,
        bandwidth_gbps = bandwidth_mbps / 1024.0,
        "data_transfer"
    );
}

/// Record how long a thread blocked waiting for a resource or event
///
/// * `kind` - "resource", "event" or "foreign_event"
pub fn record_wait(platform: &str, kind: &str, duration_us: u64) {
    tracing::debug!(
        event = "wait",
        platform,
        kind,
        duration_us,
        duration_ms = duration_us as f64 / 1000.0,
        "blocking_wait"
    );
}

fn bandwidth_mbps(bytes: usize, duration_us: u64) -> f64 {
    if duration_us > 0 {
        (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_performance_span_creation() {
        let span = PerformanceSpan::new("upload", None);
        assert_eq!(span.name(), "upload");
        assert_eq!(span.threshold_us, None);
    }

    #[test]
    fn test_performance_span_with_level() {
        let span = PerformanceSpan::with_level(Level::INFO, "sync", Some(100));
        assert_eq!(span.name(), "sync");
        assert_eq!(span.threshold_us, Some(100));
    }

    #[test]
    fn test_performance_span_elapsed() {
        let span = PerformanceSpan::new("sleep", None);
        thread::sleep(Duration::from_millis(10));
        assert!(span.elapsed_us() >= 10_000);
    }

    #[test]
    fn test_bandwidth_calculation() {
        // 1 MiB in 1ms = 1000 MiB/s
        let mbps = bandwidth_mbps(1024 * 1024, 1000);
        assert!((mbps - 1000.0).abs() < 0.01);
        assert_eq!(bandwidth_mbps(4096, 0), 0.0);
    }

    #[test]
    fn test_record_helpers() {
        record_allocation(4096, "threads", 64, 12);
        record_transfer(4096, "H2D", 250);
        record_wait("cuda", "foreign_event", 40);
    }
}
