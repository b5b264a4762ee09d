//! Convenience macros for timing instrumentation

/// Create a [`crate::performance::PerformanceSpan`], optionally with fields.
///
/// ```rust
/// use conduit_tracing::perf_span;
///
/// {
///     let _span = perf_span!("memset", bytes = 4096);
///     // ...
/// } // logs duration
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        $crate::performance::PerformanceSpan::from_span(
            $name,
            None,
            tracing::debug_span!("perf", name = $name, $($field = $value),+),
        )
    }};
}

/// Run a block and return `(result, duration_us)`, logging the duration.
///
/// ```rust
/// use conduit_tracing::timed_block;
///
/// let (sum, duration_us) = timed_block!("sum", { (1..=100).sum::<i32>() });
/// assert_eq!(sum, 5050);
/// # let _ = duration_us;
/// ```
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_us = start.elapsed().as_micros() as u64;
        tracing::debug!(
            operation = $name,
            duration_us = duration_us,
            "timed_block_complete"
        );
        (result, duration_us)
    }};
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_perf_span_macro() {
        let _span = perf_span!("wait");
        let _with_fields = perf_span!("memcpy", bytes = 1024, stream = 3);
    }

    #[test]
    fn test_perf_span_fields_attach_to_span() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = perf_span!("memcpy", bytes = 1024, stream = 3);
            assert_eq!(span.name(), "memcpy");
            assert!(!span.span().is_disabled());
            assert!(span.span().field("bytes").is_some());
            assert!(span.span().field("stream").is_some());
        });
    }

    #[test]
    fn test_timed_block_macro() {
        let (result, duration_us) = timed_block!("sleep", {
            thread::sleep(Duration::from_millis(10));
            42
        });
        assert_eq!(result, 42);
        assert!(duration_us >= 10_000);
    }
}
