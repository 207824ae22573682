//! Metrics and observability utilities
//!
//! Prometheus metrics with a shared prefix and latency buckets.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Aula metrics
pub const METRICS_PREFIX: &str = "aula";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00,
];

/// Buckets for report rendering; large divisions produce multi-page PDFs
pub const REPORT_BUCKETS: &[f64] = &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_grades_saved_total", METRICS_PREFIX),
        Unit::Count,
        "Grade records upserted"
    );

    describe_counter!(
        format!("{}_attendance_records_written_total", METRICS_PREFIX),
        Unit::Count,
        "Attendance records inserted or overwritten"
    );

    describe_counter!(
        format!("{}_reports_generated_total", METRICS_PREFIX),
        Unit::Count,
        "Reports generated by format"
    );

    describe_histogram!(
        format!("{}_report_render_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Report rendering latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// `mode` is "single" or "batch"
pub fn record_grades_saved(count: usize, mode: &str) {
    counter!(
        format!("{}_grades_saved_total", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .increment(count as u64);
}

/// `source` is "capture" or "mass_justify"
pub fn record_attendance_written(count: u64, source: &str) {
    counter!(
        format!("{}_attendance_records_written_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(count);
}

/// `kind` names the document, `format` is json, csv or pdf
pub fn record_report(kind: &str, format: &str, duration_secs: f64) {
    counter!(
        format!("{}_reports_generated_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "format" => format.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_report_render_duration_seconds", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "format" => format.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, REPORT_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls are no-ops
        let metrics = RequestMetrics::start("GET", "/grades");
        metrics.finish(200);
        record_grades_saved(3, "batch");
        record_attendance_written(30, "capture");
        record_report("grades", "pdf", 0.12);
    }
}
