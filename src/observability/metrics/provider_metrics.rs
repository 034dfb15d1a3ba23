//! # Provider Metrics
//!
//! Metrics for calls made against the MinIO endpoint.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec};
use std::sync::LazyLock;

static MINIO_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "minio_controller_minio_operations_total",
            "Total number of MinIO operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create MINIO_OPERATIONS_TOTAL metric - this should never happen")
});

static MINIO_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "minio_controller_minio_operation_duration_seconds",
            "Duration of MinIO operations in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create MINIO_OPERATION_DURATION metric - this should never happen")
});

static MINIO_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "minio_controller_minio_operation_errors_total",
            "Total number of failed MinIO operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create MINIO_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

/// Register provider metrics with the registry
pub(crate) fn register_provider_metrics() -> Result<()> {
    REGISTRY.register(Box::new(MINIO_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MINIO_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(MINIO_OPERATION_ERRORS_TOTAL.clone()))?;
    Ok(())
}

pub fn record_minio_operation(operation: &str, duration: f64) {
    MINIO_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    MINIO_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_minio_operation_errors(operation: &str) {
    MINIO_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}
