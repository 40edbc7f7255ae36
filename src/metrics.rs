//! Metrics surface of the document handler.

use std::time::Duration;

/// Duration sink for the handler's measurement points. The method names are
/// stable contract identifiers.
pub trait MetricsProvider: Send + Sync {
    /// Overall span of a `process_operation` call.
    fn process_operation(&self, duration: Duration);
    fn get_protocol_version_time(&self, duration: Duration);
    fn parse_operation_time(&self, duration: Duration);
    fn validate_operation_time(&self, duration: Duration);
    fn decorate_operation_time(&self, duration: Duration);
    fn add_unpublished_operation_time(&self, duration: Duration);
    fn add_operation_to_batch_time(&self, duration: Duration);
    fn get_create_operation_result_time(&self, duration: Duration);
}

/// Discards all measurements.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsProvider for NoopMetrics {
    fn process_operation(&self, _duration: Duration) {}
    fn get_protocol_version_time(&self, _duration: Duration) {}
    fn parse_operation_time(&self, _duration: Duration) {}
    fn validate_operation_time(&self, _duration: Duration) {}
    fn decorate_operation_time(&self, _duration: Duration) {}
    fn add_unpublished_operation_time(&self, _duration: Duration) {}
    fn add_operation_to_batch_time(&self, _duration: Duration) {}
    fn get_create_operation_result_time(&self, _duration: Duration) {}
}
