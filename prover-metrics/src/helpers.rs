//! Helpers for recording agent metrics

use std::time::Duration;

use job_types::ProvingRequestType;

use crate::labels::{
    FETCH_ERRORS_METRIC, FETCH_LATENCY_METRIC, HEARTBEAT_LATENCY_METRIC, IN_FLIGHT_JOBS_METRIC,
    JOB_DURATION_METRIC, JOB_ERRORS_METRIC, JOB_TYPE_METRIC_TAG, REJECT_LATENCY_METRIC,
    RESOLVE_LATENCY_METRIC,
};

/// Convert a duration to fractional milliseconds for a histogram
fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.
}

/// Record the number of jobs currently in flight
#[inline]
pub fn record_in_flight_jobs(num_jobs: usize) {
    metrics::gauge!(IN_FLIGHT_JOBS_METRIC).set(num_jobs as f64);
}

/// Record the latency of a job fetch
#[inline]
pub fn record_fetch_latency(latency: Duration) {
    metrics::histogram!(FETCH_LATENCY_METRIC).record(millis(latency));
}

/// Record the latency of a heartbeat
#[inline]
pub fn record_heartbeat_latency(latency: Duration) {
    metrics::histogram!(HEARTBEAT_LATENCY_METRIC).record(millis(latency));
}

/// Record the latency of resolving a job
#[inline]
pub fn record_resolve_latency(latency: Duration) {
    metrics::histogram!(RESOLVE_LATENCY_METRIC).record(millis(latency));
}

/// Record the latency of rejecting a job
#[inline]
pub fn record_reject_latency(latency: Duration) {
    metrics::histogram!(REJECT_LATENCY_METRIC).record(millis(latency));
}

/// Record the time spent proving a job of the given kind
#[inline]
pub fn record_job_duration(request_type: ProvingRequestType, duration: Duration) {
    metrics::histogram!(JOB_DURATION_METRIC, JOB_TYPE_METRIC_TAG => request_type.to_string())
        .record(millis(duration));
}

/// Increment the number of failed job fetches
#[inline]
pub fn incr_fetch_errors() {
    metrics::counter!(FETCH_ERRORS_METRIC).increment(1);
}

/// Increment the number of failed jobs of the given kind
#[inline]
pub fn incr_job_errors(request_type: ProvingRequestType) {
    metrics::counter!(JOB_ERRORS_METRIC, JOB_TYPE_METRIC_TAG => request_type.to_string())
        .increment(1);
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use job_types::ProvingRequestType;
    use metrics::{SharedString, Unit};
    use metrics_util::{
        CompositeKey, MetricKind,
        debugging::{DebugValue, DebuggingRecorder},
    };

    use super::*;

    /// A single entry of a debugging recorder snapshot
    type SnapshotEntry = (CompositeKey, Option<Unit>, Option<SharedString>, DebugValue);

    /// Find a recorded metric by kind and name
    fn find_metric<'a>(
        snapshot: &'a [SnapshotEntry],
        kind: MetricKind,
        name: &str,
    ) -> Option<&'a SnapshotEntry> {
        snapshot.iter().find(|(key, ..)| key.kind() == kind && key.key().name() == name)
    }

    /// Tests that the helpers emit under the expected names and tags
    #[test]
    fn test_helpers_record_metrics() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_in_flight_jobs(3);
            record_fetch_latency(Duration::from_millis(5));
            record_job_duration(ProvingRequestType::MergeRollup, Duration::from_millis(20));
            incr_job_errors(ProvingRequestType::BaseParity);
            incr_job_errors(ProvingRequestType::BaseParity);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let (_, _, _, gauge) =
            find_metric(&snapshot, MetricKind::Gauge, IN_FLIGHT_JOBS_METRIC).unwrap();
        assert_eq!(*gauge, DebugValue::Gauge(3.0.into()));

        let (_, _, _, errors) =
            find_metric(&snapshot, MetricKind::Counter, JOB_ERRORS_METRIC).unwrap();
        assert_eq!(*errors, DebugValue::Counter(2));

        let (key, _, _, _) =
            find_metric(&snapshot, MetricKind::Histogram, JOB_DURATION_METRIC).unwrap();
        let tag = key.key().labels().find(|l| l.key() == JOB_TYPE_METRIC_TAG).unwrap();
        assert_eq!(tag.value(), "MERGE_ROLLUP");
    }
}
