//! Metric names and tags

// ----------------
// | METRIC NAMES |
// ----------------

// Agent metrics

/// Metric describing the number of jobs an agent currently has in flight
pub const IN_FLIGHT_JOBS_METRIC: &str = "prover_agent_in_flight_jobs";
/// Metric describing the latency of fetching a job from the job source
pub const FETCH_LATENCY_METRIC: &str = "prover_agent_fetch_latency_ms";
/// Metric describing the latency of a heartbeat sent to the job source
pub const HEARTBEAT_LATENCY_METRIC: &str = "prover_agent_heartbeat_latency_ms";
/// Metric describing the latency of reporting a job's result
pub const RESOLVE_LATENCY_METRIC: &str = "prover_agent_resolve_latency_ms";
/// Metric describing the latency of reporting a job's failure
pub const REJECT_LATENCY_METRIC: &str = "prover_agent_reject_latency_ms";
/// Metric describing the time spent proving a single job
pub const JOB_DURATION_METRIC: &str = "prover_agent_job_duration_ms";

// Error metrics

/// Metric describing the number of failed fetches from the job source
pub const FETCH_ERRORS_METRIC: &str = "prover_agent_fetch_errors";
/// Metric describing the number of jobs whose proof could not be generated
pub const JOB_ERRORS_METRIC: &str = "prover_agent_job_errors";

// ---------------
// | METRIC TAGS |
// ---------------

/// Metric tag for the kind of proving job
pub const JOB_TYPE_METRIC_TAG: &str = "job_type";
