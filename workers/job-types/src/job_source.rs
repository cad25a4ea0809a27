//! The interface of the work queue that prover agents pull jobs from

use async_trait::async_trait;

use crate::{
    error::{JobSourceError, ProvingError},
    proving_job::{ProvingJob, ProvingJobId, ProvingJobResult},
};

/// A shared queue of proving jobs
///
/// Implementations decide when a job is considered abandoned, e.g. after a
/// missed heartbeat, and may then hand it out again under the same id
#[async_trait]
pub trait ProvingJobSource: Send + Sync {
    /// Take the next job off the queue, or `None` if the queue is drained
    ///
    /// Implementations should not block for long; the agent polls again on its
    /// next tick
    async fn get_proving_job(&self) -> Result<Option<ProvingJob>, JobSourceError>;

    /// Signal that the given job is still being worked on
    async fn heartbeat(&self, job_id: &ProvingJobId) -> Result<(), JobSourceError>;

    /// Report the result of a job
    async fn resolve_proving_job(
        &self,
        job_id: &ProvingJobId,
        result: ProvingJobResult,
    ) -> Result<(), JobSourceError>;

    /// Report the failure of a job
    async fn reject_proving_job(
        &self,
        job_id: &ProvingJobId,
        error: ProvingError,
    ) -> Result<(), JobSourceError>;
}
