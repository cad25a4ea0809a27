//! An in-memory job source that records every interaction with it

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use job_types::{
    JobSourceError, ProvingError, ProvingJob, ProvingJobId, ProvingJobResult, ProvingJobSource,
};

/// A job source backed by an in-memory queue
///
/// Tracks the jobs that have been handed out but not yet settled, so tests
/// can observe how many jobs an agent works on at once
#[derive(Default)]
pub struct InMemoryJobSource {
    /// The jobs waiting to be handed out
    queue: Mutex<VecDeque<ProvingJob>>,
    /// The jobs handed out and not yet resolved or rejected
    outstanding: Mutex<HashSet<ProvingJobId>>,
    /// The largest number of outstanding jobs observed
    peak_outstanding: AtomicUsize,
    /// The number of fetches that should fail before fetches succeed again
    failing_fetches: AtomicUsize,
    /// The number of fetch calls made
    num_fetches: AtomicUsize,
    /// The number of heartbeats received per job
    heartbeats: Mutex<HashMap<ProvingJobId, usize>>,
    /// The resolutions received, in order
    resolved: Mutex<Vec<(ProvingJobId, ProvingJobResult)>>,
    /// The rejections received, in order
    rejected: Mutex<Vec<(ProvingJobId, ProvingError)>>,
}

impl InMemoryJobSource {
    /// Create an empty job source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job source holding the given jobs
    pub fn with_jobs<I: IntoIterator<Item = ProvingJob>>(jobs: I) -> Self {
        let source = Self::new();
        source.push_jobs(jobs);
        source
    }

    /// Append a job to the queue
    pub fn push_job(&self, job: ProvingJob) {
        self.queue.lock().unwrap().push_back(job);
    }

    /// Append several jobs to the queue
    pub fn push_jobs<I: IntoIterator<Item = ProvingJob>>(&self, jobs: I) {
        self.queue.lock().unwrap().extend(jobs);
    }

    /// Make the next `n` fetches fail
    pub fn fail_next_fetches(&self, n: usize) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    /// The number of jobs still queued
    pub fn num_queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// The number of fetch calls made so far
    pub fn num_fetches(&self) -> usize {
        self.num_fetches.load(Ordering::SeqCst)
    }

    /// The largest number of jobs that were handed out but unsettled at once
    pub fn peak_outstanding(&self) -> usize {
        self.peak_outstanding.load(Ordering::SeqCst)
    }

    /// The number of heartbeats received for a job
    pub fn heartbeats_for(&self, job_id: &ProvingJobId) -> usize {
        self.heartbeats.lock().unwrap().get(job_id).copied().unwrap_or_default()
    }

    /// The resolutions received so far
    pub fn resolved(&self) -> Vec<(ProvingJobId, ProvingJobResult)> {
        self.resolved.lock().unwrap().clone()
    }

    /// The rejections received so far
    pub fn rejected(&self) -> Vec<(ProvingJobId, ProvingError)> {
        self.rejected.lock().unwrap().clone()
    }

    /// The number of resolutions and rejections received so far
    pub fn num_settled(&self) -> usize {
        self.resolved.lock().unwrap().len() + self.rejected.lock().unwrap().len()
    }

    /// Mark a job as settled, failing if it was never handed out
    fn settle(&self, job_id: &ProvingJobId) -> Result<(), JobSourceError> {
        if self.outstanding.lock().unwrap().remove(job_id) {
            Ok(())
        } else {
            Err(JobSourceError::UnknownJob(job_id.to_string()))
        }
    }
}

#[async_trait]
impl ProvingJobSource for InMemoryJobSource {
    async fn get_proving_job(&self) -> Result<Option<ProvingJob>, JobSourceError> {
        self.num_fetches.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(JobSourceError::unavailable("injected fetch failure"));
        }

        let Some(job) = self.queue.lock().unwrap().pop_front() else {
            return Ok(None);
        };

        let mut outstanding = self.outstanding.lock().unwrap();
        outstanding.insert(job.id.clone());
        self.peak_outstanding.fetch_max(outstanding.len(), Ordering::SeqCst);

        Ok(Some(job))
    }

    async fn heartbeat(&self, job_id: &ProvingJobId) -> Result<(), JobSourceError> {
        *self.heartbeats.lock().unwrap().entry(job_id.clone()).or_default() += 1;
        Ok(())
    }

    async fn resolve_proving_job(
        &self,
        job_id: &ProvingJobId,
        result: ProvingJobResult,
    ) -> Result<(), JobSourceError> {
        self.settle(job_id)?;
        self.resolved.lock().unwrap().push((job_id.clone(), result));
        Ok(())
    }

    async fn reject_proving_job(
        &self,
        job_id: &ProvingJobId,
        error: ProvingError,
    ) -> Result<(), JobSourceError> {
        self.settle(job_id)?;
        self.rejected.lock().unwrap().push((job_id.clone(), error));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use job_types::{ProvingError, ProvingJobSource, ProvingRequestType};

    use crate::fixtures::job_of_type;

    use super::InMemoryJobSource;

    /// Tests that jobs are handed out in order and the queue then drains
    #[tokio::test]
    async fn test_fetch_order_and_drain() {
        let first = job_of_type(ProvingRequestType::BaseRollup);
        let second = job_of_type(ProvingRequestType::MergeRollup);
        let source = InMemoryJobSource::with_jobs([first.clone(), second.clone()]);

        assert_eq!(source.get_proving_job().await.unwrap().unwrap().id, first.id);
        assert_eq!(source.get_proving_job().await.unwrap().unwrap().id, second.id);
        assert!(source.get_proving_job().await.unwrap().is_none());
        assert_eq!(source.peak_outstanding(), 2);
    }

    /// Tests that injected failures are consumed one fetch at a time
    #[tokio::test]
    async fn test_injected_fetch_failures() {
        let source = InMemoryJobSource::with_jobs([job_of_type(ProvingRequestType::BaseParity)]);
        source.fail_next_fetches(2);

        assert!(source.get_proving_job().await.is_err());
        assert!(source.get_proving_job().await.is_err());
        assert!(source.get_proving_job().await.unwrap().is_some());
        assert_eq!(source.num_fetches(), 3);
    }

    /// Tests that a job can only be settled once
    #[tokio::test]
    async fn test_settle_once() {
        let source = InMemoryJobSource::with_jobs([job_of_type(ProvingRequestType::TubeProof)]);
        let job = source.get_proving_job().await.unwrap().unwrap();

        source.reject_proving_job(&job.id, ProvingError::new("boom")).await.unwrap();
        let res = source.reject_proving_job(&job.id, ProvingError::new("boom")).await;

        assert!(res.is_err());
        assert_eq!(source.num_settled(), 1);
    }
}
