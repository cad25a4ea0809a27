//! Defines the prover agent, a polling worker that pulls proving jobs from a
//! job source and proves them with bounded concurrency
//!
//! The agent runs one polling task. Each tick it heartbeats the jobs it has in
//! flight, then fetches and dispatches new jobs until it reaches its
//! concurrency limit or the source is drained. Every job is proven on its own
//! task, so a slow proof never holds up polling or heartbeats.
//!
//! Proofs are generated on a dedicated thread pool rather than on the async
//! runtime; a backend that blocks its thread while proving stalls neither the
//! polling loop nor other jobs' heartbeats.
//!
//! Results are only reported while the agent is running. Each dispatch
//! captures the agent's epoch; `start` installs a fresh epoch and `stop` clears
//! it, so a job that completes after a stop sees a stale epoch and its result is
//! dropped rather than reported. `stop` also forgets the jobs it abandons, so a
//! later run neither heartbeats them nor counts them against its limit

use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use common::{
    Shared, new_shared,
    types::{CancelChannel, CancelSender, new_cancel_channel},
};
use futures::future::join_all;
use itertools::Itertools;
use job_types::{
    CircuitProverError, ProverResult, ProvingError, ProvingJob, ProvingJobId, ProvingJobResult,
    ProvingJobSource, ProvingRequest, ProvingRequestType, ServerCircuitProver,
};
use prover_metrics::{
    incr_fetch_errors, incr_job_errors, record_fetch_latency, record_heartbeat_latency,
    record_in_flight_jobs, record_job_duration, record_reject_latency, record_resolve_latency,
};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio::{
    runtime::Handle,
    sync::{RwLock as TokioRwLock, oneshot},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use util::err_str;

use crate::{config::ProverAgentConfig, dispatch::get_proof, error::ProverAgentError};

/// The interval at which the agent logs a summary of its in-flight jobs
const IN_FLIGHT_SUMMARY_INTERVAL: Duration = Duration::from_secs(60);
/// The epoch value of a stopped agent
const STOPPED_EPOCH: u64 = 0;
/// The name prefix for proving threads
const PROVING_THREAD_PREFIX: &str = "prover-agent-worker";
/// The stack size for proving threads
const PROVING_STACK_SIZE: usize = 10 * 1024 * 1024; // 10 MB

/// Error message when a backend panics while proving
const ERR_BACKEND_PANICKED: &str = "proving backend panicked";
/// Error message when a proving thread drops its job without an outcome
const ERR_PROVING_THREAD_EXITED: &str = "proving thread exited without a result";

/// The circuit prover type the agent proves with
pub type SharedCircuitProver = Arc<dyn ServerCircuitProver>;
/// The job source type the agent pulls from
pub type SharedJobSource = Arc<dyn ProvingJobSource>;

// ---------
// | State |
// ---------

/// A job the agent is currently proving
#[derive(Clone, Debug)]
struct InFlightJob {
    /// The kind of the job
    request_type: ProvingRequestType,
    /// When the job was dispatched
    started_at: Instant,
    /// Distinguishes this dispatch from any other dispatch of the same id
    dispatch_id: u64,
}

/// The state shared between the agent handle, its polling loop and its
/// proving tasks
struct AgentState {
    /// The backend new jobs are proven with
    circuit_prover: RwLock<SharedCircuitProver>,
    /// The threads proofs are generated on
    thread_pool: ThreadPool,
    /// The maximum number of jobs in flight at once
    max_concurrency: AtomicUsize,
    /// The interval between polls of the job source
    poll_interval: Duration,
    /// The jobs currently being proven
    in_flight_jobs: Shared<HashMap<ProvingJobId, InFlightJob>>,
    /// The epoch of the current run, or `STOPPED_EPOCH`
    active_epoch: AtomicU64,
    /// The epoch the next run will use
    next_epoch: AtomicU64,
    /// The id the next dispatch will use
    next_dispatch_id: AtomicU64,
    /// Held for reading while a result is reported and for writing by `stop`,
    /// so that no report is in progress once `stop` returns
    report_gate: TokioRwLock<()>,
}

/// The handle on a running polling loop
struct PollLoopHandle {
    /// Signals the loop to exit
    cancel: CancelSender,
    /// The loop's task
    join_handle: JoinHandle<()>,
}

// ---------
// | Agent |
// ---------

/// A worker that pulls proving jobs from a job source and proves them with
/// bounded concurrency
///
/// Cloning the agent yields another handle on the same worker
#[derive(Clone)]
pub struct ProverAgent {
    /// The state shared with the polling loop and proving tasks
    state: Arc<AgentState>,
    /// The running polling loop, if any
    poll_loop: Arc<Mutex<Option<PollLoopHandle>>>,
}

impl ProverAgent {
    /// Create a stopped agent that proves with the given backend
    pub fn new(
        config: &ProverAgentConfig,
        circuit_prover: SharedCircuitProver,
    ) -> Result<Self, ProverAgentError> {
        config.validate()?;
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(config.num_proving_threads)
            .thread_name(|i| format!("{PROVING_THREAD_PREFIX}-{i}"))
            .stack_size(PROVING_STACK_SIZE)
            .build()
            .map_err(err_str!(ProverAgentError::Setup))?;

        let state = AgentState {
            circuit_prover: RwLock::new(circuit_prover),
            thread_pool,
            max_concurrency: AtomicUsize::new(config.max_concurrency),
            poll_interval: config.poll_interval(),
            in_flight_jobs: new_shared(HashMap::new()),
            active_epoch: AtomicU64::new(STOPPED_EPOCH),
            next_epoch: AtomicU64::new(STOPPED_EPOCH + 1),
            next_dispatch_id: AtomicU64::new(0),
            report_gate: TokioRwLock::new(()),
        };

        Ok(Self { state: Arc::new(state), poll_loop: Arc::new(Mutex::new(None)) })
    }

    /// Whether the agent is running
    pub fn is_running(&self) -> bool {
        self.state.active_epoch.load(Ordering::SeqCst) != STOPPED_EPOCH
    }

    /// The maximum number of jobs the agent proves at once
    pub fn max_concurrency(&self) -> usize {
        self.state.max_concurrency()
    }

    /// Set the maximum number of jobs proven at once
    ///
    /// Takes effect on the next tick. Jobs already running beyond a lowered
    /// limit are left to finish
    pub fn set_max_concurrency(&self, max_concurrency: usize) -> Result<(), ProverAgentError> {
        if max_concurrency < 1 {
            return Err(ProverAgentError::InvalidConcurrency(max_concurrency));
        }

        self.state.max_concurrency.store(max_concurrency, Ordering::SeqCst);
        Ok(())
    }

    /// Replace the backend that subsequently dispatched jobs are proven with
    pub fn set_circuit_prover(&self, circuit_prover: SharedCircuitProver) {
        *self.state.circuit_prover.write().unwrap_or_else(PoisonError::into_inner) = circuit_prover;
    }

    /// The number of jobs currently being proven
    pub fn num_in_flight_jobs(&self) -> usize {
        self.state.num_in_flight_jobs()
    }

    /// The ids and kinds of the jobs currently being proven
    pub fn current_jobs(&self) -> Vec<(ProvingJobId, ProvingRequestType)> {
        let jobs = self.state.in_flight_jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.iter().map(|(id, job)| (id.clone(), job.request_type)).sorted().collect()
    }

    /// Start pulling jobs from the given source
    ///
    /// Must be called from within a tokio runtime
    pub fn start(&self, job_source: SharedJobSource) -> Result<(), ProverAgentError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(err_str!(ProverAgentError::Setup))?;

        let mut poll_loop = self.poll_loop.lock().unwrap_or_else(PoisonError::into_inner);
        if poll_loop.is_some() {
            return Err(ProverAgentError::AlreadyRunning);
        }

        let epoch = self.state.next_epoch.fetch_add(1, Ordering::SeqCst);
        self.state.active_epoch.store(epoch, Ordering::SeqCst);

        let (cancel, cancel_channel) = new_cancel_channel();
        let state = self.state.clone();
        let join_handle = runtime.spawn(state.run_poll_loop(job_source, epoch, cancel_channel));
        *poll_loop = Some(PollLoopHandle { cancel, join_handle });

        info!(
            max_concurrency = self.max_concurrency(),
            poll_interval_ms = self.state.poll_interval.as_millis() as u64,
            "prover agent started"
        );
        Ok(())
    }

    /// Stop pulling jobs and wait for the polling loop to exit
    ///
    /// Jobs already being proven are not cancelled, but their results are
    /// dropped instead of reported and they no longer count as in flight.
    /// Stopping a stopped agent is a no-op
    pub async fn stop(&self) {
        let handle = {
            let mut poll_loop = self.poll_loop.lock().unwrap_or_else(PoisonError::into_inner);
            let handle = poll_loop.take();
            if handle.is_some() {
                self.state.active_epoch.store(STOPPED_EPOCH, Ordering::SeqCst);
            }

            handle
        };

        let Some(PollLoopHandle { cancel, join_handle }) = handle else {
            return;
        };

        // The loop may have exited already and dropped its receiver
        let _ = cancel.send(());
        if let Err(e) = join_handle.await {
            error!("prover agent polling loop failed: {e}");
        }

        // Wait out any report that passed the epoch check before the stop
        drop(self.state.report_gate.write().await);

        let abandoned = self.state.abandon_in_flight_jobs();
        info!(abandoned_jobs = abandoned, "prover agent stopped");
    }
}

// ----------------
// | Polling Loop |
// ----------------

impl AgentState {
    /// The maximum number of jobs in flight at once
    fn max_concurrency(&self) -> usize {
        self.max_concurrency.load(Ordering::SeqCst)
    }

    /// The number of jobs in flight
    fn num_in_flight_jobs(&self) -> usize {
        self.in_flight_jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The backend to prove newly dispatched jobs with
    fn circuit_prover(&self) -> SharedCircuitProver {
        self.circuit_prover.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether the given epoch is the one the agent is running in
    fn is_current_epoch(&self, epoch: u64) -> bool {
        self.active_epoch.load(Ordering::SeqCst) == epoch
    }

    /// Forget every in-flight job, returning how many there were
    ///
    /// Called once the polling loop has exited; the abandoned jobs keep
    /// running but their results fail the epoch check, and their removal is
    /// keyed on a dispatch id that no later dispatch reuses
    fn abandon_in_flight_jobs(&self) -> usize {
        let mut jobs = self.in_flight_jobs.write().unwrap_or_else(PoisonError::into_inner);
        let abandoned = jobs.len();
        if abandoned > 0 {
            let ids = jobs.keys().sorted().join(", ");
            debug!("abandoning in-flight jobs, their results will be dropped: {ids}");
        }

        jobs.clear();
        abandoned
    }

    /// Poll the job source until cancelled or until the agent moves on to a
    /// different epoch
    async fn run_poll_loop(
        self: Arc<Self>,
        job_source: SharedJobSource,
        epoch: u64,
        mut cancel_channel: CancelChannel,
    ) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_summary = Instant::now();

        loop {
            tokio::select! {
                _ = cancel_channel.changed() => break,
                _ = ticker.tick() => {},
            }

            if !self.is_current_epoch(epoch) {
                break;
            }

            record_in_flight_jobs(self.num_in_flight_jobs());
            self.heartbeat_in_flight_jobs(job_source.as_ref()).await;
            self.fetch_and_dispatch(&job_source, epoch).await;

            if last_summary.elapsed() >= IN_FLIGHT_SUMMARY_INTERVAL {
                self.log_in_flight_summary();
                last_summary = Instant::now();
            }
        }

        debug!("prover agent polling loop exiting");
    }

    /// Heartbeat every in-flight job, concurrently
    async fn heartbeat_in_flight_jobs(&self, job_source: &dyn ProvingJobSource) {
        let job_ids: Vec<ProvingJobId> = {
            let jobs = self.in_flight_jobs.read().unwrap_or_else(PoisonError::into_inner);
            jobs.keys().cloned().collect()
        };

        let heartbeats = job_ids.iter().map(|job_id| async move {
            let start = Instant::now();
            let res = job_source.heartbeat(job_id).await;
            record_heartbeat_latency(start.elapsed());

            if let Err(e) = res {
                warn!(job_id = %job_id, "error sending heartbeat: {e}");
            }
        });
        join_all(heartbeats).await;
    }

    /// Fetch and dispatch jobs until the concurrency limit is reached or the
    /// source has no more work
    async fn fetch_and_dispatch(self: &Arc<Self>, job_source: &SharedJobSource, epoch: u64) {
        while self.num_in_flight_jobs() < self.max_concurrency() {
            let start = Instant::now();
            let res = job_source.get_proving_job().await;
            record_fetch_latency(start.elapsed());

            let job = match res {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    incr_fetch_errors();
                    warn!("error fetching proving job: {e}");
                    break;
                },
            };

            if !self.is_current_epoch(epoch) {
                debug!(job_id = %job.id, "agent stopped during fetch, not starting job");
                break;
            }

            if !self.dispatch(job, job_source.clone(), epoch) {
                break;
            }
        }
    }

    /// Register a job as in flight and spawn a task to prove it
    ///
    /// Returns `false` without dispatching if a job with the same id is already
    /// in flight
    fn dispatch(self: &Arc<Self>, job: ProvingJob, job_source: SharedJobSource, epoch: u64) -> bool {
        let request_type = job.request_type();
        let dispatch_id = self.next_dispatch_id.fetch_add(1, Ordering::SeqCst);

        // Hold the lock across the spawn so the task cannot remove its entry
        // before it is inserted
        let mut jobs = self.in_flight_jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(&job.id) {
            debug!(job_id = %job.id, "job already in flight, not starting it twice");
            return false;
        }

        let in_flight = InFlightJob { request_type, started_at: Instant::now(), dispatch_id };
        jobs.insert(job.id.clone(), in_flight);

        let span = info_span!("proving_job", job_id = %job.id, kind = %request_type);
        let prover = self.circuit_prover();
        let state = self.clone();
        tokio::spawn(
            async move { state.work(job, prover, job_source, epoch, dispatch_id).await }
                .instrument(span),
        );

        true
    }

    /// Log the ids, kinds and ages of the jobs in flight, if any
    fn log_in_flight_summary(&self) {
        let jobs = self.in_flight_jobs.read().unwrap_or_else(PoisonError::into_inner);
        if jobs.is_empty() {
            return;
        }

        let summary = jobs
            .iter()
            .sorted_by_key(|(id, _)| *id)
            .map(|(id, job)| {
                format!("{id} ({}, {}s)", job.request_type, job.started_at.elapsed().as_secs())
            })
            .join(", ");
        info!(num_jobs = jobs.len(), "in-flight proving jobs: {summary}");
    }
}

// -----------------
// | Job Execution |
// -----------------

impl AgentState {
    /// Prove a job and report its outcome to the source
    async fn work(
        self: Arc<Self>,
        job: ProvingJob,
        prover: SharedCircuitProver,
        job_source: SharedJobSource,
        epoch: u64,
        dispatch_id: u64,
    ) {
        let ProvingJob { id, request } = job;
        let request_type = request.request_type();
        debug!("starting proving job");

        let start = Instant::now();
        let res = self.prove_on_pool(prover, request).await;
        let duration = start.elapsed();
        record_job_duration(request_type, duration);

        match res {
            Ok(result) => self.report_result(&id, result, job_source.as_ref(), epoch).await,
            Err(e) => {
                incr_job_errors(request_type);
                let err = ProvingError::from(e);
                error!(duration_ms = duration.as_millis() as u64, "proving job failed: {err}");
                self.report_error(&id, err, job_source.as_ref(), epoch).await;
            },
        }

        self.remove_in_flight_job(&id, dispatch_id);
    }

    /// Drive the backend's proof of a request on the proving thread pool
    ///
    /// A panic in the backend is caught on the pool thread and returned as an
    /// error
    async fn prove_on_pool(
        &self,
        prover: SharedCircuitProver,
        request: ProvingRequest,
    ) -> ProverResult<ProvingJobResult> {
        let (tx, rx) = oneshot::channel();
        let runtime = Handle::current();
        let span = Span::current();
        self.thread_pool.spawn_fifo(move || {
            let _span = span.entered();
            let proof = || runtime.block_on(get_proof(prover.as_ref(), request));
            let res = panic::catch_unwind(AssertUnwindSafe(proof))
                .unwrap_or_else(|_| Err(CircuitProverError::prover(ERR_BACKEND_PANICKED)));

            // The proving task is gone if its runtime shut down
            let _ = tx.send(res);
        });

        rx.await.unwrap_or_else(|_| Err(CircuitProverError::prover(ERR_PROVING_THREAD_EXITED)))
    }

    /// Resolve a job with its result, unless the agent has since stopped
    async fn report_result(
        &self,
        job_id: &ProvingJobId,
        result: ProvingJobResult,
        job_source: &dyn ProvingJobSource,
        epoch: u64,
    ) {
        let _gate = self.report_gate.read().await;
        if !self.is_current_epoch(epoch) {
            debug!("agent no longer running, dropping proving result");
            return;
        }

        let start = Instant::now();
        let res = job_source.resolve_proving_job(job_id, result).await;
        record_resolve_latency(start.elapsed());

        match res {
            Ok(()) => info!("proving job resolved"),
            Err(e) => warn!("error resolving proving job: {e}"),
        }
    }

    /// Reject a job with its error, unless the agent has since stopped
    async fn report_error(
        &self,
        job_id: &ProvingJobId,
        err: ProvingError,
        job_source: &dyn ProvingJobSource,
        epoch: u64,
    ) {
        let _gate = self.report_gate.read().await;
        if !self.is_current_epoch(epoch) {
            debug!("agent no longer running, dropping proving error");
            return;
        }

        let start = Instant::now();
        let res = job_source.reject_proving_job(job_id, err).await;
        record_reject_latency(start.elapsed());

        if let Err(e) = res {
            warn!("error rejecting proving job: {e}");
        }
    }

    /// Remove a job from the in-flight set if the entry belongs to the given
    /// dispatch
    fn remove_in_flight_job(&self, job_id: &ProvingJobId, dispatch_id: u64) {
        let mut jobs = self.in_flight_jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.get(job_id).is_some_and(|job| job.dispatch_id == dispatch_id) {
            jobs.remove(job_id);
        }
    }
}
