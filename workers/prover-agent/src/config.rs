//! Configuration of the prover agent

use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::ProverAgentError;

/// The default number of jobs an agent proves at once
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;
/// The default interval between polls of the job source, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// The default size of the proving thread pool, zero for one thread per core
pub const DEFAULT_NUM_PROVING_THREADS: usize = 0;

/// The tunables of a prover agent
///
/// Parsed from the command line or environment when flattened into a binary's
/// CLI
#[derive(Clone, Debug, Parser, Serialize, Deserialize)]
pub struct ProverAgentConfig {
    /// The maximum number of jobs proven at once
    #[clap(long, value_parser, default_value_t = DEFAULT_MAX_CONCURRENCY, env = "PROVER_AGENT_MAX_CONCURRENCY")]
    pub max_concurrency: usize,
    /// The interval between polls of the job source, in milliseconds
    #[clap(long, value_parser, default_value_t = DEFAULT_POLL_INTERVAL_MS, env = "PROVER_AGENT_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,
    /// The number of threads proofs are generated on, zero for one per core
    ///
    /// Jobs beyond this many wait for a free thread while counting as in flight
    #[clap(long, value_parser, default_value_t = DEFAULT_NUM_PROVING_THREADS, env = "PROVER_AGENT_PROVING_THREADS")]
    pub num_proving_threads: usize,
}

impl Default for ProverAgentConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            num_proving_threads: DEFAULT_NUM_PROVING_THREADS,
        }
    }
}

impl ProverAgentConfig {
    /// The poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check that the config describes a usable agent
    pub fn validate(&self) -> Result<(), ProverAgentError> {
        if self.max_concurrency < 1 {
            return Err(ProverAgentError::InvalidConcurrency(self.max_concurrency));
        }

        if self.poll_interval_ms == 0 {
            return Err(ProverAgentError::InvalidPollInterval);
        }

        Ok(())
    }
}
