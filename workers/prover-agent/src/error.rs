//! Defines error types emitted by the prover agent

use thiserror::Error;

/// The error type emitted by the prover agent
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProverAgentError {
    /// The agent was started while already running
    #[error("prover agent is already running")]
    AlreadyRunning,
    /// The agent was configured with a concurrency limit below one
    #[error("invalid max concurrency {0}, must be at least 1")]
    InvalidConcurrency(usize),
    /// The agent was configured with a zero poll interval
    #[error("invalid poll interval, must be at least 1ms")]
    InvalidPollInterval,
    /// The agent could not be set up, e.g. outside of a tokio runtime
    #[error("error setting up prover agent: {0}")]
    Setup(String),
}
