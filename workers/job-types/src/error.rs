//! Error types surfaced by job sources and proving backends

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error returned by a proving backend while generating a proof
#[derive(Clone, Debug, Error)]
pub enum CircuitProverError {
    /// The circuit's witness could not be generated from its inputs
    #[error("witness generation failed: {0}")]
    Witness(String),
    /// The proof could not be constructed
    #[error("proof construction failed: {0}")]
    Prover(String),
    /// The backend abandoned the proof
    #[error("proving cancelled")]
    Cancelled,
}

impl CircuitProverError {
    /// Create a new witness generation error
    #[allow(clippy::needless_pass_by_value)]
    pub fn witness<T: ToString>(err: T) -> Self {
        Self::Witness(err.to_string())
    }

    /// Create a new proof construction error
    #[allow(clippy::needless_pass_by_value)]
    pub fn prover<T: ToString>(err: T) -> Self {
        Self::Prover(err.to_string())
    }
}

/// The failure of a proving job, as reported back to the job source
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProvingError {
    /// The human readable reason the job failed
    pub message: String,
}

impl ProvingError {
    /// Constructor
    pub fn new<T: Into<String>>(message: T) -> Self {
        Self { message: message.into() }
    }
}

impl From<CircuitProverError> for ProvingError {
    fn from(err: CircuitProverError) -> Self {
        Self { message: err.to_string() }
    }
}

/// An error returned by a job source
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum JobSourceError {
    /// The source could not be reached or failed to serve the request
    #[error("job source unavailable: {0}")]
    Unavailable(String),
    /// The source does not know the job, e.g. because it was reassigned
    #[error("unknown proving job: {0}")]
    UnknownJob(String),
}

impl JobSourceError {
    /// Create a new unavailable error
    #[allow(clippy::needless_pass_by_value)]
    pub fn unavailable<T: ToString>(err: T) -> Self {
        Self::Unavailable(err.to_string())
    }
}
