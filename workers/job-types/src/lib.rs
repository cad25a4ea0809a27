//! Defines the proving jobs exchanged between job sources and prover agents,
//! along with the interfaces of the job source and the proving backend
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]
#![deny(clippy::needless_pass_by_value)]

pub mod circuit_prover;
pub mod error;
pub mod job_source;
pub mod proving_job;

pub use circuit_prover::{ProverResult, ServerCircuitProver};
pub use error::{CircuitProverError, JobSourceError, ProvingError};
pub use job_source::ProvingJobSource;
pub use proving_job::{ProvingJob, ProvingJobId, ProvingJobResult, ProvingRequest, ProvingRequestType};
