//! The prover agent pulls proving jobs from a shared job source, proves them
//! against a pluggable backend with bounded concurrency, keeps them alive with
//! heartbeats and reports each result back exactly once

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]
#![deny(clippy::needless_pass_by_value)]

pub mod agent;
pub mod config;
pub mod dispatch;
pub mod error;
#[cfg(any(test, feature = "mocks"))]
pub mod mock;

pub use agent::ProverAgent;
pub use config::ProverAgentConfig;
pub use error::ProverAgentError;
