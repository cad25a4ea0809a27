//! Defines one-off utilities used throughout the workspace
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::needless_pass_by_value)]

pub mod errors;
#[cfg(feature = "telemetry")]
pub mod telemetry;
