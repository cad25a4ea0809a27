//! Groups helpers used for testing proving agents and block proving state
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

pub mod assertions;
pub mod fixtures;
pub mod job_source;
