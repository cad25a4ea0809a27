//! Defines error types emitted by the block proving state

use thiserror::Error;

/// The error type emitted by the block proving state
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProvingStateError {
    /// A block must contain at least one transaction
    #[error("a block must contain at least one transaction")]
    InvalidTxCount,
    /// A block must have at least one root parity input
    #[error("a block must have at least one root parity input")]
    InvalidParityCount,
    /// The given position is not a node of the block's merge tree
    #[error("({level}, {index}) is not a node of the merge tree")]
    InvalidTreePosition {
        /// The level of the position
        level: u32,
        /// The index of the position within its level
        index: usize,
    },
    /// The given root parity slot does not exist
    #[error("root parity index {index} out of range, block has {num_inputs} inputs")]
    InvalidParityIndex {
        /// The requested slot
        index: usize,
        /// The number of slots
        num_inputs: usize,
    },
    /// A terminal artifact was set twice
    #[error("{0} already set")]
    ArtifactAlreadySet(&'static str),
}
