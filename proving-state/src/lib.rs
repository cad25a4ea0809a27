//! Tracks the proving of a single block: the unbalanced tree of merge rollups
//! over the block's transactions, the parity inputs, and the lifecycle that
//! ends in the block being resolved or rejected

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]
#![deny(clippy::needless_pass_by_value)]

pub mod block_proving_state;
pub mod error;
pub mod merge_tree;

pub use block_proving_state::{
    BlockProvingState, CANCELLED_REASON, MergeProgress, MergeRollupInputData, ProvingLifecycle,
    ProvingResult, RollupOutput,
};
pub use error::ProvingStateError;
pub use merge_tree::{MergeLocation, MergeSlot};
