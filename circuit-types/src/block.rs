//! Block level metadata handed to the block proving state by the orchestrator

use serde::{Deserialize, Serialize};

use crate::Fr;

/// The global variables of the block being proven
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVariables {
    /// The chain the block belongs to
    pub chain_id: u64,
    /// The rollup protocol version
    pub version: u64,
    /// The number of the block
    pub block_number: u64,
    /// The L1 slot the block was proposed in
    pub slot_number: u64,
    /// The timestamp of the block, in seconds since the unix epoch
    pub timestamp: u64,
}

/// A snapshot of an append only merkle tree
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// The root of the tree
    pub root: Fr,
    /// The index of the next empty leaf
    pub next_available_leaf_index: u64,
}

/// The L1 to L2 messages inserted by a block along with the message tree data
/// the block root rollup needs to insert them
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1ToL2MessageData {
    /// The messages, padded to the per-block message count
    pub messages: Vec<Fr>,
    /// The message tree before the block's messages are inserted
    pub message_tree_snapshot: TreeSnapshot,
    /// The sibling path of the new message subtree root
    pub message_tree_root_sibling_path: Vec<Fr>,
}

/// A proven L2 block
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Block {
    /// The block number
    pub number: u64,
    /// The root of the archive tree after the block is inserted
    pub archive_root: Fr,
    /// The serialized block header
    pub header: Vec<u8>,
    /// The serialized block body
    pub body: Vec<u8>,
}
