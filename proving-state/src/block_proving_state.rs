//! Defines the proving state of a single block
//!
//! The orchestrator feeds the state completed base rollup and merge rollup
//! outputs in any order. Each output is stored in one slot of the merge node
//! that consumes it; when both slots of a node are filled the caller enqueues
//! the merge, and its output comes back in at the node's own position. The
//! root node feeds the block root rollup, which also waits on the root parity
//! output.
//!
//! The block's lifecycle ends in exactly one of two callbacks. Once rejected,
//! the state discards its partial progress and ignores late outputs; proving
//! work already in flight for the block is not interrupted, its results are
//! simply dropped when they arrive

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, OnceLock, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use circuit_types::{
    block::{GlobalVariables, L1ToL2MessageData, L2Block},
    inputs::{BlockRootRollupInputs, MergeRollupInputs, PreviousRollupData, RootParityInputs},
    proofs::{
        AggregationObject, Proof, PublicInputsAndRecursiveProof, RecursiveProof, RootParityInput,
        VerificationKey,
    },
    public_inputs::{BaseOrMergeRollupPublicInputs, BlockRootOrBlockMergePublicInputs},
};
use common::{Shared, new_shared};
use tracing::{debug, warn};

use crate::{
    error::ProvingStateError,
    merge_tree::{self, MergeLocation, MergeSlot},
};

/// The reason given to the rejection callback when proving is cancelled
pub const CANCELLED_REASON: &str = "Proving cancelled";

/// The output of a base or merge rollup
pub type RollupOutput = PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs>;
/// The callback invoked when the block's proving completes
pub type CompletionCallback = Box<dyn FnOnce(ProvingResult) + Send>;
/// The callback invoked with a reason when the block's proving fails
pub type RejectionCallback = Box<dyn FnOnce(String) + Send>;

// ---------
// | Types |
// ---------

/// The lifecycle of a block's proving
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvingLifecycle {
    /// Transactions are still being added
    Created,
    /// Every transaction has been added
    Full,
    /// The block has been proven
    Resolved,
    /// Proving failed or was cancelled
    Rejected,
}

impl ProvingLifecycle {
    /// Whether the lifecycle has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }
}

/// The outcome handed to the completion callback
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProvingResult {
    /// The block was proven
    Success,
    /// The orchestrator gave up on the block without an error from a proof
    Failure {
        /// Why the block was not proven
        reason: String,
    },
}

/// The progress made by storing a rollup output
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeProgress {
    /// The consuming merge node is still waiting on its other input
    Waiting,
    /// Both inputs of an intermediate merge node are present; the caller should
    /// enqueue the merge and feed its output back at `(level, index)`
    MergeReady {
        /// The level of the merge node
        level: u32,
        /// The index of the merge node within its level
        index: usize,
        /// The inputs of the merge rollup
        inputs: MergeRollupInputs,
    },
    /// Every input of the root node is present
    BlockRootReady,
}

/// The two input slots of a merge node
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeRollupInputData {
    /// The public inputs of the left and right children
    pub inputs: [Option<BaseOrMergeRollupPublicInputs>; 2],
    /// The proofs of the left and right children
    pub proofs: [Option<RecursiveProof>; 2],
    /// The verification keys of the left and right children
    pub verification_keys: [Option<VerificationKey>; 2],
}

impl MergeRollupInputData {
    /// Whether the given slot holds an output
    pub fn is_filled(&self, slot: MergeSlot) -> bool {
        self.inputs[slot.index()].is_some()
    }

    /// The number of filled slots
    pub fn num_filled(&self) -> usize {
        self.inputs.iter().filter(|input| input.is_some()).count()
    }

    /// The output stored in the given slot
    pub fn previous_rollup_data(&self, slot: MergeSlot) -> Option<PreviousRollupData> {
        let i = slot.index();
        Some(PreviousRollupData {
            public_inputs: self.inputs[i].clone()?,
            proof: self.proofs[i].clone()?,
            verification_key: self.verification_keys[i].clone()?,
        })
    }

    /// The merge rollup inputs, if both slots are filled
    pub fn to_merge_rollup_inputs(&self) -> Option<MergeRollupInputs> {
        let left = self.previous_rollup_data(MergeSlot::Left)?;
        let right = self.previous_rollup_data(MergeSlot::Right)?;
        Some(MergeRollupInputs::new(left, right))
    }

    /// Store an output in the given slot
    fn fill(&mut self, slot: MergeSlot, output: RollupOutput) {
        let i = slot.index();
        let PublicInputsAndRecursiveProof { inputs, proof, verification_key } = output;
        self.inputs[i] = Some(inputs);
        self.proofs[i] = Some(proof);
        self.verification_keys[i] = Some(verification_key);
    }
}

/// The lifecycle along with the callbacks that end it
struct LifecycleState {
    /// The current lifecycle
    lifecycle: ProvingLifecycle,
    /// Invoked on resolution, taken when the lifecycle ends
    on_complete: Option<CompletionCallback>,
    /// Invoked on rejection, taken when the lifecycle ends
    on_reject: Option<RejectionCallback>,
}

/// A merge node's slots, locked independently of every other node
type MergeNode = Arc<Mutex<MergeRollupInputData>>;

// -----------------------
// | Block Proving State |
// -----------------------

/// The proving state of a single block
///
/// `Tx` is the orchestrator's per-transaction proving state, which this type
/// only stores and indexes
pub struct BlockProvingState<Tx> {
    /// The number of transactions in the block
    total_num_txs: usize,
    /// The global variables of the block
    global_variables: GlobalVariables,
    /// The block's L1 to L2 messages and message tree data
    message_data: L1ToL2MessageData,
    /// The lifecycle and its callbacks
    lifecycle: Mutex<LifecycleState>,
    /// The transactions added so far, in arrival order
    txs: RwLock<Vec<Tx>>,
    /// The merge nodes that have received at least one input, by global id
    merge_rollup_inputs: Shared<HashMap<usize, MergeNode>>,
    /// The outputs of the base parity circuits
    root_parity_inputs: Mutex<Vec<Option<RootParityInput>>>,
    /// The output of the root parity circuit
    final_root_parity_input: OnceLock<RootParityInput>,
    /// Whether the block root rollup has been enqueued
    block_root_rollup_started: AtomicBool,
    /// The public inputs of the block root rollup
    block_root_rollup_public_inputs: OnceLock<BlockRootOrBlockMergePublicInputs>,
    /// The final proof of the block
    final_proof: OnceLock<Proof>,
    /// The aggregation object of the final proof
    final_aggregation_object: OnceLock<AggregationObject>,
    /// The proven block
    block: OnceLock<L2Block>,
}

impl<Tx> BlockProvingState<Tx> {
    /// Constructor
    ///
    /// Exactly one of `on_complete` and `on_reject` is invoked, at most once
    pub fn new<C, R>(
        total_num_txs: usize,
        global_variables: GlobalVariables,
        message_data: L1ToL2MessageData,
        num_root_parity_inputs: usize,
        on_complete: C,
        on_reject: R,
    ) -> Result<Self, ProvingStateError>
    where
        C: FnOnce(ProvingResult) + Send + 'static,
        R: FnOnce(String) + Send + 'static,
    {
        if total_num_txs == 0 {
            return Err(ProvingStateError::InvalidTxCount);
        }

        if num_root_parity_inputs == 0 {
            return Err(ProvingStateError::InvalidParityCount);
        }

        let lifecycle = LifecycleState {
            lifecycle: ProvingLifecycle::Created,
            on_complete: Some(Box::new(on_complete)),
            on_reject: Some(Box::new(on_reject)),
        };

        Ok(Self {
            total_num_txs,
            global_variables,
            message_data,
            lifecycle: Mutex::new(lifecycle),
            txs: RwLock::new(Vec::with_capacity(total_num_txs)),
            merge_rollup_inputs: new_shared(HashMap::new()),
            root_parity_inputs: Mutex::new(vec![None; num_root_parity_inputs]),
            final_root_parity_input: OnceLock::new(),
            block_root_rollup_started: AtomicBool::new(false),
            block_root_rollup_public_inputs: OnceLock::new(),
            final_proof: OnceLock::new(),
            final_aggregation_object: OnceLock::new(),
            block: OnceLock::new(),
        })
    }

    // -------------
    // | Lifecycle |
    // -------------

    /// The current lifecycle
    pub fn lifecycle(&self) -> ProvingLifecycle {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner).lifecycle
    }

    /// Whether the block is still being proven
    pub fn verify_state(&self) -> bool {
        !self.lifecycle().is_terminal()
    }

    /// Resolve the block's proving, invoking the completion callback
    ///
    /// A no-op once the lifecycle has ended
    pub fn resolve(&self, result: ProvingResult) {
        let on_complete = {
            let mut state = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if state.lifecycle.is_terminal() {
                return;
            }

            state.lifecycle = ProvingLifecycle::Resolved;
            state.on_reject = None;
            state.on_complete.take()
        };

        debug!(block_number = self.global_variables.block_number, "block proving resolved");
        if let Some(callback) = on_complete {
            callback(result);
        }
    }

    /// Reject the block's proving, invoking the rejection callback
    ///
    /// Discards the partially filled merge nodes. A no-op once the lifecycle
    /// has ended
    pub fn reject<R: Into<String>>(&self, reason: R) {
        let on_reject = {
            let mut state = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if state.lifecycle.is_terminal() {
                return;
            }

            state.lifecycle = ProvingLifecycle::Rejected;
            state.on_complete = None;
            state.on_reject.take()
        };

        self.merge_rollup_inputs.write().unwrap_or_else(PoisonError::into_inner).clear();

        let reason = reason.into();
        warn!(block_number = self.global_variables.block_number, "block proving rejected: {reason}");
        if let Some(callback) = on_reject {
            callback(reason);
        }
    }

    /// Cancel the block's proving
    ///
    /// Proving jobs already dispatched for the block keep running; their
    /// outputs are ignored when they arrive
    pub fn cancel(&self) {
        self.reject(CANCELLED_REASON);
    }

    /// Whether the lifecycle ended in rejection
    fn is_rejected(&self) -> bool {
        self.lifecycle() == ProvingLifecycle::Rejected
    }

    // ----------------
    // | Transactions |
    // ----------------

    /// The number of transactions in the block
    pub fn total_num_txs(&self) -> usize {
        self.total_num_txs
    }

    /// The global variables of the block
    pub fn global_variables(&self) -> &GlobalVariables {
        &self.global_variables
    }

    /// The number of transactions added so far
    pub fn transactions_received(&self) -> usize {
        self.txs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether more transactions may be added
    pub fn is_accepting_transactions(&self) -> bool {
        self.lifecycle() == ProvingLifecycle::Created
    }

    /// Add a transaction, returning its index
    ///
    /// Returns `None` without storing the transaction if the block is already
    /// full or no longer being proven
    pub fn add_new_tx(&self, tx: Tx) -> Option<usize> {
        if !self.verify_state() {
            debug!("block no longer being proven, not adding transaction");
            return None;
        }

        let mut txs = self.txs.write().unwrap_or_else(PoisonError::into_inner);
        if txs.len() >= self.total_num_txs {
            warn!(total_num_txs = self.total_num_txs, "block is full, not adding transaction");
            return None;
        }

        txs.push(tx);
        let index = txs.len() - 1;
        if txs.len() == self.total_num_txs {
            let mut state = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if state.lifecycle == ProvingLifecycle::Created {
                state.lifecycle = ProvingLifecycle::Full;
            }
        }

        Some(index)
    }

    /// The transaction at the given index
    pub fn get_tx(&self, index: usize) -> Option<Tx>
    where
        Tx: Clone,
    {
        self.txs.read().unwrap_or_else(PoisonError::into_inner).get(index).cloned()
    }

    // --------------
    // | Merge Tree |
    // --------------

    /// The level base rollup outputs enter the merge tree at
    pub fn leaf_level(&self) -> u32 {
        merge_tree::leaf_level(self.total_num_txs)
    }

    /// Find the merge node that consumes the output at `(level, index)`
    pub fn find_merge_level(
        &self,
        level: u32,
        index: usize,
    ) -> Result<MergeLocation, ProvingStateError> {
        merge_tree::find_merge_level(level, index, self.total_num_txs)
            .ok_or(ProvingStateError::InvalidTreePosition { level, index })
    }

    /// The number of inputs a merge node waits for
    ///
    /// Only the root of a single transaction block has one
    fn required_merge_inputs(&self) -> usize {
        if self.total_num_txs == 1 { 1 } else { 2 }
    }

    /// Get the merge node with the given id, creating it if absent
    fn merge_node(&self, merge_index: usize) -> MergeNode {
        let nodes = self.merge_rollup_inputs.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(node) = nodes.get(&merge_index) {
            return node.clone();
        }
        drop(nodes);

        let mut nodes = self.merge_rollup_inputs.write().unwrap_or_else(PoisonError::into_inner);
        nodes.entry(merge_index).or_default().clone()
    }

    /// Store an output in a slot of a merge node
    ///
    /// Returns `true` iff this call completed the node, i.e. its other input
    /// was already present. Outputs for a filled slot or for a block that is no
    /// longer being proven are dropped and return `false`
    pub fn store_merge_inputs(
        &self,
        output: RollupOutput,
        slot: MergeSlot,
        merge_index: usize,
    ) -> bool {
        if !self.verify_state() {
            debug!(merge_index, "block no longer being proven, dropping rollup output");
            return false;
        }

        let node = self.merge_node(merge_index);
        let mut data = node.lock().unwrap_or_else(PoisonError::into_inner);

        // The lifecycle is held across the fill, so a rejection lands either
        // before it, and the output is dropped, or after it
        let lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if lifecycle.lifecycle.is_terminal() {
            debug!(merge_index, "block rejected while storing, dropping rollup output");
            return false;
        }

        if data.is_filled(slot) {
            warn!(merge_index, ?slot, "merge slot already filled, dropping duplicate output");
            return false;
        }

        data.fill(slot, output);
        data.num_filled() == self.required_merge_inputs()
    }

    /// The inputs stored at the given merge node
    ///
    /// Returns `None` once the block is rejected
    pub fn get_merge_inputs(&self, merge_index: usize) -> Option<MergeRollupInputData> {
        if self.is_rejected() {
            return None;
        }

        let nodes = self.merge_rollup_inputs.read().unwrap_or_else(PoisonError::into_inner);
        let node = nodes.get(&merge_index)?;
        Some(node.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Store the output of the node at `(level, index)` in the merge node that
    /// consumes it, and report what the caller should do next
    pub fn store_merge_output(
        &self,
        level: u32,
        index: usize,
        output: RollupOutput,
    ) -> Result<MergeProgress, ProvingStateError> {
        let location = self.find_merge_level(level, index)?;
        let merge_index = location.merge_index();
        if !self.store_merge_inputs(output, location.slot, merge_index) {
            return Ok(MergeProgress::Waiting);
        }

        if location.is_root() {
            return Ok(MergeProgress::BlockRootReady);
        }

        let inputs = self.get_merge_inputs(merge_index).and_then(|d| d.to_merge_rollup_inputs());
        Ok(match inputs {
            Some(inputs) => MergeProgress::MergeReady {
                level: location.level,
                index: location.index_within_level,
                inputs,
            },
            None => MergeProgress::Waiting,
        })
    }

    /// Store the base rollup output of the transaction at `tx_index`
    pub fn store_base_rollup_output(
        &self,
        tx_index: usize,
        output: RollupOutput,
    ) -> Result<MergeProgress, ProvingStateError> {
        self.store_merge_output(self.leaf_level(), tx_index, output)
    }

    /// Whether every input of the root merge node is present
    pub fn is_ready_for_block_root_rollup(&self) -> bool {
        self.get_merge_inputs(0)
            .is_some_and(|root| root.num_filled() == self.required_merge_inputs())
    }

    // ----------
    // | Parity |
    // ----------

    /// Store the output of the base parity circuit at `index`
    ///
    /// The first output stored in a slot is kept
    pub fn set_root_parity_inputs(
        &self,
        input: RootParityInput,
        index: usize,
    ) -> Result<(), ProvingStateError> {
        let mut inputs = self.root_parity_inputs.lock().unwrap_or_else(PoisonError::into_inner);
        let num_inputs = inputs.len();
        let slot =
            inputs.get_mut(index).ok_or(ProvingStateError::InvalidParityIndex { index, num_inputs })?;

        if slot.is_some() {
            warn!(index, "root parity input already set, dropping duplicate");
            return Ok(());
        }

        *slot = Some(input);
        Ok(())
    }

    /// Whether every base parity output is present
    pub fn are_root_parity_inputs_ready(&self) -> bool {
        let inputs = self.root_parity_inputs.lock().unwrap_or_else(PoisonError::into_inner);
        inputs.iter().all(Option::is_some)
    }

    /// The inputs of the root parity circuit, once every base parity output is
    /// present
    pub fn get_root_parity_inputs(&self) -> Option<RootParityInputs> {
        let inputs = self.root_parity_inputs.lock().unwrap_or_else(PoisonError::into_inner);
        let children = inputs.iter().cloned().collect::<Option<Vec<_>>>()?;
        Some(RootParityInputs { children })
    }

    /// Store the output of the root parity circuit
    pub fn set_final_root_parity_input(
        &self,
        input: RootParityInput,
    ) -> Result<(), ProvingStateError> {
        self.final_root_parity_input
            .set(input)
            .map_err(|_| ProvingStateError::ArtifactAlreadySet("final root parity input"))
    }

    /// The output of the root parity circuit
    pub fn final_root_parity_input(&self) -> Option<RootParityInput> {
        self.final_root_parity_input.get().cloned()
    }

    // ---------------------
    // | Block Root Rollup |
    // ---------------------

    /// Mark the block root rollup as started, returning `false` if it already
    /// was
    pub fn try_start_block_root_rollup(&self) -> bool {
        self.block_root_rollup_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Whether the block root rollup has been started
    pub fn block_root_rollup_started(&self) -> bool {
        self.block_root_rollup_started.load(Ordering::SeqCst)
    }

    /// Build the block root rollup inputs if the root merge node and the root
    /// parity output are both ready, marking the rollup as started
    ///
    /// Returns `Some` at most once over the lifetime of the state
    pub fn check_and_start_block_root_rollup(&self) -> Option<BlockRootRollupInputs> {
        if !self.verify_state() || !self.is_ready_for_block_root_rollup() {
            debug!("not ready for block root rollup");
            return None;
        }

        let l1_to_l2_roots = self.final_root_parity_input()?;
        let root = self.get_merge_inputs(0)?;
        let previous_rollup_data = [MergeSlot::Left, MergeSlot::Right]
            .into_iter()
            .filter_map(|slot| root.previous_rollup_data(slot))
            .collect();

        if !self.try_start_block_root_rollup() {
            debug!("block root rollup already started");
            return None;
        }

        Some(BlockRootRollupInputs {
            previous_rollup_data,
            l1_to_l2_roots,
            l1_to_l2_messages: self.message_data.clone(),
            global_variables: self.global_variables.clone(),
        })
    }

    // ----------------------
    // | Terminal Artifacts |
    // ----------------------

    /// Read a set-once artifact, hiding it once the block is rejected
    fn artifact<T: Clone>(&self, cell: &OnceLock<T>) -> Option<T> {
        if self.is_rejected() {
            return None;
        }

        cell.get().cloned()
    }

    /// Store the public inputs of the block root rollup
    pub fn set_block_root_rollup_public_inputs(
        &self,
        inputs: BlockRootOrBlockMergePublicInputs,
    ) -> Result<(), ProvingStateError> {
        self.block_root_rollup_public_inputs
            .set(inputs)
            .map_err(|_| ProvingStateError::ArtifactAlreadySet("block root rollup public inputs"))
    }

    /// The public inputs of the block root rollup
    pub fn block_root_rollup_public_inputs(&self) -> Option<BlockRootOrBlockMergePublicInputs> {
        self.artifact(&self.block_root_rollup_public_inputs)
    }

    /// Store the final proof of the block
    pub fn set_final_proof(&self, proof: Proof) -> Result<(), ProvingStateError> {
        self.final_proof.set(proof).map_err(|_| ProvingStateError::ArtifactAlreadySet("final proof"))
    }

    /// The final proof of the block
    pub fn final_proof(&self) -> Option<Proof> {
        self.artifact(&self.final_proof)
    }

    /// Store the aggregation object of the final proof
    pub fn set_final_aggregation_object(
        &self,
        aggregation_object: AggregationObject,
    ) -> Result<(), ProvingStateError> {
        self.final_aggregation_object
            .set(aggregation_object)
            .map_err(|_| ProvingStateError::ArtifactAlreadySet("final aggregation object"))
    }

    /// The aggregation object of the final proof
    pub fn final_aggregation_object(&self) -> Option<AggregationObject> {
        self.artifact(&self.final_aggregation_object)
    }

    /// Store the proven block
    pub fn set_block(&self, block: L2Block) -> Result<(), ProvingStateError> {
        self.block.set(block).map_err(|_| ProvingStateError::ArtifactAlreadySet("block"))
    }

    /// The proven block
    pub fn block(&self) -> Option<L2Block> {
        self.artifact(&self.block)
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::VecDeque,
        sync::{Arc, Barrier, Mutex},
        thread,
    };

    use circuit_types::{
        block::GlobalVariables,
        proofs::{AggregationObject, Proof},
    };
    use itertools::Itertools;
    use rand::{Rng, seq::SliceRandom, thread_rng};
    use test_helpers::fixtures::{parity_output, rollup_output};

    use crate::{error::ProvingStateError, merge_tree::MergeSlot};

    use super::{
        BlockProvingState, CANCELLED_REASON, MergeProgress, ProvingLifecycle, ProvingResult,
    };

    /// A callback invocation observed by a test
    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Settled {
        /// The completion callback fired
        Completed(ProvingResult),
        /// The rejection callback fired
        Rejected(String),
    }

    /// A proving state over placeholder transactions, and the log of callbacks
    /// it invoked
    type TestState = (BlockProvingState<u32>, Arc<Mutex<Vec<Settled>>>);

    /// Build a state over `total_num_txs` transactions with recording callbacks
    fn new_state(total_num_txs: usize, num_parity: usize) -> TestState {
        let settled = Arc::new(Mutex::new(Vec::new()));
        let (on_complete, on_reject) = (settled.clone(), settled.clone());
        let state = BlockProvingState::new(
            total_num_txs,
            GlobalVariables { block_number: 7, ..Default::default() },
            Default::default(),
            num_parity,
            move |res| on_complete.lock().unwrap().push(Settled::Completed(res)),
            move |reason| on_reject.lock().unwrap().push(Settled::Rejected(reason)),
        )
        .unwrap();

        (state, settled)
    }

    /// The tree position of a rollup output waiting to be stored
    type Pending = (u32, usize);

    /// Feed every leaf into a fresh state in the given order, proving merges as
    /// they become ready; `pick` chooses which pending output arrives next
    ///
    /// Returns the number of intermediate merges and of block root readiness
    /// events observed
    fn drive<F: FnMut(&mut VecDeque<Pending>) -> Pending>(
        total_num_txs: usize,
        leaf_order: &[usize],
        mut pick: F,
    ) -> (usize, usize) {
        let (state, _) = new_state(total_num_txs, 1);
        let mut pending: VecDeque<Pending> =
            leaf_order.iter().map(|i| (state.leaf_level(), *i)).collect();

        let (mut num_merges, mut num_root_ready) = (0, 0);
        while !pending.is_empty() {
            let (level, index) = pick(&mut pending);
            match state.store_merge_output(level, index, rollup_output(index as u8)).unwrap() {
                MergeProgress::Waiting => {},
                MergeProgress::MergeReady { level, index, .. } => {
                    num_merges += 1;
                    pending.push_back((level, index));
                },
                MergeProgress::BlockRootReady => num_root_ready += 1,
            }
        }

        assert!(state.is_ready_for_block_root_rollup());
        (num_merges, num_root_ready)
    }

    /// Tests that a block needs transactions and parity inputs
    #[test]
    fn test_construction_validation() {
        let res = BlockProvingState::<u32>::new(
            0,
            Default::default(),
            Default::default(),
            1,
            |_| {},
            |_| {},
        );
        assert!(matches!(res, Err(ProvingStateError::InvalidTxCount)));

        let res = BlockProvingState::<u32>::new(
            4,
            Default::default(),
            Default::default(),
            0,
            |_| {},
            |_| {},
        );
        assert!(matches!(res, Err(ProvingStateError::InvalidParityCount)));
    }

    /// Tests that adding the last transaction fills the block, exactly once
    #[test]
    fn test_add_new_tx_fills_block() {
        let (state, _) = new_state(3, 1);
        assert_eq!(state.add_new_tx(10), Some(0));
        assert_eq!(state.add_new_tx(11), Some(1));
        assert!(state.is_accepting_transactions());

        assert_eq!(state.add_new_tx(12), Some(2));
        assert_eq!(state.lifecycle(), ProvingLifecycle::Full);
        assert!(!state.is_accepting_transactions());

        assert_eq!(state.add_new_tx(13), None);
        assert_eq!(state.transactions_received(), 3);
        assert_eq!(state.get_tx(1), Some(11));
        assert_eq!(state.get_tx(3), None);
        assert_eq!(state.lifecycle(), ProvingLifecycle::Full);
    }

    /// Tests that storing both slots of a node reports readiness only on the
    /// second store, in either order
    #[test]
    fn test_store_merge_inputs_pairing() {
        for (first, second) in
            [(MergeSlot::Left, MergeSlot::Right), (MergeSlot::Right, MergeSlot::Left)]
        {
            let (state, _) = new_state(4, 1);
            let results = (
                state.store_merge_inputs(rollup_output(1), first, 1),
                state.store_merge_inputs(rollup_output(2), second, 1),
            );
            assert_eq!(results, (false, true));
        }
    }

    /// Tests that a duplicate output for a filled slot is dropped
    #[test]
    fn test_store_merge_inputs_duplicate() {
        let (state, _) = new_state(4, 1);
        assert!(!state.store_merge_inputs(rollup_output(1), MergeSlot::Left, 2));
        assert!(!state.store_merge_inputs(rollup_output(9), MergeSlot::Left, 2));

        let node = state.get_merge_inputs(2).unwrap();
        assert_eq!(node.num_filled(), 1);
        assert_eq!(node.inputs[0].as_ref().unwrap().data, vec![1]);

        assert!(state.store_merge_inputs(rollup_output(2), MergeSlot::Right, 2));
        assert!(!state.store_merge_inputs(rollup_output(3), MergeSlot::Right, 2));
    }

    /// Tests that concurrent stores into both slots of a fresh node report
    /// readiness exactly once
    #[test]
    fn test_store_merge_inputs_concurrent() {
        for _ in 0..200 {
            let (state, _) = new_state(8, 1);
            let barrier = Barrier::new(2);

            let results = thread::scope(|s| {
                let handles = [MergeSlot::Left, MergeSlot::Right].map(|slot| {
                    let (state, barrier) = (&state, &barrier);
                    s.spawn(move || {
                        barrier.wait();
                        state.store_merge_inputs(rollup_output(slot.index() as u8), slot, 3)
                    })
                });
                handles.map(|h| h.join().unwrap())
            });

            assert_eq!(results.iter().filter(|ready| **ready).count(), 1);
            assert_eq!(state.get_merge_inputs(3).unwrap().num_filled(), 2);
        }
    }

    /// Tests that an output for a node created before a rejection is dropped
    /// once the rejection lands
    #[test]
    fn test_store_into_existing_node_after_reject() {
        let (state, _) = new_state(8, 1);
        assert!(!state.store_merge_inputs(rollup_output(0), MergeSlot::Left, 3));

        state.reject("base rollup failed");
        assert!(!state.store_merge_inputs(rollup_output(1), MergeSlot::Right, 3));
        assert!(state.get_merge_inputs(3).is_none());
        assert!(!state.is_ready_for_block_root_rollup());
    }

    /// Tests that an output racing a rejection leaves the rejected block with
    /// no visible progress and a single callback
    #[test]
    fn test_store_merge_inputs_racing_reject() {
        for _ in 0..200 {
            let (state, settled) = new_state(8, 1);
            assert!(!state.store_merge_inputs(rollup_output(0), MergeSlot::Left, 3));
            let barrier = Barrier::new(2);

            // Either order of the two is valid; only the aftermath is checked
            thread::scope(|s| {
                s.spawn(|| {
                    barrier.wait();
                    state.store_merge_inputs(rollup_output(1), MergeSlot::Right, 3)
                });
                s.spawn(|| {
                    barrier.wait();
                    state.reject("racing rejection");
                });
            });

            assert!(!state.store_merge_inputs(rollup_output(2), MergeSlot::Right, 3));

            assert_eq!(settled.lock().unwrap().len(), 1);
            assert!(state.get_merge_inputs(3).is_none());
        }
    }

    /// Tests, over every arrival order of small blocks, that the tree needs
    /// `n - 1` two-input merges and becomes ready for the block root once
    #[test]
    fn test_merge_count_all_orders() {
        for total_num_txs in 1..=6 {
            for order in (0..total_num_txs).permutations(total_num_txs) {
                // Leaves arrive in the given order, merge outputs after them
                let (num_merges, num_root_ready) =
                    drive(total_num_txs, &order, |pending| pending.pop_front().unwrap());

                assert_eq!(num_merges, total_num_txs.saturating_sub(2), "order {order:?}");
                assert_eq!(num_root_ready, 1, "order {order:?}");
            }
        }
    }

    /// Tests the merge count for larger blocks where leaves and merge outputs
    /// arrive in a random interleaving
    #[test]
    fn test_merge_count_random_orders() {
        let mut rng = thread_rng();
        for _ in 0..50 {
            let total_num_txs = rng.gen_range(2..=100);
            let mut order = (0..total_num_txs).collect_vec();
            order.shuffle(&mut rng);

            let (num_merges, num_root_ready) = drive(total_num_txs, &order, |pending| {
                let i = rng.gen_range(0..pending.len());
                pending.swap_remove_back(i).unwrap()
            });

            assert_eq!(num_merges + 1, total_num_txs - 1);
            assert_eq!(num_root_ready, 1);
        }
    }

    /// Tests a five transaction block fed out of order: four merges in total,
    /// with the root ready only once the last merge's output arrives
    #[test]
    fn test_five_tx_block() {
        let (state, _) = new_state(5, 1);
        let mut progress = Vec::new();
        for tx_index in [3, 1, 4, 0, 2] {
            progress.push(state.store_base_rollup_output(tx_index, rollup_output(tx_index as u8)));
        }

        let progress = progress.into_iter().map(Result::unwrap).collect_vec();
        assert!(progress[..3].iter().all(|p| *p == MergeProgress::Waiting));

        // Leaf 0 completes the node over leaves 0 and 1, leaf 2 the one over 2 and 3
        let MergeProgress::MergeReady { level: 2, index: 0, inputs } = &progress[3] else {
            panic!("expected merge (2, 0), got {:?}", progress[3]);
        };
        let tags = inputs.previous_rollup_data.iter().map(|d| d.public_inputs.data[0]).collect_vec();
        assert_eq!(tags, vec![0, 1]);
        assert!(matches!(progress[4], MergeProgress::MergeReady { level: 2, index: 1, .. }));
        assert!(!state.is_ready_for_block_root_rollup());

        // Merge outputs come back out of order too
        assert_eq!(state.store_merge_output(2, 1, rollup_output(21)), Ok(MergeProgress::Waiting));
        let progress = state.store_merge_output(2, 0, rollup_output(20)).unwrap();
        assert!(matches!(progress, MergeProgress::MergeReady { level: 1, index: 0, .. }));
        assert!(!state.is_ready_for_block_root_rollup());

        let progress = state.store_merge_output(1, 0, rollup_output(10)).unwrap();
        assert_eq!(progress, MergeProgress::BlockRootReady);
        assert!(state.is_ready_for_block_root_rollup());

        // The carried leaf sits in the root's right slot
        let root = state.get_merge_inputs(0).unwrap();
        assert_eq!(root.inputs[0].as_ref().unwrap().data, vec![10]);
        assert_eq!(root.inputs[1].as_ref().unwrap().data, vec![4]);
    }

    /// Tests that a position outside the tree is rejected
    #[test]
    fn test_invalid_tree_position() {
        let (state, _) = new_state(5, 1);
        let res = state.store_merge_output(7, 0, rollup_output(0));
        assert_eq!(res, Err(ProvingStateError::InvalidTreePosition { level: 7, index: 0 }));

        let res = state.store_base_rollup_output(5, rollup_output(0));
        assert_eq!(res, Err(ProvingStateError::InvalidTreePosition { level: 3, index: 5 }));
    }

    /// Tests the fill and check pattern of the root parity inputs
    #[test]
    fn test_root_parity_inputs() {
        let (state, _) = new_state(2, 3);
        state.set_root_parity_inputs(parity_output(2), 2).unwrap();
        state.set_root_parity_inputs(parity_output(0), 0).unwrap();
        assert!(!state.are_root_parity_inputs_ready());
        assert!(state.get_root_parity_inputs().is_none());

        state.set_root_parity_inputs(parity_output(1), 1).unwrap();
        assert!(state.are_root_parity_inputs_ready());

        let children = state.get_root_parity_inputs().unwrap().children;
        let tags = children.iter().map(|c| c.inputs.data[0]).collect_vec();
        assert_eq!(tags, vec![0, 1, 2]);

        let res = state.set_root_parity_inputs(parity_output(3), 3);
        assert_eq!(res, Err(ProvingStateError::InvalidParityIndex { index: 3, num_inputs: 3 }));
    }

    /// Tests that the block root rollup waits on the root parity output and
    /// is only started once
    #[test]
    fn test_block_root_rollup_started_once() {
        let (state, _) = new_state(2, 1);
        state.store_base_rollup_output(1, rollup_output(1)).unwrap();
        let progress = state.store_base_rollup_output(0, rollup_output(0)).unwrap();
        assert_eq!(progress, MergeProgress::BlockRootReady);

        assert!(state.check_and_start_block_root_rollup().is_none());
        assert!(!state.block_root_rollup_started());

        state.set_final_root_parity_input(parity_output(5)).unwrap();
        let inputs = state.check_and_start_block_root_rollup().unwrap();
        let tags = inputs.previous_rollup_data.iter().map(|d| d.public_inputs.data[0]).collect_vec();
        assert_eq!(tags, vec![0, 1]);
        assert_eq!(inputs.l1_to_l2_roots.inputs.data, vec![5]);
        assert_eq!(inputs.global_variables.block_number, 7);

        assert!(state.block_root_rollup_started());
        assert!(state.check_and_start_block_root_rollup().is_none());
        assert!(!state.try_start_block_root_rollup());
    }

    /// Tests that a single transaction block feeds the block root directly
    #[test]
    fn test_single_tx_block() {
        let (state, _) = new_state(1, 1);
        assert_eq!(state.add_new_tx(1), Some(0));
        assert_eq!(state.lifecycle(), ProvingLifecycle::Full);

        let progress = state.store_base_rollup_output(0, rollup_output(0)).unwrap();
        assert_eq!(progress, MergeProgress::BlockRootReady);

        state.set_final_root_parity_input(parity_output(0)).unwrap();
        let inputs = state.check_and_start_block_root_rollup().unwrap();
        assert_eq!(inputs.previous_rollup_data.len(), 1);
    }

    /// Tests that only the first of resolve, reject, resolve fires a callback
    #[test]
    fn test_resolve_fires_once() {
        let (state, settled) = new_state(2, 1);
        state.resolve(ProvingResult::Success);
        state.reject("late failure");
        state.resolve(ProvingResult::Success);

        assert_eq!(*settled.lock().unwrap(), vec![Settled::Completed(ProvingResult::Success)]);
        assert_eq!(state.lifecycle(), ProvingLifecycle::Resolved);
        assert!(!state.verify_state());
    }

    /// Tests that a rejection is terminal and fires its callback once
    #[test]
    fn test_reject_fires_once() {
        let (state, settled) = new_state(2, 1);
        state.reject("base rollup failed");
        state.resolve(ProvingResult::Success);
        state.cancel();

        let expected = vec![Settled::Rejected("base rollup failed".to_string())];
        assert_eq!(*settled.lock().unwrap(), expected);
        assert_eq!(state.lifecycle(), ProvingLifecycle::Rejected);
    }

    /// Tests that cancelling rejects with the cancellation reason
    #[test]
    fn test_cancel() {
        let (state, settled) = new_state(2, 1);
        state.cancel();
        assert_eq!(*settled.lock().unwrap(), vec![Settled::Rejected(CANCELLED_REASON.to_string())]);
    }

    /// Tests that a rejected block discards progress and ignores late outputs
    #[test]
    fn test_reject_discards_progress() {
        let (state, _) = new_state(4, 1);
        state.add_new_tx(0);
        state.store_base_rollup_output(0, rollup_output(0)).unwrap();
        state.set_final_proof(Proof::new(vec![1])).unwrap();
        assert!(state.get_merge_inputs(1).is_some());

        state.reject("tube proof failed");
        assert!(state.get_merge_inputs(1).is_none());
        assert!(state.final_proof().is_none());

        // Late outputs from jobs still in flight are dropped
        let progress = state.store_base_rollup_output(1, rollup_output(1)).unwrap();
        assert_eq!(progress, MergeProgress::Waiting);
        assert!(!state.is_ready_for_block_root_rollup());
        assert_eq!(state.add_new_tx(1), None);
    }

    /// Tests that terminal artifacts are set once and readable after resolution
    #[test]
    fn test_terminal_artifacts_set_once() {
        let (state, _) = new_state(2, 1);
        state.set_final_aggregation_object(AggregationObject::new(vec![3])).unwrap();
        let res = state.set_final_aggregation_object(AggregationObject::new(vec![4]));
        assert_eq!(res, Err(ProvingStateError::ArtifactAlreadySet("final aggregation object")));

        state.resolve(ProvingResult::Success);
        assert_eq!(state.final_aggregation_object(), Some(AggregationObject::new(vec![3])));
        assert!(state.block().is_none());
    }
}
