//! Private inputs of the circuits in the proving pipeline

use serde::{Deserialize, Serialize};

use crate::{
    block::{GlobalVariables, L1ToL2MessageData},
    kernel::PublicKernelType,
    opaque_circuit_type,
    proofs::{PublicInputsAndRecursiveProof, RecursiveProof, RootParityInput, VerificationKey},
    public_inputs::BaseOrMergeRollupPublicInputs,
};

// --------------------
// | Witness Payloads |
// --------------------

opaque_circuit_type!(
    /// The inputs to the AVM circuit for a single public function call
    AvmCircuitInputs
);
opaque_circuit_type!(
    /// The private inputs of a setup, app logic or teardown public kernel
    PublicKernelCircuitPrivateInputs
);
opaque_circuit_type!(
    /// The private inputs of the public kernel tail
    PublicKernelTailCircuitPrivateInputs
);
opaque_circuit_type!(
    /// The inputs to the base rollup circuit for a single transaction
    BaseRollupInputs
);
opaque_circuit_type!(
    /// The inputs to a block merge rollup circuit
    BlockMergeRollupInputs
);
opaque_circuit_type!(
    /// The inputs to the root rollup circuit of an epoch
    RootRollupInputs
);
opaque_circuit_type!(
    /// The inputs to a base parity circuit over a slice of L1 to L2 messages
    BaseParityInputs
);
opaque_circuit_type!(
    /// The inputs to the empty private kernel used for padding transactions
    PrivateKernelEmptyInputs
);
opaque_circuit_type!(
    /// The inputs to the tube circuit, which wraps a client proof for
    /// recursive verification
    TubeInputs
);

// -------------------
// | Public Kernels |
// -------------------

/// A request to prove a setup, app logic or teardown public kernel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKernelNonTailRequest {
    /// The phase the kernel proves
    pub kernel_type: PublicKernelType,
    /// The kernel's private inputs
    pub inputs: PublicKernelCircuitPrivateInputs,
}

/// A request to prove the public kernel tail
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKernelTailRequest {
    /// Always [`PublicKernelType::Tail`]
    pub kernel_type: PublicKernelType,
    /// The kernel's private inputs
    pub inputs: PublicKernelTailCircuitPrivateInputs,
}

impl PublicKernelTailRequest {
    /// Constructor
    pub fn new(inputs: PublicKernelTailCircuitPrivateInputs) -> Self {
        Self { kernel_type: PublicKernelType::Tail, inputs }
    }
}

// -------------------
// | Rollup Circuits |
// -------------------

/// The output of a base or merge rollup, as consumed by the next rollup circuit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousRollupData {
    /// The public inputs of the previous rollup
    pub public_inputs: BaseOrMergeRollupPublicInputs,
    /// The proof of the previous rollup
    pub proof: RecursiveProof,
    /// The verification key of the previous rollup
    pub verification_key: VerificationKey,
}

impl From<PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs>> for PreviousRollupData {
    fn from(output: PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs>) -> Self {
        let PublicInputsAndRecursiveProof { inputs, proof, verification_key } = output;
        Self { public_inputs: inputs, proof, verification_key }
    }
}

/// The inputs to a merge rollup circuit: the left and right child outputs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRollupInputs {
    /// The outputs of the left and right children, in that order
    pub previous_rollup_data: [PreviousRollupData; 2],
}

impl MergeRollupInputs {
    /// Build the merge inputs from the left and right child outputs
    pub fn new(left: PreviousRollupData, right: PreviousRollupData) -> Self {
        Self { previous_rollup_data: [left, right] }
    }
}

/// The inputs to the block root rollup circuit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRootRollupInputs {
    /// The outputs of the topmost merge layer, one entry for a single
    /// transaction block and two otherwise
    pub previous_rollup_data: Vec<PreviousRollupData>,
    /// The output of the root parity circuit
    pub l1_to_l2_roots: RootParityInput,
    /// The block's L1 to L2 messages and message tree data
    pub l1_to_l2_messages: L1ToL2MessageData,
    /// The global variables of the block
    pub global_variables: GlobalVariables,
}

/// The inputs to the root parity circuit: the outputs of every base parity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootParityInputs {
    /// The outputs of the base parity circuits, ordered by message slice
    pub children: Vec<RootParityInput>,
}
