//! Public inputs of the circuits in the proving pipeline

use crate::opaque_circuit_type;

opaque_circuit_type!(
    /// The public inputs of a base or merge rollup circuit
    BaseOrMergeRollupPublicInputs
);
opaque_circuit_type!(
    /// The public inputs of a block root or block merge rollup circuit
    BlockRootOrBlockMergePublicInputs
);
opaque_circuit_type!(
    /// The public inputs of the root rollup circuit
    RootRollupPublicInputs
);
opaque_circuit_type!(
    /// The public inputs of a base or root parity circuit
    ParityPublicInputs
);
opaque_circuit_type!(
    /// The public inputs of a kernel circuit that finalizes a transaction
    KernelCircuitPublicInputs
);
opaque_circuit_type!(
    /// The public inputs of a non-tail public kernel circuit
    PublicKernelCircuitPublicInputs
);
