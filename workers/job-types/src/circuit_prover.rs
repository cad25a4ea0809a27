//! The interface of a proving backend, one method per request kind

use async_trait::async_trait;
use circuit_types::{
    inputs::{
        AvmCircuitInputs, BaseParityInputs, BaseRollupInputs, BlockMergeRollupInputs,
        BlockRootRollupInputs, MergeRollupInputs, PrivateKernelEmptyInputs,
        PublicKernelNonTailRequest, PublicKernelTailRequest, RootParityInputs, RootRollupInputs,
        TubeInputs,
    },
    proofs::{ProofAndVerificationKey, PublicInputsAndRecursiveProof, RootParityInput},
    public_inputs::{
        BaseOrMergeRollupPublicInputs, BlockRootOrBlockMergePublicInputs,
        KernelCircuitPublicInputs, PublicKernelCircuitPublicInputs, RootRollupPublicInputs,
    },
};

use crate::error::CircuitProverError;

/// The result type of a proving backend call
pub type ProverResult<T> = Result<T, CircuitProverError>;

/// A backend that generates witnesses and proofs for the rollup circuits
///
/// Calls may block their thread for the length of a proof. The agent drives
/// each call on a dedicated proving thread, never on its polling runtime
#[async_trait]
pub trait ServerCircuitProver: Send + Sync {
    /// Prove a public function's execution in the AVM
    async fn get_avm_proof(&self, inputs: AvmCircuitInputs)
    -> ProverResult<ProofAndVerificationKey>;

    /// Prove a setup, app logic or teardown public kernel
    async fn get_public_kernel_proof(
        &self,
        request: PublicKernelNonTailRequest,
    ) -> ProverResult<PublicInputsAndRecursiveProof<PublicKernelCircuitPublicInputs>>;

    /// Prove the public kernel tail
    async fn get_public_tail_proof(
        &self,
        request: PublicKernelTailRequest,
    ) -> ProverResult<PublicInputsAndRecursiveProof<KernelCircuitPublicInputs>>;

    /// Prove the base rollup of a transaction
    async fn get_base_rollup_proof(
        &self,
        inputs: BaseRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs>>;

    /// Prove a merge rollup
    async fn get_merge_rollup_proof(
        &self,
        inputs: MergeRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs>>;

    /// Prove a block root rollup
    async fn get_block_root_rollup_proof(
        &self,
        inputs: BlockRootRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<BlockRootOrBlockMergePublicInputs>>;

    /// Prove a block merge rollup
    async fn get_block_merge_rollup_proof(
        &self,
        inputs: BlockMergeRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<BlockRootOrBlockMergePublicInputs>>;

    /// Prove the root rollup of an epoch
    async fn get_root_rollup_proof(
        &self,
        inputs: RootRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<RootRollupPublicInputs>>;

    /// Prove a base parity circuit
    async fn get_base_parity_proof(&self, inputs: BaseParityInputs)
    -> ProverResult<RootParityInput>;

    /// Prove the root parity circuit
    async fn get_root_parity_proof(&self, inputs: RootParityInputs)
    -> ProverResult<RootParityInput>;

    /// Prove an empty private kernel
    async fn get_empty_private_kernel_proof(
        &self,
        inputs: PrivateKernelEmptyInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<KernelCircuitPublicInputs>>;

    /// Prove the tube circuit
    async fn get_tube_proof(&self, inputs: TubeInputs) -> ProverResult<ProofAndVerificationKey>;
}
