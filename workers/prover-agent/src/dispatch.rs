//! Routes a proving request to the backend method that proves its circuit

use job_types::{ProverResult, ProvingJobResult, ProvingRequest, ServerCircuitProver};

/// Prove a request with the given backend
///
/// The match is exhaustive with no fallback arm, so a new request kind does not
/// compile until it is routed here
pub async fn get_proof(
    prover: &dyn ServerCircuitProver,
    request: ProvingRequest,
) -> ProverResult<ProvingJobResult> {
    let result = match request {
        ProvingRequest::PublicVm { inputs } => {
            ProvingJobResult::PublicVm(prover.get_avm_proof(inputs).await?)
        },
        ProvingRequest::PublicKernelNonTail { inputs } => {
            ProvingJobResult::PublicKernelNonTail(prover.get_public_kernel_proof(inputs).await?)
        },
        ProvingRequest::PublicKernelTail { inputs } => {
            ProvingJobResult::PublicKernelTail(prover.get_public_tail_proof(inputs).await?)
        },
        ProvingRequest::BaseRollup { inputs } => {
            ProvingJobResult::BaseRollup(prover.get_base_rollup_proof(inputs).await?)
        },
        ProvingRequest::MergeRollup { inputs } => {
            ProvingJobResult::MergeRollup(prover.get_merge_rollup_proof(inputs).await?)
        },
        ProvingRequest::BlockRootRollup { inputs } => {
            ProvingJobResult::BlockRootRollup(prover.get_block_root_rollup_proof(inputs).await?)
        },
        ProvingRequest::BlockMergeRollup { inputs } => {
            ProvingJobResult::BlockMergeRollup(prover.get_block_merge_rollup_proof(inputs).await?)
        },
        ProvingRequest::RootRollup { inputs } => {
            ProvingJobResult::RootRollup(prover.get_root_rollup_proof(inputs).await?)
        },
        ProvingRequest::BaseParity { inputs } => {
            ProvingJobResult::BaseParity(prover.get_base_parity_proof(inputs).await?)
        },
        ProvingRequest::RootParity { inputs } => {
            ProvingJobResult::RootParity(prover.get_root_parity_proof(inputs).await?)
        },
        ProvingRequest::PrivateKernelEmpty { inputs } => {
            ProvingJobResult::PrivateKernelEmpty(prover.get_empty_private_kernel_proof(inputs).await?)
        },
        ProvingRequest::TubeProof { inputs } => {
            ProvingJobResult::TubeProof(prover.get_tube_proof(inputs).await?)
        },
    };

    Ok(result)
}
