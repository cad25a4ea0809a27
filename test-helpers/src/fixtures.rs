//! Builders for circuit outputs and proving requests with placeholder payloads

use circuit_types::{
    inputs::{
        BlockRootRollupInputs, MergeRollupInputs, PublicKernelNonTailRequest,
        PublicKernelTailRequest, RootParityInputs,
    },
    kernel::PublicKernelType,
    proofs::{PublicInputsAndRecursiveProof, RecursiveProof, RootParityInput, VerificationKey},
    public_inputs::{BaseOrMergeRollupPublicInputs, ParityPublicInputs},
};
use job_types::{ProvingJob, ProvingRequest, ProvingRequestType};

/// Build a base or merge rollup output whose payloads are tagged with `tag`
pub fn rollup_output(tag: u8) -> PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs> {
    PublicInputsAndRecursiveProof::new(
        BaseOrMergeRollupPublicInputs::new(vec![tag]),
        RecursiveProof::new(vec![tag]),
        VerificationKey::new(vec![tag]),
    )
}

/// Build a parity output whose payloads are tagged with `tag`
pub fn parity_output(tag: u8) -> RootParityInput {
    PublicInputsAndRecursiveProof::new(
        ParityPublicInputs::new(vec![tag]),
        RecursiveProof::new(vec![tag]),
        VerificationKey::new(vec![tag]),
    )
}

/// Build a request of the given kind with placeholder inputs
pub fn request_of_type(request_type: ProvingRequestType) -> ProvingRequest {
    match request_type {
        ProvingRequestType::PublicVm => ProvingRequest::PublicVm { inputs: Default::default() },
        ProvingRequestType::PublicKernelNonTail => ProvingRequest::PublicKernelNonTail {
            inputs: PublicKernelNonTailRequest {
                kernel_type: PublicKernelType::AppLogic,
                inputs: Default::default(),
            },
        },
        ProvingRequestType::PublicKernelTail => ProvingRequest::PublicKernelTail {
            inputs: PublicKernelTailRequest::new(Default::default()),
        },
        ProvingRequestType::BaseRollup => ProvingRequest::BaseRollup { inputs: Default::default() },
        ProvingRequestType::MergeRollup => ProvingRequest::MergeRollup {
            inputs: MergeRollupInputs::new(rollup_output(0).into(), rollup_output(1).into()),
        },
        ProvingRequestType::BlockRootRollup => ProvingRequest::BlockRootRollup {
            inputs: BlockRootRollupInputs {
                previous_rollup_data: vec![rollup_output(0).into()],
                l1_to_l2_roots: parity_output(0),
                l1_to_l2_messages: Default::default(),
                global_variables: Default::default(),
            },
        },
        ProvingRequestType::BlockMergeRollup => {
            ProvingRequest::BlockMergeRollup { inputs: Default::default() }
        },
        ProvingRequestType::RootRollup => ProvingRequest::RootRollup { inputs: Default::default() },
        ProvingRequestType::BaseParity => ProvingRequest::BaseParity { inputs: Default::default() },
        ProvingRequestType::RootParity => ProvingRequest::RootParity {
            inputs: RootParityInputs { children: vec![parity_output(0), parity_output(1)] },
        },
        ProvingRequestType::PrivateKernelEmpty => {
            ProvingRequest::PrivateKernelEmpty { inputs: Default::default() }
        },
        ProvingRequestType::TubeProof => ProvingRequest::TubeProof { inputs: Default::default() },
    }
}

/// Build a job of the given kind with a fresh id
pub fn job_of_type(request_type: ProvingRequestType) -> ProvingJob {
    ProvingJob::new(request_of_type(request_type))
}
