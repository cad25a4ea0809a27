//! Defines proving jobs, the requests they carry and the results they produce
//!
//! The request and result enums are closed: adding a kind forces every
//! exhaustive match over them, most importantly the agent's dispatcher, to
//! handle it

use std::fmt::{Display, Formatter, Result as FmtResult};

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
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------
// | Identifiers |
// ---------------

/// The identifier of a proving job, opaque to the agent
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvingJobId(String);

impl ProvingJobId {
    /// Generate a fresh random identifier
    pub fn new_random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProvingJobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProvingJobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ProvingJobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// -------------
// | Job Types |
// -------------

/// A unit of proving work handed out by a job source
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvingJob {
    /// The identifier of the job
    ///
    /// A job source may reissue the same id if it considers the job lost
    pub id: ProvingJobId,
    /// The circuit to prove and its inputs
    pub request: ProvingRequest,
}

impl ProvingJob {
    /// Create a job with a freshly generated id
    pub fn new(request: ProvingRequest) -> Self {
        Self { id: ProvingJobId::new_random(), request }
    }

    /// Create a job with a caller chosen id
    pub fn with_id<I: Into<ProvingJobId>>(id: I, request: ProvingRequest) -> Self {
        Self { id: id.into(), request }
    }

    /// The kind of the job's request
    pub fn request_type(&self) -> ProvingRequestType {
        self.request.request_type()
    }
}

/// The circuit to prove, parameterized by its inputs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum ProvingRequest {
    /// Prove a public function's execution in the AVM
    PublicVm {
        /// The AVM circuit inputs
        inputs: AvmCircuitInputs,
    },
    /// Prove a setup, app logic or teardown public kernel
    PublicKernelNonTail {
        /// The kernel phase and its inputs
        inputs: PublicKernelNonTailRequest,
    },
    /// Prove the public kernel tail
    PublicKernelTail {
        /// The tail kernel's inputs
        inputs: PublicKernelTailRequest,
    },
    /// Prove the base rollup of a single transaction
    BaseRollup {
        /// The base rollup inputs
        inputs: BaseRollupInputs,
    },
    /// Merge two rollup proofs into one
    MergeRollup {
        /// The outputs of the two children
        inputs: MergeRollupInputs,
    },
    /// Prove the root of a block's rollup tree
    BlockRootRollup {
        /// The block root inputs
        inputs: BlockRootRollupInputs,
    },
    /// Merge two block proofs into one
    BlockMergeRollup {
        /// The block merge inputs
        inputs: BlockMergeRollupInputs,
    },
    /// Prove the root of an epoch
    RootRollup {
        /// The root rollup inputs
        inputs: RootRollupInputs,
    },
    /// Prove a base parity circuit over a slice of L1 to L2 messages
    BaseParity {
        /// The base parity inputs
        inputs: BaseParityInputs,
    },
    /// Prove the root parity circuit over all base parity outputs
    RootParity {
        /// The root parity inputs
        inputs: RootParityInputs,
    },
    /// Prove an empty private kernel, used to build padding transactions
    PrivateKernelEmpty {
        /// The empty kernel inputs
        inputs: PrivateKernelEmptyInputs,
    },
    /// Prove the tube circuit for a client proof
    TubeProof {
        /// The tube inputs
        inputs: TubeInputs,
    },
}

impl ProvingRequest {
    /// The kind of this request
    pub fn request_type(&self) -> ProvingRequestType {
        match self {
            Self::PublicVm { .. } => ProvingRequestType::PublicVm,
            Self::PublicKernelNonTail { .. } => ProvingRequestType::PublicKernelNonTail,
            Self::PublicKernelTail { .. } => ProvingRequestType::PublicKernelTail,
            Self::BaseRollup { .. } => ProvingRequestType::BaseRollup,
            Self::MergeRollup { .. } => ProvingRequestType::MergeRollup,
            Self::BlockRootRollup { .. } => ProvingRequestType::BlockRootRollup,
            Self::BlockMergeRollup { .. } => ProvingRequestType::BlockMergeRollup,
            Self::RootRollup { .. } => ProvingRequestType::RootRollup,
            Self::BaseParity { .. } => ProvingRequestType::BaseParity,
            Self::RootParity { .. } => ProvingRequestType::RootParity,
            Self::PrivateKernelEmpty { .. } => ProvingRequestType::PrivateKernelEmpty,
            Self::TubeProof { .. } => ProvingRequestType::TubeProof,
        }
    }
}

/// The kind of a proving request, without its payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProvingRequestType {
    /// See [`ProvingRequest::PublicVm`]
    PublicVm,
    /// See [`ProvingRequest::PublicKernelNonTail`]
    PublicKernelNonTail,
    /// See [`ProvingRequest::PublicKernelTail`]
    PublicKernelTail,
    /// See [`ProvingRequest::BaseRollup`]
    BaseRollup,
    /// See [`ProvingRequest::MergeRollup`]
    MergeRollup,
    /// See [`ProvingRequest::BlockRootRollup`]
    BlockRootRollup,
    /// See [`ProvingRequest::BlockMergeRollup`]
    BlockMergeRollup,
    /// See [`ProvingRequest::RootRollup`]
    RootRollup,
    /// See [`ProvingRequest::BaseParity`]
    BaseParity,
    /// See [`ProvingRequest::RootParity`]
    RootParity,
    /// See [`ProvingRequest::PrivateKernelEmpty`]
    PrivateKernelEmpty,
    /// See [`ProvingRequest::TubeProof`]
    TubeProof,
}

impl ProvingRequestType {
    /// Every request kind
    pub const ALL: [ProvingRequestType; 12] = [
        Self::PublicVm,
        Self::PublicKernelNonTail,
        Self::PublicKernelTail,
        Self::BaseRollup,
        Self::MergeRollup,
        Self::BlockRootRollup,
        Self::BlockMergeRollup,
        Self::RootRollup,
        Self::BaseParity,
        Self::RootParity,
        Self::PrivateKernelEmpty,
        Self::TubeProof,
    ];

    /// The name of the kind, as used in logs and metric tags
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicVm => "PUBLIC_VM",
            Self::PublicKernelNonTail => "PUBLIC_KERNEL_NON_TAIL",
            Self::PublicKernelTail => "PUBLIC_KERNEL_TAIL",
            Self::BaseRollup => "BASE_ROLLUP",
            Self::MergeRollup => "MERGE_ROLLUP",
            Self::BlockRootRollup => "BLOCK_ROOT_ROLLUP",
            Self::BlockMergeRollup => "BLOCK_MERGE_ROLLUP",
            Self::RootRollup => "ROOT_ROLLUP",
            Self::BaseParity => "BASE_PARITY",
            Self::RootParity => "ROOT_PARITY",
            Self::PrivateKernelEmpty => "PRIVATE_KERNEL_EMPTY",
            Self::TubeProof => "TUBE_PROOF",
        }
    }
}

impl Display for ProvingRequestType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

// ---------------
// | Job Results |
// ---------------

/// The output of a successfully proven job, one variant per request kind
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum ProvingJobResult {
    /// The AVM proof of a public function
    PublicVm(ProofAndVerificationKey),
    /// A non-tail public kernel proof
    PublicKernelNonTail(PublicInputsAndRecursiveProof<PublicKernelCircuitPublicInputs>),
    /// The public kernel tail proof
    PublicKernelTail(PublicInputsAndRecursiveProof<KernelCircuitPublicInputs>),
    /// A base rollup proof
    BaseRollup(PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs>),
    /// A merge rollup proof
    MergeRollup(PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs>),
    /// A block root rollup proof
    BlockRootRollup(PublicInputsAndRecursiveProof<BlockRootOrBlockMergePublicInputs>),
    /// A block merge rollup proof
    BlockMergeRollup(PublicInputsAndRecursiveProof<BlockRootOrBlockMergePublicInputs>),
    /// A root rollup proof
    RootRollup(PublicInputsAndRecursiveProof<RootRollupPublicInputs>),
    /// A base parity proof
    BaseParity(RootParityInput),
    /// A root parity proof
    RootParity(RootParityInput),
    /// An empty private kernel proof
    PrivateKernelEmpty(PublicInputsAndRecursiveProof<KernelCircuitPublicInputs>),
    /// A tube proof
    TubeProof(ProofAndVerificationKey),
}

impl ProvingJobResult {
    /// The kind of request that produced this result
    pub fn request_type(&self) -> ProvingRequestType {
        match self {
            Self::PublicVm(_) => ProvingRequestType::PublicVm,
            Self::PublicKernelNonTail(_) => ProvingRequestType::PublicKernelNonTail,
            Self::PublicKernelTail(_) => ProvingRequestType::PublicKernelTail,
            Self::BaseRollup(_) => ProvingRequestType::BaseRollup,
            Self::MergeRollup(_) => ProvingRequestType::MergeRollup,
            Self::BlockRootRollup(_) => ProvingRequestType::BlockRootRollup,
            Self::BlockMergeRollup(_) => ProvingRequestType::BlockMergeRollup,
            Self::RootRollup(_) => ProvingRequestType::RootRollup,
            Self::BaseParity(_) => ProvingRequestType::BaseParity,
            Self::RootParity(_) => ProvingRequestType::RootParity,
            Self::PrivateKernelEmpty(_) => ProvingRequestType::PrivateKernelEmpty,
            Self::TubeProof(_) => ProvingRequestType::TubeProof,
        }
    }
}
