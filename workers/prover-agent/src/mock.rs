//! A mock proving backend for testing agents without generating proofs

use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use circuit_types::{
    inputs::{
        AvmCircuitInputs, BaseParityInputs, BaseRollupInputs, BlockMergeRollupInputs,
        BlockRootRollupInputs, MergeRollupInputs, PrivateKernelEmptyInputs,
        PublicKernelNonTailRequest, PublicKernelTailRequest, RootParityInputs, RootRollupInputs,
        TubeInputs,
    },
    proofs::{
        Proof, ProofAndVerificationKey, PublicInputsAndRecursiveProof, RecursiveProof,
        RootParityInput, VerificationKey,
    },
    public_inputs::{
        BaseOrMergeRollupPublicInputs, BlockRootOrBlockMergePublicInputs,
        KernelCircuitPublicInputs, ParityPublicInputs, PublicKernelCircuitPublicInputs,
        RootRollupPublicInputs,
    },
};
use job_types::{CircuitProverError, ProverResult, ProvingRequestType, ServerCircuitProver};

/// A backend that returns placeholder outputs tagged with a configurable byte
///
/// Records every call and the peak number of calls running at once
#[derive(Default)]
pub struct MockCircuitProver {
    /// The byte every output payload is filled with
    tag: u8,
    /// How long each call takes
    delay: Duration,
    /// Whether calls block their thread for the delay instead of yielding
    blocking: bool,
    /// The kinds whose calls return an error
    failing: HashSet<ProvingRequestType>,
    /// The kinds whose calls panic
    panicking: HashSet<ProvingRequestType>,
    /// The method name and kind of every call made, in order
    calls: Mutex<Vec<(&'static str, ProvingRequestType)>>,
    /// The number of calls currently running
    active: AtomicUsize,
    /// The largest number of calls running at once
    peak_active: AtomicUsize,
}

impl MockCircuitProver {
    /// Create a mock that returns immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill every output payload with `tag`
    pub fn with_tag(mut self, tag: u8) -> Self {
        self.tag = tag;
        self
    }

    /// Make every call take `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make every call block its thread for `delay`, as a CPU bound prover
    /// would
    pub fn with_blocking_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self.blocking = true;
        self
    }

    /// Make calls of the given kind fail
    pub fn failing(mut self, request_type: ProvingRequestType) -> Self {
        self.failing.insert(request_type);
        self
    }

    /// Make calls of the given kind panic
    pub fn panicking(mut self, request_type: ProvingRequestType) -> Self {
        self.panicking.insert(request_type);
        self
    }

    /// The number of calls made for the given kind
    pub fn calls(&self, request_type: ProvingRequestType) -> usize {
        self.calls.lock().unwrap().iter().filter(|(_, kind)| *kind == request_type).count()
    }

    /// The total number of calls made
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The distinct backend methods called so far, sorted by name
    pub fn called_methods(&self) -> Vec<&'static str> {
        let mut methods: Vec<_> = self.calls.lock().unwrap().iter().map(|(m, _)| *m).collect();
        methods.sort_unstable();
        methods.dedup();
        methods
    }

    /// The number of calls currently running
    pub fn num_active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// The largest number of calls that ran at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    /// Record a call, wait out the delay and produce the configured outcome
    async fn prove<T: Send>(
        &self,
        method: &'static str,
        request_type: ProvingRequestType,
        output: T,
    ) -> ProverResult<T> {
        self.calls.lock().unwrap().push((method, request_type));
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);

        if self.blocking {
            std::thread::sleep(self.delay);
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(&request_type) {
            panic!("mock prover panicked proving {request_type}");
        }

        if self.failing.contains(&request_type) {
            return Err(CircuitProverError::prover(format!("mock failure proving {request_type}")));
        }

        Ok(output)
    }

    /// A recursive proof output with tagged payloads
    fn recursive<T>(&self, inputs: T) -> PublicInputsAndRecursiveProof<T> {
        PublicInputsAndRecursiveProof::new(
            inputs,
            RecursiveProof::new(vec![self.tag]),
            VerificationKey::new(vec![self.tag]),
        )
    }

    /// A proof and verification key output with tagged payloads
    fn proof_and_vk(&self) -> ProofAndVerificationKey {
        ProofAndVerificationKey {
            proof: Proof::new(vec![self.tag]),
            verification_key: VerificationKey::new(vec![self.tag]),
        }
    }

    /// A tagged payload
    fn payload(&self) -> Vec<u8> {
        vec![self.tag]
    }

    /// A parity output with tagged payloads
    fn parity(&self) -> RootParityInput {
        self.recursive(ParityPublicInputs::new(self.payload()))
    }
}

#[async_trait]
impl ServerCircuitProver for MockCircuitProver {
    async fn get_avm_proof(
        &self,
        _inputs: AvmCircuitInputs,
    ) -> ProverResult<ProofAndVerificationKey> {
        self.prove("get_avm_proof", ProvingRequestType::PublicVm, self.proof_and_vk()).await
    }

    async fn get_public_kernel_proof(
        &self,
        _request: PublicKernelNonTailRequest,
    ) -> ProverResult<PublicInputsAndRecursiveProof<PublicKernelCircuitPublicInputs>> {
        let output = self.recursive(PublicKernelCircuitPublicInputs::new(self.payload()));
        self.prove("get_public_kernel_proof", ProvingRequestType::PublicKernelNonTail, output).await
    }

    async fn get_public_tail_proof(
        &self,
        _request: PublicKernelTailRequest,
    ) -> ProverResult<PublicInputsAndRecursiveProof<KernelCircuitPublicInputs>> {
        let output = self.recursive(KernelCircuitPublicInputs::new(self.payload()));
        self.prove("get_public_tail_proof", ProvingRequestType::PublicKernelTail, output).await
    }

    async fn get_base_rollup_proof(
        &self,
        _inputs: BaseRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs>> {
        let output = self.recursive(BaseOrMergeRollupPublicInputs::new(self.payload()));
        self.prove("get_base_rollup_proof", ProvingRequestType::BaseRollup, output).await
    }

    async fn get_merge_rollup_proof(
        &self,
        _inputs: MergeRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<BaseOrMergeRollupPublicInputs>> {
        let output = self.recursive(BaseOrMergeRollupPublicInputs::new(self.payload()));
        self.prove("get_merge_rollup_proof", ProvingRequestType::MergeRollup, output).await
    }

    async fn get_block_root_rollup_proof(
        &self,
        _inputs: BlockRootRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<BlockRootOrBlockMergePublicInputs>> {
        let output = self.recursive(BlockRootOrBlockMergePublicInputs::new(self.payload()));
        self.prove("get_block_root_rollup_proof", ProvingRequestType::BlockRootRollup, output).await
    }

    async fn get_block_merge_rollup_proof(
        &self,
        _inputs: BlockMergeRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<BlockRootOrBlockMergePublicInputs>> {
        let output = self.recursive(BlockRootOrBlockMergePublicInputs::new(self.payload()));
        self.prove("get_block_merge_rollup_proof", ProvingRequestType::BlockMergeRollup, output)
            .await
    }

    async fn get_root_rollup_proof(
        &self,
        _inputs: RootRollupInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<RootRollupPublicInputs>> {
        let output = self.recursive(RootRollupPublicInputs::new(self.payload()));
        self.prove("get_root_rollup_proof", ProvingRequestType::RootRollup, output).await
    }

    async fn get_base_parity_proof(
        &self,
        _inputs: BaseParityInputs,
    ) -> ProverResult<RootParityInput> {
        self.prove("get_base_parity_proof", ProvingRequestType::BaseParity, self.parity()).await
    }

    async fn get_root_parity_proof(
        &self,
        _inputs: RootParityInputs,
    ) -> ProverResult<RootParityInput> {
        self.prove("get_root_parity_proof", ProvingRequestType::RootParity, self.parity()).await
    }

    async fn get_empty_private_kernel_proof(
        &self,
        _inputs: PrivateKernelEmptyInputs,
    ) -> ProverResult<PublicInputsAndRecursiveProof<KernelCircuitPublicInputs>> {
        let output = self.recursive(KernelCircuitPublicInputs::new(self.payload()));
        self.prove("get_empty_private_kernel_proof", ProvingRequestType::PrivateKernelEmpty, output)
            .await
    }

    async fn get_tube_proof(&self, _inputs: TubeInputs) -> ProverResult<ProofAndVerificationKey> {
        self.prove("get_tube_proof", ProvingRequestType::TubeProof, self.proof_and_vk()).await
    }
}
