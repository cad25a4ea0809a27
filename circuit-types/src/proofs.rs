//! Proof and verification key types produced by proving backends

use serde::{Deserialize, Serialize};

use crate::{opaque_circuit_type, public_inputs::ParityPublicInputs};

opaque_circuit_type!(
    /// A proof that is verified inside another circuit
    RecursiveProof
);
opaque_circuit_type!(
    /// A verification key, in the form consumed by a recursive verifier
    VerificationKey
);
opaque_circuit_type!(
    /// A proof verified outside the circuit stack, e.g. the final block proof
    Proof
);
opaque_circuit_type!(
    /// The accumulated pairing points of a recursive proof, deferred for
    /// verification outside the circuit
    AggregationObject
);

/// The output of a circuit whose proof is recursively verified by the next
/// circuit in the pipeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputsAndRecursiveProof<T> {
    /// The circuit's public inputs
    pub inputs: T,
    /// The proof of the circuit
    pub proof: RecursiveProof,
    /// The verification key that verifies `proof`
    pub verification_key: VerificationKey,
}

impl<T> PublicInputsAndRecursiveProof<T> {
    /// Constructor
    pub fn new(inputs: T, proof: RecursiveProof, verification_key: VerificationKey) -> Self {
        Self { inputs, proof, verification_key }
    }
}

/// A proof paired with its verification key, for circuits without public
/// inputs tracked by the scheduler
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofAndVerificationKey {
    /// The proof
    pub proof: Proof,
    /// The verification key
    pub verification_key: VerificationKey,
}

/// The output of a parity circuit, consumed by the root parity or block root
/// rollup circuit
pub type RootParityInput = PublicInputsAndRecursiveProof<ParityPublicInputs>;
