//! Groups the circuit input and output types the proving pipeline moves
//! between job sources, agents and proving backends
//!
//! The scheduler never looks inside a witness or a set of public inputs, so
//! most types here wrap a serialized payload. The few structured types are the
//! ones the block proving state assembles itself: merge rollup inputs, block
//! root rollup inputs and root parity inputs
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]
#![deny(clippy::needless_pass_by_value)]

pub mod block;
pub mod inputs;
pub mod kernel;
pub mod proofs;
pub mod public_inputs;

// -------------
// | Constants |
// -------------

/// The number of bytes in a serialized field element
pub const FIELD_BYTES: usize = 32;

/// A serialized field element of the proof system's scalar field
pub type Fr = [u8; FIELD_BYTES];

/// Defines a circuit type whose contents are opaque to the scheduler
///
/// The payload is the serialized form produced and consumed by the proving
/// backend
macro_rules! opaque_circuit_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            /// The serialized payload
            pub data: Vec<u8>,
        }

        impl $name {
            /// Wrap a serialized payload
            pub fn new(data: Vec<u8>) -> Self {
                Self { data }
            }
        }
    };
}
pub(crate) use opaque_circuit_type;
