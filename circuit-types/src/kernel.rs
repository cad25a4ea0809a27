//! Kernel circuit classification

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

/// The phase of public execution a public kernel circuit proves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublicKernelType {
    /// The transaction has no public component
    NonPublic,
    /// The non-revertible setup phase
    Setup,
    /// The revertible app logic phase
    AppLogic,
    /// The teardown phase, run after app logic regardless of revert
    Teardown,
    /// The tail circuit which finalizes the transaction's public outputs
    Tail,
}

impl PublicKernelType {
    /// Whether the kernel is the tail circuit
    pub fn is_tail(&self) -> bool {
        matches!(self, Self::Tail)
    }
}

impl Display for PublicKernelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::NonPublic => "non-public",
            Self::Setup => "setup",
            Self::AppLogic => "app-logic",
            Self::Teardown => "teardown",
            Self::Tail => "tail",
        };
        write!(f, "{name}")
    }
}
