//! The leader gate (C7): at most one writer cluster-wide, implemented
//! directly atop a Kubernetes `Lease` object.

pub mod error;
pub mod gate;

pub use error::LeaderError;
pub use gate::{generate_identity, LeaderGate};
