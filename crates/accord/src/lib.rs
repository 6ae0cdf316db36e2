// Library exports for the binaries, integration tests and benchmarks

// ===== Contract model =====
pub mod matchingrules;
pub mod model;

// ===== Engines shared by both sides =====
pub mod generators;
pub mod matching;
pub mod verification;

// ===== Consumer side =====
pub mod mock_server;

// ===== Provider side =====
pub mod verifier;

pub mod config;

// Don't export internal modules
mod time_format;

pub use matching::{Mismatch, MismatchKind};
pub use model::{Interaction, Pact, PactSpecVersion};
pub use verification::{FailureCause, MockServerState, VerificationResult};
