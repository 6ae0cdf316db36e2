//! Provider verification: replay each interaction of a pact against the real
//! provider and compare what comes back.
//!
//! The provider is reached through the `ProviderClient` trait, so the same
//! verifier drives a network service or an in-process dispatcher. Provider
//! states are set up through a `ProviderStateHandler` before each interaction
//! and the values they bind feed the provider state generators.
//!
//! ## Module Structure
//!
//! - `client`: `ProviderClient`, the reqwest-backed `HttpProviderClient` and `TransportError`
//! - `state_change`: `ProviderStateHandler` and its no-op and HTTP implementations
//! - `message`: `MessageProducer` for message interactions
//! - `provider`: `ProviderVerifier` and `VerifierOptions`
//! - `report`: `InteractionResult` and `VerificationReport`

mod client;
mod message;
mod provider;
mod report;
mod state_change;


pub use client::{HttpProviderClient, ProviderClient, TransportError};
pub use message::MessageProducer;
pub use provider::{ProviderVerifier, VerifierOptions};
pub use report::{InteractionResult, VerificationReport};
#[allow(unused_imports)]
pub use state_change::{
    HttpStateChangeHandler, NoopStateHandler, ProviderStateHandler, StateChangeAction,
    StateChangeError,
};
