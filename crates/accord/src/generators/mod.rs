//! Generator engine: synthesizes dynamic values into an expectation before it
//! is served by the mock server or sent to a provider.
//!
//! Generators are keyed the same way as matching rules. Random generators draw
//! from the context's RNG, so a fixed seed gives reproducible fixtures.
//!
//! ## Module Structure
//!
//! - `generator`: the `Generator` vocabulary and `GeneratorError`
//! - `context`: `GeneratorContext` and `GeneratorMode`
//! - `date_expression`: relative date expressions (`tomorrow + 2 hours`)
//! - `collection`: `Generators` keyed by category, and their pact JSON form
//! - `apply`: concrete requests, responses and messages

mod apply;
mod collection;
mod context;
mod date_expression;
mod generator;

#[allow(unused_imports)]
pub use apply::{
    generate_message, generate_request, generate_request_with_rng, generate_response,
    generate_response_with_rng,
};
pub use collection::{GeneratorEntry, Generators};
pub use context::{GeneratorContext, GeneratorMode};
pub use generator::{Generator, GeneratorError, UuidFormat};
