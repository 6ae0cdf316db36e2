//! Value model: requests, responses, messages, interactions and the pact
//! document that groups them.
//!
//! Expectations and live traffic share these types. An expectation carries its
//! matching rules and generators; live traffic leaves them empty.
//!
//! ## Module Structure
//!
//! - `multimap`: ordered multi-value maps for headers and query parameters
//! - `content_type`: media type parsing and byte sniffing
//! - `body`: `OptionalBody`
//! - `http`: `HttpRequest`, `HttpResponse`
//! - `message`: asynchronous `Message`
//! - `interaction`: interactions and provider states
//! - `pact`: the `Pact` document, spec versions and merging
//! - `json`: reading and writing pact JSON for V1 to V4

mod body;
mod content_type;
mod http;
mod interaction;
mod json;
mod message;
mod multimap;
mod pact;


pub use body::OptionalBody;
pub use content_type::{detect_content_type, ContentType};
pub use http::{HttpRequest, HttpResponse};
pub use interaction::{HttpInteraction, Interaction, MessageInteraction, ProviderState};
pub use message::Message;
pub use multimap::MultiValueMap;
pub use pact::{Pact, PactError, PactSpecVersion};
