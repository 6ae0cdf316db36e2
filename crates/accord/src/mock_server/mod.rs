//! Mock server: serves a pact's HTTP interactions to consumer tests and
//! reduces what it saw to one verdict.
//!
//! This module provides:
//! - `MockServer`: one serving session with an `Idle -> Starting -> Running -> Stopped` lifecycle
//! - `run_test`: run a consumer test against a fresh server
//! - `MockServerConfig`: bind address, TLS, grace period, timeout and seed
//!
//! Each server binds its own port. Concurrent requests are matched one at a
//! time against the pool of unfulfilled interactions.
//!
//! ## Module Structure
//!
//! - `config`: `MockServerConfig` and `TlsConfig`
//! - `state`: session bookkeeping and best-candidate selection
//! - `handler`: per-request conversion, matching and diagnostics
//! - `server`: lifecycle, accept loop and graceful drain
//! - `tls`: TLS acceptor from PEM files

mod config;
mod handler;
mod server;
mod state;
mod tls;


pub use config::{MockServerConfig, TlsConfig};
pub use handler::{BOOTCHECK_HEADER, UNEXPECTED_REQUEST_HEADER};
pub use server::{run_test, MockServer, MockServerError, MockServerStatus};
#[allow(unused_imports)]
pub use state::{ExpectedInteraction, MatchOutcome, SessionState};
