//! MockServer - lifecycle of one mock serving session.
//!
//! `Idle -> Starting -> Running -> Stopped(verdict)`. Starting binds the
//! listener and applies generators to every HTTP interaction; stopping
//! closes the listener, drains open connections for the grace period and
//! folds the session into a `VerificationResult`.

use super::config::MockServerConfig;
use super::handler::handle_request;
use super::state::{ExpectedInteraction, SessionState};
use super::tls::create_tls_acceptor;
use crate::generators::{
    generate_request_with_rng, generate_response_with_rng, GeneratorContext, GeneratorError,
};
use crate::model::Pact;
use crate::verification::{FailureCause, MockServerState, VerificationResult};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum MockServerError {
    #[error("Failed to bind {address}: {reason}")]
    BindError { address: String, reason: String },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Generator failed for interaction '{description}': {source}")]
    Generator {
        description: String,
        #[source]
        source: GeneratorError,
    },

    #[error("Mock server is {actual}, expected {expected}")]
    InvalidState {
        actual: &'static str,
        expected: &'static str,
    },
}

impl MockServerError {
    /// The session verdict for a server that never reached `Running`.
    pub fn to_result(&self) -> VerificationResult {
        let cause = match self {
            MockServerError::Generator { .. } => FailureCause::Generator(self.to_string()),
            _ => FailureCause::Setup(self.to_string()),
        };
        VerificationResult::error(cause)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockServerStatus {
    Idle,
    Starting,
    Running,
    Stopped(VerificationResult),
}

impl MockServerStatus {
    pub fn name(&self) -> &'static str {
        match self {
            MockServerStatus::Idle => "idle",
            MockServerStatus::Starting => "starting",
            MockServerStatus::Running => "running",
            MockServerStatus::Stopped(_) => "stopped",
        }
    }
}

impl fmt::Display for MockServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct MockServer {
    pact: Pact,
    config: MockServerConfig,
    status: MockServerStatus,
    state: Option<Arc<SessionState>>,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    server_task: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn new(pact: Pact, config: MockServerConfig) -> Self {
        Self {
            pact,
            config,
            status: MockServerStatus::Idle,
            state: None,
            local_addr: None,
            shutdown_tx: None,
            server_task: None,
        }
    }

    pub fn status(&self) -> &MockServerStatus {
        &self.status
    }

    pub fn port(&self) -> Option<u16> {
        self.local_addr.map(|addr| addr.port())
    }

    /// Base URL clients should use, once the listener is bound.
    pub fn url(&self) -> Option<String> {
        self.local_addr
            .map(|addr| base_url(self.config.scheme(), addr))
    }

    /// What the session has seen so far.
    pub fn session_state(&self) -> MockServerState {
        self.state
            .as_ref()
            .map(|state| state.snapshot())
            .unwrap_or_default()
    }

    pub async fn start(&mut self) -> Result<SocketAddr, MockServerError> {
        if self.status != MockServerStatus::Idle {
            return Err(MockServerError::InvalidState {
                actual: self.status.name(),
                expected: "idle",
            });
        }
        self.status = MockServerStatus::Starting;
        match self.launch().await {
            Ok(addr) => {
                self.status = MockServerStatus::Running;
                Ok(addr)
            }
            Err(e) => {
                error!("Mock server for {} failed to start: {}", self.pact.provider, e);
                self.status = MockServerStatus::Stopped(e.to_result());
                Err(e)
            }
        }
    }

    async fn launch(&mut self) -> Result<SocketAddr, MockServerError> {
        let tls = self
            .config
            .tls
            .as_ref()
            .map(create_tls_acceptor)
            .transpose()
            .map_err(|e| MockServerError::Tls(e.to_string()))?;

        let host = self.config.host.as_str();
        let port = self.config.port;
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| MockServerError::BindError {
                address: format!("{host}:{port}"),
                reason: e.to_string(),
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| MockServerError::BindError {
                address: format!("{host}:{port}"),
                reason: e.to_string(),
            })?;

        let ctx = GeneratorContext::consumer()
            .with_seed(self.config.seed)
            .with_mock_server_url(base_url(self.config.scheme(), local_addr));
        let mut rng = ctx.rng();
        let mut expected = Vec::new();
        for interaction in self.pact.http_interactions() {
            let generator_error = |source: GeneratorError| MockServerError::Generator {
                description: interaction.description.clone(),
                source,
            };
            let request = generate_request_with_rng(&interaction.request, &ctx, &mut rng)
                .map_err(generator_error)?;
            let response = generate_response_with_rng(&interaction.response, &ctx, &mut rng)
                .map_err(generator_error)?;
            expected.push(ExpectedInteraction {
                description: interaction.description.clone(),
                request,
                response,
            });
        }
        let messages = self.pact.message_interactions().count();
        if messages > 0 {
            debug!("Mock server ignores {} message interaction(s)", messages);
        }

        let state = Arc::new(SessionState::new(expected));
        let (shutdown_tx, _) = broadcast::channel(1);
        let task = tokio::spawn(accept_loop(
            listener,
            tls,
            Arc::clone(&state),
            shutdown_tx.clone(),
            self.config.grace_period(),
        ));

        info!(
            "Mock server for {} -> {} listening on {}",
            self.pact.consumer,
            self.pact.provider,
            base_url(self.config.scheme(), local_addr)
        );
        self.state = Some(state);
        self.local_addr = Some(local_addr);
        self.shutdown_tx = Some(shutdown_tx);
        self.server_task = Some(task);
        Ok(local_addr)
    }

    /// Stop serving and produce the session verdict. Calling it again
    /// returns the same verdict.
    pub async fn stop(&mut self) -> VerificationResult {
        match &self.status {
            MockServerStatus::Stopped(result) => return result.clone(),
            MockServerStatus::Idle | MockServerStatus::Starting => {
                let result = VerificationResult::error(FailureCause::Setup(
                    "mock server was never started".to_string(),
                ));
                self.status = MockServerStatus::Stopped(result.clone());
                return result;
            }
            MockServerStatus::Running => {}
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.server_task.take() {
            if let Err(e) = task.await {
                error!("Mock server task failed: {}", e);
            }
        }

        let result = self
            .state
            .as_ref()
            .map(|state| state.verdict())
            .unwrap_or(VerificationResult::Ok);
        info!(
            "Mock server for {} stopped: {}",
            self.pact.provider,
            if result.is_ok() { "OK" } else { "contract violated" }
        );
        self.status = MockServerStatus::Stopped(result.clone());
        result
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Run `test` against a fresh mock server for `pact` and fold its outcome
/// into one verdict.
///
/// A test error or timeout is reported as `TestFailed` or `TestTimedOut`
/// with the session state attached, so it stays distinguishable from a
/// contract violation.
pub async fn run_test<F, Fut, E>(
    pact: &Pact,
    config: MockServerConfig,
    test: F,
) -> VerificationResult
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    let timeout = config.session_timeout();
    let mut server = MockServer::new(pact.clone(), config);
    if let Err(e) = server.start().await {
        return e.to_result();
    }
    let Some(url) = server.url() else {
        return VerificationResult::error(FailureCause::Setup("mock server has no address".into()));
    };

    let test_failure = match timeout {
        Some(limit) => match tokio::time::timeout(limit, test(url)).await {
            Ok(outcome) => outcome.err().map(|e| FailureCause::TestFailed(e.to_string())),
            Err(_) => Some(FailureCause::TestTimedOut(limit.as_millis() as u64)),
        },
        None => test(url)
            .await
            .err()
            .map(|e| FailureCause::TestFailed(e.to_string())),
    };

    let verdict = server.stop().await;
    match test_failure {
        Some(cause) => {
            warn!("Consumer test failed: {}", cause);
            VerificationResult::Error {
                cause,
                mock_server_state: Some(server.session_state()),
            }
        }
        None => verdict,
    }
}

fn base_url(scheme: &str, addr: SocketAddr) -> String {
    let host = if addr.ip().is_unspecified() {
        "127.0.0.1".to_string()
    } else {
        addr.ip().to_string()
    };
    format!("{scheme}://{host}:{}", addr.port())
}

async fn accept_loop(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    state: Arc<SessionState>,
    shutdown_tx: broadcast::Sender<()>,
    grace_period: Duration,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    let mut connections = JoinSet::new();
    let port = listener.local_addr().map(|a| a.port()).unwrap_or_default();

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let state = Arc::clone(&state);
                        let conn_shutdown = shutdown_tx.subscribe();
                        let tls = tls.clone();
                        connections.spawn(async move {
                            match tls {
                                Some(acceptor) => match acceptor.accept(stream).await {
                                    Ok(stream) => serve_connection(stream, state, addr, conn_shutdown).await,
                                    Err(e) => debug!("TLS handshake with {} failed: {}", addr, e),
                                },
                                None => serve_connection(stream, state, addr, conn_shutdown).await,
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on port {}: {}", port, e);
                    }
                }
                while connections.try_join_next().is_some() {}
            }
            _ = shutdown_rx.recv() => {
                info!("Mock server on port {} shutting down", port);
                break;
            }
        }
    }
    drop(listener);

    let drained = tokio::time::timeout(grace_period, drain(&mut connections)).await;
    if drained.is_err() {
        warn!(
            "{} connection(s) on port {} still open after {:?}, aborting",
            connections.len(),
            port,
            grace_period
        );
        connections.abort_all();
        drain(&mut connections).await;
    }
}

async fn drain(connections: &mut JoinSet<()>) {
    while connections.join_next().await.is_some() {}
}

async fn serve_connection<S>(
    stream: S,
    state: Arc<SessionState>,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { handle_request(req, state, addr).await }
    });
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!("Connection error from {}: {}", addr, e);
            }
        }
        _ = shutdown_rx.recv() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.await {
                debug!("Connection error from {} during shutdown: {}", addr, e);
            }
        }
    }
}
