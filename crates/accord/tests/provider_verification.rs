//! Provider-side tests: verify pacts against live HTTP providers.

use accord::generators::Generator;
use accord::matchingrules::{Category, MatchingRule};
use accord::mock_server::{MockServer, MockServerConfig};
use accord::model::{HttpInteraction, HttpRequest, HttpResponse, ProviderState};
use accord::verifier::{HttpProviderClient, HttpStateChangeHandler, ProviderVerifier};
use accord::{FailureCause, Pact};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(5);

/// A provider that owns order 42 and records every state change call.
async fn spawn_order_service(calls: Arc<Mutex<Vec<Value>>>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let calls = calls.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let calls = calls.clone();
                    async move {
                        let path = req.uri().path().to_string();
                        let body = req.into_body().collect().await.unwrap().to_bytes();
                        let (status, reply) = match path.as_str() {
                            "/_state" => {
                                let call: Value = serde_json::from_slice(&body).unwrap();
                                calls.lock().push(call);
                                (200, json!({"orderId": 42}))
                            }
                            "/orders/42" => (200, json!({"id": 42, "total": 19.99})),
                            _ => (404, json!({"error": "not found"})),
                        };
                        let response = Response::builder()
                            .status(status)
                            .header("Content-Type", "application/json")
                            .body(Full::new(Bytes::from(reply.to_string())))
                            .unwrap();
                        Ok::<_, Infallible>(response)
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    addr
}

fn order_interaction() -> HttpInteraction {
    HttpInteraction::new(
        "get order",
        HttpRequest::new("GET", "/orders/1")
            .with_generator(
                Category::Path,
                "",
                Generator::ProviderStateValue {
                    expression: "/orders/${orderId}".into(),
                },
            )
            .unwrap(),
        HttpResponse::new(200)
            .with_json_body(json!({"id": 1, "total": 1.5}))
            .with_rule(Category::Body, "$.id", MatchingRule::Integer)
            .unwrap()
            .with_rule(Category::Body, "$.total", MatchingRule::Decimal)
            .unwrap(),
    )
    .given(ProviderState::new("an order exists").with_param("customer", json!("ann")))
}

#[tokio::test]
async fn test_state_change_values_reach_the_request() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let addr = spawn_order_service(calls.clone()).await;
    let base = format!("http://{addr}");

    let states = HttpStateChangeHandler::new(format!("{base}/_state"), TIMEOUT)
        .unwrap()
        .with_teardown(true);
    let verifier = ProviderVerifier::new(Arc::new(HttpProviderClient::new(&base, TIMEOUT).unwrap()))
        .with_state_handler(Arc::new(states));
    let pact = Pact::new("checkout", "orders").with_interaction(order_interaction());

    let report = verifier.verify(&pact).await;
    assert!(report.is_success(), "{:#?}", report);

    let calls = calls.lock();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0],
        json!({"state": "an order exists", "params": {"customer": "ann"}, "action": "setup"})
    );
    assert_eq!(calls[1]["action"], "teardown");
}

#[tokio::test]
async fn test_verify_against_a_mock_server_provider() {
    // The provider stand-in serves slightly different data than the consumer
    // expects; the type rules make both interactions pass.
    let provider_pact = Pact::new("stub", "users")
        .with_interaction(HttpInteraction::new(
            "get user",
            HttpRequest::new("GET", "/users/7"),
            HttpResponse::new(200).with_json_body(json!({"id": 7, "name": "zed", "tags": ["a", "b"]})),
        ))
        .with_interaction(HttpInteraction::new(
            "delete user",
            HttpRequest::new("DELETE", "/users/7"),
            HttpResponse::new(204),
        ));
    let mut provider = MockServer::new(provider_pact, MockServerConfig::default());
    provider.start().await.unwrap();
    let base = provider.url().unwrap();

    let consumer_pact = Pact::new("web", "users")
        .with_interaction(HttpInteraction::new(
            "get user",
            HttpRequest::new("GET", "/users/7"),
            HttpResponse::new(200)
                .with_json_body(json!({"id": 1, "name": "ann", "tags": ["x"]}))
                .with_rule(Category::Body, "$.id", MatchingRule::Integer)
                .unwrap()
                .with_rule(Category::Body, "$.name", MatchingRule::Type)
                .unwrap()
                .with_rule(Category::Body, "$.tags", MatchingRule::MinType(1))
                .unwrap(),
        ))
        .with_interaction(HttpInteraction::new(
            "delete user",
            HttpRequest::new("DELETE", "/users/7"),
            HttpResponse::new(204),
        ));

    let client = HttpProviderClient::new(&base, TIMEOUT).unwrap();
    let report = ProviderVerifier::new(Arc::new(client)).verify(&consumer_pact).await;
    assert!(report.is_success(), "{:#?}", report);
    assert_eq!(report.passed(), 2);

    assert!(provider.stop().await.is_ok());
}

#[tokio::test]
async fn test_provider_drift_is_reported_per_interaction() {
    let provider_pact = Pact::new("stub", "users").with_interaction(HttpInteraction::new(
        "get user",
        HttpRequest::new("GET", "/users/7"),
        HttpResponse::new(200).with_json_body(json!({"id": "7", "name": "zed"})),
    ));
    let mut provider = MockServer::new(provider_pact, MockServerConfig::default());
    provider.start().await.unwrap();
    let base = provider.url().unwrap();

    let consumer_pact = Pact::new("web", "users").with_interaction(HttpInteraction::new(
        "get user",
        HttpRequest::new("GET", "/users/7"),
        HttpResponse::new(200)
            .with_json_body(json!({"id": 1, "name": "ann"}))
            .with_rule(Category::Body, "$.id", MatchingRule::Integer)
            .unwrap()
            .with_rule(Category::Body, "$.name", MatchingRule::Type)
            .unwrap(),
    ));

    let client = HttpProviderClient::new(&base, TIMEOUT).unwrap();
    let report = ProviderVerifier::new(Arc::new(client)).verify(&consumer_pact).await;
    provider.stop().await;

    let mismatches = report.results[0].result.mismatches();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].path, "$.id");
}

#[tokio::test]
async fn test_unreachable_provider_is_a_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = HttpProviderClient::new(format!("http://127.0.0.1:{port}"), TIMEOUT).unwrap();
    let pact = Pact::new("web", "users").with_interaction(HttpInteraction::new(
        "health",
        HttpRequest::new("GET", "/health"),
        HttpResponse::new(200),
    ));

    let report = ProviderVerifier::new(Arc::new(client)).verify(&pact).await;
    assert!(matches!(
        report.results[0].result.cause(),
        Some(FailureCause::Transport(_))
    ));
}
