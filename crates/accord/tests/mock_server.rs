//! Consumer-side tests driving a live mock server over HTTP.

use accord::mock_server::{run_test, MockServer, MockServerConfig, UNEXPECTED_REQUEST_HEADER};
use accord::model::{HttpInteraction, HttpRequest, HttpResponse};
use accord::{FailureCause, Pact, VerificationResult};
use assert_json_diff::assert_json_include;
use serde_json::{json, Value};
use std::time::Duration;

const ORDERS_PACT: &str = r#"{
  "consumer": {"name": "checkout"},
  "provider": {"name": "orders"},
  "interactions": [
    {
      "description": "list open orders",
      "request": {
        "method": "GET",
        "path": "/orders",
        "query": {"status": ["open"]},
        "headers": {"Accept": "application/json"}
      },
      "response": {
        "status": 200,
        "headers": {"Content-Type": "application/json"},
        "body": [{"id": 1, "status": "open"}],
        "matchingRules": {
          "body": {
            "$": {"matchers": [{"match": "type", "min": 1}]},
            "$[*].id": {"matchers": [{"match": "integer"}]}
          }
        }
      }
    },
    {
      "description": "create an order",
      "request": {
        "method": "POST",
        "path": "/orders",
        "headers": {"Content-Type": "application/json"},
        "body": {"sku": "A-1", "quantity": 2},
        "matchingRules": {
          "body": {"$.quantity": {"matchers": [{"match": "integer"}]}}
        }
      },
      "response": {
        "status": 201,
        "headers": {"Content-Type": "application/json"},
        "body": {"id": 100, "sku": "A-1", "reference": "ref"},
        "generators": {
          "body": {
            "$.id": {"type": "RandomInt", "min": 1000, "max": 1999},
            "$.reference": {"type": "Uuid"}
          }
        }
      }
    }
  ],
  "metadata": {"pactSpecification": {"version": "3.0.0"}}
}"#;

fn orders_pact() -> Pact {
    Pact::parse(ORDERS_PACT).unwrap()
}

#[tokio::test]
async fn test_consumer_session_passes() {
    let result = run_test(&orders_pact(), MockServerConfig::default(), |url| async move {
        let client = reqwest::Client::new();

        let listed: Value = client
            .get(format!("{url}/orders?status=open"))
            .header("Accept", "application/json")
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(listed, json!([{"id": 1, "status": "open"}]));

        let created = client
            .post(format!("{url}/orders"))
            .json(&json!({"sku": "A-1", "quantity": 7}))
            .send()
            .await?;
        assert_eq!(created.status(), 201);
        let body: Value = created.json().await?;
        assert_json_include!(actual: body.clone(), expected: json!({"sku": "A-1"}));
        let id = body["id"].as_i64().unwrap_or_default();
        assert!((1000..=1999).contains(&id), "generated id {id}");
        assert_eq!(body["reference"].as_str().map(str::len), Some(36));
        Ok::<_, reqwest::Error>(())
    })
    .await;

    assert_eq!(result, VerificationResult::Ok);
}

#[tokio::test]
async fn test_concurrent_requests_are_each_served_once() {
    let mut server = MockServer::new(orders_pact(), MockServerConfig::default());
    server.start().await.unwrap();
    let url = server.url().unwrap();
    let client = reqwest::Client::new();

    let requests = (0..4).map(|_| {
        client
            .get(format!("{url}/orders?status=open"))
            .header("Accept", "application/json")
            .send()
    });
    let responses = futures::future::join_all(requests).await;
    let statuses: Vec<u16> = responses
        .into_iter()
        .map(|r| r.unwrap().status().as_u16())
        .collect();

    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 500).count(), 3);

    let result = server.stop().await;
    let state = result.mock_server_state().unwrap();
    assert_eq!(state.unexpected.len(), 3);
    assert_eq!(state.missing.len(), 1);
    assert_eq!(state.missing[0].description, "create an order");
}

#[tokio::test]
async fn test_mismatched_body_is_reported_with_diagnostics() {
    let mut server = MockServer::new(orders_pact(), MockServerConfig::default());
    server.start().await.unwrap();
    let url = server.url().unwrap();

    let response = reqwest::Client::new()
        .post(format!("{url}/orders"))
        .json(&json!({"sku": "B-2", "quantity": "two"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert!(response.headers().contains_key(UNEXPECTED_REQUEST_HEADER));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["request"]["method"], "POST");
    assert_eq!(body["request"]["path"], "/orders");
    let mismatches = body["mismatches"].as_array().cloned().unwrap_or_default();
    assert!(mismatches.len() >= 2, "{mismatches:?}");

    let result = server.stop().await;
    assert_eq!(result.cause(), Some(&FailureCause::ContractViolation));
    let state = result.mock_server_state().unwrap();
    assert_eq!(state.mismatched.len(), 1);
    assert_eq!(state.mismatched[0].description, "create an order");
    assert!(state.unexpected.is_empty());
}

#[tokio::test]
async fn test_seeded_sessions_generate_the_same_values() {
    async fn created_id(seed: u64) -> Value {
        let mut server =
            MockServer::new(orders_pact(), MockServerConfig::default().with_seed(seed));
        server.start().await.unwrap();
        let url = server.url().unwrap();
        let body: Value = reqwest::Client::new()
            .post(format!("{url}/orders"))
            .json(&json!({"sku": "A-1", "quantity": 1}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        server.stop().await;
        body["id"].clone()
    }

    assert_eq!(created_id(11).await, created_id(11).await);
}

#[tokio::test]
async fn test_session_timeout_stops_a_hanging_test() {
    let config = MockServerConfig::default().with_session_timeout(Duration::from_millis(100));
    let result = run_test(&orders_pact(), config, |_url| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, String>(())
    })
    .await;

    assert_eq!(result.cause(), Some(&FailureCause::TestTimedOut(100)));
    assert_eq!(result.mock_server_state().unwrap().missing.len(), 2);
}

fn root_and_second() -> Pact {
    Pact::new("web", "api")
        .with_interaction(HttpInteraction::new(
            "get root",
            HttpRequest::new("GET", "/"),
            HttpResponse::new(200),
        ))
        .with_interaction(HttpInteraction::new(
            "options second",
            HttpRequest::new("OPTIONS", "/second"),
            HttpResponse::new(200),
        ))
}

#[tokio::test]
async fn test_all_interactions_in_order_is_ok() {
    let result = run_test(&root_and_second(), MockServerConfig::default(), |url| async move {
        let client = reqwest::Client::new();
        client.get(format!("{url}/")).send().await?.error_for_status()?;
        client
            .request(reqwest::Method::OPTIONS, format!("{url}/second"))
            .send()
            .await?
            .error_for_status()?;
        Ok::<_, reqwest::Error>(())
    })
    .await;

    assert_eq!(result, VerificationResult::Ok);
}

#[tokio::test]
async fn test_skipped_request_is_the_only_missing_one() {
    let result = run_test(&root_and_second(), MockServerConfig::default(), |url| async move {
        reqwest::get(format!("{url}/")).await?.error_for_status()?;
        Ok::<_, reqwest::Error>(())
    })
    .await;

    assert_eq!(result.cause(), Some(&FailureCause::ContractViolation));
    let state = result.mock_server_state().unwrap();
    assert_eq!(state.missing.len(), 1);
    assert_eq!(state.missing[0].description, "options second");
    assert_eq!(state.missing[0].method, "OPTIONS");
    assert_eq!(state.missing[0].path, "/second");
}
