mod common;

use std::time::{
    Duration,
    SystemTime,
};

use assert_matches::assert_matches;
use common::TestSidecar;
use irl_client::{
    EndpointMode,
    VerificationError,
};
use irl_core::UNAUTHORIZED_DETAIL;
use wiremock::{
    Mock,
    MockServer,
    ResponseTemplate,
    matchers::{
        body_string,
        header,
        method,
        path,
    },
};

const REGISTRY: &str = r#"
[integrations.python_qa]
rules = [
    { kind = "required", field = "total" },
    { kind = "non_negative", field = "total" },
    { kind = "type", field = "items", expected = "array" },
]

[integrations.finance_api]
require_api_key = true
rules = [{ kind = "non_negative", field = "amount" }]

[api_keys]
"key-123" = ["finance_api"]
"#;

#[tokio::test]
async fn test_valid_payload_is_accepted() {
    let sidecar = TestSidecar::spawn(REGISTRY).await;
    let client = sidecar.client();

    let accepted = client
        .verify("python_qa", r#"{"total": 100, "items": []}"#)
        .await
        .unwrap();
    assert_eq!(accepted.integration.as_deref(), Some("python_qa"));
    assert!(!accepted.forwarded);

    sidecar.shutdown().await;
}

#[tokio::test]
async fn test_negative_total_is_rejected_with_detail() {
    let sidecar = TestSidecar::spawn(REGISTRY).await;
    let client = sidecar.client();

    let err = client
        .verify("python_qa", r#"{"total": -50, "items": []}"#)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert_matches!(
        err,
        VerificationError::Rejected { detail, violations }
            if detail.contains("-50") && detail.contains("total")
                && violations.len() == 1 && violations[0].rule == "non_negative"
    );
}

#[tokio::test]
async fn test_every_violation_is_reported() {
    let sidecar = TestSidecar::spawn(REGISTRY).await;
    let client = sidecar.client();

    let err = client
        .verify("python_qa", r#"{"items": "none"}"#)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        VerificationError::Rejected { violations, .. } if violations.len() == 2
    );
}

#[tokio::test]
async fn test_unknown_integration_is_not_a_violation() {
    let sidecar = TestSidecar::spawn(REGISTRY).await;
    let client = sidecar.client();

    let err = client
        .verify("does_not_exist", r#"{"total": -1}"#)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        VerificationError::Server { status: 404, body } if body.contains("UNKNOWN_INTEGRATION")
    );
}

#[tokio::test]
async fn test_malformed_json_is_a_server_error() {
    let sidecar = TestSidecar::spawn(REGISTRY).await;
    let client = sidecar.client();

    let err = client.verify("python_qa", "{not json").await.unwrap_err();
    assert_matches!(
        err,
        VerificationError::Server { status: 400, body } if body.contains("MALFORMED_JSON")
    );
}

#[tokio::test]
async fn test_authorization_precedes_validation() {
    let sidecar = TestSidecar::spawn(REGISTRY).await;

    // Invalid payload without a key: the violation must not leak
    let err = sidecar
        .client()
        .verify("finance_api", r#"{"amount": -1}"#)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        VerificationError::Unauthorized { detail } if detail == UNAUTHORIZED_DETAIL
    );

    let keyed = sidecar.client_with(|config| config.with_api_key("key-123"));
    assert_matches!(
        keyed.verify("finance_api", r#"{"amount": -1}"#).await,
        Err(VerificationError::Rejected { .. })
    );
    keyed
        .verify("finance_api", r#"{"amount": 10}"#)
        .await
        .unwrap();

    // A key outside its scope is refused even where none is required
    assert_matches!(
        keyed.verify("python_qa", r#"{"total": 1, "items": []}"#).await,
        Err(VerificationError::Unauthorized { .. })
    );
}

#[tokio::test]
async fn test_deployment_wide_key_requirement() {
    let sidecar = TestSidecar::spawn_with(REGISTRY, Some(true), 0).await;

    assert_matches!(
        sidecar
            .client()
            .verify("python_qa", r#"{"total": 1, "items": []}"#)
            .await,
        Err(VerificationError::Unauthorized { .. })
    );
}

#[tokio::test]
async fn test_fixed_url_mode_uses_header() {
    let sidecar = TestSidecar::spawn(REGISTRY).await;
    let fixed = format!("{}/verify", sidecar.url());
    let client = irl_client::VerifyClient::new(
        irl_client::ClientConfig::new(fixed).with_mode(EndpointMode::Fixed),
    )
    .unwrap();

    let accepted = client
        .verify("python_qa", r#"{"total": 1, "items": []}"#)
        .await
        .unwrap();
    assert_eq!(accepted.integration.as_deref(), Some("python_qa"));

    assert_matches!(
        client.verify("python_qa", r#"{"total": -1, "items": []}"#).await,
        Err(VerificationError::Rejected { .. })
    );
}

#[tokio::test]
async fn test_repeated_submissions_give_the_same_answer() {
    let sidecar = TestSidecar::spawn(REGISTRY).await;
    let client = sidecar.client();

    for _ in 0..3 {
        assert_matches!(
            client.verify("python_qa", r#"{"total": -5, "items": []}"#).await,
            Err(VerificationError::Rejected { detail, .. }) if detail.contains("-5")
        );
    }
}

#[tokio::test]
async fn test_concurrent_verifications() {
    let sidecar = TestSidecar::spawn(REGISTRY).await;
    let client = sidecar.client();

    let results = futures::future::join_all((0..32).map(|i| {
        let client = client.clone();
        async move {
            let total = if i % 2 == 0 { i } else { -i };
            client
                .verify("python_qa", format!(r#"{{"total": {total}, "items": []}}"#))
                .await
        }
    }))
    .await;

    for (i, result) in results.into_iter().enumerate() {
        if i % 2 == 0 {
            assert!(result.is_ok(), "payload {i} should be accepted");
        } else {
            assert_matches!(result, Err(VerificationError::Rejected { .. }));
        }
    }
}

#[tokio::test]
async fn test_accepted_payload_is_forwarded() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .and(header("x-irl-integration", "orders"))
        .and(body_string(r#"{"total": 7}"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&downstream)
        .await;

    let registry = format!(
        r#"
        [integrations.orders]
        forward_to = "{}/ingest"
        rules = [{{ kind = "non_negative", field = "total" }}]
        "#,
        downstream.uri()
    );
    let sidecar = TestSidecar::spawn(&registry).await;
    let client = sidecar.client();

    let accepted = client.verify("orders", r#"{"total": 7}"#).await.unwrap();
    assert!(accepted.forwarded);

    // Rejected payloads never reach the system of record
    assert_matches!(
        client.verify("orders", r#"{"total": -7}"#).await,
        Err(VerificationError::Rejected { .. })
    );
    downstream.verify().await;
}

#[tokio::test]
async fn test_forwarding_failure_is_a_bad_gateway() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let registry = format!(
        r#"
        [integrations.orders]
        forward_to = "http://{dead}/ingest"
        "#
    );
    let sidecar = TestSidecar::spawn(&registry).await;

    let err = sidecar
        .client()
        .verify("orders", r#"{"total": 7}"#)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        VerificationError::Server { status: 502, body } if body.contains("FORWARDING_FAILED")
    );
}

#[tokio::test]
async fn test_registry_changes_are_picked_up() {
    let sidecar = TestSidecar::spawn_with(REGISTRY, None, 1).await;
    let client = sidecar.client();

    assert_matches!(
        client.verify("shopify", "{}").await,
        Err(VerificationError::Server { status: 404, .. })
    );

    std::fs::write(
        sidecar.registry_path(),
        format!("{REGISTRY}\n[integrations.shopify]\n"),
    )
    .unwrap();
    std::fs::File::options()
        .write(true)
        .open(sidecar.registry_path())
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let mut accepted = false;
    for _ in 0..50 {
        if client.verify("shopify", "{}").await.is_ok() {
            accepted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(accepted, "registry reload was not picked up");

    // Existing integrations keep working across the reload
    client
        .verify("python_qa", r#"{"total": 1, "items": []}"#)
        .await
        .unwrap();
}
