use super::client::estimate_cost_cents;
use super::*;

#[test]
fn test_request_builder() {
    let request = LlmRequest::new("expand this query")
        .with_system("you expand queries")
        .expect_json();

    assert_eq!(request.prompt, "expand this query");
    assert_eq!(request.system.as_deref(), Some("you expand queries"));
    assert!(request.json);
}

#[test]
fn test_cost_estimate_scales_with_tokens() {
    assert_eq!(estimate_cost_cents(0, 0), 0.0);

    let small = estimate_cost_cents(1_000, 0);
    let large = estimate_cost_cents(2_000, 0);
    assert!((large - small * 2.0).abs() < 1e-9);

    // Output tokens cost more than input tokens.
    assert!(estimate_cost_cents(0, 1_000) > estimate_cost_cents(1_000, 0));
}

#[test]
fn test_error_transience() {
    assert!(LlmError::Timeout { reason: "t".into() }.is_transient());
    assert!(LlmError::RateLimited { reason: "r".into() }.is_transient());
    assert!(LlmError::Connection { reason: "c".into() }.is_transient());
    assert!(!LlmError::Api { reason: "a".into() }.is_transient());
    assert!(!LlmError::InvalidResponse { reason: "i".into() }.is_transient());
}

#[tokio::test]
async fn test_mock_replays_script_then_last_response() {
    let mock = MockLlmClient::new();
    mock.push_text("first");
    mock.push_text("second");

    let a = mock.generate(LlmRequest::new("1")).await.unwrap();
    let b = mock.generate(LlmRequest::new("2")).await.unwrap();
    let c = mock.generate(LlmRequest::new("3")).await.unwrap();

    assert_eq!(a.content, "first");
    assert_eq!(b.content, "second");
    assert_eq!(c.content, "second");
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn test_mock_unscripted_fails() {
    let mock = MockLlmClient::new();

    let result = mock.generate(LlmRequest::new("anything")).await;
    assert!(matches!(result, Err(LlmError::Api { .. })));
}

#[tokio::test]
async fn test_mock_scripted_error_then_success() {
    let mock = MockLlmClient::new();
    mock.push_error(LlmError::Timeout {
        reason: "slow".into(),
    });
    mock.push_text("recovered");

    assert!(mock.generate(LlmRequest::new("a")).await.is_err());
    assert_eq!(
        mock.generate(LlmRequest::new("b")).await.unwrap().content,
        "recovered"
    );
}
