use std::time::Duration;

use super::*;

#[tokio::test]
async fn test_mock_broker_delivers_in_order_and_tracks_acks() {
    let broker = MockBroker::new();
    broker.publish("m1", "memory.nodes.created", serde_json::json!({"id": "a"}));
    broker.publish("m2", "memory.nodes.created", serde_json::json!({"id": "b"}));

    let mut sub = broker.subscribe("memory.node_created", "g1").await.unwrap();

    let batch = sub.fetch(10, Duration::from_millis(10)).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].id, "m1");

    sub.ack(&batch[0]).await.unwrap();
    sub.nak(&batch[1]).await.unwrap();

    assert_eq!(broker.acked(), vec!["m1"]);
    assert_eq!(broker.naked(), vec!["m2"]);

    // The nak'd message is redelivered on the next fetch.
    let redelivered = sub.fetch(10, Duration::from_millis(10)).await.unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].id, "m2");
}

#[tokio::test]
async fn test_mock_broker_fetch_honors_batch_size() {
    let broker = MockBroker::new();
    for i in 0..15 {
        broker.publish(&format!("m{i}"), "s", serde_json::json!({}));
    }

    let mut sub = broker.subscribe("t", "g").await.unwrap();
    let batch = sub.fetch(10, Duration::from_millis(10)).await.unwrap();

    assert_eq!(batch.len(), 10);
    assert_eq!(broker.pending(), 5);
}

#[tokio::test]
async fn test_mock_broker_empty_fetch_waits_for_timeout() {
    let broker = MockBroker::new();
    let mut sub = broker.subscribe("t", "g").await.unwrap();

    let started = std::time::Instant::now();
    let batch = sub.fetch(10, Duration::from_millis(30)).await.unwrap();

    assert!(batch.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(25));
}

#[tokio::test]
async fn test_subscribe_failure_injection() {
    let broker = MockBroker::new();
    broker.fail_subscribe(true);

    let result = broker.subscribe("t", "g").await;
    assert!(matches!(result, Err(BrokerError::Subscribe { .. })));
}

#[tokio::test]
async fn test_status_bus_records_and_fails_on_demand() {
    let bus = MockStatusBus::new();

    bus.publish(ConsumerStatus::now(
        StatusKind::ConsumerReady,
        "indexer",
        "svc-1",
    ))
    .await
    .unwrap();

    let records = bus.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, StatusKind::ConsumerReady);
    assert_eq!(records[0].group_id, "indexer");
    assert!(records[0].timestamp_ms > 0);

    bus.fail(true);
    let result = bus
        .publish(ConsumerStatus::now(
            StatusKind::ConsumerHeartbeat,
            "indexer",
            "svc-1",
        ))
        .await;
    assert!(result.is_err());
}

#[test]
fn test_status_kind_serialisation() {
    let status = ConsumerStatus {
        status: StatusKind::ConsumerDisconnected,
        group_id: "g".to_string(),
        service_id: "s".to_string(),
        timestamp_ms: 42,
    };

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["status"], "consumer_disconnected");
}
