mod helpers;

use std::sync::atomic::Ordering;
use bytes::Bytes;
use helpers::FakeBroker;
use kconsole::error::ConsoleError;
use kconsole::kafka::producer::parse_headers;
use kconsole::kafka::{ConnectionConfig, MessageProducer, OutboundMessage, Payload, SecurityProtocol};

#[tokio::test]
async fn test_send_returns_the_delivery_receipt() {
    let broker = FakeBroker::new();
    let producer = MessageProducer::new(broker.clone());
    let message = OutboundMessage::new("orders", r#"{"id":1}"#)
        .with_key("order-1")
        .with_partition(2)
        .with_headers(parse_headers("source:console, retry:1"));

    let receipt = producer.send(&ConnectionConfig::new("k:9092"), &message).await.unwrap();

    assert_eq!((receipt.topic.as_str(), receipt.partition, receipt.offset), ("orders", 2, 0));
    let produced = broker.produced.lock();
    assert_eq!(produced[0].headers()[1], ("retry".to_string(), Bytes::from("1")));
    assert_eq!(produced[0].key(), Some(&Payload::Text("order-1".to_string())));
}

#[tokio::test]
async fn test_sasl_without_password_fails_before_connecting() {
    let broker = FakeBroker::new();
    let producer = MessageProducer::new(broker.clone());
    let config = ConnectionConfig::new("k:9092")
        .with_protocol(SecurityProtocol::SaslPlain)
        .with_sasl("svc", "");

    let err = producer
        .send(&config, &OutboundMessage::new("orders", "x"))
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(broker.produce_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_topic_is_rejected() {
    let broker = FakeBroker::new();
    let producer = MessageProducer::new(broker.clone());

    let err = producer
        .send(&ConnectionConfig::new("k:9092"), &OutboundMessage::new("  ", "x"))
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(broker.produce_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_broker_rejection_is_surfaced() {
    let broker = FakeBroker::new();
    broker.reject_produce.store(true, Ordering::SeqCst);

    let err = MessageProducer::new(broker)
        .send(&ConnectionConfig::new("k:9092"), &OutboundMessage::new("orders", vec![0u8, 1, 2]))
        .await
        .unwrap_err();

    assert!(matches!(err, ConsoleError::Broker(_)));
}
