//! Both servers over loopback TCP with production crypto

#![allow(clippy::unwrap_used)]

use cosign_core::{
    AggregationRequest, CryptoEffectsExt, NodeConfig, RecipientKey, RegistryId, SignerId, Summary,
};
use cosign_effects::{generate_identity, GeneratedIdentity, LineTransport, RealCryptoHandler};
use cosign_protocol::serve;
use cosign_testkit::{feed_query, init_test_tracing, result_line, MemoryFeed, RegistryClient};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

fn node(
    signer: &str,
    keys: &GeneratedIdentity,
    trusted: &[(&str, &GeneratedIdentity)],
) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.identity.signer_id = SignerId::from(signer);
    config.identity.signing_key = keys.signing_key.clone();
    config.identity.decryption_key = keys.decryption_key.clone();
    for (peer, peer_keys) in trusted {
        config
            .keyring
            .insert(SignerId::from(*peer), peer_keys.verifying_key.clone());
    }
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registry_cosigns_with_real_keys() {
    init_test_tracing();
    let server_keys = generate_identity();
    let hunt_keys = generate_identity();

    let mut server_config = node("query-server", &server_keys, &[("hunt", &hunt_keys)]);
    server_config
        .distribution
        .recipients
        .insert(RegistryId::from("hunt"), hunt_keys.recipient_key.clone());
    let feed = MemoryFeed::new(vec![
        feed_query("q1", json!({"a": 1}), &["hunt"]),
        feed_query("q2", json!({"a": 2}), &["death"]),
    ]);
    let handler =
        cosign_node::query_server_with_feed(&server_config, Arc::new(feed.clone())).unwrap();
    let store = handler.store().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, handler, std::future::pending()));

    let hunt_config = node("hunt", &hunt_keys, &[("query-server", &server_keys)]);
    let hunt_crypto = RealCryptoHandler::from_config(&hunt_config).unwrap();
    let hunt = RegistryClient::new(
        "hunt",
        RealCryptoHandler::from_config(&hunt_config).unwrap(),
        RecipientKey::from_hex(&server_keys.recipient_key).unwrap(),
    );

    let stream = TcpStream::connect(addr).await.unwrap();
    let batch = hunt.sign_all(stream).await.unwrap();

    assert_eq!(batch.queries.len(), 1);
    assert!(hunt_crypto
        .verify_chain(&batch.queries[0].signed)
        .await
        .unwrap());

    let record = store.get(&"q1".into()).unwrap();
    assert_eq!(record.signed_by, vec![RegistryId::from("hunt")]);
    assert_eq!(record.signed.latest_signer().unwrap().as_str(), "hunt");
    assert_eq!(feed.fetch_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn summary_reaches_presentation_endpoint() {
    init_test_tracing();
    let aggregator_keys = generate_identity();
    let presentation_keys = generate_identity();
    let hunt_keys = generate_identity();

    let presentation = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = node("summary-server", &aggregator_keys, &[]);
    config.aggregation.presentation_addr = presentation.local_addr().unwrap().to_string();
    config.aggregation.presentation_recipient = presentation_keys.recipient_key.clone();
    let handler = cosign_node::summary_server(&config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, handler, std::future::pending()));

    let received = tokio::spawn(async move {
        let (stream, _) = presentation.accept().await.unwrap();
        LineTransport::default()
            .read_line(&mut BufReader::new(stream))
            .await
            .unwrap()
            .unwrap()
    });

    let to_aggregator = RecipientKey::from_hex(&aggregator_keys.recipient_key).unwrap();
    let hunt = RealCryptoHandler::from_config(&node("hunt", &hunt_keys, &[])).unwrap();
    let mut data = Vec::new();
    for sex in ["F", "F", "M"] {
        let line = hunt
            .seal_json(&result_line(&[("sex", json!(sex))]), &to_aggregator)
            .await
            .unwrap();
        data.push(vec![line]);
    }
    let request = AggregationRequest {
        metadata: json!({"requested_by": "alice"}),
        query_id: "q1".into(),
        data,
    };
    let frame = hunt.seal_json(&request, &to_aggregator).await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    LineTransport::default()
        .write_line(&mut stream, &frame)
        .await
        .unwrap();
    let mut ack = String::new();
    stream.read_to_string(&mut ack).await.unwrap();
    assert_eq!(ack, "\n");

    let presentation_crypto =
        RealCryptoHandler::from_config(&node("presentation", &presentation_keys, &[])).unwrap();
    let summary: Summary = presentation_crypto
        .open_json(&received.await.unwrap())
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&summary.data).unwrap(),
        json!({"sex": {"F": 2, "M": 1}})
    );
    assert_eq!(summary.metadata, json!({"requested_by": "alice"}));
}
