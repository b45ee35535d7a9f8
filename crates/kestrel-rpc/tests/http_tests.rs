use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use kestrel_consensus::BftConfig;
use kestrel_core::{Address, GenesisConfig, KeyPair};
use kestrel_rpc::{RpcConfig, RpcServer, StatusResponse};
use kestrel_server::{NoopTransport, Server};
use kestrel_state::{ChainStore, MemoryStorage};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tower::ServiceExt;

struct Fixture {
    router: Router,
    server: Arc<Server<MemoryStorage>>,
    verifiers: Vec<Address>,
}

fn fixture() -> Fixture {
    let mut keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
    keys.sort_by_key(|k| k.address());
    let verifiers: Vec<Address> = keys.iter().map(|k| k.address()).collect();

    let mut chain = ChainStore::new(MemoryStorage::new());
    chain
        .init_genesis(&GenesisConfig {
            chain_id: 42,
            timestamp: 0,
            verifiers: verifiers.clone(),
        })
        .unwrap();

    let server = Arc::new(Server::new(
        BftConfig::default(),
        keys[0].clone(),
        Arc::new(RwLock::new(chain)),
        Arc::new(NoopTransport),
    ));
    let router = RpcServer::new(RpcConfig::default(), server.clone()).router();
    Fixture {
        router,
        server,
        verifiers,
    }
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_status() {
    let fx = fixture();
    let (status, body) = call(&fx.router, Method::GET, "/status", None).await;
    assert_eq!(status, StatusCode::OK);

    let status: StatusResponse = serde_json::from_value(body).unwrap();
    assert_eq!(status.chain_id, 42);
    assert_eq!(status.height, 0);
    assert!(status.is_verifier);
    assert_eq!(status.verifier_count, 3);
    assert!(!status.consensus_running);
}

#[tokio::test]
async fn test_snapshot_and_verifiers() {
    let fx = fixture();
    let expected: Vec<String> = fx.verifiers.iter().map(|a| a.to_hex()).collect();

    let (status, body) = call(&fx.router, Method::GET, "/bft/snapshot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["number"], 0);
    assert_eq!(body["verifiers"], json!(expected));

    let hash = body["hash"].as_str().unwrap().to_string();
    let (status, body) = call(&fx.router, Method::GET, &format!("/bft/verifiers/{}", hash), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(expected));

    let (status, body) = call(&fx.router, Method::GET, "/bft/verifiers?height=0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(expected));
}

#[tokio::test]
async fn test_unknown_block_is_not_found() {
    let fx = fixture();
    let (status, body) = call(&fx.router, Method::GET, "/bft/snapshot?height=9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let missing = "ab".repeat(32);
    let (status, _) = call(&fx.router, Method::GET, &format!("/bft/snapshot/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&fx.router, Method::GET, "/bft/snapshot/nothex", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_candidate_staging() {
    let fx = fixture();
    let newcomer = KeyPair::generate().address();

    let (status, body) = call(
        &fx.router,
        Method::POST,
        "/bft/candidates",
        Some(json!({ "address": newcomer.to_hex(), "authorize": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authorize"], true);
    assert!(fx.server.candidates().contains_key(&newcomer));

    let (status, body) = call(&fx.router, Method::GET, "/bft/candidates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[newcomer.to_hex()], true);

    let uri = format!("/bft/candidates/{}", newcomer.to_hex());
    let (status, _) = call(&fx.router, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&fx.router, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &fx.router,
        Method::POST,
        "/bft/candidates",
        Some(json!({ "address": "zz", "authorize": false })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_consensus_message_ingress() {
    let fx = fixture();
    let message = json!({ "payload": "00ff" });

    // Rejected while the engine is stopped
    let (status, _) = call(&fx.router, Method::POST, "/consensus/message", Some(message.clone())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    fx.server.start().unwrap();
    let (status, body) = call(&fx.router, Method::POST, "/consensus/message", Some(message)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    let (status, _) = call(
        &fx.router,
        Method::POST,
        "/consensus/message",
        Some(json!({ "payload": "not hex" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    fx.server.stop().await.unwrap();
}
