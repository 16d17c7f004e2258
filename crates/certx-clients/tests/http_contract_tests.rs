//! Contract tests for the HTTP ledger and content-store clients.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | POST | `/api/v1/certificates` | `ledger_issue_*` |
//! | POST | `/api/v1/certificates/{hash}/revoke` | `ledger_revoke_*` |
//! | GET  | `/api/v1/certificates/{hash}` | `ledger_get_*` |
//! | POST | `/upload` | `content_put_*` |
//! | GET  | `/ipfs/{cid}` | `content_get_*` |

use certx_clients::{
    ClientConfig, ClientError, ContentStore, HttpContentStore, HttpLedgerClient, Ledger,
    LedgerStatus,
};
use std::time::Duration;

use certx_core::content_hash;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::local(&server.uri(), "test-token").unwrap()
}

/// A client whose first write times out although the server applies it.
fn short_timeout(server: &MockServer) -> ClientConfig {
    ClientConfig {
        timeout_secs: 1,
        ..config(server)
    }
}

/// The first POST to `route` is applied but answered after the client gave up;
/// every later POST conflicts with it.
async fn mount_lost_write(server: &MockServer, route: &str) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(3)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(409).set_body_string("already issued"))
        .with_priority(2)
        .mount(server)
        .await;
}

async fn mount_record(server: &MockServer, hash: &certx_core::ContentHash, record: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/certificates/{hash}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .expect(1)
        .mount(server)
        .await;
}

async fn posts_received(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .count()
}

// ── Ledger ───────────────────────────────────────────────────────────

#[tokio::test]
async fn ledger_issue_posts_hash_and_uri() {
    let server = MockServer::start().await;
    let hash = content_hash(b"published");

    Mock::given(method("POST"))
        .and(path("/api/v1/certificates"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(serde_json::json!({
            "hash": hash.as_str(),
            "uri": "ipfs://meta"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = HttpLedgerClient::new(&config(&server)).unwrap();
    ledger.issue(&hash, "ipfs://meta").await.unwrap();
}

#[tokio::test]
async fn ledger_issue_conflict_maps_to_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/certificates"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already issued"))
        .mount(&server)
        .await;
    // A first-send conflict is someone else's record; no read-back.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ledger = HttpLedgerClient::new(&config(&server)).unwrap();
    let err = ledger.issue(&content_hash(b"x"), "ipfs://m").await.unwrap_err();
    assert!(err.is_conflict(), "got {err:?}");
}

#[tokio::test]
async fn ledger_issue_lost_response_then_conflict_with_own_record_succeeds() {
    let server = MockServer::start().await;
    let hash = content_hash(b"published");
    mount_lost_write(&server, "/api/v1/certificates").await;
    mount_record(&server, &hash, serde_json::json!({"status": 1, "uri": "ipfs://meta"})).await;

    let ledger = HttpLedgerClient::new(&short_timeout(&server)).unwrap();
    ledger.issue(&hash, "ipfs://meta").await.unwrap();
    assert_eq!(posts_received(&server).await, 2);
}

#[tokio::test]
async fn ledger_issue_conflict_after_resend_with_foreign_uri_stays_conflict() {
    let server = MockServer::start().await;
    let hash = content_hash(b"published");
    mount_lost_write(&server, "/api/v1/certificates").await;
    mount_record(&server, &hash, serde_json::json!({"status": 1, "uri": "ipfs://other"})).await;

    let ledger = HttpLedgerClient::new(&short_timeout(&server)).unwrap();
    let err = ledger.issue(&hash, "ipfs://meta").await.unwrap_err();
    assert!(err.is_conflict(), "got {err:?}");
}

#[tokio::test]
async fn ledger_issue_conflict_after_resend_reports_unreadable_ledger() {
    let server = MockServer::start().await;
    let hash = content_hash(b"published");
    mount_lost_write(&server, "/api/v1/certificates").await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("relayer down"))
        .mount(&server)
        .await;

    let ledger = HttpLedgerClient::new(&short_timeout(&server)).unwrap();
    let err = ledger.issue(&hash, "ipfs://meta").await.unwrap_err();
    assert!(err.is_unavailable(), "got {err:?}");
}

#[tokio::test]
async fn ledger_issue_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/certificates"))
        .respond_with(ResponseTemplate::new(503).set_body_string("relayer down"))
        .mount(&server)
        .await;

    let ledger = HttpLedgerClient::new(&config(&server)).unwrap();
    let err = ledger.issue(&content_hash(b"x"), "ipfs://m").await.unwrap_err();
    assert!(err.is_unavailable(), "got {err:?}");
}

#[tokio::test]
async fn ledger_revoke_hits_hash_path() {
    let server = MockServer::start().await;
    let hash = content_hash(b"published");
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/certificates/{hash}/revoke")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = HttpLedgerClient::new(&config(&server)).unwrap();
    ledger.revoke(&hash).await.unwrap();
}

#[tokio::test]
async fn ledger_revoke_lost_response_then_conflict_on_revoked_record_succeeds() {
    let server = MockServer::start().await;
    let hash = content_hash(b"published");
    mount_lost_write(&server, &format!("/api/v1/certificates/{hash}/revoke")).await;
    mount_record(&server, &hash, serde_json::json!({"status": 2, "uri": "ipfs://meta"})).await;

    let ledger = HttpLedgerClient::new(&short_timeout(&server)).unwrap();
    ledger.revoke(&hash).await.unwrap();
    assert_eq!(posts_received(&server).await, 2);
}

#[tokio::test]
async fn ledger_get_parses_status_and_uri() {
    let server = MockServer::start().await;
    let hash = content_hash(b"published");
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/certificates/{hash}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": 1,
            "uri": "ipfs://meta"
        })))
        .mount(&server)
        .await;

    let ledger = HttpLedgerClient::new(&config(&server)).unwrap();
    let record = ledger.get(&hash).await.unwrap();
    assert_eq!(record.status, LedgerStatus::Valid);
    assert_eq!(record.uri.as_deref(), Some("ipfs://meta"));
}

#[tokio::test]
async fn ledger_get_404_is_status_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let ledger = HttpLedgerClient::new(&config(&server)).unwrap();
    let record = ledger.get(&content_hash(b"unknown")).await.unwrap();
    assert_eq!(record.status, LedgerStatus::NotFound);
    assert!(record.uri.is_none());
}

#[tokio::test]
async fn ledger_get_rejects_unknown_status_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": 7})))
        .mount(&server)
        .await;

    let ledger = HttpLedgerClient::new(&config(&server)).unwrap();
    let err = ledger.get(&content_hash(b"x")).await.unwrap_err();
    assert!(matches!(err, ClientError::Deserialization { .. }));
}

// ── Content store ────────────────────────────────────────────────────

#[tokio::test]
async fn content_put_bytes_returns_ipfs_uri() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(query_param("name", "cert.pdf"))
        .and(header("content-type", "application/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"cid": "bafydoc"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = HttpContentStore::new(&config(&server)).unwrap();
    let uri = store
        .put_bytes(b"%PDF-1.7".to_vec(), "cert.pdf", "application/pdf")
        .await
        .unwrap();
    assert_eq!(uri, "ipfs://bafydoc");
}

#[tokio::test]
async fn content_put_json_sends_json() {
    let server = MockServer::start().await;
    let meta = serde_json::json!({"name": "Nguyen Van A", "image": "ipfs://bafydoc"});
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header("content-type", "application/json"))
        .and(body_json(meta.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"cid": "bafymeta"})))
        .mount(&server)
        .await;

    let store = HttpContentStore::new(&config(&server)).unwrap();
    assert_eq!(store.put_json(&meta, "metadata.json").await.unwrap(), "ipfs://bafymeta");
}

#[tokio::test]
async fn content_put_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let store = HttpContentStore::new(&config(&server)).unwrap();
    let err = store.put_bytes(vec![1, 2, 3], "x", "application/octet-stream").await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn content_get_reads_through_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ipfs/bafydoc"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"file".to_vec()))
        .mount(&server)
        .await;

    let store = HttpContentStore::new(&config(&server)).unwrap();
    assert_eq!(store.get("ipfs://bafydoc").await.unwrap(), b"file");
}

#[tokio::test]
async fn content_get_missing_and_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = HttpContentStore::new(&config(&server)).unwrap();
    assert!(matches!(
        store.get("ipfs://gone").await.unwrap_err(),
        ClientError::NotFound { .. }
    ));
    assert!(matches!(
        store.get("https://elsewhere/x").await.unwrap_err(),
        ClientError::InvalidUri(_)
    ));
}
