//! HTTP API Integration Tests
//!
//! Runs the real server on an ephemeral port and drives it with reqwest.
//! Remote files and the object store are wiremock servers.

use r2_uploader::config::Config;
use r2_uploader::fetch::BoundedFetcher;
use r2_uploader::server::{AppState, Server};
use r2_uploader::token::{FileTokenStore, MemoryTokenStore, TokenAuthority, TokenStore};
use r2_uploader::upload::{IngestService, R2Uploader};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";
const MAX_FILE_SIZE: u64 = 1024;

struct TestServer {
    addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(state(Arc::new(MemoryTokenStore::with_token(TOKEN)))).await
    }

    async fn start_with(state: AppState) -> Self {
        let server = Server::new(state).await.unwrap();
        let addr = server.local_addr();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            _shutdown: tx,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

fn state(store: Arc<dyn TokenStore>) -> AppState {
    let mut config = Config::default();
    config.server.address = "127.0.0.1:0".to_string();
    config.upload.max_file_size = MAX_FILE_SIZE;

    let tokens = Arc::new(TokenAuthority::new(store, None));
    let fetcher = BoundedFetcher::new(MAX_FILE_SIZE, Duration::from_secs(10)).unwrap();
    let ingest = Arc::new(IngestService::new(fetcher, Arc::new(R2Uploader::new())));
    AppState::with_parts(config, tokens, ingest)
}

fn upload_body(file_url: String, endpoint: String) -> Value {
    json!({
        "fileUrl": file_url,
        "bucketName": "test-bucket",
        "objectKey": "a/c.png",
        "endpoint": endpoint,
        "accessKeyId": "test-access",
        "secretAccessKey": "test-secret",
    })
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;

    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "r2-uploader");
}

#[tokio::test]
async fn test_root() {
    let server = TestServer::start().await;

    let body: Value = reqwest::get(server.url("/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["docs_url"], "/docs");
}

#[tokio::test]
async fn test_unknown_route_and_wrong_method() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let missing = client.get(server.url("/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["status"], "error");

    let wrong = client.get(server.url("/R2api/upload")).send().await.unwrap();
    assert_eq!(wrong.status(), 405);
}

#[tokio::test]
async fn test_preflight() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, server.url("/R2api/upload"))
        .header("Origin", "https://app.test")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 204);
    assert!(response
        .headers()
        .get("access-control-allow-headers")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("Authorization"));
}

#[tokio::test]
async fn test_upload_without_auth_is_401() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(server.url("/R2api/upload"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(response.headers().get("www-authenticate").unwrap(), "Bearer");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_upload_with_wrong_scheme_or_token_is_401() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let basic = client
        .post(server.url("/R2api/upload"))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(basic.status(), 401);

    let wrong = client
        .post(server.url("/R2api/upload"))
        .bearer_auth("not-the-token")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);
}

#[tokio::test]
async fn test_upload_missing_fields_is_400() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(server.url("/R2api/upload"))
        .bearer_auth(TOKEN)
        .json(&json!({"fileUrl": "https://files.test/a.png"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("bucketName"));
}

#[tokio::test]
async fn test_upload_invalid_json_is_400() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(server.url("/R2api/upload"))
        .bearer_auth(TOKEN)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_upload_from_url_end_to_end() {
    let server = TestServer::start().await;
    let source = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(path("/c.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/png")
                .set_body_bytes(vec![9u8; 100]),
        )
        .mount(&source)
        .await;
    Mock::given(method("PUT"))
        .and(path("/test-bucket/a/c.png"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag\""))
        .expect(1)
        .mount(&store)
        .await;

    let response = reqwest::Client::new()
        .post(server.url("/R2api/upload"))
        .bearer_auth(TOKEN)
        .json(&upload_body(format!("{}/c.png", source.uri()), store.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "File uploaded successfully");
    assert_eq!(
        body["data"]["public_url"],
        format!("{}/test-bucket/a/c.png", store.uri())
    );
    assert_eq!(body["data"]["size"], 100);
    assert_eq!(body["data"]["content_type"], "image/png");
    assert_eq!(body["data"]["file_name"], "c.png");
}

#[tokio::test]
async fn test_upload_oversized_remote_is_500() {
    let server = TestServer::start().await;
    let source = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(path("/c.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
        .mount(&source)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&store)
        .await;

    let response = reqwest::Client::new()
        .post(server.url("/R2api/upload"))
        .bearer_auth(TOKEN)
        .json(&upload_body(format!("{}/c.png", source.uri()), store.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_upload_direct_end_to_end() {
    let server = TestServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/test-bucket/a.png"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag\""))
        .expect(1)
        .mount(&store)
        .await;

    // No part content type and no object key: both derive from the file name
    let form = reqwest::multipart::Form::new()
        .text("bucket_name", "test-bucket")
        .text("endpoint", store.uri())
        .text("access_key_id", "test-access")
        .text("secret_access_key", "test-secret")
        .text("custom_domain", "https://cdn.test")
        .part(
            "file",
            reqwest::multipart::Part::bytes(vec![1u8; 64]).file_name("a.png"),
        );

    let response = reqwest::Client::new()
        .post(server.url("/R2api/upload-direct"))
        .bearer_auth(TOKEN)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["public_url"], "https://cdn.test/a.png");
    assert_eq!(body["data"]["size"], 64);
    assert_eq!(body["data"]["content_type"], "image/png");
}

#[tokio::test]
async fn test_upload_direct_missing_field_is_400() {
    let server = TestServer::start().await;

    let form = reqwest::multipart::Form::new()
        .text("endpoint", "https://x.test")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"data".to_vec()).file_name("a.txt"),
        );

    let response = reqwest::Client::new()
        .post(server.url("/R2api/upload-direct"))
        .bearer_auth(TOKEN)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("bucket_name"));
}

#[tokio::test]
async fn test_upload_direct_oversized_file_is_rejected() {
    let server = TestServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&store)
        .await;

    let form = reqwest::multipart::Form::new()
        .text("bucket_name", "test-bucket")
        .text("endpoint", store.uri())
        .text("access_key_id", "test-access")
        .text("secret_access_key", "test-secret")
        .part(
            "file",
            reqwest::multipart::Part::bytes(vec![0u8; MAX_FILE_SIZE as usize + 1])
                .file_name("big.bin"),
        );

    let response = reqwest::Client::new()
        .post(server.url("/R2api/upload-direct"))
        .bearer_auth(TOKEN)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn test_token_endpoints() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let info: Value = client
        .get(server.url("/R2api/token"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["status"], "success");
    assert_eq!(info["token"], TOKEN);
    assert_eq!(info["is_permanent"], true);

    let init: Value = client
        .post(server.url("/R2api/init-token"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(init["token"], TOKEN);

    let reset: Value = client
        .post(server.url("/R2api/reset-token"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["status"], "success");
    let new_token = reset["token"].as_str().unwrap().to_string();
    assert_ne!(new_token, TOKEN);

    // Old token no longer authenticates, the new one does
    let old = client
        .post(server.url("/R2api/upload"))
        .bearer_auth(TOKEN)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(old.status(), 401);

    let fresh = client
        .post(server.url("/R2api/upload"))
        .bearer_auth(&new_token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(fresh.status(), 400);
}

#[tokio::test]
async fn test_serves_when_default_token_cannot_be_saved() {
    // The token path is a directory, so every save fails
    let dir = tempfile::tempdir().unwrap();
    let state = state(Arc::new(FileTokenStore::new(dir.path())));

    assert!(!state.bootstrap_token().await);
    let server = TestServer::start_with(state).await;
    let client = reqwest::Client::new();

    let health = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let init = client
        .post(server.url("/R2api/init-token"))
        .send()
        .await
        .unwrap();
    assert_eq!(init.status(), 500);
    let body: Value = init.json().await.unwrap();
    assert_eq!(body["status"], "error");
}
