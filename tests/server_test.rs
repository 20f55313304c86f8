mod helpers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use helpers::{png_bytes, stub_extractor, Dataset, RED};
use lookalike::indexer::Indexer;
use lookalike::matching::Matcher;
use lookalike::server::{router, AppState};
use lookalike::service::MatchService;
use lookalike::store::persist;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;

struct TestServer {
    addr: SocketAddr,
    ds: Dataset,
}

impl TestServer {
    async fn start() -> Self {
        let ds = Dataset::populated();
        Indexer::new(stub_extractor(), &ds.asset_root)
            .rebuild(&ds.root, &ds.store_path(), "stub")
            .unwrap();
        let store = persist::load(ds.store_path()).unwrap();
        let service = MatchService::new(
            stub_extractor(),
            store,
            Matcher::new("/static"),
            Duration::from_secs(5),
        )
        .unwrap();

        let upload_dir = ds.tmp.path().join("uploads");
        std::fs::create_dir_all(&upload_dir).unwrap();
        let state = AppState::new(Arc::new(service), upload_dir, ds.store_path());
        let app = router(state, 1024 * 1024);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, ds }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

fn image_form(bytes: Vec<u8>, name: &str) -> Form {
    Form::new().part("image", Part::bytes(bytes).file_name(name.to_string()))
}

#[tokio::test]
async fn match_returns_ranked_results_and_saves_upload() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let form = image_form(png_bytes(RED), "my query.png").text("category", "CATS");
    let resp = client
        .post(server.url("/match"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["display_name"], "a_red");
    assert_eq!(results[0]["category"], "Cats");
    assert_eq!(results[0]["asset_url"], "/static/dataset/Cats/a_red.png");
    assert!((results[0]["similarity"].as_f64().unwrap() - 1.0).abs() < 1e-5);

    let query_url = body["query"].as_str().unwrap();
    assert!(query_url.starts_with("/uploads/my_query_"));
    assert!(query_url.ends_with(".png"));

    let upload = client.get(server.url(query_url)).send().await.unwrap();
    assert_eq!(upload.status(), StatusCode::OK);
    assert_eq!(upload.headers()["content-type"], "image/png");
    assert_eq!(upload.bytes().await.unwrap().to_vec(), png_bytes(RED));
}

#[tokio::test]
async fn missing_image_is_bad_request() {
    let server = TestServer::start().await;
    let form = Form::new().text("category", "cats");

    let resp = reqwest::Client::new()
        .post(server.url("/match"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    assert_eq!(body["error"], "No image received");
}

#[tokio::test]
async fn undecodable_image_reports_decode_kind() {
    let server = TestServer::start().await;
    let form = image_form(b"plain text".to_vec(), "notes.png").text("score", "bogus");

    let resp = reqwest::Client::new()
        .post(server.url("/match"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    assert_eq!(body["kind"], "decode");
    assert!(body["error"].as_str().unwrap().contains("not a valid image"));
}

#[tokio::test]
async fn uploads_reject_traversal_and_unknown_files() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/uploads/..secret")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .get(server.url("/uploads/missing_20240101_000000_deadbeef.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_swaps_in_rebuilt_store() {
    let server = TestServer::start().await;
    std::fs::remove_file(server.ds.root.join("Dogs/blue.png")).unwrap();
    Indexer::new(stub_extractor(), &server.ds.asset_root)
        .rebuild(&server.ds.root, &server.ds.store_path(), "stub")
        .unwrap();

    let resp = reqwest::Client::new()
        .post(server.url("/reload"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    assert_eq!(body["images"], 3);
}
