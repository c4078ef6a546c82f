use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use chrono::{Local, TimeZone};
use logship::clock::ManualClock;
use logship::index::lifecycle::index_mappings;
use logship::index::{
    ClientError, Connector, DeleteOutcome, ElasticClient, ElasticConnector, EnsureOutcome,
    IndexLifecycle, SearchClient,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Request {
    method: Method,
    path: String,
    content_type: Option<String>,
    body: String,
}

#[derive(Default)]
struct Cluster {
    indices: HashSet<String>,
    requests: Vec<Request>,
}

type Shared = Arc<Mutex<Cluster>>;

/// Minimal stand-in for the Elasticsearch index APIs.
async fn handle(
    State(cluster): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let mut cluster = cluster.lock().unwrap();
    let path = uri.path().to_string();
    cluster.requests.push(Request {
        method: method.clone(),
        path: path.clone(),
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let index = segments[0].to_string();

    match (method.as_str(), segments.as_slice()) {
        ("GET", [""]) => (StatusCode::OK, r#"{"tagline":"You Know, for Search"}"#.into()),
        ("HEAD", [_]) if cluster.indices.contains(&index) => (StatusCode::OK, String::new()),
        ("HEAD", [_]) => (StatusCode::NOT_FOUND, String::new()),
        ("PUT", [_]) if cluster.indices.contains(&index) => (
            StatusCode::BAD_REQUEST,
            r#"{"error":"resource_already_exists_exception"}"#.into(),
        ),
        ("PUT", [_]) => {
            cluster.indices.insert(index);
            (StatusCode::OK, r#"{"acknowledged":true}"#.into())
        }
        ("DELETE", [_]) if cluster.indices.remove(&index) => {
            (StatusCode::OK, r#"{"acknowledged":true}"#.into())
        }
        ("DELETE", [_]) => (
            StatusCode::NOT_FOUND,
            r#"{"error":"index_not_found_exception"}"#.into(),
        ),
        ("POST", [_, "_doc"]) => {
            cluster.indices.insert(index);
            (StatusCode::CREATED, r#"{"result":"created"}"#.into())
        }
        _ => (StatusCode::METHOD_NOT_ALLOWED, String::new()),
    }
}

async fn start_cluster() -> (String, Shared) {
    let cluster: Shared = Arc::default();
    let app = Router::new().fallback(handle).with_state(cluster.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), cluster)
}

fn requests(cluster: &Shared) -> Vec<Request> {
    cluster.lock().unwrap().requests.clone()
}

#[tokio::test]
async fn test_connect_probes_root() {
    let (url, cluster) = start_cluster().await;

    let connector = ElasticConnector::new(url, Duration::from_secs(5));
    connector.connect().await.unwrap();

    let seen = requests(&cluster);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, Method::GET);
    assert_eq!(seen[0].path, "/");
}

#[tokio::test]
async fn test_create_and_check_index() {
    let (url, cluster) = start_cluster().await;
    let client = ElasticClient::connect(&url, Duration::from_secs(5)).await.unwrap();

    assert!(!client.index_exists("mylogs-202401").await.unwrap());
    client.create_index("mylogs-202401", &index_mappings()).await.unwrap();
    assert!(client.index_exists("mylogs-202401").await.unwrap());

    let put = requests(&cluster)
        .into_iter()
        .find(|r| r.method == Method::PUT)
        .unwrap();
    assert_eq!(put.path, "/mylogs-202401");
    let body: serde_json::Value = serde_json::from_str(&put.body).unwrap();
    assert_eq!(body, index_mappings());
}

#[tokio::test]
async fn test_error_status_is_surfaced() {
    let (url, _cluster) = start_cluster().await;
    let client = ElasticClient::connect(&url, Duration::from_secs(5)).await.unwrap();

    match client.delete_index("never-created").await {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, 404);
            assert!(message.contains("index_not_found_exception"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_document_body_is_sent_verbatim() {
    let (url, cluster) = start_cluster().await;
    let client = ElasticClient::connect(&url, Duration::from_secs(5)).await.unwrap();

    let line = r#"{"remote_addr":"10.0.0.1","status":200,"uri":"/"}"#;
    client.index_document("mylogs-202401", line).await.unwrap();

    let post = requests(&cluster)
        .into_iter()
        .find(|r| r.method == Method::POST)
        .unwrap();
    assert_eq!(post.path, "/mylogs-202401/_doc");
    assert_eq!(post.body, line);
    assert_eq!(post.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_lifecycle_over_http() {
    let (url, cluster) = start_cluster().await;
    let client = ElasticClient::connect(&url, Duration::from_secs(5)).await.unwrap();
    cluster.lock().unwrap().indices.insert("mylogs-202401".to_string());

    let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap());
    let lifecycle = IndexLifecycle::new("mylogs-", Arc::new(clock));

    assert_eq!(lifecycle.delete_if_older_than(&client, 3).await, DeleteOutcome::Deleted);
    assert_eq!(lifecycle.delete_if_older_than(&client, 3).await, DeleteOutcome::Absent);
    assert_eq!(lifecycle.ensure_current_index(&client).await.unwrap(), EnsureOutcome::Created);
    assert_eq!(lifecycle.ensure_current_index(&client).await.unwrap(), EnsureOutcome::AlreadyExists);

    let seen = requests(&cluster);
    assert_eq!(seen.iter().filter(|r| r.method == Method::PUT).count(), 1);
    assert_eq!(seen.iter().filter(|r| r.method == Method::DELETE).count(), 1);
}
