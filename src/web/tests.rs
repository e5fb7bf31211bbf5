use std::path::PathBuf;
use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use clap::Parser;
use tempfile::TempDir;
use tower::ServiceExt;

use super::error::GENERIC_FAILURE;
use super::{router, AppState};
use crate::config::Config;

// ========================================================================
// Helpers
// ========================================================================

/// Process-wide error log shared by every router test.
fn error_log_path() -> &'static PathBuf {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| {
        let path = std::env::temp_dir().join(format!(
            "csv-lens-test-{}-error.log",
            std::process::id()
        ));
        crate::logging::init("warn", &path).unwrap();
        path
    })
}

struct TestApp {
    app: Router,
    dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        error_log_path();
        let dir = tempfile::tempdir().unwrap();
        let config = Config::parse_from([
            "csv-lens".into(),
            "--upload-dir".into(),
            dir.path().join("uploads").into_os_string(),
            "--static-dir".into(),
            dir.path().join("static").into_os_string(),
        ]);
        let state = AppState::from_config(&config).unwrap();
        TestApp {
            app: router(state),
            dir,
        }
    }

    fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    fn static_dir(&self) -> PathBuf {
        self.dir.path().join("static")
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn upload(&self, filename: &str, content: &[u8]) -> Response {
        let (boundary, body) = multipart_body("file", filename, content);
        self.send(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    async fn analyze(&self, filename: &str, form: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("/analyze/{filename}"))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }
}

fn multipart_body(field: &str, filename: &str, content: &[u8]) -> (String, Vec<u8>) {
    let boundary = "----csvlensboundary7MA4YWxkTrZu0gW".to_string();
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (boundary, body)
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn stored_files(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

const DATA_CSV: &[u8] = b"a,b\n1,x\n2,y\n,x\n4,z\n";

// ========================================================================
// Upload
// ========================================================================

#[tokio::test]
async fn index_renders_upload_form() {
    let t = TestApp::new();
    let response = t.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"enctype="multipart/form-data""#));
}

#[tokio::test]
async fn index_shows_known_rejections_only() {
    let t = TestApp::new();
    let html = body_text(t.get("/?error=file-type").await).await;
    assert!(html.contains("Only .csv files can be uploaded."));

    let html = body_text(t.get("/?error=%3Cscript%3E").await).await;
    assert!(!html.contains("<script>"));
}

#[tokio::test]
async fn txt_upload_redirects_without_storing() {
    let t = TestApp::new();
    let response = t.upload("data.txt", b"a,b\n1,2\n").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/?error=file-type");
    assert!(stored_files(&t.upload_dir()).is_empty());
}

#[tokio::test]
async fn empty_filename_redirects() {
    let t = TestApp::new();
    let response = t.upload("", b"a\n1\n").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/?error=no-file");
    assert!(stored_files(&t.upload_dir()).is_empty());
}

#[tokio::test]
async fn missing_file_field_redirects() {
    let t = TestApp::new();
    let (boundary, body) = multipart_body("other", "data.csv", b"a\n1\n");
    let response = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/?error=no-file");
}

#[tokio::test]
async fn non_multipart_post_redirects() {
    let t = TestApp::new();
    let response = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .body(Body::from("file=data.csv"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/?error=no-file");
}

#[tokio::test]
async fn upload_sanitizes_filename() {
    let t = TestApp::new();
    let response = t.upload("../../My Data.csv", DATA_CSV).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/analyze/My_Data.csv");
    assert_eq!(stored_files(&t.upload_dir()), vec!["My_Data.csv"]);
}

// ========================================================================
// Analyze
// ========================================================================

#[tokio::test]
async fn uploaded_csv_lists_its_columns() {
    let t = TestApp::new();
    let response = t.upload("data.csv", DATA_CSV).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/analyze/data.csv");

    let response = t.get("/analyze/data.csv").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert_eq!(html.matches("<option ").count(), 2);
    assert!(html.contains(r#"<option value="a">a</option>"#));
    assert!(html.contains(r#"<option value="b">b</option>"#));
}

#[tokio::test]
async fn unknown_column_is_rejected() {
    let t = TestApp::new();
    t.upload("data.csv", DATA_CSV).await;

    let response = t.analyze("data.csv", "column=c").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "error": "Invalid column" })
    );

    let response = t.analyze("data.csv", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_header_is_not_an_empty_column_name() {
    let t = TestApp::new();
    t.upload("gaps.csv", b"a,,b\n1,2,3\n").await;

    let html = body_text(t.get("/analyze/gaps.csv").await).await;
    assert!(html.contains(r#"<option value="Unnamed: 1">Unnamed: 1</option>"#));
    assert!(!html.contains(r#"<option value="">"#));

    let response = t.analyze("gaps.csv", "column=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = t.analyze("gaps.csv", "column=Unnamed%3A+1").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn column_can_be_posted_as_multipart() {
    let t = TestApp::new();
    t.upload("data.csv", DATA_CSV).await;

    let boundary = "----csvlenscolumnboundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"column\"\r\n\r\na\r\n--{boundary}--\r\n"
    );
    let response = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/analyze/data.csv")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["summary_stats"]["count"], 3);
}

#[tokio::test]
async fn numeric_column_returns_stats_and_plot() {
    let t = TestApp::new();
    t.upload("data.csv", DATA_CSV).await;

    let response = t.analyze("data.csv", "column=a").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    let stats = json["summary_stats"].as_object().unwrap();
    let keys: Vec<&str> = stats.keys().map(String::as_str).collect();
    for key in ["count", "mean", "std", "min", "25%", "50%", "75%", "max"] {
        assert!(keys.contains(&key), "missing {key} in {keys:?}");
    }
    // one of the four rows is blank
    assert_eq!(stats["count"], 3);
    assert_eq!(stats["min"], 1.0);
    assert_eq!(stats["max"], 4.0);

    let plot_url = json["plot_url"].as_str().unwrap();
    assert!(plot_url.starts_with("static/plots/"));
    let file_name = plot_url.trim_start_matches("static/plots/");
    assert!(t.static_dir().join("plots").join(file_name).exists());

    let image = t.get(&format!("/{plot_url}")).await;
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(image.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn repeated_analysis_overwrites_same_plot() {
    let t = TestApp::new();
    t.upload("data.csv", DATA_CSV).await;

    let first = body_json(t.analyze("data.csv", "column=a").await).await;
    let second = body_json(t.analyze("data.csv", "column=a").await).await;
    assert_eq!(first["plot_url"], second["plot_url"]);
    assert_eq!(first["summary_stats"], second["summary_stats"]);
    assert_eq!(stored_files(&t.static_dir().join("plots")).len(), 1);

    // a different column gets its own image
    let other = body_json(t.analyze("data.csv", "column=b").await).await;
    assert_ne!(first["plot_url"], other["plot_url"]);
}

#[tokio::test]
async fn text_column_returns_categorical_summary() {
    let t = TestApp::new();
    t.upload("data.csv", DATA_CSV).await;

    let response = t.analyze("data.csv", "column=b").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json["summary_stats"],
        serde_json::json!({ "count": 4, "unique": 3, "top": "x", "freq": 2 })
    );
}

#[tokio::test]
async fn missing_file_is_a_logged_500() {
    let t = TestApp::new();

    let response = t.get("/analyze/never-uploaded-7f3a.csv").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, GENERIC_FAILURE);

    let response = t.analyze("never-uploaded-7f3a.csv", "column=a").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let log = std::fs::read_to_string(error_log_path()).unwrap();
    assert!(log.contains("never-uploaded-7f3a.csv"), "{log}");
    assert!(log.contains("Stack trace:"), "{log}");
}

#[tokio::test]
async fn malformed_csv_is_a_500() {
    let t = TestApp::new();
    t.upload("bad.csv", b"a,b\n1,2,3\n").await;

    let response = t.get("/analyze/bad.csv").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, GENERIC_FAILURE);
}

#[tokio::test]
async fn traversal_in_route_is_refused() {
    let t = TestApp::new();
    std::fs::write(t.dir.path().join("secret.csv"), "a\n1\n").unwrap();

    let response = t.get("/analyze/..%2Fsecret.csv").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
