//! Integration tests for the evcal-sources HTTP API
//!
//! Each test drives `build_router` over an in-memory database with a canned
//! fetcher, so no network access is needed.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use evcal_common::db::{connect_in_memory, Source};
use evcal_sources::api::FlashStore;
use evcal_sources::db::{SourceRepository, SqliteSourceRepository};
use evcal_sources::fetcher::{FetchError, ParsedEvent, SourceFetcher};
use evcal_sources::{build_router, AppState, Settings};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

type Outcome = fn() -> Result<Vec<ParsedEvent>, FetchError>;

/// Fetcher returning a fixed outcome and counting calls
struct StubFetcher {
    outcome: Outcome,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for StubFetcher {
    async fn fetch(&self, _source: &Source) -> Result<Vec<ParsedEvent>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.outcome)()
    }
}

fn upcoming(n: usize) -> Vec<ParsedEvent> {
    let start = Utc::now() + Duration::days(7);
    (0..n)
        .map(|i| ParsedEvent {
            uid: Some(format!("uid-{}@example.com", i)),
            title: format!("Meetup {}", i),
            description: None,
            url: None,
            location: Some("Community Hall".to_string()),
            start_time: start + Duration::hours(i as i64),
            end_time: None,
        })
        .collect()
}

struct TestApp {
    router: Router,
    sources: Arc<SqliteSourceRepository>,
    fetcher: Arc<StubFetcher>,
    flash: FlashStore,
}

impl TestApp {
    async fn new(outcome: Outcome) -> Self {
        Self::with_settings(outcome, Settings::default()).await
    }

    async fn with_settings(outcome: Outcome, settings: Settings) -> Self {
        let pool = connect_in_memory().await.expect("Should open in-memory database");
        let sources = Arc::new(SqliteSourceRepository::new(pool));
        let fetcher = StubFetcher::new(outcome);
        let state = AppState::new(sources.clone(), fetcher.clone(), settings);
        let flash = state.flash.clone();

        Self {
            router: build_router(state),
            sources,
            fetcher,
            flash,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn get_json(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap()
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn send_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const FEED_FORM: &str = "url=http%3A%2F%2Fexample.com%2Fcal.ics";

/// `name=value` from the response's Set-Cookie header
fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("Should issue a session cookie")
        .to_string()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("Should have Location header")
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}

/// Contents of the rendered flash box
fn flash_html(page: &str) -> Option<&str> {
    let start = page.find("<div class=\"flash ")?;
    let rest = &page[start..];
    let open_end = rest.find('>')? + 1;
    let close = rest.find("</div>")?;
    Some(&rest[open_end..close])
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new(|| Ok(Vec::new())).await;

    let response = app.send(get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "evcal-sources");
    assert!(body["version"].is_string());
}

// =============================================================================
// Import
// =============================================================================

#[tokio::test]
async fn test_import_success_summarizes_first_five() {
    let app = TestApp::new(|| Ok(upcoming(7))).await;

    let response = app.send(post_form("/sources/import", FEED_FORM, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/events");
    let cookie = session_cookie(&response);

    let page = body_text(app.send(get("/events", Some(&cookie))).await).await;
    let flash = flash_html(&page).expect("Should render the import summary");
    assert!(flash.starts_with("<p>Imported 7 entries:</p><ul>"));
    assert!(flash.contains(">Meetup 0</a></li>"));
    assert!(flash.contains(">Meetup 4</a></li>"));
    assert!(!flash.contains("Meetup 5"));
    assert!(flash.ends_with("<li>And 2 other events.</li></ul>"));
    assert_eq!(app.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_import_few_events_lists_all() {
    let app = TestApp::new(|| Ok(upcoming(3))).await;

    let response = app.send(post_form("/sources/import", FEED_FORM, None)).await;
    let cookie = session_cookie(&response);

    let page = body_text(app.send(get("/events", Some(&cookie))).await).await;
    assert!(page.contains("<p>Imported 3 entries:</p>"));
    assert!(!page.contains("other events"));
}

#[tokio::test]
async fn test_import_empty_feed_reports_no_upcoming_events() {
    let app = TestApp::new(|| Ok(Vec::new())).await;

    let response = app.send(post_form("/sources/import", FEED_FORM, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains(
        "<div class=\"flash failure\">Unable to find any upcoming events to import from this source</div>"
    ));
    assert!(page.contains("action=\"/sources/import\""));
}

#[tokio::test]
async fn test_reimport_same_feed_finds_nothing_new() {
    let app = TestApp::new(|| Ok(upcoming(2))).await;

    let first = app.send(post_form("/sources/import", FEED_FORM, None)).await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let second = app.send(post_form("/sources/import", FEED_FORM, None)).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert!(body_text(second)
        .await
        .contains("Unable to find any upcoming events to import from this source"));
    assert_eq!(app.sources.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_import_invalid_source_not_fetched() {
    let app = TestApp::new(|| Ok(upcoming(1))).await;

    let response = app.send(post_form("/sources/import", "url=", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains("Unable to import: Url can't be blank"));
    assert_eq!(app.fetcher.calls(), 0);
    assert_eq!(app.sources.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_import_fetch_errors_are_reported() {
    let cases: [(Outcome, &str); 4] = [
        (
            || Err(FetchError::AuthenticationRequired),
            "Unable to import: source requires authentication",
        ),
        (
            || Err(FetchError::RemoteHttp(500)),
            "Unable to import: we received an error from this source",
        ),
        (
            || Err(FetchError::HostUnreachable("connection refused".into())),
            "Unable to import: this source is not responding",
        ),
        (
            || Err(FetchError::DnsFailure("no such host".into())),
            "Unable to import: hostname not found",
        ),
    ];

    for (outcome, expected) in cases {
        let app = TestApp::new(outcome).await;

        let response = app.send(post_form("/sources/import", FEED_FORM, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(expected), "{}", expected);
    }
}

#[tokio::test]
async fn test_import_unexpected_fetch_error_fails_request() {
    let app = TestApp::new(|| Err(FetchError::Other(anyhow::anyhow!("not a calendar")))).await;

    let response = app.send(post_form("/sources/import", FEED_FORM, None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_import_structured() {
    let app = TestApp::new(|| Ok(upcoming(2))).await;

    let response = app
        .send(send_json(
            "POST",
            "/sources/import",
            serde_json::json!({ "url": "webcal://example.com/cal.ics" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["source"]["url"], "webcal://example.com/cal.ics");
    assert_eq!(body["events"].as_array().map(Vec::len), Some(2));

    let failed = app
        .send(send_json("POST", "/sources/import", serde_json::json!({ "url": "ftp://x" })))
        .await;
    assert_eq!(failed.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(failed).await["errors"][0], "Url is invalid");
}

// =============================================================================
// Import gate
// =============================================================================

#[tokio::test]
async fn test_disabled_imports_short_circuit() {
    let settings = Settings {
        import_disabled: true,
        ..Settings::default()
    };
    let app = TestApp::with_settings(|| Ok(upcoming(3)), settings).await;

    let response = app.send(post_form("/sources/import", FEED_FORM, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cookie = session_cookie(&response);

    assert_eq!(app.fetcher.calls(), 0);
    assert_eq!(app.sources.count().await.unwrap(), 0);

    let home = body_text(app.send(get("/", Some(&cookie))).await).await;
    assert!(home.contains("temporarily disabled"));

    let form = app.send(get("/sources/new", Some(&cookie))).await;
    assert_eq!(form.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&form), "/");
}

#[tokio::test]
async fn test_gate_leaves_other_actions_alone() {
    let settings = Settings {
        import_disabled: true,
        ..Settings::default()
    };
    let app = TestApp::with_settings(|| Ok(Vec::new()), settings).await;

    let response = app.send(post_form("/sources", FEED_FORM, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sources/1");

    let listing = app.send(get("/sources", None)).await;
    assert_eq!(listing.status(), StatusCode::OK);
}

// =============================================================================
// Show
// =============================================================================

#[tokio::test]
async fn test_show_missing_source_sets_failure() {
    let app = TestApp::new(|| Ok(Vec::new())).await;

    let response = app.send(get("/sources/999", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sources/new");
    let cookie = session_cookie(&response);

    let form = body_text(app.send(get("/sources/new", Some(&cookie))).await).await;
    assert!(form.contains("<div class=\"flash failure\">Couldn't find Source with ID=999</div>"));
}

#[tokio::test]
async fn test_show_reserved_import_id_redirects_quietly() {
    let app = TestApp::new(|| Ok(Vec::new())).await;

    let response = app.send(get("/sources/import", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sources/new");
    let cookie = session_cookie(&response);

    let form = body_text(app.send(get("/sources/new", Some(&cookie))).await).await;
    assert!(!form.contains("class=\"flash"));
}

#[tokio::test]
async fn test_show_escapes_unknown_id() {
    let app = TestApp::new(|| Ok(Vec::new())).await;

    let response = app.send(get("/sources/%3Cb%3E", None)).await;
    let cookie = session_cookie(&response);

    let form = body_text(app.send(get("/sources/new", Some(&cookie))).await).await;
    assert!(form.contains("Couldn't find Source with ID=&lt;b&gt;"));
}

#[tokio::test]
async fn test_show_lists_imported_events_and_venues() {
    let app = TestApp::new(|| Ok(upcoming(2))).await;
    app.send(post_form("/sources/import", FEED_FORM, None)).await;

    let page = body_text(app.send(get("/sources/1", None)).await).await;
    assert!(page.contains("<h2>Events (2)</h2>"));
    assert!(page.contains("<li>Community Hall</li>"));

    let details = body_json(app.send(get_json("/sources/1")).await).await;
    assert_eq!(details["url"], "http://example.com/cal.ics");
    assert_eq!(details["events"].as_array().map(Vec::len), Some(2));
    assert_eq!(details["venues"].as_array().map(Vec::len), Some(1));
}

// =============================================================================
// CRUD
// =============================================================================

#[tokio::test]
async fn test_flash_is_read_once() {
    let app = TestApp::new(|| Ok(Vec::new())).await;

    let response = app.send(post_form("/sources", FEED_FORM, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&response);
    let target = location(&response).to_string();

    let first = body_text(app.send(get(&target, Some(&cookie))).await).await;
    assert!(first.contains("Source was successfully created."));

    let second = body_text(app.send(get(&target, Some(&cookie))).await).await;
    assert!(!second.contains("Source was successfully created."));
}

#[tokio::test]
async fn test_structured_create() {
    let app = TestApp::new(|| Ok(Vec::new())).await;

    let response = app
        .send(send_json(
            "POST",
            "/sources",
            serde_json::json!({ "url": "https://example.com/feed.ics", "title": "Example" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(location(&response), "/sources/1");

    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["title"], "Example");
}

#[tokio::test]
async fn test_structured_create_invalid() {
    let app = TestApp::new(|| Ok(Vec::new())).await;

    let response = app
        .send(send_json("POST", "/sources", serde_json::json!({ "title": "No url" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "errors": ["Url can't be blank"] })
    );
}

#[tokio::test]
async fn test_html_update_invalid_rerenders_edit_form() {
    let app = TestApp::new(|| Ok(Vec::new())).await;
    app.send(post_form("/sources", FEED_FORM, None)).await;

    let response = app.send(post_form("/sources/1", "url=not+a+url", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains("<li>Url is invalid</li>"));
    assert!(page.contains("action=\"/sources/1\""));
}

#[tokio::test]
async fn test_structured_update_and_destroy() {
    let app = TestApp::new(|| Ok(Vec::new())).await;
    app.send(post_form("/sources", FEED_FORM, None)).await;

    let updated = app
        .send(send_json(
            "PUT",
            "/sources/1",
            serde_json::json!({ "title": "Renamed" }),
        ))
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    assert!(body_text(updated).await.is_empty());
    assert_eq!(
        app.sources.find(1).await.unwrap().title.as_deref(),
        Some("Renamed")
    );

    let destroyed = app
        .send(send_json("DELETE", "/sources/1", serde_json::json!({})))
        .await;
    assert_eq!(destroyed.status(), StatusCode::OK);
    assert_eq!(app.sources.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_html_destroy_redirects_to_listing() {
    let app = TestApp::new(|| Ok(Vec::new())).await;
    app.send(post_form("/sources", FEED_FORM, None)).await;

    let response = app.send(post_form("/sources/1/delete", "", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sources");
}

#[tokio::test]
async fn test_edit_and_destroy_missing_source_is_not_found() {
    let app = TestApp::new(|| Ok(Vec::new())).await;

    let edit = app.send(get("/sources/42/edit", None)).await;
    assert_eq!(edit.status(), StatusCode::NOT_FOUND);

    let destroy = app
        .send(send_json("DELETE", "/sources/42", serde_json::json!({})))
        .await;
    assert_eq!(destroy.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(destroy).await["error"],
        "Couldn't find Source with ID=42"
    );
}

#[tokio::test]
async fn test_listing_paginates_html_only() {
    let app = TestApp::new(|| Ok(Vec::new())).await;
    for i in 0..3 {
        let form = format!("url=http%3A%2F%2Fexample.com%2F{}.ics", i);
        app.send(post_form("/sources", &form, None)).await;
    }

    let page = body_text(app.send(get("/sources?per_page=2", None)).await).await;
    assert!(page.contains("Page 1 of 2"));
    assert!(page.contains("/sources?page=2&amp;per_page=2"));
    assert_eq!(page.matches("/edit\">Edit</a>").count(), 2);

    let all = body_json(app.send(get_json("/sources?per_page=2")).await).await;
    assert_eq!(all.as_array().map(Vec::len), Some(3));
    assert_eq!(all[0]["url"], "http://example.com/2.ics");
}

#[tokio::test]
async fn test_structured_requests_leave_no_pending_flash() {
    let app = TestApp::new(|| Ok(upcoming(2))).await;

    for i in 0..20 {
        let created = app
            .send(send_json(
                "POST",
                "/sources",
                serde_json::json!({ "url": format!("http://example.com/{}.ics", i) }),
            ))
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
    }

    let updated = app
        .send(send_json("PUT", "/sources/1", serde_json::json!({ "title": "Renamed" })))
        .await;
    assert_eq!(updated.status(), StatusCode::OK);

    let imported = app
        .send(send_json(
            "POST",
            "/sources/import",
            serde_json::json!({ "url": "http://example.com/feed.ics" }),
        ))
        .await;
    assert_eq!(imported.status(), StatusCode::OK);

    let missing = app.send(get_json("/sources/999")).await;
    assert_eq!(missing.status(), StatusCode::SEE_OTHER);

    assert!(app.flash.is_empty());
}

#[tokio::test]
async fn test_structured_request_to_disabled_import_leaves_no_flash() {
    let settings = Settings {
        import_disabled: true,
        ..Settings::default()
    };
    let app = TestApp::with_settings(|| Ok(upcoming(1)), settings).await;

    let response = app
        .send(send_json(
            "POST",
            "/sources/import",
            serde_json::json!({ "url": "http://example.com/feed.ics" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.fetcher.calls(), 0);
    assert!(app.flash.is_empty());
}
