use super::*;
use crate::testing::serve_router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

#[tokio::test]
async fn test_disabled_search_is_unavailable() {
    let web = DisabledWebSearch;
    assert!(!web.is_available());
    assert!(matches!(
        web.search("q", 5).await,
        Err(WebSearchError::Unavailable { .. })
    ));
}

#[tokio::test]
async fn test_mock_search_respects_max_results() {
    let web = MockWebSearch::new(vec![
        WebResult::new("a", "first", "https://a.example"),
        WebResult::new("b", "second", "https://b.example"),
        WebResult::new("c", "third", "https://c.example"),
    ]);
    let results = web.search("q", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].url, "https://a.example");
    assert_eq!(web.calls(), 1);
}

#[tokio::test]
async fn test_mock_search_failure() {
    let web = MockWebSearch::new(vec![]);
    web.set_failing(true);
    assert!(web.is_available());
    assert!(web.search("q", 5).await.is_err());
}

#[test]
fn test_http_search_config() {
    let web = HttpWebSearch::new("http://searx:8888/", Duration::from_secs(1)).unwrap();
    assert_eq!(web.base_url(), "http://searx:8888");
    assert!(web.is_available());
}

#[tokio::test]
async fn test_http_search_unreachable_is_error() {
    let web = HttpWebSearch::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
    assert!(web.search("rust", 3).await.is_err());
}

#[test]
fn test_web_result_json_shape() {
    let r = WebResult::new("Title", "Snippet", "https://x.example");
    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["title"], "Title");
    assert_eq!(json["snippet"], "Snippet");
    assert_eq!(json["url"], "https://x.example");
}

fn searx_server() -> Router {
    Router::new().route(
        "/search",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            assert_eq!(params.get("format").map(String::as_str), Some("json"));
            let q = params.get("q").cloned().unwrap_or_default();
            Json(json!({
                "query": q,
                "number_of_results": 4,
                "results": [
                    { "title": format!("About {q}"), "content": "React and Svelte lead.", "url": "https://a.example", "engine": "duckduckgo" },
                    { "title": "No link", "content": "dropped" },
                    { "title": "", "content": "", "url": "https://empty.example" },
                    { "title": "Snippet only", "url": "https://b.example" },
                    { "title": "Third", "content": "kept when asked", "url": "https://c.example" }
                ]
            }))
        }),
    )
}

#[tokio::test]
async fn test_http_search_parses_searx_results() {
    let url = serve_router(searx_server()).await.unwrap();
    let web = HttpWebSearch::new(url, Duration::from_secs(2)).unwrap();

    let results = web.search("javascript frameworks", 5).await.unwrap();
    let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["https://a.example", "https://b.example", "https://c.example"]);
    assert_eq!(results[0].title, "About javascript frameworks");
    assert_eq!(results[0].snippet, "React and Svelte lead.");
    assert_eq!(results[1].snippet, "");
}

#[tokio::test]
async fn test_http_search_truncates_to_max_results() {
    let url = serve_router(searx_server()).await.unwrap();
    let web = HttpWebSearch::new(url, Duration::from_secs(2)).unwrap();

    let results = web.search("rust", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].url, "https://b.example");
}

#[tokio::test]
async fn test_http_search_status_and_missing_results() {
    let router = Router::new()
        .route("/search", get(|| async { StatusCode::TOO_MANY_REQUESTS }));
    let url = serve_router(router).await.unwrap();
    let web = HttpWebSearch::new(url, Duration::from_secs(2)).unwrap();
    assert!(matches!(
        web.search("rust", 3).await,
        Err(WebSearchError::Status { status: 429 })
    ));

    let router = Router::new().route("/search", get(|| async { Json(json!({ "query": "rust" })) }));
    let url = serve_router(router).await.unwrap();
    let web = HttpWebSearch::new(url, Duration::from_secs(2)).unwrap();
    assert!(web.search("rust", 3).await.unwrap().is_empty());
}
