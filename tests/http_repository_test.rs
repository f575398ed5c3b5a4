//! Tests for the HTTP novel repository using wiremock.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storyshelf::DiscoveryError;
use storyshelf::repository::{HttpNovelRepository, NovelRepository};
use storyshelf::types::{NovelFilter, NovelSort};

fn novel_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": format!("Title {id}"),
        "author": "someone",
        "rating": 4.7,
        "chapterCount": 120,
        "lastUpdated": "2026-10-01T12:00:00Z",
        "tags": ["fantasy"]
    })
}

#[tokio::test]
async fn posts_query_and_decodes_novels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/novels:query"))
        .and(body_partial_json(json!({
            "filter": {"tag": "fantasy"},
            "sort": "popularity",
            "limit": 2
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"novels": [novel_json("a"), novel_json("b")]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let repository = HttpNovelRepository::new(server.uri()).unwrap();
    let novels = repository
        .query(&NovelFilter::default().tag("fantasy"), NovelSort::Popularity, 2)
        .await
        .unwrap();

    assert_eq!(novels.len(), 2);
    assert_eq!(novels[0].id, "a");
    assert_eq!(novels[0].chapter_count, 120);
    assert!(novels[1].has_tag("fantasy"));
}

#[tokio::test]
async fn sends_bearer_token_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"novels": []})))
        .expect(1)
        .mount(&server)
        .await;

    let repository = HttpNovelRepository::new(format!("{}/", server.uri()))
        .unwrap()
        .api_key("secret-key");
    let novels = repository
        .query(&NovelFilter::default(), NovelSort::Newest, 5)
        .await
        .unwrap();
    assert!(novels.is_empty());
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let repository = HttpNovelRepository::new(server.uri()).unwrap();
    let err = repository
        .query(&NovelFilter::default(), NovelSort::Rating, 5)
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn status_codes_map_to_errors() {
    let cases = [(401, false), (404, false), (500, true), (503, true)];
    for (status, transient) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let repository = HttpNovelRepository::new(server.uri()).unwrap();
        let err = repository
            .query(&NovelFilter::default(), NovelSort::Popularity, 5)
            .await
            .unwrap_err();

        match &err {
            DiscoveryError::RepositoryApi { status: got, .. } => assert_eq!(*got, status),
            other => panic!("expected API error for {status}, got {other:?}"),
        }
        assert_eq!(err.is_transient(), transient, "status {status}");
    }
}

#[tokio::test]
async fn malformed_body_is_a_repository_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let repository = HttpNovelRepository::new(server.uri()).unwrap();
    let err = repository
        .query(&NovelFilter::default(), NovelSort::Popularity, 5)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "REPOSITORY_ERROR");
}

#[tokio::test]
async fn request_timeout_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"novels": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let repository =
        HttpNovelRepository::with_timeout(server.uri(), Duration::from_millis(50)).unwrap();
    let err = repository
        .query(&NovelFilter::default(), NovelSort::Popularity, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Repository(_)));
    assert!(err.is_transient());
}
