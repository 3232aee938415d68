//! Graph API client against a mock server.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use liveshop_admin::facebook::{FacebookClient, FacebookError};
use liveshop_integration_tests::facebook_config;

fn videos_body() -> serde_json::Value {
    json!({
        "data": [
            {
                "id": "555",
                "title": "Live sale 9/3",
                "live_status": "LIVE",
                "created_time": "2025-03-09T02:00:00+0000"
            },
            {"id": "444", "title": "Old live", "live_status": "VOD"}
        ]
    })
}

#[tokio::test]
async fn test_list_videos_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v19.0/1001/videos"))
        .and(query_param("access_token", "page-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(videos_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = FacebookClient::new(&facebook_config(&server.uri()));
    let first = client.list_videos(false).await.unwrap();
    let second = client.list_videos(false).await.unwrap();

    assert_eq!(first.len(), 2);
    assert!(first[0].is_live());
    assert!(!first[1].is_live());
    assert_eq!(second.len(), 2);
}

#[tokio::test]
async fn test_list_videos_refresh_bypasses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v19.0/1001/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(videos_body()))
        .expect(2)
        .mount(&server)
        .await;

    let client = FacebookClient::new(&facebook_config(&server.uri()));
    client.list_videos(false).await.unwrap();
    client.list_videos(true).await.unwrap();
}

#[tokio::test]
async fn test_list_comments_follows_cursors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v19.0/555/comments"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": "555_1",
                    "message": "A1 x2",
                    "from": {"id": "900", "name": "Lan"},
                    "created_time": "2025-03-09T02:01:00+0000"
                },
                {
                    "id": "555_2",
                    "message": "b3",
                    "created_time": "2025-03-09T02:02:00+0000"
                }
            ],
            "paging": {
                "cursors": {"before": "c0", "after": "c2"},
                "next": "https://graph.facebook.com/next"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v19.0/555/comments"))
        .and(query_param("after", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": "555_3",
                    "message": "A1",
                    "from": {"id": "901", "name": "Hoa"},
                    "created_time": "2025-03-09T02:03:00+0000"
                }
            ],
            "paging": {"cursors": {"before": "c2", "after": "c3"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = FacebookClient::new(&facebook_config(&server.uri()));
    let comments = client.list_comments("555", false).await.unwrap();

    let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["555_1", "555_2", "555_3"]);
    assert!(comments[1].from.is_none());
    assert_eq!(comments[2].from.as_ref().unwrap().name, "Hoa");
}

#[tokio::test]
async fn test_invalidate_comments_forces_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v19.0/555/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(2)
        .mount(&server)
        .await;

    let client = FacebookClient::new(&facebook_config(&server.uri()));
    client.list_comments("555", false).await.unwrap();
    client.list_comments("555", false).await.unwrap();
    client.invalidate_comments("555").await;
    client.list_comments("555", false).await.unwrap();
}

#[tokio::test]
async fn test_graph_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v19.0/1001/videos"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "Error validating access token",
                "type": "OAuthException",
                "code": 190
            }
        })))
        .mount(&server)
        .await;

    let client = FacebookClient::new(&facebook_config(&server.uri()));
    let err = client.list_videos(false).await.unwrap_err();

    match err {
        FacebookError::Api { code, message } => {
            assert_eq!(code, 190);
            assert_eq!(message, "Error validating access token");
        }
        other => panic!("unexpected error: {other}"),
    }
}
