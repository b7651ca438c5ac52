mod common;

use std::time::Duration;

use chrono::{TimeZone, Utc};
use harvester_core::DurationClass;
use harvester_engine::{
    parse_video_item, ProviderError, ProviderSettings, SearchQuery, VideoProvider, YouTubeProvider,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{init_logging, video_item};

fn provider_for(server: &MockServer, settings: ProviderSettings) -> YouTubeProvider {
    YouTubeProvider::new(ProviderSettings {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        ..settings
    })
    .unwrap()
}

fn query() -> SearchQuery {
    SearchQuery {
        channel_id: "UCabc".to_string(),
        published_after: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        published_before: Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).unwrap(),
        max_results: 50,
    }
}

#[tokio::test]
async fn search_sends_window_and_returns_video_ids() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("channelId", "UCabc"))
        .and(query_param("order", "date"))
        .and(query_param("type", "video"))
        .and(query_param("maxResults", "50"))
        .and(query_param("publishedAfter", "2024-06-01T00:00:00Z"))
        .and(query_param("publishedBefore", "2024-06-04T00:00:00Z"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": { "kind": "youtube#video", "videoId": "v1" },
                  "snippet": { "publishedAt": "2024-06-02T10:00:00Z" } },
                { "id": { "kind": "youtube#video", "videoId": "v2" }, "snippet": {} },
                { "id": { "kind": "youtube#playlist", "playlistId": "p1" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, ProviderSettings::default());
    let hits = provider.search(&query()).await.expect("search ok");

    let ids: Vec<&str> = hits.iter().map(|hit| hit.video_id.as_str()).collect();
    assert_eq!(ids, vec!["v1", "v2"]);
    assert_eq!(
        hits[0].published_at,
        Some(Utc.with_ymd_and_hms(2024, 6, 2, 10, 0, 0).unwrap())
    );
    assert_eq!(hits[1].published_at, None);
}

#[tokio::test]
async fn batch_details_requests_all_ids_in_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("id", "v1,v2"))
        .and(query_param("part", "snippet,statistics,contentDetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [video_item("v1", "UCabc", 10, "PT1M"), video_item("v2", "UCabc", 20, "PT10S")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, ProviderSettings::default());
    let items = provider
        .batch_details(&["v1".to_string(), "v2".to_string()])
        .await
        .expect("details ok");
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn empty_id_list_skips_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let provider = provider_for(&server, ProviderSettings::default());
    assert!(provider.batch_details(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn forbidden_maps_to_auth_error_with_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "The request cannot be completed because you have exceeded your quota." }
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, ProviderSettings::default());
    let err = provider.search(&query()).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Auth {
            status: 403,
            message: "The request cannot be completed because you have exceeded your quota."
                .to_string(),
        }
    );
}

#[tokio::test]
async fn server_errors_keep_their_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = provider_for(&server, ProviderSettings::default());
    let err = provider
        .batch_details(&["v1".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::HttpStatus { status: 503, .. }));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({ "items": [] })),
        )
        .mount(&server)
        .await;

    let settings = ProviderSettings {
        request_timeout: Duration::from_millis(50),
        ..ProviderSettings::default()
    };
    let provider = provider_for(&server, settings);
    let err = provider.search(&query()).await.unwrap_err();
    assert_eq!(err, ProviderError::Timeout);
}

#[tokio::test]
async fn oversized_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Length", "14")
                .set_body_string("{\"items\": [ ]}"),
        )
        .mount(&server)
        .await;

    let settings = ProviderSettings {
        max_bytes: 10,
        ..ProviderSettings::default()
    };
    let provider = provider_for(&server, settings);
    let err = provider.search(&query()).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::TooLarge {
            max_bytes: 10,
            actual: Some(14)
        }
    );
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let provider = provider_for(&server, ProviderSettings::default());
    let err = provider.search(&query()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
}

#[test]
fn detail_item_becomes_a_candidate() {
    let item = json!({
        "id": "abc123",
        "snippet": {
            "channelId": "UCabc",
            "channelTitle": "Cooking",
            "title": "Pasta night",
            "description": "dinner",
            "publishedAt": "2024-06-02T10:00:00Z",
            "tags": ["food", 7, "pasta"]
        },
        "statistics": { "viewCount": "45000", "likeCount": "1200" },
        "contentDetails": { "duration": "PT4M5S" }
    });

    let candidate = parse_video_item(&item).expect("candidate");
    assert_eq!(candidate.video_id, "abc123");
    assert_eq!(candidate.channel_title, "Cooking");
    assert_eq!(candidate.tags, vec!["food".to_string(), "pasta".to_string()]);
    assert_eq!(candidate.view_count, 45_000);
    assert_eq!(candidate.like_count, 1_200);
    assert_eq!(candidate.comment_count, 0);
    assert_eq!(candidate.duration_secs, 245);
    assert_eq!(candidate.duration_class, DurationClass::Long);
    assert_eq!(candidate.raw, item);
}

#[test]
fn detail_item_without_publish_time_is_skipped() {
    let item = json!({ "id": "abc123", "snippet": { "title": "no date" } });
    assert!(parse_video_item(&item).is_none());
}
