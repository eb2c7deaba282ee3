use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fanout::config::AppConfig;
use fanout::error::PublishError;
use fanout::media::MediaFetcher;
use fanout::models::platform::Platform;
use fanout::publishers::youtube::YouTubePublisher;
use fanout::publishers::Publisher;

mod test_utils;
use test_utils::{account_model, media_model, post_model, publish_context};

fn publisher(mock_server: &MockServer) -> YouTubePublisher {
    let mut config = AppConfig::default();
    config.youtube_upload_base = mock_server.uri();
    YouTubePublisher::new(
        &Arc::new(config),
        reqwest::Client::new(),
        Arc::new(MediaFetcher::new(reqwest::Client::new())),
    )
}

#[tokio::test]
async fn resumable_upload_inits_then_puts_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos/short.mp4"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(b"\x00\x00\x00\x18ftypmp42data".to_vec()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(200).insert_header(
            "location",
            format!("{}/upload-session/1", mock_server.uri()).as_str(),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload-session/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "yt-video-1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let account = account_model(Platform::Youtube, None);
    let post = post_model(&account, "My first short", "short", None);
    let media = media_model(
        &post,
        &format!("{}/videos/short.mp4", mock_server.uri()),
        "video/mp4",
        0,
    );
    let ctx = publish_context(account, post, vec![media]);

    let result = publisher(&mock_server)
        .publish(&ctx)
        .await
        .expect("publish succeeds");
    assert_eq!(result.id, "yt-video-1");
    assert_eq!(
        result.url.as_deref(),
        Some("https://www.youtube.com/shorts/yt-video-1")
    );

    // The init metadata carries the #Shorts-suffixed title.
    let requests = mock_server.received_requests().await.expect("recording on");
    let init_request = requests
        .iter()
        .find(|r| r.url.path() == "/upload/youtube/v3/videos")
        .expect("init was called");
    let body: serde_json::Value =
        serde_json::from_slice(&init_request.body).expect("init body is JSON");
    assert_eq!(body["snippet"]["title"], "My first short #Shorts");
    assert_eq!(body["status"]["privacyStatus"], "public");
}

#[tokio::test]
async fn missing_location_header_is_a_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let account = account_model(Platform::Youtube, None);
    let post = post_model(&account, "short", "short", None);
    let media = media_model(&post, "https://cdn.example.com/short.mp4", "video/mp4", 0);
    let ctx = publish_context(account, post, vec![media]);

    let err = publisher(&mock_server)
        .publish(&ctx)
        .await
        .expect_err("publish fails");
    assert!(matches!(err, PublishError::Rejected { .. }));
}

#[tokio::test]
async fn non_video_first_media_is_rejected() {
    let mock_server = MockServer::start().await;

    let account = account_model(Platform::Youtube, None);
    let post = post_model(&account, "short", "short", None);
    let media = media_model(&post, "https://cdn.example.com/a.jpg", "image/jpeg", 0);
    let ctx = publish_context(account, post, vec![media]);

    let err = publisher(&mock_server)
        .publish(&ctx)
        .await
        .expect_err("publish fails");
    assert!(matches!(err, PublishError::Rejected { .. }));
}

#[tokio::test]
async fn unauthorized_init_classifies_as_token_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .mount(&mock_server)
        .await;

    let account = account_model(Platform::Youtube, None);
    let post = post_model(&account, "short", "short", None);
    let media = media_model(&post, "https://cdn.example.com/short.mp4", "video/mp4", 0);
    let ctx = publish_context(account, post, vec![media]);

    let err = publisher(&mock_server)
        .publish(&ctx)
        .await
        .expect_err("publish fails");
    assert!(err.is_token_error());
}
