use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fanout::media::MediaFetcher;
use fanout::models::platform::Platform;
use fanout::publishers::mastodon::MastodonPublisher;
use fanout::publishers::Publisher;

mod test_utils;
use test_utils::{account_model, media_model, post_model, publish_context, TEST_ACCESS_TOKEN};

fn mastodon_account(instance: &str) -> fanout::models::social_account::Model {
    account_model(
        Platform::Mastodon,
        Some(json!({
            "instance": instance,
            "client_id": "client-1",
            "client_secret": "secret-1",
        })),
    )
}

fn publisher() -> MastodonPublisher {
    MastodonPublisher::new(
        reqwest::Client::new(),
        Arc::new(MediaFetcher::new(reqwest::Client::new())),
    )
}

#[tokio::test]
async fn status_with_media_uploads_each_file_first() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/pic.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(b"\x89PNG\r\n\x1a\ndata".to_vec()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/media"))
        .and(header("authorization", format!("Bearer {TEST_ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "media-1" })))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "status-9",
            "url": "https://mastodon.example/@tester/status-9",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let account = mastodon_account(&mock_server.uri());
    let post = post_model(&account, "toot with pics", "status", None);
    let url = format!("{}/files/pic.png", mock_server.uri());
    let first = media_model(&post, &url, "image/png", 0);
    let second = media_model(&post, &url, "image/png", 1);
    let ctx = publish_context(account, post, vec![first, second]);

    let result = publisher().publish(&ctx).await.expect("publish succeeds");
    assert_eq!(result.id, "status-9");
    assert_eq!(
        result.url.as_deref(),
        Some("https://mastodon.example/@tester/status-9")
    );

    // The status request references both uploaded media ids.
    let requests = mock_server.received_requests().await.expect("recording on");
    let status_request = requests
        .iter()
        .find(|r| r.url.path() == "/api/v1/statuses")
        .expect("status was created");
    let body: serde_json::Value =
        serde_json::from_slice(&status_request.body).expect("status body is JSON");
    assert_eq!(body["status"], "toot with pics");
    assert_eq!(body["media_ids"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn plain_status_skips_media_upload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "status-1",
            "url": "https://mastodon.example/@tester/status-1",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let account = mastodon_account(&mock_server.uri());
    let post = post_model(&account, "plain toot", "status", None);
    let ctx = publish_context(account, post, vec![]);

    let result = publisher().publish(&ctx).await.expect("publish succeeds");
    assert_eq!(result.id, "status-1");
}

#[tokio::test]
async fn unauthorized_classifies_as_token_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "The access token is invalid" })),
        )
        .mount(&mock_server)
        .await;

    let account = mastodon_account(&mock_server.uri());
    let post = post_model(&account, "toot", "status", None);
    let ctx = publish_context(account, post, vec![]);

    let err = publisher().publish(&ctx).await.expect_err("publish fails");
    assert!(err.is_token_error());
}

#[tokio::test]
async fn missing_instance_meta_fails_closed() {
    let account = account_model(Platform::Mastodon, None);
    let post = post_model(&account, "toot", "status", None);
    let ctx = publish_context(account, post, vec![]);

    let err = publisher().publish(&ctx).await.expect_err("publish fails");
    assert!(matches!(
        err,
        fanout::error::PublishError::MissingMeta { .. }
    ));
}
