use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fanout::config::AppConfig;
use fanout::media::MediaFetcher;
use fanout::models::platform::Platform;
use fanout::publishers::linkedin::LinkedInPublisher;
use fanout::publishers::Publisher;

mod test_utils;
use test_utils::{account_model, media_model, post_model, publish_context};

fn config_for(mock_server: &MockServer) -> Arc<AppConfig> {
    let mut config = AppConfig::default();
    config.linkedin_api_base = mock_server.uri();
    Arc::new(config)
}

fn fetcher() -> Arc<MediaFetcher> {
    Arc::new(MediaFetcher::new(reqwest::Client::new()))
}

#[tokio::test]
async fn personal_post_uses_person_urn_and_header_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/posts"))
        .and(header("X-Restli-Protocol-Version", "2.0.0"))
        .respond_with(
            ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:100"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let publisher =
        LinkedInPublisher::personal(&config_for(&mock_server), reqwest::Client::new(), fetcher());

    let account = account_model(Platform::Linkedin, None);
    let post = post_model(&account, "professional update", "post", None);
    let ctx = publish_context(account, post, vec![]);

    let result = publisher.publish(&ctx).await.expect("publish succeeds");
    assert_eq!(result.id, "urn:li:share:100");
    assert!(result.url.is_none(), "LinkedIn exposes no permalink");

    let requests = mock_server.received_requests().await.expect("recording on");
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("post body is JSON");
    assert_eq!(body["author"], "urn:li:person:user-1");
    assert_eq!(body["commentary"], "professional update");
    assert_eq!(body["lifecycleState"], "PUBLISHED");
}

#[tokio::test]
async fn page_post_uses_organization_urn_from_meta() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/posts"))
        .respond_with(
            ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:200"),
        )
        .mount(&mock_server)
        .await;

    let publisher =
        LinkedInPublisher::page(&config_for(&mock_server), reqwest::Client::new(), fetcher());

    let account = account_model(
        Platform::LinkedinPage,
        Some(json!({ "organization_id": "org-77", "admin_user_id": "user-1" })),
    );
    let post = post_model(&account, "company update", "post", None);
    let ctx = publish_context(account, post, vec![]);

    let result = publisher.publish(&ctx).await.expect("publish succeeds");
    assert_eq!(result.id, "urn:li:share:200");

    let requests = mock_server.received_requests().await.expect("recording on");
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("post body is JSON");
    assert_eq!(body["author"], "urn:li:organization:org-77");
}

#[tokio::test]
async fn page_without_organization_meta_fails_closed() {
    let mock_server = MockServer::start().await;

    let publisher =
        LinkedInPublisher::page(&config_for(&mock_server), reqwest::Client::new(), fetcher());

    let account = account_model(Platform::LinkedinPage, None);
    let post = post_model(&account, "company update", "post", None);
    let ctx = publish_context(account, post, vec![]);

    let err = publisher.publish(&ctx).await.expect_err("publish fails");
    assert!(matches!(
        err,
        fanout::error::PublishError::MissingMeta { .. }
    ));
    assert!(mock_server
        .received_requests()
        .await
        .expect("recording on")
        .is_empty());
}

#[tokio::test]
async fn single_image_is_initialized_uploaded_and_referenced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/media/banner.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(b"\x89PNG\r\n\x1a\ndata".to_vec()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": {
                "uploadUrl": format!("{}/upload-slot", mock_server.uri()),
                "image": "urn:li:image:900",
            },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload-slot"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/posts"))
        .respond_with(
            ResponseTemplate::new(201).insert_header("x-restli-id", "urn:li:share:300"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let publisher =
        LinkedInPublisher::personal(&config_for(&mock_server), reqwest::Client::new(), fetcher());

    let account = account_model(Platform::Linkedin, None);
    let post = post_model(
        &account,
        "with image",
        "post",
        Some(json!({ "alt_text": "a banner" })),
    );
    let media = media_model(
        &post,
        &format!("{}/media/banner.png", mock_server.uri()),
        "image/png",
        0,
    );
    let ctx = publish_context(account, post, vec![media]);

    let result = publisher.publish(&ctx).await.expect("publish succeeds");
    assert_eq!(result.id, "urn:li:share:300");

    let requests = mock_server.received_requests().await.expect("recording on");
    let post_request = requests
        .iter()
        .find(|r| r.url.path() == "/rest/posts")
        .expect("post was created");
    let body: serde_json::Value =
        serde_json::from_slice(&post_request.body).expect("post body is JSON");
    assert_eq!(body["content"]["media"]["id"], "urn:li:image:900");
    assert_eq!(body["content"]["media"]["altText"], "a banner");
}

#[tokio::test]
async fn unauthorized_classifies_as_token_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/posts"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&mock_server)
        .await;

    let publisher =
        LinkedInPublisher::personal(&config_for(&mock_server), reqwest::Client::new(), fetcher());

    let account = account_model(Platform::Linkedin, None);
    let post = post_model(&account, "update", "post", None);
    let ctx = publish_context(account, post, vec![]);

    let err = publisher.publish(&ctx).await.expect_err("publish fails");
    assert!(err.is_token_error());
}
