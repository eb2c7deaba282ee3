use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fanout::media::MediaFetcher;
use fanout::models::platform::Platform;
use fanout::publishers::bluesky::BlueskyPublisher;
use fanout::publishers::Publisher;

mod test_utils;
use test_utils::{account_model, media_model, post_model, publish_context};

fn bluesky_account(service: &str) -> fanout::models::social_account::Model {
    let mut account = account_model(
        Platform::Bluesky,
        Some(json!({
            "service": service,
            "identifier": "tester.bsky.social",
            "password_ciphertext": "AQID",
        })),
    );
    account.platform_user_id = "did:plc:abc123".to_string();
    account.username = "tester.bsky.social".to_string();
    account
}

async fn create_record_body(mock_server: &MockServer) -> JsonValue {
    let requests = mock_server
        .received_requests()
        .await
        .expect("request recording enabled");
    let request = requests
        .iter()
        .find(|r| r.url.path().ends_with("com.atproto.repo.createRecord"))
        .expect("createRecord was called");
    serde_json::from_slice(&request.body).expect("createRecord body is JSON")
}

#[tokio::test]
async fn hashtag_post_sends_single_tag_facet_and_no_embed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "at://did:plc:abc123/app.bsky.feed.post/3kabc",
            "cid": "bafyxyz",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let publisher = BlueskyPublisher::new(
        reqwest::Client::new(),
        Arc::new(MediaFetcher::new(reqwest::Client::new())),
    );

    let account = bluesky_account(&mock_server.uri());
    let post = post_model(&account, "Hello #test", "post", None);
    let ctx = publish_context(account, post, vec![]);

    let result = publisher.publish(&ctx).await.expect("publish succeeds");
    assert_eq!(result.id, "at://did:plc:abc123/app.bsky.feed.post/3kabc");
    assert_eq!(
        result.url.as_deref(),
        Some("https://bsky.app/profile/tester.bsky.social/post/3kabc")
    );

    let body = create_record_body(&mock_server).await;
    assert_eq!(body["repo"], "did:plc:abc123");
    assert_eq!(body["collection"], "app.bsky.feed.post");

    let record = &body["record"];
    assert_eq!(record["text"], "Hello #test");
    assert!(
        record.get("embed").is_none(),
        "no media means no embed key, got {record}"
    );

    let facets = record["facets"].as_array().expect("facets present");
    assert_eq!(facets.len(), 1);
    let feature = &facets[0]["features"][0];
    assert_eq!(feature["$type"], "app.bsky.richtext.facet#tag");
    assert_eq!(feature["tag"], "test");
    assert_eq!(facets[0]["index"]["byteStart"], 6);
    assert_eq!(facets[0]["index"]["byteEnd"], 11);
}

#[tokio::test]
async fn multibyte_text_uses_utf8_byte_offsets() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "at://did:plc:abc123/app.bsky.feed.post/3kdef",
            "cid": "bafyxyz",
        })))
        .mount(&mock_server)
        .await;

    let publisher = BlueskyPublisher::new(
        reqwest::Client::new(),
        Arc::new(MediaFetcher::new(reqwest::Client::new())),
    );

    let account = bluesky_account(&mock_server.uri());
    // The emoji is 4 UTF-8 bytes, so the link facet starts at byte 5.
    let post = post_model(&account, "😀 https://a.co", "post", None);
    let ctx = publish_context(account, post, vec![]);

    publisher.publish(&ctx).await.expect("publish succeeds");

    let body = create_record_body(&mock_server).await;
    let facets = body["record"]["facets"].as_array().expect("facets present");
    assert_eq!(facets.len(), 1);
    assert_eq!(facets[0]["index"]["byteStart"], 5);
    assert_eq!(facets[0]["features"][0]["$type"], "app.bsky.richtext.facet#link");
    assert_eq!(facets[0]["features"][0]["uri"], "https://a.co");
}

#[tokio::test]
async fn image_post_uploads_blob_and_embeds_it() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/media/photo.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(b"\x89PNG\r\n\x1a\nrest".to_vec()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.uploadBlob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blob": {
                "$type": "blob",
                "ref": {"$link": "bafyblob"},
                "mimeType": "image/png",
                "size": 12,
            },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "at://did:plc:abc123/app.bsky.feed.post/3kghi",
            "cid": "bafyxyz",
        })))
        .mount(&mock_server)
        .await;

    let publisher = BlueskyPublisher::new(
        reqwest::Client::new(),
        Arc::new(MediaFetcher::new(reqwest::Client::new())),
    );

    let account = bluesky_account(&mock_server.uri());
    let post = post_model(&account, "look at this", "post", None);
    let media = media_model(
        &post,
        &format!("{}/media/photo.png", mock_server.uri()),
        "image/png",
        0,
    );
    let ctx = publish_context(account, post, vec![media]);

    publisher.publish(&ctx).await.expect("publish succeeds");

    let body = create_record_body(&mock_server).await;
    let embed = &body["record"]["embed"];
    assert_eq!(embed["$type"], "app.bsky.embed.images");
    assert_eq!(embed["images"][0]["image"]["ref"]["$link"], "bafyblob");
}

#[tokio::test]
async fn mention_is_resolved_to_did() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/xrpc/com.atproto.identity.resolveHandle"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "did": "did:plc:alice" })),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "at://did:plc:abc123/app.bsky.feed.post/3kjkl",
            "cid": "bafyxyz",
        })))
        .mount(&mock_server)
        .await;

    let publisher = BlueskyPublisher::new(
        reqwest::Client::new(),
        Arc::new(MediaFetcher::new(reqwest::Client::new())),
    );

    let account = bluesky_account(&mock_server.uri());
    let post = post_model(&account, "cc @alice.bsky.social", "post", None);
    let ctx = publish_context(account, post, vec![]);

    publisher.publish(&ctx).await.expect("publish succeeds");

    let body = create_record_body(&mock_server).await;
    let feature = &body["record"]["facets"][0]["features"][0];
    assert_eq!(feature["$type"], "app.bsky.richtext.facet#mention");
    assert_eq!(feature["did"], "did:plc:alice");
}

#[tokio::test]
async fn expired_token_error_classifies_as_token_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "ExpiredToken",
            "message": "Token has expired",
        })))
        .mount(&mock_server)
        .await;

    let publisher = BlueskyPublisher::new(
        reqwest::Client::new(),
        Arc::new(MediaFetcher::new(reqwest::Client::new())),
    );

    let account = bluesky_account(&mock_server.uri());
    let post = post_model(&account, "hello", "post", None);
    let ctx = publish_context(account, post, vec![]);

    let err = publisher.publish(&ctx).await.expect_err("publish fails");
    assert!(err.is_token_error());
}

#[tokio::test]
async fn unsupported_content_type_fails_before_any_call() {
    let mock_server = MockServer::start().await;

    let publisher = BlueskyPublisher::new(
        reqwest::Client::new(),
        Arc::new(MediaFetcher::new(reqwest::Client::new())),
    );

    let account = bluesky_account(&mock_server.uri());
    let post = post_model(&account, "hello", "instagram_reel", None);
    let ctx = publish_context(account, post, vec![]);

    let err = publisher.publish(&ctx).await.expect_err("publish fails");
    assert!(matches!(
        err,
        fanout::error::PublishError::UnsupportedContentType { .. }
    ));
    assert!(mock_server
        .received_requests()
        .await
        .expect("recording enabled")
        .is_empty());
}
