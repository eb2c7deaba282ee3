use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fanout::config::AppConfig;
use fanout::error::PublishError;
use fanout::media::MediaFetcher;
use fanout::models::platform::Platform;
use fanout::models::post_platform;
use fanout::publishers::{NoopSleeper, PublishService, PublisherRegistry};
use fanout::repositories::{PostPlatformRepository, SocialAccountRepository};
use fanout::verification::{LinkedInTokenSynchronizer, TokenRefresher};

mod test_utils;
use test_utils::{
    insert_account, insert_post_platform, insert_workspace, setup_test_db, test_crypto_key,
    AccountSpec, TEST_ACCESS_TOKEN,
};

struct Harness {
    db: Arc<sea_orm::DatabaseConnection>,
    service: PublishService,
    workspace_id: uuid::Uuid,
}

async fn harness(config: AppConfig) -> anyhow::Result<Harness> {
    let db = Arc::new(setup_test_db().await?);
    let workspace_id = insert_workspace(db.as_ref(), "owner@example.com").await?;
    let config = Arc::new(config);

    let accounts = Arc::new(SocialAccountRepository::new(db.clone(), test_crypto_key()));
    let posts = Arc::new(PostPlatformRepository::new(db.clone()));
    let http = reqwest::Client::new();
    let fetcher = Arc::new(MediaFetcher::new(http.clone()));
    let registry = Arc::new(PublisherRegistry::from_config(
        &config,
        http.clone(),
        fetcher,
        Arc::new(NoopSleeper),
    ));
    let synchronizer = Arc::new(LinkedInTokenSynchronizer::new(accounts.clone()));
    let refresher = Arc::new(TokenRefresher::new(
        http,
        config,
        accounts.clone(),
        synchronizer,
    ));
    let service = PublishService::new(accounts, posts, registry, refresher);

    Ok(Harness {
        db,
        service,
        workspace_id,
    })
}

#[tokio::test]
async fn publishes_through_the_registered_strategy() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": "555" } })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = AppConfig::default();
    config.x_api_base = mock_server.uri();
    let h = harness(config).await?;

    let mut spec = AccountSpec::new(h.workspace_id, Platform::X);
    spec.token_expires_at = Some(Utc::now() + Duration::hours(6));
    let account = insert_account(h.db.as_ref(), &test_crypto_key(), spec).await?;
    let post = insert_post_platform(h.db.as_ref(), &account, "hello world", "text", None).await?;

    let result = h.service.publish(post.id).await?;
    assert_eq!(result.id, "555");
    assert_eq!(result.url.as_deref(), Some("https://x.com/tester/status/555"));
    Ok(())
}

#[tokio::test]
async fn expiring_token_is_refreshed_before_publish() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed-access",
            "refresh_token": "renewed-refresh",
            "expires_in": 7200,
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The tweet must go out with the renewed token, not the stored one.
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(header("authorization", "Bearer renewed-access"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": "556" } })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = AppConfig::default();
    config.x_api_base = mock_server.uri();
    config.x_client_id = Some("x-client".to_string());
    config.x_client_secret = Some("x-secret".to_string());
    let h = harness(config).await?;

    let mut spec = AccountSpec::new(h.workspace_id, Platform::X);
    spec.access_token = TEST_ACCESS_TOKEN;
    spec.refresh_token = Some("old-refresh");
    spec.token_expires_at = Some(Utc::now() - Duration::minutes(1));
    let account = insert_account(h.db.as_ref(), &test_crypto_key(), spec).await?;
    let post = insert_post_platform(h.db.as_ref(), &account, "fresh token", "text", None).await?;

    let result = h.service.publish(post.id).await?;
    assert_eq!(result.id, "556");
    Ok(())
}

#[tokio::test]
async fn disabled_posts_are_not_published() -> anyhow::Result<()> {
    let h = harness(AppConfig::default()).await?;

    let mut spec = AccountSpec::new(h.workspace_id, Platform::X);
    spec.token_expires_at = Some(Utc::now() + Duration::hours(6));
    let account = insert_account(h.db.as_ref(), &test_crypto_key(), spec).await?;
    let post = insert_post_platform(h.db.as_ref(), &account, "off", "text", None).await?;

    let disable = post_platform::ActiveModel {
        id: Set(post.id),
        enabled: Set(false),
        ..Default::default()
    };
    disable.update(h.db.as_ref()).await?;

    let err = h.service.publish(post.id).await.expect_err("publish fails");
    assert!(matches!(err, PublishError::PostDisabled(_)));
    Ok(())
}

#[tokio::test]
async fn disconnected_accounts_are_not_published_to() -> anyhow::Result<()> {
    let h = harness(AppConfig::default()).await?;

    let mut spec = AccountSpec::new(h.workspace_id, Platform::X);
    spec.connected = false;
    let account = insert_account(h.db.as_ref(), &test_crypto_key(), spec).await?;
    let post = insert_post_platform(h.db.as_ref(), &account, "dead", "text", None).await?;

    let err = h.service.publish(post.id).await.expect_err("publish fails");
    assert!(matches!(err, PublishError::AccountDisconnected(_)));
    Ok(())
}

#[tokio::test]
async fn media_is_loaded_in_declared_order() -> anyhow::Result<()> {
    let h = harness(AppConfig::default()).await?;

    let mut spec = AccountSpec::new(h.workspace_id, Platform::Pinterest);
    spec.token_expires_at = Some(Utc::now() + Duration::hours(6));
    let account = insert_account(h.db.as_ref(), &test_crypto_key(), spec).await?;
    let post = insert_post_platform(h.db.as_ref(), &account, "pins", "pinterest_carousel", None)
        .await?;

    // Inserted out of order on purpose.
    test_utils::insert_media(h.db.as_ref(), &post, "https://cdn.example.com/2.jpg", "image/jpeg", 2)
        .await?;
    test_utils::insert_media(h.db.as_ref(), &post, "https://cdn.example.com/0.jpg", "image/jpeg", 0)
        .await?;
    test_utils::insert_media(h.db.as_ref(), &post, "https://cdn.example.com/1.jpg", "image/jpeg", 1)
        .await?;

    let posts = PostPlatformRepository::new(h.db.clone());
    let media = posts.media_for(post.id).await?;
    let urls: Vec<_> = media.iter().map(|m| m.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://cdn.example.com/0.jpg",
            "https://cdn.example.com/1.jpg",
            "https://cdn.example.com/2.jpg",
        ]
    );
    Ok(())
}
