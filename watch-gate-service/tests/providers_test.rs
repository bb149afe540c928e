//! External adapters against stubbed HTTP endpoints.

use secrecy::Secret;
use serde_json::json;
use std::time::Duration;
use watch_gate_service::config::{CatalogConfig, MembershipConfig, OAuthConfig, TelegramConfig};
use watch_gate_service::models::{ContentItem, UserIdentity};
use watch_gate_service::services::{
    AccessToken, CatalogError, ContentCatalog, GoogleMembershipVerifier, MembershipVerifier,
    ProviderError, ScrapedCatalog, VerificationProof,
};
use watch_gate_service::transport::{ChatTransport, TelegramTransport, TransportError};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(2);

fn verifier(server: &MockServer) -> GoogleMembershipVerifier {
    GoogleMembershipVerifier::new(
        OAuthConfig {
            client_id: "client-123".to_string(),
            client_secret: Secret::new("test-secret".to_string()),
            redirect_uri: "https://bot.example.com/oauth/callback".to_string(),
            authorize_url: format!("{}/o/oauth2/auth", server.uri()),
            token_url: format!("{}/token", server.uri()),
        },
        MembershipConfig {
            api_base: format!("{}/youtube/v3", server.uri()),
            sponsored_channel_id: "UC-sponsored".to_string(),
        },
        TIMEOUT,
    )
    .expect("Failed to build verifier")
}

fn catalog(server: &MockServer) -> ScrapedCatalog {
    ScrapedCatalog::new(
        &CatalogConfig {
            base_url: server.uri(),
            listing_path: "/home".to_string(),
            limit: 5,
            user_agent: "watch-gate-test".to_string(),
        },
        TIMEOUT,
    )
    .expect("Failed to build catalog")
}

fn telegram(server: &MockServer) -> TelegramTransport {
    TelegramTransport::new(
        &TelegramConfig {
            bot_token: Secret::new("42:test-token".to_string()),
            api_base: server.uri(),
            poll_timeout_secs: 0,
        },
        TIMEOUT,
    )
    .expect("Failed to build transport")
}

// =============================================================================
// Google token exchange
// =============================================================================

#[tokio::test]
async fn exchange_posts_authorization_code_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=4%2F0AY0e-good"))
        .and(body_string_contains("client_secret=test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = verifier(&server)
        .exchange_proof(&VerificationProof::new("4/0AY0e-good"))
        .await
        .expect("Exchange should succeed");

    assert_eq!(token.expose(), "ya29.token");
}

#[tokio::test]
async fn exchange_rejected_by_provider_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let result = verifier(&server)
        .exchange_proof(&VerificationProof::new("used-code"))
        .await;

    assert!(matches!(result, Err(ProviderError::Rejected(400))));
}

#[tokio::test]
async fn exchange_without_access_token_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let result = verifier(&server)
        .exchange_proof(&VerificationProof::new("4/0AY0e-good"))
        .await;

    assert!(matches!(
        result,
        Err(ProviderError::MissingField("access_token"))
    ));
}

#[tokio::test]
async fn exchange_with_non_json_body_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = verifier(&server)
        .exchange_proof(&VerificationProof::new("4/0AY0e-good"))
        .await;

    assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
}

// =============================================================================
// YouTube subscription query
// =============================================================================

#[tokio::test]
async fn subscription_found_for_sponsored_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/subscriptions"))
        .and(query_param("part", "snippet"))
        .and(query_param("mine", "true"))
        .and(query_param("forChannelId", "UC-sponsored"))
        .and(header("authorization", "Bearer ya29.token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "sub-1" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(verifier(&server).is_subscribed(&AccessToken::new("ya29.token")).await);
}

#[tokio::test]
async fn empty_subscription_list_is_not_subscribed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    assert!(!verifier(&server).is_subscribed(&AccessToken::new("ya29.token")).await);
}

#[tokio::test]
async fn subscription_query_failures_fail_closed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/subscriptions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(!verifier(&server).is_subscribed(&AccessToken::new("ya29.token")).await);
}

#[tokio::test]
async fn subscription_query_without_items_fails_closed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "kind": "youtube#subscriptionListResponse" })))
        .mount(&server)
        .await;

    assert!(!verifier(&server).is_subscribed(&AccessToken::new("ya29.token")).await);
}

#[tokio::test]
async fn slow_subscription_query_times_out_closed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/subscriptions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "items": [{ "id": "sub-1" }] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    assert!(!verifier(&server).is_subscribed(&AccessToken::new("ya29.token")).await);
}

// =============================================================================
// Catalog scraper
// =============================================================================

const LISTING_PAGE: &str = r#"
<html><body>
  <div class="film_list-wrap">
    <div class="flw-item"><h2 class="film-name"><a href="/movie/watch-moviex-1">MovieX</a></h2></div>
    <div class="flw-item"><h2 class="film-name"><a href="/movie/watch-movie-y-2">Movie Y</a></h2></div>
  </div>
</body></html>
"#;

#[tokio::test]
async fn listing_is_scraped_with_configured_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/home"))
        .and(header("user-agent", "watch-gate-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let items = catalog(&server).list_latest().await.expect("Listing failed");

    assert_eq!(
        items,
        vec![
            ContentItem::new("MovieX", format!("{}/movie/watch-moviex-1", server.uri())),
            ContentItem::new("Movie Y", format!("{}/movie/watch-movie-y-2", server.uri())),
        ]
    );
}

#[tokio::test]
async fn listing_error_status_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = catalog(&server).list_latest().await;

    assert!(matches!(result, Err(CatalogError::Status(503))));
}

#[tokio::test]
async fn detail_page_player_is_resolved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/watch-moviex-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="player"><iframe src="https://player.test/embed/x"></iframe></div>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movie/watch-movie-y-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Coming soon</p>"))
        .mount(&server)
        .await;

    let catalog = catalog(&server);

    assert_eq!(
        catalog
            .resolve_stream(&format!("{}/movie/watch-moviex-1", server.uri()))
            .await
            .expect("Detail fetch failed")
            .as_deref(),
        Some("https://player.test/embed/x")
    );
    assert_eq!(
        catalog
            .resolve_stream(&format!("{}/movie/watch-movie-y-2", server.uri()))
            .await
            .expect("Detail fetch failed"),
        None
    );
}

// =============================================================================
// Telegram transport
// =============================================================================

#[tokio::test]
async fn poll_reads_text_messages_and_skips_others() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot42:test-token/getUpdates"))
        .and(body_string_contains("\"offset\":7"))
        .and(body_string_contains("\"allowed_updates\":[\"message\"]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {
                    "update_id": 7,
                    "message": {
                        "message_id": 1,
                        "chat": { "id": 1001, "type": "private" },
                        "from": { "id": 1001, "is_bot": false, "first_name": "Ana" },
                        "text": "MovieX"
                    }
                },
                {
                    "update_id": 8,
                    "edited_message": {
                        "message_id": 1,
                        "chat": { "id": 1001, "type": "private" },
                        "text": "MovieY"
                    }
                }
            ]
        })))
        .mount(&server)
        .await;

    let updates = telegram(&server).poll(7).await.expect("Poll failed");

    assert_eq!(updates.len(), 2);
    let message = updates[0].message.as_ref().expect("First update has text");
    assert_eq!(message.chat_id, 1001);
    assert_eq!(message.user, UserIdentity::new("1001"));
    assert_eq!(message.text, "MovieX");
    assert_eq!(updates[1].update_id, 8);
    assert!(updates[1].message.is_none());
}

#[tokio::test]
async fn send_disables_link_previews() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot42:test-token/sendMessage"))
        .and(body_string_contains("\"chat_id\":1001"))
        .and(body_string_contains("\"disable_web_page_preview\":true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 99 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    telegram(&server)
        .send(1001, "Watch MovieX here: https://player.test/embed/x")
        .await
        .expect("Send failed");
}

#[tokio::test]
async fn api_rejection_is_reported_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot42:test-token/sendMessage"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&server)
        .await;

    let err = telegram(&server)
        .send(1001, "hello")
        .await
        .expect_err("Send should fail");

    assert!(matches!(err, TransportError::Api { status: 403, .. }));
    assert!(!err.to_string().contains("test-token"));
}
