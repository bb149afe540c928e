//! Google OAuth code exchange and YouTube subscription lookup.

use super::{AccessToken, MembershipVerifier, ProviderError, VerificationProof};
use crate::config::{MembershipConfig, OAuthConfig};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionListResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

pub struct GoogleMembershipVerifier {
    client: Client,
    oauth: OAuthConfig,
    membership: MembershipConfig,
}

impl GoogleMembershipVerifier {
    pub fn new(
        oauth: OAuthConfig,
        membership: MembershipConfig,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            oauth,
            membership,
        })
    }

    fn subscriptions_url(&self) -> String {
        format!("{}/subscriptions", self.membership.api_base)
    }
}

#[async_trait]
impl MembershipVerifier for GoogleMembershipVerifier {
    async fn exchange_proof(&self, proof: &VerificationProof) -> Result<AccessToken, ProviderError> {
        let response = self
            .client
            .post(&self.oauth.token_url)
            .form(&[
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.expose_secret().as_str()),
                ("code", proof.expose()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to contact Google: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Google token exchange rejected");
            return Err(ProviderError::Rejected(status.as_u16()));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse token response: {}", e))
        })?;

        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or(ProviderError::MissingField("access_token"))
    }

    async fn is_subscribed(&self, token: &AccessToken) -> bool {
        let response = match self
            .client
            .get(self.subscriptions_url())
            .query(&[
                ("part", "snippet"),
                ("mine", "true"),
                ("forChannelId", self.membership.sponsored_channel_id.as_str()),
            ])
            .bearer_auth(token.expose())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Subscription query failed");
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Subscription query rejected");
            return false;
        }

        match response.json::<SubscriptionListResponse>().await {
            Ok(list) => !list.items.is_empty(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse subscription response");
                false
            }
        }
    }
}
