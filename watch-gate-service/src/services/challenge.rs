use crate::config::OAuthConfig;
use crate::models::UserIdentity;
use url::Url;

/// Read-only access to the user's YouTube account, enough to list subscriptions.
pub const MEMBERSHIP_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

/// Builds the authorization link sent to unverified users.
///
/// The requesting user's identity travels as `state`, which the provider
/// echoes back on the redirect so the callback can be matched to the user.
#[derive(Debug, Clone)]
pub struct ChallengeBuilder {
    authorize_url: Url,
    client_id: String,
    redirect_uri: String,
}

impl ChallengeBuilder {
    pub fn new(oauth: &OAuthConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            authorize_url: Url::parse(&oauth.authorize_url)?,
            client_id: oauth.client_id.clone(),
            redirect_uri: oauth.redirect_uri.clone(),
        })
    }

    pub fn link_for(&self, user: &UserIdentity) -> String {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", MEMBERSHIP_SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", user.as_str());
        url.to_string()
    }
}
