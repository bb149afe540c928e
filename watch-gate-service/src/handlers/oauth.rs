//! Landing page for the identity provider's redirect.
//!
//! The provider sends the browser back with `code` and `state` (the chat user
//! id the link was built for). Verification runs exactly as for
//! `/callback <code>`, and the outcome is also posted to the user's chat.
//! Landings count against the same per-user quota as chat messages; over
//! quota the provider is not called and nothing is posted.

use crate::models::{Reply, UserIdentity};
use crate::services::Verdict;
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[tracing::instrument(skip_all)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, String) {
    if let Some(error) = params.error.as_deref() {
        tracing::info!(error, "Authorization declined at provider");
        return bad_request("Sign-in was cancelled. Go back to the chat and try again.");
    }

    let code = params.code.as_deref().map(str::trim).unwrap_or_default();
    let user = params.state.as_deref().map(str::trim).unwrap_or_default();
    if code.is_empty() || user.is_empty() {
        return bad_request("This link is incomplete. Go back to the chat and try again.");
    }
    let Ok(chat_id) = user.parse::<i64>() else {
        return bad_request("This link is not valid. Go back to the chat and try again.");
    };

    let user = UserIdentity::from(chat_id);
    if let Verdict::Throttled { .. } = state.throttle.check(&user) {
        tracing::warn!(user_id = %user, "Redirect landing throttled");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts. Wait a minute and try again.".to_string(),
        );
    }

    let reply = state.handler.verify(&user, code.to_string()).await;

    if let Err(e) = state.transport.send(chat_id, &reply.text()).await {
        tracing::warn!(user_id = %user, error = %e, "Failed to notify chat of verification result");
    }

    let status = match reply {
        Reply::Verified { .. } => StatusCode::OK,
        _ => StatusCode::FORBIDDEN,
    };
    (status, format!("{}\n\nYou can close this page.", reply.text()))
}

fn bad_request(message: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.to_string())
}
