//! Access decisions and verification.
//!
//! A user is `Granted` while a stored grant has not passed its expiry and
//! `Unverified` (or `Expired`) otherwise. The only transition into `Granted`
//! is a successful verification: the proof is exchanged for a token, the
//! token must show a subscription, and only then is `now + 24h` persisted.

use crate::models::{grant_window, AccessState, Grant, UserIdentity};
use crate::services::challenge::ChallengeBuilder;
use crate::services::clock::Clock;
use crate::services::grant_store::GrantStore;
use crate::services::metrics::{record_access_check, record_verification};
use crate::services::providers::{MembershipVerifier, VerificationProof};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(Grant),
    Challenge { link: String, state: AccessState },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow(_))
    }
}

/// Why a verification did not produce a grant.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error("authorization code exchange failed")]
    ExchangeFailed,

    #[error("no subscription to the sponsored channel")]
    NotSubscribed,

    #[error("grant could not be persisted")]
    StoreUnavailable,
}

impl VerificationFailure {
    fn label(&self) -> &'static str {
        match self {
            VerificationFailure::ExchangeFailed => "exchange_failed",
            VerificationFailure::NotSubscribed => "not_subscribed",
            VerificationFailure::StoreUnavailable => "store_failed",
        }
    }
}

pub struct AccessEngine {
    store: Arc<GrantStore>,
    verifier: Arc<dyn MembershipVerifier>,
    challenge: ChallengeBuilder,
    clock: Arc<dyn Clock>,
}

impl AccessEngine {
    pub fn new(
        store: Arc<GrantStore>,
        verifier: Arc<dyn MembershipVerifier>,
        challenge: ChallengeBuilder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            verifier,
            challenge,
            clock,
        }
    }

    /// Allow a live grant; otherwise challenge with a fresh authorization link.
    #[tracing::instrument(skip(self), fields(user_id = %user))]
    pub async fn check_access(&self, user: &UserIdentity) -> AccessDecision {
        let now = self.clock.now();
        let grant = self.store.get(user).await;
        let state = AccessState::classify(grant.as_ref(), now);
        record_access_check(state.label());

        match grant {
            Some(grant) if state.is_granted() => AccessDecision::Allow(grant),
            _ => {
                tracing::debug!(state = state.label(), "Access requires verification");
                AccessDecision::Challenge {
                    link: self.challenge.link_for(user),
                    state,
                }
            }
        }
    }

    /// Run the verification flow and, on success, grant a fresh window.
    ///
    /// Provider doubt never grants access. A repeated success re-sets the
    /// expiry from the current instant rather than extending the old one.
    #[tracing::instrument(skip(self, proof), fields(user_id = %user))]
    pub async fn verify(
        &self,
        user: &UserIdentity,
        proof: &VerificationProof,
    ) -> Result<Grant, VerificationFailure> {
        let result = self.run_verification(user, proof).await;
        match &result {
            Ok(grant) => {
                record_verification("granted");
                tracing::info!(expires_at = %grant.expires_at, "Watch access granted");
            }
            Err(failure) => {
                record_verification(failure.label());
                tracing::info!(reason = %failure, "Verification rejected");
            }
        }
        result
    }

    async fn run_verification(
        &self,
        user: &UserIdentity,
        proof: &VerificationProof,
    ) -> Result<Grant, VerificationFailure> {
        let token = self.verifier.exchange_proof(proof).await.map_err(|e| {
            tracing::warn!(error = %e, "Authorization code exchange failed");
            VerificationFailure::ExchangeFailed
        })?;

        let subscribed = self.verifier.is_subscribed(&token).await;
        drop(token);
        if !subscribed {
            return Err(VerificationFailure::NotSubscribed);
        }

        let _guard = self.store.lock_user(user).await;
        let expires_at = self.clock.now() + grant_window();
        self.store.put(user, expires_at).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to persist grant");
            VerificationFailure::StoreUnavailable
        })
    }
}
