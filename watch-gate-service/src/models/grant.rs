use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the access window granted by one successful verification.
pub const GRANT_WINDOW_HOURS: i64 = 24;

pub fn grant_window() -> Duration {
    Duration::hours(GRANT_WINDOW_HOURS)
}

/// Stable identifier of a chat user, as supplied by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for UserIdentity {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Watch access for one user until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub user: UserIdentity,
    pub expires_at: DateTime<Utc>,
}

impl Grant {
    /// A grant is live up to and including its expiry instant.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Read-time classification of a user's access.
///
/// `Expired` is never stored; it is derived from a stale grant and is handled
/// exactly like `Unverified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessState {
    Unverified,
    Granted { expires_at: DateTime<Utc> },
    Expired { expired_at: DateTime<Utc> },
}

impl AccessState {
    pub fn classify(grant: Option<&Grant>, now: DateTime<Utc>) -> Self {
        match grant {
            None => AccessState::Unverified,
            Some(grant) if grant.is_live_at(now) => AccessState::Granted {
                expires_at: grant.expires_at,
            },
            Some(grant) => AccessState::Expired {
                expired_at: grant.expires_at,
            },
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, AccessState::Granted { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccessState::Unverified => "unverified",
            AccessState::Granted { .. } => "granted",
            AccessState::Expired { .. } => "expired",
        }
    }
}
