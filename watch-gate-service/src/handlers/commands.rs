//! Chat command parsing and handling.

use crate::models::{Reply, UserIdentity};
use crate::services::metrics::record_update;
use crate::services::{AccessDecision, AccessEngine, ContentLookup, VerificationProof};
use crate::transport::InboundMessage;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`, with or without a deep-link payload.
    Start,
    /// `/callback <code>`; `None` when the code is missing.
    Callback(Option<String>),
    Status,
    Help,
    Unknown(String),
    /// Plain text: a title picked from the listing.
    Select(String),
}

impl Command {
    /// `None` for blank messages, which get no reply.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let Some(body) = text.strip_prefix('/') else {
            return Some(Command::Select(text.to_string()));
        };

        let (word, rest) = match body.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (body, ""),
        };
        // Group chats address commands as `/cmd@BotName`.
        let name = word.split('@').next().unwrap_or(word);

        Some(match name {
            "start" => Command::Start,
            "callback" if rest.is_empty() => Command::Callback(None),
            "callback" => Command::Callback(Some(rest.to_string())),
            "status" => Command::Status,
            "help" => Command::Help,
            other => Command::Unknown(other.to_string()),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Callback(_) => "callback",
            Command::Status => "status",
            Command::Help => "help",
            Command::Unknown(_) => "unknown",
            Command::Select(_) => "select",
        }
    }
}

/// Turns inbound chat messages into replies.
#[derive(Clone)]
pub struct CommandHandler {
    engine: Arc<AccessEngine>,
    lookup: ContentLookup,
}

impl CommandHandler {
    pub fn new(engine: Arc<AccessEngine>, lookup: ContentLookup) -> Self {
        Self { engine, lookup }
    }

    pub async fn handle(&self, message: &InboundMessage) -> Option<Reply> {
        let command = Command::parse(&message.text)?;
        Some(self.execute(&message.user, command).await)
    }

    #[tracing::instrument(skip_all, fields(user_id = %user, command = command.kind()))]
    pub async fn execute(&self, user: &UserIdentity, command: Command) -> Reply {
        record_update(command.kind());
        match command {
            Command::Start => self.lookup.listing_reply().await,
            Command::Callback(None) => Reply::CallbackUsage,
            Command::Callback(Some(code)) => self.verify(user, code).await,
            Command::Status => match self.engine.check_access(user).await {
                AccessDecision::Allow(grant) => Reply::Status {
                    expires_at: grant.expires_at,
                },
                AccessDecision::Challenge { link, .. } => Reply::Challenge { link },
            },
            Command::Help | Command::Unknown(_) => Reply::Help,
            Command::Select(title) => match self.engine.check_access(user).await {
                AccessDecision::Allow(_) => self.lookup.resolve(&title).await.into_reply(),
                AccessDecision::Challenge { link, .. } => Reply::Challenge { link },
            },
        }
    }

    /// Shared by `/callback` and the HTTP redirect landing.
    pub async fn verify(&self, user: &UserIdentity, code: String) -> Reply {
        let proof = VerificationProof::new(code);
        match self.engine.verify(user, &proof).await {
            Ok(grant) => Reply::Verified {
                expires_at: grant.expires_at,
            },
            Err(_) => Reply::VerificationFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_selections() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/start promo-7"), Some(Command::Start));
        assert_eq!(Command::parse("/start@WatchGateBot"), Some(Command::Start));
        assert_eq!(Command::parse("/status"), Some(Command::Status));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(
            Command::parse("  Movie Y  "),
            Some(Command::Select("Movie Y".to_string()))
        );
        assert_eq!(
            Command::parse("/rewind 10"),
            Some(Command::Unknown("rewind".to_string()))
        );
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn callback_code_is_optional() {
        assert_eq!(Command::parse("/callback"), Some(Command::Callback(None)));
        assert_eq!(Command::parse("/callback   "), Some(Command::Callback(None)));
        assert_eq!(
            Command::parse("/callback 4/0AY0e-g7"),
            Some(Command::Callback(Some("4/0AY0e-g7".to_string())))
        );
    }
}
