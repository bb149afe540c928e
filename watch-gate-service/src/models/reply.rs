use chrono::{DateTime, Utc};

/// Everything the bot can say back to a user.
///
/// Texts are plain language; no error details or internal identifiers are
/// ever rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Catalog { titles: Vec<String> },
    NoContent,
    Challenge { link: String },
    Stream { title: String, url: String },
    ContentUnavailable,
    ItemNotFound,
    Verified { expires_at: DateTime<Utc> },
    VerificationFailed,
    Status { expires_at: DateTime<Utc> },
    CallbackUsage,
    Help,
    Throttled,
}

impl Reply {
    pub fn text(&self) -> String {
        match self {
            Reply::Catalog { titles } => {
                let list = titles
                    .iter()
                    .map(|t| format!("- {}", t))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "Welcome! Here are the latest movies:\n\n{}\n\nReply with the movie name to watch.",
                    list
                )
            }
            Reply::NoContent => "No new movies are available at the moment.".to_string(),
            Reply::Challenge { link } => format!(
                "You must subscribe to our sponsored YouTube channel to watch movies. Verify here: {}",
                link
            ),
            Reply::Stream { title, url } => format!("Watch {} here: {}", title, url),
            Reply::ContentUnavailable => {
                "Streaming link not found. Please try again later.".to_string()
            }
            Reply::ItemNotFound => {
                "Movie not found. Please select one of the latest uploads.".to_string()
            }
            Reply::Verified { expires_at } => format!(
                "Subscription verified! You have access until {}.",
                format_expiry(expires_at)
            ),
            Reply::VerificationFailed => {
                "Verification failed. Make sure you are subscribed and try again.".to_string()
            }
            Reply::Status { expires_at } => {
                format!("Your access is valid until {}.", format_expiry(expires_at))
            }
            Reply::CallbackUsage => {
                "Send the code you received after signing in, like: /callback <code>".to_string()
            }
            Reply::Help => "Send /start to see the latest movies, then reply with a title. \
                 Use /status to check your access."
                .to_string(),
            Reply::Throttled => "You're sending messages too quickly. Please wait a moment."
                .to_string(),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Catalog { .. } => "catalog",
            Reply::NoContent => "no_content",
            Reply::Challenge { .. } => "challenge",
            Reply::Stream { .. } => "stream",
            Reply::ContentUnavailable => "content_unavailable",
            Reply::ItemNotFound => "item_not_found",
            Reply::Verified { .. } => "verified",
            Reply::VerificationFailed => "verification_failed",
            Reply::Status { .. } => "status",
            Reply::CallbackUsage => "callback_usage",
            Reply::Help => "help",
            Reply::Throttled => "throttled",
        }
    }
}

fn format_expiry(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn catalog_lists_every_title() {
        let reply = Reply::Catalog {
            titles: vec!["MovieX".to_string(), "Movie Y".to_string()],
        };
        let text = reply.text();
        assert!(text.contains("- MovieX\n- Movie Y"));
    }

    #[test]
    fn verified_reply_shows_expiry_in_utc() {
        let expires_at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        assert!(Reply::Verified { expires_at }
            .text()
            .contains("2026-10-19 08:30 UTC"));
    }

    #[test]
    fn unavailable_and_not_found_are_distinct() {
        assert_ne!(Reply::ContentUnavailable.text(), Reply::ItemNotFound.text());
    }
}
