//! Inbound surfaces: chat commands and the HTTP endpoints.

pub mod commands;
pub mod health;
pub mod oauth;

pub use commands::{Command, CommandHandler};
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use oauth::oauth_callback;
