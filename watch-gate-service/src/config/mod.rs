use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://hdtoday.cc";

/// Upper bound on how many titles a listing may show.
pub const MAX_LISTING_ITEMS: usize = 5;

#[derive(Debug, Clone)]
pub struct WatchGateConfig {
    pub common: core_config::Config,
    pub oauth: OAuthConfig,
    pub membership: MembershipConfig,
    pub telegram: TelegramConfig,
    pub catalog: CatalogConfig,
    pub store: GrantStoreConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
}

#[derive(Debug, Clone)]
pub struct MembershipConfig {
    /// Base of the YouTube Data API, without a trailing slash.
    pub api_base: String,
    pub sponsored_channel_id: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Secret<String>,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    pub listing_path: String,
    pub limit: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct GrantStoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Timeout applied to every outbound HTTP call.
    pub http_timeout_secs: u64,
    /// Maximum number of inbound updates handled concurrently.
    pub max_in_flight: usize,
    pub user_rate_limit_per_min: u32,
}

impl RuntimeConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl WatchGateConfig {
    /// Load from the process environment (after `.env`) and validate.
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let config = Self::from_lookup(common, |key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: Option<&str>| get_var(&lookup, key, default);

        Ok(WatchGateConfig {
            common,
            oauth: OAuthConfig {
                client_id: get("OAUTH_CLIENT_ID", None)?,
                client_secret: Secret::new(get("OAUTH_CLIENT_SECRET", None)?),
                redirect_uri: get("OAUTH_REDIRECT_URI", None)?,
                authorize_url: get("OAUTH_AUTHORIZE_URL", Some(DEFAULT_AUTHORIZE_URL))?,
                token_url: get("OAUTH_TOKEN_URL", Some(DEFAULT_TOKEN_URL))?,
            },
            membership: MembershipConfig {
                api_base: trim_slash(get("YOUTUBE_API_BASE", Some(DEFAULT_YOUTUBE_API_BASE))?),
                sponsored_channel_id: get("SPONSORED_CHANNEL_ID", None)?,
            },
            telegram: TelegramConfig {
                bot_token: Secret::new(get("BOT_TOKEN", None)?),
                api_base: trim_slash(get("TELEGRAM_API_BASE", Some(DEFAULT_TELEGRAM_API_BASE))?),
                poll_timeout_secs: parse_var(&lookup, "TELEGRAM_POLL_TIMEOUT_SECS", 30)?,
            },
            catalog: CatalogConfig {
                base_url: get("CATALOG_BASE_URL", Some(DEFAULT_CATALOG_BASE_URL))?,
                listing_path: get("CATALOG_LISTING_PATH", Some("/home"))?,
                limit: parse_var(&lookup, "CATALOG_LIMIT", MAX_LISTING_ITEMS)?,
                user_agent: get("CATALOG_USER_AGENT", Some("Mozilla/5.0"))?,
            },
            store: GrantStoreConfig {
                path: PathBuf::from(get("GRANT_STORE_PATH", Some("verified_users.json"))?),
            },
            runtime: RuntimeConfig {
                http_timeout_secs: parse_var(&lookup, "HTTP_TIMEOUT_SECS", 10)?,
                max_in_flight: parse_var(&lookup, "MAX_IN_FLIGHT", 64)?,
                user_rate_limit_per_min: parse_var(&lookup, "USER_RATE_LIMIT_PER_MIN", 30)?,
            },
        })
    }

    /// Reject configurations the bot cannot serve traffic with.
    pub fn validate(&self) -> Result<(), AppError> {
        let required = [
            ("OAUTH_CLIENT_ID", self.oauth.client_id.as_str()),
            ("OAUTH_CLIENT_SECRET", self.oauth.client_secret.expose_secret().as_str()),
            ("OAUTH_REDIRECT_URI", self.oauth.redirect_uri.as_str()),
            ("SPONSORED_CHANNEL_ID", self.membership.sponsored_channel_id.as_str()),
            ("BOT_TOKEN", self.telegram.bot_token.expose_secret().as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(config_error(format!("{} must not be empty", key)));
            }
        }

        let urls = [
            ("OAUTH_REDIRECT_URI", self.oauth.redirect_uri.as_str()),
            ("OAUTH_AUTHORIZE_URL", self.oauth.authorize_url.as_str()),
            ("OAUTH_TOKEN_URL", self.oauth.token_url.as_str()),
            ("YOUTUBE_API_BASE", self.membership.api_base.as_str()),
            ("TELEGRAM_API_BASE", self.telegram.api_base.as_str()),
            ("CATALOG_BASE_URL", self.catalog.base_url.as_str()),
        ];
        for (key, value) in urls {
            Url::parse(value).map_err(|e| config_error(format!("{} is not a valid URL: {}", key, e)))?;
        }

        if self.catalog.limit == 0 || self.catalog.limit > MAX_LISTING_ITEMS {
            return Err(config_error(format!(
                "CATALOG_LIMIT must be between 1 and {}",
                MAX_LISTING_ITEMS
            )));
        }
        if self.runtime.max_in_flight == 0 {
            return Err(config_error("MAX_IN_FLIGHT must be positive".to_string()));
        }
        if self.runtime.user_rate_limit_per_min == 0 {
            return Err(config_error(
                "USER_RATE_LIMIT_PER_MIN must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn get_var<F>(lookup: &F, key: &str, default: Option<&str>) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(config_error(format!("{} is required but not set", key))),
        },
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| config_error(format!("{} is invalid: {}", key, e))),
        None => Ok(default),
    }
}

fn trim_slash(value: String) -> String {
    value.trim_end_matches('/').to_string()
}

fn config_error(message: String) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message))
}
