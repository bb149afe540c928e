#![allow(dead_code)]

use chrono::{DateTime, Utc};
use service_core::config::Config as CoreConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use watch_gate_service::config::WatchGateConfig;
use watch_gate_service::models::ContentItem;
use watch_gate_service::services::{Clock, GrantStore, ManualClock, MockVerifier, StaticCatalog};
use watch_gate_service::startup::{Application, Components};
use watch_gate_service::transport::RecordingTransport;

pub const REDIRECT_URI: &str = "https://bot.example.com/oauth/callback";

/// Default wait for the bot to answer.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn default_catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        ContentItem::new("MovieX", "https://catalog.test/movie/x"),
        ContentItem::new("Movie Y", "https://catalog.test/movie/y"),
    ])
    .with_stream("https://catalog.test/movie/x", "https://player.test/embed/x")
}

pub fn test_config(grant_path: PathBuf, overrides: &[(&str, &str)]) -> WatchGateConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("OAUTH_CLIENT_ID".to_string(), "client-123".to_string()),
        ("OAUTH_CLIENT_SECRET".to_string(), "test-secret".to_string()),
        ("OAUTH_REDIRECT_URI".to_string(), REDIRECT_URI.to_string()),
        ("SPONSORED_CHANNEL_ID".to_string(), "UC-sponsored".to_string()),
        ("BOT_TOKEN".to_string(), "42:test-token".to_string()),
        (
            "GRANT_STORE_PATH".to_string(),
            grant_path.to_string_lossy().into_owned(),
        ),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    let common = CoreConfig {
        port: 0,
        ..CoreConfig::default()
    };
    let config = WatchGateConfig::from_lookup(common, |key| vars.get(key).cloned())
        .expect("Failed to build test configuration");
    config.validate().expect("Test configuration is invalid");
    config
}

pub struct TestApp {
    pub http_address: String,
    pub http_port: u16,
    pub transport: Arc<RecordingTransport>,
    pub verifier: Arc<MockVerifier>,
    pub catalog: Arc<StaticCatalog>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<GrantStore>,
    pub grant_path: PathBuf,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<std::io::Result<()>>>,
    dir: Arc<TempDir>,
}

pub struct TestAppBuilder {
    verifier: MockVerifier,
    catalog: StaticCatalog,
    overrides: Vec<(&'static str, &'static str)>,
    dir: Option<Arc<TempDir>>,
}

impl TestAppBuilder {
    pub fn verifier(mut self, verifier: MockVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn catalog(mut self, catalog: StaticCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn env(mut self, key: &'static str, value: &'static str) -> Self {
        self.overrides.push((key, value));
        self
    }

    /// Reuse the grant directory of a previous app (simulated restart).
    pub fn grant_dir(mut self, dir: Arc<TempDir>) -> Self {
        self.dir = Some(dir);
        self
    }

    pub async fn spawn(self) -> TestApp {
        let dir = match self.dir {
            Some(dir) => dir,
            None => Arc::new(TempDir::new().expect("Failed to create temp dir")),
        };
        let grant_path = dir.path().join("verified_users.json");
        let config = test_config(grant_path.clone(), &self.overrides);

        let store = Arc::new(
            GrantStore::open_file(grant_path.clone())
                .await
                .expect("Failed to open grant store"),
        );
        let transport = Arc::new(RecordingTransport::new());
        let verifier = Arc::new(self.verifier);
        let catalog = Arc::new(self.catalog);
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let components = Components {
            store: store.clone(),
            verifier: verifier.clone(),
            catalog: catalog.clone(),
            transport: transport.clone(),
            clock: clock.clone(),
        };

        let app = Application::build_with(config, components)
            .await
            .expect("Failed to build test application");

        let http_port = app.http_port();
        let http_address = format!("http://127.0.0.1:{}", http_port);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(app.run_until(async move {
            let _ = stop_rx.await;
        }));

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", http_address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            http_address,
            http_port,
            transport,
            verifier,
            catalog,
            clock,
            store,
            grant_path,
            stop: Some(stop_tx),
            handle: Some(handle),
            dir,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            verifier: MockVerifier::approving(),
            catalog: default_catalog(),
            overrides: Vec::new(),
            dir: None,
        }
    }

    pub async fn spawn() -> Self {
        Self::builder().spawn().await
    }

    pub fn grant_dir(&self) -> Arc<TempDir> {
        self.dir.clone()
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Send `text` as `user_id` and wait for the next reply in their chat.
    pub async fn say(&self, user_id: i64, text: &str) -> String {
        let before = self.transport.sent_to(user_id).len();
        self.transport.push_text(user_id, text);
        self.next_reply(user_id, before).await
    }

    /// Wait for the reply number `index` (zero-based) in `user_id`'s chat.
    pub async fn next_reply(&self, user_id: i64, index: usize) -> String {
        let deadline = tokio::time::Instant::now() + REPLY_TIMEOUT;
        loop {
            if let Some(reply) = self.transport.sent_to(user_id).get(index) {
                return reply.clone();
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("No reply #{} for user {} within {:?}", index, user_id, REPLY_TIMEOUT);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop the app and wait for the dispatcher to drain.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .expect("App task panicked")
                .expect("App exited with error");
        }
    }
}
