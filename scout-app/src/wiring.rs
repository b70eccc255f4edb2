use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use scout_actors::actor::{spawn_actor, Addr};
use scout_actors::{ask, CaptureController, Response, Router, RouterActor, ScoutStore, SqliteStore};
use scout_config::ScoutConfig;
use scout_http::HttpClient;
use scout_llm::{AnalysisClient, Provider, ProviderAdapter, ProviderOverride};
use scout_web::{AutoDetected, Extractor, FilePage, PageSource, StaticPage};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

const DEFAULT_MAILBOX: usize = 256;
const EVENT_CAPACITY: usize = 64;

/// The page a command works on.
pub struct PageArgs {
    pub path: PathBuf,
    pub url: Option<Url>,
}

/// Everything a command needs, started and connected.
pub struct Scout {
    pub router: Addr<RouterActor>,
    pub store: ScoutStore,
    pub capture: Arc<CaptureController>,
    pub events: mpsc::Receiver<AutoDetected>,
    router_task: JoinHandle<Result<()>>,
}

impl Scout {
    pub async fn ask(&self, request: Value) -> Result<Response> {
        ask(&self.router, request).await
    }

    /// Close the mailbox and wait for the router actor to drain.
    pub async fn shutdown(self) -> Result<()> {
        self.capture.set_auto_capture(false).await;
        drop(self.router);
        self.router_task.await?
    }
}

/// Filesystem path behind a `sqlite://` URL, if it names a file.
fn sqlite_file(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite://")?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}

async fn open_store(cfg: &ScoutConfig) -> Result<ScoutStore> {
    let url = &cfg.store.database_url;
    if let Some(parent) = sqlite_file(url).as_deref().and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let sqlite = SqliteStore::connect(url)
        .await
        .with_context(|| format!("opening store at {url}"))?;
    Ok(ScoutStore::new(Arc::new(sqlite)))
}

/// Per-provider model and base URL overrides.
fn build_adapter(cfg: &ScoutConfig) -> Result<ProviderAdapter> {
    let mut adapter = ProviderAdapter::new(cfg.analysis.max_tokens, cfg.analysis.temperature);
    for (id, p) in &cfg.providers {
        let provider: Provider = id.parse()?;
        if p.model.is_some() || p.base_url.is_some() {
            adapter = adapter.with_override(
                provider,
                ProviderOverride {
                    model: p.model.clone(),
                    base_url: p.base_url.clone(),
                },
            );
        }
    }
    Ok(adapter)
}

/// Store configured keys for providers that have none yet.
async fn seed_credentials(cfg: &ScoutConfig, store: &ScoutStore) -> Result<()> {
    for (id, p) in &cfg.providers {
        let Some(key) = p.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            continue;
        };
        let provider: Provider = id.parse()?;
        if store.credential(provider).await?.is_none() {
            store.set_credential(provider, key).await?;
            tracing::info!(provider = %provider, "app.credential_seeded");
        }
    }
    Ok(())
}

pub async fn build(cfg: &ScoutConfig, page: Option<PageArgs>) -> Result<Scout> {
    let store = open_store(cfg).await?;
    seed_credentials(cfg, &store).await?;

    let source: Arc<dyn PageSource> = match page {
        Some(PageArgs { path, url }) => {
            tracing::info!(path = %path.display(), "app.page");
            Arc::new(FilePage::watch(path, url, cfg.capture.poll_interval()))
        }
        None => Arc::new(StaticPage::new(None, "")),
    };
    let (tx, events) = mpsc::channel(EVENT_CAPACITY);
    let capture = Arc::new(CaptureController::new(
        source,
        Extractor::new(cfg.capture.container_text_limit),
        cfg.capture.debounce(),
        tx,
    ));

    let mut http = HttpClient::new()?;
    if let Some(secs) = cfg.http.timeout_secs {
        http = http.with_timeout(std::time::Duration::from_secs(secs));
    }
    let analyzer = Arc::new(AnalysisClient::new(http, build_adapter(cfg)?));

    let router = Router::new(store.clone(), capture.clone(), analyzer);
    let handle = spawn_actor(RouterActor::new(router), DEFAULT_MAILBOX);

    Ok(Scout {
        router: handle.addr,
        store,
        capture,
        events,
        router_task: handle.task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_config::ScoutConfigLoader;

    #[test]
    fn sqlite_file_paths() {
        assert_eq!(
            sqlite_file("sqlite:///tmp/scout/db.sqlite?mode=rwc"),
            Some(PathBuf::from("/tmp/scout/db.sqlite"))
        );
        assert_eq!(sqlite_file("sqlite://scout.db"), Some(PathBuf::from("scout.db")));
        assert_eq!(sqlite_file("sqlite::memory:"), None);
        assert_eq!(sqlite_file("postgres://x"), None);
    }

    #[test]
    fn adapter_overrides_and_unknown_providers() {
        let cfg = ScoutConfigLoader::new()
            .with_yaml_str("providers:\n  mistral:\n    model: mistral-large\n    base_url: http://localhost:1/v1/")
            .load()
            .unwrap();
        let adapter = build_adapter(&cfg).unwrap();
        assert_eq!(adapter.model(Provider::Mistral), "mistral-large");
        assert_eq!(adapter.base_url(Provider::Mistral), "http://localhost:1/v1");

        let cfg = ScoutConfigLoader::new()
            .with_yaml_str("providers:\n  bard:\n    model: x")
            .load()
            .unwrap();
        assert!(build_adapter(&cfg).is_err());
    }

    #[tokio::test]
    async fn configured_keys_never_replace_stored_ones() {
        let cfg = ScoutConfigLoader::new()
            .with_yaml_str("providers:\n  openai:\n    api_key: from-config\n  claude:\n    api_key: seeded")
            .load()
            .unwrap();
        let store = ScoutStore::in_memory();
        store.set_credential(Provider::OpenAi, "stored").await.unwrap();

        seed_credentials(&cfg, &store).await.unwrap();
        assert_eq!(store.credential(Provider::OpenAi).await.unwrap().as_deref(), Some("stored"));
        assert_eq!(store.credential(Provider::Claude).await.unwrap().as_deref(), Some("seeded"));
    }

    #[tokio::test]
    async fn build_routes_requests_over_an_in_memory_database() {
        let cfg = ScoutConfigLoader::new()
            .with_yaml_str("store:\n  database_url: 'sqlite::memory:'")
            .load()
            .unwrap();
        let scout = build(&cfg, None).await.unwrap();
        let resp = scout
            .ask(serde_json::json!({"type": "captureDomainsManually"}))
            .await
            .unwrap();
        assert!(resp.success);
        scout.shutdown().await.unwrap();
    }
}
