//! Page sources: where HTML snapshots come from and how changes are announced.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use scout_common::{Result, ScoutError};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use url::Url;

const CHANGE_CAPACITY: usize = 16;

/// The page as it is right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: Option<Url>,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: Option<Url>, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }
}

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Current contents of the page.
    async fn snapshot(&self) -> Result<PageSnapshot>;

    /// Receiver that yields `()` whenever the page content changes.
    fn subscribe(&self) -> broadcast::Receiver<()>;
}

/// In-memory page; callers push new HTML with [`StaticPage::update`].
pub struct StaticPage {
    current: RwLock<PageSnapshot>,
    changes: broadcast::Sender<()>,
}

impl StaticPage {
    pub fn new(url: Option<Url>, html: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            current: RwLock::new(PageSnapshot::new(url, html)),
            changes,
        }
    }

    /// Replace the page body and notify subscribers.
    pub async fn update(&self, html: impl Into<String>) {
        self.current.write().await.html = html.into();
        // No subscribers is fine.
        let _ = self.changes.send(());
    }
}

#[async_trait]
impl PageSource for StaticPage {
    async fn snapshot(&self) -> Result<PageSnapshot> {
        Ok(self.current.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }
}

/// An HTML file on disk, polled for modification.
///
/// The poller stops when the `FilePage` is dropped.
pub struct FilePage {
    path: PathBuf,
    url: Option<Url>,
    changes: broadcast::Sender<()>,
    poller: CancellationToken,
}

type Stamp = Option<(SystemTime, u64)>;

async fn stamp(path: &Path) -> Stamp {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

impl FilePage {
    /// Start polling `path` every `poll_interval`. Must be called inside a tokio runtime.
    pub fn watch(path: impl Into<PathBuf>, url: Option<Url>, poll_interval: Duration) -> Self {
        let path = path.into();
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let poller = CancellationToken::new();

        let tx = changes.clone();
        let token = poller.child_token();
        let watched = path.clone();
        tokio::spawn(async move {
            let mut last = stamp(&watched).await;
            let mut tick = tokio::time::interval(poll_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {
                        let now = stamp(&watched).await;
                        if now != last {
                            last = now;
                            tracing::debug!(path = %watched.display(), "page.file.changed");
                            let _ = tx.send(());
                        }
                    }
                }
            }
            tracing::debug!(path = %watched.display(), "page.file.poller_stopped");
        });

        Self {
            path,
            url,
            changes,
            poller,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FilePage {
    fn drop(&mut self) {
        self.poller.cancel();
    }
}

#[async_trait]
impl PageSource for FilePage {
    async fn snapshot(&self) -> Result<PageSnapshot> {
        let html = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ScoutError::Page(format!("{}: {e}", self.path.display())))?;
        Ok(PageSnapshot::new(self.url.clone(), html))
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }
}
