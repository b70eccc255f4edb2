//! Auto-capture: debounced re-extraction on page changes.
//!
//! A [`WatchSession`] owns the set of domains already reported. It is created
//! by [`WatchSession::start`], lives inside a spawned task, and is dropped
//! (seen set included) when the returned [`WatchHandle`] is stopped.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::extract::Extractor;
use crate::page::PageSource;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Domains seen for the first time in this session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoDetected {
    pub domains: Vec<String>,
    pub total_domains: Vec<String>,
    pub url: Option<String>,
}

pub struct WatchSession {
    source: Arc<dyn PageSource>,
    extractor: Extractor,
    debounce: Duration,
    seen: BTreeSet<String>,
    events: mpsc::Sender<AutoDetected>,
}

/// Running session; dropping it cancels observation.
pub struct WatchHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel observation and wait for the session task to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "watch.join_failed");
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl WatchSession {
    /// Subscribe to `source`, run one detection immediately, then re-run after
    /// every quiet period of `debounce` following a change.
    pub fn start(
        source: Arc<dyn PageSource>,
        extractor: Extractor,
        debounce: Duration,
        events: mpsc::Sender<AutoDetected>,
    ) -> WatchHandle {
        let changes = source.subscribe();
        let token = CancellationToken::new();
        let session = WatchSession {
            source,
            extractor,
            debounce,
            seen: BTreeSet::new(),
            events,
        };
        let task = tokio::spawn(session.run(changes, token.clone()));
        tracing::info!(debounce_ms = debounce.as_millis() as u64, "watch.started");
        WatchHandle {
            token,
            task: Some(task),
        }
    }

    async fn run(mut self, mut changes: broadcast::Receiver<()>, token: CancellationToken) {
        self.detect(&token).await;

        let mut deadline: Option<Instant> = None;
        let mut source_open = true;
        loop {
            let pending = deadline;
            let quiet = async move {
                match pending {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = token.cancelled() => break,
                msg = changes.recv(), if source_open => match msg {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        deadline = Some(Instant::now() + self.debounce);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        source_open = false;
                        if deadline.is_none() {
                            break;
                        }
                    }
                },
                _ = quiet => {
                    deadline = None;
                    self.detect(&token).await;
                    if !source_open {
                        break;
                    }
                }
            }
        }
        tracing::info!(seen = self.seen.len(), "watch.stopped");
    }

    /// A listener that stops reading cannot keep the session alive past `token`.
    async fn detect(&mut self, token: &CancellationToken) {
        let snapshot = match self.source.snapshot().await {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(error = %err, "watch.snapshot_failed");
                return;
            }
        };
        let fresh: Vec<String> = self
            .extractor
            .extract(&snapshot)
            .into_iter()
            .filter(|d| self.seen.insert(d.clone()))
            .collect();
        if fresh.is_empty() {
            return;
        }

        tracing::info!(new = fresh.len(), total = self.seen.len(), "watch.detected");
        let event = AutoDetected {
            domains: fresh,
            total_domains: self.seen.iter().cloned().collect(),
            url: snapshot.url.map(|u| u.to_string()),
        };
        tokio::select! {
            _ = token.cancelled() => tracing::debug!("watch.send_cancelled"),
            sent = self.events.send(event) => {
                if sent.is_err() {
                    tracing::debug!("watch.listener_gone");
                }
            }
        }
    }
}
