//! Page-side capture: one-shot extraction and the auto-capture session.

use std::sync::Arc;
use std::time::Duration;

use scout_common::Result;
use scout_web::{AutoDetected, Extractor, PageSource, WatchHandle, WatchSession};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use crate::store::ScoutStore;

/// Result of a one-shot capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub domains: Vec<String>,
    pub count: usize,
    pub url: Option<String>,
}

pub struct CaptureController {
    page: Arc<dyn PageSource>,
    extractor: Extractor,
    debounce: Duration,
    events: mpsc::Sender<AutoDetected>,
    session: Mutex<Option<WatchHandle>>,
}

impl CaptureController {
    pub fn new(
        page: Arc<dyn PageSource>,
        extractor: Extractor,
        debounce: Duration,
        events: mpsc::Sender<AutoDetected>,
    ) -> Self {
        Self {
            page,
            extractor,
            debounce,
            events,
            session: Mutex::new(None),
        }
    }

    pub async fn capture(&self) -> Result<Capture> {
        let snapshot = self.page.snapshot().await?;
        let domains = self.extractor.extract(&snapshot);
        tracing::info!(count = domains.len(), "capture.done");
        Ok(Capture {
            count: domains.len(),
            url: snapshot.url.map(|u| u.to_string()),
            domains,
        })
    }

    /// Start or stop the watch session. Idempotent in both directions.
    pub async fn set_auto_capture(&self, enabled: bool) {
        let mut slot = self.session.lock().await;
        match (enabled, slot.take()) {
            (true, Some(running)) => *slot = Some(running),
            (true, None) => {
                *slot = Some(WatchSession::start(
                    self.page.clone(),
                    self.extractor,
                    self.debounce,
                    self.events.clone(),
                ));
            }
            (false, Some(running)) => running.stop().await,
            (false, None) => {}
        }
        tracing::info!(enabled, "capture.auto_capture");
    }

    pub async fn is_watching(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(WatchHandle::is_running)
    }

    /// Resume auto-capture if it was left enabled. Returns whether a session is running.
    pub async fn restore(&self, store: &ScoutStore) -> Result<bool> {
        let enabled = store.auto_capture_enabled().await?;
        if enabled {
            self.set_auto_capture(true).await;
        }
        Ok(enabled)
    }
}
