//! Key-value persistence for settings, credentials and analysis history.
//!
//! Values are JSON documents under fixed keys. [`SqliteStore`] keeps them in a
//! single `kv` table; [`MemoryStore`] is the same contract over a map. The
//! typed [`ScoutStore`] facade supplies defaults for absent keys and funnels
//! every write through a single permit, so the history read-modify-write never
//! interleaves with another write.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scout_llm::{Provider, DEFAULT_PROMPT};
use scout_web::FilterSettings;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info};
use uuid::Uuid;

pub const HISTORY_CAPACITY: usize = 100;

pub const KEY_FILTER_SETTINGS: &str = "filterSettings";
pub const KEY_CUSTOM_PROMPT: &str = "customPrompt";
pub const KEY_HISTORY: &str = "analysisHistory";
pub const KEY_AUTO_CAPTURE: &str = "autoCaptureEnabled";
pub const KEY_LANGUAGE: &str = "languagePreference";
pub const KEY_CURRENT_TAB: &str = "currentTab";

pub fn credential_key(provider: Provider) -> String {
    format!("credential_{}", provider.id())
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored value is malformed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store is shutting down")]
    Closed,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for scout_common::ScoutError {
    fn from(err: StoreError) -> Self {
        scout_common::ScoutError::Store(err.to_string())
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;
    async fn set(&self, key: &str, value: &Value) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

// ==============================
// SQLite
// ==============================

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url`, e.g.
    /// `sqlite://domain-scout.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Each in-memory connection is its own database.
        let max = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::query("CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&pool)
            .await?;
        info!("store.sqlite.ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let raw: String = row.try_get("value")?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ==============================
// In-memory
// ==============================

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ==============================
// Records
// ==============================

/// A completed analysis as submitted for saving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub provider: Provider,
    pub prompt: String,
    pub domains: Vec<String>,
    pub result: String,
    #[serde(default)]
    pub usage: Option<Value>,
}

/// A saved analysis. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub provider: Provider,
    pub prompt: String,
    pub domains: Vec<String>,
    pub result: String,
    #[serde(default)]
    pub usage: Option<Value>,
}

impl AnalysisRecord {
    fn from_entry(entry: HistoryEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            provider: entry.provider,
            prompt: entry.prompt,
            domains: entry.domains,
            result: entry.result,
            usage: entry.usage,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.provider.id().contains(needle)
            || self.prompt.to_lowercase().contains(needle)
            || self.result.to_lowercase().contains(needle)
            || self.domains.iter().any(|d| d.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub language: String,
    pub current_tab: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            current_tab: "capture".to_string(),
        }
    }
}

// ==============================
// Typed facade
// ==============================

#[derive(Clone)]
pub struct ScoutStore {
    kv: Arc<dyn KvStore>,
    write_limit: Arc<Semaphore>,
}

impl ScoutStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            write_limit: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.kv.get(key).await? {
            Some(Value::Null) | None => Ok(None),
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let value = serde_json::to_value(value)?;
        let _permit = self
            .write_limit
            .acquire()
            .await
            .map_err(|_| StoreError::Closed)?;
        self.kv.set(key, &value).await?;
        debug!(key, "store.write");
        Ok(())
    }

    pub async fn credential(&self, provider: Provider) -> StoreResult<Option<String>> {
        Ok(self
            .read::<String>(&credential_key(provider))
            .await?
            .filter(|k| !k.trim().is_empty()))
    }

    pub async fn set_credential(&self, provider: Provider, key: &str) -> StoreResult<()> {
        self.write(&credential_key(provider), key).await
    }

    pub async fn filter_settings(&self) -> StoreResult<FilterSettings> {
        Ok(self.read(KEY_FILTER_SETTINGS).await?.unwrap_or_default())
    }

    pub async fn set_filter_settings(&self, settings: &FilterSettings) -> StoreResult<()> {
        self.write(KEY_FILTER_SETTINGS, settings).await
    }

    /// The stored prompt, or the default analysis prompt when none (or an empty one) is stored.
    pub async fn custom_prompt(&self) -> StoreResult<String> {
        Ok(self
            .read::<String>(KEY_CUSTOM_PROMPT)
            .await?
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string()))
    }

    pub async fn set_custom_prompt(&self, prompt: &str) -> StoreResult<()> {
        self.write(KEY_CUSTOM_PROMPT, prompt).await
    }

    pub async fn auto_capture_enabled(&self) -> StoreResult<bool> {
        Ok(self.read(KEY_AUTO_CAPTURE).await?.unwrap_or(false))
    }

    pub async fn set_auto_capture(&self, enabled: bool) -> StoreResult<()> {
        self.write(KEY_AUTO_CAPTURE, &enabled).await
    }

    pub async fn preferences(&self) -> StoreResult<Preferences> {
        let defaults = Preferences::default();
        Ok(Preferences {
            language: self.read(KEY_LANGUAGE).await?.unwrap_or(defaults.language),
            current_tab: self
                .read(KEY_CURRENT_TAB)
                .await?
                .unwrap_or(defaults.current_tab),
        })
    }

    pub async fn set_preferences(&self, prefs: &Preferences) -> StoreResult<()> {
        self.write(KEY_LANGUAGE, &prefs.language).await?;
        self.write(KEY_CURRENT_TAB, &prefs.current_tab).await
    }

    /// Newest first.
    pub async fn history(&self) -> StoreResult<Vec<AnalysisRecord>> {
        Ok(self.read(KEY_HISTORY).await?.unwrap_or_default())
    }

    /// Prepend a new record, evicting the oldest beyond [`HISTORY_CAPACITY`].
    pub async fn push_history(&self, entry: HistoryEntry) -> StoreResult<AnalysisRecord> {
        let record = AnalysisRecord::from_entry(entry);
        let _permit = self
            .write_limit
            .acquire()
            .await
            .map_err(|_| StoreError::Closed)?;

        let mut history: Vec<AnalysisRecord> = self.read(KEY_HISTORY).await?.unwrap_or_default();
        history.insert(0, record.clone());
        history.truncate(HISTORY_CAPACITY);
        self.kv
            .set(KEY_HISTORY, &serde_json::to_value(&history)?)
            .await?;

        info!(id = %record.id, provider = %record.provider, size = history.len(), "store.history.pushed");
        Ok(record)
    }

    pub async fn history_entry(&self, id: Uuid) -> StoreResult<Option<AnalysisRecord>> {
        Ok(self.history().await?.into_iter().find(|r| r.id == id))
    }

    /// Case-insensitive substring match over provider, prompt, result and domains.
    pub async fn search_history(&self, term: &str) -> StoreResult<Vec<AnalysisRecord>> {
        let needle = term.trim().to_lowercase();
        let history = self.history().await?;
        if needle.is_empty() {
            return Ok(history);
        }
        Ok(history.into_iter().filter(|r| r.matches(&needle)).collect())
    }

    pub async fn clear_history(&self) -> StoreResult<()> {
        let _permit = self
            .write_limit
            .acquire()
            .await
            .map_err(|_| StoreError::Closed)?;
        self.kv.remove(KEY_HISTORY).await?;
        info!("store.history.cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            provider: Provider::OpenAi,
            prompt: format!("prompt {n}"),
            domains: vec![format!("site{n}.com")],
            result: format!("result {n}"),
            usage: None,
        }
    }

    #[tokio::test]
    async fn defaults_for_absent_keys() {
        let store = ScoutStore::in_memory();
        assert_eq!(store.filter_settings().await.unwrap(), FilterSettings::default());
        assert_eq!(store.custom_prompt().await.unwrap(), DEFAULT_PROMPT);
        assert!(!store.auto_capture_enabled().await.unwrap());
        assert_eq!(store.credential(Provider::Gemini).await.unwrap(), None);
        assert_eq!(store.preferences().await.unwrap(), Preferences::default());
        assert!(store.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_is_capped_newest_first() {
        let store = ScoutStore::in_memory();
        for n in 0..=HISTORY_CAPACITY {
            store.push_history(entry(n)).await.unwrap();
        }
        let history = store.history().await.unwrap();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history[0].prompt, format!("prompt {HISTORY_CAPACITY}"));
        assert_eq!(history.last().unwrap().prompt, "prompt 1");
    }

    #[tokio::test]
    async fn concurrent_pushes_are_not_lost() {
        let store = ScoutStore::in_memory();
        let mut tasks = Vec::new();
        for n in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move { store.push_history(entry(n)).await }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(store.history().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn lookup_and_search() {
        let store = ScoutStore::in_memory();
        let first = store.push_history(entry(1)).await.unwrap();
        let mut other = entry(2);
        other.provider = Provider::Claude;
        other.domains = vec!["Casino-Royale.net".into()];
        store.push_history(other).await.unwrap();

        let found = store.history_entry(first.id).await.unwrap().unwrap();
        assert_eq!(found, first);
        assert!(store.history_entry(Uuid::new_v4()).await.unwrap().is_none());

        let hits = store.search_history("CASINO").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].provider, Provider::Claude);
        assert_eq!(store.search_history("claude").await.unwrap().len(), 1);
        assert_eq!(store.search_history("result").await.unwrap().len(), 2);
        assert_eq!(store.search_history("  ").await.unwrap().len(), 2);

        store.clear_history().await.unwrap();
        assert!(store.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_serializes_in_camel_case() {
        let store = ScoutStore::in_memory();
        let rec = store.push_history(entry(7)).await.unwrap();
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["provider"], "openai");
        assert!(v.get("timestamp").is_some());
        assert!(v.get("id").is_some());
    }

    #[tokio::test]
    async fn sqlite_round_trip() {
        let kv = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let store = ScoutStore::new(Arc::new(kv));

        store.set_credential(Provider::Mistral, "m-key").await.unwrap();
        store.set_credential(Provider::Mistral, "m-key-2").await.unwrap();
        assert_eq!(
            store.credential(Provider::Mistral).await.unwrap().as_deref(),
            Some("m-key-2")
        );

        let settings = FilterSettings {
            only_com: true,
            exclude_keywords: vec!["spam".into()],
            ..Default::default()
        };
        store.set_filter_settings(&settings).await.unwrap();
        assert_eq!(store.filter_settings().await.unwrap(), settings);

        store.set_auto_capture(true).await.unwrap();
        assert!(store.auto_capture_enabled().await.unwrap());

        store.push_history(entry(1)).await.unwrap();
        assert_eq!(store.history().await.unwrap().len(), 1);
        store.clear_history().await.unwrap();
        assert!(store.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_stored_value_surfaces_as_error() {
        let kv = Arc::new(MemoryStore::default());
        kv.set(KEY_FILTER_SETTINGS, &Value::String("oops".into()))
            .await
            .unwrap();
        let store = ScoutStore::new(kv);
        assert!(matches!(
            store.filter_settings().await,
            Err(StoreError::Serde(_))
        ));
    }
}
