//! External collaborators.
//!
//! The engine does not persist settings or contacts, deliver push
//! notifications or know fiat prices. Front-ends plug those in through
//! the traits below. [`MemorySettingsStore`] and [`StaticRates`] are
//! in-process implementations; [`RemotePush`] registers push tokens with
//! the coordinating service.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::address::Network;
use crate::config::SATOSHIS_PER_COIN;
use crate::sync::wire::PushSubscription;
use crate::sync::{RemoteClient, SyncError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollabError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsEntry {
    value: Value,
    updated_at: i64,
}

/// Key/value settings where every key remembers when it was last written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    entries: BTreeMap<String, SettingsEntry>,
}

/// A partial update stamped with the time it was made.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsPatch {
    pub values: Map<String, Value>,
    /// Milliseconds since the epoch.
    pub updated_at: i64,
}

impl SettingsPatch {
    pub fn new(values: Map<String, Value>, updated_at: i64) -> Self {
        Self { values, updated_at }
    }

    pub fn now(values: Map<String, Value>) -> Self {
        Self::new(values, chrono::Utc::now().timestamp_millis())
    }
}

impl Settings {
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.value(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Last write wins per key. A tie goes to the incoming value.
    pub fn merge(&mut self, patch: &SettingsPatch) -> usize {
        let mut applied = 0;
        for (key, value) in &patch.values {
            let newer = self
                .entries
                .get(key)
                .map_or(true, |existing| patch.updated_at >= existing.updated_at);
            if newer {
                self.entries.insert(
                    key.clone(),
                    SettingsEntry {
                        value: value.clone(),
                        updated_at: patch.updated_at,
                    },
                );
                applied += 1;
            }
        }
        applied
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, e)| (k.clone(), e.value.clone()))
                .collect(),
        )
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self) -> Result<Settings, CollabError>;

    /// Merge `partial` into the stored settings and return the result.
    async fn set(&self, partial: SettingsPatch) -> Result<Settings, CollabError>;
}

#[derive(Default)]
pub struct MemorySettingsStore {
    settings: RwLock<Settings>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self) -> Result<Settings, CollabError> {
        Ok(self.settings.read().clone())
    }

    async fn set(&self, partial: SettingsPatch) -> Result<Settings, CollabError> {
        let mut settings = self.settings.write();
        let applied = settings.merge(&partial);
        debug!(applied, offered = partial.values.len(), "settings merged");
        Ok(settings.clone())
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    pub address: String,
    pub network: Network,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[async_trait]
pub trait ContactsStore: Send + Sync {
    async fn list(&self, network: Network) -> Result<Vec<Contact>, CollabError>;
    async fn upsert(&self, contact: Contact) -> Result<(), CollabError>;
    async fn remove(&self, network: Network, address: &str) -> Result<(), CollabError>;
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn subscribe(&self, wallet_id: &str) -> Result<(), CollabError>;
    async fn unsubscribe(&self, wallet_id: &str) -> Result<(), CollabError>;
}

/// Registers this device's push token with the coordinating service. The
/// service scopes the subscription to the authenticated copayer.
pub struct RemotePush {
    client: Arc<RemoteClient>,
    token: String,
    platform: String,
}

impl RemotePush {
    pub fn new(client: Arc<RemoteClient>, token: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            platform: platform.into(),
        }
    }
}

#[async_trait]
impl PushTransport for RemotePush {
    async fn subscribe(&self, wallet_id: &str) -> Result<(), CollabError> {
        debug!(wallet_id, platform = %self.platform, "subscribing to push notifications");
        self.client
            .subscribe_push(&PushSubscription {
                token: self.token.clone(),
                platform: self.platform.clone(),
            })
            .await?;
        Ok(())
    }

    async fn unsubscribe(&self, wallet_id: &str) -> Result<(), CollabError> {
        debug!(wallet_id, "unsubscribing from push notifications");
        self.client.unsubscribe_push(&self.token).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RateService: Send + Sync {
    /// Value of `amount` satoshis in the fiat currency `code`.
    async fn to_fiat(&self, amount: u64, code: &str) -> Result<f64, CollabError>;
}

/// Fixed prices per whole coin, keyed by upper-case currency code.
#[derive(Debug, Clone, Default)]
pub struct StaticRates {
    per_coin: HashMap<String, f64>,
}

impl StaticRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, code: &str, per_coin: f64) -> Self {
        self.per_coin.insert(code.to_uppercase(), per_coin);
        self
    }
}

#[async_trait]
impl RateService for StaticRates {
    async fn to_fiat(&self, amount: u64, code: &str) -> Result<f64, CollabError> {
        let rate = self
            .per_coin
            .get(&code.to_uppercase())
            .ok_or_else(|| CollabError::NotFound(format!("no rate for {}", code)))?;
        Ok(amount as f64 / SATOSHIS_PER_COIN as f64 * rate)
    }
}
