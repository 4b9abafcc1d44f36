//! The parameter channel: a namespaced key/value exchange through which
//! one topology publishes resource identifiers and another, deployed
//! independently and later, reads them.
//!
//! Writers only touch their own keys; readers never write. Reading a key
//! that was never published is a hard error, never a silent default,
//! except for the documented optional set in [`crate::keys`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ParamError, ParamResult};
use crate::keys;

/// One published channel record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterEntry {
    /// Hierarchical key path.
    pub key: String,
    /// Value, typically a resource output.
    pub value: String,
    /// Topology that owns the key.
    pub topology: String,
}

/// Storage behind a parameter channel.
pub trait ChannelBackend: Send + Sync {
    fn get(&self, key: &str) -> ParamResult<Option<ParameterEntry>>;
    fn put(&self, entry: ParameterEntry) -> ParamResult<()>;
    fn remove(&self, key: &str) -> ParamResult<()>;
    fn list(&self, prefix: &str) -> ParamResult<Vec<ParameterEntry>>;
}

/// In-memory backend for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryBackend {
    entries: Mutex<BTreeMap<String, ParameterEntry>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelBackend for InMemoryBackend {
    fn get(&self, key: &str) -> ParamResult<Option<ParameterEntry>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, entry: ParameterEntry) -> ParamResult<()> {
        self.entries.lock().insert(entry.key.clone(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> ParamResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> ParamResult<Vec<ParameterEntry>> {
        Ok(self
            .entries
            .lock()
            .values()
            .filter(|e| e.key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// File-backed backend so independently run deployments share the channel.
///
/// The whole map lives in one JSON file under the state directory and is
/// re-read on every access; the channel is only touched at deploy time,
/// so contention is not a concern.
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    /// Channel file under a state directory.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(".weft").join("parameters.json"),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> ParamResult<BTreeMap<String, ParameterEntry>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| ParamError::Serialization(e.to_string()))
    }

    fn write_all(&self, entries: &BTreeMap<String, ParameterEntry>) -> ParamResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| ParamError::Serialization(e.to_string()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl ChannelBackend for FileBackend {
    fn get(&self, key: &str) -> ParamResult<Option<ParameterEntry>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.get(key).cloned())
    }

    fn put(&self, entry: ParameterEntry) -> ParamResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(entry.key.clone(), entry);
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> ParamResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> ParamResult<Vec<ParameterEntry>> {
        let _guard = self.lock.lock();
        Ok(self
            .read_all()?
            .into_values()
            .filter(|e| e.key.starts_with(prefix))
            .collect())
    }
}

/// Handle through which one topology publishes and reads channel keys.
#[derive(Clone)]
pub struct ParameterChannel {
    backend: Arc<dyn ChannelBackend>,
    topology: String,
}

impl ParameterChannel {
    pub fn new(backend: Arc<dyn ChannelBackend>, topology: impl Into<String>) -> Self {
        Self {
            backend,
            topology: topology.into(),
        }
    }

    /// Publish a key owned by this topology.
    ///
    /// Re-publishing one of this topology's own keys overwrites it (a
    /// re-deploy converges); publishing a key owned by another topology
    /// is an error.
    pub fn publish(&self, key: &str, value: impl Into<String>) -> ParamResult<()> {
        if !key.starts_with(keys::NAMESPACE) {
            return Err(ParamError::OutsideNamespace(key.to_string()));
        }
        if let Some(existing) = self.backend.get(key)? {
            if existing.topology != self.topology {
                return Err(ParamError::ForeignKey {
                    key: key.to_string(),
                    owner: existing.topology,
                });
            }
        }
        let value = value.into();
        debug!(key, topology = %self.topology, "published parameter");
        self.backend.put(ParameterEntry {
            key: key.to_string(),
            value,
            topology: self.topology.clone(),
        })
    }

    /// Withdraw a key this topology owns, so readers fail fast once the
    /// backing resources are gone.
    ///
    /// Unpublishing an absent key is a no-op (teardown converges);
    /// unpublishing another topology's key is an error.
    pub fn unpublish(&self, key: &str) -> ParamResult<()> {
        match self.backend.get(key)? {
            None => Ok(()),
            Some(existing) if existing.topology != self.topology => Err(ParamError::ForeignKey {
                key: key.to_string(),
                owner: existing.topology,
            }),
            Some(_) => {
                debug!(key, topology = %self.topology, "unpublished parameter");
                self.backend.remove(key)
            }
        }
    }

    /// Read a required key, failing fast with the missing key name.
    pub fn read(&self, key: &str) -> ParamResult<String> {
        self.backend
            .get(key)?
            .map(|e| e.value)
            .ok_or_else(|| ParamError::MissingParameter(key.to_string()))
    }

    /// Read one of the documented optional keys, falling back to a default.
    ///
    /// Required keys never take this path; asking for a non-optional key
    /// here still fails fast when the key is absent.
    pub fn read_or(&self, key: &str, default: &str) -> ParamResult<String> {
        match self.backend.get(key)? {
            Some(entry) => Ok(entry.value),
            None if keys::is_optional(key) => {
                info!(key, default, "optional parameter absent; using default");
                Ok(default.to_string())
            }
            None => Err(ParamError::MissingParameter(key.to_string())),
        }
    }

    /// All entries under the channel namespace.
    pub fn entries(&self) -> ParamResult<Vec<ParameterEntry>> {
        self.backend.list(keys::NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn channel(topology: &str) -> (ParameterChannel, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        (
            ParameterChannel::new(backend.clone(), topology),
            backend,
        )
    }

    #[test]
    fn read_of_unpublished_key_is_missing_parameter() {
        let (ch, _) = channel("backend");
        let err = ch.read(keys::AGENT_API).unwrap_err();
        assert!(matches!(err, ParamError::MissingParameter(k) if k == keys::AGENT_API));
    }

    #[test]
    fn publish_then_read_round_trips() {
        let (ch, _) = channel("backend");
        ch.publish(keys::AGENT_API, "https://api.example.com/prod/")
            .unwrap();
        assert_eq!(
            ch.read(keys::AGENT_API).unwrap(),
            "https://api.example.com/prod/"
        );
    }

    #[test]
    fn republish_by_owner_overwrites() {
        let (ch, _) = channel("backend");
        ch.publish(keys::LLM_MODEL_ID, "anthropic.claude-v2").unwrap();
        ch.publish(keys::LLM_MODEL_ID, "anthropic.claude-v2:1").unwrap();
        assert_eq!(ch.read(keys::LLM_MODEL_ID).unwrap(), "anthropic.claude-v2:1");
    }

    #[test]
    fn foreign_key_publish_is_rejected() {
        let backend = Arc::new(InMemoryBackend::new());
        let backend_ch = ParameterChannel::new(backend.clone(), "backend");
        let delivery_ch = ParameterChannel::new(backend, "delivery");

        backend_ch.publish(keys::AGENT_API, "https://a").unwrap();
        let err = delivery_ch.publish(keys::AGENT_API, "https://b").unwrap_err();
        assert!(matches!(err, ParamError::ForeignKey { owner, .. } if owner == "backend"));
    }

    #[test]
    fn unpublished_key_reads_as_missing_again() {
        let (ch, _) = channel("backend");
        ch.publish(keys::AGENT_API, "https://a").unwrap();
        ch.unpublish(keys::AGENT_API).unwrap();

        let err = ch.read(keys::AGENT_API).unwrap_err();
        assert!(matches!(err, ParamError::MissingParameter(_)));
        // A second withdrawal converges instead of erroring.
        ch.unpublish(keys::AGENT_API).unwrap();
    }

    #[test]
    fn foreign_key_unpublish_is_rejected() {
        let backend = Arc::new(InMemoryBackend::new());
        let backend_ch = ParameterChannel::new(backend.clone(), "backend");
        let delivery_ch = ParameterChannel::new(backend, "delivery");

        backend_ch.publish(keys::AGENT_API, "https://a").unwrap();
        let err = delivery_ch.unpublish(keys::AGENT_API).unwrap_err();
        assert!(matches!(err, ParamError::ForeignKey { owner, .. } if owner == "backend"));
        assert!(backend_ch.read(keys::AGENT_API).is_ok());
    }

    #[test]
    fn keys_outside_namespace_are_rejected() {
        let (ch, _) = channel("backend");
        let err = ch.publish("/SomethingElse/key", "v").unwrap_err();
        assert!(matches!(err, ParamError::OutsideNamespace(_)));
    }

    #[test]
    fn optional_keys_may_default_but_required_keys_never_do() {
        let (ch, _) = channel("delivery");
        assert_eq!(
            ch.read_or(keys::BEDROCK_REGION, "eu-central-1").unwrap(),
            "eu-central-1"
        );
        let err = ch.read_or(keys::AGENT_API, "https://nope").unwrap_err();
        assert!(matches!(err, ParamError::MissingParameter(_)));
    }

    #[test]
    fn file_backend_is_shared_across_channel_instances() {
        let dir = tempdir().unwrap();
        let writer = ParameterChannel::new(Arc::new(FileBackend::new(dir.path())), "backend");
        writer
            .publish(keys::COGNITO_USER_POOL_ID, "eu-central-1_AbC123")
            .unwrap();

        // A later, independent process sees the published value.
        let reader = ParameterChannel::new(Arc::new(FileBackend::new(dir.path())), "delivery");
        assert_eq!(
            reader.read(keys::COGNITO_USER_POOL_ID).unwrap(),
            "eu-central-1_AbC123"
        );
    }
}
