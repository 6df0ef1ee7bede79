//! Name registry interface
//!
//! The decentralized name registry is an external collaborator: it resolves
//! which names an address owns and what profile a name points at. The broker
//! only depends on this trait; the in-memory implementation backs tests and
//! the CLI's local mode.

use crate::profile::Profile;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::RwLock;

/// Which address encoding a lookup uses.
///
/// Discovery always queries in the canonical form regardless of the network
/// the broker is configured against, so the broker itself only ever issues
/// `Canonical` lookups; `Test` exists for registry implementations that also
/// serve a test network. The mode is an explicit parameter on every lookup
/// rather than process state, so concurrent pipelines cannot observe each
/// other's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    /// Canonical (main network) address encoding
    Canonical,
    /// Test network address encoding
    Test,
}

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Name not found: {0}")]
    NameNotFound(String),

    #[error("Registry lookup failed: {0}")]
    Lookup(String),

    #[error("Registry lookup timed out")]
    Timeout,
}

/// What a name resolves to
#[derive(Debug, Clone)]
pub struct NameRecord {
    pub profile: Profile,
    pub profile_url: String,
}

/// The name-registry interface the broker depends on
#[async_trait]
pub trait NameRegistry: Send + Sync {
    /// All names owned by `address`, interpreted in `mode`.
    async fn names_owned_by(
        &self,
        address: &str,
        mode: AddressMode,
    ) -> Result<Vec<String>, RegistryError>;

    /// Resolve a name to its profile document and profile URL.
    async fn lookup(&self, name: &str) -> Result<NameRecord, RegistryError>;
}

/// In-memory registry for tests and local mode
#[derive(Default)]
pub struct MemoryRegistry {
    names_by_address: RwLock<HashMap<String, Vec<String>>>,
    records: RwLock<HashMap<String, NameRecord>>,
    broken_names: RwLock<HashSet<String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name as owned by `address`, resolving to `record`.
    pub async fn register(&self, address: &str, name: &str, record: NameRecord) {
        self.names_by_address
            .write()
            .await
            .entry(address.to_string())
            .or_default()
            .push(name.to_string());
        self.records.write().await.insert(name.to_string(), record);
    }

    /// Update the profile a registered name resolves to.
    pub async fn set_profile(&self, name: &str, profile: Profile) {
        if let Some(record) = self.records.write().await.get_mut(name) {
            record.profile = profile;
        }
    }

    /// Profile currently recorded for a name.
    pub async fn profile_of(&self, name: &str) -> Option<Profile> {
        self.records.read().await.get(name).map(|r| r.profile.clone())
    }

    /// Make lookups for `name` fail, simulating a registry fault.
    pub async fn break_name(&self, name: &str) {
        self.broken_names.write().await.insert(name.to_string());
    }
}

#[async_trait]
impl NameRegistry for MemoryRegistry {
    async fn names_owned_by(
        &self,
        address: &str,
        _mode: AddressMode,
    ) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .names_by_address
            .read()
            .await
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn lookup(&self, name: &str) -> Result<NameRecord, RegistryError> {
        if self.broken_names.read().await.contains(name) {
            return Err(RegistryError::Lookup(format!("simulated fault for {}", name)));
        }
        self.records
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NameNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = MemoryRegistry::new();
        registry
            .register(
                "ID-abc",
                "alice",
                NameRecord {
                    profile: Profile::minimal(),
                    profile_url: "https://hub.example/alice/profile.json".to_string(),
                },
            )
            .await;

        let names = registry
            .names_owned_by("ID-abc", AddressMode::Canonical)
            .await
            .unwrap();
        assert_eq!(names, vec!["alice".to_string()]);

        let record = registry.lookup("alice").await.unwrap();
        assert!(record.profile_url.contains("alice"));
    }

    #[tokio::test]
    async fn test_unowned_address_has_no_names() {
        let registry = MemoryRegistry::new();
        let names = registry
            .names_owned_by("ID-nobody", AddressMode::Canonical)
            .await
            .unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_broken_name_fails_lookup() {
        let registry = MemoryRegistry::new();
        registry
            .register(
                "ID-abc",
                "bob",
                NameRecord {
                    profile: Profile::minimal(),
                    profile_url: "https://hub.example/bob/profile.json".to_string(),
                },
            )
            .await;
        registry.break_name("bob").await;
        assert!(matches!(
            registry.lookup("bob").await,
            Err(RegistryError::Lookup(_))
        ));
    }
}
