//! Storage hub interface
//!
//! The content-addressed storage hub is an external collaborator: connecting
//! with an application key yields that key's write endpoint descriptor, and
//! profiles are uploaded as signed documents. The broker only depends on the
//! trait; `MemoryHub` backs tests and the CLI's local mode, and counts
//! uploads so scope-gated write behavior is observable.

use crate::keys::keypair::address_for_public_key;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

/// Hub errors
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Hub connection failed: {0}")]
    Connect(String),

    #[error("Hub upload failed: {0}")]
    Upload(String),
}

/// An application-specific storage endpoint descriptor.
///
/// `url_prefix + address + "/"` is the application's storage read prefix.
/// Recomputed per handshake, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct AppStorageConfig {
    pub url_prefix: String,
    pub address: String,
}

impl AppStorageConfig {
    /// The read prefix the profile's `apps` pointer must start with.
    pub fn read_prefix(&self) -> String {
        format!("{}{}/", self.url_prefix, self.address)
    }
}

/// The storage-hub interface the broker depends on
#[async_trait]
pub trait StorageHub: Send + Sync {
    /// Connect with an application public key, obtaining its storage
    /// endpoint descriptor.
    async fn connect(&self, app_public_key: &[u8]) -> Result<AppStorageConfig, HubError>;

    /// Upload a signed profile document for `owner_address`, returning the
    /// URL it is readable at.
    async fn upload_profile(
        &self,
        owner_address: &str,
        signed_profile: &str,
    ) -> Result<String, HubError>;
}

/// In-memory hub for tests and local mode
pub struct MemoryHub {
    url_prefix: String,
    writes: RwLock<Vec<(String, String)>>,
    fail_uploads: AtomicBool,
    fail_connects: AtomicBool,
}

impl MemoryHub {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        MemoryHub {
            url_prefix: url_prefix.into(),
            writes: RwLock::new(Vec::new()),
            fail_uploads: AtomicBool::new(false),
            fail_connects: AtomicBool::new(false),
        }
    }

    /// Number of profile uploads this hub has received.
    pub async fn write_count(&self) -> usize {
        self.writes.read().await.len()
    }

    /// The most recent upload, as `(owner_address, signed_profile)`.
    pub async fn last_write(&self) -> Option<(String, String)> {
        self.writes.read().await.last().cloned()
    }

    /// Make subsequent uploads fail, simulating a storage-layer fault.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent connects fail.
    pub fn fail_connects(&self, fail: bool) {
        self.fail_connects.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageHub for MemoryHub {
    async fn connect(&self, app_public_key: &[u8]) -> Result<AppStorageConfig, HubError> {
        if self.fail_connects.load(Ordering::SeqCst) {
            return Err(HubError::Connect("simulated connect fault".to_string()));
        }
        Ok(AppStorageConfig {
            url_prefix: self.url_prefix.clone(),
            address: address_for_public_key(app_public_key),
        })
    }

    async fn upload_profile(
        &self,
        owner_address: &str,
        signed_profile: &str,
    ) -> Result<String, HubError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(HubError::Upload("simulated upload fault".to_string()));
        }
        self.writes
            .write()
            .await
            .push((owner_address.to_string(), signed_profile.to_string()));
        Ok(format!("{}{}/profile.json", self.url_prefix, owner_address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair::Keypair;

    #[tokio::test]
    async fn test_connect_derives_address_from_key() {
        let hub = MemoryHub::new("https://hub.example/store/");
        let kp = Keypair::generate();
        let config = hub.connect(kp.public_key()).await.unwrap();
        assert_eq!(config.address, kp.address());
        assert!(config.read_prefix().ends_with('/'));
        assert!(config.read_prefix().starts_with(&config.url_prefix));
    }

    #[tokio::test]
    async fn test_uploads_are_counted() {
        let hub = MemoryHub::new("https://hub.example/store/");
        assert_eq!(hub.write_count().await, 0);
        hub.upload_profile("ID-abc", "signed").await.unwrap();
        assert_eq!(hub.write_count().await, 1);
        assert_eq!(
            hub.last_write().await,
            Some(("ID-abc".to_string(), "signed".to_string()))
        );
    }

    #[tokio::test]
    async fn test_simulated_upload_fault() {
        let hub = MemoryHub::new("https://hub.example/store/");
        hub.fail_uploads(true);
        assert!(matches!(
            hub.upload_profile("ID-abc", "signed").await,
            Err(HubError::Upload(_))
        ));
        assert_eq!(hub.write_count().await, 0);
    }
}
