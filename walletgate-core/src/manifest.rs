//! Application manifest fetching
//!
//! An application's manifest describes how it presents itself on the sign-in
//! page. Fetching is an external concern; the broker depends on the trait
//! only. `StaticManifests` serves fixed documents for tests, or synthesizes
//! one per origin in permissive mode for local runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest fetch failed: {0}")]
    Fetch(String),
}

/// Application descriptor shown on the sign-in page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// The manifest-fetching interface the broker depends on
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch the manifest for the application at `origin` from
    /// `manifest_uri` (as claimed in its verified auth request).
    async fn fetch(&self, origin: &str, manifest_uri: &str) -> Result<AppManifest, ManifestError>;
}

/// Fixed manifest store for tests and local mode
pub struct StaticManifests {
    manifests: RwLock<HashMap<String, AppManifest>>,
    permissive: bool,
}

impl StaticManifests {
    /// Only explicitly inserted manifests resolve.
    pub fn new() -> Self {
        StaticManifests {
            manifests: RwLock::new(HashMap::new()),
            permissive: false,
        }
    }

    /// Unknown origins get a manifest synthesized from the origin itself.
    pub fn permissive() -> Self {
        StaticManifests {
            manifests: RwLock::new(HashMap::new()),
            permissive: true,
        }
    }

    pub async fn insert(&self, origin: &str, manifest: AppManifest) {
        self.manifests
            .write()
            .await
            .insert(origin.to_string(), manifest);
    }
}

impl Default for StaticManifests {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ManifestFetcher for StaticManifests {
    async fn fetch(&self, origin: &str, _manifest_uri: &str) -> Result<AppManifest, ManifestError> {
        if let Some(manifest) = self.manifests.read().await.get(origin) {
            return Ok(manifest.clone());
        }
        if self.permissive {
            return Ok(AppManifest {
                name: origin.to_string(),
                description: None,
                icon_url: None,
            });
        }
        Err(ManifestError::Fetch(format!("no manifest for {}", origin)))
    }
}
