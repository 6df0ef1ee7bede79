//! The authentication handshake engine
//!
//! Two pipelines, each a sequence of typed steps over `Result`: the request
//! pipeline turns an application's auth request into a sign-in page with one
//! pre-built encrypted credential per identity, and the response pipeline
//! turns the chosen credential into a redirect carrying the final signed
//! credential. Each step fails with the most specific error available; the
//! HTTP layer maps errors to responses once, at the end.

pub mod request;
pub mod response;
pub mod types;

use crate::config::BrokerConfig;
use crate::hub::StorageHub;
use crate::keys::derivation::Seed;
use crate::keys::transit::TransitKeys;
use crate::manifest::ManifestFetcher;
use crate::registry::NameRegistry;
use std::sync::Arc;

pub use types::{
    AssociationClaims, AuthRequestClaims, CredentialClaims, CredentialMetadata, SignInLink,
    SignInPage, WRITE_SCOPE,
};

/// Everything a handshake pipeline needs, injected explicitly.
///
/// The transit keys are created once at process startup and read-only
/// afterwards; the collaborators are trait objects so tests and local mode
/// can substitute in-memory implementations.
pub struct Broker {
    pub(crate) seed: Seed,
    pub(crate) transit: Arc<TransitKeys>,
    pub(crate) registry: Arc<dyn NameRegistry>,
    pub(crate) hub: Arc<dyn StorageHub>,
    pub(crate) manifests: Arc<dyn ManifestFetcher>,
    pub(crate) config: BrokerConfig,
}

impl Broker {
    pub fn new(
        seed: Seed,
        transit: Arc<TransitKeys>,
        registry: Arc<dyn NameRegistry>,
        hub: Arc<dyn StorageHub>,
        manifests: Arc<dyn ManifestFetcher>,
        config: BrokerConfig,
    ) -> Self {
        Broker {
            seed,
            transit,
            registry,
            hub,
            manifests,
            config,
        }
    }

    pub fn transit(&self) -> &TransitKeys {
        &self.transit
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}
