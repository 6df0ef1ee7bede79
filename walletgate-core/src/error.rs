//! Error taxonomy for the authentication handshake
//!
//! Every pipeline step fails with the most specific variant available; the
//! HTTP layer maps variants to status codes once, at the end of the
//! pipeline. Variants that would expose internals (storage connectivity,
//! registry faults) are reported to clients with a generic message.

use thiserror::Error;

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors that can occur during an authentication handshake
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Missing or malformed input token
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Signature or claims invalid
    #[error("Verification failed: {0}")]
    Verification(String),

    /// The requesting application's manifest could not be fetched
    #[error("Failed to fetch application manifest: {0}")]
    ManifestFetch(String),

    /// Connecting to the application's storage hub failed
    #[error("Failed to connect to storage hub: {0}")]
    StorageConnect(String),

    /// Uploading the reconciled profile failed
    #[error("Failed to upload profile: {0}")]
    StorageUpload(String),

    /// Identity discovery exceeded its iteration bound
    #[error("Too many identities: discovery exceeded {0} indices")]
    TooManyIdentities(u32),

    /// Name registry fault during discovery
    #[error("Registry error: {0}")]
    Registry(String),

    /// Internal fault (should not reach clients verbatim)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// HTTP status code for this error class.
    ///
    /// Validation failures are the client's fault (400); a storage-layer
    /// fault during upload is a different failure class (502); everything
    /// else is internal (500).
    pub fn http_status(&self) -> u16 {
        match self {
            BrokerError::BadRequest(_)
            | BrokerError::Verification(_)
            | BrokerError::ManifestFetch(_) => 400,
            BrokerError::StorageUpload(_) => 502,
            _ => 500,
        }
    }

    /// Message safe to expose at the network boundary.
    ///
    /// Internal classes are collapsed to a generic message so stack traces
    /// and collaborator addresses never leave the broker.
    pub fn client_message(&self) -> String {
        match self {
            BrokerError::BadRequest(_)
            | BrokerError::Verification(_)
            | BrokerError::ManifestFetch(_)
            | BrokerError::StorageUpload(_) => self.to_string(),
            _ => "Internal error".to_string(),
        }
    }
}

impl From<crate::token::TokenError> for BrokerError {
    fn from(e: crate::token::TokenError) -> Self {
        BrokerError::Verification(e.to_string())
    }
}

impl From<crate::keys::KeyError> for BrokerError {
    fn from(e: crate::keys::KeyError) -> Self {
        BrokerError::Internal(e.to_string())
    }
}

impl From<crate::registry::RegistryError> for BrokerError {
    fn from(e: crate::registry::RegistryError) -> Self {
        BrokerError::Registry(e.to_string())
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(e: serde_json::Error) -> Self {
        BrokerError::Internal(format!("serialization: {}", e))
    }
}
