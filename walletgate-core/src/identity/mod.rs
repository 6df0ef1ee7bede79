//! Identities and their discovery
//!
//! An identity is one user-controlled keypair/address, optionally bound to a
//! registered name. Identities live only for the request that derived them;
//! every pipeline re-derives them from the seed.

pub mod discovery;

use crate::keys::keypair::Keypair;
use crate::profile::Profile;

pub use discovery::discover_identities;

/// One self-derived identity, valid for the duration of a single handshake
#[derive(Debug, Clone)]
pub struct Identity {
    /// Registered name, if the identity owns one
    pub name: Option<String>,
    /// Identity address derived from `(seed, index)`
    pub id_address: String,
    /// Owner keypair matching `id_address`
    pub keypair: Keypair,
    /// Derivation index, unique within one discovery run
    pub index: u32,
    /// Resolved profile document, if any
    pub profile: Option<Profile>,
    /// Where the profile document is served from
    pub profile_url: Option<String>,
}

impl Identity {
    /// Label shown on the sign-in page: named identities render as
    /// `name (address)`, the anonymous one as `address (anonymous)`.
    pub fn display_label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", name, self.id_address),
            None => format!("{} (anonymous)", self.id_address),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }
}
