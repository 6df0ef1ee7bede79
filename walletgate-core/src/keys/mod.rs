//! Key material: identity keypairs, the derivation hierarchy, and the
//! process-lifetime transit keys.

pub mod derivation;
pub mod keypair;
pub mod transit;

pub use derivation::{
    derive_app_key, derive_app_key_for_address, derive_owner_key, resolve_app_private_key,
    KeyError, OwnerKey, Seed,
};
pub use keypair::{address_for_public_key, Keypair, ADDRESS_PREFIX};
pub use transit::{TransitError, TransitKeys};
