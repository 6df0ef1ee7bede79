//! Deterministic key derivation
//!
//! The whole key hierarchy hangs off one seed (from the user's mnemonic):
//!
//! - owner keys: one per identity index, via HKDF with the index as context
//! - application keys: one per (identity, application origin), with two
//!   derivation paths; see [`resolve_app_private_key`]
//!
//! All derivations are pure functions of their inputs.

use crate::keys::keypair::Keypair;
use crate::profile::Profile;
use bip39::Mnemonic;
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroize;

const OWNER_KEY_LABEL: &[u8] = b"walletgate-owner-key-v1";
const APP_KEY_LABEL: &[u8] = b"walletgate-app-key-v1";
const APP_KEY_LEGACY_LABEL: &[u8] = b"walletgate-app-key-v0";

/// Key derivation errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),
}

/// The wallet seed all keys derive from. Zeroized on drop.
#[derive(Clone)]
pub struct Seed([u8; 64]);

impl Seed {
    /// Derive the seed from a validated BIP-39 mnemonic phrase.
    pub fn from_mnemonic(phrase: &str) -> Result<Self, KeyError> {
        let mnemonic =
            Mnemonic::parse(phrase).map_err(|e| KeyError::InvalidMnemonic(e.to_string()))?;
        Ok(Seed(mnemonic.to_seed("")))
    }

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Seed(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for Seed {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(<redacted>)")
    }
}

/// An identity's owner keypair and address at one derivation index
#[derive(Debug, Clone)]
pub struct OwnerKey {
    pub index: u32,
    pub address: String,
    pub keypair: Keypair,
}

fn hkdf_expand_32(seed: &Seed, label: &[u8], info: &[u8]) -> Result<[u8; 32], KeyError> {
    let hk = Hkdf::<Sha256>::new(Some(label), seed.as_bytes());
    let mut out = [0u8; 32];
    hk.expand(info, &mut out)
        .map_err(|e| KeyError::Derivation(e.to_string()))?;
    Ok(out)
}

/// Derive the owner keypair and identity address for `(seed, index)`.
pub fn derive_owner_key(seed: &Seed, index: u32) -> Result<OwnerKey, KeyError> {
    let material = hkdf_expand_32(seed, OWNER_KEY_LABEL, &index.to_be_bytes())?;
    let keypair = Keypair::from_seed_bytes(material);
    Ok(OwnerKey {
        index,
        address: keypair.address(),
        keypair,
    })
}

/// Context-free application key for `(seed, id_address, origin, index)`.
pub fn derive_app_key(
    seed: &Seed,
    id_address: &str,
    origin: &str,
    index: u32,
) -> Result<Keypair, KeyError> {
    let mut info = Vec::with_capacity(id_address.len() + origin.len() + 6);
    info.extend_from_slice(id_address.as_bytes());
    info.push(0);
    info.extend_from_slice(origin.as_bytes());
    info.push(0);
    info.extend_from_slice(&index.to_be_bytes());
    let material = hkdf_expand_32(seed, APP_KEY_LABEL, &info)?;
    Ok(Keypair::from_seed_bytes(material))
}

/// Address-aware (index-free) application key derivation. This is the older
/// derivation path; a key produced by it is recognizable through the storage
/// address recorded in the identity's profile.
pub fn derive_app_key_for_address(
    seed: &Seed,
    id_address: &str,
    origin: &str,
) -> Result<Keypair, KeyError> {
    let mut info = Vec::with_capacity(id_address.len() + origin.len() + 1);
    info.extend_from_slice(id_address.as_bytes());
    info.push(0);
    info.extend_from_slice(origin.as_bytes());
    let material = hkdf_expand_32(seed, APP_KEY_LEGACY_LABEL, &info)?;
    Ok(Keypair::from_seed_bytes(material))
}

/// Resolve the application private key for an identity and origin.
///
/// If the profile already records a storage pointer for `origin`, the
/// address-aware derivation is tried first and wins when its address matches
/// the recorded one; on any lookup failure (no entry, unparsable pointer,
/// address mismatch) resolution falls back to the context-free derivation.
/// The two fallback causes are deliberately not distinguished: the contract
/// is key reproducibility across sessions, even with stale profile state.
pub fn resolve_app_private_key(
    seed: &Seed,
    id_address: &str,
    profile: Option<&Profile>,
    origin: &str,
    index: u32,
) -> Result<Keypair, KeyError> {
    if let Some(referenced) = profile.and_then(|p| p.app_storage_address(origin)) {
        let candidate = derive_app_key_for_address(seed, id_address, origin)?;
        if candidate.address() == referenced {
            return Ok(candidate);
        }
    }
    derive_app_key(seed, id_address, origin, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::AppStorageConfig;
    use crate::profile::reconcile;

    const PHRASE: &str =
        "legal winner thank year wave sausage worth useful legal winner thank yellow";

    fn seed() -> Seed {
        Seed::from_mnemonic(PHRASE).unwrap()
    }

    #[test]
    fn test_invalid_mnemonic_rejected() {
        assert!(matches!(
            Seed::from_mnemonic("definitely not a mnemonic"),
            Err(KeyError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_owner_key_deterministic() {
        let s = seed();
        let a = derive_owner_key(&s, 3).unwrap();
        let b = derive_owner_key(&s, 3).unwrap();
        assert_eq!(a.address, b.address);
        assert_eq!(a.keypair.public_key(), b.keypair.public_key());
    }

    #[test]
    fn test_owner_key_distinct_per_index() {
        let s = seed();
        let mut addresses = std::collections::HashSet::new();
        for index in 0..32 {
            assert!(addresses.insert(derive_owner_key(&s, index).unwrap().address));
        }
    }

    #[test]
    fn test_app_key_depends_on_all_inputs() {
        let s = seed();
        let base = derive_app_key(&s, "ID-abc", "https://app.example", 0).unwrap();
        let other_origin = derive_app_key(&s, "ID-abc", "https://other.example", 0).unwrap();
        let other_index = derive_app_key(&s, "ID-abc", "https://app.example", 1).unwrap();
        assert_ne!(base.public_key(), other_origin.public_key());
        assert_ne!(base.public_key(), other_index.public_key());
    }

    #[test]
    fn test_resolver_prefers_address_aware_path() {
        let s = seed();
        let owner = derive_owner_key(&s, 0).unwrap();
        let origin = "https://app.example";

        // Profile whose storage pointer was written by the legacy key
        let legacy = derive_app_key_for_address(&s, &owner.address, origin).unwrap();
        let config = AppStorageConfig {
            url_prefix: "https://hub.example/store/".to_string(),
            address: legacy.address(),
        };
        let (profile, _) = reconcile(None, origin, &config);

        let resolved =
            resolve_app_private_key(&s, &owner.address, Some(&profile), origin, 0).unwrap();
        assert_eq!(resolved.public_key(), legacy.public_key());
    }

    #[test]
    fn test_resolver_falls_back_without_profile_entry() {
        let s = seed();
        let owner = derive_owner_key(&s, 0).unwrap();
        let origin = "https://app.example";

        let resolved = resolve_app_private_key(&s, &owner.address, None, origin, 0).unwrap();
        let context_free = derive_app_key(&s, &owner.address, origin, 0).unwrap();
        assert_eq!(resolved.public_key(), context_free.public_key());
    }

    #[test]
    fn test_resolver_falls_back_on_address_mismatch() {
        let s = seed();
        let owner = derive_owner_key(&s, 0).unwrap();
        let origin = "https://app.example";

        // Pointer written by a key this seed cannot reproduce
        let config = AppStorageConfig {
            url_prefix: "https://hub.example/store/".to_string(),
            address: "ID-unrelated".to_string(),
        };
        let (profile, _) = reconcile(None, origin, &config);

        let resolved =
            resolve_app_private_key(&s, &owner.address, Some(&profile), origin, 0).unwrap();
        let context_free = derive_app_key(&s, &owner.address, origin, 0).unwrap();
        assert_eq!(resolved.public_key(), context_free.public_key());
    }
}
