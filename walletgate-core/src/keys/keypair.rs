//! Ed25519 signing keypairs and identity addresses
//!
//! Every key in the broker's hierarchy is an Ed25519 keypair built from a
//! 32-byte seed, so derivation stays deterministic end to end. An identity
//! address is a base58 encoding of the truncated SHA-256 of the public key,
//! carrying an `ID-` prefix.
//!
//! Secret material is zeroized on drop.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroize;

/// Prefix distinguishing identity addresses from other base58 strings
pub const ADDRESS_PREFIX: &str = "ID-";

/// An Ed25519 keypair with its seed held privately
#[derive(Clone)]
pub struct Keypair {
    public: [u8; 32],
    secret: [u8; 32],
}

impl Keypair {
    /// Build a keypair from a 32-byte seed. Deterministic.
    pub fn from_seed_bytes(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let public = signing_key.verifying_key().to_bytes();
        Keypair { public, secret: seed }
    }

    /// Generate a keypair from OS randomness.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        let kp = Self::from_seed_bytes(seed);
        seed.zeroize();
        kp
    }

    /// Sign a message, returning the 64-byte signature.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::from_bytes(&self.secret);
        signing_key.sign(msg).to_bytes().to_vec()
    }

    /// Verify a signature against a raw 32-byte public key.
    pub fn verify(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> bool {
        let pubkey: [u8; 32] = match pubkey.try_into() {
            Ok(pk) => pk,
            Err(_) => return false,
        };
        let verifying_key = match VerifyingKey::from_bytes(&pubkey) {
            Ok(vk) => vk,
            Err(_) => return false,
        };
        let signature = match Signature::from_slice(sig) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        verifying_key.verify(msg, &signature).is_ok()
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public)
    }

    /// Identity address of this keypair's public key.
    pub fn address(&self) -> String {
        address_for_public_key(&self.public)
    }
}

/// Compute the identity address for a raw public key.
pub fn address_for_public_key(pubkey: &[u8]) -> String {
    let digest = Sha256::digest(pubkey);
    format!("{}{}", ADDRESS_PREFIX, bs58::encode(&digest[..20]).into_string())
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public))
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_seed_deterministic() {
        let kp1 = Keypair::from_seed_bytes([7u8; 32]);
        let kp2 = Keypair::from_seed_bytes([7u8; 32]);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.address(), kp2.address());
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = Keypair::generate();
        let msg = b"handshake payload";
        let sig = kp.sign(msg);
        assert_eq!(sig.len(), 64);
        assert!(Keypair::verify(kp.public_key(), msg, &sig));
        assert!(!Keypair::verify(kp.public_key(), b"other payload", &sig));
    }

    #[test]
    fn test_verify_rejects_garbage_inputs() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"msg");
        assert!(!Keypair::verify(&[0u8; 31], b"msg", &sig));
        assert!(!Keypair::verify(kp.public_key(), b"msg", &[0u8; 10]));
    }

    #[test]
    fn test_address_format() {
        let kp = Keypair::from_seed_bytes([1u8; 32]);
        let addr = kp.address();
        assert!(addr.starts_with(ADDRESS_PREFIX));
        assert!(addr.len() > ADDRESS_PREFIX.len() + 10);
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let kp = Keypair::from_seed_bytes([9u8; 32]);
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.contains("<redacted>"));
        assert!(!debug_str.contains(&hex::encode([9u8; 32])));
    }
}
