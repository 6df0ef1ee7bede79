//! Transit encryption layer
//!
//! Credentials pass through the user's browser as URL parameters before
//! coming back to the broker, so they are sealed for the broker's own eyes:
//! an ephemeral X25519 agreement against the broker's transit key feeds
//! HKDF-SHA256 into ChaCha20-Poly1305, and the resulting envelope is wrapped
//! in a token signed by the broker's transit signing key. A tampered
//! envelope is rejected on the signature check, before any decryption work.
//!
//! One `TransitKeys` is generated per process and injected into handlers;
//! the private halves never leave the process.

use crate::keys::keypair::Keypair;
use crate::token;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{PublicKey as AgreementPublic, StaticSecret};

const TRANSIT_HKDF_LABEL: &[u8] = b"walletgate-transit-v1";
const TRANSIT_KEY_INFO: &[u8] = b"sealing-key";

#[derive(Debug, Error)]
pub enum TransitError {
    /// Outer envelope signature did not verify
    #[error("Token was not signed by this authenticator")]
    NotOurEnvelope,

    #[error("Malformed transit envelope: {0}")]
    Malformed(String),

    #[error("Transit decryption failed")]
    DecryptFailed,
}

/// Envelope claims carried inside the signed transit token
#[derive(Debug, Serialize, Deserialize)]
struct EnvelopeClaims {
    /// Ephemeral X25519 public key, hex
    epk: String,
    /// AEAD nonce, hex
    nonce: String,
    /// Ciphertext, hex
    ct: String,
}

fn derive_sealing_key(secret: &StaticSecret, public: &AgreementPublic) -> Key {
    let shared = secret.diffie_hellman(public);
    let hk = Hkdf::<Sha256>::new(Some(TRANSIT_HKDF_LABEL), shared.as_bytes());
    let mut out = [0u8; 32];
    hk.expand(TRANSIT_KEY_INFO, &mut out)
        .expect("32 bytes is a valid HKDF output length");
    Key::from(out)
}

/// Process-lifetime transit keypair: X25519 for sealing, Ed25519 for the
/// envelope signature.
pub struct TransitKeys {
    signing: Keypair,
    agreement_secret: StaticSecret,
    agreement_public: AgreementPublic,
}

impl TransitKeys {
    /// Generate fresh transit keys. Called once at process startup.
    pub fn generate() -> Self {
        let mut secret_bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret_bytes);
        let agreement_secret = StaticSecret::from(secret_bytes);
        let agreement_public = AgreementPublic::from(&agreement_secret);
        TransitKeys {
            signing: Keypair::generate(),
            agreement_secret,
            agreement_public,
        }
    }

    /// Public half of the envelope-signing key.
    pub fn signing_public_key(&self) -> &[u8; 32] {
        self.signing.public_key()
    }

    /// Seal a plaintext for this broker, returning a signed envelope token.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, TransitError> {
        let mut eph_bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut eph_bytes);
        let ephemeral = StaticSecret::from(eph_bytes);
        let ephemeral_public = AgreementPublic::from(&ephemeral);

        let key = derive_sealing_key(&ephemeral, &self.agreement_public);

        let mut nonce_bytes = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let cipher = ChaCha20Poly1305::new(&key);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| TransitError::Malformed("encryption failed".to_string()))?;

        let claims = EnvelopeClaims {
            epk: hex::encode(ephemeral_public.as_bytes()),
            nonce: hex::encode(nonce_bytes),
            ct: hex::encode(ciphertext),
        };
        token::sign(&self.signing, &claims)
            .map_err(|e| TransitError::Malformed(format!("envelope signing: {}", e)))
    }

    /// Verify an envelope token's signature and decrypt its payload.
    ///
    /// The signature check runs first, at constant cost regardless of the
    /// payload, so tampering is detected before decryption is attempted.
    pub fn open(&self, envelope_token: &str) -> Result<Vec<u8>, TransitError> {
        let claims: EnvelopeClaims =
            match token::verify(envelope_token, self.signing.public_key()) {
                Ok(claims) => claims,
                Err(crate::token::TokenError::BadSignature) => {
                    return Err(TransitError::NotOurEnvelope)
                }
                Err(e) => return Err(TransitError::Malformed(e.to_string())),
            };

        let epk_bytes: [u8; 32] = hex::decode(&claims.epk)
            .ok()
            .and_then(|v| v.try_into().ok())
            .ok_or_else(|| TransitError::Malformed("ephemeral key".to_string()))?;
        let nonce_bytes = hex::decode(&claims.nonce)
            .map_err(|_| TransitError::Malformed("nonce".to_string()))?;
        if nonce_bytes.len() != 12 {
            return Err(TransitError::Malformed("nonce length".to_string()));
        }
        let ciphertext = hex::decode(&claims.ct)
            .map_err(|_| TransitError::Malformed("ciphertext".to_string()))?;

        let ephemeral_public = AgreementPublic::from(epk_bytes);
        let key = derive_sealing_key(&self.agreement_secret, &ephemeral_public);

        let cipher = ChaCha20Poly1305::new(&key);
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| TransitError::DecryptFailed)
    }
}

impl std::fmt::Debug for TransitKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitKeys")
            .field("signing_public", &hex::encode(self.signing.public_key()))
            .field("agreement_public", &hex::encode(self.agreement_public.as_bytes()))
            .finish()
    }
}
