//! Backup-phrase encryption
//!
//! Protects the wallet mnemonic at rest. The phrase is normalized to its
//! entropy form, encrypted under AES-128-CBC with keys drawn from a
//! PBKDF2-SHA512 block (100,000 iterations over a fresh 16-byte salt, split
//! 16/16/16 into cipher key, MAC key, and IV), and authenticated with
//! HMAC-SHA256 over `salt || ciphertext`. Stored layout, concatenated:
//!
//! ```text
//! salt(16) || hmac(32) || ciphertext(..)
//! ```
//!
//! Decryption authenticates before touching the ciphertext, comparing
//! SHA-256 hashes of the two MACs so comparison time does not correlate
//! with ciphertext content. A recovered plaintext must itself be a valid
//! mnemonic. [`decrypt_backup_phrase`] also falls back to the pre-MAC
//! legacy layout (`iv(16) || ciphertext`, AES-256-CBC under
//! SHA-256(password)) for backward compatibility.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use bip39::Mnemonic;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const PBKDF2_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;
const MAC_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed backup blob: {0}")]
    Malformed(String),

    /// Wrong password: the recomputed MAC does not match the stored one
    #[error("Wrong password (HMAC mismatch)")]
    Authentication,

    /// Decryption succeeded mechanically but did not yield a valid mnemonic
    #[error("Invalid plaintext: {0}")]
    InvalidPlaintext(String),

    #[error("Not a valid encrypted backup phrase: {current}; legacy format: {legacy}")]
    AllFormatsFailed { current: String, legacy: String },
}

struct DerivedKeys {
    cipher_key: [u8; 16],
    mac_key: [u8; 16],
    iv: [u8; 16],
}

fn derive_keys(password: &str, salt: &[u8]) -> DerivedKeys {
    let mut block = [0u8; 48];
    pbkdf2::pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut block);

    let mut keys = DerivedKeys {
        cipher_key: [0u8; 16],
        mac_key: [0u8; 16],
        iv: [0u8; 16],
    };
    keys.cipher_key.copy_from_slice(&block[0..16]);
    keys.mac_key.copy_from_slice(&block[16..32]);
    keys.iv.copy_from_slice(&block[32..48]);
    keys
}

fn compute_mac(mac_key: &[u8], salt: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(salt);
    mac.update(ciphertext);
    mac.finalize().into_bytes().into()
}

/// Encrypt a validated mnemonic phrase under a password.
pub fn encrypt_backup_phrase(phrase: &str, password: &str) -> Result<Vec<u8>, BackupError> {
    if password.is_empty() {
        return Err(BackupError::InvalidInput("password must not be empty".to_string()));
    }
    let mnemonic =
        Mnemonic::parse(phrase).map_err(|e| BackupError::InvalidMnemonic(e.to_string()))?;
    let entropy = mnemonic.to_entropy();

    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let keys = derive_keys(password, &salt);
    let ciphertext = Aes128CbcEnc::new(&keys.cipher_key.into(), &keys.iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(&entropy);
    let mac = compute_mac(&keys.mac_key, &salt, &ciphertext);

    let mut out = Vec::with_capacity(SALT_LEN + MAC_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&mac);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn decrypt_current(data: &[u8], password: &str) -> Result<String, BackupError> {
    if data.len() < SALT_LEN + MAC_LEN + 16 {
        return Err(BackupError::Malformed("blob too short".to_string()));
    }
    let salt = &data[..SALT_LEN];
    let stored_mac = &data[SALT_LEN..SALT_LEN + MAC_LEN];
    let ciphertext = &data[SALT_LEN + MAC_LEN..];

    let keys = derive_keys(password, salt);
    let expected_mac = compute_mac(&keys.mac_key, salt, ciphertext);

    // Hash both sides before comparing so the comparison itself cannot leak
    // anything correlated with ciphertext content.
    if Sha256::digest(expected_mac) != Sha256::digest(stored_mac) {
        return Err(BackupError::Authentication);
    }

    let entropy = Aes128CbcDec::new(&keys.cipher_key.into(), &keys.iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| BackupError::InvalidPlaintext("bad padding".to_string()))?;

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| BackupError::InvalidPlaintext(e.to_string()))?;
    Ok(mnemonic.to_string())
}

fn decrypt_legacy(data: &[u8], password: &str) -> Result<String, BackupError> {
    if data.len() < 32 {
        return Err(BackupError::Malformed("blob too short for legacy layout".to_string()));
    }
    let iv: [u8; 16] = data[..16].try_into().expect("length checked");
    let ciphertext = &data[16..];

    let key: [u8; 32] = Sha256::digest(password.as_bytes()).into();
    let entropy = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| BackupError::InvalidPlaintext("bad padding".to_string()))?;

    // No MAC in the legacy layout; mnemonic validity is the only check.
    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| BackupError::InvalidPlaintext(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Decrypt an encrypted backup phrase, trying the current format first and
/// the legacy format second. Both failure messages surface when neither
/// format accepts the blob.
pub fn decrypt_backup_phrase(data: &[u8], password: &str) -> Result<String, BackupError> {
    let current_err = match decrypt_current(data, password) {
        Ok(phrase) => return Ok(phrase),
        Err(e) => e,
    };
    match decrypt_legacy(data, password) {
        Ok(phrase) => Ok(phrase),
        Err(legacy_err) => Err(BackupError::AllFormatsFailed {
            current: current_err.to_string(),
            legacy: legacy_err.to_string(),
        }),
    }
}
