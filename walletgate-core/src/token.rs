//! Compact signed tokens
//!
//! Three-part `header.claims.signature` tokens: base64url segments, JSON
//! payloads, Ed25519 signatures over `header.claims`. This is the wire
//! format for auth requests, credentials, and transit envelopes.

use crate::keys::keypair::Keypair;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token signature is invalid")]
    BadSignature,

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    typ: String,
    alg: String,
}

impl Header {
    fn new() -> Self {
        Header {
            typ: "JWT".to_string(),
            alg: "EdDSA".to_string(),
        }
    }
}

/// Sign `claims` with `keypair`, producing a compact token.
pub fn sign<T: Serialize>(keypair: &Keypair, claims: &T) -> Result<String, TokenError> {
    let header = serde_json::to_vec(&Header::new()).map_err(|e| TokenError::Encoding(e.to_string()))?;
    let claims = serde_json::to_vec(claims).map_err(|e| TokenError::Encoding(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(claims)
    );
    let signature = keypair.sign(signing_input.as_bytes());
    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

fn split(token: &str) -> Result<(&str, &str, &str), TokenError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) => Ok((h, c, s)),
        _ => Err(TokenError::Malformed(
            "expected three dot-separated segments".to_string(),
        )),
    }
}

fn decode_claims<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("claims segment: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(format!("claims JSON: {}", e)))
}

/// Verify a token against a raw Ed25519 public key and decode its claims.
pub fn verify<T: DeserializeOwned>(token: &str, pubkey: &[u8]) -> Result<T, TokenError> {
    let (header, claims, signature) = split(token)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| TokenError::Malformed(format!("signature segment: {}", e)))?;
    let signing_input = format!("{}.{}", header, claims);
    if !Keypair::verify(pubkey, signing_input.as_bytes(), &sig_bytes) {
        return Err(TokenError::BadSignature);
    }
    decode_claims(claims)
}

/// Decode a token's claims without verifying the signature.
///
/// Used to read the issuer key out of a token before deciding which key to
/// verify it against. Never trust unverified claims beyond that.
pub fn decode_unverified<T: DeserializeOwned>(token: &str) -> Result<T, TokenError> {
    let (_, claims, _) = split(token)?;
    decode_claims(claims)
}
