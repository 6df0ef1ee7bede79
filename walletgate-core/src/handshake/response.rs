//! Auth response pipeline
//!
//! `RECEIVED → ENVELOPE_VERIFIED → CREDENTIAL_VERIFIED → STORAGE_CONNECTED →
//! PROFILE_RECONCILED → DONE`, or an error out of any step. Receives the one
//! encrypted credential the user chose, recovers and re-verifies it exactly
//! as the application would, reconciles the profile's storage pointer, and
//! redirects back to the application with the outward-facing credential.

use crate::error::{BrokerError, BrokerResult};
use crate::handshake::types::{CredentialClaims, CredentialMetadata, WRITE_SCOPE};
use crate::handshake::Broker;
use crate::keys::derivation::{derive_owner_key, resolve_app_private_key, OwnerKey};
use crate::keys::keypair::address_for_public_key;
use crate::keys::transit::TransitError;
use crate::profile::{reconcile, Profile};
use crate::token;
use tokio::time::timeout;
use tracing::debug;

/// Verified handshake state extracted from the inner credential
struct VerifiedCredential {
    claims: CredentialClaims,
    app_origin: String,
    redirect_uri: String,
    scopes: Vec<String>,
    identity_index: u32,
}

fn open_envelope(broker: &Broker, token_str: &str) -> BrokerResult<String> {
    if token_str.len() > broker.config.max_token_length {
        return Err(BrokerError::BadRequest("encrypted credential too large".to_string()));
    }
    let plaintext = broker.transit.open(token_str).map_err(|e| match e {
        TransitError::NotOurEnvelope => BrokerError::Verification(e.to_string()),
        TransitError::DecryptFailed => {
            BrokerError::Verification("transit decryption failed".to_string())
        }
        TransitError::Malformed(msg) => {
            BrokerError::BadRequest(format!("malformed encrypted credential: {}", msg))
        }
    })?;
    String::from_utf8(plaintext)
        .map_err(|_| BrokerError::BadRequest("credential is not valid UTF-8".to_string()))
}

/// Verify the inner credential the way the relying application would:
/// signature against the embedded issuer key, address binding, and presence
/// of the handshake metadata this broker put there.
fn verify_credential(credential: &str) -> BrokerResult<VerifiedCredential> {
    let unverified: CredentialClaims = token::decode_unverified(credential)
        .map_err(|e| BrokerError::BadRequest(format!("malformed credential: {}", e)))?;

    let issuer_key = hex::decode(&unverified.iss)
        .map_err(|_| BrokerError::BadRequest("malformed issuer key in credential".to_string()))?;

    let claims: CredentialClaims = match token::verify(credential, &issuer_key) {
        Ok(claims) => claims,
        Err(token::TokenError::BadSignature) => {
            return Err(BrokerError::Verification(
                "credential signature is invalid".to_string(),
            ))
        }
        Err(e) => return Err(BrokerError::BadRequest(format!("malformed credential: {}", e))),
    };

    if address_for_public_key(&issuer_key) != claims.id_address {
        return Err(BrokerError::Verification(
            "credential address does not match its issuer key".to_string(),
        ));
    }

    let metadata = &claims.metadata;
    let (app_origin, redirect_uri, identity_index) = match (
        metadata.app_origin.clone(),
        metadata.redirect_uri.clone(),
        metadata.identity_index,
    ) {
        (Some(origin), Some(redirect), Some(index)) => (origin, redirect, index),
        _ => {
            return Err(BrokerError::Verification(
                "credential is missing handshake metadata".to_string(),
            ))
        }
    };
    let scopes = metadata.scopes.clone();

    Ok(VerifiedCredential {
        claims,
        app_origin,
        redirect_uri,
        scopes,
        identity_index,
    })
}

/// Re-derive the identity's owner key from the metadata index and check it
/// matches the credential's claims. A forged index fails here.
fn recover_owner_key(broker: &Broker, verified: &VerifiedCredential) -> BrokerResult<OwnerKey> {
    let owner = derive_owner_key(&broker.seed, verified.identity_index)?;
    if owner.address != verified.claims.id_address {
        return Err(BrokerError::Verification(
            "credential does not belong to this wallet".to_string(),
        ));
    }
    Ok(owner)
}

/// Current profile for the chosen identity, if its name still resolves.
/// Lookup failure degrades to "no profile"; key resolution then falls back
/// to the context-free derivation path.
async fn current_profile(broker: &Broker, metadata: &CredentialMetadata) -> Option<Profile> {
    let name = metadata.identity_name.as_deref()?;
    match timeout(broker.config.lookup_timeout, broker.registry.lookup(name)).await {
        Ok(Ok(record)) => Some(record.profile),
        _ => None,
    }
}

fn append_query(redirect_uri: &str, key: &str, value: &str) -> String {
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", redirect_uri, separator, key, value)
}

impl Broker {
    /// Handle `GET /signin`: verify and decrypt the chosen credential,
    /// reconcile the profile, and produce the redirect URL carrying the
    /// final signed credential.
    pub async fn handle_auth_response(&self, token_param: Option<&str>) -> BrokerResult<String> {
        let token_str = token_param
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BrokerError::BadRequest("missing encAuthResponse token".to_string()))?;
        debug!(state = "RECEIVED", "auth response accepted for processing");

        let credential = open_envelope(self, token_str)?;
        debug!(state = "ENVELOPE_VERIFIED", "transit envelope verified and opened");

        let verified = verify_credential(&credential)?;
        let owner = recover_owner_key(self, &verified)?;
        debug!(
            state = "CREDENTIAL_VERIFIED",
            id_address = %verified.claims.id_address,
            origin = %verified.app_origin,
            "credential verified"
        );

        let profile = current_profile(self, &verified.claims.metadata).await;
        let app_key = resolve_app_private_key(
            &self.seed,
            &verified.claims.id_address,
            profile.as_ref(),
            &verified.app_origin,
            verified.identity_index,
        )?;

        let storage = match timeout(
            self.config.lookup_timeout,
            self.hub.connect(app_key.public_key()),
        )
        .await
        {
            Ok(Ok(storage)) => storage,
            Ok(Err(e)) => return Err(BrokerError::StorageConnect(e.to_string())),
            Err(_) => return Err(BrokerError::StorageConnect("hub connect timed out".to_string())),
        };
        debug!(state = "STORAGE_CONNECTED", prefix = %storage.read_prefix(), "hub connected");

        let (reconciled, changed) = reconcile(profile, &verified.app_origin, &storage);
        let wants_write = verified.scopes.iter().any(|s| s == WRITE_SCOPE);
        if changed && wants_write {
            let signed_profile = token::sign(&owner.keypair, &reconciled)
                .map_err(|e| BrokerError::Internal(format!("profile signing: {}", e)))?;
            match timeout(
                self.config.lookup_timeout,
                self.hub.upload_profile(&verified.claims.id_address, &signed_profile),
            )
            .await
            {
                Ok(Ok(url)) => debug!(url = %url, "profile republished"),
                Ok(Err(e)) => return Err(BrokerError::StorageUpload(e.to_string())),
                Err(_) => {
                    return Err(BrokerError::StorageUpload("profile upload timed out".to_string()))
                }
            }
        }
        debug!(state = "PROFILE_RECONCILED", changed, uploaded = changed && wants_write,
            "profile reconciled");

        // Outward credential: metadata reduced to the profile URL only,
        // re-signed by the identity key. Indistinguishable from a token the
        // identity signed directly.
        let outward = CredentialClaims {
            iss: owner.keypair.public_key_hex(),
            id_address: verified.claims.id_address.clone(),
            association_token: verified.claims.association_token.clone(),
            metadata: verified.claims.metadata.reduced(),
        };
        let outward_token = token::sign(&owner.keypair, &outward)
            .map_err(|e| BrokerError::Internal(format!("credential re-signing: {}", e)))?;

        let redirect = append_query(&verified.redirect_uri, "authResponse", &outward_token);
        debug!(state = "DONE", "auth response complete");
        Ok(redirect)
    }
}
