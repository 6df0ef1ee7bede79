//! Auth request pipeline
//!
//! `RECEIVED → REQUEST_VERIFIED → MANIFEST_FETCHED → PAGE_RENDERED`, or an
//! error out of any step. Token verification and identity discovery run
//! concurrently; every discovered identity gets a complete encrypted
//! credential built ahead of the user's choice, so following a link needs no
//! further derivation on the page.

use crate::error::{BrokerError, BrokerResult};
use crate::handshake::types::{
    AssociationClaims, AuthRequestClaims, CredentialClaims, CredentialMetadata, SignInLink,
    SignInPage,
};
use crate::handshake::Broker;
use crate::identity::{discover_identities, Identity};
use crate::keys::derivation::resolve_app_private_key;
use crate::token;
use rand::RngCore;
use tokio::time::timeout;
use tracing::debug;

fn fresh_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// True when `redirect` stays inside `origin`: exactly the origin, or a
/// path, query, or fragment under it. A bare string-prefix match is not
/// enough, since a hostname can extend the origin as a string without
/// sharing its host.
fn redirect_within_origin(origin: &str, redirect: &str) -> bool {
    let origin = origin.trim_end_matches('/');
    match redirect.strip_prefix(origin) {
        Some("") => true,
        Some(rest) => rest.starts_with('/') || rest.starts_with('?') || rest.starts_with('#'),
        None => false,
    }
}

/// Decode and verify an auth request token: signature against the issuer
/// key it claims, then origin binding of the redirect target.
pub(crate) fn verify_auth_request(
    token_str: &str,
    max_token_length: usize,
) -> BrokerResult<AuthRequestClaims> {
    if token_str.len() > max_token_length {
        return Err(BrokerError::BadRequest("auth request token too large".to_string()));
    }

    let unverified: AuthRequestClaims = token::decode_unverified(token_str)
        .map_err(|e| BrokerError::BadRequest(format!("malformed auth request: {}", e)))?;

    let issuer_key = hex::decode(&unverified.iss)
        .map_err(|_| BrokerError::BadRequest("malformed issuer key in auth request".to_string()))?;

    let claims: AuthRequestClaims = match token::verify(token_str, &issuer_key) {
        Ok(claims) => claims,
        Err(token::TokenError::BadSignature) => {
            return Err(BrokerError::Verification(
                "auth request signature is invalid".to_string(),
            ))
        }
        Err(e) => return Err(BrokerError::BadRequest(format!("malformed auth request: {}", e))),
    };

    if !redirect_within_origin(&claims.domain_name, &claims.redirect_uri) {
        return Err(BrokerError::Verification(
            "redirect target is outside the application origin".to_string(),
        ));
    }
    Ok(claims)
}

/// Build the signed, encrypted credential for one identity.
///
/// The inner credential is signed by the identity key and carries the full
/// metadata envelope; the envelope is then sealed for the broker's own later
/// decryption.
fn build_encrypted_credential(
    broker: &Broker,
    identity: &Identity,
    request: &AuthRequestClaims,
) -> BrokerResult<String> {
    let salt = fresh_salt();

    let app_key = resolve_app_private_key(
        &broker.seed,
        &identity.id_address,
        identity.profile.as_ref(),
        &request.domain_name,
        identity.index,
    )?;

    let association = AssociationClaims {
        iss: identity.keypair.public_key_hex(),
        child_key: app_key.public_key_hex(),
        salt: salt.clone(),
    };
    let association_token = token::sign(&identity.keypair, &association)
        .map_err(|e| BrokerError::Internal(format!("association signing: {}", e)))?;

    let claims = CredentialClaims {
        iss: identity.keypair.public_key_hex(),
        id_address: identity.id_address.clone(),
        association_token: Some(association_token),
        metadata: CredentialMetadata {
            profile_url: identity.profile_url.clone(),
            identity_name: identity.name.clone(),
            identity_index: Some(identity.index),
            app_origin: Some(request.domain_name.clone()),
            redirect_uri: Some(request.redirect_uri.clone()),
            scopes: request.scopes.clone(),
            salt: Some(salt),
        },
    };
    let credential = token::sign(&identity.keypair, &claims)
        .map_err(|e| BrokerError::Internal(format!("credential signing: {}", e)))?;

    broker
        .transit
        .seal(credential.as_bytes())
        .map_err(|e| BrokerError::Internal(format!("transit sealing: {}", e)))
}

impl Broker {
    /// Handle `GET /auth`: validate the request token, enumerate identities,
    /// fetch the application manifest, and render the sign-in page.
    pub async fn handle_auth_request(&self, token_param: Option<&str>) -> BrokerResult<SignInPage> {
        let token_str = token_param
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BrokerError::BadRequest("missing authRequest token".to_string()))?;
        debug!(state = "RECEIVED", "auth request accepted for processing");

        // Verification and discovery are independent; run them together.
        let (request, identities) = tokio::try_join!(
            async { verify_auth_request(token_str, self.config.max_token_length) },
            discover_identities(
                &self.seed,
                self.registry.as_ref(),
                self.config.lookup_timeout,
                self.config.max_identity_index,
            ),
        )?;
        debug!(
            state = "REQUEST_VERIFIED",
            origin = %request.domain_name,
            identities = identities.len(),
            "auth request verified"
        );

        let manifest = match timeout(
            self.config.lookup_timeout,
            self.manifests.fetch(&request.domain_name, &request.manifest_uri),
        )
        .await
        {
            Ok(Ok(manifest)) => manifest,
            Ok(Err(e)) => return Err(BrokerError::ManifestFetch(e.to_string())),
            Err(_) => return Err(BrokerError::ManifestFetch("manifest fetch timed out".to_string())),
        };
        debug!(state = "MANIFEST_FETCHED", app = %manifest.name, "manifest fetched");

        let mut links = Vec::with_capacity(identities.len());
        for identity in &identities {
            links.push(SignInLink {
                label: identity.display_label(),
                encrypted_credential: build_encrypted_credential(self, identity, &request)?,
            });
        }
        debug!(state = "PAGE_RENDERED", links = links.len(), "sign-in page ready");

        Ok(SignInPage {
            app_name: manifest.name,
            app_origin: request.domain_name,
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair::Keypair;

    fn request_token(kp: &Keypair, domain: &str, redirect: &str) -> String {
        let claims = AuthRequestClaims {
            iss: kp.public_key_hex(),
            domain_name: domain.to_string(),
            manifest_uri: format!("{}/manifest.json", domain),
            redirect_uri: redirect.to_string(),
            scopes: vec![],
            public_keys: vec![],
        };
        token::sign(kp, &claims).unwrap()
    }

    #[test]
    fn test_verify_accepts_valid_request() {
        let kp = Keypair::generate();
        let token_str = request_token(&kp, "https://app.example", "https://app.example/done");
        let claims = verify_auth_request(&token_str, 64 * 1024).unwrap();
        assert_eq!(claims.domain_name, "https://app.example");
    }

    #[test]
    fn test_verify_rejects_foreign_redirect() {
        let kp = Keypair::generate();
        let token_str = request_token(&kp, "https://app.example", "https://evil.example/steal");
        assert!(matches!(
            verify_auth_request(&token_str, 64 * 1024),
            Err(BrokerError::Verification(_))
        ));
    }

    #[test]
    fn test_verify_rejects_host_extending_redirect() {
        let kp = Keypair::generate();
        // The redirect host extends the origin as a string but is a
        // different host entirely.
        let token_str = request_token(
            &kp,
            "https://app.example",
            "https://app.example.evil.com/steal",
        );
        assert!(matches!(
            verify_auth_request(&token_str, 64 * 1024),
            Err(BrokerError::Verification(_))
        ));
    }

    #[test]
    fn test_redirect_origin_boundary() {
        assert!(redirect_within_origin(
            "https://app.example",
            "https://app.example"
        ));
        assert!(redirect_within_origin(
            "https://app.example",
            "https://app.example/done?x=1"
        ));
        assert!(redirect_within_origin(
            "https://app.example/",
            "https://app.example/done"
        ));
        assert!(!redirect_within_origin(
            "https://app.example",
            "https://app.example.evil.com/steal"
        ));
        assert!(!redirect_within_origin(
            "https://app.example",
            "https://evil.example/https://app.example"
        ));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(matches!(
            verify_auth_request("not-a-token", 64 * 1024),
            Err(BrokerError::BadRequest(_))
        ));
    }

    #[test]
    fn test_verify_rejects_oversized_token() {
        let kp = Keypair::generate();
        let token_str = request_token(&kp, "https://app.example", "https://app.example/done");
        assert!(matches!(
            verify_auth_request(&token_str, 16),
            Err(BrokerError::BadRequest(_))
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_signature() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let claims = AuthRequestClaims {
            iss: kp.public_key_hex(), // claims one key...
            domain_name: "https://app.example".to_string(),
            manifest_uri: "https://app.example/manifest.json".to_string(),
            redirect_uri: "https://app.example/done".to_string(),
            scopes: vec![],
            public_keys: vec![],
        };
        // ...but is signed by another
        let token_str = token::sign(&other, &claims).unwrap();
        assert!(matches!(
            verify_auth_request(&token_str, 64 * 1024),
            Err(BrokerError::Verification(_))
        ));
    }
}
