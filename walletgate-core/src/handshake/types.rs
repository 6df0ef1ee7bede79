//! Handshake wire types
//!
//! Claims carried by the three token kinds that cross the browser: the
//! application's auth request, the broker's credential (inner and outward
//! forms), and the association token binding an application key to an
//! identity key.

use serde::{Deserialize, Serialize};

/// Scope string granting storage write access
pub const WRITE_SCOPE: &str = "store_write";

/// Claims of an application's signed auth request. Untrusted until verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequestClaims {
    /// Application signing key, hex
    pub iss: String,
    /// Application origin
    pub domain_name: String,
    /// Where the application's manifest is served
    pub manifest_uri: String,
    /// Where the browser is sent after sign-in
    pub redirect_uri: String,
    /// Requested storage-access scopes
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Application transit public keys, hex
    #[serde(default)]
    pub public_keys: Vec<String>,
}

/// Metadata envelope inside a credential.
///
/// The full form carries handshake state between the request and response
/// pipelines; before the credential leaves the broker it is reduced to only
/// the profile URL. Internal handshake state never reaches the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    /// Per-handshake random salt preventing replay / signature reuse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl CredentialMetadata {
    /// Reduced, outward-facing form: only the profile URL survives.
    pub fn reduced(&self) -> Self {
        CredentialMetadata {
            profile_url: self.profile_url.clone(),
            ..Default::default()
        }
    }
}

/// Claims of a credential token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Identity public key, hex
    pub iss: String,
    /// Identity address matching `iss`
    pub id_address: String,
    /// Binds the derived application key to the identity key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_token: Option<String>,
    pub metadata: CredentialMetadata,
}

/// Claims of an association token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationClaims {
    /// Identity public key, hex
    pub iss: String,
    /// Application public key, hex
    pub child_key: String,
    pub salt: String,
}

/// One selectable sign-in option on the rendered page
#[derive(Debug, Clone)]
pub struct SignInLink {
    pub label: String,
    /// Encrypted credential for this identity, ready to submit
    pub encrypted_credential: String,
}

/// The rendered sign-in page
#[derive(Debug, Clone)]
pub struct SignInPage {
    pub app_name: String,
    pub app_origin: String,
    pub links: Vec<SignInLink>,
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl SignInPage {
    /// Render the selectable sign-in links as an HTML document.
    pub fn render_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head><title>Sign in</title></head>\n<body>\n");
        html.push_str(&format!(
            "<h1>Sign in to {}</h1>\n<ul>\n",
            html_escape(&self.app_name)
        ));
        for link in &self.links {
            html.push_str(&format!(
                "<li><a href=\"/signin?encAuthResponse={}\">{}</a></li>\n",
                html_escape(&link.encrypted_credential),
                html_escape(&link.label)
            ));
        }
        html.push_str("</ul>\n</body>\n</html>\n");
        html
    }
}
