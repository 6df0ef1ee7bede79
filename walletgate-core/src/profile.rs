//! Profile documents and reconciliation
//!
//! A profile is the identity's public document. Its `apps` map points each
//! application origin at that application's storage read URL; reconciliation
//! repairs the pointer whenever it no longer starts with the currently valid
//! storage prefix.

use crate::hub::AppStorageConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default schema type for a synthesized profile
pub const PERSON_TYPE: &str = "@Person";

/// An identity's public profile document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "@type")]
    pub schema_type: String,

    #[serde(default)]
    pub account: Vec<serde_json::Value>,

    /// Per-application storage pointers, keyed by application origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps: Option<BTreeMap<String, String>>,
}

impl Profile {
    /// Minimal default document, used when an identity has no profile yet.
    pub fn minimal() -> Self {
        Profile {
            schema_type: PERSON_TYPE.to_string(),
            account: Vec::new(),
            apps: None,
        }
    }

    /// The storage read URL recorded for `origin`, if any.
    pub fn app_entry(&self, origin: &str) -> Option<&str> {
        self.apps
            .as_ref()
            .and_then(|apps| apps.get(origin))
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }

    /// The storage address embedded in the pointer recorded for `origin`.
    ///
    /// Pointers have the shape `<url_prefix><address>/`; the address is the
    /// last path segment. Returns `None` when no pointer exists or it has
    /// no recognizable address segment.
    pub fn app_storage_address(&self, origin: &str) -> Option<String> {
        let url = self.app_entry(origin)?;
        let trimmed = url.trim_end_matches('/');
        let segment = trimmed.rsplit('/').next()?;
        if segment.is_empty() {
            return None;
        }
        Some(segment.to_string())
    }
}

/// Decide whether a profile's storage pointer for `origin` must be created
/// or corrected, repairing it in place.
///
/// Returns the (possibly synthesized) profile and whether anything changed.
/// Idempotent: applied to its own output it reports no change.
pub fn reconcile(
    profile: Option<Profile>,
    origin: &str,
    storage: &AppStorageConfig,
) -> (Profile, bool) {
    let mut changed = false;

    let mut profile = match profile {
        Some(profile) => profile,
        None => {
            changed = true;
            Profile::minimal()
        }
    };

    if profile.apps.is_none() {
        profile.apps = Some(BTreeMap::new());
        changed = true;
    }

    let expected_prefix = storage.read_prefix();
    let apps = profile.apps.as_mut().expect("apps initialized above");

    match apps.get(origin) {
        None => {
            apps.insert(origin.to_string(), expected_prefix);
            changed = true;
        }
        Some(current) if current.is_empty() => {
            apps.insert(origin.to_string(), expected_prefix);
            changed = true;
        }
        Some(current) if !current.starts_with(&expected_prefix) => {
            apps.insert(origin.to_string(), expected_prefix);
            changed = true;
        }
        Some(_) => {}
    }

    (profile, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> AppStorageConfig {
        AppStorageConfig {
            url_prefix: "https://hub.example/store/".to_string(),
            address: "ID-app123".to_string(),
        }
    }

    const ORIGIN: &str = "https://app.example";

    #[test]
    fn test_absent_profile_synthesized() {
        let (profile, changed) = reconcile(None, ORIGIN, &storage());
        assert!(changed);
        assert_eq!(profile.schema_type, PERSON_TYPE);
        assert!(profile.account.is_empty());
        assert_eq!(
            profile.app_entry(ORIGIN),
            Some("https://hub.example/store/ID-app123/")
        );
    }

    #[test]
    fn test_wrong_prefix_overwritten() {
        let mut profile = Profile::minimal();
        let mut apps = BTreeMap::new();
        apps.insert(ORIGIN.to_string(), "https://oldhub.example/x/".to_string());
        profile.apps = Some(apps);

        let (profile, changed) = reconcile(Some(profile), ORIGIN, &storage());
        assert!(changed);
        assert_eq!(
            profile.app_entry(ORIGIN),
            Some("https://hub.example/store/ID-app123/")
        );
    }

    #[test]
    fn test_matching_prefix_untouched() {
        let mut profile = Profile::minimal();
        let mut apps = BTreeMap::new();
        apps.insert(
            ORIGIN.to_string(),
            "https://hub.example/store/ID-app123/extra".to_string(),
        );
        profile.apps = Some(apps.clone());

        let (profile, changed) = reconcile(Some(profile), ORIGIN, &storage());
        assert!(!changed);
        assert_eq!(profile.apps.as_ref(), Some(&apps));
    }

    #[test]
    fn test_empty_entry_repaired() {
        let mut profile = Profile::minimal();
        let mut apps = BTreeMap::new();
        apps.insert(ORIGIN.to_string(), String::new());
        profile.apps = Some(apps);

        let (profile, changed) = reconcile(Some(profile), ORIGIN, &storage());
        assert!(changed);
        assert_eq!(
            profile.app_entry(ORIGIN),
            Some("https://hub.example/store/ID-app123/")
        );
    }

    #[test]
    fn test_idempotent() {
        let (first, changed) = reconcile(None, ORIGIN, &storage());
        assert!(changed);
        let (second, changed) = reconcile(Some(first.clone()), ORIGIN, &storage());
        assert!(!changed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_storage_address_parsed_from_pointer() {
        let (profile, _) = reconcile(None, ORIGIN, &storage());
        assert_eq!(
            profile.app_storage_address(ORIGIN),
            Some("ID-app123".to_string())
        );
        assert_eq!(profile.app_storage_address("https://other.example"), None);
    }

    #[test]
    fn test_profile_serde_shape() {
        let (profile, _) = reconcile(None, ORIGIN, &storage());
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["@type"], "@Person");
        assert!(json["apps"][ORIGIN].as_str().unwrap().ends_with('/'));
    }
}
