//! Identity discovery
//!
//! Walks derivation indices against the name registry: every address owning
//! at least one name contributes one identity per name; the first unnamed
//! address terminates the walk. A hard iteration bound guards against a
//! registry that always answers "owned". Profile resolution for the named
//! identities runs concurrently with independent timeouts; a failed lookup
//! drops that identity rather than aborting discovery. One synthetic
//! anonymous identity is appended at the end.
//!
//! All registry lookups use the canonical address form via an explicit
//! `AddressMode` parameter, so discovery is safe to run concurrently with
//! anything else issuing lookups.

use crate::error::{BrokerError, BrokerResult};
use crate::identity::Identity;
use crate::keys::derivation::{derive_owner_key, OwnerKey, Seed};
use crate::registry::{AddressMode, NameRegistry};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

async fn names_at_index(
    registry: &dyn NameRegistry,
    owner: &OwnerKey,
    lookup_timeout: Duration,
) -> BrokerResult<Vec<String>> {
    match timeout(
        lookup_timeout,
        registry.names_owned_by(&owner.address, AddressMode::Canonical),
    )
    .await
    {
        Ok(Ok(names)) => Ok(names),
        Ok(Err(e)) => Err(BrokerError::Registry(e.to_string())),
        Err(_) => Err(BrokerError::Registry(format!(
            "name lookup timed out at index {}",
            owner.index
        ))),
    }
}

/// Enumerate the user's identities from the seed.
///
/// Returns the named identities (indices below the first unnamed one, one
/// entry per owned name, minus any whose profile failed to resolve) followed
/// by one anonymous identity at `index = kept_count + 1`.
pub async fn discover_identities(
    seed: &Seed,
    registry: &dyn NameRegistry,
    lookup_timeout: Duration,
    max_index: u32,
) -> BrokerResult<Vec<Identity>> {
    let mut named: Vec<(String, OwnerKey)> = Vec::new();

    let mut terminated = false;
    for index in 0..max_index {
        let owner = derive_owner_key(seed, index)?;
        let names = names_at_index(registry, &owner, lookup_timeout).await?;
        if names.is_empty() {
            debug!(index, "discovery terminated at first unnamed address");
            terminated = true;
            break;
        }
        for name in names {
            named.push((name, owner.clone()));
        }
    }
    if !terminated {
        return Err(BrokerError::TooManyIdentities(max_index));
    }

    // Resolve profiles concurrently; a failed lookup drops that identity.
    let lookups = named.into_iter().map(|(name, owner)| async move {
        match timeout(lookup_timeout, registry.lookup(&name)).await {
            Ok(Ok(record)) => Some(Identity {
                name: Some(name),
                index: owner.index,
                id_address: owner.address,
                keypair: owner.keypair,
                profile: Some(record.profile),
                profile_url: Some(record.profile_url),
            }),
            Ok(Err(e)) => {
                warn!(name = %name, error = %e, "dropping identity: profile lookup failed");
                None
            }
            Err(_) => {
                warn!(name = %name, "dropping identity: profile lookup timed out");
                None
            }
        }
    });
    let mut identities: Vec<Identity> = futures::future::join_all(lookups)
        .await
        .into_iter()
        .flatten()
        .collect();

    // Synthetic anonymous identity for nameless sign-in.
    let anonymous_index = identities.len() as u32 + 1;
    let owner = derive_owner_key(seed, anonymous_index)?;
    identities.push(Identity {
        name: None,
        id_address: owner.address,
        keypair: owner.keypair,
        index: anonymous_index,
        profile: None,
        profile_url: None,
    });

    debug!(count = identities.len(), "discovery complete");
    Ok(identities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use crate::registry::{MemoryRegistry, NameRecord, RegistryError};
    use async_trait::async_trait;

    const PHRASE: &str =
        "legal winner thank year wave sausage worth useful legal winner thank yellow";

    fn seed() -> Seed {
        Seed::from_mnemonic(PHRASE).unwrap()
    }

    fn record(name: &str) -> NameRecord {
        NameRecord {
            profile: Profile::minimal(),
            profile_url: format!("https://hub.example/{}/profile.json", name),
        }
    }

    async fn registry_with_names(seed: &Seed, names_per_index: &[&[&str]]) -> MemoryRegistry {
        let registry = MemoryRegistry::new();
        for (index, names) in names_per_index.iter().enumerate() {
            let owner = derive_owner_key(seed, index as u32).unwrap();
            for name in *names {
                registry.register(&owner.address, name, record(name)).await;
            }
        }
        registry
    }

    #[tokio::test]
    async fn test_empty_registry_yields_only_anonymous() {
        let s = seed();
        let registry = MemoryRegistry::new();
        let identities = discover_identities(&s, &registry, Duration::from_secs(1), 65536)
            .await
            .unwrap();
        assert_eq!(identities.len(), 1);
        assert!(identities[0].is_anonymous());
        assert_eq!(identities[0].index, 1);
    }

    #[tokio::test]
    async fn test_walk_stops_at_first_unnamed_index() {
        let s = seed();
        let registry = registry_with_names(&s, &[&["alice"], &["bob", "bob.alt"]]).await;
        let identities = discover_identities(&s, &registry, Duration::from_secs(1), 65536)
            .await
            .unwrap();

        let names: Vec<_> = identities.iter().filter_map(|i| i.name.as_deref()).collect();
        assert_eq!(names, vec!["alice", "bob", "bob.alt"]);
        // bob and bob.alt share index 1's address and key
        assert_eq!(identities[1].id_address, identities[2].id_address);
        // anonymous appended at kept_count + 1
        let anonymous = identities.last().unwrap();
        assert!(anonymous.is_anonymous());
        assert_eq!(anonymous.index, 4);
    }

    #[tokio::test]
    async fn test_gap_hides_later_identities() {
        let s = seed();
        // Index 0 named, index 1 unnamed, index 2 named: the walk must not
        // see index 2.
        let registry = registry_with_names(&s, &[&["alice"]]).await;
        let owner2 = derive_owner_key(&s, 2).unwrap();
        registry
            .register(&owner2.address, "carol", record("carol"))
            .await;

        let identities = discover_identities(&s, &registry, Duration::from_secs(1), 65536)
            .await
            .unwrap();
        let names: Vec<_> = identities.iter().filter_map(|i| i.name.as_deref()).collect();
        assert_eq!(names, vec!["alice"]);
    }

    #[tokio::test]
    async fn test_failed_profile_lookup_drops_identity_only() {
        let s = seed();
        let registry = registry_with_names(&s, &[&["alice"], &["bob"]]).await;
        registry.break_name("bob").await;

        let identities = discover_identities(&s, &registry, Duration::from_secs(1), 65536)
            .await
            .unwrap();
        let names: Vec<_> = identities.iter().filter_map(|i| i.name.as_deref()).collect();
        assert_eq!(names, vec!["alice"]);
        assert_eq!(identities.last().unwrap().index, 2);
    }

    /// Registry that claims every address owns a name.
    struct AlwaysOwned;

    #[async_trait]
    impl NameRegistry for AlwaysOwned {
        async fn names_owned_by(
            &self,
            _address: &str,
            _mode: AddressMode,
        ) -> Result<Vec<String>, RegistryError> {
            Ok(vec!["squatter".to_string()])
        }

        async fn lookup(&self, _name: &str) -> Result<NameRecord, RegistryError> {
            Err(RegistryError::NameNotFound("squatter".to_string()))
        }
    }

    #[tokio::test]
    async fn test_non_terminating_registry_hits_bound() {
        let s = seed();
        // Small bound keeps the test fast; the production default is 65536.
        let result = discover_identities(&s, &AlwaysOwned, Duration::from_secs(1), 64).await;
        assert!(matches!(result, Err(BrokerError::TooManyIdentities(64))));
    }
}
