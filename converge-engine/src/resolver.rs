//! Creation-time conflict resolution.
//!
//! Natural keys (names) are unique locally; global identifiers are assigned
//! by possibly-multiple remote authorities. This is the single place that
//! reconciles "created locally first" against "claimed remotely first".

use std::collections::HashSet;

use converge_client::RemoteResource;
use converge_core::registry::TypeDescriptor;
use converge_core::types::{GlobalId, Resource};
use converge_core::{ResourceStore, StoreError};

/// How a manifest entry with no local match by global id should be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateDecision {
    /// No natural-key collision; create a fresh local resource.
    Create,
    /// A partially-migrated local record holds the natural key; re-identify
    /// it under the incoming global id and replace its content.
    AdoptAndUpdate(Resource),
    /// A fully-migrated local record under a different global id holds the
    /// natural key. The remote entry loses; record an error, create nothing.
    Conflict(Resource),
}

/// Decide how to create `incoming` without violating natural-key uniqueness.
///
/// `manifest_ids` is the full set of global ids in this run's manifest: a
/// colliding record that is itself claimed by another entry of the same
/// manifest is about to be reconciled by its own row, so it is not treated
/// as a collision here.
pub fn resolve_creation(
    store: &dyn ResourceStore,
    descriptor: &TypeDescriptor,
    incoming: &RemoteResource,
    manifest_ids: &HashSet<GlobalId>,
) -> Result<CreateDecision, StoreError> {
    let Some(key) = descriptor.natural_key_of(&incoming.resource_data) else {
        // No derivable natural key; let the store's uniqueness constraints
        // be the backstop.
        return Ok(CreateDecision::Create);
    };

    let Some(existing) = store.find_by_natural_key(&descriptor.name, &key)? else {
        return Ok(CreateDecision::Create);
    };

    if existing.global_id != incoming.global_id && manifest_ids.contains(&existing.global_id) {
        return Ok(CreateDecision::Create);
    }

    if existing.is_partially_migrated {
        return Ok(CreateDecision::AdoptAndUpdate(existing));
    }

    Ok(CreateDecision::Conflict(existing))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use converge_core::types::{ResourceData, ServiceId, TypeName};
    use converge_core::{FileStore, TypeRegistry};

    use super::*;

    fn user_data(username: &str) -> ResourceData {
        let mut data = ResourceData::new();
        data.insert("username".to_string(), json!(username));
        data
    }

    fn incoming(global_id: &str, username: &str) -> RemoteResource {
        RemoteResource {
            global_id: GlobalId::from(global_id),
            service_id: ServiceId::from("remote-svc"),
            resource_type: TypeName::from("shared.user"),
            resource_data: user_data(username),
        }
    }

    fn local(global_id: &str, username: &str, partially_migrated: bool) -> Resource {
        Resource {
            global_id: GlobalId::from(global_id),
            service_id: ServiceId::from("local-svc"),
            resource_type: TypeName::from("shared.user"),
            is_partially_migrated: partially_migrated,
            data: user_data(username),
        }
    }

    fn setup() -> (TempDir, FileStore, TypeDescriptor) {
        let tmp = TempDir::new().expect("tempdir");
        let registry = TypeRegistry::builtin();
        let descriptor = registry
            .get(&TypeName::from("shared.user"))
            .expect("descriptor")
            .clone();
        let store = FileStore::open(tmp.path(), registry);
        (tmp, store, descriptor)
    }

    #[test]
    fn no_collision_creates() {
        let (_tmp, store, descriptor) = setup();
        let decision =
            resolve_creation(&store, &descriptor, &incoming("new-id", "theceo"), &HashSet::new())
                .expect("resolve");
        assert_eq!(decision, CreateDecision::Create);
    }

    #[test]
    fn partially_migrated_match_is_adopted() {
        let (_tmp, mut store, descriptor) = setup();
        store
            .create(local("local-id", "theceo", true))
            .expect("create");

        let decision =
            resolve_creation(&store, &descriptor, &incoming("new-id", "theceo"), &HashSet::new())
                .expect("resolve");
        match decision {
            CreateDecision::AdoptAndUpdate(existing) => {
                assert_eq!(existing.global_id, GlobalId::from("local-id"));
            }
            other => panic!("expected adoption, got {other:?}"),
        }
    }

    #[test]
    fn fully_migrated_match_is_a_conflict() {
        let (_tmp, mut store, descriptor) = setup();
        store
            .create(local("local-id", "theceo", false))
            .expect("create");

        let decision =
            resolve_creation(&store, &descriptor, &incoming("new-id", "theceo"), &HashSet::new())
                .expect("resolve");
        match decision {
            CreateDecision::Conflict(existing) => {
                assert_eq!(existing.global_id, GlobalId::from("local-id"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn match_claimed_by_same_manifest_is_not_a_collision() {
        let (_tmp, mut store, descriptor) = setup();
        store
            .create(local("other-id", "theceo", false))
            .expect("create");

        // "other-id" appears elsewhere in this manifest; its own entry will
        // reconcile it, so the incoming entry proceeds to plain creation.
        let manifest_ids: HashSet<GlobalId> =
            [GlobalId::from("other-id"), GlobalId::from("new-id")].into();
        let decision =
            resolve_creation(&store, &descriptor, &incoming("new-id", "theceo"), &manifest_ids)
                .expect("resolve");
        assert_eq!(decision, CreateDecision::Create);
    }

    #[test]
    fn missing_natural_key_field_creates() {
        let (_tmp, store, descriptor) = setup();
        let mut payload = incoming("new-id", "theceo");
        payload.resource_data.remove("username");

        let decision =
            resolve_creation(&store, &descriptor, &payload, &HashSet::new()).expect("resolve");
        assert_eq!(decision, CreateDecision::Create);
    }
}
