//! Resource persistence — the store seam consumed by the sync engine, plus a
//! JSON file-backed implementation.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   shared.user.json           (one document per resource type)
//!   shared.organization.json
//! ```
//!
//! Each document is `{"synced_at": ..., "resources": [...]}`. Saves write to
//! a `.tmp` sibling then rename, so a crashed run never leaves a torn file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::registry::TypeRegistry;
use crate::types::{GlobalId, NaturalKey, Resource, ServiceScope, TypeName};

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Persistence interface for synced resources.
///
/// `create` and `update` enforce global-id and natural-key uniqueness; those
/// constraints are the last line of defense when several processes write
/// concurrently.
pub trait ResourceStore {
    fn get_by_global_id(
        &self,
        resource_type: &TypeName,
        global_id: &GlobalId,
    ) -> Result<Option<Resource>, StoreError>;

    /// Conflict probe: the resource of this type holding `key`, if any.
    fn find_by_natural_key(
        &self,
        resource_type: &TypeName,
        key: &NaturalKey,
    ) -> Result<Option<Resource>, StoreError>;

    /// All resources of a type whose `service_id` falls inside `scope`.
    fn list(
        &self,
        resource_type: &TypeName,
        scope: &ServiceScope,
    ) -> Result<Vec<Resource>, StoreError>;

    fn create(&mut self, resource: Resource) -> Result<(), StoreError>;

    /// Replace the resource currently stored under `current_id`. The
    /// replacement may carry a different `global_id` (adoption re-identifies
    /// a record in place).
    fn update(&mut self, current_id: &GlobalId, resource: Resource) -> Result<(), StoreError>;

    fn delete(&mut self, resource_type: &TypeName, global_id: &GlobalId)
        -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// File store
// ---------------------------------------------------------------------------

/// On-disk document holding every resource of one type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeDocument {
    pub synced_at: DateTime<Utc>,
    pub resources: Vec<Resource>,
}

/// JSON file-backed [`ResourceStore`].
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    registry: TypeRegistry,
}

impl FileStore {
    /// Open a store rooted at `root`. No I/O happens until the first
    /// operation; missing documents read as empty.
    pub fn open(root: impl Into<PathBuf>, registry: TypeRegistry) -> Self {
        Self {
            root: root.into(),
            registry,
        }
    }

    /// `<root>/<resource_type>.json` — pure, no I/O.
    pub fn type_path(&self, resource_type: &TypeName) -> PathBuf {
        self.root.join(format!("{resource_type}.json"))
    }

    fn load_document(&self, resource_type: &TypeName) -> Result<TypeDocument, StoreError> {
        let path = self.type_path(resource_type);
        if !path.exists() {
            return Ok(TypeDocument {
                synced_at: Utc::now(),
                resources: Vec::new(),
            });
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save_document(
        &self,
        resource_type: &TypeName,
        mut document: TypeDocument,
    ) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;

        document.synced_at = Utc::now();
        let json = serde_json::to_string_pretty(&document)?;

        let path = self.type_path(resource_type);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    // Natural key of a resource, when its type has a descriptor. Types
    // without one skip natural-key uniqueness entirely.
    fn natural_key_for(&self, resource: &Resource) -> Option<NaturalKey> {
        self.registry
            .get(&resource.resource_type)?
            .natural_key_of(&resource.data)
    }
}

impl ResourceStore for FileStore {
    fn get_by_global_id(
        &self,
        resource_type: &TypeName,
        global_id: &GlobalId,
    ) -> Result<Option<Resource>, StoreError> {
        let document = self.load_document(resource_type)?;
        Ok(document
            .resources
            .into_iter()
            .find(|r| &r.global_id == global_id))
    }

    fn find_by_natural_key(
        &self,
        resource_type: &TypeName,
        key: &NaturalKey,
    ) -> Result<Option<Resource>, StoreError> {
        let document = self.load_document(resource_type)?;
        Ok(document
            .resources
            .into_iter()
            .find(|r| self.natural_key_for(r).as_ref() == Some(key)))
    }

    fn list(
        &self,
        resource_type: &TypeName,
        scope: &ServiceScope,
    ) -> Result<Vec<Resource>, StoreError> {
        let document = self.load_document(resource_type)?;
        Ok(document
            .resources
            .into_iter()
            .filter(|r| scope.includes(&r.service_id))
            .collect())
    }

    fn create(&mut self, resource: Resource) -> Result<(), StoreError> {
        let mut document = self.load_document(&resource.resource_type)?;

        if document
            .resources
            .iter()
            .any(|r| r.global_id == resource.global_id)
        {
            return Err(StoreError::DuplicateGlobalId {
                global_id: resource.global_id,
            });
        }
        if let Some(key) = self.natural_key_for(&resource) {
            if document
                .resources
                .iter()
                .any(|r| self.natural_key_for(r).as_ref() == Some(&key))
            {
                return Err(StoreError::DuplicateNaturalKey {
                    type_name: resource.resource_type,
                    key,
                });
            }
        }

        let resource_type = resource.resource_type.clone();
        document.resources.push(resource);
        self.save_document(&resource_type, document)
    }

    fn update(&mut self, current_id: &GlobalId, resource: Resource) -> Result<(), StoreError> {
        let mut document = self.load_document(&resource.resource_type)?;

        let Some(position) = document
            .resources
            .iter()
            .position(|r| &r.global_id == current_id)
        else {
            return Err(StoreError::NotFound {
                global_id: current_id.clone(),
            });
        };

        if resource.global_id != *current_id
            && document
                .resources
                .iter()
                .any(|r| r.global_id == resource.global_id)
        {
            return Err(StoreError::DuplicateGlobalId {
                global_id: resource.global_id,
            });
        }
        if let Some(key) = self.natural_key_for(&resource) {
            let collision = document
                .resources
                .iter()
                .enumerate()
                .any(|(i, r)| i != position && self.natural_key_for(r).as_ref() == Some(&key));
            if collision {
                return Err(StoreError::DuplicateNaturalKey {
                    type_name: resource.resource_type,
                    key,
                });
            }
        }

        let resource_type = resource.resource_type.clone();
        document.resources[position] = resource;
        self.save_document(&resource_type, document)
    }

    fn delete(
        &mut self,
        resource_type: &TypeName,
        global_id: &GlobalId,
    ) -> Result<(), StoreError> {
        let mut document = self.load_document(resource_type)?;

        let Some(position) = document
            .resources
            .iter()
            .position(|r| &r.global_id == global_id)
        else {
            return Err(StoreError::NotFound {
                global_id: global_id.clone(),
            });
        };

        document.resources.remove(position);
        self.save_document(resource_type, document)
    }
}

/// Default store root under the user's home directory:
/// `<home>/.converge/resources`.
pub fn default_root(home: &Path) -> PathBuf {
    home.join(".converge").join("resources")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;
    use tempfile::TempDir;

    use crate::types::{ResourceData, ServiceId};

    use super::*;

    fn user_type() -> TypeName {
        TypeName::from("shared.user")
    }

    fn user(global_id: &str, username: &str, service_id: &str) -> Resource {
        let mut data = ResourceData::new();
        data.insert("username".to_string(), json!(username));
        data.insert("email".to_string(), json!(format!("{username}@example.com")));
        Resource {
            global_id: GlobalId::from(global_id),
            service_id: ServiceId::from(service_id),
            resource_type: user_type(),
            is_partially_migrated: false,
            data,
        }
    }

    fn make_store(root: &Path) -> FileStore {
        FileStore::open(root, TypeRegistry::builtin())
    }

    #[test]
    fn empty_store_when_file_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let store = make_store(tmp.path());
        let found = store
            .get_by_global_id(&user_type(), &GlobalId::from("missing"))
            .expect("lookup");
        assert!(found.is_none());
        assert!(store.list(&user_type(), &ServiceScope::All).expect("list").is_empty());
    }

    #[test]
    fn create_then_lookup_roundtrip() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        let resource = user("id-1", "phi", "svc-1");

        store.create(resource.clone()).expect("create");
        let found = store
            .get_by_global_id(&user_type(), &GlobalId::from("id-1"))
            .expect("lookup")
            .expect("resource");
        assert_eq!(found, resource);
    }

    #[test]
    fn create_duplicate_global_id_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        store.create(user("id-1", "phi", "svc-1")).expect("create");

        let err = store.create(user("id-1", "other", "svc-1")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateGlobalId { .. }));
    }

    #[test]
    fn create_duplicate_natural_key_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        store.create(user("id-1", "phi", "svc-1")).expect("create");

        let err = store.create(user("id-2", "phi", "svc-1")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateNaturalKey { .. }));
    }

    #[test]
    fn find_by_natural_key_matches_username() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        store.create(user("id-1", "phi", "svc-1")).expect("create");

        let key = NaturalKey(vec!["phi".to_string()]);
        let found = store
            .find_by_natural_key(&user_type(), &key)
            .expect("probe")
            .expect("match");
        assert_eq!(found.global_id, GlobalId::from("id-1"));

        let other = NaturalKey(vec!["nobody".to_string()]);
        assert!(store.find_by_natural_key(&user_type(), &other).expect("probe").is_none());
    }

    #[test]
    fn update_can_reidentify_a_resource() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        let mut local = user("local-id", "phi", "svc-1");
        local.is_partially_migrated = true;
        store.create(local).expect("create");

        let adopted = user("remote-id", "phi", "svc-2");
        store
            .update(&GlobalId::from("local-id"), adopted)
            .expect("update");

        assert!(store
            .get_by_global_id(&user_type(), &GlobalId::from("local-id"))
            .expect("lookup")
            .is_none());
        let found = store
            .get_by_global_id(&user_type(), &GlobalId::from("remote-id"))
            .expect("lookup")
            .expect("resource");
        assert_eq!(found.service_id, ServiceId::from("svc-2"));
        assert!(!found.is_partially_migrated);
    }

    #[test]
    fn update_missing_resource_is_not_found() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        let err = store
            .update(&GlobalId::from("ghost"), user("ghost", "phi", "svc-1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn update_into_foreign_natural_key_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        store.create(user("id-1", "phi", "svc-1")).expect("create");
        store.create(user("id-2", "lips", "svc-1")).expect("create");

        let err = store
            .update(&GlobalId::from("id-2"), user("id-2", "phi", "svc-1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateNaturalKey { .. }));
    }

    #[test]
    fn delete_removes_resource() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        store.create(user("id-1", "phi", "svc-1")).expect("create");

        store
            .delete(&user_type(), &GlobalId::from("id-1"))
            .expect("delete");
        assert!(store
            .get_by_global_id(&user_type(), &GlobalId::from("id-1"))
            .expect("lookup")
            .is_none());

        let err = store.delete(&user_type(), &GlobalId::from("id-1")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn list_filters_by_service_scope() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        store.create(user("id-1", "phi", "svc-1")).expect("create");
        store.create(user("id-2", "lips", "svc-2")).expect("create");

        let all = store.list(&user_type(), &ServiceScope::All).expect("list");
        assert_eq!(all.len(), 2);

        let scoped = store
            .list(&user_type(), &ServiceScope::Service(ServiceId::from("svc-1")))
            .expect("list");
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].global_id, GlobalId::from("id-1"));
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().expect("tempdir");
        let mut store = make_store(tmp.path());
        store.create(user("id-1", "phi", "svc-1")).expect("create");

        let tmp_path = store.type_path(&user_type()).with_extension("json.tmp");
        assert!(!tmp_path.exists(), ".tmp must be gone after atomic save");
        assert!(store.type_path(&user_type()).exists());
    }
}
