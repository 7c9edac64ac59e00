//! Contract tests for the field-level diff utility.

use rstest::rstest;
use serde_json::json;

use converge_core::{
    diff, DiffError, DiffOptions, FieldDiff, GlobalId, Resource, ResourceData, ServiceId,
    TypeName, TypeRegistry, ENCRYPTED_PLACEHOLDER,
};

fn resource(resource_type: &str, fields: &[(&str, serde_json::Value)]) -> Resource {
    let mut data = ResourceData::new();
    for (field, value) in fields {
        data.insert((*field).to_string(), value.clone());
    }
    Resource {
        global_id: GlobalId::from("id-1"),
        service_id: ServiceId::from("svc"),
        resource_type: TypeName::from(resource_type),
        is_partially_migrated: false,
        data,
    }
}

fn user(username: &str, email: &str) -> Resource {
    resource(
        "shared.user",
        &[("username", json!(username)), ("email", json!(email))],
    )
}

fn options(require_type_match: bool) -> DiffOptions {
    DiffOptions {
        require_type_match,
        ..DiffOptions::default()
    }
}

#[test]
fn diff_both_none() {
    let registry = TypeRegistry::builtin();
    let delta = diff(None, None, &registry, &DiffOptions::default()).expect("diff");
    assert_eq!(delta, FieldDiff::default());
    assert!(!delta.has_changes());
}

#[rstest]
#[case(true)]
#[case(false)]
fn diff_old_none_means_all_fields_are_added(#[case] require_type_match: bool) {
    let registry = TypeRegistry::builtin();
    let new = user("theceo", "theceo@example.com");

    let delta = diff(None, Some(&new), &registry, &options(require_type_match)).expect("diff");
    assert_eq!(delta.added_fields.len(), new.data.len());
    assert!(delta.removed_fields.is_empty());
    assert!(delta.changed_fields.is_empty());
    for (field, value) in &new.data {
        assert_eq!(delta.added_fields.get(field), Some(value));
    }
}

#[rstest]
#[case(true)]
#[case(false)]
fn diff_new_none_means_all_fields_are_removed(#[case] require_type_match: bool) {
    let registry = TypeRegistry::builtin();
    let old = user("theceo", "theceo@example.com");

    let delta = diff(Some(&old), None, &registry, &options(require_type_match)).expect("diff");
    assert_eq!(delta.removed_fields.len(), old.data.len());
    assert!(delta.added_fields.is_empty());
    assert!(delta.changed_fields.is_empty());
    for (field, value) in &old.data {
        assert_eq!(delta.removed_fields.get(field), Some(value));
    }
}

#[test]
fn diff_require_type_match_true_fails_across_kinds() {
    let registry = TypeRegistry::builtin();
    let old = user("theceo", "theceo@example.com");
    let new = resource("shared.organization", &[("name", json!("Serious Company"))]);

    let err = diff(Some(&old), Some(&new), &registry, &DiffOptions::default()).unwrap_err();
    assert!(matches!(err, DiffError::TypeMismatch { .. }));
    assert!(err.to_string().contains("must be of the same kind"));
}

#[test]
fn diff_require_type_match_false_allows_cross_kind() {
    let registry = TypeRegistry::builtin();
    let org = resource("shared.organization", &[("name", json!("Serious Company"))]);
    let person = user("theceo", "theceo@example.com");

    let delta = diff(Some(&person), Some(&org), &registry, &options(false)).expect("diff");
    assert_eq!(delta.added_fields.get("name"), Some(&json!("Serious Company")));
    assert!(!delta.removed_fields.contains_key("name"));
    assert!(!delta.changed_fields.contains_key("name"));

    let delta = diff(Some(&org), Some(&person), &registry, &options(false)).expect("diff");
    assert_eq!(delta.removed_fields.get("name"), Some(&json!("Serious Company")));
    assert!(!delta.added_fields.contains_key("name"));
    assert!(!delta.changed_fields.contains_key("name"));
}

#[rstest]
#[case(Some("shared.gadget"), None)]
#[case(None, Some("shared.gadget"))]
#[case(Some("shared.gadget"), Some("shared.widget"))]
fn diff_unregistered_type_fails(#[case] old_type: Option<&str>, #[case] new_type: Option<&str>) {
    let registry = TypeRegistry::builtin();
    let old = old_type.map(|t| resource(t, &[("name", json!("x"))]));
    let new = new_type.map(|t| resource(t, &[("name", json!("x"))]));

    let err = diff(old.as_ref(), new.as_ref(), &registry, &options(false)).unwrap_err();
    assert!(matches!(err, DiffError::UnknownType { .. }));
}

#[test]
fn diff_reports_changed_fields_with_old_new_pair() {
    let registry = TypeRegistry::builtin();
    let old = user("system", "system@example.com");
    let new = user("theceo", "system@example.com");

    let delta = diff(Some(&old), Some(&new), &registry, &DiffOptions::default()).expect("diff");
    let change = delta.changed_fields.get("username").expect("username change");
    assert_eq!(change.old, json!("system"));
    assert_eq!(change.new, json!("theceo"));
    assert!(!delta.changed_fields.contains_key("email"));
    assert!(delta.added_fields.is_empty());
    assert!(delta.removed_fields.is_empty());
}

#[test]
fn diff_exclude_fields() {
    let registry = TypeRegistry::builtin();
    let old = user("system", "old@example.com");
    let new = user("theceo", "new@example.com");

    let opts = DiffOptions {
        exclude_fields: vec!["username".to_string()],
        ..DiffOptions::default()
    };
    let delta = diff(Some(&old), Some(&new), &registry, &opts).expect("diff");
    assert!(!delta.changed_fields.contains_key("username"));
    let change = delta.changed_fields.get("email").expect("email change");
    assert_eq!(change.old, json!("old@example.com"));
    assert_eq!(change.new, json!("new@example.com"));
}

#[test]
fn diff_limit_fields() {
    let registry = TypeRegistry::builtin();
    let old = user("system", "old@example.com");
    let new = user("theceo", "new@example.com");

    let opts = DiffOptions {
        limit_fields: Some(vec!["username".to_string()]),
        ..DiffOptions::default()
    };
    let delta = diff(Some(&old), Some(&new), &registry, &opts).expect("diff");
    assert!(delta.changed_fields.contains_key("username"));
    assert_eq!(delta.changed_fields.len(), 1);
    assert!(delta.added_fields.is_empty());
    assert!(delta.removed_fields.is_empty());

    let delta = diff(None, Some(&new), &registry, &opts).expect("diff");
    assert!(delta.added_fields.contains_key("username"));
    assert_eq!(delta.added_fields.len(), 1);
    assert!(delta.removed_fields.is_empty());
    assert!(delta.changed_fields.is_empty());
}

#[test]
fn diff_json_safe_renders_related_entities_by_display_key() {
    let registry = TypeRegistry::builtin();
    let old = resource(
        "shared.team",
        &[
            ("name", json!("ops")),
            ("organization", json!({"global_id": "org-1", "name": "Serious Company"})),
        ],
    );
    let new = resource(
        "shared.team",
        &[
            ("name", json!("ops")),
            ("organization", json!({"global_id": "org-2", "name": "Other Company"})),
        ],
    );

    let delta = diff(Some(&old), Some(&new), &registry, &DiffOptions::default()).expect("diff");
    let change = delta.changed_fields.get("organization").expect("org change");
    assert_eq!(change.old, json!("Serious Company"));
    assert_eq!(change.new, json!("Other Company"));

    let raw = DiffOptions {
        json_safe: false,
        ..DiffOptions::default()
    };
    let delta = diff(Some(&old), Some(&new), &registry, &raw).expect("diff");
    let change = delta.changed_fields.get("organization").expect("org change");
    assert_eq!(change.old, json!({"global_id": "org-1", "name": "Serious Company"}));
    assert_eq!(change.new, json!({"global_id": "org-2", "name": "Other Company"}));
}

#[test]
fn diff_sanitizes_hidden_fields_changed() {
    let registry = TypeRegistry::builtin();
    let old = resource(
        "shared.user",
        &[("username", json!("phi")), ("password", json!("old-secret"))],
    );
    let new = resource(
        "shared.user",
        &[("username", json!("phi")), ("password", json!("new-secret"))],
    );

    let delta = diff(Some(&old), Some(&new), &registry, &DiffOptions::default()).expect("diff");
    let change = delta.changed_fields.get("password").expect("password change");
    assert_eq!(change.old, json!(ENCRYPTED_PLACEHOLDER));
    assert_eq!(change.new, json!(ENCRYPTED_PLACEHOLDER));
}

#[test]
fn diff_sanitizes_hidden_fields_added() {
    let registry = TypeRegistry::builtin();
    let new = resource(
        "shared.user",
        &[("username", json!("phi")), ("password", json!("secret"))],
    );

    let delta = diff(None, Some(&new), &registry, &DiffOptions::default()).expect("diff");
    assert_eq!(delta.added_fields.get("username"), Some(&json!("phi")));
    assert_eq!(
        delta.added_fields.get("password"),
        Some(&json!(ENCRYPTED_PLACEHOLDER))
    );
}

#[test]
fn diff_sanitizes_hidden_fields_removed() {
    let registry = TypeRegistry::builtin();
    let old = resource(
        "shared.user",
        &[("username", json!("phi")), ("password", json!("secret"))],
    );

    let delta = diff(Some(&old), None, &registry, &DiffOptions::default()).expect("diff");
    assert_eq!(delta.removed_fields.get("username"), Some(&json!("phi")));
    assert_eq!(
        delta.removed_fields.get("password"),
        Some(&json!(ENCRYPTED_PLACEHOLDER))
    );
}
