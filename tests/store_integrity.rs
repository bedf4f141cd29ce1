use modelkit::error::ModelkitError;
use modelkit::store::{
    AttributeDefRow, CategoryRow, ClassRow, CollectionRow, ModelTable, ObjectRow, PersistenceMode,
    Store,
};

fn setup() -> Store {
    let store = Store::new(PersistenceMode::InMemory).expect("store");
    store
        .insert_class(&ClassRow {
            class_id: 1,
            name: "Model".into(),
            class_group_id: None,
        })
        .unwrap();
    store
        .insert_class(&ClassRow {
            class_id: 2,
            name: "Horizon".into(),
            class_group_id: None,
        })
        .unwrap();
    store
        .insert_collection(&CollectionRow {
            collection_id: 1,
            parent_class_id: 1,
            child_class_id: 2,
            name: "Horizons".into(),
            complement_name: None,
        })
        .unwrap();
    store
        .insert_attribute_def(&AttributeDefRow {
            attribute_id: 1,
            class_id: 1,
            enum_id: None,
            name: "Enabled".into(),
            description: None,
            default_value: None,
        })
        .unwrap();
    store
        .insert_object(&ObjectRow {
            object_id: 1,
            class_id: 1,
            name: "Base".into(),
            category_id: None,
            guid: None,
            description: None,
        })
        .unwrap();
    store
        .insert_object(&ObjectRow {
            object_id: 2,
            class_id: 2,
            name: "Daily".into(),
            category_id: None,
            guid: None,
            description: None,
        })
        .unwrap();
    store
}

#[test]
fn class_names_are_unique() {
    let store = setup();
    let err = store
        .insert_class(&ClassRow {
            class_id: 3,
            name: "Model".into(),
            class_group_id: None,
        })
        .unwrap_err();
    assert!(matches!(err, ModelkitError::Integrity(_)));
}

#[test]
fn object_names_are_unique_within_a_class() {
    let store = setup();
    let err = store
        .insert_object(&ObjectRow {
            object_id: 3,
            class_id: 1,
            name: "Base".into(),
            category_id: None,
            guid: None,
            description: None,
        })
        .unwrap_err();
    assert!(matches!(err, ModelkitError::Integrity(_)));
    // The same name under another class is fine.
    store
        .insert_object(&ObjectRow {
            object_id: 3,
            class_id: 2,
            name: "Base".into(),
            category_id: None,
            guid: None,
            description: None,
        })
        .unwrap();
}

#[test]
fn rows_must_reference_existing_classes() {
    let store = setup();
    assert!(store
        .insert_object(&ObjectRow {
            object_id: 3,
            class_id: 9,
            name: "Orphan".into(),
            category_id: None,
            guid: None,
            description: None,
        })
        .is_err());
    assert!(store
        .insert_attribute_def(&AttributeDefRow {
            attribute_id: 2,
            class_id: 9,
            enum_id: None,
            name: "Orphan".into(),
            description: None,
            default_value: None,
        })
        .is_err());
    assert!(store
        .insert_category(&CategoryRow {
            category_id: 1,
            class_id: 9,
            rank: 1,
            name: "Orphan".into(),
        })
        .is_err());
}

#[test]
fn attribute_values_must_match_the_objects_class() {
    let store = setup();
    // Attribute 1 belongs to class 1; object 2 is class 2.
    let err = store.set_attribute_value(2, 1, "-1").unwrap_err();
    assert!(matches!(err, ModelkitError::Integrity(_)));
    assert!(store.set_attribute_value(1, 9, "-1").is_err());
    store.set_attribute_value(1, 1, "-1").unwrap();
    assert_eq!(store.attribute_value(1, 1).unwrap().as_deref(), Some("-1"));
}

#[test]
fn setting_a_value_twice_keeps_one_row() {
    let store = setup();
    store.set_attribute_value(1, 1, "-1").unwrap();
    store.set_attribute_value(1, 1, "0").unwrap();
    assert_eq!(store.attribute_values(1).unwrap().len(), 1);
    assert_eq!(store.attribute_value(1, 1).unwrap().as_deref(), Some("0"));
}

#[test]
fn membership_insertion_is_idempotent() {
    let store = setup();
    let first = store.insert_membership(1, 2, 1).unwrap();
    let second = store.insert_membership(1, 2, 1).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.all_memberships().unwrap().len(), 1);
}

#[test]
fn membership_rejects_self_and_class_mismatch() {
    let store = setup();
    assert!(store.insert_membership(1, 1, 1).is_err());
    // Collection 1 relates Model to Horizon, not the reverse.
    assert!(store.insert_membership(2, 1, 1).is_err());
    assert!(store.insert_membership(1, 2, 9).is_err());
}

#[test]
fn single_memberships_can_be_deleted() {
    let store = setup();
    let id = store.insert_membership(1, 2, 1).unwrap();
    assert!(store.delete_membership(id).unwrap());
    assert!(!store.delete_membership(id).unwrap());
    assert!(store.all_memberships().unwrap().is_empty());
}

#[test]
fn deleting_an_object_cascades() {
    let store = setup();
    store.set_attribute_value(1, 1, "-1").unwrap();
    store.insert_membership(1, 2, 1).unwrap();
    store.delete_object(1).unwrap();
    assert!(store.object_by_id(1).unwrap().is_none());
    assert!(store.all_attribute_values().unwrap().is_empty());
    assert!(store.all_memberships().unwrap().is_empty());
}

#[test]
fn a_class_with_objects_cannot_be_deleted() {
    let store = setup();
    assert!(store.delete_class(1).is_err());
    store.delete_object(1).unwrap();
    store.delete_class(1).unwrap();
    assert!(store.class_by_id(1).unwrap().is_none());
}

#[test]
fn attribute_defs_resolve_by_class_and_name() {
    let store = setup();
    let def = store.attribute_def(1, "Enabled").unwrap().unwrap();
    assert_eq!(def.attribute_id, 1);
    assert!(store.attribute_def(2, "Enabled").unwrap().is_none());
    assert!(store.attribute_def(1, "Missing").unwrap().is_none());
}

#[test]
fn next_id_starts_after_the_largest() {
    let store = setup();
    assert_eq!(store.next_id(ModelTable::Object).unwrap(), 3);
    assert_eq!(store.next_id(ModelTable::Membership).unwrap(), 1);
}

#[test]
fn meta_values_overwrite() {
    let store = setup();
    assert_eq!(store.meta_get("root_element").unwrap(), None);
    store.meta_set("root_element", "MasterDataSet").unwrap();
    store.meta_set("root_element", "DataSet").unwrap();
    assert_eq!(
        store.meta_get("root_element").unwrap().as_deref(),
        Some("DataSet")
    );
}

#[test]
fn categories_must_belong_to_the_objects_class() {
    let store = setup();
    store
        .insert_category(&CategoryRow {
            category_id: 1,
            class_id: 2,
            rank: 1,
            name: "Short".into(),
        })
        .unwrap();
    // Object 1 is class 1; category 1 belongs to class 2.
    assert!(store.set_object_category(1, 1).is_err());
    store.set_object_category(2, 1).unwrap();
    assert_eq!(
        store.object_by_id(2).unwrap().unwrap().category_id,
        Some(1)
    );
}
