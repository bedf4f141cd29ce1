use modelkit::document;
use modelkit::error::ModelkitError;
use modelkit::facade::{ChildMode, ModelDict};
use modelkit::store::PersistenceMode;

const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MasterDataSet xmlns="http://example.com/modeldata">
  <t_class>
    <class_id>1</class_id>
    <name>Model</name>
  </t_class>
  <t_class>
    <class_id>2</class_id>
    <name>Horizon</name>
  </t_class>
  <t_class>
    <class_id>3</class_id>
    <name>Report</name>
  </t_class>
  <t_category>
    <category_id>1</category_id>
    <class_id>1</class_id>
    <rank>1</rank>
    <name>Studies</name>
  </t_category>
  <t_collection>
    <collection_id>1</collection_id>
    <parent_class_id>1</parent_class_id>
    <child_class_id>2</child_class_id>
    <name>Horizons</name>
  </t_collection>
  <t_collection>
    <collection_id>2</collection_id>
    <parent_class_id>2</parent_class_id>
    <child_class_id>1</child_class_id>
    <name>Models</name>
  </t_collection>
  <t_collection>
    <collection_id>3</collection_id>
    <parent_class_id>1</parent_class_id>
    <child_class_id>3</child_class_id>
    <name>Reports</name>
  </t_collection>
  <t_attribute>
    <attribute_id>1</attribute_id>
    <class_id>1</class_id>
    <name>Enabled</name>
  </t_attribute>
  <t_object>
    <object_id>1</object_id>
    <class_id>1</class_id>
    <name>Base</name>
    <category_id>1</category_id>
  </t_object>
  <t_object>
    <object_id>2</object_id>
    <class_id>1</class_id>
    <name>High Demand</name>
  </t_object>
  <t_object>
    <object_id>3</object_id>
    <class_id>2</class_id>
    <name>Daily</name>
  </t_object>
  <t_object>
    <object_id>4</object_id>
    <class_id>2</class_id>
    <name>Weekly</name>
  </t_object>
  <t_object>
    <object_id>5</object_id>
    <class_id>3</class_id>
    <name>Quarterly</name>
  </t_object>
  <t_attribute_data>
    <object_id>1</object_id>
    <attribute_id>1</attribute_id>
    <value>-1</value>
  </t_attribute_data>
  <t_membership>
    <membership_id>1</membership_id>
    <parent_class_id>1</parent_class_id>
    <parent_object_id>1</parent_object_id>
    <collection_id>1</collection_id>
    <child_class_id>2</child_class_id>
    <child_object_id>3</child_object_id>
  </t_membership>
  <t_membership>
    <membership_id>2</membership_id>
    <parent_class_id>1</parent_class_id>
    <parent_object_id>1</parent_object_id>
    <collection_id>3</collection_id>
    <child_class_id>3</child_class_id>
    <child_object_id>5</child_object_id>
  </t_membership>
</MasterDataSet>
"#;

fn setup() -> ModelDict {
    let (store, _) = document::load_str(SAMPLE, PersistenceMode::InMemory).expect("load");
    ModelDict::new(store).expect("dict")
}

#[test]
fn children_and_parents_resolve_hierarchies() {
    let dict = setup();
    let base = dict.class("Model").unwrap().object("Base").unwrap();
    assert_eq!(
        base.children(None).unwrap(),
        vec!["Horizon.Daily", "Report.Quarterly"]
    );
    assert_eq!(base.children(Some("Horizon")).unwrap(), vec!["Horizon.Daily"]);
    assert_eq!(base.children(Some("Report")).unwrap(), vec!["Report.Quarterly"]);
    let high = dict.class("Model").unwrap().object("High Demand").unwrap();
    assert_eq!(high.children(None).unwrap(), Vec::<String>::new());
    let daily = dict.class("Horizon").unwrap().object("Daily").unwrap();
    assert_eq!(daily.parents(None).unwrap(), vec!["Model.Base"]);
}

#[test]
fn replace_only_touches_the_named_class() {
    let dict = setup();
    let base = dict.class("Model").unwrap().object("Base").unwrap();
    base.set_children(&[("Horizon", "Weekly")], ChildMode::Replace)
        .unwrap();
    assert_eq!(base.children(Some("Horizon")).unwrap(), vec!["Horizon.Weekly"]);
    // Children of other classes stay.
    assert_eq!(base.children(Some("Report")).unwrap(), vec!["Report.Quarterly"]);
}

#[test]
fn replace_accepts_children_of_mixed_classes() {
    let dict = setup();
    let base = dict.class("Model").unwrap().object("Base").unwrap();
    base.set_children(
        &[("Horizon", "Weekly"), ("Report", "Quarterly")],
        ChildMode::Replace,
    )
    .unwrap();
    assert_eq!(base.children(Some("Horizon")).unwrap(), vec!["Horizon.Weekly"]);
    assert_eq!(base.children(Some("Report")).unwrap(), vec!["Report.Quarterly"]);
}

#[test]
fn add_keeps_the_existing_children() {
    let dict = setup();
    let base = dict.class("Model").unwrap().object("Base").unwrap();
    base.set_children(&[("Horizon", "Weekly")], ChildMode::Add)
        .unwrap();
    assert_eq!(
        base.children(None).unwrap(),
        vec!["Horizon.Daily", "Report.Quarterly", "Horizon.Weekly"]
    );
    // Re-adding an existing child changes nothing.
    base.set_children(&[("Horizon", "Daily")], ChildMode::Add)
        .unwrap();
    assert_eq!(base.children(None).unwrap().len(), 3);
}

#[test]
fn unrelated_classes_cannot_be_linked() {
    let dict = setup();
    let daily = dict.class("Horizon").unwrap().object("Daily").unwrap();
    let err = daily
        .set_children(&[("Report", "Quarterly")], ChildMode::Replace)
        .unwrap_err();
    assert!(matches!(err, ModelkitError::Integrity(_)));
}

#[test]
fn linking_a_missing_child_is_an_error() {
    let dict = setup();
    let base = dict.class("Model").unwrap().object("Base").unwrap();
    assert!(matches!(
        base.set_children(&[("Horizon", "Hourly")], ChildMode::Add),
        Err(ModelkitError::KeyNotSet(_))
    ));
}

#[test]
fn copy_carries_attributes_and_relationships() {
    let dict = setup();
    let base = dict.class("Model").unwrap().object("Base").unwrap();
    let copy = base.copy("Base Copy").unwrap();
    assert_eq!(copy.get("Enabled").unwrap(), "-1");
    assert_eq!(
        copy.children(None).unwrap(),
        vec!["Horizon.Daily", "Report.Quarterly"]
    );
    assert_eq!(copy.category().unwrap().as_deref(), Some("Studies"));
    // The source is untouched.
    assert_eq!(
        base.children(None).unwrap(),
        vec!["Horizon.Daily", "Report.Quarterly"]
    );
    assert_eq!(
        dict.list("Model").unwrap(),
        vec!["Base", "High Demand", "Base Copy"]
    );
}

#[test]
fn copy_to_a_taken_name_is_rejected() {
    let dict = setup();
    let base = dict.class("Model").unwrap().object("Base").unwrap();
    assert!(matches!(
        base.copy("High Demand"),
        Err(ModelkitError::Integrity(_))
    ));
}

#[test]
fn categories_can_be_added_and_assigned() {
    let dict = setup();
    let class = dict.class("Model").unwrap();
    assert_eq!(class.categories().unwrap(), vec!["Studies"]);
    class.add_category("Archive").unwrap();
    assert_eq!(class.categories().unwrap(), vec!["Studies", "Archive"]);
    let high = class.object("High Demand").unwrap();
    assert_eq!(high.category().unwrap(), None);
    high.set_category("Archive").unwrap();
    assert_eq!(
        class
            .object("High Demand")
            .unwrap()
            .category()
            .unwrap()
            .as_deref(),
        Some("Archive")
    );
    assert!(high.set_category("Nope").is_err());
}

#[test]
fn dump_renders_the_object_tree() {
    let dict = setup();
    let base = dict.class("Model").unwrap().object("Base").unwrap();
    let text = base.dump().unwrap();
    assert_eq!(
        text,
        "Model.Base\n  Enabled = -1\n  Horizon.Daily\n  Report.Quarterly\n"
    );
}

#[test]
fn dump_marks_cycles_instead_of_recursing() {
    let dict = setup();
    // Make Daily point back at Base through the reverse collection.
    let daily = dict.class("Horizon").unwrap().object("Daily").unwrap();
    daily
        .set_children(&[("Model", "Base")], ChildMode::Add)
        .unwrap();
    let base = dict.class("Model").unwrap().object("Base").unwrap();
    let text = base.dump().unwrap();
    assert_eq!(
        text,
        "Model.Base\n  Enabled = -1\n  Horizon.Daily\n    Model.Base (cycle)\n  Report.Quarterly\n"
    );
}
