use modelkit::document;
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
  <t_collection>
    <collection_id>1</collection_id>
    <parent_class_id>1</parent_class_id>
    <child_class_id>2</child_class_id>
    <name>Horizons</name>
  </t_collection>
  <t_attribute>
    <attribute_id>1</attribute_id>
    <class_id>1</class_id>
    <name>Enabled</name>
  </t_attribute>
  <t_attribute>
    <attribute_id>2</attribute_id>
    <class_id>1</class_id>
    <name>Random Number Seed</name>
  </t_attribute>
  <t_object>
    <object_id>1</object_id>
    <class_id>1</class_id>
    <name>Base</name>
  </t_object>
  <t_object>
    <object_id>2</object_id>
    <class_id>2</class_id>
    <name>Daily</name>
  </t_object>
  <t_object>
    <object_id>3</object_id>
    <class_id>2</class_id>
    <name>Weekly</name>
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
    <child_object_id>2</child_object_id>
  </t_membership>
</MasterDataSet>
"#;

fn setup() -> ModelDict {
    let (store, _) = document::load_str(SAMPLE, PersistenceMode::InMemory).expect("load");
    ModelDict::new(store).expect("dict")
}

#[test]
fn identical_models_diff_as_empty() {
    assert_eq!(setup().diff(&setup()).unwrap(), Vec::<String>::new());
}

#[test]
fn ids_do_not_enter_the_comparison() {
    // Same content, every id shifted up by ten.
    let renumbered = SAMPLE
        .replace("_id>1<", "_id>11<")
        .replace("_id>2<", "_id>12<")
        .replace("_id>3<", "_id>13<");
    let (store, _) = document::load_str(&renumbered, PersistenceMode::InMemory).expect("load");
    let other = ModelDict::new(store).unwrap();
    assert_eq!(setup().diff(&other).unwrap(), Vec::<String>::new());
}

#[test]
fn changed_values_report_both_renderings() {
    let mine = setup();
    let other = setup();
    other
        .class("Model")
        .unwrap()
        .object("Base")
        .unwrap()
        .set("Enabled", 0)
        .unwrap();
    assert_eq!(
        mine.diff(&other).unwrap(),
        vec!["Model.Base.Enabled: '-1' != '0'"]
    );
}

#[test]
fn one_sided_values_are_missing_or_extra() {
    let mine = setup();
    let other = setup();
    mine.class("Model")
        .unwrap()
        .object("Base")
        .unwrap()
        .set("Random Number Seed", 42)
        .unwrap();
    other
        .class("Model")
        .unwrap()
        .object("Base")
        .unwrap()
        .unset("Enabled")
        .unwrap();
    assert_eq!(
        mine.diff(&other).unwrap(),
        vec![
            "Model.Base: missing value 'Enabled'",
            "Model.Base: missing value 'Random Number Seed'",
        ]
    );
    assert_eq!(
        other.diff(&mine).unwrap(),
        vec![
            "Model.Base: extra value 'Enabled'",
            "Model.Base: extra value 'Random Number Seed'",
        ]
    );
}

#[test]
fn one_sided_objects_are_missing_or_extra() {
    let mine = setup();
    mine.class("Model")
        .unwrap()
        .object("Base")
        .unwrap()
        .copy("Base Copy")
        .unwrap();
    let lines = mine.diff(&setup()).unwrap();
    assert!(lines.contains(&"Model: missing object 'Base Copy'".to_owned()));
    let lines = setup().diff(&mine).unwrap();
    assert!(lines.contains(&"Model: extra object 'Base Copy'".to_owned()));
}

#[test]
fn changed_children_are_reported_per_side() {
    let other = setup();
    other
        .class("Model")
        .unwrap()
        .object("Base")
        .unwrap()
        .set_children(&[("Horizon", "Weekly")], ChildMode::Replace)
        .unwrap();
    assert_eq!(
        setup().diff(&other).unwrap(),
        vec![
            "Model.Base: missing child 'Horizon.Daily'",
            "Model.Base: extra child 'Horizon.Weekly'",
        ]
    );
}
