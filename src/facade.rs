//! Dictionary-style access to a loaded model.
//!
//! `ModelDict` sits on top of a [`Store`] and resolves names instead of
//! ids: a class name yields a [`ClassView`], an object name a
//! [`ObjectView`], and attribute access goes through the class's
//! attribute defs. Schema lookups (class names, attribute defs) are
//! cached up front since the schema does not change after load; object
//! data is always read through to the store so mutations are visible
//! immediately.
//!
//! Values are text on the way in and text on the way out. `set` accepts
//! anything `Display` and stores its rendering; `get` hands back the
//! stored text unparsed.

use std::collections::HashMap;
use std::fmt::Display;
use std::fmt::Write as _;
use std::hash::BuildHasherDefault;
use std::path::Path;

use bimap::BiMap;
use seahash::SeaHasher;
use tracing::debug;

use crate::document;
use crate::error::{ModelkitError, Result};
use crate::store::{AttributeDefRow, ClassRow, Id, ModelTable, ObjectRow, Store};

type SeaMap<K, V> = HashMap<K, V, BuildHasherDefault<SeaHasher>>;

/// How `set_children` treats the existing child set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildMode {
    /// Drop every existing child of the given class first.
    Replace,
    /// Keep existing children and add to them.
    Add,
}

struct SchemaCache {
    class_names: BiMap<String, Id>,
    attribute_defs: SeaMap<Id, SeaMap<String, AttributeDefRow>>,
}

impl SchemaCache {
    fn build(store: &Store) -> Result<SchemaCache> {
        let mut class_names = BiMap::new();
        let mut attribute_defs: SeaMap<Id, SeaMap<String, AttributeDefRow>> =
            SeaMap::default();
        for class in store.classes()? {
            let mut defs: SeaMap<String, AttributeDefRow> = SeaMap::default();
            for def in store.attribute_defs(class.class_id)? {
                defs.insert(def.name.clone(), def);
            }
            attribute_defs.insert(class.class_id, defs);
            class_names.insert(class.name, class.class_id);
        }
        Ok(SchemaCache {
            class_names,
            attribute_defs,
        })
    }

    fn class_id(&self, name: &str) -> Option<Id> {
        self.class_names.get_by_left(name).copied()
    }

    fn class_name(&self, class_id: Id) -> Option<&str> {
        self.class_names.get_by_right(&class_id).map(String::as_str)
    }

    fn def(&self, class_id: Id, attribute: &str) -> Option<&AttributeDefRow> {
        self.attribute_defs.get(&class_id)?.get(attribute)
    }
}

/// The top-level dictionary over one loaded model.
pub struct ModelDict {
    store: Store,
    schema: SchemaCache,
}

impl ModelDict {
    pub fn new(store: Store) -> Result<ModelDict> {
        let schema = SchemaCache::build(&store)?;
        Ok(ModelDict { store, schema })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Class names, in id order.
    pub fn classes(&self) -> Result<Vec<String>> {
        Ok(self.store.classes()?.into_iter().map(|c| c.name).collect())
    }

    pub fn class(&self, name: &str) -> Result<ClassView<'_>> {
        let row = self
            .store
            .class_by_name(name)?
            .ok_or_else(|| ModelkitError::KeyNotSet(name.to_owned()))?;
        Ok(ClassView { dict: self, row })
    }

    /// Object names of one class, in id order.
    pub fn list(&self, class_name: &str) -> Result<Vec<String>> {
        self.class(class_name)?.objects()
    }

    /// All set attributes of every object with this name, across
    /// classes, one `Class.Object.attribute = value` line each.
    pub fn show(&self, object_name: &str) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for object in self.store.objects_by_name(object_name)? {
            let class_name = self
                .schema
                .class_name(object.class_id)
                .unwrap_or("?")
                .to_owned();
            let view = ObjectView {
                dict: self,
                class_name,
                row: object,
            };
            for (attribute, value) in view.attributes()? {
                lines.push(format!("{}.{attribute} = {value}", view.hierarchy()));
            }
        }
        Ok(lines)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        document::save(&self.store, path)
    }

    pub fn save_to_string(&self) -> Result<String> {
        document::save_to_string(&self.store)
    }

    /// Name-keyed differences between two loaded models, one line per
    /// finding. Classes, objects, attribute values, and children present
    /// here but not there are `missing`; present there but not here are
    /// `extra`; values set on both sides to different text are reported
    /// with both renderings. Ids never enter the comparison, so two
    /// models that renumber the same content diff as equal.
    pub fn diff(&self, other: &ModelDict) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let mine = self.classes()?;
        let theirs = other.classes()?;
        for name in &mine {
            if !theirs.contains(name) {
                lines.push(format!("missing class '{name}'"));
            }
        }
        for name in &theirs {
            if !mine.contains(name) {
                lines.push(format!("extra class '{name}'"));
            }
        }
        for name in mine.iter().filter(|n| theirs.contains(n)) {
            self.diff_class(other, name, &mut lines)?;
        }
        Ok(lines)
    }

    fn diff_class(
        &self,
        other: &ModelDict,
        class_name: &str,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        let mine = self.list(class_name)?;
        let theirs = other.list(class_name)?;
        for name in &mine {
            if !theirs.contains(name) {
                lines.push(format!("{class_name}: missing object '{name}'"));
            }
        }
        for name in &theirs {
            if !mine.contains(name) {
                lines.push(format!("{class_name}: extra object '{name}'"));
            }
        }
        for name in mine.iter().filter(|n| theirs.contains(n)) {
            let ours = self.class(class_name)?.object(name)?;
            let refs = other.class(class_name)?.object(name)?;
            let our_values = ours.attributes()?;
            let ref_values = refs.attributes()?;
            for (attribute, value) in &our_values {
                match ref_values.iter().find(|(a, _)| a == attribute) {
                    None => lines.push(format!(
                        "{}: missing value '{attribute}'",
                        ours.hierarchy()
                    )),
                    Some((_, other_value)) if other_value != value => lines.push(format!(
                        "{}.{attribute}: '{value}' != '{other_value}'",
                        ours.hierarchy()
                    )),
                    Some(_) => {}
                }
            }
            for (attribute, _) in &ref_values {
                if !our_values.iter().any(|(a, _)| a == attribute) {
                    lines.push(format!("{}: extra value '{attribute}'", ours.hierarchy()));
                }
            }
            let our_children = ours.children(None)?;
            let ref_children = refs.children(None)?;
            for child in &our_children {
                if !ref_children.contains(child) {
                    lines.push(format!("{}: missing child '{child}'", ours.hierarchy()));
                }
            }
            for child in &ref_children {
                if !our_children.contains(child) {
                    lines.push(format!("{}: extra child '{child}'", ours.hierarchy()));
                }
            }
        }
        Ok(())
    }
}

/// One class and its objects.
pub struct ClassView<'a> {
    dict: &'a ModelDict,
    row: ClassRow,
}

impl<'a> ClassView<'a> {
    pub fn name(&self) -> &str {
        &self.row.name
    }

    pub fn class_id(&self) -> Id {
        self.row.class_id
    }

    /// The attribute names objects of this class may carry.
    pub fn valid_attributes(&self) -> Result<Vec<String>> {
        Ok(self
            .dict
            .store
            .attribute_defs(self.row.class_id)?
            .into_iter()
            .map(|d| d.name)
            .collect())
    }

    pub fn objects(&self) -> Result<Vec<String>> {
        Ok(self
            .dict
            .store
            .objects_in_class(self.row.class_id)?
            .into_iter()
            .map(|o| o.name)
            .collect())
    }

    pub fn object(&self, name: &str) -> Result<ObjectView<'a>> {
        let row = self
            .dict
            .store
            .object_by_name(self.row.class_id, name)?
            .ok_or_else(|| {
                ModelkitError::KeyNotSet(format!("{}.{name}", self.row.name))
            })?;
        Ok(ObjectView {
            dict: self.dict,
            class_name: self.row.name.clone(),
            row,
        })
    }

    /// Category names of this class, in rank order.
    pub fn categories(&self) -> Result<Vec<String>> {
        Ok(self
            .dict
            .store
            .categories(self.row.class_id)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Add a category after the class's existing ones, returning its id.
    pub fn add_category(&self, name: &str) -> Result<Id> {
        let store = &self.dict.store;
        let rank = store
            .categories(self.row.class_id)?
            .into_iter()
            .map(|c| c.rank)
            .max()
            .unwrap_or(0)
            + 1;
        let category_id = store.next_id(ModelTable::Category)?;
        store.insert_category(&crate::store::CategoryRow {
            category_id,
            class_id: self.row.class_id,
            rank,
            name: name.to_owned(),
        })?;
        Ok(category_id)
    }
}

/// One object: attribute access, relationships, category, copy, dump.
pub struct ObjectView<'a> {
    dict: &'a ModelDict,
    class_name: String,
    row: ObjectRow,
}

impl<'a> ObjectView<'a> {
    pub fn name(&self) -> &str {
        &self.row.name
    }

    pub fn object_id(&self) -> Id {
        self.row.object_id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// `Class.Object`, the fully qualified name.
    pub fn hierarchy(&self) -> String {
        format!("{}.{}", self.class_name, self.row.name)
    }

    fn def(&self, attribute: &str) -> Result<&'a AttributeDefRow> {
        self.dict
            .schema
            .def(self.row.class_id, attribute)
            .ok_or_else(|| ModelkitError::InvalidAttribute {
                class: self.class_name.clone(),
                attribute: attribute.to_owned(),
            })
    }

    /// The stored value of an attribute. An attribute foreign to the
    /// class is rejected; a valid attribute with no stored value is not
    /// set, even when its def carries a default.
    pub fn get(&self, attribute: &str) -> Result<String> {
        let def = self.def(attribute)?;
        self.dict
            .store
            .attribute_value(self.row.object_id, def.attribute_id)?
            .ok_or_else(|| ModelkitError::KeyNotSet(format!("{}.{attribute}", self.hierarchy())))
    }

    /// The def-level default of an attribute, independent of whether a
    /// value is stored.
    pub fn default_value(&self, attribute: &str) -> Result<Option<String>> {
        Ok(self.def(attribute)?.default_value.clone())
    }

    /// Store an attribute value, rendered to text.
    pub fn set(&self, attribute: &str, value: impl Display) -> Result<()> {
        let def = self.def(attribute)?;
        self.dict
            .store
            .set_attribute_value(self.row.object_id, def.attribute_id, &value.to_string())
    }

    /// Remove a stored attribute value. Removing a value that was never
    /// set is an error, so silent no-ops cannot hide typos.
    pub fn unset(&self, attribute: &str) -> Result<()> {
        let def = self.def(attribute)?;
        if self
            .dict
            .store
            .delete_attribute_value(self.row.object_id, def.attribute_id)?
        {
            Ok(())
        } else {
            Err(ModelkitError::KeyNotSet(format!(
                "{}.{attribute}",
                self.hierarchy()
            )))
        }
    }

    /// The stored attribute values, as `(name, value)` pairs in
    /// attribute id order.
    pub fn attributes(&self) -> Result<Vec<(String, String)>> {
        let defs = self.dict.store.attribute_defs(self.row.class_id)?;
        let mut pairs = Vec::new();
        for value in self.dict.store.attribute_values(self.row.object_id)? {
            if let Some(def) = defs.iter().find(|d| d.attribute_id == value.attribute_id) {
                pairs.push((def.name.clone(), value.value));
            }
        }
        Ok(pairs)
    }

    /// Child hierarchies, optionally restricted to one child class.
    pub fn children(&self, child_class: Option<&str>) -> Result<Vec<String>> {
        let filter = self.resolve_class(child_class)?;
        let rows = self.dict.store.children(self.row.object_id, filter)?;
        self.hierarchies(rows)
    }

    /// Parent hierarchies, optionally restricted to one parent class.
    pub fn parents(&self, parent_class: Option<&str>) -> Result<Vec<String>> {
        let filter = self.resolve_class(parent_class)?;
        let rows = self.dict.store.parents(self.row.object_id, filter)?;
        self.hierarchies(rows)
    }

    /// Point this object at a set of children, given as
    /// `(class, name)` pairs that may mix classes. Each child's class
    /// must be related to this object's class by a collection.
    /// `Replace` first drops the existing children of every class
    /// represented among the candidates, leaving other classes'
    /// children alone; `Add` keeps everything. Candidates are resolved
    /// up front, so a bad name or an unrelated class changes nothing.
    pub fn set_children(&self, children: &[(&str, &str)], mode: ChildMode) -> Result<()> {
        let store = &self.dict.store;
        let mut classes: Vec<Id> = Vec::new();
        let mut resolved: Vec<(Id, Id)> = Vec::new();
        for (child_class, name) in children {
            let child_class_id = self.dict.schema.class_id(child_class).ok_or_else(|| {
                ModelkitError::Integrity(format!("no such class '{child_class}'"))
            })?;
            let collection = store
                .collection_between(self.row.class_id, child_class_id)?
                .ok_or_else(|| {
                    ModelkitError::Integrity(format!(
                        "no collection relates '{}' to '{child_class}'",
                        self.class_name
                    ))
                })?;
            let child = store.object_by_name(child_class_id, name)?.ok_or_else(|| {
                ModelkitError::KeyNotSet(format!("{child_class}.{name}"))
            })?;
            if !classes.contains(&child_class_id) {
                classes.push(child_class_id);
            }
            resolved.push((collection.collection_id, child.object_id));
        }
        if mode == ChildMode::Replace {
            for child_class_id in &classes {
                let removed =
                    store.delete_memberships_to_class(self.row.object_id, *child_class_id)?;
                debug!(
                    parent = %self.hierarchy(),
                    child_class_id,
                    removed,
                    "replacing children"
                );
            }
        }
        for (collection_id, child_object_id) in resolved {
            store.insert_membership(self.row.object_id, child_object_id, collection_id)?;
        }
        Ok(())
    }

    /// The object's category name, if it has one.
    pub fn category(&self) -> Result<Option<String>> {
        let current = self
            .dict
            .store
            .object_by_id(self.row.object_id)?
            .and_then(|o| o.category_id);
        match current {
            None => Ok(None),
            Some(category_id) => Ok(self
                .dict
                .store
                .category_by_id(category_id)?
                .map(|c| c.name)),
        }
    }

    /// Move the object into a named category of its class.
    pub fn set_category(&self, name: &str) -> Result<()> {
        let category = self
            .dict
            .store
            .categories(self.row.class_id)?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                ModelkitError::Integrity(format!(
                    "class '{}' has no category '{name}'",
                    self.class_name
                ))
            })?;
        self.dict
            .store
            .set_object_category(self.row.object_id, category.category_id)
    }

    /// Duplicate this object under a new name: same class and category,
    /// all attribute values, and every membership on either side.
    pub fn copy(&self, new_name: &str) -> Result<ObjectView<'a>> {
        let store = &self.dict.store;
        if store.object_by_name(self.row.class_id, new_name)?.is_some() {
            return Err(ModelkitError::Integrity(format!(
                "object '{}.{new_name}' already exists",
                self.class_name
            )));
        }
        let object_id = store.next_id(ModelTable::Object)?;
        let row = ObjectRow {
            object_id,
            name: new_name.to_owned(),
            ..self.row.clone()
        };
        store.insert_object(&row)?;
        for value in store.attribute_values(self.row.object_id)? {
            store.set_attribute_value(object_id, value.attribute_id, &value.value)?;
        }
        for membership in store.memberships_of_parent(self.row.object_id)? {
            store.insert_membership(
                object_id,
                membership.child_object_id,
                membership.collection_id,
            )?;
        }
        for membership in store.memberships_of_child(self.row.object_id)? {
            store.insert_membership(
                membership.parent_object_id,
                object_id,
                membership.collection_id,
            )?;
        }
        debug!(source = %self.hierarchy(), copy = new_name, "copied object");
        Ok(ObjectView {
            dict: self.dict,
            class_name: self.class_name.clone(),
            row,
        })
    }

    /// Render this object, its attributes, and its child tree as
    /// indented text. An object already on the path down from the root
    /// is printed once more with a `(cycle)` marker and not descended
    /// into, so mutually related objects cannot recurse forever.
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        let mut path = Vec::new();
        self.dump_into(&mut out, 0, &mut path)?;
        Ok(out)
    }

    fn dump_into(&self, out: &mut String, depth: usize, path: &mut Vec<Id>) -> Result<()> {
        let indent = "  ".repeat(depth);
        if path.contains(&self.row.object_id) {
            let _ = writeln!(out, "{indent}{} (cycle)", self.hierarchy());
            return Ok(());
        }
        let _ = writeln!(out, "{indent}{}", self.hierarchy());
        for (attribute, value) in self.attributes()? {
            let _ = writeln!(out, "{indent}  {attribute} = {value}");
        }
        path.push(self.row.object_id);
        for child in self.dict.store.children(self.row.object_id, None)? {
            let class_name = self
                .dict
                .schema
                .class_name(child.class_id)
                .unwrap_or("?")
                .to_owned();
            let view = ObjectView {
                dict: self.dict,
                class_name,
                row: child,
            };
            view.dump_into(out, depth + 1, path)?;
        }
        path.pop();
        Ok(())
    }

    fn resolve_class(&self, name: Option<&str>) -> Result<Option<Id>> {
        match name {
            None => Ok(None),
            Some(name) => self
                .dict
                .schema
                .class_id(name)
                .map(Some)
                .ok_or_else(|| ModelkitError::Integrity(format!("no such class '{name}'"))),
        }
    }

    fn hierarchies(&self, rows: Vec<ObjectRow>) -> Result<Vec<String>> {
        Ok(rows
            .into_iter()
            .map(|o| {
                format!(
                    "{}.{}",
                    self.dict.schema.class_name(o.class_id).unwrap_or("?"),
                    o.name
                )
            })
            .collect())
    }
}
