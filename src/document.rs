//! Mapper between tree-shaped model documents and the relational store.
//!
//! `load_*` walks the document and turns every record into a row, checking
//! references as they arrive; `save*` is the inverse traversal, emitting
//! rows back out in a stable order so repeated saves of an unmutated store
//! are byte-identical. Values travel as text in both directions.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use pest::Parser;
use pest_derive::Parser;
use tracing::{debug, info};

use crate::error::{ModelkitError, Result};
use crate::sanitize;
use crate::store::{
    AttributeDefRow, CategoryRow, ClassRow, CollectionRow, MembershipRow, ObjectRow,
    PersistenceMode, Store,
};

#[derive(Parser)]
#[grammar = "document.pest"]
struct DocumentParser;

/// The observable outcome of a completed load.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub rows: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Run the sanitizer over the document text before parsing.
    pub sanitize: bool,
}

/// One parsed record: its tag, a label for error reporting, and its
/// fields in document order.
struct Record {
    node: String,
    fields: Vec<(String, String)>,
}

impl Record {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn check_fields(&self, allowed: &[&str]) -> Result<()> {
        for (name, _) in &self.fields {
            if !allowed.contains(&name.as_str()) {
                return Err(ModelkitError::load(
                    &self.node,
                    format!("unknown field '{name}'"),
                ));
            }
        }
        Ok(())
    }

    fn req_text(&self, name: &str) -> Result<String> {
        self.field(name)
            .map(str::to_owned)
            .ok_or_else(|| ModelkitError::load(&self.node, format!("missing field '{name}'")))
    }

    fn req_id(&self, name: &str) -> Result<i64> {
        let raw = self.req_text(name)?;
        raw.trim().parse().map_err(|_| {
            ModelkitError::load(&self.node, format!("field '{name}' is not an id: '{raw}'"))
        })
    }

    fn opt_id(&self, name: &str) -> Result<Option<i64>> {
        match self.field(name) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                ModelkitError::load(&self.node, format!("field '{name}' is not an id: '{raw}'"))
            }),
        }
    }

    fn opt_text(&self, name: &str) -> Option<String> {
        self.field(name).map(str::to_owned)
    }
}

struct ParsedDocument {
    root: String,
    namespace: Option<String>,
    records: Vec<(String, Record)>,
}

/// Load a document from disk, optionally sanitizing it first.
pub fn load_path(
    path: impl AsRef<Path>,
    mode: PersistenceMode,
    options: LoadOptions,
) -> Result<(Store, LoadReport)> {
    let text = fs::read_to_string(path)?;
    if options.sanitize {
        let cleaned = sanitize::sanitize_str(&text);
        load_str(&cleaned, mode)
    } else {
        load_str(&text, mode)
    }
}

/// Load a document from text into a freshly created store.
pub fn load_str(text: &str, mode: PersistenceMode) -> Result<(Store, LoadReport)> {
    let started = Instant::now();
    let doc = parse_document(text)?;
    let store = Store::new(mode)?;
    store.meta_set("root_element", &doc.root)?;
    if let Some(namespace) = &doc.namespace {
        store.meta_set("namespace", namespace)?;
    }

    // Bucket the records so they can be inserted in dependency order, no
    // matter how the document interleaves them.
    let mut classes = Vec::new();
    let mut categories = Vec::new();
    let mut collections = Vec::new();
    let mut attributes = Vec::new();
    let mut objects = Vec::new();
    let mut values = Vec::new();
    let mut memberships = Vec::new();
    for (tag, record) in doc.records {
        match tag.as_str() {
            "t_class" => classes.push(record),
            "t_category" => categories.push(record),
            "t_collection" => collections.push(record),
            "t_attribute" => attributes.push(record),
            "t_object" => objects.push(record),
            "t_attribute_data" => values.push(record),
            "t_membership" => memberships.push(record),
            _ => {
                return Err(ModelkitError::load(
                    &record.node,
                    format!("unknown record kind '{tag}'"),
                ));
            }
        }
    }

    let mut rows = 0usize;
    for rec in &classes {
        rec.check_fields(&["class_id", "name", "class_group_id"])?;
        let row = ClassRow {
            class_id: rec.req_id("class_id")?,
            name: rec.req_text("name")?,
            class_group_id: rec.opt_id("class_group_id")?,
        };
        store.insert_class(&row).map_err(at_node(&rec.node))?;
        rows += 1;
    }
    for rec in &categories {
        rec.check_fields(&["category_id", "class_id", "rank", "name"])?;
        let row = CategoryRow {
            category_id: rec.req_id("category_id")?,
            class_id: rec.req_id("class_id")?,
            rank: rec.req_id("rank")?,
            name: rec.req_text("name")?,
        };
        store.insert_category(&row).map_err(at_node(&rec.node))?;
        rows += 1;
    }
    for rec in &collections {
        rec.check_fields(&[
            "collection_id",
            "parent_class_id",
            "child_class_id",
            "name",
            "complement_name",
        ])?;
        let row = CollectionRow {
            collection_id: rec.req_id("collection_id")?,
            parent_class_id: rec.req_id("parent_class_id")?,
            child_class_id: rec.req_id("child_class_id")?,
            name: rec.req_text("name")?,
            complement_name: rec.opt_text("complement_name"),
        };
        store.insert_collection(&row).map_err(at_node(&rec.node))?;
        rows += 1;
    }
    for rec in &attributes {
        rec.check_fields(&[
            "attribute_id",
            "class_id",
            "enum_id",
            "name",
            "description",
            "default_value",
        ])?;
        let row = AttributeDefRow {
            attribute_id: rec.req_id("attribute_id")?,
            class_id: rec.req_id("class_id")?,
            enum_id: rec.opt_id("enum_id")?,
            name: rec.req_text("name")?,
            description: rec.opt_text("description"),
            default_value: rec.opt_text("default_value"),
        };
        store.insert_attribute_def(&row).map_err(at_node(&rec.node))?;
        rows += 1;
    }
    for rec in &objects {
        rec.check_fields(&[
            "object_id",
            "class_id",
            "name",
            "category_id",
            "GUID",
            "description",
        ])?;
        let row = ObjectRow {
            object_id: rec.req_id("object_id")?,
            class_id: rec.req_id("class_id")?,
            name: rec.req_text("name")?,
            category_id: rec.opt_id("category_id")?,
            guid: rec.opt_text("GUID"),
            description: rec.opt_text("description"),
        };
        store.insert_object(&row).map_err(at_node(&rec.node))?;
        rows += 1;
    }
    for rec in &values {
        rec.check_fields(&["object_id", "attribute_id", "value"])?;
        store
            .set_attribute_value(
                rec.req_id("object_id")?,
                rec.req_id("attribute_id")?,
                &rec.req_text("value")?,
            )
            .map_err(at_node(&rec.node))?;
        rows += 1;
    }
    for rec in &memberships {
        rec.check_fields(&[
            "membership_id",
            "parent_class_id",
            "parent_object_id",
            "collection_id",
            "child_class_id",
            "child_object_id",
        ])?;
        let row = MembershipRow {
            membership_id: rec.req_id("membership_id")?,
            parent_class_id: rec.req_id("parent_class_id")?,
            parent_object_id: rec.req_id("parent_object_id")?,
            collection_id: rec.req_id("collection_id")?,
            child_class_id: rec.req_id("child_class_id")?,
            child_object_id: rec.req_id("child_object_id")?,
        };
        store.insert_membership_row(&row).map_err(at_node(&rec.node))?;
        rows += 1;
    }

    let elapsed = started.elapsed();
    info!(rows, elapsed_ms = elapsed.as_millis() as u64, "loaded document");
    Ok((store, LoadReport { rows, elapsed }))
}

/// Serialize a store back to a document on disk.
pub fn save(store: &Store, path: impl AsRef<Path>) -> Result<()> {
    let text = save_to_string(store)?;
    fs::write(path, text)?;
    Ok(())
}

/// Serialize a store back to document text.
///
/// Emission order: classes, categories and collections by id; then each
/// class's attribute defs; then each class's objects, every object
/// followed by its attribute values and its memberships. A reload maps
/// this back to the identical row set.
pub fn save_to_string(store: &Store) -> Result<String> {
    let started = Instant::now();
    let root = store
        .meta_get("root_element")?
        .unwrap_or_else(|| String::from("MasterDataSet"));
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    match store.meta_get("namespace")? {
        Some(namespace) => {
            let _ = writeln!(out, "<{root} xmlns=\"{}\">", escape(&namespace));
        }
        None => {
            let _ = writeln!(out, "<{root}>");
        }
    }

    let classes = store.classes()?;
    for class in &classes {
        write_record(
            &mut out,
            "t_class",
            &[
                ("class_id", Some(class.class_id.to_string())),
                ("name", Some(class.name.clone())),
                ("class_group_id", class.class_group_id.map(|i| i.to_string())),
            ],
        );
    }
    for category in store.all_categories()? {
        write_record(
            &mut out,
            "t_category",
            &[
                ("category_id", Some(category.category_id.to_string())),
                ("class_id", Some(category.class_id.to_string())),
                ("rank", Some(category.rank.to_string())),
                ("name", Some(category.name)),
            ],
        );
    }
    for collection in store.collections()? {
        write_record(
            &mut out,
            "t_collection",
            &[
                ("collection_id", Some(collection.collection_id.to_string())),
                ("parent_class_id", Some(collection.parent_class_id.to_string())),
                ("child_class_id", Some(collection.child_class_id.to_string())),
                ("name", Some(collection.name)),
                ("complement_name", collection.complement_name),
            ],
        );
    }
    for class in &classes {
        for def in store.attribute_defs(class.class_id)? {
            write_record(
                &mut out,
                "t_attribute",
                &[
                    ("attribute_id", Some(def.attribute_id.to_string())),
                    ("class_id", Some(def.class_id.to_string())),
                    ("enum_id", def.enum_id.map(|i| i.to_string())),
                    ("name", Some(def.name)),
                    ("description", def.description),
                    ("default_value", def.default_value),
                ],
            );
        }
    }
    for class in &classes {
        for object in store.objects_in_class(class.class_id)? {
            write_record(
                &mut out,
                "t_object",
                &[
                    ("object_id", Some(object.object_id.to_string())),
                    ("class_id", Some(object.class_id.to_string())),
                    ("name", Some(object.name)),
                    ("category_id", object.category_id.map(|i| i.to_string())),
                    ("GUID", object.guid),
                    ("description", object.description),
                ],
            );
            for value in store.attribute_values(object.object_id)? {
                write_record(
                    &mut out,
                    "t_attribute_data",
                    &[
                        ("object_id", Some(value.object_id.to_string())),
                        ("attribute_id", Some(value.attribute_id.to_string())),
                        ("value", Some(value.value)),
                    ],
                );
            }
            for membership in store.memberships_of_parent(object.object_id)? {
                write_record(
                    &mut out,
                    "t_membership",
                    &[
                        ("membership_id", Some(membership.membership_id.to_string())),
                        ("parent_class_id", Some(membership.parent_class_id.to_string())),
                        ("parent_object_id", Some(membership.parent_object_id.to_string())),
                        ("collection_id", Some(membership.collection_id.to_string())),
                        ("child_class_id", Some(membership.child_class_id.to_string())),
                        ("child_object_id", Some(membership.child_object_id.to_string())),
                    ],
                );
            }
        }
    }
    let _ = writeln!(out, "</{root}>");
    debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "serialized store"
    );
    Ok(out)
}

fn write_record(out: &mut String, tag: &str, fields: &[(&str, Option<String>)]) {
    let _ = writeln!(out, "  <{tag}>");
    for (name, value) in fields {
        if let Some(value) = value {
            let _ = writeln!(out, "    <{name}>{}</{name}>", escape(value));
        }
    }
    let _ = writeln!(out, "  </{tag}>");
}

// ------------- parsing -------------
fn parse_document(text: &str) -> Result<ParsedDocument> {
    let mut pairs = DocumentParser::parse(Rule::document, text)
        .map_err(|e| ModelkitError::load("document", e.to_string()))?;
    let document = pairs
        .next()
        .ok_or_else(|| ModelkitError::load("document", "empty parse result"))?;
    let root_pair = document
        .into_inner()
        .find(|p| p.as_rule() == Rule::root)
        .ok_or_else(|| ModelkitError::load("document", "missing root element"))?;

    let mut root_open = None;
    let mut root_close = None;
    let mut namespace = None;
    let mut records = Vec::new();
    let mut ordinal = 0usize;
    for pair in root_pair.into_inner() {
        match pair.as_rule() {
            Rule::name => {
                if root_open.is_none() {
                    root_open = Some(pair.as_str().to_owned());
                } else {
                    root_close = Some(pair.as_str().to_owned());
                }
            }
            Rule::attribute => {
                let mut inner = pair.into_inner();
                let attr_name = inner.next().map(|p| p.as_str().to_owned());
                let attr_value = inner.next().map(|p| p.as_str().to_owned());
                if let (Some(attr_name), Some(attr_value)) = (attr_name, attr_value) {
                    if attr_name == "xmlns" {
                        namespace = Some(unescape(&attr_value));
                    }
                }
            }
            Rule::record => {
                ordinal += 1;
                records.push(parse_record(pair, ordinal)?);
            }
            _ => {}
        }
    }
    let root = root_open.ok_or_else(|| ModelkitError::load("document", "unnamed root element"))?;
    if root_close.as_deref() != Some(root.as_str()) {
        return Err(ModelkitError::load(
            &root,
            format!(
                "mismatched closing tag '{}'",
                root_close.unwrap_or_default()
            ),
        ));
    }
    Ok(ParsedDocument {
        root,
        namespace,
        records,
    })
}

fn parse_record(pair: pest::iterators::Pair<Rule>, ordinal: usize) -> Result<(String, Record)> {
    let mut open = None;
    let mut close = None;
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => {
                if open.is_none() {
                    open = Some(inner.as_str().to_owned());
                } else {
                    close = Some(inner.as_str().to_owned());
                }
            }
            Rule::field => {
                let field = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| ModelkitError::load("record", "empty field"))?;
                match field.as_rule() {
                    Rule::empty_field => {
                        let name = field
                            .into_inner()
                            .next()
                            .map(|p| p.as_str().to_owned())
                            .ok_or_else(|| ModelkitError::load("record", "unnamed field"))?;
                        fields.push((name, String::new()));
                    }
                    Rule::value_field => {
                        let mut parts = field.into_inner();
                        let name = parts
                            .next()
                            .map(|p| p.as_str().to_owned())
                            .ok_or_else(|| ModelkitError::load("record", "unnamed field"))?;
                        let text = parts
                            .next()
                            .filter(|p| p.as_rule() == Rule::text)
                            .map(|p| unescape(p.as_str()))
                            .unwrap_or_default();
                        fields.push((name, text));
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
    let tag = open.ok_or_else(|| ModelkitError::load("record", "unnamed record"))?;
    let node = format!("{tag}[{ordinal}]");
    if close.as_deref() != Some(tag.as_str()) {
        return Err(ModelkitError::load(
            &node,
            format!("mismatched closing tag '{}'", close.unwrap_or_default()),
        ));
    }
    Ok((tag, Record { node, fields }))
}

/// Wrap store-level failures with the document node that caused them.
fn at_node(node: &str) -> impl FnOnce(ModelkitError) -> ModelkitError {
    let node = node.to_owned();
    move |e| match e {
        ModelkitError::Integrity(message) | ModelkitError::Persistence(message) => {
            ModelkitError::load(node, message)
        }
        other => other,
    }
}

// ------------- text escaping -------------
pub(crate) fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub(crate) fn unescape(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        unescaped.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = tail
            .find(';')
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                unescaped.push(c);
                rest = &tail[end + 1..];
            }
            // Not an entity: keep the ampersand and rescan from the
            // next character, so a following entity still decodes.
            None => {
                unescaped.push('&');
                rest = &tail[1..];
            }
        }
    }
    unescaped.push_str(rest);
    unescaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_decode_and_encode() {
        assert_eq!(unescape("P &amp; L &lt;2020&gt; &#65;&#x42;"), "P & L <2020> AB");
        assert_eq!(escape("P & L <2020>"), "P &amp; L &lt;2020&gt;");
    }

    #[test]
    fn unknown_entities_pass_through() {
        assert_eq!(unescape("&unknown; &lt;"), "&unknown; <");
    }

    #[test]
    fn stray_ampersands_do_not_swallow_entities() {
        assert_eq!(unescape("&&amp;"), "&&");
        assert_eq!(unescape("a & b &amp; c"), "a & b & c");
        assert_eq!(unescape("&"), "&");
    }
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}
