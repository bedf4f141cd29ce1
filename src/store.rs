//! The relational store backing one loaded model document.
//!
//! The table layout is fixed (class, category, collection, attribute,
//! object, attribute_data, membership, meta) but the rows are data: which
//! classes exist and which attributes they allow is discovered from the
//! loaded document, never compiled in. Every mutating call checks the
//! invariants it could violate before touching a row, so a failed call
//! leaves the store unchanged.

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{ModelkitError, Result};

pub type Id = i64;

/// Where the store keeps its working set.
#[derive(Debug, Clone)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

/// The id-carrying model tables. Identifiers reach SQL only through
/// this enum's fixed names, never through caller strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTable {
    Class,
    Category,
    Collection,
    Attribute,
    Object,
    Membership,
}

impl ModelTable {
    fn id_column(self) -> (&'static str, &'static str) {
        match self {
            ModelTable::Class => ("class", "class_id"),
            ModelTable::Category => ("category", "category_id"),
            ModelTable::Collection => ("collection", "collection_id"),
            ModelTable::Attribute => ("attribute", "attribute_id"),
            ModelTable::Object => ("object", "object_id"),
            ModelTable::Membership => ("membership", "membership_id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassRow {
    pub class_id: Id,
    pub name: String,
    pub class_group_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryRow {
    pub category_id: Id,
    pub class_id: Id,
    pub rank: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRow {
    pub collection_id: Id,
    pub parent_class_id: Id,
    pub child_class_id: Id,
    pub name: String,
    pub complement_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeDefRow {
    pub attribute_id: Id,
    pub class_id: Id,
    pub enum_id: Option<Id>,
    pub name: String,
    pub description: Option<String>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRow {
    pub object_id: Id,
    pub class_id: Id,
    pub name: String,
    pub category_id: Option<Id>,
    pub guid: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeValueRow {
    pub object_id: Id,
    pub attribute_id: Id,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MembershipRow {
    pub membership_id: Id,
    pub parent_class_id: Id,
    pub parent_object_id: Id,
    pub collection_id: Id,
    pub child_class_id: Id,
    pub child_object_id: Id,
}

#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(mode: PersistenceMode) -> Result<Store> {
        let conn = match mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        conn.execute_batch(
            r#"
            create table if not exists "class" (
                "class_id" integer not null,
                "name" text not null,
                "class_group_id" integer null,
                constraint referenceable_class primary key ("class_id"),
                constraint unique_class_name unique ("name")
            );
            create table if not exists "category" (
                "category_id" integer not null,
                "class_id" integer not null references "class"("class_id"),
                "rank" integer not null,
                "name" text not null,
                constraint referenceable_category primary key ("category_id"),
                constraint unique_category unique ("class_id", "name")
            );
            create table if not exists "collection" (
                "collection_id" integer not null,
                "parent_class_id" integer not null references "class"("class_id"),
                "child_class_id" integer not null references "class"("class_id"),
                "name" text not null,
                "complement_name" text null,
                constraint referenceable_collection primary key ("collection_id")
            );
            create table if not exists "attribute" (
                "attribute_id" integer not null,
                "class_id" integer not null references "class"("class_id"),
                "enum_id" integer null,
                "name" text not null,
                "description" text null,
                "default_value" text null,
                constraint referenceable_attribute primary key ("attribute_id"),
                constraint unique_attribute unique ("class_id", "name")
            );
            create table if not exists "object" (
                "object_id" integer not null,
                "class_id" integer not null references "class"("class_id"),
                "name" text not null,
                "category_id" integer null references "category"("category_id"),
                "guid" text null,
                "description" text null,
                constraint referenceable_object primary key ("object_id"),
                constraint unique_object unique ("class_id", "name")
            );
            create table if not exists "attribute_data" (
                "object_id" integer not null references "object"("object_id"),
                "attribute_id" integer not null references "attribute"("attribute_id"),
                "value" text not null,
                constraint unique_attribute_data primary key ("object_id", "attribute_id")
            );
            create table if not exists "membership" (
                "membership_id" integer not null,
                "parent_class_id" integer not null references "class"("class_id"),
                "parent_object_id" integer not null references "object"("object_id"),
                "collection_id" integer not null references "collection"("collection_id"),
                "child_class_id" integer not null references "class"("class_id"),
                "child_object_id" integer not null references "object"("object_id"),
                constraint referenceable_membership primary key ("membership_id"),
                constraint unique_membership unique (
                    "parent_object_id", "child_object_id", "collection_id"
                )
            );
            create table if not exists "meta" (
                "name" text not null,
                "value" text not null,
                constraint referenceable_meta primary key ("name")
            );
            create index if not exists membership_parent_idx
                on "membership" ("parent_object_id");
            create index if not exists membership_child_idx
                on "membership" ("child_object_id");
            create index if not exists attribute_data_object_idx
                on "attribute_data" ("object_id");
            "#,
        )?;
        Ok(Store { conn })
    }

    /// Next free id for one of the id-carrying tables.
    pub fn next_id(&self, table: ModelTable) -> Result<Id> {
        let (table, column) = table.id_column();
        let sql = format!(r#"select coalesce(max("{column}"), 0) + 1 from "{table}""#);
        let id = self.conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(id)
    }

    // ------------- meta -------------
    pub fn meta_set(&self, name: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"insert into "meta" ("name", "value") values (?, ?)
               on conflict ("name") do update set "value" = excluded."value""#,
            params![name, value],
        )?;
        Ok(())
    }

    pub fn meta_get(&self, name: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                r#"select "value" from "meta" where "name" = ?"#,
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    }

    // ------------- inserts -------------
    pub fn insert_class(&self, row: &ClassRow) -> Result<()> {
        if self.class_by_name(&row.name)?.is_some() {
            return Err(ModelkitError::Integrity(format!(
                "duplicate class name '{}'",
                row.name
            )));
        }
        if self.class_by_id(row.class_id)?.is_some() {
            return Err(ModelkitError::Integrity(format!(
                "duplicate class id {}",
                row.class_id
            )));
        }
        self.conn.execute(
            r#"insert into "class" ("class_id", "name", "class_group_id")
               values (?, ?, ?)"#,
            params![row.class_id, row.name, row.class_group_id],
        )?;
        Ok(())
    }

    pub fn insert_category(&self, row: &CategoryRow) -> Result<()> {
        self.require_class(row.class_id)?;
        let taken: Option<Id> = self
            .conn
            .query_row(
                r#"select "category_id" from "category" where "class_id" = ? and "name" = ?"#,
                params![row.class_id, row.name],
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(ModelkitError::Integrity(format!(
                "category '{}' already exists in class {}",
                row.name, row.class_id
            )));
        }
        self.conn.execute(
            r#"insert into "category" ("category_id", "class_id", "rank", "name")
               values (?, ?, ?, ?)"#,
            params![row.category_id, row.class_id, row.rank, row.name],
        )?;
        Ok(())
    }

    pub fn insert_collection(&self, row: &CollectionRow) -> Result<()> {
        self.require_class(row.parent_class_id)?;
        self.require_class(row.child_class_id)?;
        self.conn.execute(
            r#"insert into "collection" (
                   "collection_id", "parent_class_id", "child_class_id",
                   "name", "complement_name"
               ) values (?, ?, ?, ?, ?)"#,
            params![
                row.collection_id,
                row.parent_class_id,
                row.child_class_id,
                row.name,
                row.complement_name
            ],
        )?;
        Ok(())
    }

    pub fn insert_attribute_def(&self, row: &AttributeDefRow) -> Result<()> {
        self.require_class(row.class_id)?;
        if self.attribute_def(row.class_id, &row.name)?.is_some() {
            return Err(ModelkitError::Integrity(format!(
                "duplicate attribute '{}' in class {}",
                row.name, row.class_id
            )));
        }
        self.conn.execute(
            r#"insert into "attribute" (
                   "attribute_id", "class_id", "enum_id",
                   "name", "description", "default_value"
               ) values (?, ?, ?, ?, ?, ?)"#,
            params![
                row.attribute_id,
                row.class_id,
                row.enum_id,
                row.name,
                row.description,
                row.default_value
            ],
        )?;
        Ok(())
    }

    pub fn insert_object(&self, row: &ObjectRow) -> Result<()> {
        self.require_class(row.class_id)?;
        if self.object_by_name(row.class_id, &row.name)?.is_some() {
            return Err(ModelkitError::Integrity(format!(
                "duplicate object '{}' in class {}",
                row.name, row.class_id
            )));
        }
        if let Some(category_id) = row.category_id {
            let category = self.category_by_id(category_id)?.ok_or_else(|| {
                ModelkitError::Integrity(format!("no such category {category_id}"))
            })?;
            if category.class_id != row.class_id {
                return Err(ModelkitError::Integrity(format!(
                    "category {} belongs to class {}, not class {}",
                    category_id, category.class_id, row.class_id
                )));
            }
        }
        self.conn.execute(
            r#"insert into "object" (
                   "object_id", "class_id", "name",
                   "category_id", "guid", "description"
               ) values (?, ?, ?, ?, ?, ?)"#,
            params![
                row.object_id,
                row.class_id,
                row.name,
                row.category_id,
                row.guid,
                row.description
            ],
        )?;
        Ok(())
    }

    /// Insert or replace the value of one attribute on one object. The
    /// attribute def must belong to the object's class.
    pub fn set_attribute_value(&self, object_id: Id, attribute_id: Id, value: &str) -> Result<()> {
        let object = self.require_object(object_id)?;
        let def: Option<Id> = self
            .conn
            .query_row(
                r#"select "class_id" from "attribute" where "attribute_id" = ?"#,
                params![attribute_id],
                |r| r.get(0),
            )
            .optional()?;
        match def {
            None => {
                return Err(ModelkitError::Integrity(format!(
                    "no such attribute {attribute_id}"
                )));
            }
            Some(class_id) if class_id != object.class_id => {
                return Err(ModelkitError::Integrity(format!(
                    "attribute {} belongs to class {}, object {} to class {}",
                    attribute_id, class_id, object_id, object.class_id
                )));
            }
            Some(_) => {}
        }
        let updated = self.conn.execute(
            r#"update "attribute_data" set "value" = ?
               where "object_id" = ? and "attribute_id" = ?"#,
            params![value, object_id, attribute_id],
        )?;
        if updated == 0 {
            self.conn.execute(
                r#"insert into "attribute_data" ("object_id", "attribute_id", "value")
                   values (?, ?, ?)"#,
                params![object_id, attribute_id, value],
            )?;
        }
        Ok(())
    }

    /// Remove an attribute value row. Returns whether a row existed.
    pub fn delete_attribute_value(&self, object_id: Id, attribute_id: Id) -> Result<bool> {
        let removed = self.conn.execute(
            r#"delete from "attribute_data" where "object_id" = ? and "attribute_id" = ?"#,
            params![object_id, attribute_id],
        )?;
        Ok(removed > 0)
    }

    /// Add a membership edge. Idempotent: an identical
    /// (parent, child, collection) edge is returned rather than duplicated.
    pub fn insert_membership(
        &self,
        parent_object_id: Id,
        child_object_id: Id,
        collection_id: Id,
    ) -> Result<Id> {
        if parent_object_id == child_object_id {
            return Err(ModelkitError::Integrity(format!(
                "object {parent_object_id} cannot be its own child"
            )));
        }
        let parent = self.require_object(parent_object_id)?;
        let child = self.require_object(child_object_id)?;
        let collection = self.collection_by_id(collection_id)?.ok_or_else(|| {
            ModelkitError::Integrity(format!("no such collection {collection_id}"))
        })?;
        if collection.parent_class_id != parent.class_id
            || collection.child_class_id != child.class_id
        {
            return Err(ModelkitError::Integrity(format!(
                "collection '{}' relates classes {} -> {}, not {} -> {}",
                collection.name,
                collection.parent_class_id,
                collection.child_class_id,
                parent.class_id,
                child.class_id
            )));
        }
        let existing: Option<Id> = self
            .conn
            .query_row(
                r#"select "membership_id" from "membership"
                   where "parent_object_id" = ? and "child_object_id" = ?
                   and "collection_id" = ?"#,
                params![parent_object_id, child_object_id, collection_id],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        let membership_id = self.next_id(ModelTable::Membership)?;
        self.conn.execute(
            r#"insert into "membership" (
                   "membership_id", "parent_class_id", "parent_object_id",
                   "collection_id", "child_class_id", "child_object_id"
               ) values (?, ?, ?, ?, ?, ?)"#,
            params![
                membership_id,
                parent.class_id,
                parent_object_id,
                collection_id,
                child.class_id,
                child_object_id
            ],
        )?;
        Ok(membership_id)
    }

    /// Used during load, where the document dictates the membership id.
    pub fn insert_membership_row(&self, row: &MembershipRow) -> Result<()> {
        if row.parent_object_id == row.child_object_id {
            return Err(ModelkitError::Integrity(format!(
                "object {} cannot be its own child",
                row.parent_object_id
            )));
        }
        let parent = self.require_object(row.parent_object_id)?;
        let child = self.require_object(row.child_object_id)?;
        if parent.class_id != row.parent_class_id || child.class_id != row.child_class_id {
            return Err(ModelkitError::Integrity(format!(
                "membership {} states classes {} -> {}, but its objects belong to {} -> {}",
                row.membership_id,
                row.parent_class_id,
                row.child_class_id,
                parent.class_id,
                child.class_id
            )));
        }
        let collection = self.collection_by_id(row.collection_id)?.ok_or_else(|| {
            ModelkitError::Integrity(format!("no such collection {}", row.collection_id))
        })?;
        if collection.parent_class_id != parent.class_id
            || collection.child_class_id != child.class_id
        {
            return Err(ModelkitError::Integrity(format!(
                "collection '{}' relates classes {} -> {}, not {} -> {}",
                collection.name,
                collection.parent_class_id,
                collection.child_class_id,
                parent.class_id,
                child.class_id
            )));
        }
        self.conn.execute(
            r#"insert into "membership" (
                   "membership_id", "parent_class_id", "parent_object_id",
                   "collection_id", "child_class_id", "child_object_id"
               ) values (?, ?, ?, ?, ?, ?)"#,
            params![
                row.membership_id,
                row.parent_class_id,
                row.parent_object_id,
                row.collection_id,
                row.child_class_id,
                row.child_object_id
            ],
        )?;
        Ok(())
    }

    /// Remove a single membership edge. Returns whether it existed.
    pub fn delete_membership(&self, membership_id: Id) -> Result<bool> {
        let removed = self.conn.execute(
            r#"delete from "membership" where "membership_id" = ?"#,
            params![membership_id],
        )?;
        Ok(removed > 0)
    }

    /// Remove all memberships from a parent to children of one class.
    pub fn delete_memberships_to_class(
        &self,
        parent_object_id: Id,
        child_class_id: Id,
    ) -> Result<usize> {
        let removed = self.conn.execute(
            r#"delete from "membership"
               where "parent_object_id" = ? and "child_class_id" = ?"#,
            params![parent_object_id, child_class_id],
        )?;
        Ok(removed)
    }

    pub fn delete_class(&self, class_id: Id) -> Result<()> {
        self.require_class(class_id)?;
        let objects: i64 = self.conn.query_row(
            r#"select count(*) from "object" where "class_id" = ?"#,
            params![class_id],
            |r| r.get(0),
        )?;
        if objects > 0 {
            return Err(ModelkitError::Integrity(format!(
                "class {class_id} still has {objects} objects"
            )));
        }
        self.conn.execute(
            r#"delete from "attribute" where "class_id" = ?"#,
            params![class_id],
        )?;
        self.conn.execute(
            r#"delete from "category" where "class_id" = ?"#,
            params![class_id],
        )?;
        self.conn.execute(
            r#"delete from "collection" where "parent_class_id" = ? or "child_class_id" = ?"#,
            params![class_id, class_id],
        )?;
        self.conn.execute(
            r#"delete from "class" where "class_id" = ?"#,
            params![class_id],
        )?;
        Ok(())
    }

    /// Remove an object together with its attribute values and every
    /// membership it takes part in, on either side.
    pub fn delete_object(&self, object_id: Id) -> Result<()> {
        self.require_object(object_id)?;
        self.conn.execute(
            r#"delete from "attribute_data" where "object_id" = ?"#,
            params![object_id],
        )?;
        self.conn.execute(
            r#"delete from "membership"
               where "parent_object_id" = ? or "child_object_id" = ?"#,
            params![object_id, object_id],
        )?;
        self.conn.execute(
            r#"delete from "object" where "object_id" = ?"#,
            params![object_id],
        )?;
        Ok(())
    }

    pub fn set_object_category(&self, object_id: Id, category_id: Id) -> Result<()> {
        let object = self.require_object(object_id)?;
        let category = self
            .category_by_id(category_id)?
            .ok_or_else(|| ModelkitError::Integrity(format!("no such category {category_id}")))?;
        if category.class_id != object.class_id {
            return Err(ModelkitError::Integrity(format!(
                "category '{}' belongs to class {}, not class {}",
                category.name, category.class_id, object.class_id
            )));
        }
        self.conn.execute(
            r#"update "object" set "category_id" = ? where "object_id" = ?"#,
            params![category_id, object_id],
        )?;
        Ok(())
    }

    // ------------- queries -------------
    pub fn classes(&self) -> Result<Vec<ClassRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "class_id", "name", "class_group_id" from "class" order by "class_id""#,
        )?;
        let rows = stmt
            .query_map([], class_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn class_by_name(&self, name: &str) -> Result<Option<ClassRow>> {
        let row = self
            .conn
            .query_row(
                r#"select "class_id", "name", "class_group_id" from "class" where "name" = ?"#,
                params![name],
                class_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn class_by_id(&self, class_id: Id) -> Result<Option<ClassRow>> {
        let row = self
            .conn
            .query_row(
                r#"select "class_id", "name", "class_group_id" from "class" where "class_id" = ?"#,
                params![class_id],
                class_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn categories(&self, class_id: Id) -> Result<Vec<CategoryRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "category_id", "class_id", "rank", "name" from "category"
               where "class_id" = ? order by "rank", "category_id""#,
        )?;
        let rows = stmt
            .query_map(params![class_id], category_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn all_categories(&self) -> Result<Vec<CategoryRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "category_id", "class_id", "rank", "name" from "category"
               order by "category_id""#,
        )?;
        let rows = stmt
            .query_map([], category_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn category_by_id(&self, category_id: Id) -> Result<Option<CategoryRow>> {
        let row = self
            .conn
            .query_row(
                r#"select "category_id", "class_id", "rank", "name" from "category"
                   where "category_id" = ?"#,
                params![category_id],
                category_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn collections(&self) -> Result<Vec<CollectionRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "collection_id", "parent_class_id", "child_class_id",
                      "name", "complement_name"
               from "collection" order by "collection_id""#,
        )?;
        let rows = stmt
            .query_map([], collection_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn collection_by_id(&self, collection_id: Id) -> Result<Option<CollectionRow>> {
        let row = self
            .conn
            .query_row(
                r#"select "collection_id", "parent_class_id", "child_class_id",
                          "name", "complement_name"
                   from "collection" where "collection_id" = ?"#,
                params![collection_id],
                collection_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn collection_between(
        &self,
        parent_class_id: Id,
        child_class_id: Id,
    ) -> Result<Option<CollectionRow>> {
        let row = self
            .conn
            .query_row(
                r#"select "collection_id", "parent_class_id", "child_class_id",
                          "name", "complement_name"
                   from "collection"
                   where "parent_class_id" = ? and "child_class_id" = ?
                   order by "collection_id" limit 1"#,
                params![parent_class_id, child_class_id],
                collection_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn attribute_defs(&self, class_id: Id) -> Result<Vec<AttributeDefRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "attribute_id", "class_id", "enum_id",
                      "name", "description", "default_value"
               from "attribute" where "class_id" = ? order by "attribute_id""#,
        )?;
        let rows = stmt
            .query_map(params![class_id], attribute_def_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn attribute_def(&self, class_id: Id, name: &str) -> Result<Option<AttributeDefRow>> {
        let row = self
            .conn
            .query_row(
                r#"select "attribute_id", "class_id", "enum_id",
                          "name", "description", "default_value"
                   from "attribute" where "class_id" = ? and "name" = ?"#,
                params![class_id, name],
                attribute_def_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn objects_in_class(&self, class_id: Id) -> Result<Vec<ObjectRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "object_id", "class_id", "name", "category_id", "guid", "description"
               from "object" where "class_id" = ? order by "object_id""#,
        )?;
        let rows = stmt
            .query_map(params![class_id], object_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn object_by_name(&self, class_id: Id, name: &str) -> Result<Option<ObjectRow>> {
        let row = self
            .conn
            .query_row(
                r#"select "object_id", "class_id", "name", "category_id", "guid", "description"
                   from "object" where "class_id" = ? and "name" = ?"#,
                params![class_id, name],
                object_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn objects_by_name(&self, name: &str) -> Result<Vec<ObjectRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "object_id", "class_id", "name", "category_id", "guid", "description"
               from "object" where "name" = ? order by "object_id""#,
        )?;
        let rows = stmt
            .query_map(params![name], object_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn object_by_id(&self, object_id: Id) -> Result<Option<ObjectRow>> {
        let row = self
            .conn
            .query_row(
                r#"select "object_id", "class_id", "name", "category_id", "guid", "description"
                   from "object" where "object_id" = ?"#,
                params![object_id],
                object_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn attribute_values(&self, object_id: Id) -> Result<Vec<AttributeValueRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "object_id", "attribute_id", "value" from "attribute_data"
               where "object_id" = ? order by "attribute_id""#,
        )?;
        let rows = stmt
            .query_map(params![object_id], |r| {
                Ok(AttributeValueRow {
                    object_id: r.get(0)?,
                    attribute_id: r.get(1)?,
                    value: r.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn all_attribute_values(&self) -> Result<Vec<AttributeValueRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "object_id", "attribute_id", "value" from "attribute_data"
               order by "object_id", "attribute_id""#,
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(AttributeValueRow {
                    object_id: r.get(0)?,
                    attribute_id: r.get(1)?,
                    value: r.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn attribute_value(&self, object_id: Id, attribute_id: Id) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                r#"select "value" from "attribute_data"
                   where "object_id" = ? and "attribute_id" = ?"#,
                params![object_id, attribute_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Children of an object via membership, in membership id order,
    /// optionally narrowed to one child class.
    pub fn children(&self, parent_object_id: Id, child_class_id: Option<Id>) -> Result<Vec<ObjectRow>> {
        self.related(parent_object_id, child_class_id, true)
    }

    /// Parents of an object via membership, in membership id order.
    pub fn parents(&self, child_object_id: Id, parent_class_id: Option<Id>) -> Result<Vec<ObjectRow>> {
        self.related(child_object_id, parent_class_id, false)
    }

    fn related(
        &self,
        object_id: Id,
        class_filter: Option<Id>,
        towards_children: bool,
    ) -> Result<Vec<ObjectRow>> {
        let (own_side, other_side, other_class) = if towards_children {
            ("parent_object_id", "child_object_id", "child_class_id")
        } else {
            ("child_object_id", "parent_object_id", "parent_class_id")
        };
        let mut sql = format!(
            r#"select o."object_id", o."class_id", o."name",
                      o."category_id", o."guid", o."description"
               from "membership" m
               join "object" o on o."object_id" = m."{other_side}"
               where m."{own_side}" = ?"#
        );
        if class_filter.is_some() {
            sql.push_str(&format!(r#" and m."{other_class}" = ?"#));
        }
        sql.push_str(r#" order by m."membership_id""#);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match class_filter {
            Some(class_id) => stmt
                .query_map(params![object_id, class_id], object_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map(params![object_id], object_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }

    pub fn memberships_of_parent(&self, parent_object_id: Id) -> Result<Vec<MembershipRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "membership_id", "parent_class_id", "parent_object_id",
                      "collection_id", "child_class_id", "child_object_id"
               from "membership" where "parent_object_id" = ?
               order by "membership_id""#,
        )?;
        let rows = stmt
            .query_map(params![parent_object_id], membership_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn memberships_of_child(&self, child_object_id: Id) -> Result<Vec<MembershipRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "membership_id", "parent_class_id", "parent_object_id",
                      "collection_id", "child_class_id", "child_object_id"
               from "membership" where "child_object_id" = ?
               order by "membership_id""#,
        )?;
        let rows = stmt
            .query_map(params![child_object_id], membership_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn all_memberships(&self) -> Result<Vec<MembershipRow>> {
        let mut stmt = self.conn.prepare(
            r#"select "membership_id", "parent_class_id", "parent_object_id",
                      "collection_id", "child_class_id", "child_object_id"
               from "membership" order by "membership_id""#,
        )?;
        let rows = stmt
            .query_map([], membership_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Total number of model rows, across every table but meta.
    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            r#"select (select count(*) from "class")
                    + (select count(*) from "category")
                    + (select count(*) from "collection")
                    + (select count(*) from "attribute")
                    + (select count(*) from "object")
                    + (select count(*) from "attribute_data")
                    + (select count(*) from "membership")"#,
            [],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }

    // ------------- existence helpers -------------
    fn require_class(&self, class_id: Id) -> Result<ClassRow> {
        self.class_by_id(class_id)?
            .ok_or_else(|| ModelkitError::Integrity(format!("no such class {class_id}")))
    }

    fn require_object(&self, object_id: Id) -> Result<ObjectRow> {
        self.object_by_id(object_id)?
            .ok_or_else(|| ModelkitError::Integrity(format!("no such object {object_id}")))
    }
}

// ------------- row mappers -------------
fn class_from_row(r: &rusqlite::Row) -> rusqlite::Result<ClassRow> {
    Ok(ClassRow {
        class_id: r.get(0)?,
        name: r.get(1)?,
        class_group_id: r.get(2)?,
    })
}

fn category_from_row(r: &rusqlite::Row) -> rusqlite::Result<CategoryRow> {
    Ok(CategoryRow {
        category_id: r.get(0)?,
        class_id: r.get(1)?,
        rank: r.get(2)?,
        name: r.get(3)?,
    })
}

fn collection_from_row(r: &rusqlite::Row) -> rusqlite::Result<CollectionRow> {
    Ok(CollectionRow {
        collection_id: r.get(0)?,
        parent_class_id: r.get(1)?,
        child_class_id: r.get(2)?,
        name: r.get(3)?,
        complement_name: r.get(4)?,
    })
}

fn attribute_def_from_row(r: &rusqlite::Row) -> rusqlite::Result<AttributeDefRow> {
    Ok(AttributeDefRow {
        attribute_id: r.get(0)?,
        class_id: r.get(1)?,
        enum_id: r.get(2)?,
        name: r.get(3)?,
        description: r.get(4)?,
        default_value: r.get(5)?,
    })
}

fn object_from_row(r: &rusqlite::Row) -> rusqlite::Result<ObjectRow> {
    Ok(ObjectRow {
        object_id: r.get(0)?,
        class_id: r.get(1)?,
        name: r.get(2)?,
        category_id: r.get(3)?,
        guid: r.get(4)?,
        description: r.get(5)?,
    })
}

fn membership_from_row(r: &rusqlite::Row) -> rusqlite::Result<MembershipRow> {
    Ok(MembershipRow {
        membership_id: r.get(0)?,
        parent_class_id: r.get(1)?,
        parent_object_id: r.get(2)?,
        collection_id: r.get(3)?,
        child_class_id: r.get(4)?,
        child_object_id: r.get(5)?,
    })
}
