//! # modelkit
//!
//! Loads tree-shaped engineering model documents into a relational
//! store, lets a caller inspect and mutate the model through a
//! dictionary-style façade, and writes the result back out as a
//! document equivalent to the input.
//!
//! The pieces, in the order data flows through them:
//!
//! * [`sanitize`] removes characters the document format forbids.
//! * [`document`] parses records out of the document and maps them to
//!   rows, and serializes rows back to a document.
//! * [`store`] owns the SQLite schema and enforces referential
//!   integrity on every mutation.
//! * [`facade`] resolves names to ids and exposes classes, objects,
//!   attributes, categories, and parent/child relationships.
//! * [`runlength`] compresses per-interval sample series into runs.
//!
//! ```no_run
//! use modelkit::document::{self, LoadOptions};
//! use modelkit::facade::ModelDict;
//! use modelkit::store::PersistenceMode;
//!
//! # fn main() -> modelkit::error::Result<()> {
//! let (store, report) = document::load_path(
//!     "model.xml",
//!     PersistenceMode::InMemory,
//!     LoadOptions::default(),
//! )?;
//! println!("loaded {} rows", report.rows);
//! let dict = ModelDict::new(store)?;
//! dict.class("Model")?.object("Base")?.set("Enabled", -1)?;
//! dict.save("model_out.xml")?;
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod facade;
pub mod runlength;
pub mod sanitize;
pub mod store;
