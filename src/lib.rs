//! Defaulter – declarative default attribute values for record models.
//!
//! A model declares, per attribute, what a record should fall back to when the
//! attribute was left blank. Defaults are either a static value or a function of
//! the record under construction. They are resolved right after a record is
//! built and, for those declared with `allows_nil = false`, every time a record is
//! loaded from storage.
//!
//! * A [`catalog::Catalog`] owns one [`registry::Registry`] per model and the
//!   inheritance-merged [`registry::EffectiveSpecSet`] derived from it. Subclasses
//!   see their parents' defaults and may override them in place.
//! * The [`record::Record`] trait is the narrow view of a host record that
//!   resolution needs: reads, writes, change flags and the raw constructor input.
//! * [`resolve::apply_defaults`] walks the effective defaults in order and writes
//!   every one that applies.
//!
//! ## Modules
//! * [`datatype`] – The dynamic [`datatype::Value`] and column types.
//! * [`default`] – Default specifications and the declaration forms.
//! * [`registry`] – Per-model registries and the inheritance merge.
//! * [`catalog`] – Models, declarations and cached effective defaults.
//! * [`record`] – The host record contract.
//! * [`resolve`] – Construction-time and load-time application.
//! * [`model`] – A reference host: schemas and instances with change tracking.
//! * [`persist`] – SQLite persistence for reference-host records.
//! * [`settings`] – Declaring models and defaults from a settings file.
//! * [`logging`] – Subscriber setup for the `tracing` output.
//! * [`matcher`] – Assertions over declared defaults.
//!
//! ## Resolution
//! A default applies to an attribute when
//! 1. the record is new, or nil is disallowed for the attribute,
//! 2. the attribute is blank (an explicit `false` in a boolean column is not), or on
//!    a new record it still carries an untouched storage-level default,
//! 3. and, unless nil is disallowed, the caller did not name the attribute in the
//!    constructor input.
//!
//! Static values are duplicated per record, so mutating one record's default never
//! leaks into another. Functions receive the record with every earlier default
//! already applied.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use defaulter::{attributes, Catalog, ColumnType, DefaultOptions, Instance, Schema, Value};
//!
//! let book = Arc::new(
//!     Schema::new("Book")
//!         .column("title", ColumnType::String)
//!         .column("pages", ColumnType::Integer)
//!         .column("summary", ColumnType::Text),
//! );
//! let mut catalog = Catalog::new();
//! book.define_in(&mut catalog).unwrap();
//! catalog.default_value_for("Book", "title", "Untitled").unwrap();
//! catalog
//!     .default_value_with("Book", "pages", DefaultOptions::new().value(1).allows_nil(false))
//!     .unwrap();
//! catalog
//!     .default_value_by("Book", "summary", |record| {
//!         Ok(Value::from(format!("{} ({} pages)", record.read("title"), record.read("pages"))))
//!     })
//!     .unwrap();
//!
//! let dune = Instance::new(&catalog, &book, &attributes! { "title" => "Dune" }).unwrap();
//! assert_eq!(dune.get("title"), Value::from("Dune"));
//! assert_eq!(dune.get("pages"), Value::Integer(1));
//! assert_eq!(dune.get("summary"), Value::from("Dune (1 pages)"));
//! ```

pub mod catalog;
pub mod datatype;
pub mod default;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod persist;
pub mod record;
pub mod registry;
pub mod resolve;
pub mod settings;

pub use catalog::Catalog;
pub use datatype::{AttributeMap, ColumnType, Value};
pub use default::{computed, ComputeFn, Declaration, DefaultConfig, DefaultOptions, DefaultSpec};
pub use error::{DefaulterError, Result};
pub use model::{AssignmentScope, Instance, Schema};
pub use persist::{PersistenceMode, Persistor};
pub use record::Record;
pub use resolve::apply_defaults;
