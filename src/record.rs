//! The narrow view of a host record that default resolution needs.
//!
//! Nothing here knows about queries, associations or storage engines. A host
//! model implements [`Record`] and calls [`crate::resolve::apply_defaults`] once
//! its attribute storage is populated, either right after construction or right
//! after hydration from storage.

use crate::datatype::{AttributeMap, ColumnType, Value};
use crate::error::Result;

pub trait Record {
    /// Name of the model this record is an instance of, as known to the catalog.
    fn model_name(&self) -> &str;

    fn is_new_record(&self) -> bool;

    /// Type of the storage column backing `attribute`, or `None` when the attribute
    /// has no storage slot (virtual attributes, plain instance state).
    fn column_type(&self, attribute: &str) -> Option<ColumnType>;

    /// Current value in column storage.
    fn read_attribute(&self, attribute: &str) -> Option<&Value>;

    /// Value returned by the attribute's getter, or `None` when no getter exists.
    fn read_getter(&self, attribute: &str) -> Option<Value>;

    /// Instance-local state for attributes with neither a column nor a getter.
    fn read_instance_slot(&self, attribute: &str) -> Option<&Value>;

    /// Assigns through the attribute's setter, with whatever write protection the host applies.
    fn write_attribute(&mut self, attribute: &str, value: Value) -> Result<()>;

    /// Whether `attribute` was written since construction began, even with the value
    /// it already held, or `None` if the host does not track changes for it. `false`
    /// on a new record means the column still holds its untouched storage default.
    fn attribute_changed(&self, attribute: &str) -> Option<bool>;

    fn clear_change_flag(&mut self, attribute: &str);

    /// The attributes handed to the constructor, before any sanitization.
    fn raw_construction_input(&self) -> Option<&AttributeMap>;

    /// Whether the model accepts `{attribute}_attributes` as a nested writer.
    fn nested_attribute_writer_exists(&self, attribute: &str) -> bool;

    /// Public read as a default function sees it: getter first, then column
    /// storage, then instance state.
    fn read(&self, attribute: &str) -> Value {
        if let Some(value) = self.read_getter(attribute) {
            return value;
        }
        if self.column_type(attribute).is_some() {
            return self.read_attribute(attribute).cloned().unwrap_or_default();
        }
        self.read_instance_slot(attribute).cloned().unwrap_or_default()
    }
}
