//! A small in-memory record model that hosts default resolution.
//!
//! [`Schema`] describes a model the way a record layer would: typed columns with
//! storage-level defaults, virtual attributes, plain instance state, attributes
//! protected from mass assignment and nested-attribute writers. [`Instance`] is a
//! record of such a schema. It tracks changes, keeps the raw constructor input and
//! implements [`Record`], so constructing or loading one runs
//! [`apply_defaults`] as the last step.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use crate::catalog::Catalog;
use crate::datatype::{AttributeMap, ColumnType, Value};
use crate::error::{DefaulterError, Result};
use crate::record::Record;
use crate::resolve::{apply_defaults, split_multiparameter};

pub type Getter = Arc<dyn Fn(&Instance) -> Value + Send + Sync>;
pub type Setter = Arc<dyn Fn(&mut Instance, Value) -> Result<()> + Send + Sync>;
/// Decides whether mass assignment may write an attribute.
pub type WritablePredicate = Arc<dyn Fn(&Schema, &str, AssignmentScope) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentScope {
    Protected,
    WithoutProtection,
}

// ------------- Column -------------
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    default: Value, // what the storage layer fills in for new rows
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }
    pub fn default(&self) -> &Value {
        &self.default
    }
}

#[derive(Clone)]
struct Accessor {
    getter: Getter,
    setter: Setter,
}

// ------------- Schema -------------
#[derive(Clone)]
pub struct Schema {
    name: String,
    parent: Option<String>,
    columns: IndexMap<String, Column>,
    accessors: IndexMap<String, Accessor>,
    // instance state; `true` when it can be read back
    slots: IndexMap<String, bool>,
    protected: IndexSet<String>,
    nested: IndexSet<String>,
    writable: Option<WritablePredicate>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            columns: IndexMap::new(),
            accessors: IndexMap::new(),
            slots: IndexMap::new(),
            protected: IndexSet::new(),
            nested: IndexSet::new(),
            writable: None,
        }
    }
    /// A subclass sharing this schema's storage and attribute methods.
    pub fn subclass(&self, name: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.name = name.into();
        child.parent = Some(self.name.clone());
        child
    }
    pub fn column(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_with_default(name, column_type, Value::Nil)
    }
    pub fn column_with_default(
        mut self,
        name: impl Into<String>,
        column_type: ColumnType,
        default: impl Into<Value>,
    ) -> Self {
        let name = name.into();
        let default = column_type.cast(default.into());
        self.columns.insert(
            name.clone(),
            Column {
                name,
                column_type,
                default,
            },
        );
        self
    }
    /// A virtual attribute backed by a getter and a setter.
    pub fn accessor<G, S>(mut self, name: impl Into<String>, getter: G, setter: S) -> Self
    where
        G: Fn(&Instance) -> Value + Send + Sync + 'static,
        S: Fn(&mut Instance, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.accessors.insert(
            name.into(),
            Accessor {
                getter: Arc::new(getter),
                setter: Arc::new(setter),
            },
        );
        self
    }
    /// Plain instance state with a getter and a setter.
    pub fn slot(mut self, name: impl Into<String>) -> Self {
        self.slots.insert(name.into(), true);
        self
    }
    /// Write-only instance state.
    pub fn write_only_slot(mut self, name: impl Into<String>) -> Self {
        self.slots.insert(name.into(), false);
        self
    }
    pub fn protect(mut self, name: impl Into<String>) -> Self {
        self.protected.insert(name.into());
        self
    }
    /// Accepts `{name}_attributes` in mass assignment and stores it as `name`.
    pub fn accepts_nested_attributes_for(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.slots.contains_key(&name) && !self.columns.contains_key(&name) {
            self.slots.insert(name.clone(), true);
        }
        self.nested.insert(name);
        self
    }
    /// Replaces the protected-list policy with a custom predicate.
    pub fn writable_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Schema, &str, AssignmentScope) -> bool + Send + Sync + 'static,
    {
        self.writable = Some(Arc::new(predicate));
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
    pub fn column_named(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }
    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(name)
    }
    pub fn accepts_nested_attributes(&self, name: &str) -> bool {
        self.nested.contains(name)
    }
    pub fn is_writable(&self, name: &str, scope: AssignmentScope) -> bool {
        match &self.writable {
            Some(predicate) => predicate(self, name, scope),
            None => scope == AssignmentScope::WithoutProtection || !self.is_protected(name),
        }
    }
    /// Registers this schema's model (and its parent link) with the catalog.
    pub fn define_in(&self, catalog: &mut Catalog) -> Result<()> {
        catalog.define_model(self.name.as_str(), self.parent())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("columns", &self.columns.keys().collect::<Vec<_>>())
            .field("accessors", &self.accessors.keys().collect::<Vec<_>>())
            .field("slots", &self.slots.keys().collect::<Vec<_>>())
            .field("protected", &self.protected)
            .field("nested", &self.nested)
            .finish()
    }
}

// ------------- Instance -------------
type Block<'a> = Box<dyn FnOnce(&mut Instance) -> Result<()> + 'a>;

pub struct InstanceBuilder<'a> {
    schema: Arc<Schema>,
    attributes: Option<&'a AttributeMap>,
    scope: AssignmentScope,
    block: Option<Block<'a>>,
}

impl<'a> InstanceBuilder<'a> {
    pub fn attributes(mut self, attributes: &'a AttributeMap) -> Self {
        self.attributes = Some(attributes);
        self
    }
    pub fn without_protection(mut self) -> Self {
        self.scope = AssignmentScope::WithoutProtection;
        self
    }
    /// Runs `block` after mass assignment and before defaults are resolved.
    pub fn with_block<F>(mut self, block: F) -> Self
    where
        F: FnOnce(&mut Instance) -> Result<()> + 'a,
    {
        self.block = Some(Box::new(block));
        self
    }
    pub fn build(self, catalog: &Catalog) -> Result<Instance> {
        let mut instance = Instance::fresh(self.schema);
        if let Some(input) = self.attributes {
            instance.raw_input = Some(input.clone());
            instance.assign_attributes(input, self.scope)?;
        }
        if let Some(block) = self.block {
            block(&mut instance)?;
        }
        apply_defaults(catalog, &mut instance)?;
        Ok(instance)
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    schema: Arc<Schema>,
    id: Option<i64>,
    new_record: bool,
    attributes: AttributeMap,
    slots: AttributeMap,
    // attribute -> value before the first unsaved change
    changes: AttributeMap,
    // columns written since construction began, whatever the value
    assigned: IndexSet<String>,
    raw_input: Option<AttributeMap>,
}

impl Instance {
    pub fn builder<'a>(schema: &Arc<Schema>) -> InstanceBuilder<'a> {
        InstanceBuilder {
            schema: Arc::clone(schema),
            attributes: None,
            scope: AssignmentScope::Protected,
            block: None,
        }
    }
    /// Constructs a new record from `attributes`, then resolves its defaults.
    pub fn new(catalog: &Catalog, schema: &Arc<Schema>, attributes: &AttributeMap) -> Result<Self> {
        Self::builder(schema).attributes(attributes).build(catalog)
    }
    /// Rebuilds a persisted record from stored column values, then resolves its defaults.
    pub fn load(catalog: &Catalog, schema: &Arc<Schema>, id: i64, stored: AttributeMap) -> Result<Self> {
        let mut attributes = AttributeMap::new();
        for column in schema.columns() {
            attributes.insert(column.name.clone(), Value::Nil);
        }
        for (name, value) in stored {
            if let Some(column) = schema.column_named(&name) {
                attributes.insert(name, column.column_type.cast(value));
            }
        }
        let mut instance = Self {
            schema: Arc::clone(schema),
            id: Some(id),
            new_record: false,
            attributes,
            slots: AttributeMap::new(),
            changes: AttributeMap::new(),
            assigned: IndexSet::new(),
            raw_input: None,
        };
        apply_defaults(catalog, &mut instance)?;
        Ok(instance)
    }
    fn fresh(schema: Arc<Schema>) -> Self {
        let attributes = schema
            .columns()
            .map(|c| (c.name.clone(), c.default.clone()))
            .collect();
        Self {
            schema,
            id: None,
            new_record: true,
            attributes,
            slots: AttributeMap::new(),
            changes: AttributeMap::new(),
            assigned: IndexSet::new(),
            raw_input: None,
        }
    }
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
    pub fn id(&self) -> Option<i64> {
        self.id
    }
    pub fn is_persisted(&self) -> bool {
        !self.new_record
    }
    /// Column storage.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
    pub fn get(&self, name: &str) -> Value {
        self.read(name)
    }
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.write_attribute(name, value.into())
    }
    /// In-place access to a stored value. Mutations made through it are not tracked.
    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Value> {
        if self.schema.column_named(name).is_some() {
            self.attributes.get_mut(name)
        } else {
            self.slots.get_mut(name)
        }
    }
    pub fn changed(&self) -> Vec<&str> {
        self.changes.keys().map(String::as_str).collect()
    }
    pub fn is_changed(&self) -> bool {
        !self.changes.is_empty()
    }
    /// The value before the first unsaved change, when `name` has changed.
    pub fn attribute_was(&self, name: &str) -> Option<&Value> {
        self.changes.get(name)
    }
    pub(crate) fn mark_persisted(&mut self, id: i64) {
        self.id = Some(id);
        self.new_record = false;
        self.changes.clear();
        self.assigned.clear();
    }
    /// Sanitizes `input` and assigns what is left, in order.
    pub fn assign_attributes(&mut self, input: &AttributeMap, scope: AssignmentScope) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let mut multiparameter: IndexMap<String, BTreeMap<usize, Value>> = IndexMap::new();
        for (key, value) in input {
            let target = split_multiparameter(key).map_or(key.as_str(), |(name, _)| name);
            if !schema.is_writable(target, scope) {
                warn!(model = schema.name(), attribute = target, "protected from mass assignment");
                continue;
            }
            if let Some((name, index)) = split_multiparameter(key) {
                multiparameter
                    .entry(name.to_string())
                    .or_default()
                    .insert(index, value.clone());
                continue;
            }
            if let Some(base) = key.strip_suffix("_attributes") {
                if schema.accepts_nested_attributes(base) {
                    self.slots.insert(base.to_string(), value.clone());
                    continue;
                }
            }
            self.write_attribute(key, value.clone())?;
        }
        for (name, parts) in multiparameter {
            let value = self.assemble(&name, parts)?;
            self.write_attribute(&name, value)?;
        }
        Ok(())
    }
    // builds one value out of `name(1i)`, `name(2i)`, ... components
    fn assemble(&self, name: &str, parts: BTreeMap<usize, Value>) -> Result<Value> {
        let invalid = |message: String| DefaulterError::InvalidAssignment {
            model: self.schema.name().to_string(),
            attribute: name.to_string(),
            message,
        };
        let column_type = self
            .schema
            .column_named(name)
            .map(Column::column_type)
            .ok_or_else(|| invalid("multiparameter assignment needs a column".to_string()))?;
        if column_type != ColumnType::Timestamp {
            return match parts.into_iter().next() {
                Some((_, value)) => Ok(column_type.cast(value)),
                None => Ok(Value::Nil),
            };
        }
        if parts.values().all(Value::is_blank) {
            return Ok(Value::Nil);
        }
        let component = |index: usize, fallback: i64| -> Result<i64> {
            match parts.get(&index) {
                None => Ok(fallback),
                Some(value) => match ColumnType::Integer.cast(value.clone()) {
                    Value::Integer(i) => Ok(i),
                    Value::Nil => Ok(fallback),
                    other => Err(invalid(format!("component {} is not a number: {}", index, other))),
                },
            }
        };
        let (year, month, day) = (component(1, 1)?, component(2, 1)?, component(3, 1)?);
        let (hour, minute, second) = (component(4, 0)?, component(5, 0)?, component(6, 0)?);
        let out_of_range = || invalid("date components out of range".to_string());
        let date = NaiveDate::from_ymd_opt(
            i32::try_from(year).map_err(|_| out_of_range())?,
            u32::try_from(month).map_err(|_| out_of_range())?,
            u32::try_from(day).map_err(|_| out_of_range())?,
        )
        .ok_or_else(out_of_range)?;
        let moment = date
            .and_hms_opt(
                u32::try_from(hour).map_err(|_| out_of_range())?,
                u32::try_from(minute).map_err(|_| out_of_range())?,
                u32::try_from(second).map_err(|_| out_of_range())?,
            )
            .ok_or_else(out_of_range)?;
        Ok(Value::Timestamp(moment))
    }
}

impl Record for Instance {
    fn model_name(&self) -> &str {
        self.schema.name()
    }
    fn is_new_record(&self) -> bool {
        self.new_record
    }
    fn column_type(&self, attribute: &str) -> Option<ColumnType> {
        self.schema.column_named(attribute).map(Column::column_type)
    }
    fn read_attribute(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }
    fn read_getter(&self, attribute: &str) -> Option<Value> {
        if let Some(accessor) = self.schema.accessors.get(attribute) {
            return Some((accessor.getter)(self));
        }
        match self.schema.slots.get(attribute) {
            Some(true) => Some(self.slots.get(attribute).cloned().unwrap_or_default()),
            _ => None,
        }
    }
    fn read_instance_slot(&self, attribute: &str) -> Option<&Value> {
        self.slots.get(attribute)
    }
    fn write_attribute(&mut self, attribute: &str, value: Value) -> Result<()> {
        if let Some(column) = self.schema.column_named(attribute) {
            let value = column.column_type.cast(value);
            let current = self.attributes.get(attribute).cloned().unwrap_or_default();
            let original = self.changes.get(attribute).cloned();
            match original {
                Some(original) if original == value => {
                    self.changes.shift_remove(attribute);
                }
                Some(_) => {}
                None if current != value => {
                    self.changes.insert(attribute.to_string(), current);
                }
                None => {}
            }
            self.attributes.insert(attribute.to_string(), value);
            self.assigned.insert(attribute.to_string());
            return Ok(());
        }
        if let Some(accessor) = self.schema.accessors.get(attribute) {
            let setter = Arc::clone(&accessor.setter);
            return setter(self, value);
        }
        if self.schema.slots.contains_key(attribute) {
            self.slots.insert(attribute.to_string(), value);
            return Ok(());
        }
        Err(DefaulterError::UnknownAttribute {
            model: self.schema.name().to_string(),
            attribute: attribute.to_string(),
        })
    }
    // a write of the storage default itself still counts as touching the column
    fn attribute_changed(&self, attribute: &str) -> Option<bool> {
        self.schema
            .column_named(attribute)
            .map(|_| self.changes.contains_key(attribute) || self.assigned.contains(attribute))
    }
    fn clear_change_flag(&mut self, attribute: &str) {
        self.changes.shift_remove(attribute);
        self.assigned.shift_remove(attribute);
    }
    fn raw_construction_input(&self) -> Option<&AttributeMap> {
        self.raw_input.as_ref()
    }
    fn nested_attribute_writer_exists(&self, attribute: &str) -> bool {
        self.schema.accepts_nested_attributes(attribute)
    }
}
