//! Default specifications: what an attribute falls back to and how that value is produced.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::datatype::Value;
use crate::error::Result;
use crate::record::Record;

/// A per-instance default. Receives the record under construction, which already
/// carries every default declared before this one.
pub type ComputeFn = Arc<dyn Fn(&dyn Record) -> Result<Value> + Send + Sync>;

/// Wraps a closure as a [`ComputeFn`].
pub fn computed<F>(f: F) -> ComputeFn
where
    F: Fn(&dyn Record) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub enum DefaultSource {
    Static(Value),
    Computed(ComputeFn),
}

impl DefaultSource {
    pub fn evaluate(&self, record: &dyn Record) -> Result<Value> {
        match self {
            DefaultSource::Static(value) => Ok(value.duplicate()),
            DefaultSource::Computed(f) => f(record),
        }
    }
    pub fn is_computed(&self) -> bool {
        matches!(self, DefaultSource::Computed(_))
    }
    /// The literal for static defaults.
    pub fn static_value(&self) -> Option<&Value> {
        match self {
            DefaultSource::Static(value) => Some(value),
            DefaultSource::Computed(_) => None,
        }
    }
}

impl fmt::Debug for DefaultSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DefaultSource::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultSource::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DefaultSpec {
    attribute: String,
    source: DefaultSource,
    allows_nil: bool,
}

impl DefaultSpec {
    pub fn new(attribute: String, source: DefaultSource, allows_nil: bool) -> Self {
        Self {
            attribute,
            source,
            allows_nil,
        }
    }
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
    pub fn source(&self) -> &DefaultSource {
        &self.source
    }
    pub fn allows_nil(&self) -> bool {
        self.allows_nil
    }
    pub fn evaluate(&self, record: &dyn Record) -> Result<Value> {
        self.source.evaluate(record)
    }
}

/// The structured form of a declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultOptions {
    /// `None` when no value was given at all; an explicit nil is `Some(Value::Nil)`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default = "default_true")]
    pub allows_nil: bool,
}

fn default_true() -> bool {
    true
}

// a key that is present, even if null, carries a value
fn present<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

impl Default for DefaultOptions {
    fn default() -> Self {
        Self {
            value: None,
            allows_nil: default_true(),
        }
    }
}

impl DefaultOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
    pub fn allows_nil(mut self, allows_nil: bool) -> Self {
        self.allows_nil = allows_nil;
        self
    }
}

/// The positional configuration of a declaration: nothing, a bare value, or options.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DefaultConfig {
    #[default]
    Omitted,
    Value(Value),
    Options(DefaultOptions),
}

impl From<DefaultOptions> for DefaultConfig {
    fn from(options: DefaultOptions) -> Self {
        DefaultConfig::Options(options)
    }
}

impl From<Value> for DefaultConfig {
    fn from(value: Value) -> Self {
        DefaultConfig::Value(value)
    }
}

/// One entry of a batch declaration.
#[derive(Clone)]
pub enum Declaration {
    Value(Value),
    Options(DefaultOptions),
    Computed(ComputeFn),
}

impl Declaration {
    pub fn value(value: impl Into<Value>) -> Self {
        Declaration::Value(value.into())
    }
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&dyn Record) -> Result<Value> + Send + Sync + 'static,
    {
        Declaration::Computed(computed(f))
    }
    pub(crate) fn split(self) -> (DefaultConfig, Option<ComputeFn>) {
        match self {
            Declaration::Value(value) => (DefaultConfig::Value(value), None),
            Declaration::Options(options) => (DefaultConfig::Options(options), None),
            Declaration::Computed(f) => (DefaultConfig::Omitted, Some(f)),
        }
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Declaration::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Declaration::Options(options) => f.debug_tuple("Options").field(options).finish(),
            Declaration::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Resolves what a declaration means: the function wins over any value, a bare
/// value is `{ value }`, and having neither is a usage error (returned as `None`).
pub(crate) fn resolve_source(
    config: DefaultConfig,
    compute: Option<ComputeFn>,
) -> Option<(DefaultSource, bool)> {
    let (value, allows_nil) = match config {
        DefaultConfig::Omitted => (None, true),
        DefaultConfig::Value(value) => (Some(value), true),
        DefaultConfig::Options(options) => (options.value, options.allows_nil),
    };
    match (compute, value) {
        (Some(f), _) => Some((DefaultSource::Computed(f), allows_nil)),
        (None, Some(value)) => Some((DefaultSource::Static(value), allows_nil)),
        (None, None) => None,
    }
}
