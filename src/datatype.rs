// used for persistence
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

// used for timestamps
use chrono::{NaiveDate, NaiveDateTime};
// maps keep their insertion order, like the attribute hashes they model
use indexmap::IndexMap;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

// used to print out readable forms of a value
use std::fmt;

use crate::error::{DefaulterError, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Attribute name to value, in assignment order.
pub type AttributeMap = IndexMap<String, Value>;

/// Builds an [`AttributeMap`] from `name => value` pairs.
///
/// ```
/// use defaulter::attributes;
/// let attrs = attributes! { "number" => 1, "title" => "Dune" };
/// assert_eq!(attrs.len(), 2);
/// ```
#[macro_export]
macro_rules! attributes {
    () => { $crate::datatype::AttributeMap::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::datatype::AttributeMap::new();
        $( map.insert(::std::string::String::from($name), $crate::datatype::Value::from($value)); )+
        map
    }};
}

/// A dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    List(Vec<Value>),
    Map(AttributeMap),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
    /// Nil, `false`, whitespace-only text and empty collections are blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Bool(b) => !b,
            Value::Text(s) => s.trim().is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            Value::Integer(_) | Value::Float(_) | Value::Timestamp(_) => false,
        }
    }
    /// Whether handing out this value could let one holder mutate what another holds.
    pub fn is_duplicable(&self) -> bool {
        matches!(self, Value::Text(_) | Value::List(_) | Value::Map(_))
    }
    /// Text and containers come back as an independent deep copy so no two holders share
    /// storage; scalars are plain copies.
    pub fn duplicate(&self) -> Value {
        self.clone()
    }
    pub fn data_type(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Text(_) => "Text",
            Value::Timestamp(_) => "Timestamp",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }
    // counterpart of the data type tag written next to every persisted value
    pub fn convert(value: ValueRef<'_>, data_type: &str) -> Result<Value> {
        if let ValueRef::Null = value {
            return Ok(Value::Nil);
        }
        let corrupt = |e: &dyn fmt::Display| DefaulterError::DataCorruption {
            message: format!("cannot read {} value: {}", data_type, e),
        };
        let converted = match data_type {
            "Nil" => Value::Nil,
            "Bool" => Value::Bool(value.as_i64().map_err(|e| corrupt(&e))? != 0),
            "Integer" => Value::Integer(value.as_i64().map_err(|e| corrupt(&e))?),
            "Float" => Value::Float(value.as_f64().map_err(|e| corrupt(&e))?),
            "Text" => Value::Text(value.as_str().map_err(|e| corrupt(&e))?.to_string()),
            "Timestamp" => {
                let text = value.as_str().map_err(|e| corrupt(&e))?;
                Value::Timestamp(
                    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).map_err(|e| corrupt(&e))?,
                )
            }
            "List" | "Map" => serde_json::from_str(value.as_str().map_err(|e| corrupt(&e))?)?,
            unknown => {
                return Err(DefaulterError::DataCorruption {
                    message: format!("unknown data type '{}'", unknown),
                });
            }
        };
        Ok(converted)
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
    pub fn as_map(&self) -> Option<&AttributeMap> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
    pub fn as_map_mut(&mut self) -> Option<&mut AttributeMap> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Nil => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Integer(i) => SqlValue::Integer(*i),
            Value::Float(x) => SqlValue::Real(*x),
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Timestamp(t) => SqlValue::Text(t.format(TIMESTAMP_FORMAT).to_string()),
            Value::List(_) | Value::Map(_) => SqlValue::Text(
                serde_json::to_string(self)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
            ),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(t) => serializer.serialize_str(&t.format(TIMESTAMP_FORMAT).to_string()),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a nil, boolean, number, string, list or map")
    }
    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }
    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Integer(v))
    }
    fn visit_i128<E: de::Error>(self, v: i128) -> std::result::Result<Value, E> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {} out of range", v)))
    }
    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {} out of range", v)))
    }
    fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<Value, E> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {} out of range", v)))
    }
    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Float(v))
    }
    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }
    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::Text(v))
    }
    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Nil)
    }
    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Nil)
    }
    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(d)
    }
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut entries = AttributeMap::new();
        while let Some((k, v)) = map.next_entry::<String, Value>()? {
            entries.insert(k, v);
        }
        Ok(Value::Map(entries))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Value, D::Error> {
        d.deserialize_any(ValueVisitor)
    }
}

// ------------- Conversions --------------
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}
impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
impl From<NaiveDateTime> for Value {
    fn from(t: NaiveDateTime) -> Self {
        Value::Timestamp(t)
    }
}
impl From<AttributeMap> for Value {
    fn from(entries: AttributeMap) -> Self {
        Value::Map(entries)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

// ------------- Column Types --------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    String,
    Text,
    Timestamp,
    Json,
    Other,
}

impl ColumnType {
    pub fn is_boolean(self) -> bool {
        self == ColumnType::Boolean
    }
    /// Coerces an assigned value to the column's type where the conversion is obvious,
    /// leaving anything else untouched.
    pub fn cast(self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Nil) => Value::Nil,
            (ColumnType::Boolean, Value::Text(s)) => match s.trim() {
                "" => Value::Nil,
                "1" | "t" | "true" | "TRUE" | "on" => Value::Bool(true),
                "0" | "f" | "false" | "FALSE" | "off" => Value::Bool(false),
                _ => Value::Text(s),
            },
            (ColumnType::Boolean, Value::Integer(i)) => Value::Bool(i != 0),
            (ColumnType::Integer, Value::Text(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) if s.trim().is_empty() => Value::Nil,
                Err(_) => Value::Text(s),
            },
            (ColumnType::Float, Value::Integer(i)) => Value::Float(i as f64),
            (ColumnType::Float, Value::Text(s)) => match s.trim().parse::<f64>() {
                Ok(x) => Value::Float(x),
                Err(_) => Value::Text(s),
            },
            (ColumnType::String | ColumnType::Text, Value::Integer(i)) => Value::Text(i.to_string()),
            (ColumnType::String | ColumnType::Text, Value::Float(x)) => Value::Text(x.to_string()),
            (ColumnType::String | ColumnType::Text, Value::Bool(b)) => Value::Text(b.to_string()),
            (ColumnType::Timestamp, Value::Text(s)) => parse_timestamp(&s).map_or(Value::Text(s), Value::Timestamp),
            (_, value) => value,
        }
    }
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
