//! Structured value tree
//!
//! Metadata and data-event payloads are trees of [`StructuredValue`]. Maps and
//! lists are cases of the value enum (not subtypes of it), and cloning any value
//! produces a deep, independent copy.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Discriminant of a [`StructuredValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Null,
    String,
    Boolean,
    Date,
    Integer,
    Float,
    Double,
    Map,
    List,
}

/// A single metadata value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StructuredValue {
    /// Absent value
    #[default]
    Null,

    /// UTF-8 string
    String(String),

    /// Boolean
    Boolean(bool),

    /// Date as milliseconds since the Unix epoch
    Date(f64),

    /// Signed integer
    Integer(i64),

    /// Single-precision float
    Float(f32),

    /// Double-precision float
    Double(f64),

    /// String-keyed map
    Map(DataMap),

    /// Ordered, size-bounded list
    List(DataList),
}

impl StructuredValue {
    /// Date value for the current wall-clock time
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        StructuredValue::Date(millis)
    }

    /// The type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            StructuredValue::Null => ValueType::Null,
            StructuredValue::String(_) => ValueType::String,
            StructuredValue::Boolean(_) => ValueType::Boolean,
            StructuredValue::Date(_) => ValueType::Date,
            StructuredValue::Integer(_) => ValueType::Integer,
            StructuredValue::Float(_) => ValueType::Float,
            StructuredValue::Double(_) => ValueType::Double,
            StructuredValue::Map(_) => ValueType::Map,
            StructuredValue::List(_) => ValueType::List,
        }
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, StructuredValue::Null)
    }

    /// Integer value, or 0 if this is not an integer
    pub fn integer_value(&self) -> i64 {
        match self {
            StructuredValue::Integer(i) => *i,
            _ => 0,
        }
    }

    /// Double value, or 0.0 if this is not a double
    pub fn double_value(&self) -> f64 {
        match self {
            StructuredValue::Double(d) => *d,
            _ => 0.0,
        }
    }

    /// Float value, or 0.0 if this is not a float
    pub fn float_value(&self) -> f32 {
        match self {
            StructuredValue::Float(f) => *f,
            _ => 0.0,
        }
    }

    /// Boolean value, or false if this is not a boolean
    pub fn bool_value(&self) -> bool {
        matches!(self, StructuredValue::Boolean(true))
    }

    /// Any numeric case widened to f64
    pub fn as_number(&self) -> Option<f64> {
        match self {
            StructuredValue::Integer(i) => Some(*i as f64),
            StructuredValue::Float(f) => Some(*f as f64),
            StructuredValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StructuredValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a date (milliseconds since epoch)
    pub fn as_date(&self) -> Option<f64> {
        match self {
            StructuredValue::Date(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Try to get this value as a map reference
    pub fn as_map(&self) -> Option<&DataMap> {
        match self {
            StructuredValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Try to get this value as a mutable map reference
    pub fn as_map_mut(&mut self) -> Option<&mut DataMap> {
        match self {
            StructuredValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Try to get this value as a list reference
    pub fn as_list(&self) -> Option<&DataList> {
        match self {
            StructuredValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Try to get this value as a mutable list reference
    pub fn as_list_mut(&mut self) -> Option<&mut DataList> {
        match self {
            StructuredValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Get a property from a map value
    pub fn get(&self, key: &str) -> Option<&StructuredValue> {
        self.as_map()?.get(key)
    }
}

impl From<bool> for StructuredValue {
    fn from(v: bool) -> Self {
        StructuredValue::Boolean(v)
    }
}

impl From<i64> for StructuredValue {
    fn from(v: i64) -> Self {
        StructuredValue::Integer(v)
    }
}

impl From<i32> for StructuredValue {
    fn from(v: i32) -> Self {
        StructuredValue::Integer(v as i64)
    }
}

impl From<u32> for StructuredValue {
    fn from(v: u32) -> Self {
        StructuredValue::Integer(v as i64)
    }
}

impl From<f32> for StructuredValue {
    fn from(v: f32) -> Self {
        StructuredValue::Float(v)
    }
}

impl From<f64> for StructuredValue {
    fn from(v: f64) -> Self {
        StructuredValue::Double(v)
    }
}

impl From<String> for StructuredValue {
    fn from(v: String) -> Self {
        StructuredValue::String(v)
    }
}

impl From<&str> for StructuredValue {
    fn from(v: &str) -> Self {
        StructuredValue::String(v.to_string())
    }
}

impl From<DataMap> for StructuredValue {
    fn from(v: DataMap) -> Self {
        StructuredValue::Map(v)
    }
}

impl From<DataList> for StructuredValue {
    fn from(v: DataList) -> Self {
        StructuredValue::List(v)
    }
}

/// String-keyed map of values; keys are unique and order is not significant
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataMap {
    entries: HashMap<String, StructuredValue>,
}

impl DataMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map holding copies of the given entries
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<StructuredValue>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&StructuredValue> {
        self.entries.get(key)
    }

    /// Get a mutable value by key
    pub fn get_mut(&mut self, key: &str) -> Option<&mut StructuredValue> {
        self.entries.get_mut(key)
    }

    /// Insert or replace a value, returning the previous one
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<StructuredValue>,
    ) -> Option<StructuredValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Insert or replace a value; `None` removes the key
    pub fn set_item(&mut self, key: impl Into<String>, value: Option<StructuredValue>) {
        let key = key.into();
        match value {
            Some(v) => {
                self.entries.insert(key, v);
            }
            None => {
                self.entries.remove(&key);
            }
        }
    }

    pub fn set_integer(&mut self, key: impl Into<String>, value: i64) {
        self.set(key, StructuredValue::Integer(value));
    }

    pub fn set_double(&mut self, key: impl Into<String>, value: f64) {
        self.set(key, StructuredValue::Double(value));
    }

    pub fn set_float(&mut self, key: impl Into<String>, value: f32) {
        self.set(key, StructuredValue::Float(value));
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, StructuredValue::Boolean(value));
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: Option<&str>) {
        self.set_item(key, value.map(StructuredValue::from));
    }

    pub fn set_date(&mut self, key: impl Into<String>, millis: Option<f64>) {
        self.set_item(key, millis.map(StructuredValue::Date));
    }

    pub fn set_map(&mut self, key: impl Into<String>, value: Option<DataMap>) {
        self.set_item(key, value.map(StructuredValue::Map));
    }

    pub fn set_list(&mut self, key: impl Into<String>, value: Option<DataList>) {
        self.set_item(key, value.map(StructuredValue::List));
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &str) -> Option<StructuredValue> {
        self.entries.remove(key)
    }

    /// Get a string property
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Get any numeric property widened to f64
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_number()
    }

    /// Get an integer property
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            StructuredValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get a nested map property
    pub fn get_map(&self, key: &str) -> Option<&DataMap> {
        self.get(key)?.as_map()
    }

    /// Get a nested list property
    pub fn get_list(&self, key: &str) -> Option<&DataList> {
        self.get(key)?.as_list()
    }

    /// Iterate over entries in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StructuredValue)> {
        self.entries.iter()
    }

    /// Iterate over keys in unspecified order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

impl<'a> IntoIterator for &'a DataMap {
    type Item = (&'a String, &'a StructuredValue);
    type IntoIter = std::collections::hash_map::Iter<'a, String, StructuredValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Ordered list of values with a fixed maximum element count
///
/// Appending beyond [`DataList::MAX_SIZE`] fails and leaves the list unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataList {
    elements: Vec<StructuredValue>,
}

impl DataList {
    /// Maximum number of elements a list may hold
    pub const MAX_SIZE: usize = 1024;

    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list from existing elements
    ///
    /// Fails if there are more than [`DataList::MAX_SIZE`] elements.
    pub fn from_vec(elements: Vec<StructuredValue>) -> Result<Self> {
        if elements.len() > Self::MAX_SIZE {
            return Err(Error::ListCapacityExceeded {
                max: Self::MAX_SIZE,
            });
        }
        Ok(Self { elements })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Check if another element can be appended
    pub fn is_full(&self) -> bool {
        self.elements.len() >= Self::MAX_SIZE
    }

    /// Append a value
    pub fn push(&mut self, value: impl Into<StructuredValue>) -> Result<()> {
        if self.is_full() {
            return Err(Error::ListCapacityExceeded {
                max: Self::MAX_SIZE,
            });
        }
        self.elements.push(value.into());
        Ok(())
    }

    pub fn push_integer(&mut self, value: i64) -> Result<()> {
        self.push(StructuredValue::Integer(value))
    }

    pub fn push_double(&mut self, value: f64) -> Result<()> {
        self.push(StructuredValue::Double(value))
    }

    pub fn push_float(&mut self, value: f32) -> Result<()> {
        self.push(StructuredValue::Float(value))
    }

    pub fn push_bool(&mut self, value: bool) -> Result<()> {
        self.push(StructuredValue::Boolean(value))
    }

    pub fn push_string(&mut self, value: &str) -> Result<()> {
        self.push(StructuredValue::from(value))
    }

    pub fn push_date(&mut self, millis: f64) -> Result<()> {
        self.push(StructuredValue::Date(millis))
    }

    pub fn push_map(&mut self, value: DataMap) -> Result<()> {
        self.push(StructuredValue::Map(value))
    }

    pub fn push_list(&mut self, value: DataList) -> Result<()> {
        self.push(StructuredValue::List(value))
    }

    /// Get an element by index
    pub fn get(&self, index: usize) -> Option<&StructuredValue> {
        self.elements.get(index)
    }

    /// Get a mutable element by index
    pub fn get_mut(&mut self, index: usize) -> Option<&mut StructuredValue> {
        self.elements.get_mut(index)
    }

    /// Remove and return the element at `index`
    pub fn remove(&mut self, index: usize) -> Option<StructuredValue> {
        if index < self.elements.len() {
            Some(self.elements.remove(index))
        } else {
            None
        }
    }

    /// Iterate over elements in order
    pub fn iter(&self) -> std::slice::Iter<'_, StructuredValue> {
        self.elements.iter()
    }
}

impl<'a> IntoIterator for &'a DataList {
    type Item = &'a StructuredValue;
    type IntoIter = std::slice::Iter<'a, StructuredValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl TryFrom<Vec<StructuredValue>> for DataList {
    type Error = Error;

    fn try_from(elements: Vec<StructuredValue>) -> Result<Self> {
        DataList::from_vec(elements)
    }
}
