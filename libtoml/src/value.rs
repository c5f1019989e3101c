//! TOML value representation.

use std::collections::HashMap;
use std::fmt;

use crate::key::Key;

/// A table: unordered, unique keys.
pub type Table = HashMap<Key, Value>;

/// A node of the finished document tree.
#[derive(Clone, PartialEq)]
pub enum Value {
    /// UTF-8 string.
    String(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Offset or local date-time, date, or time, in RFC 3339 form.
    Datetime(String),
    /// Inline array or array of tables.
    Array(Vec<Value>),
    /// Table or inline table.
    Table(Table),
}

impl Value {
    /// Returns the boolean value if this is a `Boolean`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Integer`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the float value if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the datetime text if this is a `Datetime`.
    pub fn as_datetime(&self) -> Option<&str> {
        match self {
            Value::Datetime(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a reference to the array if this is an `Array`.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Returns a reference to the table if this is a `Table`.
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Look up `key` if this is a table.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_table().and_then(|table| table.get(key))
    }

    /// Follow a sequence of keys through nested tables.
    pub fn get_path<I, S>(&self, keys: I) -> Option<&Value>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .try_fold(self, |value, key| value.get(key.as_ref()))
    }

    /// Short lowercase name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Datetime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Table(_) => "table",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.is_nan() {
                    write!(f, "nan")
                } else if n.is_infinite() {
                    if *n > 0.0 {
                        write!(f, "inf")
                    } else {
                        write!(f, "-inf")
                    }
                } else {
                    write!(f, "{:?}", n)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Datetime(s) => write!(f, "{}", s),
            Value::Array(arr) => f.debug_list().entries(arr).finish(),
            Value::Table(table) => {
                // Sorted so output is stable across runs.
                let mut entries: Vec<_> = table.iter().collect();
                entries.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
                f.debug_map().entries(entries).finish()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(arr: Vec<Value>) -> Self {
        Value::Array(arr)
    }
}

impl From<Table> for Value {
    fn from(table: Table) -> Self {
        Value::Table(table)
    }
}
