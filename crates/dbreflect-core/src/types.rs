//! Value and row types exchanged with the SQL execution engine

use crate::{ReflectError, Result};
use serde::{Deserialize, Serialize};

/// A scalar returned by, or bound into, a catalog query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// Any integer width, widened
    Int64(i64),
    /// Any floating point width, widened
    Float64(f64),
    /// UTF-8 text (also used for names, identifiers and dates)
    String(String),
}

impl Value {
    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

/// A result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Scan a non-NULL text column.
    ///
    /// Returns `ReflectError::Scan` when the index is out of range, the value
    /// is NULL, or the value is not text.
    pub fn get_string(&self, index: usize) -> Result<String> {
        match self.values.get(index) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Null) => Err(ReflectError::Scan(format!(
                "column {} ({}) is NULL, expected text",
                index,
                self.column_label(index)
            ))),
            Some(other) => Err(ReflectError::Scan(format!(
                "column {} ({}) holds {:?}, expected text",
                index,
                self.column_label(index),
                other
            ))),
            None => Err(ReflectError::Scan(format!(
                "column {} out of range for a row of {} values",
                index,
                self.values.len()
            ))),
        }
    }

    fn column_label(&self, index: usize) -> &str {
        self.columns.get(index).map(String::as_str).unwrap_or("?")
    }
}
