use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Index;
use std::sync::{Arc, LazyLock};


static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Column names of one result set, shared by all of its rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Columns {
    names: Vec<String>,
    fields: Vec<String>,
}

impl Columns {
    /// Build the column set from the header line's names.
    ///
    /// Alongside the reported names this computes unique, identifier-safe
    /// field names: a name that is not a plain identifier, starts with an
    /// underscore, or repeats an earlier name is replaced by `_<index>`.
    pub fn new(names: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let fields = names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                if IDENTIFIER.is_match(name) && seen.insert(name.as_str()) {
                    name.clone()
                } else {
                    format!("_{index}")
                }
            })
            .collect();

        Self { names, fields }
    }

    /// The names exactly as reported by the engine.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Unique identifier-safe names, one per column.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of the first column reported as `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}


/// One row of a result set.
///
/// Values keep the engine's JSON encoding: strings, numbers, booleans and
/// `null`. Access is by position or by column name.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    columns: Arc<Columns>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Columns>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the first column reported as `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.position(name).and_then(|i| self.values.get(i))
    }

    /// Value under an identifier-safe field name, see [`Columns::fields`].
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.columns
            .fields()
            .iter()
            .position(|f| f == field)
            .and_then(|i| self.values.get(i))
    }

    /// Iterate over `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.names().iter().map(String::as_str).zip(self.values.iter())
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

/// Rows serialize as JSON objects keyed by their identifier-safe field
/// names, so duplicate or unusual column names never collide.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.columns.fields().iter().zip(self.values.iter()) {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}
