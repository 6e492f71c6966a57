//! DB-API style column descriptions.
//!
//! The engine sends only column names up front. Types are inferred from the
//! first row that is actually fetched; until then (and forever, for an empty
//! result set) they are unknown.
use crate::row::{Columns, Row};

use serde::Serialize;
use serde_json::Value;


/// Type codes inferred from JSON values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Type {
    String,
    Number,
    Boolean,
}

impl Type {
    /// Infer the type of a single value.
    ///
    /// String columns are nullable in the engine, so `null` maps to
    /// [`Type::String`]. Arrays and objects have no type code.
    pub fn of(value: &Value) -> Option<Type> {
        match value {
            Value::String(_) | Value::Null => Some(Type::String),
            Value::Bool(_) => Some(Type::Boolean),
            Value::Number(_) => Some(Type::Number),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// One entry of [`Description`], mirroring the seven DB-API fields.
///
/// Display size, internal size, precision and scale are never reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub type_code: Option<Type>,
    pub display_size: Option<usize>,
    pub internal_size: Option<usize>,
    pub precision: Option<usize>,
    pub scale: Option<usize>,
    pub null_ok: Option<bool>,
}

impl Column {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_code: None,
            display_size: None,
            internal_size: None,
            precision: None,
            scale: None,
            null_ok: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Description {
    columns: Vec<Column>,
    #[serde(skip)]
    typed: bool,
}

impl Description {
    pub(crate) fn from_columns(columns: &Columns) -> Self {
        Self {
            columns: columns.names().iter().map(|n| Column::named(n)).collect(),
            typed: false,
        }
    }

    /// Fill in types from the first row; later rows are ignored.
    pub(crate) fn observe(&mut self, row: &Row) {
        if self.typed {
            return;
        }
        for (column, value) in self.columns.iter_mut().zip(row.values()) {
            let type_code = Type::of(value);
            column.type_code = type_code;
            column.null_ok = type_code.map(|t| t == Type::String);
        }
        self.typed = true;
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn types_are_inferred_from_the_first_row_only() {
        let columns = Arc::new(Columns::new(vec!["s".into(), "n".into(), "b".into(), "z".into()]));
        let mut description = Description::from_columns(&columns);
        assert!(description.columns().iter().all(|c| c.type_code.is_none()));

        description.observe(&Row::new(columns.clone(), vec![json!("x"), json!(1.5), json!(true), json!(null)]));
        description.observe(&Row::new(columns, vec![json!(1), json!("y"), json!(null), json!(2)]));

        let inferred: Vec<(Option<Type>, Option<bool>)> = description
            .columns()
            .iter()
            .map(|c| (c.type_code, c.null_ok))
            .collect();
        assert_eq!(inferred, vec![
            (Some(Type::String), Some(true)),
            (Some(Type::Number), Some(false)),
            (Some(Type::Boolean), Some(false)),
            (Some(Type::String), Some(true)),
        ]);
    }

    #[test]
    fn nested_values_have_no_type() {
        assert_eq!(Type::of(&json!([1, 2])), None);
        assert_eq!(Type::of(&json!({"a": 1})), None);
    }

    #[test]
    fn serializes_as_a_list_of_columns() {
        let columns = Columns::new(vec!["name".into()]);
        let s = serde_json::to_string(&Description::from_columns(&columns)).unwrap();
        assert_eq!(
            s,
            r#"[{"name":"name","type_code":null,"display_size":null,"internal_size":null,"precision":null,"scale":null,"null_ok":null}]"#
        );
    }
}
