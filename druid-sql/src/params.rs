//! Client-side parameter binding.
//!
//! The SQL endpoint has no server-side bind step for `arrayLines` queries, so
//! parameters are escaped into SQL literals and substituted into the query
//! text before it is sent. Templates use named placeholders:
//!
//! ```
//! use druid_sql::{apply_parameters, params};
//!
//! let sql = apply_parameters(
//!     "SELECT %(cols)s FROM wikipedia WHERE channel IN (%(channels)s) AND added > %(min)s",
//!     Some(&params! {
//!         "cols" => "*",
//!         "channels" => vec!["#en", "#fr"],
//!         "min" => 10,
//!     }),
//! ).unwrap();
//!
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM wikipedia WHERE channel IN ('#en', '#fr') AND added > 10"
//! );
//! ```
use crate::error::{DruidError, DruidErrorKind};

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;


/// Named parameters for [`apply_parameters`].
pub type Parameters = HashMap<String, Parameter>;

/// A value that can be bound into a query template.
///
/// The variant is decided where the value is created, so booleans are never
/// mistaken for numbers when they are escaped.
#[derive(Clone, Debug, PartialEq)]
pub enum Parameter {
    String(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Boolean(bool),
    List(Vec<Parameter>),
}

impl Parameter {
    /// Render the value as a SQL literal.
    ///
    /// A bare `*` string is passed through unquoted so that templates like
    /// `SELECT %(cols)s` can select every column.
    ///
    /// # Errors
    ///
    /// NaN and infinite floats have no SQL literal and fail with
    /// [`DruidErrorKind::Format`].
    pub fn escape(&self) -> Result<String, DruidError> {
        Ok(match self {
            Parameter::String(s) if s == "*" => s.clone(),
            Parameter::String(s) => format!("'{}'", s.replace('\'', "''")),
            Parameter::Boolean(true) => "TRUE".to_string(),
            Parameter::Boolean(false) => "FALSE".to_string(),
            Parameter::Integer(n) => n.to_string(),
            Parameter::Unsigned(n) => n.to_string(),
            Parameter::Float(n) if n.is_finite() => format!("{n:?}"),
            Parameter::Float(n) => return Err(DruidErrorKind::Format(
                format!("cannot escape non-finite float {n}")
            ).into()),
            Parameter::List(items) => items
                .iter()
                .map(Parameter::escape)
                .collect::<Result<Vec<_>, _>>()?
                .join(", "),
        })
    }
}

/// Macro to implement `From` for a type mapping to a Parameter variant.
macro_rules! impl_from_value {
    ($ty:ty => $variant:ident) => {
        impl From<$ty> for Parameter {
            fn from(value: $ty) -> Self {
                Parameter::$variant(value.into())
            }
        }
    };
}

// Primitives
impl_from_value!(i8 => Integer);
impl_from_value!(i16 => Integer);
impl_from_value!(i32 => Integer);
impl_from_value!(i64 => Integer);
impl_from_value!(u8 => Integer);
impl_from_value!(u16 => Integer);
impl_from_value!(u32 => Integer);
impl_from_value!(u64 => Unsigned);
impl_from_value!(f32 => Float);
impl_from_value!(f64 => Float);
impl_from_value!(bool => Boolean);
impl_from_value!(String => String);
impl_from_value!(&str => String);

// Pointer-sized integers are at most 64 bits wide on every supported target.
impl From<isize> for Parameter {
    fn from(value: isize) -> Self {
        Parameter::Integer(value as i64)
    }
}

impl From<usize> for Parameter {
    fn from(value: usize) -> Self {
        Parameter::Unsigned(value as u64)
    }
}

// Sequences
impl<T: Into<Parameter>> From<Vec<T>> for Parameter {
    fn from(values: Vec<T>) -> Self {
        Parameter::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Parameter> + Clone> From<&[T]> for Parameter {
    fn from(values: &[T]) -> Self {
        Parameter::List(values.iter().cloned().map(Into::into).collect())
    }
}

/// Build a [`Parameters`] map from `key => value` pairs.
#[macro_export]
macro_rules! params {
    () => {
        $crate::Parameters::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut parameters = $crate::Parameters::new();
        $(
            parameters.insert(
                ::std::string::ToString::to_string(&$key),
                $crate::Parameter::from($value),
            );
        )+
        parameters
    }};
}


/// Matches `%(key)<conversion>`, `%%` and a dangling `%`.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)%(?:\((?P<key>[^)]*)\)(?P<conv>.)?|(?P<pct>%))?")
        .expect("placeholder pattern is valid")
});

/// Substitute escaped `parameters` into `operation`.
///
/// Without parameters the operation is returned untouched, `%` signs
/// included. With parameters, `%(key)s` is replaced by the escaped value
/// and `%%` collapses to `%`.
///
/// # Errors
///
/// Returns a [`DruidErrorKind::Format`] error for a placeholder whose key is
/// missing from `parameters`, a conversion other than `s`, or a `%` that
/// does not start a placeholder.
pub fn apply_parameters(
    operation: &str,
    parameters: Option<&Parameters>,
) -> Result<String, DruidError> {
    let parameters = match parameters {
        Some(p) if !p.is_empty() => p,
        _ => return Ok(operation.to_string()),
    };

    let escaped: HashMap<&str, String> = parameters
        .iter()
        .map(|(key, value)| Ok((key.as_str(), value.escape()?)))
        .collect::<Result<_, DruidError>>()?;

    let mut output = String::with_capacity(operation.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(operation) {
        let whole = caps.get(0).expect("group 0 always participates");
        output.push_str(&operation[last..whole.start()]);
        output.push_str(&substitute(&caps, &escaped, whole.start())?);
        last = whole.end();
    }
    output.push_str(&operation[last..]);

    Ok(output)
}

fn substitute(
    caps: &Captures<'_>,
    escaped: &HashMap<&str, String>,
    position: usize,
) -> Result<String, DruidError> {
    if caps.name("pct").is_some() {
        return Ok("%".to_string());
    }

    let Some(key) = caps.name("key") else {
        return Err(DruidErrorKind::Format(
            format!("incomplete format at position {position}")
        ).into());
    };

    match caps.name("conv").map(|m| m.as_str()) {
        Some("s") => {}
        Some(other) => return Err(DruidErrorKind::Format(
            format!("unsupported format character '{other}' for parameter `{}`", key.as_str())
        ).into()),
        None => return Err(DruidErrorKind::Format(
            format!("incomplete format for parameter `{}`", key.as_str())
        ).into()),
    }

    escaped
        .get(key.as_str())
        .cloned()
        .ok_or_else(|| DruidErrorKind::Format(
            format!("missing parameter `{}`", key.as_str())
        ).into())
}
