use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;


/// Error returned by every fallible operation in this crate.
///
/// The [`Display`](fmt::Display) output is exactly the message of the
/// underlying [`DruidErrorKind`], so engine messages and protocol failures
/// surface verbatim.
#[derive(Debug)]
#[non_exhaustive]
pub struct DruidError {
    pub kind: DruidErrorKind
}

impl DruidError {
    pub fn kind(&self) -> &DruidErrorKind {
        &self.kind
    }

    /// Usage errors: closed handles, fetching before `execute`.
    pub fn is_usage(&self) -> bool {
        matches!(self.kind, DruidErrorKind::Closed(_) | DruidErrorKind::NotExecuted)
    }

    /// Errors raised while reading the result stream itself.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self.kind,
            DruidErrorKind::MissingHeader | DruidErrorKind::Truncated | DruidErrorKind::RowWidth { .. }
        )
    }
}

impl fmt::Display for DruidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error for DruidError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		self.kind.source()
	}
}

impl From<DruidErrorKind> for DruidError {
    fn from(kind: DruidErrorKind) -> Self {
        DruidError { kind }
    }
}

#[derive(Debug)]
pub enum DruidErrorKind {
    Closed(&'static str),
    Config(String),
    Format(String),
    Http(reqwest::Error),
    Io(std::io::Error),
    Json(serde_json::Error),
    MissingHeader,
    NotExecuted,
    NotSupported(String),
    Query {
        error: String,
        error_class: String,
        error_message: String,
    },
    RowWidth { expected: usize, found: usize },
    Truncated,
    Utf8(std::string::FromUtf8Error),
}

impl fmt::Display for DruidErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed(handle) => write!(f, "{handle} already closed"),
            Self::Config(msg) => write!(f, "{msg}"),
            Self::Format(msg) => write!(f, "Formatting error: {msg}"),
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "Invalid JSON in response: {e}"),
            Self::MissingHeader => write!(f, "Empty response. Header line not found."),
            Self::NotExecuted => write!(f, "Called before `execute`"),
            Self::NotSupported(msg) => write!(f, "{msg}"),
            Self::Query { error, error_class, error_message } => {
                write!(f, "{error} ({error_class}): {error_message}")
            },
            Self::RowWidth { expected, found } => {
                write!(f, "Row has {found} value(s) but the header declares {expected} column(s)")
            },
            Self::Truncated => write!(f, "Truncated response. Trailer line not found."),
            Self::Utf8(e) => write!(f, "UTF-8 conversion error: {e}"),
        }
    }
}

impl Error for DruidErrorKind {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			Self::Http(source) => Some(source),
			Self::Io(source) => Some(source),
			Self::Json(source) => Some(source),
			Self::Utf8(source) => Some(source),
			_ => None,
		}
	}
}

impl From<reqwest::Error> for DruidError {
    fn from(error: reqwest::Error) -> Self {
        DruidError { kind: DruidErrorKind::Http(error) }
    }
}

impl From<std::io::Error> for DruidError {
    fn from(error: std::io::Error) -> Self {
        DruidError { kind: DruidErrorKind::Io(error) }
    }
}

impl From<serde_json::Error> for DruidError {
    fn from(error: serde_json::Error) -> Self {
        DruidError { kind: DruidErrorKind::Json(error) }
    }
}

impl From<std::string::FromUtf8Error> for DruidError {
    fn from(error: std::string::FromUtf8Error) -> Self {
        DruidError { kind: DruidErrorKind::Utf8(error) }
    }
}


/// Build the error for a response whose status is not `200 OK`.
///
/// Bodies that are not a JSON object are replaced by a synthetic
/// `Unknown error` payload carrying the raw text. Newer engines send
/// `errorCode` instead of `errorClass`; it is only used when `errorClass`
/// is absent. A payload missing any of the three fields is reported as a
/// formatting error rather than papered over.
pub fn translate_http_error(body: &str) -> DruidError {
    let mut payload = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert("error".to_string(), Value::from("Unknown error"));
            map.insert("errorClass".to_string(), Value::from("Unknown"));
            map.insert("errorMessage".to_string(), Value::from(body));
            map
        }
    };

    if !payload.contains_key("errorClass") {
        if let Some(code) = payload.get("errorCode").cloned() {
            payload.insert("errorClass".to_string(), code);
        }
    }

    let field = |name: &str| -> Result<String, DruidError> {
        match payload.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(DruidErrorKind::Format(
                format!("error response is missing the `{name}` field")
            ).into()),
        }
    };

    let fields = field("error").and_then(|error| {
        Ok((error, field("errorClass")?, field("errorMessage")?))
    });

    match fields {
        Ok((error, error_class, error_message)) => DruidErrorKind::Query {
            error,
            error_class,
            error_message,
        }.into(),
        Err(e) => e,
    }
}
