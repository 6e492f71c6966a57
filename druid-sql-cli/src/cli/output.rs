// {
//   "command": "query",
//   "status": "success",
//   "data": {
//     "description": [{"name": "channel", "type_code": "STRING", ...}],
//     "rows": [{"channel": "#en.wikipedia"}],
//     "row_count": 1
//   },
//   "error": null
// }
use crate::cli::error::{CliError, CliErrorKind};

use druid_sql::{Description, DruidErrorKind, Row};
use serde::Serialize;


#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CliErrorJson {
    Argument { message: String },
    Config { message: String },
    Internal { message: String },
    Protocol { message: String },
    Query {
        message: String,
        error: String,
        error_class: String,
        error_message: String,
    },
    Transport { message: String },
    Usage { message: String },
}

impl From<&CliError> for CliErrorJson {
    fn from(e: &CliError) -> Self {
        // The pretty CLI output (stderr-like message)
        let message = format!("{e}");

        match &e.kind {
            CliErrorKind::Druid(error) => match &error.kind {
                DruidErrorKind::Query { error, error_class, error_message } => Self::Query {
                    message,
                    error: error.clone(),
                    error_class: error_class.clone(),
                    error_message: error_message.clone(),
                },
                DruidErrorKind::Config(_) => Self::Config { message },
                DruidErrorKind::Format(_) => Self::Argument { message },
                DruidErrorKind::Http(_) | DruidErrorKind::Io(_) => Self::Transport { message },
                _ if error.is_usage() => Self::Usage { message },
                _ => Self::Protocol { message },
            },
            CliErrorKind::SetGlobalDefault(_) | CliErrorKind::Task(_) => Self::Internal { message },
        }
    }
}


#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CliStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
    pub description: Option<Description>,
    pub rows: Vec<Row>,
    pub row_count: usize,
}

#[derive(Debug, Serialize)]
pub struct PingReport {
    pub url: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CommandData {
    Query(QueryReport),
    Ping(PingReport),
}

#[derive(Debug, Serialize)]
pub struct CliOutput<T: Serialize> {
    pub command: String,
    pub status: CliStatus,
    pub data: Option<T>,
    pub error: Option<CliErrorJson>,
}

impl<T: Serialize> CliOutput<T> {
    pub fn from_result(command: String, result: Result<T, CliError>) -> Self {
        match result {
            Ok(data) => Self {
                command,
                status: CliStatus::Success,
                data: Some(data),
                error: None,
            },
            Err(e) => Self {
                command,
                status: CliStatus::Error,
                data: None,
                error: Some(CliErrorJson::from(&e)),
            },
        }
    }
}
