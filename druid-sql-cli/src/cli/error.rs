use druid_sql::DruidError;

use std::error::Error;
use std::fmt;
use tokio::task::JoinError;
use tracing::subscriber::SetGlobalDefaultError;


#[derive(Debug)]
pub struct CliError {
    pub kind: CliErrorKind
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error for CliError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
	}
}

#[derive(Debug)]
pub enum CliErrorKind {
    Druid(DruidError),
    SetGlobalDefault(SetGlobalDefaultError),
    Task(JoinError),
}

impl fmt::Display for CliErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Druid(error) => write!(f, "{error}"),
            Self::SetGlobalDefault(error) => write!(f, "Failed to set global default subscriber: {error}"),
            Self::Task(error) => write!(f, "Query task failed: {error}"),
        }
    }
}

impl Error for CliErrorKind {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			Self::Druid(source) => Some(source),
			Self::SetGlobalDefault(source) => Some(source),
			Self::Task(source) => Some(source),
		}
	}
}

impl From<DruidError> for CliError {
    fn from(error: DruidError) -> Self {
        CliError { kind: CliErrorKind::Druid(error) }
    }
}

impl From<SetGlobalDefaultError> for CliError {
    fn from(error: SetGlobalDefaultError) -> Self {
        CliError { kind: CliErrorKind::SetGlobalDefault(error) }
    }
}

impl From<JoinError> for CliError {
    fn from(error: JoinError) -> Self {
        CliError { kind: CliErrorKind::Task(error) }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use druid_sql::{translate_http_error, DruidErrorKind};

    #[test]
    fn cli_error_display_formats_correctly() {
        let cases: Vec<(CliErrorKind, &str)> = vec![
            (
                CliErrorKind::Druid(translate_http_error(r#"{"error":"E","errorClass":"C","errorMessage":"M"}"#)),
                "E (C): M",
            ),
            (CliErrorKind::Druid(DruidErrorKind::Truncated.into()), "Truncated response"),
            (CliErrorKind::Druid(DruidErrorKind::Closed("Cursor").into()), "Cursor already closed"),
        ];

        for (kind, expect) in cases {
            let text = CliError { kind }.to_string();
            assert!(
                text.contains(expect),
                "Expected `{}` in `{}`",
                expect,
                text
            );
        }
    }

    #[test]
    fn cli_error_source_chain_works() {
        let err: CliError = DruidError::from(DruidErrorKind::NotExecuted).into();
        let src = err.source().unwrap().to_string();
        assert_eq!(src, "Called before `execute`");
        assert!(matches!(err.kind, CliErrorKind::Druid(_)));
    }

    #[tokio::test]
    async fn task_errors_keep_their_source() {
        let join_error = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        let err: CliError = join_error.into();
        assert!(matches!(err.kind, CliErrorKind::Task(_)));
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("Query task failed"));
    }
}
