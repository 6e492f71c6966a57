pub mod commands;
pub mod error;
pub mod output;
pub mod ux;

pub use clap::{Parser, Subcommand, ValueEnum};
use druid_sql::{ConnectOptions, Parameter, Parameters};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;


#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}


#[derive(Parser)]
#[command(name = "druid-sql", version, about = "Run SQL against an Apache Druid broker and stream the results.")]
pub struct Cli {
    #[arg(
        long,
        help = "Broker or router host.",
        env = "DRUID_HOST",
        default_value = "localhost",
    )]
    pub host: String,

    #[arg(
        long,
        help = "Broker or router port.",
        env = "DRUID_PORT",
        default_value_t = 8082,
    )]
    pub port: u16,

    #[arg(
        long,
        help = "Path of the SQL endpoint.",
        env = "DRUID_PATH",
        default_value = "/druid/v2/sql/",
    )]
    pub path: String,

    #[arg(
        long,
        value_enum,
        help = "URL scheme.",
        env = "DRUID_SCHEME",
        default_value_t = Scheme::Http,
    )]
    pub scheme: Scheme,

    #[arg(
        long,
        help = "User for basic authentication. No credentials are sent when unset.",
        env = "DRUID_USER",
    )]
    pub user: Option<String>,

    #[arg(
        long,
        help = "Password for basic authentication.",
        env = "DRUID_PASSWORD",
        hide_env_values = true,
    )]
    pub password: Option<String>,

    #[arg(
        long = "context",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "Query context entry, e.g. --context sqlTimeZone=Europe/Lisbon. May be repeated.\nValues are read as booleans, integers or floats when they parse as such.",
    )]
    pub context: Vec<(String, String)>,

    #[arg(
        long,
        help = "Skip TLS certificate verification. ⚠️ Warning: only use this against trusted test clusters.",
    )]
    pub insecure: bool,

    #[arg(
        long,
        help = "PEM file with the client certificate and private key.",
        env = "DRUID_CLIENT_CERT",
    )]
    pub client_cert: Option<PathBuf>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Connect and read timeout. Waits indefinitely when unset.",
        env = "DRUID_TIMEOUT",
    )]
    pub timeout: Option<u64>,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Set level of verbosity. [default: INFO]\n\t-v: DEBUG\n\t-vv: TRACE\n--quiet takes precedence over --verbose."
    )]
    pub verbose: u8,

    #[arg(
        short,
        long,
        action = clap::ArgAction::SetTrue,
        help = "Disable all information logs (only ERROR level logs are shown).\n--quiet takes precedence over --verbose."
    )]
    pub quiet: bool,

    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Enable JSON output format. Human readable output is disabled when this flag is set."
    )]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .path(&self.path)
            .scheme(self.scheme.as_str())
            .ssl_verify_cert(!self.insecure);

        if let Some(user) = &self.user {
            options = options.user(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        if let Some(path) = &self.client_cert {
            options = options.ssl_client_cert(path);
        }
        if let Some(seconds) = self.timeout {
            options = options.timeout(Duration::from_secs(seconds));
        }
        for (key, value) in &self.context {
            options = options.context_entry(key, infer_json(value));
        }

        options
    }
}

#[derive(Parser)]
pub struct QueryArgs {
    #[arg(help = "SQL statement. Use %(name)s placeholders together with --param.")]
    pub sql: String,

    #[arg(
        long = "param",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "Query parameter bound to %(KEY)s. May be repeated.\nValues are read as booleans, integers or floats when they parse as such, strings otherwise.",
    )]
    pub params: Vec<(String, String)>,

    #[arg(
        long = "async",
        help = "Stream the response through the asynchronous client.",
    )]
    pub run_async: bool,

    #[arg(
        long,
        help = "Fetch at most this many rows.",
    )]
    pub limit: Option<usize>,
}

impl QueryArgs {
    pub fn parameters(&self) -> Parameters {
        self.params
            .iter()
            .map(|(key, value)| (key.clone(), infer_parameter(value)))
            .collect()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Execute a SQL query and print its columns and rows.")]
    Query {
        #[command(flatten)]
        args: QueryArgs,
    },

    #[command(about = "Check that the SQL endpoint answers `SELECT 1`.")]
    Ping {},
}

impl std::fmt::Display for Commands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Commands::Query { .. } => "query",
            Commands::Ping { .. } => "ping",
        };
        write!(f, "{name}")
    }
}


/// Split `KEY=VALUE` at the first `=`.
pub fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{arg}'")),
    }
}

/// Read a command-line value as a boolean, an integer or a float, falling
/// back to a string.
pub fn infer_parameter(value: &str) -> Parameter {
    if let Ok(b) = value.parse::<bool>() {
        return Parameter::Boolean(b);
    }
    if let Ok(n) = value.parse::<i64>() {
        return Parameter::Integer(n);
    }
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Parameter::Float(n),
        _ => Parameter::String(value.to_string()),
    }
}

/// Same inference as [`infer_parameter`], for query context values.
pub fn infer_json(value: &str) -> Value {
    match infer_parameter(value) {
        Parameter::Boolean(b) => Value::from(b),
        Parameter::Integer(n) => Value::from(n),
        Parameter::Float(n) => Value::from(n),
        _ => Value::from(value),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parameters_are_inferred() {
        assert_eq!(infer_parameter("true"), Parameter::Boolean(true));
        assert_eq!(infer_parameter("42"), Parameter::Integer(42));
        assert_eq!(infer_parameter("-1.5"), Parameter::Float(-1.5));
        assert_eq!(infer_parameter("#en.wikipedia"), Parameter::String("#en.wikipedia".into()));
        assert_eq!(infer_parameter("inf"), Parameter::String("inf".into()));
        assert_eq!(infer_parameter(""), Parameter::String(String::new()));
    }

    #[test]
    fn context_values_are_inferred() {
        assert_eq!(infer_json("false"), json!(false));
        assert_eq!(infer_json("30000"), json!(30000));
        assert_eq!(infer_json("UTC"), json!("UTC"));
    }

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(parse_key_value("filter=a=b").unwrap(), ("filter".into(), "a=b".into()));
        assert_eq!(parse_key_value("empty=").unwrap(), ("empty".into(), String::new()));
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn cli_builds_connect_options() {
        let cli = Cli::try_parse_from([
            "druid-sql", "--host", "broker", "--port", "8888", "--scheme", "https",
            "--context", "useCache=false", "--user", "alice",
            "query", "SELECT %(n)s", "--param", "n=3", "--limit", "10",
        ]).unwrap();

        let options = cli.connect_options();
        assert_eq!(options.url().unwrap().as_str(), "https://broker:8888/druid/v2/sql/");
        assert_eq!(options.context_map().get("useCache"), Some(&json!(false)));

        let Commands::Query { args } = &cli.command else { panic!("expected query") };
        assert_eq!(args.parameters().get("n"), Some(&Parameter::Integer(3)));
        assert_eq!(args.limit, Some(10));
        assert!(!args.run_async);
        assert_eq!(cli.command.to_string(), "query");
    }

    #[test]
    fn malformed_param_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from(["druid-sql", "query", "SELECT 1", "--param", "oops"]);
        assert!(result.is_err());
    }
}
