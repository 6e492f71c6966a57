//! HTTP plumbing: client construction and the streaming query POST.
use crate::config::ConnectOptions;
use crate::error::{translate_http_error, DruidError, DruidErrorKind};
use crate::framing::Lines;
use crate::protocol::{AsyncResultSet, LineIter, LineStream, ResultSet};

use reqwest::{Identity, Proxy, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{BufRead, BufReader};
use url::Url;


const RESULT_FORMAT: &str = "arrayLines";

/// JSON body of a SQL query request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequest<'a> {
    query: &'a str,
    context: &'a Map<String, Value>,
    header: bool,
    result_format: &'static str,
}

impl<'a> QueryRequest<'a> {
    pub(crate) fn new(query: &'a str, context: &'a Map<String, Value>) -> Self {
        Self {
            query,
            context,
            header: true,
            result_format: RESULT_FORMAT,
        }
    }
}

/// Where queries go and with which credentials and context.
///
/// Copied into every cursor so a cursor never needs its connection.
#[derive(Clone, Debug)]
pub(crate) struct Endpoint {
    url: Url,
    user: Option<String>,
    password: Option<String>,
    context: Map<String, Value>,
}

impl Endpoint {
    pub(crate) fn from_options(options: &ConnectOptions) -> Result<Self, DruidError> {
        Ok(Self {
            url: options.url()?,
            user: options.user.clone(),
            password: options.password.clone(),
            context: options.context.clone(),
        })
    }

    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    /// Credentials are only sent when a user is set; the password
    /// defaults to empty.
    fn credentials(&self) -> Option<(&str, &str)> {
        self.user
            .as_deref()
            .map(|user| (user, self.password.as_deref().unwrap_or("")))
    }
}


fn identity(options: &ConnectOptions) -> Result<Option<Identity>, DruidError> {
    let Some(path) = &options.ssl_client_cert else {
        return Ok(None);
    };
    let pem = std::fs::read(path)?;
    let identity = Identity::from_pem(&pem).map_err(|e| {
        DruidErrorKind::Config(format!("Invalid client certificate '{}': {e}", path.display()))
    })?;
    Ok(Some(identity))
}

fn proxies(options: &ConnectOptions) -> Result<Vec<Proxy>, DruidError> {
    options
        .proxies
        .iter()
        .map(|(scheme, proxy_url)| -> Result<Proxy, DruidError> {
            let proxy = match scheme.as_str() {
                "http" => Proxy::http(proxy_url),
                "https" => Proxy::https(proxy_url),
                "all" => Proxy::all(proxy_url),
                other => {
                    return Err(DruidErrorKind::Config(
                        format!("Unsupported proxy scheme '{other}', expected http, https or all")
                    ).into());
                }
            };
            proxy.map_err(|e| {
                DruidErrorKind::Config(format!("Invalid proxy URL '{proxy_url}': {e}")).into()
            })
        })
        .collect()
}

/// Applies the settings shared by the blocking and async builders.
macro_rules! configure_builder {
    ($builder:expr, $options:expr) => {{
        let options: &ConnectOptions = $options;
        let mut builder = $builder.danger_accept_invalid_certs(!options.ssl_verify_cert);
        if !options.use_system_proxy {
            builder = builder.no_proxy();
        }
        for proxy in proxies(options)? {
            builder = builder.proxy(proxy);
        }
        if let Some(identity) = identity(options)? {
            builder = builder.identity(identity);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.connect_timeout(timeout);
        }
        builder
    }};
}

/// Build the blocking client. Must not be called from inside an async runtime.
pub(crate) fn blocking_client(
    options: &ConnectOptions,
) -> Result<reqwest::blocking::Client, DruidError> {
    let builder = configure_builder!(reqwest::blocking::Client::builder(), options);
    // `None` disables the default 30 second limit.
    Ok(builder.timeout(options.timeout).build()?)
}

pub(crate) fn async_client(options: &ConnectOptions) -> Result<reqwest::Client, DruidError> {
    let mut builder = configure_builder!(reqwest::Client::builder(), options);
    if let Some(timeout) = options.timeout {
        builder = builder.read_timeout(timeout);
    }
    Ok(builder.build()?)
}


/// POST `query` and open the result stream, reading the header line.
pub(crate) fn stream_query_blocking(
    client: &reqwest::blocking::Client,
    endpoint: &Endpoint,
    query: &str,
) -> Result<ResultSet, DruidError> {
    tracing::debug!(url = %endpoint.url, "Sending query");
    tracing::trace!(query = %query, "Query text");

    let mut request = client
        .post(endpoint.url.clone())
        .json(&QueryRequest::new(query, &endpoint.context));
    if let Some((user, password)) = endpoint.credentials() {
        request = request.basic_auth(user, Some(password));
    }

    let response = request.send()?;
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text()?;
        tracing::warn!(status = %status, "Query rejected");
        return Err(translate_http_error(&body));
    }

    tracing::debug!("Streaming results");
    let lines: LineIter = Box::new(
        BufReader::new(response)
            .lines()
            .map(|line| line.map_err(DruidError::from)),
    );
    ResultSet::open(lines)
}

/// Async counterpart of [`stream_query_blocking`]. The body is read chunk by
/// chunk and reassembled into lines.
pub(crate) async fn stream_query(
    client: &reqwest::Client,
    endpoint: &Endpoint,
    query: &str,
) -> Result<AsyncResultSet, DruidError> {
    tracing::debug!(url = %endpoint.url, "Sending query");
    tracing::trace!(query = %query, "Query text");

    let mut request = client
        .post(endpoint.url.clone())
        .json(&QueryRequest::new(query, &endpoint.context));
    if let Some((user, password)) = endpoint.credentials() {
        request = request.basic_auth(user, Some(password));
    }

    let response = request.send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await?;
        tracing::warn!(status = %status, "Query rejected");
        return Err(translate_http_error(&body));
    }

    tracing::debug!("Streaming results");
    let lines: LineStream = Box::pin(Lines::new(Box::pin(response.bytes_stream())));
    AsyncResultSet::open(lines).await
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_shape() {
        let mut context = Map::new();
        context.insert("source".into(), json!("unittest"));

        let body = serde_json::to_value(QueryRequest::new("SELECT 1", &context)).unwrap();
        assert_eq!(body, json!({
            "query": "SELECT 1",
            "context": {"source": "unittest"},
            "header": true,
            "resultFormat": "arrayLines",
        }));
    }

    #[test]
    fn credentials_need_a_user() {
        let endpoint = Endpoint::from_options(&ConnectOptions::new().password("pw")).unwrap();
        assert_eq!(endpoint.credentials(), None);

        let endpoint = Endpoint::from_options(&ConnectOptions::new().user("alice")).unwrap();
        assert_eq!(endpoint.credentials(), Some(("alice", "")));
    }

    #[test]
    fn proxies_are_built_per_scheme() {
        let options = ConnectOptions::new()
            .proxy("http", "http://proxy:3128")
            .proxy("all", "http://proxy:3129");
        assert_eq!(proxies(&options).unwrap().len(), 2);
    }

    #[test]
    fn unknown_proxy_scheme_fails() {
        let options = ConnectOptions::new().proxy("ftp", "http://proxy:3128");
        assert!(matches!(proxies(&options).unwrap_err().kind, DruidErrorKind::Config(_)));
    }

    #[test]
    fn missing_client_certificate_is_an_io_error() {
        let options = ConnectOptions::new().ssl_client_cert("/nonexistent/client.pem");
        assert!(matches!(identity(&options).unwrap_err().kind, DruidErrorKind::Io(_)));
    }
}
