use crate::cli::error::CliError;
use crate::cli::output::{PingReport, QueryReport};

use druid_sql::{async_connect, connect, ConnectOptions, Description, Parameters, Row};
use std::time::Instant;


const PING_QUERY: &str = "SELECT 1";

fn report(description: Option<Description>, rows: Vec<Row>) -> QueryReport {
    tracing::info!(rows = rows.len(), "Query finished");
    QueryReport {
        description,
        row_count: rows.len(),
        rows,
    }
}

/// Runs `sql` on the blocking client and collects up to `limit` rows.
///
/// Must run outside the async runtime, e.g. in `spawn_blocking`.
pub fn query(
    options: ConnectOptions,
    sql: &str,
    parameters: &Parameters,
    limit: Option<usize>,
) -> Result<QueryReport, CliError> {
    tracing::info!("Running query...");
    let mut conn = connect(options)?;
    let mut cursor = conn.execute(sql, Some(parameters))?;

    let rows = match limit {
        Some(0) => Vec::new(),
        Some(n) => cursor.fetchmany(Some(n))?,
        None => cursor.fetchall()?,
    };
    let description = cursor.description().cloned();
    conn.close()?;

    Ok(report(description, rows))
}

/// Same as [`query`], streaming through the asynchronous client.
pub async fn query_async(
    options: ConnectOptions,
    sql: &str,
    parameters: &Parameters,
    limit: Option<usize>,
) -> Result<QueryReport, CliError> {
    tracing::info!("Running query (async)...");
    let mut conn = async_connect(options)?;
    let mut cursor = conn.execute(sql, Some(parameters)).await?;

    let rows = match limit {
        Some(0) => Vec::new(),
        Some(n) => cursor.fetchmany(Some(n)).await?,
        None => cursor.fetchall().await?,
    };
    let description = cursor.description().cloned();
    conn.close()?;

    Ok(report(description, rows))
}

/// Checks that the endpoint accepts and fully answers a trivial query.
pub fn ping(options: ConnectOptions) -> Result<PingReport, CliError> {
    let url = options.url()?.to_string();
    tracing::info!("Pinging {url}...");

    let started = Instant::now();
    let mut conn = connect(options)?;
    conn.execute(PING_QUERY, None)?.fetchall()?;
    let elapsed_ms = started.elapsed().as_millis();

    tracing::info!("Ping successful ({elapsed_ms} ms)");
    Ok(PingReport { url, elapsed_ms })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::error::CliErrorKind;
    use druid_sql::{params, DruidErrorKind};
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answers every connection with `status` and a fixed body.
    fn serve(status: u16, body: &'static str) -> ConnectOptions {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut length = 0;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line.trim().is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            length = value.trim().parse().unwrap_or(0);
                        }
                    }
                }
                let mut request = vec![0; length];
                let _ = reader.read_exact(&mut request);

                let _ = write!(
                    stream,
                    "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
            }
        });

        ConnectOptions::new()
            .host("127.0.0.1")
            .port(port)
            .use_system_proxy(false)
    }

    const BODY: &str = "[\"channel\",\"edits\"]\n[\"#en\",10]\n[\"#pt\",3]\n\n";

    #[test]
    fn query_collects_rows_and_description() {
        let report = query(serve(200, BODY), "SELECT 1", &params! {}, None).unwrap();

        assert_eq!(report.row_count, 2);
        assert_eq!(report.rows[1].get("channel"), Some(&json!("#pt")));
        let names: Vec<&str> = report.description.as_ref().unwrap().names().collect();
        assert_eq!(names, vec!["channel", "edits"]);
    }

    #[test]
    fn query_honours_limit() {
        let report = query(serve(200, BODY), "SELECT 1", &params! {}, Some(1)).unwrap();
        assert_eq!(report.row_count, 1);

        let report = query(serve(200, BODY), "SELECT 1", &params! {}, Some(0)).unwrap();
        assert!(report.rows.is_empty());
    }

    #[test]
    fn query_surfaces_engine_errors() {
        let options = serve(400, r#"{"error":"E","errorClass":"C","errorMessage":"M"}"#);
        let err = query(options, "SELECT", &params! {}, None).unwrap_err();
        assert!(matches!(err.kind, CliErrorKind::Druid(_)));
        assert_eq!(err.to_string(), "E (C): M");
    }

    #[test]
    fn truncated_results_fail_the_query() {
        let err = query(serve(200, "[\"a\"]\n[1]\n"), "SELECT 1", &params! {}, None).unwrap_err();
        let CliErrorKind::Druid(error) = &err.kind else { panic!("expected a druid error") };
        assert!(matches!(error.kind, DruidErrorKind::Truncated));
    }

    #[test]
    fn table_output_is_aligned() {
        let report = query(serve(200, BODY), "SELECT 1", &params! {}, None).unwrap();
        assert_eq!(
            crate::cli::ux::format_table(&report),
            "channel | edits\n--------+------\n#en     | 10\n#pt     | 3\n(2 rows)\n"
        );
    }

    #[test]
    fn ping_reports_the_endpoint() {
        let options = serve(200, "[\"EXPR$0\"]\n[1]\n\n");
        let expected = options.url().unwrap().to_string();
        assert_eq!(ping(options).unwrap().url, expected);
    }

    #[tokio::test]
    async fn async_query_matches_blocking_query() {
        let report = query_async(serve(200, BODY), "SELECT 1", &params! {}, Some(5)).await.unwrap();
        assert_eq!(report.row_count, 2);
        assert_eq!(report.rows[0][1], json!(10));
    }
}
