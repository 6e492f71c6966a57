use crate::cli::error::CliError;
use crate::cli::output::{CliErrorJson, CliOutput, CommandData, PingReport, QueryReport};

use serde_json::Value;
use std::fmt::Write;


pub fn setup_logging(verbose: u8, quiet: bool, json: bool) -> Result<(), CliError> {
    if json {
        // Mute all logging so stdout only carries the JSON document
        tracing::subscriber::set_global_default(tracing::subscriber::NoSubscriber::default())?;
        return Ok(());
    }

    let level = if quiet {
        tracing::Level::ERROR
    } else { match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }};

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}


/// Print a command result for humans: tables on stdout, errors through the log.
pub fn render_human_output(output: &CliOutput<CommandData>) {
    if let Some(error) = &output.error {
        tracing::error!("{} failed: {}", output.command, error_message(error));
        return;
    }

    match &output.data {
        Some(CommandData::Query(report)) => print!("{}", format_table(report)),
        Some(CommandData::Ping(PingReport { url, elapsed_ms })) => {
            println!("{url} answered in {elapsed_ms} ms");
        }
        None => {}
    }
}

fn error_message(error: &CliErrorJson) -> &str {
    match error {
        CliErrorJson::Argument { message }
        | CliErrorJson::Config { message }
        | CliErrorJson::Internal { message }
        | CliErrorJson::Protocol { message }
        | CliErrorJson::Query { message, .. }
        | CliErrorJson::Transport { message }
        | CliErrorJson::Usage { message } => message,
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render rows as an aligned plain-text table followed by a row count.
pub fn format_table(report: &QueryReport) -> String {
    let headers: Vec<String> = report
        .description
        .as_ref()
        .map(|d| d.names().map(str::to_string).collect())
        .unwrap_or_default();
    let cells: Vec<Vec<String>> = report
        .rows
        .iter()
        .map(|row| row.values().iter().map(format_value).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();
    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    // writeln! appends to the String
    writeln!(&mut output, "{}", line(&headers)).ok();
    writeln!(
        &mut output,
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
    ).ok();
    for row in &cells {
        writeln!(&mut output, "{}", line(row)).ok();
    }
    writeln!(
        &mut output,
        "({} row{})",
        report.row_count,
        if report.row_count == 1 { "" } else { "s" }
    ).ok();

    output
}
