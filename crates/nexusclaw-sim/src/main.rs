//! `nexusclaw-sim` — a stdio harness for the AVP protocol engine.
//!
//! Reads one newline-delimited JSON request per line from stdin, feeds it
//! through [`nexusclaw_protocol::Dispatcher`] against an
//! [`nexusclaw_backend::InMemoryBackend`], and writes the response line to
//! stdout. Stands in for the USB CDC transport (AVP v0.1.0 §6), which is
//! out of scope for this workspace.

use std::io::{self, BufRead, Write};

use clap::Parser;
use nexusclaw_backend::InMemoryBackend;
use nexusclaw_protocol::Dispatcher;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "nexusclaw-sim")]
#[command(about = "Stdio simulator for the AVP protocol engine", long_about = None)]
struct Cli {
    /// Tracing filter, e.g. "info" or "nexusclaw_protocol=debug".
    #[arg(long, default_value = "info")]
    log_level: String,

    /// PIN the in-memory backend verifies AUTHENTICATE requests against.
    #[arg(long, default_value_t = nexusclaw_backend::DEFAULT_TEST_PIN.to_string())]
    default_pin: String,

    /// Override the device serial reported by DISCOVER/HW_CHALLENGE.
    #[arg(long)]
    serial: Option<String>,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&cli.log_level))
        .with_writer(io::stderr)
        .init();

    let mut backend = InMemoryBackend::new_seeded(0, 0, cli.default_pin);
    if let Some(serial) = cli.serial {
        backend = backend.with_serial(serial);
    }
    let mut dispatcher = Dispatcher::new(backend);

    tracing::info!("nexusclaw-sim ready, reading requests from stdin");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        tracing::debug!(op = %request_op(&line), "dispatching request");
        let response = dispatcher.handle_line(&line);
        tracing::debug!(outcome = %response_outcome(&response), "request handled");
        writeln!(out, "{response}")?;
        out.flush()?;
    }

    Ok(())
}

/// Pull just the `op` field out of a request line for logging. Never logs
/// the line itself — `pin`/`value`/`data` must never reach a log sink.
fn request_op(line: &str) -> String {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("op").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "unparseable".to_string())
}

/// Summarize a response line as `"ok"` or its error code, never the body —
/// a `RETRIEVE` success carries the secret value and must never be logged.
fn response_outcome(response: &str) -> String {
    match serde_json::from_str::<Value>(response) {
        Ok(v) if v.get("ok").and_then(Value::as_bool) == Some(true) => "ok".to_string(),
        Ok(v) => v
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| "error".to_string()),
        Err(_) => "unparseable".to_string(),
    }
}
