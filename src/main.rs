mod auth;
mod backup;
mod certificates;
mod clock;
mod config;
mod crypto;
mod error;
mod homework;
mod ipc;
mod login_log;
mod preferences;
mod store;
mod users;
mod workspace;

use serde_json::json;
use std::io::{self, BufRead, Write};
use std::process::exit;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;

fn log_level_from_env() -> Option<Level> {
    let level = std::env::var("LOG_LEVEL")
        .unwrap_or_default()
        .to_ascii_lowercase();
    match level.as_str() {
        "off" => None,
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => Some(Level::INFO),
    }
}

fn init_logging() {
    let Some(level) = log_level_from_env() else {
        return;
    };
    // stdout carries the protocol; logs go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to set global logger: {}", e);
    }
}

fn main() {
    dotenv::dotenv().ok();
    init_logging();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            exit(1)
        }
    };
    tracing::info!("educored {} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!(
        "Data directory '{}', time source {:?}",
        config.data_dir.display(),
        config.time_source
    );

    let mut state = ipc::AppState::new(config);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed; shutting down");
}
