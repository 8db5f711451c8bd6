use hilbert_service::ServiceConfig;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Variable holding the log filter, e.g. `HILBERT_LOG=hilbert_service=debug`.
pub const LOG_ENV: &str = "HILBERT_LOG";

/// Log to stderr so JSON on stdout stays parseable.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn read_json_file_or_exit<T>(path: &Path, label: &str) -> T
where
    T: serde::de::DeserializeOwned,
{
    let bytes = fs::read(path).unwrap_or_else(|e| {
        exit_with(format!("failed to read {label} at {}: {e}", path.display()))
    });
    serde_json::from_slice::<T>(&bytes).unwrap_or_else(|e| {
        exit_with(format!("failed to parse {label} JSON at {}: {e}", path.display()))
    })
}

pub fn load_config_or_exit(path: Option<&Path>) -> ServiceConfig {
    ServiceConfig::load_or_default(path).unwrap_or_else(|e| exit_with(e))
}

pub fn print_json<T: Serialize>(payload: &T) {
    let rendered = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|e| exit_with(format!("json serialization: {e}")));
    println!("{rendered}");
}

pub fn yes_no(ok: bool) -> &'static str {
    if ok { "yes" } else { "no" }
}
