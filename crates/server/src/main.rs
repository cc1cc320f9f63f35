// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quaero server binary. Default invocation starts the server; the only
//! recognised flag is `--version`.

use clap::Parser;
use quaero_server::config::{Config, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Self-hosted knowledge base: crawl, persist, search, chat.
#[derive(Debug, Parser)]
#[command(name = "quaero", version, disable_help_subcommand = true)]
struct Cli {}

fn init_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    match &config.logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "quaero.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _cli = Cli::parse();

    // Config file: QUAERO_CONFIG wins, else ./quaero.toml when present.
    let config_path = std::env::var_os("QUAERO_CONFIG").map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("quaero: {e}");
            return ExitCode::FAILURE;
        }
    };
    if config_path.is_none() && !std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
        eprintln!("quaero: no {DEFAULT_CONFIG_FILE} found, using defaults");
    }

    let _guard = init_tracing(&config);

    match quaero_server::startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("quaero: {e}");
            ExitCode::FAILURE
        }
    }
}
