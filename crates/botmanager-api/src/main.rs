//! Bot manager CLI and REST API entry point.
//!
//! Binary name: `botmgr`
//!
//! Parses CLI arguments, loads configuration, initializes the database and
//! services, then dispatches to the command handler or starts the REST API
//! server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use botmanager_infra::config::{load_service_config, resolve_data_dir};
use botmanager_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use cli::{Cli, Commands, KeyCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need config or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "botmgr", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    let config = load_service_config(&data_dir).await;

    let tracing_options = TracingOptions {
        json: config.log_json,
        otel: config.otel,
        ..TracingOptions::from_verbosity(cli.verbose > 0, cli.quiet)
    };
    init_tracing(&tracing_options).map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::debug!(data_dir = %data_dir.display(), "configuration loaded");

    // Initialize application state (DB, services)
    let state = AppState::init(data_dir, config).await?;

    let result = run(cli, state.clone()).await;

    state.db_pool.close().await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli, state: AppState) -> anyhow::Result<()> {
    match cli.command {
        Commands::Key { action } => match action {
            KeyCommand::Issue {
                owner,
                scopes,
                name,
            } => {
                cli::key::issue_key(&state, &owner, &scopes, &name, cli.json).await?;
            }
        },

        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| state.config.host.clone());
            let port = port.unwrap_or(state.config.port);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            tracing::info!(%addr, data_dir = %state.data_dir.display(), "bot manager API listening");
            if !cli.quiet && !cli.json {
                println!(
                    "  {} Bot manager API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            tracing::info!("server stopped");
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
