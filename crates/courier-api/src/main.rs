//! courier CLI, server and client entry point.
//!
//! Binary name: `courier`
//!
//! Parses CLI arguments, sets up tracing, loads configuration, then either
//! starts the HTTP/WebSocket server or runs a client command against one.

mod cli;
mod client;
mod http;
mod state;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use console::style;

use courier_infra::config::{
    apply_env_overrides, load_config, load_config_file, resolve_relative, TOKEN_SECRET_ENV,
};
use courier_infra::filesystem::resolve_data_dir;
use courier_observe::tracing_setup::{init_tracing, shutdown_tracing, TracingOptions};
use courier_types::config::{CourierConfig, ServerConfig};

use cli::{Cli, ClientContext, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut options = TracingOptions::from_verbosity(cli.verbose, cli.quiet);
    // The server is a long-running process; show its lifecycle by default.
    if matches!(cli.command, Commands::Serve { .. }) && cli.verbose == 0 && !cli.quiet {
        options.default_directive = "info".to_string();
    }
    options.json = cli.log_json;
    options.otel = cli.otel;
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir();
    let mut config = match &cli.config {
        Some(path) => load_config_file(path).await?,
        None => load_config(&data_dir).await,
    };
    apply_env_overrides(&mut config);

    let ctx = client_context(&cli, &data_dir, &config);
    let json = cli.json;

    match cli.command {
        Commands::Serve {
            addr,
            files_root,
            enforce_tokens,
        } => {
            let mut server = config.server;
            if let Some(addr) = addr {
                server.listen_addr = addr;
            }
            if enforce_tokens {
                server.enforce_tokens = true;
            }
            let files_root =
                files_root.unwrap_or_else(|| resolve_relative(&data_dir, &server.files_root));
            serve(server, &files_root).await?;
        }

        Commands::Greet { name, again } => {
            let client = ctx.connect()?;
            cli::auth::greet(&client, &name, again, json).await?;
        }

        Commands::Login { username, register } => {
            let mut client = ctx.connect()?;
            cli::auth::login(&mut client, username, register, json).await?;
        }

        Commands::Logout => {
            let mut client = ctx.connect()?;
            cli::auth::logout(&mut client, json).await?;
        }

        Commands::Token => {
            let mut client = ctx.connect()?;
            cli::auth::token(&mut client, json).await?;
        }

        Commands::Validate { token } => {
            let mut client = ctx.connect()?;
            cli::auth::validate(&mut client, token, json).await?;
        }

        Commands::Download { filename, output } => {
            let mut client = ctx.connect()?;
            client.ensure_fresh().await?;
            cli::download::download(&client, &filename, output, &ctx.download_prefix, json).await?;
        }

        Commands::Chat => {
            let mut client = ctx.connect()?;
            cli::auth::ensure_logged_in(&mut client, json).await?;
            cli::chat::chat(&client, json, false).await?;
        }

        Commands::Menu => {
            cli::menu::run(&ctx).await?;
        }
    }

    Ok(())
}

fn client_context(cli: &Cli, data_dir: &Path, config: &CourierConfig) -> ClientContext {
    ClientContext {
        server_url: cli
            .server
            .clone()
            .unwrap_or_else(|| config.client.server_url.clone()),
        credential_file: resolve_relative(data_dir, &config.client.credential_file),
        download_prefix: config.client.download_prefix.clone(),
        json: cli.json,
    }
}

async fn serve(server: ServerConfig, files_root: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(files_root)
        .await
        .with_context(|| format!("cannot create file root {}", files_root.display()))?;

    if server.token.uses_dev_secret() {
        tracing::warn!(
            "Using the built-in development token secret; set {TOKEN_SECRET_ENV} or server.token.secret"
        );
    }

    let state = AppState::new(&server, files_root)?;
    let listener = tokio::net::TcpListener::bind(&server.listen_addr)
        .await
        .with_context(|| format!("cannot listen on {}", server.listen_addr))?;

    println!(
        "  {} courier listening on {}",
        style("⚡").bold(),
        style(format!("http://{}", listener.local_addr()?)).cyan()
    );
    println!(
        "  {} serving files from {}",
        style("📁").bold(),
        style(state.transfer.source().root().display()).bold()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());
    tracing::info!(
        addr = %server.listen_addr,
        enforce_tokens = server.enforce_tokens,
        chunk_size = server.transfer.chunk_size,
        "server started"
    );

    let shutdown_state = state.clone();
    let router = http::router::build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_state.shutdown();
        })
        .await?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
