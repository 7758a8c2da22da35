use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use nebula_api_rust::app::app;
use nebula_api_rust::config::AppConfig;
use nebula_api_rust::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "nebula-api-rust", about = "Pluggable in-memory REST data server")]
struct Args {
    /// Port to listen on (overrides NEBULA_PORT/PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Directory of seed files (<collection>.json, rules.json)
    #[arg(long)]
    seed_dir: Option<PathBuf>,

    /// Development mode
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up NEBULA_* overrides
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(seed_dir) = args.seed_dir {
        config.seed_dir = Some(seed_dir);
    }
    if args.dev {
        config.dev_mode = true;
    }

    let port = config.port;
    let state = AppState::from_config(config)?;
    let app = app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    println!("Server started on port {}. You can make requests to http://localhost:{}/", port, port);

    axum::serve(listener, app).await.context("server")?;
    Ok(())
}
