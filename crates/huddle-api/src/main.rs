//! Huddle REST API entry point.
//!
//! Binary name: `huddle`
//!
//! Parses CLI arguments, initializes the database and services, then
//! starts the REST API server.

mod http;
mod state;

use clap::{Parser, Subcommand};

use state::AppState;

#[derive(Parser)]
#[command(name = "huddle", version, about = "Group chat synchronization server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Export spans to the OpenTelemetry stdout exporter.
    #[arg(long, global = true)]
    otel: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1", env = "HUDDLE_HOST")]
        host: String,

        /// Port to listen on.
        #[arg(long, default_value_t = 8080, env = "HUDDLE_PORT")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Filtering via RUST_LOG; `-- --otel` adds the OTel stdout bridge.
    huddle_observe::tracing_setup::init_tracing(cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli.command).await;

    huddle_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port } => {
            let state = AppState::init().await?;
            let router = http::router::build_router(state);

            let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
            tracing::info!(%host, port, "huddle API listening");
            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}
