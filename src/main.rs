use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use thesys::communication::run_advanced_messaging_workflow;
use thesys::utils::init_logger;
use thesys::{config::Config, create_router, AppState};

#[derive(Parser)]
#[command(name = "thesys", version, about = "Research assistant agents")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Run one orchestrated research query and print the report
    Research { query: String },
    /// Run the Scholar -> FactCheck -> Citation -> Context chain for one message
    Chat {
        message: String,
        #[arg(long)]
        chat_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);
    info!(server = ?config.server, "Configuration loaded");

    // Create shared state
    let state = AppState::from_config(config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state.clone()).await?,
        Command::Research { query } => {
            let report = state.orchestrator.execute_research_workflow(&query).await;
            println!("{}", serde_json::to_string_pretty(&*report)?);
        }
        Command::Chat { message, chat_id } => {
            let result = run_advanced_messaging_workflow(
                &state.protocol,
                &message,
                chat_id.as_deref(),
                state.config.bus.response_timeout(),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    state.protocol.shutdown().await;
    Ok(())
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
