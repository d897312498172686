use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;

use insight_search::agent::StreamEvent;
use insight_search::api::create_router;
use insight_search::build_orchestrator;
use insight_search::config::Config;

#[derive(Parser)]
#[command(
    name = "insight-search",
    about = "Answers questions from web search snippets with cited, streamed LLM output"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the streaming HTTP API
    Serve {
        /// Override the PORT environment variable
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Answer a single question, printing the event stream
    Ask {
        /// The question to answer
        question: String,

        /// Print every event as a JSON line instead of the rendered answer
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = Config::from_env()?;
    let orchestrator = build_orchestrator(&config)?;

    match cli.command {
        Commands::Serve { port } => {
            let addr = format!("{}:{}", config.host, port.unwrap_or(config.port));
            let app = create_router(Arc::new(orchestrator), &config.cors_allowed_origins);

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .context(format!("Failed to bind {}", addr))?;
            tracing::info!(%addr, "Starting server");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;
        }
        Commands::Ask { question, json } => {
            let mut events = orchestrator.run(question);
            let mut stdout = std::io::stdout();
            let mut failed = false;
            let mut terminated = false;

            while let Some(event) = events.next().await {
                terminated = event.is_terminal();
                if json {
                    writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
                    failed |= matches!(event, StreamEvent::Error(_));
                    continue;
                }
                match event {
                    StreamEvent::Trace(label) => eprintln!("[trace] {}", label),
                    StreamEvent::Sources(sources) => {
                        eprintln!("[sources] {} found", sources.len());
                        for (i, s) in sources.iter().enumerate() {
                            eprintln!("  [{}] {} ({})", i + 1, s.title, s.url);
                        }
                        println!();
                    }
                    StreamEvent::Chunk(text) => {
                        write!(stdout, "{}", text)?;
                        stdout.flush()?;
                    }
                    StreamEvent::Error(message) => {
                        eprintln!("\n[error] {}", message);
                        failed = true;
                    }
                    StreamEvent::Done => println!("\n"),
                }
            }

            if failed {
                anyhow::bail!("Workflow ended with an error");
            }
            if !terminated {
                anyhow::bail!("Workflow stream ended without done or error");
            }
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    // Logs go to stderr so `ask` output stays clean on stdout.
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
