mod config;
mod embedding;
mod errors;
mod pipeline;
mod ranking;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, PipelineFiles};
use crate::ranking::ranker::SimilarityRanker;
use crate::routes::build_router;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "ranker", version)]
#[command(about = "Ranks job postings by embedding similarity to a résumé", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Postings JSON (a list or a single posting). Falls back to piped stdin,
    /// then to `output_file_requirements` from the pipeline config
    input: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Port to listen on; overrides PORT
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Serve { port }) => serve(port).await,
        None => batch(cli.input).await,
    };

    // The pipeline orchestrator reads failures from stderr as JSON.
    if let Err(e) = result {
        let body = serde_json::json!({ "error": format!("{e:#}") });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| e.to_string())
        );
        std::process::exit(1);
    }
}

async fn init(config: &Config) -> Result<SimilarityRanker> {
    // Logs go to stderr; stdout carries the ranking in batch mode.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let provider = config.build_provider().await?;
    info!("Embedding provider initialized (model: {})", provider.model());

    Ok(SimilarityRanker::new(provider))
}

async fn serve(port: Option<u16>) -> Result<()> {
    let config = Config::from_env()?;
    let ranker = init(&config).await?;

    info!("Starting ranker API v{}", env!("CARGO_PKG_VERSION"));

    let app = build_router(AppState { ranker })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", port.unwrap_or(config.port)).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn batch(input: Option<PathBuf>) -> Result<()> {
    let config = Config::from_env()?;
    let ranker = init(&config).await?;
    let files = PipelineFiles::load(&config.pipeline_config_path)?;

    pipeline::run(&ranker, &files, input).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("ranker").chain(args.iter().copied()))
    }

    #[test]
    fn test_serve_subcommand() {
        let cli = parse(&["serve"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve { port: None })));
    }

    #[test]
    fn test_serve_port_flag() {
        let cli = parse(&["serve", "--port", "9000"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve { port: Some(9000) })));
    }

    #[test]
    fn test_batch_with_input_file() {
        let cli = parse(&["vagas.json"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.input, Some(PathBuf::from("vagas.json")));
    }

    #[test]
    fn test_batch_without_arguments() {
        let cli = parse(&[]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.input.is_none());
    }

    #[test]
    fn test_help_is_not_read_as_input_file() {
        let err = parse(&["--help"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let err = parse(&["--verbose"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }
}
