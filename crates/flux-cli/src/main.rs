//! Flux CLI - natural-language experiment orchestration
//!
//! Usage:
//!   flux serve                  Start the HTTP API server
//!   flux route <query>          Show the routing decision for a query
//!   flux run <query>            Execute a request in-process
//!   flux history [terms...]     Search the execution history log
//!   flux score <run-id>         Reproducibility assessment for a run
//!   flux init-config [path]     Write the default configuration file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use flux_core::{FluxConfig, ProgressEventKind, RequestState, RoutingMode};
use flux_orchestrator::Orchestrator;
use flux_router::{build_specification, IntentRouter};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "flux")]
#[command(author, version, about = "Natural-language experiment orchestration")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, default_value = "flux.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show the routing decision and extracted specification for a query
    Route {
        /// Natural-language experiment request
        query: String,

        /// Consult the semantic classifier as well
        #[arg(long)]
        thorough: bool,
    },

    /// Execute one request in-process and stream its progress
    Run {
        /// Natural-language experiment request
        query: String,

        /// Consult the semantic classifier as well
        #[arg(long)]
        thorough: bool,
    },

    /// Search the execution history log
    History {
        /// Search terms (all records when omitted)
        terms: Vec<String>,

        /// Maximum records to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Reproducibility assessment for a completed run
    Score {
        /// Run identifier, e.g. r-1a2b3c4d5e6f
        run_id: String,
    },

    /// Write the default configuration file
    InitConfig {
        /// Target path
        #[arg(default_value = "flux.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = FluxConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve { bind } => cmd_serve(config, bind).await,
        Commands::Route { query, thorough } => cmd_route(config, &query, thorough).await,
        Commands::Run { query, thorough } => cmd_run(config, &query, thorough).await,
        Commands::History { terms, limit } => cmd_history(config, terms, limit).await,
        Commands::Score { run_id } => cmd_score(config, &run_id).await,
        Commands::InitConfig { path } => cmd_init_config(&path),
    }
}

async fn cmd_serve(mut config: FluxConfig, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind_addr = bind;
    }
    flux_server::serve(&config).await?;
    Ok(())
}

fn routing_mode(thorough: bool) -> RoutingMode {
    if thorough {
        RoutingMode::Thorough
    } else {
        RoutingMode::Fast
    }
}

async fn cmd_route(config: FluxConfig, query: &str, thorough: bool) -> Result<()> {
    let router = IntentRouter::new(&config.router);
    let decision = router.route(query, routing_mode(thorough)).await;
    let spec = build_specification(query, decision.specialist);

    println!("{}", serde_json::to_string_pretty(&decision)?);
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

async fn cmd_run(config: FluxConfig, query: &str, thorough: bool) -> Result<()> {
    let router = IntentRouter::new(&config.router);
    let decision = router.route(query, routing_mode(thorough)).await;
    let spec = build_specification(query, decision.specialist);
    flux_core::canonicalize(&spec)?;

    let orchestrator = Arc::new(Orchestrator::builtin(&config));
    let request = orchestrator.requests().create(query).await;
    orchestrator
        .requests()
        .set_decision(request.id, decision.clone())
        .await?;

    let publisher = orchestrator.publisher();
    publisher
        .publish(
            request.id,
            ProgressEventKind::RoutingStarted {
                query: query.to_string(),
            },
        )
        .await;
    publisher
        .publish(request.id, ProgressEventKind::RoutingComplete { decision })
        .await;

    let mut subscription = publisher.subscribe(request.id).await;
    orchestrator.dispatch(request.id, spec).await?;

    while let Some(event) = subscription.next().await {
        println!("{}", serde_json::to_string(&event)?);
    }

    let request = orchestrator.requests().get(request.id).await?;
    match request.state {
        RequestState::Completed => Ok(()),
        state => anyhow::bail!(
            "request ended in state {}: {}",
            state,
            request.error.unwrap_or_default()
        ),
    }
}

async fn cmd_history(config: FluxConfig, terms: Vec<String>, limit: usize) -> Result<()> {
    let store = flux_orchestrator::HistoryStore::new(&config.history.path);
    let records = store.search(&terms, limit).await?;
    if records.is_empty() {
        println!("No matching history records");
        return Ok(());
    }
    for record in records {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

async fn cmd_score(config: FluxConfig, run_id: &str) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::builtin(&config));
    let (run, assessment) = orchestrator.assess_run(run_id).await?;

    println!("run {}: keff {:.5} +/- {:.5}", run.run_id, run.keff, run.keff_std);
    println!(
        "reproducibility {} / 100 ({})",
        assessment.score, assessment.rating
    );
    for factor in &assessment.factors {
        println!(
            "  {:<26} {:>2}/{:<2}  {}",
            factor.name, factor.points, factor.max_points, factor.rationale
        );
    }
    for recommendation in &assessment.recommendations {
        println!("  -> {}", recommendation);
    }
    Ok(())
}

fn cmd_init_config(path: &PathBuf) -> Result<()> {
    FluxConfig::write_default(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
