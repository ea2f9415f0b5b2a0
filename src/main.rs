//! DagRelay CLI - run workflow graphs against a duplex provider endpoint

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use dagrelay::ast::{TaskNode, WorkflowGraph};
use dagrelay::binding::extract_refs;
use dagrelay::error::{FixSuggestion, RelayError};
use dagrelay::remote::{connect_tcp, AcceptAll, ProviderRegistry, StaticRegistry};
use dagrelay::runtime::{NodeRunState, RunReport, RunSettings, Runner};
use dagrelay::{execution_order, RelayConfig};

#[derive(Parser)]
#[command(name = "dagrelay")]
#[command(about = "DagRelay - workflow DAG execution over a remote request/response channel")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow graph
    Run {
        /// Path to a .yaml/.yml/.json graph
        file: PathBuf,

        /// Run input, bound to {{input}}
        #[arg(short, long, default_value = "")]
        input: String,

        /// Duplex endpoint (host:port), overrides config
        #[arg(short, long)]
        address: Option<String>,

        /// Available provider ids (repeatable); all named providers if omitted
        #[arg(short, long = "provider")]
        providers: Vec<String>,

        /// Per-invocation timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Additional attempts after a validation failure
        #[arg(long)]
        max_retries: Option<u32>,

        /// Only run nodes reachable from this node
        #[arg(long)]
        start: Option<String>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a workflow graph (load + order)
    Validate {
        /// Path to a .yaml/.yml/.json graph
        file: PathBuf,
    },

    /// Show effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            input,
            address,
            providers,
            timeout_ms,
            max_retries,
            start,
            json,
        } => {
            let opts = RunOptions {
                address,
                providers,
                timeout_ms,
                max_retries,
                start,
                json,
            };
            run_graph(&file, &input, opts).await
        }
        Commands::Validate { file } => validate_graph(&file),
        Commands::Config => show_config(),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

struct RunOptions {
    address: Option<String>,
    providers: Vec<String>,
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    start: Option<String>,
    json: bool,
}

async fn run_graph(file: &std::path::Path, input: &str, opts: RunOptions) -> Result<(), RelayError> {
    let config = RelayConfig::load()?.with_env();
    let graph = WorkflowGraph::from_path(file)?;

    let mut settings = RunSettings::from_config(&config);
    if let Some(ms) = opts.timeout_ms {
        settings.timeout = std::time::Duration::from_millis(ms);
    }
    if let Some(retries) = opts.max_retries {
        settings.max_retries = retries;
    }

    let address = opts
        .address
        .or_else(|| config.transport.address.clone())
        .ok_or_else(|| RelayError::ConfigError {
            reason: "no duplex endpoint: pass --address or set [transport] address".to_string(),
        })?;

    let providers = if opts.providers.is_empty() {
        config.providers.clone()
    } else {
        opts.providers
    };
    let registry: Arc<dyn ProviderRegistry> = if providers.is_empty() {
        Arc::new(AcceptAll)
    } else {
        Arc::new(providers.into_iter().collect::<StaticRegistry>())
    };

    println!(
        "{} Running '{}' ({} nodes) via {}",
        "→".cyan(),
        graph.name.as_deref().unwrap_or("workflow"),
        graph.len(),
        address.cyan().bold()
    );

    let connection = connect_tcp(&address, settings.timeout).await?;
    let mut runner = Runner::new(graph, connection.invoker(), registry).with_settings(settings);
    if let Some(start) = opts.start {
        runner = runner.with_start_node(start);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let report = runner.run_with_cancel(input, cancel).await;
    ctrl_c.abort();
    connection.shutdown();
    let report = report?;

    print_report(&report, opts.json);
    Ok(())
}

fn print_report(report: &RunReport, as_json: bool) {
    println!();
    for node in &report.nodes {
        let badge = match node.status {
            NodeRunState::Success => "[✓]".green(),
            NodeRunState::Error => "[✗]".red(),
            NodeRunState::Skipped => "[-]".dimmed(),
            _ => "[…]".yellow(),
        };
        let attempts = if node.attempts > 1 {
            format!(" ({} attempts)", node.attempts)
        } else {
            String::new()
        };
        println!("  {} {}{}", badge, node.label, attempts.dimmed());
        if let Some(error) = &node.error {
            println!("      {}", error.dimmed());
        }
    }

    if report.is_cancelled() {
        println!("\n{} Run cancelled", "!".yellow().bold());
    }

    let payload = if as_json {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string_pretty(&report.results)
    };
    if let Ok(text) = payload {
        println!("\n{}", "Results:".cyan().bold());
        println!("{}", text);
    }
}

fn validate_graph(file: &std::path::Path) -> Result<(), RelayError> {
    let graph = WorkflowGraph::from_path(file)?;
    let order = execution_order(&graph, None)?;

    println!("{} Graph '{}' is valid", "✓".green(), file.display());
    println!("  Nodes: {}", graph.len());
    println!("  Edges: {}", graph.edges.len());
    println!("  Order: {}", order.iter().map(|id| id.as_ref()).collect::<Vec<_>>().join(" → "));

    for node in &graph.nodes {
        if let TaskNode::Work(work) = node {
            let refs = extract_refs(&work.template);
            let provider = work.provider.as_deref().unwrap_or("(none)");
            println!(
                "  {} {} [{}] uses: {}",
                "•".cyan(),
                work.id,
                provider,
                if refs.is_empty() { "-".to_string() } else { refs.join(", ") }
            );
        }
    }

    Ok(())
}

fn show_config() -> Result<(), RelayError> {
    let config = RelayConfig::load()?.with_env();
    let text = toml::to_string_pretty(&config).map_err(|e| RelayError::ConfigError {
        reason: e.to_string(),
    })?;

    println!("{} {}", "Config:".cyan().bold(), RelayConfig::config_path().display());
    println!("{}", text);
    Ok(())
}
