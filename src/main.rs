//! repograph — PKG-grounded code-modification agent
//!
//! `serve` starts the WebSocket gateway; `pkg` builds or refreshes the
//! knowledge graph for a local tree; `query` runs one read-only query
//! against a generated graph.

use clap::{Parser, Subcommand};
use repograph_core::AgentConfig;
use repograph_gateway::{start_server, ServerConfig};
use repograph_query::QueryEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "repograph", about = "PKG-grounded code-modification agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        #[arg(short, long, default_value = "8765")]
        port: u16,
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
    },
    /// Generate (or refresh) the PKG for a local repository
    Pkg {
        /// Repository root
        repo: PathBuf,
        /// Ignore the pkg.json cache and rebuild
        #[arg(long)]
        no_cache: bool,
        /// Fan-in threshold for symbol summaries
        #[arg(long)]
        fan_threshold: Option<usize>,
    },
    /// Query a generated PKG
    Query {
        /// Repository root holding pkg.json
        repo: PathBuf,
        #[command(subcommand)]
        query: QueryCommand,
    },
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Modules matching a tag (case-insensitive substring on kinds)
    Tag { tag: String },
    /// Callers and callees of a module
    Deps { module_id: String },
    /// Transitive impact of a set of modules
    Impact {
        module_ids: Vec<String>,
        #[arg(long, default_value = "2")]
        depth: usize,
    },
    /// Entry-point modules
    Entries,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repograph=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, bind } => {
            init_tracing();
            start_server(ServerConfig {
                bind,
                port,
                agent: AgentConfig::from_env(),
            })
            .await?;
        }

        Commands::Pkg {
            repo,
            no_cache,
            fan_threshold,
        } => {
            init_tracing();
            let config = AgentConfig::from_env();
            let threshold = fan_threshold.unwrap_or(config.pkg_fan_threshold);
            let pkg = tokio::task::spawn_blocking(move || {
                repograph_pkg::generate_pkg(&repo, threshold, !no_cache)
            })
            .await??;
            println!(
                "PKG v{} for {}: {} modules, {} symbols, {} endpoints, {} edges, {} features",
                pkg.version,
                pkg.project.name,
                pkg.modules.len(),
                pkg.symbols.len(),
                pkg.endpoints.len(),
                pkg.edges.len(),
                pkg.features.len()
            );
        }

        Commands::Query { repo, query } => {
            init_tracing();
            let pkg = repograph_pkg::load_cached_pkg(&repo)
                .ok_or_else(|| anyhow::anyhow!("no valid pkg.json at {}", repo.display()))?;
            let engine = QueryEngine::new(Arc::new(pkg));
            match query {
                QueryCommand::Tag { tag } => {
                    for module in engine.modules_by_tag(&tag).await {
                        println!("{}  [{}]", module.path, module.kind.join(", "));
                    }
                }
                QueryCommand::Deps { module_id } => {
                    let deps = engine.dependencies(&module_id).await;
                    println!("callers ({}):", deps.fan_in);
                    for caller in &deps.callers {
                        println!("  {}", caller.path);
                    }
                    println!("callees ({}):", deps.fan_out);
                    for callee in &deps.callees {
                        println!("  {}", callee.path);
                    }
                }
                QueryCommand::Impact { module_ids, depth } => {
                    let impact = engine.impacted_modules(&module_ids, depth).await;
                    for path in &impact.files {
                        println!("{}", path);
                    }
                    println!("({} modules at depth {})", impact.module_ids.len(), depth);
                }
                QueryCommand::Entries => {
                    for module in engine.entry_point_modules() {
                        println!("{}", module.path);
                    }
                }
            }
        }

        Commands::Version => {
            println!("repograph v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
