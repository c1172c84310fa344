//! Polity CLI: hydrate documents, run analytics, manage snapshots.
//!
//! Usage:
//!   polity hydrate <document> [--output path]
//!   polity analyze <document> [--run layout,community,...] [--year Y] [--output path]
//!   polity search <document> <query> [--top-k N]
//!   polity snapshot <subcommand> [--db path]
//!
//! Logging goes to stderr, filtered by `POLITY_LOG` (default `info`).

use clap::{Parser, Subcommand, ValueEnum};
use polity::analysis::{AnalysisOutput, AnalysisRequest, Coordinator, Outcome};
use polity::config::{default_config_path, PolityConfig};
use polity::ingest::{self, HydrationReport, Hydrator};
use polity::storage::{self, OpenStore, SnapshotStore, SqliteSnapshotStore};
use polity::{temporal, Graph};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polity", version, about = "Temporal signed-graph analytics")]
struct Cli {
    /// Path to YAML config (default: <config dir>/polity/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a document and print its canonical export
    Hydrate {
        /// Loose or canonical JSON document
        document: PathBuf,
        /// Write the canonical export here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run analytics and print a report
    Analyze {
        document: PathBuf,
        /// Algorithms to run, in order
        #[arg(long, value_enum, value_delimiter = ',', default_value = "layout,community,centrality,balance")]
        run: Vec<Algorithm>,
        /// Analyze only what is visible in this year
        #[arg(long)]
        year: Option<i32>,
        /// Write the annotated canonical export here
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Embed every node and rank them against a query
    Search {
        document: PathBuf,
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Manage stored snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
        /// Path to SQLite database file
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Hydrate a document and store it under a name
    Save { name: String, document: PathBuf },
    /// Print a stored snapshot as canonical JSON
    Show { name: String },
    /// List stored snapshots
    List,
    /// Delete a stored snapshot
    Delete { name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    Layout,
    Community,
    Centrality,
    Balance,
    Embed,
    Representation,
}

impl Algorithm {
    fn request(self, config: &PolityConfig) -> AnalysisRequest {
        match self {
            Algorithm::Layout => AnalysisRequest::Layout(config.layout.clone()),
            Algorithm::Community => AnalysisRequest::Community(config.community.clone()),
            Algorithm::Centrality => AnalysisRequest::Centrality(config.centrality.clone()),
            Algorithm::Balance => AnalysisRequest::Balance {
                mode: config.balance.mode,
            },
            Algorithm::Embed => AnalysisRequest::EmbedNodes,
            Algorithm::Representation => AnalysisRequest::Representation(config.representation.clone()),
        }
    }
}

/// Get the default database path (~/.local/share/polity/snapshots.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("polity").join("snapshots.db")
}

fn load_config(path: Option<PathBuf>) -> Result<PolityConfig, String> {
    let result = match path {
        Some(path) => PolityConfig::load(path),
        None => match default_config_path() {
            Some(path) => PolityConfig::load_or_default(path),
            None => Ok(PolityConfig::default()),
        },
    };
    result.map_err(|e| e.to_string())
}

fn read_document(hydrator: &Hydrator, path: &Path) -> Result<(Graph, HydrationReport), String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let (graph, report) = hydrator.load_str(&text).map_err(|e| e.to_string())?;
    for d in &report.diagnostics {
        eprintln!("dropped {:?} #{}: {}", d.kind, d.index, d.reason);
    }
    Ok((graph, report))
}

fn write_output(output: Option<&Path>, text: &str) -> Result<(), String> {
    match output {
        Some(path) => std::fs::write(path, text).map_err(|e| format!("cannot write '{}': {}", path.display(), e)),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn cmd_hydrate(config: &PolityConfig, document: &Path, output: Option<&Path>) -> Result<(), String> {
    let hydrator = Hydrator::new(config.hydration.clone());
    let (graph, report) = read_document(&hydrator, document)?;
    eprintln!(
        "{} nodes, {} edges, {} myths, {} dropped",
        report.nodes_added,
        report.edges_added,
        report.myths_added,
        report.diagnostics.len()
    );
    let json = ingest::export(&graph, 0).to_json().map_err(|e| e.to_string())?;
    write_output(output, &json)
}

fn print_outcome(kind: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Applied { output, summary } => match output {
            AnalysisOutput::Layout(r) => println!("{kind}: {} iterations, {} nodes placed", r.iterations, summary.updated),
            AnalysisOutput::Community(r) => println!(
                "{kind}: {} communities, modularity {:.4}",
                r.community_count, r.modularity
            ),
            AnalysisOutput::Centrality(r) => {
                let top = r
                    .scores
                    .iter()
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(id, s)| format!("{id} ({s:.4})"))
                    .unwrap_or_else(|| "-".to_string());
                println!("{kind}: most central {top}");
            }
            AnalysisOutput::Balance(r) => println!(
                "{kind}: {} triangles, {} balanced, {} unbalanced, frustration index {:.4}",
                r.triangles, r.balanced, r.unbalanced, r.frustration_index
            ),
            AnalysisOutput::Embeddings(r) => println!(
                "{kind}: {} vectors of dimension {} ({})",
                r.vectors.len(),
                r.dimension,
                r.model
            ),
            AnalysisOutput::Representation(r) => println!(
                "{kind}: final loss {:.4}",
                r.loss_history.last().copied().unwrap_or_default()
            ),
            AnalysisOutput::Search { hits } => println!("{kind}: {} hits", hits.len()),
        },
        Outcome::Failed(e) => println!("{kind}: failed: {e}"),
        Outcome::Discarded(reason) => println!("{kind}: discarded ({reason:?})"),
    }
}

async fn cmd_analyze(
    config: &PolityConfig,
    document: &Path,
    run: &[Algorithm],
    year: Option<i32>,
    output: Option<&Path>,
) -> Result<(), String> {
    let hydrator = Hydrator::new(config.hydration.clone());
    let (mut graph, _) = read_document(&hydrator, document)?;
    if let Some(year) = year {
        graph = temporal::visible_view(&graph, year);
    }
    let stats = graph.stats();
    println!(
        "graph: {} nodes, {} edges, density {:.4}",
        stats.node_count, stats.edge_count, stats.density
    );

    let mut coordinator = Coordinator::new(graph)
        .with_embedder(config.embedding.embedder())
        .with_merger(config.merge.merger());
    for algorithm in run {
        coordinator.submit(algorithm.request(config));
    }
    let completions = coordinator.drain().await.map_err(|e| e.to_string())?;
    for completion in &completions {
        print_outcome(completion.kind.as_str(), &completion.outcome);
    }

    if let Some(path) = output {
        let json = ingest::export(coordinator.graph(), coordinator.generation())
            .to_json()
            .map_err(|e| e.to_string())?;
        write_output(Some(path), &json)?;
    }
    Ok(())
}

async fn cmd_search(config: &PolityConfig, document: &Path, query: String, top_k: Option<usize>) -> Result<(), String> {
    let hydrator = Hydrator::new(config.hydration.clone());
    let (graph, _) = read_document(&hydrator, document)?;
    let mut coordinator = Coordinator::new(graph).with_embedder(config.embedding.embedder());
    // Search snapshots the graph on submit, so the vectors must be merged first
    let embedded = coordinator
        .run(AnalysisRequest::EmbedNodes)
        .await
        .map_err(|e| e.to_string())?;
    if let Outcome::Failed(e) = embedded.outcome {
        return Err(e.to_string());
    }
    let top_k = top_k.unwrap_or(config.embedding.top_k);
    let completion = coordinator
        .run(AnalysisRequest::Search { query, top_k })
        .await
        .map_err(|e| e.to_string())?;
    match completion.outcome {
        Outcome::Applied {
            output: AnalysisOutput::Search { hits },
            ..
        } => {
            for hit in hits {
                println!("{:.4}  {:<32}  {}", hit.score, hit.node, hit.label);
            }
            Ok(())
        }
        other => Err(format!("search did not complete: {:?}", other)),
    }
}

fn cmd_snapshot(config: &PolityConfig, action: SnapshotAction, db: Option<PathBuf>) -> Result<(), String> {
    let db_path = db.unwrap_or_else(default_db_path);
    let store = SqliteSnapshotStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    match action {
        SnapshotAction::Save { name, document } => {
            let hydrator = Hydrator::new(config.hydration.clone());
            let (graph, _) = read_document(&hydrator, &document)?;
            let info = storage::save_graph(&store, &name, &graph, 0).map_err(|e| e.to_string())?;
            println!("Saved '{}' ({} nodes, {} edges)", info.name, info.node_count, info.edge_count);
        }
        SnapshotAction::Show { name } => {
            let json = store
                .load(&name)
                .and_then(|doc| Ok(serde_json::to_string_pretty(&doc)?))
                .map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        SnapshotAction::List => {
            let infos = store.list().map_err(|e| e.to_string())?;
            if infos.is_empty() {
                println!("No snapshots stored.");
                return Ok(());
            }
            println!("{:<24}  {:>6}  {:>6}  {}", "NAME", "NODES", "EDGES", "SAVED");
            println!("{}", "-".repeat(72));
            for info in infos {
                println!(
                    "{:<24}  {:>6}  {:>6}  {}",
                    info.name,
                    info.node_count,
                    info.edge_count,
                    info.saved_at.to_rfc3339()
                );
            }
        }
        SnapshotAction::Delete { name } => {
            if store.delete(&name).map_err(|e| e.to_string())? {
                println!("Deleted snapshot '{}'", name);
            } else {
                return Err(format!("snapshot '{}' not found", name));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("POLITY_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Hydrate { document, output } => cmd_hydrate(&config, &document, output.as_deref()),
        Commands::Analyze {
            document,
            run,
            year,
            output,
        } => cmd_analyze(&config, &document, &run, year, output.as_deref()).await,
        Commands::Search { document, query, top_k } => cmd_search(&config, &document, query, top_k).await,
        Commands::Snapshot { action, db } => cmd_snapshot(&config, action, db),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
