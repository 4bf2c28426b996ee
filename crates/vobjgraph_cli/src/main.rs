//! Command-line tool for a local object graph store.
//!
//! # Responsibility
//! - Verify `vobjgraph_core` wiring without any host runtime.
//! - Expose store maintenance (`reconcile`, `unreferenced`) and graph dumps.
//!
//! Output is one `key=value` line per fact so it stays greppable.

use clap::{Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;
use vobjgraph_core::{
    default_log_level, init_logging, layout_hierarchical, resolve_db_path, Canvas, ForceConfig,
    ForceSimulation, HierarchicalConfig, Record, Store, DB_PATH_ENV, DEFAULT_MAX_NODES,
};

#[derive(Parser)]
#[command(name = "vobjgraph")]
#[command(about = "Inspect and maintain a real/virtual object graph store")]
struct Cli {
    /// Store file; defaults to $VOBJGRAPH_DB_PATH or a file in the temp dir
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print health check and version
    Ping,
    /// Create an object with an empty record
    Create { name: String },
    /// Count one more link to an object
    Link { real_id: Uuid },
    /// Count one fewer link to an object
    Unlink { real_id: Uuid },
    /// List objects nothing links to
    Unreferenced,
    /// Recount every reference from stored links
    Reconcile,
    /// Deep-clone an object and everything it reaches
    Clone {
        real_id: Uuid,
        #[arg(long, default_value_t = DEFAULT_MAX_NODES)]
        max_nodes: usize,
    },
    /// Remove an object regardless of its reference count
    Delete { real_id: Uuid },
    /// Walk and lay out the graph rooted at an object
    Graph {
        real_id: Uuid,
        #[arg(long, default_value_t = DEFAULT_MAX_NODES)]
        max_nodes: usize,
        #[arg(long, value_enum, default_value_t = LayoutKind::Hierarchical)]
        layout: LayoutKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutKind {
    Hierarchical,
    Force,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = &cli.log_dir {
        init_logging(default_log_level(), log_dir)?;
    }
    if let Command::Ping = cli.command {
        println!("vobjgraph_core ping={}", vobjgraph_core::ping());
        println!("vobjgraph_core version={}", vobjgraph_core::core_version());
        return Ok(());
    }

    let store = Store::open(db_path(cli.db))?;
    {
        let service = store.service()?;
        match cli.command {
            Command::Ping => {}
            Command::Create { name } => {
                println!("real_id={}", service.create(name, Record::empty())?);
            }
            Command::Link { real_id } => {
                println!("ref_count={}", service.link_to(real_id)?);
            }
            Command::Unlink { real_id } => {
                println!("ref_count={}", service.unlink_from(real_id)?);
            }
            Command::Unreferenced => {
                for id in service.list_unreferenced()? {
                    println!("real_id={id}");
                }
            }
            Command::Reconcile => {
                let report = service.reconcile()?;
                println!(
                    "scanned={} repaired={} dangling_links={}",
                    report.scanned,
                    report.repairs.len(),
                    report.dangling_links
                );
                for repair in &report.repairs {
                    println!(
                        "repair real_id={} stored={} actual={}",
                        repair.real_id, repair.stored, repair.actual
                    );
                }
            }
            Command::Clone { real_id, max_nodes } => {
                let outcome = service.clone_deep(real_id, max_nodes)?;
                println!(
                    "new_root_id={} cloned={} truncated={}",
                    outcome.new_root_id,
                    outcome.clone_map.len(),
                    outcome.truncated
                );
            }
            Command::Delete { real_id } => {
                service.physical_delete(real_id)?;
                println!("deleted={real_id}");
            }
            Command::Graph {
                real_id,
                max_nodes,
                layout,
            } => {
                let graph = service.build_reference_graph(real_id, max_nodes)?;
                let nodes = match layout {
                    LayoutKind::Hierarchical => {
                        let mut nodes = graph.nodes.clone();
                        layout_hierarchical(&nodes, &HierarchicalConfig::default())
                            .apply_to(&mut nodes);
                        nodes
                    }
                    LayoutKind::Force => {
                        let mut simulation = ForceSimulation::from_graph(
                            &graph,
                            Canvas::new(1200.0, 900.0),
                            ForceConfig::default(),
                        );
                        let outcome = simulation.run();
                        println!(
                            "simulation={:?} iterations={}",
                            outcome,
                            simulation.iterations()
                        );
                        simulation.into_nodes()
                    }
                };
                println!(
                    "nodes={} edges={} truncated={}",
                    nodes.len(),
                    graph.edges.len(),
                    graph.truncated
                );
                for node in &nodes {
                    println!(
                        "node id={} real_id={} depth={} x={:.1} y={:.1}",
                        node.node_id, node.real_id, node.depth, node.position.x, node.position.y
                    );
                }
                for edge in &graph.edges {
                    println!("edge from={} to={}", edge.from, edge.to);
                }
            }
        }
    }
    store.close()?;
    Ok(())
}

fn db_path(explicit: Option<PathBuf>) -> PathBuf {
    resolve_db_path(explicit, std::env::var(DB_PATH_ENV).ok())
}
