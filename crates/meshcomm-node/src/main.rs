use std::path::PathBuf;

use clap::Parser;

use meshcomm_node::{Node, NodeConfig};

#[derive(Parser)]
#[command(name = "meshcomm-node", about = "Commissioning mesh node on a simulated stack")]
struct Cli {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Don't read operator commands from stdin
    #[arg(long)]
    simulate_only: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match NodeConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to load config from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => NodeConfig::default(),
    };

    // Initialize logging
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        meshcomm_node::logging::init_json(&config.logging.level);
    } else {
        meshcomm_node::logging::init(&config.logging.level);
    }

    let mut node = match Node::new(config) {
        Ok(node) => node,
        Err(e) => {
            tracing::error!("failed to create node: {e}");
            std::process::exit(1);
        }
    };
    let handle = node.shutdown_handle();

    // Spawn signal handler
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        handle.shutdown();
    });

    if let Err(e) = node.start() {
        tracing::error!("failed to start node: {e}");
        std::process::exit(1);
    }
    if !cli.simulate_only {
        node.spawn_console();
    }

    if let Err(e) = node.run().await {
        tracing::error!("event loop failed: {e}");
        std::process::exit(1);
    }
    node.shutdown().await;
}
