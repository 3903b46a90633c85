//! Entry point for one CT log node. Loads configuration, constructs the
//! engine's three loops (tree signer, cluster controller, lookup updater),
//! and runs them until a shutdown signal arrives.
//!
//! The persistent entry DB and replicated consistent-store backends are
//! pluggable collaborators this workspace defines only as traits
//! (`ctlog_entrydb::EntryDb`, `ctlog_store::ConsistentStore`) — key custody,
//! the HTTP frontend, and the on-disk/replicated-KV backends are out of
//! scope here. This binary wires the in-memory implementations so the node
//! is runnable standalone; a production deployment swaps those two
//! constructors for its own backends without touching the loops below.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use ctlog_cluster::ClusterController;
use ctlog_core::config::LogConfig;
use ctlog_crypto::signer::Ed25519Signer;
use ctlog_election::LeaseElection;
use ctlog_lookup::LogLookup;
use ctlog_signer::SequencingLoop;
use ctlog_testkit::{InMemoryElectionBackend, InMemoryEntryDb, LocalStore};

#[derive(Parser)]
#[command(name = "ctlog-node")]
#[command(about = "Runs one CT log node's signing, clustering, and lookup loops", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Missing fields fall back to defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stable identifier for this node within the cluster.
    #[arg(long, default_value = "node-1")]
    node_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => LogConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => LogConfig::default(),
    };

    tracing::info!(node_id = %cli.node_id, "starting ctlog-node");

    let entry_db = Arc::new(InMemoryEntryDb::new());
    let store = Arc::new(LocalStore::new());
    let election_backend = Arc::new(InMemoryElectionBackend::new());
    // A production deployment supplies a `Signer` backed by an HSM or KMS;
    // key custody is out of scope here (ctlog_crypto::signer module docs).
    let signer = Arc::new(Ed25519Signer::generate());

    let elector = LeaseElection::new(election_backend, config.leader_lease_ms, config.leader_refresh_ms);
    let node_id_for_log = cli.node_id.clone();
    let leader = elector
        .run(cli.node_id.clone(), move || {
            tracing::warn!(node_id = %node_id_for_log, "leadership lease lost, sequencing loop will stop");
        })
        .await
        .context("acquiring leadership lease")?;

    let mut sequencing_loop = SequencingLoop::resume(entry_db.clone(), store.clone(), signer, config.clone())
        .await
        .context("resuming sequencing loop from durable state")?;

    let cluster_controller = Arc::new(ClusterController::new(store.clone(), config.clone(), cli.node_id.clone()));
    let cluster_entry_db = entry_db.clone();
    let cluster_period_ms = config.serving_freshness_window_ms / 4;
    let cluster_task = tokio::spawn(async move {
        cluster_controller.run(cluster_entry_db, cluster_period_ms.max(1)).await
    });

    let lookup = Arc::new(LogLookup::new(entry_db.clone()));
    let lookup_store = store.clone();
    let lookup_handle = lookup.clone();
    let lookup_period_ms = config.signing_interval_ms;
    let lookup_task = tokio::spawn(async move {
        loop {
            if let Ok(Some(sth)) = lookup_store.get_serving_sth().await {
                if sth.tree_size > lookup_handle.current_sth().await.tree_size {
                    if let Err(err) = lookup_handle.rebuild(sth).await {
                        tracing::error!(%err, "lookup rebuild failed");
                    }
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(lookup_period_ms)).await;
        }
    });

    tokio::select! {
        result = sequencing_loop.run(&leader) => {
            result.context("sequencing loop exited")?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping node");
        }
    }

    cluster_task.abort();
    lookup_task.abort();
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
