mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use peer_pool::MetadataPeerStore;
use scheduler::{Master, MetadataSink};
use std::net::SocketAddrV4;
use std::process::ExitCode;
use std::sync::Arc;
use storage::StorageConfig;
use tokio::sync::Mutex;

const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);
const USER_AGENT: &str = concat!("crawler/", env!("CARGO_PKG_VERSION"));

struct StorageSink {
    config: StorageConfig,
}

impl MetadataSink for StorageSink {
    fn on_success(&self, info_hash: [u8; 20], info_dict: Vec<u8>, peer: SocketAddrV4) {
        if let Err(err) = storage::store(&self.config, info_hash, &info_dict, peer) {
            log::warn!(target: "torrent_block", "failed to store infohash {}: {}", hex::encode(info_hash), err);
        }
    }
}

mod hex {
    pub fn encode(bytes: [u8; 20]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new().filter_level(cli.log_level()).init();

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("fatal: failed to start async runtime: {err}");
            return ExitCode::from(2);
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fatal: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let listen_port = cli.bind.port();

    let bootstrap_path = cli.state_dir.join("bootstrap_nodes.jsonl");
    let peer_pool_path = cli.state_dir.join("metadata_peers.jsonl");

    let peer_pool = Arc::new(Mutex::new(load_peer_pool(&peer_pool_path)));

    let storage_config = StorageConfig {
        magnet_log_path: cli.magnet_log.clone(),
        torrent_dir: cli.torrent_dir.clone(),
        persist_torrent_files: cli.save_torrents && !cli.stdout_only,
    };
    let sink = Arc::new(StorageSink { config: storage_config });

    let (master, handle) = Master::new(
        scheduler::DEFAULT_QUEUE_CAPACITY,
        cli.concurrency,
        peer_pool.clone(),
        sink,
        listen_port,
        USER_AGENT.to_string(),
        scheduler::DEFAULT_EXTRA_PEERS_PER_INFOHASH,
    );

    let dht = dht_crawler::Dht::bind(cli.bind, bootstrap_path, handle)
        .await
        .with_context(|| format!("failed to bind DHT socket on {}", cli.bind))?;

    log::info!(target: "status", "listening on {}", dht.local_addr()?);

    let master_task = tokio::spawn(master.run());
    let dht_task = tokio::spawn(dht.run());

    tokio::signal::ctrl_c().await.context("failed to install ctrl-c handler")?;
    log::info!(target: "status", "shutdown requested, draining for {:?}", SHUTDOWN_GRACE);

    master_task.abort();
    dht_task.abort();
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    if let Err(err) = persist_peer_pool(&peer_pool_path, &peer_pool).await {
        log::warn!(target: "status", "failed to persist peer pool on shutdown: {err}");
    }

    Ok(())
}

fn load_peer_pool(path: &std::path::Path) -> MetadataPeerStore {
    match MetadataPeerStore::load(path, peer_pool::DEFAULT_CAPACITY, peer_pool::DEFAULT_TTL) {
        Ok(store) => store,
        Err(err) => {
            log::warn!(target: "status", "failed to load peer pool from {}: {}", path.display(), err);
            MetadataPeerStore::new(peer_pool::DEFAULT_CAPACITY, peer_pool::DEFAULT_TTL)
        }
    }
}

async fn persist_peer_pool(
    path: &std::path::Path,
    peer_pool: &Arc<Mutex<MetadataPeerStore>>,
) -> peer_pool::Result<()> {
    peer_pool.lock().await.persist(path)
}
