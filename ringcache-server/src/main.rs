//! CLI entry point: boots a ringcache node — a peer RPC listener, an HTTP
//! front-end shim, and static-discovery bootstrap — as a single runnable
//! binary.

mod bootstrap;
mod http;
mod metrics;
mod peer_rpc;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use ringcache_client::PeerClient;
use ringcache_common::Error;
use ringcache_core::{
    Discovery, Getter, GetterFunc, GroupRegistry, PeerFactory, PeerGetter, PeerPicker,
    PeerRegistry, StaticDiscovery,
};

use metrics::Metrics;

/// Virtual nodes per real node on the hash ring.
const DEFAULT_REPLICAS: usize = 50;
const MAIN_CACHE_BYTES: i64 = 2 << 20;
const HOT_CACHE_BYTES: i64 = 2 << 17;

#[derive(Parser, Debug)]
#[command(name = "ringcache-server", about = "Distributed in-memory KV cache node")]
struct Cli {
    /// This node's name; must appear in --peer.
    #[arg(long)]
    name: String,

    /// This node's own address (host:port). Falls back to $IP_ADDRESS:<port>.
    #[arg(long)]
    addr: Option<String>,

    /// Port the peer RPC listener binds to.
    #[arg(long, default_value_t = 8888)]
    port: u16,

    /// Comma-separated peer names; must include --name.
    #[arg(long)]
    peer: String,

    /// Comma-separated name=host:port pairs resolved by the static
    /// discovery adapter, e.g. `a=10.0.0.1:8888,b=10.0.0.2:8888`.
    #[arg(long)]
    discovery: String,

    /// Address the HTTP front-end listens on.
    #[arg(long, default_value = "0.0.0.0:9999")]
    api_addr: String,
}

fn parse_discovery_table(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut table = HashMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (name, addr) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("--discovery entries must be name=host:port, got {entry}"))?;
        table.insert(name.to_string(), addr.to_string());
    }
    Ok(table)
}

/// Demo "source of truth": a fixed in-memory map. A production deployment
/// supplies its own `Getter`; this exists so the binary is runnable out of
/// the box.
fn example_getter() -> Arc<dyn Getter> {
    let store: HashMap<&str, &str> = HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]);
    Arc::new(GetterFunc(move |key: &str| {
        store
            .get(key)
            .map(|v| v.as_bytes().to_vec())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if !cli.peer.split(',').any(|p| p == cli.name) {
        anyhow::bail!("--peer must contain --name ({})", cli.name);
    }
    if cli.peer.trim().is_empty() {
        anyhow::bail!("--peer is required");
    }

    let self_addr = match &cli.addr {
        Some(addr) => addr.clone(),
        None => {
            let ip = std::env::var("IP_ADDRESS")
                .map_err(|_| anyhow::anyhow!("set --addr, or the IP_ADDRESS environment variable"))?;
            format!("{ip}:{}", cli.port)
        }
    };

    let discovery_table = parse_discovery_table(&cli.discovery)?;
    let discovery = Arc::new(StaticDiscovery::new(discovery_table));
    discovery
        .register(&cli.name, &self_addr, Duration::from_secs(10))
        .await?;

    let peer_names: Vec<String> = cli
        .peer
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    tracing::info!(peers = ?peer_names, "waiting for other servers to register");
    bootstrap::wait_for_all_registered(discovery.as_ref(), &peer_names).await?;
    tracing::info!("all peers registered");

    let port = cli.port;
    let factory: PeerFactory = Arc::new(move |host: &str| {
        Arc::new(PeerClient::connect(format!("{host}:{port}"))) as Arc<dyn PeerGetter>
    });
    let peers = Arc::new(PeerRegistry::new(DEFAULT_REPLICAS, &self_addr, factory));

    for name in &peer_names {
        let addr = discovery.resolve(name).await?;
        let host = addr.split(':').next().unwrap_or(&addr).to_string();
        peers.add_peer_host(&host);
    }

    let groups = Arc::new(GroupRegistry::new());
    let group = groups.new_group("scores", MAIN_CACHE_BYTES, HOT_CACHE_BYTES, example_getter());
    group.register_peers(Arc::clone(&peers) as Arc<dyn PeerPicker>);

    let metrics = Arc::new(Metrics::new());

    let front_end = Arc::new(http::FrontEnd {
        group: Arc::clone(&group),
        peers: Arc::clone(&peers),
        discovery: Arc::clone(&discovery) as Arc<dyn Discovery>,
        metrics: Arc::clone(&metrics),
    });

    let api_addr = cli.api_addr.clone();
    let http_task = tokio::spawn(async move { front_end.serve(&api_addr).await });

    let peer_listen_addr = format!("0.0.0.0:{}", cli.port);
    let rpc_result = peer_rpc::serve(&peer_listen_addr, groups, metrics).await;

    http_task.abort();
    rpc_result
}
