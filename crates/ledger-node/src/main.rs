use anyhow::Result;
use clap::Parser;
use ledger_core::{Chain, MemPool, TransactionPool, Wallet};
use ledger_node::api::{self, AppState};
use ledger_node::{Miner, NodeConfig};
use ledger_p2p::P2pServer;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = NodeConfig::parse();

    let chain = Chain::new();
    let pool: Arc<dyn TransactionPool> = Arc::new(MemPool::new());
    let wallet = Wallet::new();
    info!(public_key = %wallet.public_key(), "wallet ready");
    let wallet = Arc::new(Mutex::new(wallet));

    let p2p = Arc::new(P2pServer::new(chain.clone(), pool.clone()));
    p2p.listen(&config.p2p_listen).await?;
    p2p.connect_to_peers(&config.peers).await;

    let miner = Arc::new(Miner::new(
        chain.clone(),
        pool.clone(),
        wallet.clone(),
        p2p.clone(),
    )?);

    let state = AppState {
        chain,
        pool,
        wallet,
        p2p,
        miner,
    };
    let app = api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.http_listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
