mod constants;
mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use ledger_core::{Chain, ChainConfig, MiningStrategy, SharedChain};
use parking_lot::Mutex;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "LEDGER_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,

    /// Leading zero hex digits required of a mined block hash
    #[arg(long, env = "LEDGER_DIFFICULTY", default_value_t = ledger_core::constants::DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Amount credited to the miner each round
    #[arg(long, env = "LEDGER_REWARD", default_value_t = ledger_core::constants::BLOCK_REWARD)]
    reward: u64,

    /// Split the nonce search across all cores
    #[arg(long, env = "LEDGER_PARALLEL")]
    parallel: bool,
}

impl Args {
    fn chain_config(&self) -> ChainConfig {
        let strategy = if self.parallel {
            MiningStrategy::Parallel
        } else {
            MiningStrategy::Sequential
        };
        ChainConfig::default()
            .with_difficulty(self.difficulty)
            .with_reward(self.reward)
            .with_strategy(strategy)
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) chain: SharedChain,
    /// Cancel handle of the round in flight, if any.
    pub(crate) round: Arc<Mutex<Option<ledger_core::pow::CancelToken>>>,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/healthz", get(routes::health))
        .route("/chain/head", get(routes::head))
        .route("/chain/blocks", get(routes::blocks))
        .route("/chain/validate", get(routes::validate))
        .route("/tx", post(routes::submit_tx))
        .route("/mine", post(routes::mine).delete(routes::cancel_mining))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.chain_config();
    let chain = Chain::with_config(config.clone())?;
    info!(
        difficulty = config.difficulty,
        reward = config.reward_amount,
        strategy = ?config.strategy,
        "genesis {}",
        chain.last_block().hash_hex().unwrap_or_default()
    );

    let state = AppState {
        chain: SharedChain::new(chain),
        round: Arc::new(Mutex::new(None)),
    };

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app(state)).await?;
    Ok(())
}
