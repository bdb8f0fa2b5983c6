use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::{KeyPair, Transaction};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the minimal ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, env = "LEDGER_NODE", default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a secp256k1 keypair
    Keygen,
    /// Sign a transfer locally and submit it
    Submit {
        /// Sender secret key (hex)
        #[arg(long, env = "LEDGER_SECRET_KEY")]
        secret_key: String,
        /// Recipient public key (hex)
        #[arg(long)]
        to: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Run a mining round on the node
    Mine {
        /// Address credited with the block reward
        #[arg(long)]
        reward_address: String,
    },
    /// Cancel the mining round in flight
    Cancel,
    /// Show the chain tip
    Head,
    /// List blocks
    Blocks {
        #[arg(long, default_value_t = 0)]
        from: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Ask the node to re-validate the whole chain
    Validate,
}

#[derive(Serialize)]
struct MineOut {
    reward_address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    let res = match cli.cmd {
        Command::Keygen => {
            let keys = KeyPair::generate();
            println!("secret: {}", keys.secret_key_hex());
            println!("public: {}", keys.public_key_hex());
            return Ok(());
        }
        Command::Submit {
            secret_key,
            to,
            amount,
        } => {
            let keys = KeyPair::from_secret_hex(&secret_key).context("parsing secret key")?;
            let tx = Transaction::new(keys.public_key_hex(), to, amount).sign(keys.secret_key());
            debug!(fingerprint = %ledger_core::to_hex(&tx.fingerprint()), "signed transaction");
            client.post(format!("{node}/tx")).json(&tx).send().await?
        }
        Command::Mine { reward_address } => {
            client
                .post(format!("{node}/mine"))
                .json(&MineOut { reward_address })
                .send()
                .await?
        }
        Command::Cancel => client.delete(format!("{node}/mine")).send().await?,
        Command::Head => client.get(format!("{node}/chain/head")).send().await?,
        Command::Blocks { from, limit } => {
            let mut url = format!("{node}/chain/blocks?from={from}");
            if let Some(limit) = limit {
                url.push_str(&format!("&limit={limit}"));
            }
            client.get(url).send().await?
        }
        Command::Validate => client.get(format!("{node}/chain/validate")).send().await?,
    };

    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
