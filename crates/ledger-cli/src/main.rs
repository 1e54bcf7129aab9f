use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for a proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:3001)
    #[arg(long, global = true, default_value = "http://127.0.0.1:3001")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's chain
    Blocks,
    /// Mine pending transactions into a new block
    Mine,
    /// Pay from the node's wallet
    Transact {
        /// Recipient address (public key hex)
        #[arg(long)]
        recipient: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Show the pending transaction pool
    Transactions,
    /// Balance of the node's wallet, or of --address
    Balance {
        #[arg(long)]
        address: Option<String>,
    },
    /// The node wallet's public key
    PublicKey,
}

#[derive(Serialize)]
struct TransactRequest {
    recipient: String,
    amount: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();

    let request = match cli.cmd {
        Command::Blocks => client.get(format!("{node}/blocks")),
        Command::Mine => client.post(format!("{node}/mine")),
        Command::Transact { recipient, amount } => client
            .post(format!("{node}/transact"))
            .json(&TransactRequest { recipient, amount }),
        Command::Transactions => client.get(format!("{node}/transactions")),
        Command::Balance { address: None } => client.get(format!("{node}/balance")),
        Command::Balance {
            address: Some(address),
        } => client.get(format!("{node}/balance/{address}")),
        Command::PublicKey => client.get(format!("{node}/public-key")),
    };

    let res = request.send().await?;
    let status = res.status();
    debug!(%status, "node responded");
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
