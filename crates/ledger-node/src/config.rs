use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node")]
pub struct NodeConfig {
    /// Address for the HTTP API, e.g. 127.0.0.1:3001
    #[arg(long, env = "HTTP_LISTEN", default_value = "127.0.0.1:3001")]
    pub http_listen: String,

    /// Address for peer-to-peer connections
    #[arg(long, env = "P2P_LISTEN", default_value = "127.0.0.1:5001")]
    pub p2p_listen: String,

    /// Peers to dial at startup, comma separated (host:port)
    #[arg(long, env = "PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = NodeConfig::try_parse_from(["ledger-node"]).unwrap();
        assert_eq!(config.http_listen, "127.0.0.1:3001");
        assert_eq!(config.p2p_listen, "127.0.0.1:5001");
    }

    #[test]
    fn peers_split_on_commas() {
        let config = NodeConfig::try_parse_from([
            "ledger-node",
            "--p2p-listen",
            "0.0.0.0:5003",
            "--peers",
            "127.0.0.1:5001,127.0.0.1:5002",
        ])
        .unwrap();
        assert_eq!(config.p2p_listen, "0.0.0.0:5003");
        assert_eq!(config.peers, vec!["127.0.0.1:5001", "127.0.0.1:5002"]);
    }
}
