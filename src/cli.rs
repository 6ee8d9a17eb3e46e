use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Session demo CLI (library-facing definitions)
#[derive(Debug, Parser)]
#[command(name = "session-demo", about = "Drive a simulated Monero wallet session")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Session settings (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the simulated wallet files
    #[arg(long, default_value = "./wallets")]
    pub wallet_dir: PathBuf,

    /// Wallet name
    #[arg(long, default_value = "demo")]
    pub name: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan from 1 up to the chain height in steps, emitting refresh ticks
    Sync {
        #[arg(long, default_value_t = 105_000)]
        chain_height: u64,
        #[arg(long, default_value_t = 25_000)]
        step: u64,
    },
    /// Rebuild the wallet from seed at a restore height, then scan to the tip
    Rescan {
        #[arg(long)]
        height: u64,
        #[arg(long)]
        password: String,
        #[arg(long)]
        chain_height: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync() {
        let cli = Cli::parse_from(["session-demo", "sync", "--chain-height", "2000", "--step", "500"]);
        assert_eq!(cli.wallet_dir, PathBuf::from("./wallets"));
        match cli.command {
            Commands::Sync { chain_height, step } => {
                assert_eq!(chain_height, 2000);
                assert_eq!(step, 500);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rescan_requires_password() {
        assert!(Cli::try_parse_from(["session-demo", "rescan", "--height", "700000"]).is_err());
        let cli = Cli::try_parse_from([
            "session-demo",
            "--wallet-dir",
            "/tmp/w",
            "rescan",
            "--height",
            "700000",
            "--password",
            "x",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Rescan { height: 700_000, .. }));
    }
}
