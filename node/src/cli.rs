//! # CLI Interface
//!
//! Command-line structure for `merit-wallet`, built with `clap` derive.
//! Every flag that makes sense in a script also reads from a
//! `MERIT_WALLET_*` environment variable.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use merit_wallet_core::address::Network;
use merit_wallet_core::credentials::DerivationStrategy;

use crate::logging::LogFormat;

/// Offline tools and a notification watcher for the Merit wallet engine.
#[derive(Parser, Debug)]
#[command(
    name = "merit-wallet",
    about = "Merit wallet engine tools",
    version,
    propagate_version = true
)]
pub struct MeritWalletCli {
    /// Log output format.
    #[arg(long, global = true, env = "MERIT_WALLET_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default filter when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "MERIT_WALLET_LOG", default_value = "merit_wallet=info,merit_wallet_core=info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the key derivation self-test.
    Selftest,
    /// Create fresh credentials and print the mnemonic, xpub and copayer id.
    Keygen(KeygenArgs),
    /// Derive a single-key address from an xpub.
    Address(AddressArgs),
    /// Build an m-of-n multisig address from public keys, in the given order.
    Multisig(MultisigArgs),
    /// Decode a hex block, print its header and check the merkle root.
    DecodeBlock(DecodeBlockArgs),
    /// Poll the coordinating service and print notifications as JSON lines.
    Watch(WatchArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NetworkArg {
    Livenet,
    Testnet,
}

impl From<NetworkArg> for Network {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Livenet => Network::Livenet,
            NetworkArg::Testnet => Network::Testnet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Bip44,
    Bip45,
}

impl From<StrategyArg> for DerivationStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Bip44 => DerivationStrategy::Bip44,
            StrategyArg::Bip45 => DerivationStrategy::LegacyMultisig,
        }
    }
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    #[arg(long, short = 'n', env = "MERIT_WALLET_NETWORK", value_enum, default_value_t = NetworkArg::Livenet)]
    pub network: NetworkArg,

    #[arg(long, default_value_t = 0)]
    pub account: u32,

    #[arg(long, value_enum, default_value_t = StrategyArg::Bip44)]
    pub strategy: StrategyArg,

    /// Write an exported credentials file here.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Encrypt the exported file with this password.
    #[arg(long, env = "MERIT_WALLET_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Parser, Debug)]
pub struct AddressArgs {
    /// Extended public key (xpub / tpub).
    pub xpub: String,

    /// Path below the xpub, e.g. `0/5`.
    #[arg(long, short = 'p', default_value = "m/0/0")]
    pub path: String,
}

#[derive(Parser, Debug)]
pub struct MultisigArgs {
    /// Required signatures.
    #[arg(long, short = 'm')]
    pub required: usize,

    #[arg(long, short = 'n', env = "MERIT_WALLET_NETWORK", value_enum, default_value_t = NetworkArg::Livenet)]
    pub network: NetworkArg,

    /// Hex compressed public keys.
    #[arg(required = true)]
    pub pubkeys: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct DecodeBlockArgs {
    /// Hex-encoded block. Read from `--file` when omitted.
    pub hex: Option<String>,

    /// File containing the hex-encoded block.
    #[arg(long, short = 'f', conflicts_with = "hex")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Client configuration (TOML). Defaults apply when omitted.
    #[arg(long, short = 'c', env = "MERIT_WALLET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Credentials file written by `keygen --out`.
    #[arg(long, env = "MERIT_WALLET_CREDENTIALS")]
    pub credentials: PathBuf,

    #[arg(long, env = "MERIT_WALLET_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Also print notifications caused by this copayer.
    #[arg(long)]
    pub include_own: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        MeritWalletCli::command().debug_assert();
    }

    #[test]
    fn multisig_args_parse() {
        let cli = MeritWalletCli::parse_from(["merit-wallet", "multisig", "-m", "2", "-n", "testnet", "aa", "bb"]);
        let Commands::Multisig(args) = cli.command else {
            panic!("expected multisig");
        };
        assert_eq!(args.required, 2);
        assert_eq!(Network::from(args.network), Network::Testnet);
        assert_eq!(args.pubkeys, vec!["aa", "bb"]);
    }

    #[test]
    fn decode_block_rejects_both_sources() {
        let parsed = MeritWalletCli::try_parse_from(["merit-wallet", "decode-block", "00", "--file", "x.hex"]);
        assert!(parsed.is_err());
    }
}
