// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Merit Wallet CLI
//!
//! Entry point for the `merit-wallet` binary. Parses arguments, initializes
//! logging and dispatches to one of the subcommands:
//!
//! - `selftest`: run the key derivation self-test
//! - `keygen`: new mnemonic, xpub and copayer id
//! - `address`: derive an address from an xpub and path
//! - `multisig`: m-of-n address from ordered public keys
//! - `decode-block`: decode a hex block and check its merkle root
//! - `watch`: stream notifications from the coordinating service
//! - `version`: print build version information

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;

use merit_wallet_core::address::{Address, Network};
use merit_wallet_core::codec::{Block, Decodable};
use merit_wallet_core::config::{ClientConfig, CLIENT_VERSION};
use merit_wallet_core::credentials::{device_self_test, Credentials};
use merit_wallet_core::crypto::{DerivationPath, ExtendedPubKey, PublicKey};
use merit_wallet_core::script::build_multisig_out;
use merit_wallet_core::sync::{retry_transient, HttpTransport, NotificationPoller, RemoteClient};

use cli::{Commands, MeritWalletCli};

/// Buffered notifications between the poller and stdout.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MeritWalletCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Selftest => run_selftest(),
        Commands::Keygen(args) => keygen(args),
        Commands::Address(args) => {
            let address = derive_address(&args.xpub, &args.path)?;
            println!("{}", address);
            Ok(())
        }
        Commands::Multisig(args) => {
            let (address, redeem) = multisig_address(args.required, args.network.into(), &args.pubkeys)?;
            println!("address       : {}", address);
            println!("redeem script : {}", redeem);
            Ok(())
        }
        Commands::DecodeBlock(args) => decode_block(args),
        Commands::Watch(args) => watch(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn run_selftest() -> Result<()> {
    if !device_self_test() {
        bail!("key derivation self-test failed; this device must not sign");
    }
    println!("self-test passed");
    Ok(())
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let creds = Credentials::create(args.network.into(), args.account, args.strategy.into())
        .context("failed to create credentials")?;
    let mnemonic = creds.mnemonic(None)?.unwrap_or_default();

    println!("mnemonic   : {}", mnemonic);
    println!("xpub       : {}", creds.xpub_key());
    println!("copayer id : {}", creds.copayer_id());

    if let Some(out) = &args.out {
        write_credentials(&creds, out, args.password.as_deref())?;
        println!("written to : {}", out.display());
    }
    Ok(())
}

/// Export `creds` to `path`, readable by the owner only.
fn write_credentials(creds: &Credentials, path: &Path, password: Option<&str>) -> Result<()> {
    let exported = creds.export(password, true).context("failed to export credentials")?;
    std::fs::write(path, exported).with_context(|| format!("failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(path = %path.display(), encrypted = password.is_some(), "credentials exported");
    Ok(())
}

fn derive_address(xpub: &str, path: &str) -> Result<Address> {
    let xpub: ExtendedPubKey = xpub.trim().parse().context("invalid extended public key")?;
    let path = if path.starts_with('m') || path.starts_with('M') {
        path.to_string()
    } else {
        format!("m/{}", path)
    };
    let path: DerivationPath = path.parse().context("invalid derivation path")?;
    let child = xpub.derive_path(&path).context("derivation failed")?;
    Ok(Address::from_public_key(xpub.network, &child.public_key()))
}

/// Address and redeem script hex for an m-of-n multisig over `pubkeys`.
fn multisig_address(m: usize, network: Network, pubkeys: &[String]) -> Result<(Address, String)> {
    let keys = pubkeys
        .iter()
        .map(|k| {
            let bytes = hex::decode(k.trim()).with_context(|| format!("public key {} is not hex", k))?;
            PublicKey::from_slice(&bytes).with_context(|| format!("invalid public key {}", k))
        })
        .collect::<Result<Vec<_>>>()?;
    let redeem = build_multisig_out(&keys, m)?;
    Ok((Address::from_script(network, redeem.as_bytes()), redeem.to_hex()))
}

fn block_summary(raw_hex: &str) -> Result<serde_json::Value> {
    let bytes = hex::decode(raw_hex.trim()).context("block is not valid hex")?;
    let block = Block::decode(&bytes).context("failed to decode block")?;
    let header = &block.header;
    Ok(json!({
        "hash": block.hash().to_hex(),
        "version": header.version,
        "prevBlock": header.prev_block.to_hex(),
        "merkleRoot": header.merkle_root.to_hex(),
        "time": header.time,
        "bits": header.bits,
        "nonce": header.nonce,
        "transactions": block.tx_count(),
        "invites": block.invites.len(),
        "referrals": block.referrals.len(),
        "merkleRootValid": block.valid_merkle_root(),
    }))
}

fn decode_block(args: cli::DecodeBlockArgs) -> Result<()> {
    let raw = match (args.hex, args.file) {
        (Some(hex), _) => hex,
        (None, Some(file)) => {
            std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?
        }
        (None, None) => bail!("pass the block hex or --file"),
    };
    let summary = block_summary(&raw)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if summary["merkleRootValid"] != json!(true) {
        bail!("merkle root mismatch");
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            ClientConfig::from_toml_str(&text).with_context(|| format!("invalid config {}", path.display()))
        }
        None => Ok(ClientConfig::default()),
    }
}

async fn watch(args: cli::WatchArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    config.include_own_notifications |= args.include_own;

    let data = std::fs::read_to_string(&args.credentials)
        .with_context(|| format!("failed to read {}", args.credentials.display()))?;
    let creds = Credentials::import(&data, args.password.as_deref()).context("failed to import credentials")?;
    if creds.network() != config.network {
        bail!(
            "credentials are for {}, config is for {}",
            creds.network(),
            config.network
        );
    }

    let transport = HttpTransport::new(&config.base_url, config.request_timeout())?;
    let client = Arc::new(RemoteClient::new(Arc::new(transport), &creds, config.clone())?);

    let wallet = retry_transient(config.retry_attempts, config.retry_delay(), || client.wallet_status())
        .await
        .context("failed to reach the wallet service")?;

    tracing::info!(
        base_url = %config.base_url,
        network = %config.network,
        copayer_id = %creds.copayer_id(),
        wallet = %wallet.name,
        status = %wallet.status,
        "watching notifications"
    );

    let poller = Arc::new(NotificationPoller::new(client));

    let (tx, mut rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
    let handle = poller.start(tx);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(notification) => println!("{}", serde_json::to_string(&notification)?),
                None => break,
            },
            _ = &mut shutdown => break,
        }
    }

    handle.stop().await;
    tracing::info!("watch stopped");
    Ok(())
}

fn print_version() {
    println!("merit-wallet {}", env!("CARGO_PKG_VERSION"));
    println!("client       {}", CLIENT_VERSION);
    println!("rustc        {}", rustc_version());
}

fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
