//! CLI harness for decoding transactions and running birthday scans
//!
//! This tool allows testing:
//! - Raw transaction decoding
//! - Parallel compact-block scans with progress and cancellation
//! - Viewing key detection and memo decryption

use anyhow::Context;
use cipherscan_core::TransactionDecoder;
use cipherscan_params::NetworkType;
use cipherscan_scan::{
    detect_key_type, loader, parse_compact_blocks, MatchingTransaction, ScanConfig,
    ScanCoordinator,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "scan-harness")]
#[command(about = "Zcash transaction decoding and scan harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a raw transaction and print it as JSON
    Decode {
        /// Raw transaction hex
        #[arg(long)]
        hex: String,

        /// Network for transparent addresses (inferred from --address otherwise)
        #[arg(short, long)]
        network: Option<NetworkType>,

        /// Address known to belong to the transaction's network
        #[arg(short, long)]
        address: Vec<String>,
    },

    /// Scan a JSON file of compact blocks for a viewing key's transactions
    Scan {
        /// Compact blocks JSON file
        #[arg(short, long)]
        blocks: PathBuf,

        /// Unified full viewing key
        #[arg(short, long)]
        viewing_key: String,

        /// Worker count (defaults to available parallelism, capped)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Blocks per progress report
        #[arg(short, long)]
        sub_chunk: Option<usize>,

        /// Cancel the scan after N seconds
        #[arg(short, long)]
        cancel_after: Option<u64>,
    },

    /// Classify a viewing key
    KeyType {
        /// Viewing key
        key: String,
    },

    /// Decrypt the first Orchard memo of a raw transaction
    DecryptMemo {
        /// Raw transaction hex
        #[arg(long)]
        tx_hex: String,

        /// Unified full viewing key
        #[arg(long)]
        viewing_key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            hex,
            network,
            address,
        } => run_decode(&hex, network, address)?,
        Commands::Scan {
            blocks,
            viewing_key,
            workers,
            sub_chunk,
            cancel_after,
        } => run_scan(blocks, &viewing_key, workers, sub_chunk, cancel_after).await?,
        Commands::KeyType { key } => {
            println!("{}", detect_key_type(&key));
        }
        Commands::DecryptMemo {
            tx_hex,
            viewing_key,
        } => run_decrypt_memo(&tx_hex, &viewing_key)?,
    }

    Ok(())
}

fn run_decode(hex: &str, network: Option<NetworkType>, addresses: Vec<String>) -> anyhow::Result<()> {
    let decoder = match network {
        Some(network) => TransactionDecoder::new().with_network(network),
        None => TransactionDecoder::new().with_observed_addresses(addresses),
    };
    let tx = decoder.decode_hex(hex).context("failed to decode transaction")?;

    info!(
        "Decoded v{} transaction: {} inputs, {} outputs, {} bytes",
        tx.version,
        tx.inputs.len(),
        tx.outputs.len(),
        tx.size
    );
    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}

async fn run_scan(
    path: PathBuf,
    viewing_key: &str,
    workers: Option<usize>,
    sub_chunk: Option<usize>,
    cancel_after: Option<u64>,
) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let blocks = parse_compact_blocks(&json).context("failed to parse compact blocks")?;

    let mut config = ScanConfig::from_env();
    if workers.is_some() {
        config.workers = workers;
    }
    if let Some(sub_chunk) = sub_chunk {
        config.sub_chunk_blocks = sub_chunk;
    }

    info!(
        "Scanning {} blocks from {} ({})",
        blocks.len(),
        path.display(),
        detect_key_type(viewing_key)
    );

    let mut coordinator = ScanCoordinator::new(config)?;

    let cancel_task = cancel_after.map(|secs| {
        let handle = coordinator.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!("Cancelling scan after {}s", secs);
            handle.cancel();
        })
    });

    let pb = ProgressBar::new(blocks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} blocks {msg}")?
            .progress_chars("=>-"),
    );

    let started = Instant::now();
    let result = coordinator
        .scan_with_progress(blocks, viewing_key, |progress| {
            let eta = progress
                .eta(started.elapsed())
                .map(|eta| format!(", ETA {}s", eta.as_secs()))
                .unwrap_or_default();
            pb.set_position(progress.blocks_processed);
            pb.set_message(format!(
                "{} matches, {} workers active{}",
                progress.matches_found, progress.workers_active, eta
            ));
        })
        .await;

    if let Some(task) = cancel_task {
        task.abort();
    }

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            pb.abandon_with_message("scan failed");
            return Err(e.into());
        }
    };

    if result.cancelled {
        pb.abandon_with_message("cancelled");
    } else {
        pb.finish_with_message("done");
    }

    let rate = result.progress.blocks_per_second(result.duration);
    info!(
        "Scanned {}/{} blocks in {:.2}s ({:.1} blocks/s), {} matches",
        result.progress.blocks_processed,
        result.progress.total_blocks,
        result.duration.as_secs_f64(),
        rate,
        result.matches.len()
    );
    for m in &result.matches {
        info!("  {} at height {} ({})", m.txid, m.height, block_time(m));
    }

    println!("{}", serde_json::to_string_pretty(&result.matches)?);
    coordinator.shutdown()?;
    Ok(())
}

fn run_decrypt_memo(tx_hex: &str, viewing_key: &str) -> anyhow::Result<()> {
    let decryptor = loader().load()?;
    let memo = decryptor.decrypt_memo(tx_hex, viewing_key)?;
    info!("Decrypted memo worth {} ZEC", memo.amount);
    println!("{}", serde_json::to_string_pretty(&memo)?);
    Ok(())
}

fn block_time(m: &MatchingTransaction) -> String {
    i64::try_from(m.timestamp)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| m.timestamp.to_string())
}
