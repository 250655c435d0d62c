use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use serde_json::Value;

use koinly_exporter::cache::TxCache;
use koinly_exporter::explorer;
use koinly_exporter::export;
use koinly_exporter::http::{HttpClient, HttpPolicy};
use koinly_exporter::logging;
use koinly_exporter::node::{self, NodeToolError};
use koinly_exporter::reconcile::{self, Reconciler, TxTotals};

const RTM_BC_EXPLORER: &str = "https://explorer.raptoreum.com";
const TICKER: &str = "RTM";

/// Command line arguments for the RTM exporter
#[derive(Parser, Debug)]
#[command(version, about = "Build a Koinly compatible CSV file from RTM blockchain data")]
struct Args {
    /// RTM public wallet address
    #[arg(short, long)]
    wallet: String,

    /// Koinly output CSV file
    #[arg(short, long)]
    output: PathBuf,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Path to the raptoreum-cli command
    #[arg(
        short = 'p',
        long = "raptoreum-cli-path",
        default_value = "raptoreum-cli"
    )]
    rtm_cli_path: String,

    /// Directory for caching transaction information
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Timeout in seconds for retrieving transaction information
    #[arg(long = "http-request-timeout", default_value_t = 5)]
    request_timeout: u64,

    /// The number of times to retry requests when retrieving transaction information
    #[arg(long = "http-failure-retry", default_value_t = 5)]
    failure_retry: u32,

    /// The backoff factor when doing exponential backoff for HTTP requests
    #[arg(long = "http-backoff-factor", default_value_t = 10.0)]
    backoff_factor: f64,
}

fn default_cache_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("rtm_koinly"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(&args.log_level)?;

    let http = HttpClient::new(HttpPolicy {
        timeout: Duration::from_secs(args.request_timeout),
        retries: args.failure_retry,
        backoff_factor: args.backoff_factor,
    })?;

    let deltas = match node::address_deltas(&args.rtm_cli_path, &args.wallet) {
        Ok(deltas) => deltas,
        Err(err) => {
            match &err {
                NodeToolError::Failed {
                    command, stderr, ..
                } => {
                    error!("Error when running raptoreum-cli.  Is raptoreumd running?");
                    error!("Command: {command}");
                    error!("Response: {stderr}");
                }
                other => error!("{other}"),
            }
            process::exit(1);
        }
    };

    let cache = TxCache::open(args.cache_dir.unwrap_or_else(default_cache_dir))?;
    let mut reconciler = Reconciler::new();
    for delta in &deltas {
        let detail =
            explorer::raw_transaction(&http, &cache, RTM_BC_EXPLORER, &delta.txid).await?;
        let time = detail
            .get("time")
            .and_then(Value::as_i64)
            .ok_or_else(|| format!("transaction {} has no time field", delta.txid))?;
        let when = reconcile::utc_timestamp(time)
            .ok_or_else(|| format!("transaction {} has an out-of-range time", delta.txid))?;
        reconciler.add(&delta.txid, TxTotals::from_delta(delta.satoshis, when));
    }

    let records = reconciler.finish(false);
    if records.is_empty() {
        info!("No transactions found for address \"{}\"", args.wallet);
        return Ok(());
    }

    export::write_csv(&args.output, TICKER, &records)?;
    info!(
        "Wrote {} transaction(s) to {}",
        records.len(),
        args.output.display()
    );
    Ok(())
}
