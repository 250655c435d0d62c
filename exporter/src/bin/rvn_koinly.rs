use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{debug, info};

use koinly_exporter::explorer;
use koinly_exporter::export;
use koinly_exporter::http::{HttpClient, HttpPolicy};
use koinly_exporter::logging;
use koinly_exporter::reconcile::{self, Reconciler, TxTotals};

const RVN_BC_EXPLORER: &str = "https://api.ravencoin.org/api";
const TICKER: &str = "RVN";

/// Command line arguments for the RVN exporter
#[derive(Parser, Debug)]
#[command(version, about = "Build a Koinly compatible CSV file from RVN blockchain data")]
struct Args {
    /// RVN public wallet address
    #[arg(short, long)]
    wallet: String,

    /// Koinly output CSV file
    #[arg(short, long)]
    output: PathBuf,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    log_level: String,

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

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(&args.log_level)?;

    let http = HttpClient::new(HttpPolicy {
        timeout: Duration::from_secs(args.request_timeout),
        retries: args.failure_retry,
        backoff_factor: args.backoff_factor,
    })?;

    info!(
        "Pulling data from {}/txs?address={}",
        RVN_BC_EXPLORER, args.wallet
    );
    let txs = explorer::all_transactions(|page| {
        explorer::transactions_page(&http, RVN_BC_EXPLORER, &args.wallet, page)
    })
    .await?;

    let mut reconciler = Reconciler::new();
    for tx in &txs {
        debug!("Found transaction: {}", tx.txid);
        let when = reconcile::utc_timestamp(tx.time)
            .ok_or_else(|| format!("transaction {} has an out-of-range time", tx.txid))?;
        reconciler.add(&tx.txid, TxTotals::from_transaction(tx, &args.wallet, when));
    }

    let records = reconciler.finish(true);
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
