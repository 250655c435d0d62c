use std::error::Error;
use std::future::Future;

use log::{debug, info};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::cache::TxCache;
use crate::http::HttpClient;

/// One page of the explorer's per-address transaction listing.
#[derive(Debug, Deserialize)]
pub struct TxPage {
    #[serde(rename = "pagesTotal")]
    pub pages_total: u32,
    pub txs: Vec<RawTransaction>,
}

/// A full transaction as returned by the explorer. Coinbase inputs carry no
/// address or value.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    pub time: i64,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub fees: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxInput {
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub value: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOutput {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub value: Decimal,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// Fetch one page of transactions touching `wallet`.
pub async fn transactions_page(
    http: &HttpClient,
    base: &str,
    wallet: &str,
    page: u32,
) -> Result<TxPage, Box<dyn Error>> {
    let url = format!("{base}/txs");
    let page = page.to_string();
    let value = http
        .get_json(&url, &[("address", wallet), ("pageNum", &page)])
        .await?;
    Ok(serde_json::from_value(value)?)
}

/// Walk every listing page in order, concatenating their `txs` arrays.
/// `fetch_page` is called exactly once per page number, page 0 first to
/// learn the page count.
pub async fn all_transactions<F, Fut>(mut fetch_page: F) -> Result<Vec<RawTransaction>, Box<dyn Error>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<TxPage, Box<dyn Error>>>,
{
    let first = fetch_page(0).await?;
    let pages_total = first.pages_total;
    debug!("Will parse {pages_total} page(s) of transactions");

    let mut txs = first.txs;
    for page in 1..pages_total {
        info!("Requesting transactions page {} of {}", page + 1, pages_total);
        let mut next = fetch_page(page).await?;
        txs.append(&mut next.txs);
    }
    Ok(txs)
}

/// Fetch the raw transaction body for `txid`, consulting the on-disk cache
/// first. A miss hits `<base>/api/getrawtransaction` and populates the
/// cache, so each txid costs at most one network call per machine.
pub async fn raw_transaction(
    http: &HttpClient,
    cache: &TxCache,
    base: &str,
    txid: &str,
) -> Result<Value, Box<dyn Error>> {
    if let Some(detail) = cache.get(txid) {
        info!("Found transaction in cache: {txid}");
        return Ok(detail);
    }

    info!("Requesting info for transaction from blockchain explorer: {txid}");
    let url = format!("{base}/api/getrawtransaction");
    let detail = http.get_json(&url, &[("txid", txid)]).await?;
    cache.set(txid, &detail)?;
    Ok(detail)
}
