use csv::Writer;
use log::debug;
use std::error::Error;
use std::fs::File;
use std::path::Path;

use crate::reconcile::TxTotals;

/// Column order expected by Koinly's CSV importer. Net worth, label and
/// description are left for the downstream tool to fill in.
pub const KOINLY_COLUMNS: [&str; 12] = [
    "Date",
    "Sent Amount",
    "Sent Currency",
    "Received Amount",
    "Received Currency",
    "Fee Amount",
    "Fee Currency",
    "Net Worth Amount",
    "Net Worth Currency",
    "Label",
    "Description",
    "TxHash",
];

/// Write the reconciled records to `path` as a Koinly import file, one row
/// per transaction, amounts denominated in `ticker`.
pub fn write_csv(
    path: &Path,
    ticker: &str,
    records: &[(String, TxTotals)],
) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut wtr = Writer::from_writer(file);
    wtr.write_record(KOINLY_COLUMNS)?;
    for (txid, totals) in records {
        debug!(
            "CSV details for {}: {}",
            txid,
            serde_json::json!({
                "Date": totals.timestamp.to_string(),
                "Sent Amount": totals.sent,
                "Sent Currency": ticker,
                "Received Amount": totals.received,
                "Received Currency": ticker,
                "Fee Amount": totals.fee,
                "Fee Currency": ticker,
                "Net Worth Amount": "",
                "Net Worth Currency": "",
                "Label": "",
                "Description": "",
                "TxHash": txid,
            })
        );
        wtr.write_record([
            totals.timestamp.to_string(),
            totals.sent.to_string(),
            ticker.to_string(),
            totals.received.to_string(),
            ticker.to_string(),
            totals.fee.to_string(),
            ticker.to_string(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            txid.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::utc_timestamp;
    use rust_decimal::Decimal;
    use std::fs;
    use std::path::PathBuf;

    fn temp_csv(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("koinly-{name}-{}.csv", std::process::id()))
    }

    #[test]
    fn rows_follow_the_koinly_schema() {
        let records = vec![(
            "aa11".to_string(),
            TxTotals {
                timestamp: utc_timestamp(1_600_000_000).unwrap(),
                sent: "2.5".parse().unwrap(),
                received: Decimal::ZERO,
                fee: "0.5".parse().unwrap(),
            },
        )];
        let path = temp_csv("schema");
        write_csv(&path, "RVN", &records).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        let header = KOINLY_COLUMNS.join(",");
        assert_eq!(lines.next().unwrap(), header);
        assert_eq!(
            lines.next().unwrap(),
            "2020-09-13 12:26:40,2.5,RVN,0,RVN,0.5,RVN,,,,,aa11"
        );
        assert!(lines.next().is_none());
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn zero_value_transactions_still_get_a_row() {
        let records = vec![(
            "bb22".to_string(),
            TxTotals {
                timestamp: utc_timestamp(0).unwrap(),
                sent: Decimal::ZERO,
                received: Decimal::ZERO,
                fee: Decimal::ZERO,
            },
        )];
        let path = temp_csv("zero");
        write_csv(&path, "RTM", &records).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("1970-01-01 00:00:00,0,RTM,0,RTM,0,RTM,,,,,bb22"));
        fs::remove_file(path).unwrap();
    }
}
