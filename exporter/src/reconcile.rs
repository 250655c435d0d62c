use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime};
use log::debug;
use rust_decimal::Decimal;

use crate::explorer::RawTransaction;

/// Net amounts for one transaction: what the wallet sent, what it got back,
/// and the network fee it paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxTotals {
    pub timestamp: NaiveDateTime,
    pub sent: Decimal,
    pub received: Decimal,
    pub fee: Decimal,
}

/// Convert a unix timestamp to a UTC datetime. `None` outside the
/// representable range.
pub fn utc_timestamp(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

impl TxTotals {
    /// Build the totals contributed by one node-tool delta. Amounts are the
    /// satoshi count scaled by eight decimal places, exactly. The fee is not
    /// observable from a delta.
    pub fn from_delta(satoshis: i64, when: NaiveDateTime) -> Self {
        let amount = Decimal::new(satoshis, 8);
        let (sent, received) = if amount > Decimal::ZERO {
            (Decimal::ZERO, amount)
        } else {
            (-amount, Decimal::ZERO)
        };
        Self {
            timestamp: when,
            sent,
            received,
            fee: Decimal::ZERO,
        }
    }

    /// Build the totals for one explorer transaction by scanning its inputs
    /// and outputs for `wallet`. The fee is the transaction-level total,
    /// counted only when the wallet funded at least one input.
    pub fn from_transaction(tx: &RawTransaction, wallet: &str, when: NaiveDateTime) -> Self {
        let mut sent = Decimal::ZERO;
        let mut fee = Decimal::ZERO;
        for vin in &tx.vin {
            if vin.addr.as_deref() == Some(wallet) {
                sent += vin.value.unwrap_or_default();
                fee = tx.fees.unwrap_or_default();
            }
        }

        let received = tx
            .vout
            .iter()
            .filter(|out| out.script_pub_key.addresses.iter().any(|a| a == wallet))
            .map(|out| out.value)
            .sum();

        Self {
            timestamp: when,
            sent,
            received,
            fee,
        }
    }
}

/// Accumulates per-event totals by txid, then collapses each transaction to
/// a single record. Records come out in first-seen txid order.
#[derive(Debug, Default)]
pub struct Reconciler {
    order: Vec<String>,
    totals: HashMap<String, TxTotals>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the running totals for `txid`. The first event
    /// for a txid fixes its timestamp.
    pub fn add(&mut self, txid: &str, event: TxTotals) {
        match self.totals.get_mut(txid) {
            Some(totals) => {
                totals.sent += event.sent;
                totals.received += event.received;
                totals.fee += event.fee;
            }
            None => {
                self.order.push(txid.to_string());
                self.totals.insert(txid.to_string(), event);
            }
        }
    }

    /// Apply the per-transaction corrections and return the records in
    /// first-seen order.
    ///
    /// Refund correction: when a transaction sent more than it got back, the
    /// returned portion is change, so only the difference counts as sent.
    /// The rule is deliberately one-sided: `received > sent` (and exact
    /// equality) is left untouched.
    ///
    /// Fee netting (`net_fee_from_sent`, explorer pipeline only): the fee is
    /// part of the gross outflow, so it is subtracted from the sent amount;
    /// the fee column itself still reports the full fee.
    pub fn finish(mut self, net_fee_from_sent: bool) -> Vec<(String, TxTotals)> {
        let mut records = Vec::with_capacity(self.order.len());
        for txid in self.order {
            let Some(mut totals) = self.totals.remove(&txid) else {
                continue;
            };
            if totals.sent > totals.received {
                debug!("Found partial refund for sent funds");
                totals.sent -= totals.received;
                totals.received = Decimal::ZERO;
            }
            if net_fee_from_sent && totals.fee > Decimal::ZERO && totals.sent > Decimal::ZERO {
                totals.sent -= totals.fee;
            }
            records.push((txid, totals));
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::{ScriptPubKey, TxInput, TxOutput};

    fn when() -> NaiveDateTime {
        utc_timestamp(1_600_000_000).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn totals(sent: &str, received: &str, fee: &str) -> TxTotals {
        TxTotals {
            timestamp: when(),
            sent: dec(sent),
            received: dec(received),
            fee: dec(fee),
        }
    }

    #[test]
    fn delta_scaling_is_exact() {
        let event = TxTotals::from_delta(12_345_678, when());
        assert_eq!(event.received, dec("0.12345678"));
        assert_eq!(event.sent, Decimal::ZERO);
        assert_eq!(event.fee, Decimal::ZERO);
    }

    #[test]
    fn negative_delta_counts_as_sent() {
        let event = TxTotals::from_delta(-250_000_000, when());
        assert_eq!(event.sent, dec("2.5"));
        assert_eq!(event.received, Decimal::ZERO);
    }

    #[test]
    fn deltas_for_one_txid_accumulate() {
        let mut reconciler = Reconciler::new();
        reconciler.add("a", TxTotals::from_delta(100_000_000, when()));
        reconciler.add("a", TxTotals::from_delta(-30_000_000, when()));
        reconciler.add("b", TxTotals::from_delta(500, when()));

        let records = reconciler.finish(false);
        assert_eq!(records.len(), 2);
        // sent (0.3) does not exceed received (1.0): no correction fires and
        // both sides survive.
        assert_eq!(records[0].0, "a");
        assert_eq!(records[0].1.sent, dec("0.3"));
        assert_eq!(records[0].1.received, dec("1"));
        assert_eq!(records[1].0, "b");
        assert_eq!(records[1].1.received, dec("0.00000500"));
    }

    #[test]
    fn single_event_is_not_double_counted() {
        let direct = TxTotals::from_delta(-70_000_000, when());
        let mut reconciler = Reconciler::new();
        reconciler.add("a", direct.clone());
        let records = reconciler.finish(false);
        assert_eq!(records, vec![("a".to_string(), direct)]);
    }

    #[test]
    fn refund_correction_reduces_sent_side() {
        let mut reconciler = Reconciler::new();
        reconciler.add("a", totals("8", "5", "0"));
        let records = reconciler.finish(false);
        assert_eq!(records[0].1.sent, dec("3"));
        assert_eq!(records[0].1.received, Decimal::ZERO);
    }

    #[test]
    fn refund_correction_only_fires_when_sent_exceeds_received() {
        // The one-sided rule: a larger received amount is left as-is.
        let mut reconciler = Reconciler::new();
        reconciler.add("a", totals("5", "8", "0"));
        let records = reconciler.finish(false);
        assert_eq!(records[0].1.sent, dec("5"));
        assert_eq!(records[0].1.received, dec("8"));
    }

    #[test]
    fn equal_sent_and_received_left_untouched() {
        let mut reconciler = Reconciler::new();
        reconciler.add("a", totals("5", "5", "0"));
        let records = reconciler.finish(false);
        assert_eq!(records[0].1.sent, dec("5"));
        assert_eq!(records[0].1.received, dec("5"));
    }

    #[test]
    fn fee_netting_subtracts_fee_from_sent() {
        let mut reconciler = Reconciler::new();
        reconciler.add("a", totals("3", "0", "0.5"));
        let records = reconciler.finish(true);
        assert_eq!(records[0].1.sent, dec("2.5"));
        assert_eq!(records[0].1.fee, dec("0.5"));
    }

    #[test]
    fn fee_netting_skipped_when_nothing_sent() {
        let mut reconciler = Reconciler::new();
        reconciler.add("a", totals("0", "1", "0.5"));
        let records = reconciler.finish(true);
        assert_eq!(records[0].1.sent, Decimal::ZERO);
        assert_eq!(records[0].1.received, dec("1"));
        assert_eq!(records[0].1.fee, dec("0.5"));
    }

    #[test]
    fn fee_netting_not_applied_to_delta_pipeline() {
        let mut reconciler = Reconciler::new();
        reconciler.add("a", totals("3", "0", "0.5"));
        let records = reconciler.finish(false);
        assert_eq!(records[0].1.sent, dec("3"));
    }

    #[test]
    fn zero_delta_still_produces_a_record() {
        let mut reconciler = Reconciler::new();
        reconciler.add("a", TxTotals::from_delta(0, when()));
        let records = reconciler.finish(false);
        assert_eq!(records[0].1.sent, Decimal::ZERO);
        assert_eq!(records[0].1.received, Decimal::ZERO);
    }

    #[test]
    fn first_event_fixes_the_timestamp() {
        let later = utc_timestamp(1_700_000_000).unwrap();
        let mut reconciler = Reconciler::new();
        reconciler.add("a", TxTotals::from_delta(100, when()));
        reconciler.add("a", TxTotals::from_delta(200, later));
        let records = reconciler.finish(false);
        assert_eq!(records[0].1.timestamp, when());
    }

    fn wallet_tx(wallet: &str) -> RawTransaction {
        RawTransaction {
            txid: "cc".to_string(),
            time: 1_600_000_000,
            vin: vec![
                TxInput {
                    addr: Some(wallet.to_string()),
                    value: Some(dec("2")),
                },
                TxInput {
                    addr: Some("ROtherAddr".to_string()),
                    value: Some(dec("1")),
                },
            ],
            vout: vec![
                TxOutput {
                    value: dec("0.5"),
                    script_pub_key: ScriptPubKey {
                        addresses: vec![wallet.to_string()],
                    },
                },
                TxOutput {
                    value: dec("2.49"),
                    script_pub_key: ScriptPubKey {
                        addresses: vec!["ROtherAddr".to_string()],
                    },
                },
            ],
            fees: Some(dec("0.01")),
        }
    }

    #[test]
    fn transaction_scan_sums_matching_sides_only() {
        let event = TxTotals::from_transaction(&wallet_tx("RMyAddr"), "RMyAddr", when());
        assert_eq!(event.sent, dec("2"));
        assert_eq!(event.received, dec("0.5"));
        assert_eq!(event.fee, dec("0.01"));
    }

    #[test]
    fn fee_stays_zero_without_a_matching_input() {
        let uninvolved = TxTotals::from_transaction(&wallet_tx("RMyAddr"), "RNobody", when());
        assert_eq!(uninvolved.sent, Decimal::ZERO);
        assert_eq!(uninvolved.received, Decimal::ZERO);
        assert_eq!(uninvolved.fee, Decimal::ZERO);
    }

    #[test]
    fn coinbase_inputs_contribute_nothing() {
        let mut tx = wallet_tx("RMyAddr");
        tx.vin = vec![TxInput::default()];
        let event = TxTotals::from_transaction(&tx, "RMyAddr", when());
        assert_eq!(event.sent, Decimal::ZERO);
        assert_eq!(event.fee, Decimal::ZERO);
        assert_eq!(event.received, dec("0.5"));
    }
}
