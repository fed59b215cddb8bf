//! Accumulating cost ledger.
//!
//! Both pipelines append to the same [`CostLedger`] concurrently.  Entries
//! are never removed or modified, so the total only grows.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// One external call that was actually made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    /// Service that billed the call, e.g. `"frame-service"`.
    pub service: String,
    /// What the call did, e.g. `"ingest"` or `"transcribe 2.5 min"`.
    pub description: String,
    pub amount_usd: f64,
}

/// Append-only, thread-safe list of [`CostEntry`]s.
#[derive(Debug, Default)]
pub struct CostLedger {
    entries: Mutex<Vec<CostEntry>>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.  Negative or non-finite amounts are clamped to zero
    /// so the total can never decrease.
    pub fn record(&self, service: &str, description: impl Into<String>, amount_usd: f64) {
        let amount_usd = if amount_usd.is_finite() { amount_usd.max(0.0) } else { 0.0 };
        let entry = CostEntry {
            service: service.to_string(),
            description: description.into(),
            amount_usd,
        };
        log::debug!(
            "ledger: {} / {} ${:.4}",
            entry.service,
            entry.description,
            entry.amount_usd
        );
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn total_usd(&self) -> f64 {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .fold(0.0, |acc, e| acc + e.amount_usd)
    }

    /// Copy of all entries in recording order.
    pub fn entries(&self) -> Vec<CostEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only view handed to the UI and the analysis handoff.
    pub fn snapshot(&self) -> CostSnapshot {
        let entries = self.entries();
        let total_usd = entries.iter().fold(0.0, |acc, e| acc + e.amount_usd);
        CostSnapshot { entries, total_usd }
    }
}

/// Point-in-time copy of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub entries: Vec<CostEntry>,
    pub total_usd: f64,
}

impl CostSnapshot {
    /// Total formatted for display, e.g. `"$0.0210"`.
    pub fn display_total(&self) -> String {
        format!("${:.4}", self.total_usd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn empty_ledger_totals_zero() {
        let ledger = CostLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.total_usd(), 0.0);
        assert_eq!(ledger.snapshot().display_total(), "$0.0000");
        assert!(ledger.total_usd().is_sign_positive());
        assert!(ledger.snapshot().total_usd.is_sign_positive());
    }

    #[test]
    fn total_is_sum_of_entries() {
        let ledger = CostLedger::new();
        ledger.record("frame-service", "ingest", 0.015);
        ledger.record("speech-service", "transcribe", 0.006);
        assert_eq!(ledger.len(), 2);
        assert!((ledger.total_usd() - 0.021).abs() < 1e-12);
        assert_eq!(ledger.snapshot().display_total(), "$0.0210");
    }

    #[test]
    fn negative_amounts_never_decrease_total() {
        let ledger = CostLedger::new();
        ledger.record("a", "x", 0.5);
        ledger.record("b", "refund?", -0.2);
        ledger.record("c", "nan", f64::NAN);
        assert!((ledger.total_usd() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let ledger = Arc::new(CostLedger::new());
        let threads: Vec<_> = (0..4)
            .map(|i| {
                let l = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        l.record("svc", format!("{i}-{j}"), 0.01);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(ledger.len(), 100);
        assert!((ledger.total_usd() - 1.0).abs() < 1e-9);
    }
}
