//! Interception counters.
//!
//! The daily counter rolls over lazily: whoever touches the stats first on a
//! new calendar day (a page recording an interception or the popup reading
//! them) resets it. Dates are ISO `YYYY-MM-DD` strings supplied by the caller,
//! which keeps this module clock-free.

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::settings::{keys, read_field, SettingsError};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct Stats {
    #[ts(type = "number")]
    pub total_interceptions: u64,
    #[ts(type = "number")]
    pub today_interceptions: u64,
    pub last_reset_date: String,
}

impl Stats {
    pub fn new(today: &str) -> Self {
        Self {
            last_reset_date: today.to_string(),
            ..Self::default()
        }
    }

    /// Reset the daily counter if `today` differs from the stored date.
    /// Returns whether anything changed.
    pub fn roll_over(&mut self, today: &str) -> bool {
        if self.last_reset_date == today {
            return false;
        }
        self.today_interceptions = 0;
        self.last_reset_date = today.to_string();
        true
    }

    /// Count one interception on `today`.
    pub fn record(&mut self, today: &str) {
        self.record_many(today, 1);
    }

    pub fn record_many(&mut self, today: &str, count: u64) {
        self.roll_over(today);
        self.total_interceptions = self.total_interceptions.saturating_add(count);
        self.today_interceptions = self.today_interceptions.saturating_add(count);
    }

    /// Stats from raw local-scope items; malformed or missing values start
    /// from zero.
    pub fn from_store(items: &Value) -> Self {
        let Some(map) = items.as_object() else {
            return Self::default();
        };
        read_field(map, keys::STATS)
            .unwrap_or_else(|err| {
                log::warn!("resetting unreadable stats: {}", err);
                None
            })
            .unwrap_or_default()
    }

    /// Local-scope items holding these stats.
    pub fn to_store(&self) -> Result<Value, SettingsError> {
        let mut items = Map::new();
        items.insert(keys::STATS.to_string(), serde_json::to_value(self)?);
        Ok(Value::Object(items))
    }
}

/// Interceptions waiting to be written to the store.
///
/// The store is read-modify-write, so only one writer may run at a time. The
/// writer drains everything queued while its previous write was in flight.
#[derive(Debug, Default)]
pub struct PendingRecords {
    count: Cell<u64>,
    writing: Cell<bool>,
}

impl PendingRecords {
    pub const fn new() -> Self {
        Self {
            count: Cell::new(0),
            writing: Cell::new(false),
        }
    }

    /// Queue one interception. Returns true when the caller must start the
    /// writer.
    pub fn push(&self) -> bool {
        self.count.set(self.count.get().saturating_add(1));
        !self.writing.replace(true)
    }

    /// Next batch for the writer; `None` means the queue is empty and the
    /// writer must stop.
    pub fn take(&self) -> Option<u64> {
        match self.count.replace(0) {
            0 => {
                self.writing.set(false);
                None
            }
            count => Some(count),
        }
    }
}

/// `YYYY-MM-DD` from calendar components (month and day are 1-based).
pub fn iso_date(year: u32, month: u32, day: u32) -> String {
    format!("{:04}-{:02}-{:02}", year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_day_accumulates() {
        let mut stats = Stats::new("2026-10-19");
        stats.record("2026-10-19");
        stats.record("2026-10-19");
        assert_eq!(stats.today_interceptions, 2);
        assert_eq!(stats.total_interceptions, 2);
    }

    #[test]
    fn test_day_boundary_resets_today_only() {
        let mut stats = Stats::new("2026-10-19");
        stats.record("2026-10-19");
        stats.record("2026-10-19");
        stats.record("2026-10-20");
        assert_eq!(stats.today_interceptions, 1);
        assert_eq!(stats.total_interceptions, 3);
        assert_eq!(stats.last_reset_date, "2026-10-20");
    }

    #[test]
    fn test_roll_over_happens_once() {
        let mut stats = Stats {
            total_interceptions: 9,
            today_interceptions: 4,
            last_reset_date: "2026-10-18".to_string(),
        };
        assert!(stats.roll_over("2026-10-19"));
        assert!(!stats.roll_over("2026-10-19"));
        assert_eq!(stats.today_interceptions, 0);
        assert_eq!(stats.total_interceptions, 9);
    }

    #[test]
    fn test_pending_records_single_writer() {
        let pending = PendingRecords::new();
        assert!(pending.push());
        // two more interceptions while the first write is in flight
        assert!(!pending.push());
        assert!(!pending.push());

        let mut stats = Stats::new("2026-10-19");
        let batch = pending.take().unwrap();
        stats.record_many("2026-10-19", batch);
        assert!(!pending.push());
        stats.record_many("2026-10-19", pending.take().unwrap());
        assert_eq!(pending.take(), None);
        assert_eq!(stats.today_interceptions, 4);
        assert_eq!(stats.total_interceptions, 4);

        // the writer stopped; the next interception starts a new one
        assert!(pending.push());
        assert_eq!(pending.take(), Some(1));
    }

    #[test]
    fn test_from_store() {
        let stats = Stats::from_store(&json!({
            "stats": {"totalInterceptions": 7, "todayInterceptions": 2, "lastResetDate": "2026-10-19"}
        }));
        assert_eq!(stats.total_interceptions, 7);
        assert_eq!(stats.today_interceptions, 2);

        assert_eq!(Stats::from_store(&json!({"stats": "garbage"})), Stats::default());
        assert_eq!(Stats::from_store(&json!({})), Stats::default());
    }

    #[test]
    fn test_store_round_trip_uses_nested_key() {
        let mut stats = Stats::new("2026-10-19");
        stats.record("2026-10-19");
        let items = stats.to_store().unwrap();
        assert_eq!(items["stats"]["todayInterceptions"], 1);
        assert_eq!(Stats::from_store(&items), stats);
    }

    #[test]
    fn test_iso_date() {
        assert_eq!(iso_date(2026, 3, 7), "2026-03-07");
    }
}
