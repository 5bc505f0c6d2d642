// Alerts derived from classified readings and the bounded history entries

use crate::domain::telemetry::TagStatus;
use serde::{Deserialize, Serialize};

/// Hard cap on the persisted alert log; oldest entries evicted first.
pub const HISTORY_CAP: usize = 100;

/// An out-of-range or faulted reading surfaced by the evaluator. Derived
/// from the frame that produced it, never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub tag: String,
    #[serde(rename = "valeur")]
    pub value: serde_json::Value,
    #[serde(rename = "horodatage")]
    pub timestamp: String,
    #[serde(rename = "statut")]
    pub status: TagStatus,
}

impl Alert {
    /// Edge-trigger deduplication key: tag plus the value rounded to two
    /// decimals. Deliberately coarse (it both over- and under-merges near
    /// the rounding boundary); this matches the recorded behavior and is
    /// not to be silently "fixed".
    pub fn dedup_key(&self) -> String {
        match self.numeric_value() {
            Some(v) => format!("{}-{:.2}", self.tag, v),
            None => format!("{}-NaN", self.tag),
        }
    }

    fn numeric_value(&self) -> Option<f64> {
        match &self.value {
            serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }
}

/// An alert committed to the history log. Serialized field names follow the
/// legacy persisted format so an existing store reloads cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertHistoryEntry {
    pub id: String,
    pub tag: String,
    #[serde(rename = "valeur")]
    pub value: serde_json::Value,
    #[serde(rename = "horodatage")]
    pub timestamp: String,
    #[serde(rename = "statut")]
    pub status: TagStatus,
    #[serde(rename = "historyTimestamp")]
    pub history_timestamp: String,
}
