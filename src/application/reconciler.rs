// Alert history reconciliation - edge-triggered, bounded, write-through
//
// The reconciler owns the one-generation dedup key set and the history log
// outright; there is no ambient state. History entries are append-only
// until eviction or an explicit clear.

use crate::domain::alert::{Alert, AlertHistoryEntry, HISTORY_CAP};
use crate::infrastructure::store::{keys, set_value, KvStore, StoreStatus};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashSet;

/// What a reconcile pass produced. `persistence` is `None` when nothing
/// needed writing; a `Failed` status is degraded mode, not an error.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub new_entries: Vec<AlertHistoryEntry>,
    pub persistence: Option<StoreStatus>,
}

pub struct AlertReconciler {
    previous_keys: HashSet<String>,
    history: Vec<AlertHistoryEntry>,
}

impl AlertReconciler {
    /// Start from a previously persisted log (already newest-first). Loads
    /// beyond the cap are trimmed immediately.
    pub fn new(mut history: Vec<AlertHistoryEntry>) -> Self {
        history.truncate(HISTORY_CAP);
        Self {
            previous_keys: HashSet::new(),
            history,
        }
    }

    pub fn history(&self) -> &[AlertHistoryEntry] {
        &self.history
    }

    /// Diff the current alert set against the previous cycle, commit the
    /// genuinely new alerts to the log and write it through the store.
    ///
    /// Edge-triggered: a sustained alert is recorded once; it has to leave
    /// the active set before the same key can be recorded again. A failed
    /// write is reported in the outcome without rolling back memory.
    pub fn reconcile(&mut self, alerts: &[Alert], store: &dyn KvStore) -> ReconcileOutcome {
        let current_keys: HashSet<String> = alerts.iter().map(Alert::dedup_key).collect();

        let now = Utc::now();
        let mut new_entries = Vec::new();
        for alert in alerts {
            if self.previous_keys.contains(&alert.dedup_key()) {
                continue;
            }
            new_entries.push(AlertHistoryEntry {
                id: entry_id(&alert.tag, now.timestamp_millis()),
                tag: alert.tag.clone(),
                value: alert.value.clone(),
                timestamp: alert.timestamp.clone(),
                status: alert.status,
                history_timestamp: now.to_rfc3339(),
            });
        }

        self.previous_keys = current_keys;

        if new_entries.is_empty() {
            return ReconcileOutcome {
                new_entries,
                persistence: None,
            };
        }

        // Novel entries go in front, in the order encountered.
        for entry in new_entries.iter().rev() {
            self.history.insert(0, entry.clone());
        }
        self.history.truncate(HISTORY_CAP);

        let status = set_value(store, keys::ALERT_HISTORY, &self.history);
        if !status.is_persisted() {
            tracing::warn!("alert history not persisted; continuing with in-memory log");
        }

        ReconcileOutcome {
            new_entries,
            persistence: Some(status),
        }
    }

    /// Empty the log and its persisted copy. The previous-cycle key set is
    /// left alone, so a still-active alert is not re-added until it first
    /// disappears and reappears.
    pub fn clear(&mut self, store: &dyn KvStore) -> StoreStatus {
        self.history.clear();
        store.remove(keys::ALERT_HISTORY)
    }
}

fn entry_id(tag: &str, millis: i64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{tag}-{millis}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::TagStatus;
    use crate::infrastructure::store::testutil::{FailingStore, MemStore};
    use crate::infrastructure::store::get_value;
    use serde_json::json;

    fn alert(tag: &str, value: f64) -> Alert {
        Alert {
            tag: tag.into(),
            value: json!(value),
            timestamp: "t".into(),
            status: TagStatus::Off,
        }
    }

    #[test]
    fn first_sighting_is_recorded_repeat_is_not() {
        let store = MemStore::default();
        let mut reconciler = AlertReconciler::new(Vec::new());

        let first = reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);
        assert_eq!(first.new_entries.len(), 1);
        assert_eq!(first.persistence, Some(StoreStatus::Persisted));

        let second = reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);
        assert!(second.new_entries.is_empty());
        assert_eq!(second.persistence, None);
        assert_eq!(reconciler.history().len(), 1);
    }

    #[test]
    fn disappearance_rearms_the_key() {
        let store = MemStore::default();
        let mut reconciler = AlertReconciler::new(Vec::new());

        reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);
        reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);
        reconciler.reconcile(&[], &store); // key leaves the active set
        let again = reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);

        assert_eq!(again.new_entries.len(), 1);
        assert_eq!(reconciler.history().len(), 2);
    }

    #[test]
    fn history_never_exceeds_the_cap() {
        let store = MemStore::default();
        let mut reconciler = AlertReconciler::new(Vec::new());

        for i in 0..130 {
            reconciler.reconcile(&[alert("Tag_1001", i as f64)], &store);
            assert!(reconciler.history().len() <= HISTORY_CAP);
        }
        assert_eq!(reconciler.history().len(), HISTORY_CAP);
        // Newest first: the last value recorded sits at the head.
        assert_eq!(reconciler.history()[0].value, json!(129.0));
    }

    #[test]
    fn novel_entries_are_prepended_in_encounter_order() {
        let store = MemStore::default();
        let mut reconciler = AlertReconciler::new(Vec::new());

        reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);
        reconciler.reconcile(
            &[alert("Tag_1002", 5.0), alert("Tag_1003", 9.0)],
            &store,
        );

        let tags: Vec<&str> = reconciler.history().iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, ["Tag_1002", "Tag_1003", "Tag_1001"]);
    }

    #[test]
    fn persisted_log_matches_memory() {
        let store = MemStore::default();
        let mut reconciler = AlertReconciler::new(Vec::new());
        reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);

        let stored: Vec<AlertHistoryEntry> = get_value(&store, keys::ALERT_HISTORY).unwrap();
        assert_eq!(stored, reconciler.history());
    }

    #[test]
    fn write_failure_does_not_raise_or_roll_back() {
        let store = FailingStore;
        let mut reconciler = AlertReconciler::new(Vec::new());

        let outcome = reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);
        assert_eq!(outcome.persistence, Some(StoreStatus::Failed));
        assert_eq!(reconciler.history().len(), 1);
    }

    #[test]
    fn clear_empties_history_but_not_the_active_set() {
        let store = MemStore::default();
        let mut reconciler = AlertReconciler::new(Vec::new());

        reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);
        reconciler.clear(&store);
        assert!(reconciler.history().is_empty());
        assert_eq!(store.get(keys::ALERT_HISTORY), None);

        // Still-active alert is not re-added right after the clear.
        let after = reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);
        assert!(after.new_entries.is_empty());

        // It comes back once it disappears and reappears.
        reconciler.reconcile(&[], &store);
        let again = reconciler.reconcile(&[alert("Tag_1001", 20.0)], &store);
        assert_eq!(again.new_entries.len(), 1);
    }

    #[test]
    fn oversized_persisted_log_is_trimmed_on_load() {
        let seed: Vec<AlertHistoryEntry> = (0..150)
            .map(|i| AlertHistoryEntry {
                id: format!("Tag_1001-{i}-seed"),
                tag: "Tag_1001".into(),
                value: json!(i),
                timestamp: "t".into(),
                status: TagStatus::Off,
                history_timestamp: "t".into(),
            })
            .collect();
        let reconciler = AlertReconciler::new(seed);
        assert_eq!(reconciler.history().len(), HISTORY_CAP);
    }

    #[test]
    fn entry_ids_embed_tag_and_are_unique() {
        let store = MemStore::default();
        let mut reconciler = AlertReconciler::new(Vec::new());
        reconciler.reconcile(
            &[alert("Tag_1001", 20.0), alert("Tag_1002", 30.0)],
            &store,
        );

        // Encounter order at the head, same as the entries themselves.
        let ids: Vec<&str> = reconciler.history().iter().map(|e| e.id.as_str()).collect();
        assert!(ids[0].starts_with("Tag_1001-"));
        assert!(ids[1].starts_with("Tag_1002-"));
        assert_ne!(ids[0], ids[1]);
    }
}
