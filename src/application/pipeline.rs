// The per-frame reconciliation pipeline: ingest -> classify -> extract
// alerts -> reconcile history -> persist. Runs synchronously, one frame at
// a time, in the order frames arrive.

use crate::application::evaluator::{classify, extract_alerts};
use crate::application::reconciler::{AlertReconciler, ReconcileOutcome};
use crate::domain::alert::{Alert, AlertHistoryEntry};
use crate::domain::telemetry::{ClassifiedFrame, TelemetryFrame};
use crate::domain::threshold::{TagThreshold, ThresholdBook, ThresholdPatch};
use crate::infrastructure::store::{keys, set_value, KvStore, StoreStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Rolling window of classified frames kept for the chart view.
const CHART_WINDOW: usize = 50;

/// Snapshot of the dashboard state served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub frame: Option<ClassifiedFrame>,
    pub alerts: Vec<Alert>,
    pub summary: Summary,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Summary {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

pub struct DashboardPipeline {
    book: ThresholdBook,
    reconciler: AlertReconciler,
    latest: Option<ClassifiedFrame>,
    active_alerts: Vec<Alert>,
    recent: VecDeque<ClassifiedFrame>,
    last_update: Option<DateTime<Utc>>,
}

impl DashboardPipeline {
    pub fn new(book: ThresholdBook, history: Vec<AlertHistoryEntry>) -> Self {
        Self {
            book,
            reconciler: AlertReconciler::new(history),
            latest: None,
            active_alerts: Vec::new(),
            recent: VecDeque::with_capacity(CHART_WINDOW),
            last_update: None,
        }
    }

    /// One full turn of the pipeline for an inbound frame.
    pub fn ingest(&mut self, frame: &TelemetryFrame, store: &dyn KvStore) -> ReconcileOutcome {
        let classified = classify(frame, &self.book);
        let alerts = extract_alerts(frame, &self.book);

        if self.recent.len() == CHART_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(classified.clone());
        self.latest = Some(classified);
        self.last_update = Some(Utc::now());

        let outcome = self.reconciler.reconcile(&alerts, store);
        self.active_alerts = alerts;
        outcome
    }

    /// Replace the chart window with the one-shot historical backfill.
    pub fn apply_backfill(&mut self, frames: &[TelemetryFrame]) {
        self.recent = frames
            .iter()
            .map(|f| classify(f, &self.book))
            .collect();
        tracing::info!("chart window backfilled with {} frames", self.recent.len());
    }

    /// Wholesale threshold replacement from a user save; persisted through
    /// the store.
    pub fn replace_thresholds(
        &mut self,
        entries: Vec<TagThreshold>,
        store: &dyn KvStore,
    ) -> StoreStatus {
        self.book.replace_all(entries);
        set_value(store, keys::THRESHOLDS, &self.book.entries())
    }

    /// Patch from a gateway `threshold_update` push; persisted through the
    /// store.
    pub fn apply_threshold_patch(
        &mut self,
        patch: &HashMap<String, ThresholdPatch>,
        store: &dyn KvStore,
    ) -> StoreStatus {
        self.book.apply_patch(patch);
        set_value(store, keys::THRESHOLDS, &self.book.entries())
    }

    pub fn thresholds(&self) -> &[TagThreshold] {
        self.book.entries()
    }

    pub fn alert_history(&self) -> &[AlertHistoryEntry] {
        self.reconciler.history()
    }

    pub fn clear_alert_history(&mut self, store: &dyn KvStore) -> StoreStatus {
        self.reconciler.clear(store)
    }

    pub fn chart_window(&self) -> Vec<ClassifiedFrame> {
        self.recent.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let summary = match &self.latest {
            Some(frame) => Summary {
                total: frame.readings.len(),
                ok: frame.ok_count(),
                errors: frame.fault_count(),
            },
            None => Summary {
                total: 0,
                ok: 0,
                errors: 0,
            },
        };
        DashboardSnapshot {
            frame: self.latest.clone(),
            alerts: self.active_alerts.clone(),
            summary,
            last_update: self.last_update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::{TagReading, TagStatus};
    use crate::domain::threshold::{default_thresholds, UnknownTagPolicy};
    use crate::infrastructure::store::testutil::MemStore;
    use serde_json::json;

    fn pipeline() -> DashboardPipeline {
        let book = ThresholdBook::new(default_thresholds(), UnknownTagPolicy::Off);
        DashboardPipeline::new(book, Vec::new())
    }

    fn frame(tag: &str, value: f64) -> TelemetryFrame {
        TelemetryFrame {
            readings: vec![TagReading {
                tag: tag.into(),
                value: json!(value),
                timestamp: "t".into(),
                status: None,
            }],
            timestamp: None,
        }
    }

    #[test]
    fn ingest_updates_snapshot_and_history() {
        let store = MemStore::default();
        let mut pipeline = pipeline();

        let outcome = pipeline.ingest(&frame("Tag_1001", 20.0), &store);
        assert_eq!(outcome.new_entries.len(), 1);

        let snapshot = pipeline.snapshot();
        assert_eq!(snapshot.summary.total, 1);
        assert_eq!(snapshot.summary.errors, 1);
        assert_eq!(snapshot.alerts.len(), 1);
        assert_eq!(
            snapshot.frame.unwrap().readings[0].status,
            TagStatus::Off
        );
        assert!(snapshot.last_update.is_some());
        assert_eq!(pipeline.alert_history().len(), 1);
    }

    #[test]
    fn sustained_alert_produces_a_single_history_entry() {
        let store = MemStore::default();
        let mut pipeline = pipeline();
        pipeline.ingest(&frame("Tag_1001", 20.0), &store);
        pipeline.ingest(&frame("Tag_1001", 20.0), &store);
        assert_eq!(pipeline.alert_history().len(), 1);
    }

    #[test]
    fn recovery_clears_active_alerts() {
        let store = MemStore::default();
        let mut pipeline = pipeline();
        pipeline.ingest(&frame("Tag_1001", 20.0), &store);
        pipeline.ingest(&frame("Tag_1001", 10.0), &store);

        let snapshot = pipeline.snapshot();
        assert!(snapshot.alerts.is_empty());
        assert_eq!(snapshot.summary.ok, 1);
        assert_eq!(pipeline.alert_history().len(), 1);
    }

    #[test]
    fn chart_window_is_bounded() {
        let store = MemStore::default();
        let mut pipeline = pipeline();
        for i in 0..60 {
            pipeline.ingest(&frame("Tag_1001", i as f64), &store);
        }
        let window = pipeline.chart_window();
        assert_eq!(window.len(), 50);
        // Oldest frames evicted: the window starts at value 10.
        assert_eq!(window[0].readings[0].value, json!(10.0));
    }

    #[test]
    fn backfill_replaces_the_window() {
        let store = MemStore::default();
        let mut pipeline = pipeline();
        pipeline.ingest(&frame("Tag_1001", 1.0), &store);

        let backfill = vec![frame("Tag_1001", 2.0), frame("Tag_1001", 3.0)];
        pipeline.apply_backfill(&backfill);

        let window = pipeline.chart_window();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].readings[0].status, TagStatus::Ok);
    }

    #[test]
    fn threshold_patch_changes_classification_and_persists() {
        let store = MemStore::default();
        let mut pipeline = pipeline();

        let mut patch = HashMap::new();
        patch.insert("Tag_1001".to_string(), ThresholdPatch { min: 1.0, max: 30.0 });
        let status = pipeline.apply_threshold_patch(&patch, &store);
        assert!(status.is_persisted());

        pipeline.ingest(&frame("Tag_1001", 20.0), &store);
        assert_eq!(pipeline.snapshot().summary.ok, 1);

        let stored: Vec<TagThreshold> = crate::infrastructure::store::get_value(&store, keys::THRESHOLDS).unwrap();
        assert_eq!(stored.iter().find(|t| t.tag == "Tag_1001").unwrap().max, 30.0);
    }

    #[test]
    fn clear_history_removes_the_persisted_copy() {
        let store = MemStore::default();
        let mut pipeline = pipeline();
        pipeline.ingest(&frame("Tag_1001", 20.0), &store);
        assert!(store.get(keys::ALERT_HISTORY).is_some());

        pipeline.clear_alert_history(&store);
        assert!(pipeline.alert_history().is_empty());
        assert!(store.get(keys::ALERT_HISTORY).is_none());
    }
}
