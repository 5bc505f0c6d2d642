// Threshold records and the lookup book consulted by the evaluator

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Acceptable range for one tag. Unique per tag; replaced wholesale on user
/// save, patched per-tag by gateway pushes, never deleted individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagThreshold {
    pub tag: String,
    pub label: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
}

/// Min/max pair carried by `update_thresholds` / `threshold_update`
/// messages on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPatch {
    pub min: f64,
    pub max: f64,
}

/// What to do with a tag that has no configured threshold. The legacy
/// dashboard synthesized `{min: 1, max: 15, °C}` in some revisions and
/// classified OFF in others; OFF is the default here, synthesis is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTagPolicy {
    #[default]
    Off,
    Synthesize,
}

const SYNTH_MIN: f64 = 1.0;
const SYNTH_MAX: f64 = 15.0;
const SYNTH_UNIT: &str = "°C";

/// The factory-default threshold set shipped with the dashboard.
pub fn default_thresholds() -> Vec<TagThreshold> {
    let defaults = [
        ("Tag_1001", "CPU Temperature", 1.0, 15.0, "°C"),
        ("Tag_1002", "System Pressure", 1.0, 1.0, "bar"),
        ("Tag_1003", "Flow Rate", -3.0, 3.0, "L/min"),
        ("Tag_1004", "Voltage", -3.0, 3.0, "V"),
        ("Tag_1005", "Current", -3.0, 2.0, "A"),
        ("Tag_1006", "Power", -3.0, 3.0, "kW"),
        ("Tag_1007", "Humidity", 0.0, 10.0, "%"),
    ];
    defaults
        .into_iter()
        .map(|(tag, label, min, max, unit)| TagThreshold {
            tag: tag.to_string(),
            label: label.to_string(),
            unit: unit.to_string(),
            min,
            max,
        })
        .collect()
}

/// In-memory threshold store consulted by every classification.
#[derive(Debug, Clone)]
pub struct ThresholdBook {
    entries: Vec<TagThreshold>,
    policy: UnknownTagPolicy,
}

impl ThresholdBook {
    pub fn new(entries: Vec<TagThreshold>, policy: UnknownTagPolicy) -> Self {
        Self { entries, policy }
    }

    pub fn entries(&self) -> &[TagThreshold] {
        &self.entries
    }

    /// Threshold explicitly configured for `tag`, ignoring the
    /// unknown-tag policy. Alert extraction goes through this: tags the
    /// operator never configured do not alert.
    pub fn configured(&self, tag: &str) -> Option<&TagThreshold> {
        self.entries.iter().find(|t| t.tag == tag)
    }

    /// Policy-aware lookup used for classification. Under `Synthesize` an
    /// unknown tag gets the legacy provisional range.
    pub fn lookup(&self, tag: &str) -> Option<TagThreshold> {
        if let Some(found) = self.configured(tag) {
            return Some(found.clone());
        }
        match self.policy {
            UnknownTagPolicy::Off => None,
            UnknownTagPolicy::Synthesize => Some(TagThreshold {
                tag: tag.to_string(),
                label: tag.to_string(),
                unit: SYNTH_UNIT.to_string(),
                min: SYNTH_MIN,
                max: SYNTH_MAX,
            }),
        }
    }

    /// Wholesale replacement from a user save.
    pub fn replace_all(&mut self, entries: Vec<TagThreshold>) {
        self.entries = entries;
    }

    /// Apply a gateway `threshold_update` push. Only tags already in the
    /// book are patched; unknown tags in the payload are ignored.
    pub fn apply_patch(&mut self, patch: &HashMap<String, ThresholdPatch>) {
        for entry in &mut self.entries {
            if let Some(p) = patch.get(&entry.tag) {
                entry.min = p.min;
                entry.max = p.max;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_seven_plant_tags() {
        let defaults = default_thresholds();
        assert_eq!(defaults.len(), 7);
        let cpu = &defaults[0];
        assert_eq!(cpu.tag, "Tag_1001");
        assert_eq!((cpu.min, cpu.max), (1.0, 15.0));
    }

    #[test]
    fn strict_policy_returns_none_for_unknown_tags() {
        let book = ThresholdBook::new(default_thresholds(), UnknownTagPolicy::Off);
        assert!(book.lookup("Tag_9999").is_none());
        assert!(book.configured("Tag_9999").is_none());
    }

    #[test]
    fn synthesize_policy_invents_the_legacy_range() {
        let book = ThresholdBook::new(vec![], UnknownTagPolicy::Synthesize);
        let synth = book.lookup("Tag_9999").unwrap();
        assert_eq!((synth.min, synth.max), (1.0, 15.0));
        assert_eq!(synth.unit, "°C");
        // But it is never a configured entry.
        assert!(book.configured("Tag_9999").is_none());
    }

    #[test]
    fn patch_only_touches_known_tags() {
        let mut book = ThresholdBook::new(default_thresholds(), UnknownTagPolicy::Off);
        let mut patch = HashMap::new();
        patch.insert("Tag_1001".to_string(), ThresholdPatch { min: 2.0, max: 20.0 });
        patch.insert("Tag_9999".to_string(), ThresholdPatch { min: 0.0, max: 1.0 });
        book.apply_patch(&patch);

        let cpu = book.configured("Tag_1001").unwrap();
        assert_eq!((cpu.min, cpu.max), (2.0, 20.0));
        assert!(book.configured("Tag_9999").is_none());
        assert_eq!(book.entries().len(), 7);
    }

    #[test]
    fn replace_all_is_wholesale() {
        let mut book = ThresholdBook::new(default_thresholds(), UnknownTagPolicy::Off);
        book.replace_all(vec![TagThreshold {
            tag: "Tag_2000".into(),
            label: "New".into(),
            unit: "V".into(),
            min: 0.0,
            max: 1.0,
        }]);
        assert_eq!(book.entries().len(), 1);
        assert!(book.configured("Tag_1001").is_none());
    }
}
