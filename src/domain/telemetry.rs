// Telemetry wire and domain models
//
// The feed speaks the plant gateway's JSON dialect: a frame is
// `{"donnees": [{"tag", "valeur", "horodatage", "statut"}]}`. Field names
// are kept on the wire via serde renames; everything downstream works with
// the English struct fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed telemetry frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Classification assigned to a reading by the threshold evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "OFF")]
    Off,
}

impl TagStatus {
    pub fn is_ok(self) -> bool {
        self == TagStatus::Ok
    }
}

/// One reading as it arrives from the gateway. `value` stays a raw JSON
/// value because the source occasionally emits numeric strings or garbage;
/// classification resolves that, parsing never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReading {
    pub tag: String,
    #[serde(rename = "valeur")]
    pub value: serde_json::Value,
    #[serde(rename = "horodatage")]
    pub timestamp: String,
    #[serde(rename = "statut", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl TagReading {
    /// The reading's value as a finite number, accepting the gateway's
    /// numeric-string quirk ("12.5"). Anything else is non-numeric.
    pub fn numeric_value(&self) -> Option<f64> {
        match &self.value {
            serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// True when the source itself flagged the reading as not OK.
    pub fn reports_fault(&self) -> bool {
        self.status.as_deref().is_some_and(|s| s != "OK")
    }
}

/// A telemetry frame as received from the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    #[serde(rename = "donnees")]
    pub readings: Vec<TagReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TelemetryFrame {
    /// Validate and parse a text frame. Frames that do not match the schema
    /// are rejected here rather than propagating loose fields downstream.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A reading after threshold evaluation: `status` is always resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedReading {
    pub tag: String,
    #[serde(rename = "valeur")]
    pub value: serde_json::Value,
    #[serde(rename = "horodatage")]
    pub timestamp: String,
    #[serde(rename = "statut")]
    pub status: TagStatus,
}

/// Frame with every reading classified. Produced fresh by the evaluator;
/// the input frame is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedFrame {
    #[serde(rename = "donnees")]
    pub readings: Vec<ClassifiedReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ClassifiedFrame {
    pub fn ok_count(&self) -> usize {
        self.readings.iter().filter(|r| r.status.is_ok()).count()
    }

    pub fn fault_count(&self) -> usize {
        self.readings.len() - self.ok_count()
    }
}
