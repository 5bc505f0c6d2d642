// Threshold evaluation - pure classification of telemetry frames

use crate::domain::alert::Alert;
use crate::domain::telemetry::{ClassifiedFrame, ClassifiedReading, TagStatus, TelemetryFrame};
use crate::domain::threshold::ThresholdBook;

/// Recompute every reading's status against the threshold book.
///
/// A reading is OK iff a threshold is known for its tag (policy-aware
/// lookup), its value is a finite number and `min <= v <= max`; OFF in
/// every other case. Produces a new frame; the input is untouched.
pub fn classify(frame: &TelemetryFrame, book: &ThresholdBook) -> ClassifiedFrame {
    let readings = frame
        .readings
        .iter()
        .map(|reading| {
            let status = match (book.lookup(&reading.tag), reading.numeric_value()) {
                (Some(t), Some(v)) if v >= t.min && v <= t.max => TagStatus::Ok,
                _ => TagStatus::Off,
            };
            ClassifiedReading {
                tag: reading.tag.clone(),
                value: reading.value.clone(),
                timestamp: reading.timestamp.clone(),
                status,
            }
        })
        .collect();

    ClassifiedFrame {
        readings,
        timestamp: frame.timestamp.clone(),
    }
}

/// Surface the readings that warrant an alert.
///
/// A reading alerts iff a threshold is *configured* for its tag and the
/// value is non-numeric, out of range, or the upstream source flagged the
/// reading as not OK (even while numerically in range). Tags without a
/// configured threshold classify OFF but never alert.
pub fn extract_alerts(frame: &TelemetryFrame, book: &ThresholdBook) -> Vec<Alert> {
    frame
        .readings
        .iter()
        .filter_map(|reading| {
            let threshold = book.configured(&reading.tag)?;
            let out_of_range = match reading.numeric_value() {
                Some(v) => v < threshold.min || v > threshold.max,
                None => true,
            };
            if out_of_range || reading.reports_fault() {
                Some(Alert {
                    tag: reading.tag.clone(),
                    value: reading.value.clone(),
                    timestamp: reading.timestamp.clone(),
                    status: TagStatus::Off,
                })
            } else {
                None
            }
        })
        .collect()
}
