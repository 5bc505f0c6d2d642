// Operator preferences persisted wholesale, independent of telemetry

use serde::{Deserialize, Serialize};

/// Dashboard layout preferences. Field names stay camelCase on disk so the
/// legacy persisted blob reloads as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardConfig {
    pub show_gauges: bool,
    pub show_graphs: bool,
    pub show_alerts: bool,
    pub show_summary: bool,
    pub layout: String,
    pub gauge_columns: u32,
    pub graphs_position: String,
    pub edit_mode: bool,
    pub component_order: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            show_gauges: true,
            show_graphs: true,
            show_alerts: true,
            show_summary: true,
            layout: "default".to_string(),
            gauge_columns: 4,
            graphs_position: "left".to_string(),
            edit_mode: false,
            component_order: vec![
                "gauges".to_string(),
                "graphs".to_string(),
                "alerts".to_string(),
                "summary".to_string(),
            ],
        }
    }
}

/// The full preference bundle exchanged over the settings endpoint. Each
/// part lands under its own store key; there is no atomicity across them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub dark_mode: bool,
    pub language: String,
    pub dashboard: DashboardConfig,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            language: "en".to_string(),
            dashboard: DashboardConfig::default(),
        }
    }
}
