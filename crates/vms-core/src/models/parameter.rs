//! Parameter store models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameter-store key (J1587 PID or J1939 SPN)
pub type ParameterId = u16;

/// How presentation code formats a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayFormat {
    /// Decimal places shown
    #[serde(default)]
    pub decimals: u8,
    /// Unit label for imperial values (e.g., "°F", "psi")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imperial_unit: Option<String>,
    /// Unit label for metric values (e.g., "°C", "kPa")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_unit: Option<String>,
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self {
            decimals: 1,
            imperial_unit: None,
            metric_unit: None,
        }
    }
}

/// Gauge thresholds (imperial units)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GaugeThresholds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_red: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_yellow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_yellow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_red: Option<f64>,
}

/// Presentation metadata owned by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub format: DisplayFormat,
    #[serde(default)]
    pub thresholds: GaugeThresholds,
}

/// Last known state of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub id: ParameterId,
    pub imperial: f64,
    pub metric: f64,
    /// False until a value is written, and after a "no data" report
    pub has_data: bool,
    pub meta: ParameterMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ParameterSnapshot {
    pub fn empty(id: ParameterId, meta: ParameterMeta) -> Self {
        Self {
            id,
            imperial: 0.0,
            metric: 0.0,
            has_data: false,
            meta,
            updated_at: None,
        }
    }
}
