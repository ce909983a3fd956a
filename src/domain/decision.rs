//! The single decision emitted by the Supervisor each tick (§3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::BatteryAction;

/// A freeform, JSON-serialisable value for the `Decision.factors` audit map. Deliberately not
/// strongly typed (§9: "the one intentionally freeform bag").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl From<f64> for FactorValue {
    fn from(v: f64) -> Self {
        FactorValue::Number(v)
    }
}

impl From<bool> for FactorValue {
    fn from(v: bool) -> Self {
        FactorValue::Bool(v)
    }
}

impl From<&str> for FactorValue {
    fn from(v: &str) -> Self {
        FactorValue::Text(v.to_string())
    }
}

/// One decision: the action taken (or recommended) for the current tick, plus its justification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub timestamp: DateTime<Utc>,
    pub action: BatteryAction,
    pub power_kw: f64,
    pub reason: String,
    pub confidence: f64,
    pub expected_value_cents: f64,
    pub factors: BTreeMap<String, FactorValue>,
}

impl Decision {
    pub fn is_fallback(&self) -> bool {
        self.reason.starts_with("FALLBACK:")
    }
}
