//! # Resource Status
//!
//! Status types shared by `Bucket`, `Policy` and `User`: an ordered history of
//! conditions where the last entry describes the current state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status label of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionState {
    Ready,
    Failed,
}

impl ConditionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Failed => "Failed",
        }
    }

    fn parse(label: &str) -> Option<Self> {
        match label {
            "Ready" => Some(Self::Ready),
            "Failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ConditionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a managed MinIO resource
///
/// `conditions` is append-only history in insertion order.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Conditions in the order they were recorded; the last one is authoritative
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation of the spec the last condition was recorded for
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time (RFC3339)
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
    /// Value of the reconcile annotation when the last condition was recorded
    ///
    /// Serialized as `null` when unset so a merge patch clears a stale value.
    #[serde(default)]
    pub reconcile_request: Option<String>,
}

impl ResourceStatus {
    /// The authoritative (most recent) condition
    pub fn latest(&self) -> Option<&Condition> {
        self.conditions.last()
    }

    /// Append a condition, dropping the oldest entries beyond `limit`
    pub fn push_condition(&mut self, condition: Condition, limit: Option<usize>) {
        self.last_reconcile_time = condition.last_transition_time.clone();
        self.conditions.push(condition);
        if let Some(limit) = limit.filter(|l| *l > 0) {
            let excess = self.conditions.len().saturating_sub(limit);
            if excess > 0 {
                self.conditions.drain(..excess);
            }
        }
    }
}

/// Condition represents one observation recorded for a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Status label (Ready, Failed)
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Time the condition was recorded
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Short cause, e.g. "bucket creation failure"
    #[serde(default)]
    pub reason: Option<String>,
    /// Error detail
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// Build a condition stamped with the current time
    pub fn new(state: ConditionState, reason: impl Into<String>, message: Option<String>) -> Self {
        Self {
            r#type: state.as_str().to_string(),
            status: "True".to_string(),
            last_transition_time: Some(Utc::now().to_rfc3339()),
            reason: Some(reason.into()),
            message,
        }
    }

    pub fn ready() -> Self {
        Self::new(ConditionState::Ready, "Ready", None)
    }

    pub fn failed(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ConditionState::Failed, reason, Some(message.into()))
    }

    /// Parsed status label, `None` for labels this controller does not write
    pub fn state(&self) -> Option<ConditionState> {
        ConditionState::parse(&self.r#type)
    }
}
