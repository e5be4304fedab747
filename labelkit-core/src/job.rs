//! Data output (render job) payloads and their classification

use serde::{Deserialize, Serialize};

/// Fallback message when a job fails without details
pub const GENERIC_FAILURE: &str = "Process failed";
/// Message shown when a job completes
pub const SUCCESS_MESSAGE: &str = "Process completed successfully";

/// Job status as reported by the data output and print endpoints
///
/// The shape differs between server versions, so every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DataOutput {
    #[serde(default)]
    pub pk: Option<u64>,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
    #[serde(default)]
    pub progress: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub output: Option<String>,
}

impl DataOutput {
    /// Error message carried by the payload, if any
    pub fn error_message(&self) -> Option<String> {
        if let Some(error) = self.error.as_deref().map(str::trim) {
            if !error.is_empty() {
                return Some(error.to_string());
            }
        }

        match &self.errors {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => {
                let mut messages = Vec::new();
                collect_strings(value, &mut messages);
                if messages.is_empty() {
                    if is_empty_value(value) {
                        None
                    } else {
                        Some(GENERIC_FAILURE.to_string())
                    }
                } else {
                    Some(messages.join(", "))
                }
            }
        }
    }

    /// Output location, ignoring empty strings
    pub fn output_location(&self) -> Option<&str> {
        self.output.as_deref().filter(|s| !s.is_empty())
    }

    /// Classify this payload
    pub fn state(&self) -> JobState {
        if let Some(message) = self.error_message() {
            JobState::Failed { message }
        } else if self.complete {
            JobState::Complete {
                output: self.output_location().map(str::to_string),
            }
        } else {
            JobState::Loading {
                progress: self.progress,
                total: self.total,
            }
        }
    }
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.iter().all(is_empty_value),
        serde_json::Value::Object(o) => o.values().all(is_empty_value),
        _ => false,
    }
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => out.push(s.clone()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

/// Lifecycle of a polled job: `Idle -> Loading -> {Complete | Failed}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Loading {
        progress: Option<u64>,
        total: Option<u64>,
    },
    Complete {
        output: Option<String>,
    },
    Failed {
        message: String,
    },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete { .. } | JobState::Failed { .. })
    }

    /// Progress percentage, `None` while indeterminate
    pub fn percent(&self) -> Option<u8> {
        match self {
            JobState::Loading {
                progress: Some(progress),
                total: Some(total),
            } if *total > 0 => {
                let pct = u128::from((*progress).min(*total)) * 100 / u128::from(*total);
                Some(pct as u8)
            }
            JobState::Complete { .. } => Some(100),
            _ => None,
        }
    }
}
