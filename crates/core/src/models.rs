use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Audio,
    Image,
    Other,
}

/// Outcome of validating one file in one batch attempt. Immutable once built;
/// `reason` is always present when `valid` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: Option<String>,
    pub category: Category,
    pub file_size: u64,
    pub metadata: Option<serde_json::Value>,
}

impl ValidationResult {
    pub fn accepted(category: Category, file_size: u64, metadata: serde_json::Value) -> Self {
        Self {
            valid: true,
            reason: None,
            category,
            file_size,
            metadata: Some(metadata),
        }
    }

    pub fn rejected(category: Category, file_size: u64, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            category,
            file_size,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub moved: usize,
    pub rejected: usize,
}
