use serde::{Deserialize, Serialize};

/// Request body for creating a named sequence
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSequenceRequest {
    #[serde(default = "default_start")]
    pub start: i64,
    #[serde(default = "default_increment")]
    pub increment: i64,
}

fn default_start() -> i64 {
    1
}

fn default_increment() -> i64 {
    1
}

impl Default for CreateSequenceRequest {
    fn default() -> Self {
        Self {
            start: default_start(),
            increment: default_increment(),
        }
    }
}

/// A value issued by a named sequence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequenceValue {
    pub name: String,
    pub value: i64,
}
