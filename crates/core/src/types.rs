use serde::{Deserialize, Serialize};

/// Asset identifiers are caller-assigned slugs (e.g. `"goblin-warrior"`).
pub type AssetId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque identifier of a background rigging job.
///
/// A fresh id is minted on every `enqueue`; later `start`/`succeed`/`fail`
/// signals must echo it back to be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Mint a new, time-ordered task id.
    pub fn generate() -> Self {
        Self(format!("rig_{}", uuid::Uuid::now_v7().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
