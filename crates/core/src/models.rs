use serde::{Deserialize, Serialize};

/// One indexed repository file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Relative to the scan root, `/`-separated.
    pub path: String,
    pub content: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub timestamp: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    pub success: bool,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MutationResult {
    pub fn ok(path: &str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            path: path.to_string(),
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(path: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            path: path.to_string(),
            message: None,
            error: Some(error.into()),
        }
    }
}
