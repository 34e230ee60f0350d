//! Types stored in the upload ledger.

/// Upload identifier.
pub type UploadId = i64;

/// How an upload stands, stored as a string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl UploadState {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadState::Running => "running",
            UploadState::Completed => "completed",
            UploadState::Failed => "failed",
            UploadState::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "running" => UploadState::Running,
            "completed" => UploadState::Completed,
            "cancelled" => UploadState::Cancelled,
            _ => UploadState::Failed,
        }
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row view used by the CLI `status` command.
#[derive(Debug, Clone)]
pub struct UploadSummary {
    pub id: UploadId,
    pub source: String,
    pub destination: String,
    pub state: UploadState,
    pub total_files: i64,
    pub part_count: i64,
    pub parts_sent: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UploadSummary {
    /// Some parts reached the remote but not all of them.
    pub fn is_partial(&self) -> bool {
        self.parts_sent > 0 && self.parts_sent < self.part_count
    }
}
