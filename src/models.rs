use serde::{Deserialize, Serialize};

/// A persisted row of the recordings table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub id: i64,
    pub filename: String,
    pub filepath: String,
    pub filesize: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// A recording as returned by the list endpoint, with its stream URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingEntry {
    #[serde(flatten)]
    pub recording: Recording,
    pub url: String,
}

/// Subset of a recording echoed back after an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedRecording {
    pub id: i64,
    pub filename: String,
    pub filesize: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub recording: UploadedRecording,
}

impl From<Recording> for UploadedRecording {
    fn from(recording: Recording) -> Self {
        Self {
            id: recording.id,
            filename: recording.filename,
            filesize: recording.filesize,
            created_at: recording.created_at,
        }
    }
}
