//! HTTP client side of the recordings API: upload, list and fetch.
//!
//! Each call is a single request. Nothing is retried; a failed call is
//! reported and a new attempt is up to the user.

use bytes::Bytes;
use log::{error, info};
use reqwest::multipart::{Form, Part};
use std::path::Path;

use crate::capture::FinalizedRecording;
use crate::constants::{RECORDINGS_PATH, VIDEO_FIELD};
use crate::models::{RecordingEntry, UploadResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid server URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

pub struct RecorderClient {
    http: reqwest::Client,
    base_url: String,
}

impl RecorderClient {
    /// Client for the server at `server_url` (e.g. `http://localhost:5000`)
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        url::Url::parse(server_url).map_err(|source| ClientError::InvalidUrl {
            url: server_url.to_string(),
            source,
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    fn recordings_url(&self) -> String {
        format!("{}{}", self.base_url, RECORDINGS_PATH)
    }

    /// Upload the finalized recording; returns `Ok(None)` when there is none
    pub async fn upload(
        &self,
        recording: Option<&FinalizedRecording>,
    ) -> Result<Option<UploadResponse>, ClientError> {
        let Some(recording) = recording else {
            return Ok(None);
        };

        let part = Part::stream_with_length(recording.bytes(), recording.len() as u64)
            .file_name(recording.file_name())
            .mime_str(recording.mime_type())?;
        self.send_upload(part).await.map(Some)
    }

    /// Upload an existing file from disk under its own file name
    pub async fn upload_file(&self, path: &Path) -> Result<UploadResponse, ClientError> {
        let data = tokio::fs::read(path).await.map_err(|source| ClientError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let part = Part::bytes(data).file_name(file_name);
        self.send_upload(part).await
    }

    async fn send_upload(&self, part: Part) -> Result<UploadResponse, ClientError> {
        let form = Form::new().part(VIDEO_FIELD, part);
        let response = self
            .http
            .post(self.recordings_url())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let body: UploadResponse = response.json().await?;
        info!("Upload response: {:?}", body);
        Ok(body)
    }

    /// Every recording on the server, newest first
    pub async fn list(&self) -> Result<Vec<RecordingEntry>, ClientError> {
        let recordings = self
            .http
            .get(self.recordings_url())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(recordings)
    }

    /// Download the bytes of one recording
    pub async fn fetch(&self, id: i64) -> Result<Bytes, ClientError> {
        let url = format!("{}/{}", self.recordings_url(), id);
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes)
    }
}

/// Outcome shown to the user after an upload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Success,
    Failure,
}

impl UploadStatus {
    pub fn from_result<T>(result: &Result<T, ClientError>) -> Self {
        match result {
            Ok(_) => UploadStatus::Success,
            Err(e) => {
                error!("Upload error: {}", e);
                UploadStatus::Failure
            }
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            UploadStatus::Success => "Uploaded successfully!",
            UploadStatus::Failure => "Upload failed.",
        }
    }
}

/// Show/hide state for the uploaded recordings list
#[derive(Debug, Default)]
pub struct RecordingsView {
    visible: bool,
    recordings: Vec<RecordingEntry>,
}

impl RecordingsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn recordings(&self) -> &[RecordingEntry] {
        &self.recordings
    }

    /// Replace the collection wholesale with the server's list
    pub async fn refresh(&mut self, client: &RecorderClient) -> Result<(), ClientError> {
        self.recordings = client.list().await?;
        Ok(())
    }

    /// Flip visibility, fetching only when becoming visible
    ///
    /// A failed fetch is logged and leaves the previous collection in place.
    pub async fn toggle(&mut self, client: &RecorderClient) -> bool {
        if !self.visible {
            if let Err(e) = self.refresh(client).await {
                error!("Error fetching recordings: {}", e);
            }
        }
        self.visible = !self.visible;
        self.visible
    }
}
