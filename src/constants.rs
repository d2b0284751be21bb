use std::time::Duration;

/// Hard ceiling for a single capture session, in displayed seconds
pub const MAX_RECORDING_SECONDS: u64 = 180;

/// Interval between timer ticks while recording
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Multipart field carrying the recording bytes
pub const VIDEO_FIELD: &str = "video";

/// Route prefix for the recordings resource
pub const RECORDINGS_PATH: &str = "/api/recordings";

/// File name the client attaches to uploads and suggests for downloads
pub const DEFAULT_RECORDING_NAME: &str = "recording.webm";

/// Container type produced by the recorder
pub const RECORDING_MIME: &str = "video/webm";

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Recording uploaded successfully";
