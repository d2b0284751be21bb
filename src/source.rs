use bytes::BytesMut;
use log::{debug, warn};
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::capture::{CaptureError, CaptureSource, ChunkSink};

const CHUNK_SIZE: usize = 64 * 1024;

/// Where a [`ReaderSource`] pulls encoded capture bytes from
#[derive(Debug, Clone)]
pub enum CaptureInput {
    /// Standard input, e.g. piped from a screen grabber
    Stdin,
    /// A file or named pipe
    File(PathBuf),
}

/// Capture source that forwards bytes read from a pipe or file as chunks
pub struct ReaderSource {
    input: CaptureInput,
    task: Option<JoinHandle<()>>,
}

impl ReaderSource {
    pub fn new(input: CaptureInput) -> Self {
        Self { input, task: None }
    }

    fn open(&self) -> Result<Box<dyn AsyncRead + Send + Unpin>, CaptureError> {
        match &self.input {
            CaptureInput::Stdin => Ok(Box::new(tokio::io::stdin())),
            CaptureInput::File(path) => {
                let file = std::fs::File::open(path).map_err(|e| match e.kind() {
                    io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
                    _ => CaptureError::Source(format!("{}: {}", path.display(), e)),
                })?;
                Ok(Box::new(tokio::fs::File::from_std(file)))
            }
        }
    }
}

impl CaptureSource for ReaderSource {
    fn acquire(&mut self, sink: ChunkSink) -> Result<(), CaptureError> {
        self.release();
        let reader = self.open()?;
        self.task = Some(tokio::spawn(pump(reader, sink)));
        Ok(())
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn pump(mut reader: Box<dyn AsyncRead + Send + Unpin>, sink: ChunkSink) {
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                debug!("Capture input reached end of stream");
                sink.end();
                break;
            }
            Ok(_) => {
                if !sink.push(buf.split().freeze()) {
                    break;
                }
                buf.reserve(CHUNK_SIZE);
            }
            Err(e) => {
                warn!("Capture input read failed: {}", e);
                sink.end();
                break;
            }
        }
    }
}
