//! Capture controller: a single-writer state machine over one event queue.
//!
//! ```text
//!   Idle --start()--> Recording --stop() / ceiling / source end--> Stopped
//!     ^                   |                                          |
//!     +--start() denied---+<-------------- start() -----------------+
//! ```
//!
//! The capture source pushes chunks and the [`Timer`] pushes ticks onto the
//! same unbounded channel. Only the controller drains it, so the session's
//! chunk list and elapsed counter have exactly one writer.

use bytes::{Bytes, BytesMut};
use log::{debug, info, warn};
use std::path::Path;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::constants::{DEFAULT_RECORDING_NAME, MAX_RECORDING_SECONDS, RECORDING_MIME};
use crate::timer::Timer;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The platform or the user refused screen capture
    #[error("Screen capture permission denied")]
    PermissionDenied,
    #[error("Capture source failed: {0}")]
    Source(String),
}

/// Messages feeding the controller
#[derive(Debug)]
pub enum CaptureEvent {
    Chunk { session: SessionId, data: Bytes },
    /// The platform stream ended on its own (e.g. sharing was revoked)
    SourceEnded { session: SessionId },
    Tick { session: SessionId },
    /// User-initiated stop
    Stop,
}

/// Where a capture source delivers data for one session
#[derive(Debug, Clone)]
pub struct ChunkSink {
    session: SessionId,
    events: UnboundedSender<CaptureEvent>,
}

impl ChunkSink {
    /// Queue a chunk; returns false once the controller has gone away
    pub fn push(&self, data: impl Into<Bytes>) -> bool {
        self.events
            .send(CaptureEvent::Chunk {
                session: self.session,
                data: data.into(),
            })
            .is_ok()
    }

    pub fn end(&self) {
        let _ = self.events.send(CaptureEvent::SourceEnded {
            session: self.session,
        });
    }
}

/// Cloneable handle for issuing user actions from other tasks
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    events: UnboundedSender<CaptureEvent>,
}

impl CaptureHandle {
    pub fn stop(&self) {
        let _ = self.events.send(CaptureEvent::Stop);
    }
}

/// A platform screen+audio capture stream
pub trait CaptureSource {
    /// Request the stream and begin pushing chunks into `sink`
    fn acquire(&mut self, sink: ChunkSink) -> Result<(), CaptureError>;

    /// Stop delivering chunks and release the platform stream
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    CeilingReached,
}

/// State of one record->stop cycle
#[derive(Debug)]
pub struct CaptureSession {
    id: SessionId,
    elapsed_secs: u64,
    chunks: Vec<Bytes>,
}

impl CaptureSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            elapsed_secs: 0,
            chunks: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Append in arrival order; empty chunks are dropped
    pub fn push_chunk(&mut self, data: Bytes) {
        if !data.is_empty() {
            self.chunks.push(data);
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.elapsed_secs += 1;
        if self.elapsed_secs >= MAX_RECORDING_SECONDS {
            TickOutcome::CeilingReached
        } else {
            TickOutcome::Continue
        }
    }

    /// Concatenate all chunks into one immutable recording
    pub fn finalize(self) -> FinalizedRecording {
        let total = self.chunks.iter().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(total);
        for chunk in &self.chunks {
            data.extend_from_slice(chunk);
        }
        FinalizedRecording {
            session: self.id,
            duration_secs: self.elapsed_secs,
            data: data.freeze(),
        }
    }
}

/// The playable result of a stopped session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedRecording {
    session: SessionId,
    duration_secs: u64,
    data: Bytes,
}

impl FinalizedRecording {
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            session: 0,
            duration_secs: 0,
            data: data.into(),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    /// Cheap clone of the recording bytes
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        RECORDING_MIME
    }

    pub fn file_name(&self) -> &'static str {
        DEFAULT_RECORDING_NAME
    }

    /// Write the recording to a local file (the "download" action)
    pub async fn save_to(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, &self.data).await
    }
}

enum Phase {
    Idle,
    Recording { session: CaptureSession, timer: Timer },
    Stopped,
}

pub struct CaptureController<S: CaptureSource> {
    source: S,
    phase: Phase,
    finalized: Option<FinalizedRecording>,
    last_error: Option<CaptureError>,
    next_session: SessionId,
    events_tx: UnboundedSender<CaptureEvent>,
    events_rx: UnboundedReceiver<CaptureEvent>,
}

impl<S: CaptureSource> CaptureController<S> {
    pub fn new(source: S) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            source,
            phase: Phase::Idle,
            finalized: None,
            last_error: None,
            next_session: 1,
            events_tx,
            events_rx,
        }
    }

    pub fn handle(&self) -> CaptureHandle {
        CaptureHandle {
            events: self.events_tx.clone(),
        }
    }

    pub fn state(&self) -> CaptureState {
        match self.phase {
            Phase::Idle => CaptureState::Idle,
            Phase::Recording { .. } => CaptureState::Recording,
            Phase::Stopped => CaptureState::Stopped,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.phase, Phase::Recording { .. })
    }

    /// Seconds shown on the recording clock
    pub fn elapsed_secs(&self) -> u64 {
        match &self.phase {
            Phase::Recording { session, .. } => session.elapsed_secs(),
            Phase::Stopped => self.finalized.as_ref().map_or(0, |f| f.duration_secs()),
            Phase::Idle => 0,
        }
    }

    /// Latest finalized recording; kept until the next stop replaces it
    pub fn finalized(&self) -> Option<&FinalizedRecording> {
        self.finalized.as_ref()
    }

    /// Why the last `start()` failed, for display to the user
    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    /// Acquire the capture stream and begin a new session
    ///
    /// A session already in progress is superseded: its chunks are dropped,
    /// not merged into the new one. On denial the controller falls back to
    /// `Idle` and the error stays available through [`Self::last_error`].
    pub fn start(&mut self) -> Result<SessionId, CaptureError> {
        self.discard_active();
        self.last_error = None;

        let id = self.next_session;
        self.next_session += 1;

        let sink = ChunkSink {
            session: id,
            events: self.events_tx.clone(),
        };
        match self.source.acquire(sink) {
            Ok(()) => {
                let timer = Timer::start(id, self.events_tx.clone());
                self.phase = Phase::Recording {
                    session: CaptureSession::new(id),
                    timer,
                };
                info!("Recording started (session {})", id);
                Ok(id)
            }
            Err(e) => {
                warn!("Error starting recording: {}", e);
                self.phase = Phase::Idle;
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Finalize the current session; no-op unless recording
    pub fn stop(&mut self) -> Option<&FinalizedRecording> {
        let (mut session, timer) = match std::mem::replace(&mut self.phase, Phase::Stopped) {
            Phase::Recording { session, timer } => (session, timer),
            other => {
                self.phase = other;
                return None;
            }
        };

        timer.cancel();
        drop(timer);
        self.source.release();
        self.drain_into(&mut session);

        let recording = session.finalize();
        info!(
            "Recording stopped (session {}, {}s, {} bytes)",
            recording.session(),
            recording.duration_secs(),
            recording.len()
        );
        self.finalized = Some(recording);
        self.finalized.as_ref()
    }

    /// Apply one queued event to the state machine
    pub fn apply(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Chunk { session, data } => {
                if let Some(current) = self.current_session_mut(session) {
                    current.push_chunk(data);
                }
            }
            CaptureEvent::Tick { session } => {
                let outcome = self.current_session_mut(session).map(CaptureSession::tick);
                if outcome == Some(TickOutcome::CeilingReached) {
                    info!("Reached {}s limit, stopping", MAX_RECORDING_SECONDS);
                    self.stop();
                }
            }
            CaptureEvent::SourceEnded { session } => {
                if self.current_session_mut(session).is_some() {
                    info!("Capture source ended");
                    self.stop();
                }
            }
            CaptureEvent::Stop => {
                self.stop();
            }
        }
    }

    /// Wait for the next queued event without applying it
    pub async fn next_event(&mut self) -> Option<CaptureEvent> {
        self.events_rx.recv().await
    }

    /// Apply every event already queued; returns how many were applied
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Pump events until the session leaves `Recording`
    pub async fn run_until_stopped(&mut self) -> Option<&FinalizedRecording> {
        while self.is_recording() {
            match self.events_rx.recv().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
        match self.phase {
            Phase::Stopped => self.finalized.as_ref(),
            _ => None,
        }
    }

    fn current_session_mut(&mut self, id: SessionId) -> Option<&mut CaptureSession> {
        match &mut self.phase {
            Phase::Recording { session, .. } if session.id() == id => Some(session),
            _ => None,
        }
    }

    // Chunks queued before the stop belong to the session being finalized
    fn drain_into(&mut self, session: &mut CaptureSession) {
        while let Ok(event) = self.events_rx.try_recv() {
            if let CaptureEvent::Chunk { session: id, data } = event {
                if id == session.id() {
                    session.push_chunk(data);
                }
            }
        }
    }

    fn discard_active(&mut self) {
        if let Phase::Recording { session, timer } = std::mem::replace(&mut self.phase, Phase::Idle)
        {
            timer.cancel();
            self.source.release();
            debug!(
                "Superseding session {} ({} chunks dropped)",
                session.id(),
                session.chunk_count()
            );
        }
    }
}

impl<S: CaptureSource> Drop for CaptureController<S> {
    fn drop(&mut self) {
        if self.is_recording() {
            self.source.release();
        }
    }
}

/// Format elapsed seconds as `mm:ss`
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
