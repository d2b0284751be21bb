//! # Capture Controller Tests
//!
//! Drives [`CaptureController`] with a scripted source on a paused tokio
//! clock, so 180 seconds of recording take no wall time.
//!
//! ```bash
//! cargo test --test capture_test
//! ```

use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use screen_recorder::capture::{
    CaptureController, CaptureError, CaptureEvent, CaptureSource, CaptureState, ChunkSink,
};
use screen_recorder::source::{CaptureInput, ReaderSource};
use screen_recorder::MAX_RECORDING_SECONDS;

#[derive(Default)]
struct ScriptState {
    deny: bool,
    sinks: Vec<ChunkSink>,
    released: usize,
}

/// Capture source whose sinks the test pushes into by hand
#[derive(Clone, Default)]
struct ScriptedSource {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSource {
    fn denying() -> Self {
        let source = Self::default();
        source.state.lock().unwrap().deny = true;
        source
    }

    fn sink(&self) -> ChunkSink {
        self.state.lock().unwrap().sinks.last().unwrap().clone()
    }

    fn acquired(&self) -> usize {
        self.state.lock().unwrap().sinks.len()
    }

    fn released(&self) -> usize {
        self.state.lock().unwrap().released
    }
}

impl CaptureSource for ScriptedSource {
    fn acquire(&mut self, sink: ChunkSink) -> Result<(), CaptureError> {
        let mut state = self.state.lock().unwrap();
        if state.deny {
            return Err(CaptureError::PermissionDenied);
        }
        state.sinks.push(sink);
        Ok(())
    }

    fn release(&mut self) {
        self.state.lock().unwrap().released += 1;
    }
}

#[tokio::test(start_paused = true)]
async fn test_auto_stops_at_ceiling() {
    let source = ScriptedSource::default();
    let mut controller = CaptureController::new(source.clone());
    controller.start().unwrap();
    source.sink().push(Bytes::from_static(b"frame"));

    let recording = controller.run_until_stopped().await.unwrap().clone();

    assert_eq!(controller.state(), CaptureState::Stopped);
    assert_eq!(recording.duration_secs(), MAX_RECORDING_SECONDS);
    assert_eq!(controller.elapsed_secs(), MAX_RECORDING_SECONDS);
    assert_eq!(recording.bytes(), Bytes::from_static(b"frame"));
    assert_eq!(source.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_rises_by_one_per_tick() {
    let mut controller = CaptureController::new(ScriptedSource::default());
    controller.start().unwrap();

    let mut ticks = 0;
    while controller.is_recording() {
        let event = controller.next_event().await.unwrap();
        let is_tick = matches!(event, CaptureEvent::Tick { .. });
        let before = controller.elapsed_secs();
        controller.apply(event);
        if is_tick {
            ticks += 1;
            assert_eq!(controller.elapsed_secs(), before + 1);
            assert!(controller.elapsed_secs() <= MAX_RECORDING_SECONDS);
        }
    }

    assert_eq!(ticks, MAX_RECORDING_SECONDS);
}

#[tokio::test(start_paused = true)]
async fn test_chunks_concatenate_in_arrival_order() {
    let source = ScriptedSource::default();
    let mut controller = CaptureController::new(source.clone());
    controller.start().unwrap();

    let sink = source.sink();
    sink.push(Bytes::from_static(b"ab"));
    sink.push(Bytes::new());
    controller.process_pending();
    sink.push(Bytes::from_static(b"cd"));
    sink.push(Bytes::from_static(b"ef"));

    // Chunks still queued at stop time belong to the recording
    let recording = controller.stop().unwrap();
    assert_eq!(recording.bytes(), Bytes::from_static(b"abcdef"));
    assert_eq!(recording.file_name(), "recording.webm");
    assert_eq!(recording.mime_type(), "video/webm");
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let source = ScriptedSource::default();
    let mut controller = CaptureController::new(source.clone());
    controller.start().unwrap();
    source.sink().push(Bytes::from_static(b"once"));

    let first = controller.stop().cloned().unwrap();
    assert!(controller.stop().is_none());

    assert_eq!(controller.state(), CaptureState::Stopped);
    assert_eq!(controller.finalized(), Some(&first));
    assert_eq!(source.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_idle_does_nothing() {
    let mut controller = CaptureController::new(ScriptedSource::default());
    assert!(controller.stop().is_none());
    assert_eq!(controller.state(), CaptureState::Idle);
    assert!(controller.finalized().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_returns_to_idle() {
    let mut controller = CaptureController::new(ScriptedSource::denying());

    assert_eq!(controller.start(), Err(CaptureError::PermissionDenied));
    assert_eq!(controller.state(), CaptureState::Idle);
    assert_eq!(controller.last_error(), Some(&CaptureError::PermissionDenied));
    assert_eq!(controller.elapsed_secs(), 0);

    // No timer was started
    let next = tokio::time::timeout(Duration::from_secs(10), controller.next_event()).await;
    assert!(next.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_no_ticks_after_stop() {
    let mut controller = CaptureController::new(ScriptedSource::default());
    controller.start().unwrap();

    for _ in 0..3 {
        let event = controller.next_event().await.unwrap();
        controller.apply(event);
    }
    assert_eq!(controller.elapsed_secs(), 3);

    controller.stop();
    let next = tokio::time::timeout(Duration::from_secs(10), controller.next_event()).await;
    assert!(next.is_err());
    assert_eq!(controller.elapsed_secs(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_supersedes_session() {
    let source = ScriptedSource::default();
    let mut controller = CaptureController::new(source.clone());

    controller.start().unwrap();
    let old_sink = source.sink();
    old_sink.push(Bytes::from_static(b"old"));
    controller.process_pending();

    controller.start().unwrap();
    assert_eq!(source.acquired(), 2);
    assert_eq!(controller.elapsed_secs(), 0);

    old_sink.push(Bytes::from_static(b"stale"));
    source.sink().push(Bytes::from_static(b"new"));

    let recording = controller.stop().unwrap();
    assert_eq!(recording.bytes(), Bytes::from_static(b"new"));
}

#[tokio::test(start_paused = true)]
async fn test_source_end_stops_recording() {
    let source = ScriptedSource::default();
    let mut controller = CaptureController::new(source.clone());
    controller.start().unwrap();

    let sink = source.sink();
    sink.push(Bytes::from_static(b"shared"));
    sink.end();

    let recording = controller.run_until_stopped().await.unwrap();
    assert_eq!(recording.bytes(), Bytes::from_static(b"shared"));
    assert_eq!(recording.duration_secs(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_handle_stops_from_another_task() {
    let mut controller = CaptureController::new(ScriptedSource::default());
    controller.start().unwrap();

    let handle = controller.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        handle.stop();
    });

    let recording = controller.run_until_stopped().await.unwrap();
    assert_eq!(recording.duration_secs(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_finalized_kept_until_next_stop() {
    let source = ScriptedSource::default();
    let mut controller = CaptureController::new(source.clone());

    controller.start().unwrap();
    source.sink().push(Bytes::from_static(b"first"));
    controller.stop();

    controller.start().unwrap();
    assert!(controller.is_recording());
    assert_eq!(
        controller.finalized().unwrap().bytes(),
        Bytes::from_static(b"first")
    );

    source.sink().push(Bytes::from_static(b"second"));
    controller.stop();
    assert_eq!(
        controller.finalized().unwrap().bytes(),
        Bytes::from_static(b"second")
    );
}

#[tokio::test]
async fn test_reader_source_records_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.webm");
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &data).unwrap();

    let mut controller = CaptureController::new(ReaderSource::new(CaptureInput::File(path)));
    controller.start().unwrap();

    let recording = controller.run_until_stopped().await.unwrap().clone();
    assert_eq!(recording.bytes().as_ref(), data.as_slice());

    let saved = dir.path().join("saved.webm");
    recording.save_to(&saved).await.unwrap();
    assert_eq!(std::fs::read(&saved).unwrap(), data);
}

#[tokio::test]
async fn test_reader_source_missing_file_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    let input = CaptureInput::File(dir.path().join("absent.webm"));

    let mut controller = CaptureController::new(ReaderSource::new(input));
    assert!(matches!(controller.start(), Err(CaptureError::Source(_))));
    assert_eq!(controller.state(), CaptureState::Idle);
    assert!(controller.last_error().is_some());
}
