use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::capture::{CaptureEvent, SessionId};
use crate::constants::TICK_INTERVAL;

/// Once-per-second tick source bound to one capture session
///
/// Ticks are delivered as [`CaptureEvent::Tick`] on the controller's queue.
/// The task is aborted on [`Timer::cancel`] or drop, so no ticks outlive the
/// session that started it.
pub struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Spawn the tick task; the first tick arrives one interval from now
    pub fn start(session: SessionId, events: UnboundedSender<CaptureEvent>) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if events.send(CaptureEvent::Tick { session }).is_err() {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
