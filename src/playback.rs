//! Video playback worker.
//!
//! The worker owns a frame source on a dedicated thread and runs a
//! read/detect/publish loop over it. The control side drives the lifecycle:
//!
//! ```text
//!            start             pause
//! Stopped ----------> Running -------> Paused
//!    ^                 |  ^              |
//!    |   stop / EOS /  |  +--- resume ---+
//!    +--- failure -----+                 |
//!    +------------------ stop -----------+
//! ```
//!
//! State lives behind a mutex paired with a condition variable, so `resume` and
//! `stop` wake a paused or sleeping worker immediately. The source is moved into
//! the worker thread and dropped there before the state reads Stopped.
//! A panic in the source or detector ends the run the same way an error does.

use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::classes::ClassSelection;
use crate::detect::{Detection, SharedDetector};
use crate::error::{ClasswatchError, Result};
use crate::frame::Frame;
use crate::ingest::{open_source, FrameSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Running,
    Paused,
}

/// Worker timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Upper bound on one idle wait while paused before the state is re-checked.
    pub idle_wait: Duration,
    /// Delay after each published frame.
    pub frame_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            idle_wait: Duration::from_millis(100),
            frame_interval: Duration::from_millis(30),
        }
    }
}

/// An annotated frame together with the detections drawn on it.
#[derive(Clone, Debug)]
pub struct FrameEvent {
    /// Zero-based index of the published frame within the run.
    pub sequence: u64,
    pub frame: Frame,
    pub detections: Vec<Detection>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    EndOfStream,
    ReadFailed(String),
    DetectionFailed(String),
    /// The event receiver was dropped.
    Disconnected,
}

#[derive(Clone, Debug)]
pub enum PlaybackEvent {
    Frame(FrameEvent),
    /// Sent once when a run ends, after the source has been released.
    Finished { reason: StopReason, frames: u64 },
}

struct Shared {
    state: Mutex<PlaybackState>,
    wake: Condvar,
    selection: RwLock<Arc<ClassSelection>>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, PlaybackState> {
        // The state is a plain enum, so a poisoned lock still holds a valid value.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: PlaybackState) {
        *self.lock_state() = state;
        self.wake.notify_all();
    }

    fn selection(&self) -> Arc<ClassSelection> {
        self.selection
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Block while paused. Returns `false` once the state is Stopped.
    fn wait_until_runnable(&self, idle_wait: Duration) -> bool {
        let mut state = self.lock_state();
        loop {
            match *state {
                PlaybackState::Running => return true,
                PlaybackState::Stopped => return false,
                PlaybackState::Paused => {
                    state = self
                        .wake
                        .wait_timeout(state, idle_wait)
                        .unwrap_or_else(|e| e.into_inner())
                        .0;
                }
            }
        }
    }

    /// Sleep for `interval` unless stopped first. Returns `false` once Stopped.
    fn pace(&self, interval: Duration) -> bool {
        let state = self.lock_state();
        let (state, _) = self
            .wake
            .wait_timeout_while(state, interval, |s| *s != PlaybackState::Stopped)
            .unwrap_or_else(|e| e.into_inner());
        *state != PlaybackState::Stopped
    }
}

/// Runs detection over a video source on a background thread.
pub struct PlaybackWorker {
    shared: Arc<Shared>,
    detector: SharedDetector,
    events: Sender<PlaybackEvent>,
    config: PlaybackConfig,
    join: Option<JoinHandle<()>>,
}

impl PlaybackWorker {
    /// Create a stopped worker and the receiver its events are delivered to.
    pub fn new(
        detector: SharedDetector,
        selection: ClassSelection,
        config: PlaybackConfig,
    ) -> (Self, Receiver<PlaybackEvent>) {
        let (events, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            state: Mutex::new(PlaybackState::Stopped),
            wake: Condvar::new(),
            selection: RwLock::new(Arc::new(selection)),
        });
        let worker = Self {
            shared,
            detector,
            events,
            config,
            join: None,
        };
        (worker, receiver)
    }

    pub fn state(&self) -> PlaybackState {
        *self.shared.lock_state()
    }

    pub fn config(&self) -> PlaybackConfig {
        self.config
    }

    pub fn class_selection(&self) -> ClassSelection {
        self.shared.selection().as_ref().clone()
    }

    /// Open `source` and start playing it with `selection` active.
    pub fn start(&mut self, source: &str, selection: ClassSelection) -> Result<()> {
        self.ensure_stopped()?;
        let opened = open_source(source)
            .map_err(|e| ClasswatchError::invalid_source(source, format!("{:#}", e)))?;
        self.launch(opened, selection)
    }

    /// Start playing an already opened source.
    pub fn start_with(
        &mut self,
        source: Box<dyn FrameSource>,
        selection: ClassSelection,
    ) -> Result<()> {
        self.ensure_stopped()?;
        self.launch(source, selection)
    }

    /// Running -> Paused. The source keeps its position.
    pub fn pause(&self) -> Result<PlaybackState> {
        let mut state = self.shared.lock_state();
        match *state {
            PlaybackState::Running => {
                *state = PlaybackState::Paused;
                log::info!("playback paused");
            }
            PlaybackState::Paused => {}
            PlaybackState::Stopped => {
                return Err(ClasswatchError::InvalidTransition {
                    action: "pause",
                    state: *state,
                })
            }
        }
        Ok(*state)
    }

    /// Paused -> Running. Wakes the worker without waiting out the idle interval.
    pub fn resume(&self) -> Result<PlaybackState> {
        let mut state = self.shared.lock_state();
        match *state {
            PlaybackState::Paused => {
                *state = PlaybackState::Running;
                self.shared.wake.notify_all();
                log::info!("playback resumed");
            }
            PlaybackState::Running => {}
            PlaybackState::Stopped => {
                return Err(ClasswatchError::InvalidTransition {
                    action: "resume",
                    state: *state,
                })
            }
        }
        Ok(*state)
    }

    /// Stop playback and wait for the worker thread to exit.
    ///
    /// When this returns the source has been released. Calling it again is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        self.shared.set_state(PlaybackState::Stopped);
        self.join_worker()
    }

    /// Replace the active class filter. Applies from the next detection call.
    pub fn set_class_selection(&self, selection: ClassSelection) {
        log::info!("class selection set to {}", selection);
        *self
            .shared
            .selection
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Arc::new(selection);
    }

    fn ensure_stopped(&mut self) -> Result<()> {
        if self.state() != PlaybackState::Stopped {
            return Err(ClasswatchError::AlreadyActive);
        }
        // A run that ended on its own still holds a join handle.
        self.join_worker()
    }

    fn join_worker(&mut self) -> Result<()> {
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| ClasswatchError::WorkerPanicked)?;
        }
        Ok(())
    }

    fn launch(&mut self, source: Box<dyn FrameSource>, selection: ClassSelection) -> Result<()> {
        self.set_class_selection(selection);
        self.shared.set_state(PlaybackState::Running);
        log::info!("playback started on {}", source.describe());

        let run = WorkerRun {
            shared: self.shared.clone(),
            detector: self.detector.clone(),
            events: self.events.clone(),
            config: self.config,
        };
        self.join = Some(std::thread::spawn(move || run.run(source)));
        Ok(())
    }
}

impl Drop for PlaybackWorker {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("playback worker shutdown failed: {}", err);
        }
    }
}

struct WorkerRun {
    shared: Arc<Shared>,
    detector: SharedDetector,
    events: Sender<PlaybackEvent>,
    config: PlaybackConfig,
}

impl WorkerRun {
    fn run(self, mut source: Box<dyn FrameSource>) {
        let mut published = 0u64;
        let reason = self.play(source.as_mut(), &mut published);

        let description = source.describe().to_string();
        {
            // Release the source under the state lock so no observer sees
            // Running once it is gone.
            let mut state = self.shared.lock_state();
            drop(source);
            *state = PlaybackState::Stopped;
        }
        self.shared.wake.notify_all();
        log::info!(
            "playback of {} stopped after {} frames: {:?}",
            description,
            published,
            reason
        );
        // The receiver may already be gone.
        let _ = self.events.send(PlaybackEvent::Finished {
            reason,
            frames: published,
        });
    }

    fn play(&self, source: &mut dyn FrameSource, published: &mut u64) -> StopReason {
        loop {
            if !self.shared.wait_until_runnable(self.config.idle_wait) {
                return StopReason::Requested;
            }

            let read = panic::catch_unwind(AssertUnwindSafe(|| source.next_frame()))
                .unwrap_or_else(|payload| Err(panic_error("frame source", payload)));
            let frame = match read {
                Ok(Some(frame)) => frame,
                Ok(None) => return StopReason::EndOfStream,
                Err(err) => {
                    log::warn!("frame read failed on {}: {:#}", source.describe(), err);
                    return StopReason::ReadFailed(format!("{:#}", err));
                }
            };

            let selection = self.shared.selection();
            let output = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut detector = self.detector.lock().unwrap_or_else(|e| e.into_inner());
                detector.detect(&frame, &selection)
            }))
            .unwrap_or_else(|payload| Err(panic_error("detector", payload)));
            let output = match output {
                Ok(output) => output,
                Err(err) => {
                    log::error!("detector failed on frame {}: {:#}", published, err);
                    return StopReason::DetectionFailed(format!("{:#}", err));
                }
            };

            log::debug!(
                "frame {}: {} detections",
                published,
                output.detections.len()
            );
            let event = PlaybackEvent::Frame(FrameEvent {
                sequence: *published,
                frame: output.annotated,
                detections: output.detections,
            });
            if self.events.send(event).is_err() {
                return StopReason::Disconnected;
            }
            *published += 1;

            if !self.shared.pace(self.config.frame_interval) {
                return StopReason::Requested;
            }
        }
    }
}

/// Turn a caught panic into an error so the run ends through the normal path.
fn panic_error(what: &str, payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    anyhow::anyhow!("{} panicked: {}", what, message)
}
