//! Playback worker lifecycle tests.
//!
//! These tests verify that:
//! 1. Invalid sources are rejected and leave the worker Stopped
//! 2. pause/resume follow their documented transitions
//! 3. stop() releases the source from every state
//! 4. A failing detector ends the run after the frames it did publish
//! 5. Paused workers consume no frames and resume in order
//! 6. Panics in the detector or source end the run like errors

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::Receiver;

use classwatch::{
    detect, ClassSelection, ClasswatchError, DetectionOutput, Detector, Frame, FrameEvent,
    FrameSource, PlaybackConfig, PlaybackEvent, PlaybackState, PlaybackWorker, StopReason,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Source that stamps each frame's index into its first pixel byte and
/// records when it is dropped. Endless unless `limit` is set.
struct ProbeSource {
    name: String,
    limit: Option<u64>,
    read: Arc<AtomicU64>,
    released: Arc<AtomicBool>,
}

#[derive(Clone)]
struct Probe {
    read: Arc<AtomicU64>,
    released: Arc<AtomicBool>,
}

impl Probe {
    fn frames_read(&self) -> u64 {
        self.read.load(Ordering::SeqCst)
    }

    fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

fn probe_source() -> (Box<dyn FrameSource>, Probe) {
    limited_probe_source(None)
}

fn limited_probe_source(limit: Option<u64>) -> (Box<dyn FrameSource>, Probe) {
    let probe = Probe {
        read: Arc::new(AtomicU64::new(0)),
        released: Arc::new(AtomicBool::new(false)),
    };
    let source = ProbeSource {
        name: "counting source".to_string(),
        limit,
        read: probe.read.clone(),
        released: probe.released.clone(),
    };
    (Box::new(source), probe)
}

impl FrameSource for ProbeSource {
    fn describe(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit == Some(self.read.load(Ordering::SeqCst)) {
            return Ok(None);
        }
        let index = self.read.fetch_add(1, Ordering::SeqCst);
        let mut pixels = vec![0u8; 4 * 4 * 3];
        pixels[0] = (index % 256) as u8;
        Frame::new(pixels, 4, 4).map(Some)
    }

    fn frames_read(&self) -> u64 {
        self.read.load(Ordering::SeqCst)
    }
}

impl Drop for ProbeSource {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Passes frames through unchanged, records the selection it was called with
/// and optionally fails on the n-th call (1-based).
struct ScriptedDetector {
    calls: u64,
    fail_on: Option<u64>,
    seen: Arc<Mutex<Vec<ClassSelection>>>,
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame, allowed: &ClassSelection) -> Result<DetectionOutput> {
        self.calls += 1;
        self.seen.lock().unwrap().push(allowed.clone());
        if self.fail_on == Some(self.calls) {
            return Err(anyhow!("model exploded on call {}", self.calls));
        }
        Ok(DetectionOutput {
            detections: Vec::new(),
            annotated: frame.clone(),
        })
    }
}

/// Panics on the n-th call (1-based).
struct PanickingDetector {
    calls: u64,
    panic_on: u64,
}

impl Detector for PanickingDetector {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn detect(&mut self, frame: &Frame, _allowed: &ClassSelection) -> Result<DetectionOutput> {
        self.calls += 1;
        if self.calls == self.panic_on {
            panic!("tensor shape mismatch");
        }
        Ok(DetectionOutput {
            detections: Vec::new(),
            annotated: frame.clone(),
        })
    }
}

/// Panics on its first read.
struct PanickingSource;

impl FrameSource for PanickingSource {
    fn describe(&self) -> &str {
        "panicking source"
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        panic!("decoder state corrupted");
    }

    fn frames_read(&self) -> u64 {
        0
    }
}

struct Harness {
    worker: PlaybackWorker,
    events: Receiver<PlaybackEvent>,
    seen: Arc<Mutex<Vec<ClassSelection>>>,
}

fn harness(fail_on: Option<u64>, config: PlaybackConfig) -> Harness {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let detector = ScriptedDetector {
        calls: 0,
        fail_on,
        seen: seen.clone(),
    };
    let (worker, events) =
        PlaybackWorker::new(detect::shared(detector), ClassSelection::all(6), config);
    Harness {
        worker,
        events,
        seen,
    }
}

fn fast_config() -> PlaybackConfig {
    PlaybackConfig {
        idle_wait: Duration::from_millis(20),
        frame_interval: Duration::from_millis(5),
    }
}

fn next_frame_event(events: &Receiver<PlaybackEvent>) -> FrameEvent {
    match events.recv_timeout(RECV_TIMEOUT).expect("worker event") {
        PlaybackEvent::Frame(event) => event,
        PlaybackEvent::Finished { reason, .. } => panic!("run ended early: {:?}", reason),
    }
}

fn collect_until_finished(events: &Receiver<PlaybackEvent>) -> (Vec<FrameEvent>, StopReason, u64) {
    let mut frames = Vec::new();
    loop {
        match events.recv_timeout(RECV_TIMEOUT).expect("worker event") {
            PlaybackEvent::Frame(event) => frames.push(event),
            PlaybackEvent::Finished { reason, frames: count } => return (frames, reason, count),
        }
    }
}

fn drain_frames(events: &Receiver<PlaybackEvent>) -> Vec<u64> {
    events
        .try_iter()
        .filter_map(|event| match event {
            PlaybackEvent::Frame(event) => Some(event.sequence),
            PlaybackEvent::Finished { .. } => None,
        })
        .collect()
}

#[test]
fn nonexistent_path_is_invalid_source_and_stays_stopped() {
    let mut h = harness(None, fast_config());
    let err = h
        .worker
        .start("/no/such/lesson.mp4", ClassSelection::all(6))
        .unwrap_err();
    assert!(matches!(err, ClasswatchError::InvalidSource { .. }));
    assert_eq!(h.worker.state(), PlaybackState::Stopped);
    assert!(h.events.try_recv().is_err(), "no events for a run that never started");
}

#[test]
fn detector_failure_on_third_frame_stops_after_two_events() {
    let mut h = harness(Some(3), fast_config());
    let (source, probe) = probe_source();
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();

    let (frames, reason, count) = collect_until_finished(&h.events);
    assert_eq!(frames.len(), 2);
    assert_eq!(count, 2);
    assert!(matches!(reason, StopReason::DetectionFailed(ref msg) if msg.contains("exploded")));
    assert_eq!(h.worker.state(), PlaybackState::Stopped);
    assert!(probe.released());
    assert_eq!(probe.frames_read(), 3);
    h.worker.stop().unwrap();
}

#[test]
fn stop_releases_source_from_running() {
    let mut h = harness(None, fast_config());
    let (source, probe) = probe_source();
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();
    next_frame_event(&h.events);

    h.worker.stop().unwrap();
    assert_eq!(h.worker.state(), PlaybackState::Stopped);
    assert!(probe.released());

    let (_, reason, _) = collect_until_finished(&h.events);
    assert_eq!(reason, StopReason::Requested);
}

#[test]
fn stop_releases_source_from_paused() {
    let mut h = harness(None, fast_config());
    let (source, probe) = probe_source();
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();
    next_frame_event(&h.events);
    assert_eq!(h.worker.pause().unwrap(), PlaybackState::Paused);

    h.worker.stop().unwrap();
    assert_eq!(h.worker.state(), PlaybackState::Stopped);
    assert!(probe.released());
}

#[test]
fn stop_is_safe_when_stopped_and_repeated() {
    let mut h = harness(None, fast_config());
    h.worker.stop().unwrap();
    h.worker.stop().unwrap();
    assert_eq!(h.worker.state(), PlaybackState::Stopped);

    let (source, probe) = probe_source();
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();
    h.worker.stop().unwrap();
    h.worker.stop().unwrap();
    assert!(probe.released());
    assert_eq!(h.worker.state(), PlaybackState::Stopped);
}

#[test]
fn pause_resume_sequences_follow_transitions() {
    #[derive(Clone, Copy, Debug)]
    enum Op {
        Pause,
        Resume,
    }
    let sequences: &[&[Op]] = &[
        &[Op::Pause],
        &[Op::Resume],
        &[Op::Pause, Op::Pause],
        &[Op::Resume, Op::Resume, Op::Pause],
        &[Op::Pause, Op::Resume, Op::Pause, Op::Pause, Op::Resume],
        &[Op::Pause, Op::Resume, Op::Resume, Op::Pause, Op::Resume, Op::Pause],
    ];

    for ops in sequences {
        let mut h = harness(None, fast_config());
        let (source, _probe) = probe_source();
        h.worker.start_with(source, ClassSelection::all(6)).unwrap();

        let mut expected = PlaybackState::Running;
        for op in ops.iter() {
            let state = match op {
                Op::Pause => {
                    expected = PlaybackState::Paused;
                    h.worker.pause().unwrap()
                }
                Op::Resume => {
                    expected = PlaybackState::Running;
                    h.worker.resume().unwrap()
                }
            };
            assert_eq!(state, expected, "after {:?} in {:?}", op, ops);
            assert_eq!(h.worker.state(), expected);
        }
        h.worker.stop().unwrap();
    }
}

#[test]
fn paused_worker_consumes_nothing_and_resumes_in_order() {
    let mut h = harness(None, fast_config());
    let (source, probe) = probe_source();
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();
    next_frame_event(&h.events);

    h.worker.pause().unwrap();
    // A frame that was mid-detection when pause landed may still be published.
    std::thread::sleep(Duration::from_millis(100));
    let before: Vec<u64> = drain_frames(&h.events);
    let last = before.last().copied().unwrap_or(0);
    let read_while_paused = probe.frames_read();
    assert_eq!(read_while_paused, last + 1);

    std::thread::sleep(Duration::from_millis(200));
    assert!(drain_frames(&h.events).is_empty());
    assert_eq!(probe.frames_read(), read_while_paused);
    assert!(!probe.released());

    h.worker.resume().unwrap();
    let event = next_frame_event(&h.events);
    assert_eq!(event.sequence, last + 1);
    assert_eq!(event.frame.pixels()[0], ((last + 1) % 256) as u8);
    h.worker.stop().unwrap();
}

#[test]
fn resume_wakes_worker_before_idle_wait_elapses() {
    let mut h = harness(
        None,
        PlaybackConfig {
            idle_wait: Duration::from_secs(30),
            frame_interval: Duration::from_millis(5),
        },
    );
    let (source, _probe) = probe_source();
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();
    next_frame_event(&h.events);
    h.worker.pause().unwrap();
    std::thread::sleep(Duration::from_millis(100));
    drain_frames(&h.events);

    let resumed_at = Instant::now();
    h.worker.resume().unwrap();
    next_frame_event(&h.events);
    assert!(resumed_at.elapsed() < Duration::from_secs(2));

    let stop_at = Instant::now();
    h.worker.pause().unwrap();
    h.worker.stop().unwrap();
    assert!(stop_at.elapsed() < Duration::from_secs(2));
}

#[test]
fn frames_are_published_in_source_order() {
    let mut h = harness(None, fast_config());
    let (source, _probe) = probe_source();
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();

    for expected in 0..10u64 {
        let event = next_frame_event(&h.events);
        assert_eq!(event.sequence, expected);
        assert_eq!(event.frame.pixels()[0], expected as u8);
    }
    h.worker.stop().unwrap();
}

#[test]
fn class_selection_change_reaches_next_detection() {
    let mut h = harness(None, fast_config());
    let (source, _probe) = probe_source();
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();
    next_frame_event(&h.events);

    h.worker.set_class_selection(ClassSelection::new([3]));
    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        if h.seen.lock().unwrap().last() == Some(&ClassSelection::new([3])) {
            break;
        }
        assert!(Instant::now() < deadline, "new selection never reached the detector");
        std::thread::sleep(Duration::from_millis(5));
    }
    h.worker.stop().unwrap();

    let seen = h.seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&ClassSelection::all(6)));
    // Once replaced, the old selection is never used again.
    let switched = seen
        .iter()
        .position(|s| *s == ClassSelection::new([3]))
        .unwrap();
    assert!(seen[switched..].iter().all(|s| *s == ClassSelection::new([3])));
}

#[test]
fn worker_restarts_after_end_of_stream() {
    let mut h = harness(None, fast_config());
    h.worker
        .start("stub://a?frames=2&width=8&height=8", ClassSelection::all(6))
        .unwrap();
    let (frames, reason, _) = collect_until_finished(&h.events);
    assert_eq!(frames.len(), 2);
    assert_eq!(reason, StopReason::EndOfStream);
    assert_eq!(h.worker.state(), PlaybackState::Stopped);

    h.worker
        .start("stub://b?frames=3&width=8&height=8", ClassSelection::new([0]))
        .unwrap();
    let (frames, reason, _) = collect_until_finished(&h.events);
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].sequence, 0);
    assert_eq!(reason, StopReason::EndOfStream);
    assert_eq!(h.worker.class_selection(), ClassSelection::new([0]));
}

#[test]
fn dropping_receiver_ends_the_run() {
    let mut h = harness(None, fast_config());
    let (source, probe) = probe_source();
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();
    next_frame_event(&h.events);
    drop(h.events);

    let deadline = Instant::now() + RECV_TIMEOUT;
    while h.worker.state() != PlaybackState::Stopped && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(h.worker.state(), PlaybackState::Stopped);
    h.worker.stop().unwrap();
    assert!(probe.released());
}

#[test]
fn detector_panic_ends_run_like_a_failure() {
    let detector = PanickingDetector {
        calls: 0,
        panic_on: 2,
    };
    let (mut worker, events) =
        PlaybackWorker::new(detect::shared(detector), ClassSelection::all(6), fast_config());
    let (source, probe) = probe_source();
    worker.start_with(source, ClassSelection::all(6)).unwrap();

    let (frames, reason, count) = collect_until_finished(&events);
    assert_eq!(frames.len(), 1);
    assert_eq!(count, 1);
    assert!(
        matches!(reason, StopReason::DetectionFailed(ref msg) if msg.contains("tensor shape mismatch")),
        "{:?}",
        reason
    );
    assert_eq!(worker.state(), PlaybackState::Stopped);
    assert!(probe.released());

    // The worker and its detector stay usable after the panic.
    worker
        .start("stub://again?frames=1&width=8&height=8", ClassSelection::all(6))
        .unwrap();
    let (frames, reason, _) = collect_until_finished(&events);
    assert_eq!(frames.len(), 1);
    assert_eq!(reason, StopReason::EndOfStream);
    worker.stop().unwrap();
}

#[test]
fn source_panic_ends_run_as_read_failure() {
    let mut h = harness(None, fast_config());
    h.worker
        .start_with(Box::new(PanickingSource), ClassSelection::all(6))
        .unwrap();

    let (frames, reason, _) = collect_until_finished(&h.events);
    assert!(frames.is_empty());
    assert!(
        matches!(reason, StopReason::ReadFailed(ref msg) if msg.contains("decoder state corrupted")),
        "{:?}",
        reason
    );
    assert_eq!(h.worker.state(), PlaybackState::Stopped);
    h.worker.stop().unwrap();
}

#[test]
fn released_source_is_never_observed_as_running() {
    let mut h = harness(None, fast_config());
    let (source, probe) = limited_probe_source(Some(3));
    h.worker.start_with(source, ClassSelection::all(6)).unwrap();

    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        // Check release first: once it is visible, Stopped must be too.
        let released = probe.released();
        let state = h.worker.state();
        if released {
            assert_eq!(state, PlaybackState::Stopped);
            break;
        }
        assert!(Instant::now() < deadline, "source was never released");
        std::hint::spin_loop();
    }
    let (frames, reason, _) = collect_until_finished(&h.events);
    assert_eq!(frames.len(), 3);
    assert_eq!(reason, StopReason::EndOfStream);
}
