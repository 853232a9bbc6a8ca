//! Continuously polled detection sessions.
//!
//! A `StreamSession` binds one camera source to the shared pipeline under
//! an explicit start/stop control. Each running session owns a dedicated
//! polling thread; `stop` is signalled through an atomic flag checked at
//! every iteration boundary, so cancellation latency is bounded by one
//! poll (a read or an inference call is never interrupted mid-flight).
//!
//! The camera handle is opened by the polling thread right after `start`
//! and closed exactly once when the loop exits; the source travels back
//! through `join`, which also makes restart possible. Concurrent sessions
//! share the pipeline read-only and own nothing else in common.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::Confidence;
use crate::source::{FrameSource, SourceError};
use crate::{InspectionOutcome, Pipeline};

/// Pause after a failed read before the next poll.
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Per-iteration output of a running session.
pub enum SessionEvent {
    /// One frame was read, inferred and classified.
    Frame(Box<InspectionOutcome>),
    /// One iteration was skipped (transient read or inference failure).
    Skipped { reason: String },
    /// The session could not open its source; the loop ended.
    Fault { reason: String },
    /// The loop exited and the camera handle was closed.
    Closed,
}

enum SessionState {
    Stopped(Box<dyn FrameSource + Send>),
    Running(Runner),
    // Transitional placeholder while ownership moves in or out of a thread.
    Detached,
}

struct Runner {
    stop: Arc<AtomicBool>,
    join: JoinHandle<Box<dyn FrameSource + Send>>,
}

/// A start/stop-controlled polling loop bound to one camera source.
pub struct StreamSession {
    name: String,
    threshold: Confidence,
    pipeline: Arc<Pipeline>,
    state: SessionState,
}

impl StreamSession {
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn FrameSource + Send>,
        threshold: Confidence,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            name: name.into(),
            threshold,
            pipeline,
            state: SessionState::Stopped(source),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running(_))
    }

    /// Open the camera and enter the polling loop.
    ///
    /// Rejected while already running: a second `start` without an
    /// intervening `stop` must not open a second handle.
    pub fn start(&mut self, events: Sender<SessionEvent>) -> Result<()> {
        let SessionState::Stopped(_) = self.state else {
            return Err(anyhow!("session '{}' is already running", self.name));
        };
        let SessionState::Stopped(source) =
            std::mem::replace(&mut self.state, SessionState::Detached)
        else {
            unreachable!();
        };

        let stop = Arc::new(AtomicBool::new(false));
        let join = std::thread::spawn({
            let stop = Arc::clone(&stop);
            let pipeline = Arc::clone(&self.pipeline);
            let threshold = self.threshold;
            let name = self.name.clone();
            move || poll_loop(name, source, pipeline, threshold, stop, events)
        });

        log::info!("session '{}' started", self.name);
        self.state = SessionState::Running(Runner { stop, join });
        Ok(())
    }

    /// Signal the polling loop and wait for it to release the camera.
    ///
    /// Observed within one poll iteration. Calling `stop` on a stopped
    /// session is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        let SessionState::Running(_) = self.state else {
            return Ok(());
        };
        let SessionState::Running(runner) =
            std::mem::replace(&mut self.state, SessionState::Detached)
        else {
            unreachable!();
        };

        runner.stop.store(true, Ordering::SeqCst);
        let source = runner
            .join
            .join()
            .map_err(|_| anyhow!("session '{}' polling thread panicked", self.name))?;
        log::info!("session '{}' stopped", self.name);
        self.state = SessionState::Stopped(source);
        Ok(())
    }
}

fn poll_loop(
    name: String,
    mut source: Box<dyn FrameSource + Send>,
    pipeline: Arc<Pipeline>,
    threshold: Confidence,
    stop: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
) -> Box<dyn FrameSource + Send> {
    if let Err(e) = source.connect() {
        log::error!("session '{}': {}", name, e);
        let _ = events.send(SessionEvent::Fault {
            reason: e.to_string(),
        });
        let _ = events.send(SessionEvent::Closed);
        return source;
    }

    while !stop.load(Ordering::SeqCst) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(SourceError::Exhausted) => break,
            Err(e) => {
                // Camera hiccups are expected and transient: skip this
                // iteration and keep polling.
                log::warn!("session '{}': {}", name, e);
                if events
                    .send(SessionEvent::Skipped {
                        reason: e.to_string(),
                    })
                    .is_err()
                {
                    break;
                }
                std::thread::sleep(READ_RETRY_DELAY);
                continue;
            }
        };

        let event = match pipeline.process(&frame.image, threshold) {
            Ok(outcome) => SessionEvent::Frame(Box::new(outcome)),
            Err(e) => {
                log::warn!("session '{}': {}", name, e);
                SessionEvent::Skipped {
                    reason: e.to_string(),
                }
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }

    source.close();
    let _ = events.send(SessionEvent::Closed);
    source
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::detect::{Detector, ModelConfig};
    use crate::source::{CameraConfig, CameraSource, Frame};

    fn stub_pipeline() -> Arc<Pipeline> {
        let config = ModelConfig {
            path: "stub:".to_string(),
            ..ModelConfig::default()
        };
        Arc::new(Pipeline::new(Detector::load(&config).unwrap()))
    }

    fn stub_camera(name: &str) -> Box<dyn FrameSource + Send> {
        Box::new(
            CameraSource::new(CameraConfig {
                name: name.to_string(),
                url: format!("stub://{}", name),
                target_fps: 0,
                width: 64,
                height: 48,
            })
            .unwrap(),
        )
    }

    #[test]
    fn session_produces_outcomes_until_stopped() {
        let (tx, rx) = mpsc::channel();
        let mut session = StreamSession::new(
            "cam",
            stub_camera("cam"),
            Confidence::from_percent(40).unwrap(),
            stub_pipeline(),
        );
        session.start(tx).unwrap();
        assert!(session.is_running());

        let mut frames = 0;
        for event in rx.iter() {
            if matches!(event, SessionEvent::Frame(_)) {
                frames += 1;
                if frames >= 3 {
                    break;
                }
            }
        }
        session.stop().unwrap();
        assert!(!session.is_running());
        assert!(frames >= 3);
    }

    #[test]
    fn second_start_without_stop_is_rejected() {
        let (tx, _rx) = mpsc::channel();
        let mut session = StreamSession::new(
            "cam",
            stub_camera("cam"),
            Confidence::from_percent(40).unwrap(),
            stub_pipeline(),
        );
        session.start(tx.clone()).unwrap();
        assert!(session.start(tx).is_err());
        session.stop().unwrap();
    }

    #[test]
    fn stopped_session_can_be_restarted() {
        let (tx, rx) = mpsc::channel();
        let mut session = StreamSession::new(
            "cam",
            stub_camera("cam"),
            Confidence::from_percent(40).unwrap(),
            stub_pipeline(),
        );
        session.start(tx).unwrap();
        session.stop().unwrap();
        drop(rx);

        let (tx2, rx2) = mpsc::channel();
        session.start(tx2).unwrap();
        assert!(rx2
            .iter()
            .any(|event| matches!(event, SessionEvent::Frame(_))));
        session.stop().unwrap();
    }

    #[test]
    fn stop_without_start_is_a_noop() {
        let mut session = StreamSession::new(
            "cam",
            stub_camera("cam"),
            Confidence::from_percent(40).unwrap(),
            stub_pipeline(),
        );
        assert!(session.stop().is_ok());
        assert!(!session.is_running());
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn id(&self) -> &str {
            "failing"
        }
        fn connect(&mut self) -> Result<(), SourceError> {
            Err(SourceError::Open("no such device".to_string()))
        }
        fn next_frame(&mut self) -> Result<Frame, SourceError> {
            Err(SourceError::NotConnected)
        }
        fn close(&mut self) {}
    }

    #[test]
    fn connect_failure_emits_a_fault_and_closes() {
        let (tx, rx) = mpsc::channel();
        let mut session = StreamSession::new(
            "bad",
            Box::new(FailingSource),
            Confidence::from_percent(40).unwrap(),
            stub_pipeline(),
        );
        session.start(tx).unwrap();

        let events: Vec<SessionEvent> = rx.iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Fault { .. })));
        assert!(matches!(events.last(), Some(SessionEvent::Closed)));
        session.stop().unwrap();
    }
}
