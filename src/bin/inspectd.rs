//! inspectd - underbody inspection daemon
//!
//! This daemon:
//! 1. Loads the detection model once (a load failure disables detection
//!    for the process lifetime and exits with the error reported once)
//! 2. Opens one stream session per configured camera
//! 3. Polls every session concurrently, logging each frame's verdict
//! 4. Stops all sessions and releases camera handles on Ctrl-C

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{Context, Result};

use inspection_kernel::{source, InspectdConfig, Pipeline, SessionEvent, StreamSession};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = InspectdConfig::load()?;

    // Fatal when this fails: without a model there is nothing to run.
    let pipeline = Arc::new(Pipeline::load(&cfg.model).context("detection disabled")?);

    log::info!(
        "inspectd running: model={} threshold={} cameras={}",
        cfg.model.path,
        cfg.confidence,
        cfg.cameras.len()
    );

    let mut sessions = Vec::new();
    let mut receivers = Vec::new();
    for camera in &cfg.cameras {
        let name = camera.name.clone();
        let source = match source::open_camera(camera.clone()) {
            Ok(source) => source,
            Err(e) => {
                // One bad camera must not take down its siblings.
                log::error!("camera '{}' skipped: {}", name, e);
                continue;
            }
        };
        let mut session = StreamSession::new(&name, source, cfg.confidence, Arc::clone(&pipeline));
        let (tx, rx) = mpsc::channel();
        session.start(tx)?;
        sessions.push(session);
        receivers.push((name, rx));
    }
    if sessions.is_empty() {
        anyhow::bail!("no camera session could be opened");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("install signal handler")?;
    }

    while !shutdown.load(Ordering::SeqCst) {
        let mut idle = true;
        for (name, rx) in &receivers {
            while let Ok(event) = rx.try_recv() {
                idle = false;
                log_event(name, &event);
            }
        }
        if idle {
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    log::info!("shutting down {} session(s)", sessions.len());
    for session in &mut sessions {
        if let Err(e) = session.stop() {
            log::error!("session '{}' did not stop cleanly: {}", session.name(), e);
        }
    }
    Ok(())
}

fn log_event(session: &str, event: &SessionEvent) {
    match event {
        SessionEvent::Frame(outcome) => {
            let labels: Vec<String> = outcome
                .detections
                .boxes
                .iter()
                .map(|b| format!("{}:{:.2}", b.label, b.confidence))
                .collect();
            log::log!(
                outcome.verdict.log_level(),
                "{} {} verdict={} [{}]",
                outcome.verdict.marker(),
                session,
                outcome.verdict,
                labels.join(", ")
            );
        }
        SessionEvent::Skipped { reason } => {
            log::debug!("{}: iteration skipped: {}", session, reason)
        }
        SessionEvent::Fault { reason } => log::error!("{}: {}", session, reason),
        SessionEvent::Closed => log::info!("{}: camera released", session),
    }
}
