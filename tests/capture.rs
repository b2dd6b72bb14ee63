//! Capture controller state machine tests
//!
//! Drives the controller with a scripted input backend, so session
//! lifecycle and resource-release guarantees are checked without hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use aura_voice::audio::{CaptureController, CaptureState, InputBackend, SampleSink};
use aura_voice::{Error, Result, SAMPLE_RATE};
use tokio::sync::mpsc;

/// Scripted input hardware
struct MockInput {
    deny: Arc<AtomicBool>,
    samples: Vec<f32>,
    fault: Option<String>,
    acquires: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl MockInput {
    fn new(samples: Vec<f32>) -> Self {
        Self {
            deny: Arc::new(AtomicBool::new(false)),
            samples,
            fault: None,
            acquires: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_fault(mut self, fault: &str) -> Self {
        self.fault = Some(fault.to_string());
        self
    }
}

#[async_trait(?Send)]
impl InputBackend for MockInput {
    async fn acquire(&mut self) -> Result<()> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(Error::Audio("access denied by user".to_string()));
        }
        self.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start_stream(
        &mut self,
        sink: SampleSink,
        faults: mpsc::UnboundedSender<String>,
    ) -> Result<()> {
        if let Ok(mut buf) = sink.lock() {
            buf.extend_from_slice(&self.samples);
        }
        if let Some(fault) = &self.fault {
            let _ = faults.send(fault.clone());
        }
        Ok(())
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

fn speech() -> Vec<f32> {
    (0..1600)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

#[tokio::test]
async fn start_then_stop_finalizes_a_wav_clip() {
    let backend = MockInput::new(speech());
    let releases = Arc::clone(&backend.releases);
    let mut controller = CaptureController::new(backend);

    assert_eq!(controller.state(), CaptureState::Idle);

    controller.start().await.unwrap();
    assert_eq!(controller.state(), CaptureState::Recording);
    assert!(controller.is_recording());

    let clip = controller.stop().unwrap().unwrap();
    assert_eq!(clip.mime, "audio/wav");
    assert_eq!(&clip.bytes[0..4], b"RIFF");

    assert_eq!(controller.state(), CaptureState::Stopped);
    assert!(!controller.is_recording());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_twice_finalizes_only_once() {
    let backend = MockInput::new(speech());
    let releases = Arc::clone(&backend.releases);
    let mut controller = CaptureController::new(backend);

    controller.start().await.unwrap();

    assert!(controller.stop().is_some());
    assert!(controller.stop().is_none());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn start_while_recording_is_rejected() {
    let backend = MockInput::new(speech());
    let acquires = Arc::clone(&backend.acquires);
    let mut controller = CaptureController::new(backend);

    controller.start().await.unwrap();

    let err = controller.start().await.unwrap_err();
    assert!(matches!(err, Error::Capture(_)));

    // The live session is undisturbed: still recording, device acquired once,
    // and the accumulated samples still finalize
    assert!(controller.is_recording());
    assert_eq!(acquires.load(Ordering::SeqCst), 1);
    assert!(controller.stop().unwrap().is_ok());
}

#[tokio::test]
async fn permission_denial_leaves_controller_ready_to_retry() {
    let backend = MockInput::new(speech());
    let deny = Arc::clone(&backend.deny);
    let releases = Arc::clone(&backend.releases);
    let mut controller = CaptureController::new(backend);

    deny.store(true, Ordering::SeqCst);
    let err = controller.start().await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
    assert_eq!(controller.state(), CaptureState::Error);
    assert!(!controller.is_recording());

    // No stream was acquired, so nothing to release
    assert_eq!(releases.load(Ordering::SeqCst), 0);

    // Next attempt succeeds once permission is granted
    deny.store(false, Ordering::SeqCst);
    controller.start().await.unwrap();
    assert_eq!(controller.state(), CaptureState::Recording);
}

#[tokio::test]
async fn device_fault_ends_the_session_without_an_artifact() {
    let backend = MockInput::new(speech()).with_fault("device unplugged");
    let releases = Arc::clone(&backend.releases);
    let mut controller = CaptureController::new(backend);

    controller.start().await.unwrap();

    let fault = controller.take_fault().unwrap();
    assert!(matches!(fault, Error::CaptureDevice(_)));
    assert_eq!(controller.state(), CaptureState::Error);
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    // The session is gone: no completion can follow the error
    assert!(controller.stop().is_none());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fault_discovered_at_stop_voids_the_clip() {
    let backend = MockInput::new(speech()).with_fault("device unplugged");
    let releases = Arc::clone(&backend.releases);
    let mut controller = CaptureController::new(backend);

    controller.start().await.unwrap();

    let outcome = controller.stop().unwrap();
    assert!(matches!(outcome, Err(Error::CaptureDevice(_))));
    assert_eq!(controller.state(), CaptureState::Error);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn healthy_session_reports_no_fault() {
    let backend = MockInput::new(speech());
    let mut controller = CaptureController::new(backend);

    controller.start().await.unwrap();
    assert!(controller.take_fault().is_none());
    assert!(controller.is_recording());
    assert!(controller.stop().unwrap().is_ok());
}

#[tokio::test]
async fn sessions_restart_after_stop() {
    let backend = MockInput::new(speech());
    let releases = Arc::clone(&backend.releases);
    let mut controller = CaptureController::new(backend);

    let first = controller.start().await.unwrap();
    controller.stop().unwrap().unwrap();

    let second = controller.start().await.unwrap();
    assert_ne!(first, second);
    controller.stop().unwrap().unwrap();

    assert_eq!(releases.load(Ordering::SeqCst), 2);
}
