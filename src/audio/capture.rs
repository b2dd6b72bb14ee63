//! Microphone capture lifecycle
//!
//! One recording session at a time: acquire the device, accumulate samples,
//! finalize into a WAV clip on stop. The hardware is abstracted behind
//! [`InputBackend`] so the state machine is testable without a microphone.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{AudioClip, SAMPLE_RATE, samples_to_wav};
use crate::{Error, Result};

/// Shared accumulation buffer the backend writes captured samples into
pub type SampleSink = Arc<Mutex<Vec<f32>>>;

/// State of the capture controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No session; ready to start
    Idle,
    /// Waiting on device acquisition (OS permission prompt may be up)
    PermissionPending,
    /// Live session accumulating samples
    Recording,
    /// Last session finalized into a clip
    Stopped,
    /// Last session aborted (permission denied or device fault)
    Error,
}

/// Audio input hardware abstraction
///
/// Production uses [`CpalInput`]; tests drive the controller with a scripted
/// backend. `release` must be safe to call more than once.
#[async_trait(?Send)]
pub trait InputBackend {
    /// Open the input device. May suspend while the OS permission prompt is up.
    async fn acquire(&mut self) -> Result<()>;

    /// Begin delivering samples into `sink` until released. Device faults
    /// occurring after this point are reported on `faults`.
    fn start_stream(
        &mut self,
        sink: SampleSink,
        faults: mpsc::UnboundedSender<String>,
    ) -> Result<()>;

    /// Stop the hardware stream and drop the device handle.
    fn release(&mut self);

    /// Sample rate of delivered samples
    fn sample_rate(&self) -> u32;
}

/// One live recording attempt
struct ActiveSession {
    id: Uuid,
    samples: SampleSink,
    faults: mpsc::UnboundedReceiver<String>,
}

/// Manages exactly one microphone capture at a time
///
/// Every session ends in exactly one of: a finalized [`AudioClip`] (from
/// [`stop`](Self::stop)) or an error ([`stop`](Self::stop) after a device
/// fault, or [`take_fault`](Self::take_fault)). The device handle is released
/// exactly once on every exit path.
pub struct CaptureController<B: InputBackend> {
    backend: B,
    state: CaptureState,
    session: Option<ActiveSession>,
}

impl<B: InputBackend> CaptureController<B> {
    /// Create a controller over the given input backend
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            state: CaptureState::Idle,
            session: None,
        }
    }

    /// Begin a new capture session
    ///
    /// Acquires the input device (the pipeline's only user-facing blocking
    /// point) and starts accumulating samples.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if a session is already live (the existing
    /// session is not disturbed), or [`Error::PermissionDenied`] if the
    /// device cannot be acquired; the controller is ready to start again
    /// after either.
    pub async fn start(&mut self) -> Result<Uuid> {
        if self.session.is_some() {
            return Err(Error::Capture("recording already in progress".to_string()));
        }

        self.state = CaptureState::PermissionPending;

        if let Err(e) = self.backend.acquire().await {
            self.state = CaptureState::Error;
            tracing::warn!(error = %e, "microphone acquisition failed");
            return Err(Error::PermissionDenied(e.to_string()));
        }

        let samples: SampleSink = Arc::new(Mutex::new(Vec::new()));
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();

        if let Err(e) = self.backend.start_stream(Arc::clone(&samples), fault_tx) {
            // Device was acquired but never produced a stream; hand it back
            self.backend.release();
            self.state = CaptureState::Error;
            tracing::warn!(error = %e, "input stream failed to start");
            return Err(Error::PermissionDenied(e.to_string()));
        }

        let id = Uuid::new_v4();
        self.session = Some(ActiveSession {
            id,
            samples,
            faults: fault_rx,
        });
        self.state = CaptureState::Recording;

        tracing::debug!(session = %id, "recording started");
        Ok(id)
    }

    /// Finalize the active session
    ///
    /// Releases the device unconditionally, then returns either the
    /// accumulated samples as a WAV clip or (if a device fault ended the
    /// session early) the fault, never both. Returns `None` when no session
    /// is live, so calling twice finalizes only once.
    pub fn stop(&mut self) -> Option<Result<AudioClip>> {
        let mut session = self.session.take()?;
        self.backend.release();

        if let Ok(fault) = session.faults.try_recv() {
            self.state = CaptureState::Error;
            tracing::warn!(session = %session.id, fault, "session ended by device fault");
            return Some(Err(Error::CaptureDevice(fault)));
        }

        let samples = session
            .samples
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        tracing::debug!(session = %session.id, samples = samples.len(), "recording stopped");

        match samples_to_wav(&samples, self.backend.sample_rate()) {
            Ok(bytes) => {
                self.state = CaptureState::Stopped;
                Some(Ok(AudioClip::wav(bytes)))
            }
            Err(e) => {
                self.state = CaptureState::Error;
                Some(Err(e))
            }
        }
    }

    /// Check for a device fault on the live session
    ///
    /// If one occurred the session is torn down (stream released, no
    /// artifact) and the fault is returned; a later [`stop`](Self::stop) is
    /// then a no-op.
    pub fn take_fault(&mut self) -> Option<Error> {
        let fault = self.session.as_mut()?.faults.try_recv().ok()?;

        let session = self.session.take()?;
        self.backend.release();
        self.state = CaptureState::Error;

        tracing::warn!(session = %session.id, fault, "device fault mid-recording");
        Some(Error::CaptureDevice(fault))
    }

    /// Current controller state
    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// True while a session is live
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.session.is_some()
    }
}

/// Captures audio from the default input device via cpal
pub struct CpalInput {
    device: Option<Device>,
    config: Option<StreamConfig>,
    stream: Option<Stream>,
}

impl CpalInput {
    /// Create an unopened cpal input backend
    #[must_use]
    pub const fn new() -> Self {
        Self {
            device: None,
            config: None,
            stream: None,
        }
    }
}

impl Default for CpalInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl InputBackend for CpalInput {
    #[allow(clippy::unused_async)]
    async fn acquire(&mut self) -> Result<()> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "input device acquired"
        );

        self.device = Some(device);
        self.config = Some(config);
        Ok(())
    }

    fn start_stream(
        &mut self,
        sink: SampleSink,
        faults: mpsc::UnboundedSender<String>,
    ) -> Result<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| Error::Audio("input device not acquired".to_string()))?;
        let config = self
            .config
            .clone()
            .ok_or_else(|| Error::Audio("input config not resolved".to_string()))?;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "input stream error");
                    let _ = faults.send(err.to_string());
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("input stream started");
        Ok(())
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("input stream released");
        }
        self.device = None;
        self.config = None;
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}
