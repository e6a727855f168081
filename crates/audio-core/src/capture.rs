//! Microphone capture
//!
//! [`AudioCapture`] owns one platform recording source and a reader task.
//! While recording, the task reads blocks of the platform minimum buffer
//! size and hands each non-empty block to the installed [`PcmCallback`].
//!
//! ```text
//!  UNINIT ──create ok──▶ IDLE ──start──▶ RECORDING
//!    ▲                    │ ▲               │
//!    └──────release───────┘ └─────stop──────┘
//! ```
//!
//! Every operation on a capture that failed to create, or that has been
//! released, is logged and ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::AudioResult;
use crate::gateway::{AudioGateway, AudioInput};
use crate::types::{AudioFormatSpec, CaptureState};

/// Receiver of captured PCM blocks.
///
/// `data` borrows the capture buffer, which is reused for the next read.
/// Copy it if it must outlive the call.
#[async_trait::async_trait]
pub trait PcmCallback: Send + Sync {
    /// Called once per non-empty read
    async fn on_pcm_data(&self, data: &[u8]);
}

/// [`PcmCallback`] backed by a plain closure
pub struct FnPcmCallback<F>(F);

#[async_trait::async_trait]
impl<F> PcmCallback for FnPcmCallback<F>
where
    F: Fn(&[u8]) + Send + Sync,
{
    async fn on_pcm_data(&self, data: &[u8]) {
        (self.0)(data)
    }
}

/// Wrap a closure as a shareable [`PcmCallback`]
pub fn pcm_callback<F>(f: F) -> Arc<dyn PcmCallback>
where
    F: Fn(&[u8]) + Send + Sync + 'static,
{
    Arc::new(FnPcmCallback(f))
}

struct CaptureCore {
    state: AtomicU8,
    buffer_size: AtomicUsize,
    input: Mutex<Option<Arc<dyn AudioInput>>>,
    callback: AsyncMutex<Option<Arc<dyn PcmCallback>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureCore {
    async fn create(gateway: &dyn AudioGateway, spec: AudioFormatSpec) -> AudioResult<Self> {
        let input = gateway.open_input(&spec).await?;
        let buffer_size = input.min_buffer_size();
        info!(%spec, buffer_size, "recording source created");
        Ok(Self {
            state: AtomicU8::new(CaptureState::Idle as u8),
            buffer_size: AtomicUsize::new(buffer_size),
            input: Mutex::new(Some(input)),
            callback: AsyncMutex::new(None),
            reader: Mutex::new(None),
        })
    }

    fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: CaptureState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    async fn start_record(self: &Arc<Self>) {
        if self.state() != CaptureState::Idle {
            warn!(state = ?self.state(), "start ignored, capture is not idle");
            return;
        }
        let Some(input) = self.input.lock().clone() else {
            warn!("start ignored, recording source released");
            return;
        };

        // A previous reader must be gone before a new one starts so that
        // only one task ever reads the source.
        let previous = self.reader.lock().take();
        if let Some(previous) = previous {
            let _ = previous.await;
        }

        self.set_state(CaptureState::Recording);
        if let Err(e) = input.start().await {
            error!("failed to start recording source: {}", e);
            self.set_state(CaptureState::Idle);
            return;
        }
        info!("capture recording");

        let core = self.clone();
        let handle = tokio::spawn(async move { core.read_loop(input).await });
        *self.reader.lock() = Some(handle);
    }

    async fn read_loop(self: Arc<Self>, input: Arc<dyn AudioInput>) {
        let mut buffer = vec![0u8; self.buffer_size.load(Ordering::SeqCst)];
        debug!(buffer_size = buffer.len(), "capture loop started");

        while self.state() == CaptureState::Recording {
            match input.read(&mut buffer).await {
                Ok(0) => tokio::task::yield_now().await,
                Ok(read) => {
                    trace!(read, "read raw pcm data");
                    let callback = self.callback.lock().await;
                    if let Some(callback) = callback.as_ref() {
                        callback.on_pcm_data(&buffer[..read]).await;
                    }
                }
                Err(e) => {
                    warn!("capture read failed: {}", e);
                    tokio::task::yield_now().await;
                }
            }
        }

        debug!("capture loop finished");
    }

    async fn stop_record(&self) {
        if self.state() != CaptureState::Recording {
            warn!(state = ?self.state(), "stop ignored, capture is not recording");
            return;
        }
        self.set_state(CaptureState::Idle);
        let input = self.input.lock().clone();
        if let Some(input) = input {
            if let Err(e) = input.stop().await {
                warn!("failed to stop recording source: {}", e);
            }
        }
        info!("capture stopped");
    }

    async fn release_record(&self) {
        self.set_state(CaptureState::Uninit);
        let Some(input) = self.input.lock().take() else {
            warn!("release ignored, recording source already released");
            return;
        };

        if let Err(e) = input.stop().await {
            warn!("failed to stop recording source: {}", e);
        }
        let reader = self.reader.lock().take();
        if let Some(reader) = reader {
            let _ = reader.await;
        }
        if let Err(e) = input.release().await {
            warn!("failed to release recording source: {}", e);
        }

        self.buffer_size.store(0, Ordering::SeqCst);
        *self.callback.lock().await = None;
        info!("capture released");
    }
}

/// PCM recorder over a platform microphone source
pub struct AudioCapture {
    core: Option<Arc<CaptureCore>>,
}

impl AudioCapture {
    /// Create a recorder. The sample rate is normalized onto the supported
    /// whitelist first.
    ///
    /// Creation failure is not an error: the capture starts in
    /// [`CaptureState::Uninit`] and ignores every later operation.
    pub async fn new(gateway: &dyn AudioGateway, spec: AudioFormatSpec) -> Self {
        match CaptureCore::create(gateway, spec.normalized()).await {
            Ok(core) => Self {
                core: Some(Arc::new(core)),
            },
            Err(e) => {
                error!(%spec, "failed to create recording source: {}", e);
                Self { core: None }
            }
        }
    }

    fn core(&self) -> Option<&Arc<CaptureCore>> {
        if self.core.is_none() {
            error!("capture not initialized");
        }
        self.core.as_ref()
    }

    /// Start recording
    pub async fn start(&self) {
        if let Some(core) = self.core() {
            core.start_record().await;
        }
    }

    /// Stop recording; the source stays allocated
    pub async fn stop(&self) {
        if let Some(core) = self.core() {
            core.stop_record().await;
        }
    }

    /// Release the source. No callback runs after this returns.
    pub async fn release(&self) {
        if let Some(core) = self.core() {
            core.release_record().await;
        }
    }

    /// Install the PCM callback, replacing any previous one
    pub async fn set_callback(&self, callback: Arc<dyn PcmCallback>) {
        let Some(core) = self.core() else { return };
        if core.state() == CaptureState::Uninit {
            warn!("set_callback ignored, capture released");
            return;
        }
        *core.callback.lock().await = Some(callback);
    }

    /// Current lifecycle state
    pub fn state(&self) -> CaptureState {
        self.core
            .as_ref()
            .map(|core| core.state())
            .unwrap_or(CaptureState::Uninit)
    }

    /// Size of each read; no callback block is larger than this.
    /// Zero once released.
    pub fn max_buffer_size(&self) -> usize {
        self.core
            .as_ref()
            .map(|core| core.buffer_size.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        if let Some(core) = &self.core {
            if core.state() == CaptureState::Recording {
                core.set_state(CaptureState::Idle);
            }
            if let Some(reader) = core.reader.lock().take() {
                reader.abort();
            }
        }
    }
}

impl std::fmt::Debug for AudioCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCapture")
            .field("state", &self.state())
            .field("max_buffer_size", &self.max_buffer_size())
            .finish()
    }
}
