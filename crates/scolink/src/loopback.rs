//! Record-and-play loopback
//!
//! [`LoopbackSession`] routes every captured PCM block into the live path
//! of a player opened at the same format. [`ScoLoopbackTrigger`] ties a
//! session to the SCO link: it starts one when SCO audio comes up and
//! tears it down when the link or the headset goes away.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info};

use scolink_audio_core::{
    AudioCapture, AudioError, AudioFormatSpec, AudioGateway, AudioPlayer, CaptureState,
    PlaybackConfig,
};
use scolink_headset_core::ScoListener;

use crate::config::ScolinkConfig;
use crate::error::ScolinkResult;

/// A running capture-to-playback loop
pub struct LoopbackSession {
    format: AudioFormatSpec,
    capture: AudioCapture,
    player: AudioPlayer,
}

impl LoopbackSession {
    /// Open both streams and start moving audio.
    ///
    /// Fails if either stream cannot be opened at `format`; nothing stays
    /// allocated in that case.
    pub async fn start(
        gateway: Arc<dyn AudioGateway>,
        format: AudioFormatSpec,
        playback: PlaybackConfig,
    ) -> ScolinkResult<Self> {
        let format = format.normalized();

        let capture = AudioCapture::new(gateway.as_ref(), format).await;
        if capture.state() == CaptureState::Uninit {
            return Err(AudioError::unsupported(format!("cannot record at {}", format)).into());
        }

        let player = AudioPlayer::with_config(gateway, playback, None);
        if !player.prepare(format).await {
            capture.release().await;
            return Err(AudioError::unsupported(format!("cannot play at {}", format)).into());
        }

        capture.set_callback(Arc::new(player.clone())).await;
        // Playback first so the first captured block has a taker
        player.play();
        capture.start().await;

        info!(%format, buffer_size = capture.max_buffer_size(), "loopback started");
        Ok(Self {
            format,
            capture,
            player,
        })
    }

    /// Stop recording, release the microphone, and end playback
    pub async fn stop(&self) {
        self.capture.stop().await;
        self.capture.release().await;
        self.player.stop().await;
        info!(format = %self.format, "loopback stopped");
    }

    /// Wait for the playback task to finish releasing the output
    pub async fn join(&self) {
        self.player.join().await;
    }

    pub fn format(&self) -> AudioFormatSpec {
        self.format
    }

    pub fn capture(&self) -> &AudioCapture {
        &self.capture
    }

    pub fn player(&self) -> &AudioPlayer {
        &self.player
    }
}

impl std::fmt::Debug for LoopbackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackSession")
            .field("format", &self.format)
            .field("capture", &self.capture)
            .field("player", &self.player)
            .finish()
    }
}

/// [`ScoListener`] that runs a [`LoopbackSession`] while SCO audio is up
pub struct ScoLoopbackTrigger {
    gateway: Arc<dyn AudioGateway>,
    format: AudioFormatSpec,
    playback: PlaybackConfig,
    session: AsyncMutex<Option<LoopbackSession>>,
    started: AtomicUsize,
}

impl ScoLoopbackTrigger {
    pub fn new(gateway: Arc<dyn AudioGateway>, format: AudioFormatSpec, playback: PlaybackConfig) -> Self {
        Self {
            gateway,
            format,
            playback,
            session: AsyncMutex::new(None),
            started: AtomicUsize::new(0),
        }
    }

    /// Trigger using the format and playback timing from `config`
    pub fn from_config(gateway: Arc<dyn AudioGateway>, config: &ScolinkConfig) -> Self {
        Self::new(gateway, config.format, config.playback.clone())
    }

    /// Whether a loopback is currently running
    pub async fn is_active(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Number of sessions started so far
    pub fn sessions_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Start a loopback unless one is already running
    pub async fn activate(&self) {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return;
        }
        match LoopbackSession::start(self.gateway.clone(), self.format, self.playback.clone()).await {
            Ok(started) => {
                self.started.fetch_add(1, Ordering::SeqCst);
                *session = Some(started);
            }
            Err(e) => error!("failed to start loopback: {}", e),
        }
    }

    /// Stop the running loopback, if any
    pub async fn deactivate(&self) {
        let running = self.session.lock().await.take();
        if let Some(running) = running {
            running.stop().await;
        }
    }
}

#[async_trait]
impl ScoListener for ScoLoopbackTrigger {
    async fn on_sco_audio_connected(&self) {
        self.activate().await;
    }

    async fn on_sco_audio_disconnected(&self) {
        self.deactivate().await;
    }

    async fn on_headset_disconnected(&self) {
        self.deactivate().await;
    }
}

impl std::fmt::Debug for ScoLoopbackTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoLoopbackTrigger")
            .field("format", &self.format)
            .field("sessions_started", &self.sessions_started())
            .finish()
    }
}
