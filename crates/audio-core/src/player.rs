//! PCM playback
//!
//! [`AudioPlayer`] writes PCM to a platform output sink from a dedicated
//! task. Two sources are supported:
//!
//! - **Live**: producers call [`AudioPlayer::write`], which offers the
//!   block to a single-slot [`Rendezvous`]. The playback task polls the
//!   slot; when nothing arrives within the poll timeout the stream is
//!   considered finished.
//! - **File**: the task reads a byte stream in blocks of the output
//!   minimum buffer size until a short read.
//!
//! Either way, when the task ends it stops and releases the sink, returns
//! to [`PlayState::Uninit`] and notifies the completion listener once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capture::PcmCallback;
use crate::config::PlaybackConfig;
use crate::error::AudioResult;
use crate::gateway::{AudioGateway, AudioOutput};
use crate::rendezvous::Rendezvous;
use crate::types::{AudioFormatSpec, PcmFrame, PlayState};

/// Notified when a playback task has finished and released the sink
pub trait PlaybackListener: Send + Sync {
    /// Called exactly once per `play`/`play_file`/`play_reader`
    fn on_play_complete(&self);
}

impl<F> PlaybackListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_play_complete(&self) {
        self()
    }
}

struct PlayerShared {
    gateway: Arc<dyn AudioGateway>,
    config: PlaybackConfig,
    listener: Option<Arc<dyn PlaybackListener>>,
    state: AtomicU8,
    // stop requested, or never started
    exit: AtomicBool,
    // a playback task owns the sink until it has released it
    running: AtomicBool,
    output: Mutex<Option<Arc<dyn AudioOutput>>>,
    slot: Rendezvous<PcmFrame>,
    write_gate: AsyncMutex<()>,
    prepare_lock: AsyncMutex<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

enum PlaySource {
    Live,
    File(PathBuf),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl PlayerShared {
    fn state(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: PlayState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn exiting(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }

    async fn run(self: Arc<Self>, output: Arc<dyn AudioOutput>, source: PlaySource) {
        match source {
            PlaySource::Live => self.run_live(&output).await,
            PlaySource::File(path) => match tokio::fs::File::open(&path).await {
                Ok(file) => self.run_reader(&output, BufReader::new(file)).await,
                Err(e) => error!(path = %path.display(), "failed to open pcm file: {}", e),
            },
            PlaySource::Reader(reader) => self.run_reader(&output, reader).await,
        }
        self.finish(&output).await;
    }

    async fn start_output(&self, output: &Arc<dyn AudioOutput>) -> bool {
        if let Err(e) = output.start().await {
            error!("failed to start output sink: {}", e);
            return false;
        }
        self.set_state(PlayState::Playing);
        true
    }

    async fn run_live(&self, output: &Arc<dyn AudioOutput>) {
        if !self.start_output(output).await {
            return;
        }
        let poll_timeout = self.config.poll_timeout();

        while !self.exiting() {
            match self.slot.poll(poll_timeout).await {
                Some(frame) => {
                    if !self.write_to_sink(output, frame.bytes()).await {
                        break;
                    }
                }
                None => {
                    debug!(?poll_timeout, "no pcm frame within poll timeout, ending live stream");
                    break;
                }
            }
        }
    }

    async fn run_reader<R>(&self, output: &Arc<dyn AudioOutput>, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = vec![0u8; output.min_buffer_size().max(1)];
        if !self.start_output(output).await {
            return;
        }

        while !self.exiting() {
            let filled = match fill_buffer(&mut reader, &mut buffer).await {
                Ok(filled) => filled,
                Err(e) => {
                    error!("failed to read pcm stream: {}", e);
                    break;
                }
            };
            if filled > 0 && !self.write_to_sink(output, &buffer[..filled]).await {
                break;
            }
            if filled < buffer.len() {
                debug!("pcm stream exhausted");
                break;
            }
        }
    }

    /// Returns false when the loop must end
    async fn write_to_sink(&self, output: &Arc<dyn AudioOutput>, data: &[u8]) -> bool {
        let _gate = self.write_gate.lock().await;
        if self.exiting() {
            return false;
        }
        match output.write(data).await {
            Ok(_) => true,
            Err(e) => {
                error!("output write failed, ending playback: {}", e);
                false
            }
        }
    }

    async fn finish(&self, output: &Arc<dyn AudioOutput>) {
        {
            let _gate = self.write_gate.lock().await;
            if let Err(e) = output.stop().await {
                warn!("failed to stop output sink: {}", e);
            }
            if let Err(e) = output.release().await {
                warn!("failed to release output sink: {}", e);
            }
        }
        self.output.lock().take();
        self.set_state(PlayState::Uninit);
        self.exit.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        info!("playback complete");
        if let Some(listener) = &self.listener {
            listener.on_play_complete();
        }
    }
}

async fn fill_buffer<R>(reader: &mut R, buffer: &mut [u8]) -> AudioResult<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buffer.len() {
        let read = reader.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

/// PCM player over a platform output sink
#[derive(Clone)]
pub struct AudioPlayer {
    shared: Arc<PlayerShared>,
}

impl AudioPlayer {
    /// Create a player with the default hand-off timing
    pub fn new(gateway: Arc<dyn AudioGateway>) -> Self {
        Self::with_config(gateway, PlaybackConfig::default(), None)
    }

    /// Create a player with explicit timing and an optional completion listener
    pub fn with_config(
        gateway: Arc<dyn AudioGateway>,
        config: PlaybackConfig,
        listener: Option<Arc<dyn PlaybackListener>>,
    ) -> Self {
        Self {
            shared: Arc::new(PlayerShared {
                gateway,
                config,
                listener,
                state: AtomicU8::new(PlayState::Uninit as u8),
                exit: AtomicBool::new(true),
                running: AtomicBool::new(false),
                output: Mutex::new(None),
                slot: Rendezvous::new(),
                write_gate: AsyncMutex::new(()),
                prepare_lock: AsyncMutex::new(()),
                task: Mutex::new(None),
            }),
        }
    }

    /// Allocate the output sink.
    ///
    /// Returns true immediately when already prepared or playing.
    pub async fn prepare(&self, spec: AudioFormatSpec) -> bool {
        let _guard = self.shared.prepare_lock.lock().await;
        if self.shared.state() > PlayState::Uninit {
            return true;
        }
        let spec = spec.normalized();
        match self.shared.gateway.open_output(&spec).await {
            Ok(output) => {
                info!(%spec, buffer_size = output.min_buffer_size(), "output sink prepared");
                *self.shared.output.lock() = Some(output);
                self.shared.set_state(PlayState::Prepare);
                true
            }
            Err(e) => {
                error!(%spec, "failed to create output sink: {}", e);
                false
            }
        }
    }

    /// Start playing frames handed over through [`write`](Self::write)
    pub fn play(&self) -> bool {
        info!("play live stream");
        self.spawn(PlaySource::Live)
    }

    /// Start playing raw PCM from a file
    pub fn play_file(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "play pcm file");
        self.spawn(PlaySource::File(path))
    }

    /// Start playing raw PCM from any byte stream
    pub fn play_reader<R>(&self, reader: R) -> bool
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        info!("play pcm stream");
        self.spawn(PlaySource::Reader(Box::new(reader)))
    }

    fn spawn(&self, source: PlaySource) -> bool {
        let shared = &self.shared;
        let Some(output) = shared.output.lock().clone() else {
            warn!("play ignored, player is not prepared");
            return false;
        };
        if shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("play ignored, previous playback still owns the sink");
            return false;
        }
        shared.exit.store(false, Ordering::SeqCst);

        let task_shared = shared.clone();
        let handle = tokio::spawn(async move { task_shared.run(output, source).await });
        *shared.task.lock() = Some(handle);
        true
    }

    /// Offer one block to the live playback task.
    ///
    /// Waits up to the offer timeout for the task to take it; returns
    /// false if the block was dropped or no live playback is running.
    pub async fn write(&self, data: &[u8]) -> bool {
        if self.shared.exiting() {
            return false;
        }
        let timeout = self.shared.config.offer_timeout();
        match self.shared.slot.offer(PcmFrame::copy_from(data, data.len()), timeout).await {
            Ok(()) => true,
            Err(e) => {
                debug!(len = data.len(), "dropping pcm frame: {}", e);
                false
            }
        }
    }

    /// Ask the playback task to end.
    ///
    /// When this returns no further write reaches the output sink; the
    /// task finishes releasing the sink in the background. Until it has,
    /// `play` is refused.
    pub async fn stop(&self) {
        info!("stop playback");
        self.shared.exit.store(true, Ordering::SeqCst);
        let _gate = self.shared.write_gate.lock().await;
    }

    /// Wait for the current playback task, if any, to finish
    pub async fn join(&self) {
        let handle = self.shared.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Whether the playback task is writing to the sink
    pub fn is_playing(&self) -> bool {
        self.shared.state() == PlayState::Playing
    }

    /// Current lifecycle state
    pub fn state(&self) -> PlayState {
        self.shared.state()
    }
}

#[async_trait::async_trait]
impl PcmCallback for AudioPlayer {
    async fn on_pcm_data(&self, data: &[u8]) {
        self.write(data).await;
    }
}

impl std::fmt::Debug for AudioPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPlayer")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish()
    }
}
