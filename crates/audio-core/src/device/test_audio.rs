//! Test audio gateway implementation for integration testing
//!
//! This module provides memory-based audio streams that can be used to
//! test the capture and playback paths without real audio hardware. The
//! microphone side replays a script of reads; the output side records
//! every accepted write.

use crate::{
    error::{AudioError, AudioResult},
    gateway::{AudioGateway, AudioInput, AudioOutput},
    types::{AudioFormatSpec, StreamDirection},
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{Duration, Instant, sleep};

/// Platform status returned when reading a source that is not recording
pub const ERROR_INVALID_OPERATION: i32 = -3;

/// One scripted microphone read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRead {
    /// Bytes the device hands back
    Data(Bytes),
    /// Negative platform status
    Error(i32),
}

/// Shared audio buffers for test streams
#[derive(Debug, Clone, Default)]
pub struct TestAudioBuffers {
    /// Scripted reads (simulates microphone data)
    pub input_script: Arc<Mutex<VecDeque<ScriptedRead>>>,
    /// Accepted writes (captures speaker data)
    pub output_writes: Arc<Mutex<Vec<Bytes>>>,
}

impl TestAudioBuffers {
    /// Create new test audio buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue microphone data
    pub fn push_input(&self, data: impl Into<Bytes>) {
        self.input_script.lock().push_back(ScriptedRead::Data(data.into()));
    }

    /// Queue a failing microphone read
    pub fn push_input_error(&self, code: i32) {
        self.input_script.lock().push_back(ScriptedRead::Error(code));
    }

    /// Everything written to the output so far
    pub fn written(&self) -> Vec<Bytes> {
        self.output_writes.lock().clone()
    }

    /// All written bytes concatenated
    pub fn written_bytes(&self) -> Vec<u8> {
        self.output_writes.lock().iter().flat_map(|b| b.iter().copied()).collect()
    }
}

/// Frame scheduler for maintaining device read latency
#[derive(Debug)]
struct FrameScheduler {
    frame_duration: Duration,
    last_frame_time: AsyncMutex<Option<Instant>>,
}

impl FrameScheduler {
    fn new(frame_duration: Duration) -> Self {
        Self {
            frame_duration,
            last_frame_time: AsyncMutex::new(None),
        }
    }

    async fn wait_for_next_frame(&self) {
        let mut last_time = self.last_frame_time.lock().await;
        let now = Instant::now();

        if let Some(last) = *last_time {
            let elapsed = now.duration_since(last);
            if elapsed < self.frame_duration {
                sleep(self.frame_duration - elapsed).await;
            }
        } else {
            sleep(self.frame_duration).await;
        }

        *last_time = Some(Instant::now());
    }
}

/// Lifecycle flags shared by both test stream kinds
#[derive(Debug, Default)]
struct StreamFlags {
    running: AtomicBool,
    released: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    release_calls: AtomicUsize,
}

impl StreamFlags {
    fn check_usable(&self, operation: &str) -> AudioResult<()> {
        if self.released.load(Ordering::SeqCst) {
            return Err(AudioError::not_initialized(operation));
        }
        Ok(())
    }
}

/// Test microphone source that replays [`TestAudioBuffers::input_script`]
#[derive(Debug)]
pub struct TestAudioInput {
    format: AudioFormatSpec,
    min_buffer_size: usize,
    buffers: TestAudioBuffers,
    scheduler: FrameScheduler,
    silence_when_empty: bool,
    flags: StreamFlags,
    reads: AtomicUsize,
    active_reads: AtomicUsize,
    max_concurrent_reads: AtomicUsize,
}

impl TestAudioInput {
    /// Check if the source is recording
    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }

    /// Whether `release` has been called
    pub fn is_released(&self) -> bool {
        self.flags.released.load(Ordering::SeqCst)
    }

    /// Number of completed reads
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Highest number of reads observed in flight at once
    pub fn max_concurrent_reads(&self) -> usize {
        self.max_concurrent_reads.load(Ordering::SeqCst)
    }

    /// Number of `release` calls
    pub fn release_calls(&self) -> usize {
        self.flags.release_calls.load(Ordering::SeqCst)
    }

    /// Generate a silence block the size of one read
    fn fill_silence(&self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.min_buffer_size);
        buf[..len].fill(0);
        len
    }

    async fn read_inner(&self, buf: &mut [u8]) -> AudioResult<usize> {
        self.flags.check_usable("read")?;
        if !self.is_running() {
            return Err(AudioError::DeviceRead {
                code: ERROR_INVALID_OPERATION,
            });
        }

        // Wait for the next frame time
        self.scheduler.wait_for_next_frame().await;

        let next = self.buffers.input_script.lock().pop_front();
        match next {
            Some(ScriptedRead::Data(data)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                if len < data.len() {
                    self.buffers
                        .input_script
                        .lock()
                        .push_front(ScriptedRead::Data(data.slice(len..)));
                }
                Ok(len)
            }
            Some(ScriptedRead::Error(code)) => Err(AudioError::DeviceRead { code }),
            None if self.silence_when_empty => Ok(self.fill_silence(buf)),
            None => Ok(0),
        }
    }
}

#[async_trait::async_trait]
impl AudioInput for TestAudioInput {
    fn min_buffer_size(&self) -> usize {
        self.min_buffer_size
    }

    fn format(&self) -> AudioFormatSpec {
        self.format
    }

    async fn start(&self) -> AudioResult<()> {
        self.flags.check_usable("start")?;
        self.flags.start_calls.fetch_add(1, Ordering::SeqCst);
        self.flags.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> AudioResult<()> {
        self.flags.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.flags.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> AudioResult<()> {
        self.flags.release_calls.fetch_add(1, Ordering::SeqCst);
        self.flags.running.store(false, Ordering::SeqCst);
        self.flags.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, buf: &mut [u8]) -> AudioResult<usize> {
        let in_flight = self.active_reads.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_reads.fetch_max(in_flight, Ordering::SeqCst);
        let result = self.read_inner(buf).await;
        self.active_reads.fetch_sub(1, Ordering::SeqCst);
        self.reads.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Test output sink that records accepted writes
#[derive(Debug)]
pub struct TestAudioOutput {
    format: AudioFormatSpec,
    min_buffer_size: usize,
    buffers: TestAudioBuffers,
    write_latency: Duration,
    fail_writes: AtomicBool,
    flags: StreamFlags,
    writes_after_stop: AtomicUsize,
}

impl TestAudioOutput {
    /// Check if the sink is playing
    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }

    /// Whether `release` has been called
    pub fn is_released(&self) -> bool {
        self.flags.released.load(Ordering::SeqCst)
    }

    /// Writes attempted while the sink was stopped or released
    pub fn writes_after_stop(&self) -> usize {
        self.writes_after_stop.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls
    pub fn stop_calls(&self) -> usize {
        self.flags.stop_calls.load(Ordering::SeqCst)
    }

    /// Number of `release` calls
    pub fn release_calls(&self) -> usize {
        self.flags.release_calls.load(Ordering::SeqCst)
    }

    /// Make every following write fail
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl AudioOutput for TestAudioOutput {
    fn min_buffer_size(&self) -> usize {
        self.min_buffer_size
    }

    fn format(&self) -> AudioFormatSpec {
        self.format
    }

    async fn start(&self) -> AudioResult<()> {
        self.flags.check_usable("start")?;
        self.flags.start_calls.fetch_add(1, Ordering::SeqCst);
        self.flags.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> AudioResult<()> {
        self.flags.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.flags.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> AudioResult<()> {
        self.flags.release_calls.fetch_add(1, Ordering::SeqCst);
        self.flags.running.store(false, Ordering::SeqCst);
        self.flags.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, data: &[u8]) -> AudioResult<usize> {
        if !self.is_running() {
            self.writes_after_stop.fetch_add(1, Ordering::SeqCst);
        }
        self.flags.check_usable("write")?;
        if !self.is_running() {
            return Err(AudioError::device_write("sink stopped"));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AudioError::device_write("injected write failure"));
        }
        if !self.write_latency.is_zero() {
            sleep(self.write_latency).await;
        }
        self.buffers.output_writes.lock().push(Bytes::copy_from_slice(data));
        Ok(data.len())
    }
}

/// In-memory [`AudioGateway`]
#[derive(Debug)]
pub struct TestAudioGateway {
    buffers: TestAudioBuffers,
    min_buffer_size: Option<usize>,
    frame_interval: Duration,
    write_latency: Duration,
    silence_when_empty: bool,
    unsupported_rates: Vec<u32>,
    last_input: Mutex<Option<Arc<TestAudioInput>>>,
    last_output: Mutex<Option<Arc<TestAudioOutput>>>,
    opened_inputs: AtomicUsize,
    opened_outputs: AtomicUsize,
}

impl TestAudioGateway {
    /// Create a gateway over the given buffers.
    ///
    /// Reads are paced at 20 ms and return zero bytes once the script is
    /// exhausted.
    pub fn new(buffers: TestAudioBuffers) -> Self {
        Self {
            buffers,
            min_buffer_size: None,
            frame_interval: Duration::from_millis(20),
            write_latency: Duration::ZERO,
            silence_when_empty: false,
            unsupported_rates: Vec::new(),
            last_input: Mutex::new(None),
            last_output: Mutex::new(None),
            opened_inputs: AtomicUsize::new(0),
            opened_outputs: AtomicUsize::new(0),
        }
    }

    /// Report a fixed minimum buffer size instead of 20 ms of audio
    pub fn with_min_buffer_size(mut self, bytes: usize) -> Self {
        self.min_buffer_size = Some(bytes);
        self
    }

    /// Device read latency
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Device write latency
    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Keep producing silence once the input script runs dry
    pub fn with_silence_when_empty(mut self) -> Self {
        self.silence_when_empty = true;
        self
    }

    /// Refuse to open streams at this sample rate
    pub fn with_unsupported_rate(mut self, rate: u32) -> Self {
        self.unsupported_rates.push(rate);
        self
    }

    /// Shared buffers
    pub fn buffers(&self) -> &TestAudioBuffers {
        &self.buffers
    }

    /// Most recently opened input
    pub fn last_input(&self) -> Option<Arc<TestAudioInput>> {
        self.last_input.lock().clone()
    }

    /// Most recently opened output
    pub fn last_output(&self) -> Option<Arc<TestAudioOutput>> {
        self.last_output.lock().clone()
    }

    /// Number of inputs opened
    pub fn opened_inputs(&self) -> usize {
        self.opened_inputs.load(Ordering::SeqCst)
    }

    /// Number of outputs opened
    pub fn opened_outputs(&self) -> usize {
        self.opened_outputs.load(Ordering::SeqCst)
    }

    fn check_format(&self, spec: &AudioFormatSpec) -> AudioResult<()> {
        if self.unsupported_rates.contains(&spec.sample_rate_hz) {
            return Err(AudioError::unsupported(format!("device refuses {}", spec)));
        }
        Ok(())
    }
}

impl Default for TestAudioGateway {
    fn default() -> Self {
        Self::new(TestAudioBuffers::new())
    }
}

#[async_trait::async_trait]
impl AudioGateway for TestAudioGateway {
    fn min_buffer_size(&self, spec: &AudioFormatSpec, _direction: StreamDirection) -> AudioResult<usize> {
        self.check_format(spec)?;
        Ok(self
            .min_buffer_size
            .unwrap_or_else(|| (spec.byte_rate() / 50).max(spec.bytes_per_frame())))
    }

    async fn open_input(&self, spec: &AudioFormatSpec) -> AudioResult<Arc<dyn AudioInput>> {
        let min_buffer_size = self.min_buffer_size(spec, StreamDirection::Input)?;
        let input = Arc::new(TestAudioInput {
            format: *spec,
            min_buffer_size,
            buffers: self.buffers.clone(),
            scheduler: FrameScheduler::new(self.frame_interval),
            silence_when_empty: self.silence_when_empty,
            flags: StreamFlags::default(),
            reads: AtomicUsize::new(0),
            active_reads: AtomicUsize::new(0),
            max_concurrent_reads: AtomicUsize::new(0),
        });
        self.opened_inputs.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock() = Some(input.clone());
        Ok(input)
    }

    async fn open_output(&self, spec: &AudioFormatSpec) -> AudioResult<Arc<dyn AudioOutput>> {
        let min_buffer_size = self.min_buffer_size(spec, StreamDirection::Output)?;
        let output = Arc::new(TestAudioOutput {
            format: *spec,
            min_buffer_size,
            buffers: self.buffers.clone(),
            write_latency: self.write_latency,
            fail_writes: AtomicBool::new(false),
            flags: StreamFlags::default(),
            writes_after_stop: AtomicUsize::new(0),
        });
        self.opened_outputs.fetch_add(1, Ordering::SeqCst);
        *self.last_output.lock() = Some(output.clone());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_scripted_reads_flow() {
        let buffers = TestAudioBuffers::new();
        buffers.push_input(vec![1u8, 2, 3, 4]);
        buffers.push_input_error(-1);

        let gateway = TestAudioGateway::new(buffers.clone()).with_min_buffer_size(2);
        let input = gateway.open_input(&AudioFormatSpec::cd_mono()).await.unwrap();
        input.start().await.unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(input.read(&mut buf).await.unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(input.read(&mut buf).await.unwrap(), 2);
        assert_eq!(buf, [3, 4]);
        assert!(matches!(
            input.read(&mut buf).await,
            Err(AudioError::DeviceRead { code: -1 })
        ));
        assert_eq!(input.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_before_start_fails() {
        let gateway = TestAudioGateway::default();
        let input = gateway.open_input(&AudioFormatSpec::cd_mono()).await.unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(
            input.read(&mut buf).await,
            Err(AudioError::DeviceRead { code: ERROR_INVALID_OPERATION })
        ));
    }

    #[tokio::test]
    async fn test_output_records_writes() {
        let buffers = TestAudioBuffers::new();
        let gateway = TestAudioGateway::new(buffers.clone());
        let output = gateway.open_output(&AudioFormatSpec::cd_mono()).await.unwrap();
        output.start().await.unwrap();
        output.write(&[9, 9, 9]).await.unwrap();
        output.stop().await.unwrap();
        assert!(output.write(&[1]).await.is_err());
        output.release().await.unwrap();
        assert!(matches!(output.write(&[1]).await, Err(AudioError::NotInitialized { .. })));

        assert_eq!(buffers.written_bytes(), vec![9, 9, 9]);
        assert_eq!(gateway.last_output().unwrap().writes_after_stop(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_rate_is_rejected() {
        let gateway = TestAudioGateway::default().with_unsupported_rate(82000);
        let spec = AudioFormatSpec::new(
            82000,
            crate::types::ChannelLayout::Mono,
            crate::types::SampleBits::Sixteen,
        );
        assert!(matches!(
            gateway.open_input(&spec).await,
            Err(AudioError::Unsupported { .. })
        ));
        assert_eq!(gateway.opened_inputs(), 0);
    }

    #[test]
    fn test_default_min_buffer_is_twenty_ms() {
        let gateway = TestAudioGateway::default();
        let size = gateway
            .min_buffer_size(&AudioFormatSpec::cd_mono(), StreamDirection::Output)
            .unwrap();
        assert_eq!(size, 44100 * 2 / 50);
    }
}
