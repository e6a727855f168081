//! Lifecycle tests for the microphone capture
//!
//! These run against the in-memory gateway with paused time, so device
//! read pacing advances instantly.

use parking_lot::Mutex;
use scolink_audio_core::{
    AudioCapture, AudioFormatSpec, CaptureState, ChannelLayout, SampleBits, TestAudioBuffers,
    TestAudioGateway, pcm_callback,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_test::traced_test;

fn collector() -> (Arc<Mutex<Vec<Vec<u8>>>>, Arc<dyn scolink_audio_core::PcmCallback>) {
    let blocks = Arc::new(Mutex::new(Vec::new()));
    let sink = blocks.clone();
    let callback = pcm_callback(move |data: &[u8]| sink.lock().push(data.to_vec()));
    (blocks, callback)
}

#[tokio::test(start_paused = true)]
async fn test_capture_delivers_scripted_blocks_in_order() {
    let buffers = TestAudioBuffers::new();
    buffers.push_input(vec![1u8; 64]);
    buffers.push_input(vec![2u8; 64]);
    buffers.push_input(vec![3u8; 10]);

    let gateway = TestAudioGateway::new(buffers).with_min_buffer_size(64);
    let capture = AudioCapture::new(&gateway, AudioFormatSpec::cd_mono()).await;
    assert_eq!(capture.state(), CaptureState::Idle);
    assert_eq!(capture.max_buffer_size(), 64);

    let (blocks, callback) = collector();
    capture.set_callback(callback).await;
    capture.start().await;
    assert_eq!(capture.state(), CaptureState::Recording);

    tokio::time::sleep(Duration::from_millis(200)).await;
    capture.stop().await;
    assert_eq!(capture.state(), CaptureState::Idle);

    let blocks = blocks.lock().clone();
    assert_eq!(blocks, vec![vec![1u8; 64], vec![2u8; 64], vec![3u8; 10]]);
}

#[tokio::test(start_paused = true)]
async fn test_large_device_blocks_are_split_to_buffer_size() {
    let buffers = TestAudioBuffers::new();
    buffers.push_input(vec![7u8; 100]);

    let gateway = TestAudioGateway::new(buffers).with_min_buffer_size(32);
    let capture = AudioCapture::new(&gateway, AudioFormatSpec::cd_mono()).await;
    let (blocks, callback) = collector();
    capture.set_callback(callback).await;
    capture.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    capture.release().await;

    let sizes: Vec<usize> = blocks.lock().iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![32, 32, 32, 4]);
    assert!(sizes.iter().all(|&len| len <= 32));
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_negative_read_does_not_end_stream() {
    let buffers = TestAudioBuffers::new();
    buffers.push_input(vec![1u8; 8]);
    buffers.push_input_error(-1);
    buffers.push_input(vec![2u8; 8]);

    let gateway = TestAudioGateway::new(buffers).with_min_buffer_size(8);
    let capture = AudioCapture::new(&gateway, AudioFormatSpec::cd_mono()).await;
    let (blocks, callback) = collector();
    capture.set_callback(callback).await;
    capture.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    capture.stop().await;

    assert_eq!(blocks.lock().clone(), vec![vec![1u8; 8], vec![2u8; 8]]);
    assert!(logs_contain("capture read failed"));
}

#[tokio::test(start_paused = true)]
async fn test_operations_after_release_are_ignored() {
    let gateway = TestAudioGateway::default().with_silence_when_empty();
    let capture = AudioCapture::new(&gateway, AudioFormatSpec::cd_mono()).await;
    let (blocks, callback) = collector();
    capture.set_callback(callback).await;
    capture.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    capture.stop().await;
    capture.release().await;

    assert_eq!(capture.state(), CaptureState::Uninit);
    assert_eq!(capture.max_buffer_size(), 0);
    let delivered = blocks.lock().len();
    assert!(delivered > 0);

    // None of these may panic or change state
    capture.start().await;
    capture.stop().await;
    capture.release().await;
    let (late_blocks, late_callback) = collector();
    capture.set_callback(late_callback).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(capture.state(), CaptureState::Uninit);
    assert_eq!(blocks.lock().len(), delivered);
    assert!(late_blocks.lock().is_empty());
    assert_eq!(gateway.last_input().unwrap().release_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_creation_leaves_capture_uninit() {
    let gateway = TestAudioGateway::default().with_unsupported_rate(44100);
    let capture = AudioCapture::new(&gateway, AudioFormatSpec::cd_mono()).await;
    assert_eq!(capture.state(), CaptureState::Uninit);

    let (_blocks, callback) = collector();
    capture.set_callback(callback).await;
    capture.start().await;
    capture.stop().await;
    capture.release().await;
    assert_eq!(capture.state(), CaptureState::Uninit);
    assert_eq!(gateway.opened_inputs(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_rate_is_normalized_before_open() {
    let gateway = TestAudioGateway::default();
    let spec = AudioFormatSpec {
        sample_rate_hz: 44101,
        channels: ChannelLayout::Mono,
        sample_bits: SampleBits::Sixteen,
    };
    let capture = AudioCapture::new(&gateway, spec).await;
    assert_eq!(capture.state(), CaptureState::Idle);
    assert_eq!(
        scolink_audio_core::AudioInput::format(gateway.last_input().unwrap().as_ref()).sample_rate_hz,
        16000
    );
}

#[tokio::test(start_paused = true)]
async fn test_restart_keeps_a_single_reader() {
    let gateway = TestAudioGateway::default().with_silence_when_empty();
    let capture = AudioCapture::new(&gateway, AudioFormatSpec::cd_mono()).await;
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    capture
        .set_callback(pcm_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

    for _ in 0..3 {
        capture.start().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        capture.stop().await;
    }
    capture.start().await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    capture.release().await;

    let input = gateway.last_input().unwrap();
    assert_eq!(input.max_concurrent_reads(), 1);
    assert!(count.load(Ordering::SeqCst) >= 4);
}

#[tokio::test(start_paused = true)]
async fn test_callback_can_be_replaced_while_recording() {
    let buffers = TestAudioBuffers::new();
    let gateway = TestAudioGateway::new(buffers.clone()).with_min_buffer_size(4);
    let capture = AudioCapture::new(&gateway, AudioFormatSpec::cd_mono()).await;

    let (first, first_callback) = collector();
    capture.set_callback(first_callback).await;
    buffers.push_input(vec![1u8; 4]);
    capture.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (second, second_callback) = collector();
    capture.set_callback(second_callback).await;
    buffers.push_input(vec![2u8; 4]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    capture.release().await;

    assert_eq!(first.lock().clone(), vec![vec![1u8; 4]]);
    assert_eq!(second.lock().clone(), vec![vec![2u8; 4]]);
}

#[tokio::test]
async fn test_empty_reads_yield_to_other_tasks() {
    // Unpaced device with nothing to deliver: every read returns 0 at once
    let gateway = TestAudioGateway::default().with_frame_interval(Duration::ZERO);
    let capture = AudioCapture::new(&gateway, AudioFormatSpec::cd_mono()).await;
    let (blocks, callback) = collector();
    capture.set_callback(callback).await;
    capture.start().await;

    // The timer still fires while the reader spins
    tokio::time::timeout(Duration::from_millis(20), std::future::pending::<()>())
        .await
        .unwrap_err();
    let input = gateway.last_input().unwrap();
    let before = input.read_count();
    assert!(before > 0);

    let rounds = 20;
    for _ in 0..rounds {
        tokio::task::yield_now().await;
    }
    let reads = input.read_count() - before;
    assert!(reads > 0);
    assert!(reads <= 3 * rounds, "reader ran {} reads in {} rounds", reads, rounds);

    tokio::time::timeout(Duration::from_secs(1), capture.stop())
        .await
        .expect("stop completes while reads come back empty");
    capture.release().await;
    assert_eq!(capture.state(), CaptureState::Uninit);
    assert!(blocks.lock().is_empty());
}
