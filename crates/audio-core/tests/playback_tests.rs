//! Playback tests for the live and file paths

use scolink_audio_core::{
    AudioFormatSpec, AudioPlayer, PlayState, PlaybackConfig, PlaybackListener, TestAudioBuffers,
    TestAudioGateway,
};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

fn completion_counter() -> (Arc<AtomicUsize>, Arc<dyn PlaybackListener>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let listener: Arc<dyn PlaybackListener> = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (count, listener)
}

fn player_with_counter(gateway: Arc<TestAudioGateway>) -> (AudioPlayer, Arc<AtomicUsize>) {
    let (count, listener) = completion_counter();
    let player = AudioPlayer::with_config(gateway, PlaybackConfig::default(), Some(listener));
    (player, count)
}

#[tokio::test]
async fn test_prepare_is_idempotent() {
    let gateway = Arc::new(TestAudioGateway::default());
    let player = AudioPlayer::new(gateway.clone());
    assert_eq!(player.state(), PlayState::Uninit);

    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert!(player.prepare(AudioFormatSpec::narrowband_voice()).await);
    assert_eq!(player.state(), PlayState::Prepare);
    assert_eq!(gateway.opened_outputs(), 1);
}

#[tokio::test]
async fn test_prepare_fails_for_refused_format() {
    let gateway = Arc::new(TestAudioGateway::default().with_unsupported_rate(44100));
    let player = AudioPlayer::new(gateway);
    assert!(!player.prepare(AudioFormatSpec::cd_mono()).await);
    assert_eq!(player.state(), PlayState::Uninit);
}

#[tokio::test]
async fn test_play_requires_prepare() {
    let gateway = Arc::new(TestAudioGateway::default());
    let player = AudioPlayer::new(gateway);
    assert!(!player.play());
    assert!(!player.write(&[1, 2, 3]).await);
}

#[tokio::test(start_paused = true)]
async fn test_live_stream_plays_frames_then_ends_on_silence() {
    let buffers = TestAudioBuffers::new();
    let gateway = Arc::new(TestAudioGateway::new(buffers.clone()));
    let (player, completions) = player_with_counter(gateway.clone());

    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert!(player.play());
    assert!(!player.play(), "second play while running is ignored");

    for i in 0..5u8 {
        assert!(player.write(&[i; 16]).await);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(player.is_playing());

    let last_write = Instant::now();
    player.join().await;
    assert!(last_write.elapsed() >= Duration::from_millis(290));

    let written: Vec<Vec<u8>> = buffers.written().iter().map(|b| b.to_vec()).collect();
    let expected: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 16]).collect();
    assert_eq!(written, expected);

    assert_eq!(player.state(), PlayState::Uninit);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    let output = gateway.last_output().unwrap();
    assert!(output.is_released());
    assert_eq!(output.release_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_sink_write_after_stop_returns() {
    let buffers = TestAudioBuffers::new();
    let gateway = Arc::new(
        TestAudioGateway::new(buffers.clone()).with_write_latency(Duration::from_millis(3)),
    );
    let (player, completions) = player_with_counter(gateway.clone());

    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert!(player.play());

    let producer = {
        let player = player.clone();
        tokio::spawn(async move {
            let mut accepted = 0;
            for i in 0..100u8 {
                if player.write(&[i; 8]).await {
                    accepted += 1;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            accepted
        })
    };

    tokio::time::sleep(Duration::from_millis(60)).await;
    player.stop().await;
    let written_at_stop = buffers.written().len();
    assert!(written_at_stop > 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(buffers.written().len(), written_at_stop);
    assert_eq!(gateway.last_output().unwrap().writes_after_stop(), 0);
    assert_eq!(player.state(), PlayState::Uninit);
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    // One frame may have been handed over just before stop and then dropped
    let accepted = producer.await.unwrap();
    assert!(accepted >= written_at_stop && accepted <= written_at_stop + 1);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_ends_playback() {
    let gateway = Arc::new(TestAudioGateway::default());
    let (player, completions) = player_with_counter(gateway.clone());
    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert!(player.play());

    assert!(player.write(&[1; 4]).await);
    tokio::time::sleep(Duration::from_millis(5)).await;
    gateway.last_output().unwrap().fail_writes();
    assert!(player.write(&[2; 4]).await);

    player.join().await;
    assert_eq!(player.state(), PlayState::Uninit);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(!player.write(&[3; 4]).await);
}

#[tokio::test(start_paused = true)]
async fn test_play_file_writes_whole_file() {
    let buffers = TestAudioBuffers::new();
    let gateway = Arc::new(TestAudioGateway::new(buffers.clone()).with_min_buffer_size(100));
    let (player, completions) = player_with_counter(gateway.clone());

    let content: Vec<u8> = (0..250u32).map(|i| (i % 251) as u8).collect();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&content).unwrap();
    file.flush().unwrap();

    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert!(player.play_file(file.path()));
    player.join().await;

    let sizes: Vec<usize> = buffers.written().iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(buffers.written_bytes(), content);
    assert_eq!(player.state(), PlayState::Uninit);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_play_reader_exact_multiple_of_buffer() {
    let buffers = TestAudioBuffers::new();
    let gateway = Arc::new(TestAudioGateway::new(buffers.clone()).with_min_buffer_size(64));
    let (player, completions) = player_with_counter(gateway);

    let content = vec![5u8; 128];
    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert!(player.play_reader(std::io::Cursor::new(content.clone())));
    player.join().await;

    assert_eq!(buffers.written().len(), 2);
    assert_eq!(buffers.written_bytes(), content);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_file_still_completes() {
    let gateway = Arc::new(TestAudioGateway::default());
    let (player, completions) = player_with_counter(gateway.clone());
    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert!(player.play_file("/nonexistent/recording.pcm"));
    player.join().await;

    assert_eq!(player.state(), PlayState::Uninit);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(gateway.last_output().unwrap().is_released());
}

#[tokio::test(start_paused = true)]
async fn test_player_can_be_prepared_again_after_completion() {
    let gateway = Arc::new(TestAudioGateway::default());
    let (player, completions) = player_with_counter(gateway.clone());

    for round in 1..=2 {
        assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
        assert!(player.play());
        player.join().await;
        assert_eq!(completions.load(Ordering::SeqCst), round);
    }
    assert_eq!(gateway.opened_outputs(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_play_after_stop_waits_for_sink_release() {
    let buffers = TestAudioBuffers::new();
    let gateway = Arc::new(TestAudioGateway::new(buffers.clone()));
    let (player, completions) = player_with_counter(gateway.clone());

    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert!(player.play());
    assert!(player.write(&[1; 8]).await);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The first task is still polling and owns the sink
    player.stop().await;
    assert!(!player.play());
    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert_eq!(gateway.opened_outputs(), 1);
    assert!(!player.write(&[2; 8]).await);

    player.join().await;
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(player.state(), PlayState::Uninit);
    let released = gateway.last_output().unwrap();
    assert!(released.is_released());
    assert_eq!(released.writes_after_stop(), 0);

    // A fresh sink plays normally once the old one is gone
    assert!(player.prepare(AudioFormatSpec::cd_mono()).await);
    assert!(player.play());
    assert!(player.write(&[3; 8]).await);
    player.join().await;
    assert_eq!(gateway.opened_outputs(), 2);
    assert_eq!(completions.load(Ordering::SeqCst), 2);

    let written: Vec<Vec<u8>> = buffers.written().iter().map(|b| b.to_vec()).collect();
    assert_eq!(written, vec![vec![1u8; 8], vec![3u8; 8]]);
}
