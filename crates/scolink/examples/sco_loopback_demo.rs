//! SCO Loopback Example
//!
//! This example walks through a whole headset session with the in-memory
//! audio gateway and the scriptable Bluetooth platform:
//!
//! 1. The controller starts and brings up the SCO link
//! 2. Once SCO audio is up, microphone blocks are played back live
//! 3. The link drops and the loopback is torn down
//! 4. The headset reports its battery through a vendor command
//!
//! Run with: cargo run --example sco_loopback_demo

use std::sync::Arc;
use std::time::Duration;

use scolink::{
    Broadcast, ControllerState, FakeBluetoothPlatform, LoggingConfig, ScoController, ScoEvent,
    ScoLinkState, ScoListener, ScoLoopbackTrigger, ScolinkConfig, TestAudioBuffers,
    TestAudioGateway, log_welcome, setup_logging,
};
use scolink_headset_core::vendor::IPHONEACCEV;
use scolink_headset_core::{VendorArg, VendorCommand};

struct ConsoleListener;

#[async_trait::async_trait]
impl ScoListener for ConsoleListener {
    async fn on_sco_event(&self, event: ScoEvent) {
        match event {
            ScoEvent::HeadsetConnected => println!("🎧 Headset connected"),
            ScoEvent::HeadsetDisconnected => println!("🔌 Headset disconnected"),
            ScoEvent::ScoAudioConnected => println!("✅ SCO audio connected"),
            ScoEvent::ScoAudioDisconnected => println!("⏹️  SCO audio disconnected"),
        }
    }
}

const DEMO_CONFIG: &str = r#"
[sco]
retry_horizon_ms = 5000
retry_period_ms = 500

[playback]
offer_timeout_ms = 100
poll_timeout_ms = 300

[format]
sample_rate_hz = 8000
channels = "mono"
sample_bits = 16

[logging]
level = "info"
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ScolinkConfig::from_toml_str(DEMO_CONFIG)?;
    setup_logging(&LoggingConfig {
        app_name: "sco_loopback_demo".to_string(),
        ..config.logging.clone()
    })?;
    log_welcome("sco_loopback_demo", scolink::VERSION);

    println!("🎵 SCO Loopback Example");
    println!("=======================");
    println!("📝 Format: {}", config.format);

    // One second of a rising tone pattern, in 20 ms blocks
    let buffers = TestAudioBuffers::new();
    let block_len = config.format.byte_rate() / 50;
    for step in 0..50u8 {
        buffers.push_input(vec![step; block_len]);
    }
    let gateway = Arc::new(TestAudioGateway::new(buffers.clone()));

    let platform = Arc::new(FakeBluetoothPlatform::new().with_auto_connect());
    let controller = ScoController::with_config(platform.clone(), config.sco.clone());
    let trigger = Arc::new(ScoLoopbackTrigger::from_config(gateway.clone(), &config));
    controller.add_listener(Arc::new(ConsoleListener));
    controller.add_listener(trigger.clone());

    println!("\n🔍 Starting SCO controller...");
    if !controller.start().await {
        println!("⏳ No headset yet, waiting for one ({})", controller.state());
    }

    let headset = FakeBluetoothPlatform::default_headset();
    println!("📡 Connecting headset {}", headset.display_name());
    platform.connect_headset(headset.clone());
    tokio::time::sleep(Duration::from_millis(200)).await;

    if controller.state() != ControllerState::Up {
        println!("❌ SCO link did not come up ({})", controller.state());
        controller.stop().await;
        return Ok(());
    }

    println!("\n▶️  Loopback running for one second...");
    tokio::time::sleep(Duration::from_secs(1)).await;
    let written = buffers.written();
    let bytes: usize = written.iter().map(|block| block.len()).sum();
    println!("📊 Played {} blocks ({} bytes)", written.len(), bytes);

    let battery = VendorCommand::new(IPHONEACCEV, 2, vec![VendorArg::Int(1), VendorArg::Int(1), VendorArg::Int(6)]);
    platform.send(Broadcast::vendor(battery));
    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Some(level) = controller.demux().last_battery_level() {
        println!("🔋 Headset battery: {:.0}%", level * 100.0);
    }

    println!("\n📴 Dropping the SCO link...");
    platform.send_sco_state(ScoLinkState::Disconnected);
    tokio::time::sleep(Duration::from_millis(400)).await;
    println!("   Loopback active: {}", trigger.is_active().await);

    println!("\n🛑 Stopping controller...");
    controller.stop().await;
    trigger.deactivate().await;
    println!("   Audio mode restored to {:?}", platform.mode_history().last());
    println!("\n✅ Demo complete");

    Ok(())
}
