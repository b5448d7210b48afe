//! SensorNode firmware: main entry point (update-engine core).
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  StdFlashFs     EspHttpClient   EspSystem     ReactorDelay     │
//! │  (FlashFs)      (HttpClient)    (SystemPort)  (Delay)          │
//! │  StaLink        LogEventSink + ProgressLed                     │
//! │  (LinkPort)     (EventSink)                                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              OtaUpdater (pure logic)                   │    │
//! │  │  fetch · budget · download · apply · commit · flags    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  boot sequence (once) → UpdateScheduler ‖ resource monitor     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::time::Duration;

use anyhow::Result;
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{info, warn};

use sensornode::adapters::flash_fs::StdFlashFs;
use sensornode::adapters::http::EspHttpClient;
use sensornode::adapters::log_sink::LogEventSink;
use sensornode::adapters::status_led::ProgressLed;
use sensornode::adapters::system::EspSystem;
use sensornode::adapters::time::ReactorDelay;
use sensornode::adapters::wifi::StaLink;
use sensornode::app::ports::FlashFs;
use sensornode::boot::run_boot_sequence;
use sensornode::config::OtaConfig;
use sensornode::diagnostics::monitor_resources;
use sensornode::gate::UpdateGate;
use sensornode::ota::OtaUpdater;
use sensornode::scheduler::UpdateScheduler;

/// VFS mount point of the firmware tree.
const FIRMWARE_ROOT: &str = "/flash";
/// Data partition holding the FAT volume.
const FLASH_PARTITION: &str = "storage";
/// Device runtime config; only its `"ota"` section is read here.
const RUNTIME_CONFIG: &str = "config.json";
const MONITOR_PERIOD: Duration = Duration::from_secs(30);

static UPDATE_GATE: UpdateGate = UpdateGate::new();

fn load_config(fs: &StdFlashFs) -> OtaConfig {
    let bytes = match fs.read(RUNTIME_CONFIG) {
        Ok(b) => b,
        Err(e) => {
            info!("Config: {} not readable ({}), using OTA defaults", RUNTIME_CONFIG, e);
            return OtaConfig::default();
        }
    };
    match OtaConfig::from_device_config(&bytes) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config: OTA section rejected ({}), using defaults", e);
            OtaConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SensorNode v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Storage + config ───────────────────────────────────
    let fs = StdFlashFs::mount(FIRMWARE_ROOT, FLASH_PARTITION)?;
    let config = load_config(&fs);

    // ── 3. Adapters ───────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let led = PinDriver::output(peripherals.pins.gpio2)?;
    let mut sink = (LogEventSink::new(), ProgressLed::new(led));

    let http = EspHttpClient::new(config.http_timeout_ms);
    let mut updater = OtaUpdater::new(config, http, fs, EspSystem::new(), ReactorDelay::new());

    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

    // ── 4. Resolve any update phase left by the previous boot ─
    let outcome = futures_lite::future::block_on(
        executor.run(run_boot_sequence(&mut updater, &UPDATE_GATE, &mut sink)),
    );
    info!("Boot: {:?}, firmware {}", outcome, updater.local_version());

    // ── 5. Background tasks ───────────────────────────────────
    let scheduler = UpdateScheduler::new(StaLink::new(), ReactorDelay::new(), &UPDATE_GATE);
    executor
        .spawn(async move { scheduler.run_forever(&mut updater, &mut sink).await })
        .detach();

    let monitor_fs = StdFlashFs::at(FIRMWARE_ROOT);
    let system = EspSystem::new();
    executor
        .spawn(async move {
            monitor_resources(&system, &monitor_fs, &UPDATE_GATE, &ReactorDelay::new(), MONITOR_PERIOD).await;
        })
        .detach();

    info!("System ready. Entering executor.");
    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
    Ok(())
}
