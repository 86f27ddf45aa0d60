//! Fieldnode base station firmware: main entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                    │
//! │                                                           │
//! │  MeshEngine binding   LogUi / HeadlessSurface   Clock     │
//! │  RelayBackpack (GPIO + FreeRTOS delay)                    │
//! │                                                           │
//! │  ────────────── Port Trait Boundary ───────────────       │
//! │                                                           │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │            ControlService (pure logic)              │  │
//! │  │  StartupSequencer · ControlCycle · FlushScheduler   │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop reads the clock once per tick, runs the service, and carries
//! out the returned effect: restarts reset the chip, halts park the task.

use anyhow::{Result, anyhow};
use log::{error, info, warn};

use esp_idf_svc::hal::delay::{Delay, FreeRtos};
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::peripherals::Peripherals;

use fieldnode::adapters::log_ui::{HeadlessSurface, LogUi};
use fieldnode::adapters::memory_engine::MemoryEngine;
use fieldnode::adapters::time::SystemClock;
use fieldnode::app::events::ControlEffect;
use fieldnode::app::ports::MeshEngine;
use fieldnode::app::service::ControlService;
use fieldnode::backpacks::relay::RelayBackpack;
use fieldnode::config::ControlConfig;
use fieldnode::types::DeviceId;

const DEFAULT_CONFIG: &str = include_str!("../config/default.json");

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Fieldnode base v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let config = ControlConfig::from_json(DEFAULT_CONFIG).unwrap_or_else(|e| {
        warn!("Embedded config rejected ({e}), using defaults");
        ControlConfig::default()
    });
    let tick_interval_ms = config.tick_interval_ms;
    let relay_pulse_ms = config.relay_pulse_ms;

    // ── 3. Engine and UI adapters ─────────────────────────────
    let engine = bench_engine()?;
    let mut service = ControlService::new(config, engine, LogUi::new(), HeadlessSurface::new())?;

    // ── 4. Backpacks ──────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let relay_pin = PinDriver::output(peripherals.pins.gpio4)?;
    let relay = RelayBackpack::new(relay_pin, Delay::new_default(), relay_pulse_ms);
    if service.register_backpack(Box::new(relay)).is_err() {
        warn!("Backpack table full, relay not registered");
    }

    // ── 5. Control loop ───────────────────────────────────────
    run(service, tick_interval_ms)
}

/// In-memory engine for bench builds without a radio binding.
fn bench_engine() -> Result<MemoryEngine> {
    let device_id = DeviceId::new("BASE0001").ok_or_else(|| anyhow!("invalid device id"))?;
    let broadcast_id = DeviceId::new("BROADCST").ok_or_else(|| anyhow!("invalid broadcast id"))?;
    Ok(MemoryEngine::new(device_id, broadcast_id).without_call_log())
}

fn run<E: MeshEngine>(
    mut service: ControlService<E, LogUi, HeadlessSurface>,
    tick_interval_ms: u32,
) -> Result<()> {
    let clock = SystemClock::new();
    let mut tick: u64 = 0;
    loop {
        let now_ms = clock.uptime_ms();
        let kind = service.cycle_kind_for(tick);

        match service.tick(now_ms, kind) {
            ControlEffect::Continue => {}
            ControlEffect::Restart(reason) => {
                warn!("Restarting: {reason:?}");
                esp_idf_svc::hal::reset::restart();
            }
            ControlEffect::Halt(reason) => {
                error!("Halted: {reason:?}");
                loop {
                    FreeRtos::delay_ms(1000);
                }
            }
        }

        tick = tick.wrapping_add(1);
        FreeRtos::delay_ms(tick_interval_ms);
    }
}
