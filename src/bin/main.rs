//! Punch Meter Watch
//! ========================================
//! needs to be run in WSL2 terminal
//! source ~/export-esp.sh
//! cargo run --release --features esp32s3-watch143
//! ========================================
//!
//! Shake the watch hard, hold still, then punch. The peak punch speed is
//! printed over the serial console; the feedback pin pulses when the punch
//! threshold is crossed. The BOOT button drops a running measurement.

//% CHIPS: esp32s3
//% FEATURES: esp-hal/unstable

#![no_std]
#![no_main]

// Define the application description, which is placed in a special section of the binary.
// This is used by the bootloader to verify the application.
// The macro automatically fills in the fields.
esp_bootloader_esp_idf::esp_app_desc!();

use punch_watch::{
    input::{handle_button_generic, ButtonState},
    qmi8658_imu::{Qmi8658, ALT_I2C_ADDR, DEFAULT_I2C_ADDR},
    timer::OneShotTimer,
    wiring::{init_board_pins, BoardPins},
    LinearAccelerationSensor, MeterConfig, PunchMeter, SensorEvent, SessionObserver,
    SessionReport, Stage,
};

use core::sync::atomic::{AtomicBool, Ordering};
use esp_backtrace as _;

use esp_hal::{
    handler,
    i2c::master::{Config as I2cConfig, I2c},
    main, ram,
    time::Rate,
    timer::systimer::{SystemTimer, Unit},
    Blocking, Config,
};

use embedded_hal::i2c::I2c as _;
use log::{error, info, warn};

static BOOT_PRESSED: AtomicBool = AtomicBool::new(false);
static BOOT_BUTTON: ButtonState<'static> = ButtonState::new("Boot");

const DEBOUNCE_MS: u64 = 240;
const FEEDBACK_PULSE_MS: u64 = 150;
const SENSOR_RETRY_MS: u64 = 1_000;

#[derive(Default)]
struct WatchFeedback {
    punch_pending: bool,
    last_report: Option<SessionReport>,
}

impl SessionObserver for WatchFeedback {
    fn on_result(&mut self, report: &SessionReport) {
        self.last_report = Some(*report);
    }

    fn on_punch_detected(&mut self) {
        self.punch_pending = true;
    }
}

#[inline]
fn now_us() -> u64 {
    let t = SystemTimer::unit_value(Unit::Unit0);
    t / (SystemTimer::ticks_per_second() / 1_000_000)
}

fn halt(reason: &str) -> ! {
    error!("{}", reason);
    loop {
        core::hint::spin_loop();
    }
}

// Interrupt handler
#[handler]
#[ram]
fn handler() {
    let now_ms = now_us() / 1_000;
    handle_button_generic(&BOOT_BUTTON, now_ms, DEBOUNCE_MS, || {
        BOOT_PRESSED.store(true, Ordering::Relaxed);
    });
}

// Probe both QMI8658 addresses (AD0 strap differs between board revisions).
fn find_imu(i2c: &mut I2c<'static, Blocking>) -> Option<u8> {
    let mut probe = |addr: u8| -> bool {
        let mut who = [0u8];
        i2c.write_read(addr, &[0x00], &mut who).is_ok()
    };

    for _ in 0..2 {
        for &addr in &[DEFAULT_I2C_ADDR, ALT_I2C_ADDR] {
            if probe(addr) {
                return Some(addr);
            }
        }
        // Handles the power-up race on cold boot
        for _ in 0..10_000 {
            core::hint::spin_loop();
        }
    }
    None
}

#[main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let peripherals = esp_hal::init(Config::default());
    let (mut io, pins, i2c0) = init_board_pins(peripherals);

    let BoardPins {
        btn_boot,
        mut feedback,
        imu_i2c,
    } = pins;

    BOOT_BUTTON.install(btn_boot);
    io.set_interrupt_handler(handler);

    // -------------------- IMU initialization --------------------
    let cfg = I2cConfig::default().with_frequency(Rate::from_khz(400));
    let mut i2c = match I2c::new(i2c0, cfg) {
        Ok(i2c) => i2c.with_sda(imu_i2c.sda).with_scl(imu_i2c.scl),
        Err(e) => {
            error!("I2C init failed: {:?}", e);
            halt("no I2C bus")
        }
    };

    let Some(addr) = find_imu(&mut i2c) else {
        halt("IMU not found on scanned addresses")
    };
    let imu = match Qmi8658::new(i2c, addr) {
        Ok(imu) => imu,
        Err(e) => {
            error!("IMU init failed: {:?}", e);
            halt("IMU init failed")
        }
    };
    info!("IMU ready at 0x{:02X}", addr);

    // -------------------- Meter --------------------
    let config = MeterConfig::default();
    let mut sensor = LinearAccelerationSensor::new(imu, &config);
    let mut meter = match PunchMeter::new(WatchFeedback::default(), config) {
        Ok(meter) => meter,
        Err(e) => {
            error!("bad meter config: {}", e);
            halt("bad meter config")
        }
    };

    let mut feedback_off = OneShotTimer::new();
    let mut sensor_retry = OneShotTimer::new();
    let mut last_stage = meter.stage();

    sensor.start(now_us() as f64 / 1_000.0);

    // -------------------- Main loop --------------------
    loop {
        let t_us = now_us();
        let now_ms = t_us / 1_000;
        let now_ms_f = t_us as f64 / 1_000.0;

        for event in sensor.poll(now_ms_f).iter() {
            meter.handle(event, now_ms);
            if *event == SensorEvent::Error {
                sensor_retry.arm(now_ms, SENSOR_RETRY_MS);
            }
        }
        meter.tick(now_ms);

        if sensor_retry.fire(now_ms) {
            warn!("sensor: restarting after fault");
            sensor.start(now_ms_f);
        }

        if BOOT_PRESSED.swap(false, Ordering::Acquire) {
            info!("measurement cancelled");
            meter.cancel();
        }

        let fb = meter.observer_mut();
        if core::mem::take(&mut fb.punch_pending) {
            feedback.set_high();
            feedback_off.arm(now_ms, FEEDBACK_PULSE_MS);
        }
        if let Some(report) = fb.last_report.take() {
            info!(
                "PUNCH {} km/h (peak {} m/s, {:?})",
                report.speed_kmh, report.max_speed, report.end
            );
        }
        if feedback_off.fire(now_ms) {
            feedback.set_low();
        }

        let stage = meter.stage();
        if stage != last_stage {
            if stage == Stage::Arming {
                info!("ready: shake the watch, then hold still");
            }
            last_stage = stage;
        }
    }
}
