// Board-specific pin mapping for the punch meter.
// Profiles are selected via Cargo features; only the Waveshare watch board
// is wired up today.
//! The following wiring is assumed (Waveshare ESP32-S3 Touch AMOLED 1.43"):
//! - QMI8658 SDA => GPIO47 (shared touch I2C bus)
//! - QMI8658 SCL => GPIO48
//! - BOOT button => GPIO0 (active low, board pull-up)
//! - Feedback LED / buzzer driver => GPIO16 (header pin, active high)

use esp_hal::gpio::{Event, Input, InputConfig, Io, Level, Output, OutputConfig, Pull};
use esp_hal::peripherals::{Peripherals, GPIO47, GPIO48, I2C0};

pub struct ImuI2cPins<'a> {
    pub sda: GPIO47<'a>,
    pub scl: GPIO48<'a>,
}

pub struct BoardPins<'a> {
    pub btn_boot: Input<'a>,
    pub feedback: Output<'a>,
    pub imu_i2c: ImuI2cPins<'a>,
}

#[cfg(feature = "esp32s3-watch143")]
pub fn init_board_pins<'a>(p: Peripherals) -> (Io<'a>, BoardPins<'a>, I2C0<'a>) {
    let io = Io::new(p.IO_MUX);

    // BOOT button cancels a running measurement
    let mut btn_boot = Input::new(p.GPIO0, InputConfig::default().with_pull(Pull::Up));
    btn_boot.listen(Event::AnyEdge);

    let feedback = Output::new(p.GPIO16, Level::Low, OutputConfig::default());

    (
        io,
        BoardPins {
            btn_boot,
            feedback,
            imu_i2c: ImuI2cPins {
                sda: p.GPIO47,
                scl: p.GPIO48,
            },
        },
        p.I2C0,
    )
}
