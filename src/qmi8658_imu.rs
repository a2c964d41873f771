//! Minimal QMI8658 IMU bring-up for the punch meter.
//! The register values target the Waveshare ESP32-S3 Touch AMOLED 1.43"
//! board (QMI8658 on the touch I2C bus). Acceleration is read at ±16 g so a
//! hard punch does not clip.

use embedded_hal::i2c;

use crate::{config::STANDARD_GRAVITY, sensor::AccelSource};

pub const DEFAULT_I2C_ADDR: u8 = 0x6B; // AD0 pulled high on the Waveshare board
pub const ALT_I2C_ADDR: u8 = 0x6A;

const REG_WHO_AM_I: u8 = 0x00;
const REG_CTRL1: u8 = 0x02; // accel config
const REG_CTRL2: u8 = 0x03; // gyro config
const REG_CTRL7: u8 = 0x08; // power / enable
const REG_CTRL8: u8 = 0x09; // reset/power settings
const REG_ACC_START: u8 = 0x35; // AX_L .. GZ_H

// Expected chip ID for QMI8658. Some revisions report 0x05 or 0x0F; keep it loose.
const WHO_AM_I_FALLBACK: u8 = 0x05;
const WHO_AM_I_ALT: u8 = 0x0F;

const ODR_125HZ: u8 = 0x06;
const GYRO_FS_512DPS: u8 = 0x05 << 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccelRange {
    G2,
    G4,
    G8,
    G16,
}

impl AccelRange {
    /// aFS bits of CTRL1.
    fn ctrl1_bits(self) -> u8 {
        let fs = match self {
            AccelRange::G2 => 0b00,
            AccelRange::G4 => 0b01,
            AccelRange::G8 => 0b10,
            AccelRange::G16 => 0b11,
        };
        fs << 4
    }

    pub fn lsb_per_g(self) -> f32 {
        match self {
            AccelRange::G2 => 16_384.0,
            AccelRange::G4 => 8_192.0,
            AccelRange::G8 => 4_096.0,
            AccelRange::G16 => 2_048.0,
        }
    }

    #[inline]
    pub fn to_mps2(self, raw: i16) -> f32 {
        raw as f32 / self.lsb_per_g() * STANDARD_GRAVITY
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RawImuSample {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

// IMU error type
#[derive(Debug)]
pub enum ImuError<E> {
    Bus(E),
    BadWhoAmI(u8),
}

// Allow automatic conversion from I2C errors
impl<E> From<E> for ImuError<E> {
    fn from(e: E) -> Self {
        ImuError::Bus(e)
    }
}

// QMI8658 IMU driver
pub struct Qmi8658<I2C> {
    i2c: I2C,
    address: u8,
    range: AccelRange,
}

impl<I2C> Qmi8658<I2C>
where
    I2C: i2c::ErrorType + i2c::I2c,
{
    // Create a new instance and initialize the IMU
    pub fn new(i2c: I2C, address: u8) -> Result<Self, ImuError<I2C::Error>> {
        let mut this = Self {
            i2c,
            address,
            range: AccelRange::G16,
        };
        this.init()?;
        Ok(this)
    }

    pub fn who_am_i(&mut self) -> Result<u8, ImuError<I2C::Error>> {
        self.read_reg(REG_WHO_AM_I)
    }

    pub fn range(&self) -> AccelRange {
        self.range
    }

    fn init(&mut self) -> Result<(), ImuError<I2C::Error>> {
        let who = self.who_am_i()?;
        if who != WHO_AM_I_FALLBACK && who != WHO_AM_I_ALT {
            return Err(ImuError::BadWhoAmI(who));
        }

        // Soft reset and clear low-power.
        // Ignore errors here to avoid blocking subsequent config steps.
        let _ = self.write_reg(REG_CTRL8, 0x10);

        self.write_reg(REG_CTRL1, self.range.ctrl1_bits() | ODR_125HZ)?;
        self.write_reg(REG_CTRL2, GYRO_FS_512DPS | ODR_125HZ)?;

        // Enable accel + gyro, set to Active
        self.write_reg(REG_CTRL7, 0x03)?;

        Ok(())
    }

    fn write_reg(&mut self, reg: u8, val: u8) -> Result<(), ImuError<I2C::Error>> {
        self.i2c
            .write(self.address, &[reg, val])
            .map_err(ImuError::Bus)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, ImuError<I2C::Error>> {
        let mut out = [0u8];
        self.i2c
            .write_read(self.address, &[reg], &mut out)
            .map_err(ImuError::Bus)?;
        Ok(out[0])
    }

    pub fn read_sample(&mut self) -> Result<RawImuSample, ImuError<I2C::Error>> {
        let mut buf = [0u8; 12];
        self.i2c
            .write_read(self.address, &[REG_ACC_START], &mut buf)
            .map_err(ImuError::Bus)?;

        let accel = [
            i16::from_le_bytes([buf[0], buf[1]]),
            i16::from_le_bytes([buf[2], buf[3]]),
            i16::from_le_bytes([buf[4], buf[5]]),
        ];
        let gyro = [
            i16::from_le_bytes([buf[6], buf[7]]),
            i16::from_le_bytes([buf[8], buf[9]]),
            i16::from_le_bytes([buf[10], buf[11]]),
        ];

        Ok(RawImuSample { accel, gyro })
    }

    /// Acceleration in m/s², gravity included.
    pub fn read_accel_mps2(&mut self) -> Result<[f32; 3], ImuError<I2C::Error>> {
        let raw = self.read_sample()?;
        let range = self.range;
        Ok(raw.accel.map(|v| range.to_mps2(v)))
    }

    // Consume the driver and return the underlying I2C bus
    pub fn into_inner(self) -> I2C {
        self.i2c
    }
}

impl<I2C> AccelSource for Qmi8658<I2C>
where
    I2C: i2c::ErrorType + i2c::I2c,
{
    type Error = ImuError<I2C::Error>;

    fn read_accel(&mut self) -> Result<[f32; 3], Self::Error> {
        self.read_accel_mps2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

    struct FakeBus {
        regs: [u8; 0x80],
        ptr: usize,
        fail: bool,
    }

    impl FakeBus {
        fn new(who: u8) -> Self {
            let mut regs = [0u8; 0x80];
            regs[REG_WHO_AM_I as usize] = who;
            Self {
                regs,
                ptr: 0,
                fail: false,
            }
        }

        fn set_accel(&mut self, accel: [i16; 3]) {
            for (i, v) in accel.iter().enumerate() {
                let at = REG_ACC_START as usize + i * 2;
                self.regs[at..at + 2].copy_from_slice(&v.to_le_bytes());
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail || address != DEFAULT_I2C_ADDR {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.ptr = bytes[0] as usize;
                        for (i, b) in bytes[1..].iter().enumerate() {
                            self.regs[self.ptr + i] = *b;
                        }
                    }
                    Operation::Read(buf) => {
                        let n = buf.len();
                        buf.copy_from_slice(&self.regs[self.ptr..self.ptr + n]);
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn init_configures_sixteen_g() {
        let imu = Qmi8658::new(FakeBus::new(0x05), DEFAULT_I2C_ADDR).unwrap();
        assert_eq!(imu.range(), AccelRange::G16);
        let bus = imu.into_inner();
        assert_eq!(bus.regs[REG_CTRL1 as usize], 0x36);
        assert_eq!(bus.regs[REG_CTRL2 as usize], 0x56);
        assert_eq!(bus.regs[REG_CTRL7 as usize], 0x03);
    }

    #[test]
    fn rejects_unknown_chip() {
        match Qmi8658::new(FakeBus::new(0x42), DEFAULT_I2C_ADDR) {
            Err(ImuError::BadWhoAmI(0x42)) => {}
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[test]
    fn bus_errors_surface() {
        assert!(matches!(
            Qmi8658::new(FakeBus::new(0x05), ALT_I2C_ADDR),
            Err(ImuError::Bus(ErrorKind::Other))
        ));
    }

    #[test]
    fn converts_counts_to_mps2() {
        let mut imu = Qmi8658::new(FakeBus::new(0x0F), DEFAULT_I2C_ADDR).unwrap();
        let mut bus = imu.into_inner();
        bus.set_accel([2_048, -4_096, 1_024]);
        imu = Qmi8658 {
            i2c: bus,
            address: DEFAULT_I2C_ADDR,
            range: AccelRange::G16,
        };

        let a = imu.read_accel().unwrap();
        assert!((a[0] - STANDARD_GRAVITY).abs() < 1e-4);
        assert!((a[1] + 2.0 * STANDARD_GRAVITY).abs() < 1e-4);
        assert!((a[2] - 0.5 * STANDARD_GRAVITY).abs() < 1e-4);

        let raw = imu.read_sample().unwrap();
        assert_eq!(raw.accel, [2_048, -4_096, 1_024]);
    }

    #[test]
    fn range_scales() {
        assert_eq!(AccelRange::G8.lsb_per_g(), 4_096.0);
        assert!((AccelRange::G2.to_mps2(16_384) - STANDARD_GRAVITY).abs() < 1e-5);
    }
}
