//! HTS221 register map and calibration block decoding.

use crate::calibration::{HumidityCalibration, TemperatureCalibration};

/// 7-bit I2C address of the HTS221.
pub const HTS221_ADDRESS: u8 = 0x5F;

pub const REG_WHO_AM_I: u8 = 0x0F;
pub const REG_AV_CONF: u8 = 0x10;
pub const REG_CTRL_REG1: u8 = 0x20;
pub const REG_CTRL_REG3: u8 = 0x22;
pub const REG_HUMIDITY_OUT_L: u8 = 0x28;
pub const REG_TEMP_OUT_L: u8 = 0x2A;
pub const REG_CALIB_START: u8 = 0x30;

pub const WHO_AM_I_VALUE: u8 = 0xBC;

/// Set on the sub-address to auto-increment across a multi-byte read.
pub const AUTO_INCREMENT: u8 = 0x80;

/// Averaging: 16 temperature / 32 humidity samples.
pub const AV_CONF_VALUE: u8 = 0x1B;
/// Power on, block data update, 1 Hz output data rate.
pub const CTRL_REG1_VALUE: u8 = 0x85;
/// Data-ready output active high, push-pull, enabled.
pub const CTRL_REG3_VALUE: u8 = 0x04;

/// Calibration registers 0x30..=0x3F.
pub const CALIB_BLOCK_LEN: usize = 16;

// Offsets into the calibration block.
const H0_RH_X2: usize = 0x00;
const H1_RH_X2: usize = 0x01;
const T0_DEGC_X8: usize = 0x02;
const T1_DEGC_X8: usize = 0x03;
const T1_T0_MSB: usize = 0x05;
const H0_T0_OUT: usize = 0x06;
const H1_T0_OUT: usize = 0x0A;
const T0_OUT: usize = 0x0C;
const T1_OUT: usize = 0x0E;

/// T0 high bits live in bits 0-1 of the shared MSB register.
pub const T0_MSB_MASK: u8 = 0b0000_0011;
/// T1 high bits live in bits 2-3 of the shared MSB register.
pub const T1_MSB_MASK: u8 = 0b0000_1100;

/// Reassemble the two 10-bit temperature calibration points from their low
/// bytes and the shared MSB register.
pub const fn decode_temperature_points(t0_lsb: u8, t1_lsb: u8, msb: u8) -> (u16, u16) {
    let t0 = (((msb & T0_MSB_MASK) as u16) << 8) | t0_lsb as u16;
    let t1 = (((msb & T1_MSB_MASK) as u16) << 6) | t1_lsb as u16;
    (t0, t1)
}

/// Decode the raw calibration block read from `REG_CALIB_START`.
pub fn decode_calibration_block(
    block: &[u8; CALIB_BLOCK_LEN],
) -> (HumidityCalibration, TemperatureCalibration) {
    let le = |offset: usize| i16::from_le_bytes([block[offset], block[offset + 1]]);
    let (t0_degc_x8, t1_degc_x8) =
        decode_temperature_points(block[T0_DEGC_X8], block[T1_DEGC_X8], block[T1_T0_MSB]);

    (
        HumidityCalibration {
            h0_rh_x2: block[H0_RH_X2],
            h1_rh_x2: block[H1_RH_X2],
            h0_out: le(H0_T0_OUT),
            h1_out: le(H1_T0_OUT),
        },
        TemperatureCalibration {
            t0_degc_x8,
            t1_degc_x8,
            t0_out: le(T0_OUT),
            t1_out: le(T1_OUT),
        },
    )
}
