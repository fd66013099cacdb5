//! Driver for the ST HTS221 relative humidity and temperature sensor.
//!
//! Only what the beacon needs is implemented: identity check, a fixed
//! configuration (1 Hz continuous conversion with data-ready on the DRDY
//! pin), loading the factory calibration and reading the raw outputs.

pub mod registers;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, info};
use thiserror_no_std::Error;

use crate::calibration::{CalibrationConstants, CalibrationError, RawSample};
use registers::*;

/// Time for the first conversion after power-on at 1 Hz.
const FIRST_CONVERSION_DELAY_MS: u32 = 500;

#[derive(Error, Debug)]
pub enum SensorError<E> {
    #[error("HTS221 not found, WHO_AM_I returned {found:#04x}")]
    DeviceNotFound { found: u8 },
    #[error("invalid factory calibration: {0}")]
    DegenerateCalibration(#[from] CalibrationError),
    #[error("I2C transaction failed: {0:?}")]
    Bus(E),
    #[error("could not drive the chip-select pin")]
    ChipSelect,
    #[error("could not wait on the data-ready pin")]
    DataReady,
}

pub struct Hts221<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Hts221<I> {
    pub fn new(i2c: I) -> Self {
        Self::with_address(i2c, HTS221_ADDRESS)
    }

    pub fn with_address(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Bring the sensor up and load its calibration.
    ///
    /// The identity register is checked before anything is written, so a
    /// foreign device on the address is left untouched. After calibration is
    /// loaded the output registers are read once to clear the pending-data
    /// flag; otherwise DRDY may stay asserted and no edge is ever seen.
    pub async fn init<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<CalibrationConstants, SensorError<I::Error>> {
        let found = self.who_am_i().await.map_err(SensorError::Bus)?;
        if found != WHO_AM_I_VALUE {
            return Err(SensorError::DeviceNotFound { found });
        }

        self.configure().await.map_err(SensorError::Bus)?;
        delay.delay_ms(FIRST_CONVERSION_DELAY_MS).await;

        let block = self
            .read_calibration_block()
            .await
            .map_err(SensorError::Bus)?;
        let (humidity, temperature) = decode_calibration_block(&block);
        debug!("HTS221 calibration: {:?} {:?}", humidity, temperature);
        let constants = CalibrationConstants::new(humidity, temperature)?;

        self.read_raw().await.map_err(SensorError::Bus)?;

        info!("HTS221 ready at {:#04x}", self.address);
        Ok(constants)
    }

    pub async fn who_am_i(&mut self) -> Result<u8, I::Error> {
        self.read_register(REG_WHO_AM_I).await
    }

    /// Write averaging, power/rate and data-ready configuration.
    pub async fn configure(&mut self) -> Result<(), I::Error> {
        self.write_register(REG_AV_CONF, AV_CONF_VALUE).await?;
        self.write_register(REG_CTRL_REG1, CTRL_REG1_VALUE).await?;
        self.write_register(REG_CTRL_REG3, CTRL_REG3_VALUE).await
    }

    pub async fn read_calibration_block(&mut self) -> Result<[u8; CALIB_BLOCK_LEN], I::Error> {
        let mut block = [0u8; CALIB_BLOCK_LEN];
        self.read_block(REG_CALIB_START, &mut block).await?;
        Ok(block)
    }

    /// Read humidity and temperature outputs in one transaction.
    ///
    /// Reading the outputs clears the data-ready flag, which re-arms DRDY.
    pub async fn read_raw(&mut self) -> Result<RawSample, I::Error> {
        let mut bytes = [0u8; 4];
        self.read_block(REG_HUMIDITY_OUT_L, &mut bytes).await?;
        Ok(RawSample::from_le_bytes(bytes))
    }

    async fn read_register(&mut self, register: u8) -> Result<u8, I::Error> {
        let mut data = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut data)
            .await?;
        Ok(data[0])
    }

    async fn write_register(&mut self, register: u8, value: u8) -> Result<(), I::Error> {
        self.i2c.write(self.address, &[register, value]).await
    }

    async fn read_block(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), I::Error> {
        self.i2c
            .write_read(self.address, &[register | AUTO_INCREMENT], buffer)
            .await
    }
}
