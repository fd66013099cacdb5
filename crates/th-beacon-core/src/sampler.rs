//! Data-ready driven sampling.
//!
//! The [`Sampler`] owns the sensor and its calibration. Each time data-ready
//! is high it reads one raw sample, converts it and publishes it to the
//! shared [`LatestReading`]. Reading the outputs clears data-ready. Until
//! [`Sampler::init`] has succeeded the line is ignored.

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::i2c::I2c;
use log::{info, trace};

use crate::calibration::{CalibratedReading, CalibrationConstants, convert};
use crate::hts221::{Hts221, SensorError};
use crate::shared::LatestReading;

/// Settling time after selecting I2C mode on the chip-select pin.
const I2C_MODE_SETTLE_MS: u32 = 250;

pub struct Sampler<'a, I, P> {
    sensor: Hts221<I>,
    constants: Option<CalibrationConstants>,
    latest: &'a LatestReading,
    indicator: P,
}

impl<'a, I, P> Sampler<'a, I, P>
where
    I: I2c,
    P: OutputPin,
{
    /// `indicator` is driven high for the duration of each read/convert.
    pub fn new(sensor: Hts221<I>, latest: &'a LatestReading, indicator: P) -> Self {
        Self {
            sensor,
            constants: None,
            latest,
            indicator,
        }
    }

    /// Select I2C mode, then bring up the sensor and commit its calibration.
    ///
    /// On error nothing is committed and the sampler stays inert.
    pub async fn init<C, D>(
        &mut self,
        chip_select: &mut C,
        delay: &mut D,
    ) -> Result<CalibrationConstants, SensorError<I::Error>>
    where
        C: OutputPin,
        D: DelayNs,
    {
        chip_select
            .set_high()
            .map_err(|_| SensorError::ChipSelect)?;
        delay.delay_ms(I2C_MODE_SETTLE_MS).await;

        let constants = self.sensor.init(delay).await?;
        self.constants = Some(constants);
        Ok(constants)
    }

    pub fn is_ready(&self) -> bool {
        self.constants.is_some()
    }

    pub fn calibration(&self) -> Option<&CalibrationConstants> {
        self.constants.as_ref()
    }

    /// Handle one data-ready event.
    ///
    /// Returns `Ok(None)` without touching the bus when called before
    /// [`Sampler::init`] completed.
    pub async fn on_data_ready(
        &mut self,
    ) -> Result<Option<CalibratedReading>, SensorError<I::Error>> {
        let Some(constants) = self.constants else {
            trace!("data-ready before sensor init, ignored");
            return Ok(None);
        };

        let _ = self.indicator.set_high();
        let result = self.sensor.read_raw().await.map(|raw| {
            let reading = convert(raw, &constants);
            self.latest.publish(reading);
            (raw, reading)
        });
        let _ = self.indicator.set_low();
        let (raw, reading) = result.map_err(SensorError::Bus)?;

        trace!(
            "raw {:?} -> {} %RH x2, {} degC x8",
            raw, reading.humidity_x2, reading.temp_x8
        );
        Ok(Some(reading))
    }

    /// Sample whenever `data_ready` is high, forever.
    ///
    /// Waits on the level rather than the edge: a conversion that finished
    /// before the first wait leaves the line high with no edge to come.
    pub async fn run<W: Wait>(
        &mut self,
        data_ready: &mut W,
    ) -> Result<Infallible, SensorError<I::Error>> {
        info!("Sampler running");
        loop {
            data_ready
                .wait_for_high()
                .await
                .map_err(|_| SensorError::DataReady)?;
            if self.on_data_ready().await?.is_none() {
                // Nothing clears the line before init.
                data_ready
                    .wait_for_low()
                    .await
                    .map_err(|_| SensorError::DataReady)?;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    use embedded_hal::digital::{ErrorType, OutputPin};

    /// Output pin recording every level it was driven to.
    #[derive(Debug, Clone, Default)]
    pub struct MockPin {
        pub levels: Rc<RefCell<Vec<bool>>>,
    }

    impl MockPin {
        pub fn history(&self) -> Vec<bool> {
            self.levels.borrow().clone()
        }
    }

    impl ErrorType for MockPin {
        type Error = core::convert::Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.levels.borrow_mut().push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.levels.borrow_mut().push(true);
            Ok(())
        }
    }
}
