//! The advertise / complete / re-advertise cycle.
//!
//! ```text
//!            advertise()              completion
//!   Idle ──────────────────▶ Advertising ──────┐
//!                                 ▲            │ advertise()
//!                                 └────────────┘
//! ```
//!
//! There is no terminal state: only a radio error ends the cycle.

use core::convert::Infallible;

use embassy_time::Duration;
use embedded_hal::digital::OutputPin;
use log::{debug, error, info};
use thiserror_no_std::Error;

use crate::advertisement::AdvertisementPayload;
use crate::radio::{AdvertisingParams, AdvertisingRadio};
use crate::shared::LatestReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconState {
    Idle,
    Advertising,
}

#[derive(Error, Debug)]
pub enum BeaconError<E> {
    #[error("radio rejected the advertising setup: {0:?}")]
    Radio(E),
}

pub struct BeaconController<'a, R, L> {
    radio: R,
    payload: AdvertisementPayload,
    params: AdvertisingParams,
    latest: &'a LatestReading,
    led: L,
    state: BeaconState,
    cycles: u32,
}

impl<'a, R, L> BeaconController<'a, R, L>
where
    R: AdvertisingRadio,
    L: OutputPin,
{
    /// `led` is pulsed high while each advertising window is being set up.
    pub fn new(
        radio: R,
        payload: AdvertisementPayload,
        params: AdvertisingParams,
        latest: &'a LatestReading,
        led: L,
    ) -> Self {
        Self {
            radio,
            payload,
            params,
            latest,
            led,
            state: BeaconState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> BeaconState {
        self.state
    }

    pub fn payload(&self) -> &AdvertisementPayload {
        &self.payload
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Number of advertising windows started so far.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Refresh the payload with the latest reading and open a new window.
    pub async fn advertise(&mut self, window: Duration) -> Result<(), BeaconError<R::Error>> {
        let _ = self.led.set_high();
        let result = self.restart(window).await;
        let _ = self.led.set_low();

        match result {
            Ok(()) => {
                self.state = BeaconState::Advertising;
                self.cycles = self.cycles.wrapping_add(1);
                Ok(())
            }
            Err(e) => {
                error!("Advertising setup failed: {:?}", e);
                self.state = BeaconState::Idle;
                Err(BeaconError::Radio(e))
            }
        }
    }

    async fn restart(&mut self, window: Duration) -> Result<(), R::Error> {
        // Not expected to happen, a window is only reopened after it ended.
        if self.radio.is_advertising() {
            self.radio.stop_advertising().await?;
        }

        let reading = self.latest.snapshot();
        self.payload.set_reading(reading);
        debug!(
            "Advertising {} %RH x2, {} degC x8: {:02x?}",
            reading.humidity_x2,
            reading.temp_x8,
            self.payload.as_bytes()
        );

        self.radio
            .set_advertising_data(self.payload.as_bytes())
            .await?;
        self.radio.set_scan_response_data(&[]).await?;
        self.radio.start_advertising(&self.params, window).await
    }

    /// Advertise in back-to-back windows of `window`, forever.
    ///
    /// Each completed window immediately re-arms the next one with a fresh
    /// reading. Returns only on a radio error.
    pub async fn run(&mut self, window: Duration) -> Result<Infallible, BeaconError<R::Error>> {
        info!("Beacon advertising in {} ms windows", window.as_millis());
        self.advertise(window).await?;
        loop {
            self.radio
                .wait_complete()
                .await
                .map_err(BeaconError::Radio)?;
            debug!("Advertising window {} complete", self.cycles);
            self.advertise(window).await?;
        }
    }
}
