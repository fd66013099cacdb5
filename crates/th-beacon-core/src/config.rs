//! Build-time beacon configuration.

use embassy_time::Duration;

use crate::advertisement::{AdvertisementPayload, DEFAULT_COMPANY_ID, PayloadError};
use crate::hts221::registers::HTS221_ADDRESS;
use crate::radio::AdvertisingParams;

pub const DEFAULT_NAME_PREFIX: &str = "th";
pub const DEFAULT_INTERVAL_US: u32 = 500_000;
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconConfig {
    pub company_id: u16,
    /// Prepended to the hex unique ID in the local name.
    pub name_prefix: &'static str,
    /// Minimum advertising interval; the maximum is twice this.
    pub interval_us: u32,
    /// Length of each advertising window before it is re-armed.
    pub window: Duration,
    pub sensor_address: u8,
}

impl BeaconConfig {
    pub const fn new() -> Self {
        Self {
            company_id: DEFAULT_COMPANY_ID,
            name_prefix: DEFAULT_NAME_PREFIX,
            interval_us: DEFAULT_INTERVAL_US,
            window: DEFAULT_WINDOW,
            sensor_address: HTS221_ADDRESS,
        }
    }

    pub const fn with_company_id(mut self, company_id: u16) -> Self {
        self.company_id = company_id;
        self
    }

    pub const fn with_name_prefix(mut self, name_prefix: &'static str) -> Self {
        self.name_prefix = name_prefix;
        self
    }

    pub const fn with_interval_us(mut self, interval_us: u32) -> Self {
        self.interval_us = interval_us;
        self
    }

    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub const fn with_sensor_address(mut self, sensor_address: u8) -> Self {
        self.sensor_address = sensor_address;
        self
    }

    /// Initial payload for a device with the given unique ID.
    pub fn payload(&self, unique_id: Option<[u8; 4]>) -> Result<AdvertisementPayload, PayloadError> {
        AdvertisementPayload::new(self.company_id, self.name_prefix, unique_id)
    }

    pub const fn advertising_params(&self) -> AdvertisingParams {
        AdvertisingParams::non_connectable(self.interval_us)
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BeaconConfig::default();
        assert_eq!(config.company_id, 0xFFFF);
        assert_eq!(config.name_prefix, "th");
        assert_eq!(config.window, Duration::from_secs(5));
        assert_eq!(config.sensor_address, 0x5F);

        let params = config.advertising_params();
        assert_eq!((params.interval_min, params.interval_max), (800, 1600));
    }

    #[test]
    fn test_builders_flow_into_payload() {
        let config = BeaconConfig::new()
            .with_company_id(0x0059)
            .with_name_prefix("env")
            .with_interval_us(100_000);

        let payload = config.payload(Some([0x46, 0x2D, 0xB8, 0x10])).unwrap();
        assert_eq!(payload.local_name(), "env64d28b01");
        assert_eq!(&payload.as_bytes()[5..7], &[0x59, 0x00]);
        assert_eq!(config.advertising_params().interval_min, 160);
    }

    #[test]
    fn test_oversized_prefix_is_rejected() {
        let config = BeaconConfig::new().with_name_prefix("a-very-long-prefix-x");
        assert!(matches!(
            config.payload(Some([0; 4])),
            Err(PayloadError::NameTooLong { .. })
        ));
    }
}
