//! The narrow interface the beacon needs from a BLE radio.

use embassy_time::Duration;

/// Advertising intervals are counted in units of 625 us.
pub const ADV_INTERVAL_UNIT_US: u32 = 625;

/// Advertise on channels 37, 38 and 39.
pub const ALL_ADV_CHANNELS: u8 = 0b111;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnAddressType {
    Public,
    Random,
}

/// Parameters of a non-connectable, undirected advertising set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingParams {
    /// In [`ADV_INTERVAL_UNIT_US`] units.
    pub interval_min: u16,
    /// In [`ADV_INTERVAL_UNIT_US`] units.
    pub interval_max: u16,
    pub channel_map: u8,
    pub own_address: OwnAddressType,
}

impl AdvertisingParams {
    /// Advertise every `interval_us` to `2 * interval_us`, from the random
    /// address, on all channels.
    pub const fn non_connectable(interval_us: u32) -> Self {
        Self {
            interval_min: to_interval_units(interval_us),
            interval_max: to_interval_units(interval_us.saturating_mul(2)),
            channel_map: ALL_ADV_CHANNELS,
            own_address: OwnAddressType::Random,
        }
    }
}

const fn to_interval_units(us: u32) -> u16 {
    let units = us / ADV_INTERVAL_UNIT_US;
    if units > u16::MAX as u32 {
        u16::MAX
    } else {
        units as u16
    }
}

/// A radio able to run timed advertising windows.
///
/// `start_advertising` opens a window of the given length;
/// `wait_complete` resolves once that window has ended and advertising has
/// stopped. Errors are all treated as fatal by the caller.
pub trait AdvertisingRadio {
    type Error: core::fmt::Debug;

    fn is_advertising(&self) -> bool;

    fn stop_advertising(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    fn set_advertising_data(&mut self, data: &[u8])
    -> impl Future<Output = Result<(), Self::Error>>;

    fn set_scan_response_data(
        &mut self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn start_advertising(
        &mut self,
        params: &AdvertisingParams,
        window: Duration,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    fn wait_complete(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}
