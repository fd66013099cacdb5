//! Legacy advertising over a raw HCI (H4) transport.
//!
//! Only the handful of LE controller commands a non-connectable beacon needs
//! are implemented. Commands are sent one at a time and each waits for its
//! Command Complete (or Command Status) event before the next goes out.

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, ReadExactError, Write};
use log::{debug, warn};
use thiserror_no_std::Error;

use crate::advertisement::MAX_ADV_DATA_LEN;
use crate::identity::RandomAddress;
use crate::radio::{AdvertisingParams, AdvertisingRadio, OwnAddressType};

pub const H4_COMMAND: u8 = 0x01;
pub const H4_EVENT: u8 = 0x04;

pub const EVT_COMMAND_COMPLETE: u8 = 0x0E;
pub const EVT_COMMAND_STATUS: u8 = 0x0F;

pub const OP_RESET: u16 = 0x0C03;
pub const OP_LE_SET_RANDOM_ADDRESS: u16 = 0x2005;
pub const OP_LE_SET_ADV_PARAMS: u16 = 0x2006;
pub const OP_LE_SET_ADV_DATA: u16 = 0x2008;
pub const OP_LE_SET_SCAN_RSP_DATA: u16 = 0x2009;
pub const OP_LE_SET_ADV_ENABLE: u16 = 0x200A;

/// Non-connectable undirected advertising.
const ADV_NONCONN_IND: u8 = 0x03;
const STATUS_SUCCESS: u8 = 0x00;

/// Opcode, parameter length and the largest parameter block we send.
const MAX_COMMAND_LEN: usize = 4 + 32;

#[derive(Error, Debug)]
pub enum HciError<E> {
    #[error("HCI transport error: {0:?}")]
    Transport(E),
    #[error("HCI transport closed mid-packet")]
    UnexpectedEof,
    #[error("command {opcode:#06x} failed with status {status:#04x}")]
    CommandFailed { opcode: u16, status: u8 },
    #[error("unexpected HCI packet type {0:#04x}")]
    UnexpectedPacket(u8),
    #[error("{0} bytes of advertising data do not fit a legacy advertisement")]
    DataTooLong(usize),
}

impl<E> From<ReadExactError<E>> for HciError<E> {
    fn from(err: ReadExactError<E>) -> Self {
        match err {
            ReadExactError::UnexpectedEof => HciError::UnexpectedEof,
            ReadExactError::Other(e) => HciError::Transport(e),
        }
    }
}

/// Drives a controller's legacy advertising state.
///
/// The controller has no notion of an advertising window, so the window is
/// timed on the host: [`AdvertisingRadio::wait_complete`] sleeps for it and
/// then disables advertising.
pub struct HciAdvertiser<T, D> {
    transport: T,
    delay: D,
    advertising: bool,
    window: Duration,
}

impl<T, D> HciAdvertiser<T, D>
where
    T: Read + Write,
    D: DelayNs,
{
    pub fn new(transport: T, delay: D) -> Self {
        Self {
            transport,
            delay,
            advertising: false,
            window: Duration::from_ticks(0),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reset the controller and program the random address used for
    /// advertising. Must complete before the first window.
    pub async fn sync(&mut self, address: RandomAddress) -> Result<(), HciError<T::Error>> {
        self.command(OP_RESET, &[]).await?;
        self.advertising = false;
        self.command(OP_LE_SET_RANDOM_ADDRESS, address.as_bytes())
            .await?;
        debug!("HCI controller synced, address {}", address);
        Ok(())
    }

    async fn command(&mut self, opcode: u16, params: &[u8]) -> Result<(), HciError<T::Error>> {
        let mut packet = [0u8; MAX_COMMAND_LEN];
        let [op_lo, op_hi] = opcode.to_le_bytes();
        packet[..4].copy_from_slice(&[H4_COMMAND, op_lo, op_hi, params.len() as u8]);
        packet[4..4 + params.len()].copy_from_slice(params);

        self.transport
            .write_all(&packet[..4 + params.len()])
            .await
            .map_err(HciError::Transport)?;
        self.transport.flush().await.map_err(HciError::Transport)?;

        let status = self.wait_for_command(opcode).await?;
        if status != STATUS_SUCCESS {
            return Err(HciError::CommandFailed { opcode, status });
        }
        Ok(())
    }

    /// Read events until the one answering `opcode` arrives and return its
    /// status. Unrelated events are dropped.
    async fn wait_for_command(&mut self, opcode: u16) -> Result<u8, HciError<T::Error>> {
        let mut buf = [0u8; 255];
        loop {
            let mut header = [0u8; 3];
            self.transport.read_exact(&mut header[..1]).await?;
            if header[0] != H4_EVENT {
                return Err(HciError::UnexpectedPacket(header[0]));
            }
            self.transport.read_exact(&mut header[1..]).await?;
            let [_, code, len] = header;
            let params = &mut buf[..len as usize];
            self.transport.read_exact(params).await?;

            match (code, &*params) {
                (EVT_COMMAND_COMPLETE, [_, lo, hi, status, ..])
                    if u16::from_le_bytes([*lo, *hi]) == opcode =>
                {
                    return Ok(*status);
                }
                (EVT_COMMAND_STATUS, [status, _, lo, hi, ..])
                    if u16::from_le_bytes([*lo, *hi]) == opcode =>
                {
                    return Ok(*status);
                }
                _ => warn!("Dropping HCI event {:#04x} while waiting for {:#06x}", code, opcode),
            }
        }
    }

    async fn set_data(&mut self, opcode: u16, data: &[u8]) -> Result<(), HciError<T::Error>> {
        if data.len() > MAX_ADV_DATA_LEN {
            return Err(HciError::DataTooLong(data.len()));
        }
        let mut params = [0u8; 1 + MAX_ADV_DATA_LEN];
        params[0] = data.len() as u8;
        params[1..1 + data.len()].copy_from_slice(data);
        self.command(opcode, &params).await
    }
}

fn encode_params(params: &AdvertisingParams) -> [u8; 15] {
    let [min_lo, min_hi] = params.interval_min.to_le_bytes();
    let [max_lo, max_hi] = params.interval_max.to_le_bytes();
    let own_address = match params.own_address {
        OwnAddressType::Public => 0x00,
        OwnAddressType::Random => 0x01,
    };
    [
        min_lo,
        min_hi,
        max_lo,
        max_hi,
        ADV_NONCONN_IND,
        own_address,
        // No peer address for undirected advertising.
        0x00,
        0,
        0,
        0,
        0,
        0,
        0,
        params.channel_map,
        // No filter policy.
        0x00,
    ]
}

impl<T, D> AdvertisingRadio for HciAdvertiser<T, D>
where
    T: Read + Write,
    D: DelayNs,
{
    type Error = HciError<T::Error>;

    fn is_advertising(&self) -> bool {
        self.advertising
    }

    async fn stop_advertising(&mut self) -> Result<(), Self::Error> {
        self.command(OP_LE_SET_ADV_ENABLE, &[0]).await?;
        self.advertising = false;
        Ok(())
    }

    async fn set_advertising_data(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.set_data(OP_LE_SET_ADV_DATA, data).await
    }

    async fn set_scan_response_data(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.set_data(OP_LE_SET_SCAN_RSP_DATA, data).await
    }

    async fn start_advertising(
        &mut self,
        params: &AdvertisingParams,
        window: Duration,
    ) -> Result<(), Self::Error> {
        self.command(OP_LE_SET_ADV_PARAMS, &encode_params(params))
            .await?;
        self.command(OP_LE_SET_ADV_ENABLE, &[1]).await?;
        self.advertising = true;
        self.window = window;
        Ok(())
    }

    async fn wait_complete(&mut self) -> Result<(), Self::Error> {
        if self.advertising {
            let ms = u32::try_from(self.window.as_millis()).unwrap_or(u32::MAX);
            self.delay.delay_ms(ms).await;
            self.stop_advertising().await?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockController;
    use super::*;
    use crate::beacon::{BeaconController, BeaconError};
    use crate::calibration::CalibratedReading;
    use crate::config::BeaconConfig;
    use crate::hts221::mock::MockDelay;
    use crate::sampler::mock::MockPin;
    use crate::shared::LatestReading;
    use embassy_futures::block_on;

    fn advertiser() -> HciAdvertiser<MockController, MockDelay> {
        HciAdvertiser::new(MockController::default(), MockDelay::default())
    }

    #[test]
    fn test_sync_resets_then_sets_address() {
        let mut hci = advertiser();
        let address = RandomAddress::non_resolvable([1, 2, 3, 4, 5, 6]);

        block_on(hci.sync(address)).unwrap();

        assert_eq!(
            hci.transport().commands,
            [
                (OP_RESET, vec![]),
                (OP_LE_SET_RANDOM_ADDRESS, vec![1, 2, 3, 4, 5, 6]),
            ]
        );
    }

    #[test]
    fn test_start_encodes_non_connectable_params() {
        let mut hci = advertiser();
        let params = AdvertisingParams::non_connectable(500_000);

        block_on(hci.start_advertising(&params, Duration::from_secs(5))).unwrap();

        assert!(hci.is_advertising());
        let commands = &hci.transport().commands;
        assert_eq!(commands[0].0, OP_LE_SET_ADV_PARAMS);
        assert_eq!(
            commands[0].1,
            [0x20, 0x03, 0x40, 0x06, 0x03, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0x07, 0x00]
        );
        assert_eq!(commands[1], (OP_LE_SET_ADV_ENABLE, vec![1]));
    }

    #[test]
    fn test_advertising_data_is_padded() {
        let mut hci = advertiser();

        block_on(hci.set_advertising_data(&[0x02, 0x01, 0x06])).unwrap();

        let (opcode, params) = &hci.transport().commands[0];
        assert_eq!(*opcode, OP_LE_SET_ADV_DATA);
        assert_eq!(params.len(), 32);
        assert_eq!(&params[..4], &[3, 0x02, 0x01, 0x06]);
        assert!(params[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_oversized_data_is_rejected_before_sending() {
        let mut hci = advertiser();

        let result = block_on(hci.set_advertising_data(&[0; 32]));

        assert!(matches!(result, Err(HciError::DataTooLong(32))));
        assert!(hci.transport().commands.is_empty());
    }

    #[test]
    fn test_wait_complete_times_window_then_disables() {
        let mut hci = advertiser();
        let params = AdvertisingParams::non_connectable(500_000);
        block_on(hci.start_advertising(&params, Duration::from_millis(5000))).unwrap();

        block_on(hci.wait_complete()).unwrap();

        assert!(!hci.is_advertising());
        assert_eq!(hci.delay.total_ns, 5_000_000_000);
        assert_eq!(
            hci.transport().commands.last(),
            Some(&(OP_LE_SET_ADV_ENABLE, vec![0]))
        );
    }

    #[test]
    fn test_unrelated_events_are_skipped() {
        let mut hci = advertiser();
        hci.transport.noisy = true;

        block_on(hci.sync(RandomAddress::non_resolvable([9; 6]))).unwrap();

        assert_eq!(hci.transport().commands.len(), 2);
    }

    #[test]
    fn test_command_failure_reports_status() {
        let mut hci = advertiser();
        hci.transport.fail = Some((OP_LE_SET_ADV_ENABLE, 0x0C));
        let params = AdvertisingParams::non_connectable(500_000);

        let result = block_on(hci.start_advertising(&params, Duration::from_secs(5)));

        assert!(matches!(
            result,
            Err(HciError::CommandFailed {
                opcode: OP_LE_SET_ADV_ENABLE,
                status: 0x0C,
            })
        ));
        assert!(!hci.is_advertising());
    }

    #[test]
    fn test_command_status_answers_command() {
        let mut hci = advertiser();
        hci.transport.command_status = true;

        block_on(hci.sync(RandomAddress::non_resolvable([9; 6]))).unwrap();

        assert_eq!(
            hci.transport().opcodes(),
            [OP_RESET, OP_LE_SET_RANDOM_ADDRESS]
        );
    }

    #[test]
    fn test_command_status_failure_reports_status() {
        let mut hci = advertiser();
        hci.transport.command_status = true;
        hci.transport.fail = Some((OP_LE_SET_RANDOM_ADDRESS, 0x12));

        let result = block_on(hci.sync(RandomAddress::non_resolvable([9; 6])));

        assert!(matches!(
            result,
            Err(HciError::CommandFailed {
                opcode: OP_LE_SET_RANDOM_ADDRESS,
                status: 0x12,
            })
        ));
    }

    #[test]
    fn test_non_event_packet_is_rejected() {
        let mut hci = advertiser();
        // Start of an ACL data packet.
        hci.transport.push_rx(&[0x02, 0x00, 0x20]);

        let result = block_on(hci.sync(RandomAddress::non_resolvable([9; 6])));

        assert!(matches!(result, Err(HciError::UnexpectedPacket(0x02))));
        assert_eq!(hci.transport().opcodes(), [OP_RESET]);
    }

    #[test]
    fn test_silent_controller_is_an_error() {
        let mut hci = advertiser();
        hci.transport.budget = Some(0);

        let result = block_on(hci.sync(RandomAddress::non_resolvable([9; 6])));

        assert!(matches!(result, Err(HciError::UnexpectedEof)));
    }

    #[test]
    fn test_beacon_cycle_over_hci() {
        let config = BeaconConfig::default();
        let latest = LatestReading::new();
        latest.publish(CalibratedReading {
            humidity_x2: 123,
            temp_x8: -45,
        });
        let mut hci = advertiser();
        // Two full windows: four setup commands plus one disable each,
        // then the third setup runs dry.
        hci.transport.budget = Some(10);

        let mut beacon = BeaconController::new(
            hci,
            config.payload(Some([0x46, 0x2D, 0xB8, 0x10])).unwrap(),
            config.advertising_params(),
            &latest,
            MockPin::default(),
        );
        let result = block_on(beacon.run(config.window));

        assert!(matches!(
            result,
            Err(BeaconError::Radio(HciError::UnexpectedEof))
        ));
        let controller = beacon.radio().transport();
        let setup = [
            OP_LE_SET_ADV_DATA,
            OP_LE_SET_SCAN_RSP_DATA,
            OP_LE_SET_ADV_PARAMS,
            OP_LE_SET_ADV_ENABLE,
        ];
        assert_eq!(controller.opcodes()[..4], setup);
        assert_eq!(controller.opcodes()[5..9], setup);
        assert_eq!(controller.commands[4], (OP_LE_SET_ADV_ENABLE, vec![0]));

        let adv_data = &controller.commands[0].1;
        assert_eq!(adv_data[0], 23);
        assert_eq!(&adv_data[1 + 7..1 + 11], &[123, 0, 0xD3, 0xFF]);
        assert_eq!(&adv_data[1 + 13..1 + 23], b"th64d28b01");
    }
}
