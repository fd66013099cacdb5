//! Advertising payload layout.
//!
//! Byte-exact legacy advertising data, 23 bytes with the default name:
//!
//! | Offset | Len | Content |
//! |--------|-----|---------|
//! | 0      | 3   | Flags AD: `02 01 06` (LE general discoverable, no BR/EDR) |
//! | 3      | 8   | Manufacturer AD: `07 FF <company id LE>` + humidity x2 (i16 LE) + temperature x8 (i16 LE) |
//! | 11     | 2+n | Complete local name AD: prefix plus 8 hex characters of the unique ID |
//!
//! [`BeaconReport`] is the receiving side: it decodes the same layout from
//! advertising data picked up by a scanner.

use heapless::String;
use thiserror_no_std::Error;

use crate::calibration::CalibratedReading;
use crate::identity::{UNIQUE_ID_HEX_LEN, encode_unique_id};

/// Legacy advertising data limit.
pub const MAX_ADV_DATA_LEN: usize = 31;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_SHORTENED_LOCAL_NAME: u8 = 0x08;
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// LE General Discoverable, BR/EDR not supported.
pub const FLAGS_LE_GENERAL_DISCOVERABLE: u8 = 0x06;

/// Company identifier reserved for testing.
pub const DEFAULT_COMPANY_ID: u16 = 0xFFFF;

pub const HUMIDITY_OFFSET: usize = 7;
pub const TEMPERATURE_OFFSET: usize = 9;
pub const NAME_OFFSET: usize = 11;

/// Manufacturer value: humidity and temperature, two bytes each.
pub const READING_LEN: usize = 4;

const FLAGS_AD: [u8; 3] = [0x02, AD_TYPE_FLAGS, FLAGS_LE_GENERAL_DISCOVERABLE];
const MAX_NAME_LEN: usize = MAX_ADV_DATA_LEN - NAME_OFFSET - 2;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    #[error("local name of {len} bytes does not fit, at most {max} allowed")]
    NameTooLong { len: usize, max: usize },
    #[error("local name must be ASCII")]
    NonAsciiName,
}

/// The advertising data broadcast by the beacon.
///
/// Built once; only the four reading bytes change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementPayload {
    buf: [u8; MAX_ADV_DATA_LEN],
    len: usize,
}

impl AdvertisementPayload {
    /// Build the payload. With a `unique_id` the local name is
    /// `name_prefix` followed by its 8 hex characters.
    pub fn new(
        company_id: u16,
        name_prefix: &str,
        unique_id: Option<[u8; 4]>,
    ) -> Result<Self, PayloadError> {
        if !name_prefix.is_ascii() {
            return Err(PayloadError::NonAsciiName);
        }
        let name_len =
            name_prefix.len() + unique_id.map_or(0, |_| UNIQUE_ID_HEX_LEN);
        if name_len > MAX_NAME_LEN {
            return Err(PayloadError::NameTooLong {
                len: name_len,
                max: MAX_NAME_LEN,
            });
        }

        let mut buf = [0u8; MAX_ADV_DATA_LEN];
        buf[..3].copy_from_slice(&FLAGS_AD);

        let [company_lo, company_hi] = company_id.to_le_bytes();
        buf[3..HUMIDITY_OFFSET].copy_from_slice(&[
            (3 + READING_LEN) as u8,
            AD_TYPE_MANUFACTURER_DATA,
            company_lo,
            company_hi,
        ]);

        buf[NAME_OFFSET] = (1 + name_len) as u8;
        buf[NAME_OFFSET + 1] = AD_TYPE_COMPLETE_LOCAL_NAME;
        let name_start = NAME_OFFSET + 2;
        buf[name_start..name_start + name_prefix.len()].copy_from_slice(name_prefix.as_bytes());
        if let Some(id) = unique_id {
            let hex_start = name_start + name_prefix.len();
            buf[hex_start..hex_start + UNIQUE_ID_HEX_LEN].copy_from_slice(&encode_unique_id(&id));
        }

        Ok(Self {
            buf,
            len: name_start + name_len,
        })
    }

    /// Overwrite the reading slot in place.
    pub fn set_reading(&mut self, reading: CalibratedReading) {
        self.buf[HUMIDITY_OFFSET..HUMIDITY_OFFSET + 2]
            .copy_from_slice(&reading.humidity_x2.to_le_bytes());
        self.buf[TEMPERATURE_OFFSET..TEMPERATURE_OFFSET + 2]
            .copy_from_slice(&reading.temp_x8.to_le_bytes());
    }

    pub fn reading(&self) -> CalibratedReading {
        CalibratedReading {
            humidity_x2: i16::from_le_bytes([
                self.buf[HUMIDITY_OFFSET],
                self.buf[HUMIDITY_OFFSET + 1],
            ]),
            temp_x8: i16::from_le_bytes([
                self.buf[TEMPERATURE_OFFSET],
                self.buf[TEMPERATURE_OFFSET + 1],
            ]),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn local_name(&self) -> &str {
        // Only ASCII is ever written into the name field.
        core::str::from_utf8(&self.buf[NAME_OFFSET + 2..self.len]).unwrap_or_default()
    }
}

/// A beacon advertisement as seen by a scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconReport {
    pub company_id: u16,
    pub reading: CalibratedReading,
    pub name: String<MAX_ADV_DATA_LEN>,
}

impl BeaconReport {
    /// Decode advertising data.
    ///
    /// Returns `None` for malformed AD structures or when no manufacturer
    /// data with exactly a 4-byte value is present.
    pub fn parse(adv_data: &[u8]) -> Option<Self> {
        let mut manufacturer = None;
        let mut name = String::new();

        let mut rest = adv_data;
        while let Some((&len, tail)) = rest.split_first() {
            // A zero length marks the end of the significant part.
            if len == 0 {
                break;
            }
            let structure = tail.get(..usize::from(len))?;
            rest = &tail[usize::from(len)..];

            let (&ad_type, body) = structure.split_first()?;
            match ad_type {
                AD_TYPE_MANUFACTURER_DATA if body.len() == 2 + READING_LEN => {
                    manufacturer = Some((
                        u16::from_le_bytes([body[0], body[1]]),
                        CalibratedReading {
                            humidity_x2: i16::from_le_bytes([body[2], body[3]]),
                            temp_x8: i16::from_le_bytes([body[4], body[5]]),
                        },
                    ));
                }
                AD_TYPE_COMPLETE_LOCAL_NAME | AD_TYPE_SHORTENED_LOCAL_NAME => {
                    name.clear();
                    name.push_str(core::str::from_utf8(body).ok()?).ok()?;
                }
                _ => {}
            }
        }

        let (company_id, reading) = manufacturer?;
        Some(Self {
            company_id,
            reading,
            name,
        })
    }

    /// Whether the value was sent under `company_id` and the name is
    /// `prefix` followed by exactly 8 more characters, the naming scheme of a
    /// beacon with a unique ID.
    pub fn is_beacon(&self, company_id: u16, prefix: &str) -> bool {
        self.company_id == company_id
            && self.name.starts_with(prefix)
            && self.name.len() == prefix.len() + UNIQUE_ID_HEX_LEN
    }

    pub fn humidity_percent(&self) -> f32 {
        self.reading.humidity_percent()
    }

    pub fn temperature_celsius(&self) -> f32 {
        self.reading.temperature_celsius()
    }
}
