//! Hardware-independent core of the th-beacon temperature/humidity beacon.
//!
//! Everything here is generic over `embedded-hal(-async)` and
//! `embedded-io-async` traits so it can be tested on the host and driven by
//! either the ESP32-S3 firmware or the desktop simulator.
//!
//! Data flows one way:
//!
//! ```text
//! DRDY high -> Sampler -> LatestReading -> BeaconController -> radio
//! ```

#![cfg_attr(not(test), no_std)]

pub mod advertisement;
pub mod beacon;
pub mod calibration;
pub mod config;
pub mod hci;
pub mod hts221;
pub mod identity;
pub mod radio;
pub mod sampler;
pub mod shared;
