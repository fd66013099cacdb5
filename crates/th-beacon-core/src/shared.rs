//! Single-slot handoff of the latest reading from the sampler to the beacon.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::calibration::CalibratedReading;

/// Last-value-wins cell holding the most recent [`CalibratedReading`].
///
/// Humidity and temperature are stored and loaded together inside one short
/// critical section, so a reader never sees a pair torn across two samples.
/// Readers get a copy, never a reference into the cell.
///
/// ```rust,ignore
/// static LATEST: LatestReading = LatestReading::new();
///
/// // sampler side
/// LATEST.publish(reading);
/// // beacon side
/// let snapshot = LATEST.snapshot();
/// ```
pub struct LatestReading {
    inner: Mutex<CriticalSectionRawMutex, Cell<CalibratedReading>>,
}

impl LatestReading {
    /// Zero until the first sample lands.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(CalibratedReading {
                humidity_x2: 0,
                temp_x8: 0,
            })),
        }
    }

    pub fn publish(&self, reading: CalibratedReading) {
        self.inner.lock(|cell| cell.set(reading));
    }

    pub fn snapshot(&self) -> CalibratedReading {
        self.inner.lock(|cell| cell.get())
    }
}

impl Default for LatestReading {
    fn default() -> Self {
        Self::new()
    }
}
