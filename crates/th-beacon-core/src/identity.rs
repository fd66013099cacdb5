//! Device identity: the random address the beacon advertises from and the
//! unique ID embedded in its local name.

use core::fmt;

/// Hex characters produced from a 4-byte unique ID.
pub const UNIQUE_ID_HEX_LEN: usize = 8;

/// Top two bits of the most significant address byte select the random
/// address sub-type; `0b00` is non-resolvable private.
const SUBTYPE_MASK: u8 = 0b1100_0000;

/// Encode a 4-byte unique ID as 8 lowercase hex characters.
///
/// Each byte is written low nibble first. Deployed scanners match names in
/// this form, so it must not be "fixed" to the usual order.
pub fn encode_unique_id(id: &[u8; 4]) -> [u8; UNIQUE_ID_HEX_LEN] {
    let mut out = [0u8; UNIQUE_ID_HEX_LEN];
    for (pair, &byte) in out.chunks_exact_mut(2).zip(id) {
        pair[0] = hex_digit(byte & 0x0F);
        pair[1] = hex_digit(byte >> 4);
    }
    out
}

const fn hex_digit(nibble: u8) -> u8 {
    if nibble < 10 {
        b'0' + nibble
    } else {
        b'a' + (nibble - 10)
    }
}

/// A BLE random device address, stored little-endian as on the HCI wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomAddress([u8; 6]);

impl RandomAddress {
    /// Turn 48 random bits into a non-resolvable private address.
    ///
    /// The random part may be neither all zeros nor all ones; the lowest bit
    /// is flipped when the input hits either case.
    pub fn non_resolvable(mut random: [u8; 6]) -> Self {
        random[5] &= !SUBTYPE_MASK;

        let all_zero = random.iter().all(|&b| b == 0);
        let all_ones = random[5] == !SUBTYPE_MASK && random[..5].iter().all(|&b| b == 0xFF);
        if all_zero || all_ones {
            random[0] ^= 0x01;
        }
        Self(random)
    }

    pub fn is_non_resolvable(&self) -> bool {
        self.0[5] & SUBTYPE_MASK == 0
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for RandomAddress {
    /// Most significant byte first, the way addresses are usually printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{g:02X}:{e:02X}:{d:02X}:{c:02X}:{b:02X}:{a:02X}")
    }
}
