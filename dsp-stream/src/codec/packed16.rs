//! Packed16 unshuffling.
//!
//! The DSP writes two 24-bit samples per 8-byte unit, each preceded by a
//! padding byte and stored in the DSP's word order:
//!
//! ```text
//! byte:   0    1    2    3    4    5    6    7
//!        pad  s0c  s0b  s0a  pad  s1c  s1b  s1a
//! ```
//!
//! Unshuffling drops the padding (bytes 0 and 4) and emits the remaining six
//! bytes in the configured output byte order. Units are self-contained, so
//! no state carries over between calls.

use crate::error::CodecError;
use crate::ring::{RingBuffer, Storage};

use super::{Codec, Endianness};

/// Bytes per packed input unit.
pub const IN_UNIT: usize = 8;

/// Bytes per unshuffled output unit.
pub const OUT_UNIT: usize = 6;

/// Input byte offset for each output byte, little-endian output.
const TABLE_LE: [usize; OUT_UNIT] = [3, 2, 1, 7, 6, 5];

/// Input byte offset for each output byte, big-endian output.
const TABLE_BE: [usize; OUT_UNIT] = [1, 2, 3, 5, 6, 7];

/// Byte-unshuffling codec.
#[derive(Debug, Clone)]
pub struct Packed16 {
    endianness: Endianness,
    table: [usize; OUT_UNIT],
}

impl Packed16 {
    pub fn new(endianness: Endianness) -> Self {
        let table = match endianness {
            Endianness::Little => TABLE_LE,
            Endianness::Big => TABLE_BE,
        };
        Packed16 { endianness, table }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Output position → input byte offset.
    pub fn table(&self) -> &[usize; OUT_UNIT] {
        &self.table
    }

    /// Unshuffle one unit.
    pub fn unpack_unit(&self, unit: &[u8; IN_UNIT]) -> [u8; OUT_UNIT] {
        core::array::from_fn(|i| unit[self.table[i]])
    }
}

impl Codec for Packed16 {
    fn name(&self) -> &'static str {
        "packed16"
    }

    fn decompress<D, S>(
        &mut self,
        dst: &mut RingBuffer<D>,
        src: &mut RingBuffer<S>,
    ) -> Result<usize, CodecError>
    where
        D: Storage,
        S: Storage,
    {
        let mut total = 0;
        let mut unit = [0u8; IN_UNIT];
        while src.data_len() >= IN_UNIT && dst.free_space() >= OUT_UNIT {
            src.read(&mut unit)?;
            dst.write(&self.unpack_unit(&unit))?;
            total += OUT_UNIT;
        }
        Ok(total)
    }
}
