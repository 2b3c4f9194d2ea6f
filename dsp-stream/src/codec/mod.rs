//! Decompression of the DSP's compressed audio.
//!
//! The streaming code never talks to a codec directly. It builds a
//! [`Decompressor`] from the stream's format identifier and calls
//! [`Decompressor::decompress()`], which moves bytes from the compressed
//! ring to the decompressed ring using whichever codec is bound.
//!
//! ## Codecs
//!
//! | Format | Type | Description |
//! |--------|------|-------------|
//! | [`Format::Packed16`] | [`Packed16`] | Strip padding, reorder 8 → 6 bytes |
//! | [`Format::Msbc`] | [`Msbc`] | Packed16, then sub-band frame decode |
//! | [`Format::NoChange`] | [`Msbc`] | Legacy alias of `Msbc` |
//!
//! The sub-band decoder itself is external; it is plugged in through
//! [`FrameDecoder`].

mod msbc;
mod packed16;

pub use msbc::{Msbc, INTERMEDIATE_SIZE, MAX_DECODED_FRAME, MAX_ENCODED_FRAME};
pub use packed16::{Packed16, IN_UNIT, OUT_UNIT};

use log::debug;

use crate::error::{CodecError, CorruptFrame};
use crate::ring::{RingBuffer, Storage};

// ── Public enums ───────────────────────────────────────────────────────────

/// Compressed stream format, as advertised by the DSP firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Legacy identifier; decoded exactly like [`Format::Msbc`].
    NoChange = 0,
    /// Padded 24-bit samples, unshuffled only.
    Packed16 = 1,
    /// Packed16 carrying sub-band speech codec frames.
    Msbc = 2,
}

impl Format {
    /// The codec that actually handles this format.
    pub fn resolve(self) -> Format {
        match self {
            Format::NoChange => Format::Msbc,
            other => other,
        }
    }
}

impl TryFrom<u32> for Format {
    type Error = CodecError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(Format::NoChange),
            1 => Ok(Format::Packed16),
            2 => Ok(Format::Msbc),
            other => Err(CodecError::UnknownFormat(other)),
        }
    }
}

/// Byte order of the decompressed samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

// ── Traits ─────────────────────────────────────────────────────────────────

/// A decompression codec.
pub trait Codec {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Move as much data as possible from `src` to `dst`.
    ///
    /// Stops when `src` runs short or `dst` runs out of room. Returns the
    /// number of bytes written to `dst`.
    fn decompress<D, S>(
        &mut self,
        dst: &mut RingBuffer<D>,
        src: &mut RingBuffer<S>,
    ) -> Result<usize, CodecError>
    where
        D: Storage,
        S: Storage;

    /// Tear the codec down, releasing everything it owns.
    fn deinit(self)
    where
        Self: Sized,
    {
        debug!("{} codec released", self.name());
    }
}

/// Result of decoding one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Encoded bytes the frame occupied.
    pub consumed: usize,
    /// Decoded bytes written to the output.
    pub produced: usize,
}

/// Sub-band frame decoder used by [`Msbc`].
///
/// The first successful call establishes the stream's frame geometry:
/// `consumed` becomes the encoded frame length and `produced` the decoded
/// frame length for the rest of the session.
pub trait FrameDecoder {
    /// Decode one frame from the start of `input` into `output`.
    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Decoded, CorruptFrame>;

    /// Forget any state left behind by the calibration decode.
    fn reset(&mut self) {}
}

/// Frame decoder for streams that never use [`Format::Msbc`].
///
/// Every frame is reported as corrupt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDecoder;

impl FrameDecoder for NullDecoder {
    fn decode(&mut self, _input: &[u8], _output: &mut [u8]) -> Result<Decoded, CorruptFrame> {
        Err(CorruptFrame)
    }
}

// ── Dispatcher ─────────────────────────────────────────────────────────────

/// Codec bound to one stream for its whole lifetime.
pub enum Decompressor<F> {
    Packed16(Packed16),
    Msbc(Msbc<F>),
}

impl<F: FrameDecoder> Decompressor<F> {
    /// Build the codec for `format`.
    ///
    /// `make_decoder` is only called for formats that need a frame decoder.
    pub fn new(
        format: Format,
        endianness: Endianness,
        make_decoder: impl FnOnce() -> F,
    ) -> Result<Self, CodecError> {
        let codec = match format.resolve() {
            Format::Packed16 => Decompressor::Packed16(Packed16::new(endianness)),
            _ => Decompressor::Msbc(Msbc::new(endianness, make_decoder())?),
        };
        debug!("decompressor {} bound for {:?}", codec.name(), format);
        Ok(codec)
    }

    /// Build the codec for a raw format identifier.
    pub fn from_id(
        id: u32,
        endianness: Endianness,
        make_decoder: impl FnOnce() -> F,
    ) -> Result<Self, CodecError> {
        Self::new(Format::try_from(id)?, endianness, make_decoder)
    }

    /// The codec format actually bound.
    pub fn format(&self) -> Format {
        match self {
            Decompressor::Packed16(_) => Format::Packed16,
            Decompressor::Msbc(_) => Format::Msbc,
        }
    }

    pub fn endianness(&self) -> Endianness {
        match self {
            Decompressor::Packed16(c) => c.endianness(),
            Decompressor::Msbc(c) => c.endianness(),
        }
    }
}

impl<F: FrameDecoder> Codec for Decompressor<F> {
    fn name(&self) -> &'static str {
        match self {
            Decompressor::Packed16(c) => c.name(),
            Decompressor::Msbc(c) => c.name(),
        }
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
        match self {
            Decompressor::Packed16(c) => c.decompress(dst, src),
            Decompressor::Msbc(c) => c.decompress(dst, src),
        }
    }

    fn deinit(self) {
        match self {
            Decompressor::Packed16(c) => c.deinit(),
            Decompressor::Msbc(c) => c.deinit(),
        }
    }
}
