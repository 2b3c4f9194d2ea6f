//! Error types for the streaming pipeline.
//!
//! Each layer has its own closed error enum. Transport errors from the
//! control port are carried through unchanged in [`RemoteError::Port`] so the
//! caller can still inspect the bus-level failure.

use thiserror::Error;

/// Capacity errors raised by [`RingBuffer`](crate::ring::RingBuffer).
///
/// All of these are checked before any cursor moves, so a failed call
/// leaves the ring exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// Not enough free space for the requested write.
    #[error("ring buffer has {free} bytes free, {requested} requested")]
    NoSpace { requested: usize, free: usize },

    /// Not enough buffered data for the requested read.
    #[error("ring buffer holds {available} bytes, {requested} requested")]
    NoData { requested: usize, available: usize },

    /// A commit would run past the physical end of the backing storage.
    #[error("commit of {requested} bytes at offset {offset} overruns capacity {capacity}")]
    OverCommit {
        requested: usize,
        offset: usize,
        capacity: usize,
    },
}

/// Errors raised by [`RemoteBuffer`](crate::remote::RemoteBuffer).
#[derive(Debug, Error)]
pub enum RemoteError<E> {
    /// A control-port access failed.
    #[error("control port access failed: {0:?}")]
    Port(E),

    /// No root symbol was configured for the host buffer.
    #[error("host buffer root symbol is not set")]
    RootUnset,

    /// The DSP never published its host buffer address.
    #[error("host buffer address still zero after {retries} polls")]
    NotReady { retries: u32 },

    /// The segment layout read back from the DSP is unusable.
    #[error("invalid host buffer layout: {0}")]
    BadLayout(&'static str),

    /// The configuration itself is inconsistent.
    #[error("invalid remote buffer configuration: {0}")]
    BadConfig(&'static str),

    /// Requested length is not a whole number of registers.
    #[error("read of {len} bytes is not a multiple of {word} bytes")]
    Misaligned { len: usize, word: usize },

    /// Requested more than the last `data_avail()` reported.
    #[error("requested {requested} bytes but only {available} are available")]
    NotAvailable { requested: usize, available: usize },

    /// Committing into the destination ring failed.
    #[error(transparent)]
    Ring(#[from] RingError),
}

/// Errors raised by the decompression codecs and their dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The format identifier does not name a known codec.
    #[error("unknown decompression format {0}")]
    UnknownFormat(u32),

    /// Allocating codec state or scratch buffers failed.
    #[error("failed to allocate {0} bytes of codec state")]
    Alloc(usize),

    /// Too little unshuffled data to calibrate the frame decoder.
    #[error("need {needed} bytes to calibrate the frame decoder, have {have}")]
    NotEnoughSeed { needed: usize, have: usize },

    /// The trial decode did not yield usable frame lengths.
    #[error("frame decoder calibration failed")]
    Calibration,

    /// A previous calibration failure ended this session.
    #[error("decoder session failed during calibration")]
    SessionFailed,

    /// Moving data between rings failed.
    #[error(transparent)]
    Ring(#[from] RingError),
}

/// Errors raised by [`CaptureStream`](crate::stream::CaptureStream).
#[derive(Debug, Error)]
pub enum StreamError<E> {
    /// The stream configuration is inconsistent.
    #[error("invalid stream configuration: {0}")]
    BadConfig(&'static str),

    #[error(transparent)]
    Remote(#[from] RemoteError<E>),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Ring(#[from] RingError),
}

/// A frame the sub-band decoder could not decode.
///
/// Recoverable: the frame is dropped and decoding continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("corrupt encoded frame")]
pub struct CorruptFrame;
