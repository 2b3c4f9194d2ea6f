//! Compressed capture stream.
//!
//! [`CaptureStream`] ties the pieces together for one capture session:
//!
//! ```text
//! DSP host buffer ──read──► compressed ring ──decompress──► decompressed ring ──► consumer
//! ```
//!
//! Call [`service()`](CaptureStream::service) whenever the DSP raises its
//! interrupt (or on a timer) and [`read_decoded()`](CaptureStream::read_decoded)
//! from the consumer side. Both rings are owned by the stream; nothing is
//! shared across sessions.

use alloc::vec;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;
use log::{debug, trace};

use crate::codec::{Codec, Decompressor, Endianness, Format, FrameDecoder, IN_UNIT, MAX_DECODED_FRAME};
use crate::constants::{DEFAULT_COMPRESSED_CAPACITY, DEFAULT_DECOMPRESSED_CAPACITY, WORD_ALIGN};
use crate::error::{CodecError, StreamError};
use crate::port::ControlPort;
use crate::remote::{RemoteBuffer, RemoteConfig};
use crate::ring::RingBuffer;

/// Per-session stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Compressed format identifier advertised by the firmware.
    pub format: u32,
    pub endianness: Endianness,
    /// Compressed ring size in bytes. Must be a non-zero multiple of 8.
    pub compressed_capacity: usize,
    /// Decompressed ring size in bytes. Must hold one decoded frame.
    pub decompressed_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            format: Format::Msbc as u32,
            endianness: Endianness::Little,
            compressed_capacity: DEFAULT_COMPRESSED_CAPACITY,
            decompressed_capacity: DEFAULT_DECOMPRESSED_CAPACITY,
        }
    }
}

impl StreamConfig {
    fn validate<E>(&self) -> Result<(), StreamError<E>> {
        if self.compressed_capacity == 0 || self.compressed_capacity % IN_UNIT != 0 {
            return Err(StreamError::BadConfig(
                "compressed capacity must be a non-zero multiple of 8",
            ));
        }
        if self.decompressed_capacity < MAX_DECODED_FRAME {
            return Err(StreamError::BadConfig(
                "decompressed capacity smaller than one decoded frame",
            ));
        }
        Ok(())
    }
}

/// What one [`CaptureStream::service()`] call moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Compressed bytes copied from the DSP.
    pub read: usize,
    /// Decompressed bytes produced.
    pub decoded: usize,
}

/// One capture session.
pub struct CaptureStream<P, F> {
    remote: RemoteBuffer<P>,
    compressed: RingBuffer<Vec<u8>>,
    decompressed: RingBuffer<Vec<u8>>,
    codec: Decompressor<F>,
}

impl<P: ControlPort, F: FrameDecoder> CaptureStream<P, F> {
    /// Bind the codec, attach to the DSP's host buffer and allocate both
    /// rings.
    ///
    /// The format is checked before the port is touched.
    pub fn start<D: DelayNs>(
        port: P,
        delay: &mut D,
        remote: RemoteConfig,
        config: StreamConfig,
        make_decoder: impl FnOnce() -> F,
    ) -> Result<Self, StreamError<P::Error>> {
        config.validate()?;
        let codec = Decompressor::from_id(config.format, config.endianness, make_decoder)?;
        let remote = RemoteBuffer::init(port, delay, remote)?;
        debug!(
            "capture stream started: {} codec, {} compressed / {} decompressed bytes",
            codec.name(),
            config.compressed_capacity,
            config.decompressed_capacity
        );
        Ok(CaptureStream {
            remote,
            compressed: RingBuffer::new(vec![0u8; config.compressed_capacity]),
            decompressed: RingBuffer::new(vec![0u8; config.decompressed_capacity]),
            codec,
        })
    }

    /// Move data from the DSP through the codec until nothing more fits.
    ///
    /// Once the DSP buffer has been drained (down to less than one whole
    /// word) the interrupt is re-armed. If the decompressed ring fills
    /// first the interrupt stays masked; call again after
    /// [`read_decoded()`](Self::read_decoded).
    pub fn service(&mut self) -> Result<Progress, StreamError<P::Error>> {
        self.remote.update_status()?;

        let mut progress = Progress::default();
        loop {
            let avail = self.remote.data_avail()?;
            let mut want = avail.min(self.compressed.free_space());
            want -= want % WORD_ALIGN;
            let read = if want > 0 {
                self.remote.read(&mut self.compressed, want)?
            } else {
                0
            };

            let decoded = match self.codec.decompress(&mut self.decompressed, &mut self.compressed) {
                Ok(n) => n,
                // Still collecting enough to calibrate
                Err(CodecError::NotEnoughSeed { .. }) => 0,
                Err(e) => return Err(e.into()),
            };

            progress.read += read;
            progress.decoded += decoded;
            if read == 0 && decoded == 0 {
                break;
            }
        }

        // A trailing half word waits for the DSP to finish it
        if self.remote.data_available() < WORD_ALIGN {
            self.remote.reenable_irq()?;
        }
        trace!("service: {:?}", progress);
        Ok(progress)
    }

    /// Copy decoded bytes into `dest`. Returns how many were copied.
    pub fn read_decoded(&mut self, dest: &mut [u8]) -> Result<usize, StreamError<P::Error>> {
        let n = dest.len().min(self.decompressed.data_len());
        self.decompressed.read(&mut dest[..n])?;
        Ok(n)
    }

    /// Decoded bytes waiting for the consumer.
    pub fn decoded_available(&self) -> usize {
        self.decompressed.data_len()
    }

    /// Compressed bytes copied from the DSP but not yet decompressed.
    pub fn compressed_pending(&self) -> usize {
        self.compressed.data_len()
    }

    pub fn format(&self) -> Format {
        self.codec.format()
    }

    pub fn remote(&self) -> &RemoteBuffer<P> {
        &self.remote
    }

    pub fn codec(&self) -> &Decompressor<F> {
        &self.codec
    }

    /// End the session, releasing the codec and handing the port back.
    pub fn stop(self) -> P {
        self.codec.deinit();
        debug!("capture stream stopped");
        self.remote.release()
    }
}
