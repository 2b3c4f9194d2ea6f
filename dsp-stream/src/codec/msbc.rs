//! Sub-band speech codec wrapper.
//!
//! Compressed data arrives packed16-shuffled. [`Msbc`] unshuffles it into an
//! intermediate ring and feeds whole encoded frames to a [`FrameDecoder`].
//!
//! ## Frame geometry
//!
//! The encoded and decoded frame lengths are not known until the stream
//! starts. On the first call the codec calibrates:
//!
//! 1. Unshuffle into the intermediate ring until at least
//!    [`MAX_ENCODED_FRAME`] bytes are buffered. With less, the call fails
//!    with [`CodecError::NotEnoughSeed`]; the buffered bytes are kept and
//!    the next call tries again.
//! 2. Trial-decode a copy of those bytes into a stack buffer. The decoder's
//!    `consumed`/`produced` become the frame lengths for the session. The
//!    trial output is thrown away and the intermediate ring is not consumed,
//!    so the first frame is decoded again for real.
//! 3. Allocate scratch buffers of exactly those lengths and call
//!    [`FrameDecoder::reset()`] so the decoder starts clean.
//!
//! A calibration decode that fails or yields out-of-range lengths ends the
//! session: every later call returns [`CodecError::SessionFailed`]. So does
//! a failed scratch allocation or a failed ring transfer in steady state.
//!
//! ## Steady state
//!
//! Each pass tops up the intermediate ring, then decodes one frame if a
//! whole frame is buffered and `dst` has room for its output. A corrupt
//! frame is logged and dropped; the stream carries on.

use alloc::vec::Vec;

use log::{debug, trace, warn};

use crate::error::{CodecError, CorruptFrame};
use crate::ring::{RingBuffer, Storage};

use super::packed16::{Packed16, OUT_UNIT};
use super::{Codec, Decoded, Endianness, FrameDecoder};

/// Largest encoded frame accepted from the decoder, in bytes.
pub const MAX_ENCODED_FRAME: usize = 60;

/// Largest decoded frame accepted from the decoder, in bytes.
pub const MAX_DECODED_FRAME: usize = 240;

/// Capacity of the unshuffled-but-encoded intermediate ring.
pub const INTERMEDIATE_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Frame lengths not yet known.
    Unconfigured,
    Configured,
    /// The session is over.
    Failed,
}

/// Sub-band codec over packed16 transport.
pub struct Msbc<F> {
    unpack: Packed16,
    intermediate: RingBuffer<Vec<u8>>,
    decoder: F,
    state: State,
    /// One encoded frame; empty until calibrated.
    frame: Vec<u8>,
    /// One decoded frame; empty until calibrated.
    decoded: Vec<u8>,
    frames_decoded: u32,
    frames_dropped: u32,
}

/// Zeroed buffer of `len` bytes, failing instead of aborting on OOM.
fn alloc_zeroed(len: usize) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| CodecError::Alloc(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

impl<F: FrameDecoder> Msbc<F> {
    pub fn new(endianness: Endianness, decoder: F) -> Result<Self, CodecError> {
        Ok(Msbc {
            unpack: Packed16::new(endianness),
            intermediate: RingBuffer::new(alloc_zeroed(INTERMEDIATE_SIZE)?),
            decoder,
            state: State::Unconfigured,
            frame: Vec::new(),
            decoded: Vec::new(),
            frames_decoded: 0,
            frames_dropped: 0,
        })
    }

    pub fn endianness(&self) -> Endianness {
        self.unpack.endianness()
    }

    pub fn is_configured(&self) -> bool {
        self.state == State::Configured
    }

    /// Encoded frame length, once calibrated.
    pub fn frame_len(&self) -> Option<usize> {
        self.is_configured().then_some(self.frame.len())
    }

    /// Decoded frame length, once calibrated.
    pub fn decoded_len(&self) -> Option<usize> {
        self.is_configured().then_some(self.decoded.len())
    }

    pub fn frames_decoded(&self) -> u32 {
        self.frames_decoded
    }

    pub fn frames_dropped(&self) -> u32 {
        self.frames_dropped
    }

    /// Unshuffled bytes waiting to be decoded.
    pub fn buffered(&self) -> usize {
        self.intermediate.data_len()
    }

    pub fn decoder(&self) -> &F {
        &self.decoder
    }

    fn top_up<S: Storage>(&mut self, src: &mut RingBuffer<S>) -> Result<usize, CodecError> {
        if self.intermediate.free_space() < OUT_UNIT {
            return Ok(0);
        }
        self.unpack.decompress(&mut self.intermediate, src)
    }

    fn calibrate<S: Storage>(&mut self, src: &mut RingBuffer<S>) -> Result<(), CodecError> {
        self.top_up(src)?;
        let have = self.intermediate.data_len();
        if have < MAX_ENCODED_FRAME {
            return Err(CodecError::NotEnoughSeed {
                needed: MAX_ENCODED_FRAME,
                have,
            });
        }

        let mut seed = [0u8; MAX_ENCODED_FRAME];
        self.intermediate.peek(&mut seed)?;
        let mut probe = [0u8; MAX_DECODED_FRAME];
        let geometry = match self.decoder.decode(&seed, &mut probe) {
            Ok(d) if (1..=MAX_ENCODED_FRAME).contains(&d.consumed)
                && (1..=MAX_DECODED_FRAME).contains(&d.produced) =>
            {
                d
            }
            result => {
                warn!("msbc calibration decode: {:?}", result);
                return Err(self.fail(CodecError::Calibration));
            }
        };

        self.configure(geometry)
    }

    /// Size the scratch buffers for `geometry` and start the session.
    fn configure(&mut self, geometry: Decoded) -> Result<(), CodecError> {
        // The decoder saw the trial frame either way
        self.decoder.reset();
        let scratch = alloc_zeroed(geometry.consumed)
            .and_then(|frame| Ok((frame, alloc_zeroed(geometry.produced)?)));
        let (frame, decoded) = match scratch {
            Ok(bufs) => bufs,
            Err(e) => return Err(self.fail(e)),
        };
        self.frame = frame;
        self.decoded = decoded;
        self.state = State::Configured;
        debug!(
            "msbc calibrated: {} byte frames -> {} bytes",
            geometry.consumed, geometry.produced
        );
        Ok(())
    }

    /// End the session; every later call returns `SessionFailed`.
    fn fail(&mut self, err: CodecError) -> CodecError {
        warn!("msbc session failed: {}", err);
        self.state = State::Failed;
        err
    }

    fn decode_frames<D, S>(
        &mut self,
        dst: &mut RingBuffer<D>,
        src: &mut RingBuffer<S>,
    ) -> Result<usize, CodecError>
    where
        D: Storage,
        S: Storage,
    {
        let mut total = 0;
        loop {
            self.top_up(src)?;
            if self.intermediate.data_len() < self.frame.len()
                || dst.free_space() < self.decoded.len()
            {
                break;
            }

            self.intermediate.read(&mut self.frame)?;
            match self.decoder.decode(&self.frame, &mut self.decoded) {
                Ok(d) => {
                    let n = d.produced.min(self.decoded.len());
                    dst.write(&self.decoded[..n])?;
                    total += n;
                    self.frames_decoded = self.frames_decoded.wrapping_add(1);
                }
                Err(CorruptFrame) => {
                    self.frames_dropped = self.frames_dropped.wrapping_add(1);
                    warn!("msbc: dropped corrupt frame ({} so far)", self.frames_dropped);
                }
            }
        }
        Ok(total)
    }
}

impl<F: FrameDecoder> Codec for Msbc<F> {
    fn name(&self) -> &'static str {
        "msbc"
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
        match self.state {
            State::Failed => return Err(CodecError::SessionFailed),
            State::Unconfigured => self.calibrate(src)?,
            State::Configured => {}
        }

        let total = match self.decode_frames(dst, src) {
            Ok(n) => n,
            Err(e) => return Err(self.fail(e)),
        };
        trace!("msbc: {} bytes out, {} buffered", total, self.intermediate.data_len());
        Ok(total)
    }

    fn deinit(self) {
        debug!(
            "msbc released after {} frames ({} dropped)",
            self.frames_decoded, self.frames_dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pack16_le, ramp, FakeDecoder, FAKE_SYNC};
    use alloc::vec;

    const FRAME: usize = 12;
    const DECODED: usize = 2 * (FRAME - 1);

    fn ring(capacity: usize) -> RingBuffer<Vec<u8>> {
        RingBuffer::new(vec![0u8; capacity])
    }

    fn codec() -> Msbc<FakeDecoder> {
        Msbc::new(Endianness::Little, FakeDecoder::new(FRAME)).unwrap()
    }

    /// Payload for `frames` frames and the output they should decode to.
    fn stream(frames: usize) -> (Vec<u8>, Vec<u8>) {
        let payload = ramp(frames * (FRAME - 1));
        let encoded = FakeDecoder::new(FRAME).encode(&payload);
        let expected = payload.iter().flat_map(|&b| [b, b]).collect();
        (pack16_le(&encoded), expected)
    }

    fn drain(dst: &mut RingBuffer<Vec<u8>>) -> Vec<u8> {
        let mut out = vec![0u8; dst.data_len()];
        dst.read(&mut out).unwrap();
        out
    }

    #[test]
    fn calibrates_then_decodes_everything() {
        let (packed, expected) = stream(20);
        let mut msbc = codec();
        let mut src = ring(512);
        src.write(&packed).unwrap();
        let mut dst = ring(1024);

        assert_eq!(msbc.decompress(&mut dst, &mut src).unwrap(), 20 * DECODED);
        assert_eq!(msbc.frame_len(), Some(FRAME));
        assert_eq!(msbc.decoded_len(), Some(DECODED));
        assert_eq!(drain(&mut dst), expected);
        assert_eq!(msbc.decoder().resets, 1);
        // One trial decode plus one per frame
        assert_eq!(msbc.decoder().decode_calls, 21);
        assert_eq!(msbc.frames_decoded(), 20);
    }

    #[test]
    fn not_enough_seed_keeps_data() {
        let (packed, expected) = stream(10);
        let mut msbc = codec();
        let mut src = ring(512);
        let mut dst = ring(1024);

        // 5 units = 30 unshuffled bytes, below the calibration minimum
        src.write(&packed[..40]).unwrap();
        assert_eq!(
            msbc.decompress(&mut dst, &mut src),
            Err(CodecError::NotEnoughSeed {
                needed: MAX_ENCODED_FRAME,
                have: 30
            })
        );
        assert!(!msbc.is_configured());
        assert_eq!(msbc.buffered(), 30);
        assert!(src.is_empty());

        src.write(&packed[40..]).unwrap();
        msbc.decompress(&mut dst, &mut src).unwrap();
        assert_eq!(drain(&mut dst), expected);
    }

    #[test]
    fn calibration_failure_ends_session() {
        let mut msbc = codec();
        let mut src = ring(512);
        src.write(&pack16_le(&[0x55; 96])).unwrap();
        let mut dst = ring(1024);
        assert_eq!(
            msbc.decompress(&mut dst, &mut src),
            Err(CodecError::Calibration)
        );
        assert_eq!(
            msbc.decompress(&mut dst, &mut src),
            Err(CodecError::SessionFailed)
        );
        assert!(dst.is_empty());
        assert_eq!(msbc.frame_len(), None);
    }

    #[test]
    fn corrupt_frame_is_dropped_and_stream_continues() {
        let payload = ramp(8 * (FRAME - 1));
        let mut encoded = FakeDecoder::new(FRAME).encode(&payload);
        // Break the third frame's sync byte
        encoded[2 * FRAME] = !FAKE_SYNC;
        let mut msbc = codec();
        let mut src = ring(512);
        src.write(&pack16_le(&encoded)).unwrap();
        let mut dst = ring(1024);

        assert_eq!(msbc.decompress(&mut dst, &mut src).unwrap(), 7 * DECODED);
        assert_eq!(msbc.frames_dropped(), 1);

        let expected: Vec<u8> = payload
            .chunks(FRAME - 1)
            .enumerate()
            .filter(|&(i, _)| i != 2)
            .flat_map(|(_, c)| c.iter().flat_map(|&b| [b, b]))
            .collect();
        assert_eq!(drain(&mut dst), expected);
    }

    #[test]
    fn backpressure_resumes_without_loss() {
        let (packed, expected) = stream(12);
        let mut msbc = codec();
        let mut src = ring(512);
        src.write(&packed).unwrap();
        // Room for two decoded frames at a time
        let mut dst = ring(2 * DECODED + 5);

        let mut out = Vec::new();
        for _ in 0..10 {
            let n = msbc.decompress(&mut dst, &mut src).unwrap();
            assert!(n <= 2 * DECODED);
            out.extend(drain(&mut dst));
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn frames_split_across_calls() {
        let (packed, expected) = stream(15);
        let mut msbc = codec();
        let mut src = ring(128);
        let mut dst = ring(1024);

        // Seed enough for calibration first
        src.write(&packed[..80]).unwrap();
        msbc.decompress(&mut dst, &mut src).unwrap();
        // Then dribble the rest in, two units at a time
        for piece in packed[80..].chunks(16) {
            src.write(piece).unwrap();
            msbc.decompress(&mut dst, &mut src).unwrap();
        }
        assert_eq!(drain(&mut dst), expected);
        assert_eq!(msbc.buffered(), 0);
    }

    #[test]
    fn waits_for_a_whole_frame() {
        let (packed, _) = stream(6);
        let mut msbc = codec();
        let mut src = ring(512);
        // 72 unshuffled bytes = 6 frames; hold the last unit back
        src.write(&packed[..packed.len() - 8]).unwrap();
        let mut dst = ring(1024);
        assert_eq!(msbc.decompress(&mut dst, &mut src).unwrap(), 5 * DECODED);
        assert_eq!(msbc.buffered(), FRAME - 6);
    }

    #[test]
    fn scratch_allocation_failure_ends_session() {
        let mut msbc = codec();
        let err = msbc.configure(Decoded {
            consumed: usize::MAX,
            produced: DECODED,
        });
        assert_eq!(err, Err(CodecError::Alloc(usize::MAX)));
        // Trial decode state is cleared even though setup failed
        assert_eq!(msbc.decoder().resets, 1);
        assert!(!msbc.is_configured());

        let (packed, _) = stream(10);
        let mut src = ring(512);
        src.write(&packed).unwrap();
        let mut dst = ring(1024);
        assert_eq!(
            msbc.decompress(&mut dst, &mut src),
            Err(CodecError::SessionFailed)
        );
        assert_eq!(msbc.decoder().decode_calls, 0);
    }

    #[test]
    fn steady_state_failure_is_terminal() {
        let (packed, _) = stream(10);
        let mut msbc = codec();
        let mut src = ring(512);
        src.write(&packed[..80]).unwrap();
        let mut dst = ring(1024);
        msbc.decompress(&mut dst, &mut src).unwrap();
        assert!(msbc.is_configured());

        let err = msbc.fail(CodecError::Ring(crate::error::RingError::NoSpace {
            requested: DECODED,
            free: 0,
        }));
        assert!(matches!(err, CodecError::Ring(_)));
        src.write(&packed[80..]).unwrap();
        let calls = msbc.decoder().decode_calls;
        assert_eq!(
            msbc.decompress(&mut dst, &mut src),
            Err(CodecError::SessionFailed)
        );
        assert_eq!(msbc.decoder().decode_calls, calls);
        assert_eq!(msbc.frame_len(), None);
    }

    #[test]
    fn oversized_calibration_frame_fails() {
        let mut msbc = Msbc::new(Endianness::Little, FakeDecoder::new(MAX_ENCODED_FRAME + 1))
            .unwrap();
        let payload = ramp(2 * MAX_ENCODED_FRAME);
        let encoded = msbc.decoder().encode(&payload);
        let mut src = ring(512);
        let usable = encoded.len() - encoded.len() % 6;
        src.write(&pack16_le(&encoded[..usable])).unwrap();
        let mut dst = ring(1024);
        assert_eq!(
            msbc.decompress(&mut dst, &mut src),
            Err(CodecError::Calibration)
        );
    }
}
