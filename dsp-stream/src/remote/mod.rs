//! The DSP's segmented circular buffer, seen from the host.
//!
//! The DSP records compressed audio into a circular buffer that is split
//! across up to three disjoint memory regions. [`RemoteBuffer`] presents
//! them as one logical buffer of words and copies available data into a
//! local [`RingBuffer`].
//!
//! ## Index ownership
//!
//! - The **write index** belongs to the DSP. The host only ever reads it.
//! - The **read index** belongs to the host. It is advanced locally while
//!   copying and written back once per [`read()`](RemoteBuffer::read); the
//!   DSP may only reuse words behind it.
//!
//! Both are word indices modulo the logical size.
//!
//! ## Typical interrupt service
//!
//! ```ignore
//! buf.update_status()?;
//! let avail = buf.data_avail()?;
//! let want = avail.min(ring.free_space()) & !3;
//! buf.read(&mut ring, want)?;
//! buf.reenable_irq()?;
//! ```

pub mod registers;

use embedded_hal::delay::DelayNs;
use log::{debug, trace, warn};

use crate::constants::{
    DEFAULT_BYTES_PER_REGISTER, DEFAULT_HIGH_WATER_MARK, DEFAULT_POLL_DELAY_MS,
    DEFAULT_POLL_RETRIES, MAX_SEGMENTS, WORD_ALIGN,
};
use crate::error::RemoteError;
use crate::port::ControlPort;
use crate::ring::{RingBuffer, Storage};

use self::registers as reg;

/// Largest logical buffer, in bytes, for which index differences stay
/// exact in the signed domain.
const MAX_TOTAL_BYTES: u64 = i32::MAX as u64;

/// Where the host buffer lives and how to talk to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteConfig {
    /// DSP memory address (in words) of the symbol holding the host-buffer
    /// pointer. Resolved by the firmware loader.
    pub root_symbol: Option<u32>,
    /// Register address of DSP memory word 0.
    pub region_base: u32,
    /// Register address step per DSP memory word.
    pub address_scale: u32,
    /// Bytes of audio data per register (word).
    pub bytes_per_register: u32,
    /// Extra polls of the root symbol while the firmware starts up.
    pub poll_retries: u32,
    /// Delay before each extra poll, in milliseconds.
    pub poll_delay_ms: u32,
    /// High-water mark written to the DSP at init, in words.
    pub high_water_mark: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            root_symbol: None,
            region_base: 0,
            address_scale: DEFAULT_BYTES_PER_REGISTER,
            bytes_per_register: DEFAULT_BYTES_PER_REGISTER,
            poll_retries: DEFAULT_POLL_RETRIES,
            poll_delay_ms: DEFAULT_POLL_DELAY_MS,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl RemoteConfig {
    fn validate<E>(&self) -> Result<(), RemoteError<E>> {
        let bpr = self.bytes_per_register as usize;
        if bpr == 0 || WORD_ALIGN % bpr != 0 {
            return Err(RemoteError::BadConfig(
                "bytes_per_register must divide the word alignment",
            ));
        }
        if self.address_scale == 0 {
            return Err(RemoteError::BadConfig("address_scale must be non-zero"));
        }
        Ok(())
    }

    /// Register address of DSP memory word `word`.
    fn to_register(&self, word: u32) -> u32 {
        self.region_base
            .wrapping_add(word.wrapping_mul(self.address_scale))
    }
}

/// One memory region of the logical buffer.
///
/// `start` and `end` are word offsets in the logical buffer, not in the
/// region. A segment with `start == end` is unused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segment {
    /// Register address of the first word.
    pub base: u32,
    pub start: u32,
    pub end: u32,
}

impl Segment {
    /// Length in words.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether logical word `index` lives in this segment.
    pub fn contains(&self, index: u32) -> bool {
        self.start <= index && index < self.end
    }
}

/// Host-side view of the DSP's segmented circular buffer.
///
/// Generic over the [`ControlPort`]. Pass `&mut port` to keep ownership of
/// the port outside the buffer.
pub struct RemoteBuffer<P> {
    port: P,
    config: RemoteConfig,
    /// DSP memory address of the control block, in words.
    host_buffer: u32,
    segments: [Segment; MAX_SEGMENTS],
    /// Logical size in words.
    total_size: u32,
    read_index: u32,
    write_index: u32,
    /// Bytes available as of the last `data_avail()`, less what was read.
    data_available: usize,
    error: u32,
    high_water_mark: u32,
    irq_ack: u32,
    irq_count: u32,
}

impl<P: ControlPort> RemoteBuffer<P> {
    /// Locate the host buffer and read its layout.
    ///
    /// Polls the root symbol until the firmware publishes a non-zero host
    /// buffer address, waiting `poll_delay_ms` between at most
    /// `poll_retries` extra polls. [`RemoteError::NotReady`] means the
    /// firmware has not started streaming yet.
    pub fn init<D: DelayNs>(
        mut port: P,
        delay: &mut D,
        config: RemoteConfig,
    ) -> Result<Self, RemoteError<P::Error>> {
        config.validate::<P::Error>()?;
        let Some(root) = config.root_symbol else {
            return Err(RemoteError::RootUnset);
        };
        let root_addr = config.to_register(root);

        let mut host_buffer = port.read(root_addr).map_err(RemoteError::Port)?;
        let mut polls = 0;
        while host_buffer == 0 {
            if polls == config.poll_retries {
                return Err(RemoteError::NotReady {
                    retries: config.poll_retries,
                });
            }
            polls += 1;
            delay.delay_ms(config.poll_delay_ms);
            host_buffer = port.read(root_addr).map_err(RemoteError::Port)?;
        }
        debug!("host buffer at DSP word {:#x} after {} retries", host_buffer, polls);

        let field = |offset: u32| config.to_register(host_buffer.wrapping_add(offset));

        let mut segments = [Segment::default(); MAX_SEGMENTS];
        let mut start = 0;
        for (seg, &(base_field, end_field)) in segments.iter_mut().zip(reg::SEGMENT_FIELDS.iter()) {
            let end = port.read(field(end_field)).map_err(RemoteError::Port)?;
            if end < start {
                return Err(RemoteError::BadLayout("segment ends before it starts"));
            }
            if (end - start) as u64 * config.bytes_per_register as u64 % WORD_ALIGN as u64 != 0 {
                return Err(RemoteError::BadLayout("segment not a whole number of 4-byte words"));
            }
            let base = if end == start {
                0
            } else {
                let base = port.read(field(base_field)).map_err(RemoteError::Port)?;
                config.to_register(base)
            };
            *seg = Segment { base, start, end };
            start = end;
        }
        let total_size = start;
        if total_size == 0 {
            return Err(RemoteError::BadLayout("host buffer has no segments"));
        }
        if total_size as u64 * config.bytes_per_register as u64 > MAX_TOTAL_BYTES {
            return Err(RemoteError::BadLayout("host buffer too large"));
        }
        debug!("host buffer segments {:?}, {} words", segments, total_size);

        let mut buf = RemoteBuffer {
            port,
            config,
            host_buffer,
            segments,
            total_size,
            read_index: 0,
            write_index: 0,
            data_available: 0,
            error: 0,
            high_water_mark: 0,
            irq_ack: 0,
            irq_count: 0,
        };

        buf.irq_ack = buf.read_field(reg::IRQ_ACK)?;
        let write_index = buf.read_field(reg::NEXT_WRITE_INDEX)?;
        buf.write_index = buf.check_index(write_index)?;
        let read_index = buf.read_field(reg::NEXT_READ_INDEX)?;
        buf.read_index = buf.check_read_index(read_index)?;
        buf.error = buf.read_field(reg::ERROR)?;
        buf.irq_count = buf.read_field(reg::IRQ_COUNT)?;
        buf.write_field(reg::HIGH_WATER_MARK, config.high_water_mark)?;
        buf.high_water_mark = config.high_water_mark;
        Ok(buf)
    }

    /// Give the control port back.
    pub fn release(self) -> P {
        self.port
    }

    // ── Register helpers ───────────────────────────────────────────────

    fn field_addr(&self, offset: u32) -> u32 {
        self.config.to_register(self.host_buffer.wrapping_add(offset))
    }

    fn read_field(&mut self, offset: u32) -> Result<u32, RemoteError<P::Error>> {
        let addr = self.field_addr(offset);
        self.port.read(addr).map_err(RemoteError::Port)
    }

    fn write_field(&mut self, offset: u32, value: u32) -> Result<(), RemoteError<P::Error>> {
        let addr = self.field_addr(offset);
        self.port.write(addr, value).map_err(RemoteError::Port)
    }

    fn check_index(&self, index: u32) -> Result<u32, RemoteError<P::Error>> {
        if index >= self.total_size {
            return Err(RemoteError::BadLayout("index outside the logical buffer"));
        }
        Ok(index)
    }

    /// Block reads move the read index in 4-byte steps, so it must sit on a
    /// 4-byte boundary or it could never cross a segment end.
    fn check_read_index(&self, index: u32) -> Result<u32, RemoteError<P::Error>> {
        let index = self.check_index(index)?;
        if index as usize * self.word_bytes() % WORD_ALIGN != 0 {
            return Err(RemoteError::BadLayout("read index not on a 4-byte boundary"));
        }
        Ok(index)
    }

    fn word_bytes(&self) -> usize {
        self.config.bytes_per_register as usize
    }

    // ── Status ─────────────────────────────────────────────────────────

    /// Refresh both indices and recompute the bytes available to read.
    ///
    /// The result is always smaller than the logical buffer size.
    pub fn data_avail(&mut self) -> Result<usize, RemoteError<P::Error>> {
        let read_index = self.read_field(reg::NEXT_READ_INDEX)?;
        self.read_index = self.check_read_index(read_index)?;
        let write_index = self.read_field(reg::NEXT_WRITE_INDEX)?;
        self.write_index = self.check_index(write_index)?;

        let word = self.word_bytes() as i64;
        let mut avail = (self.write_index as i64 - self.read_index as i64) * word;
        if avail < 0 {
            avail += self.total_size as i64 * word;
        }
        self.data_available = avail as usize;
        trace!(
            "data_avail: write {} read {} -> {} bytes",
            self.write_index,
            self.read_index,
            self.data_available
        );
        Ok(self.data_available)
    }

    /// Refresh irq and error state after the DSP has signalled.
    pub fn update_status(&mut self) -> Result<(), RemoteError<P::Error>> {
        self.irq_ack = self.read_field(reg::IRQ_ACK)?;
        self.error = self.read_field(reg::ERROR)?;
        self.irq_count = self.read_field(reg::IRQ_COUNT)?;
        let read_index = self.read_field(reg::NEXT_READ_INDEX)?;
        self.read_index = self.check_read_index(read_index)?;
        if self.error != 0 {
            warn!("DSP host buffer reports error {:#x}", self.error);
        }
        Ok(())
    }

    /// Acknowledge the DSP interrupt so it can fire again.
    ///
    /// No-op if the current interrupt has already been acknowledged.
    pub fn reenable_irq(&mut self) -> Result<(), RemoteError<P::Error>> {
        self.irq_count = self.read_field(reg::IRQ_COUNT)?;
        if self.irq_count & 1 != 0 {
            return Ok(());
        }
        let ack = self.irq_count | 1;
        self.write_field(reg::IRQ_ACK, ack)?;
        self.irq_ack = ack;
        trace!("irq re-armed, count {}", self.irq_count >> 1);
        Ok(())
    }

    // ── Data transfer ──────────────────────────────────────────────────

    /// Copy up to `len` bytes of audio from the DSP into `dst`.
    ///
    /// `len` must be a whole number of registers and no more than the last
    /// [`data_avail()`](Self::data_avail) reported; otherwise nothing is
    /// touched. Less than `len` is copied when `dst` runs out of room.
    /// Returns the number of bytes copied.
    ///
    /// Every block read is a multiple of 4 bytes. The read index is written
    /// back to the DSP once, after the last block.
    pub fn read<S>(
        &mut self,
        dst: &mut RingBuffer<S>,
        len: usize,
    ) -> Result<usize, RemoteError<P::Error>>
    where
        S: Storage,
    {
        let word = self.word_bytes();
        if len % word != 0 {
            return Err(RemoteError::Misaligned { len, word });
        }
        if len > self.data_available {
            return Err(RemoteError::NotAvailable {
                requested: len,
                available: self.data_available,
            });
        }

        let goal = len.min(dst.free_space());
        let mut done = 0;
        let result = self.copy_blocks(dst, goal, &mut done);
        self.data_available -= done;
        result?;

        if done > 0 {
            self.write_field(reg::NEXT_READ_INDEX, self.read_index)?;
        }
        Ok(done)
    }

    fn copy_blocks<S>(
        &mut self,
        dst: &mut RingBuffer<S>,
        goal: usize,
        done: &mut usize,
    ) -> Result<(), RemoteError<P::Error>>
    where
        S: Storage,
    {
        let word = self.word_bytes();
        while *done < goal {
            let Some(seg) = self.segment_of(self.read_index) else {
                return Err(RemoteError::BadLayout("read index in no segment"));
            };

            let limit = if self.write_index > self.read_index && self.write_index <= seg.end {
                self.write_index
            } else {
                seg.end
            };
            let run = (limit - self.read_index) as usize * word;

            let mut block = dst.next_write_block();
            let mut chunk = run.min(goal - *done).min(block.len());
            chunk -= chunk % WORD_ALIGN;
            if chunk == 0 {
                break;
            }

            let offset = (self.read_index - seg.start).wrapping_mul(self.config.address_scale);
            let addr = seg.base.wrapping_add(offset);
            self.port
                .read_block(addr, &mut block[..chunk])
                .map_err(RemoteError::Port)?;
            block.commit(chunk)?;

            let words = (chunk / word) as u32;
            trace!("read {} words at {:#x} (index {})", words, addr, self.read_index);
            self.read_index = (self.read_index + words) % self.total_size;
            *done += chunk;
        }
        Ok(())
    }

    fn segment_of(&self, index: u32) -> Option<Segment> {
        self.segments.iter().copied().find(|s| s.contains(index))
    }

    // ── Cached state ───────────────────────────────────────────────────

    /// Bytes available as of the last [`data_avail()`](Self::data_avail),
    /// minus what has been read since.
    pub fn data_available(&self) -> usize {
        self.data_available
    }

    /// Last error code reported by the DSP (0 = none).
    pub fn error(&self) -> u32 {
        self.error
    }

    pub fn high_water_mark(&self) -> u32 {
        self.high_water_mark
    }

    pub fn irq_count(&self) -> u32 {
        self.irq_count
    }

    pub fn irq_ack(&self) -> u32 {
        self.irq_ack
    }

    pub fn read_index(&self) -> u32 {
        self.read_index
    }

    pub fn write_index(&self) -> u32 {
        self.write_index
    }

    /// Logical size in words.
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    /// Logical size in bytes.
    pub fn total_bytes(&self) -> usize {
        self.total_size as usize * self.word_bytes()
    }

    pub fn segments(&self) -> &[Segment; MAX_SEGMENTS] {
        &self.segments
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }
}
