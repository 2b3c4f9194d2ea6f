//! Shared mocks for unit and pipeline tests.
//!
//! [`MockDsp`] models the DSP side of the control port: a register file for
//! the host-buffer control block plus a flat byte memory serving block reads.
//! Every access is logged so tests can assert on the exact bus traffic.

use alloc::collections::BTreeMap;
use core::cell::RefCell;
use alloc::vec;
use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::codec::{Decoded, FrameDecoder};
use crate::error::CorruptFrame;
use crate::port::ControlPort;
use crate::remote::{registers as reg, RemoteConfig};

/// DSP word address of the root symbol.
pub(crate) const ROOT_SYMBOL: u32 = 0x10;

/// DSP word address of the host-buffer control block.
pub(crate) const HOST_BUFFER: u32 = 0x100;

/// DSP word addresses of the three segments.
pub(crate) const SEGMENT_BASES: [u32; 3] = [0x1000, 0x2000, 0x3000];

/// Size of the mock data memory in bytes.
const MEMORY_SIZE: usize = 0x1_0000;

pub(crate) fn config() -> RemoteConfig {
    RemoteConfig {
        root_symbol: Some(ROOT_SYMBOL),
        region_base: 0,
        address_scale: 4,
        bytes_per_register: 4,
        ..RemoteConfig::default()
    }
}

/// Register address of a control-block field.
pub(crate) fn field(offset: u32) -> u32 {
    (HOST_BUFFER + offset) * 4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockError;

pub(crate) struct MockDsp {
    regs: BTreeMap<u32, u32>,
    pub memory: Vec<u8>,
    /// Segment end offsets in words, as published to the host.
    ends: [u32; 3],
    /// Number of root reads that still return zero.
    pub root_zero_reads: u32,
    /// Successful block reads allowed before every further one fails.
    pub fail_block_after: Option<usize>,
    /// Fail every access.
    pub fail_all: bool,
    pub reads: Vec<u32>,
    pub writes: Vec<(u32, u32)>,
    pub block_reads: Vec<(u32, usize)>,
}

impl MockDsp {
    /// A DSP with the given segment end offsets (in words). The data memory
    /// holds `addr as u8` at every byte address.
    pub(crate) fn with_segments(ends: [u32; 3]) -> Self {
        let mut dsp = MockDsp {
            regs: BTreeMap::new(),
            memory: (0..MEMORY_SIZE).map(|i| i as u8).collect(),
            ends,
            root_zero_reads: 0,
            fail_block_after: None,
            fail_all: false,
            reads: Vec::new(),
            writes: Vec::new(),
            block_reads: Vec::new(),
        };
        dsp.regs.insert(ROOT_SYMBOL * 4, HOST_BUFFER);
        for (i, &(base, end)) in reg::SEGMENT_FIELDS.iter().enumerate() {
            dsp.set_field(base, SEGMENT_BASES[i]);
            dsp.set_field(end, ends[i]);
        }
        dsp.set_field(reg::NEXT_WRITE_INDEX, 0);
        dsp.set_field(reg::NEXT_READ_INDEX, 0);
        dsp
    }

    pub(crate) fn set_field(&mut self, offset: u32, value: u32) {
        self.regs.insert(field(offset), value);
    }

    pub(crate) fn field_value(&self, offset: u32) -> u32 {
        self.regs.get(&field(offset)).copied().unwrap_or(0)
    }

    /// Values written to a control-block field, in order.
    pub(crate) fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(addr, _)| *addr == field(offset))
            .map(|&(_, v)| v)
            .collect()
    }

    pub(crate) fn was_read(&self, offset: u32) -> bool {
        self.reads.contains(&field(offset))
    }

    /// Byte address of logical word `index`.
    pub(crate) fn logical_addr(&self, index: u32) -> u32 {
        let mut start = 0;
        for (i, &end) in self.ends.iter().enumerate() {
            if index < end {
                return (SEGMENT_BASES[i] + index - start) * 4;
            }
            start = end;
        }
        panic!("word {index} outside logical buffer");
    }

    /// Store `bytes` at logical word `index`, wrapping at the total size,
    /// as the DSP would when producing data.
    pub(crate) fn produce(&mut self, index: u32, bytes: &[u8]) -> u32 {
        assert_eq!(bytes.len() % 4, 0);
        let total = self.ends[2];
        let mut index = index;
        for word in bytes.chunks(4) {
            let addr = self.logical_addr(index) as usize;
            self.memory[addr..addr + 4].copy_from_slice(word);
            index = (index + 1) % total;
        }
        index
    }
}

impl ControlPort for MockDsp {
    type Error = MockError;

    fn read(&mut self, addr: u32) -> Result<u32, Self::Error> {
        if self.fail_all {
            return Err(MockError);
        }
        self.reads.push(addr);
        if addr == ROOT_SYMBOL * 4 && self.root_zero_reads > 0 {
            self.root_zero_reads -= 1;
            return Ok(0);
        }
        Ok(self.regs.get(&addr).copied().unwrap_or(0))
    }

    fn write(&mut self, addr: u32, value: u32) -> Result<(), Self::Error> {
        if self.fail_all {
            return Err(MockError);
        }
        self.writes.push((addr, value));
        self.regs.insert(addr, value);
        Ok(())
    }

    fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        if self.fail_all {
            return Err(MockError);
        }
        if let Some(limit) = self.fail_block_after {
            if self.block_reads.len() >= limit {
                return Err(MockError);
            }
        }
        self.block_reads.push((addr, buf.len()));
        let start = addr as usize;
        buf.copy_from_slice(&self.memory[start..start + buf.len()]);
        Ok(())
    }
}

/// Shared handle, so a test can keep producing data while a stream owns
/// the port.
impl ControlPort for &RefCell<MockDsp> {
    type Error = MockError;

    fn read(&mut self, addr: u32) -> Result<u32, Self::Error> {
        self.borrow_mut().read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) -> Result<(), Self::Error> {
        self.borrow_mut().write(addr, value)
    }

    fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.borrow_mut().read_block(addr, buf)
    }
}

/// Delay provider that only records what was asked of it.
#[derive(Default)]
pub(crate) struct MockDelay {
    pub calls: u32,
    pub total_ms: u32,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ms += ms;
    }
}

// ── Fake sub-band decoder ──────────────────────────────────────────────────

/// First byte of every fake encoded frame.
pub(crate) const FAKE_SYNC: u8 = 0xAD;

/// Stand-in for the sub-band decoder.
///
/// A frame is `FAKE_SYNC` followed by `frame_len - 1` payload bytes; each
/// payload byte is emitted twice. A frame not starting with the sync byte is
/// reported as corrupt.
pub(crate) struct FakeDecoder {
    pub frame_len: usize,
    pub decode_calls: usize,
    pub resets: usize,
}

impl FakeDecoder {
    pub(crate) fn new(frame_len: usize) -> Self {
        FakeDecoder {
            frame_len,
            decode_calls: 0,
            resets: 0,
        }
    }

    /// Encode `payload` (a multiple of `frame_len - 1` bytes) into frames.
    pub(crate) fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in payload.chunks(self.frame_len - 1) {
            out.push(FAKE_SYNC);
            out.extend_from_slice(chunk);
        }
        out
    }
}

impl FrameDecoder for FakeDecoder {
    fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<Decoded, CorruptFrame> {
        self.decode_calls += 1;
        let produced = 2 * (self.frame_len - 1);
        if input.len() < self.frame_len || input[0] != FAKE_SYNC || output.len() < produced {
            return Err(CorruptFrame);
        }
        for (i, &b) in input[1..self.frame_len].iter().enumerate() {
            output[2 * i] = b;
            output[2 * i + 1] = b;
        }
        Ok(Decoded {
            consumed: self.frame_len,
            produced,
        })
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

/// Pack `data` (a multiple of 6 bytes) into 8-byte little-endian packed16
/// units, the layout the DSP produces. Padding bytes are `0xEE`.
pub(crate) fn pack16_le(data: &[u8]) -> Vec<u8> {
    assert_eq!(data.len() % 6, 0);
    let mut out = Vec::with_capacity(data.len() / 6 * 8);
    for d in data.chunks(6) {
        out.extend_from_slice(&[0xEE, d[2], d[1], d[0], 0xEE, d[5], d[4], d[3]]);
    }
    out
}

/// Sequential test payload.
pub(crate) fn ramp(len: usize) -> Vec<u8> {
    let mut v = vec![0u8; len];
    for (i, b) in v.iter_mut().enumerate() {
        *b = (i * 7 + 3) as u8;
    }
    v
}
