//! Host-buffer control block layout.
//!
//! The DSP firmware exports a root symbol whose register holds the DSP
//! memory address (in words) of the host-buffer control block. The block is
//! a sequence of 32-bit fields; the constants below are their offsets in
//! registers from the start of the block.

// Fields past `ERROR` (oldest block, rewind, statistics) are firmware
// bookkeeping the host never touches.

// ── Segment layout ─────────────────────────────────────────────────────────

/// Base of segment 1, in DSP memory words.
pub const BUF1_BASE: u32 = 0;

/// End offset of segment 1 in the logical buffer, in words.
pub const BUF1_SIZE: u32 = 1;

/// Base of segment 2, in DSP memory words.
pub const BUF2_BASE: u32 = 2;

/// End offset of segment 2 (segment 1 + segment 2), in words.
pub const BUF1_BUF2_SIZE: u32 = 3;

/// Base of segment 3, in DSP memory words.
pub const BUF3_BASE: u32 = 4;

/// End offset of segment 3, i.e. the total logical size, in words.
pub const BUF_TOTAL_SIZE: u32 = 5;

/// `(base, end offset)` field pairs, in segment order.
pub const SEGMENT_FIELDS: [(u32, u32); 3] = [
    (BUF1_BASE, BUF1_SIZE),
    (BUF2_BASE, BUF1_BUF2_SIZE),
    (BUF3_BASE, BUF_TOTAL_SIZE),
];

// ── Interrupt and index state ──────────────────────────────────────────────

/// Fill level (in words) at which the DSP raises its interrupt.
pub const HIGH_WATER_MARK: u32 = 6;

/// Interrupt counter.
/// - Bits 31:1: number of interrupts raised
/// - Bit 0: set once the host has acknowledged
pub const IRQ_COUNT: u32 = 7;

/// Host acknowledgement. Writing `irq_count | 1` re-arms the interrupt.
pub const IRQ_ACK: u32 = 8;

/// Word index of the next word the DSP will write.
pub const NEXT_WRITE_INDEX: u32 = 9;

/// Word index of the next word the host will read.
pub const NEXT_READ_INDEX: u32 = 10;

/// Non-zero when the DSP has hit an error (e.g. overflow).
pub const ERROR: u32 = 11;
