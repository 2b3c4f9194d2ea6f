/// Alignment of every block transfer from the DSP, in bytes.
///
/// Partial words are never read; doing so would desynchronize the
/// word-granular read index on the DSP side.
pub const WORD_ALIGN: usize = 4;

/// Number of memory segments making up the DSP's logical buffer.
pub const MAX_SEGMENTS: usize = 3;

/// Default size of one control-port register, in bytes.
pub const DEFAULT_BYTES_PER_REGISTER: u32 = 4;

/// Default high-water mark written to the DSP at init, in words.
pub const DEFAULT_HIGH_WATER_MARK: u32 = 512;

/// Default number of polls for the host buffer address after boot.
pub const DEFAULT_POLL_RETRIES: u32 = 5;

/// Default delay between host buffer address polls, in milliseconds.
pub const DEFAULT_POLL_DELAY_MS: u32 = 10;

/// Default capacity of the compressed ring, in bytes.
pub const DEFAULT_COMPRESSED_CAPACITY: usize = 4096;

/// Default capacity of the decompressed ring, in bytes.
pub const DEFAULT_DECOMPRESSED_CAPACITY: usize = 8192;
