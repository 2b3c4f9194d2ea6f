//! Fixed-capacity byte ring buffer over caller-supplied storage.
//!
//! [`RingBuffer`] is the container used wherever data crosses a boundary in
//! the pipeline: DSP → compressed ring → codec → decompressed ring → consumer.
//!
//! The ring tracks a read cursor, a write cursor and the number of bytes
//! held. Full and empty are told apart by the length, not by cursor
//! equality, so the whole capacity is usable.
//!
//! ## Zero-copy access
//!
//! [`next_write_block()`](RingBuffer::next_write_block) and
//! [`next_read_block()`](RingBuffer::next_read_block) hand out the longest
//! contiguous run that can be filled or drained without wrapping. A block
//! borrows the ring and is consumed by its `commit()`, so a view can never
//! be reused after the cursors have moved:
//!
//! ```ignore
//! let mut block = ring.next_write_block();
//! let n = block.len().min(4) & !3;
//! port.read_block(addr, &mut block[..n])?;
//! block.commit(n)?;
//! ```

use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::error::RingError;

/// Backing storage for a [`RingBuffer`].
///
/// Implemented for every type that can be viewed as a mutable byte slice.
pub trait Storage: AsRef<[u8]> + AsMut<[u8]> {}

impl<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized> Storage for T {}

/// Byte ring buffer over storage `S`.
///
/// `S` is anything that derefs to a byte slice: a borrowed `&mut [u8]`, a
/// fixed array, or an owned `Vec<u8>`. The storage is never resized; its
/// length is the capacity.
pub struct RingBuffer<S> {
    storage: S,
    /// Bytes currently held.
    len: usize,
    /// Next byte index to be written.
    write: usize,
    /// Next byte index to be read.
    read: usize,
}

impl<S> RingBuffer<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Create an empty ring over `storage`.
    pub fn new(storage: S) -> Self {
        RingBuffer {
            storage,
            len: 0,
            write: 0,
            read: 0,
        }
    }

    /// Discard all buffered data and rewind both cursors.
    pub fn reset(&mut self) {
        self.len = 0;
        self.write = 0;
        self.read = 0;
    }

    /// Give the backing storage back to the caller.
    pub fn into_inner(self) -> S {
        self.storage
    }

    /// Total number of bytes the ring can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.as_ref().len()
    }

    /// Number of bytes currently buffered.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.len
    }

    /// Number of bytes that can still be written.
    #[inline]
    pub fn free_space(&self) -> usize {
        self.capacity() - self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Length of the contiguous writable run starting at the write cursor.
    fn contiguous_write(&self) -> usize {
        if self.is_full() {
            0
        } else if self.write >= self.read {
            self.capacity() - self.write
        } else {
            self.read - self.write
        }
    }

    /// Length of the contiguous readable run starting at the read cursor.
    fn contiguous_read(&self) -> usize {
        if self.is_empty() {
            0
        } else if self.read < self.write {
            self.write - self.read
        } else {
            self.capacity() - self.read
        }
    }

    /// Borrow the longest contiguous writable run.
    ///
    /// The block is empty when the ring is full. Fill some prefix of it and
    /// call [`WriteBlock::commit()`] with the number of bytes written.
    pub fn next_write_block(&mut self) -> WriteBlock<'_, S> {
        let start = self.write;
        let len = self.contiguous_write();
        WriteBlock {
            ring: self,
            start,
            len,
        }
    }

    /// Borrow the longest contiguous readable run.
    ///
    /// The block is empty when the ring is empty. Consume some prefix of it
    /// and call [`ReadBlock::commit()`] with the number of bytes consumed.
    pub fn next_read_block(&mut self) -> ReadBlock<'_, S> {
        let start = self.read;
        let len = self.contiguous_read();
        ReadBlock {
            ring: self,
            start,
            len,
        }
    }

    /// Commit `n` bytes written at the write cursor.
    ///
    /// Fails without moving the cursor if `n` exceeds the free space or would
    /// run past the physical end of the storage.
    pub fn bytes_written(&mut self, n: usize) -> Result<(), RingError> {
        if n == 0 {
            return Ok(());
        }
        let free = self.free_space();
        if n > free {
            return Err(RingError::NoSpace { requested: n, free });
        }
        let capacity = self.capacity();
        if self.write + n > capacity {
            return Err(RingError::OverCommit {
                requested: n,
                offset: self.write,
                capacity,
            });
        }
        self.write = (self.write + n) % capacity;
        self.len += n;
        Ok(())
    }

    /// Commit `n` bytes consumed at the read cursor.
    ///
    /// Fails without moving the cursor if `n` exceeds the buffered length or
    /// would run past the physical end of the storage.
    pub fn bytes_read(&mut self, n: usize) -> Result<(), RingError> {
        if n == 0 {
            return Ok(());
        }
        if n > self.len {
            return Err(RingError::NoData {
                requested: n,
                available: self.len,
            });
        }
        let capacity = self.capacity();
        if self.read + n > capacity {
            return Err(RingError::OverCommit {
                requested: n,
                offset: self.read,
                capacity,
            });
        }
        self.read = (self.read + n) % capacity;
        self.len -= n;
        Ok(())
    }

    /// Copy `dest.len()` bytes out of the ring, oldest first.
    ///
    /// All-or-nothing: if fewer bytes are buffered the ring is left untouched.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<(), RingError> {
        if dest.len() > self.len {
            return Err(RingError::NoData {
                requested: dest.len(),
                available: self.len,
            });
        }
        let mut done = 0;
        while done < dest.len() {
            let block = self.next_read_block();
            let n = block.len().min(dest.len() - done);
            dest[done..done + n].copy_from_slice(&block[..n]);
            block.commit(n)?;
            done += n;
        }
        Ok(())
    }

    /// Copy all of `src` into the ring.
    ///
    /// All-or-nothing: if there is not enough free space the ring is left
    /// untouched.
    pub fn write(&mut self, src: &[u8]) -> Result<(), RingError> {
        let free = self.free_space();
        if src.len() > free {
            return Err(RingError::NoSpace {
                requested: src.len(),
                free,
            });
        }
        let mut done = 0;
        while done < src.len() {
            let mut block = self.next_write_block();
            let n = block.len().min(src.len() - done);
            block[..n].copy_from_slice(&src[done..done + n]);
            block.commit(n)?;
            done += n;
        }
        Ok(())
    }

    /// Copy the oldest `dest.len()` bytes without consuming them.
    pub fn peek(&self, dest: &mut [u8]) -> Result<(), RingError> {
        if dest.len() > self.len {
            return Err(RingError::NoData {
                requested: dest.len(),
                available: self.len,
            });
        }
        let buf = self.storage.as_ref();
        let first = dest.len().min(self.capacity() - self.read);
        dest[..first].copy_from_slice(&buf[self.read..self.read + first]);
        let rest = dest.len() - first;
        dest[first..].copy_from_slice(&buf[..rest]);
        Ok(())
    }
}

impl<S> fmt::Debug for RingBuffer<S>
where
    S: AsRef<[u8]>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.storage.as_ref().len())
            .field("len", &self.len)
            .field("write", &self.write)
            .field("read", &self.read)
            .finish()
    }
}

// ── Block views ────────────────────────────────────────────────────────────

/// Contiguous writable region of a [`RingBuffer`].
///
/// Derefs to the writable bytes. Dropping the block without committing
/// leaves the ring unchanged.
pub struct WriteBlock<'r, S> {
    ring: &'r mut RingBuffer<S>,
    start: usize,
    len: usize,
}

impl<S> WriteBlock<'_, S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Commit the first `n` bytes of this block as written.
    pub fn commit(self, n: usize) -> Result<(), RingError> {
        if n > self.len {
            return Err(RingError::OverCommit {
                requested: n,
                offset: self.start,
                capacity: self.start + self.len,
            });
        }
        self.ring.bytes_written(n)
    }
}

impl<S> Deref for WriteBlock<'_, S>
where
    S: AsRef<[u8]>,
{
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.ring.storage.as_ref()[self.start..self.start + self.len]
    }
}

impl<S> DerefMut for WriteBlock<'_, S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.ring.storage.as_mut()[self.start..self.start + self.len]
    }
}

/// Contiguous readable region of a [`RingBuffer`].
///
/// Derefs to the readable bytes. Dropping the block without committing
/// leaves the ring unchanged.
pub struct ReadBlock<'r, S> {
    ring: &'r mut RingBuffer<S>,
    start: usize,
    len: usize,
}

impl<S> ReadBlock<'_, S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Commit the first `n` bytes of this block as consumed.
    pub fn commit(self, n: usize) -> Result<(), RingError> {
        if n > self.len {
            return Err(RingError::OverCommit {
                requested: n,
                offset: self.start,
                capacity: self.start + self.len,
            });
        }
        self.ring.bytes_read(n)
    }
}

impl<S> Deref for ReadBlock<'_, S>
where
    S: AsRef<[u8]>,
{
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.ring.storage.as_ref()[self.start..self.start + self.len]
    }
}
