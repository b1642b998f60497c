//! Double-buffered input window.
//!
//! Two fixed-capacity regions are alternated: when the active region is
//! exhausted while a token is still open, the unconsumed token prefix is
//! copied to the front of the inactive region, new bytes are appended after
//! it, and scanning resumes there. A token may straddle arbitrarily many
//! refills as long as it fits within a single region; a carried prefix that
//! fills a whole region is reported as [`Refill::Overflow`] rather than
//! silently truncated.

use std::io;

use log::trace;

use crate::source::ByteSource;

/// Outcome of a refill attempt.
pub(crate) enum Refill {
    /// The regions were swapped and new data is available. A token that
    /// began at `keep_from` now begins at offset 0, with the cursor on the
    /// first new byte.
    Filled,
    /// The source is exhausted.
    Eof,
    /// The carried prefix fills an entire region; the in-progress token
    /// cannot fit.
    Overflow,
}

pub(crate) struct DoubleBuffer {
    regions: [Vec<u8>; 2],
    active: usize,
    /// Valid bytes in the active region (carried prefix plus last read).
    len: usize,
    /// Scan cursor within the active region.
    pos: usize,
    /// Bytes carried into the active region at the last swap.
    carried: usize,
    /// Bytes consumed from the source before the most recent read,
    /// including the base offset passed to [`DoubleBuffer::prime`].
    read_before: u64,
    /// Bytes delivered by the most recent read.
    last_read: usize,
}

impl DoubleBuffer {
    pub fn new(capacity: usize) -> Self {
        DoubleBuffer {
            regions: [vec![0; capacity], vec![0; capacity]],
            active: 0,
            len: 0,
            pos: 0,
            carried: 0,
            read_before: 0,
            last_read: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.regions[0].len()
    }

    /// Discards both regions and fills the first one from `source`, which
    /// must already be positioned at absolute offset `base_offset`.
    pub fn prime<S: ByteSource>(&mut self, source: &mut S, base_offset: u64) -> io::Result<()> {
        self.active = 0;
        self.pos = 0;
        self.carried = 0;
        self.read_before = base_offset;
        self.last_read = source.read(&mut self.regions[0])?;
        self.len = self.last_read;
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.regions[self.active][..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    /// Absolute byte offset of the scan cursor in the source stream.
    pub fn absolute_pos(&self) -> u64 {
        self.read_before + self.pos as u64 - self.carried as u64
    }

    /// Swaps regions, carrying `[keep_from, len)` of the active region to
    /// the front of the inactive one, then fills the remainder from
    /// `source`. The cursor is left on the first new byte.
    pub fn refill<S: ByteSource>(
        &mut self,
        source: &mut S,
        keep_from: Option<usize>,
    ) -> io::Result<Refill> {
        let start = keep_from.unwrap_or(self.len);
        let carried = self.len - start;
        if carried >= self.capacity() {
            return Ok(Refill::Overflow);
        }

        let (left, right) = self.regions.split_at_mut(1);
        let (src_region, dst_region) = if self.active == 0 {
            (&left[0], &mut right[0])
        } else {
            (&right[0], &mut left[0])
        };
        dst_region[..carried].copy_from_slice(&src_region[start..start + carried]);

        let n = source.read(&mut dst_region[carried..])?;
        if n == 0 {
            return Ok(Refill::Eof);
        }
        trace!("buffer swap: carried {} bytes, read {}", carried, n);

        self.read_before += self.last_read as u64;
        self.active ^= 1;
        self.carried = carried;
        self.last_read = n;
        self.len = carried + n;
        self.pos = carried;
        Ok(Refill::Filled)
    }
}
