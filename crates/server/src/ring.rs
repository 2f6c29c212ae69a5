// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Fixed-capacity circular byte buffer holding the most recent PTY output.
///
/// Tracks the total number of bytes ever written so consumers can reason
/// about global byte offsets. When the buffer wraps, older data is silently
/// discarded. Capacity is derived from the terminal geometry so a replay
/// burst covers the visible screen plus a scrollback window.
#[derive(Debug)]
pub struct ReplayBuffer {
    buf: Vec<u8>,
    capacity: usize,
    write_pos: usize,
    /// Bytes currently retained (≤ capacity).
    filled: usize,
    total_written: u64,
}

/// Rows of scrollback retained per screen of terminal geometry.
const SCROLLBACK_FACTOR: usize = 8;

/// Replay capacity floor so tiny terminals still get a useful window.
const MIN_CAPACITY: usize = 64 * 1024;

impl ReplayBuffer {
    /// Create a new buffer with an explicit capacity in bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            capacity,
            write_pos: 0,
            filled: 0,
            total_written: 0,
        }
    }

    /// Create a buffer sized for the given terminal geometry.
    pub fn for_geometry(cols: u16, rows: u16) -> Self {
        Self::new(Self::capacity_for(cols, rows))
    }

    fn capacity_for(cols: u16, rows: u16) -> usize {
        (cols as usize * rows as usize * SCROLLBACK_FACTOR).max(MIN_CAPACITY)
    }

    /// Append data into the circular buffer.
    pub fn write(&mut self, data: &[u8]) {
        for chunk in data.chunks(self.capacity) {
            let start = self.write_pos;
            let end = start + chunk.len();

            if end <= self.capacity {
                self.buf[start..end].copy_from_slice(chunk);
            } else {
                let first = self.capacity - start;
                self.buf[start..self.capacity].copy_from_slice(&chunk[..first]);
                self.buf[..chunk.len() - first].copy_from_slice(&chunk[first..]);
            }

            self.write_pos = end % self.capacity;
            self.filled = (self.filled + chunk.len()).min(self.capacity);
            self.total_written += chunk.len() as u64;
        }
    }

    /// Copy out everything currently retained, oldest byte first.
    pub fn latest(&self) -> Vec<u8> {
        if self.filled == 0 {
            return Vec::new();
        }

        let start = if self.write_pos >= self.filled {
            self.write_pos - self.filled
        } else {
            self.capacity - (self.filled - self.write_pos)
        };

        if start + self.filled <= self.capacity {
            self.buf[start..start + self.filled].to_vec()
        } else {
            let mut out = self.buf[start..self.capacity].to_vec();
            out.extend_from_slice(&self.buf[..self.filled - (self.capacity - start)]);
            out
        }
    }

    /// Discard all retained data and reset the global offset to zero.
    ///
    /// Used on session restart: subscribers are told to clear their display,
    /// so stale bytes must never leak into the next replay burst.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.filled = 0;
        self.total_written = 0;
    }

    /// Re-size the buffer for a new terminal geometry, keeping as much of
    /// the most recent data as the new capacity allows.
    pub fn reframe(&mut self, cols: u16, rows: u16) {
        let new_capacity = Self::capacity_for(cols, rows);
        if new_capacity == self.capacity {
            return;
        }

        let mut kept = self.latest();
        if kept.len() > new_capacity {
            kept.drain(..kept.len() - new_capacity);
        }

        let total = self.total_written;
        self.buf = vec![0u8; new_capacity];
        self.capacity = new_capacity;
        self.write_pos = kept.len() % new_capacity;
        self.filled = kept.len();
        self.buf[..kept.len()].copy_from_slice(&kept);
        // The global offset stays monotonic across reframes.
        self.total_written = total;
    }

    /// Total bytes ever written through this buffer.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
