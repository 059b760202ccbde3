//! Growable byte buffer with an explicit write cursor.
//!
//! The same buffer is reused across many send/receive cycles: callers
//! [`ByteBuffer::rewind`] it instead of allocating a new one. Storage only
//! ever grows, in whole [`GROW_CHUNK`] steps.

/// Initial capacity of a new buffer.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Growth granularity in bytes.
pub const GROW_CHUNK: usize = 1024;

/// A byte container with a write cursor.
///
/// Bytes in `[0, position)` are the buffer's content. `position` never
/// exceeds `capacity`.
#[derive(Debug, Clone)]
pub struct ByteBuffer {
    data: Vec<u8>,
    position: usize,
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteBuffer {
    /// Create an empty buffer with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            data: vec![0u8; capacity],
            position: 0,
        }
    }

    /// Current write cursor.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whether no bytes have been written since the last rewind.
    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Reset the cursor to zero. Storage is kept.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Move the cursor, clamped to the capacity.
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    /// Append a single byte.
    pub fn append(&mut self, value: u8) {
        self.reserve(1);
        self.data[self.position] = value;
        self.position += 1;
    }

    /// Append `length` bytes of `value` starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + length` is out of bounds for `value`.
    pub fn append_range(&mut self, value: &[u8], offset: usize, length: usize) {
        self.append_slice(&value[offset..offset + length]);
    }

    /// Append all of `value`.
    pub fn append_slice(&mut self, value: &[u8]) {
        self.reserve(value.len());
        let end = self.position + value.len();
        self.data[self.position..end].copy_from_slice(value);
        self.position = end;
    }

    /// Append a big-endian `u16`.
    pub fn append_u16_be(&mut self, value: u16) {
        self.append_slice(&value.to_be_bytes());
    }

    /// The written content, `[0, position)`.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.position]
    }

    /// A sub-range of the written content, or `None` if it reaches past the cursor.
    pub fn slice(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let end = offset.checked_add(length)?;
        if end > self.position {
            return None;
        }
        Some(&self.data[offset..end])
    }

    fn reserve(&mut self, additional: usize) {
        let needed_end = self.position + additional;
        if needed_end <= self.data.len() {
            return;
        }
        let overflow = needed_end - self.data.len();
        let new_capacity = self.data.len() + overflow.div_ceil(GROW_CHUNK) * GROW_CHUNK;
        // resize keeps [0, len) intact, so [0, position) survives the grow.
        self.data.resize(new_capacity, 0);
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
