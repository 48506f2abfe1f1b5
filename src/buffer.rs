//! Byte buffers with separate read and write cursors.
//!
//! Readers fill a buffer through [`WritableBuffer::write_region`] and hand the consumed bytes back through
//! [`ReadableBuffer::mark_read`]. Both regions are always single contiguous slices, so a syscall can write
//! straight into the buffer without an intermediate copy.

/// A buffer that can accept bytes at its write cursor.
pub trait WritableBuffer {
  /// The contiguous writable bytes. Empty when the buffer is full.
  fn write_region(&mut self) -> &mut [u8];

  /// Advances the write cursor by at most `n` bytes, returning the actual advance.
  fn mark_written(&mut self, n: usize) -> usize;

  fn writable_len(&self) -> usize;

  fn is_writable(&self) -> bool {
    self.writable_len() != 0
  }
}

/// A buffer that can hand out the bytes between its read and write cursors.
pub trait ReadableBuffer {
  /// The contiguous readable bytes. Empty when nothing has been written.
  fn read_region(&self) -> &[u8];

  /// Advances the read cursor by at most `n` bytes, returning the actual advance.
  fn mark_read(&mut self, n: usize) -> usize;

  /// Discards everything unread and rewinds both cursors.
  fn clear(&mut self);

  fn readable_len(&self) -> usize {
    self.read_region().len()
  }

  fn is_readable(&self) -> bool {
    self.readable_len() != 0
  }
}

pub trait RwBuffer: ReadableBuffer + WritableBuffer {}
impl<B: ReadableBuffer + WritableBuffer + ?Sized> RwBuffer for B {}

impl<B: WritableBuffer + ?Sized> WritableBuffer for &mut B {
  fn write_region(&mut self) -> &mut [u8] {
    B::write_region(self)
  }

  fn mark_written(&mut self, n: usize) -> usize {
    B::mark_written(self, n)
  }

  fn writable_len(&self) -> usize {
    B::writable_len(self)
  }
}

impl<B: ReadableBuffer + ?Sized> ReadableBuffer for &mut B {
  fn read_region(&self) -> &[u8] {
    B::read_region(self)
  }

  fn mark_read(&mut self, n: usize) -> usize {
    B::mark_read(self, n)
  }

  fn clear(&mut self) {
    B::clear(self)
  }
}

/// Fixed-capacity buffer whose cursors only rewind once both of them reach the end.
///
/// Invariant: `read <= write <= capacity`. Reads never cross the end of storage, which keeps both regions
/// contiguous; in exchange the space in front of the read cursor is only reclaimed when the buffer drains at
/// capacity (or on [`CircularBuffer::reset`]).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CircularBuffer<S> {
  read: usize,
  write: usize,
  storage: S,
}

pub type FixedBuffer<const CAPACITY: usize> = CircularBuffer<[u8; CAPACITY]>;
pub type DynBuffer = CircularBuffer<Box<[u8]>>;

impl<const CAPACITY: usize> FixedBuffer<CAPACITY> {
  pub const fn new() -> Self {
    Self {
      read: 0,
      write: 0,
      storage: [0; CAPACITY],
    }
  }
}

impl<const CAPACITY: usize> Default for FixedBuffer<CAPACITY> {
  fn default() -> Self {
    Self::new()
  }
}

impl DynBuffer {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      read: 0,
      write: 0,
      storage: vec![0; capacity].into_boxed_slice(),
    }
  }
}

impl<S: AsRef<[u8]>> CircularBuffer<S> {
  pub fn capacity(&self) -> usize {
    self.storage.as_ref().len()
  }

  pub fn read_cursor(&self) -> usize {
    self.read
  }

  pub fn write_cursor(&self) -> usize {
    self.write
  }

  pub fn is_full(&self) -> bool {
    self.write == self.capacity()
  }

  pub fn is_empty(&self) -> bool {
    self.read == self.write
  }

  /// Rewinds both cursors, discarding anything unread.
  pub fn reset(&mut self) {
    self.read = 0;
    self.write = 0;
  }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> CircularBuffer<S> {
  /// Copies as much of `data` as fits into the writable region.
  pub fn push_slice(&mut self, data: &[u8]) -> usize {
    let region = self.write_region();
    let count = region.len().min(data.len());
    region[..count].copy_from_slice(&data[..count]);
    self.mark_written(count)
  }

  /// Copies readable bytes into `out` and consumes them.
  pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
    let region = self.read_region();
    let count = region.len().min(out.len());
    out[..count].copy_from_slice(&region[..count]);
    self.mark_read(count)
  }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> WritableBuffer for CircularBuffer<S> {
  fn write_region(&mut self) -> &mut [u8] {
    let write = self.write;
    &mut self.storage.as_mut()[write..]
  }

  fn mark_written(&mut self, n: usize) -> usize {
    let previous = self.write;
    self.write = previous.saturating_add(n).min(self.capacity());
    self.write - previous
  }

  fn writable_len(&self) -> usize {
    self.capacity() - self.write
  }
}

impl<S: AsRef<[u8]>> ReadableBuffer for CircularBuffer<S> {
  fn read_region(&self) -> &[u8] {
    &self.storage.as_ref()[self.read..self.write]
  }

  fn mark_read(&mut self, n: usize) -> usize {
    let previous = self.read;
    self.read = previous.saturating_add(n).min(self.write);
    let advanced = self.read - previous;

    if self.read == self.capacity() && self.write == self.capacity() {
      self.reset();
    }

    advanced
  }

  fn clear(&mut self) {
    self.reset();
  }

  fn readable_len(&self) -> usize {
    self.write - self.read
  }
}

impl<S: AsRef<[u8]>> core::fmt::Debug for CircularBuffer<S> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("CircularBuffer")
      .field("read", &self.read)
      .field("write", &self.write)
      .field("capacity", &self.capacity())
      .finish()
  }
}

/// Heap buffer that grows on request and never wraps. The owner decides when to [`GrowableBuffer::reset`] it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrowableBuffer {
  read: usize,
  write: usize,
  storage: Vec<u8>,
}

impl GrowableBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      read: 0,
      write: 0,
      storage: vec![0; capacity],
    }
  }

  pub fn capacity(&self) -> usize {
    self.storage.len()
  }

  /// Ensures at least `additional` writable bytes, growing the storage at least geometrically.
  pub fn reserve(&mut self, additional: usize) {
    if self.writable_len() >= additional {
      return;
    }

    let required = self.write.saturating_add(additional);
    let new_capacity = required.max(self.capacity().saturating_mul(2));
    self.storage.resize(new_capacity, 0);
  }

  pub fn reset(&mut self) {
    self.read = 0;
    self.write = 0;
  }

  /// Copies `data` in, growing as needed.
  pub fn extend_from_slice(&mut self, data: &[u8]) {
    self.reserve(data.len());
    self.write_region()[..data.len()].copy_from_slice(data);
    self.mark_written(data.len());
  }

  pub fn into_vec(mut self) -> Vec<u8> {
    self.storage.truncate(self.write);
    self.storage.drain(..self.read);
    self.storage
  }
}

impl WritableBuffer for GrowableBuffer {
  fn write_region(&mut self) -> &mut [u8] {
    &mut self.storage[self.write..]
  }

  fn mark_written(&mut self, n: usize) -> usize {
    let previous = self.write;
    self.write = previous.saturating_add(n).min(self.storage.len());
    self.write - previous
  }

  fn writable_len(&self) -> usize {
    self.storage.len() - self.write
  }
}

impl ReadableBuffer for GrowableBuffer {
  fn read_region(&self) -> &[u8] {
    &self.storage[self.read..self.write]
  }

  fn mark_read(&mut self, n: usize) -> usize {
    let previous = self.read;
    self.read = previous.saturating_add(n).min(self.write);
    self.read - previous
  }

  fn clear(&mut self) {
    self.reset();
  }
}
