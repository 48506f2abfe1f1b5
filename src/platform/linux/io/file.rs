use core::time::Duration;
use std::path::Path;

use crate::{
  asio::{InfiniteAwaiter, Poller, TimedAwaiter},
  buffer::WritableBuffer,
  descriptor::{AsHandle, BorrowedDescriptor, OwnedDescriptor},
  error::Result,
  io::{
    Pollable, StreamRead, StreamWrite,
    fs::{OpenMode, SeekFrom, SeekableFile, SizedFile, SyncFile},
  },
  platform::active::{
    RawHandle, sys_call,
    sys::{Readiness, WritePoller, attempt_when_ready, sys_read, sys_seek, sys_sync, sys_sync_data, sys_truncate, sys_write},
  },
};

use super::path_to_cstring;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
  read: bool,
  write: bool,
  truncate: bool,
  append: bool,
  create: bool,
  mode: libc::mode_t,
  non_blocking: bool,
}

impl Default for OpenOptions {
  fn default() -> Self {
    Self::new()
  }
}

impl OpenOptions {
  /// Nothing enabled, permissions `0o666` before the umask.
  pub fn new() -> Self {
    Self {
      read: false,
      write: false,
      truncate: false,
      append: false,
      create: false,
      mode: 0o666,
      non_blocking: false,
    }
  }

  pub fn read(mut self, read: bool) -> Self {
    self.read = read;
    self
  }

  pub fn write(mut self, write: bool) -> Self {
    self.write = write;
    self
  }

  pub fn read_write(self) -> Self {
    self.read(true).write(true)
  }

  pub fn truncate(mut self, truncate: bool) -> Self {
    self.truncate = truncate;
    self
  }

  pub fn append(mut self, append: bool) -> Self {
    self.append = append;
    self
  }

  pub fn create(mut self, create: bool) -> Self {
    self.create = create;
    self
  }

  pub fn mode(mut self, mode: u32) -> Self {
    self.mode = mode as libc::mode_t;
    self
  }

  pub fn non_blocking(mut self, non_blocking: bool) -> Self {
    self.non_blocking = non_blocking;
    self
  }

  pub fn flags(&self) -> libc::c_int {
    let writes = self.write || self.append;
    let mut flags = match (self.read, writes) {
      (true, true) => libc::O_RDWR,
      (false, true) => libc::O_WRONLY,
      _ => libc::O_RDONLY,
    };

    flags |= libc::O_CLOEXEC;
    if self.truncate {
      flags |= libc::O_TRUNC;
    }
    if self.append {
      flags |= libc::O_APPEND;
    }
    if self.create {
      flags |= libc::O_CREAT;
    }
    if self.non_blocking {
      flags |= libc::O_NONBLOCK;
    }

    flags
  }

  pub fn open(&self, path: impl AsRef<Path>) -> Result<LocalFile> {
    let path = path.as_ref();
    let c_path = path_to_cstring(path)?;
    let flags = self.flags();
    let mode = self.mode as libc::c_uint;

    let handle = sys_call(|| unsafe { libc::open(c_path.as_ptr(), flags, mode) })?;
    tracing::debug!(path = %path.display(), handle, flags, "opened file");

    // Safety: open just returned this handle and nothing else holds it
    Ok(unsafe { LocalFile::from_raw(handle) })
  }
}

impl From<OpenMode> for OpenOptions {
  fn from(mode: OpenMode) -> Self {
    OpenOptions::new()
      .read(mode.reads())
      .write(mode.writes())
      .truncate(mode.truncates())
      .append(mode.appends())
      .create(mode.writes())
  }
}

/// A regular file, or anything else `open` hands back.
#[derive(Debug)]
pub struct LocalFile {
  descriptor: OwnedDescriptor,
  eof: bool,
}

impl LocalFile {
  pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
    OpenOptions::from(mode).open(path)
  }

  /// # Safety
  /// `handle` must be open and owned by nobody else.
  pub unsafe fn from_raw(handle: RawHandle) -> Self {
    Self::from_descriptor(unsafe { OwnedDescriptor::new(handle) })
  }

  pub fn from_descriptor(descriptor: OwnedDescriptor) -> Self {
    Self { descriptor, eof: false }
  }

  pub fn into_descriptor(self) -> OwnedDescriptor {
    self.descriptor
  }

  pub fn borrow(&self) -> BorrowedDescriptor<'_> {
    self.descriptor.borrow()
  }

  /// Set once a read into a non-full buffer returns nothing. Cleared by seeking or a later successful read.
  pub fn eof(&self) -> bool {
    self.eof
  }

  pub fn aread<'a, B: WritableBuffer + ?Sized>(
    &'a mut self,
    buffer: &'a mut B,
  ) -> InfiniteAwaiter<FileReadPoller<'a, B>> {
    self.read_poller(buffer).infinite()
  }

  pub fn aread_timeout<'a, B: WritableBuffer + ?Sized>(
    &'a mut self,
    buffer: &'a mut B,
    timeout: Duration,
  ) -> TimedAwaiter<FileReadPoller<'a, B>> {
    self.read_poller(buffer).timed(timeout)
  }

  pub fn awrite<'a>(&'a mut self, data: &'a [u8]) -> InfiniteAwaiter<WritePoller<'a>> {
    WritePoller::new(self.descriptor.borrow(), data).infinite()
  }

  pub fn awrite_timeout<'a>(&'a mut self, data: &'a [u8], timeout: Duration) -> TimedAwaiter<WritePoller<'a>> {
    WritePoller::new(self.descriptor.borrow(), data).timed(timeout)
  }

  pub fn read_poller<'a, B: WritableBuffer + ?Sized>(&'a mut self, buffer: &'a mut B) -> FileReadPoller<'a, B> {
    FileReadPoller {
      handle: self.descriptor.borrow(),
      buffer,
      eof: &mut self.eof,
    }
  }
}

/// Like [`crate::platform::active::sys::ReadPoller`], but keeps the file's end-of-file flag current.
pub struct FileReadPoller<'a, B: ?Sized> {
  handle: BorrowedDescriptor<'a>,
  buffer: &'a mut B,
  eof: &'a mut bool,
}

fn read_tracking_eof<B: WritableBuffer + ?Sized>(
  handle: BorrowedDescriptor<'_>,
  buffer: &mut B,
  eof: &mut bool,
) -> Result<usize> {
  let requested = buffer.writable_len();
  let read = sys_read(handle, buffer)?;
  *eof = read == 0 && requested != 0;
  Ok(read)
}

impl<B: WritableBuffer + ?Sized> Poller for FileReadPoller<'_, B> {
  type Output = usize;

  fn poll(&mut self) -> Option<Result<usize>> {
    let handle = self.handle;
    attempt_when_ready(Readiness::new(handle).read(), || read_tracking_eof(handle, self.buffer, self.eof))
  }
}

impl AsHandle for LocalFile {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    self.descriptor.borrow()
  }
}

impl Pollable for LocalFile {}

impl StreamRead for LocalFile {
  fn read<B: WritableBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<usize> {
    read_tracking_eof(self.descriptor.borrow(), buffer, &mut self.eof)
  }
}

impl StreamWrite for LocalFile {
  fn write(&mut self, data: &[u8]) -> Result<usize> {
    sys_write(self.descriptor.borrow(), data)
  }
}

impl SeekableFile for LocalFile {
  fn seek(&mut self, seek_from: SeekFrom) -> Result<u64> {
    let position = sys_seek(self.descriptor.borrow(), seek_from)?;
    self.eof = false;
    Ok(position)
  }
}

impl SizedFile for LocalFile {
  fn set_len(&mut self, len: u64) -> Result<()> {
    sys_truncate(self.descriptor.borrow(), len)
  }
}

impl SyncFile for LocalFile {
  fn sync(&mut self) -> Result<()> {
    sys_sync(self.descriptor.borrow())
  }

  fn sync_data(&mut self) -> Result<()> {
    sys_sync_data(self.descriptor.borrow())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    buffer::{DynBuffer, FixedBuffer, ReadableBuffer},
    error::Error,
    testing::TempPath,
  };

  #[test]
  fn write_then_read_back() {
    let temp = TempPath::new("file-round-trip");
    let mut file = LocalFile::open(temp.path(), OpenMode::WriteTruncate).unwrap();
    file.write_all(b"HELLO WORLD").unwrap();
    drop(file);

    let mut file = LocalFile::open(temp.path(), OpenMode::Read).unwrap();
    let mut buffer = FixedBuffer::<64>::new();
    assert_eq!(file.read(&mut buffer).unwrap(), 11);
    assert_eq!(buffer.read_region(), b"HELLO WORLD");
    assert!(!file.eof());
    assert_eq!(file.read(&mut buffer).unwrap(), 0);
    assert!(file.eof());
  }

  #[test]
  fn seek_and_size() {
    let temp = TempPath::new("file-seek");
    let mut file = LocalFile::open(temp.path(), OpenMode::ReadWriteTruncate).unwrap();
    file.write_all(b"0123456789").unwrap();

    assert_eq!(file.position().unwrap(), 10);
    assert_eq!(file.seek_start(2).unwrap(), 2);
    assert_eq!(file.file_size().unwrap(), 10);
    assert_eq!(file.position().unwrap(), 2);
    assert_eq!(file.seek_current(3).unwrap(), 5);
    assert_eq!(file.seek_end(-1).unwrap(), 9);

    let mut buffer = FixedBuffer::<4>::new();
    file.read(&mut buffer).unwrap();
    assert_eq!(buffer.read_region(), b"9");
  }

  #[test]
  fn truncate_and_sync() {
    let temp = TempPath::new("file-truncate");
    let mut file = LocalFile::open(temp.path(), OpenMode::ReadWriteTruncate).unwrap();
    file.write_all(b"some longer content").unwrap();
    file.set_len(4).unwrap();
    file.sync().unwrap();
    file.sync_data().unwrap();
    assert_eq!(file.file_size().unwrap(), 4);

    file.seek_start(0).unwrap();
    let mut buffer = DynBuffer::with_capacity(32);
    file.read(&mut buffer).unwrap();
    assert_eq!(buffer.read_region(), b"some");
  }

  #[test]
  fn append_keeps_existing_content() {
    let temp = TempPath::new("file-append");
    LocalFile::open(temp.path(), OpenMode::WriteTruncate).unwrap().write_all(b"one ").unwrap();
    LocalFile::open(temp.path(), OpenMode::WriteAppend).unwrap().write_all(b"two").unwrap();
    assert_eq!(std::fs::read(temp.path()).unwrap(), b"one two");
  }

  #[test]
  fn read_only_needs_existing_file() {
    let temp = TempPath::new("file-missing");
    let error = LocalFile::open(temp.path(), OpenMode::Read).unwrap_err();
    assert!(matches!(error, Error::Os(ref error) if error.code() == libc::ENOENT));
  }

  #[test]
  fn rejects_interior_nul() {
    assert!(matches!(LocalFile::open("bad\0path", OpenMode::Read), Err(Error::InteriorNul)));
  }

  #[test]
  fn flags_for_modes() {
    assert_eq!(OpenOptions::from(OpenMode::Read).flags(), libc::O_RDONLY | libc::O_CLOEXEC);
    assert_eq!(
      OpenOptions::from(OpenMode::WriteTruncate).flags(),
      libc::O_WRONLY | libc::O_CLOEXEC | libc::O_TRUNC | libc::O_CREAT
    );
    assert_eq!(
      OpenOptions::from(OpenMode::ReadWriteAppend).flags(),
      libc::O_RDWR | libc::O_CLOEXEC | libc::O_APPEND | libc::O_CREAT
    );
    assert_ne!(OpenOptions::new().read(true).non_blocking(true).flags() & libc::O_NONBLOCK, 0);
  }

  #[test]
  fn regular_files_are_always_ready() {
    let temp = TempPath::new("file-ready");
    let file = LocalFile::open(temp.path(), OpenMode::ReadWriteTruncate).unwrap();
    assert!(file.is_readable(None).unwrap());
    assert!(file.is_writable(None).unwrap());
  }

  #[pollster::test]
  async fn awaitable_read_and_write() {
    let temp = TempPath::new("file-async");
    let mut file = OpenOptions::new().read_write().create(true).truncate(true).open(temp.path()).unwrap();
    assert_eq!(file.awrite(b"async").await.unwrap(), 5);
    file.seek_start(0).unwrap();

    let mut buffer = FixedBuffer::<16>::new();
    assert_eq!(file.aread(&mut buffer).await.unwrap(), 5);
    assert_eq!(buffer.read_region(), b"async");
    assert_eq!(file.aread_timeout(&mut buffer, Duration::from_secs(1)).await.unwrap(), 0);
    assert!(file.eof());
  }
}
