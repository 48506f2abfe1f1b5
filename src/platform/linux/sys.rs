use core::time::Duration;

use crate::{
  asio::{Poller, retry_on_would_block},
  buffer::WritableBuffer,
  descriptor::BorrowedDescriptor,
  error::{OsError, Result},
  io::fs::SeekFrom,
};

use super::{RawHandle, sys_call, sys_call_void};

pub fn sys_read<B: WritableBuffer + ?Sized>(handle: BorrowedDescriptor<'_>, buffer: &mut B) -> Result<usize> {
  let region = buffer.write_region();
  let read = sys_call(|| unsafe { libc::read(handle.raw(), region.as_mut_ptr().cast(), region.len()) })?;
  Ok(buffer.mark_written(read as usize))
}

pub fn sys_write(handle: BorrowedDescriptor<'_>, data: &[u8]) -> Result<usize> {
  let written = sys_call(|| unsafe { libc::write(handle.raw(), data.as_ptr().cast(), data.len()) })?;
  Ok(written as usize)
}

pub fn sys_seek(handle: BorrowedDescriptor<'_>, seek_from: SeekFrom) -> Result<u64> {
  let (offset, whence) = match seek_from {
    SeekFrom::Start(offset) => (offset as libc::off_t, libc::SEEK_SET),
    SeekFrom::Current(offset) => (offset, libc::SEEK_CUR),
    SeekFrom::End(offset) => (offset, libc::SEEK_END),
  };

  let position = sys_call(|| unsafe { libc::lseek(handle.raw(), offset, whence) })?;
  Ok(position as u64)
}

pub fn sys_truncate(handle: BorrowedDescriptor<'_>, len: u64) -> Result<()> {
  sys_call_void(|| unsafe { libc::ftruncate(handle.raw(), len as libc::off_t) })?;
  Ok(())
}

pub fn sys_sync(handle: BorrowedDescriptor<'_>) -> Result<()> {
  sys_call_void(|| unsafe { libc::fsync(handle.raw()) })?;
  Ok(())
}

pub fn sys_sync_data(handle: BorrowedDescriptor<'_>) -> Result<()> {
  sys_call_void(|| unsafe { libc::fdatasync(handle.raw()) })?;
  Ok(())
}

pub fn is_non_blocking(handle: BorrowedDescriptor<'_>) -> Result<bool> {
  let flags = sys_call(|| unsafe { libc::fcntl(handle.raw(), libc::F_GETFL) })?;
  Ok(flags & libc::O_NONBLOCK != 0)
}

pub fn set_non_blocking(handle: BorrowedDescriptor<'_>, non_blocking: bool) -> Result<()> {
  let flags = sys_call(|| unsafe { libc::fcntl(handle.raw(), libc::F_GETFL) })?;
  let flags = if non_blocking {
    flags | libc::O_NONBLOCK
  } else {
    flags & !libc::O_NONBLOCK
  };

  sys_call_void(|| unsafe { libc::fcntl(handle.raw(), libc::F_SETFL, flags) })?;
  Ok(())
}

pub fn is_close_on_exec(handle: BorrowedDescriptor<'_>) -> Result<bool> {
  let flags = sys_call(|| unsafe { libc::fcntl(handle.raw(), libc::F_GETFD) })?;
  Ok(flags & libc::FD_CLOEXEC != 0)
}

pub fn set_close_on_exec(handle: BorrowedDescriptor<'_>, close_on_exec: bool) -> Result<()> {
  let flags = sys_call(|| unsafe { libc::fcntl(handle.raw(), libc::F_GETFD) })?;
  let flags = if close_on_exec {
    flags | libc::FD_CLOEXEC
  } else {
    flags & !libc::FD_CLOEXEC
  };

  sys_call_void(|| unsafe { libc::fcntl(handle.raw(), libc::F_SETFD, flags) })?;
  Ok(())
}

/// `[read end, write end]`, both close-on-exec. The caller takes ownership of both.
pub fn sys_pipe() -> Result<[RawHandle; 2]> {
  let mut handles = [0 as RawHandle; 2];
  sys_call_void(|| unsafe { libc::pipe2(handles.as_mut_ptr(), libc::O_CLOEXEC) })?;
  Ok(handles)
}

/// One `poll(2)` probe on a single descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Readiness<'a> {
  handle: BorrowedDescriptor<'a>,
  events: libc::c_short,
  timeout: Option<Duration>,
}

impl<'a> Readiness<'a> {
  pub fn new(handle: BorrowedDescriptor<'a>) -> Self {
    Self {
      handle,
      events: 0,
      timeout: None,
    }
  }

  pub fn read(mut self) -> Self {
    self.events |= libc::POLLIN;
    self
  }

  pub fn write(mut self) -> Self {
    self.events |= libc::POLLOUT;
    self
  }

  /// `None` returns immediately.
  pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// The raw `revents`, or 0 if nothing happened before the timeout.
  pub fn events(&self) -> Result<libc::c_short> {
    let timeout = match self.timeout {
      None => 0,
      Some(timeout) => timeout.as_nanos().div_ceil(1_000_000).min(libc::c_int::MAX as u128) as libc::c_int,
    };

    self.poll_with(timeout)
  }

  /// Blocks with no deadline until something is reported, ignoring the configured timeout.
  pub fn wait(&self) -> Result<libc::c_short> {
    self.poll_with(-1)
  }

  fn poll_with(&self, timeout: libc::c_int) -> Result<libc::c_short> {
    let mut descriptor = libc::pollfd {
      fd: self.handle.raw(),
      events: self.events,
      revents: 0,
    };

    let ready = sys_call(|| unsafe { libc::poll(&mut descriptor, 1, timeout) })?;
    if ready == 0 {
      return Ok(0);
    }

    if descriptor.revents & libc::POLLNVAL != 0 {
      return Err(OsError::from_code(libc::EBADF).into());
    }

    Ok(descriptor.revents)
  }

  /// Whether any requested direction is ready. Hangups and errors count as ready, the next call will report them.
  pub fn probe(&self) -> Result<bool> {
    let mut interesting = libc::POLLERR;
    if self.events & libc::POLLIN != 0 {
      interesting |= libc::POLLIN | libc::POLLHUP;
    }
    if self.events & libc::POLLOUT != 0 {
      interesting |= libc::POLLOUT;
    }

    Ok(self.events()? & interesting != 0)
  }
}

/// One attempt for a poller: `None` unless `readiness` reports ready right now, otherwise the outcome of `attempt`.
///
/// The probe keeps the attempt from blocking on descriptors left in blocking mode.
pub fn attempt_when_ready<T>(readiness: Readiness<'_>, attempt: impl FnOnce() -> Result<T>) -> Option<Result<T>> {
  match readiness.probe() {
    Ok(false) => None,
    Ok(true) => retry_on_would_block(attempt()),
    Err(error) => Some(Err(error)),
  }
}

/// Reads into a buffer, retrying while the descriptor would block.
pub struct ReadPoller<'a, B: ?Sized> {
  handle: BorrowedDescriptor<'a>,
  buffer: &'a mut B,
}

impl<'a, B: WritableBuffer + ?Sized> ReadPoller<'a, B> {
  pub fn new(handle: BorrowedDescriptor<'a>, buffer: &'a mut B) -> Self {
    Self { handle, buffer }
  }
}

impl<B: WritableBuffer + ?Sized> Poller for ReadPoller<'_, B> {
  type Output = usize;

  fn poll(&mut self) -> Option<Result<usize>> {
    let handle = self.handle;
    attempt_when_ready(Readiness::new(handle).read(), || sys_read(handle, self.buffer))
  }
}

pub struct WritePoller<'a> {
  handle: BorrowedDescriptor<'a>,
  data: &'a [u8],
}

impl<'a> WritePoller<'a> {
  pub fn new(handle: BorrowedDescriptor<'a>, data: &'a [u8]) -> Self {
    Self { handle, data }
  }
}

impl Poller for WritePoller<'_> {
  type Output = usize;

  fn poll(&mut self) -> Option<Result<usize>> {
    let (handle, data) = (self.handle, self.data);
    attempt_when_ready(Readiness::new(handle).write(), || {
      // writability of a blocking pipe only promises room for PIPE_BUF bytes
      let data = if is_non_blocking(handle)? {
        data
      } else {
        &data[..data.len().min(libc::PIPE_BUF)]
      };
      sys_write(handle, data)
    })
  }
}
