use core::time::Duration;

use crate::{
  buffer::WritableBuffer,
  descriptor::AsHandle,
  error::{Error, Result},
  platform::active::sys::Readiness,
};

pub mod fs;
pub mod net;
pub mod reader;

pub trait StreamRead {
  /// Reads into the buffer's writable region and marks what arrived as written. `Ok(0)` is end of stream.
  fn read<B: WritableBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<usize>;
}

pub trait StreamWrite: AsHandle {
  /// May write fewer bytes than given.
  fn write(&mut self, data: &[u8]) -> Result<usize>;

  /// Writes everything. On a non-blocking descriptor a full buffer is waited out rather than reported.
  fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
      match self.write(data) {
        Ok(0) => return Err(Error::WriteZero),
        Ok(written) => data = &data[written..],
        Err(Error::Os(error)) if error.is_interrupted() => continue,
        Err(error) if error.is_would_block() => match Readiness::new(self.as_handle()).write().wait() {
          Ok(_) => continue,
          Err(Error::Os(error)) if error.is_interrupted() => continue,
          Err(error) => return Err(error),
        },
        Err(error) => return Err(error),
      }
    }

    Ok(())
  }
}

impl<T: StreamRead + ?Sized> StreamRead for &mut T {
  fn read<B: WritableBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<usize> {
    T::read(self, buffer)
  }
}

impl<T: StreamWrite + ?Sized> StreamWrite for &mut T {
  fn write(&mut self, data: &[u8]) -> Result<usize> {
    T::write(self, data)
  }
}

/// Readiness probes. `None` checks without waiting.
pub trait Pollable: AsHandle {
  fn is_readable(&self, timeout: Option<Duration>) -> Result<bool> {
    Readiness::new(self.as_handle()).read().timeout(timeout).probe()
  }

  fn is_writable(&self, timeout: Option<Duration>) -> Result<bool> {
    Readiness::new(self.as_handle()).write().timeout(timeout).probe()
  }
}
