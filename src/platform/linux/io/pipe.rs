use core::time::Duration;

use crate::{
  asio::{InfiniteAwaiter, Poller, TimedAwaiter},
  buffer::WritableBuffer,
  descriptor::{AsHandle, BorrowedDescriptor, OwnedDescriptor},
  error::Result,
  io::{Pollable, StreamRead, StreamWrite},
  platform::active::sys::{ReadPoller, WritePoller, set_non_blocking, sys_pipe, sys_read, sys_write},
};

pub struct Pipe;

impl Pipe {
  /// Both ends are close-on-exec; `non_blocking` applies to both.
  pub fn open(non_blocking: bool) -> Result<(PipeReader, PipeWriter)> {
    let [read, write] = sys_pipe()?;
    // Safety: pipe2 just created both handles
    let (reader, writer) = unsafe {
      (
        PipeReader {
          descriptor: OwnedDescriptor::new(read),
        },
        PipeWriter {
          descriptor: OwnedDescriptor::new(write),
        },
      )
    };

    if non_blocking {
      set_non_blocking(reader.as_handle(), true)?;
      set_non_blocking(writer.as_handle(), true)?;
    }

    tracing::debug!(read, write, non_blocking, "created pipe");
    Ok((reader, writer))
  }
}

#[derive(Debug)]
pub struct PipeReader {
  descriptor: OwnedDescriptor,
}

impl PipeReader {
  pub fn aread<'a, B: WritableBuffer + ?Sized>(&'a mut self, buffer: &'a mut B) -> InfiniteAwaiter<ReadPoller<'a, B>> {
    ReadPoller::new(self.descriptor.borrow(), buffer).infinite()
  }

  pub fn aread_timeout<'a, B: WritableBuffer + ?Sized>(
    &'a mut self,
    buffer: &'a mut B,
    timeout: Duration,
  ) -> TimedAwaiter<ReadPoller<'a, B>> {
    ReadPoller::new(self.descriptor.borrow(), buffer).timed(timeout)
  }

  pub fn into_descriptor(self) -> OwnedDescriptor {
    self.descriptor
  }
}

impl AsHandle for PipeReader {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    self.descriptor.borrow()
  }
}

impl Pollable for PipeReader {}

impl StreamRead for PipeReader {
  fn read<B: WritableBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<usize> {
    sys_read(self.descriptor.borrow(), buffer)
  }
}

#[derive(Debug)]
pub struct PipeWriter {
  descriptor: OwnedDescriptor,
}

impl PipeWriter {
  pub fn awrite<'a>(&'a mut self, data: &'a [u8]) -> InfiniteAwaiter<WritePoller<'a>> {
    WritePoller::new(self.descriptor.borrow(), data).infinite()
  }

  pub fn awrite_timeout<'a>(&'a mut self, data: &'a [u8], timeout: Duration) -> TimedAwaiter<WritePoller<'a>> {
    WritePoller::new(self.descriptor.borrow(), data).timed(timeout)
  }

  pub fn into_descriptor(self) -> OwnedDescriptor {
    self.descriptor
  }
}

impl AsHandle for PipeWriter {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    self.descriptor.borrow()
  }
}

impl Pollable for PipeWriter {}

impl StreamWrite for PipeWriter {
  fn write(&mut self, data: &[u8]) -> Result<usize> {
    sys_write(self.descriptor.borrow(), data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    buffer::{DynBuffer, FixedBuffer, ReadableBuffer},
    error::Error,
    platform::active::sys::{is_close_on_exec, is_non_blocking},
  };

  #[test]
  fn readiness_follows_writes() {
    let (mut reader, mut writer) = Pipe::open(true).unwrap();
    assert!(!reader.is_readable(None).unwrap());
    assert!(writer.is_writable(None).unwrap());

    writer.write_all(b"twelve bytes").unwrap();
    assert!(reader.is_readable(Some(Duration::from_millis(100))).unwrap());

    let mut buffer = FixedBuffer::<64>::new();
    assert_eq!(reader.read(&mut buffer).unwrap(), 12);
    assert_eq!(buffer.read_region(), b"twelve bytes");
    assert!(!reader.is_readable(None).unwrap());
  }

  #[test]
  fn empty_non_blocking_read_would_block() {
    let (mut reader, _writer) = Pipe::open(true).unwrap();
    let mut buffer = FixedBuffer::<8>::new();
    let error = reader.read(&mut buffer).unwrap_err();
    assert!(error.is_would_block());
  }

  #[test]
  fn flags_are_applied() {
    let (reader, writer) = Pipe::open(true).unwrap();
    assert!(is_non_blocking(reader.as_handle()).unwrap());
    assert!(is_non_blocking(writer.as_handle()).unwrap());
    assert!(is_close_on_exec(reader.as_handle()).unwrap());

    let (reader, _writer) = Pipe::open(false).unwrap();
    assert!(!is_non_blocking(reader.as_handle()).unwrap());
    assert!(is_close_on_exec(reader.as_handle()).unwrap());
  }

  #[test]
  fn closed_writer_reads_as_end_of_stream() {
    let (mut reader, writer) = Pipe::open(true).unwrap();
    drop(writer);
    assert!(reader.is_readable(None).unwrap());
    let mut buffer = FixedBuffer::<8>::new();
    assert_eq!(reader.read(&mut buffer).unwrap(), 0);
  }

  #[pollster::test]
  async fn awaitable_round_trip() {
    let (mut reader, mut writer) = Pipe::open(true).unwrap();
    assert_eq!(writer.awrite(b"ping").await.unwrap(), 4);

    let mut buffer = FixedBuffer::<8>::new();
    assert_eq!(reader.aread(&mut buffer).await.unwrap(), 4);
    assert_eq!(buffer.read_region(), b"ping");
  }

  #[pollster::test]
  async fn read_times_out_without_data() {
    let (mut reader, _writer) = Pipe::open(true).unwrap();
    let mut buffer = FixedBuffer::<8>::new();
    let result = reader.aread_timeout(&mut buffer, Duration::from_millis(10)).await;
    assert!(matches!(result, Err(Error::TimedOut(_))));
  }

  #[test]
  fn blocking_read_times_out_without_data() {
    let (mut reader, writer) = Pipe::open(false).unwrap();
    let (sender, receiver) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
      let mut buffer = FixedBuffer::<8>::new();
      let result = pollster::block_on(reader.aread_timeout(&mut buffer, Duration::from_millis(50)));
      sender.send(matches!(result, Err(Error::TimedOut(_)))).unwrap();
    });
    assert!(receiver.recv_timeout(Duration::from_secs(5)).unwrap());
    drop(writer);
  }

  #[pollster::test]
  async fn blocking_write_stays_within_pipe_buf() {
    let (mut reader, mut writer) = Pipe::open(false).unwrap();
    let data = vec![3u8; 100_000];
    assert_eq!(writer.awrite(&data).await.unwrap(), libc::PIPE_BUF);

    let mut buffer = DynBuffer::with_capacity(2 * libc::PIPE_BUF);
    assert_eq!(reader.aread(&mut buffer).await.unwrap(), libc::PIPE_BUF);
  }

  #[test]
  fn write_all_waits_out_a_full_pipe() {
    let (mut reader, mut writer) = Pipe::open(true).unwrap();
    let drain = std::thread::spawn(move || {
      let mut received = Vec::new();
      let mut buffer = FixedBuffer::<4096>::new();
      loop {
        buffer.reset();
        match reader.read(&mut buffer) {
          Ok(0) => return received,
          Ok(_) => received.extend_from_slice(buffer.read_region()),
          Err(error) if error.is_would_block() => {
            reader.is_readable(Some(Duration::from_millis(100))).unwrap();
          }
          Err(error) => panic!("drain failed: {error}"),
        }
      }
    });

    let data = vec![7u8; 200_000];
    writer.write_all(&data).unwrap();
    drop(writer);
    assert_eq!(drain.join().unwrap(), data);
  }
}
