use crate::{
  buffer::WritableBuffer,
  descriptor::{AsHandle, BorrowedDescriptor},
  error::Result,
  io::{Pollable, StreamRead, StreamWrite},
  platform::active::sys::{sys_read, sys_write},
};

macro_rules! standard_stream {
  ($name:ident, $constructor:ident, $handle:expr) => {
    /// Borrowed view of a standard stream. Never closes it.
    #[derive(Debug, Clone, Copy)]
    pub struct $name(BorrowedDescriptor<'static>);

    pub fn $constructor() -> $name {
      // Safety: the standard streams stay open for the life of the process unless someone else closes them
      $name(unsafe { BorrowedDescriptor::borrow_raw($handle) })
    }

    impl AsHandle for $name {
      fn as_handle(&self) -> BorrowedDescriptor<'_> {
        self.0
      }
    }

    impl Pollable for $name {}
  };
}

standard_stream!(Stdin, stdin, libc::STDIN_FILENO);
standard_stream!(Stdout, stdout, libc::STDOUT_FILENO);
standard_stream!(Stderr, stderr, libc::STDERR_FILENO);

impl StreamRead for Stdin {
  fn read<B: WritableBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<usize> {
    sys_read(self.0, buffer)
  }
}

impl StreamWrite for Stdout {
  fn write(&mut self, data: &[u8]) -> Result<usize> {
    sys_write(self.0, data)
  }
}

impl StreamWrite for Stderr {
  fn write(&mut self, data: &[u8]) -> Result<usize> {
    sys_write(self.0, data)
  }
}
