//! Non-blocking file and socket plumbing sitting directly on top of the OS syscalls.
//!
//! The crate is split the same way the OS boundary is: portable contracts ([`buffer`], [`descriptor`],
//! [`asio`], [`io`], [`error`]) live at the top level, and everything that issues a syscall lives under
//! [`platform::active`].

pub mod asio;
pub mod buffer;
pub mod descriptor;
pub mod error;
pub mod io;
pub mod platform;

pub use error::{Error, OsError, Result};
pub use platform::active::{
  io::{
    file::{LocalFile, OpenOptions},
    net::{
      Bound, Connect, Connection, Free, Ipv4Address, Listening, PendingConnection, Socket, SocketAddress,
      SocketOptions, SocketState, UnixAddress,
    },
    pipe::{Pipe, PipeReader, PipeWriter},
    stdio::{Stderr, Stdin, Stdout, stderr, stdin, stdout},
  },
  sys_call, sys_call_void,
};

pub mod prelude {
  pub use crate::{
    asio::Poller,
    buffer::{ReadableBuffer, WritableBuffer},
    descriptor::AsHandle,
    io::{
      Pollable, StreamRead, StreamWrite,
      fs::{SeekableFile, SizedFile, SyncFile},
    },
  };
}
