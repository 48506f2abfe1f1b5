use core::time::Duration;

use crate::{
  asio::{InfiniteAwaiter, Poller, TimedAwaiter, retry_on_would_block},
  buffer::WritableBuffer,
  descriptor::{AsHandle, BorrowedDescriptor, OwnedDescriptor},
  error::Result,
  io::{Pollable, StreamRead, StreamWrite},
};

use super::{SocketAddress, sys_local_address, sys_recv, sys_send};

/// A connected socket, from [`super::Socket::connect`] or an accept.
///
/// `read`/`write` follow the socket's blocking mode, `send`/`recv` never block, and the awaitables are built on
/// the latter so they are safe on blocking sockets too.
#[derive(Debug)]
pub struct Connection<A> {
  descriptor: OwnedDescriptor,
  peer: A,
  non_blocking: bool,
}

impl<A: SocketAddress> Connection<A> {
  pub(super) fn from_parts(descriptor: OwnedDescriptor, peer: A, non_blocking: bool) -> Self {
    Self {
      descriptor,
      peer,
      non_blocking,
    }
  }

  pub fn peer_address(&self) -> &A {
    &self.peer
  }

  pub fn local_address(&self) -> Result<A> {
    sys_local_address(self.descriptor.borrow())
  }

  pub fn is_non_blocking(&self) -> bool {
    self.non_blocking
  }

  pub fn borrow(&self) -> BorrowedDescriptor<'_> {
    self.descriptor.borrow()
  }

  pub fn into_descriptor(self) -> OwnedDescriptor {
    self.descriptor
  }

  pub fn send(&mut self, data: &[u8]) -> Result<usize> {
    sys_send(self.descriptor.borrow(), data, libc::MSG_DONTWAIT)
  }

  pub fn recv<B: WritableBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<usize> {
    sys_recv(self.descriptor.borrow(), buffer, libc::MSG_DONTWAIT)
  }

  pub fn aread<'a, B: WritableBuffer + ?Sized>(&'a mut self, buffer: &'a mut B) -> InfiniteAwaiter<RecvPoller<'a, B>> {
    RecvPoller::new(self.descriptor.borrow(), buffer).infinite()
  }

  pub fn aread_timeout<'a, B: WritableBuffer + ?Sized>(
    &'a mut self,
    buffer: &'a mut B,
    timeout: Duration,
  ) -> TimedAwaiter<RecvPoller<'a, B>> {
    RecvPoller::new(self.descriptor.borrow(), buffer).timed(timeout)
  }

  pub fn awrite<'a>(&'a mut self, data: &'a [u8]) -> InfiniteAwaiter<SendPoller<'a>> {
    SendPoller::new(self.descriptor.borrow(), data).infinite()
  }

  pub fn awrite_timeout<'a>(&'a mut self, data: &'a [u8], timeout: Duration) -> TimedAwaiter<SendPoller<'a>> {
    SendPoller::new(self.descriptor.borrow(), data).timed(timeout)
  }

  /// Sends everything, waiting whenever the socket buffer is full.
  pub async fn awrite_all(&mut self, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
      let sent = SendPoller::new(self.descriptor.borrow(), data).infinite().await?;
      if sent == 0 {
        return Err(crate::error::Error::WriteZero);
      }
      data = &data[sent..];
    }

    Ok(())
  }
}

impl<A> AsHandle for Connection<A> {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    self.descriptor.borrow()
  }
}

impl<A> Pollable for Connection<A> {}

impl<A> StreamRead for Connection<A> {
  fn read<B: WritableBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<usize> {
    sys_recv(self.descriptor.borrow(), buffer, 0)
  }
}

impl<A> StreamWrite for Connection<A> {
  fn write(&mut self, data: &[u8]) -> Result<usize> {
    sys_send(self.descriptor.borrow(), data, 0)
  }
}

pub struct SendPoller<'a> {
  handle: BorrowedDescriptor<'a>,
  data: &'a [u8],
}

impl<'a> SendPoller<'a> {
  pub fn new(handle: BorrowedDescriptor<'a>, data: &'a [u8]) -> Self {
    Self { handle, data }
  }
}

impl Poller for SendPoller<'_> {
  type Output = usize;

  fn poll(&mut self) -> Option<Result<usize>> {
    retry_on_would_block(sys_send(self.handle, self.data, libc::MSG_DONTWAIT))
  }
}

pub struct RecvPoller<'a, B: ?Sized> {
  handle: BorrowedDescriptor<'a>,
  buffer: &'a mut B,
}

impl<'a, B: WritableBuffer + ?Sized> RecvPoller<'a, B> {
  pub fn new(handle: BorrowedDescriptor<'a>, buffer: &'a mut B) -> Self {
    Self { handle, buffer }
  }
}

impl<B: WritableBuffer + ?Sized> Poller for RecvPoller<'_, B> {
  type Output = usize;

  fn poll(&mut self) -> Option<Result<usize>> {
    retry_on_would_block(sys_recv(self.handle, self.buffer, libc::MSG_DONTWAIT))
  }
}

#[cfg(test)]
mod tests {
  use rand::RngCore;

  use super::*;
  use crate::{
    buffer::{DynBuffer, FixedBuffer, ReadableBuffer},
    error::Error,
    io::net::Protocol,
    platform::active::io::net::{Connect, Ipv4Address, Socket, SocketOptions},
  };

  fn connected_pair() -> (Connection<Ipv4Address>, Connection<Ipv4Address>) {
    let listener = Socket::create(Ipv4Address::localhost(0), Protocol::Tcp).unwrap().bind_listen(1).unwrap();
    let target = listener.local_address().unwrap();
    let Connect::Connected(client) = Socket::create(target, Protocol::Tcp).unwrap().connect().unwrap() else {
      panic!("blocking connect reported in progress");
    };
    let server = listener.try_accept().unwrap();
    (client, server)
  }

  #[test]
  fn tcp_round_trip() {
    let (mut client, mut server) = connected_pair();

    let mut payload = [0u8; 100];
    rand::rng().fill_bytes(&mut payload);
    client.write_all(&payload).unwrap();

    let mut buffer = DynBuffer::with_capacity(256);
    while buffer.readable_len() < payload.len() {
      server.read(&mut buffer).unwrap();
    }
    assert_eq!(buffer.read_region(), payload.as_slice());
  }

  #[test]
  fn recv_without_data_would_block() {
    let (_client, mut server) = connected_pair();
    let mut buffer = FixedBuffer::<8>::new();
    assert!(server.recv(&mut buffer).unwrap_err().is_would_block());
    assert!(!server.is_readable(None).unwrap());
    assert!(server.is_writable(None).unwrap());
  }

  #[test]
  fn peer_close_reads_as_end_of_stream() {
    let (client, mut server) = connected_pair();
    drop(client);
    assert!(server.is_readable(Some(Duration::from_secs(1))).unwrap());
    let mut buffer = FixedBuffer::<8>::new();
    assert_eq!(server.read(&mut buffer).unwrap(), 0);
  }

  #[test]
  fn send_to_closed_peer_does_not_raise_sigpipe() {
    let (client, mut server) = connected_pair();
    drop(client);

    // the first send may still be accepted before the reset arrives
    let mut result = Ok(0);
    for _ in 0..64 {
      result = server.write(&[0u8; 1024]);
      if result.is_err() {
        break;
      }
      std::thread::sleep(Duration::from_millis(1));
    }
    assert!(matches!(result, Err(Error::Os(ref error)) if error.code() == libc::EPIPE || error.code() == libc::ECONNRESET));
  }

  #[pollster::test]
  async fn awaitable_round_trip() {
    let (mut client, mut server) = connected_pair();

    let mut buffer = FixedBuffer::<16>::new();
    let nothing = server.aread_timeout(&mut buffer, Duration::from_millis(10)).await;
    assert!(matches!(nothing, Err(Error::TimedOut(_))));

    client.awrite_all(b"hello there").await.unwrap();
    let mut received = 0;
    while received < 11 {
      received += server.aread(&mut buffer).await.unwrap();
    }
    assert_eq!(buffer.read_region(), b"hello there");
  }

  #[pollster::test]
  async fn accepted_connections_inherit_non_blocking() {
    let listener = SocketOptions::new(Ipv4Address::localhost(0))
      .non_blocking(true)
      .create()
      .unwrap()
      .bind_listen(1)
      .unwrap();
    let target = listener.local_address().unwrap();
    let _client = Socket::create(target, Protocol::Tcp).unwrap().aconnect().await.unwrap();

    let server = listener.aaccept_timeout(Duration::from_secs(5)).await.unwrap();
    assert!(server.is_non_blocking());
    assert!(crate::platform::active::sys::is_non_blocking(server.as_handle()).unwrap());
  }
}
