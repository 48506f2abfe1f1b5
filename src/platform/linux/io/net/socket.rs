use core::{marker::PhantomData, time::Duration};

use crate::{
  asio::{InfiniteAwaiter, Poller, TimedAwaiter, retry_on_would_block},
  buffer::WritableBuffer,
  descriptor::{AsHandle, BorrowedDescriptor, OwnedDescriptor},
  error::Result,
  io::{Pollable, net::Protocol},
  platform::active::{
    sys::{Readiness, attempt_when_ready},
    sys_call, sys_call_void,
  },
};

use super::{Connection, SocketAddress, sys_local_address, sys_recv_from, sys_send_to, sys_socket_error};

mod sealed {
  pub trait Sealed {}
}

/// Compile-time socket state. Only the states in this module exist.
pub trait SocketState: sealed::Sealed {
  const NAME: &'static str;
}

/// Freshly created: can bind, connect, or send datagrams.
#[derive(Debug)]
pub enum Free {}
/// Bound to its address: can listen or exchange datagrams.
#[derive(Debug)]
pub enum Bound {}
/// Passive: can only accept.
#[derive(Debug)]
pub enum Listening {}

impl sealed::Sealed for Free {}
impl sealed::Sealed for Bound {}
impl sealed::Sealed for Listening {}

impl SocketState for Free {
  const NAME: &'static str = "free";
}

impl SocketState for Bound {
  const NAME: &'static str = "bound";
}

impl SocketState for Listening {
  const NAME: &'static str = "listening";
}

/// States with no peer, where datagrams carry their own destination.
pub trait Unconnected: SocketState {}
impl Unconnected for Free {}
impl Unconnected for Bound {}

#[derive(Debug, Clone)]
pub struct SocketOptions<A> {
  address: A,
  protocol: Protocol,
  non_blocking: bool,
}

impl<A: SocketAddress> SocketOptions<A> {
  /// TCP, blocking.
  pub fn new(address: A) -> Self {
    Self {
      address,
      protocol: Protocol::Tcp,
      non_blocking: false,
    }
  }

  pub fn tcp(mut self) -> Self {
    self.protocol = Protocol::Tcp;
    self
  }

  pub fn udp(mut self) -> Self {
    self.protocol = Protocol::Udp;
    self
  }

  pub fn protocol(mut self, protocol: Protocol) -> Self {
    self.protocol = protocol;
    self
  }

  /// Also applies to every connection accepted from the socket.
  pub fn non_blocking(mut self, non_blocking: bool) -> Self {
    self.non_blocking = non_blocking;
    self
  }

  pub fn create(self) -> Result<Socket<A, Free>> {
    let socket_type = if self.protocol.is_stream() {
      libc::SOCK_STREAM
    } else {
      libc::SOCK_DGRAM
    };
    let mut flags = libc::SOCK_CLOEXEC;
    if self.non_blocking {
      flags |= libc::SOCK_NONBLOCK;
    }

    let handle = sys_call(|| unsafe { libc::socket(A::family() as libc::c_int, socket_type | flags, 0) })?;
    tracing::debug!(handle, protocol = ?self.protocol, address = ?self.address, "created socket");

    Ok(Socket {
      // Safety: socket just returned this handle
      descriptor: unsafe { OwnedDescriptor::new(handle) },
      address: self.address,
      protocol: self.protocol,
      non_blocking: self.non_blocking,
      _state: PhantomData,
    })
  }
}

/// A socket whose state is tracked in its type. Transitions consume the socket; on failure it is dropped and closed.
///
/// A free socket cannot accept:
///
/// ```compile_fail
/// use fdio::{Ipv4Address, SocketOptions};
///
/// let socket = SocketOptions::new(Ipv4Address::localhost(0)).create().unwrap();
/// socket.accept();
/// ```
///
/// And a listening socket cannot send:
///
/// ```compile_fail
/// use fdio::{Ipv4Address, SocketOptions};
///
/// let listener = SocketOptions::new(Ipv4Address::localhost(0)).create().unwrap().bind_listen(1).unwrap();
/// listener.send(b"hello");
/// ```
#[derive(Debug)]
pub struct Socket<A, S: SocketState = Free> {
  descriptor: OwnedDescriptor,
  address: A,
  protocol: Protocol,
  non_blocking: bool,
  _state: PhantomData<S>,
}

impl<A: SocketAddress, S: SocketState> Socket<A, S> {
  /// The address given at creation.
  pub fn address(&self) -> &A {
    &self.address
  }

  pub fn protocol(&self) -> Protocol {
    self.protocol
  }

  pub fn is_non_blocking(&self) -> bool {
    self.non_blocking
  }

  /// What the kernel actually bound, e.g. the port picked for port 0.
  pub fn local_address(&self) -> Result<A> {
    sys_local_address(self.descriptor.borrow())
  }

  pub fn borrow(&self) -> BorrowedDescriptor<'_> {
    self.descriptor.borrow()
  }

  fn transition<T: SocketState>(self) -> Socket<A, T> {
    tracing::debug!(handle = self.descriptor.raw(), from = S::NAME, to = T::NAME, "socket transition");
    Socket {
      descriptor: self.descriptor,
      address: self.address,
      protocol: self.protocol,
      non_blocking: self.non_blocking,
      _state: PhantomData,
    }
  }
}

impl<A: SocketAddress> Socket<A, Free> {
  pub fn options(address: A) -> SocketOptions<A> {
    SocketOptions::new(address)
  }

  pub fn create(address: A, protocol: Protocol) -> Result<Self> {
    SocketOptions::new(address).protocol(protocol).create()
  }

  pub fn bind(self) -> Result<Socket<A, Bound>> {
    let (address, len) = self.address.as_raw();
    sys_call_void(|| unsafe { libc::bind(self.descriptor.raw(), address, len) })?;
    Ok(self.transition())
  }

  pub fn bind_listen(self, backlog: i32) -> Result<Socket<A, Listening>> {
    self.bind()?.listen(backlog)
  }

  /// A non-blocking socket may come back [`Connect::InProgress`].
  pub fn connect(self) -> Result<Connect<A>> {
    let (address, len) = self.address.as_raw();
    match sys_call_void(|| unsafe { libc::connect(self.descriptor.raw(), address, len) }) {
      Ok(()) => {
        tracing::debug!(handle = self.descriptor.raw(), address = ?self.address, "connected");
        Ok(Connect::Connected(self.into_connection()))
      }
      Err(error) if error.is_in_progress() => {
        tracing::debug!(handle = self.descriptor.raw(), address = ?self.address, "connection in progress");
        Ok(Connect::InProgress(PendingConnection { socket: self }))
      }
      Err(error) => Err(error.into()),
    }
  }

  /// Connects, waiting out an in-progress connection.
  pub async fn aconnect(self) -> Result<Connection<A>> {
    match self.connect()? {
      Connect::Connected(connection) => Ok(connection),
      Connect::InProgress(pending) => pending.established().await,
    }
  }

  fn into_connection(self) -> Connection<A> {
    Connection::from_parts(self.descriptor, self.address, self.non_blocking)
  }
}

impl<A: SocketAddress> Socket<A, Bound> {
  pub fn listen(self, backlog: i32) -> Result<Socket<A, Listening>> {
    sys_call_void(|| unsafe { libc::listen(self.descriptor.raw(), backlog) })?;
    Ok(self.transition())
  }
}

impl<A: SocketAddress> Socket<A, Listening> {
  /// One accept attempt. `None` when no connection is queued on a non-blocking listener.
  pub fn accept(&self) -> Option<Result<Connection<A>>> {
    retry_on_would_block(self.try_accept())
  }

  /// Blocks (or fails with would-block) the way the listener is configured.
  pub fn try_accept(&self) -> Result<Connection<A>> {
    let mut peer = A::empty();
    let (address, mut len) = peer.as_raw_mut();
    let mut flags = libc::SOCK_CLOEXEC;
    if self.non_blocking {
      flags |= libc::SOCK_NONBLOCK;
    }

    let handle = sys_call(|| unsafe { libc::accept4(self.descriptor.raw(), address, &mut len, flags) })?;
    peer.set_raw_len(len);
    tracing::debug!(listener = self.descriptor.raw(), handle, peer = ?peer, "accepted connection");

    // Safety: accept4 just returned this handle
    let descriptor = unsafe { OwnedDescriptor::new(handle) };
    Ok(Connection::from_parts(descriptor, peer, self.non_blocking))
  }

  pub fn aaccept(&self) -> InfiniteAwaiter<AcceptPoller<'_, A>> {
    AcceptPoller { listener: self }.infinite()
  }

  pub fn aaccept_timeout(&self, timeout: Duration) -> TimedAwaiter<AcceptPoller<'_, A>> {
    AcceptPoller { listener: self }.timed(timeout)
  }
}

impl<A: SocketAddress, S: Unconnected> Socket<A, S> {
  pub fn send_to(&self, data: &[u8], to: &A) -> Result<usize> {
    sys_send_to(self.descriptor.borrow(), data, to, 0)
  }

  /// Fills the buffer with one datagram and reports who sent it.
  pub fn recv_from<B: WritableBuffer + ?Sized>(&self, buffer: &mut B) -> Result<(usize, A)> {
    sys_recv_from(self.descriptor.borrow(), buffer, 0)
  }

  pub fn asend_to<'a>(&'a self, data: &'a [u8], to: &'a A) -> InfiniteAwaiter<SendToPoller<'a, A>> {
    SendToPoller::new(self.descriptor.borrow(), data, to).infinite()
  }

  pub fn asend_to_timeout<'a>(
    &'a self,
    data: &'a [u8],
    to: &'a A,
    timeout: Duration,
  ) -> TimedAwaiter<SendToPoller<'a, A>> {
    SendToPoller::new(self.descriptor.borrow(), data, to).timed(timeout)
  }

  pub fn arecv_from<'a, B: WritableBuffer + ?Sized>(
    &'a self,
    buffer: &'a mut B,
  ) -> InfiniteAwaiter<RecvFromPoller<'a, A, B>> {
    RecvFromPoller::new(self.descriptor.borrow(), buffer).infinite()
  }

  pub fn arecv_from_timeout<'a, B: WritableBuffer + ?Sized>(
    &'a self,
    buffer: &'a mut B,
    timeout: Duration,
  ) -> TimedAwaiter<RecvFromPoller<'a, A, B>> {
    RecvFromPoller::new(self.descriptor.borrow(), buffer).timed(timeout)
  }
}

impl<A, S: SocketState> AsHandle for Socket<A, S> {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    self.descriptor.borrow()
  }
}

impl<A, S: SocketState> Pollable for Socket<A, S> {}

pub enum Connect<A> {
  Connected(Connection<A>),
  /// Non-blocking connect that has not finished yet.
  InProgress(PendingConnection<A>),
}

impl<A> core::fmt::Debug for Connect<A> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Connect::Connected(_) => f.write_str("Connected"),
      Connect::InProgress(_) => f.write_str("InProgress"),
    }
  }
}

/// A connect that returned `EINPROGRESS`. Writability marks completion, `SO_ERROR` tells whether it worked.
pub struct PendingConnection<A> {
  socket: Socket<A, Free>,
}

impl<A: SocketAddress> PendingConnection<A> {
  pub fn poller(&self) -> ConnectPoller<'_> {
    ConnectPoller {
      handle: self.socket.borrow(),
    }
  }

  pub async fn established(self) -> Result<Connection<A>> {
    self.poller().infinite().await?;
    Ok(self.socket.into_connection())
  }

  pub async fn established_timeout(self, timeout: Duration) -> Result<Connection<A>> {
    self.poller().timed(timeout).await?;
    Ok(self.socket.into_connection())
  }

  pub fn address(&self) -> &A {
    self.socket.address()
  }
}

impl<A> AsHandle for PendingConnection<A> {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    self.socket.descriptor.borrow()
  }
}

pub struct ConnectPoller<'a> {
  handle: BorrowedDescriptor<'a>,
}

impl Poller for ConnectPoller<'_> {
  type Output = ();

  fn poll(&mut self) -> Option<Result<()>> {
    match Readiness::new(self.handle).write().probe() {
      Ok(false) => None,
      Ok(true) => match sys_socket_error(self.handle) {
        Ok(None) => Some(Ok(())),
        Ok(Some(error)) if error.is_in_progress() => None,
        Ok(Some(error)) => Some(Err(error.into())),
        Err(error) => Some(Err(error)),
      },
      Err(error) => Some(Err(error)),
    }
  }
}

pub struct AcceptPoller<'a, A> {
  listener: &'a Socket<A, Listening>,
}

impl<A: SocketAddress> Poller for AcceptPoller<'_, A> {
  type Output = Connection<A>;

  fn poll(&mut self) -> Option<Result<Connection<A>>> {
    let listener = self.listener;
    attempt_when_ready(Readiness::new(listener.borrow()).read(), || listener.try_accept())
  }
}

pub struct SendToPoller<'a, A> {
  handle: BorrowedDescriptor<'a>,
  data: &'a [u8],
  to: &'a A,
}

impl<'a, A: SocketAddress> SendToPoller<'a, A> {
  pub fn new(handle: BorrowedDescriptor<'a>, data: &'a [u8], to: &'a A) -> Self {
    Self { handle, data, to }
  }
}

impl<A: SocketAddress> Poller for SendToPoller<'_, A> {
  type Output = usize;

  fn poll(&mut self) -> Option<Result<usize>> {
    retry_on_would_block(sys_send_to(self.handle, self.data, self.to, libc::MSG_DONTWAIT))
  }
}

pub struct RecvFromPoller<'a, A, B: ?Sized> {
  handle: BorrowedDescriptor<'a>,
  buffer: &'a mut B,
  _address: PhantomData<A>,
}

impl<'a, A: SocketAddress, B: WritableBuffer + ?Sized> RecvFromPoller<'a, A, B> {
  pub fn new(handle: BorrowedDescriptor<'a>, buffer: &'a mut B) -> Self {
    Self {
      handle,
      buffer,
      _address: PhantomData,
    }
  }
}

impl<A: SocketAddress, B: WritableBuffer + ?Sized> Poller for RecvFromPoller<'_, A, B> {
  type Output = (usize, A);

  fn poll(&mut self) -> Option<Result<(usize, A)>> {
    retry_on_would_block(sys_recv_from(self.handle, self.buffer, libc::MSG_DONTWAIT))
  }
}
