mod address;
mod connection;
mod socket;

pub use address::{Ipv4Address, SocketAddress, UnixAddress};
pub use connection::{Connection, RecvPoller, SendPoller};
pub use socket::{
  AcceptPoller, Bound, Connect, ConnectPoller, Free, Listening, PendingConnection, RecvFromPoller, SendToPoller, Socket,
  SocketOptions, SocketState, Unconnected,
};

use crate::{
  buffer::WritableBuffer,
  descriptor::BorrowedDescriptor,
  error::{OsError, Result},
  platform::active::{sys_call, sys_call_void},
};

fn sys_send(handle: BorrowedDescriptor<'_>, data: &[u8], flags: libc::c_int) -> Result<usize> {
  let sent = sys_call(|| unsafe { libc::send(handle.raw(), data.as_ptr().cast(), data.len(), flags | libc::MSG_NOSIGNAL) })?;
  Ok(sent as usize)
}

fn sys_recv<B: WritableBuffer + ?Sized>(handle: BorrowedDescriptor<'_>, buffer: &mut B, flags: libc::c_int) -> Result<usize> {
  let region = buffer.write_region();
  let received = sys_call(|| unsafe { libc::recv(handle.raw(), region.as_mut_ptr().cast(), region.len(), flags) })?;
  Ok(buffer.mark_written(received as usize))
}

fn sys_send_to<A: SocketAddress>(
  handle: BorrowedDescriptor<'_>,
  data: &[u8],
  to: &A,
  flags: libc::c_int,
) -> Result<usize> {
  let (address, len) = to.as_raw();
  let sent = sys_call(|| unsafe {
    libc::sendto(handle.raw(), data.as_ptr().cast(), data.len(), flags | libc::MSG_NOSIGNAL, address, len)
  })?;
  Ok(sent as usize)
}

fn sys_recv_from<A: SocketAddress, B: WritableBuffer + ?Sized>(
  handle: BorrowedDescriptor<'_>,
  buffer: &mut B,
  flags: libc::c_int,
) -> Result<(usize, A)> {
  let mut from = A::empty();
  let (address, mut len) = from.as_raw_mut();
  let region = buffer.write_region();
  let received = sys_call(|| unsafe {
    libc::recvfrom(handle.raw(), region.as_mut_ptr().cast(), region.len(), flags, address, &mut len)
  })?;
  from.set_raw_len(len);
  Ok((buffer.mark_written(received as usize), from))
}

fn sys_local_address<A: SocketAddress>(handle: BorrowedDescriptor<'_>) -> Result<A> {
  let mut local = A::empty();
  let (address, mut len) = local.as_raw_mut();
  sys_call_void(|| unsafe { libc::getsockname(handle.raw(), address, &mut len) })?;
  local.set_raw_len(len);
  Ok(local)
}

/// The pending error of a socket, as left by a failed non-blocking connect.
fn sys_socket_error(handle: BorrowedDescriptor<'_>) -> Result<Option<OsError>> {
  let mut error: libc::c_int = 0;
  let mut len = size_of::<libc::c_int>() as libc::socklen_t;
  sys_call_void(|| unsafe {
    libc::getsockopt(
      handle.raw(),
      libc::SOL_SOCKET,
      libc::SO_ERROR,
      (&raw mut error).cast(),
      &mut len,
    )
  })?;

  Ok((error != 0).then(|| OsError::from_code(error)))
}
