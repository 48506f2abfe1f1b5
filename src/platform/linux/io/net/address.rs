use core::{
  fmt,
  mem::{offset_of, size_of},
};
use std::{
  ffi::OsStr,
  net::{Ipv4Addr, SocketAddrV4},
  os::unix::ffi::OsStrExt,
  path::Path,
};

use crate::error::{Error, Result};

/// An endpoint that knows its own family and raw `sockaddr` layout.
///
/// The pointers handed out are only valid while the address itself is alive and not moved.
pub trait SocketAddress: Clone + fmt::Debug {
  fn family() -> libc::sa_family_t;

  /// A placeholder for the kernel to fill in, as `accept`, `recvfrom` and `getsockname` do.
  fn empty() -> Self;

  fn as_raw(&self) -> (*const libc::sockaddr, libc::socklen_t);

  /// The full writable storage and its capacity.
  fn as_raw_mut(&mut self) -> (*mut libc::sockaddr, libc::socklen_t);

  /// Records how much of the storage the kernel filled in.
  fn set_raw_len(&mut self, len: libc::socklen_t);
}

#[derive(Clone, Copy)]
pub struct Ipv4Address {
  raw: libc::sockaddr_in,
}

impl Ipv4Address {
  pub fn new(ip: Ipv4Addr, port: u16) -> Self {
    // Safety: plain old data, all zeroes is valid
    let mut raw: libc::sockaddr_in = unsafe { core::mem::zeroed() };
    raw.sin_family = libc::AF_INET as libc::sa_family_t;
    raw.sin_port = port.to_be();
    raw.sin_addr = libc::in_addr {
      s_addr: u32::from(ip).to_be(),
    };

    Self { raw }
  }

  /// Parses a dotted-quad host, no name resolution.
  pub fn parse(host: &str, port: u16) -> Result<Self> {
    let ip = host
      .parse::<Ipv4Addr>()
      .map_err(|_| Error::InvalidAddress(host.to_owned()))?;
    Ok(Self::new(ip, port))
  }

  /// `0.0.0.0:port`
  pub fn listen_all(port: u16) -> Self {
    Self::new(Ipv4Addr::UNSPECIFIED, port)
  }

  pub fn localhost(port: u16) -> Self {
    Self::new(Ipv4Addr::LOCALHOST, port)
  }

  pub fn ip(&self) -> Ipv4Addr {
    Ipv4Addr::from(u32::from_be(self.raw.sin_addr.s_addr))
  }

  pub fn port(&self) -> u16 {
    u16::from_be(self.raw.sin_port)
  }
}

impl SocketAddress for Ipv4Address {
  fn family() -> libc::sa_family_t {
    libc::AF_INET as libc::sa_family_t
  }

  fn empty() -> Self {
    Self::new(Ipv4Addr::UNSPECIFIED, 0)
  }

  fn as_raw(&self) -> (*const libc::sockaddr, libc::socklen_t) {
    (
      (&raw const self.raw).cast(),
      size_of::<libc::sockaddr_in>() as libc::socklen_t,
    )
  }

  fn as_raw_mut(&mut self) -> (*mut libc::sockaddr, libc::socklen_t) {
    (
      (&raw mut self.raw).cast(),
      size_of::<libc::sockaddr_in>() as libc::socklen_t,
    )
  }

  fn set_raw_len(&mut self, _len: libc::socklen_t) {}
}

impl PartialEq for Ipv4Address {
  fn eq(&self, other: &Self) -> bool {
    self.ip() == other.ip() && self.port() == other.port()
  }
}

impl Eq for Ipv4Address {}

impl From<SocketAddrV4> for Ipv4Address {
  fn from(address: SocketAddrV4) -> Self {
    Self::new(*address.ip(), address.port())
  }
}

impl From<Ipv4Address> for SocketAddrV4 {
  fn from(address: Ipv4Address) -> Self {
    SocketAddrV4::new(address.ip(), address.port())
  }
}

impl fmt::Display for Ipv4Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.ip(), self.port())
  }
}

impl fmt::Debug for Ipv4Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Ipv4Address({self})")
  }
}

#[derive(Clone, Copy)]
pub struct UnixAddress {
  raw: libc::sockaddr_un,
  len: libc::socklen_t,
}

impl UnixAddress {
  /// `sun_path` minus the nul terminator.
  pub const MAX_PATH_LEN: usize = 107;

  pub fn new(path: impl AsRef<Path>) -> Result<Self> {
    let bytes = path.as_ref().as_os_str().as_bytes();
    // a leading nul would name an abstract socket
    if bytes.is_empty() {
      return Err(Error::InvalidAddress(String::new()));
    }
    if bytes.contains(&0) {
      return Err(Error::InteriorNul);
    }
    if bytes.len() > Self::MAX_PATH_LEN {
      return Err(Error::PathTooLong {
        len: bytes.len(),
        max: Self::MAX_PATH_LEN,
      });
    }

    let mut address = Self::empty();
    for (target, byte) in address.raw.sun_path.iter_mut().zip(bytes) {
      *target = *byte as libc::c_char;
    }
    address.len = (offset_of!(libc::sockaddr_un, sun_path) + bytes.len() + 1) as libc::socklen_t;

    Ok(address)
  }

  /// Empty for unnamed sockets.
  pub fn path(&self) -> &Path {
    let offset = offset_of!(libc::sockaddr_un, sun_path);
    let available = (self.len as usize).saturating_sub(offset).min(self.raw.sun_path.len());
    // Safety: c_char and u8 share a layout, and `available` never exceeds sun_path
    let bytes = unsafe { core::slice::from_raw_parts(self.raw.sun_path.as_ptr().cast::<u8>(), available) };
    let end = bytes.iter().position(|byte| *byte == 0).unwrap_or(bytes.len());
    Path::new(OsStr::from_bytes(&bytes[..end]))
  }
}

impl SocketAddress for UnixAddress {
  fn family() -> libc::sa_family_t {
    libc::AF_UNIX as libc::sa_family_t
  }

  fn empty() -> Self {
    // Safety: plain old data, all zeroes is valid
    let mut raw: libc::sockaddr_un = unsafe { core::mem::zeroed() };
    raw.sun_family = libc::AF_UNIX as libc::sa_family_t;
    Self {
      raw,
      len: size_of::<libc::sockaddr_un>() as libc::socklen_t,
    }
  }

  fn as_raw(&self) -> (*const libc::sockaddr, libc::socklen_t) {
    ((&raw const self.raw).cast(), self.len)
  }

  fn as_raw_mut(&mut self) -> (*mut libc::sockaddr, libc::socklen_t) {
    (
      (&raw mut self.raw).cast(),
      size_of::<libc::sockaddr_un>() as libc::socklen_t,
    )
  }

  fn set_raw_len(&mut self, len: libc::socklen_t) {
    self.len = len.min(size_of::<libc::sockaddr_un>() as libc::socklen_t);
  }
}

impl PartialEq for UnixAddress {
  fn eq(&self, other: &Self) -> bool {
    self.path() == other.path()
  }
}

impl Eq for UnixAddress {}

impl fmt::Debug for UnixAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("UnixAddress").field(&self.path()).finish()
  }
}
