use core::ffi::CStr;

use num_traits::{PrimInt, Signed};
use syscalls::{Sysno, syscall};

use crate::error::OsError;

pub use syscalls::Errno;

pub mod io;
pub mod sys;

pub type RawHandle = libc::c_int;
pub const INVALID_HANDLE: RawHandle = -1;

pub fn last_errno() -> i32 {
  // Safety: __errno_location always returns a valid pointer to this thread's errno
  unsafe { *libc::__errno_location() }
}

/// The `strerror_r` text for an errno value.
pub fn describe_errno(code: i32) -> String {
  let mut buffer = [0u8; 256];
  // Safety: buffer is writable for its full length, the xsi variant always nul terminates on success
  let result = unsafe { libc::strerror_r(code, buffer.as_mut_ptr().cast(), buffer.len()) };
  if result == 0
    && let Ok(message) = CStr::from_bytes_until_nul(&buffer)
  {
    return message.to_string_lossy().into_owned();
  }

  format!("unknown error {code}")
}

/// Runs a libc call and turns the `-1` failure sentinel into an [`OsError`] carrying the current errno.
pub fn sys_call<R: PrimInt + Signed>(call: impl FnOnce() -> R) -> Result<R, OsError> {
  let result = call();
  if result == -R::one() {
    return Err(OsError::last());
  }

  Ok(result)
}

pub fn sys_call_void<R: PrimInt + Signed>(call: impl FnOnce() -> R) -> Result<(), OsError> {
  sys_call(call).map(|_| ())
}

pub fn sys_close(handle: RawHandle) -> Result<(), OsError> {
  unsafe { syscall!(Sysno::close, handle) }.map_err(|errno| OsError::from_code(errno.into_raw()))?;

  Ok(())
}
