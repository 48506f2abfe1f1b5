use core::time::Duration;

use thiserror::Error;

use crate::platform::active::{Errno, describe_errno, last_errno};

/// A failed syscall: the raw errno plus the platform's description of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (os error {})", .errno.into_raw())]
pub struct OsError {
  errno: Errno,
  message: String,
}

impl OsError {
  pub fn from_code(code: i32) -> Self {
    Self {
      errno: Errno::new(code),
      message: describe_errno(code),
    }
  }

  /// Captures the calling thread's current errno. Must be read before anything else can clobber it.
  pub fn last() -> Self {
    Self::from_code(last_errno())
  }

  pub fn errno(&self) -> Errno {
    self.errno
  }

  pub fn code(&self) -> i32 {
    self.errno.into_raw()
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  /// `EAGAIN`/`EWOULDBLOCK`: the descriptor is not ready, retry later.
  pub fn is_would_block(&self) -> bool {
    let code = self.code();
    code == libc::EAGAIN || code == libc::EWOULDBLOCK
  }

  /// `EINPROGRESS`/`EALREADY`: a non-blocking connect has not finished yet.
  pub fn is_in_progress(&self) -> bool {
    let code = self.code();
    code == libc::EINPROGRESS || code == libc::EALREADY
  }

  pub fn is_interrupted(&self) -> bool {
    self.code() == libc::EINTR
  }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
  #[error(transparent)]
  Os(#[from] OsError),
  #[error("operation timed out after {0:?}")]
  TimedOut(Duration),
  #[error("socket path is {len} bytes long, at most {max} are allowed")]
  PathTooLong { len: usize, max: usize },
  #[error("path contains an interior nul byte")]
  InteriorNul,
  #[error("invalid address: {0}")]
  InvalidAddress(String),
  #[error("write made no progress")]
  WriteZero,
}

impl Error {
  pub fn os_error(&self) -> Option<&OsError> {
    match self {
      Error::Os(error) => Some(error),
      _ => None,
    }
  }

  pub fn is_would_block(&self) -> bool {
    self.os_error().is_some_and(OsError::is_would_block)
  }

  pub fn is_timed_out(&self) -> bool {
    matches!(self, Error::TimedOut(_))
  }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
