use std::{ffi::CString, os::unix::ffi::OsStrExt, path::Path};

use crate::error::{Error, Result};

pub mod file;
pub mod net;
pub mod pipe;
pub mod stdio;

fn path_to_cstring(path: &Path) -> Result<CString> {
  CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::InteriorNul)
}
