use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
  Start(u64),
  Current(i64),
  End(i64),
}

pub trait SeekableFile {
  /// Returns the new offset from the start of the file.
  fn seek(&mut self, seek_from: SeekFrom) -> Result<u64>;

  fn position(&mut self) -> Result<u64> {
    self.seek(SeekFrom::Current(0))
  }

  fn seek_start(&mut self, offset: u64) -> Result<u64> {
    self.seek(SeekFrom::Start(offset))
  }

  fn seek_current(&mut self, offset: i64) -> Result<u64> {
    self.seek(SeekFrom::Current(offset))
  }

  fn seek_end(&mut self, offset: i64) -> Result<u64> {
    self.seek(SeekFrom::End(offset))
  }
}

pub trait SizedFile: SeekableFile {
  /// Leaves the cursor where it was.
  fn file_size(&mut self) -> Result<u64> {
    let position = self.position()?;
    let size = self.seek(SeekFrom::End(0))?;
    self.seek(SeekFrom::Start(position))?;
    Ok(size)
  }

  fn set_len(&mut self, len: u64) -> Result<()>;
}

pub trait SyncFile {
  fn sync(&mut self) -> Result<()>;
  fn sync_data(&mut self) -> Result<()>;
}

/// The fixed open modes. Every mode that writes also creates the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
  Read,
  WriteTruncate,
  WriteAppend,
  ReadWriteTruncate,
  ReadWriteAppend,
}

impl OpenMode {
  pub fn reads(self) -> bool {
    matches!(self, OpenMode::Read | OpenMode::ReadWriteTruncate | OpenMode::ReadWriteAppend)
  }

  pub fn writes(self) -> bool {
    !matches!(self, OpenMode::Read)
  }

  pub fn truncates(self) -> bool {
    matches!(self, OpenMode::WriteTruncate | OpenMode::ReadWriteTruncate)
  }

  pub fn appends(self) -> bool {
    matches!(self, OpenMode::WriteAppend | OpenMode::ReadWriteAppend)
  }
}
