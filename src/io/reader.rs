//! Buffered readers over any [`StreamRead`] source.
//!
//! A would-block from a non-blocking source counts as "nothing available yet": the call returns what it has so
//! far and [`ByteReader::is_eof`] stays false. Partial delimited reads are kept and resumed on the next call.

use crate::{
  buffer::{ReadableBuffer, RwBuffer},
  error::Result,
};

use super::StreamRead;

pub struct ByteReader<F, B> {
  source: F,
  buffer: B,
  pending: Vec<u8>,
  eof: bool,
}

impl<F: StreamRead, B: RwBuffer> ByteReader<F, B> {
  /// The buffer needs a non-zero capacity, otherwise every fill looks like end of input.
  pub fn new(source: F, buffer: B) -> Self {
    Self {
      source,
      buffer,
      pending: Vec::new(),
      eof: false,
    }
  }

  /// True once the source returned end of stream and every buffered byte has been handed out.
  pub fn is_eof(&self) -> bool {
    self.eof && !self.buffer.is_readable() && self.pending.is_empty()
  }

  pub fn get_ref(&self) -> &F {
    &self.source
  }

  pub fn get_mut(&mut self) -> &mut F {
    &mut self.source
  }

  pub fn into_inner(self) -> F {
    self.source
  }

  /// Refills when empty. Returns how many bytes arrived, 0 at end of input or when the source would block.
  fn fill(&mut self) -> Result<usize> {
    if self.buffer.is_readable() || self.eof {
      return Ok(0);
    }

    self.buffer.clear();
    match self.source.read(&mut self.buffer) {
      Ok(0) => {
        self.eof = true;
        Ok(0)
      }
      Ok(read) => Ok(read),
      Err(error) if error.is_would_block() => Ok(0),
      Err(error) => Err(error),
    }
  }

  /// The currently buffered bytes, refilled first if there were none. Consume them with [`ByteReader::consume`].
  ///
  /// Bytes held back by an unfinished [`ByteReader::read_until`] come first.
  pub fn read_buf(&mut self) -> Result<&[u8]> {
    if !self.pending.is_empty() {
      return Ok(self.pending.as_slice());
    }

    self.fill()?;
    Ok(self.buffer.read_region())
  }

  pub fn consume(&mut self, n: usize) -> usize {
    if !self.pending.is_empty() {
      let count = n.min(self.pending.len());
      self.pending.drain(..count);
      return count;
    }

    self.buffer.mark_read(n)
  }

  /// Copies into `out`, refilling at most once.
  pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
    let available = self.read_buf()?;
    let count = available.len().min(out.len());
    out[..count].copy_from_slice(&available[..count]);
    Ok(self.consume(count))
  }

  /// Up to `n` bytes; fewer only at end of input or when the source would block.
  pub fn read_n(&mut self, n: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
      let available = self.read_buf()?;
      if available.is_empty() {
        break;
      }

      let count = available.len().min(n - out.len());
      out.extend_from_slice(&available[..count]);
      self.consume(count);
    }

    Ok(out)
  }

  /// Everything up to end of input (or up to the point the source would block).
  pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
    let mut out = core::mem::take(&mut self.pending);
    loop {
      let available = self.read_buf()?;
      if available.is_empty() {
        return Ok(out);
      }

      out.extend_from_slice(available);
      let count = available.len();
      self.consume(count);
    }
  }

  /// Bytes up to, not including, `delimiter`, which is consumed.
  ///
  /// At end of input the remaining bytes come back without a delimiter. `None` when nothing is left, or when the
  /// source would block before a delimiter showed up; the bytes read so far are kept for the next call.
  pub fn read_until(&mut self, delimiter: u8) -> Result<Option<Vec<u8>>> {
    self.read_until_by(|byte| byte == delimiter)
  }

  pub fn read_until_by(&mut self, mut is_delimiter: impl FnMut(u8) -> bool) -> Result<Option<Vec<u8>>> {
    loop {
      self.fill()?;
      let available = self.buffer.read_region();
      if available.is_empty() {
        if self.eof && !self.pending.is_empty() {
          return Ok(Some(core::mem::take(&mut self.pending)));
        }
        return Ok(None);
      }

      match available.iter().position(|byte| is_delimiter(*byte)) {
        Some(index) => {
          self.pending.extend_from_slice(&available[..index]);
          self.buffer.mark_read(index + 1);
          return Ok(Some(core::mem::take(&mut self.pending)));
        }
        None => {
          self.pending.extend_from_slice(available);
          let count = available.len();
          self.buffer.mark_read(count);
        }
      }
    }
  }
}

pub struct LineReader<F, B> {
  reader: ByteReader<F, B>,
}

impl<F: StreamRead, B: RwBuffer> LineReader<F, B> {
  pub fn new(source: F, buffer: B) -> Self {
    Self {
      reader: ByteReader::new(source, buffer),
    }
  }

  /// The next line without its `\n` (or `\r\n`). `None` at end of input.
  pub fn read_line(&mut self) -> Result<Option<String>> {
    let Some(mut line) = self.reader.read_until(b'\n')? else {
      return Ok(None);
    };

    if line.last() == Some(&b'\r') {
      line.pop();
    }

    Ok(Some(match String::from_utf8(line) {
      Ok(line) => line,
      Err(error) => String::from_utf8_lossy(error.as_bytes()).into_owned(),
    }))
  }

  /// Every remaining line. Blank lines are kept.
  pub fn read_lines(&mut self) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    while let Some(line) = self.read_line()? {
      lines.push(line);
    }

    Ok(lines)
  }

  pub fn is_eof(&self) -> bool {
    self.reader.is_eof()
  }

  pub fn into_inner(self) -> ByteReader<F, B> {
    self.reader
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    buffer::{DynBuffer, FixedBuffer, GrowableBuffer, WritableBuffer},
    io::{StreamWrite, fs::OpenMode},
    platform::active::io::{file::LocalFile, pipe::Pipe},
    testing::TempPath,
  };

  const THREE_LINES: &[u8] = b"HELLO WORLD 0\nHELLO WORLD 1\nHELLO WORLD 2\n";

  /// Hands out its content a few bytes at a time.
  struct Chunked<'a> {
    data: &'a [u8],
    chunk: usize,
  }

  impl StreamRead for Chunked<'_> {
    fn read<B: WritableBuffer + ?Sized>(&mut self, buffer: &mut B) -> Result<usize> {
      let region = buffer.write_region();
      let count = region.len().min(self.chunk).min(self.data.len());
      region[..count].copy_from_slice(&self.data[..count]);
      self.data = &self.data[count..];
      Ok(buffer.mark_written(count))
    }
  }

  fn write_file(temp: &TempPath, content: &[u8]) {
    let mut file = LocalFile::open(temp.path(), OpenMode::WriteTruncate).unwrap();
    file.write_all(content).unwrap();
  }

  fn lines_with<B: RwBuffer>(buffer: B) -> Vec<Option<Vec<u8>>> {
    let temp = TempPath::new(&format!("reader-lines-{}", buffer.writable_len()));
    write_file(&temp, THREE_LINES);
    let file = LocalFile::open(temp.path(), OpenMode::Read).unwrap();
    let mut reader = ByteReader::new(file, buffer);
    (0..4).map(|_| reader.read_until(b'\n').unwrap()).collect()
  }

  #[test]
  fn tiny_buffer_matches_large_buffer() {
    let expected = vec![
      Some(b"HELLO WORLD 0".to_vec()),
      Some(b"HELLO WORLD 1".to_vec()),
      Some(b"HELLO WORLD 2".to_vec()),
      None,
    ];
    assert_eq!(lines_with(FixedBuffer::<5>::new()), expected);
    assert_eq!(lines_with(DynBuffer::with_capacity(2048)), expected);
  }

  #[test]
  fn whole_file_without_delimiter() {
    let temp = TempPath::new("reader-whole");
    write_file(&temp, b"HELLO WORLD");
    let file = LocalFile::open(temp.path(), OpenMode::Read).unwrap();
    let mut reader = ByteReader::new(file, FixedBuffer::<4>::new());
    assert_eq!(reader.read_until(b'\n').unwrap(), Some(b"HELLO WORLD".to_vec()));
    assert_eq!(reader.read_until(b'\n').unwrap(), None);
    assert!(reader.is_eof());
  }

  #[test]
  fn read_n_and_read_to_end() {
    let mut reader = ByteReader::new(Chunked { data: b"abcdefghij", chunk: 3 }, FixedBuffer::<4>::new());
    assert_eq!(reader.read_n(5).unwrap(), b"abcde");
    let mut out = [0u8; 2];
    assert_eq!(reader.read(&mut out).unwrap(), 1);
    assert_eq!(&out[..1], b"f");
    assert_eq!(reader.read_to_end().unwrap(), b"ghij");
    assert_eq!(reader.read_n(3).unwrap(), b"");
    assert!(reader.is_eof());
  }

  #[test]
  fn read_buf_then_consume() {
    let mut reader = ByteReader::new(Chunked { data: b"xyz", chunk: 8 }, GrowableBuffer::with_capacity(8));
    assert_eq!(reader.read_buf().unwrap(), b"xyz");
    assert_eq!(reader.consume(2), 2);
    assert_eq!(reader.read_buf().unwrap(), b"z");
  }

  #[test]
  fn custom_delimiter_predicate() {
    let mut reader = ByteReader::new(Chunked { data: b"a,b;c", chunk: 2 }, FixedBuffer::<3>::new());
    let mut split = || reader.read_until_by(|byte| byte == b',' || byte == b';').unwrap();
    assert_eq!(split(), Some(b"a".to_vec()));
    assert_eq!(split(), Some(b"b".to_vec()));
    assert_eq!(split(), Some(b"c".to_vec()));
    assert_eq!(split(), None);
  }

  #[test]
  fn held_back_bytes_come_first() {
    let (reader_end, mut writer_end) = Pipe::open(true).unwrap();
    let mut reader = ByteReader::new(reader_end, FixedBuffer::<16>::new());

    writer_end.write_all(b"abc").unwrap();
    assert_eq!(reader.read_until(b'\n').unwrap(), None);
    writer_end.write_all(b"def\n").unwrap();
    assert_eq!(reader.read_n(7).unwrap(), b"abcdef\n");

    writer_end.write_all(b"xyz").unwrap();
    assert_eq!(reader.read_until(b'\n').unwrap(), None);
    let mut out = [0u8; 2];
    assert_eq!(reader.read(&mut out).unwrap(), 2);
    assert_eq!(&out, b"xy");
    assert_eq!(reader.read_buf().unwrap(), b"z");

    writer_end.write_all(b"!\n").unwrap();
    assert_eq!(reader.read_until(b'\n').unwrap(), Some(b"z!".to_vec()));
  }

  #[test]
  fn line_reader_keeps_blank_lines() {
    let source = Chunked {
      data: b"first\r\n\nthird\nlast",
      chunk: 4,
    };
    let mut reader = LineReader::new(source, FixedBuffer::<6>::new());
    assert_eq!(reader.read_lines().unwrap(), ["first", "", "third", "last"]);
    assert!(reader.is_eof());
    assert_eq!(reader.read_line().unwrap(), None);
  }

  #[test]
  fn would_block_keeps_partial_line() {
    let (reader_end, mut writer_end) = Pipe::open(true).unwrap();
    let mut reader = LineReader::new(reader_end, FixedBuffer::<8>::new());

    assert_eq!(reader.read_line().unwrap(), None);
    assert!(!reader.is_eof());

    writer_end.write_all(b"partial ").unwrap();
    assert_eq!(reader.read_line().unwrap(), None);

    writer_end.write_all(b"line\nnext").unwrap();
    assert_eq!(reader.read_line().unwrap().as_deref(), Some("partial line"));

    drop(writer_end);
    assert_eq!(reader.read_line().unwrap().as_deref(), Some("next"));
    assert_eq!(reader.read_line().unwrap(), None);
    assert!(reader.is_eof());
  }
}
