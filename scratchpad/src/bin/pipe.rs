use core::time::Duration;

use fdio::{Pipe, Result, buffer::FixedBuffer, io::reader::LineReader, prelude::*};
use scratchpad::init_logging;

fn main() -> Result<()> {
  init_logging();

  let (reader, mut writer) = Pipe::open(true)?;
  tracing::info!(readable = reader.is_readable(None)?, "fresh pipe");

  writer.write_all(b"first line\nsecond line\n")?;
  tracing::info!(readable = reader.is_readable(Some(Duration::from_millis(100)))?, "after write");
  drop(writer);

  let mut lines = LineReader::new(reader, FixedBuffer::<8>::new());
  for line in lines.read_lines()? {
    tracing::info!(%line, "read");
  }

  Ok(())
}
