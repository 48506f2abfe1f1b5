use fdio::{LocalFile, Result, buffer::FixedBuffer, io::fs::OpenMode, prelude::*, stdout};
use scratchpad::init_logging;

fn main() -> Result<()> {
  init_logging();

  let mut out = stdout();
  let mut buffer = FixedBuffer::<4096>::new();
  for path in std::env::args_os().skip(1) {
    let mut file = LocalFile::open(&path, OpenMode::Read)?;
    while file.read(&mut buffer)? != 0 {
      out.write_all(buffer.read_region())?;
      buffer.reset();
    }
  }

  Ok(())
}
