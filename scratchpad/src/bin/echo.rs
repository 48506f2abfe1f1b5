use core::time::Duration;

use fdio::{
  Ipv4Address, Listening, Result, Socket, SocketOptions,
  buffer::{FixedBuffer, GrowableBuffer},
  prelude::*,
};
use futures::future::join;
use scratchpad::{block_on, init_logging};

async fn serve(listener: Socket<Ipv4Address, Listening>) -> Result<usize> {
  let mut connection = listener.aaccept_timeout(Duration::from_secs(5)).await?;
  tracing::info!(peer = %connection.peer_address(), "client connected");

  let mut buffer = FixedBuffer::<16>::new();
  let mut echoed = 0;
  loop {
    let read = connection.aread(&mut buffer).await?;
    if read == 0 {
      return Ok(echoed);
    }

    while buffer.is_readable() {
      let written = connection.awrite(buffer.read_region()).await?;
      buffer.mark_read(written);
      echoed += written;
    }
  }
}

async fn talk(target: Ipv4Address) -> Result<Vec<u8>> {
  let mut connection = SocketOptions::new(target).non_blocking(true).create()?.aconnect().await?;
  let message = b"the quick brown fox jumps over the lazy dog";
  connection.awrite_all(message).await?;

  let mut buffer = GrowableBuffer::with_capacity(64);
  while buffer.readable_len() < message.len() {
    buffer.reserve(16);
    if connection.aread_timeout(&mut buffer, Duration::from_secs(5)).await? == 0 {
      break;
    }
  }

  Ok(buffer.into_vec())
}

fn main() -> Result<()> {
  init_logging();

  let listener = SocketOptions::new(Ipv4Address::localhost(0))
    .non_blocking(true)
    .create()?
    .bind_listen(8)?;
  let target = listener.local_address()?;
  tracing::info!(%target, "listening");

  // the client closes its end once it has its reply, which ends the server loop
  let (served, reply) = block_on(join(serve(listener), talk(target)));

  let reply = reply?;
  tracing::info!(echoed = served?, reply = %String::from_utf8_lossy(&reply), "done");
  Ok(())
}
