use core::{
  pin::pin,
  task::{Context, Poll, Waker},
};

use tracing_subscriber::EnvFilter;

/// Spins a future to completion. Fine for fdio's awaiters, which re-arm themselves on every pending poll.
pub fn block_on<T>(future: impl Future<Output = T>) -> T {
  let mut future = pin!(future);

  let mut cx = Context::from_waker(Waker::noop());
  loop {
    match future.as_mut().poll(&mut cx) {
      Poll::Ready(value) => return value,
      Poll::Pending => continue,
    }
  }
}

/// `RUST_LOG` style filtering, `info` when unset.
pub fn init_logging() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_target(true)
    .try_init();
}
