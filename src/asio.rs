//! The poll-once protocol that turns non-blocking syscalls into futures.
//!
//! A [`Poller`] makes exactly one attempt per call. `None` means the descriptor would block, anything else is
//! final. Awaiters wrap a poller into a [`Future`] and leave scheduling to whatever executor drives them.

use core::{
  pin::Pin,
  task::{Context, Poll},
  time::Duration,
};
use std::time::Instant;

use crate::error::{Error, Result};

pub trait Poller {
  type Output;

  fn poll(&mut self) -> Option<Result<Self::Output>>;

  /// Retries until a final result, never giving up.
  fn infinite(self) -> InfiniteAwaiter<Self>
  where
    Self: Sized,
  {
    InfiniteAwaiter::new(self)
  }

  /// Retries until a final result or until `timeout` has passed since this call.
  fn timed(self, timeout: Duration) -> TimedAwaiter<Self>
  where
    Self: Sized,
  {
    TimedAwaiter::new(self, timeout)
  }
}

impl<P: Poller + ?Sized> Poller for &mut P {
  type Output = P::Output;

  fn poll(&mut self) -> Option<Result<Self::Output>> {
    P::poll(self)
  }
}

/// Maps would-block to "not yet" and keeps every other outcome final.
pub fn retry_on_would_block<T>(result: Result<T>) -> Option<Result<T>> {
  match result {
    Err(error) if error.is_would_block() => None,
    other => Some(other),
  }
}

pub fn poll_fn<T, F: FnMut() -> Option<Result<T>>>(f: F) -> FnPoller<F> {
  FnPoller(f)
}

pub struct FnPoller<F>(F);

impl<T, F: FnMut() -> Option<Result<T>>> Poller for FnPoller<F> {
  type Output = T;

  fn poll(&mut self) -> Option<Result<T>> {
    (self.0)()
  }
}

#[must_use = "awaiters do nothing unless awaited"]
pub struct InfiniteAwaiter<P> {
  poller: P,
}

impl<P: Poller> InfiniteAwaiter<P> {
  pub fn new(poller: P) -> Self {
    Self { poller }
  }

  pub fn into_inner(self) -> P {
    self.poller
  }
}

impl<P: Poller + Unpin> Future for InfiniteAwaiter<P> {
  type Output = Result<P::Output>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    match self.get_mut().poller.poll() {
      Some(result) => Poll::Ready(result),
      None => {
        // nothing registers the descriptor with a reactor, so ask to be polled again
        cx.waker().wake_by_ref();
        Poll::Pending
      }
    }
  }
}

#[must_use = "awaiters do nothing unless awaited"]
pub struct TimedAwaiter<P> {
  poller: P,
  timeout: Duration,
  deadline: Instant,
}

impl<P: Poller> TimedAwaiter<P> {
  pub fn new(poller: P, timeout: Duration) -> Self {
    Self {
      poller,
      timeout,
      deadline: Instant::now() + timeout,
    }
  }

  pub fn deadline(&self) -> Instant {
    self.deadline
  }
}

impl<P: Poller + Unpin> Future for TimedAwaiter<P> {
  type Output = Result<P::Output>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    // always attempt once so a zero timeout can still succeed
    if let Some(result) = this.poller.poll() {
      return Poll::Ready(result);
    }

    if Instant::now() >= this.deadline {
      tracing::trace!(timeout = ?this.timeout, "awaiter timed out");
      return Poll::Ready(Err(Error::TimedOut(this.timeout)));
    }

    cx.waker().wake_by_ref();
    Poll::Pending
  }
}
