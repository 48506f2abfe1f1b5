//! Owning and borrowed native handles.

use core::{fmt, marker::PhantomData, mem::ManuallyDrop};

use crate::platform::active::{INVALID_HANDLE, RawHandle, sys_close};

/// The release action an [`OwnedDescriptor`] runs exactly once.
pub trait Closer {
  fn close(&mut self, handle: RawHandle);
}

/// Closes through the platform `close` call. Failures are logged, not surfaced.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysCloser;

impl Closer for SysCloser {
  fn close(&mut self, handle: RawHandle) {
    match sys_close(handle) {
      Ok(()) => tracing::trace!(handle, "closed descriptor"),
      Err(error) => tracing::debug!(handle, %error, "failed to close descriptor"),
    }
  }
}

impl<F: FnMut(RawHandle)> Closer for F {
  fn close(&mut self, handle: RawHandle) {
    self(handle)
  }
}

/// Read-only access to the handle value. Shared by owning and borrowed descriptors and everything wrapping them.
pub trait AsHandle {
  fn as_handle(&self) -> BorrowedDescriptor<'_>;

  fn raw_handle(&self) -> RawHandle {
    self.as_handle().raw()
  }
}

impl<T: AsHandle + ?Sized> AsHandle for &T {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    T::as_handle(self)
  }
}

impl<T: AsHandle + ?Sized> AsHandle for &mut T {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    T::as_handle(self)
  }
}

pub struct OwnedDescriptor<C: Closer = SysCloser> {
  handle: RawHandle,
  closer: C,
}

impl OwnedDescriptor {
  /// # Safety
  /// `handle` must be open and not owned by anything else; it will be closed when this value drops.
  pub unsafe fn new(handle: RawHandle) -> Self {
    Self {
      handle,
      closer: SysCloser,
    }
  }
}

impl<C: Closer> OwnedDescriptor<C> {
  /// # Safety
  /// Same contract as [`OwnedDescriptor::new`], with `closer` as the release action.
  pub unsafe fn with_closer(handle: RawHandle, closer: C) -> Self {
    Self { handle, closer }
  }

  pub fn borrow(&self) -> BorrowedDescriptor<'_> {
    BorrowedDescriptor {
      handle: self.handle,
      _owner: PhantomData,
    }
  }

  pub fn raw(&self) -> RawHandle {
    self.handle
  }

  pub fn is_valid(&self) -> bool {
    self.handle != INVALID_HANDLE
  }

  /// Gives up ownership without closing. The descriptor is left holding the sentinel.
  pub fn release(&mut self) -> RawHandle {
    core::mem::replace(&mut self.handle, INVALID_HANDLE)
  }

  /// Moves ownership of the raw handle out to the caller.
  pub fn into_raw(self) -> RawHandle {
    let mut this = ManuallyDrop::new(self);
    let handle = this.release();
    // Safety: `this` is never touched again, so the closer is dropped exactly once here
    unsafe { core::ptr::drop_in_place(&mut this.closer) };
    handle
  }

  /// Closes now instead of on drop.
  pub fn close(mut self) {
    self.close_once();
  }

  fn close_once(&mut self) {
    let handle = self.release();
    if handle != INVALID_HANDLE {
      self.closer.close(handle);
    }
  }
}

impl<C: Closer> Drop for OwnedDescriptor<C> {
  fn drop(&mut self) {
    self.close_once();
  }
}

impl<C: Closer> AsHandle for OwnedDescriptor<C> {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    self.borrow()
  }
}

impl<C: Closer> fmt::Debug for OwnedDescriptor<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("OwnedDescriptor").field(&self.handle).finish()
  }
}

/// A handle value with no close responsibility. It can never be turned back into an owner.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BorrowedDescriptor<'a> {
  handle: RawHandle,
  _owner: PhantomData<&'a ()>,
}

impl BorrowedDescriptor<'_> {
  /// # Safety
  /// `handle` must stay open for the chosen lifetime.
  pub const unsafe fn borrow_raw(handle: RawHandle) -> Self {
    Self {
      handle,
      _owner: PhantomData,
    }
  }

  pub fn raw(&self) -> RawHandle {
    self.handle
  }
}

impl AsHandle for BorrowedDescriptor<'_> {
  fn as_handle(&self) -> BorrowedDescriptor<'_> {
    *self
  }
}

impl fmt::Debug for BorrowedDescriptor<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("BorrowedDescriptor").field(&self.handle).finish()
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;

  fn counting(handle: RawHandle) -> (OwnedDescriptor<impl Closer>, Rc<RefCell<Vec<RawHandle>>>) {
    let closed = Rc::new(RefCell::new(Vec::new()));
    let log = closed.clone();
    let descriptor = unsafe { OwnedDescriptor::with_closer(handle, move |handle| log.borrow_mut().push(handle)) };
    (descriptor, closed)
  }

  #[test]
  fn closes_once_on_drop() {
    let (descriptor, closed) = counting(42);
    drop(descriptor);
    assert_eq!(*closed.borrow(), [42]);
  }

  #[test]
  fn move_closes_once() {
    let (descriptor, closed) = counting(7);
    let moved = descriptor;
    let boxed = Box::new(moved);
    assert!(closed.borrow().is_empty());
    drop(boxed);
    assert_eq!(*closed.borrow(), [7]);
  }

  #[test]
  fn released_handle_is_not_closed() {
    let (mut descriptor, closed) = counting(9);
    assert_eq!(descriptor.release(), 9);
    assert!(!descriptor.is_valid());
    drop(descriptor);
    assert!(closed.borrow().is_empty());
  }

  #[test]
  fn into_raw_skips_close() {
    let (descriptor, closed) = counting(11);
    assert_eq!(descriptor.into_raw(), 11);
    assert!(closed.borrow().is_empty());
  }

  #[test]
  fn sentinel_is_never_closed() {
    let (descriptor, closed) = counting(INVALID_HANDLE);
    drop(descriptor);
    assert!(closed.borrow().is_empty());
  }

  #[test]
  fn borrow_shares_value() {
    let (descriptor, closed) = counting(3);
    let borrowed = descriptor.borrow();
    let copy = borrowed;
    assert_eq!(borrowed.raw(), 3);
    assert_eq!(copy.raw_handle(), descriptor.raw_handle());
    descriptor.close();
    assert_eq!(*closed.borrow(), [3]);
  }
}
