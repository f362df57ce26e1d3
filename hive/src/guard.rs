//! Detection of re-entrant service construction.

use crate::error::{Error, ErrorKind, Result};
use std::cell::RefCell;
use std::collections::HashSet;

thread_local! {
  // Service points whose implementation is being built on this thread.
  static CONSTRUCTING: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// An RAII guard marking a service point as under construction on this thread.
///
/// Entering a point that is already marked means its construction (directly
/// or through other services) asked for itself. Service models enter the
/// guard before touching their one-shot cells, which would otherwise deadlock
/// on re-entry; pooled and threaded points would recurse without bound.
pub(crate) struct ConstructionGuard {
  key: usize,
}

impl ConstructionGuard {
  /// `key` identifies the service point (its address), `service_id` is used
  /// in the error message.
  pub(crate) fn enter(key: usize, service_id: &str) -> Result<Self> {
    let inserted = CONSTRUCTING.with(|constructing| constructing.borrow_mut().insert(key));
    if !inserted {
      return Err(Error::new(
        ErrorKind::Construction,
        format!(
          "Service {} is already being constructed on this thread; its construction depends on itself.",
          service_id
        ),
      ));
    }
    Ok(Self { key })
  }
}

impl Drop for ConstructionGuard {
  fn drop(&mut self) {
    CONSTRUCTING.with(|constructing| {
      constructing.borrow_mut().remove(&self.key);
    });
  }
}
