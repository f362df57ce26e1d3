//! Per-thread cleanup notifications.
//!
//! Pooled and threaded services bind an implementation to the calling thread.
//! The binding lasts until that thread calls
//! [`Registry::cleanup_thread`](crate::Registry::cleanup_thread), typically at
//! the end of a unit of work such as a request.

use dashmap::DashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Notified when the thread it was registered on performs cleanup.
pub trait ThreadCleanupListener: Send + Sync {
  fn thread_did_cleanup(&self);
}

/// Per-thread lists of cleanup listeners.
#[derive(Default)]
pub struct ThreadEventNotifier {
  listeners: DashMap<ThreadId, Vec<Arc<dyn ThreadCleanupListener>>>,
}

impl ThreadEventNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `listener` for the current thread.
  pub fn add_thread_cleanup_listener(&self, listener: Arc<dyn ThreadCleanupListener>) {
    self
      .listeners
      .entry(thread::current().id())
      .or_default()
      .push(listener);
  }

  /// Notifies and then forgets every listener registered by the current thread.
  pub fn fire_thread_cleanup(&self) {
    // Remove first: listeners may re-register while being notified.
    let listeners = self.listeners.remove(&thread::current().id());
    if let Some((_, listeners)) = listeners {
      for listener in listeners {
        listener.thread_did_cleanup();
      }
    }
  }

  /// Number of threads that currently have listeners registered.
  pub fn registered_threads(&self) -> usize {
    self.listeners.len()
  }
}
