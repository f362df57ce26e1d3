use crate::object::RegistryShutdownListener;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Collects shutdown listeners and notifies each of them exactly once.
#[derive(Default)]
pub struct ShutdownCoordinator {
  listeners: Mutex<Vec<Arc<dyn RegistryShutdownListener>>>,
  shut_down: AtomicBool,
}

impl ShutdownCoordinator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a listener. Listeners added after shutdown are notified immediately.
  pub fn add_listener(&self, listener: Arc<dyn RegistryShutdownListener>) {
    {
      let mut listeners = self.listeners.lock();
      if !self.shut_down.load(Ordering::Acquire) {
        listeners.push(listener);
        return;
      }
    }
    listener.registry_did_shutdown();
  }

  /// Notifies every listener, in registration order. Later calls do nothing.
  pub fn shutdown(&self) {
    let listeners = {
      let mut listeners = self.listeners.lock();
      if self.shut_down.swap(true, Ordering::AcqRel) {
        return;
      }
      std::mem::take(&mut *listeners)
    };

    debug!(listeners = listeners.len(), "notifying registry shutdown listeners");
    for listener in listeners {
      listener.registry_did_shutdown();
    }
  }

  pub fn is_shut_down(&self) -> bool {
    self.shut_down.load(Ordering::Acquire)
  }
}

impl std::fmt::Debug for ShutdownCoordinator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ShutdownCoordinator")
      .field("listeners", &self.listeners.lock().len())
      .field("shut_down", &self.is_shut_down())
      .finish()
  }
}
