//! Type-erased service values and the optional lifecycle hooks they carry.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Lifecycle callbacks for pooled service implementations.
pub trait PoolManageable: Send + Sync {
  /// Called when the instance is bound to a thread.
  fn activate_service(&self);
  /// Called when the instance is unbound and returned to the pool.
  fn passivate_service(&self);
}

/// Called when a threaded service implementation is discarded at thread cleanup.
pub trait Discardable: Send + Sync {
  fn thread_did_discard_service(&self);
}

/// Notified once when the registry shuts down.
pub trait RegistryShutdownListener: Send + Sync {
  fn registry_did_shutdown(&self);
}

/// Optional hooks attached to a core implementation.
#[derive(Clone, Default)]
pub struct Lifecycle {
  pub(crate) pool: Option<Arc<dyn PoolManageable>>,
  pub(crate) discard: Option<Arc<dyn Discardable>>,
  pub(crate) shutdown: Option<Arc<dyn RegistryShutdownListener>>,
}

impl Lifecycle {
  pub(crate) fn activate(&self) {
    if let Some(pool) = &self.pool {
      pool.activate_service();
    }
  }

  pub(crate) fn passivate(&self) {
    if let Some(pool) = &self.pool {
      pool.passivate_service();
    }
  }

  pub(crate) fn discard(&self) {
    if let Some(discard) = &self.discard {
      discard.thread_did_discard_service();
    }
  }

  pub(crate) fn shut_down(&self) {
    if let Some(listener) = &self.shutdown {
      listener.registry_did_shutdown();
    }
  }
}

/// A service object whose interface is known only at runtime.
///
/// Holds an `Arc<T>` (typically `Arc<dyn Trait>`) behind `dyn Any`, plus the
/// lifecycle hooks of the underlying implementation. Constructors and
/// factories produce these; the registry checks them against the service
/// point's declared interface with [`downcast`](Self::downcast).
#[derive(Clone)]
pub struct ServiceObject {
  inner: Arc<dyn Any + Send + Sync>,
  type_id: TypeId,
  type_name: &'static str,
  lifecycle: Lifecycle,
}

impl ServiceObject {
  pub fn new<T: ?Sized + Send + Sync + 'static>(object: Arc<T>) -> Self {
    Self {
      inner: Arc::new(object),
      type_id: TypeId::of::<T>(),
      type_name: std::any::type_name::<T>(),
      lifecycle: Lifecycle::default(),
    }
  }

  /// Attaches activation/passivation hooks used by the pooled service model.
  pub fn with_pool_hooks(mut self, hooks: Arc<dyn PoolManageable>) -> Self {
    self.lifecycle.pool = Some(hooks);
    self
  }

  /// Attaches the hook run when a threaded service model discards this object.
  pub fn with_discard_hook(mut self, hook: Arc<dyn Discardable>) -> Self {
    self.lifecycle.discard = Some(hook);
    self
  }

  /// Registers `listener` with the registry's shutdown coordinator once the
  /// object has been accepted as a core implementation.
  pub fn with_shutdown_listener(mut self, listener: Arc<dyn RegistryShutdownListener>) -> Self {
    self.lifecycle.shutdown = Some(listener);
    self
  }

  /// Returns the object as `Arc<T>` when it holds exactly that type.
  pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
    self.inner.downcast_ref::<Arc<T>>().cloned()
  }

  pub fn is<T: ?Sized + 'static>(&self) -> bool {
    self.type_id == TypeId::of::<T>()
  }

  /// Name of the held type, for diagnostics.
  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub(crate) fn lifecycle(&self) -> &Lifecycle {
    &self.lifecycle
  }
}

impl<T: ?Sized + Send + Sync + 'static> From<Arc<T>> for ServiceObject {
  fn from(object: Arc<T>) -> Self {
    Self::new(object)
  }
}

impl fmt::Debug for ServiceObject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ServiceObject")
      .field("type", &self.type_name)
      .field("pool_hooks", &self.lifecycle.pool.is_some())
      .field("discard_hook", &self.lifecycle.discard.is_some())
      .field("shutdown_listener", &self.lifecycle.shutdown.is_some())
      .finish()
  }
}
