use super::ServiceModel;
use crate::error::{Error, Result};
use crate::object::RegistryShutdownListener;
use crate::point::{Implementation, ServicePointCore};
use crate::proxy::{Dispatch, ServiceInterface};
use crate::thread::ThreadCleanupListener;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::debug;

struct PoolState<I: ?Sized> {
  core: Arc<ServicePointCore<I>>,
  // Idle implementations, reused most-recently-returned first.
  free: Mutex<Vec<Implementation<I>>>,
  active: DashMap<ThreadId, Implementation<I>>,
  shut_down: AtomicBool,
  this: Weak<Self>,
}

impl<I: ?Sized + ServiceInterface> PoolState<I> {
  /// Takes an idle implementation, building a new one when the pool is empty.
  fn obtain(&self) -> Result<Implementation<I>> {
    if let Some(implementation) = self.free.lock().pop() {
      return Ok(implementation);
    }

    let _guard = self.core.enter_construction()?;
    debug!(service_id = self.core.service_id(), "pool empty, constructing pooled service");
    self.core.construct_service_implementation()
  }

  fn bind(&self) -> Result<Arc<I>> {
    let notifier = self.core.module().thread_event_notifier()?;
    let implementation = self.obtain()?;

    implementation.lifecycle.activate();
    let service = implementation.service.clone();
    self.active.insert(thread::current().id(), implementation);

    if let Some(this) = self.this.upgrade() {
      notifier.add_thread_cleanup_listener(this);
    }
    Ok(service)
  }
}

impl<I: ?Sized + ServiceInterface> Dispatch<I> for PoolState<I> {
  fn resolve(&self) -> Result<Arc<I>> {
    if self.shut_down.load(Ordering::Acquire) {
      return Err(Error::shutdown());
    }
    let bound = self
      .active
      .get(&thread::current().id())
      .map(|implementation| implementation.service.clone());
    match bound {
      Some(service) => Ok(service),
      None => self.bind(),
    }
  }
}

impl<I: ?Sized + ServiceInterface> ThreadCleanupListener for PoolState<I> {
  fn thread_did_cleanup(&self) {
    let Some((_, implementation)) = self.active.remove(&thread::current().id()) else {
      return;
    };
    implementation.lifecycle.passivate();
    if !self.shut_down.load(Ordering::Acquire) {
      self.free.lock().push(implementation);
    }
  }
}

impl<I: ?Sized + ServiceInterface> RegistryShutdownListener for PoolState<I> {
  fn registry_did_shutdown(&self) {
    self.shut_down.store(true, Ordering::Release);
    self.free.lock().clear();
  }
}

/// Binds an implementation to each calling thread until the thread's
/// cleanup, then returns it to the pool for reuse by any thread.
pub(crate) struct PooledServiceModel<I: ?Sized> {
  proxy: Arc<I>,
}

impl<I: ?Sized + ServiceInterface> PooledServiceModel<I> {
  pub(crate) fn new(core: Arc<ServicePointCore<I>>) -> Result<Self> {
    let coordinator = core.module().shutdown_coordinator()?;
    let state = Arc::new_cyclic(|this| PoolState {
      core,
      free: Mutex::new(Vec::new()),
      active: DashMap::new(),
      shut_down: AtomicBool::new(false),
      this: this.clone(),
    });
    coordinator.add_listener(state.clone());
    Ok(Self {
      proxy: I::delegate(state),
    })
  }
}

impl<I: ?Sized + ServiceInterface> ServiceModel<I> for PooledServiceModel<I> {
  fn get_service(&self) -> Result<Arc<I>> {
    Ok(self.proxy.clone())
  }

  // Implementations are only built on demand, per thread.
  fn instantiate_service(&self) -> Result<()> {
    Ok(())
  }
}
