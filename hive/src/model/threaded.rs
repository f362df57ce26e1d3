use super::ServiceModel;
use crate::error::{Error, Result};
use crate::object::RegistryShutdownListener;
use crate::point::{Implementation, ServicePointCore};
use crate::proxy::{Dispatch, ServiceInterface};
use crate::thread::ThreadCleanupListener;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::debug;

struct ThreadedState<I: ?Sized> {
  core: Arc<ServicePointCore<I>>,
  active: DashMap<ThreadId, Implementation<I>>,
  shut_down: AtomicBool,
  this: Weak<Self>,
}

impl<I: ?Sized + ServiceInterface> ThreadedState<I> {
  fn bind(&self) -> Result<Arc<I>> {
    let notifier = self.core.module().thread_event_notifier()?;

    let implementation = {
      let _guard = self.core.enter_construction()?;
      debug!(service_id = self.core.service_id(), "constructing threaded service");
      self.core.construct_service_implementation()?
    };
    let service = implementation.service.clone();
    self.active.insert(thread::current().id(), implementation);

    if let Some(this) = self.this.upgrade() {
      notifier.add_thread_cleanup_listener(this);
    }
    Ok(service)
  }
}

impl<I: ?Sized + ServiceInterface> Dispatch<I> for ThreadedState<I> {
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

impl<I: ?Sized + ServiceInterface> ThreadCleanupListener for ThreadedState<I> {
  fn thread_did_cleanup(&self) {
    if let Some((_, implementation)) = self.active.remove(&thread::current().id()) {
      implementation.lifecycle.discard();
    }
  }
}

impl<I: ?Sized + ServiceInterface> RegistryShutdownListener for ThreadedState<I> {
  fn registry_did_shutdown(&self) {
    self.shut_down.store(true, Ordering::Release);
    let bound: Vec<Implementation<I>> = self
      .active
      .iter()
      .map(|entry| entry.value().clone())
      .collect();
    self.active.clear();
    for implementation in bound {
      implementation.lifecycle.shut_down();
    }
  }
}

/// Builds a fresh implementation for each thread and discards it at the
/// thread's cleanup.
pub(crate) struct ThreadedServiceModel<I: ?Sized> {
  proxy: Arc<I>,
}

impl<I: ?Sized + ServiceInterface> ThreadedServiceModel<I> {
  pub(crate) fn new(core: Arc<ServicePointCore<I>>) -> Result<Self> {
    let coordinator = core.module().shutdown_coordinator()?;
    let state = Arc::new_cyclic(|this| ThreadedState {
      core,
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

impl<I: ?Sized + ServiceInterface> ServiceModel<I> for ThreadedServiceModel<I> {
  fn get_service(&self) -> Result<Arc<I>> {
    Ok(self.proxy.clone())
  }

  fn instantiate_service(&self) -> Result<()> {
    Ok(())
  }
}
