use super::ServiceModel;
use crate::error::{Error, Result};
use crate::object::RegistryShutdownListener;
use crate::point::ServicePointCore;
use crate::proxy::{Dispatch, ServiceInterface};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The indirection behind a singleton's proxy: empty until the first call,
/// then bound to the intercepted implementation for good.
struct SingletonDispatch<I: ?Sized> {
  core: Arc<ServicePointCore<I>>,
  service: OnceCell<Arc<I>>,
  shut_down: AtomicBool,
}

impl<I: ?Sized + ServiceInterface> SingletonDispatch<I> {
  fn service(&self) -> Result<Arc<I>> {
    if let Some(service) = self.service.get() {
      return Ok(service.clone());
    }

    let _guard = self.core.enter_construction()?;
    self
      .service
      .get_or_try_init(|| {
        debug!(service_id = self.core.service_id(), "constructing singleton service");
        let implementation = self.core.construct_service_implementation()?;
        self.core.clear_constructor_information();
        Ok(implementation.service)
      })
      .cloned()
  }
}

impl<I: ?Sized + ServiceInterface> Dispatch<I> for SingletonDispatch<I> {
  fn resolve(&self) -> Result<Arc<I>> {
    if self.shut_down.load(Ordering::Acquire) {
      return Err(Error::shutdown());
    }
    self.service()
  }
}

impl<I: ?Sized + ServiceInterface> RegistryShutdownListener for SingletonDispatch<I> {
  fn registry_did_shutdown(&self) {
    self.shut_down.store(true, Ordering::Release);
  }
}

/// Hands out one proxy for the registry's lifetime; the implementation is
/// built on the proxy's first method call.
pub(crate) struct SingletonServiceModel<I: ?Sized> {
  dispatch: Arc<SingletonDispatch<I>>,
  proxy: Arc<I>,
}

impl<I: ?Sized + ServiceInterface> SingletonServiceModel<I> {
  pub(crate) fn new(core: Arc<ServicePointCore<I>>) -> Result<Self> {
    let coordinator = core.module().shutdown_coordinator()?;
    let dispatch = Arc::new(SingletonDispatch {
      core,
      service: OnceCell::new(),
      shut_down: AtomicBool::new(false),
    });
    coordinator.add_listener(dispatch.clone());
    let proxy = I::delegate(dispatch.clone());
    Ok(Self { dispatch, proxy })
  }
}

impl<I: ?Sized + ServiceInterface> ServiceModel<I> for SingletonServiceModel<I> {
  fn get_service(&self) -> Result<Arc<I>> {
    Ok(self.proxy.clone())
  }

  fn instantiate_service(&self) -> Result<()> {
    self.dispatch.resolve().map(drop)
  }
}
