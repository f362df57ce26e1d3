use super::ServiceModel;
use crate::error::Result;
use crate::point::ServicePointCore;
use crate::proxy::ServiceInterface;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::debug;

/// Builds once, on first request, and returns the intercepted implementation
/// itself.
pub(crate) struct PrimitiveServiceModel<I: ?Sized> {
  core: Arc<ServicePointCore<I>>,
  service: OnceCell<Arc<I>>,
}

impl<I: ?Sized + ServiceInterface> PrimitiveServiceModel<I> {
  pub(crate) fn new(core: Arc<ServicePointCore<I>>) -> Self {
    Self {
      core,
      service: OnceCell::new(),
    }
  }
}

impl<I: ?Sized + ServiceInterface> ServiceModel<I> for PrimitiveServiceModel<I> {
  fn get_service(&self) -> Result<Arc<I>> {
    if let Some(service) = self.service.get() {
      return Ok(service.clone());
    }

    let _guard = self.core.enter_construction()?;
    self
      .service
      .get_or_try_init(|| {
        debug!(service_id = self.core.service_id(), "constructing primitive service");
        let implementation = self.core.construct_service_implementation()?;
        self.core.clear_constructor_information();
        Ok(implementation.service)
      })
      .cloned()
  }

  fn instantiate_service(&self) -> Result<()> {
    self.get_service().map(drop)
  }
}
