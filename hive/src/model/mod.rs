//! Service models: when and how often a service point's implementation is built.

mod pooled;
mod primitive;
mod singleton;
mod threaded;

use crate::error::Result;
use crate::point::ServicePointCore;
use crate::proxy::ServiceInterface;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub(crate) use pooled::PooledServiceModel;
pub(crate) use primitive::PrimitiveServiceModel;
pub(crate) use singleton::SingletonServiceModel;
pub(crate) use threaded::ThreadedServiceModel;

/// The service model of a service point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceModelKind {
  /// Built on first request and handed out directly, without a proxy.
  Primitive,
  /// A stable proxy building the implementation on its first method call.
  #[default]
  Singleton,
  /// One instance per thread, taken from and returned to a pool at thread
  /// cleanup.
  Pooled,
  /// One instance per thread, discarded at thread cleanup.
  Threaded,
}

impl ServiceModelKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ServiceModelKind::Primitive => "primitive",
      ServiceModelKind::Singleton => "singleton",
      ServiceModelKind::Pooled => "pooled",
      ServiceModelKind::Threaded => "threaded",
    }
  }
}

impl fmt::Display for ServiceModelKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Strategy behind a service point's `get_service`.
pub(crate) trait ServiceModel<I: ?Sized>: Send + Sync {
  /// The object handed to clients.
  fn get_service(&self) -> Result<Arc<I>>;

  /// Builds the implementation now, for eager loading.
  fn instantiate_service(&self) -> Result<()>;
}

pub(crate) fn create<I: ?Sized + ServiceInterface>(
  core: Arc<ServicePointCore<I>>,
) -> Result<Box<dyn ServiceModel<I>>> {
  let model: Box<dyn ServiceModel<I>> = match core.definition().model() {
    ServiceModelKind::Primitive => Box::new(PrimitiveServiceModel::new(core)),
    ServiceModelKind::Singleton => Box::new(SingletonServiceModel::new(core)?),
    ServiceModelKind::Pooled => Box::new(PooledServiceModel::new(core)?),
    ServiceModelKind::Threaded => Box::new(ThreadedServiceModel::new(core)?),
  };
  Ok(model)
}
