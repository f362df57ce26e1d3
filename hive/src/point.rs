//! Service points: the registry's unit of service declaration.
//!
//! A [`ServicePoint`] pairs the declarative definition of a service with the
//! machinery that builds it: a constructor for the core implementation, the
//! ordered interceptor contributions, and the service model deciding when the
//! two are invoked.

use crate::descriptor::{Occurrences, Visibility};
use crate::error::{Error, Result};
use crate::factory::ServiceImplementationConstructor;
use crate::guard::ConstructionGuard;
use crate::interceptor::{InterceptorContribution, InterceptorStackImpl};
use crate::location::Location;
use crate::model::{self, ServiceModel, ServiceModelKind};
use crate::module::Module;
use crate::object::{Lifecycle, ServiceObject};
use crate::orderer::Orderer;
use crate::proxy::ServiceInterface;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::{debug, debug_span};

/// The read-only description of a service point.
#[derive(Debug, Clone)]
pub struct ServicePointDefinition {
  pub(crate) service_id: String,
  pub(crate) module_id: String,
  pub(crate) interface_name: String,
  pub(crate) interface_type_name: &'static str,
  pub(crate) interface_type_id: TypeId,
  pub(crate) visibility: Visibility,
  pub(crate) parameters_occurs: Occurrences,
  pub(crate) model: ServiceModelKind,
  pub(crate) location: Option<Location>,
}

impl ServicePointDefinition {
  /// Qualified service id (`module.id`).
  pub fn service_id(&self) -> &str {
    &self.service_id
  }

  /// Id of the declaring module.
  pub fn module_id(&self) -> &str {
    &self.module_id
  }

  /// The interface name used in the descriptor.
  pub fn interface_name(&self) -> &str {
    &self.interface_name
  }

  /// Rust name of the interface trait.
  pub fn interface_type_name(&self) -> &'static str {
    self.interface_type_name
  }

  pub fn interface_type_id(&self) -> TypeId {
    self.interface_type_id
  }

  pub fn visibility(&self) -> Visibility {
    self.visibility
  }

  pub fn parameters_occurs(&self) -> Occurrences {
    self.parameters_occurs
  }

  pub fn model(&self) -> ServiceModelKind {
    self.model
  }

  pub fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }

  /// Whether code in `module_id` (or a registry client, for `None`) may
  /// access the point.
  pub fn is_visible_to(&self, module_id: Option<&str>) -> bool {
    match self.visibility {
      Visibility::Public => true,
      Visibility::Private => module_id == Some(self.module_id.as_str()),
    }
  }
}

/// Everything the registry builder gathered for one service point.
pub(crate) struct ServicePointSpec {
  pub(crate) definition: ServicePointDefinition,
  pub(crate) module: Module,
  pub(crate) constructor: Option<Arc<dyn ServiceImplementationConstructor>>,
  pub(crate) interceptors: Vec<InterceptorContribution>,
}

/// A core implementation together with its lifecycle hooks.
pub(crate) struct Implementation<I: ?Sized> {
  pub(crate) service: Arc<I>,
  pub(crate) lifecycle: Lifecycle,
}

impl<I: ?Sized> Clone for Implementation<I> {
  fn clone(&self) -> Self {
    Self {
      service: self.service.clone(),
      lifecycle: self.lifecycle.clone(),
    }
  }
}

/// The part of a service point shared with its service model.
pub(crate) struct ServicePointCore<I: ?Sized> {
  definition: ServicePointDefinition,
  module: Module,
  constructor: Mutex<Option<Arc<dyn ServiceImplementationConstructor>>>,
  interceptors: Mutex<Option<Arc<[InterceptorContribution]>>>,
  marker: std::marker::PhantomData<fn() -> Arc<I>>,
}

impl<I: ?Sized + ServiceInterface> ServicePointCore<I> {
  fn new(spec: ServicePointSpec) -> Self {
    let interceptors = order_interceptors(&spec);
    Self {
      definition: spec.definition,
      module: spec.module,
      constructor: Mutex::new(spec.constructor),
      interceptors: Mutex::new(Some(interceptors.into())),
      marker: std::marker::PhantomData,
    }
  }

  pub(crate) fn definition(&self) -> &ServicePointDefinition {
    &self.definition
  }

  pub(crate) fn service_id(&self) -> &str {
    &self.definition.service_id
  }

  pub(crate) fn module(&self) -> &Module {
    &self.module
  }

  /// Marks the point as under construction on this thread.
  pub(crate) fn enter_construction(&self) -> Result<ConstructionGuard> {
    let key = self as *const Self as *const () as usize;
    ConstructionGuard::enter(key, self.service_id())
  }

  /// Builds the core implementation and wraps it in the interceptors.
  ///
  /// Any failure is reported as a construction error for this service.
  pub(crate) fn construct_service_implementation(&self) -> Result<Implementation<I>> {
    let span = debug_span!("construct", service_id = %self.definition.service_id);
    let _entered = span.enter();

    let core = self
      .construct_core_service_implementation()
      .map_err(|e| Error::construction(self.service_id(), e))?;
    let service = self
      .add_interceptors(core.service)
      .map_err(|e| Error::construction(self.service_id(), e))?;
    Ok(Implementation {
      service,
      lifecycle: core.lifecycle,
    })
  }

  /// Builds the bare core implementation, without interceptors.
  pub(crate) fn construct_core_service_implementation(&self) -> Result<Implementation<I>> {
    let constructor = self.constructor.lock().clone().ok_or_else(|| {
      Error::configuration(format!(
        "No implementation has been contributed for service point {}.",
        self.service_id()
      ))
      .at(self.definition.location.clone())
    })?;

    let object = constructor.construct_core_service_implementation(&self.definition)?;
    let service = self.accept(&object, constructor.location())?;
    let lifecycle = object.lifecycle().clone();

    // Threaded instances come and go with their threads; the threaded model
    // forwards shutdown to the ones still bound.
    if self.definition.model() != ServiceModelKind::Threaded {
      if let Some(listener) = &lifecycle.shutdown {
        self.module.shutdown_coordinator()?.add_listener(listener.clone());
      }
    }

    debug!(implementation = object.type_name(), "core implementation constructed");
    Ok(Implementation { service, lifecycle })
  }

  fn accept(&self, object: &ServiceObject, location: Option<&Location>) -> Result<Arc<I>> {
    object.downcast::<I>().ok_or_else(|| {
      let at = location
        .map(|l| l.to_string())
        .unwrap_or_else(|| "an unknown location".to_owned());
      Error::interface_mismatch(format!(
        "The implementation constructed at {} is a {}, which does not implement interface {} of service point {}.",
        at,
        object.type_name(),
        self.definition.interface_name,
        self.service_id()
      ))
      .at(location.cloned())
    })
  }

  fn add_interceptors(&self, core: Arc<I>) -> Result<Arc<I>> {
    let contributions = self.interceptors.lock().clone();
    let contributions = match contributions {
      Some(contributions) if !contributions.is_empty() => contributions,
      _ => return Ok(core),
    };

    let mut stack = InterceptorStackImpl::new(self.service_id(), core);
    // The first interceptor in runtime order must end up outermost.
    for contribution in contributions.iter().rev() {
      contribution.create_interceptor(&mut stack)?;
    }
    Ok(stack.into_top())
  }

  /// Drops the constructor and interceptor contributions once they can no
  /// longer be needed.
  pub(crate) fn clear_constructor_information(&self) {
    debug!(service_id = self.service_id(), "clearing constructor information");
    *self.constructor.lock() = None;
    *self.interceptors.lock() = None;
  }
}

fn order_interceptors(spec: &ServicePointSpec) -> Vec<InterceptorContribution> {
  if spec.interceptors.len() < 2 {
    return spec.interceptors.clone();
  }

  let mut orderer = Orderer::new(
    spec.module.error_log().clone(),
    format!("interceptor contribution for service {}", spec.definition.service_id),
  );
  for contribution in &spec.interceptors {
    orderer.add_at(
      contribution.clone(),
      contribution.name(),
      contribution.preceding_ids(),
      contribution.following_ids(),
      contribution.location().cloned(),
    );
  }
  orderer.ordered()
}

/// A type-erased service point, as stored by the registry.
pub(crate) trait ServicePointEntry: Send + Sync {
  fn definition(&self) -> &ServicePointDefinition;

  /// The service as a [`ServiceObject`] holding an `Arc<dyn Interface>`.
  fn service_object(&self) -> Result<ServiceObject>;

  /// Forces construction of the implementation, as for eager loading.
  fn instantiate(&self) -> Result<()>;

  fn as_any(&self) -> &dyn Any;
}

/// A service point for interface `I`.
pub(crate) struct ServicePoint<I: ?Sized> {
  core: Arc<ServicePointCore<I>>,
  model: OnceCell<Box<dyn ServiceModel<I>>>,
}

impl<I: ?Sized + ServiceInterface> ServicePoint<I> {
  pub(crate) fn new(spec: ServicePointSpec) -> Self {
    Self {
      core: Arc::new(ServicePointCore::new(spec)),
      model: OnceCell::new(),
    }
  }

  fn model(&self) -> Result<&dyn ServiceModel<I>> {
    self
      .model
      .get_or_try_init(|| model::create(self.core.clone()))
      .map(|model| model.as_ref())
  }

  /// Returns the service, built according to the point's service model.
  pub(crate) fn get_service(&self) -> Result<Arc<I>> {
    if self.core.module().is_shut_down() {
      return Err(Error::shutdown());
    }
    self.model()?.get_service()
  }
}

impl<I: ?Sized + ServiceInterface> ServicePointEntry for ServicePoint<I> {
  fn definition(&self) -> &ServicePointDefinition {
    self.core.definition()
  }

  fn service_object(&self) -> Result<ServiceObject> {
    self.get_service().map(ServiceObject::new)
  }

  fn instantiate(&self) -> Result<()> {
    if self.core.module().is_shut_down() {
      return Err(Error::shutdown());
    }
    self.model()?.instantiate_service()
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}
