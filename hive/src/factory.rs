//! Construction of core service implementations.

use crate::class::Class;
use crate::error::{Error, Result};
use crate::error_log::ErrorLog;
use crate::location::Location;
use crate::module::Module;
use crate::object::ServiceObject;
use crate::point::ServicePointDefinition;
use crate::service_interface;
use crate::shutdown::ShutdownCoordinator;
use crate::thread::ThreadEventNotifier;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::TypeId;
use std::sync::Arc;
use tracing::{debug, debug_span, Span};

/// Everything a factory or implementation class learns about the service
/// point it is building for.
#[derive(Debug, Clone)]
pub struct FactoryContext {
  service_id: String,
  interface_name: String,
  interface_type_id: TypeId,
  module: Module,
  parameters: Vec<Value>,
  location: Option<Location>,
}

impl FactoryContext {
  pub(crate) fn new(
    definition: &ServicePointDefinition,
    module: Module,
    parameters: Vec<Value>,
    location: Option<Location>,
  ) -> Self {
    Self {
      service_id: definition.service_id().to_owned(),
      interface_name: definition.interface_name().to_owned(),
      interface_type_id: definition.interface_type_id(),
      module,
      parameters,
      location,
    }
  }

  /// Qualified id of the service point being built.
  pub fn service_id(&self) -> &str {
    &self.service_id
  }

  /// The interface name used in the service point's descriptor.
  pub fn interface_name(&self) -> &str {
    &self.interface_name
  }

  pub fn interface_type_id(&self) -> TypeId {
    self.interface_type_id
  }

  /// Whether the service point's interface is `I`.
  pub fn is_interface<I: ?Sized + 'static>(&self) -> bool {
    self.interface_type_id == TypeId::of::<I>()
  }

  /// The module that contributed the builder; service ids are resolved
  /// relative to it.
  pub fn invoking_module(&self) -> &Module {
    &self.module
  }

  pub fn parameters(&self) -> &[Value] {
    &self.parameters
  }

  /// Deserializes every parameter into `T`.
  pub fn parameters_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
    self
      .parameters
      .iter()
      .map(|parameter| {
        serde_json::from_value(parameter.clone()).map_err(|e| {
          Error::configuration(format!(
            "Invalid parameter for service {}: {}",
            self.service_id, e
          ))
          .at(self.location.clone())
          .caused_by(e)
        })
      })
      .collect()
  }

  pub fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }

  pub fn error_log(&self) -> &ErrorLog {
    self.module.error_log()
  }

  /// A span for the factory's own events, tagged with the service id.
  pub fn span(&self) -> Span {
    debug_span!("factory", service_id = %self.service_id)
  }

  pub fn shutdown_coordinator(&self) -> Result<Arc<ShutdownCoordinator>> {
    self.module.shutdown_coordinator()
  }

  pub fn thread_event_notifier(&self) -> Result<Arc<ThreadEventNotifier>> {
    self.module.thread_event_notifier()
  }
}

service_interface! {
  /// A service that builds core implementations for `invoke_factory` builders.
  pub trait ServiceImplementationFactory {
    fn create_core_service_implementation(&self, context: &FactoryContext) -> Result<ServiceObject>;
  }
}

/// Produces a core implementation for one service point.
///
/// A service point owns its constructor until the point no longer needs it
/// (after the first build for primitive and singleton services).
pub trait ServiceImplementationConstructor: Send + Sync {
  fn construct_core_service_implementation(
    &self,
    definition: &ServicePointDefinition,
  ) -> Result<ServiceObject>;

  /// Where the builder was declared, for error messages.
  fn location(&self) -> Option<&Location>;
}

/// Instantiates a named implementation class.
pub(crate) struct CreateInstanceConstructor {
  class_name: String,
  module: Module,
  location: Option<Location>,
}

impl CreateInstanceConstructor {
  pub(crate) fn new(class_name: String, module: Module, location: Option<Location>) -> Self {
    Self {
      class_name,
      module,
      location,
    }
  }
}

impl ServiceImplementationConstructor for CreateInstanceConstructor {
  fn construct_core_service_implementation(
    &self,
    definition: &ServicePointDefinition,
  ) -> Result<ServiceObject> {
    let class = self
      .module
      .class_resolver()?
      .find_class(&self.class_name)
      .map_err(|e| e.at(self.location.clone()))?;

    let implementation = match class {
      Class::Implementation(implementation) => implementation,
      Class::Interface(_) => {
        return Err(
          Error::configuration(format!(
            "Class {} is an interface and cannot be instantiated.",
            self.class_name
          ))
          .at(self.location.clone()),
        )
      }
    };

    debug!(
      service_id = definition.service_id(),
      class = %self.class_name,
      "instantiating implementation class"
    );
    let context = FactoryContext::new(
      definition,
      self.module.clone(),
      Vec::new(),
      self.location.clone(),
    );
    implementation.instantiate(&context)
  }

  fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }
}

/// Delegates construction to a [`ServiceImplementationFactory`] service.
pub(crate) struct InvokeFactoryConstructor {
  factory_service_id: String,
  parameters: Vec<Value>,
  module: Module,
  location: Option<Location>,
}

impl InvokeFactoryConstructor {
  pub(crate) fn new(
    factory_service_id: String,
    parameters: Vec<Value>,
    module: Module,
    location: Option<Location>,
  ) -> Self {
    Self {
      factory_service_id,
      parameters,
      module,
      location,
    }
  }
}

impl ServiceImplementationConstructor for InvokeFactoryConstructor {
  fn construct_core_service_implementation(
    &self,
    definition: &ServicePointDefinition,
  ) -> Result<ServiceObject> {
    let expected = definition.parameters_occurs();
    if !expected.in_range(self.parameters.len()) {
      self.module.error_log().error(
        format!(
          "Service point {} expects {} factory parameters, but {} were contributed.",
          definition.service_id(),
          expected.as_str(),
          self.parameters.len()
        ),
        self.location.as_ref(),
      );
    }

    let factory = self
      .module
      .get_service::<dyn ServiceImplementationFactory>(&self.factory_service_id)
      .map_err(|e| e.at(self.location.clone()))?;

    debug!(
      service_id = definition.service_id(),
      factory = %self.factory_service_id,
      "invoking service implementation factory"
    );
    let context = FactoryContext::new(
      definition,
      self.module.clone(),
      self.parameters.clone(),
      self.location.clone(),
    );
    factory.create_core_service_implementation(&context)
  }

  fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }
}
