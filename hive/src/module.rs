//! The registry as seen from inside one module.

use crate::class::ClassResolver;
use crate::error::{Error, Result};
use crate::error_log::ErrorLog;
use crate::location::Location;
use crate::object::ServiceObject;
use crate::proxy::ServiceInterface;
use crate::registry::RegistryInner;
use crate::shutdown::ShutdownCoordinator;
use crate::thread::ThreadEventNotifier;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// A handle on the registry scoped to one module.
///
/// Unqualified ids are resolved relative to the module, and the module's
/// private service and configuration points are visible through it. Factories
/// and interceptor factories receive the module that contributed them.
///
/// The handle does not keep the registry alive; once the registry is gone,
/// every lookup fails as if it had been shut down.
#[derive(Clone)]
pub struct Module {
  id: Arc<str>,
  error_log: ErrorLog,
  registry: Weak<RegistryInner>,
}

impl Module {
  pub(crate) fn new(id: &str, error_log: ErrorLog, registry: Weak<RegistryInner>) -> Self {
    Self {
      id: Arc::from(id),
      error_log,
      registry,
    }
  }

  pub fn module_id(&self) -> &str {
    &self.id
  }

  /// Qualifies `id` with this module's id unless it is already qualified.
  ///
  /// ```
  /// # use fibre_hive::{ModuleDescriptor, Registry};
  /// # let registry = Registry::builder().module(ModuleDescriptor::new("calc")).build();
  /// let module = registry.module("calc").unwrap();
  /// assert_eq!(module.expand_id("Adder"), "calc.Adder");
  /// assert_eq!(module.expand_id("other.Adder"), "other.Adder");
  /// ```
  pub fn expand_id(&self, id: &str) -> String {
    if id.contains('.') {
      id.to_owned()
    } else {
      format!("{}.{}", self.id, id)
    }
  }

  pub fn error_log(&self) -> &ErrorLog {
    &self.error_log
  }

  pub fn get_service<I: ?Sized + ServiceInterface>(&self, service_id: &str) -> Result<Arc<I>> {
    self
      .registry()?
      .service::<I>(&self.expand_id(service_id), Some(&self.id))
  }

  pub fn get_service_by_interface<I: ?Sized + ServiceInterface>(&self) -> Result<Arc<I>> {
    self.registry()?.service_by_interface::<I>(Some(&self.id))
  }

  pub fn get_service_object(&self, service_id: &str) -> Result<ServiceObject> {
    self
      .registry()?
      .service_object(&self.expand_id(service_id), Some(&self.id))
  }

  pub fn contains_service<I: ?Sized + ServiceInterface>(&self, service_id: &str) -> bool {
    self.registry().map_or(false, |registry| {
      registry.contains_service::<I>(&self.expand_id(service_id), Some(&self.id))
    })
  }

  pub fn get_configuration(&self, configuration_id: &str) -> Result<Vec<Value>> {
    self
      .registry()?
      .configuration(&self.expand_id(configuration_id), Some(&self.id))
  }

  pub fn get_configuration_as<T: DeserializeOwned>(&self, configuration_id: &str) -> Result<Vec<T>> {
    self
      .registry()?
      .configuration_as::<T>(&self.expand_id(configuration_id), Some(&self.id))
  }

  /// Reads a configuration point together with the location of the
  /// contribution behind each element.
  pub fn get_configuration_with_locations_as<T: DeserializeOwned>(
    &self,
    configuration_id: &str,
  ) -> Result<Vec<(T, Option<Location>)>> {
    self
      .registry()?
      .configuration_with_locations_as::<T>(&self.expand_id(configuration_id), Some(&self.id))
  }

  pub fn class_resolver(&self) -> Result<Arc<dyn ClassResolver>> {
    Ok(self.registry()?.class_resolver())
  }

  pub fn shutdown_coordinator(&self) -> Result<Arc<ShutdownCoordinator>> {
    Ok(self.registry()?.shutdown_coordinator())
  }

  pub fn thread_event_notifier(&self) -> Result<Arc<ThreadEventNotifier>> {
    Ok(self.registry()?.thread_event_notifier())
  }

  pub(crate) fn is_shut_down(&self) -> bool {
    self
      .registry
      .upgrade()
      .map_or(true, |registry| registry.is_shut_down())
  }

  // --- PRIVATE HELPERS ---

  fn registry(&self) -> Result<Arc<RegistryInner>> {
    self.registry.upgrade().ok_or_else(Error::shutdown)
  }
}

impl fmt::Debug for Module {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Module").field("id", &self.id).finish()
  }
}
