//! The service registry: the runtime product of a set of module descriptors.

mod builder;

pub use builder::{RegistryBuilder, HIVE_MODULE_ID};

use crate::class::ClassResolver;
use crate::configuration::ConfigurationPoint;
use crate::error::{Error, ErrorKind, Result};
use crate::error_log::ErrorLog;
use crate::location::Location;
use crate::module::Module;
use crate::object::ServiceObject;
use crate::point::{ServicePoint, ServicePointDefinition, ServicePointEntry};
use crate::proxy::ServiceInterface;
use crate::shutdown::ShutdownCoordinator;
use crate::thread::ThreadEventNotifier;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) struct RegistryInner {
  modules: HashMap<String, Module>,
  service_points: HashMap<String, Arc<dyn ServicePointEntry>>,
  // Service ids in declaration order.
  service_ids: Vec<String>,
  configuration_points: HashMap<String, ConfigurationPoint>,
  class_resolver: Arc<dyn ClassResolver>,
  shutdown: Arc<ShutdownCoordinator>,
  threads: Arc<ThreadEventNotifier>,
  // Set once every shutdown listener has run; lookups fail from then on.
  invalidated: AtomicBool,
  error_log: ErrorLog,
}

impl RegistryInner {
  pub(crate) fn class_resolver(&self) -> Arc<dyn ClassResolver> {
    self.class_resolver.clone()
  }

  pub(crate) fn shutdown_coordinator(&self) -> Arc<ShutdownCoordinator> {
    self.shutdown.clone()
  }

  pub(crate) fn thread_event_notifier(&self) -> Arc<ThreadEventNotifier> {
    self.threads.clone()
  }

  pub(crate) fn is_shut_down(&self) -> bool {
    self.invalidated.load(Ordering::Acquire)
  }

  /// Looks up a service point on behalf of `accessor` (a module id, or `None`
  /// for registry clients).
  fn entry(&self, service_id: &str, accessor: Option<&str>) -> Result<&Arc<dyn ServicePointEntry>> {
    if self.is_shut_down() {
      return Err(Error::shutdown());
    }
    let entry = self
      .service_points
      .get(service_id)
      .ok_or_else(|| Error::service_not_found(service_id))?;
    if !entry.definition().is_visible_to(accessor) {
      return Err(Error::not_visible("Service point", service_id, accessor));
    }
    Ok(entry)
  }

  pub(crate) fn service<I: ?Sized + ServiceInterface>(
    &self,
    service_id: &str,
    accessor: Option<&str>,
  ) -> Result<Arc<I>> {
    let entry = self.entry(service_id, accessor)?;
    typed_point::<I>(&**entry)?.get_service()
  }

  pub(crate) fn service_object(&self, service_id: &str, accessor: Option<&str>) -> Result<ServiceObject> {
    self.entry(service_id, accessor)?.service_object()
  }

  pub(crate) fn service_by_interface<I: ?Sized + ServiceInterface>(
    &self,
    accessor: Option<&str>,
  ) -> Result<Arc<I>> {
    if self.is_shut_down() {
      return Err(Error::shutdown());
    }
    let matching: Vec<&String> = self
      .service_ids
      .iter()
      .filter(|id| {
        self.service_points.get(id.as_str()).map_or(false, |entry| {
          let definition = entry.definition();
          definition.interface_type_id() == TypeId::of::<I>() && definition.is_visible_to(accessor)
        })
      })
      .collect();

    match matching.as_slice() {
      [] => Err(Error::new(
        ErrorKind::NotFound,
        format!("There is no service point for interface {}.", I::interface_name()),
      )),
      [service_id] => self.service::<I>(service_id, accessor),
      several => Err(Error::new(
        ErrorKind::Ambiguous,
        format!(
          "There are multiple service points for interface {}: {}.",
          I::interface_name(),
          several
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
        ),
      )),
    }
  }

  pub(crate) fn contains_service<I: ?Sized + ServiceInterface>(
    &self,
    service_id: &str,
    accessor: Option<&str>,
  ) -> bool {
    self.service_points.get(service_id).map_or(false, |entry| {
      let definition = entry.definition();
      definition.interface_type_id() == TypeId::of::<I>() && definition.is_visible_to(accessor)
    })
  }

  fn configuration_point(&self, configuration_id: &str, accessor: Option<&str>) -> Result<&ConfigurationPoint> {
    if self.is_shut_down() {
      return Err(Error::shutdown());
    }
    let point = self
      .configuration_points
      .get(configuration_id)
      .ok_or_else(|| Error::configuration_not_found(configuration_id))?;
    if !point.is_visible_to(accessor) {
      return Err(Error::not_visible("Configuration point", configuration_id, accessor));
    }
    Ok(point)
  }

  pub(crate) fn configuration(&self, configuration_id: &str, accessor: Option<&str>) -> Result<Vec<Value>> {
    Ok(self.configuration_point(configuration_id, accessor)?.elements())
  }

  pub(crate) fn configuration_as<T: DeserializeOwned>(
    &self,
    configuration_id: &str,
    accessor: Option<&str>,
  ) -> Result<Vec<T>> {
    self.configuration_point(configuration_id, accessor)?.elements_as()
  }

  pub(crate) fn configuration_with_locations_as<T: DeserializeOwned>(
    &self,
    configuration_id: &str,
    accessor: Option<&str>,
  ) -> Result<Vec<(T, Option<Location>)>> {
    self
      .configuration_point(configuration_id, accessor)?
      .elements_with_locations_as()
  }
}

fn typed_point<I: ?Sized + ServiceInterface>(entry: &dyn ServicePointEntry) -> Result<&ServicePoint<I>> {
  entry.as_any().downcast_ref::<ServicePoint<I>>().ok_or_else(|| {
    let definition = entry.definition();
    Error::interface_mismatch(format!(
      "Service point {} implements interface {}, not {}.",
      definition.service_id(),
      definition.interface_type_name(),
      I::interface_name()
    ))
  })
}

/// A built registry of service and configuration points.
///
/// Cloning is cheap; clones share the same registry.
///
/// ```
/// use fibre_hive::{service_interface, DefaultClassResolver, ModuleDescriptor, Registry, ServicePointDescriptor};
/// use std::sync::Arc;
///
/// service_interface! {
///   pub trait Greeter {
///     fn greet(&self, name: String) -> String;
///   }
/// }
///
/// struct English;
/// impl Greeter for English {
///   fn greet(&self, name: String) -> String {
///     format!("Hello, {}!", name)
///   }
/// }
///
/// let classes = DefaultClassResolver::new();
/// classes.register_interface::<dyn Greeter>("demo.Greeter");
/// classes.register_service::<dyn Greeter, _>("demo.English", |_| Ok(Arc::new(English)));
///
/// let registry = Registry::builder()
///   .class_resolver(Arc::new(classes))
///   .module(
///     ModuleDescriptor::new("demo")
///       .service_point(ServicePointDescriptor::new("Greeter", "demo.Greeter").create_instance("demo.English")),
///   )
///   .build();
///
/// let greeter = registry.get_service::<dyn Greeter>("demo.Greeter").unwrap();
/// assert_eq!(greeter.greet("hive".into()), "Hello, hive!");
/// ```
#[derive(Clone)]
pub struct Registry {
  inner: Arc<RegistryInner>,
}

impl Registry {
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::new()
  }

  /// Returns the service with the fully qualified id `service_id`.
  ///
  /// Private service points are not visible here.
  pub fn get_service<I: ?Sized + ServiceInterface>(&self, service_id: &str) -> Result<Arc<I>> {
    self.inner.service::<I>(service_id, None)
  }

  /// Returns the only public service implementing `I`.
  pub fn get_service_by_interface<I: ?Sized + ServiceInterface>(&self) -> Result<Arc<I>> {
    self.inner.service_by_interface::<I>(None)
  }

  /// Returns a service without naming its interface.
  pub fn get_service_object(&self, service_id: &str) -> Result<ServiceObject> {
    self.inner.service_object(service_id, None)
  }

  /// Whether a public service point `service_id` implementing `I` exists.
  pub fn contains_service<I: ?Sized + ServiceInterface>(&self, service_id: &str) -> bool {
    self.inner.contains_service::<I>(service_id, None)
  }

  /// Ids of all service points, in declaration order.
  pub fn service_ids(&self) -> Vec<String> {
    self.inner.service_ids.clone()
  }

  pub fn service_definition(&self, service_id: &str) -> Option<ServicePointDefinition> {
    self
      .inner
      .service_points
      .get(service_id)
      .map(|entry| entry.definition().clone())
  }

  /// Returns the elements contributed to a public configuration point.
  pub fn get_configuration(&self, configuration_id: &str) -> Result<Vec<Value>> {
    self.inner.configuration(configuration_id, None)
  }

  /// Like [`get_configuration`](Self::get_configuration), deserializing each element.
  pub fn get_configuration_as<T: DeserializeOwned>(&self, configuration_id: &str) -> Result<Vec<T>> {
    self.inner.configuration_as::<T>(configuration_id, None)
  }

  pub fn contains_configuration(&self, configuration_id: &str) -> bool {
    self
      .inner
      .configuration_points
      .get(configuration_id)
      .map_or(false, |point| point.is_visible_to(None))
  }

  /// The registry as seen from inside module `module_id`.
  pub fn module(&self, module_id: &str) -> Option<Module> {
    self.inner.modules.get(module_id).cloned()
  }

  pub fn error_log(&self) -> &ErrorLog {
    &self.inner.error_log
  }

  pub fn shutdown_coordinator(&self) -> Arc<ShutdownCoordinator> {
    self.inner.shutdown_coordinator()
  }

  pub fn thread_event_notifier(&self) -> Arc<ThreadEventNotifier> {
    self.inner.thread_event_notifier()
  }

  /// Ends the calling thread's unit of work: pooled services bound to it are
  /// returned to their pools, threaded services are discarded.
  pub fn cleanup_thread(&self) {
    self.inner.threads.fire_thread_cleanup();
  }

  /// Shuts the registry down: fires every shutdown listener once, then
  /// invalidates the registry.
  ///
  /// Listeners may still look up services while they run. Afterwards every
  /// lookup and every call through a previously obtained proxy fails with
  /// [`ErrorKind::Shutdown`]. Calling it again does nothing.
  pub fn shutdown(&self) {
    if self.inner.shutdown.is_shut_down() {
      return;
    }
    info!("shutting down registry");
    self.inner.shutdown.shutdown();
    self.inner.invalidated.store(true, Ordering::Release);
  }

  pub fn is_shut_down(&self) -> bool {
    self.inner.is_shut_down()
  }
}

impl fmt::Debug for Registry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("modules", &self.inner.modules.len())
      .field("service_points", &self.inner.service_points.len())
      .field("configuration_points", &self.inner.configuration_points.len())
      .field("shut_down", &self.inner.is_shut_down())
      .finish()
  }
}
