//! Class resolution: turning names in module descriptors into interfaces and
//! implementation constructors.
//!
//! Descriptors refer to service interfaces and implementation classes by
//! name. A [`ClassResolver`] maps those names onto [`InterfaceClass`]es (which
//! know how to build a typed service point for their `dyn Trait`) and
//! [`ImplementationClass`]es (constructors producing a [`ServiceObject`]).

use crate::error::{Error, Result};
use crate::factory::{FactoryContext, ServiceImplementationFactory};
use crate::interceptor::ServiceInterceptorFactory;
use crate::logging::LoggingInterceptorFactory;
use crate::object::ServiceObject;
use crate::point::{ServicePoint, ServicePointEntry, ServicePointSpec};
use crate::proxy::ServiceInterface;
use dashmap::DashMap;
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Interface name of [`ServiceInterceptorFactory`] in descriptors.
pub const SERVICE_INTERCEPTOR_FACTORY: &str = "hive.ServiceInterceptorFactory";
/// Interface name of [`ServiceImplementationFactory`] in descriptors.
pub const SERVICE_IMPLEMENTATION_FACTORY: &str = "hive.ServiceImplementationFactory";
/// Class name of the built-in logging interceptor factory.
pub const LOGGING_INTERCEPTOR_FACTORY: &str = "hive.LoggingInterceptorFactory";

// Erased operations on a service interface `I`.
trait InterfaceOps: Send + Sync {
  fn type_id(&self) -> TypeId;
  fn type_name(&self) -> &'static str;
  fn create_service_point(&self, spec: ServicePointSpec) -> Arc<dyn ServicePointEntry>;
}

struct TypedInterface<I: ?Sized>(PhantomData<fn() -> Arc<I>>);

impl<I: ?Sized + ServiceInterface> InterfaceOps for TypedInterface<I> {
  fn type_id(&self) -> TypeId {
    TypeId::of::<I>()
  }

  fn type_name(&self) -> &'static str {
    I::interface_name()
  }

  fn create_service_point(&self, spec: ServicePointSpec) -> Arc<dyn ServicePointEntry> {
    Arc::new(ServicePoint::<I>::new(spec))
  }
}

/// A resolved service interface.
#[derive(Clone)]
pub struct InterfaceClass {
  name: String,
  ops: Arc<dyn InterfaceOps>,
}

impl InterfaceClass {
  pub fn of<I: ?Sized + ServiceInterface>(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ops: Arc::new(TypedInterface::<I>(PhantomData)),
    }
  }

  /// The name the interface was registered under.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// The Rust name of the interface trait.
  pub fn type_name(&self) -> &'static str {
    self.ops.type_name()
  }

  pub fn type_id(&self) -> TypeId {
    self.ops.type_id()
  }

  pub(crate) fn create_service_point(&self, spec: ServicePointSpec) -> Arc<dyn ServicePointEntry> {
    self.ops.create_service_point(spec)
  }
}

impl fmt::Debug for InterfaceClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InterfaceClass")
      .field("name", &self.name)
      .field("type", &self.type_name())
      .finish()
  }
}

type Instantiator = dyn Fn(&FactoryContext) -> Result<ServiceObject> + Send + Sync;

/// A named implementation constructor, the target of `create_instance` builders.
#[derive(Clone)]
pub struct ImplementationClass {
  name: String,
  instantiator: Arc<Instantiator>,
}

impl ImplementationClass {
  pub fn new(
    name: impl Into<String>,
    instantiator: impl Fn(&FactoryContext) -> Result<ServiceObject> + Send + Sync + 'static,
  ) -> Self {
    Self {
      name: name.into(),
      instantiator: Arc::new(instantiator),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn instantiate(&self, context: &FactoryContext) -> Result<ServiceObject> {
    (self.instantiator)(context)
  }
}

impl fmt::Debug for ImplementationClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ImplementationClass")
      .field("name", &self.name)
      .finish_non_exhaustive()
  }
}

/// Anything a descriptor can name.
#[derive(Debug, Clone)]
pub enum Class {
  Interface(InterfaceClass),
  Implementation(ImplementationClass),
}

/// Resolves names used in module descriptors.
pub trait ClassResolver: Send + Sync {
  /// Fails with [`ErrorKind::ClassResolution`](crate::ErrorKind::ClassResolution)
  /// for unknown names.
  fn find_class(&self, name: &str) -> Result<Class>;
}

/// A [`ClassResolver`] backed by explicit registrations.
///
/// Comes with the built-in names: the two factory interfaces and the logging
/// interceptor factory.
pub struct DefaultClassResolver {
  classes: DashMap<String, Class>,
}

impl DefaultClassResolver {
  pub fn new() -> Self {
    let resolver = Self {
      classes: DashMap::new(),
    };
    resolver.register_interface::<dyn ServiceInterceptorFactory>(SERVICE_INTERCEPTOR_FACTORY);
    resolver.register_interface::<dyn ServiceImplementationFactory>(SERVICE_IMPLEMENTATION_FACTORY);
    resolver.register_service::<dyn ServiceInterceptorFactory, _>(LOGGING_INTERCEPTOR_FACTORY, |_| {
      Ok(Arc::new(LoggingInterceptorFactory::default()) as Arc<dyn ServiceInterceptorFactory>)
    });
    resolver
  }

  /// Registers service interface `I` under `name`. A later registration
  /// under the same name replaces the earlier one.
  pub fn register_interface<I: ?Sized + ServiceInterface>(&self, name: &str) -> &Self {
    self
      .classes
      .insert(name.to_owned(), Class::Interface(InterfaceClass::of::<I>(name)));
    self
  }

  /// Registers an implementation constructor returning any [`ServiceObject`].
  pub fn register_implementation(
    &self,
    name: &str,
    instantiator: impl Fn(&FactoryContext) -> Result<ServiceObject> + Send + Sync + 'static,
  ) -> &Self {
    self.classes.insert(
      name.to_owned(),
      Class::Implementation(ImplementationClass::new(name, instantiator)),
    );
    self
  }

  /// Registers an implementation constructor producing an `Arc<I>`.
  pub fn register_service<I, F>(&self, name: &str, instantiator: F) -> &Self
  where
    I: ?Sized + ServiceInterface,
    F: Fn(&FactoryContext) -> Result<Arc<I>> + Send + Sync + 'static,
  {
    self.register_implementation(name, move |context| {
      instantiator(context).map(ServiceObject::new)
    })
  }

  pub fn contains(&self, name: &str) -> bool {
    self.classes.contains_key(name)
  }
}

impl Default for DefaultClassResolver {
  fn default() -> Self {
    Self::new()
  }
}

impl ClassResolver for DefaultClassResolver {
  fn find_class(&self, name: &str) -> Result<Class> {
    self
      .classes
      .get(name)
      .map(|class| class.value().clone())
      .ok_or_else(|| Error::class_not_found(name))
  }
}

impl fmt::Debug for DefaultClassResolver {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DefaultClassResolver")
      .field("classes", &self.classes.len())
      .finish()
  }
}
