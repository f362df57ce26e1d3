//! Interceptor stacks and interceptor contributions.
//!
//! A service point's core implementation is wrapped by its interceptors, one
//! layer at a time. Contributions are ordered with the [`Orderer`] and applied
//! last-to-first, so the first interceptor in runtime order ends up as the
//! outermost wrapper and sees calls first.
//!
//! [`Orderer`]: crate::orderer::Orderer

use crate::descriptor::InterceptorDescriptor;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::module::Module;
use crate::object::ServiceObject;
use crate::orderer::split_names;
use crate::proxy::{MethodInterceptor, ServiceInterface};
use crate::service_interface;
use serde_json::Value;
use std::any::TypeId;
use std::sync::Arc;
use tracing::debug;

/// The service being intercepted, as seen by an interceptor factory.
///
/// [`peek`](Self::peek) returns the current top of the stack (the core
/// implementation or the last pushed interceptor); [`push`](Self::push)
/// replaces it with a new wrapper implementing the same interface.
pub trait InterceptorStack {
  /// Qualified id of the service point being intercepted.
  fn service_id(&self) -> &str;

  /// Rust name of the service interface.
  fn interface_name(&self) -> &'static str;

  fn interface_type_id(&self) -> TypeId;

  fn peek(&self) -> ServiceObject;

  /// Fails when `interceptor` does not implement the service interface.
  fn push(&mut self, interceptor: ServiceObject) -> Result<()>;

  /// Wraps the top of the stack in the interface's interception proxy.
  fn push_method_interceptor(&mut self, interceptor: Arc<dyn MethodInterceptor>);
}

impl dyn InterceptorStack + '_ {
  /// The top of the stack as the interface `I`.
  pub fn peek_as<I: ?Sized + ServiceInterface>(&self) -> Result<Arc<I>> {
    self.peek().downcast::<I>().ok_or_else(|| {
      Error::interface_mismatch(format!(
        "Service {} implements {}, not {}.",
        self.service_id(),
        self.interface_name(),
        I::interface_name()
      ))
    })
  }

  /// Wraps the top of the stack with `wrap`, which receives the current top.
  pub fn wrap<I, F>(&mut self, wrap: F) -> Result<()>
  where
    I: ?Sized + ServiceInterface,
    F: FnOnce(Arc<I>) -> Arc<I>,
  {
    let top = self.peek_as::<I>()?;
    self.push(ServiceObject::new(wrap(top)))
  }
}

pub(crate) struct InterceptorStackImpl<'a, I: ?Sized> {
  service_id: &'a str,
  top: Arc<I>,
}

impl<'a, I: ?Sized + ServiceInterface> InterceptorStackImpl<'a, I> {
  pub(crate) fn new(service_id: &'a str, core: Arc<I>) -> Self {
    Self {
      service_id,
      top: core,
    }
  }

  pub(crate) fn into_top(self) -> Arc<I> {
    self.top
  }
}

impl<I: ?Sized + ServiceInterface> InterceptorStack for InterceptorStackImpl<'_, I> {
  fn service_id(&self) -> &str {
    self.service_id
  }

  fn interface_name(&self) -> &'static str {
    I::interface_name()
  }

  fn interface_type_id(&self) -> TypeId {
    TypeId::of::<I>()
  }

  fn peek(&self) -> ServiceObject {
    ServiceObject::new(self.top.clone())
  }

  fn push(&mut self, interceptor: ServiceObject) -> Result<()> {
    match interceptor.downcast::<I>() {
      Some(top) => {
        self.top = top;
        Ok(())
      }
      None => Err(Error::interface_mismatch(format!(
        "Interceptor {} pushed onto service {} does not implement interface {}.",
        interceptor.type_name(),
        self.service_id,
        I::interface_name()
      ))),
    }
  }

  fn push_method_interceptor(&mut self, interceptor: Arc<dyn MethodInterceptor>) {
    self.top = I::intercept(self.top.clone(), interceptor);
  }
}

service_interface! {
  /// A service that adds one interceptor to a service's stack.
  pub trait ServiceInterceptorFactory {
    fn create_interceptor(
      &self,
      stack: &mut dyn InterceptorStack,
      invoking_module: &Module,
      parameters: &[Value]
    ) -> Result<()>;
  }
}

/// An interceptor contributed to a service point, with its ordering hints.
#[derive(Debug, Clone)]
pub(crate) struct InterceptorContribution {
  factory_service_id: String,
  name: String,
  preceding_ids: Option<String>,
  following_ids: Option<String>,
  parameters: Vec<Value>,
  module: Module,
  location: Option<Location>,
}

impl InterceptorContribution {
  /// Qualifies every id in `descriptor` relative to `module`.
  pub(crate) fn from_descriptor(descriptor: &InterceptorDescriptor, module: &Module) -> Self {
    let factory_service_id = module.expand_id(&descriptor.service_id);
    let name = descriptor
      .name
      .as_deref()
      .map(|name| module.expand_id(name))
      .unwrap_or_else(|| factory_service_id.clone());

    Self {
      factory_service_id,
      name,
      preceding_ids: qualify_list(module, descriptor.preceding_ids.as_deref()),
      following_ids: qualify_list(module, descriptor.following_ids.as_deref()),
      parameters: descriptor.parameters.clone(),
      module: module.clone(),
      location: descriptor.location.clone(),
    }
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn preceding_ids(&self) -> Option<&str> {
    self.preceding_ids.as_deref()
  }

  pub(crate) fn following_ids(&self) -> Option<&str> {
    self.following_ids.as_deref()
  }

  pub(crate) fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }

  /// Looks up the factory service and lets it push onto `stack`.
  pub(crate) fn create_interceptor(&self, stack: &mut dyn InterceptorStack) -> Result<()> {
    debug!(
      service_id = stack.service_id(),
      interceptor = %self.name,
      "adding interceptor"
    );
    let factory = self
      .module
      .get_service::<dyn ServiceInterceptorFactory>(&self.factory_service_id)
      .map_err(|e| e.at(self.location.clone()))?;
    factory
      .create_interceptor(stack, &self.module, &self.parameters)
      .map_err(|e| e.at(self.location.clone()))
  }
}

fn qualify_list(module: &Module, list: Option<&str>) -> Option<String> {
  let list = list?;
  let names: Vec<String> = split_names(Some(list))
    .into_iter()
    .map(|name| {
      if name == "*" {
        name
      } else {
        module.expand_id(&name)
      }
    })
    .collect();
  Some(names.join(","))
}
