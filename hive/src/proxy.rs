//! The delegating-wrapper capability behind service proxies.
//!
//! A service interface is a `dyn Trait` declared through
//! [`service_interface!`](crate::service_interface). The macro generates, once
//! per interface:
//!
//! - a *delegate* proxy that forwards every method to whatever a [`Dispatch`]
//!   resolves to at call time (singleton, pooled and threaded models swap the
//!   target behind a stable proxy this way);
//! - an *interception* proxy that routes every call through a
//!   [`MethodInterceptor`] before reaching the wrapped object.

use crate::error::Result;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Implemented (by `service_interface!`) for `dyn Trait` service interfaces.
pub trait ServiceInterface: Send + Sync + 'static {
  /// Fully qualified Rust name of the interface trait.
  fn interface_name() -> &'static str;

  /// Builds a proxy whose methods forward to `dispatch.resolve()` on every call.
  fn delegate(dispatch: Arc<dyn Dispatch<Self>>) -> Arc<Self>;

  /// Wraps `target` so that every call passes through `interceptor`.
  fn intercept(target: Arc<Self>, interceptor: Arc<dyn MethodInterceptor>) -> Arc<Self>;
}

/// A generated no-op implementation, every method returning `Default::default()`.
///
/// Declared with `#[default_impl]` on `service_interface!`; used as the
/// fallback terminator of pipelines.
pub trait DefaultImplementation: ServiceInterface {
  fn default_implementation() -> Arc<Self>;
}

/// Resolves the object a delegate proxy forwards to.
pub trait Dispatch<I: ?Sized>: Send + Sync {
  fn resolve(&self) -> Result<Arc<I>>;
}

/// The deferred remainder of an intercepted call: runs the next layer and
/// returns its boxed result.
pub type Proceed<'a> = Box<dyn FnOnce() -> Box<dyn Any> + 'a>;

/// Describes the method being invoked through an interception proxy.
#[derive(Clone, Copy)]
pub struct MethodCall<'a> {
  method: &'static str,
  parameters: &'a [&'static str],
}

impl<'a> MethodCall<'a> {
  pub fn new(method: &'static str, parameters: &'a [&'static str]) -> Self {
    Self { method, parameters }
  }

  pub fn method(&self) -> &'static str {
    self.method
  }

  /// Parameter names in declaration order, `self` excluded.
  pub fn parameters(&self) -> &[&'static str] {
    self.parameters
  }
}

impl fmt::Display for MethodCall<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({})", self.method, self.parameters.join(", "))
  }
}

impl fmt::Debug for MethodCall<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

/// Interface-agnostic interceptor, applied through the generated interception proxy.
///
/// An implementation normally runs `proceed()` exactly once and returns its
/// result, doing its own work before and after. It may replace the result
/// with another boxed value of the method's return type.
pub trait MethodInterceptor: Send + Sync {
  fn invoke(&self, call: &MethodCall<'_>, proceed: Proceed<'_>) -> Box<dyn Any>;
}

/// Support code for macro expansions. Not part of the public API.
#[doc(hidden)]
pub mod __private {
  use super::*;

  /// Resolves a proxy's target, panicking with the error's message on failure.
  ///
  /// A trait method has no channel for the registry's errors, so a failed
  /// lazy construction or a post-shutdown call surfaces as a panic.
  #[track_caller]
  pub fn target<I: ?Sized>(dispatch: &dyn Dispatch<I>) -> Arc<I> {
    match dispatch.resolve() {
      Ok(target) => target,
      Err(error) => panic!("{}", error),
    }
  }

  #[track_caller]
  pub fn downcast_return<R: 'static>(value: Box<dyn Any>, call: &MethodCall<'_>) -> R {
    match value.downcast::<R>() {
      Ok(value) => *value,
      Err(_) => panic!(
        "Interceptor returned a value of the wrong type from {} (expected {}).",
        call,
        std::any::type_name::<R>()
      ),
    }
  }
}
