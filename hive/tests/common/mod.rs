#![allow(dead_code)]

use fibre_hive::{
  service_interface, CollectingErrorHandler, DefaultClassResolver, ModuleDescriptor, Registry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Shared Fixtures ---

service_interface! {
  pub trait Greeter {
    fn greet(&self, name: String) -> String;
  }
}

service_interface! {
  pub trait Counter {
    fn increment(&self) -> u64;
    fn instance_id(&self) -> usize;
  }
}

pub struct EnglishGreeter;

impl Greeter for EnglishGreeter {
  fn greet(&self, name: String) -> String {
    format!("Hello, {}", name)
  }
}

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

/// Hands out process-wide unique ids so instances can be told apart.
pub fn next_instance_id() -> usize {
  NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Builds a registry and returns it with the handler that collected its
/// configuration errors.
pub fn build_registry(
  classes: DefaultClassResolver,
  modules: Vec<ModuleDescriptor>,
) -> (Registry, Arc<CollectingErrorHandler>) {
  let errors = Arc::new(CollectingErrorHandler::new());
  let registry = Registry::builder()
    .class_resolver(Arc::new(classes))
    .error_handler(errors.clone())
    .modules(modules)
    .build();
  (registry, errors)
}

/// A resolver that knows the shared interfaces.
pub fn classes() -> DefaultClassResolver {
  let classes = DefaultClassResolver::new();
  classes.register_interface::<dyn Greeter>("test.Greeter");
  classes.register_interface::<dyn Counter>("test.Counter");
  classes.register_service::<dyn Greeter, _>("test.EnglishGreeter", |_| Ok(Arc::new(EnglishGreeter)));
  classes
}
