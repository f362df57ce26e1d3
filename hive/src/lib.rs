//! # Fibre Hive
//!
//! A module-driven service registry for Rust.
//!
//! Modules declare *service points* (a named service with an interface, a
//! builder and a service model) and *configuration points* (named lists of
//! elements other modules may contribute to). A [`Registry`] is built once
//! from a set of module descriptors, written in code or loaded from YAML.
//!
//! ## Core Concepts
//!
//! - **Service interfaces**: traits declared with [`service_interface!`], which
//!   generates the proxies the registry needs to defer construction and to
//!   intercept calls.
//! - **Service models**: `primitive`, `singleton` (the default), `pooled` and
//!   `threaded` decide when an implementation is built and who shares it.
//! - **Interceptors**: contributed per service point, ordered by their
//!   before/after constraints, and wrapped around the core implementation.
//! - **Pipelines**: a service presented as an ordered chain of filters ending
//!   in a terminator, see [`pipeline_filter!`] and [`PipelineAssembler`].
//! - **Thread cleanup and shutdown**: [`Registry::cleanup_thread`] ends a
//!   thread's unit of work; [`Registry::shutdown`] notifies every shutdown
//!   listener once and makes all proxies fail fast.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_hive::{
//!   service_interface, DefaultClassResolver, InterceptorDescriptor, ModuleDescriptor, Registry,
//!   ServiceModelKind, ServicePointDescriptor,
//! };
//! use std::sync::Arc;
//!
//! service_interface! {
//!   pub trait Adder {
//!     fn add(&self, a: i64, b: i64) -> i64;
//!   }
//! }
//!
//! struct SimpleAdder;
//!
//! impl Adder for SimpleAdder {
//!   fn add(&self, a: i64, b: i64) -> i64 {
//!     a + b
//!   }
//! }
//!
//! let classes = DefaultClassResolver::new();
//! classes.register_interface::<dyn Adder>("calc.Adder");
//! classes.register_service::<dyn Adder, _>("calc.SimpleAdder", |_| Ok(Arc::new(SimpleAdder)));
//!
//! let registry = Registry::builder()
//!   .class_resolver(Arc::new(classes))
//!   .module(
//!     ModuleDescriptor::new("calc").service_point(
//!       ServicePointDescriptor::new("Adder", "calc.Adder")
//!         .create_instance("calc.SimpleAdder")
//!         .model(ServiceModelKind::Singleton)
//!         .interceptor(InterceptorDescriptor::new("hive.LoggingInterceptor")),
//!     ),
//!   )
//!   .build();
//!
//! let adder = registry.get_service::<dyn Adder>("calc.Adder").unwrap();
//! assert_eq!(adder.add(2, 3), 5);
//!
//! registry.shutdown();
//! assert!(registry.get_service::<dyn Adder>("calc.Adder").is_err());
//! ```

mod macros;

mod class;
mod configuration;
pub mod descriptor;
mod error;
mod error_log;
mod factory;
mod guard;
mod interceptor;
mod location;
mod logging;
mod model;
mod module;
mod object;
pub mod orderer;
mod pipeline;
mod point;
pub mod proxy;
mod registry;
mod shutdown;
mod thread;

pub use class::{
  Class, ClassResolver, DefaultClassResolver, ImplementationClass, InterfaceClass,
  LOGGING_INTERCEPTOR_FACTORY, SERVICE_IMPLEMENTATION_FACTORY, SERVICE_INTERCEPTOR_FACTORY,
};
pub use descriptor::{
  find_module_files, BuilderDescriptor, ConfigurationPointDescriptor, ContributionDescriptor,
  ImplementationDescriptor, InterceptorDescriptor, ModuleDescriptor, Occurrences,
  ServicePointDescriptor, Visibility,
};
pub use error::{Error, ErrorKind, Result};
pub use error_log::{CollectingErrorHandler, DefaultErrorHandler, ErrorHandler, ErrorLog, ReportedError};
pub use factory::{FactoryContext, ServiceImplementationConstructor, ServiceImplementationFactory};
pub use interceptor::{InterceptorStack, ServiceInterceptorFactory};
pub use location::Location;
pub use logging::LoggingInterceptorFactory;
pub use model::ServiceModelKind;
pub use module::Module;
pub use object::{Discardable, PoolManageable, RegistryShutdownListener, ServiceObject};
pub use orderer::Orderer;
pub use pipeline::{FilterHolder, PipelineAssembler, PipelineContribution, PipelineFactory, PipelineService};
pub use point::ServicePointDefinition;
pub use proxy::{DefaultImplementation, Dispatch, MethodCall, MethodInterceptor, Proceed, ServiceInterface};
pub use registry::{Registry, RegistryBuilder, HIVE_MODULE_ID};
pub use shutdown::ShutdownCoordinator;
pub use thread::{ThreadCleanupListener, ThreadEventNotifier};
