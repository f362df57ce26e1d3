//! Filter pipelines.
//!
//! A pipeline presents a service interface whose calls pass through an
//! ordered chain of filters before reaching a terminator. Filters implement a
//! filter interface declared with [`pipeline_filter!`](crate::pipeline_filter):
//! each filter method takes the service's arguments plus the next link of the
//! chain.

mod factory;

pub use factory::{PipelineContribution, PipelineFactory};

use crate::error_log::ErrorLog;
use crate::location::Location;
use crate::object::ServiceObject;
use crate::orderer::Orderer;
use crate::proxy::{DefaultImplementation, ServiceInterface};
use std::sync::Arc;
use tracing::debug;

/// A service interface with a filter interface, generated by
/// [`pipeline_filter!`](crate::pipeline_filter).
pub trait PipelineService: DefaultImplementation {
  type Filter: ?Sized + ServiceInterface;

  /// Presents `filter` as the service, passing `next` as each call's last
  /// argument.
  fn bridge(filter: Arc<Self::Filter>, next: Arc<Self>) -> Arc<Self>;
}

/// A filter and where it was contributed.
pub struct FilterHolder<F: ?Sized> {
  filter: Arc<F>,
  location: Option<Location>,
}

impl<F: ?Sized> FilterHolder<F> {
  pub fn filter(&self) -> &Arc<F> {
    &self.filter
  }

  pub fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }
}

/// Collects filters and a terminator, then assembles the pipeline.
///
/// ```
/// use fibre_hive::{pipeline_filter, service_interface, ErrorLog, PipelineAssembler, ServiceObject};
/// use std::sync::Arc;
///
/// service_interface! {
///   #[default_impl]
///   pub trait Calculator {
///     fn run(&self, input: i64) -> i64;
///   }
/// }
///
/// pipeline_filter! {
///   pub trait CalculatorFilter for Calculator {
///     fn run(&self, input: i64) -> i64;
///   }
/// }
///
/// struct Double;
/// impl CalculatorFilter for Double {
///   fn run(&self, input: i64, next: &dyn Calculator) -> i64 {
///     next.run(input * 2)
///   }
/// }
///
/// struct Identity;
/// impl Calculator for Identity {
///   fn run(&self, input: i64) -> i64 {
///     input
///   }
/// }
///
/// let mut assembler = PipelineAssembler::<dyn Calculator>::new("demo.Calculator", ErrorLog::default());
/// assembler.add_filter("double", None, None, ServiceObject::new(Arc::new(Double) as Arc<dyn CalculatorFilter>), None);
/// assembler.set_terminator(Arc::new(Identity), None);
/// assert_eq!(assembler.create_pipeline().run(21), 42);
/// ```
pub struct PipelineAssembler<I: ?Sized + PipelineService> {
  service_id: String,
  error_log: ErrorLog,
  orderer: Orderer<FilterHolder<I::Filter>>,
  terminator: Option<Arc<I>>,
  terminator_location: Option<Location>,
}

impl<I: ?Sized + PipelineService> PipelineAssembler<I> {
  /// `service_id` names the pipeline in error messages.
  pub fn new(service_id: impl Into<String>, error_log: ErrorLog) -> Self {
    let service_id = service_id.into();
    Self {
      orderer: Orderer::new(error_log.clone(), format!("filter of pipeline {}", service_id)),
      service_id,
      error_log,
      terminator: None,
      terminator_location: None,
    }
  }

  /// Adds a filter; `before` names filters that must run before this one,
  /// `after` filters that must run after it.
  ///
  /// A filter that does not implement the filter interface is reported and
  /// left out of the pipeline.
  pub fn add_filter(
    &mut self,
    name: &str,
    before: Option<&str>,
    after: Option<&str>,
    filter: ServiceObject,
    location: Option<Location>,
  ) {
    let Some(filter) = filter.downcast::<I::Filter>() else {
      self.error_log.error(
        format!(
          "Filter {} ({}) of pipeline {} does not implement filter interface {}; it is ignored.",
          name,
          filter.type_name(),
          self.service_id,
          <I::Filter as ServiceInterface>::interface_name()
        ),
        location.as_ref(),
      );
      return;
    };

    let holder = FilterHolder {
      filter,
      location: location.clone(),
    };
    self.orderer.add_at(holder, name, before, after, location);
  }

  /// Sets the innermost service of the pipeline. Only the first terminator
  /// is kept; later ones are reported.
  pub fn set_terminator(&mut self, terminator: Arc<I>, location: Option<Location>) {
    if self.terminator.is_some() {
      let previous = self
        .terminator_location
        .as_ref()
        .map(|l| format!(" (set at {})", l))
        .unwrap_or_default();
      self.error_log.error(
        format!(
          "Pipeline {} already has a terminator{}; the later one is ignored.",
          self.service_id, previous
        ),
        location.as_ref(),
      );
      return;
    }
    self.terminator = Some(terminator);
    self.terminator_location = location;
  }

  /// Like [`set_terminator`](Self::set_terminator) for an untyped object; an
  /// object not implementing the service interface is reported and ignored.
  pub fn set_terminator_object(&mut self, terminator: ServiceObject, location: Option<Location>) {
    match terminator.downcast::<I>() {
      Some(terminator) => self.set_terminator(terminator, location),
      None => self.error_log.error(
        format!(
          "Terminator {} of pipeline {} does not implement {}; it is ignored.",
          terminator.type_name(),
          self.service_id,
          I::interface_name()
        ),
        location.as_ref(),
      ),
    }
  }

  pub fn has_terminator(&self) -> bool {
    self.terminator.is_some()
  }

  /// Builds the pipeline. The first filter in order sees calls first; the
  /// default implementation stands in for a missing terminator.
  pub fn create_pipeline(self) -> Arc<I> {
    let terminator = self.terminator.unwrap_or_else(|| {
      debug!(pipeline = %self.service_id, "no terminator set, using the default implementation");
      I::default_implementation()
    });

    let filters = self.orderer.ordered();
    debug!(pipeline = %self.service_id, filters = filters.len(), "assembling pipeline");
    filters
      .into_iter()
      .rev()
      .fold(terminator, |next, holder| I::bridge(holder.filter, next))
  }
}
