use super::{PipelineAssembler, PipelineService};
use crate::error::{Error, Result};
use crate::factory::{FactoryContext, ServiceImplementationFactory};
use crate::object::ServiceObject;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// An element of a pipeline's configuration point.
///
/// ```yaml
/// - filter: { name: add-three, service_id: calc.AddThree }
/// - filter: { name: double, service_id: calc.Double, before: add-three }
/// - terminator: { service_id: calc.Identity }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineContribution {
  Filter {
    name: String,
    service_id: String,
    /// Filters that must run before this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    before: Option<String>,
    /// Filters that must run after this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    after: Option<String>,
  },
  Terminator {
    service_id: String,
  },
}

#[derive(Debug, Deserialize)]
struct PipelineParameters {
  configuration_id: String,
  #[serde(default)]
  terminator_service_id: Option<String>,
}

/// A [`ServiceImplementationFactory`] assembling a pipeline for interface `I`.
///
/// Takes one parameter naming the configuration point holding the
/// [`PipelineContribution`]s, and optionally a default terminator service:
///
/// ```yaml
/// builder:
///   invoke_factory:
///     service_id: calc.CalculatorPipelineFactory
///     parameters:
///       - configuration_id: calc.CalculatorPipeline
///         terminator_service_id: calc.Identity
/// ```
///
/// Filter and terminator services are looked up through the module that
/// contributed the builder. Contributions that cannot be resolved are
/// reported and left out.
pub struct PipelineFactory<I: ?Sized> {
  marker: PhantomData<fn() -> Box<I>>,
}

impl<I: ?Sized + PipelineService> PipelineFactory<I> {
  pub fn new() -> Self {
    Self { marker: PhantomData }
  }
}

impl<I: ?Sized + PipelineService> Default for PipelineFactory<I> {
  fn default() -> Self {
    Self::new()
  }
}

impl<I: ?Sized> fmt::Debug for PipelineFactory<I> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PipelineFactory")
      .field("interface", &std::any::type_name::<I>())
      .finish()
  }
}

impl<I: ?Sized + PipelineService> ServiceImplementationFactory for PipelineFactory<I> {
  fn create_core_service_implementation(&self, context: &FactoryContext) -> Result<ServiceObject> {
    if !context.is_interface::<I>() {
      return Err(
        Error::interface_mismatch(format!(
          "Pipeline factory for {} cannot build service {} of interface {}.",
          I::interface_name(),
          context.service_id(),
          context.interface_name()
        ))
        .at(context.location().cloned()),
      );
    }

    let mut parameters = context.parameters_as::<PipelineParameters>()?;
    if parameters.len() != 1 {
      return Err(
        Error::configuration(format!(
          "Pipeline service {} expects exactly one factory parameter, but {} were contributed.",
          context.service_id(),
          parameters.len()
        ))
        .at(context.location().cloned()),
      );
    }
    let parameters = parameters.remove(0);

    let module = context.invoking_module();
    let error_log = context.error_log();
    let location = context.location().cloned();
    let contributions =
      module.get_configuration_with_locations_as::<PipelineContribution>(&parameters.configuration_id)?;

    let mut assembler = PipelineAssembler::<I>::new(context.service_id(), error_log.clone());
    for (contribution, contributed_at) in contributions {
      let at = contributed_at.or_else(|| location.clone());
      match contribution {
        PipelineContribution::Filter {
          name,
          service_id,
          before,
          after,
        } => match module.get_service_object(&service_id) {
          Ok(filter) => {
            assembler.add_filter(&name, before.as_deref(), after.as_deref(), filter, at)
          }
          Err(error) => error_log.error_with_cause(
            format!(
              "Filter {} of pipeline {} is ignored: {}",
              name,
              context.service_id(),
              error.message()
            ),
            at.as_ref(),
            &error,
          ),
        },
        PipelineContribution::Terminator { service_id } => match module.get_service_object(&service_id) {
          Ok(terminator) => assembler.set_terminator_object(terminator, at),
          Err(error) => error_log.error_with_cause(
            format!(
              "Terminator {} of pipeline {} is ignored: {}",
              service_id,
              context.service_id(),
              error.message()
            ),
            at.as_ref(),
            &error,
          ),
        },
      }
    }

    // Contributed terminators take precedence over the factory's default.
    if let Some(service_id) = &parameters.terminator_service_id {
      if !assembler.has_terminator() {
        let terminator = module.get_service_object(service_id)?;
        assembler.set_terminator_object(terminator, location);
      }
    }

    Ok(ServiceObject::new(assembler.create_pipeline()))
  }
}
