use fibre_hive::{
  pipeline_filter, service_interface, CollectingErrorHandler, ConfigurationPointDescriptor,
  ContributionDescriptor, DefaultClassResolver, ErrorLog, Location, ModuleDescriptor, PipelineAssembler,
  PipelineFactory, Registry, ServiceImplementationFactory, ServiceModelKind, ServiceObject,
  ServicePointDescriptor, SERVICE_IMPLEMENTATION_FACTORY,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

// --- Test Fixtures ---

service_interface! {
  #[default_impl]
  pub trait Calculator {
    fn run(&self, input: i64) -> i64;
  }
}

pipeline_filter! {
  pub trait CalculatorFilter for Calculator {
    fn run(&self, input: i64) -> i64;
  }
}

struct AddThree;
impl CalculatorFilter for AddThree {
  fn run(&self, input: i64, next: &dyn Calculator) -> i64 {
    next.run(input + 3)
  }
}

struct Double;
impl CalculatorFilter for Double {
  fn run(&self, input: i64, next: &dyn Calculator) -> i64 {
    next.run(input * 2)
  }
}

struct Identity;
impl Calculator for Identity {
  fn run(&self, input: i64) -> i64 {
    input
  }
}

struct Negate;
impl Calculator for Negate {
  fn run(&self, input: i64) -> i64 {
    -input
  }
}

fn filter(filter: impl CalculatorFilter) -> ServiceObject {
  ServiceObject::new(Arc::new(filter) as Arc<dyn CalculatorFilter>)
}

fn assembler() -> (PipelineAssembler<dyn Calculator>, Arc<CollectingErrorHandler>) {
  let errors = Arc::new(CollectingErrorHandler::new());
  let assembler = PipelineAssembler::new("test.Calculator", ErrorLog::new(errors.clone()));
  (assembler, errors)
}

// --- Assembler Tests ---

#[test]
fn test_filters_wrap_terminator_in_order() {
  // Arrange
  let (mut assembler, errors) = assembler();
  assembler.add_filter("double", Some("add-three"), None, filter(Double), None);
  assembler.add_filter("add-three", None, None, filter(AddThree), None);
  assembler.set_terminator(Arc::new(Identity), None);

  // Act
  let pipeline = assembler.create_pipeline();

  // Assert
  assert_eq!(pipeline.run(5), 16);
  assert!(errors.is_empty(), "{:?}", errors.messages());
}

#[test]
fn test_missing_terminator_falls_back_to_default() {
  // Arrange
  let (mut assembler, _) = assembler();
  assembler.add_filter("add-three", None, None, filter(AddThree), None);

  // Act
  let pipeline = assembler.create_pipeline();

  // Assert
  assert_eq!(pipeline.run(5), 0);
}

#[test]
fn test_pipeline_without_filters_is_the_terminator() {
  // Arrange
  let (mut assembler, _) = assembler();
  assembler.set_terminator(Arc::new(Negate), None);

  // Act
  let pipeline = assembler.create_pipeline();

  // Assert
  assert_eq!(pipeline.run(5), -5);
}

#[test]
fn test_second_terminator_is_reported_and_ignored() {
  // Arrange
  let (mut assembler, errors) = assembler();
  assembler.set_terminator(Arc::new(Identity), None);
  assembler.set_terminator(Arc::new(Negate), None);

  // Act
  let pipeline = assembler.create_pipeline();

  // Assert
  assert_eq!(pipeline.run(7), 7);
  assert!(errors.contains("already has a terminator"));
}

#[test]
fn test_filter_of_wrong_type_is_reported_and_skipped() {
  // Arrange
  let (mut assembler, errors) = assembler();
  assembler.add_filter(
    "not-a-filter",
    None,
    None,
    ServiceObject::new(Arc::new(Negate) as Arc<dyn Calculator>),
    None,
  );
  assembler.add_filter("double", None, None, filter(Double), None);
  assembler.set_terminator(Arc::new(Identity), None);

  // Act
  let pipeline = assembler.create_pipeline();

  // Assert
  assert_eq!(pipeline.run(4), 8);
  assert!(errors.contains("does not implement filter interface"));
}

// --- Registry Pipelines ---

fn calculator_classes() -> DefaultClassResolver {
  let classes = DefaultClassResolver::new();
  classes.register_interface::<dyn Calculator>("calc.Calculator");
  classes.register_interface::<dyn CalculatorFilter>("calc.CalculatorFilter");
  classes.register_service::<dyn CalculatorFilter, _>("calc.AddThree", |_| Ok(Arc::new(AddThree)));
  classes.register_service::<dyn CalculatorFilter, _>("calc.Double", |_| Ok(Arc::new(Double)));
  classes.register_service::<dyn Calculator, _>("calc.Identity", |_| Ok(Arc::new(Identity)));
  classes.register_service::<dyn ServiceImplementationFactory, _>("calc.PipelineFactory", |_| {
    Ok(Arc::new(PipelineFactory::<dyn Calculator>::new()))
  });
  classes
}

fn calculator_module(parameters: serde_json::Value) -> ModuleDescriptor {
  ModuleDescriptor::new("calc")
    .service_point(
      ServicePointDescriptor::new("Calculator", "calc.Calculator")
        .invoke_factory("PipelineFactory", vec![parameters]),
    )
    .service_point(
      ServicePointDescriptor::new("PipelineFactory", SERVICE_IMPLEMENTATION_FACTORY)
        .create_instance("calc.PipelineFactory")
        .model(ServiceModelKind::Primitive),
    )
    .service_point(ServicePointDescriptor::new("AddThree", "calc.CalculatorFilter").create_instance("calc.AddThree"))
    .service_point(ServicePointDescriptor::new("Double", "calc.CalculatorFilter").create_instance("calc.Double"))
    .service_point(ServicePointDescriptor::new("Identity", "calc.Calculator").create_instance("calc.Identity"))
    .configuration_point(ConfigurationPointDescriptor::new("Pipeline"))
}

fn build(module: ModuleDescriptor) -> (Registry, Arc<CollectingErrorHandler>) {
  let errors = Arc::new(CollectingErrorHandler::new());
  let registry = Registry::builder()
    .class_resolver(Arc::new(calculator_classes()))
    .error_handler(errors.clone())
    .module(module)
    .build();
  (registry, errors)
}

#[test]
fn test_pipeline_factory_assembles_contributed_filters() {
  // Arrange
  let module = calculator_module(json!({ "configuration_id": "Pipeline" })).contribution(
    ContributionDescriptor::new(
      "Pipeline",
      vec![
        json!({ "filter": { "name": "double", "service_id": "Double", "before": "add-three" } }),
        json!({ "filter": { "name": "add-three", "service_id": "AddThree" } }),
        json!({ "terminator": { "service_id": "Identity" } }),
      ],
    ),
  );
  let (registry, errors) = build(module);

  // Act
  let calculator = registry.get_service::<dyn Calculator>("calc.Calculator").unwrap();

  // Assert
  assert_eq!(calculator.run(5), 16);
  assert!(errors.is_empty(), "{:?}", errors.messages());
}

#[test]
fn test_pipeline_factory_uses_default_terminator_service() {
  // Arrange
  let module = calculator_module(json!({
    "configuration_id": "calc.Pipeline",
    "terminator_service_id": "Identity",
  }))
  .contribution(ContributionDescriptor::new(
    "Pipeline",
    vec![json!({ "filter": { "name": "double", "service_id": "Double" } })],
  ));
  let (registry, errors) = build(module);

  // Act
  let calculator = registry.get_service::<dyn Calculator>("calc.Calculator").unwrap();

  // Assert
  assert_eq!(calculator.run(21), 42);
  assert!(errors.is_empty(), "{:?}", errors.messages());
}

#[test]
fn test_pipeline_factory_reports_unknown_filter_service() {
  // Arrange
  let module = calculator_module(json!({ "configuration_id": "Pipeline" })).contribution(
    ContributionDescriptor::new(
      "Pipeline",
      vec![
        json!({ "filter": { "name": "ghost", "service_id": "Ghost" } }),
        json!({ "filter": { "name": "add-three", "service_id": "AddThree" } }),
        json!({ "terminator": { "service_id": "Identity" } }),
      ],
    ),
  );
  let (registry, errors) = build(module);

  // Act
  let calculator = registry.get_service::<dyn Calculator>("calc.Calculator").unwrap();

  // Assert
  assert_eq!(calculator.run(1), 4);
  assert!(errors.contains("Filter ghost of pipeline calc.Calculator is ignored"));
}

#[test]
fn test_pipeline_factory_reports_filter_at_its_contribution() {
  // Arrange
  let mut contribution = ContributionDescriptor::new(
    "Pipeline",
    vec![
      json!({ "filter": { "name": "ghost", "service_id": "Ghost" } }),
      json!({ "terminator": { "service_id": "Identity" } }),
    ],
  );
  contribution.location = Some(Location::with_line("filters.hive.yaml", 12));
  let module = calculator_module(json!({ "configuration_id": "Pipeline" })).contribution(contribution);
  let (registry, errors) = build(module);

  // Act
  let calculator = registry.get_service::<dyn Calculator>("calc.Calculator").unwrap();
  assert_eq!(calculator.run(3), 3);

  // Assert
  let reported = errors
    .errors()
    .into_iter()
    .find(|e| e.message.contains("Filter ghost"))
    .unwrap();
  assert_eq!(reported.location, Some(Location::with_line("filters.hive.yaml", 12)));
}
