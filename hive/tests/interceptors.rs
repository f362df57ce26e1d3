mod common;

use common::{build_registry, classes, Greeter};
use fibre_hive::{
  ErrorKind, InterceptorDescriptor, InterceptorStack, MethodCall, MethodInterceptor, Module,
  ModuleDescriptor, Proceed, Result, ServiceInterceptorFactory, ServiceModelKind, ServiceObject,
  ServicePointDescriptor, SERVICE_INTERCEPTOR_FACTORY,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;

// --- Test Fixtures ---

/// Wraps the greeting in `tag(...)`.
struct Tagging {
  tag: String,
  inner: Arc<dyn Greeter>,
}

impl Greeter for Tagging {
  fn greet(&self, name: String) -> String {
    format!("{}({})", self.tag, self.inner.greet(name))
  }
}

/// Tags with its first parameter, or with `default_tag`.
struct TaggingFactory {
  default_tag: &'static str,
}

impl ServiceInterceptorFactory for TaggingFactory {
  fn create_interceptor(
    &self,
    stack: &mut dyn InterceptorStack,
    _invoking_module: &Module,
    parameters: &[Value],
  ) -> Result<()> {
    let tag = parameters
      .first()
      .and_then(Value::as_str)
      .unwrap_or(self.default_tag)
      .to_owned();
    stack.wrap::<dyn Greeter, _>(|inner| Arc::new(Tagging { tag, inner }))
  }
}

/// Records every intercepted method call.
struct Recorder {
  calls: Arc<Mutex<Vec<String>>>,
}

impl MethodInterceptor for Recorder {
  fn invoke(&self, call: &MethodCall<'_>, proceed: Proceed<'_>) -> Box<dyn Any> {
    self.calls.lock().push(call.to_string());
    proceed()
  }
}

struct RecordingFactory {
  calls: Arc<Mutex<Vec<String>>>,
}

impl ServiceInterceptorFactory for RecordingFactory {
  fn create_interceptor(
    &self,
    stack: &mut dyn InterceptorStack,
    _invoking_module: &Module,
    _parameters: &[Value],
  ) -> Result<()> {
    stack.push_method_interceptor(Arc::new(Recorder {
      calls: self.calls.clone(),
    }));
    Ok(())
  }
}

type Log = Arc<Mutex<Vec<String>>>;

/// Logs its token, then passes the call on.
struct Token {
  token: String,
  log: Log,
  inner: Arc<dyn Greeter>,
}

impl Greeter for Token {
  fn greet(&self, name: String) -> String {
    self.log.lock().push(self.token.clone());
    self.inner.greet(name)
  }
}

struct TokenFactory {
  log: Log,
}

impl ServiceInterceptorFactory for TokenFactory {
  fn create_interceptor(
    &self,
    stack: &mut dyn InterceptorStack,
    _invoking_module: &Module,
    parameters: &[Value],
  ) -> Result<()> {
    let token = parameters.first().and_then(Value::as_str).unwrap_or("?").to_owned();
    let log = self.log.clone();
    stack.wrap::<dyn Greeter, _>(|inner| Arc::new(Token { token, log, inner }))
  }
}

struct LoggedGreeter {
  log: Log,
}

impl Greeter for LoggedGreeter {
  fn greet(&self, name: String) -> String {
    self.log.lock().push("core".to_owned());
    format!("Hello, {}", name)
  }
}

/// Pushes something that is not a `Greeter`.
struct BrokenFactory;

impl ServiceInterceptorFactory for BrokenFactory {
  fn create_interceptor(
    &self,
    stack: &mut dyn InterceptorStack,
    _invoking_module: &Module,
    _parameters: &[Value],
  ) -> Result<()> {
    stack.push(ServiceObject::new(Arc::new(String::from("not a greeter"))))
  }
}

fn interceptor_module(greeter: ServicePointDescriptor) -> ModuleDescriptor {
  ModuleDescriptor::new("test")
    .service_point(greeter)
    .service_point(
      ServicePointDescriptor::new("TagA", SERVICE_INTERCEPTOR_FACTORY).create_instance("test.TagA"),
    )
    .service_point(
      ServicePointDescriptor::new("TagB", SERVICE_INTERCEPTOR_FACTORY).create_instance("test.TagB"),
    )
}

fn tagging_classes() -> fibre_hive::DefaultClassResolver {
  let classes = classes();
  classes.register_service::<dyn ServiceInterceptorFactory, _>("test.TagA", |_| {
    Ok(Arc::new(TaggingFactory { default_tag: "A" }))
  });
  classes.register_service::<dyn ServiceInterceptorFactory, _>("test.TagB", |_| {
    Ok(Arc::new(TaggingFactory { default_tag: "B" }))
  });
  classes
}

// --- Interceptor Tests ---

#[test]
fn test_first_ordered_interceptor_is_outermost() {
  // Arrange
  let greeter = ServicePointDescriptor::new("Greeter", "test.Greeter")
    .create_instance("test.EnglishGreeter")
    .interceptor(InterceptorDescriptor::new("TagB"))
    .interceptor(InterceptorDescriptor::new("TagA").followed_by("TagB"));
  let (registry, errors) = build_registry(tagging_classes(), vec![interceptor_module(greeter)]);

  // Act
  let greeter = registry.get_service::<dyn Greeter>("test.Greeter").unwrap();

  // Assert
  assert_eq!(greeter.greet("world".into()), "A(B(Hello, world))");
  assert!(errors.is_empty(), "{:?}", errors.messages());
}

#[test]
fn test_three_interceptors_run_in_order_before_core() {
  // Arrange
  let log: Log = Arc::new(Mutex::new(Vec::new()));
  let classes = classes();
  let (for_tokens, for_core) = (log.clone(), log.clone());
  classes.register_service::<dyn ServiceInterceptorFactory, _>("test.Token", move |_| {
    Ok(Arc::new(TokenFactory {
      log: for_tokens.clone(),
    }))
  });
  classes.register_service::<dyn Greeter, _>("test.LoggedGreeter", move |_| {
    Ok(Arc::new(LoggedGreeter { log: for_core.clone() }))
  });
  let token = |name: &str| InterceptorDescriptor::new("Token").name(name).parameter(json!(name));
  let module = ModuleDescriptor::new("test")
    .service_point(
      ServicePointDescriptor::new("Greeter", "test.Greeter")
        .create_instance("test.LoggedGreeter")
        .interceptor(token("C").preceded_by("B"))
        .interceptor(token("A"))
        .interceptor(token("B").preceded_by("A")),
    )
    .service_point(
      ServicePointDescriptor::new("Token", SERVICE_INTERCEPTOR_FACTORY).create_instance("test.Token"),
    );
  let (registry, errors) = build_registry(classes, vec![module]);

  // Act
  let greeter = registry.get_service::<dyn Greeter>("test.Greeter").unwrap();
  let greeting = greeter.greet("world".into());

  // Assert
  assert_eq!(greeting, "Hello, world");
  assert_eq!(*log.lock(), vec!["A", "B", "C", "core"]);
  assert!(errors.is_empty(), "{:?}", errors.messages());
}

#[test]
fn test_preceding_ids_reverse_contribution_order() {
  // Arrange
  let greeter = ServicePointDescriptor::new("Greeter", "test.Greeter")
    .create_instance("test.EnglishGreeter")
    .interceptor(InterceptorDescriptor::new("TagA").preceded_by("test.TagB"))
    .interceptor(InterceptorDescriptor::new("TagB"));
  let (registry, _) = build_registry(tagging_classes(), vec![interceptor_module(greeter)]);

  // Act
  let greeter = registry.get_service::<dyn Greeter>("test.Greeter").unwrap();

  // Assert
  assert_eq!(greeter.greet("world".into()), "B(A(Hello, world))");
}

#[test]
fn test_interceptor_parameters_and_names() {
  // Arrange
  let greeter = ServicePointDescriptor::new("Greeter", "test.Greeter")
    .create_instance("test.EnglishGreeter")
    .interceptor(InterceptorDescriptor::new("TagA").name("outer").parameter(json!("X")))
    .interceptor(
      InterceptorDescriptor::new("TagA")
        .name("inner")
        .preceded_by("outer")
        .parameter(json!("Y")),
    );
  let (registry, errors) = build_registry(tagging_classes(), vec![interceptor_module(greeter)]);

  // Act
  let greeter = registry.get_service::<dyn Greeter>("test.Greeter").unwrap();

  // Assert
  assert_eq!(greeter.greet("you".into()), "X(Y(Hello, you))");
  assert!(errors.is_empty(), "{:?}", errors.messages());
}

#[test]
fn test_method_interceptor_sees_every_call() {
  // Arrange
  let calls = Arc::new(Mutex::new(Vec::new()));
  let classes = classes();
  let recorded = calls.clone();
  classes.register_service::<dyn ServiceInterceptorFactory, _>("test.Recording", move |_| {
    Ok(Arc::new(RecordingFactory {
      calls: recorded.clone(),
    }))
  });
  let module = ModuleDescriptor::new("test")
    .service_point(
      ServicePointDescriptor::new("Greeter", "test.Greeter")
        .create_instance("test.EnglishGreeter")
        .interceptor(InterceptorDescriptor::new("Recorder"))
        .interceptor(InterceptorDescriptor::new("hive.LoggingInterceptor")),
    )
    .service_point(
      ServicePointDescriptor::new("Recorder", SERVICE_INTERCEPTOR_FACTORY).create_instance("test.Recording"),
    );
  let (registry, errors) = build_registry(classes, vec![module]);

  // Act
  let greeter = registry.get_service::<dyn Greeter>("test.Greeter").unwrap();
  let first = greeter.greet("a".into());
  let second = greeter.greet("b".into());

  // Assert
  assert_eq!(first, "Hello, a");
  assert_eq!(second, "Hello, b");
  assert_eq!(*calls.lock(), vec!["greet(name)".to_string(), "greet(name)".to_string()]);
  assert!(errors.is_empty(), "{:?}", errors.messages());
}

#[test]
fn test_interceptor_of_wrong_type_fails_construction() {
  // Arrange
  let classes = classes();
  classes.register_service::<dyn ServiceInterceptorFactory, _>("test.Broken", |_| Ok(Arc::new(BrokenFactory)));
  let module = ModuleDescriptor::new("test")
    .service_point(
      ServicePointDescriptor::new("Greeter", "test.Greeter")
        .create_instance("test.EnglishGreeter")
        .model(ServiceModelKind::Primitive)
        .interceptor(InterceptorDescriptor::new("Broken")),
    )
    .service_point(
      ServicePointDescriptor::new("Broken", SERVICE_INTERCEPTOR_FACTORY).create_instance("test.Broken"),
    );
  let (registry, _) = build_registry(classes, vec![module]);

  // Act
  let error = registry
    .get_service::<dyn Greeter>("test.Greeter")
    .err()
    .unwrap();

  // Assert
  assert_eq!(error.kind(), ErrorKind::Construction);
  assert!(error.message().contains("Error building service test.Greeter"));
  assert!(error.message().contains("does not implement interface"));
}

#[test]
fn test_unknown_interceptor_service_fails_construction() {
  // Arrange
  let module = ModuleDescriptor::new("test").service_point(
    ServicePointDescriptor::new("Greeter", "test.Greeter")
      .create_instance("test.EnglishGreeter")
      .model(ServiceModelKind::Primitive)
      .interceptor(InterceptorDescriptor::new("Missing")),
  );
  let (registry, _) = build_registry(classes(), vec![module]);

  // Act
  let error = registry
    .get_service::<dyn Greeter>("test.Greeter")
    .err()
    .unwrap();

  // Assert
  assert_eq!(error.kind(), ErrorKind::Construction);
  assert!(error.message().contains("test.Missing"));
}

#[test]
fn test_unknown_ordering_reference_is_reported() {
  // Arrange
  let greeter = ServicePointDescriptor::new("Greeter", "test.Greeter")
    .create_instance("test.EnglishGreeter")
    .interceptor(InterceptorDescriptor::new("TagA").followed_by("Nowhere"))
    .interceptor(InterceptorDescriptor::new("TagB"));
  let (registry, errors) = build_registry(tagging_classes(), vec![interceptor_module(greeter)]);

  // Act
  let greeter = registry.get_service::<dyn Greeter>("test.Greeter").unwrap();

  // Assert
  assert_eq!(greeter.greet("x".into()), "A(B(Hello, x))");
  assert!(errors.contains("test.Nowhere"));
}
