use super::{Registry, RegistryInner};
use crate::class::{
  Class, ClassResolver, DefaultClassResolver, InterfaceClass, LOGGING_INTERCEPTOR_FACTORY,
  SERVICE_INTERCEPTOR_FACTORY,
};
use crate::configuration::ConfigurationPoint;
use crate::descriptor::{
  find_module_files, BuilderDescriptor, ConfigurationPointDescriptor, InterceptorDescriptor,
  ModuleDescriptor, ServicePointDescriptor, Visibility,
};
use crate::error::Result;
use crate::error_log::{ErrorHandler, ErrorLog};
use crate::factory::{CreateInstanceConstructor, InvokeFactoryConstructor, ServiceImplementationConstructor};
use crate::interceptor::InterceptorContribution;
use crate::location::Location;
use crate::model::ServiceModelKind;
use crate::module::Module;
use crate::point::{ServicePointDefinition, ServicePointSpec};
use crate::shutdown::ShutdownCoordinator;
use crate::thread::ThreadEventNotifier;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Id of the module the registry always provides.
pub const HIVE_MODULE_ID: &str = "hive";

/// Collects module descriptors and collaborators, then builds a [`Registry`].
///
/// Declarative problems (unknown ids, duplicates, arity violations) do not
/// stop the build: they are reported to the error handler and the offending
/// contribution is skipped.
pub struct RegistryBuilder {
  modules: Vec<ModuleDescriptor>,
  class_resolver: Option<Arc<dyn ClassResolver>>,
  error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl RegistryBuilder {
  pub fn new() -> Self {
    Self {
      modules: Vec::new(),
      class_resolver: None,
      error_handler: None,
    }
  }

  pub fn module(mut self, descriptor: ModuleDescriptor) -> Self {
    self.modules.push(descriptor);
    self
  }

  pub fn modules(mut self, descriptors: impl IntoIterator<Item = ModuleDescriptor>) -> Self {
    self.modules.extend(descriptors);
    self
  }

  /// Adds the module described by a YAML file.
  pub fn module_file(self, path: impl AsRef<Path>) -> Result<Self> {
    let descriptor = ModuleDescriptor::from_yaml_file(path)?;
    Ok(self.module(descriptor))
  }

  /// Adds every `*.hive.yaml` module found directly inside `dir`.
  pub fn module_directory(mut self, dir: impl AsRef<Path>) -> Result<Self> {
    for path in find_module_files(dir)? {
      self = self.module_file(path)?;
    }
    Ok(self)
  }

  /// Defaults to a [`DefaultClassResolver`] with only the built-in classes.
  pub fn class_resolver(mut self, resolver: Arc<dyn ClassResolver>) -> Self {
    self.class_resolver = Some(resolver);
    self
  }

  /// Defaults to [`DefaultErrorHandler`](crate::DefaultErrorHandler), which logs.
  pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
    self.error_handler = Some(handler);
    self
  }

  pub fn build(self) -> Registry {
    let error_log = self.error_handler.map(ErrorLog::new).unwrap_or_default();
    let class_resolver = self
      .class_resolver
      .unwrap_or_else(|| Arc::new(DefaultClassResolver::new()) as Arc<dyn ClassResolver>);

    let mut modules = Vec::with_capacity(self.modules.len() + 1);
    modules.push(hive_module());
    modules.extend(self.modules);
    for module in &mut modules {
      module.propagate_locations();
    }

    let mut eager_load = Vec::new();
    let inner = Arc::new_cyclic(|registry| {
      Assembly::new(error_log, class_resolver, registry.clone()).assemble(modules, &mut eager_load)
    });
    let registry = Registry { inner };

    info!(
      modules = registry.inner.modules.len(),
      service_points = registry.inner.service_points.len(),
      configuration_points = registry.inner.configuration_points.len(),
      "registry built"
    );

    for (service_id, location) in eager_load {
      registry.eager_load(&service_id, location.as_ref());
    }
    registry
  }
}

impl Default for RegistryBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl Registry {
  fn eager_load(&self, service_id: &str, location: Option<&Location>) {
    let Some(entry) = self.inner.service_points.get(service_id) else {
      self.inner.error_log.error(
        format!("Unable to eagerly load unknown service point {}.", service_id),
        location,
      );
      return;
    };

    debug!(service_id, "eagerly loading service");
    if let Err(error) = entry.instantiate() {
      self.inner.error_log.error_with_cause(
        format!("Unable to eagerly load service {}: {}", service_id, error.message()),
        location,
        &error,
      );
    }
  }
}

/// The module contributing the built-in services.
fn hive_module() -> ModuleDescriptor {
  ModuleDescriptor::new(HIVE_MODULE_ID).service_point(
    ServicePointDescriptor::new("LoggingInterceptor", SERVICE_INTERCEPTOR_FACTORY)
      .create_instance(LOGGING_INTERCEPTOR_FACTORY)
      .model(ServiceModelKind::Primitive),
  )
}

// A service point gathered from descriptors, before its point is created.
struct PendingPoint {
  service_id: String,
  interface: InterfaceClass,
  descriptor: ServicePointDescriptor,
  module: Module,
  builder: Option<PendingBuilder>,
  interceptors: Vec<InterceptorContribution>,
}

struct PendingBuilder {
  descriptor: BuilderDescriptor,
  module: Module,
  location: Option<Location>,
}

impl PendingBuilder {
  fn constructor(self) -> Arc<dyn ServiceImplementationConstructor> {
    match self.descriptor {
      BuilderDescriptor::CreateInstance { class, .. } => {
        Arc::new(CreateInstanceConstructor::new(class, self.module, self.location))
      }
      BuilderDescriptor::InvokeFactory {
        service_id,
        parameters,
        ..
      } => {
        let factory_service_id = self.module.expand_id(&service_id);
        Arc::new(InvokeFactoryConstructor::new(
          factory_service_id,
          parameters,
          self.module,
          self.location,
        ))
      }
    }
  }
}

/// One registry build, turning descriptors into points.
struct Assembly {
  error_log: ErrorLog,
  class_resolver: Arc<dyn ClassResolver>,
  registry: Weak<RegistryInner>,
  modules: HashMap<String, Module>,
  pending: Vec<PendingPoint>,
  pending_index: HashMap<String, usize>,
  configuration_points: HashMap<String, ConfigurationPoint>,
}

impl Assembly {
  fn new(error_log: ErrorLog, class_resolver: Arc<dyn ClassResolver>, registry: Weak<RegistryInner>) -> Self {
    Self {
      error_log,
      class_resolver,
      registry,
      modules: HashMap::new(),
      pending: Vec::new(),
      pending_index: HashMap::new(),
      configuration_points: HashMap::new(),
    }
  }

  fn assemble(
    mut self,
    descriptors: Vec<ModuleDescriptor>,
    eager_load: &mut Vec<(String, Option<Location>)>,
  ) -> RegistryInner {
    let mut accepted = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
      if self.modules.contains_key(&descriptor.module_id) {
        self.error_log.error(
          format!(
            "Module {} is declared more than once; the later declaration is ignored.",
            descriptor.module_id
          ),
          descriptor.location.as_ref(),
        );
        continue;
      }
      let module = Module::new(&descriptor.module_id, self.error_log.clone(), self.registry.clone());
      self.modules.insert(descriptor.module_id.clone(), module.clone());
      accepted.push((descriptor, module));
    }

    // Points first, so that contributions may target points of any module.
    for (descriptor, module) in &accepted {
      for point in &descriptor.service_points {
        self.declare_service_point(point, module);
      }
      for point in &descriptor.configuration_points {
        self.declare_configuration_point(point, module);
      }
    }

    for (descriptor, module) in &accepted {
      for implementation in &descriptor.implementations {
        let service_id = module.expand_id(&implementation.service_id);
        let location = implementation.location.as_ref();
        if let Some(builder) = &implementation.builder {
          self.add_builder(&service_id, builder, module, location);
        }
        for interceptor in &implementation.interceptors {
          self.add_interceptor(&service_id, interceptor, module, location);
        }
      }
      for contribution in &descriptor.contributions {
        let configuration_id = module.expand_id(&contribution.configuration_id);
        self.contribute_configuration(
          &configuration_id,
          contribution.elements.clone(),
          module,
          contribution.location.as_ref(),
        );
      }
      for service_id in &descriptor.eager_load {
        eager_load.push((module.expand_id(service_id), descriptor.location.clone()));
      }
    }

    self.check_configuration_counts();
    self.finish()
  }

  fn declare_service_point(&mut self, descriptor: &ServicePointDescriptor, module: &Module) {
    let service_id = module.expand_id(&descriptor.id);
    let location = descriptor.location.as_ref();

    if let Some(&existing) = self.pending_index.get(&service_id) {
      let previous = self.pending[existing]
        .descriptor
        .location
        .as_ref()
        .map(|l| format!(" (previously declared at {})", l))
        .unwrap_or_default();
      self.error_log.error(
        format!(
          "Service point {} is declared more than once{}; the later declaration is ignored.",
          service_id, previous
        ),
        location,
      );
      return;
    }

    let interface = match self.class_resolver.find_class(&descriptor.interface) {
      Ok(Class::Interface(interface)) => interface,
      Ok(Class::Implementation(_)) => {
        self.error_log.error(
          format!(
            "Service point {} names {} as its interface, but it is an implementation class.",
            service_id, descriptor.interface
          ),
          location,
        );
        return;
      }
      Err(error) => {
        self.error_log.error_with_cause(
          format!("Service point {} is ignored: {}", service_id, error.message()),
          location,
          &error,
        );
        return;
      }
    };

    self.pending_index.insert(service_id.clone(), self.pending.len());
    self.pending.push(PendingPoint {
      service_id: service_id.clone(),
      interface,
      descriptor: descriptor.clone(),
      module: module.clone(),
      builder: None,
      interceptors: Vec::new(),
    });

    if let Some(builder) = &descriptor.builder {
      self.add_builder(&service_id, builder, module, location);
    }
    for interceptor in &descriptor.interceptors {
      self.add_interceptor(&service_id, interceptor, module, location);
    }
  }

  /// Finds a pending point that `module` may contribute to.
  fn contribution_target(
    &mut self,
    service_id: &str,
    module: &Module,
    location: Option<&Location>,
  ) -> Option<&mut PendingPoint> {
    let Some(&index) = self.pending_index.get(service_id) else {
      self.error_log.error(
        format!(
          "Module {} contributes to unknown service point {}.",
          module.module_id(),
          service_id
        ),
        location,
      );
      return None;
    };

    let point = &mut self.pending[index];
    let private = point.descriptor.visibility == Visibility::Private;
    if private && point.module.module_id() != module.module_id() {
      self.error_log.error(
        format!(
          "Service point {} is not visible to module {}.",
          service_id,
          module.module_id()
        ),
        location,
      );
      return None;
    }
    Some(point)
  }

  fn add_builder(
    &mut self,
    service_id: &str,
    builder: &BuilderDescriptor,
    module: &Module,
    location: Option<&Location>,
  ) {
    let error_log = self.error_log.clone();
    let Some(point) = self.contribution_target(service_id, module, location) else {
      return;
    };

    if let Some(existing) = &point.builder {
      let previous = existing
        .location
        .as_ref()
        .map(|l| format!(" (already contributed at {})", l))
        .unwrap_or_default();
      error_log.error(
        format!(
          "Service point {} already has an implementation{}; the later contribution is ignored.",
          service_id, previous
        ),
        location,
      );
      return;
    }

    point.builder = Some(PendingBuilder {
      descriptor: builder.clone(),
      module: module.clone(),
      location: location.cloned(),
    });
  }

  fn add_interceptor(
    &mut self,
    service_id: &str,
    interceptor: &InterceptorDescriptor,
    module: &Module,
    location: Option<&Location>,
  ) {
    let location = interceptor.location.as_ref().or(location);
    if let Some(point) = self.contribution_target(service_id, module, location) {
      point
        .interceptors
        .push(InterceptorContribution::from_descriptor(interceptor, module));
    }
  }

  fn declare_configuration_point(&mut self, descriptor: &ConfigurationPointDescriptor, module: &Module) {
    let configuration_id = module.expand_id(&descriptor.id);
    if let Some(existing) = self.configuration_points.get(&configuration_id) {
      let previous = existing
        .location()
        .map(|l| format!(" (previously declared at {})", l))
        .unwrap_or_default();
      self.error_log.error(
        format!(
          "Configuration point {} is declared more than once{}; the later declaration is ignored.",
          configuration_id, previous
        ),
        descriptor.location.as_ref(),
      );
      return;
    }

    self.configuration_points.insert(
      configuration_id.clone(),
      ConfigurationPoint::new(
        configuration_id,
        module.module_id().to_owned(),
        descriptor.visibility,
        descriptor.occurs,
        descriptor.location.clone(),
      ),
    );
  }

  fn contribute_configuration(
    &mut self,
    configuration_id: &str,
    elements: Vec<serde_json::Value>,
    module: &Module,
    location: Option<&Location>,
  ) {
    let Some(point) = self.configuration_points.get_mut(configuration_id) else {
      self.error_log.error(
        format!(
          "Module {} contributes to unknown configuration point {}.",
          module.module_id(),
          configuration_id
        ),
        location,
      );
      return;
    };

    if !point.is_visible_to(Some(module.module_id())) {
      self.error_log.error(
        format!(
          "Configuration point {} is not visible to module {}.",
          configuration_id,
          module.module_id()
        ),
        location,
      );
      return;
    }
    point.contribute(elements, location.cloned());
  }

  fn check_configuration_counts(&self) {
    let mut points: Vec<&ConfigurationPoint> = self.configuration_points.values().collect();
    points.sort_by(|a, b| a.id().cmp(b.id()));
    for point in points {
      if !point.occurs().in_range(point.len()) {
        self.error_log.error(
          format!(
            "Configuration point {} contains {} elements but expects {}.",
            point.id(),
            point.len(),
            point.occurs().as_str()
          ),
          point.location(),
        );
      }
    }
  }

  fn finish(self) -> RegistryInner {
    let mut service_points = HashMap::with_capacity(self.pending.len());
    let mut service_ids = Vec::with_capacity(self.pending.len());

    for pending in self.pending {
      let model = pending
        .builder
        .as_ref()
        .and_then(|builder| builder.descriptor.model())
        .unwrap_or_default();

      if pending.builder.is_none() {
        self.error_log.error(
          format!("No implementation has been contributed for service point {}.", pending.service_id),
          pending.descriptor.location.as_ref(),
        );
      }

      let definition = ServicePointDefinition {
        service_id: pending.service_id.clone(),
        module_id: pending.module.module_id().to_owned(),
        interface_name: pending.descriptor.interface.clone(),
        interface_type_name: pending.interface.type_name(),
        interface_type_id: pending.interface.type_id(),
        visibility: pending.descriptor.visibility,
        parameters_occurs: pending.descriptor.parameters_occurs,
        model,
        location: pending.descriptor.location.clone(),
      };
      let spec = ServicePointSpec {
        definition,
        module: pending.module,
        constructor: pending.builder.map(PendingBuilder::constructor),
        interceptors: pending.interceptors,
      };

      debug!(service_id = %pending.service_id, model = %model, "service point declared");
      service_points.insert(pending.service_id.clone(), pending.interface.create_service_point(spec));
      service_ids.push(pending.service_id);
    }

    RegistryInner {
      modules: self.modules,
      service_points,
      service_ids,
      configuration_points: self.configuration_points,
      class_resolver: self.class_resolver,
      shutdown: Arc::new(ShutdownCoordinator::new()),
      threads: Arc::new(ThreadEventNotifier::new()),
      invalidated: AtomicBool::new(false),
      error_log: self.error_log,
    }
  }
}
