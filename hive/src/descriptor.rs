//! Module descriptors: the declarative input of the registry.
//!
//! Descriptors are plain serde data. They can be built in code with the
//! builder-style methods below or loaded from YAML:
//!
//! ```yaml
//! module_id: calc
//! service_points:
//!   - id: Adder
//!     interface: calc.Adder
//!     builder:
//!       create_instance:
//!         class: calc.AdderImpl
//!         model: pooled
//!     interceptors:
//!       - service_id: hive.LoggingInterceptor
//! configuration_points:
//!   - id: Operations
//!     occurs: 1..n
//! contributions:
//!   - configuration_id: Operations
//!     elements: [{ name: add }]
//! ```

use crate::error::{Error, Result};
use crate::location::Location;
use crate::model::ServiceModelKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// File suffix picked up by [`find_module_files`].
pub const MODULE_FILE_SUFFIX: &str = ".hive.yaml";

/// Who may see a service or configuration point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
  /// Visible to every module and to registry clients.
  #[default]
  Public,
  /// Visible only inside the declaring module.
  Private,
}

/// Expected number of contributions or factory parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Occurrences {
  #[serde(rename = "0..1")]
  Optional,
  #[serde(rename = "1")]
  Required,
  #[default]
  #[serde(rename = "0..n")]
  Unbounded,
  #[serde(rename = "1..n")]
  OneOrMore,
  #[serde(rename = "none")]
  None,
}

impl Occurrences {
  pub fn in_range(self, count: usize) -> bool {
    match self {
      Occurrences::Optional => count <= 1,
      Occurrences::Required => count == 1,
      Occurrences::Unbounded => true,
      Occurrences::OneOrMore => count >= 1,
      Occurrences::None => count == 0,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Occurrences::Optional => "0..1",
      Occurrences::Required => "1",
      Occurrences::Unbounded => "0..n",
      Occurrences::OneOrMore => "1..n",
      Occurrences::None => "none",
    }
  }
}

/// How a service point's core implementation is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderDescriptor {
  /// Instantiate a class known to the class resolver.
  CreateInstance {
    class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<ServiceModelKind>,
  },
  /// Ask a `ServiceImplementationFactory` service to build the implementation.
  InvokeFactory {
    service_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<ServiceModelKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<Value>,
  },
}

impl BuilderDescriptor {
  pub fn model(&self) -> Option<ServiceModelKind> {
    match self {
      BuilderDescriptor::CreateInstance { model, .. } => *model,
      BuilderDescriptor::InvokeFactory { model, .. } => *model,
    }
  }

  fn set_model(&mut self, kind: ServiceModelKind) {
    match self {
      BuilderDescriptor::CreateInstance { model, .. } => *model = Some(kind),
      BuilderDescriptor::InvokeFactory { model, .. } => *model = Some(kind),
    }
  }
}

/// An interceptor contributed to a service point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptorDescriptor {
  /// Id of the `ServiceInterceptorFactory` service.
  pub service_id: String,
  /// Ordering name; defaults to the factory's qualified id.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  /// Interceptors that must run before this one (comma-separated).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub preceding_ids: Option<String>,
  /// Interceptors that must run after this one (comma-separated).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub following_ids: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub parameters: Vec<Value>,
  #[serde(skip)]
  pub location: Option<Location>,
}

impl InterceptorDescriptor {
  pub fn new(service_id: impl Into<String>) -> Self {
    Self {
      service_id: service_id.into(),
      name: None,
      preceding_ids: None,
      following_ids: None,
      parameters: Vec::new(),
      location: None,
    }
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Interceptors that must run before this one.
  pub fn preceded_by(mut self, ids: impl Into<String>) -> Self {
    self.preceding_ids = Some(ids.into());
    self
  }

  /// Interceptors that must run after this one.
  pub fn followed_by(mut self, ids: impl Into<String>) -> Self {
    self.following_ids = Some(ids.into());
    self
  }

  pub fn parameter(mut self, parameter: Value) -> Self {
    self.parameters.push(parameter);
    self
  }
}

/// Declares a service point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePointDescriptor {
  pub id: String,
  /// Interface name, resolved through the class resolver.
  pub interface: String,
  #[serde(default)]
  pub visibility: Visibility,
  /// Expected number of parameters for `invoke_factory` builders.
  #[serde(default)]
  pub parameters_occurs: Occurrences,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub builder: Option<BuilderDescriptor>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub interceptors: Vec<InterceptorDescriptor>,
  #[serde(skip)]
  pub location: Option<Location>,
}

impl ServicePointDescriptor {
  pub fn new(id: impl Into<String>, interface: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      interface: interface.into(),
      visibility: Visibility::Public,
      parameters_occurs: Occurrences::default(),
      builder: None,
      interceptors: Vec::new(),
      location: None,
    }
  }

  pub fn private(mut self) -> Self {
    self.visibility = Visibility::Private;
    self
  }

  pub fn parameters_occurs(mut self, occurs: Occurrences) -> Self {
    self.parameters_occurs = occurs;
    self
  }

  pub fn create_instance(mut self, class: impl Into<String>) -> Self {
    self.builder = Some(BuilderDescriptor::CreateInstance {
      class: class.into(),
      model: None,
    });
    self
  }

  pub fn invoke_factory(mut self, service_id: impl Into<String>, parameters: Vec<Value>) -> Self {
    self.builder = Some(BuilderDescriptor::InvokeFactory {
      service_id: service_id.into(),
      model: None,
      parameters,
    });
    self
  }

  /// Sets the service model of the current builder; call after choosing one.
  pub fn model(mut self, kind: ServiceModelKind) -> Self {
    if let Some(builder) = &mut self.builder {
      builder.set_model(kind);
    }
    self
  }

  pub fn interceptor(mut self, interceptor: InterceptorDescriptor) -> Self {
    self.interceptors.push(interceptor);
    self
  }
}

/// Declares a configuration point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationPointDescriptor {
  pub id: String,
  #[serde(default)]
  pub visibility: Visibility,
  /// Expected number of contributed elements.
  #[serde(default)]
  pub occurs: Occurrences,
  #[serde(skip)]
  pub location: Option<Location>,
}

impl ConfigurationPointDescriptor {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      visibility: Visibility::Public,
      occurs: Occurrences::default(),
      location: None,
    }
  }

  pub fn private(mut self) -> Self {
    self.visibility = Visibility::Private;
    self
  }

  pub fn occurs(mut self, occurs: Occurrences) -> Self {
    self.occurs = occurs;
    self
  }
}

/// Elements contributed to a configuration point, possibly of another module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionDescriptor {
  pub configuration_id: String,
  #[serde(default)]
  pub elements: Vec<Value>,
  #[serde(skip)]
  pub location: Option<Location>,
}

impl ContributionDescriptor {
  pub fn new(configuration_id: impl Into<String>, elements: Vec<Value>) -> Self {
    Self {
      configuration_id: configuration_id.into(),
      elements,
      location: None,
    }
  }
}

/// Supplies a builder and/or interceptors for a service point declared elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationDescriptor {
  pub service_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub builder: Option<BuilderDescriptor>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub interceptors: Vec<InterceptorDescriptor>,
  #[serde(skip)]
  pub location: Option<Location>,
}

impl ImplementationDescriptor {
  pub fn new(service_id: impl Into<String>) -> Self {
    Self {
      service_id: service_id.into(),
      builder: None,
      interceptors: Vec::new(),
      location: None,
    }
  }

  pub fn create_instance(mut self, class: impl Into<String>) -> Self {
    self.builder = Some(BuilderDescriptor::CreateInstance {
      class: class.into(),
      model: None,
    });
    self
  }

  pub fn invoke_factory(mut self, service_id: impl Into<String>, parameters: Vec<Value>) -> Self {
    self.builder = Some(BuilderDescriptor::InvokeFactory {
      service_id: service_id.into(),
      model: None,
      parameters,
    });
    self
  }

  pub fn model(mut self, kind: ServiceModelKind) -> Self {
    if let Some(builder) = &mut self.builder {
      builder.set_model(kind);
    }
    self
  }

  pub fn interceptor(mut self, interceptor: InterceptorDescriptor) -> Self {
    self.interceptors.push(interceptor);
    self
  }
}

/// Everything one module contributes to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
  pub module_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub service_points: Vec<ServicePointDescriptor>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub configuration_points: Vec<ConfigurationPointDescriptor>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub contributions: Vec<ContributionDescriptor>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub implementations: Vec<ImplementationDescriptor>,
  /// Service ids instantiated as soon as the registry is built.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub eager_load: Vec<String>,
  #[serde(skip)]
  pub location: Option<Location>,
}

impl ModuleDescriptor {
  pub fn new(module_id: impl Into<String>) -> Self {
    Self {
      module_id: module_id.into(),
      version: None,
      service_points: Vec::new(),
      configuration_points: Vec::new(),
      contributions: Vec::new(),
      implementations: Vec::new(),
      eager_load: Vec::new(),
      location: None,
    }
  }

  pub fn service_point(mut self, service_point: ServicePointDescriptor) -> Self {
    self.service_points.push(service_point);
    self
  }

  pub fn configuration_point(mut self, configuration_point: ConfigurationPointDescriptor) -> Self {
    self.configuration_points.push(configuration_point);
    self
  }

  pub fn contribution(mut self, contribution: ContributionDescriptor) -> Self {
    self.contributions.push(contribution);
    self
  }

  pub fn implementation(mut self, implementation: ImplementationDescriptor) -> Self {
    self.implementations.push(implementation);
    self
  }

  pub fn eager_load(mut self, service_id: impl Into<String>) -> Self {
    self.eager_load.push(service_id.into());
    self
  }

  /// Parses a descriptor from YAML text.
  pub fn from_yaml_str(yaml: &str) -> Result<Self> {
    serde_yaml::from_str(yaml)
      .map_err(|e| Error::descriptor(format!("Unable to parse module descriptor: {}", e)).caused_by(e))
  }

  /// Reads and parses a descriptor file; every item is located at `path`.
  pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let location = Location::new(path.display().to_string());
    let text = fs::read_to_string(path).map_err(|e| {
      Error::descriptor(format!("Unable to read module descriptor: {}", e))
        .at(Some(location.clone()))
        .caused_by(e)
    })?;
    let mut descriptor = Self::from_yaml_str(&text).map_err(|e| e.at(Some(location.clone())))?;
    descriptor.location = Some(location);
    Ok(descriptor)
  }

  /// Gives every item without a location the module's location, inventing
  /// one from the module id when the module has none either.
  pub(crate) fn propagate_locations(&mut self) {
    let location = self
      .location
      .get_or_insert_with(|| Location::new(format!("module {}", self.module_id)))
      .clone();

    let fill = |slot: &mut Option<Location>| {
      if slot.is_none() {
        *slot = Some(location.clone());
      }
    };

    for point in &mut self.service_points {
      fill(&mut point.location);
      for interceptor in &mut point.interceptors {
        fill(&mut interceptor.location);
      }
    }
    for point in &mut self.configuration_points {
      fill(&mut point.location);
    }
    for contribution in &mut self.contributions {
      fill(&mut contribution.location);
    }
    for implementation in &mut self.implementations {
      fill(&mut implementation.location);
      for interceptor in &mut implementation.interceptors {
        fill(&mut interceptor.location);
      }
    }
  }
}

/// Lists the module descriptor files (`*.hive.yaml`) directly inside `dir`,
/// sorted by file name.
pub fn find_module_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
  let dir = dir.as_ref();
  let entries = fs::read_dir(dir).map_err(|e| {
    Error::descriptor(format!(
      "Unable to list module descriptors in {}: {}",
      dir.display(),
      e
    ))
    .caused_by(e)
  })?;

  let mut files = Vec::new();
  for entry in entries {
    let path = entry
      .map_err(|e| Error::descriptor(format!("Unable to read directory entry: {}", e)).caused_by(e))?
      .path();
    let is_module = path
      .file_name()
      .and_then(|name| name.to_str())
      .map_or(false, |name| name.ends_with(MODULE_FILE_SUFFIX));
    if is_module && path.is_file() {
      files.push(path);
    }
  }
  files.sort();
  Ok(files)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn occurrences_bound_counts() {
    assert!(Occurrences::Optional.in_range(0));
    assert!(!Occurrences::Optional.in_range(2));
    assert!(Occurrences::Required.in_range(1));
    assert!(!Occurrences::Required.in_range(0));
    assert!(Occurrences::OneOrMore.in_range(5));
    assert!(!Occurrences::None.in_range(1));
    assert!(Occurrences::Unbounded.in_range(0));
  }

  #[test]
  fn yaml_module_is_parsed() {
    let descriptor = ModuleDescriptor::from_yaml_str(
      r#"
module_id: calc
service_points:
  - id: Adder
    interface: calc.Adder
    visibility: private
    parameters_occurs: "1"
    builder:
      invoke_factory:
        service_id: AdderFactory
        model: threaded
        parameters: [{ offset: 2 }]
    interceptors:
      - service_id: hive.LoggingInterceptor
        preceding_ids: calc.Audit
configuration_points:
  - id: Operations
    occurs: 1..n
eager_load: [Adder]
"#,
    )
    .unwrap();

    let adder = &descriptor.service_points[0];
    assert_eq!(adder.visibility, Visibility::Private);
    assert_eq!(adder.parameters_occurs, Occurrences::Required);
    assert_eq!(adder.builder.as_ref().and_then(BuilderDescriptor::model), Some(ServiceModelKind::Threaded));
    assert_eq!(adder.interceptors[0].preceding_ids.as_deref(), Some("calc.Audit"));
    assert_eq!(descriptor.configuration_points[0].occurs, Occurrences::OneOrMore);
    assert_eq!(descriptor.eager_load, vec!["Adder".to_string()]);
  }

  #[test]
  fn locations_fall_back_to_the_module() {
    let mut descriptor = ModuleDescriptor::new("calc")
      .service_point(ServicePointDescriptor::new("Adder", "calc.Adder"))
      .contribution(ContributionDescriptor::new("Operations", Vec::new()));

    descriptor.propagate_locations();

    let expected = Some(Location::new("module calc"));
    assert_eq!(descriptor.service_points[0].location, expected);
    assert_eq!(descriptor.contributions[0].location, expected);
  }

  #[test]
  fn module_files_are_found_by_suffix() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.hive.yaml", "a.hive.yaml", "c.yaml"] {
      fs::write(dir.path().join(name), "module_id: x").unwrap();
    }

    let files = find_module_files(dir.path()).unwrap();

    let names: Vec<_> = files
      .iter()
      .filter_map(|p| p.file_name()?.to_str().map(str::to_owned))
      .collect();
    assert_eq!(names, vec!["a.hive.yaml", "b.hive.yaml"]);
  }
}
