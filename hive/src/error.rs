use crate::location::Location;
use thiserror::Error;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// A declarative problem: unknown ids, duplicates, arity or ordering conflicts.
  Configuration,
  /// Building a service implementation failed.
  Construction,
  /// The registry was shut down before the access.
  Shutdown,
  /// No service point or configuration point with the requested id.
  NotFound,
  /// The point exists but is private to another module.
  NotVisible,
  /// The point or object does not implement the requested interface.
  InterfaceMismatch,
  /// More than one service point implements the requested interface.
  Ambiguous,
  /// A class name could not be resolved.
  ClassResolution,
  /// A descriptor could not be read or parsed.
  Descriptor,
}

/// The single error type surfaced by the registry.
///
/// Carries a human readable message, an optional source location and an
/// optional root cause.
#[derive(Debug, Error)]
#[error("{message}{}", render_location(.location))]
pub struct Error {
  kind: ErrorKind,
  message: String,
  location: Option<Location>,
  #[source]
  source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

fn render_location(location: &Option<Location>) -> String {
  match location {
    Some(location) => format!(" [at {}]", location),
    None => String::new(),
  }
}

impl Error {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      location: None,
      source: None,
    }
  }

  pub fn at(mut self, location: Option<Location>) -> Self {
    if location.is_some() {
      self.location = location;
    }
    self
  }

  pub fn caused_by(mut self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
    self.source = Some(source.into());
    self
  }

  pub fn kind(&self) -> ErrorKind {
    self.kind
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }

  // --- Constructors for the common cases ---

  pub fn configuration(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Configuration, message)
  }

  /// Wraps `cause` into a construction failure for `service_id`.
  ///
  /// The cause's location is carried over when the cause has one.
  pub fn construction(service_id: &str, cause: Error) -> Self {
    let location = cause.location.clone();
    Self::new(
      ErrorKind::Construction,
      format!("Error building service {}: {}", service_id, cause.message),
    )
    .at(location)
    .caused_by(cause)
  }

  pub fn shutdown() -> Self {
    Self::new(ErrorKind::Shutdown, "The registry has been shut down.")
  }

  pub fn service_not_found(service_id: &str) -> Self {
    Self::new(
      ErrorKind::NotFound,
      format!("Service point {} does not exist.", service_id),
    )
  }

  pub fn configuration_not_found(configuration_id: &str) -> Self {
    Self::new(
      ErrorKind::NotFound,
      format!("Configuration point {} does not exist.", configuration_id),
    )
  }

  pub fn not_visible(kind: &str, id: &str, module_id: Option<&str>) -> Self {
    let message = match module_id {
      Some(module_id) => format!("{} {} is not visible to module {}.", kind, id, module_id),
      None => format!("{} {} is not visible outside its module.", kind, id),
    };
    Self::new(ErrorKind::NotVisible, message)
  }

  pub fn interface_mismatch(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::InterfaceMismatch, message)
  }

  pub fn class_not_found(name: &str) -> Self {
    Self::new(
      ErrorKind::ClassResolution,
      format!("Unable to resolve class {}.", name),
    )
  }

  pub fn descriptor(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Descriptor, message)
  }
}

/// A specialized `Result` type for registry operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
