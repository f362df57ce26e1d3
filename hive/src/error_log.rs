//! Reporting of non-fatal configuration errors.
//!
//! Declarative problems (unknown ids, duplicate contributions, ordering cycles,
//! type mismatches in pipeline contributions) never abort registry
//! construction. They are handed to an [`ErrorHandler`] together with the
//! location of the offending descriptor, and the registry carries on with a
//! best-effort default.

use crate::location::Location;
use parking_lot::Mutex;
use std::sync::Arc;

/// Receives non-fatal configuration errors.
pub trait ErrorHandler: Send + Sync {
  fn error(
    &self,
    message: &str,
    location: Option<&Location>,
    cause: Option<&(dyn std::error::Error + 'static)>,
  );
}

/// Reports errors through `tracing` at `ERROR` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
  fn error(
    &self,
    message: &str,
    location: Option<&Location>,
    cause: Option<&(dyn std::error::Error + 'static)>,
  ) {
    match (location, cause) {
      (Some(location), Some(cause)) => {
        tracing::error!(%location, error = %cause, "{}", message)
      }
      (Some(location), None) => tracing::error!(%location, "{}", message),
      (None, Some(cause)) => tracing::error!(error = %cause, "{}", message),
      (None, None) => tracing::error!("{}", message),
    }
  }
}

/// A reported configuration error, as captured by [`CollectingErrorHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
  pub message: String,
  pub location: Option<Location>,
}

/// Keeps every reported error in memory, in report order.
///
/// Useful for tooling that wants to present all problems at once after the
/// registry has been built.
#[derive(Debug, Default)]
pub struct CollectingErrorHandler {
  errors: Mutex<Vec<ReportedError>>,
}

impl CollectingErrorHandler {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn errors(&self) -> Vec<ReportedError> {
    self.errors.lock().clone()
  }

  pub fn messages(&self) -> Vec<String> {
    self.errors.lock().iter().map(|e| e.message.clone()).collect()
  }

  /// True when any reported message contains `fragment`.
  pub fn contains(&self, fragment: &str) -> bool {
    self.errors.lock().iter().any(|e| e.message.contains(fragment))
  }

  pub fn is_empty(&self) -> bool {
    self.errors.lock().is_empty()
  }
}

impl ErrorHandler for CollectingErrorHandler {
  fn error(
    &self,
    message: &str,
    location: Option<&Location>,
    cause: Option<&(dyn std::error::Error + 'static)>,
  ) {
    let message = match cause {
      Some(cause) => format!("{} ({})", message, cause),
      None => message.to_owned(),
    };
    self.errors.lock().push(ReportedError {
      message,
      location: location.cloned(),
    });
  }
}

/// Cheap, cloneable handle on the registry's [`ErrorHandler`].
#[derive(Clone)]
pub struct ErrorLog {
  handler: Arc<dyn ErrorHandler>,
}

impl ErrorLog {
  pub fn new(handler: Arc<dyn ErrorHandler>) -> Self {
    Self { handler }
  }

  pub fn error(&self, message: impl AsRef<str>, location: Option<&Location>) {
    self.handler.error(message.as_ref(), location, None);
  }

  pub fn error_with_cause(
    &self,
    message: impl AsRef<str>,
    location: Option<&Location>,
    cause: &(dyn std::error::Error + 'static),
  ) {
    self.handler.error(message.as_ref(), location, Some(cause));
  }
}

impl Default for ErrorLog {
  fn default() -> Self {
    Self::new(Arc::new(DefaultErrorHandler))
  }
}

impl std::fmt::Debug for ErrorLog {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ErrorLog").finish_non_exhaustive()
  }
}
