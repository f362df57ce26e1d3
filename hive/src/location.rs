//! Source locations attached to descriptors, contributions and errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a piece of configuration came from.
///
/// `resource` is usually a descriptor file path or a synthetic name such as
/// `"module calc"` for descriptors built in code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
  pub resource: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub line: Option<u32>,
}

impl Location {
  pub fn new(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      line: None,
    }
  }

  pub fn with_line(resource: impl Into<String>, line: u32) -> Self {
    Self {
      resource: resource.into(),
      line: Some(line),
    }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.line {
      Some(line) => write!(f, "{}, line {}", self.resource, line),
      None => f.write_str(&self.resource),
    }
  }
}
