//! Configuration points: named lists of elements contributed by modules.

use crate::descriptor::{Occurrences, Visibility};
use crate::error::{Error, Result};
use crate::location::Location;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A configuration element and where it was contributed.
#[derive(Debug, Clone)]
pub(crate) struct Element {
  pub(crate) value: Value,
  pub(crate) location: Option<Location>,
}

#[derive(Debug, Clone)]
pub(crate) struct ConfigurationPoint {
  id: String,
  module_id: String,
  visibility: Visibility,
  occurs: Occurrences,
  location: Option<Location>,
  elements: Vec<Element>,
}

impl ConfigurationPoint {
  pub(crate) fn new(
    id: String,
    module_id: String,
    visibility: Visibility,
    occurs: Occurrences,
    location: Option<Location>,
  ) -> Self {
    Self {
      id,
      module_id,
      visibility,
      occurs,
      location,
      elements: Vec::new(),
    }
  }

  pub(crate) fn id(&self) -> &str {
    &self.id
  }

  pub(crate) fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }

  pub(crate) fn occurs(&self) -> Occurrences {
    self.occurs
  }

  pub(crate) fn is_visible_to(&self, module_id: Option<&str>) -> bool {
    match self.visibility {
      Visibility::Public => true,
      Visibility::Private => module_id == Some(self.module_id.as_str()),
    }
  }

  pub(crate) fn contribute(&mut self, values: Vec<Value>, location: Option<Location>) {
    self.elements.extend(values.into_iter().map(|value| Element {
      value,
      location: location.clone(),
    }));
  }

  pub(crate) fn len(&self) -> usize {
    self.elements.len()
  }

  pub(crate) fn elements(&self) -> Vec<Value> {
    self.elements.iter().map(|e| e.value.clone()).collect()
  }

  /// Deserializes every element into `T`; the first failure names the
  /// element's contribution location.
  pub(crate) fn elements_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
    Ok(
      self
        .elements_with_locations_as()?
        .into_iter()
        .map(|(value, _)| value)
        .collect(),
    )
  }

  /// Like [`elements_as`](Self::elements_as), keeping the location of the
  /// contribution each element came from.
  pub(crate) fn elements_with_locations_as<T: DeserializeOwned>(&self) -> Result<Vec<(T, Option<Location>)>> {
    self
      .elements
      .iter()
      .map(|element| {
        serde_json::from_value(element.value.clone())
          .map(|value| (value, element.location.clone()))
          .map_err(|e| {
            Error::configuration(format!(
              "Invalid element in configuration point {}: {}",
              self.id, e
            ))
            .at(element.location.clone())
            .caused_by(e)
          })
      })
      .collect()
  }
}
