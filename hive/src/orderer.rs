//! Dependency-respecting ordering of named items.
//!
//! Used for interceptor contributions and pipeline filters. Every item has a
//! name, a list of names that must come *before* it (prerequisites) and a list
//! of names that must come *after* it (postrequisites). The lists are
//! comma-separated strings, as written in module descriptors.

use crate::error_log::ErrorLog;
use crate::location::Location;
use std::collections::HashMap;
use tracing::debug;

/// Matches every other item when used as a prerequisite or postrequisite.
const WILDCARD: &str = "*";

/// An object plus the constraints that position it.
#[derive(Debug, Clone)]
pub struct OrderableItem<T> {
  object: T,
  name: String,
  prerequisites: Vec<String>,
  postrequisites: Vec<String>,
  location: Option<Location>,
}

impl<T> OrderableItem<T> {
  pub fn object(&self) -> &T {
    &self.object
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn prerequisites(&self) -> &[String] {
    &self.prerequisites
  }

  pub fn postrequisites(&self) -> &[String] {
    &self.postrequisites
  }

  pub fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }
}

/// Splits a comma-separated id list, dropping blanks.
pub fn split_names(list: Option<&str>) -> Vec<String> {
  list
    .map(|list| {
      list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
    })
    .unwrap_or_default()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  Visiting,
  Done,
}

/// Produces a total order over a set of named items.
///
/// Problems in the constraints never abort ordering. Unknown names, duplicate
/// names and cycles are reported through the [`ErrorLog`] and the offending
/// constraint (or, for duplicates, the later item) is dropped. The result is
/// always a permutation of the accepted items; items without constraints keep
/// their insertion order.
pub struct Orderer<T> {
  error_log: ErrorLog,
  object_kind: String,
  items: Vec<OrderableItem<T>>,
  by_name: HashMap<String, usize>,
}

impl<T> Orderer<T> {
  /// `object_kind` names the items in error messages, e.g. `"interceptor contribution"`.
  pub fn new(error_log: ErrorLog, object_kind: impl Into<String>) -> Self {
    Self {
      error_log,
      object_kind: object_kind.into(),
      items: Vec::new(),
      by_name: HashMap::new(),
    }
  }

  pub fn add(
    &mut self,
    object: T,
    name: impl Into<String>,
    prerequisites: Option<&str>,
    postrequisites: Option<&str>,
  ) {
    self.add_at(object, name, prerequisites, postrequisites, None);
  }

  pub fn add_at(
    &mut self,
    object: T,
    name: impl Into<String>,
    prerequisites: Option<&str>,
    postrequisites: Option<&str>,
    location: Option<Location>,
  ) {
    let name = name.into();

    if let Some(&existing) = self.by_name.get(&name) {
      let previous = self.items[existing]
        .location
        .as_ref()
        .map(|l| format!(" (previously defined at {})", l))
        .unwrap_or_default();
      self.error_log.error(
        format!(
          "Duplicate {} named '{}'{}; the later contribution is ignored.",
          self.object_kind, name, previous
        ),
        location.as_ref(),
      );
      return;
    }

    self.by_name.insert(name.clone(), self.items.len());
    self.items.push(OrderableItem {
      object,
      name,
      prerequisites: split_names(prerequisites),
      postrequisites: split_names(postrequisites),
      location,
    });
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// Consumes the orderer, returning the objects in dependency order.
  pub fn ordered(self) -> Vec<T> {
    let count = self.items.len();
    // predecessors[i]: items that must be emitted before item i.
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut leaders = vec![false; count];
    let mut trailers = vec![false; count];

    for (index, item) in self.items.iter().enumerate() {
      for name in &item.prerequisites {
        if name == WILDCARD {
          trailers[index] = true;
          continue;
        }
        match self.by_name.get(name) {
          Some(&before) => predecessors[index].push(before),
          None => self.report_unknown(item, name),
        }
      }
      for name in &item.postrequisites {
        if name == WILDCARD {
          leaders[index] = true;
          continue;
        }
        match self.by_name.get(name) {
          Some(&after) => predecessors[after].push(index),
          None => self.report_unknown(item, name),
        }
      }
    }

    let leader_ids: Vec<usize> = (0..count).filter(|&i| leaders[i]).collect();
    for index in 0..count {
      if !leaders[index] {
        predecessors[index].extend_from_slice(&leader_ids);
      }
      if trailers[index] {
        predecessors[index].extend((0..count).filter(|&other| !trailers[other]));
      }
    }

    // Visit predecessors in insertion order so ties resolve the same way every time.
    for list in &mut predecessors {
      list.sort_unstable();
      list.dedup();
    }

    let mut marks = vec![Mark::Unvisited; count];
    let mut order = Vec::with_capacity(count);
    for index in 0..count {
      if marks[index] == Mark::Unvisited {
        self.visit(index, &predecessors, &mut marks, &mut order);
      }
    }

    debug!(
      kind = %self.object_kind,
      order = ?order.iter().map(|&i| self.items[i].name.as_str()).collect::<Vec<_>>(),
      "ordered items"
    );

    let mut slots: Vec<Option<T>> = self.items.into_iter().map(|item| Some(item.object)).collect();
    order
      .into_iter()
      .filter_map(|index| slots[index].take())
      .collect()
  }

  // Depth-first walk with an explicit stack; each frame is an item and the
  // position of its next predecessor to look at.
  fn visit(
    &self,
    start: usize,
    predecessors: &[Vec<usize>],
    marks: &mut [Mark],
    order: &mut Vec<usize>,
  ) {
    marks[start] = Mark::Visiting;
    let mut stack = vec![(start, 0usize)];

    while let Some(frame) = stack.last_mut() {
      let (index, position) = *frame;
      match predecessors[index].get(position) {
        Some(&before) => {
          frame.1 += 1;
          match marks[before] {
            Mark::Unvisited => {
              marks[before] = Mark::Visiting;
              stack.push((before, 0));
            }
            Mark::Visiting => self.report_cycle(index, before),
            Mark::Done => {}
          }
        }
        None => {
          stack.pop();
          marks[index] = Mark::Done;
          order.push(index);
        }
      }
    }
  }

  fn report_unknown(&self, item: &OrderableItem<T>, name: &str) {
    self.error_log.error(
      format!(
        "{} '{}' references unknown {} '{}'; the constraint is ignored.",
        capitalize(&self.object_kind),
        item.name,
        self.object_kind,
        name
      ),
      item.location.as_ref(),
    );
  }

  fn report_cycle(&self, index: usize, before: usize) {
    let item = &self.items[index];
    self.error_log.error(
      format!(
        "Unable to order {} '{}' after '{}': the constraints form a cycle; the constraint is ignored.",
        self.object_kind, item.name, self.items[before].name
      ),
      item.location.as_ref(),
    );
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error_log::CollectingErrorHandler;
  use std::sync::Arc;

  fn orderer() -> (Orderer<&'static str>, Arc<CollectingErrorHandler>) {
    let handler = Arc::new(CollectingErrorHandler::new());
    (Orderer::new(ErrorLog::new(handler.clone()), "task"), handler)
  }

  #[test]
  fn unconstrained_items_keep_insertion_order() {
    let (mut orderer, errors) = orderer();
    orderer.add("a", "a", None, None);
    orderer.add("b", "b", None, None);
    orderer.add("c", "c", None, None);

    assert_eq!(orderer.ordered(), vec!["a", "b", "c"]);
    assert!(errors.is_empty());
  }

  #[test]
  fn prerequisites_and_postrequisites_are_both_honoured() {
    let (mut orderer, errors) = orderer();
    orderer.add("c", "c", Some("b"), None);
    orderer.add("a", "a", None, Some("b"));
    orderer.add("b", "b", None, None);

    assert_eq!(orderer.ordered(), vec!["a", "b", "c"]);
    assert!(errors.is_empty());
  }

  #[test]
  fn split_names_trims_and_skips_blanks() {
    assert_eq!(split_names(Some(" a, b ,,c ")), vec!["a", "b", "c"]);
    assert!(split_names(None).is_empty());
  }

  #[test]
  fn wildcards_make_leaders_and_trailers() {
    let (mut orderer, _) = orderer();
    orderer.add("last", "last", Some("*"), None);
    orderer.add("middle", "middle", None, None);
    orderer.add("first", "first", None, Some("*"));

    assert_eq!(orderer.ordered(), vec!["first", "middle", "last"]);
  }

  #[test]
  fn long_dependency_chain_is_ordered() {
    let handler = Arc::new(CollectingErrorHandler::new());
    let mut orderer = Orderer::new(ErrorLog::new(handler.clone()), "task");
    let length = 100_000;
    // Added last-first so every item must wait for the whole chain before it.
    for i in (0..length).rev() {
      let before = (i > 0).then(|| format!("t{}", i - 1));
      orderer.add(i, format!("t{}", i), before.as_deref(), None);
    }

    let ordered = orderer.ordered();

    assert_eq!(ordered.len(), length);
    assert!(ordered.iter().enumerate().all(|(position, &i)| position == i));
    assert!(handler.is_empty());
  }

  #[test]
  fn self_reference_is_reported_and_item_kept() {
    let (mut orderer, errors) = orderer();
    orderer.add("a", "a", Some("a"), None);

    assert_eq!(orderer.ordered(), vec!["a"]);
    assert!(errors.contains("cycle"));
  }
}
