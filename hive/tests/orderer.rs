use fibre_hive::{CollectingErrorHandler, ErrorLog, Orderer};
use pretty_assertions::assert_eq;
use std::sync::Arc;

type Entry = (&'static str, Option<&'static str>, Option<&'static str>);

fn order(entries: &[Entry]) -> (Vec<&'static str>, Arc<CollectingErrorHandler>) {
  let errors = Arc::new(CollectingErrorHandler::new());
  let mut orderer = Orderer::new(ErrorLog::new(errors.clone()), "task");
  for &(name, before, after) in entries {
    orderer.add(name, name, before, after);
  }
  (orderer.ordered(), errors)
}

fn position(order: &[&str], name: &str) -> usize {
  order.iter().position(|n| *n == name).unwrap()
}

#[test]
fn test_constraints_hold_for_every_rotation() {
  // Arrange
  let entries: Vec<Entry> = vec![
    ("commit", Some("validate"), None),
    ("audit", None, None),
    ("validate", Some("parse"), None),
    ("parse", None, Some("validate")),
  ];

  for rotation in 0..entries.len() {
    let mut rotated = entries.clone();
    rotated.rotate_left(rotation);

    // Act
    let (order, errors) = order(&rotated);

    // Assert
    assert_eq!(order.len(), 4);
    assert!(position(&order, "parse") < position(&order, "validate"));
    assert!(position(&order, "validate") < position(&order, "commit"));
    assert!(errors.is_empty(), "rotation {}: {:?}", rotation, errors.messages());
  }
}

#[test]
fn test_cycle_is_reported_and_every_item_returned() {
  // Arrange
  let entries = [("a", Some("b"), None), ("b", Some("a"), None), ("c", None, None)];

  // Act
  let (mut order, errors) = order(&entries);

  // Assert
  assert!(errors.contains("cycle"));
  order.sort_unstable();
  assert_eq!(order, vec!["a", "b", "c"]);
}

#[test]
fn test_unknown_reference_is_reported_but_item_kept() {
  // Arrange
  let entries = [("a", Some("missing"), None), ("b", None, None)];

  // Act
  let (order, errors) = order(&entries);

  // Assert
  assert_eq!(order, vec!["a", "b"]);
  assert!(errors.contains("unknown task 'missing'"));
}

#[test]
fn test_duplicate_name_keeps_first_item() {
  // Arrange
  let errors = Arc::new(CollectingErrorHandler::new());
  let mut orderer = Orderer::new(ErrorLog::new(errors.clone()), "filter");
  orderer.add(1, "dup", None, None);
  orderer.add(2, "dup", None, None);

  // Act
  let order = orderer.ordered();

  // Assert
  assert_eq!(order, vec![1]);
  assert!(errors.contains("Duplicate filter named 'dup'"));
}
