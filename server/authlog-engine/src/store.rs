//! Two-phase event store: stage events while reading sources, then finalize
//! once into the insertion-ordered table the analyzer works on.

use crate::types::LogEvent;

/// Pending accumulator for one analysis run.
#[derive(Debug, Default)]
pub struct EventStaging {
  pending: Vec<LogEvent>,
}

impl EventStaging {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn stage(&mut self, event: LogEvent) {
    self.pending.push(event);
  }

  pub fn len(&self) -> usize {
    self.pending.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pending.is_empty()
  }

  /// Commit everything staged into a table. Nothing staged yields an empty table.
  pub fn finalize(self) -> EventTable {
    EventTable {
      events: self.pending,
    }
  }
}

impl Extend<LogEvent> for EventStaging {
  fn extend<T: IntoIterator<Item = LogEvent>>(&mut self, iter: T) {
    self.pending.extend(iter);
  }
}

/// Events indexed by insertion order. Only the analyzer mutates entries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventTable {
  events: Vec<LogEvent>,
}

impl EventTable {
  pub fn len(&self) -> usize {
    self.events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&LogEvent> {
    self.events.get(index)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, LogEvent> {
    self.events.iter()
  }

  pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, LogEvent> {
    self.events.iter_mut()
  }
}

impl<'a> IntoIterator for &'a EventTable {
  type Item = &'a LogEvent;
  type IntoIter = std::slice::Iter<'a, LogEvent>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}
