use alloc::vec::Vec;

use crate::handle_registry::NativeHandle;

/// Retained script callbacks keyed by the characteristic they watch.  Entries are few and bounded
/// by the declared characteristics, so lookups are linear.  Dropping an entry releases the
/// callback, which happens exactly once: on replacement, removal, or [CallbackTable::clear].
#[derive(Debug)]
pub struct CallbackTable<V> {
  entries: Vec<(NativeHandle, V)>,
}

impl<V> Default for CallbackTable<V> {
  fn default() -> Self {
    Self {
      entries: Vec::new(),
    }
  }
}

impl<V> CallbackTable<V> {
  pub fn new() -> Self {
    Default::default()
  }

  /// Last write wins; the replaced callback is returned to the caller.
  pub fn insert(&mut self, key: NativeHandle, callback: V) -> Option<V> {
    match self.entries.iter_mut().find(|(k, _)| *k == key) {
      Some((_, existing)) => Some(core::mem::replace(existing, callback)),
      None => {
        self.entries.push((key, callback));
        None
      }
    }
  }

  pub fn remove(&mut self, key: NativeHandle) -> Option<V> {
    let index = self.entries.iter().position(|(k, _)| *k == key)?;
    Some(self.entries.swap_remove(index).1)
  }

  pub fn get(&self, key: NativeHandle) -> Option<&V> {
    self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
  }

  pub fn iter(&self) -> impl Iterator<Item = (NativeHandle, &V)> {
    self.entries.iter().map(|(k, v)| (*k, v))
  }

  /// Release everything, returning how many callbacks were held.
  pub fn clear(&mut self) -> usize {
    let count = self.entries.len();
    self.entries.clear();
    count
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  extern crate std;

  use alloc::rc::Rc;

  use super::*;
  use crate::descriptors::GattCharacteristic;
  use crate::handle_registry::{NativeHandleRegistry, NativeObject};

  fn handles() -> (NativeHandle, NativeHandle) {
    let mut registry = NativeHandleRegistry::new();
    let characteristic = || NativeObject::Characteristic(GattCharacteristic::default());
    (
      registry.bind(characteristic(), None),
      registry.bind(characteristic(), None),
    )
  }

  #[test]
  fn last_write_wins_and_releases_previous() {
    let (a, b) = handles();
    let first = Rc::new(1);
    let second = Rc::new(2);
    let mut table = CallbackTable::new();

    assert!(table.insert(a, first.clone()).is_none());
    let replaced = table.insert(a, second.clone());
    assert_eq!(replaced.as_deref(), Some(&1));
    drop(replaced);
    assert_eq!(Rc::strong_count(&first), 1);

    table.insert(b, first.clone());
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(a).map(|v| **v), Some(2));
  }

  #[test]
  fn remove_and_clear_release_exactly_once() {
    let (a, b) = handles();
    let callback = Rc::new(());
    let mut table = CallbackTable::new();
    table.insert(a, callback.clone());
    table.insert(b, callback.clone());
    assert_eq!(Rc::strong_count(&callback), 3);

    drop(table.remove(a));
    assert!(table.remove(a).is_none());
    assert_eq!(Rc::strong_count(&callback), 2);

    assert_eq!(table.clear(), 1);
    assert_eq!(table.clear(), 0);
    assert_eq!(Rc::strong_count(&callback), 1);
  }
}
