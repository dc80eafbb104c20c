//! Generational table binding native objects to the opaque handles script objects carry.
//!
//! Every entry is tagged with its native type so a handle taken from the wrong kind of script
//! object fails with [BridgeError::TypeMismatch] instead of being misread, and every handle
//! carries a generation so a handle outliving its object fails with [BridgeError::UnboundHandle].

use alloc::vec::Vec;
use core::fmt::{Display, Formatter};

use log::trace;

use crate::descriptors::{
  GattCharacteristic, RegisteredCharacteristic, RegisteredService, ServiceDeclaration,
};
use crate::error::{BridgeError, Result};

/// Opaque reference stored on a script object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeHandle {
  index: u32,
  generation: u32,
}

impl Display for NativeHandle {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    write!(f, "#{}.{}", self.index, self.generation)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeObject {
  Characteristic(GattCharacteristic),
  Service(ServiceDeclaration),
  RegisteredCharacteristic(RegisteredCharacteristic),
  RegisteredService(RegisteredService),
}

impl NativeObject {
  pub fn kind_name(&self) -> &'static str {
    match self {
      NativeObject::Characteristic(_) => GattCharacteristic::NAME,
      NativeObject::Service(_) => ServiceDeclaration::NAME,
      NativeObject::RegisteredCharacteristic(_) => RegisteredCharacteristic::NAME,
      NativeObject::RegisteredService(_) => RegisteredService::NAME,
    }
  }

  pub fn is_registered(&self) -> bool {
    matches!(
      self,
      NativeObject::RegisteredCharacteristic(_) | NativeObject::RegisteredService(_)
    )
  }
}

/// Native types that can live in the registry.
pub trait NativeKind: Sized {
  const NAME: &'static str;

  fn from_object(object: &NativeObject) -> Option<&Self>;
  fn from_object_mut(object: &mut NativeObject) -> Option<&mut Self>;
}

macro_rules! native_kind {
  ($ty:ty, $variant:ident, $name:literal) => {
    impl NativeKind for $ty {
      const NAME: &'static str = $name;

      fn from_object(object: &NativeObject) -> Option<&Self> {
        match object {
          NativeObject::$variant(inner) => Some(inner),
          _ => None,
        }
      }

      fn from_object_mut(object: &mut NativeObject) -> Option<&mut Self> {
        match object {
          NativeObject::$variant(inner) => Some(inner),
          _ => None,
        }
      }
    }
  };
}

native_kind!(GattCharacteristic, Characteristic, "characteristic");
native_kind!(ServiceDeclaration, Service, "service");
native_kind!(RegisteredCharacteristic, RegisteredCharacteristic, "registered characteristic");
native_kind!(RegisteredService, RegisteredService, "registered service");

/// Invoked with the object when its script wrapper is reclaimed.
pub type Destructor = fn(NativeObject);

#[derive(Debug)]
struct Entry {
  object: NativeObject,
  destructor: Option<Destructor>,
}

#[derive(Debug, Default)]
struct Slot {
  generation: u32,
  entry: Option<Entry>,
}

#[derive(Debug, Default)]
pub struct NativeHandleRegistry {
  slots: Vec<Slot>,
  free: Vec<u32>,
}

impl NativeHandleRegistry {
  pub fn new() -> Self {
    Default::default()
  }

  /// Attach `object` to a freshly issued handle.  Handles are never reused while live, so a
  /// script object can only ever be bound once.
  pub fn bind(&mut self, object: NativeObject, destructor: Option<Destructor>) -> NativeHandle {
    let entry = Some(Entry { object, destructor });
    let index = match self.free.pop() {
      Some(index) => {
        self.slots[index as usize].entry = entry;
        index
      }
      None => {
        self.slots.push(Slot {
          generation: 0,
          entry,
        });
        (self.slots.len() - 1) as u32
      }
    };

    let handle = NativeHandle {
      index,
      generation: self.slots[index as usize].generation,
    };
    trace!("bound native handle {handle}");
    handle
  }

  fn entry(&self, handle: NativeHandle) -> Result<&Entry> {
    self
      .slots
      .get(handle.index as usize)
      .filter(|slot| slot.generation == handle.generation)
      .and_then(|slot| slot.entry.as_ref())
      .ok_or(BridgeError::UnboundHandle)
  }

  fn entry_mut(&mut self, handle: NativeHandle) -> Result<&mut Entry> {
    self
      .slots
      .get_mut(handle.index as usize)
      .filter(|slot| slot.generation == handle.generation)
      .and_then(|slot| slot.entry.as_mut())
      .ok_or(BridgeError::UnboundHandle)
  }

  pub fn object(&self, handle: NativeHandle) -> Result<&NativeObject> {
    self.entry(handle).map(|entry| &entry.object)
  }

  pub fn resolve<T: NativeKind>(&self, handle: NativeHandle) -> Result<&T> {
    let object = self.object(handle)?;
    T::from_object(object).ok_or(BridgeError::TypeMismatch {
      expected: T::NAME,
      found: object.kind_name(),
    })
  }

  pub fn resolve_mut<T: NativeKind>(&mut self, handle: NativeHandle) -> Result<&mut T> {
    let object = &mut self.entry_mut(handle)?.object;
    let found = object.kind_name();
    T::from_object_mut(object).ok_or(BridgeError::TypeMismatch {
      expected: T::NAME,
      found,
    })
  }

  /// Hand the object over to the stack.  The slot keeps only `registered`, which owns no native
  /// buffers, and the destructor is dropped so reclaiming the wrapper can no longer free memory
  /// the stack now owns.  Returns the object that was replaced.
  pub fn transfer(&mut self, handle: NativeHandle, registered: NativeObject) -> Result<NativeObject> {
    let entry = self.entry_mut(handle)?;
    if entry.object.is_registered() {
      return Err(BridgeError::AlreadyRegistered {
        kind: entry.object.kind_name(),
      });
    }
    entry.destructor = None;
    Ok(core::mem::replace(&mut entry.object, registered))
  }

  /// Reclaim the binding.  Runs the destructor exactly once; releasing an already released (or
  /// never issued) handle does nothing and returns `false`.
  pub fn release(&mut self, handle: NativeHandle) -> bool {
    let Some(slot) = self
      .slots
      .get_mut(handle.index as usize)
      .filter(|slot| slot.generation == handle.generation)
    else {
      return false;
    };
    let Some(entry) = slot.entry.take() else {
      return false;
    };

    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(handle.index);
    trace!("released native handle {handle}");

    if let Some(destructor) = entry.destructor {
      destructor(entry.object);
    }
    true
  }

  /// Number of live bindings.
  pub fn len(&self) -> usize {
    self.slots.len() - self.free.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
