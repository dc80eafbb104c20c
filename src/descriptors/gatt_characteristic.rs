use alloc::vec;
use alloc::vec::Vec;

use crate::descriptors::attribute_handle::AttributeHandle;
use crate::descriptors::uuid::UUID;
use enumset::EnumSet;

/// Default capacity of a characteristic's value buffer, matching the default ATT payload size.
pub const DEFAULT_VALUE_CAPACITY: u16 = 23;

/// Largest attribute value the ATT protocol allows.
pub const MAX_VALUE_CAPACITY: u16 = 512;

/// A characteristic as declared by script code.  The value buffer is owned here until the
/// characteristic is handed to the stack as part of a [crate::descriptors::GattService].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
  pub uuid: UUID,
  pub properties: EnumSet<GattCharacteristicProperty>,

  /// Zero-initialized buffer of exactly `max_length` bytes.
  pub value: Vec<u8>,
  pub max_length: u16,
}

impl GattCharacteristic {
  pub fn new(uuid: UUID, properties: EnumSet<GattCharacteristicProperty>, max_length: u16) -> Self {
    Self {
      uuid,
      properties,
      value: vec![0; max_length.into()],
      max_length,
    }
  }

  /// Copy `value` into the start of the buffer and zero the rest.  Returns `false`, leaving the
  /// buffer untouched, when `value` is longer than the buffer.
  pub fn set_value(&mut self, value: &[u8]) -> bool {
    if value.len() > self.value.len() {
      return false;
    }
    let (head, tail) = self.value.split_at_mut(value.len());
    head.copy_from_slice(value);
    tail.fill(0);
    true
  }
}

impl Default for GattCharacteristic {
  fn default() -> Self {
    Self::new(UUID::Short(0), EnumSet::new(), DEFAULT_VALUE_CAPACITY)
  }
}

/// What remains script-visible of a characteristic once the stack owns it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisteredCharacteristic {
  pub uuid: UUID,
  pub value_handle: AttributeHandle,

  /// Declared value capacity, which bounds what a read-back of the value can return.
  pub max_length: u16,
}

#[derive(Debug, enumset::EnumSetType)]
pub enum GattCharacteristicProperty {
  Broadcast,

  /// Note that setting this property will cause a CCCD descriptor to automatically be added
  /// to the characteristic.
  Indicate,

  /// Note that setting this property will cause a CCCD descriptor to automatically be added
  /// to the characteristic.
  Notify,

  Read,
  Write,
  WriteNoResponse,
}
