use crate::descriptors::attribute_handle::AttributeHandle;
use crate::descriptors::gatt_characteristic::GattCharacteristic;
use crate::descriptors::uuid::UUID;
use crate::handle_registry::NativeHandle;
use alloc::vec::Vec;

/// Registration payload handed to the stack by value; the stack owns everything in it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
  pub uuid: UUID,
  pub service_type: GattServiceType,
  pub characteristics: Vec<GattCharacteristic>,
}

impl Default for GattService {
  fn default() -> Self {
    Self {
      uuid: UUID::Short(0),
      service_type: GattServiceType::Primary,
      characteristics: Vec::new(),
    }
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GattServiceType {
  Primary,
  Secondary,
}

/// A service as declared by script code, before registration.  The characteristic list only
/// refers to characteristics still owned by the handle registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeclaration {
  pub uuid: UUID,
  pub characteristics: Vec<NativeHandle>,
}

/// A service after the stack took ownership.  Only the value handles remain, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredService {
  pub uuid: UUID,
  pub value_handles: Vec<AttributeHandle>,
}
