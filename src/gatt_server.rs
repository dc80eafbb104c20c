use alloc::vec::Vec;
use core::fmt::Debug;

use crate::descriptors::{AttributeHandle, GattService};

/// GATT half of the native stack: the attribute table.
pub trait GattServer {
  type SystemError: Debug;

  /// Register a service.  The stack takes ownership of the service and every characteristic in
  /// it, and returns the value handle assigned to each characteristic in declaration order.
  /// Registration order defines attribute ordering in the table.
  fn add_service(&mut self, service: GattService) -> Result<Vec<AttributeHandle>, Self::SystemError>;

  /// Copy the current value of an attribute into `buf`, returning the number of bytes written.
  /// Values longer than `buf` are truncated.
  fn read(&self, handle: AttributeHandle, buf: &mut [u8]) -> Result<usize, Self::SystemError>;

  /// Replace the value of an attribute.  Notifications or indications to subscribed peers are
  /// the stack's concern.
  fn write(&mut self, handle: AttributeHandle, value: &[u8]) -> Result<(), Self::SystemError>;
}
