//! Turns script declarations into native GATT objects and hands them over to the stack.

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::vec::Vec;

use log::{debug, info};

use crate::codec::{decode_uuid, fold_property_names};
use crate::descriptors::{
  GattCharacteristic, GattService, GattServiceType, RegisteredCharacteristic, RegisteredService,
  ServiceDeclaration, DEFAULT_VALUE_CAPACITY, MAX_VALUE_CAPACITY,
};
use crate::error::{BridgeError, Result};
use crate::gatt_server::GattServer;
use crate::handle_registry::{NativeHandle, NativeHandleRegistry, NativeObject};

/// Build an unbound characteristic.  Only 16-bit UUIDs are accepted.  Unknown property names are
/// ignored.  The caller decides how the result is bound.
pub fn build_characteristic<'a>(
  uuid: &str,
  property_names: impl IntoIterator<Item = &'a str>,
  max_length: Option<u16>,
  initial_value: Option<&[u8]>,
) -> Result<GattCharacteristic> {
  if uuid.chars().count() != 4 {
    return Err(BridgeError::invalid_argument(format!(
      "characteristic uuid {uuid:?} is not 4 hex characters"
    )));
  }
  let uuid = decode_uuid(uuid)?;

  let max_length = max_length.unwrap_or(DEFAULT_VALUE_CAPACITY);
  if !(1..=MAX_VALUE_CAPACITY).contains(&max_length) {
    return Err(BridgeError::invalid_argument(format!(
      "max length {max_length} outside 1..={MAX_VALUE_CAPACITY}"
    )));
  }

  let mut characteristic =
    GattCharacteristic::new(uuid, fold_property_names(property_names), max_length);
  if let Some(value) = initial_value {
    store_value(&mut characteristic, value)?;
  }
  Ok(characteristic)
}

/// Overwrite the owned value buffer of a characteristic the stack does not own yet.
pub fn store_value(characteristic: &mut GattCharacteristic, value: &[u8]) -> Result<()> {
  if !characteristic.set_value(value) {
    return Err(BridgeError::invalid_argument(format!(
      "value of {} bytes exceeds max length {}",
      value.len(),
      characteristic.max_length
    )));
  }
  Ok(())
}

/// Reclaims a characteristic that was never handed to the stack.
pub fn destroy_characteristic(object: NativeObject) {
  debug!("destroying unregistered {}", object.kind_name());
}

/// Reclaims a service declaration: only its characteristic list, never the characteristics.
pub fn destroy_service(object: NativeObject) {
  debug!("destroying unregistered {}", object.kind_name());
}

/// Build a service declaration over already bound characteristics.
pub fn build_service(
  uuid: &str,
  characteristics: &[NativeHandle],
  registry: &NativeHandleRegistry,
) -> Result<ServiceDeclaration> {
  let uuid = decode_uuid(uuid)?;
  for (index, handle) in characteristics.iter().enumerate() {
    registry
      .resolve::<GattCharacteristic>(*handle)
      .map_err(|e| BridgeError::invalid_argument(format!("characteristic {index}: {e}")))?;
  }

  Ok(ServiceDeclaration {
    uuid,
    characteristics: characteristics.to_vec(),
  })
}

/// Register services with the stack in the given order, transferring ownership of each service
/// and its characteristics.  The whole batch is validated first so that a bad argument leaves
/// nothing registered.
pub fn register_services<G: GattServer>(
  registry: &mut NativeHandleRegistry,
  gatt: &mut G,
  services: &[NativeHandle],
) -> Result<()> {
  validate_services(registry, services)?;

  for service in services {
    let declaration = registry.resolve::<ServiceDeclaration>(*service)?.clone();
    let characteristics = declaration
      .characteristics
      .iter()
      .map(|handle| registry.resolve::<GattCharacteristic>(*handle).cloned())
      .collect::<Result<Vec<_>>>()?;
    let declared: Vec<_> = characteristics.iter().map(|c| (c.uuid, c.max_length)).collect();

    let value_handles = gatt
      .add_service(GattService {
        uuid: declaration.uuid,
        service_type: GattServiceType::Primary,
        characteristics,
      })
      .map_err(|e| BridgeError::stack("add service", e))?;
    if value_handles.len() != declared.len() {
      return Err(BridgeError::Stack {
        operation: "add service",
        detail: format!(
          "{} value handles returned for {} characteristics",
          value_handles.len(),
          declared.len()
        ),
      });
    }

    for ((handle, (uuid, max_length)), value_handle) in declaration
      .characteristics
      .iter()
      .zip(declared)
      .zip(value_handles.iter().copied())
    {
      registry.transfer(
        *handle,
        NativeObject::RegisteredCharacteristic(RegisteredCharacteristic {
          uuid,
          value_handle,
          max_length,
        }),
      )?;
    }
    registry.transfer(
      *service,
      NativeObject::RegisteredService(RegisteredService {
        uuid: declaration.uuid,
        value_handles,
      }),
    )?;
    info!(
      "registered service {:?} with {} characteristics",
      declaration.uuid,
      declaration.characteristics.len()
    );
  }
  Ok(())
}

fn validate_services(registry: &NativeHandleRegistry, services: &[NativeHandle]) -> Result<()> {
  let mut seen = BTreeSet::new();
  for (index, service) in services.iter().enumerate() {
    let declaration = resolve_unregistered::<ServiceDeclaration>(registry, *service)
      .map_err(|e| BridgeError::invalid_argument(format!("service {index}: {e}")))?;
    if !seen.insert(*service) {
      return Err(BridgeError::invalid_argument(format!(
        "service {index} is listed twice"
      )));
    }

    for (char_index, characteristic) in declaration.characteristics.iter().enumerate() {
      resolve_unregistered::<GattCharacteristic>(registry, *characteristic).map_err(|e| {
        BridgeError::invalid_argument(format!(
          "service {index}, characteristic {char_index}: {e}"
        ))
      })?;
      if !seen.insert(*characteristic) {
        return Err(BridgeError::invalid_argument(format!(
          "service {index}, characteristic {char_index} belongs to another service"
        )));
      }
    }
  }
  Ok(())
}

fn resolve_unregistered<T: crate::handle_registry::NativeKind>(
  registry: &NativeHandleRegistry,
  handle: NativeHandle,
) -> Result<&T> {
  let object = registry.object(handle)?;
  if object.is_registered() {
    return Err(BridgeError::AlreadyRegistered {
      kind: object.kind_name(),
    });
  }
  registry.resolve::<T>(handle)
}
