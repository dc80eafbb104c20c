//! The device facade: one BLE peripheral as script code sees it.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, error, info};

use crate::advertisement::AdvertisementRequest;
use crate::codec::uuid_to_string;
use crate::config::DeviceConfig;
use crate::descriptors::{GattCharacteristic, RegisteredService, ServiceDeclaration};
use crate::error::{BridgeError, Result};
use crate::event_bridge::{invoke_all, EventBridge, InitState, Invocation};
use crate::gap_advertiser::{build_advertisement, default_advertisement, AdvertisingConfig, GapAdvertiser};
use crate::gatt_builder::{
  build_characteristic, build_service, destroy_characteristic, destroy_service, register_services,
  store_value,
};
use crate::gatt_server::GattServer;
use crate::handle_registry::{NativeHandle, NativeHandleRegistry, NativeObject};
use crate::peripheral::BleStack;
use crate::script::ScriptRuntime;
use crate::stack_event::StackEvent;
use crate::task_queue::{NativeTask, TaskDrain};

/// Owns the native stack and everything script code has declared against it.
///
/// All methods run on the script turn.  The stack's own context only reaches the device through
/// the [crate::task_queue::EventNotifier] paired with `tasks`, and script callbacks are only ever
/// invoked from what [Device::take_pending] returns.
pub struct Device<'q, S: BleStack, R: ScriptRuntime, const N: usize> {
  stack: S,
  tasks: TaskDrain<'q, N>,
  registry: NativeHandleRegistry,
  bridge: EventBridge<R::Value>,
  advertisement: Option<AdvertisementRequest>,
  config: DeviceConfig,
}

impl<'q, S: BleStack, R: ScriptRuntime, const N: usize> Device<'q, S, R, N> {
  pub fn new(stack: S, tasks: TaskDrain<'q, N>, config: DeviceConfig) -> Self {
    Self {
      stack,
      tasks,
      registry: NativeHandleRegistry::new(),
      bridge: EventBridge::new(),
      advertisement: None,
      config,
    }
  }

  pub fn stack(&self) -> &S {
    &self.stack
  }

  pub fn stack_mut(&mut self) -> &mut S {
    &mut self.stack
  }

  pub fn registry(&self) -> &NativeHandleRegistry {
    &self.registry
  }

  pub fn config(&self) -> &DeviceConfig {
    &self.config
  }

  pub fn init_state(&self) -> InitState {
    self.bridge.init_state()
  }

  /// The request the next zero-argument [Device::start_advertising] re-issues.
  pub fn advertisement(&self) -> Option<&AdvertisementRequest> {
    self.advertisement.as_ref()
  }

  /// Ask the stack to initialize; `callback` runs once initialization completes.  Calling again
  /// while initialization is outstanding only replaces the callback.
  pub fn ready(&mut self, callback: R::Value) -> Result<()> {
    if !self.bridge.begin_init(callback)? {
      debug!("init already requested, replaced ready callback");
      return Ok(());
    }

    info!("initializing BLE stack");
    if let Err(e) = self.stack.init() {
      error!("Error while initialising BLE stack: {e:?}");
      self.bridge.abort_init();
      return Err(BridgeError::NativeInit {
        detail: format!("{e:?}"),
      });
    }
    Ok(())
  }

  /// Start advertising.  With a config a fresh request is built, remembered, and its name set as
  /// the GAP device name; without one the remembered request is re-issued as is (flags only if
  /// nothing was ever configured).
  pub fn start_advertising(&mut self, config: Option<&AdvertisingConfig>) -> Result<()> {
    let request = match (config, &self.advertisement) {
      (Some(config), _) => build_advertisement(config, &self.config)?,
      (None, Some(previous)) => previous.clone(),
      (None, None) => default_advertisement(&self.config)?,
    };

    let gap = self.stack.gap_mut();
    if config.is_some() {
      gap
        .set_device_name(&request.device_name)
        .map_err(|e| BridgeError::stack("set device name", e))?;
    }
    gap
      .request_start(&request)
      .map_err(|e| BridgeError::stack("start advertising", e))?;
    info!(
      "advertising as {:?} every {:?}",
      request.device_name, request.params.interval_min
    );

    self.advertisement = Some(request);
    Ok(())
  }

  pub fn stop_advertising(&mut self) -> Result<()> {
    self
      .stack
      .gap_mut()
      .request_stop()
      .map_err(|e| BridgeError::stack("stop advertising", e))?;
    info!("advertising stopped");
    Ok(())
  }

  pub fn is_connected(&self) -> bool {
    self.stack.gap().is_connected()
  }

  pub fn on_connection(&mut self, callback: R::Value) {
    self.bridge.set_connection_callback(callback);
  }

  pub fn on_disconnection(&mut self, callback: R::Value) {
    self.bridge.set_disconnection_callback(callback);
  }

  /// Declare a characteristic.  `max_length` defaults to [DeviceConfig::value_capacity].
  pub fn create_characteristic<'a>(
    &mut self,
    uuid: &str,
    property_names: impl IntoIterator<Item = &'a str>,
    max_length: Option<u16>,
    initial_value: Option<&[u8]>,
  ) -> Result<NativeHandle> {
    let characteristic = build_characteristic(
      uuid,
      property_names,
      Some(max_length.unwrap_or(self.config.value_capacity)),
      initial_value,
    )?;
    Ok(self.registry.bind(
      NativeObject::Characteristic(characteristic),
      Some(destroy_characteristic),
    ))
  }

  pub fn create_service(&mut self, uuid: &str, characteristics: &[NativeHandle]) -> Result<NativeHandle> {
    let declaration = build_service(uuid, characteristics, &self.registry)?;
    Ok(self
      .registry
      .bind(NativeObject::Service(declaration), Some(destroy_service)))
  }

  /// Register services with the stack, in order.
  pub fn add_services(&mut self, services: &[NativeHandle]) -> Result<()> {
    register_services(&mut self.registry, self.stack.gatt_server_mut(), services)
  }

  /// Update a characteristic's value.  Before registration this rewrites the declared buffer;
  /// afterwards the value goes to the stack's attribute table.
  pub fn write_characteristic(&mut self, characteristic: NativeHandle, value: &[u8]) -> Result<()> {
    let value_handle = match self.registry.object(characteristic)? {
      NativeObject::RegisteredCharacteristic(registered) => Some(registered.value_handle),
      NativeObject::Characteristic(_) => None,
      other => {
        return Err(BridgeError::TypeMismatch {
          expected: "characteristic",
          found: other.kind_name(),
        })
      }
    };

    match value_handle {
      Some(handle) => self
        .stack
        .gatt_server_mut()
        .write(handle, value)
        .map_err(|e| BridgeError::stack("write attribute", e)),
      None => store_value(
        self.registry.resolve_mut::<GattCharacteristic>(characteristic)?,
        value,
      ),
    }
  }

  /// Subscribe to peer writes of a characteristic, replacing (and releasing) any earlier callback.
  /// The callback only fires once the characteristic is registered.
  pub fn set_write_callback(&mut self, characteristic: NativeHandle, callback: R::Value) -> Result<()> {
    match self.registry.object(characteristic)? {
      NativeObject::Characteristic(_) | NativeObject::RegisteredCharacteristic(_) => {
        self.bridge.set_write_callback(characteristic, callback);
        Ok(())
      }
      other => Err(BridgeError::TypeMismatch {
        expected: "characteristic",
        found: other.kind_name(),
      }),
    }
  }

  pub fn clear_write_callback(&mut self, characteristic: NativeHandle) -> bool {
    self.bridge.clear_write_callback(characteristic)
  }

  pub fn service_uuid(&self, service: NativeHandle) -> Result<String> {
    let uuid = match self.registry.object(service)? {
      NativeObject::Service(ServiceDeclaration { uuid, .. })
      | NativeObject::RegisteredService(RegisteredService { uuid, .. }) => uuid,
      other => {
        return Err(BridgeError::TypeMismatch {
          expected: "service",
          found: other.kind_name(),
        })
      }
    };
    Ok(uuid_to_string(uuid))
  }

  /// The script wrapper of `handle` was reclaimed.  Its write callback goes with it since nothing
  /// can refer to the characteristic anymore.
  pub fn release_handle(&mut self, handle: NativeHandle) -> bool {
    self.bridge.clear_write_callback(handle);
    self.registry.release(handle)
  }

  /// Apply everything the stack scheduled since the last turn and return the script callbacks
  /// that became due, in event order.  Nothing is called here: run the result with
  /// [invoke_all] once the device is no longer borrowed so callbacks can use the device again.
  pub fn take_pending(&mut self) -> Vec<Invocation<R::Value>> {
    let mut due = Vec::new();
    while let Some(task) = self.tasks.next_task() {
      match task {
        NativeTask::ProcessEvents => {
          let mut events: Vec<StackEvent> = Vec::new();
          self
            .stack
            .process_events(&mut |event: StackEvent| events.push(event));
          due.extend(events.into_iter().filter_map(|event| {
            self
              .bridge
              .dispatch(event, &self.registry, self.stack.gatt_server())
          }));
        }
      }
    }
    due
  }

  /// [Device::take_pending] followed by [invoke_all], for embedders whose callbacks never reach
  /// back into this device.  Returns the number of callbacks run.
  pub fn run_pending(&mut self, runtime: &mut R) -> usize {
    let due = self.take_pending();
    invoke_all(runtime, due)
  }

  /// Release every retained script callback.  Returns how many were held.
  pub fn teardown(&mut self) -> usize {
    self.bridge.teardown()
  }
}
