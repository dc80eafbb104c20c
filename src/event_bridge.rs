//! Per-device callback state and the translation of stack events into script callbacks.
//!
//! Dispatch never calls into script code itself.  It applies the event to native state and hands
//! back an [Invocation], which the embedder runs once it no longer holds the device, so that the
//! callback is free to call device methods again.

use alloc::vec;
use alloc::vec::Vec;

use log::{debug, error, info, trace, warn};

use crate::callback_table::CallbackTable;
use crate::descriptors::{AttributeHandle, RegisteredCharacteristic};
use crate::error::{BridgeError, Result};
use crate::gatt_server::GattServer;
use crate::handle_registry::{NativeHandle, NativeHandleRegistry};
use crate::script::ScriptRuntime;
use crate::stack_event::StackEvent;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitState {
  Uninitialized,
  /// Initialization was requested.  A device whose stack reported an init error stays here.
  Initializing,
  Ready,
}

/// A script callback that is due, with its argument still in native form.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation<V> {
  pub callback: V,

  /// Written value, passed as a single byte array argument.  `None` calls without arguments.
  pub value: Option<Vec<u8>>,
}

impl<V> Invocation<V> {
  /// Call the callback.  Failures are logged, never propagated.
  pub fn invoke<R: ScriptRuntime<Value = V>>(self, runtime: &mut R) {
    let args: Vec<V> = match &self.value {
      Some(value) => vec![runtime.create_byte_array(value)],
      None => Vec::new(),
    };
    if let Err(e) = runtime.call(&self.callback, &args) {
      warn!("script callback failed: {e:?}");
    }
  }
}

/// Run invocations in order.  Returns how many were run.
pub fn invoke_all<R: ScriptRuntime>(runtime: &mut R, pending: Vec<Invocation<R::Value>>) -> usize {
  let count = pending.len();
  for invocation in pending {
    invocation.invoke(runtime);
  }
  count
}

#[derive(Debug)]
pub struct EventBridge<V> {
  init_state: InitState,
  on_ready: Option<V>,
  on_connection: Option<V>,
  on_disconnection: Option<V>,
  on_write: CallbackTable<V>,
}

impl<V> Default for EventBridge<V> {
  fn default() -> Self {
    Self {
      init_state: InitState::Uninitialized,
      on_ready: None,
      on_connection: None,
      on_disconnection: None,
      on_write: CallbackTable::new(),
    }
  }
}

impl<V> EventBridge<V> {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn init_state(&self) -> InitState {
    self.init_state
  }

  /// Retain the ready callback.  Returns `true` when the stack still has to be asked to
  /// initialize, `false` when a request is already outstanding (the callback is just replaced).
  pub fn begin_init(&mut self, callback: V) -> Result<bool> {
    match self.init_state {
      InitState::Ready => Err(BridgeError::InvalidState {
        reason: "device is already initialized",
      }),
      InitState::Initializing => {
        self.on_ready = Some(callback);
        Ok(false)
      }
      InitState::Uninitialized => {
        self.on_ready = Some(callback);
        self.init_state = InitState::Initializing;
        Ok(true)
      }
    }
  }

  /// The stack refused to even start initializing; forget the request so it can be retried.
  pub fn abort_init(&mut self) {
    self.on_ready = None;
    self.init_state = InitState::Uninitialized;
  }

  pub fn set_connection_callback(&mut self, callback: V) {
    self.on_connection = Some(callback);
  }

  pub fn set_disconnection_callback(&mut self, callback: V) {
    self.on_disconnection = Some(callback);
  }

  pub fn set_write_callback(&mut self, characteristic: NativeHandle, callback: V) {
    self.on_write.insert(characteristic, callback);
  }

  pub fn clear_write_callback(&mut self, characteristic: NativeHandle) -> bool {
    self.on_write.remove(characteristic).is_some()
  }

  /// Release every retained callback.  Returns how many were held.
  pub fn teardown(&mut self) -> usize {
    let singles = [
      self.on_ready.take(),
      self.on_connection.take(),
      self.on_disconnection.take(),
    ];
    let released = singles.into_iter().flatten().count() + self.on_write.clear();
    debug!("released {released} retained callbacks");
    released
  }
}

impl<V: Clone> EventBridge<V> {
  /// Apply one stack event and return the script callback it makes due, if any.
  pub fn dispatch<G: GattServer>(
    &mut self,
    event: StackEvent,
    registry: &NativeHandleRegistry,
    gatt: &G,
  ) -> Option<Invocation<V>> {
    trace!("event: {event:?}");
    let callback = match event {
      StackEvent::InitComplete(Err(e)) => {
        error!("Error while initialising BLE stack: {e}");
        None
      }
      StackEvent::InitComplete(Ok(())) => {
        if self.init_state != InitState::Initializing {
          warn!("unexpected init completion in state {:?}", self.init_state);
          return None;
        }
        info!("BLE stack initialized");
        self.init_state = InitState::Ready;
        self.on_ready.take()
      }
      StackEvent::Connected => {
        info!("peer connected");
        self.on_connection.clone()
      }
      StackEvent::Disconnected { reason } => {
        info!("peer disconnected: reason={reason:#04x}");
        self.on_disconnection.clone()
      }
      StackEvent::DataWritten { handle } => return self.dispatch_write(handle, registry, gatt),
    };
    callback.map(|callback| Invocation {
      callback,
      value: None,
    })
  }

  fn dispatch_write<G: GattServer>(
    &self,
    handle: AttributeHandle,
    registry: &NativeHandleRegistry,
    gatt: &G,
  ) -> Option<Invocation<V>> {
    let found = self.on_write.iter().find_map(|(characteristic, callback)| {
      registry
        .resolve::<RegisteredCharacteristic>(characteristic)
        .ok()
        .filter(|c| c.value_handle == handle)
        .map(|c| (c.max_length, callback))
    });
    let Some((max_length, callback)) = found else {
      debug!("no write callback for handle={handle}");
      return None;
    };

    let mut buf = vec![0u8; max_length.into()];
    let len = match gatt.read(handle, &mut buf) {
      Ok(len) => len.min(buf.len()),
      Err(e) => {
        warn!("reading back handle={handle} failed: {e:?}");
        return None;
      }
    };
    buf.truncate(len);

    Some(Invocation {
      callback: callback.clone(),
      value: Some(buf),
    })
  }
}

#[cfg(test)]
mod tests {
  extern crate std;

  use alloc::rc::Rc;

  use super::*;
  use crate::descriptors::{GattCharacteristic, UUID};
  use crate::handle_registry::NativeObject;
  use crate::stack_error::StackError;
  use crate::testing::{FakeRuntime, FakeStack, FakeValue};

  fn registered(registry: &mut NativeHandleRegistry, value_handle: u16, max_length: u16) -> NativeHandle {
    let handle = registry.bind(NativeObject::Characteristic(GattCharacteristic::default()), None);
    registry
      .transfer(
        handle,
        NativeObject::RegisteredCharacteristic(RegisteredCharacteristic {
          uuid: UUID::Short(0x2a37),
          value_handle: AttributeHandle::new(value_handle).unwrap(),
          max_length,
        }),
      )
      .unwrap();
    handle
  }

  fn written(raw: u16) -> StackEvent {
    StackEvent::DataWritten {
      handle: AttributeHandle::new(raw).unwrap(),
    }
  }

  #[test]
  fn init_error_keeps_initializing_and_never_fires() {
    let runtime = FakeRuntime::new();
    let stack = FakeStack::detached();
    let registry = NativeHandleRegistry::new();
    let mut bridge = EventBridge::new();
    let ready = runtime.function(1);

    assert_eq!(bridge.begin_init(ready.clone()), Ok(true));
    let due = bridge.dispatch(
      StackEvent::InitComplete(Err(StackError::InternalStackFailure)),
      &registry,
      &stack,
    );
    assert_eq!(due, None);
    assert_eq!(bridge.init_state(), InitState::Initializing);

    let due = bridge.dispatch(StackEvent::InitComplete(Ok(())), &registry, &stack);
    assert_eq!(bridge.init_state(), InitState::Ready);
    assert_eq!(
      due,
      Some(Invocation {
        callback: ready.clone(),
        value: None
      })
    );
    drop(due);
    assert_eq!(Rc::strong_count(&ready), 1);
    assert!(bridge.begin_init(ready).is_err());
  }

  #[test]
  fn connection_callbacks_are_due_without_arguments() {
    let mut runtime = FakeRuntime::new();
    let stack = FakeStack::detached();
    let registry = NativeHandleRegistry::new();
    let mut bridge = EventBridge::new();

    assert_eq!(bridge.dispatch(StackEvent::Connected, &registry, &stack), None);

    bridge.set_connection_callback(runtime.function(7));
    bridge.set_disconnection_callback(runtime.function(8));
    let due: Vec<_> = [StackEvent::Connected, StackEvent::Disconnected { reason: 0x13 }]
      .into_iter()
      .filter_map(|event| bridge.dispatch(event, &registry, &stack))
      .collect();
    assert!(runtime.calls().is_empty());

    assert_eq!(invoke_all(&mut runtime, due), 2);
    assert_eq!(runtime.calls(), [(7, Vec::new()), (8, Vec::new())]);
  }

  #[test]
  fn write_callback_receives_value_read_back() {
    let mut runtime = FakeRuntime::new();
    let stack = FakeStack::detached();
    let mut registry = NativeHandleRegistry::new();
    let watched = registered(&mut registry, 5, 23);
    registered(&mut registry, 6, 23);
    let mut bridge = EventBridge::new();
    bridge.set_write_callback(watched, runtime.function(3));
    stack.state_mut().set_value(5, &[0x01, 0xff]);

    assert_eq!(bridge.dispatch(written(6), &registry, &stack), None);
    let due = bridge.dispatch(written(5), &registry, &stack).unwrap();
    assert_eq!(due.value.as_deref(), Some(&[0x01, 0xff][..]));

    due.invoke(&mut runtime);
    assert_eq!(runtime.calls(), [(3, vec![FakeValue::bytes(&[0x01, 0xff])])]);
  }

  #[test]
  fn read_back_is_sized_by_the_characteristic() {
    let stack = FakeStack::detached();
    let mut registry = NativeHandleRegistry::new();
    let runtime = FakeRuntime::new();
    let long = registered(&mut registry, 5, 40);
    let short = registered(&mut registry, 6, 4);
    let mut bridge = EventBridge::new();
    bridge.set_write_callback(long, runtime.function(1));
    bridge.set_write_callback(short, runtime.function(2));
    let value: Vec<u8> = (0..40).collect();
    stack.state_mut().set_value(5, &value);
    stack.state_mut().set_value(6, &value);

    let due = bridge.dispatch(written(5), &registry, &stack).unwrap();
    assert_eq!(due.value, Some(value.clone()));
    let due = bridge.dispatch(written(6), &registry, &stack).unwrap();
    assert_eq!(due.value.as_deref(), Some(&value[..4]));
  }

  #[test]
  fn failed_invocations_are_still_counted() {
    let mut runtime = FakeRuntime::new();
    runtime.fail_calls = true;
    let due = vec![Invocation {
      callback: runtime.function(1),
      value: None,
    }];

    assert_eq!(invoke_all(&mut runtime, due), 1);
    assert_eq!(runtime.calls().len(), 1);
  }

  #[test]
  fn teardown_releases_everything_once() {
    let runtime = FakeRuntime::new();
    let mut registry = NativeHandleRegistry::new();
    let characteristic = registered(&mut registry, 5, 23);
    let callback = runtime.function(1);
    let mut bridge = EventBridge::new();
    bridge.begin_init(callback.clone()).unwrap();
    bridge.set_connection_callback(callback.clone());
    bridge.set_write_callback(characteristic, callback.clone());
    assert_eq!(Rc::strong_count(&callback), 4);

    assert_eq!(bridge.teardown(), 3);
    assert_eq!(bridge.teardown(), 0);
    assert_eq!(Rc::strong_count(&callback), 1);
  }
}
