//! In-memory stand-ins for the script engine and the BLE stack.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Ref, RefCell, RefMut};

use crate::advertisement::AdvertisementRequest;
use crate::descriptors::{AttributeHandle, GattService};
use crate::gap_advertiser::GapAdvertiser;
use crate::gatt_server::GattServer;
use crate::handle_registry::NativeHandle;
use crate::peripheral::BleStack;
use crate::script::{NativeClass, ScriptRuntime, ValueKind};
use crate::stack_event::{StackEvent, StackEventHandler};
use crate::task_queue::EventNotifier;

pub const QUEUE: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum FakeValue {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  Str(String),
  Array(Vec<Rc<FakeValue>>),
  Function(u32),
  Object,
  Native(NativeClass, NativeHandle),
}

impl FakeValue {
  pub fn bytes(bytes: &[u8]) -> Self {
    FakeValue::Array(
      bytes
        .iter()
        .map(|b| Rc::new(FakeValue::Number(f64::from(*b))))
        .collect(),
    )
  }
}

/// Values are `Rc`s, so `Rc::strong_count` shows how many retains are outstanding.
#[derive(Default)]
pub struct FakeRuntime {
  calls: Vec<(u32, Vec<FakeValue>)>,
  pub fail_calls: bool,
  script: Option<Box<dyn FnMut(u32)>>,
}

impl FakeRuntime {
  pub fn new() -> Self {
    Default::default()
  }

  /// Body run for every call, given the id of the function called.
  pub fn on_call(&mut self, script: impl FnMut(u32) + 'static) {
    self.script = Some(Box::new(script));
  }

  pub fn calls(&self) -> &[(u32, Vec<FakeValue>)] {
    &self.calls
  }

  pub fn function(&self, id: u32) -> Rc<FakeValue> {
    Rc::new(FakeValue::Function(id))
  }

  pub fn text(&self, text: &str) -> Rc<FakeValue> {
    Rc::new(FakeValue::Str(text.to_string()))
  }

  pub fn num(&self, n: f64) -> Rc<FakeValue> {
    Rc::new(FakeValue::Number(n))
  }

  pub fn list(&self, items: Vec<Rc<FakeValue>>) -> Rc<FakeValue> {
    Rc::new(FakeValue::Array(items))
  }

  pub fn texts(&self, items: &[&str]) -> Rc<FakeValue> {
    self.list(items.iter().map(|s| self.text(s)).collect())
  }

  pub fn byte_list(&self, bytes: &[u8]) -> Rc<FakeValue> {
    Rc::new(FakeValue::bytes(bytes))
  }
}

impl ScriptRuntime for FakeRuntime {
  type Value = Rc<FakeValue>;
  type Error = String;

  fn kind(&self, value: &Self::Value) -> ValueKind {
    match **value {
      FakeValue::Undefined => ValueKind::Undefined,
      FakeValue::Null => ValueKind::Null,
      FakeValue::Bool(_) => ValueKind::Boolean,
      FakeValue::Number(_) => ValueKind::Number,
      FakeValue::Str(_) => ValueKind::String,
      FakeValue::Array(_) => ValueKind::Array,
      FakeValue::Function(_) => ValueKind::Function,
      FakeValue::Object | FakeValue::Native(..) => ValueKind::Object,
    }
  }

  fn string(&self, value: &Self::Value) -> Option<String> {
    match &**value {
      FakeValue::Str(s) => Some(s.clone()),
      _ => None,
    }
  }

  fn number(&self, value: &Self::Value) -> Option<f64> {
    match **value {
      FakeValue::Number(n) => Some(n),
      _ => None,
    }
  }

  fn array_length(&self, value: &Self::Value) -> Option<u32> {
    match &**value {
      FakeValue::Array(items) => Some(items.len() as u32),
      _ => None,
    }
  }

  fn array_element(&self, value: &Self::Value, index: u32) -> Option<Self::Value> {
    match &**value {
      FakeValue::Array(items) => items.get(index as usize).cloned(),
      _ => None,
    }
  }

  fn native_handle(&self, value: &Self::Value) -> Option<NativeHandle> {
    match **value {
      FakeValue::Native(_, handle) => Some(handle),
      _ => None,
    }
  }

  fn create_undefined(&mut self) -> Self::Value {
    Rc::new(FakeValue::Undefined)
  }

  fn create_boolean(&mut self, value: bool) -> Self::Value {
    Rc::new(FakeValue::Bool(value))
  }

  fn create_string(&mut self, value: &str) -> Self::Value {
    self.text(value)
  }

  fn create_byte_array(&mut self, bytes: &[u8]) -> Self::Value {
    self.byte_list(bytes)
  }

  fn create_native_object(&mut self, class: NativeClass, handle: NativeHandle) -> Self::Value {
    Rc::new(FakeValue::Native(class, handle))
  }

  fn call(&mut self, function: &Self::Value, args: &[Self::Value]) -> Result<(), Self::Error> {
    let FakeValue::Function(id) = **function else {
      return Err("not a function".to_string());
    };
    self
      .calls
      .push((id, args.iter().map(|a| (**a).clone()).collect()));
    if let Some(script) = self.script.as_mut() {
      script(id);
    }
    if self.fail_calls {
      return Err("script threw".to_string());
    }
    Ok(())
  }
}

#[derive(Debug)]
pub struct FakeError(pub &'static str);

#[derive(Debug, Default)]
pub struct FakeStackState<'q> {
  notifier: Option<EventNotifier<'q, QUEUE>>,
  pending: VecDeque<StackEvent>,
  pub fail_init: bool,
  pub fail_add_service: bool,
  pub init_calls: usize,
  pub device_name: Option<String>,
  pub advertising: Option<AdvertisementRequest>,
  pub start_requests: Vec<AdvertisementRequest>,
  pub stop_requests: usize,
  pub connected: bool,
  pub services: Vec<GattService>,
  pub values: BTreeMap<u16, Vec<u8>>,
  pub writes: Vec<(u16, Vec<u8>)>,
  next_handle: u16,
}

impl<'q> FakeStackState<'q> {
  pub fn set_value(&mut self, handle: u16, value: &[u8]) {
    self.values.insert(handle, value.to_vec());
  }

  /// What the stack's own context does when something happens: record it and notify.
  pub fn raise(&mut self, event: StackEvent) {
    match event {
      StackEvent::Connected => self.connected = true,
      StackEvent::Disconnected { .. } => self.connected = false,
      _ => {}
    }
    self.pending.push_back(event);
    if let Some(notifier) = self.notifier.as_mut() {
      notifier.events_to_process();
    }
  }
}

/// Cloning shares the state, so a test can keep a clone to raise events after handing the stack
/// to a device.
#[derive(Debug, Clone)]
pub struct FakeStack<'q> {
  shared: Rc<RefCell<FakeStackState<'q>>>,
}

impl<'q> FakeStack<'q> {
  pub fn new(notifier: EventNotifier<'q, QUEUE>) -> Self {
    let stack = Self::detached();
    stack.state_mut().notifier = Some(notifier);
    stack
  }

  pub fn detached() -> Self {
    Self {
      shared: Rc::new(RefCell::new(FakeStackState {
        next_handle: 1,
        ..Default::default()
      })),
    }
  }

  pub fn state(&self) -> Ref<'_, FakeStackState<'q>> {
    self.shared.borrow()
  }

  pub fn state_mut(&self) -> RefMut<'_, FakeStackState<'q>> {
    self.shared.borrow_mut()
  }

  pub fn raise(&self, event: StackEvent) {
    self.state_mut().raise(event);
  }
}

impl<'q> BleStack for FakeStack<'q> {
  type SystemError = FakeError;
  type Gap = Self;
  type GattServer = Self;

  fn init(&mut self) -> Result<(), Self::SystemError> {
    let mut state = self.state_mut();
    state.init_calls += 1;
    if state.fail_init {
      return Err(FakeError("init refused"));
    }
    Ok(())
  }

  fn process_events(&mut self, handler: &mut dyn StackEventHandler) {
    let events: Vec<_> = self.state_mut().pending.drain(..).collect();
    for event in events {
      handler.on_event(event);
    }
  }

  fn gap(&self) -> &Self::Gap {
    self
  }

  fn gap_mut(&mut self) -> &mut Self::Gap {
    self
  }

  fn gatt_server(&self) -> &Self::GattServer {
    self
  }

  fn gatt_server_mut(&mut self) -> &mut Self::GattServer {
    self
  }
}

impl<'q> GapAdvertiser for FakeStack<'q> {
  type SystemError = FakeError;

  fn set_device_name(&mut self, name: &str) -> Result<(), Self::SystemError> {
    self.state_mut().device_name = Some(name.to_string());
    Ok(())
  }

  fn request_start(&mut self, advertisement: &AdvertisementRequest) -> Result<(), Self::SystemError> {
    let mut state = self.state_mut();
    state.advertising = Some(advertisement.clone());
    state.start_requests.push(advertisement.clone());
    Ok(())
  }

  fn request_stop(&mut self) -> Result<(), Self::SystemError> {
    let mut state = self.state_mut();
    state.advertising = None;
    state.stop_requests += 1;
    Ok(())
  }

  fn is_connected(&self) -> bool {
    self.state().connected
  }
}

impl<'q> GattServer for FakeStack<'q> {
  type SystemError = FakeError;

  fn add_service(&mut self, service: GattService) -> Result<Vec<AttributeHandle>, Self::SystemError> {
    let mut state = self.state_mut();
    if state.fail_add_service {
      return Err(FakeError("attribute table full"));
    }

    let mut handles = Vec::new();
    for characteristic in &service.characteristics {
      let raw = state.next_handle;
      state.next_handle += 1;
      state.values.insert(raw, characteristic.value.clone());
      handles.push(AttributeHandle::new(raw).ok_or(FakeError("handle overflow"))?);
    }
    state.services.push(service);
    Ok(handles)
  }

  fn read(&self, handle: AttributeHandle, buf: &mut [u8]) -> Result<usize, Self::SystemError> {
    let state = self.state();
    let value = state
      .values
      .get(&handle.get())
      .ok_or(FakeError("unknown handle"))?;
    let len = value.len().min(buf.len());
    buf[..len].copy_from_slice(&value[..len]);
    Ok(len)
  }

  fn write(&mut self, handle: AttributeHandle, value: &[u8]) -> Result<(), Self::SystemError> {
    let mut state = self.state_mut();
    if !state.values.contains_key(&handle.get()) {
      return Err(FakeError("unknown handle"));
    }
    state.values.insert(handle.get(), value.to_vec());
    state.writes.push((handle.get(), value.to_vec()));
    Ok(())
  }
}
