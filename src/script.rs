//! The slice of the script engine the bridge depends on.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

use log::warn;

use crate::error::{BridgeError, Result};
use crate::handle_registry::NativeHandle;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueKind {
  Undefined,
  Null,
  Boolean,
  Number,
  String,
  Array,
  Function,
  Object,
}

/// Script classes backed by a native handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NativeClass {
  Characteristic,
  Service,
}

/// A script engine as seen from native code.
///
/// `Value` is a reference-counted handle into the engine's heap: cloning it retains the value and
/// dropping it releases it, so a callback kept past the call that delivered it is retained by
/// simply storing the value, and released exactly once when the stored value is dropped.
///
/// Every method here must only be called from the script turn.
pub trait ScriptRuntime {
  type Value: Clone + Debug;
  type Error: Debug;

  fn kind(&self, value: &Self::Value) -> ValueKind;

  fn string(&self, value: &Self::Value) -> Option<String>;
  fn number(&self, value: &Self::Value) -> Option<f64>;
  fn array_length(&self, value: &Self::Value) -> Option<u32>;
  fn array_element(&self, value: &Self::Value, index: u32) -> Option<Self::Value>;

  /// The native handle attached to a script object, if any.
  fn native_handle(&self, value: &Self::Value) -> Option<NativeHandle>;

  fn create_undefined(&mut self) -> Self::Value;
  fn create_boolean(&mut self, value: bool) -> Self::Value;
  fn create_string(&mut self, value: &str) -> Self::Value;

  /// An array of numbers, one per byte.
  fn create_byte_array(&mut self, bytes: &[u8]) -> Self::Value;

  /// A script object of the given class with `handle` attached.  The engine must report the
  /// handle back through [crate::script_api::object_reclaimed] when the object is collected.
  fn create_native_object(&mut self, class: NativeClass, handle: NativeHandle) -> Self::Value;

  fn call(&mut self, function: &Self::Value, args: &[Self::Value]) -> Result<(), Self::Error>;

  fn is_function(&self, value: &Self::Value) -> bool {
    self.kind(value) == ValueKind::Function
  }
}

/// Arguments of one script-visible call, with the checks every binding needs.
pub struct Args<'a, R: ScriptRuntime> {
  runtime: &'a R,
  function: &'static str,
  values: &'a [R::Value],
}

impl<'a, R: ScriptRuntime> Args<'a, R> {
  pub fn new(runtime: &'a R, function: &'static str, values: &'a [R::Value]) -> Self {
    Self {
      runtime,
      function,
      values,
    }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn expect_count(&self, allowed: &[usize]) -> Result<()> {
    if allowed.contains(&self.values.len()) {
      Ok(())
    } else {
      Err(BridgeError::ArgumentCount {
        function: self.function,
        got: self.values.len(),
      })
    }
  }

  /// The argument at `index`, treating `undefined` as absent.
  pub fn optional(&self, index: usize) -> Option<&'a R::Value> {
    self
      .values
      .get(index)
      .filter(|v| self.runtime.kind(v) != ValueKind::Undefined)
  }

  fn typed(&self, index: usize, kind: ValueKind) -> Result<&'a R::Value> {
    match self.values.get(index) {
      Some(value) if self.runtime.kind(value) == kind => Ok(value),
      Some(value) => Err(self.wrong_type(index, kind, self.runtime.kind(value))),
      None => Err(BridgeError::ArgumentCount {
        function: self.function,
        got: self.values.len(),
      }),
    }
  }

  fn wrong_type(&self, index: usize, expected: ValueKind, found: ValueKind) -> BridgeError {
    BridgeError::invalid_argument(format!(
      "{}: argument {index} must be {expected:?}, got {found:?}",
      self.function
    ))
  }

  pub fn string(&self, index: usize) -> Result<String> {
    let value = self.typed(index, ValueKind::String)?;
    self
      .runtime
      .string(value)
      .ok_or_else(|| self.wrong_type(index, ValueKind::String, self.runtime.kind(value)))
  }

  pub fn number(&self, index: usize) -> Result<f64> {
    let value = self.typed(index, ValueKind::Number)?;
    self
      .runtime
      .number(value)
      .ok_or_else(|| self.wrong_type(index, ValueKind::Number, self.runtime.kind(value)))
  }

  pub fn array(&self, index: usize) -> Result<&'a R::Value> {
    self.typed(index, ValueKind::Array)
  }

  pub fn function(&self, index: usize) -> Result<&'a R::Value> {
    self.typed(index, ValueKind::Function)
  }
}

/// Elements of a script array that are strings.  Other elements are skipped with a warning.
pub fn strings_from_array<R: ScriptRuntime>(runtime: &R, array: &R::Value) -> Vec<String> {
  let length = runtime.array_length(array).unwrap_or(0);
  (0..length)
    .filter_map(|index| {
      let element = runtime.array_element(array, index);
      let text = element.as_ref().and_then(|e| runtime.string(e));
      if text.is_none() {
        warn!("array element {index} is not a string, ignoring");
      }
      text
    })
    .collect()
}

/// A script array of numbers in 0..=255 as bytes.  Any other element fails the conversion.
pub fn bytes_from_array<R: ScriptRuntime>(runtime: &R, array: &R::Value) -> Result<Vec<u8>> {
  let length = runtime.array_length(array).unwrap_or(0);
  (0..length)
    .map(|index| {
      let number = runtime
        .array_element(array, index)
        .and_then(|e| runtime.number(&e));
      match number {
        Some(n) if (0.0..=255.0).contains(&n) && f64::from(n as u8) == n => Ok(n as u8),
        _ => Err(BridgeError::invalid_argument(format!(
          "byte {index} is not an integer in 0..=255"
        ))),
      }
    })
    .collect()
}

/// The native handles attached to the elements of a script array.
pub fn handles_from_array<R: ScriptRuntime>(
  runtime: &R,
  array: &R::Value,
) -> Result<Vec<NativeHandle>> {
  let length = runtime.array_length(array).unwrap_or(0);
  (0..length)
    .map(|index| {
      runtime
        .array_element(array, index)
        .and_then(|e| runtime.native_handle(&e))
        .ok_or_else(|| {
          BridgeError::invalid_argument(format!("element {index} is not a native object"))
        })
    })
    .collect()
}
