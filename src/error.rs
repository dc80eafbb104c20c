use alloc::string::String;

use thiserror::Error;

use crate::advertisement::PushError;
use crate::codec::CodecError;

/// Everything the bridge can report back to the script boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
  /// Wrong script value type or shape.  Raised before any native state is touched.
  #[error("invalid argument: {reason}")]
  InvalidArgument { reason: String },

  #[error("{function}: unexpected argument count {got}")]
  ArgumentCount { function: &'static str, got: usize },

  /// The script object carries no live native binding (never bound, or already released).
  #[error("script object has no native binding")]
  UnboundHandle,

  #[error("native handle refers to a {found}, expected a {expected}")]
  TypeMismatch {
    expected: &'static str,
    found: &'static str,
  },

  /// The object was already handed over to the stack.
  #[error("{kind} is already registered with the stack")]
  AlreadyRegistered { kind: &'static str },

  #[error("BLE stack failed to initialize: {detail}")]
  NativeInit { detail: String },

  #[error("operation not valid in the current state: {reason}")]
  InvalidState { reason: &'static str },

  #[error(transparent)]
  Decode(#[from] CodecError),

  #[error("advertising payload: {0}")]
  Advertising(#[from] PushError),

  #[error("BLE stack rejected {operation}: {detail}")]
  Stack {
    operation: &'static str,
    detail: String,
  },

  #[error("script callback failed: {detail}")]
  Script { detail: String },
}

impl BridgeError {
  pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
    BridgeError::InvalidArgument {
      reason: reason.into(),
    }
  }

  pub(crate) fn stack(operation: &'static str, error: impl core::fmt::Debug) -> Self {
    BridgeError::Stack {
      operation,
      detail: alloc::format!("{error:?}"),
    }
  }
}

pub type Result<T, E = BridgeError> = core::result::Result<T, E>;
