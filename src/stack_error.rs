use thiserror::Error;

/// Status codes a native stack reports through its event path (as opposed to the synchronous
/// `SystemError` each trait call returns).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum StackError {
  #[error("buffer overflow")]
  BufferOverflow,
  #[error("not implemented")]
  NotImplemented,
  #[error("parameter out of range")]
  ParamOutOfRange,
  #[error("invalid parameter")]
  InvalidParam,
  #[error("stack busy")]
  StackBusy,
  #[error("invalid state")]
  InvalidState,
  #[error("out of memory")]
  NoMem,
  #[error("operation not permitted")]
  OperationNotPermitted,
  #[error("initialization incomplete")]
  InitializationIncomplete,
  #[error("already initialized")]
  AlreadyInitialized,
  #[error("internal stack failure")]
  InternalStackFailure,
  #[error("stack error code {0:#04x}")]
  Other(u8),
}
