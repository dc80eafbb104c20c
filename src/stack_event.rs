use core::fmt::Debug;

use crate::descriptors::AttributeHandle;
use crate::stack_error::StackError;

/// Receives the events a stack releases from [crate::peripheral::BleStack::process_events].
pub trait StackEventHandler {
  fn on_event(&mut self, event: StackEvent);
}

impl<F> StackEventHandler for F
where
  F: FnMut(StackEvent),
{
  fn on_event(&mut self, event: StackEvent) {
    (self)(event)
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StackEvent {
  /// Initialization requested through [crate::peripheral::BleStack::init] has finished.  An
  /// error here is final: the stack will not report completion again.
  InitComplete(Result<(), StackError>),

  /// Peer connected.  Most stacks stop advertising automatically when this happens.
  Connected,

  /// Peer disconnected.  `reason` is the HCI reason code as reported by the controller.
  Disconnected { reason: u8 },

  /// A peer wrote the attribute.  The written value is read back from the attribute table when
  /// the event is dispatched, so it reflects the latest write even if several were coalesced.
  DataWritten { handle: AttributeHandle },
}
