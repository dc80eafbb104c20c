use core::fmt::Debug;

use crate::gap_advertiser::GapAdvertiser;
use crate::gatt_server::GattServer;
use crate::stack_event::StackEventHandler;

/// The native BLE stack a [crate::device::Device] drives.  Injected at construction rather than
/// reached through a process-wide instance so that alternative stacks (and fakes) can be used.
///
/// Implementations are expected to be built with an [crate::task_queue::EventNotifier] and to
/// call [crate::task_queue::EventNotifier::events_to_process] from their own context whenever
/// work is pending.  They must never call into script code directly; events are released only
/// through [BleStack::process_events], which is invoked from the script turn.
pub trait BleStack {
  type SystemError: Debug;

  type Gap: GapAdvertiser<SystemError = Self::SystemError>;
  type GattServer: GattServer<SystemError = Self::SystemError>;

  /// Start initializing the stack.  Completion is reported asynchronously as
  /// [crate::stack_event::StackEvent::InitComplete].
  fn init(&mut self) -> Result<(), Self::SystemError>;

  /// Release all pending events to `handler`, in the order they occurred.
  fn process_events(&mut self, handler: &mut dyn StackEventHandler);

  fn gap(&self) -> &Self::Gap;
  fn gap_mut(&mut self) -> &mut Self::Gap;

  fn gatt_server(&self) -> &Self::GattServer;
  fn gatt_server_mut(&mut self) -> &mut Self::GattServer;
}
