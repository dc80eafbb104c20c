//! Hand-off point between the stack's own execution context and the script turn.
//!
//! The native side only ever holds an [EventNotifier] and can do nothing but enqueue; the script
//! side holds the [TaskDrain] and runs what it dequeues.  This is the only state shared between
//! the two contexts.

use core::fmt::{Debug, Formatter};

use heapless::spsc::{Consumer, Producer, Queue};
use log::{debug, trace};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NativeTask {
  /// Let the stack drain its pending events, dispatching them to script callbacks.
  ProcessEvents,
}

/// Backing storage.  Holds at most `N - 1` tasks.
pub type TaskQueue<const N: usize> = Queue<NativeTask, N>;

pub fn split<const N: usize>(queue: &mut TaskQueue<N>) -> (EventNotifier<'_, N>, TaskDrain<'_, N>) {
  let (producer, consumer) = queue.split();
  (EventNotifier { producer }, TaskDrain { consumer })
}

/// Native-context half.  Safe to call from the stack's event path: it never touches script state.
pub struct EventNotifier<'q, const N: usize> {
  producer: Producer<'q, NativeTask, N>,
}

impl<'q, const N: usize> EventNotifier<'q, N> {
  /// The stack has pending work.  A single queued [NativeTask::ProcessEvents] drains everything,
  /// so when the queue is full the notification is coalesced into the one already pending.
  pub fn events_to_process(&mut self) {
    match self.producer.enqueue(NativeTask::ProcessEvents) {
      Ok(()) => trace!("scheduled stack event processing"),
      Err(_) => debug!("stack event processing already pending"),
    }
  }
}

impl<'q, const N: usize> Debug for EventNotifier<'q, N> {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("EventNotifier").finish_non_exhaustive()
  }
}

/// Script-context half, drained once per event loop turn.
pub struct TaskDrain<'q, const N: usize> {
  consumer: Consumer<'q, NativeTask, N>,
}

impl<'q, const N: usize> TaskDrain<'q, N> {
  pub fn next_task(&mut self) -> Option<NativeTask> {
    self.consumer.dequeue()
  }

  pub fn has_pending(&self) -> bool {
    self.consumer.ready()
  }
}

impl<'q, const N: usize> Debug for TaskDrain<'q, N> {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("TaskDrain")
      .field("pending", &self.has_pending())
      .finish()
  }
}
