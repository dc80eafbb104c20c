#![no_std]

extern crate alloc;

pub mod advertisement;
pub mod callback_table;
pub mod codec;
pub mod config;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod event_bridge;
pub mod gap_advertiser;
pub mod gatt_builder;
pub mod gatt_server;
pub mod handle_registry;
pub mod peripheral;
pub mod script;
pub mod script_api;
pub mod stack_error;
pub mod stack_event;
pub mod task_queue;

#[cfg(test)]
mod testing;

pub mod prelude {
  pub use crate::advertisement::*;
  pub use crate::config::*;
  pub use crate::descriptors::*;
  pub use crate::device::*;
  pub use crate::error::BridgeError;
  pub use crate::event_bridge::{invoke_all, Invocation};
  pub use crate::gap_advertiser::*;
  pub use crate::gatt_server::*;
  pub use crate::handle_registry::{NativeHandle, NativeHandleRegistry, NativeObject};
  pub use crate::peripheral::*;
  pub use crate::script::*;
  pub use crate::stack_error::*;
  pub use crate::stack_event::*;
  pub use crate::task_queue::*;
}
