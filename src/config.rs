use core::time::Duration;

use crate::advertisement::ConnectMode;
use crate::descriptors::DEFAULT_VALUE_CAPACITY;

/// Tunables for a [crate::device::Device].  Construct with `..Default::default()` and override
/// only what differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
  /// Interval used when script code starts advertising without one (or with a non-numeric one).
  pub default_advertising_interval: Duration,

  /// Value buffer size for characteristics declared without a max length.
  pub value_capacity: u16,

  pub connect_mode: ConnectMode,
}

impl Default for DeviceConfig {
  fn default() -> Self {
    Self {
      default_advertising_interval: Duration::from_millis(1000),
      value_capacity: DEFAULT_VALUE_CAPACITY,
      connect_mode: ConnectMode::Undirected,
    }
  }
}
