use alloc::string::String;
use core::ops::Deref;
use core::time::Duration;

use thiserror::Error;

use crate::descriptors::UUID;

/// Everything needed to (re)start one advertising session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementRequest {
  /// Name exposed through the built-in GAP device name characteristic.
  pub device_name: String,
  pub params: AdvertisementParams,
  pub payload: AdvertisementPayload,
  pub scan_response_payload: Option<ScanResponsePayload>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[allow(clippy::manual_non_exhaustive)]
pub struct AdvertisementParams {
  /// Can a peer connect to us, and using what mechanism?
  pub connect_mode: ConnectMode,

  /// Minimum advertising interval to be used by the advertising set.  Acceptable values are
  /// in the range [20ms, 10,485s].
  pub interval_min: Option<Duration>,

  /// Maximum advertising interval to be used by the advertising set.  Acceptable values are
  /// in the range [20ms, 10,485s].
  pub interval_max: Option<Duration>,

  // Not using #[non_exhaustive] because it doesn't support construction using
  // `..Default::default()`.
  #[doc(hidden)]
  pub _non_exhaustive: (),
}

pub const MIN_ADVERTISING_INTERVAL: Duration = Duration::from_millis(20);
pub const MAX_ADVERTISING_INTERVAL: Duration = Duration::from_millis(10_485_000);

/// Whether and how this peripheral is connectable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectMode {
  /// Connections from any address are allowed.  If unsure, this is probably what you want to use.
  Undirected = 0b0000,

  /// Connections are allowed only from a specific address.  This address must be specified
  /// in the advertisement payload.
  Directed = 0b0001,

  /// Connections are not allowed.
  None = 0b0010,
}

impl Default for ConnectMode {
  fn default() -> Self {
    Self::Undirected
  }
}

pub type AdvertisementPayloadBuilder = RawAdvertisementBuilder<31>;
pub type ScanResponsePayloadBuilder = RawAdvertisementBuilder<31>;

/// Helper to facilitate creating correctly structured advertisement PDUs.
#[derive(Debug, Default, Clone)]
pub struct RawAdvertisementBuilder<const N: usize> {
  raw: heapless::Vec<u8, N>,
  flags: Option<u8>,
  has_set_flags: bool,
}

impl<const N: usize> RawAdvertisementBuilder<N> {
  pub fn new() -> Self {
    Default::default()
  }

  /// Set the discover mode.
  pub fn set_discover_mode(mut self, discover_mode: DiscoverMode) -> Self {
    let flags = self.flags.get_or_insert(0);
    *flags = (*flags & !DISCOVER_MODE_MASK) | (discover_mode as u8 & DISCOVER_MODE_MASK);
    self
  }

  /// Indicate that Bluetooth Classic (BR/EDR) is _NOT_ supported.
  pub fn set_classic_not_supported(mut self, classic_not_supported: bool) -> Self {
    let flags = self.flags.get_or_insert(0);
    if classic_not_supported {
      *flags |= CLASSIC_NOT_SUPPORTED_MASK;
    } else {
      *flags &= !CLASSIC_NOT_SUPPORTED_MASK;
    }
    self
  }

  /// Push an incomplete service UUID list.  All UUIDs must share the same width since 16-bit and
  /// 128-bit UUIDs live in separate records.
  pub fn push_service_uuids(mut self, uuids: &[UUID]) -> Result<Self, PushError> {
    let size_of_item = Self::require_equal_size(uuids)?;
    let ad_type = match uuids.first().ok_or(PushError::UuidInputError)? {
      UUID::Short(_) => AdType::PartialServiceUuids16,
      UUID::Long(_) => AdType::PartialServiceUuids128,
    };

    self = self.push_start_record(ad_type as _, size_of_item * uuids.len())?;
    for uuid in uuids {
      uuid
        .push_into(&mut self.raw)
        .map_err(|_| PushError::CapacityExceeded)?;
    }

    Ok(self)
  }

  fn require_equal_size(uuids: &[UUID]) -> Result<usize, PushError> {
    let mut num_bytes = None;
    for uuid in uuids {
      let size_of = uuid.wire_len();
      if num_bytes.get_or_insert(size_of) != &size_of {
        return Err(PushError::UuidInputError);
      }
    }
    num_bytes.ok_or(PushError::UuidInputError)
  }

  /// Push the complete local name, the same name the GAP device name characteristic reports.
  pub fn push_complete_local_name(self, name: &str) -> Result<Self, PushError> {
    self.push_raw_ad_type(AdType::CompleteLocalName as _, name.as_bytes())
  }

  pub fn push_raw_ad_type(mut self, ad_type: u8, data: &[u8]) -> Result<Self, PushError> {
    self = self.push_start_record(ad_type, data.len())?;
    self.extend(data)?;

    if ad_type == AdType::Flags as _ {
      self.has_set_flags = true;
    }

    Ok(self)
  }

  fn extend(&mut self, data: &[u8]) -> Result<(), PushError> {
    self
      .raw
      .extend_from_slice(data)
      .map_err(|_| PushError::CapacityExceeded)
  }

  fn push_start_record(mut self, ad_type: u8, remaining_size: usize) -> Result<Self, PushError> {
    self = self.flush_pending_record()?;

    if self.raw.len() + 2 + remaining_size > N {
      return Err(PushError::CapacityExceeded);
    }

    let length: u8 = (remaining_size + 1)
      .try_into()
      .map_err(|_| PushError::CapacityExceeded)?;
    self.extend(&[length, ad_type])?;
    Ok(self)
  }

  pub fn build(self) -> Result<RawAdvertisement<N>, PushError> {
    self.flush_pending_record().map(|b| RawAdvertisement(b.raw))
  }

  /// Like [Self::build] but inserts the default flags (general discoverable, BR/EDR not
  /// supported) when none were given.  Scan responses must not carry flags, so they use
  /// [Self::build].
  pub fn build_with_default_flags(mut self) -> Result<RawAdvertisement<N>, PushError> {
    self = self.ensure_defaults_set()?;
    self.build()
  }

  fn flush_pending_record(mut self) -> Result<Self, PushError> {
    if let Some(flags) = self.flags.take() {
      self = self.push_raw_ad_type(AdType::Flags as _, &[flags])?;
    }
    Ok(self)
  }

  fn ensure_defaults_set(mut self) -> Result<Self, PushError> {
    if !self.has_set_flags && self.flags.is_none() {
      self = self.set_discover_mode(DiscoverMode::General);
      self = self.set_classic_not_supported(true);
      self = self.flush_pending_record()?;
    }
    Ok(self)
  }
}

/// Advertisements consist of one or more ad type units in a TLV-style format (but actually it's
/// LTV).  Note that this list is not exhaustive but is provided as a convenience.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum AdType {
  Flags = 0x01,
  PartialServiceUuids16 = 0x02,
  CompleteServiceUuids16 = 0x03,
  PartialServiceUuids32 = 0x04,
  CompleteServiceUuids32 = 0x05,
  PartialServiceUuids128 = 0x06,
  CompleteServiceUuids128 = 0x07,
  ShortLocalName = 0x08,
  CompleteLocalName = 0x09,
  TxPowerLevel = 0x0a,
  ServiceData16 = 0x16,
  Appearance = 0x19,
  AdvertisingInterval = 0x1a,
  ServiceData128 = 0x21,
  ManufacturerData = 0xff,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum PushError {
  #[error("record does not fit in the 31 byte payload")]
  CapacityExceeded,

  #[error("service UUID list is empty or mixes 16-bit and 128-bit UUIDs")]
  UuidInputError,
}

const DISCOVER_MODE_MASK: u8 = 0b0000_0011;
const CLASSIC_NOT_SUPPORTED_MASK: u8 = 0b0000_0100;

/// Whether and how this peripheral is discovered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum DiscoverMode {
  /// This device can only be discovered when a central device is following the limited
  /// discovery procedure.
  Limited = 0b0000_0001,

  /// General discovery.  This is the normal discovery mode that most customers would use.
  General = 0b0000_0010,

  /// Device is not discoverable (whether the device is connectable is determined independently).
  None = 0b0000_0000,
}

/// Represents the raw payload for an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAdvertisement<const N: usize>(pub heapless::Vec<u8, N>);

impl<const N: usize> Deref for RawAdvertisement<N> {
  type Target = [u8];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

pub type AdvertisementPayload = RawAdvertisement<31>;
pub type ScanResponsePayload = RawAdvertisement<31>;
