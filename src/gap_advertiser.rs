use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::time::Duration;

use log::{debug, warn};

use crate::advertisement::{
  AdType, AdvertisementParams, AdvertisementPayloadBuilder, AdvertisementRequest, DiscoverMode,
  ScanResponsePayloadBuilder, MAX_ADVERTISING_INTERVAL, MIN_ADVERTISING_INTERVAL,
};
use crate::codec::{decode_uuid, hex_pairs_to_bytes};
use crate::config::DeviceConfig;
use crate::descriptors::UUID;
use crate::error::{BridgeError, Result};

/// GAP half of the native stack: advertising and connection state.
pub trait GapAdvertiser {
  type SystemError: Debug;

  /// Sets the name reported by the built-in GAP device name characteristic.
  fn set_device_name(&mut self, name: &str) -> Result<(), Self::SystemError>;

  /// Request that BLE advertising begins with the given payloads and parameters, replacing
  /// whatever was being advertised before.
  fn request_start(&mut self, advertisement: &AdvertisementRequest) -> Result<(), Self::SystemError>;

  /// Request that BLE advertising is stopped.  Stopping while not advertising is not an error.
  fn request_stop(&mut self) -> Result<(), Self::SystemError>;

  fn is_connected(&self) -> bool;
}

/// Advertising parameters as script code declares them.  UUIDs and manufacturer data are kept
/// in their textual form and decoded by [build_advertisement].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AdvertisingConfig {
  pub device_name: String,
  pub service_uuids: Vec<String>,

  /// `None` uses [DeviceConfig::default_advertising_interval].
  pub interval: Option<Duration>,

  /// Hex string, two characters per byte.  Carried in the scan response.
  pub manufacturer_data: Option<String>,
}

/// Assemble a complete advertising session from script declarations.  UUIDs that fail to decode
/// are skipped with a warning; everything else that is malformed fails the whole request before
/// the stack is touched.
pub fn build_advertisement(
  config: &AdvertisingConfig,
  device_config: &DeviceConfig,
) -> Result<AdvertisementRequest> {
  let interval = config
    .interval
    .unwrap_or(device_config.default_advertising_interval);
  if !(MIN_ADVERTISING_INTERVAL..=MAX_ADVERTISING_INTERVAL).contains(&interval) {
    return Err(BridgeError::invalid_argument(alloc::format!(
      "advertising interval {interval:?} outside [{MIN_ADVERTISING_INTERVAL:?}, {MAX_ADVERTISING_INTERVAL:?}]"
    )));
  }

  let mut short_uuids = Vec::new();
  let mut long_uuids = Vec::new();
  for (index, text) in config.service_uuids.iter().enumerate() {
    match decode_uuid(text) {
      Ok(uuid @ UUID::Short(_)) => short_uuids.push(uuid),
      Ok(uuid) => long_uuids.push(uuid),
      Err(e) => warn!("invalid service uuid {index} ({text:?}): {e}, ignoring"),
    }
  }

  let mut builder = AdvertisementPayloadBuilder::new()
    .set_discover_mode(DiscoverMode::General)
    .set_classic_not_supported(true);
  if !short_uuids.is_empty() {
    builder = builder.push_service_uuids(&short_uuids)?;
  }
  if !long_uuids.is_empty() {
    builder = builder.push_service_uuids(&long_uuids)?;
  }
  let payload = builder
    .push_complete_local_name(&config.device_name)?
    .build()?;

  let scan_response_payload = match config.manufacturer_data.as_deref() {
    Some(hex) if !hex.is_empty() => {
      let data = hex_pairs_to_bytes(hex)?;
      debug!("manufacturer data: {} bytes", data.len());
      Some(
        ScanResponsePayloadBuilder::new()
          .push_raw_ad_type(AdType::ManufacturerData as _, &data)?
          .build()?,
      )
    }
    _ => None,
  };

  Ok(AdvertisementRequest {
    device_name: config.device_name.clone(),
    params: AdvertisementParams {
      connect_mode: device_config.connect_mode,
      interval_min: Some(interval),
      interval_max: Some(interval),
      ..Default::default()
    },
    payload,
    scan_response_payload,
  })
}

/// Session used when advertising is resumed before anything was configured: flags only.
pub fn default_advertisement(device_config: &DeviceConfig) -> Result<AdvertisementRequest> {
  let interval = device_config.default_advertising_interval;
  Ok(AdvertisementRequest {
    device_name: String::new(),
    params: AdvertisementParams {
      connect_mode: device_config.connect_mode,
      interval_min: Some(interval),
      interval_max: Some(interval),
      ..Default::default()
    },
    payload: AdvertisementPayloadBuilder::new().build_with_default_flags()?,
    scan_response_payload: None,
  })
}
