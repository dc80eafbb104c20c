//! One function per script-visible method.  Each checks arity and argument types before any
//! native state is touched, then forwards to [Device].
//!
//! `this` is the script object a method was invoked on; `args` are its arguments.

use alloc::vec::Vec;
use core::time::Duration;

use log::{debug, warn};

use crate::config::DeviceConfig;
use crate::device::Device;
use crate::error::{BridgeError, Result};
use crate::gap_advertiser::AdvertisingConfig;
use crate::handle_registry::NativeHandle;
use crate::peripheral::BleStack;
use crate::script::{
  bytes_from_array, handles_from_array, strings_from_array, Args, NativeClass, ScriptRuntime,
};
use crate::task_queue::TaskDrain;

fn this_handle<R: ScriptRuntime>(runtime: &R, this: &R::Value) -> Result<NativeHandle> {
  runtime.native_handle(this).ok_or(BridgeError::UnboundHandle)
}

/// Milliseconds from script code.  Range is checked when the advertisement is built.
fn interval_from_millis(ms: f64) -> Result<Duration> {
  if !ms.is_finite() || ms < 0.0 {
    return Err(BridgeError::invalid_argument(alloc::format!(
      "advertising interval {ms} is not a non-negative number"
    )));
  }
  Ok(Duration::from_micros((ms * 1000.0) as u64))
}

fn max_length_from_number(n: f64) -> Result<u16> {
  if (0.0..=f64::from(u16::MAX)).contains(&n) && f64::from(n as u16) == n {
    Ok(n as u16)
  } else {
    Err(BridgeError::invalid_argument(alloc::format!(
      "max length {n} is not an integer in 0..=65535"
    )))
  }
}

/// `new Device()`
pub fn device_new<'q, S, R, const N: usize>(
  runtime: &R,
  args: &[R::Value],
  stack: S,
  tasks: TaskDrain<'q, N>,
  config: DeviceConfig,
) -> Result<Device<'q, S, R, N>>
where
  S: BleStack,
  R: ScriptRuntime,
{
  Args::new(runtime, "Device", args).expect_count(&[0])?;
  Ok(Device::new(stack, tasks, config))
}

/// `device.ready(callback)`
pub fn device_ready<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  let callback = {
    let args = Args::new(&*runtime, "ready", args);
    args.expect_count(&[1])?;
    args.function(0)?.clone()
  };
  device.ready(callback)?;
  Ok(runtime.create_undefined())
}

/// `device.startAdvertising()` or
/// `device.startAdvertising(deviceName, serviceUuids[, intervalMs[, manufacturerData]])`
///
/// A non-numeric interval falls back to the configured default.
pub fn device_start_advertising<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  let config = {
    let args = Args::new(&*runtime, "startAdvertising", args);
    args.expect_count(&[0, 2, 3, 4])?;
    if args.is_empty() {
      None
    } else {
      let device_name = args.string(0)?;
      let service_uuids = strings_from_array(&*runtime, args.array(1)?);
      let interval = match args.optional(2) {
        Some(value) => match runtime.number(value) {
          Some(ms) => Some(interval_from_millis(ms)?),
          None => {
            warn!("advertising interval is not a number, using the default");
            None
          }
        },
        None => None,
      };
      let manufacturer_data = match args.optional(3) {
        Some(_) => Some(args.string(3)?),
        None => None,
      };
      Some(AdvertisingConfig {
        device_name,
        service_uuids,
        interval,
        manufacturer_data,
      })
    }
  };
  device.start_advertising(config.as_ref())?;
  Ok(runtime.create_undefined())
}

/// `device.stopAdvertising()`
pub fn device_stop_advertising<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  Args::new(&*runtime, "stopAdvertising", args).expect_count(&[0])?;
  device.stop_advertising()?;
  Ok(runtime.create_undefined())
}

/// `device.addServices(services)`
pub fn device_add_services<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  let services = {
    let args = Args::new(&*runtime, "addServices", args);
    args.expect_count(&[1])?;
    handles_from_array(&*runtime, args.array(0)?)?
  };
  device.add_services(&services)?;
  Ok(runtime.create_undefined())
}

/// `device.onConnection(callback)`
pub fn device_on_connection<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  let callback = {
    let args = Args::new(&*runtime, "onConnection", args);
    args.expect_count(&[1])?;
    args.function(0)?.clone()
  };
  device.on_connection(callback);
  Ok(runtime.create_undefined())
}

/// `device.onDisconnection(callback)`
pub fn device_on_disconnection<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  let callback = {
    let args = Args::new(&*runtime, "onDisconnection", args);
    args.expect_count(&[1])?;
    args.function(0)?.clone()
  };
  device.on_disconnection(callback);
  Ok(runtime.create_undefined())
}

/// `device.isConnected()`
pub fn device_is_connected<S, R, const N: usize>(
  device: &Device<'_, S, R, N>,
  runtime: &mut R,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  Args::new(&*runtime, "isConnected", args).expect_count(&[0])?;
  Ok(runtime.create_boolean(device.is_connected()))
}

/// `new Characteristic(uuid, properties, maxLength[, initialValue])`
///
/// An undefined `maxLength` uses the device's default value capacity.
pub fn characteristic_new<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  let (uuid, properties, max_length, initial_value) = {
    let args = Args::new(&*runtime, "Characteristic", args);
    args.expect_count(&[3, 4])?;
    let uuid = args.string(0)?;
    let properties = strings_from_array(&*runtime, args.array(1)?);
    let max_length = match args.optional(2) {
      Some(_) => Some(max_length_from_number(args.number(2)?)?),
      None => None,
    };
    let initial_value = match args.optional(3) {
      Some(_) => Some(bytes_from_array(&*runtime, args.array(3)?)?),
      None => None,
    };
    (uuid, properties, max_length, initial_value)
  };

  let handle = device.create_characteristic(
    &uuid,
    properties.iter().map(|p| p.as_str()),
    max_length,
    initial_value.as_deref(),
  )?;
  Ok(runtime.create_native_object(NativeClass::Characteristic, handle))
}

/// `characteristic.write(bytes)`
pub fn characteristic_write<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  this: &R::Value,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  let (handle, value) = {
    let args = Args::new(&*runtime, "write", args);
    args.expect_count(&[1])?;
    let value = bytes_from_array(&*runtime, args.array(0)?)?;
    (this_handle(&*runtime, this)?, value)
  };
  device.write_characteristic(handle, &value)?;
  Ok(runtime.create_undefined())
}

/// `characteristic.onWrite(callback)`
pub fn characteristic_on_write<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  this: &R::Value,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  let (handle, callback) = {
    let args = Args::new(&*runtime, "onWrite", args);
    args.expect_count(&[1])?;
    let callback = args.function(0)?.clone();
    (this_handle(&*runtime, this)?, callback)
  };
  device.set_write_callback(handle, callback)?;
  Ok(runtime.create_undefined())
}

/// `characteristic.clearOnWrite()`
pub fn characteristic_clear_on_write<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  this: &R::Value,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  Args::new(&*runtime, "clearOnWrite", args).expect_count(&[0])?;
  let handle = this_handle(&*runtime, this)?;
  device.clear_write_callback(handle);
  Ok(runtime.create_undefined())
}

/// `new Service(uuid, characteristics)`
pub fn service_new<S, R, const N: usize>(
  device: &mut Device<'_, S, R, N>,
  runtime: &mut R,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  let (uuid, characteristics): (_, Vec<NativeHandle>) = {
    let args = Args::new(&*runtime, "Service", args);
    args.expect_count(&[2])?;
    let uuid = args.string(0)?;
    (uuid, handles_from_array(&*runtime, args.array(1)?)?)
  };
  let handle = device.create_service(&uuid, &characteristics)?;
  Ok(runtime.create_native_object(NativeClass::Service, handle))
}

/// `service.getUUID()`
pub fn service_get_uuid<S, R, const N: usize>(
  device: &Device<'_, S, R, N>,
  runtime: &mut R,
  this: &R::Value,
  args: &[R::Value],
) -> Result<R::Value>
where
  S: BleStack,
  R: ScriptRuntime,
{
  Args::new(&*runtime, "getUUID", args).expect_count(&[0])?;
  let uuid = device.service_uuid(this_handle(&*runtime, this)?)?;
  Ok(runtime.create_string(&uuid))
}

/// Reclamation hook: the runtime collected a wrapper created by [characteristic_new] or
/// [service_new].  Safe to call more than once for the same handle.
pub fn object_reclaimed<S, R, const N: usize>(device: &mut Device<'_, S, R, N>, handle: NativeHandle)
where
  S: BleStack,
  R: ScriptRuntime,
{
  if !device.release_handle(handle) {
    debug!("native handle {handle} already released");
  }
}
