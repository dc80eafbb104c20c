//! Conversions between the textual forms script code uses (hex strings, property names) and the
//! native representations the stack expects.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use enumset::EnumSet;
use thiserror::Error;

use crate::descriptors::{GattCharacteristicProperty, UUID};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
  #[error("empty hex string")]
  Empty,

  #[error("hex string of {len} characters does not fit in 16 bits")]
  TooLong { len: usize },

  #[error("invalid hex digit {found:?} at index {index}")]
  InvalidDigit { index: usize, found: char },

  #[error("hex string has odd length {len}")]
  OddLength { len: usize },
}

fn hex_digit(c: u8) -> Option<u8> {
  match c {
    b'0'..=b'9' => Some(c - b'0'),
    b'a'..=b'f' => Some(c - b'a' + 10),
    b'A'..=b'F' => Some(c - b'A' + 10),
    _ => None,
  }
}

fn digit_at(bytes: &[u8], index: usize) -> Result<u8, CodecError> {
  hex_digit(bytes[index]).ok_or(CodecError::InvalidDigit {
    index,
    found: char::from(bytes[index]),
  })
}

/// Decode up to four hex digits.  Malformed input is an error so that `0x0000` stays a legitimate
/// value.
pub fn hex_to_u16(text: &str) -> Result<u16, CodecError> {
  let bytes = text.as_bytes();
  if bytes.is_empty() {
    return Err(CodecError::Empty);
  }
  if bytes.len() > 4 {
    return Err(CodecError::TooLong { len: bytes.len() });
  }

  let mut value = 0u16;
  for index in 0..bytes.len() {
    value = (value << 4) | u16::from(digit_at(bytes, index)?);
  }
  Ok(value)
}

/// Decode a hex string two characters per byte.  Odd lengths are rejected rather than read past
/// the end.
pub fn hex_pairs_to_bytes(text: &str) -> Result<Vec<u8>, CodecError> {
  let bytes = text.as_bytes();
  if bytes.len() % 2 != 0 {
    return Err(CodecError::OddLength { len: bytes.len() });
  }

  (0..bytes.len())
    .step_by(2)
    .map(|i| Ok((digit_at(bytes, i)? << 4) | digit_at(bytes, i + 1)?))
    .collect()
}

/// Decode a script UUID string.  Exactly four characters yields a 16-bit UUID; any other length is
/// a 128-bit UUID.  Canonical text (32 hex digits, dashes anywhere) is parsed; everything else is
/// taken as raw bytes, zero padded or truncated to 16.
pub fn decode_uuid(text: &str) -> Result<UUID, CodecError> {
  if text.chars().count() == 4 {
    return hex_to_u16(text).map(UUID::Short);
  }

  let digits: Vec<u8> = text.bytes().filter(|&c| c != b'-').collect();
  let mut raw = [0u8; 16];
  if digits.len() == 32 && digits.iter().all(|&c| hex_digit(c).is_some()) {
    for (i, pair) in digits.chunks(2).enumerate() {
      raw[i] = (digit_at(pair, 0)? << 4) | digit_at(pair, 1)?;
    }
  } else {
    let verbatim = text.as_bytes();
    let len = verbatim.len().min(raw.len());
    raw[..len].copy_from_slice(&verbatim[..len]);
  }
  Ok(UUID::Long(u128::from_be_bytes(raw)))
}

/// Render a UUID the way `Service.getUUID()` reports it: four lowercase hex digits for short
/// UUIDs, 32 hex digits in wire (reversed) byte order for long ones.
pub fn uuid_to_string(uuid: &UUID) -> String {
  let mut out = String::new();
  match *uuid {
    UUID::Short(u) => {
      let _ = write!(out, "{u:04x}");
    }
    UUID::Long(u) => {
      for byte in u.to_le_bytes() {
        let _ = write!(out, "{byte:02x}");
      }
    }
  }
  out
}

/// Map a script property name to its flag.  Only the characters needed to tell the known names
/// apart are inspected; unknown names map to nothing.
pub fn match_property_name(name: &str) -> Option<GattCharacteristicProperty> {
  let bytes = name.as_bytes();
  match bytes.first()? {
    b'r' => Some(GattCharacteristicProperty::Read),
    b'w' if bytes.get(5) == Some(&b'W') => Some(GattCharacteristicProperty::WriteNoResponse),
    b'w' => Some(GattCharacteristicProperty::Write),
    b'n' => Some(GattCharacteristicProperty::Notify),
    b'i' => Some(GattCharacteristicProperty::Indicate),
    _ => None,
  }
}

pub fn fold_property_names<'a>(
  names: impl IntoIterator<Item = &'a str>,
) -> EnumSet<GattCharacteristicProperty> {
  names
    .into_iter()
    .filter_map(match_property_name)
    .collect()
}
