use heapless::Vec;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UUID {
  /// For use only with SIG defined services (i.e. registered and publicly well known services).
  Short(u16),

  /// All other BLE UUIDs must be 128-bit.  The value is the big-endian reading of the 16 UUID
  /// bytes, so `0x0123...` prints the way the UUID is conventionally written.
  Long(u128),
}

impl UUID {
  /// Number of bytes this UUID occupies on the wire.
  pub fn wire_len(&self) -> usize {
    match self {
      UUID::Short(_) => 2,
      UUID::Long(_) => 16,
    }
  }

  /// Append the little-endian wire encoding.
  pub fn push_into<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), ()> {
    match *self {
      UUID::Short(u) => out.extend_from_slice(&u.to_le_bytes()),
      UUID::Long(u) => out.extend_from_slice(&u.to_le_bytes()),
    }
  }
}
