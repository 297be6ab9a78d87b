//! USB platform information (`0x600..0x700`).

use super::codec::{field_str, str_field, try_str_field, Reader, Writer};

/// 48-byte, zero-padded USB descriptor string.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct UsbString([u8; 48]);

impl UsbString {
    pub const EMPTY: Self = Self([0; 48]);

    /// Panics (a compile error in `const` context) if `s` is longer than 48 bytes.
    pub const fn new(s: &str) -> Self {
        Self(str_field(s))
    }

    pub const fn try_new(s: &str) -> Option<Self> {
        match try_str_field(s) {
            Some(bytes) => Some(Self(bytes)),
            None => None,
        }
    }

    pub const fn as_bytes(&self) -> &[u8; 48] {
        &self.0
    }

    pub fn as_str(&self) -> Option<&str> {
        field_str(&self.0)
    }
}

impl core::fmt::Debug for UsbString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "{:?}", s),
            None => write!(f, "{:02x?}", &self.0),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UsbString {
    fn format(&self, fmt: defmt::Formatter) {
        match self.as_str() {
            Some(s) => defmt::write!(fmt, "{=str}", s),
            None => defmt::write!(fmt, "{=[u8]:x}", &self.0[..]),
        }
    }
}

/// USB identification used by the ROM's USB boot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsbPlatformInfo {
    pub vid: u16,
    pub pid: u16,
    pub manufacturer: UsbString,
    pub product: UsbString,
    pub serial_number: UsbString,
}

impl UsbPlatformInfo {
    pub const SIZE: usize = 0x100;

    /// SONiX vendor ID.
    pub const SONIX_VID: u16 = 0x0C45;
    /// SNC7330 product ID.
    pub const SNC7330_PID: u16 = 0x7300;

    pub const SONIX: Self = Self {
        vid: Self::SONIX_VID,
        pid: Self::SNC7330_PID,
        manufacturer: UsbString::new("Sonix Technology Co., Ltd."),
        product: UsbString::EMPTY,
        serial_number: UsbString::EMPTY,
    };

    pub(crate) const fn encode<const N: usize>(&self, w: &mut Writer<N>, at: usize) {
        w.u16(at, self.vid);
        w.u16(at + 0x02, self.pid);
        w.bytes(at + 0x04, self.manufacturer.as_bytes());
        w.bytes(at + 0x34, self.product.as_bytes());
        w.bytes(at + 0x64, self.serial_number.as_bytes());
    }

    pub(crate) fn decode(r: &Reader<'_>, at: usize) -> Self {
        Self {
            vid: r.u16(at),
            pid: r.u16(at + 0x02),
            manufacturer: UsbString(r.array(at + 0x04)),
            product: UsbString(r.array(at + 0x34)),
            serial_number: UsbString(r.array(at + 0x64)),
        }
    }
}
