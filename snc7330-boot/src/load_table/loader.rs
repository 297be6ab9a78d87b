//! Loader configuration (`0x200..0x400`).
//!
//! Owned by the software boot loader, not the mask ROM: a tag and up to eight pointers to
//! firmware info blocks (see [`crate::fw_block`]).

use super::codec::{Reader, Writer};

/// Loader configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoaderConfig {
    pub mark: [u8; 8],
    /// Addresses of firmware info blocks, `0` for unused entries.
    pub fw_info: [u32; LoaderConfig::MAX_FW_INFO],
}

impl LoaderConfig {
    pub const SIZE: usize = 0x200;
    pub const MAX_FW_INFO: usize = 8;

    /// All-zero record, ignored by the loader.
    pub const EMPTY: Self = Self {
        mark: [0; 8],
        fw_info: [0; Self::MAX_FW_INFO],
    };

    /// Whether the record carries anything.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Used `fw_info` entries.
    pub fn blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.fw_info.iter().copied().filter(|&addr| addr != 0)
    }

    pub(crate) const fn encode<const N: usize>(&self, w: &mut Writer<N>, at: usize) {
        w.bytes(at, &self.mark);
        w.u32s(at + 0x08, &self.fw_info);
    }

    pub(crate) fn decode(r: &Reader<'_>, at: usize) -> Self {
        Self {
            mark: r.array(at),
            fw_info: r.u32s(at + 0x08),
        }
    }
}
