//! Firmware / ISP information (`0x800..0x900`).
//!
//! Used by ISP update tools to find each code image in flash.

use super::codec::{Reader, Writer};
use super::{CodeRegion, LayoutError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareInfo {
    /// Main program (PRAM) image.
    pub pram: CodeRegion,
    /// Extension code decrypted into SRAM.
    pub sram: CodeRegion,
    /// Second core image.
    pub core1: CodeRegion,
    /// User extension code.
    pub ext: CodeRegion,
    pub flash_size: u32,
    pub load_table_address: u32,
    pub data: [CodeRegion; FirmwareInfo::MAX_DATA],
}

impl FirmwareInfo {
    pub const SIZE: usize = 0x100;

    /// Capacity of the auxiliary data list (`0x828..0x900`).
    pub const MAX_DATA: usize = 27;

    pub const EMPTY: Self = Self {
        pram: CodeRegion::EMPTY,
        sram: CodeRegion::EMPTY,
        core1: CodeRegion::EMPTY,
        ext: CodeRegion::EMPTY,
        flash_size: 0,
        load_table_address: 0,
        data: [CodeRegion::EMPTY; Self::MAX_DATA],
    };

    /// Replace the auxiliary data list.
    ///
    /// Panics (a compile error in `const` context) with more than 27 entries.
    pub const fn with_data(self, data: &[CodeRegion]) -> Self {
        match self.try_with_data(data) {
            Ok(info) => info,
            Err(e) => e.panic(),
        }
    }

    pub const fn try_with_data(mut self, data: &[CodeRegion]) -> Result<Self, LayoutError> {
        if data.len() > Self::MAX_DATA {
            return Err(LayoutError::TooManyDataRegions { count: data.len() });
        }
        self.data = [CodeRegion::EMPTY; Self::MAX_DATA];
        let mut i = 0;
        while i < data.len() {
            self.data[i] = data[i];
            i += 1;
        }
        Ok(self)
    }

    /// Non-empty auxiliary data entries.
    pub fn data_regions(&self) -> impl Iterator<Item = &CodeRegion> {
        self.data.iter().filter(|r| !r.is_empty())
    }

    pub(crate) const fn encode<const N: usize>(&self, w: &mut Writer<N>, at: usize) {
        let images = [self.pram, self.sram, self.core1, self.ext];
        let mut i = 0;
        while i < images.len() {
            w.u32(at + 8 * i, images[i].address);
            w.u32(at + 8 * i + 4, images[i].size);
            i += 1;
        }
        w.u32(at + 0x20, self.flash_size);
        w.u32(at + 0x24, self.load_table_address);
        let mut i = 0;
        while i < Self::MAX_DATA {
            w.u32(at + 0x28 + 8 * i, self.data[i].address);
            w.u32(at + 0x28 + 8 * i + 4, self.data[i].size);
            i += 1;
        }
    }

    pub(crate) fn decode(r: &Reader<'_>, at: usize) -> Self {
        let region = |offset: usize| CodeRegion::new(r.u32(offset), r.u32(offset + 4));
        Self {
            pram: region(at),
            sram: region(at + 0x08),
            core1: region(at + 0x10),
            ext: region(at + 0x18),
            flash_size: r.u32(at + 0x20),
            load_table_address: r.u32(at + 0x24),
            data: core::array::from_fn(|i| region(at + 0x28 + 8 * i)),
        }
    }
}
