//! Firmware info block.
//!
//! A 4 KiB block referenced from [`LoaderConfig::fw_info`](crate::load_table::LoaderConfig).
//! It names the firmware version, where its base image lives and up to eight regions the
//! software loader copies and CRC-checks.

use crate::load_table::codec::{Reader, Writer};
use crate::load_table::{Checksum, DecodeError};

/// Block size.
pub const BLOCK_SIZE: usize = 0x1000;

/// Offset of the first CRC region.
const REGIONS_OFFSET: usize = 0x20;

const REGION_SIZE: usize = 0x10;

/// A region copied by the loader and covered by its own CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CrcRegion {
    pub destination: u32,
    pub source: u32,
    pub size: u32,
    pub crc: Checksum,
}

impl CrcRegion {
    pub const EMPTY: Self = Self {
        destination: 0,
        source: 0,
        size: 0,
        crc: Checksum::Value(0),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareInfoBlock {
    pub mark: [u8; 8],
    pub version: [u8; 8],
    /// Base address of the user PRAM image.
    pub base_fw: u32,
    pub status_update: u32,
    /// Verify `crc` and the region CRCs when set.
    pub check_crc: bool,
    pub crc: Checksum,
    pub regions: [CrcRegion; FirmwareInfoBlock::MAX_REGIONS],
}

impl FirmwareInfoBlock {
    pub const MAX_REGIONS: usize = 8;

    /// Block loading the image at `base_fw`, no CRC check.
    pub const fn new(base_fw: u32) -> Self {
        Self {
            mark: [0; 8],
            version: [0; 8],
            base_fw,
            status_update: 0,
            check_crc: false,
            crc: Checksum::Pending,
            regions: [CrcRegion::EMPTY; Self::MAX_REGIONS],
        }
    }

    /// Offset of region `index`'s checksum inside the block.
    pub const fn region_crc_offset(index: usize) -> usize {
        REGIONS_OFFSET + index * REGION_SIZE + 0x0C
    }

    pub const fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut w = Writer::<BLOCK_SIZE>::new();
        w.bytes(0x00, &self.mark);
        w.bytes(0x08, &self.version);
        w.u32(0x10, self.base_fw);
        w.u32(0x14, self.status_update);
        w.u32(0x18, self.check_crc as u32);
        w.u32(0x1C, self.crc.raw());

        let mut i = 0;
        while i < Self::MAX_REGIONS {
            let r = &self.regions[i];
            let at = REGIONS_OFFSET + i * REGION_SIZE;
            w.u32(at, r.destination);
            w.u32(at + 0x4, r.source);
            w.u32(at + 0x8, r.size);
            w.u32(at + 0xC, r.crc.raw());
            i += 1;
        }
        w.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != BLOCK_SIZE {
            return Err(DecodeError::Length { len: bytes.len() });
        }
        let r = Reader::new(bytes);

        Ok(Self {
            mark: r.array(0x00),
            version: r.array(0x08),
            base_fw: r.u32(0x10),
            status_update: r.u32(0x14),
            check_crc: r.u32(0x18) != 0,
            crc: Checksum::from_raw(r.u32(0x1C)),
            regions: core::array::from_fn(|i| {
                let at = REGIONS_OFFSET + i * REGION_SIZE;
                CrcRegion {
                    destination: r.u32(at),
                    source: r.u32(at + 0x4),
                    size: r.u32(at + 0x8),
                    crc: Checksum::from_raw(r.u32(at + 0xC)),
                }
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let mut block = FirmwareInfoBlock::new(0x6001_0000);
        block.mark = *b"SNXFWINF";
        block.version = *b"1.0.3\0\0\0";
        block.check_crc = true;
        block.regions[1] = CrcRegion {
            destination: 0x1800_0000,
            source: 0x6003_0000,
            size: 0x2000,
            crc: Checksum::Pending,
        };
        let image = block.encode();

        assert_eq!(&image[..8], b"SNXFWINF");
        assert_eq!(&image[8..13], b"1.0.3");
        assert_eq!(image[0x10..0x14], 0x6001_0000u32.to_le_bytes());
        assert_eq!(image[0x18..0x1C], 1u32.to_le_bytes());
        assert_eq!(image[0x1C..0x20], [0xFF; 4]);
        assert!(image[0x20..0x30].iter().all(|&b| b == 0));
        assert_eq!(image[0x30..0x34], 0x1800_0000u32.to_le_bytes());
        assert_eq!(image[0x38..0x3C], 0x2000u32.to_le_bytes());
        let crc = FirmwareInfoBlock::region_crc_offset(1);
        assert_eq!(crc, 0x3C);
        assert_eq!(image[crc..crc + 4], [0xFF; 4]);
        assert!(image[0xA0..].iter().all(|&b| b == 0));

        assert_eq!(FirmwareInfoBlock::decode(&image), Ok(block));
    }

    #[test]
    fn decode_rejects_short_block() {
        assert_eq!(
            FirmwareInfoBlock::decode(&[0; 16]),
            Err(DecodeError::Length { len: 16 })
        );
    }
}
