use crate::consts::{BLOCK_SIZE, BLOCK_SIZE_U64};

use bitfield::bitfield;
use size::{consts::KiB, Size};

/// Card Specific Data block.
pub type CsdData = [u8; 16];

/// SD status block.
pub type SdStatusData = [u8; 64];

bitfield! {
    /// Card Specific Data, version 1 (SDSC and MMC).
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct CsdV1(u128);
    pub u8, version, _: 127, 126;
    pub u8, data_read_access_time1, _: 119, 112;
    pub u8, data_read_access_time2, _: 111, 104;
    pub u8, max_data_transfer_rate, _: 103, 96;
    pub u16, card_command_classes, _: 95, 84;
    pub u8, read_block_length, _: 83, 80;
    pub read_partial_blocks, _: 79;
    pub write_block_misalignment, _: 78;
    pub read_block_misalignment, _: 77;
    pub dsr_implemented, _: 76;
    pub u16, device_size, _: 73, 62;
    pub u8, device_size_multiplier, _: 49, 47;
    pub erase_single_block_enabled, _: 46;
    pub u8, erase_sector_size, _: 45, 39;
    pub u8, mmc_erase_group_size, _: 46, 42;
    pub u8, mmc_erase_group_multiplier, _: 41, 37;
    pub u8, write_protect_group_size, _: 38, 32;
    pub write_protect_group_enable, _: 31;
    pub u8, write_speed_factor, _: 28, 26;
    pub u8, max_write_data_length, _: 25, 22;
    pub permanent_write_protection, _: 13;
    pub temporary_write_protection, _: 12;
    pub u8, crc, _: 7, 1;
}

bitfield! {
    /// Card Specific Data, version 2 (SDHC/SDXC).
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct CsdV2(u128);
    pub u8, version, _: 127, 126;
    pub u8, max_data_transfer_rate, _: 103, 96;
    pub u16, card_command_classes, _: 95, 84;
    pub u8, read_block_length, _: 83, 80;
    pub u32, device_size, _: 69, 48;
    pub erase_single_block_enabled, _: 46;
    pub u8, erase_sector_size, _: 45, 39;
    pub u8, max_write_data_length, _: 25, 22;
    pub permanent_write_protection, _: 13;
    pub temporary_write_protection, _: 12;
    pub u8, crc, _: 7, 1;
}

/// Card Specific Data, generic container.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Csd {
    V1(CsdV1),
    V2(CsdV2),
}

/// Represents capacity provider.
pub trait CapacityProvider {
    /// Returns the card capacity in bytes.
    fn card_capacity(&self) -> Size;

    /// Returns the card capacity in 512-byte blocks.
    fn card_capacity_blocks(&self) -> u64;
}

impl From<CsdData> for CsdV1 {
    fn from(csd_data: CsdData) -> Self {
        CsdV1(u128::from_be_bytes(csd_data))
    }
}

impl From<CsdData> for CsdV2 {
    fn from(csd_data: CsdData) -> Self {
        CsdV2(u128::from_be_bytes(csd_data))
    }
}

impl From<CsdData> for Csd {
    /// Picks the layout from the CSD_STRUCTURE field.
    fn from(csd_data: CsdData) -> Self {
        match csd_data[0] >> 6 {
            1 => Csd::V2(CsdV2::from(csd_data)),
            _ => Csd::V1(CsdV1::from(csd_data)),
        }
    }
}

impl CapacityProvider for CsdV1 {
    fn card_capacity(&self) -> Size {
        Size::from_bytes(self.card_capacity_blocks() * BLOCK_SIZE_U64)
    }

    fn card_capacity_blocks(&self) -> u64 {
        let shift = u32::from(self.device_size_multiplier()) + u32::from(self.read_block_length());
        // READ_BL_LEN is at least 9 on any card that passed CMD16(512).
        (u64::from(self.device_size()) + 1) << shift.saturating_sub(7)
    }
}

impl CapacityProvider for CsdV2 {
    fn card_capacity(&self) -> Size {
        Size::from_bytes(self.card_capacity_blocks() * BLOCK_SIZE_U64)
    }

    fn card_capacity_blocks(&self) -> u64 {
        (u64::from(self.device_size()) + 1) * (KiB as u64)
    }
}

impl CapacityProvider for Csd {
    fn card_capacity(&self) -> Size {
        match self {
            Csd::V1(csd) => csd.card_capacity(),
            Csd::V2(csd) => csd.card_capacity(),
        }
    }

    fn card_capacity_blocks(&self) -> u64 {
        match self {
            Csd::V1(csd) => csd.card_capacity_blocks(),
            Csd::V2(csd) => csd.card_capacity_blocks(),
        }
    }
}

impl Csd {
    /// Single blocks can be erased, required for trim.
    pub fn erase_single_block_enabled(&self) -> bool {
        match self {
            Csd::V1(csd) => csd.erase_single_block_enabled(),
            Csd::V2(csd) => csd.erase_single_block_enabled(),
        }
    }

    /// Sector count clamped to the 32-bit LBA range of the disk layer.
    pub fn sector_count(&self) -> u32 {
        u32::try_from(self.card_capacity_blocks()).unwrap_or(u32::MAX)
    }
}

impl CsdV1 {
    /// Erase sector size of an SDSC card, in sectors.
    pub fn sd_erase_block_size(&self) -> u32 {
        let write_block_length = u32::from(self.max_write_data_length());
        (u32::from(self.erase_sector_size()) + 1) << write_block_length.saturating_sub(9)
    }

    /// Erase group size of an MMC card, in sectors.
    pub fn mmc_erase_block_size(&self) -> u32 {
        (u32::from(self.mmc_erase_group_size()) + 1)
            * (u32::from(self.mmc_erase_group_multiplier()) + 1)
    }
}

/// SD status block returned by SD_STATUS.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SdStatus(pub SdStatusData);

impl SdStatus {
    /// Allocation unit size code.
    pub fn au_size(&self) -> u8 {
        self.0[10] >> 4
    }

    /// Erase block size in sectors, one allocation unit.
    pub fn erase_block_size(&self) -> u32 {
        16 << self.au_size()
    }
}

/// Card geometry as seen by the disk layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct CardGeometry {
    /// Count of 512-byte sectors.
    pub sector_count: u32,
    /// Sector size in bytes.
    pub sector_size: usize,
}

impl CardGeometry {
    /// Total capacity.
    pub fn capacity(&self) -> Size {
        Size::from_bytes(u64::from(self.sector_count) * BLOCK_SIZE_U64)
    }
}

impl From<&Csd> for CardGeometry {
    fn from(csd: &Csd) -> Self {
        CardGeometry {
            sector_count: csd.sector_count(),
            sector_size: BLOCK_SIZE,
        }
    }
}
