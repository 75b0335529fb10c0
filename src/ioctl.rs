use crate::{
    card::CardTypeFlags,
    csd::{CsdData, SdStatusData},
    response::R3OcrPayload,
};

/// Card identification register.
pub type CidData = [u8; 16];

/// Card specific control operations, beyond [`diskio::IoctlCmd`].
#[derive(Debug, PartialEq, Eq)]
pub enum MmcIoctlCmd<'a> {
    /// Get card type flags.
    GetCardType(&'a mut CardTypeFlags),
    /// Receive the raw CSD.
    GetCsd(&'a mut CsdData),
    /// Receive the raw CID.
    GetCid(&'a mut CidData),
    /// Receive the raw OCR.
    GetOcr(&'a mut R3OcrPayload),
    /// Receive the raw SD status.
    GetSdStatus(&'a mut SdStatusData),
}

/// Numeric ioctl codes of the raw disk interface.
pub mod codes {
    pub const CTRL_SYNC: u8 = 0;
    pub const GET_SECTOR_COUNT: u8 = 1;
    pub const GET_SECTOR_SIZE: u8 = 2;
    pub const GET_BLOCK_SIZE: u8 = 3;
    pub const CTRL_TRIM: u8 = 4;
    pub const MMC_GET_TYPE: u8 = 10;
    pub const MMC_GET_CSD: u8 = 11;
    pub const MMC_GET_CID: u8 = 12;
    pub const MMC_GET_OCR: u8 = 13;
    pub const MMC_GET_SDSTAT: u8 = 14;
}
