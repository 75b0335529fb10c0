/// Size of a sector in bytes.
pub const BLOCK_SIZE: usize = 512;
/// [`BLOCK_SIZE`] as `u32`.
pub const BLOCK_SIZE_U32: u32 = BLOCK_SIZE as u32;
/// [`BLOCK_SIZE`] as `u64`.
pub const BLOCK_SIZE_U64: u64 = BLOCK_SIZE as u64;

pub mod commands {
    /// ACMD flag, the command must be prefixed by APP_CMD.
    pub const ACMD_FLAG: u8 = 0x80;
    /// GO_IDLE_STATE - init card in spi mode if CS low.
    pub const CMD0: u8 = 0;
    /// SEND_OP_COND - start initialization (MMC).
    pub const CMD1: u8 = 1;
    /// SEND_IF_COND - verify SD Memory Card interface operating condition.
    pub const CMD8: u8 = 8;
    /// SEND_CSD - read the Card Specific Data (CSD register).
    pub const CMD9: u8 = 9;
    /// SEND_CID - read the Card Identification register.
    pub const CMD10: u8 = 10;
    /// STOP_TRANSMISSION - end multiple block read sequence.
    pub const CMD12: u8 = 12;
    /// SD_STATUS - read the 64-byte SD status block (SDC).
    pub const ACMD13: u8 = ACMD_FLAG + 13;
    /// SET_BLOCKLEN - set the block length for byte addressed cards.
    pub const CMD16: u8 = 16;
    /// READ_SINGLE_BLOCK - read a single data block from the card.
    pub const CMD17: u8 = 17;
    /// READ_MULTIPLE_BLOCK - read a multiple data blocks from the card.
    pub const CMD18: u8 = 18;
    /// SET_WR_BLK_ERASE_COUNT - pre-erase hint before a multiple block write (SDC).
    #[cfg(feature = "write")]
    pub const ACMD23: u8 = ACMD_FLAG + 23;
    /// WRITE_BLOCK - write a single data block to the card.
    #[cfg(feature = "write")]
    pub const CMD24: u8 = 24;
    /// WRITE_MULTIPLE_BLOCK - write blocks of data until a STOP_TRANSMISSION.
    #[cfg(feature = "write")]
    pub const CMD25: u8 = 25;
    /// ERASE_WR_BLK_START - first block of the erase range.
    #[cfg(feature = "trim")]
    pub const CMD32: u8 = 32;
    /// ERASE_WR_BLK_END - last block of the erase range.
    #[cfg(feature = "trim")]
    pub const CMD33: u8 = 33;
    /// ERASE - erase the selected range.
    #[cfg(feature = "trim")]
    pub const CMD38: u8 = 38;
    /// SD_SEND_OP_COND - Sends host capacity support information and activates
    /// the card's initialization process.
    pub const ACMD41: u8 = ACMD_FLAG + 41;
    /// APP_CMD - escape for application specific command.
    pub const CMD55: u8 = 55;
    /// READ_OCR - read the OCR register of a card.
    pub const CMD58: u8 = 58;
}

pub mod args {
    /// SEND_IF_COND argument: 2.7-3.6V window and 0xAA check pattern.
    pub const IF_COND: u32 = 0x0000_01AA;
    /// SD_SEND_OP_COND argument with the high capacity support bit.
    pub const HCS: u32 = 1 << 30;
}

pub mod tokens {
    /// Value clocked out while receiving, and returned by an idle card.
    pub const AVAILABLE: u8 = 0xFF;
    /// Start data token for read or write single block, and read multiple blocks.
    pub const DATA_START_BLOCK: u8 = 0xFE;
    /// Stop token for write multiple blocks.
    #[cfg(feature = "write")]
    pub const STOP_TRAN: u8 = 0xFD;
    /// Start data token for write multiple blocks.
    #[cfg(feature = "write")]
    pub const WRITE_MULTIPLE: u8 = 0xFC;
    /// Mask for data response tokens after a write block operation.
    #[cfg(feature = "write")]
    pub const DATA_RES_MASK: u8 = 0x1F;
    /// Write data accepted token.
    #[cfg(feature = "write")]
    pub const DATA_RES_ACCEPTED: u8 = 0x05;
}
