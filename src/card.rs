use crate::consts::BLOCK_SIZE_U64;

use bitflags::bitflags;
use diskio::Lba;

bitflags! {
    /// Card type flags, as reported by [`IoctlCmd::GetCardType`](crate::IoctlCmd::GetCardType).
    #[derive(Default)]
    #[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
    pub struct CardTypeFlags: u8 {
        /// MMC ver 3.
        const MMC3 = 0x01;
        /// MMC ver 4+.
        const MMC4 = 0x02;
        /// Any MMC.
        const MMC = Self::MMC3.bits | Self::MMC4.bits;
        /// SD ver 1.
        const SDC1 = 0x04;
        /// SD ver 2+.
        const SDC2 = 0x08;
        /// Any SD.
        const SDC = Self::SDC1.bits | Self::SDC2.bits;
        /// Block addressing.
        const BLOCK = 0x10;
    }
}

/// Card type, the outcome of the initialization sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum CardType {
    /// No card initialized.
    Unknown,
    /// SD ver 1, byte addressed.
    SD1,
    /// SD ver 2, byte addressed.
    SD2,
    /// SD ver 2 high capacity, block addressed.
    SDHC,
    /// MMC ver 3, byte addressed.
    MMC3,
}

impl CardType {
    /// Type flags of the card.
    pub fn flags(self) -> CardTypeFlags {
        match self {
            CardType::Unknown => CardTypeFlags::empty(),
            CardType::SD1 => CardTypeFlags::SDC1,
            CardType::SD2 => CardTypeFlags::SDC2,
            CardType::SDHC => CardTypeFlags::SDC2 | CardTypeFlags::BLOCK,
            CardType::MMC3 => CardTypeFlags::MMC3,
        }
    }

    /// Commands take a block index instead of a byte offset.
    pub fn is_block_addressed(self) -> bool {
        self.flags().contains(CardTypeFlags::BLOCK)
    }

    /// SD family, which understands application commands.
    pub fn is_sd(self) -> bool {
        self.flags().intersects(CardTypeFlags::SDC)
    }

    /// Converts a sector index to a command argument.
    ///
    /// Byte addressed cards take the byte offset, an address that doesn't fit
    /// the 32-bit argument yields `None`.
    pub fn sector_address(self, sector: Lba) -> Option<u32> {
        let address = if self.is_block_addressed() {
            sector
        } else {
            sector.checked_mul(BLOCK_SIZE_U64)?
        };

        u32::try_from(address).ok()
    }
}

impl From<CardTypeFlags> for CardType {
    fn from(flags: CardTypeFlags) -> Self {
        if flags.contains(CardTypeFlags::SDC2 | CardTypeFlags::BLOCK) {
            CardType::SDHC
        } else if flags.contains(CardTypeFlags::SDC2) {
            CardType::SD2
        } else if flags.contains(CardTypeFlags::SDC1) {
            CardType::SD1
        } else if flags.contains(CardTypeFlags::MMC3) {
            CardType::MMC3
        } else {
            CardType::Unknown
        }
    }
}

impl Default for CardType {
    fn default() -> Self {
        CardType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_addressed_cards_take_byte_offsets() {
        for card_type in [CardType::SD1, CardType::SD2, CardType::MMC3] {
            assert_eq!(card_type.sector_address(100), Some(51200));
            assert_eq!(card_type.sector_address(0), Some(0));
        }
    }

    #[test]
    fn block_addressed_cards_take_sectors() {
        assert_eq!(CardType::SDHC.sector_address(100), Some(100));
        assert_eq!(CardType::SDHC.sector_address(0xFFFF_FFFF), Some(u32::MAX));
        assert_eq!(CardType::SDHC.sector_address(0x1_0000_0000), None);
    }

    #[test]
    fn byte_address_overflow() {
        assert_eq!(CardType::SD2.sector_address(0x0080_0000), None);
        assert_eq!(CardType::SD2.sector_address(0x007F_FFFF), Some(0xFFFF_FE00));
    }

    #[test]
    fn flags_round_trip() {
        for card_type in [
            CardType::Unknown,
            CardType::SD1,
            CardType::SD2,
            CardType::SDHC,
            CardType::MMC3,
        ] {
            assert_eq!(CardType::from(card_type.flags()), card_type);
        }
    }

    #[test]
    fn families() {
        assert!(CardType::SD1.is_sd());
        assert!(CardType::SDHC.is_sd());
        assert!(!CardType::MMC3.is_sd());
        assert!(!CardType::Unknown.is_sd());
        assert_eq!(CardType::SDHC.flags().bits(), 0x18);
    }
}
