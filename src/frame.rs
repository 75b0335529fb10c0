use crate::{
    consts::{commands, tokens},
    crc::{crc16, crc7},
};

/// Start bit and transmission bit of the first frame byte.
const CMD_BASE: u8 = 0x40;
/// Command index mask.
const CMD_INDEX_MASK: u8 = 0x3F;
/// CRC placeholder with the end bit, cards ignore CRCs in SPI mode.
const DUMMY_CRC: u8 = 0x01;

/// Command frame: `01` + index, 32-bit argument, CRC7 + end bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct CommandFrame {
    cmd: u8,
    arg: u32,
}

impl CommandFrame {
    /// Frame size in bytes.
    pub const LEN: usize = 6;

    /// Creates a frame, `cmd` may carry [`commands::ACMD_FLAG`].
    pub fn new(cmd: u8, arg: u32) -> Self {
        CommandFrame { cmd, arg }
    }

    /// Command index without the application command flag.
    pub fn index(&self) -> u8 {
        self.cmd & CMD_INDEX_MASK
    }

    pub fn arg(&self) -> u32 {
        self.arg
    }

    /// Must be preceded by APP_CMD.
    pub fn is_app_command(&self) -> bool {
        (self.cmd & commands::ACMD_FLAG) != 0
    }

    /// Wire bytes of the frame.
    ///
    /// GO_IDLE_STATE and SEND_IF_COND are checked before the card enters SPI
    /// mode, so they carry a real CRC.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let arg = self.arg.to_be_bytes();
        let mut buf = [CMD_BASE | self.index(), arg[0], arg[1], arg[2], arg[3], 0];

        buf[Self::LEN - 1] = match self.index() {
            commands::CMD0 | commands::CMD8 => (crc7(&buf[..Self::LEN - 1]) << 1) | 0x01,
            _ => DUMMY_CRC,
        };

        buf
    }
}

/// Data frame codec: token, payload, 2-byte CRC.
///
/// The CRC is framing only unless `check_crc` is requested: received CRCs are
/// discarded and `0xFFFF` is sent, payload integrity is the caller's concern.
pub struct DataFrame;

impl DataFrame {
    /// Trailing CRC size in bytes.
    pub const CRC_LEN: usize = 2;

    /// Token starts a block that is read from the card.
    pub fn is_read_start(token: u8) -> bool {
        token == tokens::DATA_START_BLOCK
    }

    #[cfg(feature = "write")]
    /// Token ends a multiple block write, no payload follows.
    pub fn is_stop(token: u8) -> bool {
        token == tokens::STOP_TRAN
    }

    #[cfg(feature = "write")]
    /// CRC bytes sent after `payload`.
    pub fn trailer(payload: &[u8], check_crc: bool) -> [u8; Self::CRC_LEN] {
        if check_crc {
            crc16(payload).to_be_bytes()
        } else {
            [tokens::AVAILABLE; Self::CRC_LEN]
        }
    }

    /// Checks the received CRC, returns `(card, host)` on mismatch.
    pub fn verify(
        payload: &[u8],
        trailer: [u8; Self::CRC_LEN],
        check_crc: bool,
    ) -> Result<(), (u16, u16)> {
        if !check_crc {
            return Ok(());
        }

        let card_crc = u16::from_be_bytes(trailer);
        let host_crc = crc16(payload);

        if card_crc != host_crc {
            Err((card_crc, host_crc))
        } else {
            Ok(())
        }
    }

    #[cfg(feature = "write")]
    /// Data response after a written block says accepted.
    pub fn is_accepted(response: u8) -> bool {
        (response & tokens::DATA_RES_MASK) == tokens::DATA_RES_ACCEPTED
    }
}
