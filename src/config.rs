/// Represents config for [`SdMmcSpi`](crate::SdMmcSpi).
///
/// Timeouts are expressed in milliseconds and measured with the session
/// countdowns, so they only elapse while the host keeps calling
/// [`CardSession::on_tick`](crate::CardSession::on_tick).
pub trait SdMmcSpiConfig {
    /// Count of `0xFF` bytes clocked with the card deselected before reset.
    const INIT_DUMMY_BYTES: usize;
    /// Max bytes polled for the R1 response of a command.
    const READ_R1_ATTEMPTS: usize;
    /// Delay before talking to a freshly powered card.
    const POWER_UP_DELAY_MS: u16;
    /// Time the card is given to leave the idle state.
    const INIT_TIMEOUT_MS: u16;
    /// Time the card is given to release the busy signal.
    const READY_TIMEOUT_MS: u16;
    /// Time the card is given to send a data token.
    const DATA_TOKEN_TIMEOUT_MS: u16;
    /// Time the card is given to finish an erase.
    const ERASE_TIMEOUT_MS: u16;
    /// Verify the CRC16 of received blocks and send real CRCs with written ones.
    const CHECK_DATA_CRC: bool;
}

/// Default implementation of [`SdMmcSpiConfig`](crate::SdMmcSpiConfig).
pub struct DefaultSdMmcSpiConfig;

impl SdMmcSpiConfig for DefaultSdMmcSpiConfig {
    const INIT_DUMMY_BYTES: usize = 10;
    const READ_R1_ATTEMPTS: usize = 10;
    const POWER_UP_DELAY_MS: u16 = 10;
    const INIT_TIMEOUT_MS: u16 = 1000;
    const READY_TIMEOUT_MS: u16 = 500;
    const DATA_TOKEN_TIMEOUT_MS: u16 = 100;
    const ERASE_TIMEOUT_MS: u16 = 60000;
    const CHECK_DATA_CRC: bool = false;
}
