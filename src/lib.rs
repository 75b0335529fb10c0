//! SD/MMC Library written in Embedded Rust, that inspired by [embedded-sdmmc](https://crates.io/crates/embedded-sdmmc).
//!
//! This crate is intended to allow you to init/read/write SD/MMC devices by SPI bus
//! and to hand them to a filesystem as a 512-byte sector [`DiskioDevice`].
//!
//! All timeouts are counted by a [`CardSession`], whose
//! [`on_tick`](CardSession::on_tick) (or [`CardMonitor::on_tick`]) must be
//! called every millisecond, typically from a timer interrupt, while the
//! driver busy-waits on the bus.
//!
//! ## Features
//!
//! * `log` (default): log messages over the `log` facade.
//! * `defmt-log`: log messages over defmt instead, turn off the default
//! features to use it. Make sure that either `log` or `defmt-log` is enabled.
//! * `write` (default): write support, writes fail with
//! [`DiskioError::NotSupported`] without it.
//! * `trim` (default): [`IoctlCmd::CtrlTrim`], answered with
//! [`DiskioError::NotSupported`] without it.

#![cfg_attr(not(test), no_std)]

mod card;
mod config;
mod consts;
mod crc;
mod csd;
mod disk;
mod frame;
mod ioctl;
mod media;
mod response;
mod session;
mod timer;

pub use crate::card::{CardType, CardTypeFlags};
pub use crate::config::{DefaultSdMmcSpiConfig, SdMmcSpiConfig};
pub use crate::consts::BLOCK_SIZE;
pub use crate::csd::{
    CapacityProvider, CardGeometry, Csd, CsdData, CsdV1, CsdV2, SdStatus, SdStatusData,
};
pub use crate::disk::{DiskResult, DiskioDeviceExt, ErrorKind, ErrorKindProvider};
pub use crate::ioctl::{codes as ioctl_codes, CidData, MmcIoctlCmd};
pub use crate::media::Media;
pub use crate::response::{IfCond, Ocr, R1Response, R3OcrPayload};
pub use crate::session::{CardMonitor, CardSession, DiskStatus};
pub use crate::timer::{Clock, Countdown};
pub use diskio::{
    BlockSize, DataArea, DiskioDevice, Error as DiskioError, IoctlCmd, Lba, SectorSize, Status,
    StatusFlag,
};

use crate::{
    consts::{args, commands, tokens, BLOCK_SIZE_U32},
    frame::{CommandFrame, DataFrame},
};

use core::{cell::RefCell, marker::PhantomData};
use embedded_hal::blocking::spi::Transfer;
use switch_hal::OutputSwitch;

#[cfg(feature = "defmt-log")]
use defmt::{debug, error, info, trace, warn};
#[cfg(feature = "log")]
use log::{debug, error, info, trace, warn};

/// [`SdMmcSpi`] result error.
///
/// `T` - transport error type.
/// `S` - select switch type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<T, S> {
    /// Error from the SPI peripheral.
    Transport(T),
    /// Couldn't set a select.
    SelectError(S),
    /// No response when waiting for the card to not be busy.
    TimeoutWaitAvailable,
    /// No response when executing this command.
    TimeoutCommand(u8),
    /// No data token when reading data from the card.
    TimeoutReadBuffer,
    /// The card didn't leave the idle state in time.
    TimeoutInitialize,
    /// Command rejected, with the response.
    ErrorCommand(u8, R1Response),
    /// The card doesn't accept the host voltage window.
    UnsupportedVoltage,
    /// Unexpected data token.
    BadToken(u8),
    /// Written block not accepted, with the data response.
    WriteError(u8),
    /// CRC mismatch (card, host).
    CrcError(u16, u16),
    /// Multiple block transfer stopped early.
    Incomplete { transferred: u32 },
}

impl<T, S> ErrorKindProvider for Error<T, S> {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) | Error::SelectError(_) => ErrorKind::Transmit,
            Error::TimeoutWaitAvailable
            | Error::TimeoutCommand(_)
            | Error::TimeoutReadBuffer
            | Error::TimeoutInitialize => ErrorKind::Timeout,
            Error::ErrorCommand(..)
            | Error::UnsupportedVoltage
            | Error::BadToken(_)
            | Error::WriteError(_)
            | Error::CrcError(..)
            | Error::Incomplete { .. } => ErrorKind::Protocol,
        }
    }
}

/// Error type alias.
type ErrorFor<T> = <T as DiskioDevice>::HardwareError;

/// Disk IO error type alias.
type DiskioErrorFor<T> = DiskioError<ErrorFor<T>>;

/// SD Card SPI driver.
///
/// `Spi` - SPI.
/// `Cs` - Chip select output switch.
/// `Config` - Config implementation of driver config trait.
///
/// One operation runs at a time; the chip select state is held across the
/// steps of a transaction.
pub struct SdMmcSpi<'s, Spi: Transfer<u8>, Cs: OutputSwitch, Config: SdMmcSpiConfig> {
    spi: RefCell<Spi>,
    cs: RefCell<Cs>,
    session: &'s CardSession,
    config: PhantomData<Config>,
}

impl<'s, Spi: Transfer<u8>, Cs: OutputSwitch, Config: SdMmcSpiConfig>
    SdMmcSpi<'s, Spi, Cs, Config>
where
    Spi::Error: core::fmt::Debug,
    Cs::Error: core::fmt::Debug,
{
    /// Creates a new [`SdMmcSpi<Spi, Cs, Config>`].
    ///
    /// `spi` - SPI instance.
    /// `cs` - chip select output switch.
    /// `session` - card session ticked by the host.
    pub fn new(spi: Spi, cs: Cs, session: &'s CardSession) -> Self {
        SdMmcSpi {
            spi: RefCell::new(spi),
            cs: RefCell::new(cs),
            session,
            config: PhantomData::<Config>,
        }
    }

    /// Releases the SPI and the chip select.
    pub fn free(self) -> (Spi, Cs) {
        (self.spi.into_inner(), self.cs.into_inner())
    }

    /// Card session.
    pub fn session(&self) -> &'s CardSession {
        self.session
    }

    /// Type of the initialized card.
    pub fn card_type(&self) -> CardType {
        self.session.card_type()
    }

    /// Runs the initialization sequence and reports the detected card type.
    ///
    /// May be called again at any time, the sequence restarts from the
    /// power-up clocks.
    pub fn try_initialize(&mut self) -> Result<CardType, DiskioErrorFor<Self>> {
        if self.session.status().contains(DiskStatus::NO_MEDIA) {
            warn!("SD initialize skipped, no card in the socket");
            return Err(DiskioError::NotInitialized);
        }

        self.init().map_err(DiskioError::Hardware)
    }

    /// Reads and decodes the Card Specific Data register.
    pub fn read_csd(&self) -> Result<Csd, DiskioErrorFor<Self>> {
        self.validate_initialized()?;

        let mut csd_data: CsdData = Default::default();
        self.cs_scope(|s| s.read_register(commands::CMD9, &mut csd_data))
            .map_err(DiskioError::Hardware)?;

        Ok(Csd::from(csd_data))
    }

    /// Card geometry computed from a fresh CSD.
    pub fn geometry(&self) -> Result<CardGeometry, DiskioErrorFor<Self>> {
        let geometry = CardGeometry::from(&self.read_csd()?);
        debug!(
            "SD geometry: {} sectors, {} bytes",
            geometry.sector_count,
            geometry.capacity().bytes()
        );

        Ok(geometry)
    }

    /// Validate buffer for read/write, returns the count of blocks.
    fn validate_buffer_len(buf_len: usize) -> Result<u32, DiskioErrorFor<Self>> {
        let count = u32::try_from(buf_len / BLOCK_SIZE).ok();

        match count {
            Some(count) if count != 0 && buf_len % BLOCK_SIZE == 0 => Ok(count),
            _ => {
                error!(
                    "SD invalid buffer, length: {}, block size: {}",
                    buf_len, BLOCK_SIZE
                );
                Err(DiskioError::InvalidArgument)
            }
        }
    }

    /// Validate initialized.
    fn validate_initialized(&self) -> Result<(), DiskioErrorFor<Self>> {
        if self.session.is_ready() {
            Ok(())
        } else {
            Err(DiskioError::NotInitialized)
        }
    }

    /// Convert lba.
    fn convert_lba(&self, lba: Lba) -> Result<u32, DiskioErrorFor<Self>> {
        self.card_type()
            .sector_address(lba)
            .ok_or(DiskioError::InvalidArgument)
    }

    /// Activate chip select and wait until the card is ready.
    fn select(&self) -> Result<(), ErrorFor<Self>> {
        self.cs.borrow_mut().on().map_err(Error::SelectError)?;
        // Dummy clock, forces DO enabled.
        self.skip_byte()?;

        if self.wait_ready(Config::READY_TIMEOUT_MS)? {
            return Ok(());
        }

        self.deselect()?;
        Err(Error::TimeoutWaitAvailable)
    }

    /// Deactivate chip select.
    fn deselect(&self) -> Result<(), ErrorFor<Self>> {
        self.cs.borrow_mut().off().map_err(Error::SelectError)?;
        // Dummy clock, releases DO for other devices on the bus.
        self.skip_byte()
    }

    /// CS scope, the card is deselected when `f` returns.
    fn cs_scope<F, R>(&self, f: F) -> Result<R, ErrorFor<Self>>
    where
        F: FnOnce(&Self) -> Result<R, ErrorFor<Self>>,
    {
        let result = f(self);
        self.deselect()?;

        result
    }

    /// Send one byte and receive one byte.
    fn transfer(&self, data: u8) -> Result<u8, ErrorFor<Self>> {
        self.spi
            .borrow_mut()
            .transfer(&mut [data])
            .map(|b| b[0])
            .map_err(Error::Transport)
    }

    /// Receive a byte from the SD card by clocking in an 0xFF byte.
    fn receive(&self) -> Result<u8, ErrorFor<Self>> {
        self.transfer(tokens::AVAILABLE)
    }

    /// Send a byte to the SD card.
    fn send(&self, data: u8) -> Result<(), ErrorFor<Self>> {
        self.transfer(data).map(|_| ())
    }

    /// Receive a slice from the SD card.
    fn receive_slice(&self, data: &mut [u8]) -> Result<(), ErrorFor<Self>> {
        for byte in data.iter_mut() {
            *byte = self.receive()?;
        }

        Ok(())
    }

    /// Send a slice to the SD card.
    fn send_slice(&self, data: &[u8]) -> Result<(), ErrorFor<Self>> {
        for byte in data.iter() {
            self.send(*byte)?;
        }

        Ok(())
    }

    /// Skip byte.
    fn skip_byte(&self) -> Result<(), ErrorFor<Self>> {
        self.receive().map(|_| ())
    }

    /// Skip bytes.
    fn skip_bytes(&self, count: usize) -> Result<(), ErrorFor<Self>> {
        for _ in 0..count {
            self.skip_byte()?;
        }

        Ok(())
    }

    /// Wait until the card releases the busy signal, `false` on timeout.
    fn wait_ready(&self, timeout_ms: u16) -> Result<bool, ErrorFor<Self>> {
        let timer = self.session.timer_b();
        timer.arm(timeout_ms);

        loop {
            if self.receive()? == tokens::AVAILABLE {
                return Ok(true);
            }
            if timer.expired() {
                return Ok(false);
            }
        }
    }

    /// Wait available state of card.
    #[cfg(feature = "write")]
    fn wait_available_state(&self) -> Result<(), ErrorFor<Self>> {
        if self.wait_ready(Config::READY_TIMEOUT_MS)? {
            Ok(())
        } else {
            Err(Error::TimeoutWaitAvailable)
        }
    }

    /// Send command implementation.
    fn send_command_impl(&self, frame: CommandFrame) -> Result<R1Response, ErrorFor<Self>> {
        let cmd = frame.index();

        // Stop transmission interrupts a running read, the card is selected
        // and streaming data.
        if cmd != commands::CMD12 {
            self.deselect()?;
            self.select()?;
        }

        self.send_slice(&frame.to_bytes())?;

        if cmd == commands::CMD12 {
            self.skip_byte()?;
        }

        for _ in 0..Config::READ_R1_ATTEMPTS {
            let r1 = R1Response(self.receive()?);

            if r1.is_valid() {
                trace!("CMD{}({:08X}) -> {:02X}", cmd, frame.arg(), r1.0);
                return Ok(r1);
            }
        }

        Err(Error::TimeoutCommand(cmd))
    }

    /// Send command, application commands are prefixed by APP_CMD.
    fn send_command(&self, cmd: u8, arg: u32) -> Result<R1Response, ErrorFor<Self>> {
        let frame = CommandFrame::new(cmd, arg);

        if frame.is_app_command() {
            let r1 = self.send_command_impl(CommandFrame::new(commands::CMD55, 0))?;

            if r1.is_error() {
                return Ok(r1);
            }
        }

        self.send_command_impl(frame)
    }

    /// Send command, a missing response reads as an idle bus.
    fn poll_command(&self, cmd: u8, arg: u32) -> Result<R1Response, ErrorFor<Self>> {
        match self.send_command(cmd, arg) {
            Err(Error::TimeoutCommand(_)) | Err(Error::TimeoutWaitAvailable) => {
                Ok(R1Response(tokens::AVAILABLE))
            }
            result => result,
        }
    }

    /// Send command that must be accepted by a ready card.
    fn send_command_ready(&self, cmd: u8, arg: u32) -> Result<(), ErrorFor<Self>> {
        match self.send_command(cmd, arg)? {
            R1Response::READY_STATE => Ok(()),
            r1 => Err(Error::ErrorCommand(cmd, r1)),
        }
    }

    /// Read data.
    ///
    /// The payload is drained after a wrong token as well, so the next
    /// command starts on a byte boundary the card expects.
    fn read_data(&self, data: &mut [u8]) -> Result<(), ErrorFor<Self>> {
        let timer = self.session.timer_a();
        timer.arm(Config::DATA_TOKEN_TIMEOUT_MS);

        let token = loop {
            let token = self.receive()?;

            if token != tokens::AVAILABLE {
                break token;
            }
            if timer.expired() {
                return Err(Error::TimeoutReadBuffer);
            }
        };

        if !DataFrame::is_read_start(token) {
            warn!("Wrong data token: {:02X}", token);
            self.skip_bytes(data.len() + DataFrame::CRC_LEN)?;
            return Err(Error::BadToken(token));
        }

        self.receive_slice(data)?;

        let mut crc = [0; DataFrame::CRC_LEN];
        self.receive_slice(&mut crc)?;

        DataFrame::verify(data, crc, Config::CHECK_DATA_CRC)
            .map_err(|(card_crc, host_crc)| Error::CrcError(card_crc, host_crc))
    }

    /// Write data, a stop token is sent alone.
    #[cfg(feature = "write")]
    fn write_data(&self, token: u8, data: &[u8]) -> Result<(), ErrorFor<Self>> {
        self.wait_available_state()?;
        self.send(token)?;

        if DataFrame::is_stop(token) {
            return Ok(());
        }

        self.send_slice(data)?;
        self.send_slice(&DataFrame::trailer(data, Config::CHECK_DATA_CRC))?;

        let response = self.receive()?;
        if DataFrame::is_accepted(response) {
            Ok(())
        } else {
            Err(Error::WriteError(response))
        }
    }

    /// Read a register sent as a data block.
    fn read_register(&self, cmd: u8, data: &mut [u8]) -> Result<(), ErrorFor<Self>> {
        self.send_command_ready(cmd, 0x0000_0000)?;
        self.read_data(data)
    }

    /// Read the OCR.
    fn read_ocr(&self) -> Result<R3OcrPayload, ErrorFor<Self>> {
        let mut ocr: R3OcrPayload = Default::default();

        self.send_command_ready(commands::CMD58, 0x0000_0000)?;
        self.receive_slice(&mut ocr)?;

        Ok(ocr)
    }

    /// Read the SD status.
    fn read_sd_status(&self, data: &mut SdStatusData) -> Result<(), ErrorFor<Self>> {
        self.send_command_ready(commands::ACMD13, 0x0000_0000)?;
        // Second byte of the R2 response.
        self.skip_byte()?;
        self.read_data(data)
    }

    /// Power up delay and at least 74 clocks with the card deselected.
    fn power_up(&self) -> Result<(), ErrorFor<Self>> {
        self.cs.borrow_mut().off().map_err(Error::SelectError)?;

        let timer = self.session.timer_a();
        timer.arm(Config::POWER_UP_DELAY_MS);
        while !timer.expired() {
            self.skip_byte()?;
        }

        self.skip_bytes(Config::INIT_DUMMY_BYTES)
    }

    /// Enter SD to SPI mode.
    fn enter_spi_mode(&self) -> Result<(), ErrorFor<Self>> {
        info!("Enter to SPI mode for SD");

        match self.send_command(commands::CMD0, 0x0000_0000)? {
            R1Response::IN_IDLE_STATE => Ok(()),
            r1 => {
                warn!("Wrong response from CMD{}: {:02X}", commands::CMD0, r1.0);
                Err(Error::ErrorCommand(commands::CMD0, r1))
            }
        }
    }

    /// Repeat an initialization command until the card leaves the idle state.
    fn wait_initialized(&self, cmd: u8, arg: u32) -> Result<(), ErrorFor<Self>> {
        let timer = self.session.timer_a();

        while !timer.expired() {
            if self.poll_command(cmd, arg)? == R1Response::READY_STATE {
                return Ok(());
            }
        }

        Err(Error::TimeoutInitialize)
    }

    /// Check SD type, the card is in SPI mode and idle.
    fn check_type(&self) -> Result<CardType, ErrorFor<Self>> {
        info!("Checking SD type");

        self.session.timer_a().arm(Config::INIT_TIMEOUT_MS);

        if self.poll_command(commands::CMD8, args::IF_COND)? == R1Response::IN_IDLE_STATE {
            let mut echo: R3OcrPayload = Default::default();
            self.receive_slice(&mut echo)?;

            if !IfCond::from(echo).accepted() {
                return Err(Error::UnsupportedVoltage);
            }

            self.wait_initialized(commands::ACMD41, args::HCS)?;

            let ocr = Ocr::from(self.read_ocr()?);
            if ocr.card_capacity_status() {
                Ok(CardType::SDHC)
            } else {
                Ok(CardType::SD2)
            }
        } else {
            let (card_type, cmd) = if self.poll_command(commands::ACMD41, 0)?.0 <= 1 {
                (CardType::SD1, commands::ACMD41)
            } else {
                (CardType::MMC3, commands::CMD1)
            };
            debug!("Legacy card, trying {:?}", card_type);

            self.wait_initialized(cmd, 0x0000_0000)?;
            self.send_command_ready(commands::CMD16, BLOCK_SIZE_U32)?;

            Ok(card_type)
        }
    }

    /// Initialize SD.
    fn init(&mut self) -> Result<CardType, ErrorFor<Self>> {
        info!("SD initialize started");

        let result = self.power_up().and_then(|_| {
            self.cs_scope(|s| {
                s.enter_spi_mode()?;
                s.check_type()
            })
        });

        match &result {
            Ok(card_type) => {
                self.session.set_initialized(*card_type);
                info!("SD successfully initialized, type: {:?}", card_type);
            }
            Err(err) => {
                self.session.set_uninitialized();
                error!("Failed to initialize SD: {:?}", err.kind());
            }
        }

        result
    }

    /// Erase block size in sectors.
    fn erase_block_size(&self) -> Result<u32, ErrorFor<Self>> {
        match self.card_type() {
            CardType::SD2 | CardType::SDHC => {
                let mut data: SdStatusData = [0; 64];
                self.cs_scope(|s| s.read_sd_status(&mut data))?;

                Ok(SdStatus(data).erase_block_size())
            }
            card_type => {
                let mut csd_data: CsdData = Default::default();
                self.cs_scope(|s| s.read_register(commands::CMD9, &mut csd_data))?;

                let csd = CsdV1::from(csd_data);
                if card_type == CardType::MMC3 {
                    Ok(csd.mmc_erase_block_size())
                } else {
                    Ok(csd.sd_erase_block_size())
                }
            }
        }
    }

    /// Erase an inclusive range of sectors.
    #[cfg(feature = "trim")]
    fn trim(&self, start: Lba, end: Lba) -> Result<(), DiskioErrorFor<Self>> {
        if start > end {
            return Err(DiskioError::InvalidArgument);
        }
        if !self.card_type().is_sd() || !self.read_csd()?.erase_single_block_enabled() {
            warn!("SD can't erase single blocks");
            return Err(DiskioError::NotSupported);
        }

        let start = self.convert_lba(start)?;
        let end = self.convert_lba(end)?;

        self.cs_scope(|s| {
            s.send_command_ready(commands::CMD32, start)?;
            s.send_command_ready(commands::CMD33, end)?;
            s.send_command_ready(commands::CMD38, 0x0000_0000)?;

            if s.wait_ready(Config::ERASE_TIMEOUT_MS)? {
                Ok(())
            } else {
                Err(Error::TimeoutWaitAvailable)
            }
        })
        .map_err(DiskioError::Hardware)
    }
}

impl<'s, Spi: Transfer<u8>, Cs: OutputSwitch, Config: SdMmcSpiConfig> DiskioDevice
    for SdMmcSpi<'s, Spi, Cs, Config>
where
    Spi::Error: core::fmt::Debug,
    Cs::Error: core::fmt::Debug,
{
    type HardwareError = Error<Spi::Error, Cs::Error>;

    fn status(&self) -> Status {
        self.session.status().into()
    }

    fn reset(&mut self) {
        info!("SD reset invoked");
        self.session.set_uninitialized();
    }

    fn initialize(&mut self) -> Result<(), DiskioError<Self::HardwareError>> {
        self.try_initialize().map(|_| ())
    }

    fn read(&self, buf: &mut [u8], lba: Lba) -> Result<(), DiskioError<Self::HardwareError>> {
        let count = Self::validate_buffer_len(buf.len())?;
        self.validate_initialized()?;

        let address = self.convert_lba(lba)?;

        self.cs_scope(|s| {
            if count == 1 {
                s.send_command_ready(commands::CMD17, address)?;
                return s.read_data(buf);
            }

            s.send_command_ready(commands::CMD18, address)?;

            let mut transferred = 0;
            for chunk in buf.chunks_mut(BLOCK_SIZE) {
                if let Err(err) = s.read_data(chunk) {
                    warn!("SD read stopped at block {}: {:?}", transferred, err.kind());
                    break;
                }
                transferred += 1;
            }

            s.poll_command(commands::CMD12, 0x0000_0000)?;

            if transferred == count {
                Ok(())
            } else {
                Err(Error::Incomplete { transferred })
            }
        })
        .map_err(DiskioError::Hardware)
    }

    #[cfg(feature = "write")]
    fn write(&self, buf: &[u8], lba: Lba) -> Result<(), DiskioError<Self::HardwareError>> {
        let count = Self::validate_buffer_len(buf.len())?;
        self.validate_initialized()?;

        if self.session.status().contains(DiskStatus::WRITE_PROTECTED) {
            return Err(DiskioError::WriteProtected);
        }

        let address = self.convert_lba(lba)?;

        self.cs_scope(|s| {
            if count == 1 {
                s.send_command_ready(commands::CMD24, address)?;
                return s.write_data(tokens::DATA_START_BLOCK, buf);
            }

            if s.card_type().is_sd() {
                s.poll_command(commands::ACMD23, count)?;
            }
            s.send_command_ready(commands::CMD25, address)?;

            let mut transferred = 0;
            for block in buf.chunks(BLOCK_SIZE) {
                if let Err(err) = s.write_data(tokens::WRITE_MULTIPLE, block) {
                    warn!("SD write stopped at block {}: {:?}", transferred, err.kind());
                    break;
                }
                transferred += 1;
            }

            let stopped = s.write_data(tokens::STOP_TRAN, &[]);

            if transferred == count {
                stopped
            } else {
                Err(Error::Incomplete { transferred })
            }
        })
        .map_err(DiskioError::Hardware)
    }

    #[cfg(not(feature = "write"))]
    fn write(&self, _buf: &[u8], _lba: Lba) -> Result<(), DiskioError<Self::HardwareError>> {
        Err(DiskioError::NotSupported)
    }

    fn ioctl(&self, cmd: IoctlCmd) -> Result<(), DiskioError<Self::HardwareError>> {
        self.validate_initialized()?;

        match cmd {
            // Selecting waits for a pending internal write to finish.
            IoctlCmd::CtrlSync => self
                .cs_scope(|s| s.select())
                .map_err(DiskioError::Hardware),
            IoctlCmd::GetSectorCount(count) => {
                *count = Lba::from(self.geometry()?.sector_count);
                Ok(())
            }
            IoctlCmd::GetSectorSize(size) => {
                *size = BLOCK_SIZE;
                Ok(())
            }
            IoctlCmd::GetBlockSize(size) => {
                let sectors = self.erase_block_size().map_err(DiskioError::Hardware)?;
                *size = BlockSize::try_from(sectors).unwrap_or(BlockSize::MAX);
                Ok(())
            }
            #[cfg(feature = "trim")]
            IoctlCmd::CtrlTrim(&(start, end)) => self.trim(start, end),
            #[cfg(not(feature = "trim"))]
            IoctlCmd::CtrlTrim(_) => Err(DiskioError::NotSupported),
        }
    }
}

impl<'s, Spi: Transfer<u8>, Cs: OutputSwitch, Config: SdMmcSpiConfig> DiskioDeviceExt
    for SdMmcSpi<'s, Spi, Cs, Config>
where
    Spi::Error: core::fmt::Debug,
    Cs::Error: core::fmt::Debug,
{
    fn disk_status(&self) -> DiskStatus {
        self.session.status()
    }

    fn mmc_ioctl(&self, cmd: MmcIoctlCmd) -> Result<(), DiskioError<Self::HardwareError>> {
        self.validate_initialized()?;

        let result = match cmd {
            MmcIoctlCmd::GetCardType(flags) => {
                *flags = self.session.card_type_flags();
                Ok(())
            }
            MmcIoctlCmd::GetCsd(csd) => self.cs_scope(|s| s.read_register(commands::CMD9, csd)),
            MmcIoctlCmd::GetCid(cid) => self.cs_scope(|s| s.read_register(commands::CMD10, cid)),
            MmcIoctlCmd::GetOcr(ocr) => self.cs_scope(|s| s.read_ocr()).map(|data| *ocr = data),
            MmcIoctlCmd::GetSdStatus(status) => self.cs_scope(|s| s.read_sd_status(status)),
        };

        result.map_err(DiskioError::Hardware)
    }
}
