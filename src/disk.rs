use crate::{ioctl::MmcIoctlCmd, session::DiskStatus};

use diskio::{DiskioDevice, Error as DiskioError};

/// Failure classes seen by the disk layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum ErrorKind {
    /// No card, or the card isn't initialized.
    NotReady,
    /// Write to a protected card.
    WriteProtected,
    /// Invalid request, e.g. a zero sector count.
    ParamError,
    /// Transport or chip select failure.
    Transmit,
    /// Card answered with an error, a bad token or nothing usable.
    Protocol,
    /// A countdown ran out.
    Timeout,
}

/// Represents error kind provider.
pub trait ErrorKindProvider {
    /// Returns the failure class.
    fn kind(&self) -> ErrorKind;
}

impl<E: ErrorKindProvider> ErrorKindProvider for DiskioError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            DiskioError::NotInitialized | DiskioError::AlreadyInitialized => ErrorKind::NotReady,
            DiskioError::WriteProtected => ErrorKind::WriteProtected,
            DiskioError::InvalidArgument => ErrorKind::ParamError,
            DiskioError::NotSupported => ErrorKind::Protocol,
            DiskioError::Hardware(err) => err.kind(),
        }
    }
}

/// Result codes of the raw disk interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[repr(u8)]
pub enum DiskResult {
    Ok = 0,
    Error = 1,
    WriteProtected = 2,
    NotReady = 3,
    ParamError = 4,
}

impl From<ErrorKind> for DiskResult {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotReady => DiskResult::NotReady,
            ErrorKind::WriteProtected => DiskResult::WriteProtected,
            ErrorKind::ParamError => DiskResult::ParamError,
            ErrorKind::Transmit | ErrorKind::Protocol | ErrorKind::Timeout => DiskResult::Error,
        }
    }
}

impl<E: ErrorKindProvider> From<Result<(), E>> for DiskResult {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => DiskResult::Ok,
            Err(err) => err.kind().into(),
        }
    }
}

/// SD/MMC specifics on top of [`DiskioDevice`]: the no-media bit and the
/// card register queries.
pub trait DiskioDeviceExt: DiskioDevice {
    /// Status including [`DiskStatus::NO_MEDIA`].
    fn disk_status(&self) -> DiskStatus;

    /// Card specific control operation.
    fn mmc_ioctl(&self, cmd: MmcIoctlCmd) -> Result<(), DiskioError<Self::HardwareError>>;
}
