//! Raw disk interface: physical drive numbers, sector counts, integer ioctl
//! codes and byte buffers, the shape a FatFs-style filesystem glue expects.

use crate::{
    card::CardTypeFlags,
    consts::BLOCK_SIZE,
    disk::{DiskResult, DiskioDeviceExt, ErrorKindProvider},
    ioctl::{codes, MmcIoctlCmd},
    session::DiskStatus,
};

use diskio::{DataArea, IoctlCmd, Lba};

/// Drive table with the SD card mapped to drive 0.
pub struct Media<D: DiskioDeviceExt> {
    sd_card: D,
}

impl<D: DiskioDeviceExt> Media<D>
where
    D::HardwareError: ErrorKindProvider,
{
    /// Physical drive of the SD card.
    pub const SD_CARD: u8 = 0;

    pub fn new(sd_card: D) -> Self {
        Media { sd_card }
    }

    /// SD card device.
    pub fn sd_card(&self) -> &D {
        &self.sd_card
    }

    /// Releases the device.
    pub fn free(self) -> D {
        self.sd_card
    }

    pub fn disk_status(&self, drive: u8) -> DiskStatus {
        match drive {
            Self::SD_CARD => self.sd_card.disk_status(),
            _ => DiskStatus::NOT_INITIALIZED,
        }
    }

    pub fn disk_initialize(&mut self, drive: u8) -> DiskStatus {
        match drive {
            Self::SD_CARD => {
                // Failures are logged and show up in the status bits.
                let _ = self.sd_card.initialize();
                self.sd_card.disk_status()
            }
            _ => DiskStatus::NOT_INITIALIZED,
        }
    }

    pub fn disk_read(&self, drive: u8, buf: &mut [u8], sector: u32, count: u32) -> DiskResult {
        if drive != Self::SD_CARD {
            return DiskResult::ParamError;
        }

        match blocks_len(buf.len(), count) {
            Some(len) => self.sd_card.read(&mut buf[..len], Lba::from(sector)).into(),
            None => DiskResult::ParamError,
        }
    }

    pub fn disk_write(&self, drive: u8, buf: &[u8], sector: u32, count: u32) -> DiskResult {
        if drive != Self::SD_CARD {
            return DiskResult::ParamError;
        }

        match blocks_len(buf.len(), count) {
            Some(len) => self.sd_card.write(&buf[..len], Lba::from(sector)).into(),
            None => DiskResult::ParamError,
        }
    }

    /// Control operation by numeric code, see [`codes`].
    ///
    /// Integers are exchanged little-endian: sector count and erase block
    /// size as `u32`, sector size as `u16`, a trim range as two `u32`.
    pub fn disk_ioctl(&self, drive: u8, code: u8, buf: &mut [u8]) -> DiskResult {
        if drive != Self::SD_CARD {
            return DiskResult::ParamError;
        }

        match self.ioctl_raw(code, buf) {
            Ok(()) => DiskResult::Ok,
            Err(result) => result,
        }
    }

    fn ioctl_raw(&self, code: u8, buf: &mut [u8]) -> Result<(), DiskResult> {
        let device = &self.sd_card;

        match code {
            codes::CTRL_SYNC => run(device.ioctl(IoctlCmd::CtrlSync))?,
            codes::GET_SECTOR_COUNT => {
                let out = out::<4>(buf)?;
                let mut count: Lba = 0;
                run(device.ioctl(IoctlCmd::GetSectorCount(&mut count)))?;
                *out = u32::try_from(count).unwrap_or(u32::MAX).to_le_bytes();
            }
            codes::GET_SECTOR_SIZE => {
                let out = out::<2>(buf)?;
                let mut size = 0;
                run(device.ioctl(IoctlCmd::GetSectorSize(&mut size)))?;
                *out = u16::try_from(size)
                    .map_err(|_| DiskResult::Error)?
                    .to_le_bytes();
            }
            codes::GET_BLOCK_SIZE => {
                let out = out::<4>(buf)?;
                let mut size = 0;
                run(device.ioctl(IoctlCmd::GetBlockSize(&mut size)))?;
                *out = u32::try_from(size).unwrap_or(u32::MAX).to_le_bytes();
            }
            codes::CTRL_TRIM => {
                let range = out::<8>(buf)?;
                let start = u32::from_le_bytes([range[0], range[1], range[2], range[3]]);
                let end = u32::from_le_bytes([range[4], range[5], range[6], range[7]]);
                let area: DataArea = (Lba::from(start), Lba::from(end));
                run(device.ioctl(IoctlCmd::CtrlTrim(&area)))?;
            }
            codes::MMC_GET_TYPE => {
                let out = out::<1>(buf)?;
                let mut flags = CardTypeFlags::empty();
                run(device.mmc_ioctl(MmcIoctlCmd::GetCardType(&mut flags)))?;
                *out = [flags.bits()];
            }
            codes::MMC_GET_CSD => run(device.mmc_ioctl(MmcIoctlCmd::GetCsd(out(buf)?)))?,
            codes::MMC_GET_CID => run(device.mmc_ioctl(MmcIoctlCmd::GetCid(out(buf)?)))?,
            codes::MMC_GET_OCR => run(device.mmc_ioctl(MmcIoctlCmd::GetOcr(out(buf)?)))?,
            codes::MMC_GET_SDSTAT => {
                run(device.mmc_ioctl(MmcIoctlCmd::GetSdStatus(out(buf)?)))?
            }
            _ => return Err(DiskResult::ParamError),
        }

        Ok(())
    }
}

/// Byte length of `count` sectors, if non-zero and within `buf_len`.
fn blocks_len(buf_len: usize, count: u32) -> Option<usize> {
    usize::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(BLOCK_SIZE))
        .filter(|&len| len != 0 && len <= buf_len)
}

/// Maps a device result to the raw result code.
fn run<E: ErrorKindProvider>(result: Result<(), E>) -> Result<(), DiskResult> {
    match DiskResult::from(result) {
        DiskResult::Ok => Ok(()),
        failed => Err(failed),
    }
}

/// First `N` bytes of a caller buffer, a short buffer is a parameter error.
fn out<const N: usize>(buf: &mut [u8]) -> Result<&mut [u8; N], DiskResult> {
    buf.get_mut(..N)
        .and_then(|head| head.try_into().ok())
        .ok_or(DiskResult::ParamError)
}
