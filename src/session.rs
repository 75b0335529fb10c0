//! State shared between the driver and the 1 ms tick source.

use crate::{
    card::{CardType, CardTypeFlags},
    timer::{Clock, Countdown},
};

use bitflags::bitflags;
use core::sync::atomic::{AtomicU8, Ordering};
use diskio::{Status, StatusFlag};
use switch_hal::InputSwitch;

bitflags! {
    /// Disk status bits.
    #[derive(Default)]
    #[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
    pub struct DiskStatus: u8 {
        /// Drive not initialized.
        const NOT_INITIALIZED = 0x01;
        /// No medium in the drive.
        const NO_MEDIA = 0x02;
        /// Write protected.
        const WRITE_PROTECTED = 0x04;
    }
}

/// No media reads as not initialized, the disk layer has no bit for it.
impl From<DiskStatus> for Status {
    fn from(status: DiskStatus) -> Self {
        let mut flags = Status::default();
        if status.intersects(DiskStatus::NOT_INITIALIZED | DiskStatus::NO_MEDIA) {
            flags |= StatusFlag::NotInitialized;
        }
        if status.contains(DiskStatus::WRITE_PROTECTED) {
            flags |= StatusFlag::WriteProtected;
        }
        flags
    }
}

/// Card session: type, status and the two countdowns.
///
/// Built from atomics so a single instance may live in a `static` and be
/// ticked from an interrupt while the driver busy-waits.
///
/// Status updates are plain loads and stores, no read-modify-write, so they
/// also run on cores without atomic RMW. [`set_initialized`] and
/// [`set_uninitialized`] load the status and store it back; a tick landing
/// between the two has its card-detect and write-protect bits overwritten
/// until the next tick samples them again. A removal seen in that window
/// still ends up with `NOT_INITIALIZED`, as every tick without a card sets it.
///
/// [`set_initialized`]: CardSession::set_initialized
/// [`set_uninitialized`]: CardSession::set_uninitialized
#[derive(Debug)]
pub struct CardSession {
    card_type: AtomicU8,
    status: AtomicU8,
    timer_a: Countdown,
    timer_b: Countdown,
}

impl CardSession {
    pub const fn new() -> Self {
        CardSession {
            card_type: AtomicU8::new(0),
            status: AtomicU8::new(DiskStatus::NOT_INITIALIZED.bits()),
            timer_a: Countdown::new(),
            timer_b: Countdown::new(),
        }
    }

    /// Status snapshot.
    pub fn status(&self) -> DiskStatus {
        DiskStatus::from_bits_truncate(self.status.load(Ordering::Acquire))
    }

    /// Drive is initialized and has a medium.
    pub fn is_ready(&self) -> bool {
        !self
            .status()
            .intersects(DiskStatus::NOT_INITIALIZED | DiskStatus::NO_MEDIA)
    }

    /// Type of the initialized card.
    pub fn card_type(&self) -> CardType {
        CardType::from(self.card_type_flags())
    }

    /// Type flags of the initialized card.
    pub fn card_type_flags(&self) -> CardTypeFlags {
        CardTypeFlags::from_bits_truncate(self.card_type.load(Ordering::Acquire))
    }

    /// Countdown for initialization and data tokens.
    pub fn timer_a(&self) -> &Countdown {
        &self.timer_a
    }

    /// Countdown for the card busy signal.
    pub fn timer_b(&self) -> &Countdown {
        &self.timer_b
    }

    /// Tick handler, call every millisecond.
    ///
    /// Removing the card drops the initialized state; inserting one only
    /// clears the no-media bit, the card still has to be initialized.
    pub fn on_tick(&self, card_present: bool, write_protected: bool) {
        self.timer_a.tick();
        self.timer_b.tick();

        let mut status = self.status();
        if card_present {
            status.remove(DiskStatus::NO_MEDIA);
        } else {
            status.insert(DiskStatus::NO_MEDIA | DiskStatus::NOT_INITIALIZED);
        }
        status.set(DiskStatus::WRITE_PROTECTED, write_protected);
        self.store_status(status);
    }

    /// Records a successful initialization.
    pub(crate) fn set_initialized(&self, card_type: CardType) {
        self.card_type
            .store(card_type.flags().bits(), Ordering::Release);

        let mut status = self.status();
        if !status.contains(DiskStatus::NO_MEDIA) {
            status.remove(DiskStatus::NOT_INITIALIZED);
        }
        self.store_status(status);
    }

    /// Records a failed initialization or a reset.
    pub(crate) fn set_uninitialized(&self) {
        self.card_type.store(0, Ordering::Release);
        self.store_status(self.status() | DiskStatus::NOT_INITIALIZED);
    }

    fn store_status(&self, status: DiskStatus) {
        self.status.store(status.bits(), Ordering::Release);
    }
}

impl Default for CardSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Samples the card-detect and write-protect inputs on every tick.
///
/// `Cd` - card detect input, active when a card is in the socket.
/// `Wp` - write protect input, active when the card is locked.
pub struct CardMonitor<'s, Cd: InputSwitch, Wp: InputSwitch> {
    session: &'s CardSession,
    card_detect: Cd,
    write_protect: Wp,
}

impl<'s, Cd: InputSwitch, Wp: InputSwitch> CardMonitor<'s, Cd, Wp> {
    pub fn new(session: &'s CardSession, card_detect: Cd, write_protect: Wp) -> Self {
        CardMonitor {
            session,
            card_detect,
            write_protect,
        }
    }

    /// Tick handler, call every millisecond.
    ///
    /// An input that can't be read counts as an absent card or a protected
    /// one.
    pub fn on_tick(&self) {
        let card_present = self.card_detect.is_active().unwrap_or(false);
        let write_protected = self.write_protect.is_active().unwrap_or(true);

        self.session.on_tick(card_present, write_protected);
    }

    /// Releases the inputs.
    pub fn free(self) -> (Cd, Wp) {
        (self.card_detect, self.write_protect)
    }
}
