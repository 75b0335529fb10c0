//! Byte level SD/MMC card model behind an SPI bus.
//!
//! Every transferred byte advances the session by one millisecond, the way a
//! 1 ms tick interrupt would while the driver busy-waits.

#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use embedded_hal::blocking::spi::Transfer;
use hex_literal::hex;
use sdmmc_diskio::{CardSession, DefaultSdMmcSpiConfig, SdMmcSpi};
use switch_hal::OutputSwitch;

pub const SDSC_CSD: [u8; 16] = hex!("00 26 00 32 5F 59 83 C8 AD DB CF FF D2 40 40 A5");
pub const SDHC_CSD: [u8; 16] = hex!("40 0E 00 32 5B 59 00 00 1D 69 7F 80 0A 40 00 8B");
/// SDSC CSD with ERASE_BLK_EN cleared.
pub const SDSC_CSD_NO_ERASE_BLK: [u8; 16] = hex!("00 26 00 32 5F 59 83 C8 AD DB 8F FF D2 40 40 A5");
pub const CID: [u8; 16] = hex!("03 53 44 53 55 30 32 47 80 12 34 56 78 01 23 00");

pub const ACMD: u8 = 0x80;
/// Token of a block the card fails to read.
pub const ERROR_TOKEN: u8 = 0x0B;
/// Data response of a block the card refuses to write.
pub const WRITE_REJECTED: u8 = 0x0D;

const BLOCK: usize = 512;
const INIT_ATTEMPTS: u32 = 3;
const BUSY_BYTES: usize = 4;

/// Failure injected on the bus or the chip select line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault;

pub type Driver<'s> = SdMmcSpi<'s, SimSpi<'s>, SimCs, DefaultSdMmcSpiConfig>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    /// SD ver 1.
    Sd1,
    /// SD ver 2, standard capacity.
    Sd2Byte,
    /// SD ver 2, high capacity.
    Sd2Block,
    /// MMC ver 3.
    Mmc3,
    /// Answers CMD8 but never leaves the idle state.
    StuckIdle,
}

impl CardKind {
    fn block_addressed(self) -> bool {
        self == CardKind::Sd2Block
    }

    fn is_v2(self) -> bool {
        matches!(
            self,
            CardKind::Sd2Byte | CardKind::Sd2Block | CardKind::StuckIdle
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Command,
    ReadMultiple { next: u32 },
    WaitWriteToken { next: u32, multiple: bool },
    WriteData { block: u32, multiple: bool },
}

pub struct SimCard {
    pub kind: CardKind,
    pub present: bool,
    pub write_protected: bool,
    pub selected: bool,
    pub csd: [u8; 16],
    pub cid: [u8; 16],
    pub sd_status: [u8; 64],
    /// Block answered with [`ERROR_TOKEN`].
    pub bad_token_at: Option<u32>,
    /// Block answered with [`WRITE_REJECTED`].
    pub reject_write_at: Option<u32>,
    /// Data blocks are never started, commands are still answered.
    pub mute_data: bool,
    /// Chip select switching fails.
    pub fail_select: bool,
    /// Every SPI transfer fails.
    pub fail_transfer: bool,
    /// Commands as `(index, arg)`, application commands carry [`ACMD`].
    pub log: Vec<(u8, u32)>,
    /// Bytes clocked in total.
    pub bytes: usize,
    pub stop_tokens: usize,
    storage: HashMap<u32, Vec<u8>>,
    state: State,
    frame: Vec<u8>,
    data: Vec<u8>,
    out: VecDeque<u8>,
    idle: bool,
    app: bool,
    init_attempts: u32,
    erase_start: u32,
    erase_end: u32,
}

impl SimCard {
    pub fn new(kind: CardKind) -> Self {
        let csd = match kind {
            CardKind::Sd2Block => SDHC_CSD,
            _ => SDSC_CSD,
        };
        let mut sd_status = [0; 64];
        sd_status[10] = 0x50;

        SimCard {
            kind,
            present: true,
            write_protected: false,
            selected: false,
            csd,
            cid: CID,
            sd_status,
            bad_token_at: None,
            reject_write_at: None,
            mute_data: false,
            fail_select: false,
            fail_transfer: false,
            log: Vec::new(),
            bytes: 0,
            stop_tokens: 0,
            storage: HashMap::new(),
            state: State::Command,
            frame: Vec::new(),
            data: Vec::new(),
            out: VecDeque::new(),
            idle: true,
            app: false,
            init_attempts: 0,
            erase_start: 0,
            erase_end: 0,
        }
    }

    /// Content of a block, never written blocks repeat their low index byte.
    pub fn block(&self, block: u32) -> Vec<u8> {
        self.storage
            .get(&block)
            .cloned()
            .unwrap_or_else(|| vec![block as u8; BLOCK])
    }

    pub fn set_block(&mut self, block: u32, data: &[u8]) {
        self.storage.insert(block, data.to_vec());
    }

    /// Count of logged commands with this index.
    pub fn count(&self, cmd: u8) -> usize {
        self.log.iter().filter(|(index, _)| *index == cmd).count()
    }

    /// Argument of the last logged command with this index.
    pub fn last_arg(&self, cmd: u8) -> Option<u32> {
        self.log
            .iter()
            .rev()
            .find(|(index, _)| *index == cmd)
            .map(|(_, arg)| *arg)
    }

    fn exchange(&mut self, input: u8) -> u8 {
        self.bytes += 1;

        if !self.selected {
            self.frame.clear();
            return 0xFF;
        }

        if self.out.is_empty() {
            if let State::ReadMultiple { next } = self.state {
                self.queue_block(next);
                self.state = State::ReadMultiple { next: next + 1 };
            }
        }
        let output = self.out.pop_front().unwrap_or(0xFF);

        match self.state {
            State::Command | State::ReadMultiple { .. } => self.receive_frame(input),
            State::WaitWriteToken { next, multiple } => match input {
                0xFE if !multiple => {
                    self.state = State::WriteData {
                        block: next,
                        multiple,
                    }
                }
                0xFC if multiple => {
                    self.state = State::WriteData {
                        block: next,
                        multiple,
                    }
                }
                0xFD if multiple => {
                    self.stop_tokens += 1;
                    self.state = State::Command;
                    self.out.push_back(0xFF);
                    self.busy();
                }
                _ => {}
            },
            State::WriteData { block, multiple } => {
                self.data.push(input);
                if self.data.len() == BLOCK + 2 {
                    self.data.truncate(BLOCK);
                    let data = core::mem::take(&mut self.data);

                    if self.reject_write_at == Some(block) {
                        self.out.push_back(WRITE_REJECTED);
                    } else {
                        self.storage.insert(block, data);
                        self.out.push_back(0xE5);
                    }
                    self.busy();

                    self.state = if multiple {
                        State::WaitWriteToken {
                            next: block + 1,
                            multiple,
                        }
                    } else {
                        State::Command
                    };
                }
            }
        }

        output
    }

    fn receive_frame(&mut self, input: u8) {
        if self.frame.is_empty() && (input & 0xC0) != 0x40 {
            return;
        }

        self.frame.push(input);
        if self.frame.len() == 6 {
            let frame = core::mem::take(&mut self.frame);
            self.execute(frame);
        }
    }

    fn busy(&mut self) {
        for _ in 0..BUSY_BYTES {
            self.out.push_back(0x00);
        }
    }

    fn r1(&self) -> u8 {
        u8::from(self.idle)
    }

    fn respond(&mut self, r1: u8, payload: &[u8]) {
        self.out.push_back(0xFF);
        self.out.push_back(r1);
        self.out.extend(payload);
    }

    fn to_block(&self, arg: u32) -> u32 {
        if self.kind.block_addressed() {
            arg
        } else {
            arg / BLOCK as u32
        }
    }

    fn queue_data(&mut self, token: u8, data: &[u8]) {
        if self.mute_data {
            return;
        }
        self.out.push_back(0xFF);
        self.out.push_back(token);
        self.out.extend(data);
        self.out.extend([0xFF, 0xFF]);
    }

    fn queue_block(&mut self, block: u32) {
        let token = if self.bad_token_at == Some(block) {
            ERROR_TOKEN
        } else {
            0xFE
        };
        let data = self.block(block);
        self.queue_data(token, &data);
    }

    fn execute(&mut self, frame: Vec<u8>) {
        let index = frame[0] & 0x3F;
        let arg = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
        let crc = frame[5];
        let app = core::mem::take(&mut self.app);
        let cmd = if app { ACMD | index } else { index };

        self.log.push((cmd, arg));
        self.out.clear();

        match cmd {
            0 => {
                self.idle = true;
                self.init_attempts = 0;
                self.state = State::Command;
                let r1 = if crc == 0x95 { 0x01 } else { 0x09 };
                self.respond(r1, &[]);
            }
            8 if self.kind.is_v2() => {
                if crc == 0x87 {
                    let echo = (arg & 0xFFF).to_be_bytes();
                    self.respond(0x01, &echo);
                } else {
                    self.respond(0x09, &[]);
                }
            }
            55 if self.kind == CardKind::Mmc3 => self.respond(0x05, &[]),
            55 => {
                self.app = true;
                let r1 = self.r1();
                self.respond(r1, &[]);
            }
            0xA9 => self.op_cond(),
            1 if self.kind == CardKind::Mmc3 => self.op_cond(),
            58 => {
                let ocr: u32 = match (self.idle, self.kind) {
                    (true, _) => 0x00FF_8000,
                    (false, CardKind::Sd2Block) => 0xC0FF_8000,
                    (false, _) => 0x80FF_8000,
                };
                let r1 = self.r1();
                self.respond(r1, &ocr.to_be_bytes());
            }
            16 if arg == BLOCK as u32 && !self.idle => self.respond(0x00, &[]),
            9 | 10 if !self.idle => {
                let register = if index == 9 { self.csd } else { self.cid };
                self.respond(0x00, &[]);
                self.queue_data(0xFE, &register);
            }
            0x8D if !self.idle => {
                let status = self.sd_status;
                self.respond(0x00, &[0x00]);
                self.queue_data(0xFE, &status);
            }
            17 if !self.idle => {
                let block = self.to_block(arg);
                self.respond(0x00, &[]);
                self.queue_block(block);
            }
            18 if !self.idle => {
                self.respond(0x00, &[]);
                self.state = State::ReadMultiple {
                    next: self.to_block(arg),
                };
            }
            12 => {
                self.state = State::Command;
                // Stuff byte, skipped by the host.
                self.out.push_back(0xFF);
                self.out.push_back(0x00);
            }
            24 | 25 if !self.idle => {
                self.respond(0x00, &[]);
                self.state = State::WaitWriteToken {
                    next: self.to_block(arg),
                    multiple: index == 25,
                };
            }
            0x97 if !self.idle => self.respond(0x00, &[]),
            32 if !self.idle => {
                self.erase_start = self.to_block(arg);
                self.respond(0x00, &[]);
            }
            33 if !self.idle => {
                self.erase_end = self.to_block(arg);
                self.respond(0x00, &[]);
            }
            38 if !self.idle => {
                for block in self.erase_start..=self.erase_end {
                    self.storage.insert(block, vec![0xFF; BLOCK]);
                }
                self.respond(0x00, &[]);
                self.busy();
            }
            _ => {
                let r1 = self.r1() | 0x04;
                self.respond(r1, &[]);
            }
        }
    }

    fn op_cond(&mut self) {
        if self.kind != CardKind::StuckIdle {
            self.init_attempts += 1;
            if self.init_attempts >= INIT_ATTEMPTS {
                self.idle = false;
            }
        }

        let r1 = self.r1();
        self.respond(r1, &[]);
    }
}

pub type SharedCard = Rc<RefCell<SimCard>>;

/// SPI bus with a [`SimCard`] on it, ticks the session once per byte.
pub struct SimSpi<'s> {
    card: SharedCard,
    session: &'s CardSession,
}

impl<'s> Transfer<u8> for SimSpi<'s> {
    type Error = Fault;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        if self.card.borrow().fail_transfer {
            return Err(Fault);
        }

        for word in words.iter_mut() {
            let mut card = self.card.borrow_mut();
            *word = card.exchange(*word);
            let (present, write_protected) = (card.present, card.write_protected);
            drop(card);

            self.session.on_tick(present, write_protected);
        }

        Ok(words)
    }
}

/// Chip select line of a [`SimCard`].
pub struct SimCs {
    card: SharedCard,
}

impl SimCs {
    fn switch(&mut self, selected: bool) -> Result<(), Fault> {
        let mut card = self.card.borrow_mut();
        if card.fail_select {
            return Err(Fault);
        }

        card.selected = selected;
        Ok(())
    }
}

impl OutputSwitch for SimCs {
    type Error = Fault;

    fn on(&mut self) -> Result<(), Self::Error> {
        self.switch(true)
    }

    fn off(&mut self) -> Result<(), Self::Error> {
        self.switch(false)
    }
}

pub fn shared(card: SimCard) -> SharedCard {
    Rc::new(RefCell::new(card))
}

pub fn driver<'s>(card: &SharedCard, session: &'s CardSession) -> Driver<'s> {
    init_logger();

    SdMmcSpi::new(
        SimSpi {
            card: card.clone(),
            session,
        },
        SimCs { card: card.clone() },
        session,
    )
}

/// Block filled with a pattern that depends on the block and the byte offset.
pub fn pattern(block: u32) -> Vec<u8> {
    (0..BLOCK)
        .map(|i| (i as u32).wrapping_mul(7).wrapping_add(block * 31) as u8)
        .collect()
}
