use bitfield::bitfield;

bitfield! {
    /// R1 response bitset.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
    pub struct R1Response(u8);
    impl Debug;
    pub in_idle_state, _: 0;
    pub erase_reset, _: 1;
    pub illegal_command, _: 2;
    pub command_crc_error, _: 3;
    pub erase_sequence_error, _: 4;
    pub address_error, _: 5;
    pub parameter_error, _: 6;
    pub start_bit, _: 7;
}

impl R1Response {
    /// Card accepted the command and left the idle state.
    pub const READY_STATE: Self = Self(0x00);
    /// Card accepted the command and is still initializing.
    pub const IN_IDLE_STATE: Self = Self(0x01);
    /// Card in idle state rejected the command, e.g. CMD8 on a v1 card.
    pub const IN_IDLE_AND_ILLEGAL: Self = Self(0x05);

    /// A response byte always starts with a cleared bit.
    pub fn is_valid(&self) -> bool {
        !self.start_bit()
    }

    /// Any flag other than idle is set.
    pub fn is_error(&self) -> bool {
        self.0 > Self::IN_IDLE_STATE.0
    }
}

/// R3/R7 trailing payload.
pub type R3OcrPayload = [u8; 4];

bitfield! {
    /// Operation Conditions Register, the R3 payload of READ_OCR.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
    pub struct Ocr(u32);
    impl Debug;
    pub power_up_done, _: 31;
    pub card_capacity_status, _: 30;
    pub u16, voltage_window, _: 23, 15;
}

impl From<R3OcrPayload> for Ocr {
    fn from(payload: R3OcrPayload) -> Self {
        Ocr(u32::from_be_bytes(payload))
    }
}

bitfield! {
    /// Interface condition echo, the R7 payload of SEND_IF_COND.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
    pub struct IfCond(u32);
    impl Debug;
    pub u8, command_version, _: 31, 28;
    pub u8, supply_voltage, _: 15, 8;
    pub u8, check_pattern, _: 7, 0;
}

impl IfCond {
    /// Card works at 2.7-3.6V and echoed the check pattern.
    pub fn accepted(&self) -> bool {
        self.supply_voltage() == 0x01 && self.check_pattern() == 0xAA
    }
}

impl From<R3OcrPayload> for IfCond {
    fn from(payload: R3OcrPayload) -> Self {
        IfCond(u32::from_be_bytes(payload))
    }
}
