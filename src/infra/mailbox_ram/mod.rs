//! Register image of a hardware mailbox: the identifier word, data length,
//! payload bytes and receive timestamp, plus the per-slot control register.
//!
//! Identifier word layout:
//! * bit 31: IDE, extended (29-bit) identifier
//! * bit 30: RTR, remote transmission request
//! * bits 28..18: standard identifier
//! * bits 28..0: extended identifier

//==================================================================================Constants

/// Extended identifier flag in the identifier word.
pub const IDE_BIT: u32 = 1 << 31;
/// Remote frame flag in the identifier word.
pub const RTR_BIT: u32 = 1 << 30;
/// Bit offset of a standard identifier inside the identifier word.
pub const STANDARD_ID_SHIFT: u32 = 18;
/// Mask of an extended identifier inside the identifier word.
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;
/// Mask of a standard identifier once shifted down.
pub const STANDARD_ID_MASK: u32 = 0x7FF;

//==================================================================================MAILBOX_RECORD

/// Contents of one mailbox as stored by the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxRecord {
    /// Identifier word (IDE, RTR, identifier bits).
    pub id: u32,
    /// Data length code. Values above 8 mean 8 bytes.
    pub dlc: u8,
    /// Payload bytes; only the first `dlc` are meaningful.
    pub data: [u8; 8],
    /// Hardware timestamp latched on reception.
    pub timestamp: u16,
}

impl MailboxRecord {
    /// Empty record whose flags select the frames a receive slot accepts.
    pub const fn acceptance(shape: FrameShape) -> Self {
        let mut id = 0;
        if shape.extended {
            id |= IDE_BIT;
        }
        if shape.remote {
            id |= RTR_BIT;
        }
        Self {
            id,
            dlc: 0,
            data: [0; 8],
            timestamp: 0,
        }
    }

    /// Format flags carried by the identifier word.
    pub fn shape(&self) -> FrameShape {
        FrameShape {
            extended: self.id & IDE_BIT != 0,
            remote: self.id & RTR_BIT != 0,
        }
    }
}

//==================================================================================FRAME_SHAPE

/// Identifier format and frame type combination matched by a receive slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameShape {
    pub extended: bool,
    pub remote: bool,
}

impl FrameShape {
    /// The four shapes a receive group has to cover.
    pub const ALL: [FrameShape; 4] = [
        FrameShape { extended: false, remote: false },
        FrameShape { extended: true, remote: false },
        FrameShape { extended: false, remote: true },
        FrameShape { extended: true, remote: true },
    ];
}

//==================================================================================MAILBOX_CONTROL

/// Per-slot control register.
///
/// Bit meanings depend on the direction the slot is armed for:
/// * bit 7: TRMREQ, transmission requested
/// * bit 6: RECREQ, reception requested
/// * bit 2: MSGLOST (receive) / TRMABT (transmit)
/// * bit 1: INVALDATA (receive) / TRMACTIVE (transmit)
/// * bit 0: NEWDATA (receive) / SENTDATA (transmit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxControl(pub u8);

impl MailboxControl {
    pub const EMPTY: Self = Self(0);
    pub const TRANSMIT_REQUEST: Self = Self(1 << 7);
    pub const RECEIVE_REQUEST: Self = Self(1 << 6);
    pub const LOST_OR_ABORTED: Self = Self(1 << 2);
    pub const BUSY: Self = Self(1 << 1);
    pub const COMPLETE: Self = Self(1 << 0);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// A receive slot holds a frame that was not read yet.
    pub fn new_data(self) -> bool {
        self.contains(Self::RECEIVE_REQUEST) && self.contains(Self::COMPLETE)
    }

    /// A transmit slot finished sending.
    pub fn sent(self) -> bool {
        self.contains(Self::TRANSMIT_REQUEST) && self.contains(Self::COMPLETE)
    }

    /// A transmit slot is still on the bus or waiting for arbitration.
    pub fn transmitting(self) -> bool {
        self.contains(Self::TRANSMIT_REQUEST) && !self.contains(Self::COMPLETE)
    }

    /// Coarse state of the slot.
    pub fn state(self) -> SlotState {
        if self.contains(Self::COMPLETE) {
            SlotState::DataReady
        } else if self.contains(Self::TRANSMIT_REQUEST) || self.contains(Self::RECEIVE_REQUEST) {
            SlotState::RequestPending
        } else {
            SlotState::Idle
        }
    }
}

/// Control state of a mailbox slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotState {
    /// Not armed.
    Idle,
    /// Armed for reception or transmission.
    RequestPending,
    /// Frame received, or transmission completed, and not serviced yet.
    DataReady,
}
