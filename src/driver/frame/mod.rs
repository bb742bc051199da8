//! In-memory representation of a classic CAN frame and its encode/decode
//! contract with the hardware mailbox storage.
use embedded_can::{ExtendedId, Id, StandardId};

use crate::error::FrameError;
use crate::infra::mailbox_ram::{
    MailboxRecord, EXTENDED_ID_MASK, IDE_BIT, RTR_BIT, STANDARD_ID_MASK, STANDARD_ID_SHIFT,
};
use crate::layout::MAX_PAYLOAD_LEN;

//==================================================================================CAN_FRAME
/// Classic CAN frame as moved between the mailboxes and the software queues.
///
/// Frames are immutable values: they are copied across the interrupt boundary,
/// never shared. A remote frame always has length 0 and an empty payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFrame {
    id: Id,
    remote: bool,
    len: u8,
    data: [u8; MAX_PAYLOAD_LEN],
    timestamp: u16,
}

impl CanFrame {
    /// Build a data frame. Fails when `payload` exceeds eight bytes.
    pub fn new_data(id: impl Into<Id>, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLong { len: payload.len() });
        }
        Ok(Self::new_data_truncated(id, payload))
    }

    /// Build a data frame from the first eight bytes of `payload`; longer
    /// payloads are truncated without error.
    pub fn new_data_truncated(id: impl Into<Id>, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_PAYLOAD_LEN);
        let mut data = [0; MAX_PAYLOAD_LEN];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id: id.into(),
            remote: false,
            len: len as u8,
            data,
            timestamp: 0,
        }
    }

    /// Build a remote frame (no payload).
    pub fn new_remote(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            remote: true,
            len: 0,
            data: [0; MAX_PAYLOAD_LEN],
            timestamp: 0,
        }
    }

    /// Identifier (standard or extended).
    pub fn id(&self) -> Id {
        self.id
    }

    /// Identifier value without the format flag.
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Number of payload bytes (0 to 8).
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Hardware timestamp latched on reception; 0 for locally built frames.
    pub fn timestamp(&self) -> u16 {
        self.timestamp
    }

    //==================================================================================Mailbox codec
    /// Encode into mailbox storage for transmission. The timestamp is not
    /// written: the hardware only assigns it on reception.
    pub fn to_mailbox(&self) -> MailboxRecord {
        let mut id = match self.id {
            Id::Standard(sid) => (sid.as_raw() as u32) << STANDARD_ID_SHIFT,
            Id::Extended(eid) => eid.as_raw() | IDE_BIT,
        };
        if self.remote {
            id |= RTR_BIT;
        }
        MailboxRecord {
            id,
            dlc: self.len,
            data: self.data,
            timestamp: 0,
        }
    }

    /// Decode a received mailbox. DLC values above 8 are clamped, and remote
    /// frames drop whatever the data bytes contain.
    pub fn from_mailbox(record: &MailboxRecord) -> Self {
        let id = if record.id & IDE_BIT != 0 {
            // Masked to 29 bits, always in range.
            Id::Extended(ExtendedId::new(record.id & EXTENDED_ID_MASK).unwrap_or(ExtendedId::ZERO))
        } else {
            let raw = (record.id >> STANDARD_ID_SHIFT) & STANDARD_ID_MASK;
            Id::Standard(StandardId::new(raw as u16).unwrap_or(StandardId::ZERO))
        };
        let remote = record.id & RTR_BIT != 0;

        let (len, data) = if remote {
            (0, [0; MAX_PAYLOAD_LEN])
        } else {
            let len = (record.dlc & 0x0F).min(MAX_PAYLOAD_LEN as u8);
            let mut data = [0; MAX_PAYLOAD_LEN];
            data[..len as usize].copy_from_slice(&record.data[..len as usize]);
            (len, data)
        };

        Self {
            id,
            remote,
            len,
            data,
            timestamp: record.timestamp,
        }
    }
}

//==================================================================================EMBEDDED_CAN
impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::new_data(id, data).ok()
    }

    /// Remote frames carry no payload here, the requested DLC is only validated.
    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        (dlc <= MAX_PAYLOAD_LEN).then(|| CanFrame::new_remote(id))
    }

    fn is_extended(&self) -> bool {
        CanFrame::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.len as usize
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
