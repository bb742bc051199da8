//! Fixed hardware layout of the CAN peripheral: mailbox pool size, the split
//! between the receive and transmit groups, and the classic CAN payload limit.
use core::ops::Range;

/// Number of hardware mailboxes provided by the peripheral.
pub const MAILBOX_COUNT: usize = 32;

/// Mailboxes dedicated to reception. Slot `i` accepts `FrameShape::ALL[i % 4]`.
pub const RECEIVE_GROUP: Range<usize> = 0..28;

/// Mailboxes dedicated to transmission, served round-robin.
pub const TRANSMIT_GROUP: Range<usize> = 28..MAILBOX_COUNT;

/// Number of slots in the transmit group.
pub const TRANSMIT_GROUP_LEN: usize = MAILBOX_COUNT - TRANSMIT_GROUP.start;

/// Largest payload of a classic CAN data frame.
pub const MAX_PAYLOAD_LEN: usize = 8;

/// Bit mask selecting the receive group in the mailbox interrupt-enable register.
pub const RECEIVE_INTERRUPT_MASK: u32 = (1 << RECEIVE_GROUP.end) - 1;

/// Bit mask selecting the transmit group in the mailbox interrupt-enable register.
pub const TRANSMIT_INTERRUPT_MASK: u32 = !RECEIVE_INTERRUPT_MASK;
