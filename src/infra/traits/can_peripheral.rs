//! Register-level access to one CAN controller instance. Implementations map
//! these calls onto memory-mapped registers (or a simulation on the host).
//!
//! Every method takes `&self`: the registers are shared between the
//! foreground and the two interrupt handlers, exactly like the hardware.
use crate::driver::controller::ControllerMode;
use crate::infra::mailbox_ram::{MailboxControl, MailboxRecord};

/// Receive and transmit error counters maintained by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounters {
    /// Receive error counter (REC).
    pub receive: u8,
    /// Transmit error counter (TEC).
    pub transmit: u8,
}

/// Fault confinement state reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    #[default]
    ErrorActive,
    ErrorPassive,
    /// Transmitter disconnected after excessive errors. Recovery is left to the caller.
    BusOff,
}

/// Contract for the CAN controller register block.
pub trait CanPeripheral {
    /// Write the operating mode request bits.
    fn request_mode(&self, mode: ControllerMode);
    /// Status bit confirming the controller entered `mode`.
    fn mode_acknowledged(&self, mode: ControllerMode) -> bool;
    /// Write the bit configuration register. Only valid in `Reset`.
    fn write_bit_config(&self, value: u32);

    /// Read the storage of mailbox `index`.
    fn read_mailbox(&self, index: usize) -> MailboxRecord;
    /// Write the storage of mailbox `index`.
    fn write_mailbox(&self, index: usize, record: &MailboxRecord);
    /// Read the control register of mailbox `index`.
    fn read_control(&self, index: usize) -> MailboxControl;
    /// Write the control register of mailbox `index`.
    fn write_control(&self, index: usize, control: MailboxControl);
    /// Identifier bits compared on reception (`0` accepts every identifier).
    fn write_acceptance_mask(&self, index: usize, mask: u32);
    /// One bit per mailbox; a set bit lets the slot raise its direction's interrupt.
    fn write_interrupt_enable(&self, mask: u32);

    /// Current hardware error counters.
    fn error_counters(&self) -> ErrorCounters;
    /// Current fault confinement state.
    fn bus_state(&self) -> BusState;
}
