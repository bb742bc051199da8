//! Interrupt controller collaborator. The board binds its vector table entries
//! to `MailboxManager::on_receive` / `on_transmit`; this trait only enables,
//! disables and pends those lines.

/// Interrupt lines used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptVector {
    /// Receive mailbox activity.
    Receive,
    /// Transmit mailbox completion.
    Transmit,
}

/// Interrupt priority level. Level `0` keeps the line disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priority(pub u8);

impl Priority {
    pub const DISABLED: Priority = Priority(0);

    pub fn is_disabled(&self) -> bool {
        *self == Self::DISABLED
    }
}

/// Contract to enable and manage the driver's interrupt lines.
pub trait InterruptController {
    /// Enable `vector` at `priority`, with its own level masked while it runs.
    fn register(&mut self, vector: InterruptVector, priority: Priority);
    /// Disable `vector`.
    fn disable(&mut self, vector: InterruptVector);
    /// Mark `vector` pending so its handler runs as soon as it is unmasked.
    fn pend(&mut self, vector: InterruptVector);
}
