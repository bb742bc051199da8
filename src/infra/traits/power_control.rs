//! Power and pin-configuration collaborator: hands the peripheral clock gate
//! and the RX/TX pins to the driver for the lifetime of a `start`.

/// Identifier of a peripheral instance as known by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralId(pub u8);

/// Contract to power a peripheral and route its pins.
pub trait PowerControl {
    type Error: core::fmt::Debug;
    /// Enable the module clock and configure its pins.
    fn acquire(&mut self, peripheral: PeripheralId) -> Result<(), Self::Error>;
    /// Undo `acquire`.
    fn release(&mut self, peripheral: PeripheralId);
}
