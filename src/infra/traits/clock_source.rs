//! Clock tree collaborator, consumed read-only by the bit-timing calculator.

/// Frequencies available to the bit-rate generator.
pub trait ClockSource {
    /// Peripheral clock feeding the CAN controller, in Hz.
    fn peripheral_clock_hz(&self) -> u32;
    /// Optional crystal-derived alternate clock, in Hz.
    fn crystal_clock_hz(&self) -> Option<u32> {
        None
    }
}
