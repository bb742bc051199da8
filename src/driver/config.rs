//! Driver configuration: interrupt priorities, the peripheral handed to the
//! power collaborator, and the transmit backpressure thresholds.
pub use crate::infra::traits::interrupt_controller::Priority;
pub use crate::infra::traits::power_control::PeripheralId;

/// Transfer direction, used to report which interrupt was misconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Receive,
    Transmit,
}

/// Interrupt priority for each direction. Both are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptConfig {
    pub receive: Priority,
    pub transmit: Priority,
}

impl InterruptConfig {
    /// Both directions at the same level.
    pub const fn uniform(priority: Priority) -> Self {
        Self {
            receive: priority,
            transmit: priority,
        }
    }

    /// First direction left disabled, if any.
    pub fn disabled_direction(&self) -> Option<Direction> {
        if self.receive.is_disabled() {
            Some(Direction::Receive)
        } else if self.transmit.is_disabled() {
            Some(Direction::Transmit)
        } else {
            None
        }
    }
}

/// Bounded wait applied by `send` when the transmit queue is nearly full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Backpressure {
    /// The wait starts once fewer than `capacity / headroom_divisor` slots remain.
    pub headroom_divisor: usize,
    /// The wait ends once the queue holds at most `capacity / resume_divisor` frames.
    pub resume_divisor: usize,
    /// Maximum number of polls before giving up on the drain.
    pub spin_limit: u32,
}

impl Backpressure {
    /// Queue length at which `send` starts waiting.
    pub fn high_water(&self, capacity: usize) -> usize {
        capacity - capacity / self.headroom_divisor.max(1)
    }

    /// Queue length at which a waiting `send` resumes.
    pub fn low_water(&self, capacity: usize) -> usize {
        capacity / self.resume_divisor.max(1)
    }
}

impl Default for Backpressure {
    fn default() -> Self {
        Self {
            headroom_divisor: 16,
            resume_divisor: 2,
            spin_limit: 10_000,
        }
    }
}

/// Static driver settings: which peripheral instance to power up and how
/// `send` waits on a nearly full transmit queue.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    /// Peripheral instance acquired from the power collaborator.
    pub peripheral: PeripheralId,
    /// Watermarks and spin limit for `send` on a nearly full transmit queue.
    pub backpressure: Backpressure,
}

impl DriverConfig {
    pub fn with_peripheral(mut self, peripheral: PeripheralId) -> Self {
        self.peripheral = peripheral;
        self
    }

    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }
}
