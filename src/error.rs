//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (bit timing, start-up,
//! transmission, mode transitions, frame construction).
use crate::driver::config::Direction;
use crate::driver::controller::ControllerMode;
use thiserror_no_std::Error;

//==================================================================================TIMING_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors raised while deriving the bus timing from a clock and a bit rate.
pub enum TimingError {
    /// A bit rate of zero was requested.
    #[error("Invalid bit rate")]
    InvalidBitRate,
    /// Neither clock source divides into the bit rate for any TQ in 8..=25.
    #[error("Indivisible clock: {clock_hz} Hz cannot produce {bit_rate} bit/s")]
    IndivisibleClock { clock_hz: u32, bit_rate: u32 },
    /// `TQ - 1` quanta cannot be split between TSEG1 and TSEG2 within bounds.
    #[error("No valid TSEG1/TSEG2 split for {time_quanta} quanta")]
    NoSegmentSplit { time_quanta: u8 },
}

//==================================================================================START_ERROR
#[derive(Error, Debug)]
/// Errors returned synchronously by `CanDriver::start`. Fatal to that call,
/// nothing is retried internally.
pub enum ConfigurationError<E: core::fmt::Debug> {
    /// Interrupts are mandatory for both directions.
    #[error("{direction:?} interrupt priority is disabled")]
    InterruptDisabled { direction: Direction },
    /// The requested bit rate is not reachable from the available clocks.
    #[error(transparent)]
    BitTiming(#[from] TimingError),
    /// The power/pin collaborator refused to hand over the peripheral.
    #[error("Resource acquisition failed: {0:?}")]
    ResourceAcquisition(E),
    /// The controller refused to enter `Operation`.
    #[error("Mode transition failed: {0}")]
    Mode(ModeError),
    /// `start` was called on a running driver.
    #[error("Driver already started")]
    AlreadyStarted,
}

//==================================================================================SEND_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors encountered when queueing a frame for transmission.
pub enum SendError {
    /// The driver is not in a started state.
    #[error("Driver not started")]
    NotStarted,
    /// Identifier does not fit the requested format (11 or 29 bits).
    #[error("Invalid identifier {id:#x}")]
    InvalidIdentifier { id: u32 },
    /// The transmit queue stayed full for the whole backpressure wait.
    #[error("Transmit queue full")]
    QueueFull,
}

//==================================================================================MODE_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors raised by the controller state machine.
pub enum ModeError {
    /// Operation requires a bit timing applied by `start`.
    #[error("Driver not started")]
    NotStarted,
    /// The requested edge does not exist in the state machine.
    #[error("Invalid mode transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: ControllerMode,
        to: ControllerMode,
    },
}

//==================================================================================FRAME_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures while building a frame by hand.
pub enum FrameError {
    /// Classic CAN carries at most eight payload bytes.
    #[error("Payload too long: {len} bytes")]
    PayloadTooLong { len: usize },
}
