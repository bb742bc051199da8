//! `rcan-core` library: interrupt-driven driver for a 32-mailbox classic CAN
//! controller in a `no_std` environment. The crate exposes the hardware
//! abstractions (register access, clock, power, interrupts), the bit-timing
//! calculator, the driver itself, and a traffic analyzer built on top of it.
#![no_std]
//==================================================================================
/// Fixed mailbox layout of the peripheral.
pub mod layout;
/// Errors raised by timing, start-up, transmission, and mode changes.
pub mod error;
/// Register images, bit timing, and the board collaborator traits.
pub mod infra;
/// Frame model, controller state machine, mailbox handling, and the driver.
pub mod driver;
/// Traffic analysis over the received stream.
pub mod diagnostics;
//==================================================================================
pub use diagnostics::traffic_analyzer::{TrafficAnalyzer, TrafficEntry, TrafficSummary};
pub use driver::config::{Backpressure, DriverConfig, InterruptConfig};
pub use driver::controller::ControllerMode;
pub use driver::frame::CanFrame;
pub use driver::{CanDriver, DriverResources, MailboxManager};
