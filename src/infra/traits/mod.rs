//! Abstraction traits separating the driver from the board: register access,
//! clock, power/pin control, interrupt controller, timer, and frame stream.
pub mod bus_timer;
pub mod can_peripheral;
pub mod clock_source;
pub mod frame_source;
pub mod interrupt_controller;
pub mod power_control;
