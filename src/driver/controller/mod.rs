//! Controller state machine: the bus-level operating mode and the transitions
//! between Reset, Halt, Operation and Sleep.
//!
//! Every transition busy-polls the hardware status until the new mode is
//! confirmed. There is no timeout: a stuck acknowledgement is left to the
//! system watchdog.
use crate::driver::mailbox::{self, HeldFrames};
use crate::error::ModeError;
use crate::infra::timing::BitTiming;
use crate::infra::traits::can_peripheral::CanPeripheral;

/// Operating mode of the CAN controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerMode {
    /// Configuration mode; the bit timing can only be written here.
    Reset,
    /// Diagnostic pause, off the bus with configuration retained.
    Halt,
    /// Normal bus participation.
    Operation,
    /// Low power, bus monitoring suspended until woken.
    Sleep,
}

impl ControllerMode {
    /// Edges of the state machine.
    pub fn can_transition_to(self, target: ControllerMode) -> bool {
        use ControllerMode::*;
        matches!(
            (self, target),
            (Reset, Operation)
                | (Reset, Halt)
                | (Reset, Sleep)
                | (Operation, Reset)
                | (Operation, Halt)
                | (Halt, Operation)
                | (Halt, Reset)
                | (Sleep, Reset)
        )
    }
}

/// Tracks the mode and the bit timing applied to one controller.
pub struct Controller<'a, P: CanPeripheral> {
    peripheral: &'a P,
    mode: ControllerMode,
    timing: Option<BitTiming>,
    /// Frames aborted on the way out of `Operation`, sent again on return.
    held: HeldFrames,
}

impl<'a, P: CanPeripheral> Controller<'a, P> {
    /// Wrap the peripheral. Nothing is written until a transition is requested.
    pub fn new(peripheral: &'a P) -> Self {
        Self {
            peripheral,
            mode: ControllerMode::Reset,
            timing: None,
            held: HeldFrames::new(),
        }
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    /// Timing applied by the last `configure`, if any.
    pub fn timing(&self) -> Option<BitTiming> {
        self.timing
    }

    /// Frames waiting to be loaded again when `Operation` resumes.
    pub fn held_transmissions(&self) -> usize {
        self.held.len()
    }

    /// Put the hardware in `Reset` and program the divider registers.
    pub fn configure(&mut self, timing: BitTiming) {
        self.force_reset();
        self.peripheral.write_bit_config(timing.to_register());
        self.timing = Some(timing);
    }

    /// Request `target` through a valid edge and wait for the acknowledgement.
    /// Leaving `Operation` first quiesces the transmit group and keeps the
    /// aborted frames; entering it loads them back into the transmit slots.
    pub fn transition(&mut self, target: ControllerMode) -> Result<(), ModeError> {
        if self.mode == target {
            return Ok(());
        }
        if !self.mode.can_transition_to(target) {
            return Err(ModeError::InvalidTransition {
                from: self.mode,
                to: target,
            });
        }
        if target == ControllerMode::Operation && self.timing.is_none() {
            return Err(ModeError::NotStarted);
        }

        if self.mode == ControllerMode::Operation {
            for frame in mailbox::quiesce_transmit_group(self.peripheral) {
                let _ = self.held.push(frame);
            }
        }
        self.enter(target);
        if target == ControllerMode::Operation && !self.held.is_empty() {
            mailbox::reload_transmit(self.peripheral, &mut self.held);
        }
        Ok(())
    }

    /// Return to `Reset` from any mode, bypassing the edge checks. Used at
    /// start-up and teardown; frames in the transmit slots are discarded.
    pub fn force_reset(&mut self) {
        if self.mode == ControllerMode::Operation {
            mailbox::quiesce_transmit_group(self.peripheral);
        }
        self.held.clear();
        self.enter(ControllerMode::Reset);
    }

    /// Forget the applied timing; `Operation` is unreachable until reconfigured.
    pub fn clear_timing(&mut self) {
        self.timing = None;
    }

    fn enter(&mut self, target: ControllerMode) {
        #[cfg(feature = "defmt")]
        defmt::debug!("CAN mode {} -> {}", self.mode, target);

        self.peripheral.request_mode(target);
        while !self.peripheral.mode_acknowledged(target) {
            core::hint::spin_loop();
        }
        self.mode = target;
    }
}
