//! CAN driver façade: start-up, transmission with backpressure, reception,
//! error counters and teardown.
//!
//! A driver is one owned instance per physical controller. It is created from
//! pre-allocated [`DriverResources`] and split into two halves:
//!
//! * [`CanDriver`], used from the foreground;
//! * [`MailboxManager`], whose two handlers are bound to the interrupt vectors.
//!
//! The halves only share the lock-free single-producer/single-consumer queues,
//! the lost-frame counter and the receive signal. No allocation is performed
//! by the library and there is no dependency on a particular BSP.
pub mod config;
pub mod controller;
pub mod frame;
pub mod mailbox;

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_can::{ExtendedId, Id, StandardId};
use heapless::spsc::{Consumer, Producer, Queue};

use crate::error::{ConfigurationError, ModeError, SendError};
use crate::infra::timing::BitTiming;
use crate::infra::traits::{
    can_peripheral::{BusState, CanPeripheral, ErrorCounters},
    clock_source::ClockSource,
    frame_source::FrameSource,
    interrupt_controller::{InterruptController, InterruptVector},
    power_control::PowerControl,
};
use crate::layout::{RECEIVE_INTERRUPT_MASK, TRANSMIT_GROUP, TRANSMIT_INTERRUPT_MASK};
use config::{DriverConfig, InterruptConfig};
use controller::{Controller, ControllerMode};
use frame::CanFrame;
pub use mailbox::MailboxManager;

//==================================================================================DRIVER_RESOURCES

/// Storage shared by the two halves of a driver.
///
/// `RX` and `TX` size the software queues; one slot of each is kept free to
/// tell a full ring from an empty one, so a queue holds at most `N - 1` frames.
pub struct DriverResources<const RX: usize, const TX: usize> {
    rx_queue: Queue<CanFrame, RX>,
    tx_queue: Queue<CanFrame, TX>,
    lost_frames: AtomicU32,
    stale_frames: AtomicUsize,
    rx_signal: Signal<CriticalSectionRawMutex, ()>,
}

impl<const RX: usize, const TX: usize> DriverResources<RX, TX> {
    pub const fn new() -> Self {
        Self {
            rx_queue: Queue::new(),
            tx_queue: Queue::new(),
            lost_frames: AtomicU32::new(0),
            stale_frames: AtomicUsize::new(0),
            rx_signal: Signal::new(),
        }
    }
}

impl<const RX: usize, const TX: usize> Default for DriverResources<RX, TX> {
    fn default() -> Self {
        Self::new()
    }
}

//==================================================================================CAN_DRIVER

/// Foreground half of the driver.
pub struct CanDriver<'a, P, K, W, I, const RX: usize, const TX: usize>
where
    P: CanPeripheral,
    K: ClockSource,
    W: PowerControl,
    I: InterruptController,
{
    peripheral: &'a P,
    controller: Controller<'a, P>,
    clock: K,
    power: W,
    interrupts: I,
    config: DriverConfig,
    rx_queue: Consumer<'a, CanFrame, RX>,
    tx_queue: Producer<'a, CanFrame, TX>,
    lost_frames: &'a AtomicU32,
    stale_frames: &'a AtomicUsize,
    rx_signal: &'a Signal<CriticalSectionRawMutex, ()>,
    started: bool,
}

impl<'a, P, K, W, I, const RX: usize, const TX: usize> CanDriver<'a, P, K, W, I, RX, TX>
where
    P: CanPeripheral,
    K: ClockSource,
    W: PowerControl,
    I: InterruptController,
{
    /// Create the driver and its interrupt-side half. Touches no hardware.
    pub fn new(
        peripheral: &'a P,
        resources: &'a mut DriverResources<RX, TX>,
        clock: K,
        power: W,
        interrupts: I,
        config: DriverConfig,
    ) -> (Self, MailboxManager<'a, P, RX, TX>) {
        let DriverResources {
            rx_queue,
            tx_queue,
            lost_frames,
            stale_frames,
            rx_signal,
        } = resources;
        let lost_frames: &'a AtomicU32 = lost_frames;
        let stale_frames: &'a AtomicUsize = stale_frames;
        let rx_signal: &'a Signal<CriticalSectionRawMutex, ()> = rx_signal;
        let (rx_producer, rx_consumer) = rx_queue.split();
        let (tx_producer, tx_consumer) = tx_queue.split();

        let driver = Self {
            peripheral,
            controller: Controller::new(peripheral),
            clock,
            power,
            interrupts,
            config,
            rx_queue: rx_consumer,
            tx_queue: tx_producer,
            lost_frames,
            stale_frames,
            rx_signal,
            started: false,
        };
        let mailboxes = MailboxManager::new(
            peripheral,
            rx_producer,
            tx_consumer,
            lost_frames,
            stale_frames,
            rx_signal,
        );
        (driver, mailboxes)
    }

    //==================================================================================Lifecycle
    /// Bring the controller from power-off to `Operation` at `bit_rate`.
    ///
    /// Order: validate interrupt priorities, acquire the peripheral, compute
    /// the bit timing, program the dividers in `Reset`, configure both mailbox
    /// groups, register the two interrupts, enter `Operation`, arm the receive
    /// group. On failure every acquired resource is released before returning;
    /// a rejected interrupt configuration touches nothing at all.
    pub fn start(
        &mut self,
        bit_rate: u32,
        interrupts: InterruptConfig,
    ) -> Result<(), ConfigurationError<W::Error>> {
        if self.started {
            return Err(ConfigurationError::AlreadyStarted);
        }
        if let Some(direction) = interrupts.disabled_direction() {
            #[cfg(feature = "defmt")]
            defmt::warn!("CAN start rejected: {} interrupt disabled", direction);
            return Err(ConfigurationError::InterruptDisabled { direction });
        }

        let peripheral_id = self.config.peripheral;
        self.power
            .acquire(peripheral_id)
            .map_err(ConfigurationError::ResourceAcquisition)?;

        let timing = match BitTiming::calculate(
            self.clock.peripheral_clock_hz(),
            bit_rate,
            self.clock.crystal_clock_hz(),
        ) {
            Ok(timing) => timing,
            Err(err) => {
                self.power.release(peripheral_id);
                return Err(err.into());
            }
        };

        self.controller.configure(timing);
        mailbox::configure_groups(self.peripheral);
        self.peripheral
            .write_interrupt_enable(RECEIVE_INTERRUPT_MASK | TRANSMIT_INTERRUPT_MASK);
        self.interrupts
            .register(InterruptVector::Receive, interrupts.receive);
        self.interrupts
            .register(InterruptVector::Transmit, interrupts.transmit);

        self.controller
            .transition(ControllerMode::Operation)
            .map_err(|err| {
                self.teardown();
                ConfigurationError::Mode(err)
            })?;
        mailbox::arm_receive_group(self.peripheral);
        self.started = true;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "CAN started at {} bit/s (TQ {}, BRP {})",
            bit_rate,
            timing.time_quanta(),
            timing.brp
        );
        Ok(())
    }

    /// Disable both interrupts, force `Reset` and release the peripheral.
    /// Frames still queued in either direction belong to this session and are
    /// discarded. Foreground use must be quiesced by the caller first.
    pub fn destroy(&mut self) {
        if !self.started {
            return;
        }
        self.teardown();

        #[cfg(feature = "defmt")]
        defmt::info!("CAN driver destroyed");
    }

    fn teardown(&mut self) {
        self.interrupts.disable(InterruptVector::Receive);
        self.interrupts.disable(InterruptVector::Transmit);
        self.peripheral.write_interrupt_enable(0);
        self.controller.force_reset();
        mailbox::disarm_all(self.peripheral);
        self.controller.clear_timing();

        // The transmit consumer lives in the interrupt half: mark what it
        // still holds so its next run skips it.
        self.stale_frames.store(self.tx_queue.len(), Ordering::Relaxed);
        while self.rx_queue.dequeue().is_some() {}
        self.rx_signal.reset();

        self.power.release(self.config.peripheral);
        self.started = false;
    }

    /// Operator-requested mode change (see [`ControllerMode::can_transition_to`]).
    /// Frames aborted on the way out of `Operation` are sent again on return;
    /// returning also re-arms the idle receive slots and kicks the transmit
    /// handler for frames queued in the meantime.
    pub fn request_mode(&mut self, mode: ControllerMode) -> Result<(), ModeError> {
        if !self.started {
            return Err(ModeError::NotStarted);
        }
        self.controller.transition(mode)?;
        if mode == ControllerMode::Operation {
            mailbox::arm_receive_group(self.peripheral);
            if self.tx_queue.len() > 0 && mailbox::transmit_group_idle(self.peripheral) {
                self.interrupts.pend(InterruptVector::Transmit);
            }
        }
        Ok(())
    }

    //==================================================================================Transmission
    /// Queue a frame for transmission.
    ///
    /// An empty payload builds a remote frame; payloads longer than eight bytes
    /// are truncated to eight. When the queue is nearly full the call spins until
    /// it drains (bounded by the configured spin limit) instead of dropping the
    /// frame; `QueueFull` is only returned if no room appeared.
    pub fn send(&mut self, identifier: u32, payload: &[u8], extended: bool) -> Result<(), SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        let id = build_id(identifier, extended)?;
        let frame = if payload.is_empty() {
            CanFrame::new_remote(id)
        } else {
            CanFrame::new_data_truncated(id, payload)
        };
        self.transmit(frame)
    }

    /// Queue an already built frame.
    ///
    /// Outside `Operation` the frame is only queued; it goes out once the
    /// controller is back on the bus.
    pub fn transmit(&mut self, frame: CanFrame) -> Result<(), SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        let operating = self.controller.mode() == ControllerMode::Operation;

        // Nothing queued and nothing on the bus: load the first slot directly.
        if operating
            && self.tx_queue.len() == 0
            && mailbox::transmit_group_idle(self.peripheral)
        {
            mailbox::load_transmit(self.peripheral, TRANSMIT_GROUP.start, &frame);
            return Ok(());
        }

        if operating {
            self.apply_backpressure();
        }
        self.tx_queue.enqueue(frame).map_err(|_| {
            #[cfg(feature = "defmt")]
            defmt::warn!("CAN tx queue still full after backpressure wait");
            SendError::QueueFull
        })?;

        // The slot that would have picked this frame up may have completed
        // between the idle check and the enqueue.
        if operating && mailbox::transmit_group_idle(self.peripheral) {
            self.interrupts.pend(InterruptVector::Transmit);
        }
        Ok(())
    }

    /// Spin while the transmit queue sits above its high-water mark, until it
    /// drains to the low-water mark or the spin limit is reached.
    fn apply_backpressure(&self) {
        let capacity = TX - 1;
        let backpressure = self.config.backpressure;
        if self.tx_queue.len() < backpressure.high_water(capacity) {
            return;
        }

        let low_water = backpressure.low_water(capacity);
        let mut spins = 0;
        while self.tx_queue.len() > low_water && spins < backpressure.spin_limit {
            core::hint::spin_loop();
            spins += 1;
        }
    }

    //==================================================================================Reception
    /// Next received frame, or `None` if the receive queue is empty.
    pub fn get_received_frame(&mut self) -> Option<CanFrame> {
        self.rx_queue.dequeue()
    }

    /// Wait for the next received frame.
    pub async fn receive(&mut self) -> CanFrame {
        loop {
            if let Some(frame) = self.rx_queue.dequeue() {
                return frame;
            }
            self.rx_signal.wait().await;
        }
    }

    //==================================================================================Status
    /// Hardware receive and transmit error counters.
    pub fn get_error_counters(&self) -> ErrorCounters {
        self.peripheral.error_counters()
    }

    /// Hardware fault confinement state.
    pub fn bus_state(&self) -> BusState {
        self.peripheral.bus_state()
    }

    /// Frames dropped by the receive handler because the queue was full.
    pub fn get_lost_receive_count(&self) -> u32 {
        self.lost_frames.load(Ordering::Relaxed)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn mode(&self) -> ControllerMode {
        self.controller.mode()
    }

    /// Bit timing applied by the running `start`.
    pub fn bit_timing(&self) -> Option<BitTiming> {
        self.controller.timing()
    }

    /// Frames accepted by `send` and not loaded into a transmit slot yet:
    /// the transmit queue plus the frames held while off the bus.
    pub fn pending_transmissions(&self) -> usize {
        let stale = self.stale_frames.load(Ordering::Relaxed);
        self.tx_queue.len().saturating_sub(stale) + self.controller.held_transmissions()
    }
}

impl<'a, P, K, W, I, const RX: usize, const TX: usize> FrameSource
    for CanDriver<'a, P, K, W, I, RX, TX>
where
    P: CanPeripheral,
    K: ClockSource,
    W: PowerControl,
    I: InterruptController,
{
    fn try_receive(&mut self) -> Option<CanFrame> {
        self.get_received_frame()
    }

    fn receive<'b>(&'b mut self) -> impl core::future::Future<Output = CanFrame> + 'b {
        CanDriver::receive(self)
    }
}

/// Identifier of the requested format, rejecting values that do not fit.
fn build_id(identifier: u32, extended: bool) -> Result<Id, SendError> {
    let id = if extended {
        ExtendedId::new(identifier).map(Id::Extended)
    } else {
        u16::try_from(identifier)
            .ok()
            .and_then(StandardId::new)
            .map(Id::Standard)
    };
    id.ok_or(SendError::InvalidIdentifier { id: identifier })
}
