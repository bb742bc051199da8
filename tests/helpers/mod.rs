/// Test doubles simulating the CAN peripheral and its board collaborators
/// during integration tests.
use rcan_core::driver::controller::ControllerMode;
use rcan_core::driver::frame::CanFrame;
use rcan_core::infra::mailbox_ram::{MailboxControl, MailboxRecord};
use rcan_core::infra::traits::{
    bus_timer::BusTimer,
    can_peripheral::{BusState, CanPeripheral, ErrorCounters},
    clock_source::ClockSource,
    interrupt_controller::{InterruptController, InterruptVector, Priority},
    power_control::{PeripheralId, PowerControl},
};
use rcan_core::layout::{MAILBOX_COUNT, RECEIVE_GROUP, TRANSMIT_GROUP};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::time::{sleep, Duration};

//==================================================================================SIMULATED_CAN

#[allow(dead_code)]
/// Register-level model of the controller. Mode requests are acknowledged
/// immediately; frames are injected with `deliver` and transmissions are
/// completed with `complete_transmissions`.
pub struct SimulatedCan {
    mode: Cell<ControllerMode>,
    bit_config: Cell<Option<u32>>,
    mailboxes: RefCell<[MailboxRecord; MAILBOX_COUNT]>,
    controls: RefCell<[MailboxControl; MAILBOX_COUNT]>,
    masks: RefCell<[u32; MAILBOX_COUNT]>,
    interrupt_enable: Cell<u32>,
    counters: Cell<ErrorCounters>,
    state: Cell<BusState>,
    timestamp: Cell<u16>,
    writes: Cell<usize>,
    control_log: RefCell<Vec<(usize, MailboxControl)>>,
    sent: RefCell<Vec<CanFrame>>,
}

#[allow(dead_code)]
impl SimulatedCan {
    pub fn new() -> Self {
        Self {
            mode: Cell::new(ControllerMode::Reset),
            bit_config: Cell::new(None),
            mailboxes: RefCell::new([MailboxRecord::default(); MAILBOX_COUNT]),
            controls: RefCell::new([MailboxControl::EMPTY; MAILBOX_COUNT]),
            masks: RefCell::new([u32::MAX; MAILBOX_COUNT]),
            interrupt_enable: Cell::new(0),
            counters: Cell::new(ErrorCounters::default()),
            state: Cell::new(BusState::default()),
            timestamp: Cell::new(0),
            writes: Cell::new(0),
            control_log: RefCell::new(Vec::new()),
            sent: RefCell::new(Vec::new()),
        }
    }

    /// Number of register writes performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    pub fn current_mode(&self) -> ControllerMode {
        self.mode.get()
    }

    pub fn bit_config(&self) -> Option<u32> {
        self.bit_config.get()
    }

    pub fn interrupt_enable(&self) -> u32 {
        self.interrupt_enable.get()
    }

    pub fn control(&self, index: usize) -> MailboxControl {
        self.controls.borrow()[index]
    }

    pub fn acceptance(&self, index: usize) -> (MailboxRecord, u32) {
        (self.mailboxes.borrow()[index], self.masks.borrow()[index])
    }

    /// Every control write, in order.
    pub fn control_log(&self) -> Vec<(usize, MailboxControl)> {
        self.control_log.borrow().clone()
    }

    pub fn clear_control_log(&self) {
        self.control_log.borrow_mut().clear();
    }

    /// Put a frame from the bus into the lowest armed receive slot accepting
    /// its shape. Returns `false` when no such slot is free (hardware overrun).
    pub fn deliver(&self, frame: &CanFrame) -> bool {
        let mut record = frame.to_mailbox();
        let shape = record.shape();
        let slot = RECEIVE_GROUP.find(|&index| {
            self.controls.borrow()[index] == MailboxControl::RECEIVE_REQUEST
                && self.mailboxes.borrow()[index].shape() == shape
        });
        let Some(index) = slot else {
            return false;
        };

        let stamp = self.timestamp.get().wrapping_add(1);
        self.timestamp.set(stamp);
        record.timestamp = stamp;
        self.mailboxes.borrow_mut()[index] = record;
        self.controls.borrow_mut()[index] =
            MailboxControl::RECEIVE_REQUEST.with(MailboxControl::COMPLETE);
        true
    }

    /// Finish every transmission in flight, in slot order. Returns how many
    /// frames went out.
    pub fn complete_transmissions(&self) -> usize {
        let mut completed = 0;
        for index in TRANSMIT_GROUP {
            let control = self.controls.borrow()[index];
            if control.transmitting() {
                let frame = CanFrame::from_mailbox(&self.mailboxes.borrow()[index]);
                self.sent.borrow_mut().push(frame);
                self.controls.borrow_mut()[index] = control.with(MailboxControl::COMPLETE);
                completed += 1;
            }
        }
        completed
    }

    /// Frames put on the bus so far.
    pub fn sent(&self) -> Vec<CanFrame> {
        self.sent.borrow().clone()
    }

    /// Transmit slots currently requesting transmission.
    pub fn transmitting_slots(&self) -> Vec<usize> {
        TRANSMIT_GROUP
            .filter(|&index| self.controls.borrow()[index].transmitting())
            .collect()
    }

    pub fn set_error_counters(&self, receive: u8, transmit: u8) {
        self.counters.set(ErrorCounters { receive, transmit });
    }

    pub fn set_bus_state(&self, state: BusState) {
        self.state.set(state);
    }

    fn count_write(&self) {
        self.writes.set(self.writes.get() + 1);
    }
}

impl CanPeripheral for SimulatedCan {
    fn request_mode(&self, mode: ControllerMode) {
        self.count_write();
        self.mode.set(mode);
    }

    fn mode_acknowledged(&self, mode: ControllerMode) -> bool {
        self.mode.get() == mode
    }

    fn write_bit_config(&self, value: u32) {
        self.count_write();
        self.bit_config.set(Some(value));
    }

    fn read_mailbox(&self, index: usize) -> MailboxRecord {
        self.mailboxes.borrow()[index]
    }

    fn write_mailbox(&self, index: usize, record: &MailboxRecord) {
        self.count_write();
        self.mailboxes.borrow_mut()[index] = *record;
    }

    fn read_control(&self, index: usize) -> MailboxControl {
        self.controls.borrow()[index]
    }

    fn write_control(&self, index: usize, control: MailboxControl) {
        self.count_write();
        self.control_log.borrow_mut().push((index, control));
        self.controls.borrow_mut()[index] = control;
    }

    fn write_acceptance_mask(&self, index: usize, mask: u32) {
        self.count_write();
        self.masks.borrow_mut()[index] = mask;
    }

    fn write_interrupt_enable(&self, mask: u32) {
        self.count_write();
        self.interrupt_enable.set(mask);
    }

    fn error_counters(&self) -> ErrorCounters {
        self.counters.get()
    }

    fn bus_state(&self) -> BusState {
        self.state.get()
    }
}

//==================================================================================COLLABORATORS

#[allow(dead_code)]
/// Fixed clock tree.
pub struct MockClock {
    pub peripheral_hz: u32,
    pub crystal_hz: Option<u32>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn new(peripheral_hz: u32) -> Self {
        Self {
            peripheral_hz,
            crystal_hz: None,
        }
    }
}

impl ClockSource for MockClock {
    fn peripheral_clock_hz(&self) -> u32 {
        self.peripheral_hz
    }

    fn crystal_clock_hz(&self) -> Option<u32> {
        self.crystal_hz
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
/// Error returned by a refusing `MockPower`.
pub struct PowerFault;

#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct PowerLog {
    pub acquired: Vec<PeripheralId>,
    pub released: Vec<PeripheralId>,
    pub refuse: bool,
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// Power collaborator recording every call; clones share the same log.
pub struct MockPower {
    pub log: Rc<RefCell<PowerLog>>,
}

#[allow(dead_code)]
impl MockPower {
    pub fn refusing() -> Self {
        let power = Self::default();
        power.log.borrow_mut().refuse = true;
        power
    }
}

impl PowerControl for MockPower {
    type Error = PowerFault;

    fn acquire(&mut self, peripheral: PeripheralId) -> Result<(), Self::Error> {
        let mut log = self.log.borrow_mut();
        if log.refuse {
            return Err(PowerFault);
        }
        log.acquired.push(peripheral);
        Ok(())
    }

    fn release(&mut self, peripheral: PeripheralId) {
        self.log.borrow_mut().released.push(peripheral);
    }
}

#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct InterruptLog {
    pub registered: Vec<(InterruptVector, Priority)>,
    pub disabled: Vec<InterruptVector>,
    pub pended: Vec<InterruptVector>,
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// Interrupt controller recording every call; clones share the same log.
pub struct MockInterrupts {
    pub log: Rc<RefCell<InterruptLog>>,
}

impl InterruptController for MockInterrupts {
    fn register(&mut self, vector: InterruptVector, priority: Priority) {
        self.log.borrow_mut().registered.push((vector, priority));
    }

    fn disable(&mut self, vector: InterruptVector) {
        self.log.borrow_mut().disabled.push(vector);
    }

    fn pend(&mut self, vector: InterruptVector) {
        self.log.borrow_mut().pended.push(vector);
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time::sleep` to drive delays in tests.
pub struct MockTimer;

impl BusTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}
