//! Transmit path: direct arming, queueing, round-robin refill, backpressure
//! and what happens to frames across a Halt.
mod helpers {
    include!("helpers/mod.rs");
}
use helpers::{MockClock, MockInterrupts, MockPower, SimulatedCan};
use rcan_core::driver::config::{Backpressure, DriverConfig, InterruptConfig, Priority};
use rcan_core::driver::controller::ControllerMode;
use rcan_core::driver::{CanDriver, DriverResources};
use rcan_core::error::SendError;
use rcan_core::infra::mailbox_ram::MailboxControl;
use rcan_core::infra::traits::can_peripheral::CanPeripheral;
use rcan_core::infra::traits::interrupt_controller::InterruptVector;
use rcan_core::layout::TRANSMIT_GROUP;

const PRIORITIES: InterruptConfig = InterruptConfig::uniform(Priority(4));

#[test]
fn test_send_requires_start() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 8>::new();
    let (mut driver, _mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        MockInterrupts::default(),
        DriverConfig::default(),
    );

    assert_eq!(driver.send(0x100, &[1], false), Err(SendError::NotStarted));
    assert_eq!(regs.write_count(), 0);
}

#[test]
/// With nothing queued and nothing in flight the first transmit slot is
/// loaded directly, without going through the queue.
fn test_first_frame_armed_directly() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 8>::new();
    let interrupts = MockInterrupts::default();
    let (mut driver, _mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        interrupts.clone(),
        DriverConfig::default(),
    );
    driver.start(500_000, PRIORITIES).unwrap();

    driver.send(0x0AB, &[1, 2, 3], false).unwrap();

    assert_eq!(driver.pending_transmissions(), 0);
    assert_eq!(regs.transmitting_slots(), vec![TRANSMIT_GROUP.start]);
    assert!(interrupts.log.borrow().pended.is_empty());

    regs.complete_transmissions();
    let sent = regs.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].raw_id(), 0x0AB);
    assert!(!sent[0].is_extended());
    assert_eq!(sent[0].payload(), &[1, 2, 3]);
}

#[test]
fn test_payload_truncated_and_empty_payload_is_remote() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 8>::new();
    let (mut driver, mut mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        MockInterrupts::default(),
        DriverConfig::default(),
    );
    driver.start(500_000, PRIORITIES).unwrap();

    driver
        .send(0x1ABC_DEF0, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9], true)
        .unwrap();
    regs.complete_transmissions();
    mailboxes.on_transmit();

    driver.send(0x7FF, &[], false).unwrap();
    regs.complete_transmissions();

    let sent = regs.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].is_extended());
    assert_eq!(sent[0].payload(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    assert!(sent[1].is_remote());
    assert!(sent[1].is_empty());
}

#[test]
fn test_identifier_out_of_range() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 8>::new();
    let (mut driver, _mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        MockInterrupts::default(),
        DriverConfig::default(),
    );
    driver.start(500_000, PRIORITIES).unwrap();

    assert_eq!(
        driver.send(0x800, &[1], false),
        Err(SendError::InvalidIdentifier { id: 0x800 })
    );
    assert_eq!(
        driver.send(0x2000_0000, &[1], true),
        Err(SendError::InvalidIdentifier { id: 0x2000_0000 })
    );
    assert!(regs.transmitting_slots().is_empty());
}

#[test]
/// Queued frames go out in order, each completion refilling the next slot
/// of the group.
fn test_queue_drained_round_robin() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 16>::new();
    let (mut driver, mut mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        MockInterrupts::default(),
        DriverConfig::default(),
    );
    driver.start(500_000, PRIORITIES).unwrap();

    for i in 0..6u8 {
        driver.send(0x200, &[i], false).unwrap();
    }
    assert_eq!(driver.pending_transmissions(), 5);

    let mut slots = Vec::new();
    while regs.sent().len() < 6 {
        slots.extend(regs.transmitting_slots());
        assert_eq!(regs.complete_transmissions(), 1);
        mailboxes.on_transmit();
    }

    let start = TRANSMIT_GROUP.start;
    assert_eq!(
        slots,
        vec![start, start + 1, start + 2, start + 3, start, start + 1]
    );
    let payloads: Vec<u8> = regs.sent().iter().map(|frame| frame.payload()[0]).collect();
    assert_eq!(payloads, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(driver.pending_transmissions(), 0);
    for index in TRANSMIT_GROUP {
        assert_eq!(regs.control(index), MailboxControl::EMPTY);
    }
}

#[test]
/// An aborted slot is cleared and the next queued frame is loaded.
fn test_aborted_slot_refilled() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 8>::new();
    let (mut driver, mut mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        MockInterrupts::default(),
        DriverConfig::default(),
    );
    driver.start(500_000, PRIORITIES).unwrap();

    driver.send(0x300, &[1], false).unwrap();
    driver.send(0x301, &[2], false).unwrap();
    regs.write_control(
        TRANSMIT_GROUP.start,
        MailboxControl::TRANSMIT_REQUEST.with(MailboxControl::LOST_OR_ABORTED),
    );

    mailboxes.on_transmit();

    assert_eq!(regs.transmitting_slots(), vec![TRANSMIT_GROUP.start + 1]);
    assert_eq!(driver.pending_transmissions(), 0);
    regs.complete_transmissions();
    assert_eq!(regs.sent()[0].raw_id(), 0x301);
}

#[test]
/// When the queue stays full through the whole wait, `send` gives up.
fn test_queue_full_after_spin_limit() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 8>::new();
    let config = DriverConfig::default().with_backpressure(Backpressure {
        spin_limit: 100,
        ..Backpressure::default()
    });
    let (mut driver, _mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        MockInterrupts::default(),
        config,
    );
    driver.start(500_000, PRIORITIES).unwrap();

    // One frame in the mailbox, seven in the queue.
    for i in 0..8u8 {
        driver.send(0x400, &[i], false).unwrap();
    }
    assert_eq!(driver.pending_transmissions(), 7);
    assert_eq!(driver.send(0x400, &[8], false), Err(SendError::QueueFull));
    assert_eq!(driver.pending_transmissions(), 7);
}

#[test]
/// A frame aborted by Halt is loaded again when Operation resumes.
fn test_frame_in_flight_survives_halt() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 8>::new();
    let (mut driver, mut mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        MockInterrupts::default(),
        DriverConfig::default(),
    );
    driver.start(500_000, PRIORITIES).unwrap();

    driver.send(0x300, &[1], false).unwrap();
    driver.request_mode(ControllerMode::Halt).unwrap();
    assert!(regs.transmitting_slots().is_empty());
    assert_eq!(driver.pending_transmissions(), 1);

    driver.request_mode(ControllerMode::Operation).unwrap();
    mailboxes.on_transmit();
    regs.complete_transmissions();

    let sent = regs.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].raw_id(), 0x300);
    assert_eq!(sent[0].payload(), &[1]);
    assert_eq!(driver.pending_transmissions(), 0);
}

#[test]
/// The aborted frame keeps its place ahead of the queued ones.
fn test_halt_keeps_transmit_order() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 8>::new();
    let (mut driver, mut mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        MockInterrupts::default(),
        DriverConfig::default(),
    );
    driver.start(500_000, PRIORITIES).unwrap();

    driver.send(0x500, &[1], false).unwrap();
    driver.send(0x501, &[2], false).unwrap();
    driver.request_mode(ControllerMode::Halt).unwrap();
    driver.send(0x502, &[3], false).unwrap();
    assert_eq!(driver.pending_transmissions(), 3);
    driver.request_mode(ControllerMode::Operation).unwrap();

    while regs.sent().len() < 3 {
        assert_eq!(regs.complete_transmissions(), 1);
        mailboxes.on_transmit();
    }

    let ids: Vec<u32> = regs.sent().iter().map(|frame| frame.raw_id()).collect();
    assert_eq!(ids, vec![0x500, 0x501, 0x502]);
}

#[test]
/// Frames queued while off the bus are picked up by a pended transmit
/// interrupt once Operation resumes.
fn test_frames_queued_while_halted_pend_transmit_interrupt() {
    let regs = SimulatedCan::new();
    let mut resources = DriverResources::<8, 8>::new();
    let interrupts = MockInterrupts::default();
    let (mut driver, mut mailboxes) = CanDriver::new(
        &regs,
        &mut resources,
        MockClock::new(40_000_000),
        MockPower::default(),
        interrupts.clone(),
        DriverConfig::default(),
    );
    driver.start(500_000, PRIORITIES).unwrap();
    driver.request_mode(ControllerMode::Halt).unwrap();

    driver.send(0x501, &[2], false).unwrap();
    driver.send(0x502, &[3], false).unwrap();
    assert!(regs.transmitting_slots().is_empty());
    assert!(interrupts.log.borrow().pended.is_empty());

    driver.request_mode(ControllerMode::Operation).unwrap();
    assert_eq!(
        interrupts.log.borrow().pended,
        vec![InterruptVector::Transmit]
    );

    mailboxes.on_transmit();
    assert_eq!(regs.transmitting_slots(), vec![TRANSMIT_GROUP.start]);
    regs.complete_transmissions();
    mailboxes.on_transmit();
    regs.complete_transmissions();

    let ids: Vec<u32> = regs.sent().iter().map(|frame| frame.raw_id()).collect();
    assert_eq!(ids, vec![0x501, 0x502]);
}
