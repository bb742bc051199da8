//! Mailbox manager: owns the receive and transmit groups of hardware
//! mailboxes and moves frames between them and the software queues.
//!
//! [`MailboxManager`] is the interrupt-side half of the driver. It holds the
//! producer end of the receive queue and the consumer end of the transmit
//! queue; the foreground [`CanDriver`](crate::driver::CanDriver) holds the
//! opposite ends. Both handlers run in bounded time: no allocation, no
//! blocking, no shared locks beyond the receive signal's critical section.
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use heapless::spsc::{Consumer, Producer};
use heapless::Vec;

use crate::driver::frame::CanFrame;
use crate::infra::mailbox_ram::{FrameShape, MailboxControl, MailboxRecord, SlotState};
use crate::infra::traits::can_peripheral::CanPeripheral;
use crate::layout::{RECEIVE_GROUP, TRANSMIT_GROUP, TRANSMIT_GROUP_LEN};

//==================================================================================Slots

/// Group a mailbox belongs to for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MailboxGroup {
    /// Receive slot accepting one frame shape.
    Receive(FrameShape),
    Transmit,
}

/// One hardware mailbox and its fixed group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxSlot {
    index: usize,
    group: MailboxGroup,
}

impl MailboxSlot {
    /// Receive slots in index order. Consecutive slots rotate through the four
    /// frame shapes so the group accepts every combination.
    pub fn receive_group() -> impl Iterator<Item = MailboxSlot> {
        RECEIVE_GROUP.map(|index| MailboxSlot {
            index,
            group: MailboxGroup::Receive(FrameShape::ALL[index % FrameShape::ALL.len()]),
        })
    }

    /// Transmit slots in index order.
    pub fn transmit_group() -> impl Iterator<Item = MailboxSlot> {
        TRANSMIT_GROUP.map(|index| MailboxSlot {
            index,
            group: MailboxGroup::Transmit,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn group(&self) -> MailboxGroup {
        self.group
    }
}

//==================================================================================Register helpers

/// Program both groups: receive slots get their acceptance shape and an open
/// identifier mask, every control register is cleared.
pub(crate) fn configure_groups<P: CanPeripheral>(peripheral: &P) {
    for slot in MailboxSlot::receive_group() {
        if let MailboxGroup::Receive(shape) = slot.group {
            peripheral.write_control(slot.index, MailboxControl::EMPTY);
            peripheral.write_mailbox(slot.index, &MailboxRecord::acceptance(shape));
            peripheral.write_acceptance_mask(slot.index, 0);
        }
    }
    for slot in MailboxSlot::transmit_group() {
        peripheral.write_control(slot.index, MailboxControl::EMPTY);
    }
}

/// Arm every idle receive slot. Slots still holding unread data are left alone.
pub(crate) fn arm_receive_group<P: CanPeripheral>(peripheral: &P) {
    for slot in MailboxSlot::receive_group() {
        if peripheral.read_control(slot.index).state() == SlotState::Idle {
            rearm_receive(peripheral, slot.index);
        }
    }
}

/// The request bit has to be dropped and raised as two separate writes.
fn rearm_receive<P: CanPeripheral>(peripheral: &P, index: usize) {
    peripheral.write_control(index, MailboxControl::EMPTY);
    peripheral.write_control(index, MailboxControl::RECEIVE_REQUEST);
}

/// No transmit slot is armed or waiting to be serviced.
pub(crate) fn transmit_group_idle<P: CanPeripheral>(peripheral: &P) -> bool {
    TRANSMIT_GROUP.all(|index| peripheral.read_control(index).state() == SlotState::Idle)
}

/// Encode `frame` into transmit slot `index` and request transmission.
pub(crate) fn load_transmit<P: CanPeripheral>(peripheral: &P, index: usize, frame: &CanFrame) {
    peripheral.write_control(index, MailboxControl::EMPTY);
    peripheral.write_mailbox(index, &frame.to_mailbox());
    peripheral.write_control(index, MailboxControl::TRANSMIT_REQUEST);
}

/// Frames taken back from the transmit group when leaving `Operation`.
pub(crate) type HeldFrames = Vec<CanFrame, TRANSMIT_GROUP_LEN>;

/// Abort pending transmissions and wait for the slots to leave the bus.
///
/// A frame already on the wire finishes and is reported as sent; every other
/// armed frame is read back from mailbox storage and returned, in slot order,
/// so it can be loaded again once the controller is back in `Operation`.
pub(crate) fn quiesce_transmit_group<P: CanPeripheral>(peripheral: &P) -> HeldFrames {
    let mut held = HeldFrames::new();
    for index in TRANSMIT_GROUP {
        if peripheral.read_control(index).transmitting() {
            peripheral.write_control(index, MailboxControl::EMPTY);
            while peripheral.read_control(index).contains(MailboxControl::BUSY) {
                core::hint::spin_loop();
            }
            if !peripheral.read_control(index).contains(MailboxControl::COMPLETE) {
                // At most one frame per slot, the vector cannot overflow.
                let _ = held.push(CanFrame::from_mailbox(&peripheral.read_mailbox(index)));
            }
        }
        peripheral.write_control(index, MailboxControl::EMPTY);
    }
    held
}

/// Load held frames into idle transmit slots, lowest index first. Frames
/// that find no idle slot stay in `held`.
pub(crate) fn reload_transmit<P: CanPeripheral>(peripheral: &P, held: &mut HeldFrames) {
    let mut pending = held.iter().copied();
    let mut kept = HeldFrames::new();
    for index in TRANSMIT_GROUP {
        if peripheral.read_control(index).state() != SlotState::Idle {
            continue;
        }
        let Some(frame) = pending.next() else {
            break;
        };
        load_transmit(peripheral, index, &frame);
    }
    for frame in pending {
        let _ = kept.push(frame);
    }
    *held = kept;
}

/// Clear every control register of both groups.
pub(crate) fn disarm_all<P: CanPeripheral>(peripheral: &P) {
    for index in RECEIVE_GROUP.chain(TRANSMIT_GROUP) {
        peripheral.write_control(index, MailboxControl::EMPTY);
    }
}

//==================================================================================MAILBOX_MANAGER

/// Interrupt-side half of the driver. Bind [`on_receive`](Self::on_receive)
/// and [`on_transmit`](Self::on_transmit) to the receive and transmit vectors.
pub struct MailboxManager<'a, P: CanPeripheral, const RX: usize, const TX: usize> {
    peripheral: &'a P,
    rx_queue: Producer<'a, CanFrame, RX>,
    tx_queue: Consumer<'a, CanFrame, TX>,
    lost_frames: &'a AtomicU32,
    /// Frames left in the transmit queue by a torn-down session.
    stale_frames: &'a AtomicUsize,
    rx_signal: &'a Signal<CriticalSectionRawMutex, ()>,
    /// Offset inside the transmit group of the slot loaded last.
    cursor: usize,
}

impl<'a, P: CanPeripheral, const RX: usize, const TX: usize> MailboxManager<'a, P, RX, TX> {
    pub(crate) fn new(
        peripheral: &'a P,
        rx_queue: Producer<'a, CanFrame, RX>,
        tx_queue: Consumer<'a, CanFrame, TX>,
        lost_frames: &'a AtomicU32,
        stale_frames: &'a AtomicUsize,
        rx_signal: &'a Signal<CriticalSectionRawMutex, ()>,
    ) -> Self {
        Self {
            peripheral,
            rx_queue,
            tx_queue,
            lost_frames,
            stale_frames,
            rx_signal,
            cursor: TRANSMIT_GROUP_LEN - 1,
        }
    }

    /// Receive interrupt handler.
    ///
    /// Drains every receive slot holding new data in index order, re-arms it,
    /// and enqueues the frame. When the queue has no free slot left the frame
    /// is dropped and the lost-frame counter is incremented instead.
    pub fn on_receive(&mut self) {
        let mut delivered = false;

        for index in RECEIVE_GROUP {
            if !self.peripheral.read_control(index).new_data() {
                continue;
            }
            let frame = CanFrame::from_mailbox(&self.peripheral.read_mailbox(index));
            rearm_receive(self.peripheral, index);

            if self.rx_queue.enqueue(frame).is_ok() {
                delivered = true;
            } else {
                // Only this handler writes the counter, no read-modify-write race.
                let lost = self.lost_frames.load(Ordering::Relaxed).saturating_add(1);
                self.lost_frames.store(lost, Ordering::Relaxed);

                #[cfg(feature = "defmt")]
                defmt::trace!("CAN rx queue full, {} frames lost", lost);
            }
        }

        if delivered {
            self.rx_signal.signal(());
        }
    }

    /// Transmit interrupt handler.
    ///
    /// Every completed (or aborted) slot is cleared and, while the transmit
    /// queue has frames, refilled round-robin starting after that slot. When
    /// the group is entirely idle but frames are queued (pended by the
    /// foreground), the next slot after the cursor is loaded. Frames queued
    /// before a `destroy` are discarded first.
    pub fn on_transmit(&mut self) {
        self.discard_stale();

        for offset in 0..TRANSMIT_GROUP_LEN {
            let index = TRANSMIT_GROUP.start + offset;
            let control = self.peripheral.read_control(index);
            let finished = control.sent()
                || (control.contains(MailboxControl::TRANSMIT_REQUEST)
                    && control.contains(MailboxControl::LOST_OR_ABORTED));
            if !finished {
                continue;
            }

            self.peripheral.write_control(index, MailboxControl::EMPTY);
            self.refill_after(offset);
        }

        if transmit_group_idle(self.peripheral) {
            self.refill_after(self.cursor);
        }
    }

    /// Frames dropped so far because the receive queue was full.
    pub fn lost_receive_count(&self) -> u32 {
        self.lost_frames.load(Ordering::Relaxed)
    }

    /// Drop the frames queued before the last teardown. The count is only
    /// written by the foreground while this handler is disabled.
    fn discard_stale(&mut self) {
        let stale = self.stale_frames.load(Ordering::Relaxed);
        if stale == 0 {
            return;
        }
        for _ in 0..stale {
            self.tx_queue.dequeue();
        }
        self.stale_frames.store(0, Ordering::Relaxed);

        #[cfg(feature = "defmt")]
        defmt::trace!("CAN tx discarded {} frames from previous session", stale);
    }

    fn refill_after(&mut self, offset: usize) {
        if !self.tx_queue.ready() {
            return;
        }
        let Some(next) = self.next_idle_slot(offset) else {
            return;
        };
        if let Some(frame) = self.tx_queue.dequeue() {
            load_transmit(self.peripheral, TRANSMIT_GROUP.start + next, &frame);
            self.cursor = next;
        }
    }

    /// First idle transmit slot after `offset`, wrapping around to `offset` itself.
    fn next_idle_slot(&self, offset: usize) -> Option<usize> {
        (1..=TRANSMIT_GROUP_LEN)
            .map(|step| (offset + step) % TRANSMIT_GROUP_LEN)
            .find(|&candidate| {
                self.peripheral
                    .read_control(TRANSMIT_GROUP.start + candidate)
                    .state()
                    == SlotState::Idle
            })
    }
}
