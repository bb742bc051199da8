//! Bit-timing calculator: derives the prescaler and time segments of a CAN
//! bit from a clock frequency and a requested bit rate.
//!
//! The bit rate on a shared bus must be exact, so no rounding is ever applied:
//! either `clock == bit_rate * TQ * BRP` holds, or the computation fails.
use crate::error::TimingError;

//==================================================================================Constants

/// Largest number of time quanta per bit, tried first.
pub const MAX_TIME_QUANTA: u8 = 25;
/// Smallest number of time quanta per bit.
pub const MIN_TIME_QUANTA: u8 = 8;

const TSEG1_RANGE: (u8, u8) = (4, 16);
const TSEG2_RANGE: (u8, u8) = (2, 8);
const MAX_SJW: u8 = 4;
const MAX_PRESCALER: u32 = 1024;

//==================================================================================Enums and Structs

/// Clock feeding the bit-rate generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSelect {
    /// Peripheral bus clock.
    Peripheral,
    /// Crystal-derived alternate clock.
    Crystal,
}

/// Timing of one CAN bit, computed once at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Baud-rate prescaler: clock cycles per time quantum (1..=1024).
    pub brp: u16,
    /// Time segment 1 in quanta (4..=16).
    pub tseg1: u8,
    /// Time segment 2 in quanta (2..=8).
    pub tseg2: u8,
    /// Synchronization jump width in quanta (1..=4, below TSEG2).
    pub sjw: u8,
    /// Clock the prescaler divides.
    pub clock_source: ClockSelect,
}

impl BitTiming {
    /// Compute the bit timing for `bit_rate`, trying the peripheral clock
    /// first and the optional crystal clock second.
    pub fn calculate(
        peripheral_clock_hz: u32,
        bit_rate: u32,
        crystal_clock_hz: Option<u32>,
    ) -> Result<Self, TimingError> {
        if bit_rate == 0 {
            return Err(TimingError::InvalidBitRate);
        }

        let candidates = [
            Some((peripheral_clock_hz, ClockSelect::Peripheral)),
            crystal_clock_hz.map(|hz| (hz, ClockSelect::Crystal)),
        ];

        for (clock_hz, clock_source) in candidates.into_iter().flatten() {
            if let Some((time_quanta, brp)) = find_divisor(clock_hz, bit_rate) {
                let (tseg1, tseg2) = split_segments(time_quanta)?;
                return Ok(Self {
                    brp,
                    tseg1,
                    tseg2,
                    sjw: MAX_SJW.min(tseg2 - 1),
                    clock_source,
                });
            }
        }

        Err(TimingError::IndivisibleClock {
            clock_hz: peripheral_clock_hz,
            bit_rate,
        })
    }

    /// Validate a bit rate without committing to it.
    pub fn probe(peripheral_clock_hz: u32, bit_rate: u32, crystal_clock_hz: Option<u32>) -> bool {
        Self::calculate(peripheral_clock_hz, bit_rate, crystal_clock_hz).is_ok()
    }

    /// Total quanta per bit, including the synchronization quantum.
    pub fn time_quanta(&self) -> u8 {
        1 + self.tseg1 + self.tseg2
    }

    /// Bit rate produced by this timing when fed with `clock_hz`.
    pub fn bit_rate(&self, clock_hz: u32) -> u32 {
        clock_hz / (self.brp as u32 * self.time_quanta() as u32)
    }

    /// Sample point position, in thousandths of the bit time.
    pub fn sample_point_permille(&self) -> u16 {
        (1 + self.tseg1 as u16) * 1000 / self.time_quanta() as u16
    }

    /// Pack into the bit configuration register. Every field is stored minus one.
    pub fn to_register(&self) -> u32 {
        let cclks = match self.clock_source {
            ClockSelect::Peripheral => 0,
            ClockSelect::Crystal => 1,
        };
        (((self.tseg1 - 1) as u32 & 0x0F) << 28)
            | (((self.brp - 1) as u32 & 0x3FF) << 16)
            | (((self.sjw - 1) as u32 & 0x03) << 12)
            | (((self.tseg2 - 1) as u32 & 0x07) << 8)
            | cclks
    }
}

//==================================================================================Helpers

/// Search TQ from 25 down to 8 and return the first exact `(TQ, BRP)` pair.
fn find_divisor(clock_hz: u32, bit_rate: u32) -> Option<(u8, u16)> {
    (MIN_TIME_QUANTA..=MAX_TIME_QUANTA).rev().find_map(|tq| {
        let quantum_rate = bit_rate as u64 * tq as u64;
        if clock_hz as u64 % quantum_rate != 0 {
            return None;
        }
        let brp = clock_hz as u64 / quantum_rate;
        (1..=MAX_PRESCALER as u64)
            .contains(&brp)
            .then_some((tq, brp as u16))
    })
}

/// Distribute `TQ - 1` quanta starting from the nominal 16/8 split.
/// TSEG2 is trimmed to its minimum first, then TSEG1, which keeps the sample
/// point as late as the bounds allow. With TSEG1 trimmed first, 40 MHz at
/// 1 Mbit/s (TQ = 20) would come out as 11/8 instead of 16/3.
fn split_segments(time_quanta: u8) -> Result<(u8, u8), TimingError> {
    let target = time_quanta - 1;
    let (mut tseg1, mut tseg2) = (TSEG1_RANGE.1, TSEG2_RANGE.1);

    while tseg1 + tseg2 > target && tseg2 > TSEG2_RANGE.0 {
        tseg2 -= 1;
    }
    while tseg1 + tseg2 > target && tseg1 > TSEG1_RANGE.0 {
        tseg1 -= 1;
    }

    if tseg1 + tseg2 == target {
        Ok((tseg1, tseg2))
    } else {
        Err(TimingError::NoSegmentSplit { time_quanta })
    }
}
