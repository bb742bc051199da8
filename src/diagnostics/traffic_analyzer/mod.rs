//! Traffic analyzer: aggregates the received stream by identifier, keeping the
//! most recent frame and the number of occurrences of each identifier.
//!
//! The table lives in foreground context only; it is filled by polling a
//! [`FrameSource`] and read by the listing helpers.
use embedded_can::Id;
use futures_util::future::{select, Either};
use futures_util::pin_mut;
use heapless::FnvIndexMap;

use crate::driver::frame::CanFrame;
use crate::infra::traits::{bus_timer::BusTimer, frame_source::FrameSource};

//==================================================================================Enums and Structs

/// Aggregate kept for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrafficEntry {
    /// Number of frames observed with this identifier.
    pub count: u32,
    /// Data frames among them.
    pub data_frames: u32,
    /// Remote frames among them.
    pub remote_frames: u32,
    /// Payload bytes accumulated over every observation.
    pub payload_bytes: u64,
    /// Most recent frame.
    pub frame: CanFrame,
}

impl TrafficEntry {
    fn first(frame: CanFrame) -> Self {
        let mut entry = Self {
            count: 0,
            data_frames: 0,
            remote_frames: 0,
            payload_bytes: 0,
            frame,
        };
        entry.update(frame);
        entry
    }

    fn update(&mut self, frame: CanFrame) {
        self.count = self.count.saturating_add(1);
        if frame.is_remote() {
            self.remote_frames = self.remote_frames.saturating_add(1);
        } else {
            self.data_frames = self.data_frames.saturating_add(1);
        }
        self.payload_bytes += frame.len() as u64;
        self.frame = frame;
    }
}

/// Totals accumulated over every entry of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrafficSummary {
    /// Distinct identifiers.
    pub entries: usize,
    pub total_frames: u64,
    pub payload_bytes: u64,
    pub data_frames: u64,
    pub remote_frames: u64,
}

/// Identifier-indexed traffic table with room for `N` identifiers
/// (`N` must be a power of two).
pub struct TrafficAnalyzer<const N: usize> {
    table: FnvIndexMap<Id, TrafficEntry, N>,
    untracked: u32,
}

impl<const N: usize> Default for TrafficAnalyzer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TrafficAnalyzer<N> {
    pub fn new() -> Self {
        Self {
            table: FnvIndexMap::new(),
            untracked: 0,
        }
    }

    //==================================================================================Collection
    /// Drain every frame currently available from `source` into the table.
    /// Returns the number of frames consumed.
    pub fn service<S: FrameSource>(&mut self, source: &mut S) -> usize {
        let mut consumed = 0;
        while let Some(frame) = source.try_receive() {
            self.observe(frame);
            consumed += 1;
        }
        consumed
    }

    /// Service `source` for a listening window of `window_ms`, recording frames
    /// as they arrive. Returns the number of frames consumed.
    pub async fn monitor<S: FrameSource, T: BusTimer>(
        &mut self,
        source: &mut S,
        timer: &mut T,
        window_ms: u32,
    ) -> usize {
        let mut consumed = self.service(source);

        let window = timer.delay_ms(window_ms);
        pin_mut!(window);

        loop {
            let frame = {
                let recv = source.receive();
                pin_mut!(recv);

                match select(window.as_mut(), recv).await {
                    Either::Left(_) => return consumed,
                    Either::Right((frame, _)) => frame,
                }
            };
            self.observe(frame);
            consumed += 1;
        }
    }

    /// Record one frame: bump the count and replace the stored frame, or
    /// insert a new entry on first sight. When the table is full, frames with
    /// unknown identifiers are only counted in [`untracked`](Self::untracked).
    pub fn observe(&mut self, frame: CanFrame) {
        let id = frame.id();
        if let Some(entry) = self.table.get_mut(&id) {
            entry.update(frame);
            return;
        }
        if self.table.insert(id, TrafficEntry::first(frame)).is_err() {
            self.untracked = self.untracked.saturating_add(1);

            #[cfg(feature = "defmt")]
            defmt::debug!("Traffic table full, frame not tracked");
        }
    }

    //==================================================================================Queries
    /// Whether `id` has been observed since the last clear.
    pub fn find(&self, id: impl Into<Id>) -> bool {
        self.table.contains_key(&id.into())
    }

    /// Aggregate for `id`.
    pub fn list(&self, id: impl Into<Id>) -> Option<TrafficEntry> {
        self.table.get(&id.into()).copied()
    }

    /// Every entry together with totals over the whole table.
    pub fn list_all(&self) -> (TrafficSummary, impl Iterator<Item = (&Id, &TrafficEntry)> + '_) {
        let summary = self.table.values().fold(
            TrafficSummary {
                entries: self.table.len(),
                ..TrafficSummary::default()
            },
            |mut summary, entry| {
                summary.total_frames += entry.count as u64;
                summary.payload_bytes += entry.payload_bytes;
                summary.data_frames += entry.data_frames as u64;
                summary.remote_frames += entry.remote_frames as u64;
                summary
            },
        );
        (summary, self.table.iter())
    }

    /// Most recent frame seen with `id`.
    pub fn dump(&self, id: impl Into<Id>) -> Option<CanFrame> {
        self.table.get(&id.into()).map(|entry| entry.frame)
    }

    /// Empty the table and reset the untracked counter.
    pub fn clear(&mut self) {
        self.table.clear();
        self.untracked = 0;
    }

    /// Number of distinct identifiers in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Frames dropped because their identifier did not fit in the table.
    pub fn untracked(&self) -> u32 {
        self.untracked
    }
}
