//! Line counters shared between the interrupt producers and foreground
//! readers.
//!
//! Every counter has a single writer (the RX interrupt, or the PPS
//! timer tick); readers take relaxed loads and accept that a snapshot
//! of several counters is not taken at one instant.

use core::sync::atomic::{AtomicU32, Ordering};

/// Foreground-visible snapshot of the packet totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TotalStatistics {
    /// DMX frames whose start code was received. A frame aborted
    /// mid-reception still counts.
    pub dmx_packets: u32,

    /// RDM messages and discovery responses whose capture started.
    pub rdm_packets: u32,

    /// Completed frames discarded because the consumer had fallen a
    /// full ring behind.
    pub frames_dropped: u32,
}

pub(crate) struct Totals {
    pub(crate) dmx_packets: AtomicU32,
    pub(crate) rdm_packets: AtomicU32,
    pub(crate) frames_dropped: AtomicU32,
}

impl Totals {
    pub(crate) const fn new() -> Self {
        Self {
            dmx_packets: AtomicU32::new(0),
            rdm_packets: AtomicU32::new(0),
            frames_dropped: AtomicU32::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> TotalStatistics {
        TotalStatistics {
            dmx_packets: self.dmx_packets.load(Ordering::Relaxed),
            rdm_packets: self.rdm_packets.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }

    /// Only legal while reception is stopped; the RX interrupt is the
    /// sole writer of these counters.
    pub(crate) fn reset(&self) {
        self.dmx_packets.store(0, Ordering::Relaxed);
        self.rdm_packets.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
    }
}

/// Once-per-second sampler behind `updates_per_second`.
pub(crate) struct PpsSampler {
    pub(crate) prev_dmx_sample: u32,
    pub(crate) updates_per_second: AtomicU32,
}

impl PpsSampler {
    pub(crate) const fn new() -> Self {
        Self {
            prev_dmx_sample: 0,
            updates_per_second: AtomicU32::new(0),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.prev_dmx_sample = 0;
        self.updates_per_second.store(0, Ordering::Relaxed);
    }
}
