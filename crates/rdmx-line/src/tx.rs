//! Transmit pacing state machine.
//!
//! Driven from the slot alarm while the port is in output mode. Each
//! cycle walks BREAK → mark-after-break → data → idle, and the next
//! BREAK is scheduled relative to the start of the previous one so the
//! output period stays phase-stable regardless of how long the data
//! stage took.

use rdmx_common::line::{DirectionPin, LineUart, MicrosTimer};
use vcell::VolatileCell;

use crate::frame::DMX_FRAME_SIZE;
use crate::{
    BREAK_TO_BREAK_MIN_US, DEFAULT_BREAK_TIME_US, DEFAULT_MAB_TIME_US, DmxPort,
    SLOT_TIME_US,
};

/// Position within the transmit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Waiting for the next period boundary.
    Idle,

    /// Line held in BREAK.
    Break,

    /// Mark-after-break running; data goes out when it expires.
    Mab,
}

/// Timer-interrupt-owned transmit context plus the staging buffer the
/// foreground writes through [`DmxPort::set_send_data`].
pub(crate) struct TxContext {
    /// Written by the pacer in the timer interrupt, read by the
    /// foreground while draining; hence the volatile wrapper.
    pub(crate) state: VolatileCell<TxState>,
    pub(crate) buf: [u8; DMX_FRAME_SIZE],

    /// Bytes per packet: start code plus universe slots, 1..=513.
    pub(crate) data_len: usize,

    pub(crate) break_time_us: u32,
    pub(crate) mab_time_us: u32,

    /// Effective output period, derived from the packet length and the
    /// requested period.
    pub(crate) period_us: u32,
    pub(crate) period_requested_us: u32,

    /// Timestamp of the most recent BREAK edge.
    pub(crate) break_start_us: u32,
}

impl TxContext {
    pub(crate) fn new() -> Self {
        let mut ctx = Self {
            state: VolatileCell::new(TxState::Idle),
            buf: [0; DMX_FRAME_SIZE],
            data_len: DMX_FRAME_SIZE,
            break_time_us: DEFAULT_BREAK_TIME_US,
            mab_time_us: DEFAULT_MAB_TIME_US,
            period_us: 0,
            period_requested_us: 0,
            break_start_us: 0,
        };
        ctx.recompute_period();
        ctx
    }

    /// A packet occupies `break + mab + 44 µs per byte` on the wire.
    /// A requested period shorter than that (or zero, meaning "as fast
    /// as legal") is replaced by the packet time plus one slot of gap,
    /// floored at the 1204 µs break-to-break minimum.
    pub(crate) fn recompute_period(&mut self) {
        let packet_us =
            self.break_time_us + self.mab_time_us + self.data_len as u32 * SLOT_TIME_US;
        self.period_us = if self.period_requested_us == 0 || self.period_requested_us < packet_us
        {
            (packet_us + SLOT_TIME_US).max(BREAK_TO_BREAK_MIN_US)
        } else {
            self.period_requested_us
        };
    }
}

impl<U: LineUart, T: MicrosTimer, D: DirectionPin> DmxPort<U, T, D> {
    /// One step of the transmit cycle, run from the slot alarm while in
    /// output mode.
    pub(crate) fn tx_pacer_tick(&mut self, now: u32) {
        match self.tx.state.get() {
            TxState::Idle => {
                self.uart.set_break(true);
                self.tx.break_start_us = now;
                self.timer
                    .arm_slot(now.wrapping_add(self.tx.break_time_us));
                self.tx.state.set(TxState::Break);
            }
            TxState::Break => {
                self.uart.set_break(false);
                self.timer.arm_slot(now.wrapping_add(self.tx.mab_time_us));
                self.tx.state.set(TxState::Mab);
            }
            TxState::Mab => {
                // The whole packet is pushed in a busy poll: at 250
                // kbaud a byte leaves every 44 µs, so the bound is
                // data_len × 44 µs (~23 ms for a full universe), and no
                // per-byte interrupt could beat that.
                for i in 0..self.tx.data_len {
                    while self.uart.is_tx_fifo_full() {}
                    self.uart.write_byte(self.tx.buf[i]);
                }
                while self.uart.is_tx_busy() {}
                self.timer
                    .arm_slot(self.tx.break_start_us.wrapping_add(self.tx.period_us));
                self.tx.state.set(TxState::Idle);
            }
        }
    }
}
