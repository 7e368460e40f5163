//! Receive state machine.
//!
//! One invocation per UART character event, from the highest-priority
//! interrupt. A BREAK is only a framing error until the next start
//! code arrives, so classification of a frame as DMX, RDM or a
//! discovery response happens one byte late, and discovery responses
//! (which have no BREAK at all) are recognised from the idle state by
//! their `0xFE` preamble.
//!
//! The handler is allocation-free and runs in well under one slot time
//! (44 µs); it only ever touches the current head slot of one of the
//! two frame rings, plus the receive context.

use core::sync::atomic::Ordering;

use rdmx_common::line::{DirectionPin, LineUart, MicrosTimer, RxCharEvent};
use rdmx_common::time::elapsed_us;
use rdmx_common::{rdmx_trace, rdmx_warn};

use crate::frame::{
    DMX_FRAME_SIZE, DMX_UNIVERSE_SIZE, RDM_DISC_CHECKSUM_LEN, RDM_DISC_EUID_LEN,
    RDM_DISC_PREAMBLE, RDM_DISC_PREAMBLE_MAX, RDM_DISC_SEPARATOR, RDM_FRAME_SIZE,
    RDM_MESSAGE_LENGTH_OFFSET, RDM_MESSAGE_MIN_LEN, SC_DMX, SC_RDM, SC_RDM_SUB_MESSAGE,
};
use crate::{DmxPort, SLOT_IDLE_MARGIN_US, SLOT_TIME_US};

/// Where the receiver stands within the current frame. Every terminal
/// or error edge leads back to [`RxState::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// Between frames, waiting for a BREAK or a discovery preamble.
    Idle,

    /// A BREAK was flagged; the next byte is the start code.
    Break,

    /// Capturing DMX slots into the DMX ring head.
    DmxData,

    /// Capturing an RDM message into the RDM ring head.
    RdmData,

    /// Next byte is the high half of the RDM checksum.
    RdmChecksumHigh,

    /// Next byte is the low half of the RDM checksum.
    RdmChecksumLow,

    /// Inside the `0xFE` preamble of a discovery response.
    DiscPreamble,

    /// Capturing the 12 encoded EUID bytes of a discovery response.
    DiscEuid,

    /// Capturing the 4 encoded checksum bytes of a discovery response.
    DiscChecksum,
}

/// Interrupt-owned receive context. Foreground code only ever reads
/// `state` through [`DmxPort::receive_state`].
pub(crate) struct RxContext {
    pub(crate) state: RxState,

    /// Next write position in the ring head slot being filled.
    pub(crate) index: usize,

    /// Running 16-bit additive checksum of the RDM message. The two
    /// checksum bytes are subtracted as they arrive, so a valid
    /// message leaves zero behind.
    pub(crate) rdm_checksum: u16,

    /// Byte position within the current EUID/checksum section of a
    /// discovery response.
    pub(crate) disc_index: usize,

    /// Spacing of the two most recent slots, floored at
    /// [`SLOT_TIME_US`].
    pub(crate) slot_to_slot_us: u32,

    pub(crate) last_byte_us: u32,
    pub(crate) last_break_us: u32,
    pub(crate) prev_break_us: u32,
    pub(crate) prev_break_was_dmx: bool,
}

impl RxContext {
    pub(crate) const fn new() -> Self {
        Self {
            state: RxState::Idle,
            index: 0,
            rdm_checksum: 0,
            disc_index: 0,
            slot_to_slot_us: 0,
            last_byte_us: 0,
            last_break_us: 0,
            prev_break_us: 0,
            prev_break_was_dmx: false,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}

impl<U: LineUart, T: MicrosTimer, D: DirectionPin> DmxPort<U, T, D> {
    /// Feeds one received character event through the state machine.
    /// This is the RX interrupt entry point.
    pub fn on_rx_event(&mut self, event: RxCharEvent) {
        let now = self.timer.now_us();
        if event.is_break {
            // A BREAK wins over a byte flagged on the same event, and a
            // BREAK mid-frame abandons the in-flight frame: its ring
            // slot was never published and is simply reused.
            self.rx.last_break_us = now;
            self.rx.state = RxState::Break;
        } else {
            self.rx_consume_byte(event.byte, now);
        }
        self.rx.last_byte_us = now;
    }

    fn rx_consume_byte(&mut self, byte: u8, now: u32) {
        match self.rx.state {
            RxState::Idle => {
                if byte == RDM_DISC_PREAMBLE {
                    self.rdm_ring.head_slot().data[0] = RDM_DISC_PREAMBLE;
                    self.rx.index = 1;
                    self.totals.rdm_packets.fetch_add(1, Ordering::Relaxed);
                    self.rx.state = RxState::DiscPreamble;
                }
                // Anything else between frames is line noise.
            }
            RxState::Break => match byte {
                SC_DMX => {
                    let break_us = self.rx.last_break_us;
                    let frame = self.dmx_ring.head_slot();
                    frame.data[0] = SC_DMX;
                    frame.slots_in_packet = 0;
                    frame.slot_to_slot_us = 0;
                    frame.break_to_break_us = if self.rx.prev_break_was_dmx {
                        elapsed_us(break_us, self.rx.prev_break_us)
                    } else {
                        0
                    };
                    self.rx.index = 1;
                    self.rx.prev_break_us = break_us;
                    self.rx.prev_break_was_dmx = true;
                    self.totals.dmx_packets.fetch_add(1, Ordering::Relaxed);
                    self.rx.state = RxState::DmxData;
                }
                SC_RDM => {
                    self.rdm_ring.head_slot().data[0] = SC_RDM;
                    self.rx.rdm_checksum = SC_RDM as u16;
                    self.rx.index = 1;
                    self.rx.prev_break_was_dmx = false;
                    self.totals.rdm_packets.fetch_add(1, Ordering::Relaxed);
                    self.rx.state = RxState::RdmData;
                }
                _ => {
                    // Alternate start codes are not captured.
                    rdmx_trace!("Ignoring start code {:#04x}", byte);
                    self.rx.prev_break_was_dmx = false;
                    self.rx.state = RxState::Idle;
                }
            },
            RxState::DmxData => {
                let spacing = elapsed_us(now, self.rx.last_byte_us).max(SLOT_TIME_US);
                self.rx.slot_to_slot_us = spacing;
                let index = self.rx.index;
                let frame = self.dmx_ring.head_slot();
                frame.slot_to_slot_us = spacing;
                frame.data[index] = byte;
                self.rx.index = index + 1;
                self.timer
                    .arm_slot(now.wrapping_add(spacing + SLOT_IDLE_MARGIN_US));
                if self.rx.index == DMX_FRAME_SIZE {
                    self.finalize_dmx_frame(DMX_UNIVERSE_SIZE as u16);
                }
            }
            RxState::RdmData => {
                let index = self.rx.index;
                if index >= RDM_FRAME_SIZE {
                    rdmx_warn!("Over-long RDM message, dropping");
                    self.rx.state = RxState::Idle;
                    return;
                }
                let frame = self.rdm_ring.head_slot();
                frame.data[index] = byte;
                self.rx.rdm_checksum = self.rx.rdm_checksum.wrapping_add(byte as u16);
                self.rx.index = index + 1;
                if index == RDM_MESSAGE_LENGTH_OFFSET {
                    // The declared length covers everything up to the
                    // checksum; values outside the legal range would
                    // corrupt index tracking, so the frame dies here.
                    let message_length = byte as usize;
                    if message_length < RDM_MESSAGE_MIN_LEN
                        || message_length > RDM_FRAME_SIZE - 2
                    {
                        rdmx_warn!("Illegal RDM message length {}, dropping", message_length);
                        self.rx.state = RxState::Idle;
                    }
                } else if self.rx.index == frame.data[RDM_MESSAGE_LENGTH_OFFSET] as usize {
                    self.rx.state = RxState::RdmChecksumHigh;
                }
            }
            RxState::RdmChecksumHigh => {
                let index = self.rx.index;
                self.rdm_ring.head_slot().data[index] = byte;
                self.rx.index = index + 1;
                self.rx.rdm_checksum = self.rx.rdm_checksum.wrapping_sub((byte as u16) << 8);
                self.rx.state = RxState::RdmChecksumLow;
            }
            RxState::RdmChecksumLow => {
                let index = self.rx.index;
                let frame = self.rdm_ring.head_slot();
                frame.data[index] = byte;
                self.rx.index = index + 1;
                self.rx.rdm_checksum = self.rx.rdm_checksum.wrapping_sub(byte as u16);
                let sub_start_code = frame.data[1];
                if self.rx.rdm_checksum == 0 && sub_start_code == SC_RDM_SUB_MESSAGE {
                    self.publish_rdm_frame();
                } else {
                    rdmx_warn!(
                        "Dropping RDM message (checksum residue {:#06x}, sub start code {:#04x})",
                        self.rx.rdm_checksum,
                        sub_start_code
                    );
                }
                self.rx.state = RxState::Idle;
            }
            RxState::DiscPreamble => match byte {
                RDM_DISC_PREAMBLE => {
                    if self.rx.index >= RDM_DISC_PREAMBLE_MAX {
                        rdmx_warn!("Discovery preamble too long, dropping");
                        self.rx.state = RxState::Idle;
                        return;
                    }
                    let index = self.rx.index;
                    self.rdm_ring.head_slot().data[index] = RDM_DISC_PREAMBLE;
                    self.rx.index = index + 1;
                }
                RDM_DISC_SEPARATOR => {
                    let index = self.rx.index;
                    self.rdm_ring.head_slot().data[index] = RDM_DISC_SEPARATOR;
                    self.rx.index = index + 1;
                    self.rx.disc_index = 0;
                    self.rx.state = RxState::DiscEuid;
                }
                _ => {
                    self.rx.state = RxState::Idle;
                }
            },
            RxState::DiscEuid => {
                let index = self.rx.index;
                self.rdm_ring.head_slot().data[index] = byte;
                self.rx.index = index + 1;
                self.rx.disc_index += 1;
                if self.rx.disc_index == RDM_DISC_EUID_LEN {
                    self.rx.disc_index = 0;
                    self.rx.state = RxState::DiscChecksum;
                }
            }
            RxState::DiscChecksum => {
                let index = self.rx.index;
                self.rdm_ring.head_slot().data[index] = byte;
                self.rx.index = index + 1;
                self.rx.disc_index += 1;
                if self.rx.disc_index == RDM_DISC_CHECKSUM_LEN {
                    self.publish_rdm_frame();
                    self.rx.state = RxState::Idle;
                }
            }
        }
    }

    /// Inter-slot watchdog, run from the slot alarm while in input
    /// mode. A DMX sender is allowed to stop short of 512 slots; the
    /// silence after the last slot is what terminates the frame.
    pub(crate) fn rx_watchdog_tick(&mut self, now: u32) {
        if self.rx.state != RxState::DmxData {
            return;
        }
        if elapsed_us(now, self.rx.last_byte_us) > self.rx.slot_to_slot_us {
            if self.rx.index > 1 {
                let slots = (self.rx.index - 1) as u16;
                self.finalize_dmx_frame(slots);
            } else {
                // Start code with no slots behind it: nothing worth
                // delivering.
                self.rx.state = RxState::Idle;
            }
        } else {
            // A byte sneaked in between the alarm being raised and us
            // handling it; give the sender another slot interval.
            self.timer.arm_slot(now.wrapping_add(self.rx.slot_to_slot_us));
        }
    }

    fn finalize_dmx_frame(&mut self, slots: u16) {
        self.dmx_ring.head_slot().slots_in_packet = slots;
        if !self.dmx_ring.publish_head() {
            self.totals.frames_dropped.fetch_add(1, Ordering::Relaxed);
            rdmx_warn!("DMX ring full, dropping a {}-slot frame", slots);
        }
        self.rx.state = RxState::Idle;
    }

    fn publish_rdm_frame(&mut self) {
        self.rdm_ring.head_slot().len = self.rx.index as u16;
        if !self.rdm_ring.publish_head() {
            self.totals.frames_dropped.fetch_add(1, Ordering::Relaxed);
            rdmx_warn!("RDM ring full, dropping message");
        }
    }
}
