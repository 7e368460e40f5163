//! Scripted hardware for host tests: a mock UART, a manually advanced
//! microsecond timer and a recorded direction pin, wired into a
//! [`DmxPort`] by [`Bench`].

extern crate std;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use rdmx_common::line::{DirectionPin, LineUart, MicrosTimer, RxCharEvent};
use rdmx_common::time::is_after;

use crate::frame::SC_DMX;
use crate::{DmxPort, PortDirection};

/// One observable action on the transmit side, timestamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TxAction {
    BreakOn(u32),
    BreakOff(u32),
    Byte(u32, u8),
}

/// State shared between the mocks and the test body.
#[derive(Clone, Default)]
pub(crate) struct LineState {
    pub(crate) now: Rc<Cell<u32>>,
    pub(crate) rx_queue: Rc<RefCell<VecDeque<RxCharEvent>>>,
    pub(crate) tx_log: Rc<RefCell<Vec<TxAction>>>,
    pub(crate) slot_deadline: Rc<Cell<Option<u32>>>,
    pub(crate) pps_deadline: Rc<Cell<Option<u32>>>,
    pub(crate) slot_fired: Rc<Cell<bool>>,
    pub(crate) pps_fired: Rc<Cell<bool>>,
    pub(crate) rx_enabled: Rc<Cell<bool>>,
    pub(crate) tx_enabled: Rc<Cell<bool>>,
    pub(crate) driver_enabled: Rc<Cell<bool>>,
}

pub(crate) struct MockUart(pub(crate) LineState);

impl LineUart for MockUart {
    fn poll_rx_event(&mut self) -> Option<RxCharEvent> {
        let mut queue = self.0.rx_queue.borrow_mut();
        if !self.0.rx_enabled.get() {
            // A muted receiver generates no events at all.
            queue.clear();
            return None;
        }
        queue.pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        let now = self.0.now.get();
        self.0.tx_log.borrow_mut().push(TxAction::Byte(now, byte));
    }

    fn is_tx_fifo_full(&self) -> bool {
        false
    }

    fn is_tx_busy(&self) -> bool {
        false
    }

    fn set_break(&mut self, on: bool) {
        let now = self.0.now.get();
        let action = if on {
            TxAction::BreakOn(now)
        } else {
            TxAction::BreakOff(now)
        };
        self.0.tx_log.borrow_mut().push(action);
    }

    fn rx_set_enabled(&mut self, enabled: bool) {
        self.0.rx_enabled.set(enabled);
    }

    fn tx_set_enabled(&mut self, enabled: bool) {
        self.0.tx_enabled.set(enabled);
    }
}

pub(crate) struct MockTimer(pub(crate) LineState);

impl MicrosTimer for MockTimer {
    fn now_us(&self) -> u32 {
        self.0.now.get()
    }

    fn arm_slot(&mut self, at_us: u32) {
        self.0.slot_deadline.set(Some(at_us));
    }

    fn cancel_slot(&mut self) {
        self.0.slot_deadline.set(None);
        self.0.slot_fired.set(false);
    }

    fn arm_pps(&mut self, at_us: u32) {
        self.0.pps_deadline.set(Some(at_us));
    }

    fn take_slot_fired(&mut self) -> bool {
        self.0.slot_fired.replace(false)
    }

    fn take_pps_fired(&mut self) -> bool {
        self.0.pps_fired.replace(false)
    }
}

pub(crate) struct MockPin(pub(crate) LineState);

impl DirectionPin for MockPin {
    fn set_driver_enabled(&mut self, enabled: bool) {
        self.0.driver_enabled.set(enabled);
    }
}

pub(crate) struct Bench {
    pub(crate) line: LineState,
    pub(crate) port: DmxPort<MockUart, MockTimer, MockPin>,
}

impl Bench {
    pub(crate) fn new() -> Self {
        let line = LineState::default();
        let port = DmxPort::new(
            MockUart(line.clone()),
            MockTimer(line.clone()),
            MockPin(line.clone()),
        );
        Self { line, port }
    }

    /// A port initialized and listening.
    pub(crate) fn new_input() -> Self {
        let mut bench = Self::new();
        bench.port.init();
        bench.port.set_direction(PortDirection::Input, true);
        bench
    }

    pub(crate) fn now(&self) -> u32 {
        self.line.now.get()
    }

    /// Advances the clock to `target`, firing armed alarms in deadline
    /// order along the way.
    pub(crate) fn advance_to(&mut self, target: u32) {
        loop {
            let slot = self
                .line
                .slot_deadline
                .get()
                .filter(|d| !is_after(*d, target));
            let pps = self
                .line
                .pps_deadline
                .get()
                .filter(|d| !is_after(*d, target));
            let at = match (slot, pps) {
                (Some(s), Some(p)) => {
                    if is_after(s, p) {
                        p
                    } else {
                        s
                    }
                }
                (Some(s), None) => s,
                (None, Some(p)) => p,
                (None, None) => break,
            };
            self.line.now.set(at);
            if self.line.slot_deadline.get() == Some(at) {
                self.line.slot_deadline.set(None);
                self.line.slot_fired.set(true);
            }
            if self.line.pps_deadline.get() == Some(at) {
                self.line.pps_deadline.set(None);
                self.line.pps_fired.set(true);
            }
            self.port.service_timer();
        }
        self.line.now.set(target);
    }

    pub(crate) fn advance(&mut self, us: u32) {
        let target = self.line.now.get().wrapping_add(us);
        self.advance_to(target);
    }

    pub(crate) fn feed_byte(&mut self, byte: u8) {
        self.line
            .rx_queue
            .borrow_mut()
            .push_back(RxCharEvent::byte(byte));
        self.port.service_uart();
    }

    pub(crate) fn feed_break(&mut self) {
        self.line
            .rx_queue
            .borrow_mut()
            .push_back(RxCharEvent::line_break());
        self.port.service_uart();
    }

    /// Feeds BREAK, mark-after-break, the null start code and `slots`
    /// with nominal line timing. The caller decides what silence (or
    /// next frame) follows.
    pub(crate) fn feed_dmx_frame(&mut self, slots: &[u8]) {
        self.feed_break();
        self.advance(100);
        self.feed_byte(SC_DMX);
        for byte in slots {
            self.advance(44);
            self.feed_byte(*byte);
        }
    }

    pub(crate) fn tx_log(&self) -> Vec<TxAction> {
        self.line.tx_log.borrow().clone()
    }
}
