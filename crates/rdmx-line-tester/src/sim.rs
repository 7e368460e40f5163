//! Host-side implementations of the line driver's hardware contracts:
//! a scripted UART, a manually advanced microsecond timer and a dummy
//! direction pin, sharing one [`SimLine`] state.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use rdmx_common::line::{DirectionPin, LineUart, MicrosTimer, RxCharEvent};
use rdmx_common::time::is_after;
use rdmx_line::DmxPort;

#[derive(Clone, Default)]
pub struct SimLine {
    now: Rc<Cell<u32>>,
    rx_queue: Rc<RefCell<VecDeque<RxCharEvent>>>,
    slot_deadline: Rc<Cell<Option<u32>>>,
    pps_deadline: Rc<Cell<Option<u32>>>,
    slot_fired: Rc<Cell<bool>>,
    pps_fired: Rc<Cell<bool>>,
    rx_enabled: Rc<Cell<bool>>,
}

impl SimLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uart(&self) -> SimUart {
        SimUart(self.clone())
    }

    pub fn timer(&self) -> SimTimer {
        SimTimer(self.clone())
    }

    pub fn pin(&self) -> SimPin {
        SimPin
    }

    pub fn now(&self) -> u32 {
        self.now.get()
    }

    pub fn push_byte(&self, byte: u8) {
        self.rx_queue.borrow_mut().push_back(RxCharEvent::byte(byte));
    }

    pub fn push_break(&self) {
        self.rx_queue
            .borrow_mut()
            .push_back(RxCharEvent::line_break());
    }
}

pub struct SimUart(SimLine);

impl LineUart for SimUart {
    fn poll_rx_event(&mut self) -> Option<RxCharEvent> {
        let mut queue = self.0.rx_queue.borrow_mut();
        if !self.0.rx_enabled.get() {
            queue.clear();
            return None;
        }
        queue.pop_front()
    }

    fn write_byte(&mut self, _byte: u8) {}

    fn is_tx_fifo_full(&self) -> bool {
        false
    }

    fn is_tx_busy(&self) -> bool {
        false
    }

    fn set_break(&mut self, _on: bool) {}

    fn rx_set_enabled(&mut self, enabled: bool) {
        self.0.rx_enabled.set(enabled);
    }

    fn tx_set_enabled(&mut self, _enabled: bool) {}
}

pub struct SimTimer(SimLine);

impl MicrosTimer for SimTimer {
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

pub struct SimPin;

impl DirectionPin for SimPin {
    fn set_driver_enabled(&mut self, _enabled: bool) {}
}

/// Advances the simulated clock by `us`, firing armed alarms in
/// deadline order exactly as the timer interrupt would.
pub fn advance(line: &SimLine, port: &mut DmxPort<SimUart, SimTimer, SimPin>, us: u32) {
    let target = line.now.get().wrapping_add(us);
    loop {
        let slot = line.slot_deadline.get().filter(|d| !is_after(*d, target));
        let pps = line.pps_deadline.get().filter(|d| !is_after(*d, target));
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
        line.now.set(at);
        if line.slot_deadline.get() == Some(at) {
            line.slot_deadline.set(None);
            line.slot_fired.set(true);
        }
        if line.pps_deadline.get() == Some(at) {
            line.pps_deadline.set(None);
            line.pps_fired.set(true);
        }
        port.service_timer();
    }
    line.now.set(target);
}
