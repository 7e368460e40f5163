//! The microsecond timebase: TIM2 free-running at 1 MHz over its full
//! 32-bit range, with compare channel 1 as the slot alarm and channel
//! 2 as the packets-per-second alarm.
//!
//! Letting the counter run the whole 32-bit range means `CNT` itself
//! is the wrapping microsecond clock the driver's time arithmetic
//! expects; no software extension is needed.

use enumflags2::BitFlags;
use rdmx_common::line::MicrosTimer;
use stm32f4xx_hal::pac::TIM2;
use stm32f4xx_hal::rcc::{BusTimerClock, Clocks, Enable, Reset};
use stm32f4xx_hal::timer::Instance;

pub struct DmxTimer {
    tim: TIM2,
}

impl DmxTimer {
    pub fn init(mut tim: TIM2, clocks: &Clocks) -> Self {
        let tim_clk = TIM2::timer_clock(clocks).raw();
        let psc = tim_clk / 1_000_000;

        unsafe {
            TIM2::enable_unchecked();
            TIM2::reset_unchecked();
        }

        tim.set_prescaler(u16::try_from(psc - 1).unwrap());
        unsafe {
            // SAFETY: TIM2 has a 32-bit counter.
            tim.set_auto_reload_unchecked(u32::MAX);
        }

        // Compare interrupts are gated per channel through DIER as the
        // alarms are armed; no timer event starts out listening.
        tim.listen_event(Some(BitFlags::ALL), None);
        tim.clear_interrupt_flag(BitFlags::ALL);
        tim.enable_counter(true);
        tim.trigger_update();

        Self { tim }
    }
}

impl MicrosTimer for DmxTimer {
    #[inline(always)]
    fn now_us(&self) -> u32 {
        self.tim.cnt().read().bits()
    }

    fn arm_slot(&mut self, at_us: u32) {
        self.tim.ccr1().write(|w| unsafe { w.bits(at_us) });
        self.tim.sr().modify(|_, w| w.cc1if().clear_bit());
        self.tim.dier().modify(|_, w| w.cc1ie().set_bit());
    }

    fn cancel_slot(&mut self) {
        self.tim.dier().modify(|_, w| w.cc1ie().clear_bit());
        self.tim.sr().modify(|_, w| w.cc1if().clear_bit());
    }

    fn arm_pps(&mut self, at_us: u32) {
        self.tim.ccr2().write(|w| unsafe { w.bits(at_us) });
        self.tim.sr().modify(|_, w| w.cc2if().clear_bit());
        self.tim.dier().modify(|_, w| w.cc2ie().set_bit());
    }

    fn take_slot_fired(&mut self) -> bool {
        let fired = self.tim.sr().read().cc1if().bit_is_set()
            && self.tim.dier().read().cc1ie().bit_is_set();
        if fired {
            // Single-shot: the driver re-arms when it wants another
            // tick.
            self.tim.dier().modify(|_, w| w.cc1ie().clear_bit());
            self.tim.sr().modify(|_, w| w.cc1if().clear_bit());
        }
        fired
    }

    fn take_pps_fired(&mut self) -> bool {
        let fired = self.tim.sr().read().cc2if().bit_is_set()
            && self.tim.dier().read().cc2ie().bit_is_set();
        if fired {
            self.tim.dier().modify(|_, w| w.cc2ie().clear_bit());
            self.tim.sr().modify(|_, w| w.cc2if().clear_bit());
        }
        fired
    }
}
