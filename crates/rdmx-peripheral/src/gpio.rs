//! Direct GPIO register access for the two pins the port owns outside
//! the HAL's type-state system: the UART TX pin (whose mode is flipped
//! at runtime to generate arbitrary-length BREAKs) and the RS-485
//! driver-enable pin.

use rdmx_common::line::DirectionPin;
use stm32f4xx_hal::gpio::{ErasedPin, Output, PushPull};

macro_rules! break_port_impl {
    ($($port:ident $portc:literal),*) => {
        $(
        impl BreakPort for GpioX<$portc> {
            unsafe fn pin_set_low(pin: u8) {
                // BSRR upper half resets the output latch.
                unsafe { stm32f4xx_hal::pac::$port::steal() }
                    .bsrr()
                    .write(|w| unsafe { w.bits(1u32 << (pin as u32 + 16)) });
            }

            unsafe fn pin_mode_output(pin: u8) {
                unsafe { stm32f4xx_hal::pac::$port::steal() }
                    .moder()
                    .modify(|r, w| unsafe {
                        w.bits((r.bits() & !(0b11 << (pin as u32 * 2))) | (0b01 << (pin as u32 * 2)))
                    });
            }

            unsafe fn pin_mode_alternate(pin: u8) {
                unsafe { stm32f4xx_hal::pac::$port::steal() }
                    .moder()
                    .modify(|r, w| unsafe {
                        w.bits((r.bits() & !(0b11 << (pin as u32 * 2))) | (0b10 << (pin as u32 * 2)))
                    });
            }
        }
        )*
    }
}

pub struct GpioX<const PORT: char> {}

/// Register-level mode switching for a pin that normally belongs to
/// the UART.
pub trait BreakPort {
    // SAFETY: Callers must own the pin in question and be prepared for
    // the alternate function to resume driving it when the mode is
    // switched back.
    unsafe fn pin_set_low(pin: u8);
    unsafe fn pin_mode_output(pin: u8);
    unsafe fn pin_mode_alternate(pin: u8);
}

#[cfg(feature = "stm32f411")]
break_port_impl!(GPIOA 'A', GPIOB 'B', GPIOC 'C', GPIOD 'D', GPIOE 'E', GPIOH 'H');

/// The RS-485 driver-enable pin. High turns the line driver on.
pub struct DirDrivePin {
    pin: ErasedPin<Output<PushPull>>,
}

impl DirDrivePin {
    pub fn new(mut pin: ErasedPin<Output<PushPull>>) -> Self {
        pin.set_low();
        Self { pin }
    }
}

impl DirectionPin for DirDrivePin {
    #[inline(always)]
    fn set_driver_enabled(&mut self, enabled: bool) {
        if enabled {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}
