//! DMX line UART: 250 kbaud, 8 data bits, no parity, 2 stop bits,
//! with BREAK detection on receive.
//!
//! A BREAK is not a first-class event on this UART; it arrives as a
//! framing error whose data register reads zero, and that is exactly
//! how [`DmxUsart::poll_rx_event`] classifies it. BREAK generation
//! needs arbitrary hold times (far longer than the hardware's
//! one-character send-break), so the TX pin is temporarily taken away
//! from the peripheral and driven low as a plain output.

use rdmx_common::line::{LineUart, RxCharEvent};
use stm32f4xx_hal::Ptr;
use stm32f4xx_hal::pac::usart1::RegisterBlock;
use stm32f4xx_hal::rcc::Clocks;
use stm32f4xx_hal::serial::Instance;

use crate::gpio::{BreakPort, GpioX};

/// DMX512 wire rate per ANSI E1.11.
pub const DMX_BAUD_RATE: u32 = 250_000;

/// Computes `(over8, BRR)` for the requested baud rate.
///
/// The USARTDIV equation is
///
/// ```text
/// USARTDIV =          (pclk)
///            ------------------------
///            8 x (2 - OVER8) x (baud)
/// ```
///
/// with four fractional bits in the BRR register (three when OVER8 is
/// set, which is why the fractional part gets shifted right by one in
/// that mode). 16x oversampling is preferred; when the peripheral
/// clock is programmed too low for it the divisor is recomputed for 8x
/// oversampling, and as a last resort the smallest divisor the
/// hardware accepts is used.
fn dmx_baud_divisor(pclk_freq: u32, baud: u32) -> (bool, u32) {
    if (pclk_freq / 16) >= baud {
        // Adding baud / 2 rounds to the nearest divisor instead of
        // flooring.
        let div = (pclk_freq + (baud / 2)) / baud;
        (false, div)
    } else if (pclk_freq / 8) >= baud {
        let div = ((pclk_freq * 2) + (baud / 2)) / baud;
        let frac = div & 0xF;
        (true, (div & !0xF) | (frac >> 1))
    } else {
        (true, 0x10)
    }
}

/// The DMX UART, plus the coordinates of its TX pin for BREAK
/// generation.
pub struct DmxUsart<U, const TX_PORT: char, const TX_PIN: u8>
where
    U: Instance + Ptr<RB = RegisterBlock>,
{
    usart: U,
}

impl<U, const TX_PORT: char, const TX_PIN: u8> DmxUsart<U, TX_PORT, TX_PIN>
where
    U: Instance + Ptr<RB = RegisterBlock>,
    GpioX<TX_PORT>: BreakPort,
{
    /// Brings the peripheral up in DMX framing with both directions
    /// disabled; the port enables them as it changes direction. The TX
    /// pin must already be in its UART alternate function.
    pub fn init(usart: U, clocks: &Clocks) -> Self {
        unsafe {
            U::enable_unchecked();
            U::reset_unchecked();
        }

        let pclk_freq = U::clock(clocks).raw();
        let (over8, div) = dmx_baud_divisor(pclk_freq, DMX_BAUD_RATE);

        usart.brr().write(|w| unsafe { w.bits(div) });

        usart.cr2().write(|w| {
            w.stop().stop2() // 2 stop bits
        });

        usart.cr3().write(|w| {
            // Framing errors must raise the RX interrupt: that is how
            // BREAKs get in.
            w.eie().set_bit()
        });

        usart.cr1().write(|w| {
            w.ue()
                .set_bit()
                .over8()
                .bit(over8)
                .m()
                .clear_bit() // 8 data bits
                .pce()
                .clear_bit() // no parity
        });

        Self { usart }
    }
}

impl<U, const TX_PORT: char, const TX_PIN: u8> LineUart for DmxUsart<U, TX_PORT, TX_PIN>
where
    U: Instance + Ptr<RB = RegisterBlock>,
    GpioX<TX_PORT>: BreakPort,
{
    #[inline(always)]
    fn poll_rx_event(&mut self) -> Option<RxCharEvent> {
        let sr = self.usart.sr().read();
        if !(sr.rxne().bit_is_set() || sr.fe().bit_is_set()) {
            return None;
        }

        // Reading DR after SR clears RXNE and the error flags.
        let byte = self.usart.dr().read().dr().bits() as u8;
        Some(RxCharEvent {
            byte,
            is_break: sr.fe().bit_is_set() && byte == 0,
        })
    }

    #[inline(always)]
    fn write_byte(&mut self, byte: u8) {
        self.usart.dr().write(|w| unsafe { w.dr().bits(byte as u16) });
    }

    #[inline(always)]
    fn is_tx_fifo_full(&self) -> bool {
        self.usart.sr().read().txe().bit_is_clear()
    }

    #[inline(always)]
    fn is_tx_busy(&self) -> bool {
        self.usart.sr().read().tc().bit_is_clear()
    }

    fn set_break(&mut self, on: bool) {
        unsafe {
            // SAFETY: The TX pin was handed to this UART at
            // construction; nothing else drives it.
            if on {
                GpioX::<TX_PORT>::pin_set_low(TX_PIN);
                GpioX::<TX_PORT>::pin_mode_output(TX_PIN);
            } else {
                GpioX::<TX_PORT>::pin_mode_alternate(TX_PIN);
            }
        }
    }

    fn rx_set_enabled(&mut self, enabled: bool) {
        self.usart
            .cr1()
            .modify(|_, w| w.re().bit(enabled).rxneie().bit(enabled));
    }

    fn tx_set_enabled(&mut self, enabled: bool) {
        self.usart.cr1().modify(|_, w| w.te().bit(enabled));
    }
}
