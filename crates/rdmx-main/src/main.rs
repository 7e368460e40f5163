// Firmware integration for the DMX512/RDM port on an STM32F411:
// USART1 (PA9 TX, PA10 RX) on the RS-485 transceiver, PA8 as driver
// enable, TIM2 as the microsecond timebase. The port singleton lives
// in a static and the two interrupt trampolines below are the only
// code that reaches it from interrupt context.

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use core::mem::MaybeUninit;

#[allow(unused_imports)]
use panic_itm as _;

use cortex_m_rt::entry;
use rdmx_common::rdmx_info;
use rdmx_line::{DmxPort, PortDirection};
use rdmx_peripheral::gpio::DirDrivePin;
use rdmx_peripheral::timer::DmxTimer;
use rdmx_peripheral::usart::DmxUsart;
use stm32f4xx_hal::{
    interrupt,
    pac::{self, Interrupt, NVIC},
    prelude::*,
};

type Port = DmxPort<DmxUsart<pac::USART1, 'A', 9>, DmxTimer, DirDrivePin>;

static mut DMX_PORT: MaybeUninit<Port> = MaybeUninit::uninit();

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();
    let mut cortex = cortex_m::Peripherals::take().unwrap();

    let rcc = dp.RCC.constrain();
    let clocks = rcc
        .cfgr
        .use_hse(25.MHz())
        .sysclk(96.MHz())
        .pclk1(48.MHz())
        .pclk2(48.MHz())
        .freeze();

    itm_logger::init_with_level(log::Level::Info).unwrap();
    rdmx_info!("Device startup");

    let gpioa = dp.GPIOA.split();

    // The pins stay parked in their UART alternate function; the port
    // takes the TX pin over only while holding a BREAK.
    let _tx = gpioa.pa9.into_alternate::<7>();
    let _rx = gpioa.pa10.into_alternate::<7>();
    let dir_pin = DirDrivePin::new(gpioa.pa8.into_push_pull_output().erase());

    let uart = DmxUsart::init(dp.USART1, &clocks);
    let timer = DmxTimer::init(dp.TIM2, &clocks);

    let port = unsafe { DMX_PORT.write(DmxPort::new(uart, timer, dir_pin)) };
    port.init();
    port.set_direction(PortDirection::Input, true);

    unsafe {
        // RX character handling outranks everything; the pacing timer
        // sits one priority level below it.
        cortex.NVIC.set_priority(Interrupt::USART1, 0);
        cortex.NVIC.set_priority(Interrupt::TIM2, 1 << 4);
        NVIC::unmask(Interrupt::USART1);
        NVIC::unmask(Interrupt::TIM2);
    }

    loop {
        if let Some(frame) = port.changed_frame() {
            let slots = frame.slots_in_packet;
            let break_to_break = frame.break_to_break_us;
            rdmx_info!(
                "DMX frame: {} slots, break-to-break {} us, {} fps",
                slots,
                break_to_break,
                port.updates_per_second()
            );
        }
        if let Some(message) = port.poll_rdm_frame() {
            rdmx_info!("RDM message: {} bytes", message.bytes().len());
        }
    }
}

#[interrupt]
fn USART1() {
    let port = unsafe { DMX_PORT.assume_init_mut() };
    port.service_uart();
}

#[interrupt]
fn TIM2() {
    let port = unsafe { DMX_PORT.assume_init_mut() };
    port.service_timer();
}
