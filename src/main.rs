//! # OttOS Demo Firmware
//!
//! Minimal firmware exercising the kernel on an ATmega644 board: two
//! autostarted programs plus the idle process, preempted at every
//! scheduler tick.
//!
//! | Process | Slot | Priority | Behavior |
//! |---------|------|----------|----------|
//! | `idle` (kernel) | 0 | 0 | runs when nothing else is runnable |
//! | `blink` | 1 | 2 | toggles PB0, busy-waits, never yields |
//! | `blink_polite` | 2 | 2 | toggles PB1, yields after every toggle |
//!
//! With the default `Even` strategy both programs advance in lockstep;
//! switching to `RoundRobin` or `InactiveAging` skews CPU time toward
//! the higher priority once the priorities differ.
//!
//! The operator display and buttons live outside this demo, so the
//! installed error hooks freeze the faulting system on PB7 instead of
//! prompting.

#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]

#[cfg(target_arch = "avr")]
mod firmware {
    use panic_halt as _;

    use avr_device::atmega644::PORTB;
    use ottos::kernel::{self, AutostartTable, ErrorHooks};

    // -- programs -----------------------------------------------------------

    /// Busy worker: toggles PB0 and burns cycles until preempted.
    extern "C" fn blink() -> ! {
        let portb = unsafe { &*PORTB::ptr() };
        loop {
            // Writing a one to PINx toggles the output latch.
            portb.pinb().write(|w| unsafe { w.bits(0x01) });
            for _ in 0..20_000u16 {
                unsafe { core::arch::asm!("nop") };
            }
        }
    }

    /// Cooperative worker: toggles PB1 and gives the CPU back at once.
    extern "C" fn blink_polite() -> ! {
        let portb = unsafe { &*PORTB::ptr() };
        loop {
            portb.pinb().write(|w| unsafe { w.bits(0x02) });
            kernel::yield_now();
        }
    }

    // -- error hooks --------------------------------------------------------

    /// Fault indicator: latch PB7 high. A real board would put the
    /// message on the character display instead.
    fn show_fault(_msg: &str) {
        let portb = unsafe { &*PORTB::ptr() };
        portb.portb().modify(|r, w| unsafe { w.bits(r.bits() | 0x80) });
    }

    /// No buttons on this demo board; acknowledge immediately.
    fn ack_fault() {}

    // -- entry --------------------------------------------------------------

    #[avr_device::entry]
    fn main() -> ! {
        let dp = avr_device::atmega644::Peripherals::take().unwrap();

        // PB0/PB1: program heartbeats, PB7: fault indicator.
        dp.PORTB.ddrb().write(|w| unsafe { w.bits(0x83) });

        kernel::set_error_hooks(ErrorHooks {
            show: show_fault,
            confirm: ack_fault,
        });

        let mut autostart = AutostartTable::new();
        autostart.register(blink);
        autostart.register(blink_polite);

        kernel::start(dp, &autostart)
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {
    // The firmware is AVR-only; host builds exist for the unit tests.
}
