//! # ATmega644 Port Layer
//!
//! Hardware-specific code for the ATmega644 AVR core: scheduling-timer
//! setup (Timer2 in CTC mode), the context-switch interrupt service
//! routine, the dispatcher trampoline for first-run processes, and the
//! small register helpers behind the critical-section gate.
//!
//! ## Context-switch mechanism
//!
//! The AVR has a single hardware stack pointer and pushes only the
//! return address on interrupt entry. The scheduler ISR is therefore
//! naked and does the whole register file by hand:
//!
//! 1. Push r31, SREG and r30…r0 onto the interrupted process's stack
//!    (33 bytes; the synthetic frames written by `exec` use the same
//!    layout).
//! 2. Hand the resulting stack pointer to the kernel on the dedicated
//!    ISR stack; the kernel parks the process, runs the strategy,
//!    audits the incoming stack and returns the next stack pointer.
//! 3. Load the returned stack pointer, pop the context in reverse
//!    order and `reti` — which atomically restores the interrupted
//!    program counter and re-enables interrupts.
//!
//! Interrupts stay globally disabled for the whole ISR (hardware
//! behavior; the ISR never executes `sei`).

use core::arch::naked_asm;

use avr_device::atmega644::{CPU, TC2};

use crate::config::TIMER_COMPARE;
use crate::process::Program;
use crate::stack::ISR_STACK_BOTTOM;

// I/O-space addresses used by the naked assembly below.
// 0x3d/0x3e: SPL/SPH, 0x3f: SREG.

// ---------------------------------------------------------------------------
// Scheduling timer (Timer2, CTC on OCR2A, clk/1024)
// ---------------------------------------------------------------------------

/// Program Timer2 for the scheduling tick: CTC mode with OCR2A as top,
/// clocked at clk/1024. The compare-match interrupt itself stays masked
/// until [`arm_scheduler_timer`] runs.
pub fn init_scheduler_timer(tc2: &TC2) {
    // WGM21: clear-timer-on-compare-match mode.
    tc2.tccr2a().write(|w| unsafe { w.bits(0b0000_0010) });
    // CS22|CS21|CS20: prescaler 1024.
    tc2.tccr2b().write(|w| unsafe { w.bits(0b0000_0111) });
    tc2.ocr2a().write(|w| unsafe { w.bits(TIMER_COMPARE) });
    tc2.tcnt2().write(|w| unsafe { w.bits(0) });
}

/// Unmask the Timer2 compare-match-A interrupt (OCIE2A).
pub fn arm_scheduler_timer() {
    // Read-modify-write of a single mask bit; callers serialize through
    // the gate or run with interrupts disabled.
    let tc2 = unsafe { &*TC2::ptr() };
    tc2.timsk2().modify(|r, w| unsafe { w.bits(r.bits() | 0x01) });
}

/// Mask the Timer2 compare-match-A interrupt.
pub fn disarm_scheduler_timer() {
    let tc2 = unsafe { &*TC2::ptr() };
    tc2.timsk2().modify(|r, w| unsafe { w.bits(r.bits() & !0x01) });
}

/// Force an immediate compare match (FOC2A). With the timer armed this
/// triggers a scheduling tick as soon as interrupts allow; inside a
/// critical section the match stays pending until the gate re-arms.
pub fn request_reschedule() {
    let tc2 = unsafe { &*TC2::ptr() };
    tc2.tccr2b().modify(|r, w| unsafe { w.bits(r.bits() | 0x80) });
}

// ---------------------------------------------------------------------------
// Global interrupt flag
// ---------------------------------------------------------------------------

/// State of the I bit in SREG.
pub fn interrupts_enabled() -> bool {
    // Safety: plain read of the status register.
    unsafe { (*CPU::ptr()).sreg().read().bits() & 0x80 != 0 }
}

/// Force the I bit to the given state.
///
/// # Safety
/// Enabling interrupts must only happen where a preemption is
/// acceptable; the gate uses this to restore a snapshotted flag.
pub unsafe fn set_interrupt_flag(enabled: bool) {
    if enabled {
        avr_device::interrupt::enable();
    } else {
        avr_device::interrupt::disable();
    }
}

// ---------------------------------------------------------------------------
// Dispatcher trampoline
// ---------------------------------------------------------------------------

/// First-run glue. The synthetic context written by `exec` "returns"
/// here; the trampoline enables interrupts and tail-jumps into the
/// current process's registered program.
pub extern "C" fn dispatch() -> ! {
    let program: Option<Program> = crate::kernel::current_program();
    // Safety: we are entering a fresh process; preemption is welcome
    // from the first instruction on.
    unsafe { avr_device::interrupt::enable() };
    match program {
        Some(program) => program(),
        // A dispatch without a registered program cannot happen through
        // `exec`; park the CPU rather than running into flash.
        None => loop {
            unsafe { core::arch::asm!("nop") }
        },
    }
}

/// Flash word address of the trampoline, as stored in synthetic frames
/// (the stacked return address is a word address on AVR).
pub fn dispatch_entry_word() -> u16 {
    let entry: extern "C" fn() -> ! = dispatch;
    ((entry as usize) >> 1) as u16
}

// ---------------------------------------------------------------------------
// Context-switch ISR
// ---------------------------------------------------------------------------

/// The scheduler tick: Timer2 compare-match A (`__vector_9` on the
/// ATmega644). Saves the full context onto the interrupted process's
/// stack, runs the kernel's tick on the dedicated ISR stack, and
/// restores the context of whichever process the strategy picked.
#[unsafe(naked)]
#[export_name = "__vector_9"]
pub unsafe extern "C" fn scheduler_isr() {
    naked_asm!(
        // Save the interrupted context. r31 first so it can stage SREG;
        // the restore path below and the frames built by exec mirror
        // this exact order.
        "push r31",
        "in   r31, 0x3f",
        "push r31",
        "push r30",
        "push r29",
        "push r28",
        "push r27",
        "push r26",
        "push r25",
        "push r24",
        "push r23",
        "push r22",
        "push r21",
        "push r20",
        "push r19",
        "push r18",
        "push r17",
        "push r16",
        "push r15",
        "push r14",
        "push r13",
        "push r12",
        "push r11",
        "push r10",
        "push r9",
        "push r8",
        "push r7",
        "push r6",
        "push r5",
        "push r4",
        "push r3",
        "push r2",
        "push r1",
        "push r0",
        // First argument: the parked stack pointer.
        "in   r24, 0x3d",
        "in   r25, 0x3e",
        // Run the scheduler on the dedicated ISR stack.
        "ldi  r30, lo8({region} + {isr_bottom})",
        "ldi  r31, hi8({region} + {isr_bottom})",
        "out  0x3d, r30",
        "out  0x3e, r31",
        "call {tick}",
        // Switch to the chosen process's stack.
        "out  0x3d, r24",
        "out  0x3e, r25",
        // Restore its context.
        "pop  r0",
        "pop  r1",
        "pop  r2",
        "pop  r3",
        "pop  r4",
        "pop  r5",
        "pop  r6",
        "pop  r7",
        "pop  r8",
        "pop  r9",
        "pop  r10",
        "pop  r11",
        "pop  r12",
        "pop  r13",
        "pop  r14",
        "pop  r15",
        "pop  r16",
        "pop  r17",
        "pop  r18",
        "pop  r19",
        "pop  r20",
        "pop  r21",
        "pop  r22",
        "pop  r23",
        "pop  r24",
        "pop  r25",
        "pop  r26",
        "pop  r27",
        "pop  r28",
        "pop  r29",
        "pop  r30",
        "pop  r31",
        "out  0x3f, r31",
        "pop  r31",
        "reti",
        region = sym crate::kernel::STACK_REGION,
        isr_bottom = const ISR_STACK_BOTTOM,
        tick = sym crate::kernel::scheduler_interrupt,
    )
}

/// Launch the first process: load its synthesized stack pointer and run
/// the generic restore path. The `reti` lands in the dispatcher
/// trampoline and turns interrupts on.
///
/// # Safety
/// `sp` must be the saved stack pointer of a dispatched-ready process;
/// never returns.
#[unsafe(naked)]
pub unsafe extern "C" fn start_first_process(sp: *mut u8) -> ! {
    naked_asm!(
        "cli",
        "out  0x3d, r24",
        "out  0x3e, r25",
        "pop  r0",
        "pop  r1",
        "pop  r2",
        "pop  r3",
        "pop  r4",
        "pop  r5",
        "pop  r6",
        "pop  r7",
        "pop  r8",
        "pop  r9",
        "pop  r10",
        "pop  r11",
        "pop  r12",
        "pop  r13",
        "pop  r14",
        "pop  r15",
        "pop  r16",
        "pop  r17",
        "pop  r18",
        "pop  r19",
        "pop  r20",
        "pop  r21",
        "pop  r22",
        "pop  r23",
        "pop  r24",
        "pop  r25",
        "pop  r26",
        "pop  r27",
        "pop  r28",
        "pop  r29",
        "pop  r30",
        "pop  r31",
        "out  0x3f, r31",
        "pop  r31",
        "reti",
    )
}
