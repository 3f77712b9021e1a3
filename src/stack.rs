//! # Stack Region
//!
//! One static partition holds every stack the kernel owns: the dedicated
//! ISR stack at the top, and below it one fixed-size stack window per
//! process slot. The boot/init stack is the hardware default stack at the
//! very top of SRAM and is not part of this region.
//!
//! ```text
//! high addresses                                  low addresses
//! ┌───────────┬───────────┬───────────┬─────┬───────────┐
//! │ ISR stack │ process 0 │ process 1 │ ... │ process 7 │
//! └───────────┴───────────┴───────────┴─────┴───────────┘
//!  bottom(isr)  bottom(0)   bottom(1)         bottom(7)
//! ```
//!
//! Stacks grow downward: a push stores at the stack pointer and then
//! decrements it, so the *bottom* of a window is its highest address and
//! the window of process `pid` covers
//! `[bottom(pid) − PROCESS_STACK_SIZE + 1, bottom(pid)]`.
//!
//! The module also owns the two byte-exact operations on stack memory:
//! synthesizing the initial context frame for `exec`, and the XOR
//! checksum that guards a parked process's stack window.

use crate::config::{
    CONTEXT_SIZE, INITIAL_FRAME_SIZE, ISR_STACK_SIZE, MAX_PROCESSES, PROCESS_STACK_SIZE,
    STACK_REGION_SIZE,
};
use crate::process::ProcessId;

// ---------------------------------------------------------------------------
// Window geometry
// ---------------------------------------------------------------------------

/// Region offset of the ISR stack's bottom (its initial stack pointer).
pub const ISR_STACK_BOTTOM: usize = STACK_REGION_SIZE - 1;

/// Region offset of the bottom (highest address) of `pid`'s stack window.
pub const fn process_stack_bottom(pid: ProcessId) -> usize {
    STACK_REGION_SIZE - ISR_STACK_SIZE - 1 - pid as usize * PROCESS_STACK_SIZE
}

/// Region offset of the top (lowest address) of `pid`'s stack window.
pub const fn process_stack_top(pid: ProcessId) -> usize {
    process_stack_bottom(pid) + 1 - PROCESS_STACK_SIZE
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// The statically reserved stack partition.
///
/// The scheduler owns the region and hands out raw stack pointers into
/// it; the context-switch ISR loads and stores the hardware SP from and
/// to those pointers.
#[repr(C)]
pub struct StackRegion {
    bytes: [u8; STACK_REGION_SIZE],
}

impl StackRegion {
    /// A zeroed region; initializer for the static instance.
    pub const fn new() -> Self {
        Self {
            bytes: [0; STACK_REGION_SIZE],
        }
    }

    /// Lowest address of the region.
    #[inline]
    pub fn base(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    /// Translate an absolute stack pointer back into a region offset.
    #[inline]
    fn offset_of(&self, sp: *const u8) -> usize {
        sp as usize - self.bytes.as_ptr() as usize
    }

    /// Absolute address of the given region offset.
    #[inline]
    pub fn address_of(&mut self, offset: usize) -> *mut u8 {
        debug_assert!(offset < STACK_REGION_SIZE);
        unsafe { self.bytes.as_mut_ptr().add(offset) }
    }

    /// True iff `sp` lies inside `pid`'s stack window.
    pub fn in_window(&self, pid: ProcessId, sp: *const u8) -> bool {
        let off = sp as usize;
        let base = self.bytes.as_ptr() as usize;
        off >= base + process_stack_top(pid) && off <= base + process_stack_bottom(pid)
    }

    /// Synthesize the initial saved context for a fresh process at the
    /// bottom of `pid`'s stack window, and return the resulting stack
    /// pointer.
    ///
    /// The frame mimics a preemption at the process's entry: the
    /// return-address word (`entry_word`, a flash word address) in native
    /// pop order — high byte below the low byte — topped by 33 zero bytes
    /// for r0–r31 and SREG. The first restore through the generic ISR
    /// tail therefore "resumes" straight into the entry.
    ///
    /// ```text
    /// bottom        → entry_word low byte   (popped last, by reti)
    /// bottom −  1   → entry_word high byte
    /// bottom −  2
    ///   ⋮             33 × 0x00             (r31, SREG, r30 … r0)
    /// bottom − 34
    /// bottom − 35   → next free byte; this is the returned sp
    /// ```
    pub fn write_initial_frame(&mut self, pid: ProcessId, entry_word: u16) -> *mut u8 {
        let bottom = process_stack_bottom(pid);
        self.bytes[bottom] = entry_word as u8;
        self.bytes[bottom - 1] = (entry_word >> 8) as u8;
        for i in 0..CONTEXT_SIZE {
            self.bytes[bottom - 2 - i] = 0;
        }
        self.address_of(bottom - INITIAL_FRAME_SIZE)
    }

    /// XOR-fold every byte of `pid`'s window from `sp` down to the
    /// window bottom, inclusive.
    ///
    /// Bytes above the bottom belong to a different window and bytes
    /// below `sp` are unused; neither is covered. The fold detects any
    /// single-byte change, but compensating multi-byte changes at equal
    /// bit positions cancel.
    pub fn checksum(&self, pid: ProcessId, sp: *const u8) -> u8 {
        let bottom = process_stack_bottom(pid);
        let top = self.offset_of(sp);
        debug_assert!(top >= process_stack_top(pid) && top <= bottom);
        self.bytes[top..=bottom].iter().fold(0, |acc, b| acc ^ b)
    }

    /// Test handle for corrupting and inspecting raw stack bytes.
    #[cfg(test)]
    pub fn byte_mut(&mut self, offset: usize) -> &mut u8 {
        &mut self.bytes[offset]
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
