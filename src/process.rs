//! # Process Model
//!
//! Defines the process descriptor and its lifecycle. Each process is an
//! independently schedulable program with a private stack window and one
//! slot in the kernel's fixed descriptor table.
//!
//! Slot 0 is reserved for the idle process, which runs whenever no user
//! process is runnable and must never return.

use crate::config::MAX_PROCESSES;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Index of a process in the descriptor table. Valid ids are
/// `0..MAX_PROCESSES`; everything else means "no process".
pub type ProcessId = u8;

/// Distinguished id meaning "no process". Used for the current-process
/// marker before the scheduler has started.
pub const INVALID_PROCESS: ProcessId = 0xFF;

/// Slot reserved for the idle process.
pub const IDLE_PROCESS: ProcessId = 0;

/// Entry function of a process. Programs take no arguments and never
/// return; a process leaves the table only through [`remove`].
///
/// [`remove`]: crate::scheduler::Scheduler::remove
pub type Program = extern "C" fn() -> !;

// ---------------------------------------------------------------------------
// Process state machine
// ---------------------------------------------------------------------------

/// Execution state of a process.
///
/// ```text
///   ┌──────────┐      exec()       ┌─────────┐
///   │  Unused  │ ────────────────► │  Ready  │
///   └──────────┘                   └─────────┘
///        ▲                          ▲      │ dispatch
///        │ remove()                 │      ▼
///        │                    tick  │  ┌─────────┐
///        └───────────────────────── │ │ Running │
///                                   └─┴─────────┘
/// ```
///
/// `Blocked` is reserved for a future blocking-primitive layer: nothing
/// in the kernel produces it, but every strategy treats it as "not
/// runnable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Slot is free; `exec` may claim it.
    Unused,
    /// Process has a parked context and is waiting to be dispatched.
    Ready,
    /// Process currently owns the CPU. At most one slot is `Running`.
    Running,
    /// Process is waiting for an event and must not be selected.
    Blocked,
}

// ---------------------------------------------------------------------------
// Process descriptor
// ---------------------------------------------------------------------------

/// One slot of the process table.
///
/// While a process is parked (not executing), `sp` points into its stack
/// window at the byte below its saved context, and `checksum` covers every
/// stack byte from `sp` down to the window bottom. Both are rewritten on
/// every context save and audited on every restore.
#[derive(Debug, Clone, Copy)]
pub struct ProcessDescriptor {
    /// Current lifecycle state.
    pub state: ProcessState,

    /// Scheduling priority; higher value wins. Meaningful only while the
    /// slot is in use.
    pub priority: u8,

    /// The program this slot was exec'd with. `None` for an unused slot.
    pub program: Option<Program>,

    /// Saved hardware stack pointer. Points to the next free byte of the
    /// process's stack window (pushes decrement).
    pub sp: *mut u8,

    /// XOR fold of `stack[sp..=bottom]`, stored at context save.
    pub checksum: u8,
}

// Safety: the raw `sp` always points into the kernel's static stack
// region, and descriptors are only touched inside critical sections or
// from the scheduler ISR.
unsafe impl Send for ProcessDescriptor {}
unsafe impl Sync for ProcessDescriptor {}

impl ProcessDescriptor {
    /// An unused slot; initializer for the static table.
    pub const EMPTY: Self = Self {
        state: ProcessState::Unused,
        priority: 0,
        program: None,
        sp: core::ptr::null_mut(),
        checksum: 0,
    };

    /// A process is runnable iff it is `Ready` or `Running`.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        matches!(self.state, ProcessState::Ready | ProcessState::Running)
    }
}

/// The kernel's process table: one descriptor per possible process,
/// idle at index 0.
pub type ProcessTable = [ProcessDescriptor; MAX_PROCESSES];

/// True iff `pid` names a user slot (not idle) that is currently
/// runnable. Selection strategies use this to honor the idle rule.
#[inline]
pub fn runnable_user(table: &ProcessTable, pid: ProcessId) -> bool {
    pid != IDLE_PROCESS && (pid as usize) < MAX_PROCESSES && table[pid as usize].is_runnable()
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn spin() -> ! {
        loop {}
    }

    #[test]
    fn test_empty_descriptor() {
        let d = ProcessDescriptor::EMPTY;
        assert_eq!(d.state, ProcessState::Unused);
        assert_eq!(d.priority, 0);
        assert!(d.program.is_none());
        assert!(d.sp.is_null());
        assert!(!d.is_runnable());
    }

    #[test]
    fn test_runnable_states() {
        let mut d = ProcessDescriptor::EMPTY;
        d.program = Some(spin as Program);

        d.state = ProcessState::Ready;
        assert!(d.is_runnable());
        d.state = ProcessState::Running;
        assert!(d.is_runnable());
        d.state = ProcessState::Blocked;
        assert!(!d.is_runnable());
        d.state = ProcessState::Unused;
        assert!(!d.is_runnable());
    }

    #[test]
    fn test_runnable_user_excludes_idle() {
        let mut table = [ProcessDescriptor::EMPTY; MAX_PROCESSES];
        table[0].state = ProcessState::Ready;
        table[3].state = ProcessState::Ready;

        assert!(!runnable_user(&table, IDLE_PROCESS));
        assert!(runnable_user(&table, 3));
        assert!(!runnable_user(&table, 4));
        assert!(!runnable_user(&table, INVALID_PROCESS));
    }
}
