//! # Scheduler
//!
//! Owner of the process table and the stack region bookkeeping. The
//! scheduler provides the three operations the rest of the kernel is
//! built on:
//!
//! - [`exec`](Scheduler::exec) claims a free slot and synthesizes a
//!   runnable first context on that slot's private stack,
//! - [`tick`](Scheduler::tick) is the portable core of the context-switch
//!   ISR: it parks the interrupted process, runs the active strategy and
//!   audits the incoming process's stack before handing out its saved
//!   stack pointer,
//! - [`remove`](Scheduler::remove) returns a slot to the free pool and
//!   drops its strategy accounting.
//!
//! The hardware-facing halves — register push/pop, stack-pointer
//! swapping, the `reti` — live in the arch port; everything here runs
//! unchanged on the host test build.

use crate::arch::port;
use crate::process::{
    ProcessDescriptor, ProcessId, ProcessState, ProcessTable, Program, IDLE_PROCESS,
    INVALID_PROCESS,
};
use crate::stack::StackRegion;
use crate::strategy::{self, Strategy, StrategyState};
use crate::config::MAX_PROCESSES;

/// `exec` could not deliver a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// Every slot of the process table is occupied.
    TableFull,
}

/// Fatal condition detected on the dispatch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The incoming process's stack window no longer matches its stored
    /// checksum.
    StackCorruption(ProcessId),
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// The central scheduler state: descriptor table, current-process
/// marker, active strategy and its accounting. Stored as one global in
/// `kernel.rs`; unit tests build local instances.
pub struct Scheduler {
    table: ProcessTable,
    current: ProcessId,
    strategy: Strategy,
    accounting: StrategyState,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            table: [ProcessDescriptor::EMPTY; MAX_PROCESSES],
            current: INVALID_PROCESS,
            strategy: Strategy::Even,
            accounting: StrategyState::new(),
        }
    }

    // -- table access -------------------------------------------------------

    /// Descriptor of the given slot.
    #[inline]
    pub fn descriptor(&self, pid: ProcessId) -> &ProcessDescriptor {
        &self.table[pid as usize]
    }

    /// Id of the process currently owning the CPU; `INVALID_PROCESS`
    /// before the first dispatch.
    #[inline]
    pub fn current_pid(&self) -> ProcessId {
        self.current
    }

    /// Number of occupied slots.
    pub fn process_count(&self) -> u8 {
        self.table
            .iter()
            .filter(|d| d.state != ProcessState::Unused)
            .count() as u8
    }

    /// The active selection strategy.
    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Switch the selection strategy. All strategy accounting restarts
    /// from its initial values.
    pub fn set_strategy(&mut self, kind: Strategy) {
        self.strategy = kind;
        self.accounting.reset(&self.table);
    }

    /// Recompute the stack checksum of `pid` over its stored stack
    /// pointer. Zero for a slot that never held a context.
    pub fn stack_checksum(&self, region: &StackRegion, pid: ProcessId) -> u8 {
        let d = &self.table[pid as usize];
        if d.sp.is_null() {
            0
        } else {
            region.checksum(pid, d.sp)
        }
    }

    // -- process creation ---------------------------------------------------

    /// Create a process: claim the lowest-index free slot, synthesize an
    /// initial context on its stack and publish the descriptor as
    /// `Ready`.
    ///
    /// The synthesized context makes the first dispatch look like a
    /// return from preemption: the generic restore path pops 33 zero
    /// register bytes and "resumes" into the dispatcher trampoline,
    /// which enables interrupts and jumps to `program`.
    ///
    /// The caller must hold the critical-section gate; `exec` itself
    /// neither blocks nor calls into the strategy.
    pub fn exec(
        &mut self,
        region: &mut StackRegion,
        program: Program,
        priority: u8,
    ) -> Result<ProcessId, ExecError> {
        let pid = self
            .table
            .iter()
            .position(|d| d.state == ProcessState::Unused)
            .ok_or(ExecError::TableFull)? as ProcessId;

        let sp = region.write_initial_frame(pid, port::dispatch_entry_word());

        let d = &mut self.table[pid as usize];
        d.priority = priority;
        d.program = Some(program);
        d.sp = sp;
        d.checksum = region.checksum(pid, sp);
        // Published last: once `Ready`, the ISR may dispatch the slot.
        d.state = ProcessState::Ready;

        Ok(pid)
    }

    /// Return a slot to the free pool and drop its strategy accounting,
    /// so a later tenant does not inherit stale ages or time slices.
    /// Removing the current process is tolerated; the slot simply never
    /// gets parked again.
    pub fn remove(&mut self, pid: ProcessId) {
        if (pid as usize) < MAX_PROCESSES {
            self.table[pid as usize] = ProcessDescriptor::EMPTY;
            self.accounting.clear_slot(pid);
        }
    }

    // -- dispatch path ------------------------------------------------------

    /// Hand the CPU to the idle process for the very first dispatch.
    /// Returns idle's synthesized stack pointer.
    pub fn launch(&mut self) -> *mut u8 {
        let idle = &mut self.table[IDLE_PROCESS as usize];
        debug_assert!(idle.program.is_some());
        idle.state = ProcessState::Running;
        self.current = IDLE_PROCESS;
        idle.sp
    }

    /// One scheduling tick: the portable body of the context-switch ISR.
    ///
    /// `sp` is the hardware stack pointer after the ISR pushed the full
    /// register context onto the interrupted process's stack. Parking
    /// strictly precedes selection, selection strictly precedes the
    /// integrity audit, and the audit strictly precedes the handoff.
    ///
    /// On success the returned pointer is the incoming process's saved
    /// stack pointer, ready to be loaded into the hardware SP for the
    /// restore path.
    pub fn tick(&mut self, region: &mut StackRegion, sp: *mut u8) -> Result<*mut u8, Fault> {
        // Park the interrupted process. A slot that terminated or was
        // blocked between ticks keeps its state; only a running slot
        // goes back to the ready pool.
        if (self.current as usize) < MAX_PROCESSES {
            let pid = self.current;
            let d = &mut self.table[pid as usize];
            if d.state != ProcessState::Unused {
                d.sp = sp;
                d.checksum = region.checksum(pid, sp);
                if d.state == ProcessState::Running {
                    d.state = ProcessState::Ready;
                }
            }
        }

        let next = strategy::select(
            self.strategy,
            &mut self.accounting,
            &self.table,
            self.current,
        );
        debug_assert!(self.table[next as usize].is_runnable());

        self.dispatch(region, next)
    }

    /// Audit and hand over to `next`.
    fn dispatch(&mut self, region: &StackRegion, next: ProcessId) -> Result<*mut u8, Fault> {
        let d = &self.table[next as usize];
        if region.checksum(next, d.sp) != d.checksum {
            return Err(Fault::StackCorruption(next));
        }
        self.table[next as usize].state = ProcessState::Running;
        self.current = next;
        Ok(self.table[next as usize].sp)
    }

    /// Continuation after a reported stack fault: adopt the recomputed
    /// checksum as the new truth and dispatch the process anyway. Hiding
    /// the process instead would silently starve it and mask follow-up
    /// faults.
    pub fn adopt_and_dispatch(&mut self, region: &StackRegion, pid: ProcessId) -> *mut u8 {
        let d = &mut self.table[pid as usize];
        d.checksum = region.checksum(pid, d.sp);
        d.state = ProcessState::Running;
        self.current = pid;
        d.sp
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
