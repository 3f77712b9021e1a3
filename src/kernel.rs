//! # Kernel
//!
//! The global kernel instance and the public API over it. This module
//! owns the scheduler, the stack region, the critical-section gate and
//! the error-reporting hooks as statics, and is the only place that
//! touches them; the ISR reaches in through `scheduler_interrupt` and
//! the `STACK_REGION` symbol.
//!
//! ## Startup sequence
//!
//! ```text
//! reset vector (avr-device rt)
//!   └─► main()
//!         ├─► register autostart programs
//!         └─► kernel::start()            ← does not return
//!               ├─► exec idle into slot 0
//!               ├─► exec every autostart program, in order
//!               ├─► program + arm the scheduling timer
//!               └─► first dispatch into the idle process
//! ```
//!
//! ## Error reporting
//!
//! Fatal conditions (gate misuse, stack corruption) funnel into
//! [`os_error`]: scheduling stops, the message goes to the registered
//! display hook, and the kernel waits for the confirm hook before
//! restoring the interrupt flag exactly as found. The sink returns —
//! it neither panics nor resets the MCU.

use core::ptr::{addr_of, addr_of_mut};

use crate::arch::port;
use crate::config::MAX_PROCESSES;
use crate::critical::CriticalGate;
use crate::process::{ProcessDescriptor, ProcessId, Program};
use crate::scheduler::{ExecError, Scheduler};
use crate::stack::StackRegion;
use crate::strategy::Strategy;

// ---------------------------------------------------------------------------
// Global kernel state
// ---------------------------------------------------------------------------

// Safety: single core. Everything below is touched either with the
// scheduler masked (gate held), with interrupts disabled, or from the
// scheduler ISR itself; access goes through `addr_of_mut!` at the use
// sites.
static mut SCHEDULER: Scheduler = Scheduler::new();

/// The stack partition. `pub(crate)` because the context-switch ISR
/// takes the ISR-stack address from this symbol.
pub(crate) static mut STACK_REGION: StackRegion = StackRegion::new();

static mut GATE: CriticalGate = CriticalGate::new();

static mut ERROR_HOOKS: ErrorHooks = ErrorHooks {
    show: show_nowhere,
    confirm: confirm_immediately,
};

fn show_nowhere(_msg: &str) {}
fn confirm_immediately() {}

// ---------------------------------------------------------------------------
// Collaborator hooks
// ---------------------------------------------------------------------------

/// Interfaces to the display and input collaborators, used only by the
/// fatal-error path. The defaults report nowhere and confirm
/// immediately; firmware installs real hooks before starting.
#[derive(Clone, Copy)]
pub struct ErrorHooks {
    /// Put one line of fault text on the operator display.
    pub show: fn(&str),
    /// Block until the operator acknowledges the fault.
    pub confirm: fn(),
}

/// Install the error-reporting hooks.
pub fn set_error_hooks(hooks: ErrorHooks) {
    unsafe { *addr_of_mut!(ERROR_HOOKS) = hooks };
}

/// Fatal-error sink. Disables the scheduling timer, reports `msg`
/// through the hooks with interrupts held off, and restores the global
/// interrupt flag to its pre-call state before returning. The timer is
/// not re-armed: after a fatal report, multitasking stays frozen while
/// every other interrupt keeps working.
pub fn os_error(msg: &str) {
    port::disarm_scheduler_timer();
    let saved = port::interrupts_enabled();
    // Safety: flag restored below, exactly as snapshotted.
    unsafe { port::set_interrupt_flag(false) };

    let hooks = unsafe { *addr_of!(ERROR_HOOKS) };
    (hooks.show)(msg);
    (hooks.confirm)();

    unsafe { port::set_interrupt_flag(saved) };
}

// ---------------------------------------------------------------------------
// Critical sections
// ---------------------------------------------------------------------------

/// Enter a critical section: the scheduler stays out until the matching
/// [`leave_critical`]. Nests up to 255 deep; overflowing is fatal.
pub fn enter_critical() {
    let gate = unsafe { &mut *addr_of_mut!(GATE) };
    if gate.enter().is_err() {
        os_error("critical section overflow");
    }
}

/// Leave a critical section. The outermost leave re-arms the scheduler
/// and restores the interrupt flag snapshotted on entry. Leaving with
/// no section open is fatal.
pub fn leave_critical() {
    let gate = unsafe { &mut *addr_of_mut!(GATE) };
    if gate.leave().is_err() {
        os_error("critical section underflow");
    }
}

/// Current gate nesting depth; zero means scheduling is live.
pub fn critical_depth() -> u8 {
    unsafe { (*addr_of!(GATE)).depth() }
}

// ---------------------------------------------------------------------------
// Process API
// ---------------------------------------------------------------------------

/// Create a process from `program` with the given priority. Safe to
/// call from any process and from within a critical section; the gate
/// is held for the duration and released on every path.
pub fn exec(program: Program, priority: u8) -> Result<ProcessId, ExecError> {
    enter_critical();
    let result = unsafe {
        (*addr_of_mut!(SCHEDULER)).exec(&mut *addr_of_mut!(STACK_REGION), program, priority)
    };
    leave_critical();
    result
}

/// Remove a process from the table, freeing its slot and its strategy
/// accounting.
pub fn remove(pid: ProcessId) {
    enter_critical();
    unsafe { (*addr_of_mut!(SCHEDULER)).remove(pid) };
    leave_critical();
}

/// Id of the currently running process; `INVALID_PROCESS` before the
/// first dispatch.
pub fn current_pid() -> ProcessId {
    unsafe { (*addr_of!(SCHEDULER)).current_pid() }
}

/// Snapshot of one process-table slot.
pub fn slot(pid: ProcessId) -> ProcessDescriptor {
    enter_critical();
    let d = unsafe { *(*addr_of!(SCHEDULER)).descriptor(pid) };
    leave_critical();
    d
}

/// Number of occupied table slots.
pub fn process_count() -> u8 {
    enter_critical();
    let n = unsafe { (*addr_of!(SCHEDULER)).process_count() };
    leave_critical();
    n
}

/// The active scheduling strategy.
pub fn strategy() -> Strategy {
    unsafe { (*addr_of!(SCHEDULER)).strategy() }
}

/// Switch the scheduling strategy; its accounting restarts fresh.
pub fn set_strategy(kind: Strategy) {
    enter_critical();
    unsafe { (*addr_of_mut!(SCHEDULER)).set_strategy(kind) };
    leave_critical();
}

/// Recompute the stack checksum of `pid` over its parked context.
pub fn stack_checksum(pid: ProcessId) -> u8 {
    enter_critical();
    let sum = unsafe {
        (*addr_of!(SCHEDULER)).stack_checksum(&*addr_of!(STACK_REGION), pid)
    };
    leave_critical();
    sum
}

/// Give up the CPU voluntarily: forces a compare match so the next
/// scheduling tick happens as soon as interrupts and the gate allow.
pub fn yield_now() {
    port::request_reschedule();
}

/// Program of the currently running process; the dispatcher trampoline
/// jumps here on a process's first run.
pub fn current_program() -> Option<Program> {
    let s = unsafe { &*addr_of!(SCHEDULER) };
    let pid = s.current_pid();
    if (pid as usize) < MAX_PROCESSES {
        s.descriptor(pid).program
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Fixed-capacity registration table for programs that start with the
/// kernel. Registration order is the exec order and therefore the slot
/// order: the first registered program becomes process 1.
pub struct AutostartTable {
    programs: [Option<Program>; MAX_PROCESSES - 1],
    len: usize,
}

impl AutostartTable {
    pub const fn new() -> Self {
        Self {
            programs: [None; MAX_PROCESSES - 1],
            len: 0,
        }
    }

    /// Append a program. Returns `false` when all user slots are
    /// spoken for.
    pub fn register(&mut self, program: Program) -> bool {
        if self.len == self.programs.len() {
            return false;
        }
        self.programs[self.len] = Some(program);
        self.len += 1;
        true
    }

    /// Registered programs, in registration order.
    pub fn programs(&self) -> impl Iterator<Item = Program> + '_ {
        self.programs[..self.len].iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The idle process: slot 0, runs when nothing else is runnable, never
/// returns.
extern "C" fn idle() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// Reset the kernel state. Called by [`start`]; host tests call it
/// directly to get a clean instance.
pub fn init() {
    unsafe {
        *addr_of_mut!(SCHEDULER) = Scheduler::new();
        *addr_of_mut!(GATE) = CriticalGate::new();
    }
}

/// Boot the kernel: populate the process table (idle at slot 0, then
/// every autostart program in registration order), program and arm the
/// scheduling timer, and dispatch into the idle process. Does not
/// return.
#[cfg(target_arch = "avr")]
pub fn start(dp: avr_device::atmega644::Peripherals, autostart: &AutostartTable) -> ! {
    // No preemption while the table is under construction.
    avr_device::interrupt::disable();
    init();

    let scheduler = unsafe { &mut *addr_of_mut!(SCHEDULER) };
    let region = unsafe { &mut *addr_of_mut!(STACK_REGION) };

    if scheduler.exec(region, idle, 0).is_err() {
        os_error("no slot for idle");
    }
    for program in autostart.programs() {
        // Cannot fail: the registry holds at most the seven user slots.
        if scheduler.exec(region, program, crate::config::DEFAULT_PRIORITY).is_err() {
            os_error("process table exhausted");
        }
    }

    port::init_scheduler_timer(&dp.TC2);
    port::arm_scheduler_timer();

    let sp = scheduler.launch();
    // Safety: sp is the synthesized context of the idle process; the
    // restore path lands in the dispatcher trampoline.
    unsafe { port::start_first_process(sp) }
}

// ---------------------------------------------------------------------------
// ISR entry
// ---------------------------------------------------------------------------

/// Called by the context-switch ISR, on the ISR stack, with interrupts
/// disabled. Takes the interrupted process's parked stack pointer and
/// returns the stack pointer to restore. A stack fault is reported
/// through [`os_error`]; afterwards the recomputed checksum is adopted
/// and the chosen process dispatched regardless.
#[cfg(target_arch = "avr")]
pub(crate) extern "C" fn scheduler_interrupt(sp: *mut u8) -> *mut u8 {
    use crate::scheduler::Fault;

    let scheduler = unsafe { &mut *addr_of_mut!(SCHEDULER) };
    let region = unsafe { &mut *addr_of_mut!(STACK_REGION) };
    match scheduler.tick(region, sp) {
        Ok(next_sp) => next_sp,
        Err(Fault::StackCorruption(pid)) => {
            os_error("stack checksum mismatch");
            scheduler.adopt_and_dispatch(region, pid)
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only, serialized: they share the kernel globals)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::host;
    use crate::config::DEFAULT_PRIORITY;
    use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    extern "C" fn prog_a() -> ! {
        loop {}
    }
    extern "C" fn prog_b() -> ! {
        loop {}
    }
    extern "C" fn prog_c() -> ! {
        loop {}
    }

    static SHOW_CALLS: AtomicUsize = AtomicUsize::new(0);
    static MSG_SEEN: AtomicBool = AtomicBool::new(false);
    static FLAG_OFF_DURING_PROMPT: AtomicBool = AtomicBool::new(false);

    fn counting_show(msg: &str) {
        SHOW_CALLS.fetch_add(1, Ordering::SeqCst);
        MSG_SEEN.store(!msg.is_empty(), Ordering::SeqCst);
    }
    fn checking_confirm() {
        FLAG_OFF_DURING_PROMPT.store(!port::interrupts_enabled(), Ordering::SeqCst);
    }

    fn fresh_kernel() {
        host::reset_for_test();
        init();
        set_error_hooks(ErrorHooks {
            show: counting_show,
            confirm: checking_confirm,
        });
        SHOW_CALLS.store(0, Ordering::SeqCst);
        MSG_SEEN.store(false, Ordering::SeqCst);
        FLAG_OFF_DURING_PROMPT.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_exec_keeps_gate_balanced_even_when_full() {
        let _lock = host::test_guard();
        fresh_kernel();

        for expect in 0..MAX_PROCESSES as ProcessId {
            assert_eq!(exec(prog_a, 2), Ok(expect));
            assert_eq!(critical_depth(), 0);
        }
        assert_eq!(exec(prog_a, 2), Err(ExecError::TableFull));
        assert_eq!(critical_depth(), 0);
        assert_eq!(process_count(), MAX_PROCESSES as u8);
        assert_eq!(SHOW_CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_critical_sections_preserve_interrupt_flag() {
        let _lock = host::test_guard();
        fresh_kernel();

        for initial in [false, true] {
            unsafe { port::set_interrupt_flag(initial) };
            enter_critical();
            enter_critical();
            leave_critical();
            leave_critical();
            assert_eq!(port::interrupts_enabled(), initial);
            assert_eq!(critical_depth(), 0);
        }
        assert_eq!(SHOW_CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_gate_misuse_reports_fatal_exactly_once() {
        let _lock = host::test_guard();
        fresh_kernel();

        // Underflow: no section open.
        leave_critical();
        assert_eq!(SHOW_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(critical_depth(), 0);

        // Overflow: counter pegged at 255.
        for _ in 0..255 {
            enter_critical();
        }
        enter_critical();
        assert_eq!(SHOW_CALLS.load(Ordering::SeqCst), 2);
        assert_eq!(critical_depth(), 255);

        for _ in 0..255 {
            leave_critical();
        }
        assert_eq!(SHOW_CALLS.load(Ordering::SeqCst), 2);
        assert_eq!(critical_depth(), 0);
    }

    #[test]
    fn test_os_error_reports_and_restores_flag() {
        let _lock = host::test_guard();
        fresh_kernel();

        unsafe { port::set_interrupt_flag(true) };
        port::arm_scheduler_timer();

        os_error("stack checksum mismatch");

        assert_eq!(SHOW_CALLS.load(Ordering::SeqCst), 1);
        assert!(MSG_SEEN.load(Ordering::SeqCst));
        // Interrupts were off for the prompt, restored afterwards.
        assert!(FLAG_OFF_DURING_PROMPT.load(Ordering::SeqCst));
        assert!(port::interrupts_enabled());
        // The scheduler stays down until reset.
        assert!(!host::scheduler_timer_armed());
    }

    #[test]
    fn test_autostart_order_becomes_slot_order() {
        let _lock = host::test_guard();
        fresh_kernel();

        let mut autostart = AutostartTable::new();
        assert!(autostart.register(prog_a));
        assert!(autostart.register(prog_b));
        assert!(autostart.register(prog_c));
        assert_eq!(autostart.len(), 3);

        // As `start` would: idle first, then the registry in order.
        assert_eq!(exec(idle, 0), Ok(0));
        for program in autostart.programs() {
            exec(program, DEFAULT_PRIORITY).unwrap();
        }

        assert_eq!(slot(1).program, Some(prog_a as Program));
        assert_eq!(slot(2).program, Some(prog_b as Program));
        assert_eq!(slot(3).program, Some(prog_c as Program));
        assert_eq!(slot(2).priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_autostart_rejects_more_than_user_slots() {
        let mut autostart = AutostartTable::new();
        for _ in 0..MAX_PROCESSES - 1 {
            assert!(autostart.register(prog_a));
        }
        assert!(!autostart.register(prog_a));
        assert_eq!(autostart.len(), MAX_PROCESSES - 1);
    }

    #[test]
    fn test_yield_requests_a_tick() {
        let _lock = host::test_guard();
        fresh_kernel();

        let before = host::reschedule_requests();
        yield_now();
        assert_eq!(host::reschedule_requests(), before + 1);
    }
}
