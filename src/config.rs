//! # OttOS Configuration
//!
//! Compile-time constants governing the process table, the stack layout
//! and the scheduling timer. All limits are fixed at compile time — no
//! dynamic allocation anywhere in the kernel.

/// Maximum number of processes, including the idle process in slot 0.
/// This bounds the descriptor table and the number of process stacks.
pub const MAX_PROCESSES: usize = 8;

/// Priority assigned by `exec` wrappers that do not specify one.
/// Higher numeric value means higher priority.
pub const DEFAULT_PRIORITY: u8 = 2;

/// Total on-chip SRAM of the target device (ATmega644).
pub const SRAM_SIZE: usize = 4096;

/// Bytes reserved at the very top of SRAM for the boot/init stack.
/// The kernel never touches it after the first dispatch.
pub const INIT_STACK_SIZE: usize = 32;

/// Bytes reserved for the dedicated scheduler/ISR stack, directly below
/// the init stack.
pub const ISR_STACK_SIZE: usize = 192;

/// Bytes per process stack. The lower half of SRAM stays available for
/// `.data`/`.bss`; the upper half holds the init stack, the ISR stack
/// and the eight process stacks.
pub const PROCESS_STACK_SIZE: usize =
    (SRAM_SIZE / 2 - INIT_STACK_SIZE - ISR_STACK_SIZE) / MAX_PROCESSES;

/// Size of the statically reserved stack region: the ISR stack plus all
/// process stacks. The init stack is the hardware boot stack and lives
/// outside this region.
pub const STACK_REGION_SIZE: usize = ISR_STACK_SIZE + MAX_PROCESSES * PROCESS_STACK_SIZE;

/// Bytes of saved register context per process: r0–r31 plus SREG.
pub const CONTEXT_SIZE: usize = 33;

/// Bytes of a freshly synthesized context: the register context plus the
/// two-byte return-address word.
pub const INITIAL_FRAME_SIZE: usize = CONTEXT_SIZE + 2;

/// System clock frequency in Hz (external crystal on the target board).
pub const SYSTEM_CLOCK_HZ: u32 = 20_000_000;

/// Prescaler applied to the scheduling timer (Timer2, clk/1024).
pub const TIMER_PRESCALE: u32 = 1024;

/// Scheduler tick frequency in Hz. One compare match — one preemption.
pub const TICK_HZ: u32 = 100;

/// Compare value for Timer2 CTC mode, derived from the clock, the
/// prescaler and the tick frequency. Must fit the 8-bit compare register.
pub const TIMER_COMPARE: u8 =
    (SYSTEM_CLOCK_HZ / TIMER_PRESCALE / TICK_HZ - 1) as u8;

// One compare-match period must be expressible in 8 bits.
const _: () = assert!(SYSTEM_CLOCK_HZ / TIMER_PRESCALE / TICK_HZ <= 256);

// The stack partition must consume exactly the upper half of SRAM.
const _: () = assert!(
    INIT_STACK_SIZE + ISR_STACK_SIZE + MAX_PROCESSES * PROCESS_STACK_SIZE == SRAM_SIZE / 2
);

// A process stack must at least hold one synthesized context.
const _: () = assert!(PROCESS_STACK_SIZE > INITIAL_FRAME_SIZE);
