//! # OttOS
//!
//! A small preemptive multitasking kernel for AVR-class 8-bit
//! microcontrollers (ATmega644: 4 KB SRAM, 64 KB flash, single core,
//! no MMU). Up to eight processes — the idle process plus seven user
//! programs — share the CPU through periodic timer-driven context
//! switches.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    User Programs                        │
//! ├────────────────────────────────────────────────────────┤
//! │                Kernel API (kernel.rs)                   │
//! │    init() · exec() · yield_now() · enter_critical()     │
//! ├──────────────┬────────────────────┬────────────────────┤
//! │  Scheduler   │   Strategies       │  Critical gate     │
//! │  scheduler.rs│   strategy.rs      │  critical.rs       │
//! │  ─ exec()    │   ─ Even           │  ─ enter()         │
//! │  ─ tick()    │   ─ Random         │  ─ leave()         │
//! │  ─ remove()  │   ─ RoundRobin     │                    │
//! │              │   ─ InactiveAging  │                    │
//! │              │   ─ RunToCompletion│                    │
//! ├──────────────┴────────────────────┴────────────────────┤
//! │        Process model + stacks (process.rs, stack.rs)    │
//! │   ProcessDescriptor · StackRegion · frames · checksums  │
//! ├────────────────────────────────────────────────────────┤
//! │             Arch Port (arch/atmega644.rs)               │
//! │    Timer2 CTC · context-switch ISR · trampoline         │
//! ├────────────────────────────────────────────────────────┤
//! │                AVR Hardware (ATmega644)                 │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling model
//!
//! Every compare match of the scheduling timer preempts the running
//! process at an arbitrary instruction boundary. The interrupt service
//! routine pushes the full register file and status register onto the
//! interrupted process's private stack, checksums the used part of that
//! stack, runs the active selection strategy over the process table, and
//! resumes whichever process the strategy picked — after verifying that
//! process's stored stack checksum. The idle process in slot 0 runs if
//! and only if no user process is runnable.
//!
//! Five selection strategies are available at run time; they dispatch
//! through a closed enum rather than function pointers because the
//! decision happens inside the ISR.
//!
//! ## Memory model
//!
//! - **No heap**: all state is statically reserved
//! - **Fixed descriptor table**: `[ProcessDescriptor; MAX_PROCESSES]`
//! - **One stack region**: a single static partition holding the ISR
//!   stack and eight equal-size process stacks, laid out top-down
//! - **Critical sections**: a counted gate that masks only the scheduling
//!   timer, leaving every other interrupt serviceable

#![no_std]

#[cfg(test)]
extern crate std;

pub mod arch;
pub mod config;
pub mod critical;
pub mod kernel;
pub mod process;
pub mod scheduler;
pub mod stack;
pub mod strategy;
