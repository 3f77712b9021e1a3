//! # Architecture Abstraction Layer
//!
//! The port surface the kernel needs from the hardware: global
//! interrupt flag access, scheduling-timer masking, the dispatcher
//! trampoline's entry word, and a reschedule request. The ATmega644
//! port implements it against the real device; the host port is a test
//! double so the kernel core can be exercised by `cargo test` on a
//! development machine.

#[cfg(target_arch = "avr")]
pub mod atmega644;
#[cfg(target_arch = "avr")]
pub use atmega644 as port;

#[cfg(not(target_arch = "avr"))]
pub mod host;
#[cfg(not(target_arch = "avr"))]
pub use host as port;
