//! # Host Port Double
//!
//! Stand-in for the ATmega644 port on non-AVR builds. The hardware
//! bits the kernel touches — the global interrupt flag and the
//! scheduling-timer mask — become atomics that unit tests can inspect
//! and preset. Behavior-free pieces (the trampoline entry word) are
//! derived the same way as on the target.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

static INTERRUPT_FLAG: AtomicBool = AtomicBool::new(true);
static TIMER_ARMED: AtomicBool = AtomicBool::new(false);
static RESCHEDULE_REQUESTS: AtomicU32 = AtomicU32::new(0);

/// State of the emulated global interrupt flag.
pub fn interrupts_enabled() -> bool {
    INTERRUPT_FLAG.load(Ordering::SeqCst)
}

/// Overwrite the emulated global interrupt flag.
///
/// # Safety
/// None on the host; unsafe to match the target port's signature.
pub unsafe fn set_interrupt_flag(enabled: bool) {
    INTERRUPT_FLAG.store(enabled, Ordering::SeqCst);
}

/// Unmask the emulated scheduling-timer interrupt.
pub fn arm_scheduler_timer() {
    TIMER_ARMED.store(true, Ordering::SeqCst);
}

/// Mask the emulated scheduling-timer interrupt.
pub fn disarm_scheduler_timer() {
    TIMER_ARMED.store(false, Ordering::SeqCst);
}

/// Record a voluntary reschedule request.
pub fn request_reschedule() {
    RESCHEDULE_REQUESTS.fetch_add(1, Ordering::SeqCst);
}

fn dispatch_marker() {}

/// Host stand-in for the trampoline's flash word address.
pub fn dispatch_entry_word() -> u16 {
    let entry: fn() = dispatch_marker;
    ((entry as usize) >> 1) as u16
}

// ---------------------------------------------------------------------------
// Test inspection
// ---------------------------------------------------------------------------

/// Whether the emulated scheduling timer is currently unmasked.
pub fn scheduler_timer_armed() -> bool {
    TIMER_ARMED.load(Ordering::SeqCst)
}

/// Number of reschedule requests since the last reset.
pub fn reschedule_requests() -> u32 {
    RESCHEDULE_REQUESTS.load(Ordering::SeqCst)
}

/// Reset the double to power-on state.
#[cfg(test)]
pub fn reset_for_test() {
    INTERRUPT_FLAG.store(true, Ordering::SeqCst);
    TIMER_ARMED.store(false, Ordering::SeqCst);
    RESCHEDULE_REQUESTS.store(0, Ordering::SeqCst);
}

/// Serializes tests that share the port statics and the kernel globals.
#[cfg(test)]
pub fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
