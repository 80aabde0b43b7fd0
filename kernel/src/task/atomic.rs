// kernel/src/task/atomic.rs
//! Interrupt-disable critical sections for code that must look atomic to the
//! scheduler (state transitions, registry mutation from an interrupt handler).
//!
//! Nests correctly: interrupts are only re-enabled once the outermost guard
//! drops, so a function that enters an atomic section internally can safely
//! call another function that does the same.

use core::sync::atomic::{AtomicUsize, Ordering};
use x86_64::instructions::interrupts;

static DEPTH: AtomicUsize = AtomicUsize::new(0);

/// RAII guard returned by [`enter`]. Interrupts are restored to their
/// pre-guard state when the last nested guard is dropped.
pub struct AtomicSection {
    were_enabled: bool,
}

/// Enter an atomic section, disabling interrupts if this is the outermost one.
pub fn enter() -> AtomicSection {
    let were_enabled = interrupts::are_enabled();
    if were_enabled {
        interrupts::disable();
    }
    DEPTH.fetch_add(1, Ordering::SeqCst);
    AtomicSection { were_enabled }
}

/// True if the caller is currently inside an atomic section.
pub fn is_atomic() -> bool {
    DEPTH.load(Ordering::SeqCst) > 0
}

impl Drop for AtomicSection {
    fn drop(&mut self) {
        let depth = DEPTH.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(depth > 0, "atomic section depth underflow");
        if depth == 1 && self.were_enabled {
            interrupts::enable();
        }
    }
}

/// Run `f` inside an atomic section.
pub fn atomically<R>(f: impl FnOnce() -> R) -> R {
    let _guard = enter();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn not_atomic_outside_any_guard() {
        assert!(!is_atomic());
    }

    #[test_case]
    fn is_atomic_while_guard_held_and_not_after() {
        {
            let _guard = enter();
            assert!(is_atomic());
        }
        assert!(!is_atomic());
    }

    #[test_case]
    fn nested_guards_keep_is_atomic_true_until_outermost_drops() {
        let outer = enter();
        let inner = enter();
        assert!(is_atomic());
        drop(inner);
        assert!(is_atomic());
        drop(outer);
        assert!(!is_atomic());
    }
}
