//! Lock-free caches for what the controller display last showed.

use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use desk_core::{ControllerFault, Position};

use crate::application::ports::FaultSink;

/// Last known desk height.
///
/// The position is packed into a single `AtomicU64`, so a reader always sees
/// a mantissa and exponent from the same update.  Last write wins.
#[derive(Debug, Default)]
pub struct PositionCache {
    bits: AtomicU64,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest height, or [`Position::default`] before the first reading.
    pub fn get(&self) -> Position {
        Position::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, position: Position) {
        self.bits.store(position.to_bits(), Ordering::Release);
    }
}

/// Set bit marking a latched fault; the low byte holds the code.
const FAULT_PRESENT: u16 = 0x100;

/// Error code the controller is currently displaying, if any.
#[derive(Debug, Default)]
pub struct FaultLatch {
    state: AtomicU16,
}

impl FaultLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<ControllerFault> {
        let state = self.state.load(Ordering::Acquire);
        (state & FAULT_PRESENT != 0).then(|| ControllerFault::new(state as u8))
    }
}

impl FaultSink for FaultLatch {
    fn raise(&self, fault: ControllerFault) {
        self.state
            .store(FAULT_PRESENT | u16::from(fault.code), Ordering::Release);
    }

    fn clear(&self) {
        self.state.store(0, Ordering::Release);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_cache_is_unknown() {
        assert!(PositionCache::new().get().is_unknown());
    }

    #[test]
    fn test_set_then_get() {
        let cache = PositionCache::new();
        cache.set(Position::new(725, -1));
        assert_eq!(cache.get(), Position::new(725, -1));
    }

    #[test]
    fn test_last_write_wins() {
        let cache = PositionCache::new();
        cache.set(Position::new(725, -1));
        cache.set(Position::new(1234, -2));
        assert_eq!(cache.get(), Position::new(1234, -2));
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_values() {
        // Arrange: two writers alternate between values with different exponents
        let cache = Arc::new(PositionCache::new());
        let a = Position::new(725, -1);
        let b = Position::new(1234, -2);
        cache.set(a);

        // Act
        let writers: Vec<_> = [a, b]
            .into_iter()
            .map(|p| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..10_000 {
                        cache.set(p);
                    }
                })
            })
            .collect();
        for _ in 0..10_000 {
            let seen = cache.get();
            // Assert: every observation is one of the written pairs
            assert!(seen == a || seen == b, "torn read: {seen:?}");
        }
        for w in writers {
            w.join().unwrap();
        }
    }

    #[test]
    fn test_fault_latch_raise_and_clear() {
        let latch = FaultLatch::new();
        assert_eq!(latch.current(), None);

        latch.raise(ControllerFault::new(0));
        assert_eq!(latch.current(), Some(ControllerFault::new(0)));

        latch.raise(ControllerFault::new(42));
        assert_eq!(latch.current(), Some(ControllerFault::new(42)));

        latch.clear();
        assert_eq!(latch.current(), None);
    }
}
