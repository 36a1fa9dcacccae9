//! Shared busy indicator of the sync manager
//!
//! [`SyncActivity`] is the one flag shared across components: the
//! interception layer and the scheduler read it to avoid piling triggers on
//! a cycle in flight. A cycle holds an [`ActivityGuard`]; dropping the guard
//! returns the state to `Idle`.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use meddir_core::domain::SyncState;

#[derive(Debug, Clone, Default)]
pub struct SyncActivity {
    state: Arc<AtomicU8>,
}

impl SyncActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        SyncState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_busy(&self) -> bool {
        self.state() != SyncState::Idle
    }

    /// Moves `Idle -> Pushing`; `None` if a cycle is already in flight
    pub fn try_begin(&self) -> Option<ActivityGuard> {
        self.try_begin_with(SyncState::Pushing)
    }

    /// Moves `Idle -> initial`; `None` if a cycle is already in flight
    pub fn try_begin_with(&self, initial: SyncState) -> Option<ActivityGuard> {
        self.state
            .compare_exchange(
                SyncState::Idle as u8,
                initial as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| ActivityGuard {
                state: Arc::clone(&self.state),
            })
    }
}

/// Ownership of the running cycle
#[derive(Debug)]
pub struct ActivityGuard {
    state: Arc<AtomicU8>,
}

impl ActivityGuard {
    pub fn set(&self, state: SyncState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.state.store(SyncState::Idle as u8, Ordering::Release);
    }
}
