//! Single-flight fetch guard.
//!
//! Every trigger (sentinel, gesture, autofill, manual call) must hold a
//! [`FetchPermit`] before issuing a page fetch. Acquisition is a synchronous
//! compare-and-swap that never waits; a caller that loses the race does
//! nothing. The permit releases the guard when dropped, so a failed or
//! cancelled fetch cannot leave it stuck.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::FetchKind;

const IDLE: u8 = 0;

fn encode(kind: FetchKind) -> u8 {
    match kind {
        FetchKind::Freshest => 1,
        FetchKind::Older => 2,
        FetchKind::Newer => 3,
    }
}

fn decode(raw: u8) -> Option<FetchKind> {
    match raw {
        1 => Some(FetchKind::Freshest),
        2 => Some(FetchKind::Older),
        3 => Some(FetchKind::Newer),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct FetchGuard {
    state: AtomicU8,
}

impl FetchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard for one fetch of `kind`. `None` means another fetch
    /// is in flight.
    pub fn try_acquire(&self, kind: FetchKind) -> Option<FetchPermit<'_>> {
        self.state
            .compare_exchange(IDLE, encode(kind), Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FetchPermit { guard: self, kind })
    }

    pub fn is_busy(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    /// Kind of the fetch currently holding the guard.
    pub fn in_flight(&self) -> Option<FetchKind> {
        decode(self.state.load(Ordering::Acquire))
    }

    fn release(&self) {
        self.state.store(IDLE, Ordering::Release);
    }
}

/// Scoped ownership of the fetch guard.
#[derive(Debug)]
pub struct FetchPermit<'a> {
    guard: &'a FetchGuard,
    kind: FetchKind,
}

impl FetchPermit<'_> {
    pub fn kind(&self) -> FetchKind {
        self.kind
    }
}

impl Drop for FetchPermit<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}
