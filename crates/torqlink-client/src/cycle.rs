//! Tightening cycle collection.
//!
//! Pure bookkeeping for one cycle: start stamp, per-spindle results keyed
//! by spindle number (latest wins), and the watchdog deadline. Side
//! effects of completion (batch counting, VIN locking, event ordering)
//! belong to the projector.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use torqlink_mid::TighteningResult;

/// A cycle that has not produced all its results by this deadline is
/// declared incomplete.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(8);

/// A completed cycle, all spindles reported.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleComplete {
    pub results: Vec<TighteningResult>,
    pub overall_ok: bool,
    pub duration: Duration,
}

/// A cycle the watchdog gave up on.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleIncomplete {
    pub received: u8,
    pub results: Vec<TighteningResult>,
}

#[derive(Debug, Default)]
pub struct CycleAggregator {
    in_progress: bool,
    started_at: Option<Instant>,
    deadline: Option<Instant>,
    // BTreeMap keeps completed-cycle results in spindle order.
    pending: BTreeMap<u8, TighteningResult>,
}

impl CycleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn received(&self) -> u8 {
        self.pending.len() as u8
    }

    /// Begin a cycle and arm the watchdog. Clears any leftovers first; a
    /// cycle always starts empty.
    pub fn start(&mut self, now: Instant) {
        self.pending.clear();
        self.in_progress = true;
        self.started_at = Some(now);
        self.deadline = Some(now + WATCHDOG_TIMEOUT);
    }

    /// Record one spindle's result. Duplicate spindle numbers overwrite —
    /// the latest report wins.
    pub fn store(&mut self, result: TighteningResult) {
        self.pending.insert(result.spindle, result);
    }

    /// If every expected spindle has reported, close the cycle and return
    /// it. Cancels the watchdog and clears ephemeral state.
    pub fn take_complete(&mut self, spindle_count: u8, now: Instant) -> Option<CycleComplete> {
        if !self.in_progress || self.received() < spindle_count {
            return None;
        }
        let started_at = self.started_at.take();
        let results: Vec<TighteningResult> = std::mem::take(&mut self.pending).into_values().collect();
        self.in_progress = false;
        self.deadline = None;
        Some(CycleComplete {
            overall_ok: results.iter().all(|r| r.ok),
            duration: started_at.map_or(Duration::ZERO, |at| now.saturating_duration_since(at)),
            results,
        })
    }

    /// If the watchdog deadline has passed, abandon the cycle and return
    /// what was collected.
    pub fn take_expired(&mut self, now: Instant) -> Option<CycleIncomplete> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        let results: Vec<TighteningResult> = std::mem::take(&mut self.pending).into_values().collect();
        self.in_progress = false;
        self.started_at = None;
        self.deadline = None;
        Some(CycleIncomplete {
            received: results.len() as u8,
            results,
        })
    }

    /// Drop all cycle state without reporting. Used on disconnect.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_progress = false;
        self.started_at = None;
        self.deadline = None;
    }
}
