// Orchestrator constants (no magic values)

use crate::domain::job::INITIAL_PROGRESS_PERCENT;
use std::time::Duration;

/// Progress reserved ahead of the first generator call (set on submit)
pub const HEAD_PROGRESS_PERCENT: u8 = INITIAL_PROGRESS_PERCENT;

/// Progress reserved after the last generator call for finalization
pub const TAIL_PROGRESS_PERCENT: u8 = 5;

/// Label while sources are resolved into generation targets
pub const PREPARING_LABEL: &str = "Preparing sources...";

/// Label between the last generator call and completion
pub const FINALIZING_LABEL: &str = "Finalizing...";

/// Attempts at the terminal write before the record is left to recovery
pub const TERMINAL_SAVE_ATTEMPTS: u32 = 5;

/// First delay between terminal write attempts; doubles on each retry
pub const TERMINAL_SAVE_BACKOFF: Duration = Duration::from_millis(100);

/// Capacity of the job event broadcast channel
/// Slow subscribers lag and skip snapshots; the store stays authoritative.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
