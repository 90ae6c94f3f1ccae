/// Current feed mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// No poll has completed yet
    #[default]
    Loading,
    /// At least one poll completed; events merge live
    Live,
}

/// Sync statistics
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub snapshots_applied: u64,
    pub events_applied: u64,
    pub duplicates_skipped: u64,
    pub poll_failures: u64,
    pub last_poll_at: Option<u64>,
}

/// Sync state tracking for the public message feed
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// Current sync mode
    pub mode: SyncMode,

    /// Statistics
    pub stats: SyncStats,
}

impl SyncState {
    /// Mark the first poll as finished, successful or not
    pub fn complete_initial_load(&mut self) {
        self.mode = SyncMode::Live;
    }

    pub fn record_snapshot(&mut self, at: u64) {
        self.stats.snapshots_applied += 1;
        self.stats.last_poll_at = Some(at);
    }

    pub fn record_event(&mut self) {
        self.stats.events_applied += 1;
    }

    pub fn record_duplicates(&mut self, count: usize) {
        self.stats.duplicates_skipped += count as u64;
    }

    pub fn record_poll_failure(&mut self) {
        self.stats.poll_failures += 1;
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.mode, SyncMode::Loading)
    }
}
