//! Scheduler counters
//!
//! Centralises the window size, the process-global retry counter, and
//! the sorting cadence counter. The retry counter tracks *consecutive*
//! failures across any requests; any success resets it.

/// Window, retry, and sorting-cadence state
#[derive(Debug)]
pub struct Scheduler {
    window_size: usize,
    max_retries: u32,
    sorting_interval: u32,
    retries: u32,
    sorting_counter: u32,
}

impl Scheduler {
    /// Create a scheduler with the given tuning constants
    pub fn new(window_size: usize, max_retries: u32, sorting_interval: u32) -> Self {
        Self {
            window_size,
            max_retries,
            sorting_interval,
            retries: 0,
            sorting_counter: 0,
        }
    }

    /// The in-flight request cap
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Current consecutive-failure count
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Record a successful reply, resetting the failure streak
    pub fn on_success(&mut self) {
        self.retries = 0;
    }

    /// Record a failed request
    ///
    /// Returns true when the failure streak has reached the failover
    /// threshold, i.e. the peer cursor should advance.
    pub fn on_failure(&mut self) -> bool {
        self.retries += 1;
        self.retries >= self.max_retries
    }

    /// Record a request creation
    ///
    /// Returns true every `sorting_interval` creations; the caller then
    /// re-sorts the stats table. The sorting and retry counters reset.
    pub fn on_request_created(&mut self) -> bool {
        self.sorting_counter += 1;
        if self.sorting_counter >= self.sorting_interval {
            self.sorting_counter = 0;
            self.retries = 0;
            return true;
        }
        false
    }

    /// Reset the failure streak without a success
    pub fn reset_retries(&mut self) {
        self.retries = 0;
    }
}
