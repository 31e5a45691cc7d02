/// Outcome of recording a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TryDecision {
    Retry { attempt: usize, max: usize },
    GiveUp { attempts: usize },
}

/// Counts consecutive failures against a maximum.
///
/// The `max_tries`-th consecutive failure gives up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TryTracker {
    max_tries: usize,
    count: usize,
}

impl TryTracker {
    pub fn new(max_tries: usize) -> Self {
        Self {
            max_tries,
            count: 0,
        }
    }

    pub fn record_failure(&mut self) -> TryDecision {
        self.count += 1;
        if self.count >= self.max_tries {
            TryDecision::GiveUp {
                attempts: self.count,
            }
        } else {
            TryDecision::Retry {
                attempt: self.count,
                max: self.max_tries,
            }
        }
    }

    /// Called after a success.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn max_tries(&self) -> usize {
        self.max_tries
    }
}
