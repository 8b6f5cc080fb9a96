use crate::error::LendingError;

/// Accrual clock for a reserve, in Unix seconds.
///
/// The engine never reads an ambient clock; `now` is threaded through every
/// call. The stored timestamp is non-decreasing: a `now` behind it is a
/// `ClockRegression`, never a silent wrap.
#[odra::odra_type]
#[derive(Default)]
pub struct LastUpdate {
    /// Unix seconds of the last committed accrual.
    pub timestamp: u64,
}

impl LastUpdate {
    /// Create new last update
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp }
    }

    /// Seconds elapsed since the stored timestamp.
    pub fn seconds_elapsed(&self, now: u64) -> Result<u64, LendingError> {
        now.checked_sub(self.timestamp)
            .ok_or(LendingError::ClockRegression)
    }

    /// Advance the stored timestamp.
    pub fn update(&mut self, now: u64) {
        self.timestamp = now;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn elapsed_is_delta() {
        let last = LastUpdate::new(1_000);
        assert_eq!(last.seconds_elapsed(1_086).unwrap(), 86);
        assert_eq!(last.seconds_elapsed(1_000).unwrap(), 0);
    }

    #[test]
    fn clock_regression_detected() {
        let last = LastUpdate::new(1_000);
        assert_eq!(
            last.seconds_elapsed(999).unwrap_err(),
            LendingError::ClockRegression
        );
    }
}
