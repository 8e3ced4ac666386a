use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the number of milliseconds since UNIX EPOCH
#[inline]
pub fn unix_now() -> u64 {
    duration_millis(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO))
}

/// Whole milliseconds of `duration`, saturating at `u64::MAX`.
#[inline]
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Milliseconds elapsed between two [`unix_now`] readings, saturating at zero when the
/// wall clock stepped backwards.
#[inline]
pub fn elapsed_millis(since: u64, now: u64) -> u64 {
    now.saturating_sub(since)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_millis_saturates() {
        assert_eq!(elapsed_millis(1_000, 1_250), 250);
        assert_eq!(elapsed_millis(1_250, 1_000), 0);
        assert!(unix_now() > 1_600_000_000_000);
    }

    #[test]
    fn test_duration_millis_saturates() {
        assert_eq!(duration_millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(duration_millis(Duration::from_secs(18_446_744_073_709_552)), u64::MAX);
        assert_eq!(duration_millis(Duration::MAX), u64::MAX);
    }
}
