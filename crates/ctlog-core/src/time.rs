//! Time utilities: millisecond wall-clock timestamps and strict monotonic
//! advancement for STH signing.

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    let now = std::time::SystemTime::now();
    now.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Compute the next STH timestamp under the strict-monotonicity invariant
/// (§4.6 step 4): `max(now, previous + 1)`.
pub fn next_sth_timestamp_ms(now_ms: u64, previous_timestamp_ms: u64) -> u64 {
    now_ms.max(previous_timestamp_ms.saturating_add(1))
}

/// Clock skew, in milliseconds, between the wall clock and the previous
/// STH's timestamp. Positive when the wall clock is behind.
pub fn clock_skew_ms(now_ms: u64, previous_timestamp_ms: u64) -> i64 {
    previous_timestamp_ms as i64 - now_ms as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_timestamp_advances_past_previous_even_if_clock_lags() {
        let got = next_sth_timestamp_ms(100, 150);
        assert_eq!(got, 151);
    }

    #[test]
    fn next_timestamp_uses_now_when_ahead() {
        let got = next_sth_timestamp_ms(200, 150);
        assert_eq!(got, 200);
    }

    #[test]
    fn clock_skew_positive_when_clock_behind_previous_sth() {
        assert_eq!(clock_skew_ms(100, 150), 50);
        assert_eq!(clock_skew_ms(200, 150), -50);
    }
}
