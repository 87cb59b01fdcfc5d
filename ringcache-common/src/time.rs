//! Conversions between the monotonic `Instant` every cache entry's
//! expiration is tracked with and the Unix-seconds timestamp the wire
//! contract carries.
//!
//! `Instant` has no defined epoch, so every conversion anchors itself to a
//! freshly sampled `(Instant::now(), SystemTime::now())` pair taken as close
//! together as possible; the wire value is therefore accurate to within a
//! scheduling jitter of a few microseconds, which is irrelevant next to the
//! minutes-scale expirations this cache deals in.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Converts a local expiration instant to a Unix-seconds timestamp suitable
/// for `SetRequest::expire`.
pub fn instant_to_unix_secs(expire: Instant) -> i64 {
    let now_instant = Instant::now();
    let now_system = SystemTime::now();
    let target = if expire >= now_instant {
        now_system + (expire - now_instant)
    } else {
        now_system
            .checked_sub(now_instant - expire)
            .unwrap_or(UNIX_EPOCH)
    };
    target
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Converts a Unix-seconds timestamp from the wire into a local `Instant`,
/// the inverse of [`instant_to_unix_secs`].
pub fn unix_secs_to_instant(expire_unix: i64) -> Instant {
    let now_instant = Instant::now();
    let now_system = SystemTime::now();
    let target = UNIX_EPOCH + Duration::from_secs(expire_unix.max(0) as u64);
    match target.duration_since(now_system) {
        Ok(ahead) => now_instant + ahead,
        Err(_) => {
            let behind = now_system.duration_since(target).unwrap_or_default();
            now_instant
                .checked_sub(behind)
                .unwrap_or(now_instant - Duration::from_secs(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_within_a_second() {
        let original = Instant::now() + Duration::from_secs(120);
        let unix = instant_to_unix_secs(original);
        let restored = unix_secs_to_instant(unix);
        let drift = if restored >= original {
            restored - original
        } else {
            original - restored
        };
        assert!(drift < Duration::from_secs(1), "drift too large: {drift:?}");
    }

    #[test]
    fn past_instants_produce_a_unix_time_behind_now() {
        let past = Instant::now() - Duration::from_secs(30);
        let unix = instant_to_unix_secs(past);
        let now_unix = instant_to_unix_secs(Instant::now());
        assert!(unix < now_unix);
    }
}
