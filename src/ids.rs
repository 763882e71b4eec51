//! Identifier generation for message, payment-information, and end-to-end
//! ids.
//!
//! The builder never reads wall-clock time or process-wide randomness
//! directly; both come in through the [`Clock`] and [`RandomSource`] traits
//! so identifier generation is deterministic under injected fakes. The
//! 12-hex suffix is a uniqueness aid, not a cryptographic identifier:
//! collisions are accepted as negligible, not eliminated.

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};

/// Source of the document creation timestamp.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// Source of randomness for identifier suffixes.
pub trait RandomSource {
    fn next_u64(&mut self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Process randomness, drawn from v4 UUID generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn next_u64(&mut self) -> u64 {
        uuid::Uuid::new_v4().as_u64_pair().0
    }
}

/// Hash one random draw and keep the first 12 hex characters.
fn random_suffix(random: &mut dyn RandomSource) -> String {
    let digest = Sha256::digest(random.next_u64().to_le_bytes());
    digest
        .iter()
        .take(6)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Message id: day-month-year-second-minute timestamp plus a random suffix.
pub fn message_id(clock: &dyn Clock, random: &mut dyn RandomSource) -> String {
    let timestamp = clock.now().format("%d%m%Y%S%M");
    format!("{}-{}", timestamp, random_suffix(random))
}

/// Payment or batch id: the originator name truncated to 22 characters plus
/// a random suffix.
pub fn payment_id(name: &str, random: &mut dyn RandomSource) -> String {
    let truncated: String = name.chars().take(22).collect();
    format!("{}-{}", truncated, random_suffix(random))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            Local.with_ymd_and_hms(2024, 1, 10, 14, 30, 5).unwrap()
        }
    }

    struct CountingRandom(u64);

    impl RandomSource for CountingRandom {
        fn next_u64(&mut self) -> u64 {
            self.0 += 1;
            self.0
        }
    }

    #[test]
    fn test_message_id_shape() {
        let id = message_id(&FixedClock, &mut CountingRandom(0));
        // %d%m%Y%S%M: day 10, month 01, year 2024, second 05, minute 30.
        assert!(id.starts_with("100120240530-"));
        let suffix = id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 12);
        assert!(suffix.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_suffix_deterministic_under_fixed_randomness() {
        let a = message_id(&FixedClock, &mut CountingRandom(7));
        let b = message_id(&FixedClock, &mut CountingRandom(7));
        assert_eq!(a, b);
        let c = message_id(&FixedClock, &mut CountingRandom(8));
        assert_ne!(a, c);
    }

    #[test]
    fn test_payment_id_truncates_long_names() {
        let id = payment_id(
            "A Very Long Originator Name BV",
            &mut CountingRandom(0),
        );
        let name_part = &id[..id.rfind('-').unwrap()];
        assert_eq!(name_part.chars().count(), 22);
    }

    #[test]
    fn test_system_random_draws_differ() {
        let mut random = SystemRandom;
        assert_ne!(random.next_u64(), random.next_u64());
    }
}
