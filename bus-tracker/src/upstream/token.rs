//! Request token scheme.
//!
//! Every call to the upstream service carries a `token` header derived from
//! the request parameters and the current wall-clock minute:
//!
//! 1. join the parameters, in the order they will be sent, as `k=v&k=v`
//! 2. take the lowercase hex MD5 of that string (32 chars)
//! 3. format local time as `YYYYMMDDHHmm`
//! 4. splice `HHmm` in at offset 24, then `MMDD` at 12, then `YYYY` at 4
//!
//! The result is 44 characters. Because it embeds the minute, a token must
//! be generated per request; the upstream rejects stale ones after rollover.

use chrono::{FixedOffset, Local, NaiveDateTime, Utc};
use md5::{Digest, Md5};

/// Length of a generated token.
pub const TOKEN_LEN: usize = 44;

/// Source of the local wall-clock time used in tokens.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Wall-clock time at a fixed UTC offset, independent of the host zone.
#[derive(Debug, Clone, Copy)]
pub struct OffsetClock {
    offset: FixedOffset,
}

impl OffsetClock {
    /// Returns `None` if the offset is out of range (more than a day).
    pub fn from_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes * 60).map(|offset| Self { offset })
    }
}

impl Clock for OffsetClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Join parameters as `k=v&k=v`, preserving order. Values are not escaped.
pub fn query_string<K, V>(params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::new();
    for (idx, (key, value)) in params.iter().enumerate() {
        if idx > 0 {
            out.push('&');
        }
        out.push_str(key.as_ref());
        out.push('=');
        out.push_str(value.as_ref());
    }
    out
}

/// Generate the token for `params` at time `now`.
///
/// ```
/// use bus_tracker::upstream::generate_token;
/// use chrono::NaiveDate;
///
/// let now = NaiveDate::from_ymd_opt(2024, 3, 15)
///     .unwrap()
///     .and_hms_opt(10, 5, 0)
///     .unwrap();
/// let token = generate_token(&[("RouteNo", "33")], now);
/// assert_eq!(token, "68c1202423472a8503158c82aec6fa4e1005bd7a3ba7");
/// ```
pub fn generate_token<K, V>(params: &[(K, V)], now: NaiveDateTime) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let digest = hex::encode(Md5::digest(query_string(params).as_bytes()));
    let stamp = now.format("%Y%m%d%H%M").to_string();

    let mut chars: Vec<char> = digest.chars().collect();
    splice(&mut chars, 24, &stamp[8..12]);
    splice(&mut chars, 12, &stamp[4..8]);
    splice(&mut chars, 4, &stamp[0..4]);

    chars.into_iter().collect()
}

/// Insert `text` at `at`, shifting everything after it right.
fn splice(chars: &mut Vec<char>, at: usize, text: &str) {
    let at = at.min(chars.len());
    chars.splice(at..at, text.chars());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    const ROUTE_33_MD5: &str = "68c123472a858c82aec6fa4ebd7a3ba7";

    /// Remove the three embedded time fields, leaving the digest.
    fn strip_time(token: &str) -> String {
        format!(
            "{}{}{}{}",
            &token[0..4],
            &token[8..16],
            &token[20..32],
            &token[36..44]
        )
    }

    #[test]
    fn query_string_keeps_order() {
        assert_eq!(
            query_string(&[("routeName", "33"), ("dir", "0"), ("lang", "zh-tw")]),
            "routeName=33&dir=0&lang=zh-tw"
        );
        assert_eq!(query_string::<&str, &str>(&[]), "");
    }

    #[test]
    fn route_33_token_layout() {
        let token = generate_token(&[("RouteNo", "33")], at(2024, 3, 15, 10, 5, 0));

        assert_eq!(token.len(), TOKEN_LEN);
        assert_eq!(&token[4..8], "2024");
        assert_eq!(&token[16..20], "0315");
        assert_eq!(&token[32..36], "1005");
        assert_eq!(strip_time(&token), ROUTE_33_MD5);
    }

    #[test]
    fn time_fields_are_zero_padded() {
        let token = generate_token(&[("RouteNo", "33")], at(2025, 1, 2, 3, 4, 0));
        assert_eq!(&token[4..8], "2025");
        assert_eq!(&token[16..20], "0102");
        assert_eq!(&token[32..36], "0304");
    }

    #[test]
    fn parameter_order_matters() {
        let now = at(2024, 3, 15, 10, 5, 0);
        let a = generate_token(&[("routeName", "33"), ("dir", "0")], now);
        let b = generate_token(&[("dir", "0"), ("routeName", "33")], now);
        assert_ne!(strip_time(&a), strip_time(&b));
    }

    #[test]
    fn known_route_data_digest() {
        let params = [
            ("routeName", "33"),
            ("dir", "0"),
            ("lang", "zh-tw"),
            ("device", "web"),
        ];
        let token = generate_token(&params, at(2024, 3, 15, 10, 5, 0));
        assert_eq!(strip_time(&token), "8bbc9ae3eda9e41008615dad28a8a173");
    }

    #[test]
    fn same_minute_same_token() {
        let params = [("RouteNo", "33")];
        let a = generate_token(&params, at(2024, 3, 15, 10, 5, 1));
        let b = generate_token(&params, at(2024, 3, 15, 10, 5, 59));
        assert_eq!(a, b);
    }

    #[test]
    fn next_minute_changes_only_time_fields() {
        let params = [("RouteNo", "33")];
        let before = at(2024, 12, 31, 23, 59, 30);
        let after = before + Duration::seconds(45);

        let a = generate_token(&params, before);
        let b = generate_token(&params, after);

        assert_ne!(a, b);
        assert_eq!(strip_time(&a), strip_time(&b));
        assert_eq!(&b[4..8], "2025");
        assert_eq!(&b[16..20], "0101");
        assert_eq!(&b[32..36], "0000");
    }

    #[test]
    fn fixed_clock_is_stable() {
        let clock = FixedClock(at(2024, 3, 15, 10, 5, 0));
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn offset_clock_rejects_absurd_offsets() {
        assert!(OffsetClock::from_minutes(8 * 60).is_some());
        assert!(OffsetClock::from_minutes(25 * 60).is_none());
    }
}
