use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use regex::Regex;
use uuid::Uuid;

pub fn short_random(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

/// Alphanumeric string drawn from the operating system's CSPRNG.
pub fn secure_random(n: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

pub fn gen_uuid() -> Uuid {
    Uuid::now_v7()
}

pub fn is_valid_email(string: &str) -> bool {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"\A[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*\z",
        )
        .unwrap()
    });
    RE.is_match(string)
}

/// Parses a campus-local timestamp (`YYYY-MM-DDTHH:MM[:SS]`, a space is also
/// accepted in place of the `T`).
pub fn parse_local_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn test_simple_test_email() {
        assert!(is_valid_email("organizer@example.com"));
        assert!(!is_valid_email("organizer@"));
        assert!(!is_valid_email("two words@example.com"));
        assert!(!is_valid_email("not an email\norganizer@example.com"));
        assert!(!is_valid_email("organizer@example.com\n"));
    }

    #[test]
    fn local_datetimes_accept_optional_seconds() {
        let a = parse_local_datetime("2025-03-10T10:00").unwrap();
        let b = parse_local_datetime("2025-03-10 10:00:30").unwrap();
        assert_eq!(a.hour(), 10);
        assert_eq!(b.second(), 30);
        assert!(parse_local_datetime("10/03/2025").is_none());
    }

    #[test]
    fn secure_random_has_requested_length() {
        let s = secure_random(24);
        assert_eq!(s.len(), 24);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
