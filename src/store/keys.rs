//! Persisted Key Layout
//!
//! Every governed record lives under `<namespace>:<subject>:<dimension>`.
//! The day key is a UTC `YYYY-MM-DD` string; rollover implicitly resets
//! daily counters because readers treat a stale day key as absent.

use chrono::{DateTime, Utc};

/// Rate-limit bucket for a client key (usually a client address)
pub fn rate_bucket(key: &str) -> String {
    format!("ratelimit:{key}")
}

/// Session list for an identity
pub fn session_list(identity: &str) -> String {
    format!("session:{identity}")
}

/// Daily usage counter for an identity and action
pub fn usage_counter(identity: &str, action: &str) -> String {
    format!("usage:{identity}:{action}")
}

/// Serve-count record for a client and question
pub fn serve_count(client_id: &str, question_id: &str) -> String {
    format!("serve:{client_id}:{question_id}")
}

/// Answer log entry key; timestamp is zero-padded so lexicographic order
/// is chronological order
pub fn answer_entry(client_id: &str, at: DateTime<Utc>, question_id: &str) -> String {
    format!(
        "answers:{client_id}:{:020}:{question_id}",
        at.timestamp_millis()
    )
}

/// Prefix covering every answer log entry for a client
pub fn answer_prefix(client_id: &str) -> String {
    format!("answers:{client_id}:")
}

/// UTC calendar-day key for a timestamp
pub fn day_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_key_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 23, 59, 59).unwrap();
        assert_eq!(day_key(at), "2026-03-07");
    }

    #[test]
    fn test_answer_keys_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let a = answer_entry("c1", early, "q9");
        let b = answer_entry("c1", late, "q1");
        assert!(a < b);
        assert!(a.starts_with(&answer_prefix("c1")));
    }

    #[test]
    fn test_usage_counter_key() {
        assert_eq!(
            usage_counter("user@example.com", "exam_start"),
            "usage:user@example.com:exam_start"
        );
    }
}
