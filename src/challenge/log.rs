//! Answer Log
//!
//! Append-only record of every answered question per client, and the fold
//! that turns it into per-question aggregates. Entries are never mutated
//! or deleted by this subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::GovernanceError;
use crate::store::{self, keys, KvStore};

/// Attribute filters; unset fields match anything, set fields match by
/// exact string equality
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFilters {
    /// Subject area
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Topic within the subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Difficulty label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

impl QuestionFilters {
    /// Whether every set field matches the candidate's fields
    pub fn matches(&self, other: &QuestionFilters) -> bool {
        fn field_ok(want: &Option<String>, have: &Option<String>) -> bool {
            match want {
                None => true,
                Some(w) => have.as_deref() == Some(w.as_str()),
            }
        }
        field_ok(&self.subject, &other.subject)
            && field_ok(&self.topic, &other.topic)
            && field_ok(&self.difficulty, &other.difficulty)
    }
}

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerLogEntry {
    /// Answering client
    pub client_id: String,

    /// Question answered
    pub question_id: String,

    /// Question type (multiple choice, cloze, ...)
    pub question_type: String,

    /// The choice the client picked
    pub choice: String,

    /// Whether the choice was correct
    pub correct: bool,

    /// When the answer was given
    pub at: DateTime<Utc>,

    /// Attributes of the question at answer time
    pub filters: QuestionFilters,
}

/// Per-question aggregate folded from the log; derived, never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionStats {
    /// Question id
    pub question_id: String,

    /// Question type from the latest entry
    pub question_type: String,

    /// Wrong answers so far
    pub wrong_count: u32,

    /// Correct answers so far
    pub correct_count: u32,

    /// Most recent answer timestamp
    pub last_answered_at: DateTime<Utc>,
}

/// Store page size for log scans
const SCAN_PAGE: usize = 200;

/// Append-only answer log over the shared store
#[derive(Clone)]
pub struct AnswerLog {
    store: Arc<dyn KvStore>,
}

impl AnswerLog {
    /// Create a log over the given store
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Append one entry; entries are keyed by (client, timestamp, question)
    pub async fn record(&self, entry: &AnswerLogEntry) -> Result<(), GovernanceError> {
        if entry.client_id.is_empty() || entry.question_id.is_empty() {
            return Err(GovernanceError::MalformedRequest(
                "client id and question id are required".into(),
            ));
        }
        let key = keys::answer_entry(&entry.client_id, entry.at, &entry.question_id);
        store::put_json(self.store.as_ref(), &key, entry, None).await?;
        debug!(
            client = %entry.client_id,
            question = %entry.question_id,
            correct = entry.correct,
            "answer recorded"
        );
        Ok(())
    }

    /// Every entry for a client, in chronological order
    pub async fn scan(&self, client_id: &str) -> Result<Vec<AnswerLogEntry>, GovernanceError> {
        let prefix = keys::answer_prefix(client_id);
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .store
                .list(&prefix, SCAN_PAGE, cursor.as_deref())
                .await?;
            for key in &page.keys {
                if let Some(entry) = store::get_json(self.store.as_ref(), key).await? {
                    entries.push(entry);
                }
            }
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(entries)
    }

    /// Fold the client's log into per-question aggregates
    pub async fn aggregate(
        &self,
        client_id: &str,
    ) -> Result<HashMap<String, QuestionStats>, GovernanceError> {
        let mut stats: HashMap<String, QuestionStats> = HashMap::new();

        for entry in self.scan(client_id).await? {
            let slot = stats
                .entry(entry.question_id.clone())
                .or_insert_with(|| QuestionStats {
                    question_id: entry.question_id.clone(),
                    question_type: entry.question_type.clone(),
                    wrong_count: 0,
                    correct_count: 0,
                    last_answered_at: entry.at,
                });
            if entry.correct {
                slot.correct_count += 1;
            } else {
                slot.wrong_count += 1;
            }
            if entry.at >= slot.last_answered_at {
                slot.last_answered_at = entry.at;
                slot.question_type = entry.question_type.clone();
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn log() -> AnswerLog {
        AnswerLog::new(Arc::new(MemoryStore::new()))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    fn entry(question: &str, correct: bool, secs: i64) -> AnswerLogEntry {
        AnswerLogEntry {
            client_id: "c1".into(),
            question_id: question.into(),
            question_type: "multiple_choice".into(),
            choice: "B".into(),
            correct,
            at: at(secs),
            filters: QuestionFilters::default(),
        }
    }

    #[tokio::test]
    async fn test_scan_chronological() {
        let log = log();
        log.record(&entry("q2", false, 20)).await.unwrap();
        log.record(&entry("q1", true, 10)).await.unwrap();

        let entries = log.scan("c1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].question_id, "q1");
        assert_eq!(entries[1].question_id, "q2");
    }

    #[tokio::test]
    async fn test_aggregate_counts_and_last_answered() {
        let log = log();
        log.record(&entry("q1", false, 0)).await.unwrap();
        log.record(&entry("q1", false, 10)).await.unwrap();
        log.record(&entry("q1", true, 20)).await.unwrap();
        log.record(&entry("q2", true, 5)).await.unwrap();

        let stats = log.aggregate("c1").await.unwrap();
        let q1 = &stats["q1"];
        assert_eq!(q1.wrong_count, 2);
        assert_eq!(q1.correct_count, 1);
        assert_eq!(q1.last_answered_at, at(20));

        let q2 = &stats["q2"];
        assert_eq!(q2.wrong_count, 0);
        assert_eq!(q2.correct_count, 1);
    }

    #[tokio::test]
    async fn test_clients_isolated() {
        let log = log();
        log.record(&entry("q1", false, 0)).await.unwrap();

        let mut other = entry("q9", false, 0);
        other.client_id = "c2".into();
        log.record(&other).await.unwrap();

        assert_eq!(log.scan("c1").await.unwrap().len(), 1);
        assert_eq!(log.scan("c2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_filters_match_skips_unset() {
        let want = QuestionFilters {
            subject: Some("math".into()),
            topic: None,
            difficulty: None,
        };
        let have = QuestionFilters {
            subject: Some("math".into()),
            topic: Some("algebra".into()),
            difficulty: Some("hard".into()),
        };
        assert!(want.matches(&have));

        let other = QuestionFilters {
            subject: Some("law".into()),
            ..have.clone()
        };
        assert!(!want.matches(&other));
    }

    #[tokio::test]
    async fn test_record_requires_ids() {
        let log = log();
        let mut bad = entry("q1", false, 0);
        bad.client_id = String::new();
        assert!(log.record(&bad).await.is_err());
    }
}
