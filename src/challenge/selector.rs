//! Adaptive Challenge Selector
//!
//! Picks the next previously-missed question to re-serve. Ranking prefers
//! questions shown fewest times as challenges, then the longest since last
//! answered, then the most often missed; a hard serve cap keeps any single
//! question from being drilled forever.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::GovernanceConfig;
use crate::error::{GovernanceError, StoreError};
use crate::store::{self, keys, KvStore};

use super::log::{AnswerLog, QuestionFilters, QuestionStats};

/// Full question content as held by the bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question id
    pub id: String,
    /// Question type (multiple choice, cloze, ...)
    pub question_type: String,
    /// Attributes matched against selection filters
    pub filters: QuestionFilters,
    /// Prompt text
    pub prompt: String,
    /// Answer choices
    pub choices: Vec<String>,
    /// The correct choice; stripped before a challenge is returned
    pub answer: String,
}

/// A question re-served as a challenge, with the answer withheld
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeQuestion {
    /// Question id
    pub id: String,
    /// Question type
    pub question_type: String,
    /// Question attributes
    pub filters: QuestionFilters,
    /// Prompt text
    pub prompt: String,
    /// Answer choices
    pub choices: Vec<String>,
}

impl From<Question> for ChallengeQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            question_type: q.question_type,
            filters: q.filters,
            prompt: q.prompt,
            choices: q.choices,
        }
    }
}

/// Question-bank collaborator; bank storage lives outside this crate
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Fetch full question content, `None` if the id is unknown
    async fn fetch(&self, question_id: &str) -> Result<Option<Question>, StoreError>;
}

/// Serve counter per (client, question)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ServeCountRecord {
    count: u32,
}

/// Challenge selector over the answer log and serve counters
#[derive(Clone)]
pub struct ChallengeSelector {
    store: Arc<dyn KvStore>,
    log: AnswerLog,
    source: Arc<dyn QuestionSource>,
    serve_cap: u32,
}

impl ChallengeSelector {
    /// Create a selector over the given store and question bank
    pub fn new(
        store: Arc<dyn KvStore>,
        source: Arc<dyn QuestionSource>,
        config: &GovernanceConfig,
    ) -> Self {
        Self {
            log: AnswerLog::new(store.clone()),
            store,
            source,
            serve_cap: config.serve_cap,
        }
    }

    /// The answer log feeding this selector
    pub fn log(&self) -> &AnswerLog {
        &self.log
    }

    /// Choose the next challenge for a client
    ///
    /// `None` means no unresolved error matches the filters - a normal
    /// outcome, not an error. The only side effect of a successful pick is
    /// one serve-count increment for the returned question.
    pub async fn choose(
        &self,
        client_id: &str,
        filters: &QuestionFilters,
        type_filter: Option<&str>,
    ) -> Result<Option<ChallengeQuestion>, GovernanceError> {
        if client_id.is_empty() {
            return Err(GovernanceError::MalformedRequest("empty client id".into()));
        }

        let stats = self.log.aggregate(client_id).await?;

        // Candidates: missed at least once, under the serve cap, right type
        let mut candidates: Vec<(QuestionStats, u32)> = Vec::new();
        for (_, stat) in stats {
            if stat.wrong_count == 0 {
                continue;
            }
            if let Some(t) = type_filter {
                if stat.question_type != t {
                    continue;
                }
            }
            let served = self.served_count(client_id, &stat.question_id).await?;
            if served >= self.serve_cap {
                continue;
            }
            candidates.push((stat, served));
        }

        // Fewest-served first, then longest since last answered, then most
        // missed; question id as the final stable tie-break
        candidates.sort_by(|(a, a_served), (b, b_served)| {
            a_served
                .cmp(b_served)
                .then(a.last_answered_at.cmp(&b.last_answered_at))
                .then(b.wrong_count.cmp(&a.wrong_count))
                .then(a.question_id.cmp(&b.question_id))
        });

        for (stat, served) in candidates {
            let Some(question) = self.source.fetch(&stat.question_id).await? else {
                continue; // removed from the bank since it was answered
            };
            if !filters.matches(&question.filters) {
                continue;
            }

            self.bump_served(client_id, &stat.question_id, served)
                .await?;
            info!(
                client = client_id,
                question = %stat.question_id,
                served = served + 1,
                wrong = stat.wrong_count,
                "challenge selected"
            );
            return Ok(Some(question.into()));
        }

        debug!(client = client_id, "no challenge candidate");
        Ok(None)
    }

    async fn served_count(
        &self,
        client_id: &str,
        question_id: &str,
    ) -> Result<u32, GovernanceError> {
        let key = keys::serve_count(client_id, question_id);
        let record: Option<ServeCountRecord> =
            store::get_json(self.store.as_ref(), &key).await?;
        Ok(record.map(|r| r.count).unwrap_or(0))
    }

    async fn bump_served(
        &self,
        client_id: &str,
        question_id: &str,
        current: u32,
    ) -> Result<(), GovernanceError> {
        let key = keys::serve_count(client_id, question_id);
        let record = ServeCountRecord { count: current + 1 };
        store::put_json(self.store.as_ref(), &key, &record, None).await?;
        Ok(())
    }
}

/// In-memory question bank, for tests and single-process embedding
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuestionSource {
    questions: Arc<std::sync::RwLock<std::collections::HashMap<String, Question>>>,
}

impl InMemoryQuestionSource {
    /// Create an empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a question
    pub fn insert(&self, question: Question) {
        let mut questions = self
            .questions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        questions.insert(question.id.clone(), question);
    }
}

#[async_trait]
impl QuestionSource for InMemoryQuestionSource {
    async fn fetch(&self, question_id: &str) -> Result<Option<Question>, StoreError> {
        let questions = self
            .questions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(questions.get(question_id).cloned())
    }
}
