//! Challenge Module
//!
//! Re-serves previously missed questions: the append-only answer log, the
//! per-question aggregation fold, and the ranking selector with its serve
//! cap.

pub mod log;
pub mod selector;

pub use log::{AnswerLog, AnswerLogEntry, QuestionFilters, QuestionStats};
pub use selector::{
    ChallengeQuestion, ChallengeSelector, InMemoryQuestionSource, Question, QuestionSource,
};
