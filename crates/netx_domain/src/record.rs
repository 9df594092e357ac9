use std::fmt;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{ModelId, ReferenceAnswer};

/// Correctness judgement of a final answer.
///
/// `Problem` means the judging step itself broke, `Error` means no answer
/// could be produced at all. Keeping them apart lets reports separate bad
/// model answers from pipeline failures.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Correct,
    Incorrect,
    Indeterminate,
    Problem,
    Error,
}

/// Similarity between produced and reference sub-questions, in [0, 100].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimilarityScore {
    Value(f64),
    Sentinel(ScoreSentinel),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreSentinel {
    #[serde(rename = "ERROR")]
    Error,
}

impl SimilarityScore {
    pub const ERROR: SimilarityScore = SimilarityScore::Sentinel(ScoreSentinel::Error);

    pub fn value(&self) -> Option<f64> {
        match self {
            SimilarityScore::Value(value) => Some(*value),
            SimilarityScore::Sentinel(_) => None,
        }
    }
}

impl fmt::Display for SimilarityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityScore::Value(value) => write!(f, "{value:.1}"),
            SimilarityScore::Sentinel(ScoreSentinel::Error) => write!(f, "ERROR"),
        }
    }
}

/// One row of an evaluation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Setters)]
#[setters(into)]
pub struct EvaluationRecord {
    pub model: ModelId,
    pub file: String,
    /// `None` only when the failure happened before any question was asked.
    #[setters(strip_option)]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subquestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[setters(strip_option)]
    pub final_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[setters(strip_option)]
    pub reference: Option<ReferenceAnswer>,
    pub subquestion_score: SimilarityScore,
    pub verdict: Verdict,
}

impl EvaluationRecord {
    /// A row that records a failure: both scores hold the error sentinel.
    pub fn failed(model: ModelId, file: impl Into<String>) -> Self {
        Self {
            model,
            file: file.into(),
            question: None,
            subquestions: Vec::new(),
            final_answer: None,
            reference: None,
            subquestion_score: SimilarityScore::ERROR,
            verdict: Verdict::Error,
        }
    }
}
