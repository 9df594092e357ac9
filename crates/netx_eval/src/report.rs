use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use netx_domain::{Error, EvaluationRecord, Result, Verdict};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const SUMMARY_FILE: &str = "summary.json";
pub const RECORDS_FILE: &str = "records.json";

/// Per-question counts and mean decomposition similarity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionSummary {
    /// `Question 1`, `Question 2`, ... in order of first appearance.
    pub label: String,
    pub question: String,
    pub correct: usize,
    pub incorrect: usize,
    /// Mean over the numeric scores only; `None` when every score is a
    /// sentinel.
    pub mean_similarity: Option<f64>,
}

/// Grouped numbers behind one model's charts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model: String,
    pub total: usize,
    pub verdict_counts: BTreeMap<Verdict, usize>,
    pub verdict_proportions: BTreeMap<Verdict, f64>,
    pub questions: Vec<QuestionSummary>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub models: IndexMap<String, ModelSummary>,
}

#[derive(Default)]
struct QuestionTally {
    correct: usize,
    incorrect: usize,
    scores: Vec<f64>,
}

impl Report {
    /// Groups records by model. With `tools` the group names carry a
    /// `_tools` suffix so runs with and without the calculator stay apart.
    pub fn from_records(records: &[EvaluationRecord], tools: bool) -> Self {
        let mut grouped: IndexMap<String, Vec<&EvaluationRecord>> = IndexMap::new();
        for record in records {
            let label = if tools {
                format!("{}_tools", record.model)
            } else {
                record.model.to_string()
            };
            grouped.entry(label).or_default().push(record);
        }

        let models = grouped
            .into_iter()
            .map(|(label, records)| {
                let summary = summarize(&label, &records);
                (label, summary)
            })
            .collect();
        Self { models }
    }

    /// Writes `<dir>/<model>/summary.json` for every model and returns the
    /// written paths.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.models.len());
        for (label, summary) in &self.models {
            let model_dir = dir.join(label);
            std::fs::create_dir_all(&model_dir)
                .map_err(|err| Error::output(&model_dir, err))?;
            let path = model_dir.join(SUMMARY_FILE);
            write_json(&path, summary)?;
            info!(model = %label, path = %path.display(), "Summary written");
            written.push(path);
        }
        Ok(written)
    }

    /// Stores every record, sentinels included, as one JSON array.
    pub fn write_records(records: &[EvaluationRecord], dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|err| Error::output(dir, err))?;
        let path = dir.join(RECORDS_FILE);
        write_json(&path, &records)?;
        info!(records = records.len(), path = %path.display(), "Records written");
        Ok(path)
    }
}

fn summarize(label: &str, records: &[&EvaluationRecord]) -> ModelSummary {
    let total = records.len();

    let mut verdict_counts = BTreeMap::new();
    for record in records {
        *verdict_counts.entry(record.verdict).or_insert(0) += 1;
    }
    let verdict_proportions = verdict_counts
        .iter()
        .map(|(verdict, count)| (*verdict, *count as f64 / total as f64))
        .collect();

    let mut tallies: IndexMap<&str, QuestionTally> = IndexMap::new();
    for record in records {
        let Some(question) = record.question.as_deref() else {
            continue;
        };
        let tally = tallies.entry(question).or_default();
        match record.verdict {
            Verdict::Correct => tally.correct += 1,
            Verdict::Incorrect => tally.incorrect += 1,
            _ => {}
        }
        if let Some(score) = record.subquestion_score.value() {
            tally.scores.push(score);
        }
    }

    let questions = tallies
        .into_iter()
        .enumerate()
        .map(|(index, (question, tally))| QuestionSummary {
            label: format!("Question {}", index + 1),
            question: question.to_string(),
            correct: tally.correct,
            incorrect: tally.incorrect,
            mean_similarity: (!tally.scores.is_empty())
                .then(|| tally.scores.iter().sum::<f64>() / tally.scores.len() as f64),
        })
        .collect();

    ModelSummary {
        model: label.to_string(),
        total,
        verdict_counts,
        verdict_proportions,
        questions,
    }
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| Error::Evaluation(format!("cannot serialize {}: {err}", path.display())))?;
    std::fs::write(path, json).map_err(|err| Error::output(path, err))
}
