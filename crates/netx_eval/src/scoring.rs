use netx_domain::{Error, Result};
use similar::TextDiff;

/// Compares a model's decomposition with the reference sub-questions.
///
/// Implementations must be deterministic and return a value in [0, 100]
/// that grows with similarity.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, produced: &[String], reference: &[String]) -> Result<f64>;
}

/// Word-level diff ratio. Each reference sub-question is matched with its
/// closest produced one; the ratios are averaged and scaled to 100.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiffRatioScorer;

impl DiffRatioScorer {
    fn ratio(left: &str, right: &str) -> f64 {
        let left = normalize(left);
        let right = normalize(right);
        TextDiff::from_words(left.as_str(), right.as_str()).ratio() as f64
    }
}

impl SimilarityScorer for DiffRatioScorer {
    fn score(&self, produced: &[String], reference: &[String]) -> Result<f64> {
        if reference.is_empty() {
            return Err(Error::Evaluation("no reference sub-questions to compare with".to_string()));
        }
        if produced.is_empty() {
            return Ok(0.0);
        }

        let total = reference
            .iter()
            .map(|expected| {
                produced
                    .iter()
                    .map(|candidate| Self::ratio(expected, candidate))
                    .fold(0.0, f64::max)
            })
            .sum::<f64>();

        Ok((total / reference.len() as f64 * 100.0).clamp(0.0, 100.0))
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
