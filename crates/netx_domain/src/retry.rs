use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// Bound on how many times a question sequence is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Setters)]
#[setters(into)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: usize,
    /// Fixed pause between attempts in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 5, delay_ms: 2000 }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let actual: RetryConfig = serde_yml::from_str("max_attempts: 2").unwrap();
        let expected = RetryConfig::default().max_attempts(2usize);
        assert_eq!(actual, expected);
    }
}
