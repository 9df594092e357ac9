use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::{Error, Result};

/// The quantity a question asks for. Decides how the reference answer is
/// computed from a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionKind {
    TotalPackets,
    UniqueCommunicators,
    MostActiveAddress,
    TotalBytes,
    AveragePacketSize,
    DominantProtocol,
    Duration,
    PacketsPerSecond,
    BytesPerSecond,
}

impl QuestionKind {
    /// Built-in wording for each kind. A catalog entry without an explicit
    /// `kind` must use one of these texts verbatim.
    pub fn canonical_question(&self) -> &'static str {
        match self {
            QuestionKind::TotalPackets => "What is the total number of packets in the trace?",
            QuestionKind::UniqueCommunicators => {
                "How many unique communicators are present in the trace?"
            }
            QuestionKind::MostActiveAddress => {
                "What is the IP that participates the most in communications in the trace?"
            }
            QuestionKind::TotalBytes => "What is the total size of the transmitted bytes?",
            QuestionKind::AveragePacketSize => "What is the average size of packets in bytes?",
            QuestionKind::DominantProtocol => "What is the most used protocol in the trace?",
            QuestionKind::Duration => "What is the total duration of the trace in seconds?",
            QuestionKind::PacketsPerSecond => {
                "What is the average number of packets sent per second?"
            }
            QuestionKind::BytesPerSecond => "What is the average number of bytes sent per second?",
        }
    }

    pub fn from_question(question: &str) -> Option<Self> {
        use strum::IntoEnumIterator;
        QuestionKind::iter().find(|kind| kind.canonical_question() == question.trim())
    }
}

/// Shape of a question as written in the configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionDefinition {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<QuestionKind>,
    pub subquestions: Vec<String>,
}

/// A question together with its reference decomposition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub question: String,
    pub kind: QuestionKind,
    pub subquestions: Vec<String>,
}

/// Read-only, insertion-ordered question catalog keyed by question text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuestionCatalog {
    entries: IndexMap<String, QuestionEntry>,
}

impl QuestionCatalog {
    pub fn from_definitions(definitions: Vec<QuestionDefinition>) -> Result<Self> {
        if definitions.is_empty() {
            return Err(Error::Config("the question catalog is empty".to_string()));
        }

        let mut entries = IndexMap::with_capacity(definitions.len());
        for definition in definitions {
            let question = definition.question.trim().to_string();
            if question.is_empty() {
                return Err(Error::Config("a catalog question is blank".to_string()));
            }
            if entries.contains_key(&question) {
                return Err(Error::Config(format!("duplicate question '{question}'")));
            }
            let subquestions = definition
                .subquestions
                .into_iter()
                .map(|subquestion| subquestion.trim().to_string())
                .filter(|subquestion| !subquestion.is_empty())
                .collect::<Vec<_>>();
            if subquestions.is_empty() {
                return Err(Error::Config(format!(
                    "question '{question}' has no reference sub-questions"
                )));
            }
            let kind = definition
                .kind
                .or_else(|| QuestionKind::from_question(&question))
                .ok_or_else(|| {
                    Error::Config(format!(
                        "question '{question}' has no `kind` and does not match a built-in question"
                    ))
                })?;

            entries.insert(question.clone(), QuestionEntry { question, kind, subquestions });
        }

        Ok(Self { entries })
    }

    pub fn get(&self, question: &str) -> Option<&QuestionEntry> {
        self.entries.get(question)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn definition(question: &str, kind: Option<QuestionKind>) -> QuestionDefinition {
        QuestionDefinition {
            question: question.to_string(),
            kind,
            subquestions: vec!["How many lines does the trace have?".to_string()],
        }
    }

    #[test]
    fn test_kind_inferred_from_canonical_text() {
        let fixture = vec![definition(
            "What is the most used protocol in the trace?",
            None,
        )];
        let actual = QuestionCatalog::from_definitions(fixture).unwrap();
        let expected = QuestionKind::DominantProtocol;
        assert_eq!(
            actual.get("What is the most used protocol in the trace?").unwrap().kind,
            expected
        );
    }

    #[test]
    fn test_explicit_kind_allows_custom_wording() {
        let fixture = vec![definition(
            "How long does the capture last?",
            Some(QuestionKind::Duration),
        )];
        let actual = QuestionCatalog::from_definitions(fixture).unwrap();
        assert_eq!(actual.len(), 1);
    }

    #[test]
    fn test_unknown_question_without_kind_is_rejected() {
        let fixture = vec![definition("Which port is busiest?", None)];
        let actual = QuestionCatalog::from_definitions(fixture);
        assert!(matches!(actual, Err(Error::Config(_))));
    }

    #[test]
    fn test_duplicate_question_is_rejected() {
        let fixture = vec![
            definition("What is the total number of packets in the trace?", None),
            definition("What is the total number of packets in the trace? ", None),
        ];
        let actual = QuestionCatalog::from_definitions(fixture);
        assert!(matches!(actual, Err(Error::Config(message)) if message.contains("duplicate")));
    }

    #[test]
    fn test_blank_subquestions_are_dropped() {
        let fixture = vec![QuestionDefinition {
            question: "What is the total size of the transmitted bytes?".to_string(),
            kind: None,
            subquestions: vec!["  ".to_string(), "What is the length of each packet?".to_string()],
        }];
        let actual = QuestionCatalog::from_definitions(fixture).unwrap();
        let expected = vec!["What is the length of each packet?".to_string()];
        assert_eq!(actual.iter().next().unwrap().subquestions, expected);
    }

    #[test]
    fn test_catalog_keeps_configuration_order() {
        let fixture = vec![
            definition("What is the total duration of the trace in seconds?", None),
            definition("What is the total number of packets in the trace?", None),
        ];
        let actual = QuestionCatalog::from_definitions(fixture)
            .unwrap()
            .iter()
            .map(|entry| entry.kind)
            .collect::<Vec<_>>();
        let expected = vec![QuestionKind::Duration, QuestionKind::TotalPackets];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_definition_yaml_shape() {
        let fixture = r#"
question: What is the average size of packets in bytes?
subquestions:
  - What is the total size of the transmitted bytes?
  - How many packets are in the trace?
"#;
        let actual: QuestionDefinition = serde_yml::from_str(fixture).unwrap();
        assert_eq!(actual.kind, None);
        assert_eq!(actual.subquestions.len(), 2);
    }
}
