use std::path::{Path, PathBuf};

use netx_domain::{
    Error, ModelId, PacketLimits, QuestionCatalog, QuestionDefinition, Result, RetryConfig,
};
use netx_provider::{ModelRegistry, ThrottleConfig};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_INDEX_URL: &str = "https://wiki.wireshark.org/SampleCaptures";

/// How final answers are judged. Without a model the heuristic judge is
/// used.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JudgeConfig {
    /// Registered model asked for a YES / NO / UNSURE verdict.
    pub model: Option<ModelId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScraperConfig {
    pub index_url: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self { index_url: DEFAULT_INDEX_URL.to_string() }
    }
}

/// Contents of `netexplainer.yaml`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub questions: Vec<QuestionDefinition>,
    pub models: Vec<ModelId>,
    pub max_packets: PacketLimits,
    #[serde(default)]
    pub tools: bool,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub delays_ms: ThrottleConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    /// Keep the rendered trace of every capture as a `.txt` sibling.
    #[serde(default)]
    pub persist_traces: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/netexplainer.log")
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl AppConfig {
    /// Reads and validates the configuration. Every problem is a `Config`
    /// error; nothing here is worth retrying.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("cannot read configuration file '{}': {err}", path.display()))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: AppConfig = serde_yml::from_str(text)
            .map_err(|err| Error::Config(format!("invalid configuration: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.catalog()?;

        if self.models.is_empty() {
            return Err(Error::Config("no models configured".to_string()));
        }
        for model in &self.models {
            ModelRegistry::lookup(model)?;
        }
        if let Some(model) = &self.judge.model {
            ModelRegistry::lookup(model)?;
        }
        Url::parse(&self.scraper.index_url).map_err(|err| {
            Error::Config(format!("invalid scraper.index_url '{}': {err}", self.scraper.index_url))
        })?;
        if self.max_packets.small == 0 || self.max_packets.big == 0 {
            return Err(Error::Config("max_packets values must be greater than 0".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn catalog(&self) -> Result<QuestionCatalog> {
        QuestionCatalog::from_definitions(self.questions.clone())
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn cleaned_dir(&self) -> PathBuf {
        self.data_dir.join("cleaned")
    }

    pub fn evaluation_dir(&self) -> PathBuf {
        self.data_dir.join("evaluation")
    }
}

#[cfg(test)]
mod tests {
    use netx_domain::QuestionKind;
    use pretty_assertions::assert_eq;

    use super::*;

    const FIXTURE: &str = r#"
questions:
  - question: "What is the total number of packets in the trace?"
    subquestions:
      - "How many packets are listed in the trace?"
  - question: "Which port is busiest?"
    kind: dominant_protocol
    subquestions: ["Which protocol appears most?"]
models: [gemini-2.0-flash, mistral-7b]
max_packets:
  small: 150
  big: 2000
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let actual = AppConfig::parse(FIXTURE).unwrap();
        assert_eq!(actual.models, vec![ModelId::new("gemini-2.0-flash"), ModelId::new("mistral-7b")]);
        assert_eq!(actual.data_dir, PathBuf::from("data"));
        assert_eq!(actual.cleaned_dir(), PathBuf::from("data/cleaned"));
        assert_eq!(actual.retry, RetryConfig::default());
        assert_eq!(actual.judge, JudgeConfig::default());
        assert_eq!(actual.scraper.index_url, DEFAULT_INDEX_URL);
        assert!(!actual.tools);
    }

    #[test]
    fn test_question_kinds_resolve() {
        let actual = AppConfig::parse(FIXTURE).unwrap().catalog().unwrap();
        let kinds = actual.iter().map(|entry| entry.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![QuestionKind::TotalPackets, QuestionKind::DominantProtocol]);
    }

    #[test]
    fn test_full_config() {
        let fixture = format!(
            "{FIXTURE}tools: true\nretry: {{ max_attempts: 2, delay_ms: 10 }}\ndelays_ms: {{ groq: 500 }}\njudge: {{ model: gemini-2.0-flash }}\nscraper:\n  index_url: http://localhost:8080/captures\n"
        );
        let actual = AppConfig::parse(&fixture).unwrap();
        assert!(actual.tools);
        assert_eq!(actual.retry, RetryConfig { max_attempts: 2, delay_ms: 10 });
        assert_eq!(actual.delays_ms.groq, 500);
        assert_eq!(actual.delays_ms.gemini, 4000);
        assert_eq!(actual.judge.model, Some(ModelId::new("gemini-2.0-flash")));
        assert_eq!(actual.scraper.index_url, "http://localhost:8080/captures");
    }

    #[test]
    fn test_validation_errors() {
        let fixtures = [
            FIXTURE.replace("[gemini-2.0-flash, mistral-7b]", "[]"),
            FIXTURE.replace("mistral-7b", "gpt-2"),
            FIXTURE.replace("small: 150", "small: 0"),
            FIXTURE.replace("Which port is busiest?", "What is the total number of packets in the trace?"),
            FIXTURE.replace("    kind: dominant_protocol\n", ""),
            FIXTURE.replace("[\"Which protocol appears most?\"]", "[]"),
            format!("{FIXTURE}retry: {{ max_attempts: 0 }}\n"),
            format!("{FIXTURE}judge: {{ model: gpt-2 }}\n"),
            format!("{FIXTURE}colour: blue\n"),
            format!("{FIXTURE}scraper: {{ index_url: not a url }}\n"),
            "models: [mistral-7b]".to_string(),
        ];
        for fixture in fixtures {
            let actual = AppConfig::parse(&fixture);
            assert!(matches!(actual, Err(Error::Config(_))), "accepted:\n{fixture}");
        }
    }

    #[test]
    fn test_missing_file() {
        let actual = AppConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(actual.to_string().contains("/definitely/not/here.yaml"));
    }

    #[test]
    fn test_repository_sample_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../netexplainer.yaml");
        let actual = AppConfig::load(&path).unwrap();
        assert_eq!(actual.catalog().unwrap().len(), 9);
    }
}
