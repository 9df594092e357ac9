use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use netx_domain::{EvaluationRecord, ModelId, Verdict};
use netx_eval::{
    EvaluationTarget, Evaluator, EvaluatorConfig, ModelJudge, Report, find_captures,
};
use netx_provider::{
    ChatProvider, Client, ModelRegistry, ModelSpec, ProviderEndpoint, ProviderKind, Throttle,
    ThrottleConfig, Throttled,
};
use tracing::{info, warn};

use crate::{Action, AppConfig, Cli, Scraper};

/// One throttled client per provider kind, shared by every model and the
/// judge that use that provider.
pub struct ProviderPool {
    timeout: Duration,
    delays: ThrottleConfig,
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
}

impl ProviderPool {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_lookup(config, |name| std::env::var(name).ok())
    }

    pub fn with_lookup(
        config: &AppConfig,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
            delays: config.delays_ms.clone(),
            lookup: Box::new(lookup),
            providers: HashMap::new(),
        }
    }

    pub fn get(&mut self, kind: ProviderKind) -> netx_domain::Result<Arc<dyn ChatProvider>> {
        if let Some(provider) = self.providers.get(&kind) {
            return Ok(provider.clone());
        }

        let endpoint = ProviderEndpoint::resolve(kind, &self.lookup)?;
        info!(provider = %kind, url = %endpoint.base_url, "Provider configured");
        let client = Client::new(endpoint, self.timeout)?;
        let throttle = Arc::new(Throttle::new(self.delays.interval(kind)));
        let provider: Arc<dyn ChatProvider> = Arc::new(Throttled::new(client, throttle));

        self.providers.insert(kind, provider.clone());
        Ok(provider)
    }
}

/// Resolves every configured model to its provider. Missing credentials
/// fail here, before any capture is read.
pub fn build_targets(
    config: &AppConfig,
    pool: &mut ProviderPool,
) -> netx_domain::Result<Vec<EvaluationTarget>> {
    config
        .models
        .iter()
        .map(|model| {
            let spec = ModelRegistry::lookup(model)?;
            let provider = pool.get(spec.provider)?;
            Ok(EvaluationTarget::new(spec.clone(), provider))
        })
        .collect()
}

fn build_judge(
    model: &ModelId,
    pool: &mut ProviderPool,
) -> netx_domain::Result<ModelJudge<Arc<dyn ChatProvider>>> {
    let spec: &ModelSpec = ModelRegistry::lookup(model)?;
    Ok(ModelJudge::new(pool.get(spec.provider)?, spec.remote_id()))
}

pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.action() {
        Action::Download => {
            let scraper = scraper(&config)?;
            let downloaded = scraper.download_captures().await?;
            info!(count = downloaded.len(), dir = %config.raw_dir().display(), "Download finished");
        }
        Action::Clean { max_packets } => {
            let kept = scraper(&config)?.clean_raw_data(max_packets)?;
            info!(count = kept.len(), dir = %config.cleaned_dir().display(), "Cleaning finished");
        }
        Action::Evaluate => evaluate(&config, cli.tools || config.tools).await?,
    }
    Ok(())
}

fn scraper(config: &AppConfig) -> Result<Scraper> {
    Scraper::new(
        &config.scraper.index_url,
        &config.data_dir,
        Duration::from_secs(config.request_timeout_secs),
    )
}

async fn evaluate(config: &AppConfig, tools: bool) -> Result<()> {
    let mut pool = ProviderPool::new(config);
    let targets = build_targets(config, &mut pool)?;

    let cleaned = config.cleaned_dir();
    let captures = find_captures(&cleaned)
        .with_context(|| format!("No captures to evaluate in {}", cleaned.display()))?;
    if captures.is_empty() {
        warn!(dir = %cleaned.display(), "No captures found; run with --download-data and --clean-data first");
        return Ok(());
    }

    let evaluator_config = EvaluatorConfig::new(config.catalog()?, config.max_packets)
        .tools(tools)
        .retry(config.retry.clone())
        .persist_traces(config.persist_traces);
    let mut evaluator = Evaluator::new(evaluator_config);
    if let Some(model) = &config.judge.model {
        evaluator = evaluator.judge(build_judge(model, &mut pool)?);
        info!(judge = %model, "Using model judge");
    }

    let records = evaluator.evaluate(&targets, &captures).await;
    log_totals(&records);

    let output = config.evaluation_dir();
    Report::write_records(&records, &output)?;
    Report::from_records(&records, tools).write(&output)?;
    info!(dir = %output.display(), "Evaluation finished");
    Ok(())
}

fn log_totals(records: &[EvaluationRecord]) {
    let count = |verdict: Verdict| records.iter().filter(|record| record.verdict == verdict).count();
    info!(
        records = records.len(),
        correct = count(Verdict::Correct),
        incorrect = count(Verdict::Incorrect),
        indeterminate = count(Verdict::Indeterminate),
        problems = count(Verdict::Problem),
        errors = count(Verdict::Error),
        "Evaluation totals"
    );
}

#[cfg(test)]
mod tests {
    use netx_domain::Error;
    use pretty_assertions::assert_eq;

    use super::*;

    const CONFIG: &str = r#"
questions:
  - question: "What is the total number of packets in the trace?"
    subquestions: ["How many packets are listed?"]
models: [gemini-2.0-flash, gemini-2.0-flash-lite, mistral-7b]
max_packets: { small: 10, big: 20 }
"#;

    fn env(
        pairs: &'static [(&'static str, &'static str)],
    ) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_missing_api_key_fails_before_any_call() {
        let config = AppConfig::parse(CONFIG).unwrap();
        let mut pool = ProviderPool::with_lookup(&config, env(&[]));

        let actual = build_targets(&config, &mut pool).err().unwrap();
        assert!(matches!(&actual, Error::Config(message) if message.contains("GOOGLE_API_KEY")));
    }

    #[test]
    fn test_models_of_one_provider_share_a_client() {
        let config = AppConfig::parse(CONFIG).unwrap();
        let mut pool = ProviderPool::with_lookup(&config, env(&[("GOOGLE_API_KEY", "secret")]));

        let actual = build_targets(&config, &mut pool).unwrap();

        let ids = actual.iter().map(|target| target.spec.id.to_string()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["gemini-2.0-flash", "gemini-2.0-flash-lite", "mistral-7b"]);
        assert!(Arc::ptr_eq(&actual[0].provider, &actual[1].provider));
        assert!(!Arc::ptr_eq(&actual[0].provider, &actual[2].provider));
    }

    #[test]
    fn test_judge_reuses_pooled_provider() {
        let config = AppConfig::parse(CONFIG).unwrap();
        let mut pool = ProviderPool::with_lookup(&config, env(&[("GOOGLE_API_KEY", "secret")]));
        let targets = build_targets(&config, &mut pool).unwrap();

        let judge_provider = pool.get(ProviderKind::Gemini).unwrap();
        assert!(Arc::ptr_eq(&targets[0].provider, &judge_provider));
        assert!(build_judge(&ModelId::new("mistral-7b"), &mut pool).is_ok());
    }
}
