use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use derive_setters::Setters;
use netx_capture::{CAPTURE_EXTENSIONS, CaptureReader, GroundTruth, TraceNormalizer};
use netx_domain::{
    Error, EvaluationRecord, ModelId, PacketLimits, QuestionCatalog, QuestionEntry,
    ReferenceAnswer, ReferenceAnswers, Result, RetryConfig, SimilarityScore, Verdict,
};
use netx_provider::{ChatProvider, LlmAdapter, ModelSpec};
use tracing::{error, info, warn};

use crate::{AnswerJudge, DiffRatioScorer, HeuristicJudge, SimilarityScorer};

/// Everything the control loop needs, loaded once at startup.
#[derive(Clone, Debug, Setters)]
#[setters(into)]
pub struct EvaluatorConfig {
    pub catalog: QuestionCatalog,
    pub limits: PacketLimits,
    /// Bind the calculator tool to every model request.
    pub tools: bool,
    pub retry: RetryConfig,
    /// Write the rendered trace next to each capture as `.txt`.
    pub persist_traces: bool,
}

impl EvaluatorConfig {
    pub fn new(catalog: QuestionCatalog, limits: PacketLimits) -> Self {
        Self {
            catalog,
            limits,
            tools: false,
            retry: RetryConfig::default(),
            persist_traces: false,
        }
    }
}

/// A model paired with the provider that serves it.
#[derive(Clone)]
pub struct EvaluationTarget {
    pub spec: ModelSpec,
    pub provider: Arc<dyn ChatProvider>,
}

impl EvaluationTarget {
    pub fn new(spec: ModelSpec, provider: Arc<dyn ChatProvider>) -> Self {
        Self { spec, provider }
    }
}

/// The inputs shared by every question asked about one capture.
struct PreparedCapture {
    file: String,
    trace: String,
    answers: ReferenceAnswers,
}

pub struct Evaluator {
    config: EvaluatorConfig,
    scorer: Box<dyn SimilarityScorer>,
    judge: Box<dyn AnswerJudge>,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            config,
            scorer: Box::new(DiffRatioScorer),
            judge: Box::new(HeuristicJudge::default()),
        }
    }

    pub fn scorer(mut self, scorer: impl SimilarityScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn judge(mut self, judge: impl AnswerJudge + 'static) -> Self {
        self.judge = Box::new(judge);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Runs every question for every (model, capture) pair, one at a time.
    /// Failures are turned into records; this never aborts part way.
    pub async fn evaluate(
        &self,
        targets: &[EvaluationTarget],
        captures: &[PathBuf],
    ) -> Vec<EvaluationRecord> {
        let mut records = Vec::new();
        for target in targets {
            info!(
                model = %target.spec.id,
                captures = captures.len(),
                tools = self.config.tools,
                "Evaluating model"
            );
            for capture in captures {
                records.extend(self.evaluate_capture(target, capture).await);
            }
        }
        records
    }

    /// One record per catalog question, or a single error record when the
    /// capture cannot be prepared.
    pub async fn evaluate_capture(
        &self,
        target: &EvaluationTarget,
        path: &Path,
    ) -> Vec<EvaluationRecord> {
        let model = target.spec.id.clone();
        let limit = self.config.limits.for_window(target.spec.window);

        let prepared = match self.prepare(path, limit) {
            Ok(prepared) => prepared,
            Err(err) => {
                error!(model = %model, file = %path.display(), error = %err, "Failed to prepare capture");
                return vec![EvaluationRecord::failed(model, file_name(path))];
            }
        };

        let adapter = LlmAdapter::new(target.provider.clone(), target.spec.remote_id(), prepared.trace)
            .tools(self.config.tools);

        let mut records = Vec::with_capacity(self.config.catalog.len());
        for entry in self.config.catalog.iter() {
            let reference = prepared.answers.get(&entry.question);
            let record = self
                .evaluate_question(&adapter, &model, &prepared.file, entry, reference)
                .await;
            info!(
                model = %model,
                file = %prepared.file,
                question = %entry.question,
                verdict = %record.verdict,
                subquestion_score = %record.subquestion_score,
                "Question evaluated"
            );
            records.push(record);
        }
        records
    }

    fn prepare(&self, path: &Path, limit: usize) -> Result<PreparedCapture> {
        let capture = CaptureReader::read(path, limit)?;
        let answers = GroundTruth::compute(&capture, &self.config.catalog);
        let trace = TraceNormalizer::new(limit).render(&capture);

        if self.config.persist_traces {
            let output = path.with_extension("txt");
            std::fs::write(&output, &trace).map_err(|err| Error::output(&output, err))?;
        }

        Ok(PreparedCapture { file: capture.file_name(), trace, answers })
    }

    async fn evaluate_question<P: ChatProvider>(
        &self,
        adapter: &LlmAdapter<P>,
        model: &ModelId,
        file: &str,
        entry: &QuestionEntry,
        reference: Option<&ReferenceAnswer>,
    ) -> EvaluationRecord {
        let strategy = ConstantBuilder::default()
            .with_delay(Duration::from_millis(self.config.retry.delay_ms))
            .with_max_times(self.config.retry.max_attempts.saturating_sub(1));

        let outcome = (|| self.run_sequence(adapter, model, file, entry, reference))
            .retry(strategy)
            .when(|err: &Error| err.is_retryable())
            .notify(|err: &Error, delay: Duration| {
                warn!(
                    model = %model,
                    file = %file,
                    question = %entry.question,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying question"
                );
            })
            .await;

        match outcome {
            Ok(record) => record,
            Err(Error::Scoring { reason, record }) => {
                error!(model = %model, file = %file, question = %entry.question, reason = %reason, "Scoring failed");
                *record
            }
            Err(err) => {
                error!(model = %model, file = %file, question = %entry.question, error = %err, "Question failed");
                EvaluationRecord::failed(model.clone(), file).question(entry.question.clone())
            }
        }
    }

    /// decompose → answer each sub-question → synthesize → score.
    async fn run_sequence<P: ChatProvider>(
        &self,
        adapter: &LlmAdapter<P>,
        model: &ModelId,
        file: &str,
        entry: &QuestionEntry,
        reference: Option<&ReferenceAnswer>,
    ) -> Result<EvaluationRecord> {
        let subquestions = adapter.decompose(&entry.question).await?;
        let mut answers = Vec::with_capacity(subquestions.len());
        for subquestion in &subquestions {
            answers.push(adapter.answer(subquestion).await?);
        }
        let final_answer = adapter
            .synthesize(&entry.question, &subquestions, &answers)
            .await?;

        let score = self.scorer.score(&subquestions, &entry.subquestions);
        let verdict = match reference {
            Some(reference) => self.judge.judge(&entry.question, &final_answer, reference).await,
            None => Err(Error::Evaluation(format!(
                "no reference answer for '{}'",
                entry.question
            ))),
        };

        let mut record = EvaluationRecord {
            model: model.clone(),
            file: file.to_string(),
            question: Some(entry.question.clone()),
            subquestions,
            final_answer: Some(final_answer),
            reference: reference.cloned(),
            subquestion_score: SimilarityScore::ERROR,
            verdict: Verdict::Problem,
        };

        let mut failures = Vec::new();
        match score {
            Ok(value) => record.subquestion_score = SimilarityScore::Value(value),
            Err(err) => failures.push(format!("similarity: {err}")),
        }
        match verdict {
            Ok(verdict) => record.verdict = verdict,
            Err(err) => failures.push(format!("verdict: {err}")),
        }

        if failures.is_empty() {
            Ok(record)
        } else {
            Err(Error::Scoring { reason: failures.join("; "), record: Box::new(record) })
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Capture files directly inside `dir`, sorted by name.
pub fn find_captures(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|err| Error::validation(dir, format!("cannot list captures: {err}")))?;

    let mut captures = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| {
                    CAPTURE_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
                })
        })
        .collect::<Vec<_>>();
    captures.sort();
    Ok(captures)
}
