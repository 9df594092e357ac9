use netx_domain::{Context, ContextMessage, Error, ModelId, Result, ToolResult};
use tracing::{debug, warn};

use crate::{Calculator, ChatProvider, prompts};

/// Upper bound on model/tool round trips for a single prompt.
pub const MAX_TOOL_ROUNDS: usize = 5;

/// Drives one model through the decompose / answer / synthesize sequence for
/// one capture trace.
pub struct LlmAdapter<P> {
    provider: P,
    model: ModelId,
    trace: String,
    tools: bool,
}

impl<P: ChatProvider> LlmAdapter<P> {
    pub fn new(provider: P, model: ModelId, trace: impl Into<String>) -> Self {
        Self { provider, model, trace: trace.into(), tools: false }
    }

    /// Binds the calculator tool to every request.
    pub fn tools(mut self, enabled: bool) -> Self {
        self.tools = enabled;
        self
    }

    pub fn model(&self) -> &ModelId {
        &self.model
    }

    pub async fn decompose(&self, question: &str) -> Result<Vec<String>> {
        let context = self
            .context()
            .add_message(ContextMessage::system(prompts::decompose_system()))
            .add_message(ContextMessage::user(question));
        let reply = self.complete(context).await?;
        let subquestions = parse_subquestions(&reply);
        if subquestions.is_empty() {
            return Err(Error::provider(
                &self.model,
                format!("no sub-questions in decomposition of '{question}'"),
            ));
        }
        debug!(model = %self.model, count = subquestions.len(), "Decomposed question");
        Ok(subquestions)
    }

    /// Answers one sub-question against the trace.
    pub async fn answer(&self, subquestion: &str) -> Result<String> {
        let context = self
            .context()
            .add_message(ContextMessage::system(prompts::answer_system(&self.trace, self.tools)))
            .add_message(ContextMessage::user(subquestion));
        self.complete(context).await
    }

    pub async fn synthesize(
        &self,
        question: &str,
        subquestions: &[String],
        answers: &[String],
    ) -> Result<String> {
        let pairs = format_pairs(subquestions, answers);
        let context = self
            .context()
            .add_message(ContextMessage::system(prompts::synthesize_system()))
            .add_message(ContextMessage::user(prompts::synthesize_user(question, &pairs)));
        self.complete(context).await
    }

    fn context(&self) -> Context {
        let context = Context::default().temperature(0.0f32);
        if self.tools {
            context.add_tool(Calculator::definition())
        } else {
            context
        }
    }

    /// Sends the context and resolves tool calls until the model replies
    /// with plain text.
    async fn complete(&self, mut context: Context) -> Result<String> {
        for round in 0..=MAX_TOOL_ROUNDS {
            let completion = self.provider.chat(&self.model, &context).await?;
            if !self.tools || !completion.has_tool_calls() {
                return Ok(completion.content.trim().to_string());
            }
            if round == MAX_TOOL_ROUNDS {
                break;
            }

            let results = completion.tool_calls.iter().map(Calculator::call).collect::<Vec<ToolResult>>();
            for result in results.iter().filter(|result| result.is_error) {
                warn!(model = %self.model, error = %result.content, "Tool call failed");
            }
            context = context
                .add_message(ContextMessage::assistant(
                    completion.content,
                    Some(completion.tool_calls),
                ))
                .add_tool_results(results);
        }

        Err(Error::provider(
            &self.model,
            format!("still calling tools after {MAX_TOOL_ROUNDS} rounds"),
        ))
    }
}

/// Splits a decomposition reply into sub-questions, dropping list markers and
/// blank lines.
pub fn parse_subquestions(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix(['-', '*', '•'])
        .map(str::trim_start)
        .unwrap_or(line);

    // "1." / "2)" / "3:" numbering
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(['.', ')', ':']) {
            return rest.trim_start();
        }
    }
    line
}

/// Renders the sub-question/answer pairs handed to synthesis.
pub fn format_pairs(subquestions: &[String], answers: &[String]) -> String {
    subquestions
        .iter()
        .zip(answers)
        .enumerate()
        .map(|(index, (question, answer))| {
            format!("Question {n}: {question}\nAnswer {n}: {answer}", n = index + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
