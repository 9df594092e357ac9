use std::net::IpAddr;

use lazy_static::lazy_static;
use netx_domain::{
    Context, ContextMessage, Error, ModelId, Protocol, ReferenceAnswer, Result, Verdict,
};
use netx_provider::ChatProvider;
use regex::Regex;
use tracing::debug;

/// Decides whether a final answer matches the reference answer.
#[async_trait::async_trait]
pub trait AnswerJudge: Send + Sync {
    async fn judge(
        &self,
        question: &str,
        answer: &str,
        reference: &ReferenceAnswer,
    ) -> Result<Verdict>;
}

lazy_static! {
    static ref IPV4: Regex =
        Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid IPv4 pattern");
    static ref NUMBER: Regex =
        Regex::new(r"-?\d[\d,]*(?:\.\d+)?(?:[eE][-+]?\d+)?").expect("valid number pattern");
    static ref PROTOCOL: Regex =
        Regex::new(r"(?i)\b(ICMPv6|ICMP|TCP|UDP)\b").expect("valid protocol pattern");
    static ref NOT_COMPUTABLE: Regex = Regex::new(
        r"(?i)\b(not computable|cannot be (computed|calculated|determined)|undefined|not (possible|applicable)|only one packet|n/a|no (ip|icmp|tcp|udp)\b)"
    )
    .expect("valid refusal pattern");
    static ref ANSWER_MARKER: Regex =
        Regex::new(r"(?i)(?:final answer|answer)\s*(?:is|:|=)|=").expect("valid marker pattern");
}

/// Deterministic matching of numbers, addresses and protocol names.
#[derive(Clone, Copy, Debug)]
pub struct HeuristicJudge {
    /// Relative tolerance for numeric answers.
    tolerance: f64,
}

impl Default for HeuristicJudge {
    fn default() -> Self {
        Self { tolerance: 0.01 }
    }
}

impl HeuristicJudge {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    fn numbers(answer: &str) -> Vec<f64> {
        let without_addresses = IPV4.replace_all(answer, " ");
        NUMBER
            .find_iter(&without_addresses)
            .filter_map(|found| found.as_str().replace(',', "").parse::<f64>().ok())
            .collect()
    }

    fn addresses(answer: &str) -> Vec<IpAddr> {
        answer
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | '\'' | '`'))
            .map(|token| token.trim_end_matches(['.', '?', '!']))
            .filter_map(|token| token.parse::<IpAddr>().ok())
            .collect()
    }

    fn protocols(answer: &str) -> Vec<Protocol> {
        PROTOCOL
            .find_iter(answer)
            .filter_map(|found| match found.as_str().to_ascii_uppercase().as_str() {
                "ICMPV6" => Some(Protocol::Icmpv6),
                "ICMP" => Some(Protocol::Icmp),
                "TCP" => Some(Protocol::Tcp),
                "UDP" => Some(Protocol::Udp),
                _ => None,
            })
            .collect()
    }

    fn close_enough(&self, actual: f64, expected: f64) -> bool {
        (actual - expected).abs() <= self.tolerance * expected.abs()
    }

    /// Judges the number the answer states as its result. An explicit marker
    /// (`answer is`, `answer:`, `=`) names it; without one every number in
    /// the text must agree, otherwise intermediate values make the answer
    /// ambiguous.
    fn numeric_verdict(&self, answer: &str, expected: f64) -> Verdict {
        let marked = ANSWER_MARKER
            .find_iter(answer)
            .last()
            .and_then(|marker| Self::numbers(&answer[marker.end()..]).first().copied());
        if let Some(stated) = marked {
            return if self.close_enough(stated, expected) {
                Verdict::Correct
            } else {
                Verdict::Incorrect
            };
        }

        let numbers = Self::numbers(answer);
        let matching = numbers.iter().filter(|number| self.close_enough(**number, expected)).count();
        match (numbers.len(), matching) {
            (0, _) => Verdict::Indeterminate,
            (_, 0) => Verdict::Incorrect,
            (total, matching) if total == matching => Verdict::Correct,
            _ => Verdict::Indeterminate,
        }
    }

    fn verdict(&self, answer: &str, reference: &ReferenceAnswer) -> Verdict {
        if answer.trim().is_empty() {
            return Verdict::Indeterminate;
        }

        match reference {
            ReferenceAnswer::Count(_) | ReferenceAnswer::Quantity(_) => {
                let Some(expected) = reference.as_number() else {
                    return Verdict::Indeterminate;
                };
                self.numeric_verdict(answer, expected)
            }
            ReferenceAnswer::Protocol(expected) => {
                let mentioned = Self::protocols(answer);
                if mentioned.is_empty() {
                    Verdict::Indeterminate
                } else if mentioned.first() == Some(expected) {
                    Verdict::Correct
                } else {
                    Verdict::Incorrect
                }
            }
            ReferenceAnswer::Addresses(expected) => {
                let mentioned = Self::addresses(answer);
                if mentioned.is_empty() {
                    Verdict::Indeterminate
                } else if mentioned.iter().any(|address| expected.contains(address)) {
                    Verdict::Correct
                } else {
                    Verdict::Incorrect
                }
            }
            ReferenceAnswer::Undefined(_) => {
                if NOT_COMPUTABLE.is_match(answer) {
                    Verdict::Correct
                } else if Self::numbers(answer).is_empty() {
                    Verdict::Indeterminate
                } else {
                    Verdict::Incorrect
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl AnswerJudge for HeuristicJudge {
    async fn judge(
        &self,
        _question: &str,
        answer: &str,
        reference: &ReferenceAnswer,
    ) -> Result<Verdict> {
        Ok(self.verdict(answer, reference))
    }
}

/// Asks a model to compare the answer with the reference.
pub struct ModelJudge<P> {
    provider: P,
    model: ModelId,
}

impl<P: ChatProvider> ModelJudge<P> {
    pub fn new(provider: P, model: ModelId) -> Self {
        Self { provider, model }
    }

    fn parse(reply: &str) -> Result<Verdict> {
        let word = reply
            .split(|c: char| !c.is_ascii_alphabetic())
            .find(|word| !word.is_empty())
            .unwrap_or_default()
            .to_ascii_uppercase();
        match word.as_str() {
            "YES" => Ok(Verdict::Correct),
            "NO" => Ok(Verdict::Incorrect),
            "UNSURE" => Ok(Verdict::Indeterminate),
            _ => Err(Error::Evaluation(format!("unexpected judge reply '{}'", reply.trim()))),
        }
    }
}

#[async_trait::async_trait]
impl<P: ChatProvider> AnswerJudge for ModelJudge<P> {
    async fn judge(
        &self,
        question: &str,
        answer: &str,
        reference: &ReferenceAnswer,
    ) -> Result<Verdict> {
        let context = Context::default()
            .temperature(0.0f32)
            .add_message(ContextMessage::system(
                "You grade answers about network packet captures. Compare the given answer with \
                 the reference answer. Reply with exactly one word: YES if the answer states the \
                 reference value, NO if it states a different value, UNSURE if it gives no \
                 usable answer.",
            ))
            .add_message(ContextMessage::user(format!(
                "Question: {question}\nReference answer: {reference}\nAnswer: {answer}"
            )));

        let completion = self.provider.chat(&self.model, &context).await?;
        debug!(judge = %self.model, reply = %completion.content, "Judge replied");
        Self::parse(&completion.content)
    }
}
