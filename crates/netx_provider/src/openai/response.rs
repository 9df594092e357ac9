use netx_domain::{ChatCompletion, ToolCallFull, ToolCallId, ToolName, Usage};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseToolCall {
    pub id: Option<String>,
    pub function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
pub struct ResponseFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl From<ResponseToolCall> for ToolCallFull {
    fn from(call: ResponseToolCall) -> Self {
        // Arguments that are not valid JSON are kept verbatim; the tool reports
        // the problem back to the model.
        let arguments = serde_json::from_str(&call.function.arguments)
            .unwrap_or(serde_json::Value::String(call.function.arguments));
        let full = ToolCallFull::new(ToolName::new(call.function.name)).arguments(arguments);
        match call.id {
            Some(id) => full.call_id(ToolCallId::new(id)),
            None => full,
        }
    }
}

impl Response {
    /// Returns `None` when the provider sent no choices.
    pub fn into_completion(self) -> Option<ChatCompletion> {
        let choice = self.choices.into_iter().next()?;
        let completion = ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(ToolCallFull::from)
                .collect(),
            usage: self.usage.map(|usage| Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
        };
        Some(completion)
    }
}
