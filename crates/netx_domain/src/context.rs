use derive_more::derive::{Display, From};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ToolCallFull, ToolDefinition, ToolResult};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize, Display)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message sent to or received from the model.
#[derive(Clone, Debug, Deserialize, From, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ContextMessage {
    Text(TextMessage),
    Tool(ToolResult),
}

impl ContextMessage {
    pub fn content(&self) -> Option<&str> {
        match self {
            ContextMessage::Text(message) => Some(&message.content),
            ContextMessage::Tool(_) => None,
        }
    }

    pub fn system(content: impl ToString) -> Self {
        TextMessage::new(Role::System, content).into()
    }

    pub fn user(content: impl ToString) -> Self {
        TextMessage::new(Role::User, content).into()
    }

    pub fn assistant(content: impl ToString, tool_calls: Option<Vec<ToolCallFull>>) -> Self {
        let message = TextMessage::new(Role::Assistant, content);
        match tool_calls {
            Some(calls) if !calls.is_empty() => message.tool_calls(calls).into(),
            _ => message.into(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        match self {
            ContextMessage::Text(message) => message.role == role,
            ContextMessage::Tool(_) => false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Setters)]
#[setters(strip_option, into)]
pub struct TextMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallFull>>,
}

impl TextMessage {
    pub fn new(role: Role, content: impl ToString) -> Self {
        Self { role, content: content.to_string(), tool_calls: None }
    }
}

/// A request to a chat model: the running conversation plus the tools it may
/// call.
#[derive(Clone, Debug, Deserialize, Serialize, Setters, Default, PartialEq)]
#[setters(into, strip_option)]
pub struct Context {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ContextMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Context {
    pub fn add_tool(mut self, tool: impl Into<ToolDefinition>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn add_message(mut self, content: impl Into<ContextMessage>) -> Self {
        let content = content.into();
        debug!(content = ?content, "Adding message to context");
        self.messages.push(content);
        self
    }

    pub fn add_tool_results(mut self, results: Vec<ToolResult>) -> Self {
        self.messages.extend(results.into_iter().map(ContextMessage::Tool));
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A single non-streaming model reply.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Setters)]
#[setters(into, strip_option)]
pub struct ChatCompletion {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFull>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Default::default() }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ToolCallId, ToolName};

    #[test]
    fn test_context_keeps_message_order() {
        let fixture = Context::default()
            .add_message(ContextMessage::system("You are a network analyst."))
            .add_message(ContextMessage::user("How many packets?"));
        let actual = fixture
            .messages
            .iter()
            .filter_map(|message| message.content())
            .collect::<Vec<_>>();
        let expected = vec!["You are a network analyst.", "How many packets?"];
        assert_eq!(actual, expected);
        assert!(fixture.messages[0].has_role(Role::System));
    }

    #[test]
    fn test_assistant_without_calls_has_no_tool_calls() {
        let actual = ContextMessage::assistant("done", Some(vec![]));
        let expected = ContextMessage::Text(TextMessage::new(Role::Assistant, "done"));
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_tool_results_are_appended() {
        let result = ToolResult::new(ToolName::new("calculator"))
            .call_id(ToolCallId::new("1"))
            .success("14");
        let actual = Context::default().add_tool_results(vec![result.clone()]);
        assert_eq!(actual.messages, vec![ContextMessage::Tool(result)]);
    }
}
