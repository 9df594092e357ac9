use derive_setters::Setters;
use netx_domain::{Context, ContextMessage, ModelId, Role, ToolCallFull, ToolDefinition};
use serde::Serialize;

#[derive(Debug, Serialize, Setters)]
#[setters(strip_option, into)]
pub struct Request {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    pub stream: bool,
}

impl Request {
    pub fn new(model: &ModelId, context: &Context) -> Self {
        Self {
            model: model.to_string(),
            messages: context.messages.iter().map(Message::from).collect(),
            temperature: context.temperature,
            tools: context.tools.iter().map(Tool::from).collect(),
            stream: false,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Message {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&ContextMessage> for Message {
    fn from(message: &ContextMessage) -> Self {
        match message {
            ContextMessage::Text(text) => Message {
                role: match text.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: Some(text.content.clone()),
                tool_calls: text
                    .tool_calls
                    .as_ref()
                    .map(|calls| calls.iter().map(ToolCall::from).collect()),
                tool_call_id: None,
                name: None,
            },
            ContextMessage::Tool(result) => Message {
                role: "tool",
                content: Some(result.content.clone()),
                tool_calls: None,
                tool_call_id: result.call_id.as_ref().map(|id| id.as_str().to_string()),
                name: Some(result.name.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub r#type: &'static str,
    pub function: FunctionCall,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

impl From<&ToolCallFull> for ToolCall {
    fn from(call: &ToolCallFull) -> Self {
        let arguments = match &call.arguments {
            serde_json::Value::String(raw) => raw.clone(),
            value => value.to_string(),
        };
        ToolCall {
            id: call.call_id.as_ref().map(|id| id.as_str().to_string()),
            r#type: "function",
            function: FunctionCall { name: call.name.to_string(), arguments },
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Tool {
    pub r#type: &'static str,
    pub function: FunctionDescription,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FunctionDescription {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&ToolDefinition> for Tool {
    fn from(definition: &ToolDefinition) -> Self {
        Tool {
            r#type: "function",
            function: FunctionDescription {
                name: definition.name.to_string(),
                description: definition.description.clone(),
                parameters: definition.input_schema.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use netx_domain::{ToolCallId, ToolName, ToolResult};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_body() {
        let call = ToolCallFull::new(ToolName::new("calculator"))
            .call_id(ToolCallId::new("call_1"))
            .arguments(json!({"expression": "2 + 2"}));
        let fixture = Context::default()
            .temperature(0.0f32)
            .add_tool(ToolDefinition::new("calculator").description("Evaluates arithmetic"))
            .add_message(ContextMessage::user("Sum?"))
            .add_message(ContextMessage::assistant("", Some(vec![call])))
            .add_tool_results(vec![
                ToolResult::new(ToolName::new("calculator"))
                    .call_id(ToolCallId::new("call_1"))
                    .success("4"),
            ]);

        let actual = serde_json::to_value(Request::new(&ModelId::new("llama3-8b-8192"), &fixture))
            .unwrap();
        let expected = json!({
            "model": "llama3-8b-8192",
            "messages": [
                {"role": "user", "content": "Sum?"},
                {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "calculator", "arguments": "{\"expression\":\"2 + 2\"}"}
                    }]
                },
                {"role": "tool", "content": "4", "tool_call_id": "call_1", "name": "calculator"}
            ],
            "temperature": 0.0,
            "tools": [{
                "type": "function",
                "function": {
                    "name": "calculator",
                    "description": "Evaluates arithmetic",
                    "parameters": {"type": "object", "properties": {}}
                }
            }],
            "stream": false
        });
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_no_tools_field_without_tools() {
        let fixture = Context::default().add_message(ContextMessage::user("hi"));
        let actual = serde_json::to_value(Request::new(&ModelId::new("m"), &fixture)).unwrap();
        assert!(actual.get("tools").is_none());
        assert!(actual.get("temperature").is_none());
    }
}
