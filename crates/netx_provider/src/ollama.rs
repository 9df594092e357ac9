use netx_domain::{
    ChatCompletion, Context, ContextMessage, ModelId, Result, Role, ToolCallFull, ToolName, Usage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http::post_json;
use crate::{ChatProvider, ProviderEndpoint};

/// Client for a local Ollama server's `/api/chat` endpoint.
#[derive(Clone, Debug)]
pub struct OllamaProvider {
    endpoint: ProviderEndpoint,
    client: Client,
}

impl OllamaProvider {
    pub fn new(endpoint: ProviderEndpoint, client: Client) -> Self {
        Self { endpoint, client }
    }
}

#[derive(Debug, Serialize)]
struct Request {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Options>,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionDescription,
}

#[derive(Debug, Serialize)]
struct FunctionDescription {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    message: Message,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

impl Request {
    fn new(model: &ModelId, context: &Context) -> Self {
        let messages = context
            .messages
            .iter()
            .map(|message| match message {
                ContextMessage::Text(text) => Message {
                    role: match text.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    }
                    .to_string(),
                    content: text.content.clone(),
                    tool_calls: text
                        .tool_calls
                        .iter()
                        .flatten()
                        .map(|call| ToolCall {
                            function: FunctionCall {
                                name: call.name.to_string(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect(),
                },
                ContextMessage::Tool(result) => Message {
                    role: "tool".to_string(),
                    content: result.content.clone(),
                    tool_calls: Vec::new(),
                },
            })
            .collect();

        let tools = context
            .tools
            .iter()
            .map(|definition| Tool {
                r#type: "function",
                function: FunctionDescription {
                    name: definition.name.to_string(),
                    description: definition.description.clone(),
                    parameters: definition.input_schema.clone(),
                },
            })
            .collect();

        Self {
            model: model.to_string(),
            messages,
            tools,
            stream: false,
            options: context.temperature.map(|temperature| Options { temperature }),
        }
    }
}

impl From<Response> for ChatCompletion {
    fn from(response: Response) -> Self {
        let tool_calls = response
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                ToolCallFull::new(ToolName::new(call.function.name)).arguments(call.function.arguments)
            })
            .collect();
        ChatCompletion {
            content: response.message.content,
            tool_calls,
            usage: Some(Usage {
                prompt_tokens: response.prompt_eval_count,
                completion_tokens: response.eval_count,
                total_tokens: response.prompt_eval_count + response.eval_count,
            }),
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for OllamaProvider {
    async fn chat(&self, model: &ModelId, context: &Context) -> Result<ChatCompletion> {
        let url = self.endpoint.url("api/chat")?;
        let response: Response = post_json(
            &self.client,
            self.endpoint.kind,
            &url,
            self.endpoint.api_key.as_deref(),
            &Request::new(model, context),
        )
        .await?;
        Ok(response.into())
    }
}
