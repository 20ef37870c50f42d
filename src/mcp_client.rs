//! Thin helpers over the rmcp client for talking to the server under test.

use crate::smoke::SmokeError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParam, CallToolResult, JsonObject, Tool},
    service::RunningService,
    transport::{
        StreamableHttpClientTransport,
        streamable_http_client::StreamableHttpClientTransportConfig,
    },
};
use serde::Serialize;
use serde_json::Value;

/// A connected MCP client session
pub type McpClient = RunningService<RoleClient, ()>;

/// Name and description of a remote tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: Option<String>,
}

impl From<&Tool> for ToolSummary {
    fn from(tool: &Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.as_deref().map(str::to_owned),
        }
    }
}

/// Build the MCP endpoint URL from a server base URL, e.g. `http://127.0.0.1:8000` -> `.../mcp`
pub fn mcp_endpoint(base_url: &str) -> String {
    format!("{}/mcp", base_url.trim_end_matches('/'))
}

/// Connect over streamable HTTP; a bearer token, if given, is sent on every request
pub async fn connect(mcp_url: &str, bearer_token: Option<&str>) -> Result<McpClient, SmokeError> {
    let connect_error = |message: String| SmokeError::Connect {
        url: mcp_url.to_string(),
        message,
    };

    let mut headers = HeaderMap::new();
    if let Some(token) = bearer_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| connect_error(format!("invalid token: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    let http = reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| connect_error(e.to_string()))?;

    let transport = StreamableHttpClientTransport::with_client(
        http,
        StreamableHttpClientTransportConfig::with_uri(mcp_url.to_string()),
    );
    let client = ()
        .serve(transport)
        .await
        .map_err(|e| connect_error(e.to_string()))?;
    tracing::debug!("Connected to {}: {:?}", mcp_url, client.peer_info());
    Ok(client)
}

/// List every tool the server exposes
pub async fn list_tools(client: &McpClient) -> Result<Vec<ToolSummary>, SmokeError> {
    let tools = client
        .list_all_tools()
        .await
        .map_err(|e| SmokeError::Call {
            tool: "tools/list".to_string(),
            message: e.to_string(),
        })?;
    Ok(tools.iter().map(ToolSummary::from).collect())
}

/// Call `name` with optional arguments
pub async fn call_tool(
    client: &McpClient,
    name: &str,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, SmokeError> {
    client
        .call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments,
        })
        .await
        .map_err(|e| SmokeError::Call {
            tool: name.to_string(),
            message: e.to_string(),
        })
}

/// Parse the text of the first content element as JSON
pub fn first_text_json(tool: &str, result: &CallToolResult) -> Result<Value, SmokeError> {
    let payload_error = |message: String| SmokeError::Payload {
        tool: tool.to_string(),
        message,
    };
    let raw = serde_json::to_value(result).map_err(|e| payload_error(e.to_string()))?;
    let text = raw
        .pointer("/content/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| payload_error("first content element has no text".to_string()))?;
    serde_json::from_str(text).map_err(|e| payload_error(format!("text is not JSON: {e}")))
}
