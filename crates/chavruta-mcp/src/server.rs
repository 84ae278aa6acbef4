//! JSON-RPC method dispatch over a tool registry

use std::sync::Arc;
use std::time::Instant;

use chavruta_core::SurfaceError;
use chavruta_telemetry::Metrics;
use chavruta_tools::ToolRegistry;
use serde_json::{Value, json};

use crate::protocol::{
    self, INVALID_PARAMS, INVALID_REQUEST, JsonRpcError, JsonRpcRequest, METHOD_NOT_FOUND,
    PROTOCOL_VERSION, ToolCallParams,
};

/// One logical MCP server: a named tool registry plus metrics
pub struct McpServer {
    name: String,
    registry: ToolRegistry,
    metrics: Arc<Metrics>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, registry: ToolRegistry, metrics: Arc<Metrics>) -> Self {
        Self {
            name: name.into(),
            registry,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle one raw JSON-RPC message
    ///
    /// Returns `None` for notifications (nothing to send back).
    pub async fn handle(&self, raw: Value) -> Option<Value> {
        let started = Instant::now();

        let request: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.record_error();
                return Some(protocol::failure(
                    Value::Null,
                    JsonRpcError {
                        code: INVALID_REQUEST,
                        message: format!("malformed JSON-RPC request: {e}"),
                        data: None,
                    },
                ));
            }
        };

        let response = self.dispatch(request).await;
        self.metrics.observe_request(started.elapsed().as_millis() as u64);
        response
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<Value> {
        // Notifications get no reply
        let Some(id) = request.id else {
            tracing::debug!(server = %self.name, method = %request.method, "notification received");
            return None;
        };

        if request.jsonrpc != protocol::JSONRPC_VERSION {
            self.metrics.record_error();
            return Some(protocol::failure(
                id,
                JsonRpcError {
                    code: INVALID_REQUEST,
                    message: "jsonrpc must be \"2.0\"".to_owned(),
                    data: None,
                },
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {
                    "name": self.name,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({"tools": self.registry.descriptors()})),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError {
                code: METHOD_NOT_FOUND,
                message: format!("unknown method: {other}"),
                data: None,
            }),
        };

        Some(match result {
            Ok(value) => protocol::success(id, value),
            Err(error) => {
                self.metrics.record_error();
                protocol::failure(id, error)
            }
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = match params {
            Some(params) => serde_json::from_value(params).map_err(|e| JsonRpcError {
                code: INVALID_PARAMS,
                message: format!("invalid tools/call params: {e}"),
                data: None,
            })?,
            None => {
                return Err(JsonRpcError {
                    code: INVALID_PARAMS,
                    message: "tools/call requires params".to_owned(),
                    data: None,
                });
            }
        };

        let Some(tool) = self.registry.find(&params.name) else {
            return Err(JsonRpcError {
                code: INVALID_PARAMS,
                message: format!("unknown tool: {}", params.name),
                data: None,
            });
        };

        let arguments = if params.arguments.is_null() {
            json!({})
        } else {
            params.arguments
        };

        let started = Instant::now();
        let outcome = tool.invoke(arguments).await;
        self.metrics
            .observe_tool(tool.name(), started.elapsed().as_millis() as u64);

        match outcome {
            Ok(structured) => {
                let text = structured.to_string();
                Ok(json!({
                    "content": [{"type": "text", "text": text}],
                    "structuredContent": structured,
                }))
            }
            Err(e) => {
                tracing::warn!(server = %self.name, tool = %params.name, error = %e, "tool call failed");
                Err(JsonRpcError {
                    code: e.jsonrpc_code(),
                    message: e.client_message(),
                    data: Some(json!({"type": e.error_type()})),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chavruta_tools::{Tool, ToolError};

    use crate::protocol::TOOL_ERROR;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn description(&self) -> &'static str {
            "echoes its arguments"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
            if args.get("fail").is_some() {
                return Err(ToolError::InvalidInput("told to fail".to_owned()));
            }
            if args.get("break_upstream").is_some() {
                return Err(ToolError::Upstream("backend unreachable".to_owned()));
            }
            Ok(json!({"echo": args}))
        }
    }

    fn server() -> McpServer {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        McpServer::new("test-server", registry, Arc::new(Metrics::default()))
    }

    #[tokio::test]
    async fn initialize_reports_protocol_and_name() {
        let response = server()
            .handle(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
            .await
            .unwrap();
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], "test-server");
    }

    #[tokio::test]
    async fn tools_list_returns_descriptors() {
        let response = server()
            .handle(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
            .await
            .unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn tools_call_wraps_structured_content() {
        let response = server()
            .handle(json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": {"name": "echo", "arguments": {"a": 1}},
            }))
            .await
            .unwrap();
        let result = &response["result"];
        assert_eq!(result["structuredContent"]["echo"]["a"], 1);
        let text = result["content"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, result["structuredContent"]);
    }

    #[tokio::test]
    async fn tool_errors_become_jsonrpc_errors() {
        // Rejected input rides the protocol's invalid-params code
        let response = server()
            .handle(json!({
                "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                "params": {"name": "echo", "arguments": {"fail": true}},
            }))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert!(response["error"]["message"].as_str().unwrap().contains("told to fail"));

        // Everything else lands in the server-defined tool-error range
        let response = server()
            .handle(json!({
                "jsonrpc": "2.0", "id": 5, "method": "tools/call",
                "params": {"name": "echo", "arguments": {"break_upstream": true}},
            }))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], TOOL_ERROR);
        assert_eq!(response["error"]["data"]["type"], "upstream_error");
    }

    #[tokio::test]
    async fn unknown_tool_and_method_rejected() {
        let response = server()
            .handle(json!({
                "jsonrpc": "2.0", "id": 5, "method": "tools/call",
                "params": {"name": "missing"},
            }))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], INVALID_PARAMS);

        let response = server()
            .handle(json!({"jsonrpc": "2.0", "id": 6, "method": "bogus"}))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let response = server()
            .handle(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
        assert!(response.is_none());
    }
}
