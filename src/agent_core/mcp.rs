//! MCP server access as a host capability.
//!
//! The agent never talks to an MCP server itself. A host that manages server
//! connections implements [`McpHub`]; the tool executor routes
//! `use_mcp_tool` and `access_mcp_resource` through it and the prompt lists
//! the tools it reports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tool offered by a connected MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolInfo {
    pub server_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the tool's arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

impl McpToolInfo {
    pub fn new(server_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[async_trait]
pub trait McpHub: Send + Sync {
    /// Tools of every connected server.
    fn available_tools(&self) -> Vec<McpToolInfo>;

    /// Call `tool` on `server`. The result is handed back to the model as JSON.
    async fn invoke_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;

    /// Read the resource at `uri` from `server`.
    async fn access_resource(&self, server: &str, uri: &str) -> anyhow::Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_info_wire_names() {
        let info: McpToolInfo = serde_json::from_str(
            r#"{"serverName":"github","name":"create_issue","inputSchema":{"type":"object"}}"#,
        )
        .unwrap();
        assert_eq!(info.server_name, "github");
        assert_eq!(info.description, None);
        assert_eq!(info.input_schema, Some(serde_json::json!({"type": "object"})));

        let json = serde_json::to_value(McpToolInfo::new("fs", "stat")).unwrap();
        assert!(json.get("description").is_none());
    }
}
