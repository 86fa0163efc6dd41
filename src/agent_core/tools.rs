//! Built-in tool execution.
//!
//! [`WorkspaceToolExecutor`] maps tool names from the assistant's output onto
//! two host capabilities, [`FileSystem`] and [`Terminal`]. Relative paths are
//! resolved against the executor's working directory. [`LocalFileSystem`] and
//! [`ShellTerminal`] back those capabilities with the local machine.
//!
//! MCP tools go to an optional [`McpHub`]. Workspace [`FileRules`] hide
//! ignored paths from reads and listings and reject edits to protected ones.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::file_rules::FileRules;
use super::mcp::McpHub;

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid parameters for {tool}: {reason}")]
    InvalidParams { tool: String, reason: String },

    #[error("Access denied: {path} is ignored by workspace rules")]
    Ignored { path: String },

    #[error("Access denied: {path} is write-protected")]
    Protected { path: String },

    #[error("No MCP hub configured")]
    NoMcpHub,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ToolError {
    fn missing(tool: &str, param: &str) -> Self {
        Self::InvalidParams {
            tool: tool.to_string(),
            reason: format!("missing parameter '{param}'"),
        }
    }
}

// ─── Capabilities ───────────────────────────────────────────────────────────

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run tool `name`; the returned text goes back to the model.
    async fn execute(&self, name: &str, params: &HashMap<String, String>)
        -> Result<String, ToolError>;
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read_file(&self, path: &Path) -> anyhow::Result<String>;
    async fn write_file(&self, path: &Path, content: &str) -> anyhow::Result<()>;
    async fn list_files(&self, path: &Path, recursive: bool) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

#[async_trait]
pub trait Terminal: Send + Sync {
    async fn execute(&self, command: &str, cwd: &Path) -> anyhow::Result<CommandOutput>;
}

// ─── WorkspaceToolExecutor ──────────────────────────────────────────────────

pub struct WorkspaceToolExecutor<F, T> {
    fs: F,
    terminal: T,
    cwd: PathBuf,
    rules: FileRules,
    mcp_hub: Option<Arc<dyn McpHub>>,
}

impl<F: FileSystem, T: Terminal> WorkspaceToolExecutor<F, T> {
    pub fn new(fs: F, terminal: T, cwd: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            terminal,
            cwd: cwd.into(),
            rules: FileRules::default(),
            mcp_hub: None,
        }
    }

    pub fn with_file_rules(mut self, rules: FileRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_mcp_hub(mut self, hub: Arc<dyn McpHub>) -> Self {
        self.mcp_hub = Some(hub);
        self
    }

    /// Load `.codeloopignore` and `.codeloopprotected` from the working
    /// directory through the executor's own file system.
    pub async fn load_file_rules(mut self) -> Self {
        self.rules = FileRules::load(&self.fs, &self.cwd).await;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.cwd.join(path)
    }

    /// `path` relative to the working directory with `/` separators, the form
    /// file rules are written against.
    fn rule_path(&self, path: &str) -> String {
        let full = self.resolve(path);
        let relative = full.strip_prefix(&self.cwd).unwrap_or(&full);
        let mut parts: Vec<String> = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::ParentDir => {
                    parts.pop();
                }
                _ => {}
            }
        }
        parts.join("/")
    }

    fn check_readable(&self, path: &str) -> Result<(), ToolError> {
        if self.rules.ignore.excludes(&self.rule_path(path), false) {
            return Err(ToolError::Ignored {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn check_writable(&self, path: &str) -> Result<(), ToolError> {
        if self.rules.protect.is_protected(&self.rule_path(path)) {
            tracing::warn!(path, "edit of protected path rejected");
            return Err(ToolError::Protected {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    async fn list_files(&self, params: &HashMap<String, String>) -> Result<String, ToolError> {
        let path = params.get("path").map(String::as_str).unwrap_or(".");
        let recursive = params.get("recursive").is_some_and(|v| v == "true");
        let files = self.fs.list_files(&self.resolve(path), recursive).await?;

        let base = self.rule_path(path);
        let visible: Vec<String> = files
            .into_iter()
            .filter(|entry| {
                let is_directory = entry.ends_with('/');
                let name = entry.trim_end_matches('/');
                let full = if base.is_empty() {
                    name.to_string()
                } else {
                    format!("{base}/{name}")
                };
                !self.rules.ignore.excludes(&full, is_directory)
            })
            .collect();
        Ok(visible.join("\n"))
    }

    fn mcp_hub(&self) -> Result<&dyn McpHub, ToolError> {
        self.mcp_hub.as_deref().ok_or(ToolError::NoMcpHub)
    }

    async fn use_mcp_tool(&self, params: &HashMap<String, String>) -> Result<String, ToolError> {
        const TOOL: &str = "use_mcp_tool";
        let hub = self.mcp_hub()?;
        let server = required(params, TOOL, "server_name")?;
        let tool = required(params, TOOL, "tool_name")?;
        let arguments = match params.get("arguments").map(|raw| raw.trim()) {
            Some(raw) if !raw.is_empty() => {
                serde_json::from_str(raw).map_err(|e| ToolError::InvalidParams {
                    tool: TOOL.to_string(),
                    reason: format!("arguments must be a JSON object: {e}"),
                })?
            }
            _ => serde_json::Value::Object(serde_json::Map::new()),
        };

        tracing::info!(server = %server, tool = %tool, "invoking MCP tool");
        let result = hub.invoke_tool(server, tool, arguments).await?;
        Ok(result.to_string())
    }

    async fn access_mcp_resource(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<String, ToolError> {
        const TOOL: &str = "access_mcp_resource";
        let hub = self.mcp_hub()?;
        let server = required(params, TOOL, "server_name")?;
        let uri = required(params, TOOL, "uri")?;

        tracing::info!(server = %server, uri = %uri, "reading MCP resource");
        let result = hub.access_resource(server, uri).await?;
        Ok(result.to_string())
    }

    async fn search_files(&self, params: &HashMap<String, String>) -> Result<String, ToolError> {
        let regex = required(params, "search_files", "regex")?;
        let path = params.get("path").map(String::as_str).unwrap_or(".");
        let command = format!("grep -rn {} {}", shell_quote(regex), shell_quote(path));
        let output = self.terminal.execute(&command, &self.cwd).await?;
        Ok(if !output.stdout.is_empty() {
            output.stdout
        } else if !output.stderr.is_empty() {
            output.stderr
        } else {
            "No results found.".to_string()
        })
    }

    async fn execute_command(&self, params: &HashMap<String, String>) -> Result<String, ToolError> {
        let command = required(params, "execute_command", "command")?;
        let cwd = params
            .get("cwd")
            .map(|dir| self.resolve(dir))
            .unwrap_or_else(|| self.cwd.clone());
        let output = self.terminal.execute(command, &cwd).await?;
        let mut text = output.stdout;
        if !output.stderr.is_empty() {
            text.push_str("\nSTDERR: ");
            text.push_str(&output.stderr);
        }
        Ok(text)
    }

    async fn apply_diff(&self, params: &HashMap<String, String>) -> Result<String, ToolError> {
        let path = required(params, "apply_diff", "path")?;
        self.check_writable(path)?;
        let target = self.resolve(path);
        let existing = self.fs.read_file(&target).await?;
        let content = params.get("diff").map(String::as_str).unwrap_or(&existing);
        self.fs.write_file(&target, content).await?;
        Ok(format!("Diff applied to: {path}"))
    }

    async fn search_and_replace(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<String, ToolError> {
        const TOOL: &str = "search_and_replace";
        let path = required(params, TOOL, "path")?;
        let search = required(params, TOOL, "search")?;
        self.check_writable(path)?;
        let replace = params.get("replace").map(String::as_str).unwrap_or("");
        let target = self.resolve(path);
        let content = self.fs.read_file(&target).await?;

        let updated = if params.get("use_regex").is_some_and(|v| v == "true") {
            let re = regex::Regex::new(search).map_err(|e| ToolError::InvalidParams {
                tool: TOOL.to_string(),
                reason: format!("invalid regex: {e}"),
            })?;
            re.replace_all(&content, replace).into_owned()
        } else {
            content.replacen(search.as_str(), replace, 1)
        };
        self.fs.write_file(&target, &updated).await?;
        Ok(format!("Search and replace completed in: {path}"))
    }

    async fn insert_content(&self, params: &HashMap<String, String>) -> Result<String, ToolError> {
        const TOOL: &str = "insert_content";
        let path = required(params, TOOL, "path")?;
        self.check_writable(path)?;
        let line = params.get("line").map(String::as_str).unwrap_or("1");
        let line_number: usize = line.trim().parse().map_err(|_| ToolError::InvalidParams {
            tool: TOOL.to_string(),
            reason: format!("line must be a positive integer, got '{line}'"),
        })?;
        let inserted = params.get("content").map(String::as_str).unwrap_or("");

        let target = self.resolve(path);
        let content = self.fs.read_file(&target).await?;
        let mut lines: Vec<&str> = content.split('\n').collect();
        let index = line_number.saturating_sub(1).min(lines.len());
        lines.insert(index, inserted);
        self.fs.write_file(&target, &lines.join("\n")).await?;
        Ok(format!("Content inserted at line {line} in: {path}"))
    }
}

#[async_trait]
impl<F: FileSystem, T: Terminal> ToolExecutor for WorkspaceToolExecutor<F, T> {
    async fn execute(
        &self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<String, ToolError> {
        tracing::debug!(tool = name, "executing tool");
        match name {
            "read_file" => {
                let path = required(params, name, "path")?;
                self.check_readable(path)?;
                Ok(self.fs.read_file(&self.resolve(path)).await?)
            }
            "write_to_file" => {
                let path = required(params, name, "path")?;
                self.check_writable(path)?;
                let content = params.get("content").map(String::as_str).unwrap_or("");
                self.fs.write_file(&self.resolve(path), content).await?;
                Ok(format!("File written: {path}"))
            }
            "list_files" => self.list_files(params).await,
            "search_files" => self.search_files(params).await,
            "execute_command" => self.execute_command(params).await,
            "apply_diff" => self.apply_diff(params).await,
            "search_and_replace" => self.search_and_replace(params).await,
            "insert_content" => self.insert_content(params).await,
            "use_mcp_tool" => self.use_mcp_tool(params).await,
            "access_mcp_resource" => self.access_mcp_resource(params).await,
            "ask_followup_question" => {
                let question = params.get("question").map(String::as_str).unwrap_or("");
                Ok(format!("[Follow-up question asked: {question}]"))
            }
            _ => Err(ToolError::UnknownTool {
                name: name.to_string(),
            }),
        }
    }
}

fn required<'a>(
    params: &'a HashMap<String, String>,
    tool: &str,
    key: &str,
) -> Result<&'a String, ToolError> {
    params.get(key).ok_or_else(|| ToolError::missing(tool, key))
}

/// Single-quote `arg` for a POSIX shell.
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

// ─── LocalFileSystem ────────────────────────────────────────────────────────

/// The local disk through `tokio::fs`. Listings skip dot-files and mark
/// directories with a trailing `/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_file(&self, path: &Path) -> anyhow::Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn write_file(&self, path: &Path, content: &str) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    async fn list_files(&self, path: &Path, recursive: bool) -> anyhow::Result<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![path.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("Failed to read directory {}", dir.display()))?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let entry_path = entry.path();
                let relative = entry_path
                    .strip_prefix(path)
                    .unwrap_or(&entry_path)
                    .to_string_lossy()
                    .replace('\\', "/");
                if entry.file_type().await?.is_dir() {
                    files.push(format!("{relative}/"));
                    if recursive {
                        pending.push(entry_path);
                    }
                } else {
                    files.push(relative);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

// ─── ShellTerminal ──────────────────────────────────────────────────────────

/// Runs commands through the platform shell and waits for them to exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellTerminal;

#[async_trait]
impl Terminal for ShellTerminal {
    async fn execute(&self, command: &str, cwd: &Path) -> anyhow::Result<CommandOutput> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C");
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c");
            cmd
        };
        let output = cmd
            .arg(command)
            .current_dir(cwd)
            .output()
            .await
            .with_context(|| format!("Failed to run `{command}`"))?;

        tracing::debug!(command, status = ?output.status.code(), "command finished");
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
