//! System prompt assembly.
//!
//! The runner rebuilds the system prompt every round so it always reflects
//! the active mode. [`DefaultPromptBuilder`] assembles it from sections:
//!
//! 1. Role definition of the mode
//! 2. System information (working directory, platform)
//! 3. Capability summary for the granted tool groups
//! 4. Tool descriptions with XML usage, filtered to the permitted tools, then
//!    the tools of connected MCP servers when the mode may use them
//! 5. Behavioral rules
//! 6. Project rules and custom instructions, when present
//! 7. Mode-specific instructions, when present

use std::fmt::Write as _;
use std::path::Path;

use super::mcp::McpToolInfo;
use super::modes::ModeConfig;
use super::tool_groups::ToolGroup;

// ─── Context ────────────────────────────────────────────────────────────────

/// Everything a prompt builder may draw on for one round.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub mode: &'a ModeConfig,
    /// Tools the active mode permits, in presentation order.
    pub allowed_tools: &'a [&'static str],
    pub cwd: &'a Path,
    pub custom_instructions: Option<&'a str>,
    pub project_rules: &'a [String],
    /// Tools reported by the MCP hub, if one is attached.
    pub mcp_tools: &'a [McpToolInfo],
}

pub trait SystemPromptBuilder: Send + Sync {
    fn build(&self, ctx: &PromptContext<'_>) -> String;
}

// ─── Tool Definitions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolParam {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ToolParam],
}

const fn req(name: &'static str, description: &'static str) -> ToolParam {
    ToolParam {
        name,
        description,
        required: true,
    }
}

const fn opt(name: &'static str, description: &'static str) -> ToolParam {
    ToolParam {
        name,
        description,
        required: false,
    }
}

pub const TOOL_DEFINITIONS: &[ToolDefinition] = &[
    ToolDefinition {
        name: "read_file",
        description: "Read the contents of a file.",
        params: &[
            req("path", "File path, relative to the working directory"),
            opt("start_line", "First line to read (1-based, inclusive)"),
            opt("end_line", "Last line to read (1-based, inclusive)"),
        ],
    },
    ToolDefinition {
        name: "search_files",
        description: "Search files under a directory for a regular expression.",
        params: &[
            req("path", "Directory to search, relative to the working directory"),
            req("regex", "Regular expression to search for"),
            opt("file_pattern", "Glob restricting which files are searched, e.g. '*.rs'"),
        ],
    },
    ToolDefinition {
        name: "list_files",
        description: "List the files and directories at a path.",
        params: &[
            req("path", "Directory to list, relative to the working directory"),
            opt("recursive", "'true' to list subdirectories as well"),
        ],
    },
    ToolDefinition {
        name: "list_code_definition_names",
        description: "List the top-level definitions (types, functions, methods) in a source file or directory.",
        params: &[req("path", "File or directory to inspect")],
    },
    ToolDefinition {
        name: "write_to_file",
        description: "Write a file, creating it or replacing its contents.",
        params: &[
            req("path", "File to write"),
            req("content", "Complete new contents of the file"),
        ],
    },
    ToolDefinition {
        name: "apply_diff",
        description: "Modify a file with a diff.",
        params: &[req("path", "File to modify"), req("diff", "The diff to apply")],
    },
    ToolDefinition {
        name: "insert_content",
        description: "Insert text before a line of a file.",
        params: &[
            req("path", "File to modify"),
            req("line", "Line number to insert at (1-based)"),
            req("content", "Text to insert"),
        ],
    },
    ToolDefinition {
        name: "search_and_replace",
        description: "Replace text in a file.",
        params: &[
            req("path", "File to modify"),
            req("search", "Literal text, or a regular expression when use_regex is 'true'"),
            req("replace", "Replacement text"),
            opt("use_regex", "'true' to replace every regex match instead of the first literal match"),
        ],
    },
    ToolDefinition {
        name: "execute_command",
        description: "Run a shell command.",
        params: &[
            req("command", "The command line to run"),
            opt("cwd", "Directory to run in, defaults to the working directory"),
        ],
    },
    ToolDefinition {
        name: "use_mcp_tool",
        description: "Call a tool exposed by a connected MCP server.",
        params: &[
            req("server_name", "Name of the MCP server"),
            req("tool_name", "Name of the tool"),
            req("arguments", "JSON object of tool arguments"),
        ],
    },
    ToolDefinition {
        name: "access_mcp_resource",
        description: "Read a resource exposed by a connected MCP server.",
        params: &[
            req("server_name", "Name of the MCP server"),
            req("uri", "URI of the resource"),
        ],
    },
    ToolDefinition {
        name: "browser_action",
        description: "Drive a browser: launch, click, type, scroll_down, scroll_up or close.",
        params: &[
            req("action", "The action to perform"),
            opt("url", "URL to open (launch)"),
            opt("coordinate", "x,y position (click)"),
            opt("text", "Text to type (type)"),
        ],
    },
    ToolDefinition {
        name: "ask_followup_question",
        description: "Ask the user a question when information is missing.",
        params: &[
            req("question", "The question"),
            opt("follow_up", "Two to four suggested answers"),
        ],
    },
    ToolDefinition {
        name: "attempt_completion",
        description: "Present the finished result of the task.",
        params: &[
            req("result", "What was accomplished"),
            opt("command", "A command the user can run to see the result"),
        ],
    },
    ToolDefinition {
        name: "switch_mode",
        description: "Switch to another mode.",
        params: &[
            req("mode_slug", "Slug of the target mode"),
            opt("reason", "Why the switch is needed"),
        ],
    },
    ToolDefinition {
        name: "new_task",
        description: "Start a new task in a given mode.",
        params: &[
            req("mode", "Slug of the mode for the new task"),
            req("message", "Instructions for the new task"),
        ],
    },
];

pub fn tool_definition(name: &str) -> Option<&'static ToolDefinition> {
    TOOL_DEFINITIONS.iter().find(|t| t.name == name)
}

// ─── DefaultPromptBuilder ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptBuilder;

impl SystemPromptBuilder for DefaultPromptBuilder {
    fn build(&self, ctx: &PromptContext<'_>) -> String {
        let groups = ctx.mode.tool_groups();
        let mut sections = vec![
            ctx.mode.role_definition.clone(),
            system_info_section(ctx.cwd),
            capabilities_section(&groups),
            tools_section(ctx.allowed_tools, ctx.mcp_tools),
            RULES.to_string(),
        ];

        let custom = custom_section(ctx.custom_instructions, ctx.project_rules);
        if !custom.is_empty() {
            sections.push(custom);
        }
        if let Some(instructions) = &ctx.mode.custom_instructions {
            sections.push(format!("# Mode-Specific Instructions\n\n{instructions}"));
        }
        sections.join("\n\n")
    }
}

const RULES: &str = "\
# Rules

- The working directory is fixed. You cannot `cd` elsewhere; pass paths relative to it.
- Do not refer to the home directory with ~ or $HOME.
- Decide which tool fits before using it.
- Never print file contents meant for disk in your reply; write them with a tool.
- Use one tool at a time and wait for its result before the next step.
- Find information with the tools instead of asking for it.
- Use ask_followup_question only when the tools cannot answer it.
- When the task is done, present it with attempt_completion. Do not end the result with a question.";

fn system_info_section(cwd: &Path) -> String {
    format!(
        "# System Information\n\n- Working Directory: {}\n- Operating System: {}",
        cwd.display(),
        std::env::consts::OS
    )
}

fn capabilities_section(groups: &[ToolGroup]) -> String {
    let mut lines = vec!["# Capabilities\n"];
    for group in ToolGroup::ALL {
        if !groups.contains(&group) {
            continue;
        }
        lines.push(match group {
            ToolGroup::Read => "- Read files, search code and explore the project layout",
            ToolGroup::Edit => "- Create and modify files",
            ToolGroup::Command => "- Run terminal commands to build, test and run code",
            ToolGroup::Mcp => "- Use tools and resources of connected MCP servers",
            ToolGroup::Browser => "- Drive a browser to check the results of changes",
        });
    }
    lines.push("- Ask follow-up questions when context is missing");
    lines.push("- Switch modes when a different kind of work is needed");
    lines.join("\n")
}

fn tools_section(allowed_tools: &[&str], mcp_tools: &[McpToolInfo]) -> String {
    let mut out = String::from(
        "# Tools\n\n\
         Tool use is written as XML-style tags: the tool name wraps the call and each \
         parameter is wrapped in its own tag.\n\n\
         <tool_name>\n<parameter1_name>value1</parameter1_name>\n</tool_name>\n\n\
         Always follow this format so the call can be parsed.",
    );
    for tool in allowed_tools.iter().filter_map(|name| tool_definition(name)) {
        let _ = write!(out, "\n\n## {}\n\nDescription: {}\nParameters:\n", tool.name, tool.description);
        for param in tool.params {
            let flag = if param.required { "required" } else { "optional" };
            let _ = writeln!(out, "- {} ({flag}): {}", param.name, param.description);
        }
        let _ = write!(out, "Usage:\n<{}>\n", tool.name);
        for param in tool.params {
            let _ = writeln!(out, "<{0}>value</{0}>", param.name);
        }
        let _ = write!(out, "</{}>", tool.name);
    }

    if allowed_tools.contains(&"use_mcp_tool") && !mcp_tools.is_empty() {
        out.push_str(
            "\n\n## MCP Server Tools\n\n\
             The following tools are provided by connected MCP servers. Call them with use_mcp_tool.",
        );
        for tool in mcp_tools {
            let _ = write!(out, "\n\n### {} (from {})", tool.name, tool.server_name);
            if let Some(description) = &tool.description {
                let _ = write!(out, "\n{description}");
            }
            if let Some(schema) = &tool.input_schema {
                let _ = write!(out, "\nInput Schema: {schema}");
            }
        }
    }
    out
}

fn custom_section(custom_instructions: Option<&str>, project_rules: &[String]) -> String {
    let mut parts = Vec::new();
    if !project_rules.is_empty() {
        parts.push(format!("# Project Rules\n\n{}", project_rules.join("\n")));
    }
    if let Some(instructions) = custom_instructions.filter(|s| !s.trim().is_empty()) {
        parts.push(format!("# Custom Instructions\n\n{instructions}"));
    }
    parts.join("\n\n")
}

// ─── Tests ──────────────────────────────────────────────────────────────────
