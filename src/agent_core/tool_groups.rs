//! Tool groups: which tools a mode may use.
//!
//! Modes grant groups, not individual tools. The meta tools that steer the
//! conversation itself are available in every mode.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolGroup {
    Read,
    Edit,
    Command,
    Mcp,
    Browser,
}

impl ToolGroup {
    pub const ALL: [ToolGroup; 5] = [
        ToolGroup::Read,
        ToolGroup::Edit,
        ToolGroup::Command,
        ToolGroup::Mcp,
        ToolGroup::Browser,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolGroup::Read => "read",
            ToolGroup::Edit => "edit",
            ToolGroup::Command => "command",
            ToolGroup::Mcp => "mcp",
            ToolGroup::Browser => "browser",
        }
    }
}

impl fmt::Display for ToolGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tools granted by each group.
pub fn tools_by_group(group: ToolGroup) -> &'static [&'static str] {
    match group {
        ToolGroup::Read => &[
            "read_file",
            "search_files",
            "list_files",
            "list_code_definition_names",
        ],
        ToolGroup::Edit => &[
            "write_to_file",
            "apply_diff",
            "insert_content",
            "search_and_replace",
        ],
        ToolGroup::Command => &["execute_command"],
        ToolGroup::Mcp => &["use_mcp_tool", "access_mcp_resource"],
        ToolGroup::Browser => &["browser_action"],
    }
}

/// Tools usable in every mode.
pub const ALWAYS_AVAILABLE_TOOLS: &[&str] = &[
    "ask_followup_question",
    "attempt_completion",
    "switch_mode",
    "new_task",
];

/// The group a tool belongs to, if any.
pub fn group_of(tool: &str) -> Option<ToolGroup> {
    ToolGroup::ALL
        .into_iter()
        .find(|g| tools_by_group(*g).contains(&tool))
}

/// Every tool permitted by `groups`: always-available tools first, then each
/// group's tools in order, without duplicates.
pub fn tools_for_groups(groups: &[ToolGroup]) -> Vec<&'static str> {
    let mut tools: Vec<&'static str> = ALWAYS_AVAILABLE_TOOLS.to_vec();
    for group in groups {
        for &tool in tools_by_group(*group) {
            if !tools.contains(&tool) {
                tools.push(tool);
            }
        }
    }
    tools
}

/// Whether `tool` may be used with the given groups.
pub fn is_tool_allowed(tool: &str, groups: &[ToolGroup]) -> bool {
    if ALWAYS_AVAILABLE_TOOLS.contains(&tool) {
        return true;
    }
    group_of(tool).is_some_and(|g| groups.contains(&g))
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TOOL_NAMES;

    #[test]
    fn test_every_tool_name_is_grouped_or_meta() {
        for name in TOOL_NAMES {
            assert!(
                group_of(name).is_some() || ALWAYS_AVAILABLE_TOOLS.contains(name),
                "{name} has no group"
            );
        }
    }

    #[test]
    fn test_tools_for_groups() {
        let tools = tools_for_groups(&[ToolGroup::Read, ToolGroup::Read]);
        assert_eq!(tools.len(), ALWAYS_AVAILABLE_TOOLS.len() + 4);
        assert!(tools.contains(&"list_files"));
        assert!(!tools.contains(&"write_to_file"));
    }

    #[test]
    fn test_is_tool_allowed() {
        assert!(is_tool_allowed("attempt_completion", &[]));
        assert!(is_tool_allowed("execute_command", &[ToolGroup::Command]));
        assert!(!is_tool_allowed("execute_command", &[ToolGroup::Read]));
        assert!(!is_tool_allowed("not_a_tool", &ToolGroup::ALL));
    }

    #[test]
    fn test_group_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ToolGroup::Mcp).unwrap(), "\"mcp\"");
    }
}
