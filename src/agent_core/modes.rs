//! Mode registry: built-in modes plus a user overlay kept in [`Storage`].
//!
//! A mode is a persona (role definition) plus the tool groups it may use.
//! Built-ins are fixed at process start. Custom modes live in storage under
//! `customModes` as a JSON array; an overlay entry with a built-in slug
//! overrides that built-in.
//!
//! Registries sharing a store do not coordinate: the last write wins.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use super::errors::AgentError;
use super::storage::{get_typed, set_typed, Storage};
use super::tool_groups::ToolGroup;

/// Storage key of the overlay list.
pub const CUSTOM_MODES_KEY: &str = "customModes";

/// Slug used when a mode switch names no mode.
pub const DEFAULT_MODE_SLUG: &str = "code";

// ─── Types ──────────────────────────────────────────────────────────────────

/// Restrictions attached to a granted group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A granted group, either bare (`"edit"`) or with options
/// (`["edit", {"fileRegex": "\\.md$"}]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolGroupEntry {
    Group(ToolGroup),
    Restricted(ToolGroup, GroupOptions),
}

impl ToolGroupEntry {
    pub fn group(&self) -> ToolGroup {
        match self {
            ToolGroupEntry::Group(group) | ToolGroupEntry::Restricted(group, _) => *group,
        }
    }

    pub fn options(&self) -> Option<&GroupOptions> {
        match self {
            ToolGroupEntry::Group(_) => None,
            ToolGroupEntry::Restricted(_, options) => Some(options),
        }
    }
}

impl From<ToolGroup> for ToolGroupEntry {
    fn from(group: ToolGroup) -> Self {
        ToolGroupEntry::Group(group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeConfig {
    pub slug: String,
    pub name: String,
    pub role_definition: String,
    pub groups: Vec<ToolGroupEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky_model_id: Option<String>,
}

impl ModeConfig {
    /// The groups this mode grants, without their options.
    pub fn tool_groups(&self) -> Vec<ToolGroup> {
        self.groups.iter().map(ToolGroupEntry::group).collect()
    }

    fn apply(mut self, patch: &ModePatch) -> Self {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(role_definition) = &patch.role_definition {
            self.role_definition = role_definition.clone();
        }
        if let Some(groups) = &patch.groups {
            self.groups = groups.clone();
        }
        if let Some(custom_instructions) = &patch.custom_instructions {
            self.custom_instructions = Some(custom_instructions.clone());
        }
        if let Some(sticky_model_id) = &patch.sticky_model_id {
            self.sticky_model_id = Some(sticky_model_id.clone());
        }
        self
    }
}

/// Partial update for [`ModeRegistry::update_mode`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role_definition: Option<String>,
    #[serde(default)]
    pub groups: Option<Vec<ToolGroupEntry>>,
    #[serde(default)]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub sticky_model_id: Option<String>,
}

// ─── Built-in Modes ─────────────────────────────────────────────────────────

static BUILTIN_MODES: LazyLock<Vec<ModeConfig>> = LazyLock::new(|| {
    use ToolGroup::{Command, Edit, Mcp, Read};

    let mode = |slug: &str, name: &str, role: &str, groups: &[ToolGroup]| ModeConfig {
        slug: slug.to_string(),
        name: name.to_string(),
        role_definition: role.to_string(),
        groups: groups.iter().copied().map(ToolGroupEntry::from).collect(),
        custom_instructions: None,
        sticky_model_id: None,
    };

    vec![
        mode(
            "code",
            "Code",
            "You are a senior software engineer fluent in many languages, frameworks \
             and design patterns. You make focused, working changes to the codebase.",
            &[Read, Edit, Command, Mcp],
        ),
        mode(
            "architect",
            "Architect",
            "You are a software architect. You study the codebase, design system \
             structure and give technical direction through plans and documentation \
             instead of editing code directly.",
            &[Read],
        ),
        mode(
            "ask",
            "Ask",
            "You are a technical assistant. You answer questions and explain concepts \
             about software development and the code in front of you.",
            &[Read],
        ),
        mode(
            "debug",
            "Debug",
            "You are a debugging specialist. You work from error messages, logs and \
             observed behaviour to the root cause of a bug, then apply a targeted fix.",
            &[Read, Edit, Command, Mcp],
        ),
        mode(
            "orchestrator",
            "Orchestrator",
            "You coordinate multi-step work. You split large tasks into subtasks and \
             hand each one to the mode best suited for it.",
            &[Read],
        ),
    ]
});

/// The built-in modes in priority order.
pub fn builtin_modes() -> &'static [ModeConfig] {
    &BUILTIN_MODES
}

fn builtin_mode(slug: &str) -> Option<&'static ModeConfig> {
    BUILTIN_MODES.iter().find(|m| m.slug == slug)
}

pub fn is_builtin_mode(slug: &str) -> bool {
    builtin_mode(slug).is_some()
}

// ─── ModeRegistry ───────────────────────────────────────────────────────────

/// Resolves modes from the built-ins and the storage overlay.
#[derive(Clone)]
pub struct ModeRegistry {
    storage: Arc<dyn Storage>,
}

impl ModeRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn builtin_modes(&self) -> &'static [ModeConfig] {
        builtin_modes()
    }

    /// The overlay list, in stored order.
    pub async fn custom_modes(&self) -> Result<Vec<ModeConfig>, AgentError> {
        let modes: Option<Vec<ModeConfig>> =
            get_typed(self.storage.as_ref(), CUSTOM_MODES_KEY).await?;
        Ok(modes.unwrap_or_default())
    }

    async fn save_custom_modes(&self, modes: &[ModeConfig]) -> Result<(), AgentError> {
        set_typed(self.storage.as_ref(), CUSTOM_MODES_KEY, modes).await
    }

    /// Look up a mode, overlay first.
    pub async fn get_mode(&self, slug: &str) -> Result<Option<ModeConfig>, AgentError> {
        let custom = self.custom_modes().await?;
        Ok(custom
            .into_iter()
            .find(|m| m.slug == slug)
            .or_else(|| builtin_mode(slug).cloned()))
    }

    /// Built-ins in order (each replaced by its override), then the remaining
    /// custom modes in overlay order.
    pub async fn get_all_modes(&self) -> Result<Vec<ModeConfig>, AgentError> {
        let mut all = builtin_modes().to_vec();
        for custom in self.custom_modes().await? {
            match all.iter().position(|m| m.slug == custom.slug) {
                Some(index) => all[index] = custom,
                None => all.push(custom),
            }
        }
        Ok(all)
    }

    /// Add a custom mode. A built-in slug is accepted and becomes an override.
    pub async fn create_mode(&self, config: ModeConfig) -> Result<(), AgentError> {
        let mut custom = self.custom_modes().await?;
        if custom.iter().any(|m| m.slug == config.slug) {
            return Err(AgentError::ModeAlreadyExists { slug: config.slug });
        }

        tracing::info!(
            slug = %config.slug,
            overrides_builtin = is_builtin_mode(&config.slug),
            "custom mode created"
        );
        custom.push(config);
        self.save_custom_modes(&custom).await
    }

    /// Merge `patch` into a custom mode, or create an override of a built-in.
    pub async fn update_mode(&self, slug: &str, patch: ModePatch) -> Result<(), AgentError> {
        let mut custom = self.custom_modes().await?;

        match custom.iter().position(|m| m.slug == slug) {
            Some(index) => {
                let merged = custom[index].clone().apply(&patch);
                custom[index] = merged;
            }
            None => {
                let builtin = builtin_mode(slug).ok_or_else(|| AgentError::ModeNotFound {
                    slug: slug.to_string(),
                })?;
                custom.push(builtin.clone().apply(&patch));
            }
        }

        tracing::info!(slug, "mode updated");
        self.save_custom_modes(&custom).await
    }

    /// Remove a custom mode. Built-in slugs are refused; unknown slugs are a no-op.
    pub async fn delete_mode(&self, slug: &str) -> Result<(), AgentError> {
        if is_builtin_mode(slug) {
            return Err(AgentError::BuiltinModeProtected {
                slug: slug.to_string(),
            });
        }

        let mut custom = self.custom_modes().await?;
        custom.retain(|m| m.slug != slug);
        self.save_custom_modes(&custom).await?;
        tracing::info!(slug, "custom mode deleted");
        Ok(())
    }

    /// Whether the overlay holds `slug` (custom mode or override).
    pub async fn is_custom_mode(&self, slug: &str) -> Result<bool, AgentError> {
        Ok(self.custom_modes().await?.iter().any(|m| m.slug == slug))
    }

    /// The group entries of a mode; empty for unknown slugs.
    pub async fn get_mode_groups(&self, slug: &str) -> Result<Vec<ToolGroupEntry>, AgentError> {
        Ok(self
            .get_mode(slug)
            .await?
            .map(|m| m.groups)
            .unwrap_or_default())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::storage::InMemoryStorage;

    fn registry() -> ModeRegistry {
        ModeRegistry::new(Arc::new(InMemoryStorage::new()))
    }

    fn custom(slug: &str) -> ModeConfig {
        ModeConfig {
            slug: slug.to_string(),
            name: format!("{slug} mode"),
            role_definition: "You write documentation.".into(),
            groups: vec![
                ToolGroup::Read.into(),
                ToolGroupEntry::Restricted(
                    ToolGroup::Edit,
                    GroupOptions {
                        file_regex: Some(r"\.md$".into()),
                        description: Some("Markdown only".into()),
                    },
                ),
            ],
            custom_instructions: None,
            sticky_model_id: None,
        }
    }

    #[test]
    fn test_builtin_modes_order_and_groups() {
        let slugs: Vec<_> = builtin_modes().iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, vec!["code", "architect", "ask", "debug", "orchestrator"]);
        assert_eq!(
            builtin_modes()[0].tool_groups(),
            vec![ToolGroup::Read, ToolGroup::Edit, ToolGroup::Command, ToolGroup::Mcp]
        );
        assert_eq!(builtin_modes()[1].tool_groups(), vec![ToolGroup::Read]);
    }

    #[test]
    fn test_group_entry_wire_format() {
        let json = serde_json::to_value(custom("docs").groups).unwrap();
        assert_eq!(
            json,
            serde_json::json!(["read", ["edit", {"fileRegex": "\\.md$", "description": "Markdown only"}]])
        );
        let parsed: Vec<ToolGroupEntry> = serde_json::from_value(json).unwrap();
        assert_eq!(parsed[1].group(), ToolGroup::Edit);
        assert!(parsed[1].options().is_some());
    }

    #[tokio::test]
    async fn test_create_and_get_custom_mode() {
        let registry = registry();
        registry.create_mode(custom("docs")).await.unwrap();

        let mode = registry.get_mode("docs").await.unwrap().unwrap();
        assert_eq!(mode.name, "docs mode");
        assert!(registry.is_custom_mode("docs").await.unwrap());
        assert!(!registry.is_custom_mode("code").await.unwrap());

        let all = registry.get_all_modes().await.unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[5].slug, "docs");
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let registry = registry();
        registry.create_mode(custom("docs")).await.unwrap();
        let err = registry.create_mode(custom("docs")).await.unwrap_err();
        assert!(matches!(err, AgentError::ModeAlreadyExists { slug } if slug == "docs"));
    }

    #[tokio::test]
    async fn test_create_with_builtin_slug_overrides() {
        let registry = registry();
        registry.create_mode(custom("ask")).await.unwrap();

        let all = registry.get_all_modes().await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[2].name, "ask mode");
        assert_eq!(registry.get_mode("ask").await.unwrap().unwrap().name, "ask mode");
    }

    #[tokio::test]
    async fn test_update_builtin_creates_override() {
        let registry = registry();
        registry
            .update_mode(
                "code",
                ModePatch {
                    custom_instructions: Some("Prefer small commits.".into()),
                    ..ModePatch::default()
                },
            )
            .await
            .unwrap();

        let mode = registry.get_mode("code").await.unwrap().unwrap();
        assert_eq!(mode.custom_instructions.as_deref(), Some("Prefer small commits."));
        assert_eq!(mode.role_definition, builtin_modes()[0].role_definition);
        assert!(registry.is_custom_mode("code").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_existing_custom_merges_in_place() {
        let registry = registry();
        registry.create_mode(custom("docs")).await.unwrap();
        registry.create_mode(custom("review")).await.unwrap();
        registry
            .update_mode(
                "docs",
                ModePatch {
                    name: Some("Docs".into()),
                    ..ModePatch::default()
                },
            )
            .await
            .unwrap();

        let overlay = registry.custom_modes().await.unwrap();
        assert_eq!(overlay[0].name, "Docs");
        assert_eq!(overlay[0].groups, custom("docs").groups);
        assert_eq!(overlay[1].slug, "review");
    }

    #[tokio::test]
    async fn test_update_unknown_mode_fails() {
        let err = registry()
            .update_mode("nope", ModePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let registry = registry();
        let err = registry.delete_mode("debug").await.unwrap_err();
        assert!(matches!(err, AgentError::BuiltinModeProtected { .. }));

        registry.create_mode(custom("docs")).await.unwrap();
        registry.delete_mode("docs").await.unwrap();
        registry.delete_mode("never-existed").await.unwrap();
        assert!(registry.get_mode("docs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_registries_share_store() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let first = ModeRegistry::new(storage.clone());
        let second = ModeRegistry::new(storage);
        first.create_mode(custom("docs")).await.unwrap();
        assert!(second.get_mode("docs").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mode_groups() {
        let registry = registry();
        assert_eq!(registry.get_mode_groups("ask").await.unwrap().len(), 1);
        assert!(registry.get_mode_groups("missing").await.unwrap().is_empty());
    }
}
