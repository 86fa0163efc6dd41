//! `@`-mention tokenizer for user messages.
//!
//! Recognized forms:
//!
//! - `@/path/to/file`: file reference
//! - `@/path/to/folder/`: folder reference (trailing slash)
//! - `@url:https://example.com`: URL reference
//! - `@problems`, `@git-changes`, `@terminal`: workspace context
//!
//! Resolution is delegated to a host-provided [`MentionResolver`].

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(/\S+|url:\S+|problems|git-changes|terminal)").expect("mention pattern is valid")
});

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MentionKind {
    File,
    Folder,
    Url,
    Problems,
    GitChanges,
    Terminal,
}

/// A mention located in the source text. Offsets are byte offsets, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionToken {
    pub kind: MentionKind,
    /// The full matched text including `@`.
    pub raw: String,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

/// Resolved content for one mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionContextBlock {
    pub kind: MentionKind,
    pub label: String,
    pub content: String,
}

/// Host capability that turns mentions into context text.
///
/// `None` means the mention could not be resolved and is dropped.
#[async_trait]
pub trait MentionResolver: Send + Sync {
    async fn resolve_file(&self, path: &str) -> Option<String>;
    async fn resolve_folder(&self, path: &str) -> Option<String>;
    async fn resolve_url(&self, url: &str) -> Option<String>;
    async fn resolve_problems(&self) -> Option<String>;
    async fn resolve_git_changes(&self) -> Option<String>;
    async fn resolve_terminal(&self) -> Option<String>;
}

// ─── Tokenizing ──────────────────────────────────────────────────────────────

/// Find every mention in `text`, left to right.
pub fn parse_mentions(text: &str) -> Vec<MentionToken> {
    MENTION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = caps.get(1)?.as_str();
            let kind = classify(value);
            let value = match kind {
                MentionKind::Url => value.strip_prefix("url:").unwrap_or(value),
                _ => value,
            };
            Some(MentionToken {
                kind,
                raw: whole.as_str().to_string(),
                value: value.to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Remove every mention from `text` and trim the result.
pub fn strip_mentions(text: &str) -> String {
    MENTION_RE.replace_all(text, "").trim().to_string()
}

fn classify(value: &str) -> MentionKind {
    if value.starts_with("url:") {
        MentionKind::Url
    } else if value == "problems" {
        MentionKind::Problems
    } else if value == "git-changes" {
        MentionKind::GitChanges
    } else if value == "terminal" {
        MentionKind::Terminal
    } else if value.ends_with('/') {
        MentionKind::Folder
    } else {
        MentionKind::File
    }
}

/// Resolve tokens in order, dropping the ones the resolver cannot serve.
pub async fn resolve_mentions(
    tokens: &[MentionToken],
    resolver: &dyn MentionResolver,
) -> Vec<MentionContextBlock> {
    let mut blocks = Vec::with_capacity(tokens.len());

    for token in tokens {
        let content = match token.kind {
            MentionKind::File => resolver.resolve_file(&token.value).await,
            MentionKind::Folder => resolver.resolve_folder(&token.value).await,
            MentionKind::Url => resolver.resolve_url(&token.value).await,
            MentionKind::Problems => resolver.resolve_problems().await,
            MentionKind::GitChanges => resolver.resolve_git_changes().await,
            MentionKind::Terminal => resolver.resolve_terminal().await,
        };

        match content {
            Some(content) => blocks.push(MentionContextBlock {
                kind: token.kind,
                label: token.raw.clone(),
                content,
            }),
            None => tracing::debug!(mention = %token.raw, "mention could not be resolved"),
        }
    }

    blocks
}

// ─── Tests ───────────────────────────────────────────────────────────────────
