//! Approval gates: who decides whether a tool call may run.
//!
//! - [`AutoApprovalGate`] approves everything.
//! - [`PolicyApprovalGate`] approves by tool category up to a budget, then
//!   defers to an inner gate.
//! - [`ChannelApprovalGate`] forwards each request to a front end over a
//!   channel and waits for its answer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::tool_groups::{group_of, ToolGroup, ALWAYS_AVAILABLE_TOOLS};

// ─── Types ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub tool: String,
    pub params: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApprovalRequest {
    pub fn new(tool: impl Into<String>, params: HashMap<String, String>) -> Self {
        Self {
            tool: tool.into(),
            params,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalResult {
    Approved,
    Denied { reason: String },
}

impl ApprovalResult {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResult;
}

// ─── AutoApprovalGate ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprovalGate;

#[async_trait]
impl ApprovalGate for AutoApprovalGate {
    async fn request_approval(&self, _request: &ApprovalRequest) -> ApprovalResult {
        ApprovalResult::Approved
    }
}

// ─── PolicyApprovalGate ─────────────────────────────────────────────────────

/// Which tool categories are approved without asking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalPolicy {
    pub auto_approve_reads: bool,
    pub auto_approve_edits: bool,
    pub auto_approve_commands: bool,
    /// `use_mcp_tool` calls whose `server_name` is listed here are approved.
    pub auto_approve_mcp_servers: Vec<String>,
    /// Auto-approvals granted before every request goes to the inner gate.
    pub max_auto_approvals: Option<u32>,
}

impl ApprovalPolicy {
    fn allows(&self, request: &ApprovalRequest) -> bool {
        if ALWAYS_AVAILABLE_TOOLS.contains(&request.tool.as_str()) {
            return true;
        }
        match group_of(&request.tool) {
            Some(ToolGroup::Read) => self.auto_approve_reads,
            Some(ToolGroup::Edit) => self.auto_approve_edits,
            Some(ToolGroup::Command) => self.auto_approve_commands,
            Some(ToolGroup::Mcp) if request.tool == "use_mcp_tool" => request
                .params
                .get("server_name")
                .is_some_and(|server| self.auto_approve_mcp_servers.contains(server)),
            _ => false,
        }
    }
}

/// Applies an [`ApprovalPolicy`] before deferring to `inner`.
///
/// Every auto-approval, meta tools included, counts against
/// `max_auto_approvals`. Once the budget is spent all requests are deferred
/// until [`reset_counter`](Self::reset_counter).
pub struct PolicyApprovalGate<G> {
    inner: G,
    policy: ApprovalPolicy,
    auto_approvals: AtomicU32,
}

impl<G: ApprovalGate> PolicyApprovalGate<G> {
    pub fn new(inner: G, policy: ApprovalPolicy) -> Self {
        Self {
            inner,
            policy,
            auto_approvals: AtomicU32::new(0),
        }
    }

    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    pub fn auto_approval_count(&self) -> u32 {
        self.auto_approvals.load(Ordering::SeqCst)
    }

    pub fn reset_counter(&self) {
        self.auto_approvals.store(0, Ordering::SeqCst);
    }

    fn budget_spent(&self) -> bool {
        self.policy
            .max_auto_approvals
            .is_some_and(|max| self.auto_approval_count() >= max)
    }
}

#[async_trait]
impl<G: ApprovalGate> ApprovalGate for PolicyApprovalGate<G> {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResult {
        if self.budget_spent() {
            tracing::debug!(tool = %request.tool, "auto-approval budget spent, deferring");
            return self.inner.request_approval(request).await;
        }
        if self.policy.allows(request) {
            let count = self.auto_approvals.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(tool = %request.tool, count, "tool auto-approved by policy");
            return ApprovalResult::Approved;
        }
        self.inner.request_approval(request).await
    }
}

// ─── ChannelApprovalGate ────────────────────────────────────────────────────

/// A request waiting for a decision from the front end.
#[derive(Debug)]
pub struct PendingApproval {
    pub request: ApprovalRequest,
    pub respond: oneshot::Sender<ApprovalResult>,
}

/// Sends each request to whoever holds the receiving end and waits for the
/// reply. Dropping either the receiver or the responder denies the call.
#[derive(Debug, Clone)]
pub struct ChannelApprovalGate {
    tx: mpsc::Sender<PendingApproval>,
}

impl ChannelApprovalGate {
    pub fn new(tx: mpsc::Sender<PendingApproval>) -> Self {
        Self { tx }
    }

    /// A gate plus the receiver the front end reads requests from.
    ///
    /// A `buffer` of zero is raised to one.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<PendingApproval>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

const CHANNEL_CLOSED: &str = "approval channel closed";

#[async_trait]
impl ApprovalGate for ChannelApprovalGate {
    async fn request_approval(&self, request: &ApprovalRequest) -> ApprovalResult {
        let (respond, response) = oneshot::channel();
        let pending = PendingApproval {
            request: request.clone(),
            respond,
        };
        if self.tx.send(pending).await.is_err() {
            tracing::warn!(tool = %request.tool, "failed to send approval request");
            return ApprovalResult::denied(CHANNEL_CLOSED);
        }
        match response.await {
            Ok(result) => {
                tracing::info!(
                    tool = %request.tool,
                    approved = result.is_approved(),
                    "approval decision received"
                );
                result
            }
            Err(_) => {
                tracing::warn!(tool = %request.tool, "approval responder dropped");
                ApprovalResult::denied(CHANNEL_CLOSED)
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
