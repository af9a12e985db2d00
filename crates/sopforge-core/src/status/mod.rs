//! Workflow lifecycle status flow engine.
//!
//! The lifecycle runs `draft → worker_done → expert_done → analyzed →
//! confirmed → delivered`. Every non-terminal state may move forward to
//! its successor or backward to its predecessor; there is no skipping.
//!
//! One table carries label, color and both neighbors per status so the
//! presentation metadata and the transition graph cannot drift apart.
//! Everything here is a pure function of the current status; persisting
//! the result (and bumping `updated_at`) is the caller's job.

use serde::Serialize;

use crate::models::workflow::WorkflowStatus;

/// Per-status row of the flow table.
#[derive(Debug, Clone, Copy)]
pub struct FlowEntry {
    pub label: &'static str,
    pub color: &'static str,
    pub forward: Option<WorkflowStatus>,
    pub backward: Option<WorkflowStatus>,
}

const fn entry(status: WorkflowStatus) -> FlowEntry {
    use WorkflowStatus::*;
    match status {
        Draft => FlowEntry {
            label: "Draft",
            color: "slate",
            forward: Some(WorkerDone),
            backward: None,
        },
        WorkerDone => FlowEntry {
            label: "Awaiting expert review",
            color: "amber",
            forward: Some(ExpertDone),
            backward: Some(Draft),
        },
        ExpertDone => FlowEntry {
            label: "Awaiting AI analysis",
            color: "blue",
            forward: Some(Analyzed),
            backward: Some(WorkerDone),
        },
        Analyzed => FlowEntry {
            label: "Awaiting confirmation",
            color: "purple",
            forward: Some(Confirmed),
            backward: Some(ExpertDone),
        },
        Confirmed => FlowEntry {
            label: "Confirmed",
            color: "emerald",
            forward: Some(Delivered),
            backward: Some(Analyzed),
        },
        Delivered => FlowEntry {
            label: "Delivered",
            color: "green",
            forward: None,
            backward: Some(Confirmed),
        },
    }
}

impl WorkflowStatus {
    /// Display label for this status.
    pub fn label(&self) -> &'static str {
        entry(*self).label
    }

    /// Display color key for this status.
    pub fn color(&self) -> &'static str {
        entry(*self).color
    }

    /// The next status in the forward-only flow, if any.
    pub fn forward(&self) -> Option<WorkflowStatus> {
        entry(*self).forward
    }

    /// The previous status in the flow, if any.
    pub fn backward(&self) -> Option<WorkflowStatus> {
        entry(*self).backward
    }

    /// Statuses this one may transition to (backward first, then forward).
    pub fn allowed_transitions(&self) -> Vec<WorkflowStatus> {
        let e = entry(*self);
        e.backward.into_iter().chain(e.forward).collect()
    }
}

/// Status lookup result: current status plus its presentation metadata
/// and the legal transitions out of it.
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub status: WorkflowStatus,
    pub label: &'static str,
    pub color: &'static str,
    pub allowed_transitions: Vec<WorkflowStatus>,
}

/// Pure lookup of a workflow's status presentation and legal moves.
pub fn status_info(status: WorkflowStatus) -> StatusInfo {
    StatusInfo {
        status,
        label: status.label(),
        color: status.color(),
        allowed_transitions: status.allowed_transitions(),
    }
}

/// A requested transition that is not in the current status's allowed set.
/// Carries the legal alternatives so callers can surface them verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionRejection {
    pub error: String,
    pub allowed_transitions: Vec<WorkflowStatus>,
}

/// Validate an explicit transition request against the bidirectional table.
///
/// Returns the new status on success. On rejection nothing is mutated;
/// the caller relays the rejection as a domain-level outcome, not an error.
pub fn transition(
    current: WorkflowStatus,
    requested: WorkflowStatus,
) -> Result<WorkflowStatus, TransitionRejection> {
    let allowed = current.allowed_transitions();
    if allowed.contains(&requested) {
        Ok(requested)
    } else {
        Err(TransitionRejection {
            error: format!(
                "transition from '{}' to '{}' is not allowed",
                current.label(),
                requested.label()
            ),
            allowed_transitions: allowed,
        })
    }
}

/// Why a strict forward/backward move could not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("already at final status")]
    AtTerminal,
    #[error("already at initial status")]
    AtInitial,
}

/// Move strictly forward one step in the flow.
pub fn advance(current: WorkflowStatus) -> Result<WorkflowStatus, FlowError> {
    current.forward().ok_or(FlowError::AtTerminal)
}

/// Move strictly backward one step in the flow.
pub fn rollback(current: WorkflowStatus) -> Result<WorkflowStatus, FlowError> {
    current.backward().ok_or(FlowError::AtInitial)
}
