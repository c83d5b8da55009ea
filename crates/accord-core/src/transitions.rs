use crate::actions::{available_actions, AvailableActions};
use crate::status::{AgreementStatus, BadgeVariant};
use crate::types::{Agreement, UserContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every named action that can move an agreement between states, plus the
/// system actions the sweep attributes its writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    SendForSignature,
    Delete,
    WithdrawOffer,
    Sign,
    Reject,
    RequestAmendment,
    RequestCompletion,
    ReportBreach,
    Terminate,
    AcceptAmendment,
    RejectAmendment,
    CancelAmendment,
    ConfirmCompletion,
    RejectCompletion,
    WithdrawBreach,
    AcknowledgeBreach,
    DisputeBreach,
    EscalateLegal,
    AcceptResolution,
    SubmitCounterProposal,
    MarkSettled,
    MarkTerminated,
    ResendExpired,
    // System actions, never offered in the catalog.
    Expire,
    AutoEscalate,
}

impl WorkflowAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendForSignature => "send",
            Self::Delete => "delete",
            Self::WithdrawOffer => "withdraw",
            Self::Sign => "sign",
            Self::Reject => "reject",
            Self::RequestAmendment => "request-amendment",
            Self::RequestCompletion => "request-completion",
            Self::ReportBreach => "report-breach",
            Self::Terminate => "terminate",
            Self::AcceptAmendment => "accept-amendment",
            Self::RejectAmendment => "reject-amendment",
            Self::CancelAmendment => "cancel-amendment",
            Self::ConfirmCompletion => "confirm-completion",
            Self::RejectCompletion => "reject-completion",
            Self::WithdrawBreach => "withdraw-breach",
            Self::AcknowledgeBreach => "acknowledge-breach",
            Self::DisputeBreach => "dispute-breach",
            Self::EscalateLegal => "escalate-legal",
            Self::AcceptResolution => "accept-resolution",
            Self::SubmitCounterProposal => "counter-proposal",
            Self::MarkSettled => "mark-settled",
            Self::MarkTerminated => "mark-terminated",
            Self::ResendExpired => "resend-expired",
            Self::Expire => "expire",
            Self::AutoEscalate => "auto-escalate",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edge out of the current state, offered to this user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub target: AgreementStatus,
    pub action: WorkflowAction,
    pub label: String,
    /// Structural gate only: the caller validates the input's content.
    pub requires_input: bool,
    pub confirmation: Option<String>,
}

/// Outcome of validating a proposed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl TransitionCheck {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn denied(from: AgreementStatus, target: AgreementStatus) -> Self {
        Self {
            allowed: false,
            reason: Some(format!("Cannot transition from {from} to {target}")),
        }
    }
}

/// The single suggested "big button" for the current state. UI affordance
/// only; never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryAction {
    pub label: String,
    pub action: WorkflowAction,
    pub variant: BadgeVariant,
    pub icon: String,
}

fn edge(
    target: AgreementStatus,
    action: WorkflowAction,
    label: &str,
    requires_input: bool,
    confirmation: Option<&str>,
) -> Transition {
    Transition {
        target,
        action,
        label: label.to_string(),
        requires_input,
        confirmation: confirmation.map(str::to_string),
    }
}

/// Every state transition available from the current state, derived from the
/// permission calculation so the two can never drift apart.
pub fn available_transitions(
    agreement: &Agreement,
    user: &UserContext,
    now: DateTime<Utc>,
) -> Vec<Transition> {
    let actions = available_actions(agreement, user, now);
    transitions_for(agreement.status, &actions)
}

/// Fixed `(status, flag) -> target` table shared by the catalog and the
/// validation gate.
pub(crate) fn transitions_for(
    status: AgreementStatus,
    actions: &AvailableActions,
) -> Vec<Transition> {
    let mut transitions = Vec::new();

    match status {
        AgreementStatus::Draft => {
            if actions.can_send_for_signature {
                transitions.push(edge(
                    AgreementStatus::PendingSignature,
                    WorkflowAction::SendForSignature,
                    "Send for Signature",
                    true,
                    None,
                ));
            }
            if actions.can_delete {
                transitions.push(edge(
                    AgreementStatus::Cancelled,
                    WorkflowAction::Delete,
                    "Delete Draft",
                    false,
                    Some("Are you sure? This will permanently delete the agreement."),
                ));
            }
        }

        AgreementStatus::PendingSignature => {
            if actions.can_withdraw_offer {
                transitions.push(edge(
                    AgreementStatus::Withdrawn,
                    WorkflowAction::WithdrawOffer,
                    "Withdraw Offer",
                    true,
                    Some("This will cancel the signature request. The agreement can be resent later."),
                ));
            }
            if actions.can_sign {
                transitions.push(edge(
                    AgreementStatus::Active,
                    WorkflowAction::Sign,
                    "Sign Agreement",
                    false,
                    None,
                ));
            }
            if actions.can_reject {
                transitions.push(edge(
                    AgreementStatus::Rejected,
                    WorkflowAction::Reject,
                    "Reject Agreement",
                    true,
                    Some("This will reject the agreement. The creator will be notified."),
                ));
            }
        }

        AgreementStatus::Active => {
            if actions.can_request_amendment {
                transitions.push(edge(
                    AgreementStatus::PendingAmendment,
                    WorkflowAction::RequestAmendment,
                    "Request Amendment",
                    true,
                    None,
                ));
            }
            if actions.can_request_completion {
                transitions.push(edge(
                    AgreementStatus::PendingCompletion,
                    WorkflowAction::RequestCompletion,
                    "Request Completion",
                    false,
                    None,
                ));
            }
            if actions.can_report_breach {
                transitions.push(edge(
                    AgreementStatus::BreachReported,
                    WorkflowAction::ReportBreach,
                    "Report Breach",
                    true,
                    Some("This will notify the other party of a breach. Provide details."),
                ));
            }
            if actions.can_terminate {
                transitions.push(edge(
                    AgreementStatus::Cancelled,
                    WorkflowAction::Terminate,
                    "Terminate Agreement",
                    true,
                    Some("This will cancel the agreement. This action cannot be undone."),
                ));
            }
        }

        AgreementStatus::PendingAmendment => {
            if actions.can_accept_amendment {
                transitions.push(edge(
                    AgreementStatus::PendingSignature,
                    WorkflowAction::AcceptAmendment,
                    "Accept Amendment",
                    false,
                    None,
                ));
            }
            if actions.can_reject_amendment {
                transitions.push(edge(
                    AgreementStatus::Active,
                    WorkflowAction::RejectAmendment,
                    "Reject Amendment",
                    true,
                    None,
                ));
            }
            if actions.can_cancel_amendment_request {
                transitions.push(edge(
                    AgreementStatus::Active,
                    WorkflowAction::CancelAmendment,
                    "Cancel Amendment Request",
                    false,
                    None,
                ));
            }
        }

        AgreementStatus::PendingCompletion => {
            if actions.can_confirm_completion {
                transitions.push(edge(
                    AgreementStatus::Completed,
                    WorkflowAction::ConfirmCompletion,
                    "Confirm Completion",
                    false,
                    None,
                ));
            }
            if actions.can_reject_completion {
                transitions.push(edge(
                    AgreementStatus::Active,
                    WorkflowAction::RejectCompletion,
                    "Reject Completion",
                    true,
                    None,
                ));
            }
        }

        AgreementStatus::BreachReported => {
            if actions.can_withdraw_breach_report {
                transitions.push(edge(
                    AgreementStatus::Active,
                    WorkflowAction::WithdrawBreach,
                    "Withdraw Breach Report",
                    false,
                    None,
                ));
            }
            if actions.can_acknowledge_breach {
                transitions.push(edge(
                    AgreementStatus::PendingCompletion,
                    WorkflowAction::AcknowledgeBreach,
                    "Acknowledge Breach",
                    false,
                    None,
                ));
            }
            if actions.can_dispute_rejection {
                transitions.push(edge(
                    AgreementStatus::InDispute,
                    WorkflowAction::DisputeBreach,
                    "Dispute Breach Claim",
                    true,
                    None,
                ));
            }
            if actions.can_escalate_immediately || actions.can_escalate_to_legal {
                transitions.push(edge(
                    AgreementStatus::LegalResolution,
                    WorkflowAction::EscalateLegal,
                    "Escalate to Legal",
                    true,
                    Some("This will freeze the agreement and escalate to legal resolution."),
                ));
            }
        }

        AgreementStatus::InDispute => {
            if actions.can_escalate_to_legal {
                transitions.push(edge(
                    AgreementStatus::LegalResolution,
                    WorkflowAction::EscalateLegal,
                    "Escalate to Legal Resolution",
                    true,
                    Some("Maximum iterations reached. Escalate to legal process?"),
                ));
            }
            if actions.can_accept_resolution {
                transitions.push(edge(
                    AgreementStatus::Active,
                    WorkflowAction::AcceptResolution,
                    "Accept Resolution",
                    false,
                    None,
                ));
            }
        }

        AgreementStatus::LegalResolution => {
            if actions.can_submit_counter_proposal {
                transitions.push(edge(
                    AgreementStatus::InDispute,
                    WorkflowAction::SubmitCounterProposal,
                    "Submit Counter Proposal",
                    true,
                    None,
                ));
            }
            if actions.can_mark_settled {
                transitions.push(edge(
                    AgreementStatus::Completed,
                    WorkflowAction::MarkSettled,
                    "Mark as Settled",
                    true,
                    Some("Mark this dispute as settled and complete the agreement?"),
                ));
            }
            if actions.can_mark_terminated {
                transitions.push(edge(
                    AgreementStatus::Cancelled,
                    WorkflowAction::MarkTerminated,
                    "Mark as Terminated",
                    true,
                    Some("Mark this dispute as terminated and cancel the agreement?"),
                ));
            }
        }

        AgreementStatus::Expired => {
            if actions.can_resend_expired {
                transitions.push(edge(
                    AgreementStatus::Draft,
                    WorkflowAction::ResendExpired,
                    "Resend as New Agreement",
                    true,
                    None,
                ));
            }
        }

        AgreementStatus::Completed
        | AgreementStatus::Rejected
        | AgreementStatus::Withdrawn
        | AgreementStatus::Cancelled => {}
    }

    transitions
}

/// The single authoritative gate before a status write. Collaborators must
/// consult this rather than constructing a status write directly.
pub fn can_transition_to(
    agreement: &Agreement,
    user: &UserContext,
    target: AgreementStatus,
    now: DateTime<Utc>,
) -> TransitionCheck {
    let transitions = available_transitions(agreement, user, now);
    if transitions.iter().any(|transition| transition.target == target) {
        TransitionCheck::allowed()
    } else {
        TransitionCheck::denied(agreement.status, target)
    }
}

/// Pick the highest-priority transition for the current state.
pub fn primary_action(
    agreement: &Agreement,
    user: &UserContext,
    now: DateTime<Utc>,
) -> Option<PrimaryAction> {
    let actions = available_actions(agreement, user, now);

    if actions.can_send_for_signature {
        return Some(PrimaryAction {
            label: "Send for Signature".to_string(),
            action: WorkflowAction::SendForSignature,
            variant: BadgeVariant::Default,
            icon: "send".to_string(),
        });
    }
    if actions.can_sign {
        return Some(PrimaryAction {
            label: "Review & Sign".to_string(),
            action: WorkflowAction::Sign,
            variant: BadgeVariant::Default,
            icon: "pen".to_string(),
        });
    }
    if actions.can_accept_amendment {
        return Some(PrimaryAction {
            label: "Review Amendment".to_string(),
            action: WorkflowAction::AcceptAmendment,
            variant: BadgeVariant::Default,
            icon: "file-diff".to_string(),
        });
    }
    if actions.can_confirm_completion {
        return Some(PrimaryAction {
            label: "Confirm Completion".to_string(),
            action: WorkflowAction::ConfirmCompletion,
            variant: BadgeVariant::Default,
            icon: "check-circle".to_string(),
        });
    }
    if actions.can_request_completion {
        return Some(PrimaryAction {
            label: "Request Completion".to_string(),
            action: WorkflowAction::RequestCompletion,
            variant: BadgeVariant::Default,
            icon: "flag".to_string(),
        });
    }
    if actions.can_resend_expired {
        return Some(PrimaryAction {
            label: "Resend Agreement".to_string(),
            action: WorkflowAction::ResendExpired,
            variant: BadgeVariant::Secondary,
            icon: "refresh".to_string(),
        });
    }

    None
}
