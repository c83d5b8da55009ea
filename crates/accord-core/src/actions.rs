use crate::status::AgreementStatus;
use crate::types::{Agreement, UserContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Negotiation rounds allowed inside a dispute before escalation is the only
/// remaining path.
pub const MAX_DISPUTE_ITERATIONS: usize = 5;

/// Times a breach respondent may dispute the claim before the option closes.
pub const MAX_DISPUTE_REJECTION_ATTEMPTS: u8 = 2;

/// Human-readable explanations for withheld capabilities.
///
/// Advisory only: a reason never gates a flag, and a flag can be false with
/// no reason recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledReasons {
    pub cannot_edit: Option<String>,
    pub cannot_sign: Option<String>,
    pub cannot_send_for_signature: Option<String>,
    pub cannot_request_completion: Option<String>,
    pub cannot_request_amendment: Option<String>,
    pub cannot_withdraw: Option<String>,
    pub cannot_terminate: Option<String>,
}

/// Time-sensitive notices. Never gate an action flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warnings {
    pub expiration: Option<String>,
    pub overdue: Option<String>,
    pub iteration_limit: Option<String>,
}

/// Everything the caller may do with one agreement, for one user, right now.
///
/// Recomputed on every call and never stored. Flags default to false; the
/// universal flags (`can_duplicate`, `can_export_pdf`, `can_view_history`)
/// and the party-scoped view flags are the only defaults set up front.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailableActions {
    // Draft phase (creator only).
    pub can_edit: bool,
    pub can_send_for_signature: bool,
    pub can_set_expiration: bool,
    pub can_cancel_draft: bool,
    pub can_delete: bool,

    // Signature phase.
    pub can_sign: bool,
    pub can_creator_sign: bool,
    pub can_reject: bool,
    pub can_withdraw_offer: bool,
    pub can_cancel: bool,
    pub can_resend: bool,

    // Active phase.
    pub can_request_completion: bool,
    pub can_confirm_completion: bool,
    pub can_reject_completion: bool,
    pub can_request_amendment: bool,
    pub can_terminate: bool,
    pub can_report_breach: bool,
    pub can_withdraw_breach_report: bool,

    // Amendment phase.
    pub can_accept_amendment: bool,
    pub can_reject_amendment: bool,
    pub can_counter_propose_amendment: bool,
    pub can_cancel_amendment_request: bool,
    pub can_revise_amendment: bool,
    pub can_discuss_amendment: bool,

    // Breach/dispute phase.
    pub can_provide_evidence: bool,
    pub can_provide_counter_evidence: bool,
    pub can_dispute_rejection: bool,
    pub can_acknowledge_breach: bool,
    pub can_escalate_immediately: bool,
    pub can_escalate_to_legal: bool,
    pub can_propose_resolution: bool,
    pub can_accept_resolution: bool,
    pub can_request_mediation: bool,

    // Legal resolution phase.
    pub can_submit_counter_proposal: bool,
    pub can_mark_settled: bool,
    pub can_mark_terminated: bool,
    pub can_upload_legal_documents: bool,

    // Expired state.
    pub can_resend_expired: bool,

    // Universal actions.
    pub can_duplicate: bool,
    pub can_view_audit: bool,
    pub can_download_receipt: bool,
    pub can_export_pdf: bool,
    pub can_add_comments: bool,
    pub can_view_history: bool,
    pub can_view_versions: bool,

    pub reasons: DisabledReasons,
    pub warnings: Warnings,
}

/// Compute every capability flag for this user on this agreement.
///
/// Pure and total: callers with no standing fall through to the defaults, an
/// unexpected state produces an all-false set, nothing here panics or does
/// I/O. `now` is threaded explicitly so evaluation is deterministic.
pub fn available_actions(
    agreement: &Agreement,
    user: &UserContext,
    now: DateTime<Utc>,
) -> AvailableActions {
    let status = agreement.status;
    let counterparty_signatures = agreement.counterparty_signature_count();
    let creator_signed = agreement.creator_signed();

    let is_expired = agreement.is_expired(now);
    let days_until_expiration = agreement.expires_at.and_then(|deadline| {
        let remaining = deadline.signed_duration_since(now).num_seconds();
        (remaining > 0).then(|| (remaining + 86_399) / 86_400)
    });

    let dispute_iterations = agreement.dispute_iterations();

    let user_proposed_amendment =
        agreement.amendment_proposed_by.as_deref() == Some(user.user_id.as_str());
    let user_requested_completion =
        agreement.completion_requested_by.as_deref() == Some(user.user_id.as_str());
    let user_reported_breach =
        agreement.breach_reported_by.as_deref() == Some(user.user_id.as_str());

    // Signing is at-most-once per role: once a counterparty signature exists
    // for this identity, no branch below may re-grant `can_sign`.
    let may_sign_as_counterparty = user.is_counterparty && !user.has_signed_as_counterparty;

    let mut actions = AvailableActions {
        can_duplicate: true,
        can_view_audit: user.is_binding_party(),
        can_export_pdf: true,
        can_add_comments: user.is_binding_party(),
        can_view_history: true,
        can_view_versions: agreement.version > 1,
        ..AvailableActions::default()
    };

    if let Some(days) = days_until_expiration {
        if days <= 1 {
            actions.warnings.expiration = Some("Expires in 1 day".to_string());
        } else if days <= 7 {
            actions.warnings.expiration = Some(format!("Expires in {days} days"));
        }
    }

    if matches!(
        status,
        AgreementStatus::InDispute | AgreementStatus::BreachReported
    ) {
        if dispute_iterations >= MAX_DISPUTE_ITERATIONS - 1 {
            actions.warnings.iteration_limit = Some(format!(
                "{dispute_iterations} of {MAX_DISPUTE_ITERATIONS} iterations used - legal resolution next"
            ));
        } else if dispute_iterations >= MAX_DISPUTE_ITERATIONS - 2 {
            actions.warnings.iteration_limit = Some(format!(
                "{dispute_iterations} of {MAX_DISPUTE_ITERATIONS} iterations used"
            ));
        }
    }

    match status {
        AgreementStatus::Draft => {
            if user.is_creator {
                actions.can_edit = true;
                actions.can_set_expiration = true;
                actions.can_send_for_signature = !agreement.shared_with.is_empty();
                actions.can_cancel_draft = true;
                actions.can_delete = true;

                if !actions.can_send_for_signature {
                    actions.reasons.cannot_send_for_signature =
                        Some("Add at least one counterparty first".to_string());
                }
            }
        }

        AgreementStatus::PendingSignature => {
            if is_expired {
                // The row may not have been swept yet; treat it as expired.
                actions.reasons.cannot_sign = Some("This agreement has expired".to_string());
                actions.warnings.overdue = Some("Signature deadline has passed".to_string());
            }

            if user.is_creator {
                actions.can_withdraw_offer = counterparty_signatures == 0;
                actions.can_cancel = counterparty_signatures == 0;
                actions.can_resend = !is_expired;
                actions.can_delete = true;

                if counterparty_signatures > 0 {
                    actions.reasons.cannot_withdraw =
                        Some("Counterparty has already signed".to_string());
                }
                if is_expired {
                    actions.reasons.cannot_withdraw =
                        Some("Agreement has expired".to_string());
                }
            }

            if may_sign_as_counterparty {
                actions.can_sign = !is_expired;
                actions.can_reject = !is_expired;
            } else if user.has_signed_as_counterparty {
                actions.reasons.cannot_sign =
                    Some("You have already signed this agreement".to_string());
            }
        }

        AgreementStatus::Active => {
            if user.is_creator && !creator_signed {
                actions.can_creator_sign = true;
            }

            if user.is_binding_party() {
                actions.can_request_completion = agreement.completion_requested_by.is_none();
                actions.can_request_amendment = true;
                actions.can_report_breach = agreement.breach_reported_by.is_none();
                actions.can_download_receipt = true;

                if !actions.can_request_completion {
                    actions.reasons.cannot_request_completion = Some(
                        "Completion already requested - awaiting confirmation".to_string(),
                    );
                }
                if !actions.can_report_breach {
                    actions.reasons.cannot_request_amendment = Some(
                        "Cannot amend while breach is being investigated".to_string(),
                    );
                }
            }

            if user.is_creator {
                actions.can_terminate = true;
            }
        }

        AgreementStatus::PendingAmendment => {
            if user.is_creator && !creator_signed {
                actions.can_creator_sign = true;
            }

            actions.can_discuss_amendment = true;

            if user_proposed_amendment {
                actions.can_cancel_amendment_request = true;
                actions.can_revise_amendment = true;
            } else if user.is_binding_party() {
                actions.can_accept_amendment = true;
                actions.can_reject_amendment = true;
                actions.can_counter_propose_amendment = true;
            }
        }

        AgreementStatus::PendingCompletion => {
            if user.is_creator && !creator_signed {
                actions.can_creator_sign = true;
            }

            if user.is_binding_party() {
                // Only the party who did not request completion may settle it.
                if !user_requested_completion {
                    actions.can_confirm_completion = true;
                    actions.can_reject_completion = true;
                } else {
                    actions.reasons.cannot_request_completion =
                        Some("Awaiting confirmation from the other party".to_string());
                }
            }
        }

        AgreementStatus::BreachReported => {
            if user.is_binding_party() {
                actions.can_provide_evidence = true;
                actions.can_escalate_to_legal = dispute_iterations >= 2;

                if user_reported_breach {
                    actions.can_withdraw_breach_report = true;
                    actions.can_escalate_immediately = true;
                } else {
                    actions.can_dispute_rejection = agreement.dispute_rejection_attempts
                        < MAX_DISPUTE_REJECTION_ATTEMPTS;
                    actions.can_acknowledge_breach = true;
                    actions.can_provide_counter_evidence = true;
                }
            }
        }

        AgreementStatus::InDispute => {
            if user.is_binding_party() {
                actions.can_provide_evidence = true;
                actions.can_propose_resolution = dispute_iterations < MAX_DISPUTE_ITERATIONS;
                actions.can_accept_resolution = agreement.has_proposed_resolution;
                actions.can_request_mediation = true;
                actions.can_escalate_to_legal =
                    dispute_iterations >= MAX_DISPUTE_ITERATIONS - 1;

                if dispute_iterations >= MAX_DISPUTE_ITERATIONS {
                    actions.reasons.cannot_request_amendment = Some(
                        "Maximum dispute iterations reached - escalate to legal resolution"
                            .to_string(),
                    );
                }
            }
        }

        AgreementStatus::LegalResolution => {
            actions.can_provide_evidence = true;
            actions.can_upload_legal_documents = user.is_binding_party();

            // Counter-proposals may reopen the dispute while the iteration
            // budget lasts.
            if dispute_iterations < MAX_DISPUTE_ITERATIONS {
                actions.can_submit_counter_proposal = user.is_binding_party();
            }

            if user.is_admin {
                actions.can_mark_settled = true;
                actions.can_mark_terminated = true;
            }

            actions.reasons.cannot_edit =
                Some("Agreement is in legal resolution - frozen state".to_string());
            actions.reasons.cannot_request_completion =
                Some("Agreement is in legal resolution".to_string());
        }

        AgreementStatus::Completed => {
            actions.can_download_receipt = true;
        }

        AgreementStatus::Rejected
        | AgreementStatus::Withdrawn
        | AgreementStatus::Cancelled => {}

        AgreementStatus::Expired => {
            if user.is_creator {
                actions.can_resend_expired = true;
            }
            actions.reasons.cannot_sign = Some("This agreement has expired".to_string());
        }
    }

    actions
}
