use crate::store::{Actor, TransitionInput};
use accord_core::{AccordError, Agreement, AgreementStatus, DisputeRound, WorkflowAction};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Write the status change plus bookkeeping every transition shares.
pub(crate) fn record_transition(
    agreement: &mut Agreement,
    target: AgreementStatus,
    action: WorkflowAction,
    actor_id: &str,
    reason: Option<String>,
    now: DateTime<Utc>,
) {
    agreement.state_history.push(accord_core::StateChange {
        from: agreement.status,
        to: target,
        action,
        actor_id: actor_id.to_string(),
        occurred_at: now,
        reason,
    });
    agreement.status = target;
    agreement.revision += 1;
    agreement.updated_at = now;
}

/// Apply one workflow action's side effects, then the status change itself.
///
/// Callers have already validated the transition against the catalog and the
/// revision check; this only mutates. Signature, deletion, and copy actions
/// take their own paths through the store.
pub(crate) fn apply_workflow_action(
    agreement: &mut Agreement,
    target: AgreementStatus,
    action: WorkflowAction,
    actor: &Actor,
    input: &TransitionInput,
    now: DateTime<Utc>,
) -> Result<(), AccordError> {
    match action {
        WorkflowAction::SendForSignature => {
            if let Some(days) = input.expiration_days {
                agreement.expires_at = Some(now + Duration::days(days));
            }
        }

        WorkflowAction::WithdrawOffer
        | WorkflowAction::Reject
        | WorkflowAction::Terminate
        | WorkflowAction::EscalateLegal
        | WorkflowAction::MarkSettled
        | WorkflowAction::MarkTerminated => {}

        WorkflowAction::RequestCompletion => {
            agreement.completion_requested_by = Some(actor.user_id.clone());
        }
        WorkflowAction::ConfirmCompletion | WorkflowAction::RejectCompletion => {
            agreement.completion_requested_by = None;
        }

        WorkflowAction::RequestAmendment => {
            agreement.amendment_proposed_by = Some(actor.user_id.clone());
        }
        WorkflowAction::AcceptAmendment => {
            // Amendments invalidate prior signatures; everyone signs the new
            // version. Rejection and cancellation below intentionally do not.
            agreement.amendment_proposed_by = None;
            agreement.signatures.clear();
            agreement.version += 1;
        }
        WorkflowAction::RejectAmendment | WorkflowAction::CancelAmendment => {
            agreement.amendment_proposed_by = None;
        }

        WorkflowAction::ReportBreach => {
            agreement.breach_reported_by = Some(actor.user_id.clone());
        }
        WorkflowAction::WithdrawBreach => {
            agreement.breach_reported_by = None;
            agreement.dispute_rejection_attempts = 0;
        }
        WorkflowAction::AcknowledgeBreach => {
            // Acknowledging routes straight into completion; the acknowledging
            // party becomes the requester so the reporter confirms.
            agreement.breach_reported_by = None;
            agreement.completion_requested_by = Some(actor.user_id.clone());
        }
        WorkflowAction::DisputeBreach => {
            agreement.dispute_rejection_attempts =
                agreement.dispute_rejection_attempts.saturating_add(1);
        }

        WorkflowAction::AcceptResolution => {
            agreement.has_proposed_resolution = false;
            agreement.breach_reported_by = None;
            agreement.dispute_rejection_attempts = 0;
        }
        WorkflowAction::SubmitCounterProposal => {
            let iteration = agreement.dispute_history.len() as u32 + 1;
            agreement.dispute_history.push(DisputeRound {
                id: Uuid::new_v4().to_string(),
                iteration,
                proposed_by: actor.user_id.clone(),
                proposed_at: now,
                proposal: input
                    .details
                    .clone()
                    .or_else(|| input.reason.clone())
                    .unwrap_or_default(),
            });
            agreement.has_proposed_resolution = true;
        }

        WorkflowAction::Sign
        | WorkflowAction::Delete
        | WorkflowAction::ResendExpired
        | WorkflowAction::Expire
        | WorkflowAction::AutoEscalate => {
            return Err(AccordError::TransitionDenied(format!(
                "action '{action}' is not applied through the workflow path"
            )));
        }
    }

    record_transition(
        agreement,
        target,
        action,
        &actor.user_id,
        input.reason.clone(),
        now,
    );
    Ok(())
}
