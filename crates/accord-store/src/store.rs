use crate::apply::{apply_workflow_action, record_transition};
use crate::audit::{AuditEntry, AuditTrail};
use accord_core::{
    available_actions, available_transitions, AccordError, Agreement, AgreementStatus, Signature,
    SignatureRole, UserContext, WorkflowAction,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Actor id the lifecycle sweep attributes its writes to.
pub const SYSTEM_ACTOR: &str = "system";

/// The authenticated caller, as resolved by the session layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub email: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            is_admin: true,
        }
    }
}

/// Caller-supplied input accompanying a workflow action.
///
/// The store only checks presence for `requires_input` transitions; content
/// validation stays with the API layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionInput {
    pub reason: Option<String>,
    pub details: Option<String>,
    pub expiration_days: Option<i64>,
}

impl TransitionInput {
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn details(details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::default()
        }
    }

    pub fn expiration_days(days: i64) -> Self {
        Self {
            expiration_days: Some(days),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reason.is_none() && self.details.is_none() && self.expiration_days.is_none()
    }
}

/// Evidentiary metadata captured alongside a signature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureStamp {
    pub signer_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: Option<String>,
}

/// Versioned in-memory agreement store.
///
/// Every write path re-reads the freshest row inside the write lock,
/// re-derives the caller's context, consults the engine, and
/// compares-and-swaps on `revision`. A losing writer gets
/// `RevisionConflict` and must re-read before retrying.
#[derive(Debug, Default)]
pub struct AgreementStore {
    pub(crate) agreements: RwLock<HashMap<String, Agreement>>,
    pub(crate) audit: RwLock<AuditTrail>,
}

impl AgreementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly drafted agreement.
    pub async fn insert(
        &self,
        agreement: Agreement,
        now: DateTime<Utc>,
    ) -> Result<Agreement, AccordError> {
        let mut agreements = self.agreements.write().await;
        if agreements.contains_key(&agreement.id) {
            return Err(AccordError::AlreadyExists(agreement.id));
        }

        let mut audit = self.audit.write().await;
        audit.append(
            &agreement.id,
            &agreement.creator_id,
            "create",
            format!("agreement '{}' drafted", agreement.title),
            now,
        )?;

        info!(agreement_id = %agreement.id, "agreement drafted");
        agreements.insert(agreement.id.clone(), agreement.clone());
        Ok(agreement)
    }

    pub async fn get(&self, agreement_id: &str) -> Result<Agreement, AccordError> {
        self.agreements
            .read()
            .await
            .get(agreement_id)
            .cloned()
            .ok_or_else(|| AccordError::NotFound(agreement_id.to_string()))
    }

    /// Agreements the actor participates in, as creator or listed party.
    pub async fn list_for(&self, actor: &Actor) -> Vec<Agreement> {
        self.agreements
            .read()
            .await
            .values()
            .filter(|agreement| {
                agreement.creator_id == actor.user_id
                    || agreement.creator_email.eq_ignore_ascii_case(&actor.email)
                    || agreement.shared_with.iter().any(|party| {
                        party.user_id.as_deref() == Some(actor.user_id.as_str())
                            || party.email.eq_ignore_ascii_case(&actor.email)
                    })
            })
            .cloned()
            .collect()
    }

    pub async fn audit_entries(&self, agreement_id: &str) -> Vec<AuditEntry> {
        self.audit
            .read()
            .await
            .entries_for(agreement_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn verify_audit_chain(&self) -> bool {
        self.audit.read().await.verify_chain()
    }

    /// The single write path for workflow actions.
    ///
    /// Consults the transition catalog against the freshest row, so a caller
    /// holding a stale snapshot either loses the revision check or finds the
    /// action no longer offered.
    pub async fn perform(
        &self,
        agreement_id: &str,
        actor: &Actor,
        action: WorkflowAction,
        input: TransitionInput,
        expected_revision: u64,
        now: DateTime<Utc>,
    ) -> Result<Agreement, AccordError> {
        let mut agreements = self.agreements.write().await;
        let current = agreements
            .get(agreement_id)
            .ok_or_else(|| AccordError::NotFound(agreement_id.to_string()))?;

        if current.revision != expected_revision {
            warn!(
                agreement_id,
                expected = expected_revision,
                actual = current.revision,
                "stale write rejected"
            );
            return Err(AccordError::RevisionConflict {
                agreement_id: agreement_id.to_string(),
                expected: expected_revision,
                actual: current.revision,
            });
        }

        let ctx = UserContext::derive(current, &actor.user_id, &actor.email, actor.is_admin);
        let from = current.status;
        let transition = available_transitions(current, &ctx, now)
            .into_iter()
            .find(|transition| transition.action == action)
            .ok_or_else(|| self.denial(current, &ctx, action, now))?;

        if transition.requires_input && input.is_empty() {
            return Err(AccordError::InputRequired {
                action: action.as_str(),
            });
        }

        let updated = match action {
            WorkflowAction::Sign => {
                return Err(AccordError::TransitionDenied(
                    "signatures are recorded through AgreementStore::sign".to_string(),
                ));
            }

            WorkflowAction::Delete => {
                let removed = agreements
                    .remove(agreement_id)
                    .ok_or_else(|| AccordError::NotFound(agreement_id.to_string()))?;
                let mut audit = self.audit.write().await;
                audit.append(
                    agreement_id,
                    &actor.user_id,
                    action.as_str(),
                    "draft hard-deleted",
                    now,
                )?;
                info!(agreement_id, "draft hard-deleted");
                return Ok(removed);
            }

            WorkflowAction::ResendExpired => {
                let source = current.clone();
                let mut copy = draft_copy(&source, &source.creator_id, &source.creator_email, now);
                if let Some(days) = input.expiration_days {
                    copy.expires_at = Some(now + Duration::days(days));
                }

                let mut audit = self.audit.write().await;
                audit.append(
                    agreement_id,
                    &actor.user_id,
                    action.as_str(),
                    format!("resent as new draft '{}'", copy.id),
                    now,
                )?;
                audit.append(
                    &copy.id,
                    &actor.user_id,
                    "create",
                    format!("redrafted from expired agreement '{agreement_id}'"),
                    now,
                )?;

                info!(agreement_id, new_agreement_id = %copy.id, "expired agreement resent");
                agreements.insert(copy.id.clone(), copy.clone());
                copy
            }

            _ => {
                let agreement = agreements
                    .get_mut(agreement_id)
                    .ok_or_else(|| AccordError::NotFound(agreement_id.to_string()))?;
                apply_workflow_action(agreement, transition.target, action, actor, &input, now)?;

                let mut audit = self.audit.write().await;
                audit.append(
                    agreement_id,
                    &actor.user_id,
                    action.as_str(),
                    format!("{from} -> {}", transition.target),
                    now,
                )?;

                info!(
                    agreement_id,
                    action = %action,
                    from = %from,
                    to = %transition.target,
                    "workflow action applied"
                );
                agreement.clone()
            }
        };

        Ok(updated)
    }

    /// Record a signature with its evidentiary metadata.
    ///
    /// The already-signed check runs against the freshest row inside the
    /// write lock, never against the snapshot the caller observed. A
    /// counterparty signature while pending moves the agreement to active.
    pub async fn sign(
        &self,
        agreement_id: &str,
        actor: &Actor,
        role: SignatureRole,
        stamp: SignatureStamp,
        expected_revision: u64,
        now: DateTime<Utc>,
    ) -> Result<Agreement, AccordError> {
        let mut agreements = self.agreements.write().await;
        let agreement = agreements
            .get_mut(agreement_id)
            .ok_or_else(|| AccordError::NotFound(agreement_id.to_string()))?;

        if agreement.has_signed_in_role(&actor.user_id, &actor.email, role) {
            return Err(AccordError::AlreadySigned { role: role.name() });
        }

        if agreement.revision != expected_revision {
            warn!(
                agreement_id,
                expected = expected_revision,
                actual = agreement.revision,
                "stale signature rejected"
            );
            return Err(AccordError::RevisionConflict {
                agreement_id: agreement_id.to_string(),
                expected: expected_revision,
                actual: agreement.revision,
            });
        }

        let ctx = UserContext::derive(agreement, &actor.user_id, &actor.email, actor.is_admin);
        let actions = available_actions(agreement, &ctx, now);
        match role {
            SignatureRole::Counterparty => {
                if !actions.can_sign {
                    let reason = actions.reasons.cannot_sign.unwrap_or_else(|| {
                        format!(
                            "Signing is not available while the agreement is {}",
                            agreement.status
                        )
                    });
                    return Err(AccordError::TransitionDenied(reason));
                }
            }
            SignatureRole::Creator => {
                if !actions.can_creator_sign {
                    return Err(AccordError::action_unavailable("sign", agreement.status));
                }
            }
            SignatureRole::Witness => {
                if !ctx.is_witness || agreement.status.is_terminal() {
                    return Err(AccordError::TransitionDenied(
                        "Witness attestation is not available for this agreement".to_string(),
                    ));
                }
            }
        }

        agreement.signatures.push(Signature {
            id: Uuid::new_v4().to_string(),
            user_id: actor.user_id.clone(),
            user_email: actor.email.clone(),
            user_name: stamp.signer_name,
            role,
            signed_at: now,
            ip_address: stamp.ip_address,
            user_agent: stamp.user_agent,
            location: stamp.location,
        });

        if role == SignatureRole::Counterparty
            && agreement.status == AgreementStatus::PendingSignature
        {
            record_transition(
                agreement,
                AgreementStatus::Active,
                WorkflowAction::Sign,
                &actor.user_id,
                None,
                now,
            );
        } else {
            agreement.revision += 1;
            agreement.updated_at = now;
        }

        let mut audit = self.audit.write().await;
        audit.append(
            agreement_id,
            &actor.user_id,
            "sign",
            format!("{} signed as {}", actor.email, role.name()),
            now,
        )?;

        info!(agreement_id, role = role.name(), "signature recorded");
        Ok(agreement.clone())
    }

    /// Open one negotiation round inside a dispute. Stays in dispute; the
    /// other party accepts, counters, or escalates from here.
    pub async fn propose_resolution(
        &self,
        agreement_id: &str,
        actor: &Actor,
        proposal: impl Into<String>,
        expected_revision: u64,
        now: DateTime<Utc>,
    ) -> Result<Agreement, AccordError> {
        let mut agreements = self.agreements.write().await;
        let agreement = agreements
            .get_mut(agreement_id)
            .ok_or_else(|| AccordError::NotFound(agreement_id.to_string()))?;

        if agreement.revision != expected_revision {
            return Err(AccordError::RevisionConflict {
                agreement_id: agreement_id.to_string(),
                expected: expected_revision,
                actual: agreement.revision,
            });
        }

        let ctx = UserContext::derive(agreement, &actor.user_id, &actor.email, actor.is_admin);
        let actions = available_actions(agreement, &ctx, now);
        if !actions.can_propose_resolution {
            return Err(AccordError::TransitionDenied(
                "Maximum negotiation iterations reached".to_string(),
            ));
        }

        let iteration = agreement.dispute_history.len() as u32 + 1;
        agreement.dispute_history.push(accord_core::DisputeRound {
            id: Uuid::new_v4().to_string(),
            iteration,
            proposed_by: actor.user_id.clone(),
            proposed_at: now,
            proposal: proposal.into(),
        });
        agreement.has_proposed_resolution = true;
        agreement.revision += 1;
        agreement.updated_at = now;

        let mut audit = self.audit.write().await;
        audit.append(
            agreement_id,
            &actor.user_id,
            "propose-resolution",
            format!("negotiation round {iteration} opened"),
            now,
        )?;

        info!(agreement_id, iteration, "resolution proposed");
        Ok(agreement.clone())
    }

    /// Hard delete, permitted only while the engine grants `can_delete`
    /// (draft, or pending signature before any counterparty has signed).
    pub async fn delete(
        &self,
        agreement_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), AccordError> {
        let mut agreements = self.agreements.write().await;
        let agreement = agreements
            .get(agreement_id)
            .ok_or_else(|| AccordError::NotFound(agreement_id.to_string()))?;

        let ctx = UserContext::derive(agreement, &actor.user_id, &actor.email, actor.is_admin);
        let actions = available_actions(agreement, &ctx, now);
        if !actions.can_delete {
            return Err(AccordError::TransitionDenied(format!(
                "Agreement cannot be hard-deleted while {}",
                agreement.status
            )));
        }

        agreements.remove(agreement_id);

        let mut audit = self.audit.write().await;
        audit.append(
            agreement_id,
            &actor.user_id,
            "delete",
            "agreement hard-deleted",
            now,
        )?;

        info!(agreement_id, "agreement hard-deleted");
        Ok(())
    }

    /// Copy an agreement into a fresh draft owned by the duplicating actor.
    pub async fn duplicate(
        &self,
        agreement_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Agreement, AccordError> {
        let mut agreements = self.agreements.write().await;
        let source = agreements
            .get(agreement_id)
            .ok_or_else(|| AccordError::NotFound(agreement_id.to_string()))?;

        let copy = draft_copy(source, &actor.user_id, &actor.email, now);

        let mut audit = self.audit.write().await;
        audit.append(
            &copy.id,
            &actor.user_id,
            "create",
            format!("duplicated from agreement '{agreement_id}'"),
            now,
        )?;

        info!(agreement_id, new_agreement_id = %copy.id, "agreement duplicated");
        agreements.insert(copy.id.clone(), copy.clone());
        Ok(copy)
    }

    fn denial(
        &self,
        agreement: &Agreement,
        ctx: &UserContext,
        action: WorkflowAction,
        now: DateTime<Utc>,
    ) -> AccordError {
        let actions = available_actions(agreement, ctx, now);
        let reason = match action {
            WorkflowAction::WithdrawOffer => actions.reasons.cannot_withdraw,
            WorkflowAction::Sign => actions.reasons.cannot_sign,
            WorkflowAction::SendForSignature => actions.reasons.cannot_send_for_signature,
            WorkflowAction::RequestCompletion => actions.reasons.cannot_request_completion,
            WorkflowAction::RequestAmendment => actions.reasons.cannot_request_amendment,
            WorkflowAction::Terminate => actions.reasons.cannot_terminate,
            _ => None,
        };
        match reason {
            Some(reason) => AccordError::TransitionDenied(reason),
            None => AccordError::action_unavailable(action.as_str(), agreement.status),
        }
    }
}

/// Fresh draft carrying the source's content but none of its lifecycle.
fn draft_copy(
    source: &Agreement,
    creator_id: &str,
    creator_email: &str,
    now: DateTime<Utc>,
) -> Agreement {
    let mut copy = source.clone();
    copy.id = Uuid::new_v4().to_string();
    copy.status = AgreementStatus::Draft;
    copy.version = 1;
    copy.revision = 0;
    copy.created_at = now;
    copy.updated_at = now;
    copy.expires_at = None;
    copy.creator_id = creator_id.to_string();
    copy.creator_email = creator_email.to_string();
    copy.signatures.clear();
    copy.completion_requested_by = None;
    copy.amendment_proposed_by = None;
    copy.breach_reported_by = None;
    copy.dispute_history.clear();
    copy.dispute_rejection_attempts = 0;
    copy.has_proposed_resolution = false;
    copy.state_history.clear();
    copy.parent_agreement_id = Some(source.id.clone());
    copy
}
