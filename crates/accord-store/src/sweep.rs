use crate::apply::record_transition;
use crate::store::{AgreementStore, SYSTEM_ACTOR};
use accord_core::{AgreementStatus, WorkflowAction};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

/// Disputes idle past this many days escalate to legal resolution.
pub const DISPUTE_IDLE_ESCALATION_DAYS: i64 = 14;

/// Outcome of one lifecycle sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub escalated: usize,
}

impl AgreementStore {
    /// Lazily enforce time-based transitions.
    ///
    /// Expiration is data-driven, so a not-yet-swept row already computes as
    /// expired; this pass makes the stored status catch up, and escalates
    /// disputes nobody has touched within the idle window.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, accord_core::AccordError> {
        let mut report = SweepReport::default();
        let mut agreements = self.agreements.write().await;
        let mut audit = self.audit.write().await;

        for agreement in agreements.values_mut() {
            match agreement.status {
                AgreementStatus::PendingSignature if agreement.is_expired(now) => {
                    record_transition(
                        agreement,
                        AgreementStatus::Expired,
                        WorkflowAction::Expire,
                        SYSTEM_ACTOR,
                        Some("signature deadline passed".to_string()),
                        now,
                    );
                    audit.append(
                        &agreement.id,
                        SYSTEM_ACTOR,
                        WorkflowAction::Expire.as_str(),
                        "signature deadline passed",
                        now,
                    )?;
                    report.expired += 1;
                }

                AgreementStatus::InDispute
                    if agreement.updated_at
                        < now - Duration::days(DISPUTE_IDLE_ESCALATION_DAYS) =>
                {
                    record_transition(
                        agreement,
                        AgreementStatus::LegalResolution,
                        WorkflowAction::AutoEscalate,
                        SYSTEM_ACTOR,
                        Some(format!(
                            "dispute idle for more than {DISPUTE_IDLE_ESCALATION_DAYS} days"
                        )),
                        now,
                    );
                    audit.append(
                        &agreement.id,
                        SYSTEM_ACTOR,
                        WorkflowAction::AutoEscalate.as_str(),
                        "dispute idle, escalated to legal resolution",
                        now,
                    )?;
                    report.escalated += 1;
                }

                _ => {}
            }
        }

        info!(
            expired = report.expired,
            escalated = report.escalated,
            "lifecycle sweep complete"
        );
        Ok(report)
    }
}
