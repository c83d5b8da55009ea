use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical lifecycle states for an agreement.
///
/// Legacy wire aliases are collapsed on deserialization so the rest of the
/// engine only ever sees one value per semantic state: `disputed` maps to
/// `InDispute`, `pending` to `PendingCompletion`, `overdue` to `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Draft,
    PendingSignature,
    Active,
    PendingAmendment,
    #[serde(alias = "pending")]
    PendingCompletion,
    BreachReported,
    #[serde(alias = "disputed")]
    InDispute,
    LegalResolution,
    Completed,
    Rejected,
    Withdrawn,
    Cancelled,
    #[serde(alias = "overdue")]
    Expired,
}

impl AgreementStatus {
    /// Every canonical status, in lifecycle order.
    pub const ALL: [AgreementStatus; 13] = [
        Self::Draft,
        Self::PendingSignature,
        Self::Active,
        Self::PendingAmendment,
        Self::PendingCompletion,
        Self::BreachReported,
        Self::InDispute,
        Self::LegalResolution,
        Self::Completed,
        Self::Rejected,
        Self::Withdrawn,
        Self::Cancelled,
        Self::Expired,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingSignature => "pending_signature",
            Self::Active => "active",
            Self::PendingAmendment => "pending_amendment",
            Self::PendingCompletion => "pending_completion",
            Self::BreachReported => "breach_reported",
            Self::InDispute => "in_dispute",
            Self::LegalResolution => "legal_resolution",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Rejected | Self::Withdrawn | Self::Cancelled | Self::Expired
        )
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeVariant {
    Default,
    Secondary,
    Destructive,
    Outline,
    Warning,
}

/// Presentation properties for a status, consumed verbatim by UI collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBadge {
    pub variant: BadgeVariant,
    pub label: String,
    pub description: String,
    pub color: String,
}

fn badge(
    variant: BadgeVariant,
    label: &str,
    description: &str,
    color: &str,
) -> StatusBadge {
    StatusBadge {
        variant,
        label: label.to_string(),
        description: description.to_string(),
        color: color.to_string(),
    }
}

/// Pure presentation lookup, no workflow logic.
pub fn status_badge(status: AgreementStatus) -> StatusBadge {
    match status {
        AgreementStatus::Draft => {
            badge(BadgeVariant::Outline, "Draft", "Creator is still editing", "gray")
        }
        AgreementStatus::PendingSignature => badge(
            BadgeVariant::Warning,
            "Awaiting Signature",
            "Sent to counterparty for signature",
            "amber",
        ),
        AgreementStatus::Active => badge(
            BadgeVariant::Default,
            "Active",
            "Agreement is legally binding",
            "green",
        ),
        AgreementStatus::PendingAmendment => badge(
            BadgeVariant::Secondary,
            "Amendment Pending",
            "Proposed changes awaiting approval",
            "teal",
        ),
        AgreementStatus::PendingCompletion => badge(
            BadgeVariant::Secondary,
            "Pending Completion",
            "Awaiting completion confirmation",
            "purple",
        ),
        AgreementStatus::BreachReported => badge(
            BadgeVariant::Destructive,
            "Breach Reported",
            "Under investigation",
            "red",
        ),
        AgreementStatus::InDispute => badge(
            BadgeVariant::Warning,
            "In Dispute",
            "Negotiation in progress",
            "orange",
        ),
        AgreementStatus::LegalResolution => badge(
            BadgeVariant::Destructive,
            "Legal Resolution",
            "Escalated to legal process",
            "dark-red",
        ),
        AgreementStatus::Completed => badge(
            BadgeVariant::Default,
            "Completed",
            "Agreement fulfilled successfully",
            "green",
        ),
        AgreementStatus::Rejected => badge(
            BadgeVariant::Destructive,
            "Rejected",
            "Counterparty rejected the agreement",
            "orange-red",
        ),
        AgreementStatus::Withdrawn => badge(
            BadgeVariant::Outline,
            "Withdrawn",
            "Creator withdrew offer before signature",
            "gray-orange",
        ),
        AgreementStatus::Cancelled => {
            badge(BadgeVariant::Outline, "Cancelled", "Agreement terminated", "gray")
        }
        AgreementStatus::Expired => badge(
            BadgeVariant::Outline,
            "Expired",
            "Signature deadline passed",
            "gray-yellow",
        ),
    }
}
