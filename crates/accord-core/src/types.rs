use crate::status::AgreementStatus;
use crate::transitions::WorkflowAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Counterparty,
    Witness,
}

/// A party the creator shared the agreement with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub user_id: Option<String>,
    pub email: String,
    pub name: Option<String>,
    pub role: PartyRole,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureRole {
    Creator,
    Counterparty,
    Witness,
}

impl SignatureRole {
    pub fn name(self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Counterparty => "counterparty",
            Self::Witness => "witness",
        }
    }
}

/// An executed signature with the evidentiary metadata captured at signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: Option<String>,
    pub role: SignatureRole,
    pub signed_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: Option<String>,
}

/// One round of proposal/counter-proposal inside the negotiation phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeRound {
    pub id: String,
    pub iteration: u32,
    pub proposed_by: String,
    pub proposed_at: DateTime<Utc>,
    pub proposal: String,
}

/// Recorded status transition, appended by the store on every applied action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub from: AgreementStatus,
    pub to: AgreementStatus,
    pub action: WorkflowAction,
    pub actor_id: String,
    pub occurred_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// The contract record the engine operates on.
///
/// `version` is the document version, bumped only by an accepted amendment.
/// `revision` is the write counter the store compares-and-swaps on; every
/// persisted mutation increments it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agreement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub terms: String,
    pub status: AgreementStatus,
    pub version: u32,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub creator_id: String,
    pub creator_email: String,
    pub creator_name: Option<String>,
    pub shared_with: Vec<Party>,
    pub signatures: Vec<Signature>,
    pub completion_requested_by: Option<String>,
    pub amendment_proposed_by: Option<String>,
    pub breach_reported_by: Option<String>,
    pub dispute_history: Vec<DisputeRound>,
    pub dispute_rejection_attempts: u8,
    pub has_proposed_resolution: bool,
    pub state_history: Vec<StateChange>,
    pub parent_agreement_id: Option<String>,
}

impl Agreement {
    /// Start a new draft owned by the creator.
    pub fn draft(
        creator_id: impl Into<String>,
        creator_email: impl Into<String>,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            terms: String::new(),
            status: AgreementStatus::Draft,
            version: 1,
            revision: 0,
            created_at: now,
            updated_at: now,
            expires_at: None,
            creator_id: creator_id.into(),
            creator_email: creator_email.into(),
            creator_name: None,
            shared_with: Vec::new(),
            signatures: Vec::new(),
            completion_requested_by: None,
            amendment_proposed_by: None,
            breach_reported_by: None,
            dispute_history: Vec::new(),
            dispute_rejection_attempts: 0,
            has_proposed_resolution: false,
            state_history: Vec::new(),
            parent_agreement_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_terms(mut self, terms: impl Into<String>) -> Self {
        self.terms = terms.into();
        self
    }

    pub fn with_counterparty(
        mut self,
        email: impl Into<String>,
        name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        self.shared_with.push(Party {
            user_id: None,
            email: email.into(),
            name,
            role: PartyRole::Counterparty,
            added_at: now,
        });
        self
    }

    pub fn with_witness(
        mut self,
        email: impl Into<String>,
        name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        self.shared_with.push(Party {
            user_id: None,
            email: email.into(),
            name,
            role: PartyRole::Witness,
            added_at: now,
        });
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn counterparties(&self) -> impl Iterator<Item = &Party> {
        self.shared_with
            .iter()
            .filter(|party| party.role == PartyRole::Counterparty)
    }

    pub fn counterparty_signature_count(&self) -> usize {
        self.signatures
            .iter()
            .filter(|signature| signature.role == SignatureRole::Counterparty)
            .count()
    }

    pub fn creator_signed(&self) -> bool {
        self.signatures
            .iter()
            .any(|signature| signature.role == SignatureRole::Creator)
    }

    /// Whether this user identity already signed in the given role.
    ///
    /// Matched by user id or case-insensitive email, same as party lookup.
    pub fn has_signed_in_role(&self, user_id: &str, email: &str, role: SignatureRole) -> bool {
        self.signatures.iter().any(|signature| {
            signature.role == role
                && (signature.user_id == user_id
                    || signature.user_email.eq_ignore_ascii_case(email))
        })
    }

    pub fn dispute_iterations(&self) -> usize {
        self.dispute_history.len()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|deadline| deadline < now).unwrap_or(false)
    }
}

/// The caller's relationship to one agreement, recomputed per request.
///
/// Never persisted; always derived fresh from the agreement's party and
/// signature lists so a stale snapshot cannot grant stale capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub email: String,
    pub is_creator: bool,
    pub is_counterparty: bool,
    pub is_witness: bool,
    pub has_signed_as_counterparty: bool,
    pub has_signed_as_witness: bool,
    pub is_admin: bool,
}

impl UserContext {
    pub fn derive(
        agreement: &Agreement,
        user_id: impl Into<String>,
        email: impl Into<String>,
        is_admin: bool,
    ) -> Self {
        let user_id = user_id.into();
        let email = email.into();

        let is_creator = agreement.creator_id == user_id
            || agreement.creator_email.eq_ignore_ascii_case(&email);

        let party = agreement.shared_with.iter().find(|party| {
            party.user_id.as_deref() == Some(user_id.as_str())
                || party.email.eq_ignore_ascii_case(&email)
        });
        let is_counterparty = party.map(|p| p.role == PartyRole::Counterparty).unwrap_or(false);
        let is_witness = party.map(|p| p.role == PartyRole::Witness).unwrap_or(false);

        let has_signed_as_counterparty =
            agreement.has_signed_in_role(&user_id, &email, SignatureRole::Counterparty);
        let has_signed_as_witness =
            agreement.has_signed_in_role(&user_id, &email, SignatureRole::Witness);

        Self {
            user_id,
            email,
            is_creator,
            is_counterparty,
            is_witness,
            has_signed_as_counterparty,
            has_signed_as_witness,
            is_admin,
        }
    }

    /// A party in the binding sense: creator or counterparty, not witness.
    pub fn is_binding_party(&self) -> bool {
        self.is_creator || self.is_counterparty
    }
}
