use accord_core::AccordError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hash-chained audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub index: u64,
    pub agreement_id: String,
    pub actor_id: String,
    pub action: String,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

/// Append-only audit trail with hash-chain proofs.
///
/// No in-place mutation APIs are exposed; every agreement event becomes an
/// additional record, preserving the full evidentiary history.
#[derive(Debug, Default, Clone)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a trail from persisted entries and verify chain integrity.
    pub fn from_entries(entries: Vec<AuditEntry>) -> Result<Self, AccordError> {
        let trail = Self { entries };

        for (expected_index, entry) in trail.entries.iter().enumerate() {
            if entry.index != expected_index as u64 {
                return Err(AccordError::Audit(format!(
                    "audit index gap at position {} (found {})",
                    expected_index, entry.index
                )));
            }
        }

        if !trail.verify_chain() {
            return Err(AccordError::Audit(
                "persisted audit hash-chain verification failed".to_string(),
            ));
        }

        Ok(trail)
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn entries_for(&self, agreement_id: &str) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.agreement_id == agreement_id)
            .collect()
    }

    pub fn append(
        &mut self,
        agreement_id: impl Into<String>,
        actor_id: impl Into<String>,
        action: impl Into<String>,
        detail: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<AuditEntry, AccordError> {
        let index = self.entries.len() as u64;
        let previous_hash = self.entries.last().map(|entry| entry.entry_hash.clone());

        let agreement_id = agreement_id.into();
        let actor_id = actor_id.into();
        let action = action.into();
        let detail = detail.into();

        let entry_hash = compute_entry_hash(
            index,
            &agreement_id,
            &actor_id,
            &action,
            &detail,
            occurred_at,
            previous_hash.as_deref(),
        )?;

        let entry = AuditEntry {
            entry_id: Uuid::new_v4().to_string(),
            index,
            agreement_id,
            actor_id,
            action,
            detail,
            occurred_at,
            previous_hash,
            entry_hash,
        };

        self.entries.push(entry.clone());
        Ok(entry)
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<String> = None;
        for entry in &self.entries {
            let expected = compute_entry_hash(
                entry.index,
                &entry.agreement_id,
                &entry.actor_id,
                &entry.action,
                &entry.detail,
                entry.occurred_at,
                previous_hash.as_deref(),
            );
            match expected {
                Ok(hash) if hash == entry.entry_hash => {}
                _ => return false,
            }
            if entry.previous_hash != previous_hash {
                return false;
            }
            previous_hash = Some(entry.entry_hash.clone());
        }
        true
    }
}

fn compute_entry_hash(
    index: u64,
    agreement_id: &str,
    actor_id: &str,
    action: &str,
    detail: &str,
    occurred_at: DateTime<Utc>,
    previous_hash: Option<&str>,
) -> Result<String, AccordError> {
    let material = serde_json::json!({
        "index": index,
        "agreement_id": agreement_id,
        "actor_id": actor_id,
        "action": action,
        "detail": detail,
        "occurred_at": occurred_at,
        "previous_hash": previous_hash,
    });

    let bytes =
        serde_json::to_vec(&material).map_err(|e| AccordError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn verifies_hash_chain() {
        let mut trail = AuditTrail::new();
        trail
            .append("agr-1", "creator-1", "send", "sent for signature", now())
            .expect("entry appended");
        trail
            .append("agr-1", "counterparty-1", "sign", "counterparty signed", now())
            .expect("entry appended");

        assert!(trail.verify_chain());
        assert_eq!(trail.entries_for("agr-1").len(), 2);
    }

    #[test]
    fn detects_tampered_entries() {
        let mut trail = AuditTrail::new();
        trail
            .append("agr-1", "creator-1", "send", "sent for signature", now())
            .expect("entry appended");

        let mut tampered = trail.clone();
        tampered.entries[0].detail = "rewritten".to_string();

        assert!(!tampered.verify_chain());
    }

    #[test]
    fn from_entries_rehydrates_a_verified_chain() {
        let mut base = AuditTrail::new();
        let first = base
            .append("agr-1", "creator-1", "send", "sent for signature", now())
            .unwrap();
        base.append("agr-2", "system", "expire", "signature deadline passed", now())
            .unwrap();

        let rehydrated = AuditTrail::from_entries(base.entries().to_vec()).unwrap();
        assert_eq!(rehydrated.entries().len(), 2);
        assert_eq!(rehydrated.entries()[0].entry_id, first.entry_id);
        assert!(rehydrated.verify_chain());
    }

    #[test]
    fn from_entries_rejects_an_index_gap() {
        let mut base = AuditTrail::new();
        base.append("agr-1", "creator-1", "send", "sent", now()).unwrap();
        base.append("agr-1", "counterparty-1", "sign", "signed", now())
            .unwrap();

        let mut entries = base.entries().to_vec();
        entries.remove(0);

        let err = AuditTrail::from_entries(entries).unwrap_err();
        assert!(err.to_string().contains("index gap"));
    }
}
