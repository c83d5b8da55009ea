use accord_core::{
    available_actions, AccordError, Agreement, AgreementStatus, SignatureRole, UserContext,
    WorkflowAction,
};
use accord_store::{Actor, AgreementStore, SignatureStamp, TransitionInput};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn creator() -> Actor {
    Actor::new("creator-1", "creator@example.com")
}

fn counterparty() -> Actor {
    Actor::new("counterparty-1", "other@example.com")
}

fn two_party_draft() -> Agreement {
    let mut agreement = Agreement::draft("creator-1", "creator@example.com", "Supply deal", now())
        .with_counterparty("other@example.com", Some("Other Party".to_string()), now())
        .with_terms("Deliver 100 units monthly.");
    agreement.shared_with[0].user_id = Some("counterparty-1".to_string());
    agreement
}

fn stamp() -> SignatureStamp {
    SignatureStamp {
        signer_name: Some("Other Party".to_string()),
        ip_address: Some("203.0.113.9".to_string()),
        user_agent: Some("integration-test".to_string()),
        location: None,
    }
}

async fn active_agreement(store: &AgreementStore) -> Agreement {
    let draft = store.insert(two_party_draft(), now()).await.unwrap();
    let pending = store
        .perform(
            &draft.id,
            &creator(),
            WorkflowAction::SendForSignature,
            TransitionInput::expiration_days(14),
            draft.revision,
            now(),
        )
        .await
        .unwrap();
    store
        .sign(
            &pending.id,
            &counterparty(),
            SignatureRole::Counterparty,
            stamp(),
            pending.revision,
            now(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn happy_path_from_draft_to_completed() {
    let store = AgreementStore::new();
    let draft = store.insert(two_party_draft(), now()).await.unwrap();
    assert_eq!(draft.status, AgreementStatus::Draft);
    assert_eq!(draft.revision, 0);

    let pending = store
        .perform(
            &draft.id,
            &creator(),
            WorkflowAction::SendForSignature,
            TransitionInput::expiration_days(14),
            0,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(pending.status, AgreementStatus::PendingSignature);
    assert_eq!(pending.expires_at, Some(now() + Duration::days(14)));

    let active = store
        .sign(
            &pending.id,
            &counterparty(),
            SignatureRole::Counterparty,
            stamp(),
            pending.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(active.status, AgreementStatus::Active);
    assert_eq!(active.signatures.len(), 1);
    assert_eq!(
        active.signatures[0].ip_address.as_deref(),
        Some("203.0.113.9")
    );

    let completing = store
        .perform(
            &active.id,
            &creator(),
            WorkflowAction::RequestCompletion,
            TransitionInput::default(),
            active.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(completing.status, AgreementStatus::PendingCompletion);
    assert_eq!(
        completing.completion_requested_by.as_deref(),
        Some("creator-1")
    );

    // The requester cannot confirm their own request.
    let err = store
        .perform(
            &completing.id,
            &creator(),
            WorkflowAction::ConfirmCompletion,
            TransitionInput::default(),
            completing.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));

    let completed = store
        .perform(
            &completing.id,
            &counterparty(),
            WorkflowAction::ConfirmCompletion,
            TransitionInput::default(),
            completing.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(completed.status, AgreementStatus::Completed);
    assert!(completed.completion_requested_by.is_none());
    assert_eq!(completed.state_history.len(), 4);

    // Terminal: nothing further applies.
    let err = store
        .perform(
            &completed.id,
            &creator(),
            WorkflowAction::RequestCompletion,
            TransitionInput::default(),
            completed.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));

    assert!(store.verify_audit_chain().await);
    // create, send, sign, request-completion, confirm-completion.
    assert_eq!(store.audit_entries(&completed.id).await.len(), 5);
}

#[tokio::test]
async fn withdrawal_race_loses_to_the_persisted_signature() {
    let store = AgreementStore::new();
    let draft = store.insert(two_party_draft(), now()).await.unwrap();
    let pending = store
        .perform(
            &draft.id,
            &creator(),
            WorkflowAction::SendForSignature,
            TransitionInput::expiration_days(14),
            draft.revision,
            now(),
        )
        .await
        .unwrap();

    // Creator reads this snapshot, then the counterparty's signature lands first.
    let stale_revision = pending.revision;
    store
        .sign(
            &pending.id,
            &counterparty(),
            SignatureRole::Counterparty,
            stamp(),
            pending.revision,
            now(),
        )
        .await
        .unwrap();

    // The stale withdrawal must lose the revision check, not half-apply.
    let err = store
        .perform(
            &pending.id,
            &creator(),
            WorkflowAction::WithdrawOffer,
            TransitionInput::reason("changed my mind"),
            stale_revision,
            now(),
        )
        .await
        .unwrap_err();
    match err {
        AccordError::RevisionConflict { expected, actual, .. } => {
            assert_eq!(expected, stale_revision);
            assert_eq!(actual, stale_revision + 1);
        }
        other => panic!("expected revision conflict, got {:?}", other),
    }

    // Re-read and recompute: withdrawal is no longer on offer.
    let fresh = store.get(&pending.id).await.unwrap();
    assert_eq!(fresh.status, AgreementStatus::Active);
    let ctx = UserContext::derive(&fresh, "creator-1", "creator@example.com", false);
    assert!(!available_actions(&fresh, &ctx, now()).can_withdraw_offer);

    let err = store
        .perform(
            &fresh.id,
            &creator(),
            WorkflowAction::WithdrawOffer,
            TransitionInput::reason("still want out"),
            fresh.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));
}

#[tokio::test]
async fn signature_is_at_most_once_per_role() {
    let store = AgreementStore::new();
    let active = active_agreement(&store).await;

    let err = store
        .sign(
            &active.id,
            &counterparty(),
            SignatureRole::Counterparty,
            stamp(),
            active.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AccordError::AlreadySigned { role: "counterparty" }
    ));

    // The creator may still countersign the active agreement.
    let signed = store
        .sign(
            &active.id,
            &creator(),
            SignatureRole::Creator,
            SignatureStamp::default(),
            active.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(signed.status, AgreementStatus::Active);
    assert_eq!(signed.signatures.len(), 2);
}

#[tokio::test]
async fn witness_attestation_records_without_a_status_change() {
    let store = AgreementStore::new();
    let mut draft = two_party_draft().with_witness("witness@example.com", None, now());
    draft.shared_with[1].user_id = Some("witness-1".to_string());
    let draft = store.insert(draft, now()).await.unwrap();
    let pending = store
        .perform(
            &draft.id,
            &creator(),
            WorkflowAction::SendForSignature,
            TransitionInput::expiration_days(14),
            draft.revision,
            now(),
        )
        .await
        .unwrap();

    let witness = Actor::new("witness-1", "witness@example.com");
    let attested = store
        .sign(
            &pending.id,
            &witness,
            SignatureRole::Witness,
            SignatureStamp::default(),
            pending.revision,
            now(),
        )
        .await
        .unwrap();

    assert_eq!(attested.status, AgreementStatus::PendingSignature);
    assert_eq!(attested.signatures.len(), 1);
    assert_eq!(attested.revision, pending.revision + 1);

    // A non-witness cannot attest.
    let err = store
        .sign(
            &pending.id,
            &counterparty(),
            SignatureRole::Witness,
            SignatureStamp::default(),
            attested.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));
}

#[tokio::test]
async fn required_input_is_enforced_structurally() {
    let store = AgreementStore::new();
    let active = active_agreement(&store).await;

    let err = store
        .perform(
            &active.id,
            &creator(),
            WorkflowAction::ReportBreach,
            TransitionInput::default(),
            active.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AccordError::InputRequired { action: "report-breach" }
    ));

    let reported = store
        .perform(
            &active.id,
            &creator(),
            WorkflowAction::ReportBreach,
            TransitionInput::reason("missed the May delivery"),
            active.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(reported.status, AgreementStatus::BreachReported);
    assert_eq!(reported.breach_reported_by.as_deref(), Some("creator-1"));
}

#[tokio::test]
async fn amendment_acceptance_requires_resignature_but_rejection_does_not() {
    let store = AgreementStore::new();
    let active = active_agreement(&store).await;
    assert_eq!(active.signatures.len(), 1);

    let amending = store
        .perform(
            &active.id,
            &counterparty(),
            WorkflowAction::RequestAmendment,
            TransitionInput::details("raise the monthly volume to 120 units"),
            active.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(amending.status, AgreementStatus::PendingAmendment);
    assert_eq!(
        amending.amendment_proposed_by.as_deref(),
        Some("counterparty-1")
    );

    // The proposer cannot accept their own amendment.
    let err = store
        .perform(
            &amending.id,
            &counterparty(),
            WorkflowAction::AcceptAmendment,
            TransitionInput::default(),
            amending.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));

    let resigning = store
        .perform(
            &amending.id,
            &creator(),
            WorkflowAction::AcceptAmendment,
            TransitionInput::default(),
            amending.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(resigning.status, AgreementStatus::PendingSignature);
    assert!(resigning.signatures.is_empty());
    assert_eq!(resigning.version, 2);
    assert!(resigning.amendment_proposed_by.is_none());

    // The counterparty signs the amended version again.
    let reactivated = store
        .sign(
            &resigning.id,
            &counterparty(),
            SignatureRole::Counterparty,
            stamp(),
            resigning.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(reactivated.status, AgreementStatus::Active);

    // Rejection, by contrast, leaves the existing signatures in place.
    let amending = store
        .perform(
            &reactivated.id,
            &counterparty(),
            WorkflowAction::RequestAmendment,
            TransitionInput::details("actually, 150 units"),
            reactivated.revision,
            now(),
        )
        .await
        .unwrap();
    let rejected = store
        .perform(
            &amending.id,
            &creator(),
            WorkflowAction::RejectAmendment,
            TransitionInput::reason("volume is fixed for the year"),
            amending.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, AgreementStatus::Active);
    assert_eq!(rejected.signatures.len(), 1);
    assert!(rejected.amendment_proposed_by.is_none());
}

#[tokio::test]
async fn breach_dispute_and_negotiated_resolution() {
    let store = AgreementStore::new();
    let active = active_agreement(&store).await;

    let reported = store
        .perform(
            &active.id,
            &creator(),
            WorkflowAction::ReportBreach,
            TransitionInput::reason("missed delivery"),
            active.revision,
            now(),
        )
        .await
        .unwrap();

    let disputed = store
        .perform(
            &reported.id,
            &counterparty(),
            WorkflowAction::DisputeBreach,
            TransitionInput::details("delivery arrived on the 3rd, within grace"),
            reported.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(disputed.status, AgreementStatus::InDispute);
    assert_eq!(disputed.dispute_rejection_attempts, 1);

    let proposed = store
        .propose_resolution(
            &disputed.id,
            &creator(),
            "credit one week of fees",
            disputed.revision,
            now(),
        )
        .await
        .unwrap();
    assert!(proposed.has_proposed_resolution);
    assert_eq!(proposed.dispute_history.len(), 1);

    let settled = store
        .perform(
            &proposed.id,
            &counterparty(),
            WorkflowAction::AcceptResolution,
            TransitionInput::default(),
            proposed.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(settled.status, AgreementStatus::Active);
    assert!(!settled.has_proposed_resolution);
    assert!(settled.breach_reported_by.is_none());
    assert_eq!(settled.dispute_rejection_attempts, 0);
    // Negotiation history is never truncated.
    assert_eq!(settled.dispute_history.len(), 1);
}

#[tokio::test]
async fn exhausted_negotiation_escalates_and_admin_settles() {
    let store = AgreementStore::new();
    let active = active_agreement(&store).await;

    let reported = store
        .perform(
            &active.id,
            &creator(),
            WorkflowAction::ReportBreach,
            TransitionInput::reason("missed delivery"),
            active.revision,
            now(),
        )
        .await
        .unwrap();
    let mut agreement = store
        .perform(
            &reported.id,
            &counterparty(),
            WorkflowAction::DisputeBreach,
            TransitionInput::details("contest the claim"),
            reported.revision,
            now(),
        )
        .await
        .unwrap();

    for round in 0..4 {
        agreement = store
            .propose_resolution(
                &agreement.id,
                &creator(),
                format!("proposal {round}"),
                agreement.revision,
                now(),
            )
            .await
            .unwrap();
    }
    assert_eq!(agreement.dispute_history.len(), 4);

    let escalated = store
        .perform(
            &agreement.id,
            &creator(),
            WorkflowAction::EscalateLegal,
            TransitionInput::reason("negotiation deadlocked"),
            agreement.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(escalated.status, AgreementStatus::LegalResolution);

    // Frozen for the parties, still open to counter-proposals under the cap.
    let err = store
        .perform(
            &escalated.id,
            &creator(),
            WorkflowAction::MarkSettled,
            TransitionInput::details("settled privately"),
            escalated.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));

    let reopened = store
        .perform(
            &escalated.id,
            &counterparty(),
            WorkflowAction::SubmitCounterProposal,
            TransitionInput::details("final offer: 50% credit"),
            escalated.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(reopened.status, AgreementStatus::InDispute);
    assert_eq!(reopened.dispute_history.len(), 5);

    // At the cap, proposing is closed and escalation is mandatory.
    let err = store
        .propose_resolution(
            &reopened.id,
            &creator(),
            "one more idea",
            reopened.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));

    let escalated = store
        .perform(
            &reopened.id,
            &counterparty(),
            WorkflowAction::EscalateLegal,
            TransitionInput::reason("cap reached"),
            reopened.revision,
            now(),
        )
        .await
        .unwrap();

    let admin = Actor::admin("admin-1", "admin@example.com");
    let settled = store
        .perform(
            &escalated.id,
            &admin,
            WorkflowAction::MarkSettled,
            TransitionInput::details("settlement recorded under case LC-1042"),
            escalated.revision,
            now(),
        )
        .await
        .unwrap();
    assert_eq!(settled.status, AgreementStatus::Completed);
    assert!(store.verify_audit_chain().await);
}

#[tokio::test]
async fn expired_agreement_can_be_resent_as_a_new_draft() {
    let store = AgreementStore::new();
    let draft = store.insert(two_party_draft(), now()).await.unwrap();
    let pending = store
        .perform(
            &draft.id,
            &creator(),
            WorkflowAction::SendForSignature,
            TransitionInput::expiration_days(7),
            draft.revision,
            now(),
        )
        .await
        .unwrap();

    let later = now() + Duration::days(8);
    let report = store.sweep(later).await.unwrap();
    assert_eq!(report.expired, 1);
    let expired = store.get(&pending.id).await.unwrap();
    assert_eq!(expired.status, AgreementStatus::Expired);

    let redraft = store
        .perform(
            &expired.id,
            &creator(),
            WorkflowAction::ResendExpired,
            TransitionInput::expiration_days(14),
            expired.revision,
            later,
        )
        .await
        .unwrap();

    assert_ne!(redraft.id, expired.id);
    assert_eq!(redraft.status, AgreementStatus::Draft);
    assert_eq!(redraft.parent_agreement_id.as_deref(), Some(expired.id.as_str()));
    assert_eq!(redraft.expires_at, Some(later + Duration::days(14)));
    assert!(redraft.signatures.is_empty());

    // The source row stays expired.
    let source = store.get(&expired.id).await.unwrap();
    assert_eq!(source.status, AgreementStatus::Expired);
}

#[tokio::test]
async fn hard_delete_is_limited_to_unsigned_agreements() {
    let store = AgreementStore::new();

    let draft = store.insert(two_party_draft(), now()).await.unwrap();
    store.delete(&draft.id, &creator(), now()).await.unwrap();
    let err = store.get(&draft.id).await.unwrap_err();
    assert!(matches!(err, AccordError::NotFound(_)));

    // Once active, the agreement only leaves through terminal transitions.
    let active = active_agreement(&store).await;
    let err = store.delete(&active.id, &creator(), now()).await.unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));

    // The counterparty never gets the hard-delete path.
    let draft = store.insert(two_party_draft(), now()).await.unwrap();
    let err = store
        .delete(&draft.id, &counterparty(), now())
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));
}

#[tokio::test]
async fn duplicate_makes_the_caller_creator_of_a_fresh_draft() {
    let store = AgreementStore::new();
    let active = active_agreement(&store).await;

    let copy = store
        .duplicate(&active.id, &counterparty(), now())
        .await
        .unwrap();

    assert_eq!(copy.status, AgreementStatus::Draft);
    assert_eq!(copy.creator_id, "counterparty-1");
    assert_eq!(copy.terms, active.terms);
    assert_eq!(copy.version, 1);
    assert_eq!(copy.revision, 0);
    assert!(copy.signatures.is_empty());
    assert_eq!(copy.parent_agreement_id.as_deref(), Some(active.id.as_str()));

    assert_eq!(store.list_for(&counterparty()).await.len(), 2);
}

#[tokio::test]
async fn strangers_are_refused_without_leaking_state() {
    let store = AgreementStore::new();
    let active = active_agreement(&store).await;

    let stranger = Actor::new("user-9", "stranger@example.com");
    let err = store
        .perform(
            &active.id,
            &stranger,
            WorkflowAction::RequestCompletion,
            TransitionInput::default(),
            active.revision,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccordError::TransitionDenied(_)));

    assert!(store.list_for(&stranger).await.is_empty());
}
