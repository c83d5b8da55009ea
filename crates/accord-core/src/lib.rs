//! Agreement lifecycle engine.
//!
//! This crate is the pure core of the platform: it decides what every caller
//! may do with an agreement (permission calculation), which state transitions
//! are open from here (transition catalog), and how each status presents
//! (badges). It performs no I/O, holds no state, and takes the clock as an
//! explicit argument; persistence and delivery are collaborator concerns.

#![deny(unsafe_code)]

pub mod actions;
pub mod error;
pub mod status;
pub mod transitions;
pub mod types;

pub use actions::{
    available_actions, AvailableActions, DisabledReasons, Warnings, MAX_DISPUTE_ITERATIONS,
    MAX_DISPUTE_REJECTION_ATTEMPTS,
};
pub use error::AccordError;
pub use status::{status_badge, AgreementStatus, BadgeVariant, StatusBadge};
pub use transitions::{
    available_transitions, can_transition_to, primary_action, PrimaryAction, Transition,
    TransitionCheck, WorkflowAction,
};
pub use types::{
    Agreement, DisputeRound, Party, PartyRole, Signature, SignatureRole, StateChange, UserContext,
};
