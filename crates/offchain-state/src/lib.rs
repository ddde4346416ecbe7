#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Predicate-based state machine and inbound validation for off-chain payments.
//!
//! The protocol never stores an explicit state tag on a payment. Instead,
//! every state is a *description of document shape*: a set of predicates over
//! the payment's fields. A peer that mutates the document in a way that does
//! not correspond to a known state is rejected without bespoke code per
//! mutation, which makes the protocol self-validating.
//!
//! # Modules
//!
//! - [`machine`] - Generic condition/state/machine kernel over any document
//! - [`payment_states`] - The nine payment states, twelve transitions,
//!   trigger roles, and follow-up actions
//! - [`validate`] - Validation pipeline gating inbound payments against the
//!   machine and the stored prior payment

pub mod machine;
pub mod payment_states;
pub mod validate;

pub use machine::{
    Condition, Doc, FieldRef, Machine, MachineError, Require, Scalar, State, Transition,
    build_machine, field, field_not_set, new_transition, require, value,
};
pub use payment_states::{follow_up_action, payment_machine, summary, trigger_role};
