//! The concrete payment state catalog.
//!
//! Nine states over the payment document, written as predicates over the
//! sender status `Ss`, receiver status `Sr`, and the KYC/signature fields:
//!
//! | State | Predicate |
//! |-------|-----------|
//! | `S_INIT` | Ss=needs_kyc_data, Sr=none, sender KYC present |
//! | `R_SEND` | Ss=needs_kyc_data, Sr=ready, receiver KYC + signature present |
//! | `R_ABORT` | Ss=needs_kyc_data, Sr=abort |
//! | `R_SOFT` | Ss=needs_kyc_data, Sr=soft_match, no sender additional KYC |
//! | `S_SOFT_SEND` | Ss=needs_kyc_data + additional KYC, Sr=soft_match |
//! | `S_SOFT` | Ss=soft_match, Sr=ready, no receiver additional KYC |
//! | `R_SOFT_SEND` | Ss=soft_match, Sr=ready, receiver additional KYC |
//! | `S_ABORT` | Ss=abort, Sr=ready |
//! | `READY` | Ss=ready, Sr=ready |
//!
//! `S_INIT` is the only initial state; `READY`, `S_ABORT`, and `R_ABORT` are
//! terminal. Each state is authored by exactly one role (its trigger role)
//! and owes at most one role a follow-up action.

use std::sync::OnceLock;

use offchain_types::{Action, ActorStatus, KycData, Payment, PaymentActor, Role, Status};

use crate::machine::{
    Doc, FieldRef, Machine, Require, State, build_machine, field, field_not_set, new_transition,
    require, value,
};

pub const S_INIT: &str = "S_INIT";
pub const S_ABORT: &str = "S_ABORT";
pub const S_SOFT: &str = "S_SOFT";
pub const S_SOFT_SEND: &str = "S_SOFT_SEND";
pub const READY: &str = "READY";
pub const R_ABORT: &str = "R_ABORT";
pub const R_SOFT: &str = "R_SOFT";
pub const R_SOFT_SEND: &str = "R_SOFT_SEND";
pub const R_SEND: &str = "R_SEND";

fn status(actor: &str, status: Status) -> crate::machine::Condition {
    value(format!("{actor}.status.status"), status.as_str())
}

fn state(id: &'static str, require: Require) -> State {
    State::with_require(id, require)
}

/// The payment machine: nine states, twelve transitions.
pub fn payment_machine() -> &'static Machine {
    static MACHINE: OnceLock<Machine> = OnceLock::new();
    MACHINE.get_or_init(|| {
        let s_init = state(
            S_INIT,
            require([
                status("sender", Status::NeedsKycData),
                status("receiver", Status::None),
                field("sender.kyc_data"),
            ]),
        );
        let s_abort = state(
            S_ABORT,
            require([
                status("sender", Status::Abort),
                status("receiver", Status::ReadyForSettlement),
            ]),
        );
        let s_soft = state(
            S_SOFT,
            require([
                status("sender", Status::SoftMatch),
                status("receiver", Status::ReadyForSettlement),
                field_not_set("receiver.kyc_data.additional_kyc_data"),
            ]),
        );
        let s_soft_send = state(
            S_SOFT_SEND,
            require([
                status("sender", Status::NeedsKycData),
                field("sender.kyc_data.additional_kyc_data"),
                status("receiver", Status::SoftMatch),
            ]),
        );
        let ready = state(
            READY,
            require([
                status("sender", Status::ReadyForSettlement),
                status("receiver", Status::ReadyForSettlement),
            ]),
        );
        let r_abort = state(
            R_ABORT,
            require([
                status("sender", Status::NeedsKycData),
                status("receiver", Status::Abort),
            ]),
        );
        let r_soft = state(
            R_SOFT,
            require([
                status("sender", Status::NeedsKycData),
                field_not_set("sender.kyc_data.additional_kyc_data"),
                status("receiver", Status::SoftMatch),
            ]),
        );
        let r_soft_send = state(
            R_SOFT_SEND,
            require([
                status("sender", Status::SoftMatch),
                status("receiver", Status::ReadyForSettlement),
                field("receiver.kyc_data.additional_kyc_data"),
            ]),
        );
        let r_send = state(
            R_SEND,
            require([
                status("sender", Status::NeedsKycData),
                status("receiver", Status::ReadyForSettlement),
                field("receiver.kyc_data"),
                field("recipient_signature"),
            ]),
        );

        build_machine(vec![
            new_transition(s_init.clone(), r_send.clone()),
            new_transition(s_init.clone(), r_abort.clone()),
            new_transition(s_init, r_soft.clone()),
            new_transition(r_send.clone(), ready.clone()),
            new_transition(r_send.clone(), s_abort.clone()),
            new_transition(r_send.clone(), s_soft.clone()),
            new_transition(r_soft, s_soft_send.clone()),
            new_transition(s_soft_send.clone(), r_abort),
            new_transition(s_soft_send, r_send),
            new_transition(s_soft, r_soft_send.clone()),
            new_transition(r_soft_send.clone(), s_abort),
            new_transition(r_soft_send, ready),
        ])
    })
}

/// The role that authored the document shape of `state`.
///
/// An inbound command must come from this role, which is always the opposite
/// of the local role. `READY` is sender-authored: both edges into it rewrite
/// the sender's status.
pub fn trigger_role(state: &State) -> Role {
    match state.id() {
        R_SEND | R_ABORT | R_SOFT | R_SOFT_SEND => Role::Receiver,
        _ => Role::Sender,
    }
}

/// The follow-up owed at `state`, as `(responsible role, action)`.
pub fn follow_up(state: &State) -> Option<(Role, Action)> {
    match state.id() {
        S_INIT => Some((Role::Receiver, Action::EvaluateKycData)),
        R_SEND => Some((Role::Sender, Action::EvaluateKycData)),
        R_SOFT => Some((Role::Sender, Action::ClearSoftMatch)),
        READY => Some((Role::Sender, Action::SubmitTxn)),
        S_SOFT => Some((Role::Receiver, Action::ClearSoftMatch)),
        S_SOFT_SEND => Some((Role::Receiver, Action::ReviewKycData)),
        R_SOFT_SEND => Some((Role::Sender, Action::ReviewKycData)),
        R_ABORT | S_ABORT => None,
        _ => None,
    }
}

/// The action `role` owes at `state`, if any. At most one side has work to
/// do at any state.
pub fn follow_up_action(role: Role, state: &State) -> Option<Action> {
    follow_up(state).and_then(|(owner, action)| (owner == role).then_some(action))
}

fn kyc_summary(kyc_data: Option<&KycData>) -> &'static str {
    match kyc_data {
        None => "-",
        Some(kyc) if kyc.additional_kyc_data.is_some() => "k+",
        Some(_) => "k",
    }
}

fn actor_summary(actor: &PaymentActor) -> String {
    format!("{}_{}", actor.status.status, kyc_summary(actor.kyc_data.as_ref()))
}

/// Compact one-line rendering of a payment's state-relevant fields, used in
/// validation error messages.
pub fn summary(payment: &Payment) -> String {
    let signature = if payment.recipient_signature.is_some() {
        "s"
    } else {
        "-"
    };
    format!(
        "{}_{}_{}",
        actor_summary(&payment.sender),
        actor_summary(&payment.receiver),
        signature
    )
}

impl Doc for Payment {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        match name {
            "reference_id" => Some(FieldRef::Str(&self.reference_id)),
            "sender" => Some(FieldRef::Node(&self.sender)),
            "receiver" => Some(FieldRef::Node(&self.receiver)),
            "action" => Some(FieldRef::Node(&self.action)),
            "original_payment_reference_id" => self
                .original_payment_reference_id
                .as_deref()
                .map(FieldRef::Str),
            "recipient_signature" => self.recipient_signature.as_deref().map(FieldRef::Str),
            "description" => self.description.as_deref().map(FieldRef::Str),
            _ => None,
        }
    }
}

impl Doc for PaymentActor {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        match name {
            "address" => Some(FieldRef::Str(&self.address)),
            "status" => Some(FieldRef::Node(&self.status)),
            "kyc_data" => self
                .kyc_data
                .as_ref()
                .map(|kyc| FieldRef::Node(kyc as &dyn Doc)),
            _ => None,
        }
    }
}

impl Doc for ActorStatus {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        match name {
            "status" => Some(FieldRef::Str(self.status.as_str())),
            "abort_code" => self.abort_code.as_deref().map(FieldRef::Str),
            "abort_message" => self.abort_message.as_deref().map(FieldRef::Str),
            _ => None,
        }
    }
}

impl Doc for KycData {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        match name {
            "given_name" => self.given_name.as_deref().map(FieldRef::Str),
            "surname" => self.surname.as_deref().map(FieldRef::Str),
            "dob" => self.dob.as_deref().map(FieldRef::Str),
            "legal_entity_name" => self.legal_entity_name.as_deref().map(FieldRef::Str),
            "additional_kyc_data" => self.additional_kyc_data.as_deref().map(FieldRef::Str),
            _ => None,
        }
    }
}

impl Doc for offchain_types::PaymentAction {
    fn field(&self, name: &str) -> Option<FieldRef<'_>> {
        match name {
            "amount" => Some(FieldRef::U64(self.amount)),
            "currency" => Some(FieldRef::Str(&self.currency)),
            "action" => Some(FieldRef::Str(offchain_types::ChargeAction::VALUE)),
            "timestamp" => Some(FieldRef::U64(self.timestamp)),
            _ => None,
        }
    }
}
