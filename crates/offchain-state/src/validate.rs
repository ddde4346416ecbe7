//! Validation pipeline for inbound payments.
//!
//! An inbound payment is accepted iff it matches exactly one state of the
//! machine, that state was authored by the role attributed to the envelope
//! signer, the evolution from the stored prior payment (if any) is a legal
//! transition, and no immutable field changed. A payment with no prior must
//! match the machine's initial state.

use offchain_types::{Error, Payment, Role};

use crate::payment_states::{payment_machine, summary, trigger_role};

/// Gates an inbound `new_payment` against the machine and the stored prior.
///
/// `event_role` is the role attributed to the envelope signer, i.e. the
/// opposite of the local role. Every rejection is an `invalid-request`
/// command error.
pub fn inbound_payment(
    new_payment: &Payment,
    event_role: Role,
    prior: Option<&Payment>,
) -> Result<(), Error> {
    let machine = payment_machine();

    let new_state = machine.match_state(new_payment).map_err(|_| {
        Error::invalid_request(format!(
            "new payment({}) does not match any valid states",
            summary(new_payment)
        ))
    })?;

    let expected_role = trigger_role(new_state);
    if event_role != expected_role {
        return Err(Error::invalid_request(format!(
            "payment({}) is expected from {expected_role}, but from {event_role}",
            summary(new_payment)
        )));
    }

    match prior {
        Some(prior_payment) => {
            immutable_fields(new_payment, prior_payment)?;
            let prior_state = machine.match_state(prior_payment).map_err(|_| {
                Error::invalid_request(format!(
                    "prior payment({}) does not match any valid states",
                    summary(prior_payment)
                ))
            })?;
            if !machine.is_valid_transition(prior_state, new_state, new_payment) {
                return Err(Error::invalid_request(format!(
                    "can not transit payment({}) from {}",
                    summary(new_payment),
                    summary(prior_payment)
                )));
            }
        }
        None => {
            if !machine.is_initial(new_state) {
                return Err(Error::invalid_request(format!(
                    "invalid initial payment({})",
                    summary(new_payment)
                )));
            }
        }
    }

    Ok(())
}

/// Rejects changes to fields that are set once and never rewritten.
///
/// The state machine makes most illegal mutations unreachable; these checks
/// close the rest explicitly instead of relying on unreachability.
fn immutable_fields(new: &Payment, prior: &Payment) -> Result<(), Error> {
    if new.reference_id != prior.reference_id {
        return Err(Error::invalid_field("reference_id", "field is immutable"));
    }
    if new.action != prior.action {
        return Err(Error::invalid_field("action", "field is immutable"));
    }
    if new.original_payment_reference_id != prior.original_payment_reference_id {
        return Err(Error::invalid_field(
            "original_payment_reference_id",
            "field is immutable",
        ));
    }
    if new.sender.address != prior.sender.address {
        return Err(Error::invalid_field("sender.address", "field is immutable"));
    }
    if new.receiver.address != prior.receiver.address {
        return Err(Error::invalid_field(
            "receiver.address",
            "field is immutable",
        ));
    }
    if prior.recipient_signature.is_some() && new.recipient_signature != prior.recipient_signature {
        return Err(Error::invalid_field(
            "recipient_signature",
            "field is set once and can not be changed",
        ));
    }
    if prior.sender.kyc_data.is_some() && new.sender.kyc_data.is_none() {
        return Err(Error::invalid_field(
            "sender.kyc_data",
            "field is set once and can not be erased",
        ));
    }
    if prior.receiver.kyc_data.is_some() && new.receiver.kyc_data.is_none() {
        return Err(Error::invalid_field(
            "receiver.kyc_data",
            "field is set once and can not be erased",
        ));
    }
    Ok(())
}
