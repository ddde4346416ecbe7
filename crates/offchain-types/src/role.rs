//! Roles and follow-up actions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payment::{Payment, PaymentActor};

/// Which side of a payment the local VASP is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    pub fn opposite(&self) -> Role {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }

    /// The actor this role owns inside a payment.
    pub fn actor<'a>(&self, payment: &'a Payment) -> &'a PaymentActor {
        match self {
            Role::Sender => &payment.sender,
            Role::Receiver => &payment.receiver,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => f.write_str("sender"),
            Role::Receiver => f.write_str("receiver"),
        }
    }
}

/// Business logic one side owes the exchange at a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Screen the counterparty's KYC data and advance, soft-match, or abort.
    EvaluateKycData,
    /// Re-screen after additional KYC data arrived for a soft match.
    ReviewKycData,
    /// Attach additional KYC data to answer the counterparty's soft match.
    ClearSoftMatch,
    /// Submit the settlement transaction on-chain.
    SubmitTxn,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::EvaluateKycData => "evaluate_kyc_data",
            Action::ReviewKycData => "review_kyc_data",
            Action::ClearSoftMatch => "clear_soft_match",
            Action::SubmitTxn => "submit_transaction",
        };
        f.write_str(name)
    }
}
