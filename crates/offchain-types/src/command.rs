//! Command request and response envelopes.
//!
//! A [`CommandRequest`] wraps one [`Command`] (today always a payment
//! command) under a fresh correlation id (`cid`). The peer answers with a
//! [`CommandResponse`] echoing that cid and either `success` or `failure`
//! plus the errors that caused it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OffChainError;
use crate::lit_str;
use crate::payment::{KycData, Payment, PaymentAction, PaymentActor, Status};

lit_str!(
    /// Command discriminator; this engine only speaks payment commands.
    PaymentCommandTag,
    "PaymentCommand"
);

lit_str!(
    /// `_ObjectType` of a command request.
    CommandRequestTag,
    "CommandRequestObject"
);

lit_str!(
    /// `_ObjectType` of a command response.
    CommandResponseTag,
    "CommandResponseObject"
);

/// A command over a payment document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "_ObjectType")]
    pub object_type: PaymentCommandTag,
    /// Creates a new payment or updates an existing one. An invalid initial
    /// or update payment results in a command error.
    pub payment: Payment,
}

impl Command {
    pub fn payment(payment: Payment) -> Self {
        Command {
            object_type: PaymentCommandTag,
            payment,
        }
    }

    /// Canonical JSON of this command, the byte-equality key for idempotent
    /// inbound handling.
    pub fn canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One signed request from VASP to VASP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Unique identifier of this command attempt, 128-bit hex.
    pub cid: String,
    pub command_type: PaymentCommandTag,
    pub command: Command,
    #[serde(rename = "_ObjectType")]
    pub object_type: CommandRequestTag,
}

impl CommandRequest {
    /// Wraps a payment into a request under a fresh cid.
    pub fn for_payment(payment: Payment) -> Self {
        CommandRequest {
            cid: new_cid(),
            command_type: PaymentCommandTag,
            command: Command::payment(payment),
            object_type: CommandRequestTag,
        }
    }

    /// Builds the initial payment request of a new exchange: sender asks for
    /// KYC data and attaches its own, receiver has no status yet.
    pub fn initial_payment(
        sender_account_id: impl Into<String>,
        sender_kyc_data: KycData,
        receiver_account_id: impl Into<String>,
        amount: u64,
        currency: impl Into<String>,
    ) -> Self {
        let payment = Payment {
            reference_id: new_reference_id(),
            sender: PaymentActor::new(sender_account_id, Status::NeedsKycData)
                .with_kyc_data(sender_kyc_data),
            receiver: PaymentActor::new(receiver_account_id, Status::None),
            action: PaymentAction::charge(amount, currency),
            original_payment_reference_id: None,
            recipient_signature: None,
            description: None,
        };
        Self::for_payment(payment)
    }

    pub fn reference_id(&self) -> &str {
        &self.command.payment.reference_id
    }
}

/// Outcome reported in a [`CommandResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// The peer's answer to a [`CommandRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: ResponseStatus,
    #[serde(rename = "_ObjectType")]
    pub object_type: CommandResponseTag,
    /// Details on errors when status is `failure`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Vec<OffChainError>>,
    /// Echoes the request cid when it could be recovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

impl CommandResponse {
    pub fn success(cid: impl Into<String>) -> Self {
        CommandResponse {
            status: ResponseStatus::Success,
            object_type: CommandResponseTag,
            error: None,
            cid: Some(cid.into()),
        }
    }

    /// A failure response; `cid` is `None` when the request never decoded
    /// far enough to know it.
    pub fn failure(cid: Option<String>, errors: Vec<OffChainError>) -> Self {
        CommandResponse {
            status: ResponseStatus::Failure,
            object_type: CommandResponseTag,
            error: Some(errors),
            cid,
        }
    }
}

/// Fresh 128-bit hex correlation id.
pub fn new_cid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Fresh globally unique payment reference id.
pub fn new_reference_id() -> String {
    Uuid::new_v4().simple().to_string()
}
