//! The payment document exchanged between two VASPs.
//!
//! A [`Payment`] carries everything both sides need to clear the travel rule
//! for one on-chain transfer: the two [`PaymentActor`]s with their statuses
//! and KYC data, the immutable [`PaymentAction`] (amount, currency), and the
//! receiver's signature over the travel-rule metadata once it is produced.
//!
//! Payments are immutable values. Each protocol step produces a fresh
//! document via [`update_payment`], which only ever rewrites the acting
//! role's own actor and the top-level `recipient_signature`; every other
//! field carries over unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use crate::role::Role;
use crate::{lit_str, lit_u64};

lit_str!(
    /// Discriminator for KYC payloads; always `"KYC_DATA"`.
    KycPayloadType,
    "KYC_DATA"
);

lit_u64!(
    /// KYC payload schema version; always `1`.
    KycPayloadVersion,
    1
);

lit_str!(
    /// The only payment action verb this protocol defines.
    ChargeAction,
    "charge"
);

/// Per-actor progress of the exchange.
///
/// Statuses are written only by the actor they belong to, and only along the
/// transitions the payment state machine allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No status set by this actor yet.
    None,
    /// This actor requires KYC data about the counterparty's subaddress.
    NeedsKycData,
    /// The transaction is ready for settlement according to this actor.
    ReadyForSettlement,
    /// This actor wishes to abort the payment instead of settling it.
    Abort,
    /// KYC screening soft-matched a watchlist entry; additional data needed.
    SoftMatch,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::None => "none",
            Status::NeedsKycData => "needs_kyc_data",
            Status::ReadyForSettlement => "ready_for_settlement",
            Status::Abort => "abort",
            Status::SoftMatch => "soft_match",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abort reason codes used in [`ActorStatus::abort_code`].
pub mod abort_code {
    /// The counterparty's KYC data was rejected.
    pub const REJECTED: &str = "rejected";
    /// The transfer is below the travel-rule threshold; no KYC exchange needed.
    pub const NO_KYC_NEEDED: &str = "no-kyc-needed";
}

/// An actor's status plus the abort reason when the status is [`Status::Abort`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorStatus {
    pub status: Status,
    /// Describes the reason for an abort. Only meaningful with [`Status::Abort`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_code: Option<String>,
    /// Additional human-readable detail about the abort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_message: Option<String>,
}

impl ActorStatus {
    pub fn new(status: Status) -> Self {
        ActorStatus {
            status,
            abort_code: None,
            abort_message: None,
        }
    }
}

/// Whether a KYC record describes a natural person or a legal entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycDataKind {
    Individual,
    Entity,
}

/// A physical address inside a KYC record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressData {
    /// The city, district, suburb, town, or village.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Two-letter ISO 3166-1 alpha-2 country code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// State, county, province, region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// National identification inside a KYC record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NationalId {
    /// The national ID value, for example a social security number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_value: Option<String>,
    /// Two-letter ISO 3166-1 alpha-2 country code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Indicates the type of the ID.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Know-your-customer data for one side of a payment.
///
/// The presence or absence of [`additional_kyc_data`](Self::additional_kyc_data)
/// is state-significant: attaching it is how an actor answers a counterparty's
/// soft-match, and the state machine distinguishes the two shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycData {
    #[serde(rename = "type")]
    pub kind: KycDataKind,
    pub payload_type: KycPayloadType,
    pub payload_version: KycPayloadVersion,
    /// Legal given name of the user this KYC record applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Legal surname of the user this KYC record applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressData>,
    /// Date of birth as an ISO 8601 calendar date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    /// Place of birth; `line1`/`line2` are not populated for this usage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_of_birth: Option<AddressData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<NationalId>,
    /// Name of the legal entity, when the subaddress represents one rather
    /// than an individual. A record carries either this or given/surname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_entity_name: Option<String>,
    /// Free-form payload used to clear a soft match. Suggested to be JSON,
    /// XML, or another human-readable form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_kyc_data: Option<String>,
}

impl KycData {
    /// A KYC record for a natural person, all identity fields unset.
    pub fn individual() -> Self {
        Self::new(KycDataKind::Individual)
    }

    /// A KYC record for a legal entity, all identity fields unset.
    pub fn entity() -> Self {
        Self::new(KycDataKind::Entity)
    }

    fn new(kind: KycDataKind) -> Self {
        KycData {
            kind,
            payload_type: KycPayloadType,
            payload_version: KycPayloadVersion,
            given_name: None,
            surname: None,
            address: None,
            dob: None,
            place_of_birth: None,
            national_id: None,
            legal_entity_name: None,
            additional_kyc_data: None,
        }
    }

    pub fn with_given_name(mut self, given_name: impl Into<String>) -> Self {
        self.given_name = Some(given_name.into());
        self
    }

    pub fn with_surname(mut self, surname: impl Into<String>) -> Self {
        self.surname = Some(surname.into());
        self
    }

    pub fn with_address(mut self, address: AddressData) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_national_id(mut self, national_id: NationalId) -> Self {
        self.national_id = Some(national_id);
        self
    }

    pub fn with_legal_entity_name(mut self, name: impl Into<String>) -> Self {
        self.legal_entity_name = Some(name.into());
        self
    }
}

/// One side of a payment: an addressable account plus its KYC state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentActor {
    /// Counterparty-addressable account id (bech32-like, includes subaddress).
    pub address: String,
    pub status: ActorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kyc_data: Option<KycData>,
    /// Opaque metadata the actor wants carried along.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<String>>,
}

impl PaymentActor {
    pub fn new(address: impl Into<String>, status: Status) -> Self {
        PaymentActor {
            address: address.into(),
            status: ActorStatus::new(status),
            kyc_data: None,
            metadata: None,
        }
    }

    pub fn with_kyc_data(mut self, kyc_data: KycData) -> Self {
        self.kyc_data = Some(kyc_data);
        self
    }
}

/// The immutable economic terms of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAction {
    /// Amount in the smallest units of `currency`.
    pub amount: u64,
    /// Currency code.
    pub currency: String,
    pub action: ChargeAction,
    /// Unix timestamp (seconds) at which the payment command was created.
    pub timestamp: u64,
}

impl PaymentAction {
    /// A charge action stamped with the current time.
    pub fn charge(amount: u64, currency: impl Into<String>) -> Self {
        PaymentAction {
            amount,
            currency: currency.into(),
            action: ChargeAction,
            timestamp: unix_now(),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The payment document both VASPs converge on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Globally unique id of the exchange, stable for its whole lifetime.
    pub reference_id: String,
    pub sender: PaymentActor,
    pub receiver: PaymentActor,
    pub action: PaymentAction,
    /// Reference id of an earlier payment this one supersedes, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_payment_reference_id: Option<String>,
    /// Hex of the receiver's signature over the travel-rule metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Field updates applied by [`update_payment`].
///
/// Unset fields keep their previous values; abort code and message are the
/// exception and always reflect exactly what the change carries, since a
/// status rewrite replaces the whole actor status.
#[derive(Debug, Clone, Default)]
pub struct PaymentChanges {
    status: Option<Status>,
    kyc_data: Option<KycData>,
    additional_kyc_data: Option<String>,
    abort_code: Option<String>,
    abort_message: Option<String>,
    recipient_signature: Option<String>,
}

impl PaymentChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kyc_data(mut self, kyc_data: KycData) -> Self {
        self.kyc_data = Some(kyc_data);
        self
    }

    pub fn additional_kyc_data(mut self, data: impl Into<String>) -> Self {
        self.additional_kyc_data = Some(data.into());
        self
    }

    pub fn abort(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.status = Some(Status::Abort);
        self.abort_code = Some(code.into());
        self.abort_message = Some(message.into());
        self
    }

    pub fn recipient_signature(mut self, signature_hex: impl Into<String>) -> Self {
        self.recipient_signature = Some(signature_hex.into());
        self
    }
}

/// Produces a fresh payment with `role`'s actor and the top-level
/// `recipient_signature` rewritten per `changes`.
///
/// This is the only way a payment evolves: the counterparty's actor, the
/// reference id, and the action are never touched.
pub fn update_payment(role: Role, payment: &Payment, changes: PaymentChanges) -> Payment {
    let actor = role.actor(payment);

    let status = ActorStatus {
        status: changes.status.unwrap_or(actor.status.status),
        abort_code: changes.abort_code,
        abort_message: changes.abort_message,
    };
    let mut kyc_data = changes.kyc_data.or_else(|| actor.kyc_data.clone());
    if let Some(additional) = changes.additional_kyc_data {
        // Additional KYC data attaches to an existing KYC record.
        if let Some(kyc) = kyc_data.as_mut() {
            kyc.additional_kyc_data = Some(additional);
        }
    }
    let actor = PaymentActor {
        address: actor.address.clone(),
        status,
        kyc_data,
        metadata: actor.metadata.clone(),
    };

    let mut updated = payment.clone();
    updated.recipient_signature = changes
        .recipient_signature
        .or_else(|| payment.recipient_signature.clone());
    match role {
        Role::Sender => updated.sender = actor,
        Role::Receiver => updated.receiver = actor,
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> Payment {
        Payment {
            reference_id: "ref-1".to_string(),
            sender: PaymentActor::new("sender-address", Status::NeedsKycData)
                .with_kyc_data(KycData::individual().with_given_name("foo")),
            receiver: PaymentActor::new("receiver-address", Status::None),
            action: PaymentAction::charge(1_000, "XUS"),
            original_payment_reference_id: None,
            recipient_signature: None,
            description: None,
        }
    }

    #[test]
    fn update_payment_rewrites_only_the_acting_role() {
        let p = payment();
        let updated = update_payment(
            Role::Receiver,
            &p,
            PaymentChanges::new()
                .status(Status::ReadyForSettlement)
                .kyc_data(KycData::individual().with_given_name("bar"))
                .recipient_signature("cafe"),
        );

        assert_eq!(updated.sender, p.sender);
        assert_eq!(updated.receiver.status.status, Status::ReadyForSettlement);
        assert_eq!(
            updated.receiver.kyc_data.as_ref().unwrap().given_name,
            Some("bar".to_string())
        );
        assert_eq!(updated.recipient_signature, Some("cafe".to_string()));
        assert_eq!(updated.reference_id, p.reference_id);
        assert_eq!(updated.action, p.action);
    }

    #[test]
    fn update_payment_attaches_additional_kyc_data() {
        let p = payment();
        let updated = update_payment(
            Role::Sender,
            &p,
            PaymentChanges::new().additional_kyc_data("secret"),
        );

        let kyc = updated.sender.kyc_data.unwrap();
        assert_eq!(kyc.given_name, Some("foo".to_string()));
        assert_eq!(kyc.additional_kyc_data, Some("secret".to_string()));
        // Status untouched.
        assert_eq!(updated.sender.status.status, Status::NeedsKycData);
    }

    #[test]
    fn update_payment_does_not_carry_abort_fields_over() {
        let p = payment();
        let aborted = update_payment(
            Role::Receiver,
            &p,
            PaymentChanges::new().abort(abort_code::REJECTED, "nope"),
        );
        assert_eq!(aborted.receiver.status.status, Status::Abort);
        assert_eq!(
            aborted.receiver.status.abort_code,
            Some(abort_code::REJECTED.to_string())
        );

        // A later status rewrite starts from a clean status object.
        let cleared = update_payment(
            Role::Receiver,
            &aborted,
            PaymentChanges::new().status(Status::NeedsKycData),
        );
        assert_eq!(cleared.receiver.status.abort_code, None);
        assert_eq!(cleared.receiver.status.abort_message, None);
    }

    #[test]
    fn update_payment_keeps_recipient_signature_when_unset() {
        let p = payment();
        let signed = update_payment(
            Role::Receiver,
            &p,
            PaymentChanges::new().recipient_signature("beef"),
        );
        let later = update_payment(
            Role::Sender,
            &signed,
            PaymentChanges::new().status(Status::ReadyForSettlement),
        );
        assert_eq!(later.recipient_signature, Some("beef".to_string()));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            Status::None,
            Status::NeedsKycData,
            Status::ReadyForSettlement,
            Status::Abort,
            Status::SoftMatch,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: Status = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn unknown_status_rejected() {
        assert!(serde_json::from_str::<Status>("\"pending\"").is_err());
    }

    #[test]
    fn kyc_payload_literals_enforced() {
        let kyc = KycData::individual();
        let json = serde_json::to_value(&kyc).unwrap();
        assert_eq!(json["payload_type"], "KYC_DATA");
        assert_eq!(json["payload_version"], 1);

        let bad = r#"{"type":"individual","payload_type":"KYC_DATA","payload_version":2}"#;
        assert!(serde_json::from_str::<KycData>(bad).is_err());
        let bad = r#"{"type":"individual","payload_type":"OTHER","payload_version":1}"#;
        assert!(serde_json::from_str::<KycData>(bad).is_err());
    }
}
