//! Account identifier and payment intent codec.
//!
//! On-chain accounts are addressed by 16-byte addresses; a counterparty-
//! addressable account id additionally carries an 8-byte subaddress and is
//! rendered bech32 under a network human-readable part. A payment intent is
//! a URI bundling an account id with the requested currency and amount.
//!
//! The protocol core treats account ids as opaque strings; the only contract
//! here is that decoding yields `(account_address, optional subaddress)` and
//! encoding is the inverse.

use bech32::{Bech32, Hrp};
use std::fmt;
use url::Url;

/// HRP for mainnet account ids.
pub const HRP_MAINNET: &str = "vra";
/// HRP for testnet account ids.
pub const HRP_TESTNET: &str = "tvra";

/// URI scheme of payment intents.
const INTENT_SCHEME: &str = "offchain";

pub const ACCOUNT_ADDRESS_LEN: usize = 16;
pub const SUBADDRESS_LEN: usize = 8;

pub type Subaddress = [u8; SUBADDRESS_LEN];

/// A 16-byte on-chain account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountAddress([u8; ACCOUNT_ADDRESS_LEN]);

impl AccountAddress {
    pub fn new(bytes: [u8; ACCOUNT_ADDRESS_LEN]) -> Self {
        AccountAddress(bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, IdentifierError> {
        let bytes = hex::decode(hex_str).map_err(|_| IdentifierError::InvalidAddressHex)?;
        let bytes: [u8; ACCOUNT_ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| IdentifierError::InvalidAddressHex)?;
        Ok(AccountAddress(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ADDRESS_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Errors from the account id and intent codecs.
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    #[error("account address must be {ACCOUNT_ADDRESS_LEN} hex-encoded bytes")]
    InvalidAddressHex,
    #[error("invalid human-readable part")]
    InvalidHrp,
    #[error("bech32: {0}")]
    Bech32(String),
    #[error("account id must carry exactly {want} bytes, got {got}")]
    InvalidPayloadLength { want: usize, got: usize },
    #[error("account id human-readable part {got} does not match {want}")]
    HrpMismatch { want: String, got: String },
    #[error("intent must use the {INTENT_SCHEME} scheme")]
    InvalidIntentScheme,
    #[error("intent is not a valid URI: {0}")]
    InvalidIntentUri(String),
    #[error("intent is missing the {0} parameter")]
    MissingIntentParam(&'static str),
    #[error("intent amount is not a non-negative integer")]
    InvalidIntentAmount,
}

/// Encodes an account address and optional subaddress into a bech32 account
/// id. An absent subaddress encodes as all zeros.
pub fn encode_account(
    address: AccountAddress,
    subaddress: Option<&Subaddress>,
    hrp: &str,
) -> Result<String, IdentifierError> {
    let hrp = Hrp::parse(hrp).map_err(|_| IdentifierError::InvalidHrp)?;
    let mut payload = [0u8; ACCOUNT_ADDRESS_LEN + SUBADDRESS_LEN];
    payload[..ACCOUNT_ADDRESS_LEN].copy_from_slice(address.as_bytes());
    if let Some(subaddress) = subaddress {
        payload[ACCOUNT_ADDRESS_LEN..].copy_from_slice(subaddress);
    }
    bech32::encode::<Bech32>(hrp, &payload).map_err(|e| IdentifierError::Bech32(e.to_string()))
}

/// Decodes a bech32 account id. A zero subaddress decodes as `None`.
pub fn decode_account(
    account_id: &str,
    hrp: &str,
) -> Result<(AccountAddress, Option<Subaddress>), IdentifierError> {
    let (got_hrp, payload) =
        bech32::decode(account_id).map_err(|e| IdentifierError::Bech32(e.to_string()))?;
    if got_hrp.as_str() != hrp {
        return Err(IdentifierError::HrpMismatch {
            want: hrp.to_string(),
            got: got_hrp.as_str().to_string(),
        });
    }
    if payload.len() != ACCOUNT_ADDRESS_LEN + SUBADDRESS_LEN {
        return Err(IdentifierError::InvalidPayloadLength {
            want: ACCOUNT_ADDRESS_LEN + SUBADDRESS_LEN,
            got: payload.len(),
        });
    }

    let mut address = [0u8; ACCOUNT_ADDRESS_LEN];
    address.copy_from_slice(&payload[..ACCOUNT_ADDRESS_LEN]);
    let mut subaddress = [0u8; SUBADDRESS_LEN];
    subaddress.copy_from_slice(&payload[ACCOUNT_ADDRESS_LEN..]);

    let subaddress = if subaddress == [0u8; SUBADDRESS_LEN] {
        None
    } else {
        Some(subaddress)
    };
    Ok((AccountAddress::new(address), subaddress))
}

/// Fresh random subaddress.
pub fn gen_subaddress() -> Subaddress {
    rand::random()
}

/// A decoded payment intent: who to pay, in what, and how much.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub account_id: String,
    pub currency: String,
    pub amount: u64,
}

/// Renders an intent URI, for example
/// `offchain://tvra1...?c=XUS&am=1000000`.
pub fn encode_intent(account_id: &str, currency: &str, amount: u64) -> String {
    format!("{INTENT_SCHEME}://{account_id}?c={currency}&am={amount}")
}

/// Parses an intent URI and checks its account id decodes under `hrp`.
pub fn decode_intent(intent_id: &str, hrp: &str) -> Result<Intent, IdentifierError> {
    let url =
        Url::parse(intent_id).map_err(|e| IdentifierError::InvalidIntentUri(e.to_string()))?;
    if url.scheme() != INTENT_SCHEME {
        return Err(IdentifierError::InvalidIntentScheme);
    }
    let account_id = url
        .host_str()
        .ok_or(IdentifierError::MissingIntentParam("account"))?
        .to_string();
    decode_account(&account_id, hrp)?;

    let mut currency = None;
    let mut amount = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "c" => currency = Some(value.to_string()),
            "am" => {
                amount = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| IdentifierError::InvalidIntentAmount)?,
                )
            }
            _ => {}
        }
    }

    Ok(Intent {
        account_id,
        currency: currency.ok_or(IdentifierError::MissingIntentParam("c"))?,
        amount: amount.ok_or(IdentifierError::MissingIntentParam("am"))?,
    })
}
