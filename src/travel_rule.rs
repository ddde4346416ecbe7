//! Canonical travel-rule metadata bytes.
//!
//! The settlement transaction carries a metadata blob binding it to the
//! off-chain exchange, and the receiving VASP signs a domain-separated
//! message derived from it. Both sides must derive identical bytes, so the
//! rendering is fixed: `reference_id|sender_address_hex|amount`.

use offchain_client::AccountAddress;

/// Domain separator appended to the metadata to form the signing message.
const ATTESTATION_SUFFIX: &[u8] = b"@@$$OFFCHAIN_ATTEST$$@@";

/// Returns `(metadata, signing_message)` for one settlement.
///
/// `metadata` goes onto the on-chain transaction; `signing_message` is what
/// the receiver's compliance key signs to produce `recipient_signature`.
pub fn metadata(
    reference_id: &str,
    sender_address: AccountAddress,
    amount: u64,
) -> (Vec<u8>, Vec<u8>) {
    let metadata = format!("{reference_id}|{}|{amount}", sender_address.to_hex()).into_bytes();
    let mut signing_message = metadata.clone();
    signing_message.extend_from_slice(ATTESTATION_SUFFIX);
    (metadata, signing_message)
}
