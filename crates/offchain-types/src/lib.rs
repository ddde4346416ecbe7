#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Wire and document types for the travel-rule off-chain payment protocol.
//!
//! Two regulated VASPs exchange signed payment commands over HTTPS before one
//! of them settles the transaction on-chain. This crate defines the documents
//! they exchange and the canonical JSON rules both sides must agree on:
//!
//! - [`payment`] - The payment document: actors, statuses, KYC data, action
//! - [`command`] - Command request/response envelopes wrapping a payment
//! - [`error`] - The off-chain error taxonomy (command vs protocol errors)
//! - [`role`] - Sender/receiver roles and the follow-up actions they owe
//! - [`util`] - Literal-valued field markers (`_ObjectType` tags and friends)
//!
//! # Canonical JSON
//!
//! Every document serializes to JSON with absent optional fields omitted and
//! enumerations rendered as strings. Constant-valued fields (for example
//! `payload_type`, which is always `"KYC_DATA"`) are zero-sized marker types
//! that serialize to their constant and refuse anything else on decode, so a
//! decoded document is structurally valid by construction. For every valid
//! document `decode(encode(x)) == x`.

pub mod command;
pub mod error;
pub mod payment;
pub mod role;
pub mod util;

pub use command::*;
pub use error::*;
pub use payment::*;
pub use role::*;
