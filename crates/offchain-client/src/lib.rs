#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Off-chain HTTP client and its narrow external collaborators.
//!
//! [`OffChainClient`] signs outbound command requests, verifies inbound
//! envelopes, resolves counterparties to their service endpoint and
//! compliance key, and classifies responses. The collaborators it composes
//! each have a deliberately small contract:
//!
//! - [`envelope`] - Detached-payload signed envelope codec (JWS-like,
//!   EdDSA), plus the [`Keychain`](envelope::Keychain) signing seam
//! - [`identifier`] - Bech32 account ids with optional subaddresses and
//!   payment intent URIs
//! - [`rpc`] - The on-chain RPC contract: account lookup, endpoint and
//!   compliance key discovery, travel-rule transaction submission

pub mod client;
pub mod envelope;
pub mod identifier;
pub mod rpc;

pub use client::{ClientError, OffChainClient, http_header};
pub use envelope::{ComplianceKey, EnvelopeError, Keychain};
pub use identifier::{AccountAddress, IdentifierError, Intent, SUBADDRESS_LEN, Subaddress};
pub use rpc::{AccountInfo, ChainClient, RpcError, TravelRuleTransfer};
