#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Travel-rule off-chain payment protocol engine for VASPs.
//!
//! Two regulated virtual-asset service providers run symmetric instances of
//! this engine and exchange signed payment commands over HTTPS: each side
//! independently evaluates counterparty KYC data, may ask for more, may
//! abort, and once both agree the sending side submits the on-chain
//! transaction carrying the travel-rule metadata.
//!
//! The protocol is driven by a declarative state machine over the payment
//! document itself (see [`offchain_state`]): states are predicates over the
//! document's fields rather than stored tags, so any peer mutation that does
//! not land on a known state is rejected wholesale.
//!
//! # Crates
//!
//! - [`offchain_types`] - Documents, canonical JSON, and the error taxonomy
//! - [`offchain_state`] - State machine kernel, payment catalog, validator
//! - [`offchain_client`] - Signed envelopes, account ids, HTTP client, RPC
//!
//! # Modules
//!
//! - [`engine`] - The dual-role protocol engine: record store, inbound
//!   handling, background action dispatch, send retries
//! - [`record`] - The per-reference-id record the engine persists
//! - [`server`] - Axum wiring for the `POST /v1/command` endpoint
//! - [`travel_rule`] - Canonical travel-rule metadata bytes
//! - [`wallet`] - The seam where wallet business logic plugs in
//!
//! # A payment, end to end
//!
//! ```ignore
//! let engine = Arc::new(PaymentEngine::new(client, keychain, wallet));
//! tokio::spawn(server::serve(engine.clone(), listener));
//!
//! // Sender kicks off the exchange against an intent from the receiver.
//! let reference_id = engine.pay("alice", &intent_id).await?;
//!
//! // Both sides tick their background queues until the exchange settles.
//! while let Some(outcome) = engine.run_once_background().await? {
//!     tracing::info!(?outcome, "background step");
//! }
//! ```

pub mod engine;
pub mod record;
pub mod server;
pub mod travel_rule;
pub mod wallet;

pub use engine::{ActionResult, EngineError, PaymentEngine, SendOutcome, TaskOutcome};
pub use record::Record;
pub use wallet::{KycEvaluation, KycReview, Wallet, WalletError};
