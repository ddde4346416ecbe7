//! The on-chain RPC collaborator contract.
//!
//! The protocol core needs three things from the chain: who an account
//! belongs to, where a VASP serves its off-chain API and with which
//! compliance key, and a way to submit the settlement transaction and wait
//! for it. Everything else about the chain stays behind this trait.

use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;
use url::Url;

use crate::identifier::AccountAddress;

/// Role information for an on-chain account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    /// The parent VASP this account hangs off, when it is a child account.
    pub parent_vasp_address: Option<AccountAddress>,
}

/// A peer-to-peer transfer carrying travel-rule metadata.
#[derive(Debug, Clone)]
pub struct TravelRuleTransfer {
    /// The (child) account the funds leave from.
    pub sender_address: AccountAddress,
    pub payee_address: AccountAddress,
    /// Amount in the smallest units of `currency`.
    pub amount: u64,
    pub currency: String,
    /// Canonical travel-rule metadata attached to the transaction.
    pub metadata: Vec<u8>,
    /// The receiving VASP's signature over the metadata signing message.
    pub metadata_signature: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("account {0} not found")]
    AccountNotFound(AccountAddress),
    #[error("account {0} has no off-chain endpoint or compliance key")]
    NoOffChainEndpoint(AccountAddress),
    #[error("transaction rejected: {0}")]
    TransactionRejected(String),
    #[error("transport: {0}")]
    Transport(String),
}

/// Narrow client for the chain this protocol settles on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Looks up an account's role information.
    async fn account_info(&self, address: AccountAddress) -> Result<AccountInfo, RpcError>;

    /// Resolves an account to its VASP's off-chain base URL and compliance
    /// key, following a child account through to its parent VASP record.
    async fn base_url_and_compliance_key(
        &self,
        address: AccountAddress,
    ) -> Result<(Url, VerifyingKey), RpcError>;

    /// Submits the settlement transaction and waits for execution.
    async fn submit_travel_rule(&self, transfer: TravelRuleTransfer) -> Result<(), RpcError>;
}
