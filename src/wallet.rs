//! The seam where wallet business logic plugs into the engine.
//!
//! The engine owns every payment mutation; the wallet only supplies the
//! inputs it cannot know: which account pays for a user, what KYC data to
//! present for a local account, and whether counterparty KYC data passes
//! screening. Real deployments back this with user records and a screening
//! provider; tests script the decisions.

use async_trait::async_trait;

use offchain_types::KycData;

/// Outcome of first-pass KYC screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KycEvaluation {
    Accept,
    /// Possibly matches a watchlist entry; additional KYC data needed.
    SoftMatch,
    Reject,
}

/// Outcome of reviewing KYC data after additional data arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KycReview {
    Accept,
    Reject,
}

/// A failure inside wallet-provided logic.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct WalletError(pub String);

impl WalletError {
    pub fn new(message: impl Into<String>) -> Self {
        WalletError(message.into())
    }
}

/// Wallet callbacks the engine drives follow-up actions through.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// A fresh counterparty-addressable account id (with a new subaddress)
    /// for `user_id` to pay from.
    fn payment_account_id(&self, user_id: &str) -> Result<String, WalletError>;

    /// KYC data for the local user behind `account_id`.
    fn kyc_data(&self, account_id: &str) -> Result<KycData, WalletError>;

    /// Free-form additional KYC payload used to clear a counterparty's
    /// soft match against the local user behind `account_id`.
    fn additional_kyc_data(&self, account_id: &str) -> Result<String, WalletError>;

    /// Screens counterparty KYC data on first sight.
    async fn evaluate_kyc_data(&self, counterparty: &KycData)
    -> Result<KycEvaluation, WalletError>;

    /// Re-screens counterparty KYC data after additional data arrived.
    async fn review_kyc_data(&self, counterparty: &KycData) -> Result<KycReview, WalletError>;
}
