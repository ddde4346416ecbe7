//! The off-chain HTTP client.
//!
//! One [`OffChainClient`] serves one parent VASP. It signs outbound command
//! requests, verifies inbound envelopes against the signer's on-chain
//! compliance key, resolves which side of a payment the local VASP is on,
//! and classifies peer responses into success or failure.

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::VerifyingKey;
use url::Url;
use uuid::Uuid;

use offchain_state::{summary, validate};
use offchain_types::{
    Command, CommandRequest, CommandResponse, Error, Payment, ResponseStatus, Role,
};

use crate::envelope::{self, EnvelopeError, Keychain};
use crate::identifier::{self, AccountAddress, IdentifierError};
use crate::rpc::{ChainClient, RpcError};

/// Connect timeout for outbound command posts.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Total timeout for outbound command posts.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Required HTTP headers of the wire endpoint.
pub mod http_header {
    /// Per-HTTP-attempt correlation id (distinct from the envelope cid).
    pub const X_REQUEST_ID: &str = "X-Request-ID";
    /// The sending VASP's parent account id; the receiver looks the
    /// verification key up under it.
    pub const X_VERIFICATION_KEY_ADDRESS: &str = "X-Verification-Key-Address";
}

/// Failures of the outbound send path.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),
    #[error("envelope: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("rpc: {0}")]
    Rpc(#[from] RpcError),
    #[error("identifier: {0}")]
    Identifier(#[from] IdentifierError),
    /// The peer answered with a well-formed failure response.
    #[error("peer rejected command: {0:?}")]
    CommandFailure(CommandResponse),
}

/// Off-chain API client for one parent VASP.
pub struct OffChainClient {
    parent_vasp_address: AccountAddress,
    parent_vasp_account_id: String,
    hrp: String,
    chain: Arc<dyn ChainClient>,
    http: reqwest::Client,
}

impl OffChainClient {
    pub fn new(
        parent_vasp_address: AccountAddress,
        hrp: impl Into<String>,
        chain: Arc<dyn ChainClient>,
    ) -> Result<Self, ClientError> {
        let hrp = hrp.into();
        let parent_vasp_account_id = identifier::encode_account(parent_vasp_address, None, &hrp)?;
        let http = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(OffChainClient {
            parent_vasp_address,
            parent_vasp_account_id,
            hrp,
            chain,
            http,
        })
    }

    pub fn parent_vasp_address(&self) -> AccountAddress {
        self.parent_vasp_address
    }

    /// The local parent VASP as a bech32 account id, the value sent in the
    /// `X-Verification-Key-Address` header.
    pub fn parent_vasp_account_id(&self) -> &str {
        &self.parent_vasp_account_id
    }

    pub fn hrp(&self) -> &str {
        &self.hrp
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    /// Signs and posts `request` to the counterparty's `/v1/command`.
    ///
    /// The counterparty is whoever plays the opposite of `role` in the
    /// request's payment. 4xx/5xx and failure-status responses surface as
    /// [`ClientError`]; the caller owns retries.
    #[tracing::instrument(skip_all, fields(cid = %request.cid, role = %role))]
    pub async fn send_request(
        &self,
        role: Role,
        request: &CommandRequest,
        keychain: &dyn Keychain,
    ) -> Result<CommandResponse, ClientError> {
        let payment = &request.command.payment;
        let counterparty_id = &role.opposite().actor(payment).address;
        let (base_url, counterparty_key) = self.base_url_and_compliance_key(counterparty_id).await?;

        let body = envelope::sign_json(request, keychain)?;
        let endpoint = command_endpoint(&base_url);
        tracing::debug!(%endpoint, "sending command request");
        let response = self
            .http
            .post(endpoint)
            .header(http_header::X_REQUEST_ID, Uuid::new_v4().simple().to_string())
            .header(
                http_header::X_VERIFICATION_KEY_ADDRESS,
                &self.parent_vasp_account_id,
            )
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        let bytes = response.bytes().await?;
        let response: CommandResponse = envelope::verify_json(&bytes, &counterparty_key)?;
        if response.status == ResponseStatus::Failure {
            return Err(ClientError::CommandFailure(response));
        }
        Ok(response)
    }

    /// Verifies an inbound envelope against the signer's compliance key and
    /// decodes the command request inside.
    pub async fn verify_request(
        &self,
        key_account_id: &str,
        request_bytes: &[u8],
    ) -> Result<CommandRequest, Error> {
        let (_, key) = self
            .base_url_and_compliance_key(key_account_id)
            .await
            .map_err(|e| {
                Error::invalid_request(format!(
                    "could not resolve verification key of {key_account_id}: {e}"
                ))
            })?;
        envelope::verify_json(request_bytes, &key)
            .map_err(|e| Error::invalid_request(format!("deserialize request envelope failed: {e}")))
    }

    /// Validates an inbound command against the stored prior, returning the
    /// local role on success.
    pub async fn validate_inbound_command(
        &self,
        command: &Command,
        prior: Option<&Command>,
    ) -> Result<Role, Error> {
        let my_role = self.my_role(&command.payment).await?;
        validate::inbound_payment(
            &command.payment,
            my_role.opposite(),
            prior.map(|c| &c.payment),
        )?;
        Ok(my_role)
    }

    /// Which side of `payment` the local parent VASP is on.
    pub async fn my_role(&self, payment: &Payment) -> Result<Role, Error> {
        if self.is_my_account_id(&payment.sender.address).await? {
            return Ok(Role::Sender);
        }
        if self.is_my_account_id(&payment.receiver.address).await? {
            return Ok(Role::Receiver);
        }
        Err(Error::invalid_request(format!(
            "unknown actor addresses: {}",
            summary(payment)
        )))
    }

    /// An account id resolves locally iff its account address is the local
    /// parent VASP's, or the chain says its parent is.
    async fn is_my_account_id(&self, account_id: &str) -> Result<bool, Error> {
        let (address, _) = identifier::decode_account(account_id, &self.hrp)
            .map_err(|e| Error::invalid_request(format!("invalid account id {account_id}: {e}")))?;
        if address == self.parent_vasp_address {
            return Ok(true);
        }
        let info = self.chain.account_info(address).await.map_err(|e| {
            Error::invalid_request(format!("could not look up account {address}: {e}"))
        })?;
        Ok(info.parent_vasp_address == Some(self.parent_vasp_address))
    }

    async fn base_url_and_compliance_key(
        &self,
        account_id: &str,
    ) -> Result<(Url, VerifyingKey), ClientError> {
        let (address, _) = identifier::decode_account(account_id, &self.hrp)?;
        Ok(self.chain.base_url_and_compliance_key(address).await?)
    }
}

/// `{base_url}/v1/command`, tolerant of trailing slashes.
fn command_endpoint(base_url: &Url) -> String {
    format!("{}/v1/command", base_url.as_str().trim_end_matches('/'))
}
