//! The dual-role protocol engine.
//!
//! One [`PaymentEngine`] serves one VASP and plays sender or receiver per
//! payment. It keeps one [`Record`] per reference id, routes inbound
//! requests through verify/validate/persist, schedules follow-up actions on
//! a FIFO background queue, and retries failed sends from the same queue.
//!
//! Ordering and locking: every record lives behind its own per-reference-id
//! mutex. Inbound handling holds that lock across validate-and-persist, and
//! background tasks that mutate a record hold it across load-and-persist, so
//! two conflicting updates for one reference id can never both pass
//! validation against the same prior. Network I/O always happens off the
//! lock. Local updates persist before they are sent; a failed send never
//! rolls a record back, it queues a retry of the same request, and the
//! peer's byte-equality replay check makes the retry idempotent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use offchain_client::envelope;
use offchain_client::identifier::{self, IdentifierError};
use offchain_client::{
    ChainClient, ClientError, Keychain, OffChainClient, RpcError, TravelRuleTransfer,
};
use offchain_state::machine::MachineError;
use offchain_state::payment_states::{follow_up_action, payment_machine};
use offchain_types::{
    Action, CommandRequest, CommandResponse, Error, KycData, Payment, PaymentChanges, Role, Status,
    abort_code, update_payment,
};

use crate::record::Record;
use crate::travel_rule;
use crate::wallet::{KycEvaluation, KycReview, Wallet, WalletError};

/// Result of one follow-up action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionResult {
    Pass,
    Reject,
    SoftMatch,
    SentAdditionalKycData,
    TxnExecuted,
}

/// Result of one send attempt; `Failed` means a retry is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    Failed,
}

/// What one background task did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// A follow-up action ran against a record.
    Action(Action, ActionResult),
    /// A pure send (retry) task ran.
    Send(SendOutcome),
}

/// Failures of engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    OffChain(#[from] Error),
    #[error("client: {0}")]
    Client(#[from] ClientError),
    #[error("rpc: {0}")]
    Rpc(#[from] RpcError),
    #[error("identifier: {0}")]
    Identifier(#[from] IdentifierError),
    #[error("wallet: {0}")]
    Wallet(#[from] WalletError),
    #[error("encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state: {0}")]
    Machine(#[from] MachineError),
    #[error("no record for reference id {0}")]
    UnknownReferenceId(String),
}

/// How an inbound command failed, deciding the HTTP status.
enum InboundError {
    /// The command was rejected; answered with a 400 failure response.
    Rejected(Error),
    /// Something local broke; surfaces as HTTP 500.
    Internal(EngineError),
}

/// One queued unit of background work.
///
/// Follow-up tasks capture only `(action, reference_id)` and re-fetch the
/// record when they run, never a record snapshot; retry tasks capture the
/// exact `(request, role)` they re-send.
enum Task {
    FollowUp { action: Action, reference_id: String },
    RetrySend { request: Box<CommandRequest>, role: Role },
}

/// The per-VASP protocol engine.
pub struct PaymentEngine {
    client: OffChainClient,
    keychain: Arc<dyn Keychain>,
    wallet: Arc<dyn Wallet>,
    /// One slot per reference id; the slot mutex is the per-payment lock.
    records: DashMap<String, Arc<AsyncMutex<Option<Record>>>>,
    /// FIFO queue of follow-up actions and send retries.
    tasks: Mutex<VecDeque<Task>>,
}

impl PaymentEngine {
    pub fn new(client: OffChainClient, keychain: Arc<dyn Keychain>, wallet: Arc<dyn Wallet>) -> Self {
        PaymentEngine {
            client,
            keychain,
            wallet,
            records: DashMap::new(),
            tasks: Mutex::new(VecDeque::new()),
        }
    }

    pub fn client(&self) -> &OffChainClient {
        &self.client
    }

    fn chain(&self) -> &Arc<dyn ChainClient> {
        self.client.chain()
    }

    // --------------------- end user interaction --------------------------

    /// Starts a payment from `user_id` against a receiver-issued intent.
    ///
    /// Builds the initial payment, persists it, then attempts the first
    /// send; a failed send is retried from the background queue. Returns
    /// the payment's reference id.
    pub async fn pay(&self, user_id: &str, intent_id: &str) -> Result<String, EngineError> {
        let intent = identifier::decode_intent(intent_id, self.client.hrp())?;
        let account_id = self.wallet.payment_account_id(user_id)?;
        let kyc_data = self.wallet.kyc_data(&account_id)?;
        let request = CommandRequest::initial_payment(
            account_id,
            kyc_data,
            intent.account_id,
            intent.amount,
            intent.currency,
        );
        let reference_id = request.reference_id().to_string();

        {
            let slot = self.slot(&reference_id);
            let mut guard = slot.lock().await;
            self.save_record(&mut guard, &request, Role::Sender)?;
        }
        self.send_request(request, Role::Sender).await;
        Ok(reference_id)
    }

    // --------------------- inbound handling --------------------------

    /// Handles one `POST /v1/command` body, returning the HTTP status code
    /// and the signed response envelope.
    pub async fn process_inbound(
        &self,
        x_request_id: &str,
        key_account_id: &str,
        request_bytes: &[u8],
    ) -> (u16, Vec<u8>) {
        let request = match self.client.verify_request(key_account_id, request_bytes).await {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(x_request_id, %error, "inbound envelope rejected");
                let response = CommandResponse::failure(None, vec![error.object]);
                return (400, self.seal_response(&response));
            }
        };

        let cid = request.cid.clone();
        match self.apply_inbound(&request).await {
            Ok(()) => (200, self.seal_response(&CommandResponse::success(cid))),
            Err(InboundError::Rejected(error)) => {
                tracing::warn!(x_request_id, %cid, %error, "inbound command rejected");
                let response = CommandResponse::failure(Some(cid), vec![error.object]);
                (400, self.seal_response(&response))
            }
            Err(InboundError::Internal(error)) => {
                tracing::error!(x_request_id, %cid, %error, "inbound command failed internally");
                (500, Vec::new())
            }
        }
    }

    /// Validate-and-persist under the per-reference-id lock.
    async fn apply_inbound(&self, request: &CommandRequest) -> Result<(), InboundError> {
        let reference_id = request.reference_id().to_string();
        let slot = self.slot(&reference_id);
        let mut guard = slot.lock().await;

        let incoming_json = request
            .command
            .canonical_json()
            .map_err(|e| InboundError::Internal(e.into()))?;
        if let Some(record) = guard.as_ref() {
            // Idempotent replay: a byte-equal command is a no-op.
            if record.cmd_json == incoming_json {
                tracing::debug!(%reference_id, cid = %request.cid, "replayed command, no-op");
                return Ok(());
            }
        }

        let prior_command = match guard.as_ref() {
            Some(record) => Some(
                record
                    .command()
                    .map_err(|e| InboundError::Internal(e.into()))?,
            ),
            None => None,
        };
        let my_role = self
            .client
            .validate_inbound_command(&request.command, prior_command.as_ref())
            .await
            .map_err(InboundError::Rejected)?;
        self.save_record(&mut guard, request, my_role)
            .map_err(InboundError::Internal)?;
        tracing::info!(%reference_id, cid = %request.cid, role = %my_role, "accepted inbound command");
        Ok(())
    }

    /// Signs a response envelope with the local compliance key.
    pub fn seal_response(&self, response: &CommandResponse) -> Vec<u8> {
        match envelope::sign_json(response, self.keychain.as_ref()) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(%error, "could not seal response envelope");
                Vec::new()
            }
        }
    }

    // --------------------- background queue --------------------------

    /// Pops and runs one background task. `Ok(None)` means the queue is
    /// empty.
    pub async fn run_once_background(&self) -> Result<Option<TaskOutcome>, EngineError> {
        let task = {
            let mut queue = self.lock_tasks();
            queue.pop_front()
        };
        match task {
            Some(Task::FollowUp {
                action,
                reference_id,
            }) => self.business_action(action, &reference_id).await.map(Some),
            Some(Task::RetrySend { request, role }) => Ok(Some(TaskOutcome::Send(
                self.send_request(*request, role).await,
            ))),
            None => Ok(None),
        }
    }

    /// Number of queued background tasks.
    pub fn background_task_count(&self) -> usize {
        self.lock_tasks().len()
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enqueue(&self, task: Task) {
        self.lock_tasks().push_back(task);
    }

    // --------------------- record store --------------------------

    fn slot(&self, reference_id: &str) -> Arc<AsyncMutex<Option<Record>>> {
        Arc::clone(self.records.entry(reference_id.to_string()).or_default().value())
    }

    /// A snapshot of the record for `reference_id`, if any.
    pub async fn record(&self, reference_id: &str) -> Option<Record> {
        let slot = {
            let entry = self.records.get(reference_id)?;
            Arc::clone(entry.value())
        };
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Snapshots of every stored record.
    pub async fn records(&self) -> Vec<Record> {
        let slots: Vec<Arc<AsyncMutex<Option<Record>>>> = self
            .records
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(record) = slot.lock().await.clone() {
                records.push(record);
            }
        }
        records
    }

    /// Persists the record and queues the follow-up the new state assigns to
    /// the local role, if any. Callers hold the slot lock.
    fn save_record(
        &self,
        slot: &mut Option<Record>,
        request: &CommandRequest,
        role: Role,
    ) -> Result<(), EngineError> {
        let record = Record::new(request, role)?;
        let state = payment_machine().match_state(&request.command.payment)?;
        if let Some(action) = follow_up_action(role, state) {
            let reference_id = record.reference_id.clone();
            tracing::debug!(%reference_id, %action, state = %state, "queueing follow-up action");
            self.enqueue(Task::FollowUp {
                action,
                reference_id,
            });
        }
        *slot = Some(record);
        Ok(())
    }

    // --------------------- business actions --------------------------

    /// Runs one follow-up action against the current record.
    ///
    /// The record is re-fetched under the slot lock rather than captured at
    /// enqueue time, since another task may have moved it since.
    async fn business_action(
        &self,
        action: Action,
        reference_id: &str,
    ) -> Result<TaskOutcome, EngineError> {
        let slot = self.slot(reference_id);
        let mut guard = slot.lock().await;
        let (role, payment) = {
            let record = guard
                .as_ref()
                .ok_or_else(|| EngineError::UnknownReferenceId(reference_id.to_string()))?;
            (record.role, record.payment()?)
        };

        let (result, outbound) = match action {
            Action::EvaluateKycData => self.evaluate_kyc_data(&mut guard, role, &payment).await?,
            Action::ReviewKycData => self.review_kyc_data(&mut guard, role, &payment).await?,
            Action::ClearSoftMatch => self.clear_soft_match(&mut guard, role, &payment)?,
            Action::SubmitTxn => {
                // Settlement mutates no record; run it off the lock.
                drop(guard);
                self.submit_travel_rule_txn(&payment).await?;
                return Ok(TaskOutcome::Action(action, ActionResult::TxnExecuted));
            }
        };
        drop(guard);

        if let Some(request) = outbound {
            self.send_request(request, role).await;
        }
        Ok(TaskOutcome::Action(action, result))
    }

    async fn evaluate_kyc_data(
        &self,
        slot: &mut Option<Record>,
        role: Role,
        payment: &Payment,
    ) -> Result<(ActionResult, Option<CommandRequest>), EngineError> {
        let counterparty_kyc = self.counterparty_kyc_data(role, payment)?;
        match self.wallet.evaluate_kyc_data(&counterparty_kyc).await? {
            KycEvaluation::SoftMatch => {
                let request = self.update_record(
                    slot,
                    role,
                    payment,
                    PaymentChanges::new().status(Status::SoftMatch),
                )?;
                Ok((ActionResult::SoftMatch, Some(request)))
            }
            KycEvaluation::Accept => {
                let request = self.accept_counterparty_kyc(slot, role, payment)?;
                Ok((ActionResult::Pass, Some(request)))
            }
            KycEvaluation::Reject => {
                let request = self.abort(slot, role, payment, "evaluate kyc data: reject")?;
                Ok((ActionResult::Reject, Some(request)))
            }
        }
    }

    async fn review_kyc_data(
        &self,
        slot: &mut Option<Record>,
        role: Role,
        payment: &Payment,
    ) -> Result<(ActionResult, Option<CommandRequest>), EngineError> {
        let counterparty_kyc = self.counterparty_kyc_data(role, payment)?;
        match self.wallet.review_kyc_data(&counterparty_kyc).await? {
            KycReview::Accept => {
                let request = self.accept_counterparty_kyc(slot, role, payment)?;
                Ok((ActionResult::Pass, Some(request)))
            }
            KycReview::Reject => {
                let request = self.abort(slot, role, payment, "review kyc data: reject")?;
                Ok((ActionResult::Reject, Some(request)))
            }
        }
    }

    fn clear_soft_match(
        &self,
        slot: &mut Option<Record>,
        role: Role,
        payment: &Payment,
    ) -> Result<(ActionResult, Option<CommandRequest>), EngineError> {
        let account_id = &role.actor(payment).address;
        let additional = self.wallet.additional_kyc_data(account_id)?;
        let request = self.update_record(
            slot,
            role,
            payment,
            PaymentChanges::new().additional_kyc_data(additional),
        )?;
        Ok((ActionResult::SentAdditionalKycData, Some(request)))
    }

    /// Accepting counterparty KYC: the receiver answers with its own KYC
    /// data and the recipient signature, the sender just goes ready.
    fn accept_counterparty_kyc(
        &self,
        slot: &mut Option<Record>,
        role: Role,
        payment: &Payment,
    ) -> Result<CommandRequest, EngineError> {
        let changes = match role {
            Role::Receiver => {
                let (sender_address, _) =
                    identifier::decode_account(&payment.sender.address, self.client.hrp())?;
                let (_, signing_message) = travel_rule::metadata(
                    &payment.reference_id,
                    sender_address,
                    payment.action.amount,
                );
                let signature = self.keychain.sign(&signing_message);
                let kyc_data = self.wallet.kyc_data(&payment.receiver.address)?;
                PaymentChanges::new()
                    .recipient_signature(hex::encode(signature.to_bytes()))
                    .kyc_data(kyc_data)
                    .status(Status::ReadyForSettlement)
            }
            Role::Sender => PaymentChanges::new().status(Status::ReadyForSettlement),
        };
        self.update_record(slot, role, payment, changes)
    }

    fn abort(
        &self,
        slot: &mut Option<Record>,
        role: Role,
        payment: &Payment,
        message: &str,
    ) -> Result<CommandRequest, EngineError> {
        self.update_record(
            slot,
            role,
            payment,
            PaymentChanges::new().abort(abort_code::REJECTED, message),
        )
    }

    /// The only mutation path: update the local actor, persist, and hand the
    /// new request back for sending.
    fn update_record(
        &self,
        slot: &mut Option<Record>,
        role: Role,
        payment: &Payment,
        changes: PaymentChanges,
    ) -> Result<CommandRequest, EngineError> {
        let updated = update_payment(role, payment, changes);
        let request = CommandRequest::for_payment(updated);
        self.save_record(slot, &request, role)?;
        Ok(request)
    }

    fn counterparty_kyc_data(&self, role: Role, payment: &Payment) -> Result<KycData, EngineError> {
        role.opposite()
            .actor(payment)
            .kyc_data
            .clone()
            .ok_or_else(|| {
                EngineError::OffChain(Error::invalid_field(
                    format!("{}.kyc_data", role.opposite()),
                    "missing counterparty kyc data",
                ))
            })
    }

    async fn submit_travel_rule_txn(&self, payment: &Payment) -> Result<(), EngineError> {
        let hrp = self.client.hrp();
        let (sender_address, _) = identifier::decode_account(&payment.sender.address, hrp)?;
        let (payee_address, _) = identifier::decode_account(&payment.receiver.address, hrp)?;
        let (metadata, _) =
            travel_rule::metadata(&payment.reference_id, sender_address, payment.action.amount);
        let signature_hex = payment.recipient_signature.as_ref().ok_or_else(|| {
            EngineError::OffChain(Error::invalid_field(
                "recipient_signature",
                "missing for settlement",
            ))
        })?;
        let metadata_signature = hex::decode(signature_hex).map_err(|_| {
            EngineError::OffChain(Error::invalid_field(
                "recipient_signature",
                "is not valid hex",
            ))
        })?;

        self.chain()
            .submit_travel_rule(TravelRuleTransfer {
                sender_address,
                payee_address,
                amount: payment.action.amount,
                currency: payment.action.currency.clone(),
                metadata,
                metadata_signature,
            })
            .await?;
        tracing::info!(reference_id = %payment.reference_id, "travel-rule transaction executed");
        Ok(())
    }

    // --------------------- send / retry --------------------------

    /// Sends a request to the peer; a failure queues a retry of the same
    /// `(request, role)` and reports [`SendOutcome::Failed`].
    async fn send_request(&self, request: CommandRequest, role: Role) -> SendOutcome {
        match self
            .client
            .send_request(role, &request, self.keychain.as_ref())
            .await
        {
            Ok(_) => SendOutcome::Success,
            Err(error) => {
                tracing::warn!(cid = %request.cid, %error, "send_request failed; queueing retry");
                self.enqueue(Task::RetrySend {
                    request: Box::new(request),
                    role,
                });
                SendOutcome::Failed
            }
        }
    }
}
