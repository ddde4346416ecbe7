//! Two-VASP test harness: an in-memory chain shared by both sides, a
//! scripted wallet, a swappable compliance key, and a real axum server per
//! VASP on a loopback port.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use tokio::net::TcpListener;
use url::Url;

use offchain_client::identifier::{self, HRP_TESTNET};
use offchain_client::{
    AccountAddress, AccountInfo, ChainClient, Keychain, OffChainClient, RpcError, Subaddress,
    TravelRuleTransfer,
};
use offchain_rs::engine::{PaymentEngine, TaskOutcome};
use offchain_rs::server;
use offchain_rs::wallet::{KycEvaluation, KycReview, Wallet, WalletError};
use offchain_types::{KycData, Status};

pub const AMOUNT: u64 = 1_000_000_000;
pub const CURRENCY: &str = "XUS";
pub const STARTING_BALANCE: u64 = 10_000_000_000;

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

// --------------------- mock chain --------------------------

#[derive(Clone)]
struct OnChainAccount {
    parent_vasp_address: Option<AccountAddress>,
    base_url: Option<Url>,
    compliance_key: Option<VerifyingKey>,
    balance: u64,
}

/// In-memory stand-in for the on-chain RPC collaborator, shared by both
/// VASPs in a test.
pub struct MockChain {
    accounts: Mutex<HashMap<AccountAddress, OnChainAccount>>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(MockChain {
            accounts: Mutex::new(HashMap::new()),
        })
    }

    pub fn register_parent_vasp(
        &self,
        address: AccountAddress,
        base_url: Url,
        compliance_key: VerifyingKey,
    ) {
        self.accounts.lock().unwrap().insert(
            address,
            OnChainAccount {
                parent_vasp_address: None,
                base_url: Some(base_url),
                compliance_key: Some(compliance_key),
                balance: 0,
            },
        );
    }

    pub fn register_child_vasp(
        &self,
        address: AccountAddress,
        parent: AccountAddress,
        balance: u64,
    ) {
        self.accounts.lock().unwrap().insert(
            address,
            OnChainAccount {
                parent_vasp_address: Some(parent),
                base_url: None,
                compliance_key: None,
                balance,
            },
        );
    }

    /// Repoints a parent VASP's off-chain endpoint, used to simulate a peer
    /// that fails and later recovers.
    pub fn set_base_url(&self, address: AccountAddress, base_url: Url) {
        if let Some(account) = self.accounts.lock().unwrap().get_mut(&address) {
            account.base_url = Some(base_url);
        }
    }

    pub fn balance(&self, address: AccountAddress) -> u64 {
        self.accounts
            .lock()
            .unwrap()
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn account_info(&self, address: AccountAddress) -> Result<AccountInfo, RpcError> {
        let accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get(&address)
            .ok_or(RpcError::AccountNotFound(address))?;
        Ok(AccountInfo {
            parent_vasp_address: account.parent_vasp_address,
        })
    }

    async fn base_url_and_compliance_key(
        &self,
        address: AccountAddress,
    ) -> Result<(Url, VerifyingKey), RpcError> {
        let accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get(&address)
            .ok_or(RpcError::AccountNotFound(address))?;
        // Child accounts resolve through their parent VASP record.
        let record = match account.parent_vasp_address {
            Some(parent) => accounts
                .get(&parent)
                .ok_or(RpcError::AccountNotFound(parent))?,
            None => account,
        };
        match (&record.base_url, &record.compliance_key) {
            (Some(base_url), Some(key)) => Ok((base_url.clone(), *key)),
            _ => Err(RpcError::NoOffChainEndpoint(address)),
        }
    }

    async fn submit_travel_rule(&self, transfer: TravelRuleTransfer) -> Result<(), RpcError> {
        let mut accounts = self.accounts.lock().unwrap();
        let sender = accounts
            .get_mut(&transfer.sender_address)
            .ok_or(RpcError::AccountNotFound(transfer.sender_address))?;
        if sender.balance < transfer.amount {
            return Err(RpcError::TransactionRejected("insufficient funds".into()));
        }
        sender.balance -= transfer.amount;
        let payee = accounts
            .get_mut(&transfer.payee_address)
            .ok_or(RpcError::AccountNotFound(transfer.payee_address))?;
        payee.balance += transfer.amount;
        Ok(())
    }
}

// --------------------- swappable keychain --------------------------

/// Compliance keychain whose signing key can be swapped mid-test while the
/// on-chain registration keeps advertising the original public key.
pub struct TestKeychain {
    key: RwLock<SigningKey>,
}

impl TestKeychain {
    pub fn new() -> Self {
        let mut rng = rand::rngs::OsRng;
        TestKeychain {
            key: RwLock::new(SigningKey::generate(&mut rng)),
        }
    }

    /// Swaps in a freshly generated (wrong) key, returning the old one.
    pub fn swap_for_wrong_key(&self) -> SigningKey {
        let mut rng = rand::rngs::OsRng;
        std::mem::replace(&mut self.key.write().unwrap(), SigningKey::generate(&mut rng))
    }

    pub fn restore(&self, key: SigningKey) {
        *self.key.write().unwrap() = key;
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.key.read().unwrap().verifying_key()
    }
}

impl Keychain for TestKeychain {
    fn sign(&self, message: &[u8]) -> Signature {
        self.key.read().unwrap().sign(message)
    }

    fn verifying_key(&self) -> VerifyingKey {
        self.key.read().unwrap().verifying_key()
    }
}

// --------------------- scripted wallet --------------------------

/// Wallet with scripted screening outcomes, keyed by the counterparty
/// user's given name. Unscripted names pass.
pub struct TestWallet {
    hrp: String,
    child_vasp: AccountAddress,
    users: Mutex<HashMap<String, Vec<Subaddress>>>,
    evaluations: Mutex<HashMap<String, KycEvaluation>>,
    reviews: Mutex<HashMap<String, KycReview>>,
}

impl TestWallet {
    pub fn new(hrp: &str, child_vasp: AccountAddress) -> Self {
        TestWallet {
            hrp: hrp.to_string(),
            child_vasp,
            users: Mutex::new(HashMap::new()),
            evaluations: Mutex::new(HashMap::new()),
            reviews: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_user(&self, name: &str) {
        self.users.lock().unwrap().insert(name.to_string(), Vec::new());
    }

    pub fn script_evaluation(&self, counterparty_name: &str, outcome: KycEvaluation) {
        self.evaluations
            .lock()
            .unwrap()
            .insert(counterparty_name.to_string(), outcome);
    }

    pub fn script_review(&self, counterparty_name: &str, outcome: KycReview) {
        self.reviews
            .lock()
            .unwrap()
            .insert(counterparty_name.to_string(), outcome);
    }

    /// A receiver-side intent id for `user` to be paid `amount`.
    pub fn gen_intent_id(&self, user: &str, amount: u64) -> String {
        let account_id = self.new_account_id(user).expect("unknown user");
        identifier::encode_intent(&account_id, CURRENCY, amount)
    }

    fn new_account_id(&self, user: &str) -> Result<String, WalletError> {
        let subaddress = identifier::gen_subaddress();
        let mut users = self.users.lock().unwrap();
        let subaddresses = users
            .get_mut(user)
            .ok_or_else(|| WalletError::new(format!("unknown user {user}")))?;
        subaddresses.push(subaddress);
        identifier::encode_account(self.child_vasp, Some(&subaddress), &self.hrp)
            .map_err(|e| WalletError::new(e.to_string()))
    }

    fn user_by_account_id(&self, account_id: &str) -> Result<String, WalletError> {
        let (_, subaddress) = identifier::decode_account(account_id, &self.hrp)
            .map_err(|e| WalletError::new(e.to_string()))?;
        let subaddress =
            subaddress.ok_or_else(|| WalletError::new("account id has no subaddress"))?;
        let users = self.users.lock().unwrap();
        users
            .iter()
            .find(|(_, subaddresses)| subaddresses.contains(&subaddress))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| WalletError::new(format!("no user for subaddress {subaddress:?}")))
    }

    fn kyc_for(name: &str) -> KycData {
        KycData::individual()
            .with_given_name(name)
            .with_surname(format!("surname-{name}"))
    }
}

#[async_trait]
impl Wallet for TestWallet {
    fn payment_account_id(&self, user_id: &str) -> Result<String, WalletError> {
        self.new_account_id(user_id)
    }

    fn kyc_data(&self, account_id: &str) -> Result<KycData, WalletError> {
        let name = self.user_by_account_id(account_id)?;
        Ok(Self::kyc_for(&name))
    }

    fn additional_kyc_data(&self, account_id: &str) -> Result<String, WalletError> {
        let name = self.user_by_account_id(account_id)?;
        Ok(format!("{name}'s secret"))
    }

    async fn evaluate_kyc_data(
        &self,
        counterparty: &KycData,
    ) -> Result<KycEvaluation, WalletError> {
        let name = counterparty.given_name.clone().unwrap_or_default();
        Ok(self
            .evaluations
            .lock()
            .unwrap()
            .get(&name)
            .copied()
            .unwrap_or(KycEvaluation::Accept))
    }

    async fn review_kyc_data(&self, counterparty: &KycData) -> Result<KycReview, WalletError> {
        let name = counterparty.given_name.clone().unwrap_or_default();
        Ok(self
            .reviews
            .lock()
            .unwrap()
            .get(&name)
            .copied()
            .unwrap_or(KycReview::Accept))
    }
}

// --------------------- one VASP under test --------------------------

pub struct Vasp {
    pub engine: Arc<PaymentEngine>,
    pub wallet: Arc<TestWallet>,
    pub keychain: Arc<TestKeychain>,
    pub chain: Arc<MockChain>,
    pub parent_address: AccountAddress,
    pub child_address: AccountAddress,
    pub base_url: Url,
}

impl Vasp {
    pub async fn run_once(&self) -> Option<TaskOutcome> {
        self.engine
            .run_once_background()
            .await
            .expect("background task failed")
    }

    /// Sum of the VASP's on-chain balances (parent plus child account).
    pub fn vasp_balance(&self) -> u64 {
        self.chain.balance(self.parent_address) + self.chain.balance(self.child_address)
    }

    pub async fn payment_status(&self, reference_id: &str, side: offchain_types::Role) -> Status {
        let record = self
            .engine
            .record(reference_id)
            .await
            .expect("no record for reference id");
        let payment = record.payment().expect("stored command unreadable");
        side.actor(&payment).status.status
    }
}

/// Boots a VASP: fresh accounts on the shared chain, a live axum server on a
/// loopback port, and an engine wired to both.
pub async fn spawn_vasp(chain: &Arc<MockChain>) -> Vasp {
    let parent_address = AccountAddress::new(rand::random());
    let child_address = AccountAddress::new(rand::random());
    let keychain = Arc::new(TestKeychain::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base_url = Url::parse(&format!("http://{}", listener.local_addr().expect("addr")))
        .expect("base url");

    chain.register_parent_vasp(parent_address, base_url.clone(), keychain.public_key());
    chain.register_child_vasp(child_address, parent_address, STARTING_BALANCE);

    let wallet = Arc::new(TestWallet::new(HRP_TESTNET, child_address));
    let client = OffChainClient::new(
        parent_address,
        HRP_TESTNET,
        Arc::clone(chain) as Arc<dyn ChainClient>,
    )
    .expect("client");
    let engine = Arc::new(PaymentEngine::new(
        client,
        Arc::clone(&keychain) as Arc<dyn Keychain>,
        Arc::clone(&wallet) as Arc<dyn Wallet>,
    ));

    let routes = server::routes(Arc::clone(&engine));
    tokio::spawn(async move {
        let _ = axum::serve(listener, routes).await;
    });

    Vasp {
        engine,
        wallet,
        keychain,
        chain: Arc::clone(chain),
        parent_address,
        child_address,
        base_url,
    }
}

/// The standard two-VASP environment of the exchange scenarios.
pub async fn spawn_pair() -> (Vasp, Vasp) {
    init_tracing();
    let chain = MockChain::new();
    let sender = spawn_vasp(&chain).await;
    let receiver = spawn_vasp(&chain).await;
    sender.wallet.add_user("foo");
    receiver.wallet.add_user("bar");
    (sender, receiver)
}

/// Spawns an HTTP server whose `/v1/command` always answers 500, simulating
/// a peer that cannot persist.
pub async fn spawn_failing_peer() -> Url {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = Url::parse(&format!("http://{}", listener.local_addr().expect("addr")))
        .expect("base url");
    let app = Router::new().route(
        "/v1/command",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    url
}

/// Asserts both sides converged on identical records with the expected
/// final statuses, the expected balance movement, and drained queues.
pub async fn assert_final_status(
    sender: &Vasp,
    receiver: &Vasp,
    expected_sender_status: Status,
    expected_receiver_status: Status,
    balance_change: u64,
) {
    let sender_records = sender.engine.records().await;
    let receiver_records = receiver.engine.records().await;
    assert_eq!(sender_records.len(), 1);
    assert_eq!(receiver_records.len(), 1);

    let sender_record = &sender_records[0];
    let receiver_record = &receiver_records[0];
    assert_eq!(sender_record.reference_id, receiver_record.reference_id);
    assert_eq!(sender_record.cid, receiver_record.cid);
    assert_eq!(sender_record.cmd_json, receiver_record.cmd_json);

    let payment = sender_record.payment().expect("stored command unreadable");
    assert_eq!(payment.sender.status.status, expected_sender_status);
    assert_eq!(payment.receiver.status.status, expected_receiver_status);

    assert_eq!(sender.vasp_balance(), STARTING_BALANCE - balance_change);
    assert_eq!(receiver.vasp_balance(), STARTING_BALANCE + balance_change);

    // Nothing left to do on either side.
    assert_eq!(sender.run_once().await, None);
    assert_eq!(receiver.run_once().await, None);
}
