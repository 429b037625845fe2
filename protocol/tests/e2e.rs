//! End-to-end tests for the proposal round-trip.
//!
//! Three copayers share a 2-of-3 wallet and talk to an in-process stand-in
//! for the coordinating service. The stand-in keeps proposals in memory,
//! checks request signatures against the registered request keys, and
//! applies actions the way the real service does. Each test builds its own
//! service; nothing is shared between tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bip39::Mnemonic;
use parking_lot::Mutex;
use serde_json::{json, Value};

use merit_wallet_core::address::Network;
use merit_wallet_core::codec::{Decodable, Encodable, Hash256, Transaction};
use merit_wallet_core::config::ClientConfig;
use merit_wallet_core::credentials::{Credentials, DerivationStrategy, RingEntry};
use merit_wallet_core::crypto::{PrivateKey, PublicKey, Signature};
use merit_wallet_core::proposal::{
    ActionKind, OutputRequest, Proposal, ProposalError, ProposalRecord, ProposalRequest, ProposalStatus, Utxo,
};
use merit_wallet_core::sync::client::{HEADER_IDENTITY, HEADER_SESSION, HEADER_SIGNATURE};
use merit_wallet_core::sync::wire::{BroadcastRequest, PublishRequest, SignaturesRequest};
use merit_wallet_core::sync::{verify_request, HttpRequest, HttpResponse, Method, RemoteClient, SyncError, Transport};
use merit_wallet_core::WalletError;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const WALLET_ID: &str = "6c2a4d1e-8f0b-4b5e-9a57-3f1c2d9e7b10";

fn copayer(seed: u8) -> Credentials {
    let phrase = Mnemonic::from_entropy(&[seed; 16]).unwrap().to_string();
    Credentials::from_mnemonic(Network::Testnet, &phrase, "", 0, DerivationStrategy::Bip44).unwrap()
}

/// Three copayers with a complete 2-of-3 ring.
fn wallet() -> Vec<Credentials> {
    let mut all: Vec<Credentials> = (1..=3).map(copayer).collect();
    let ring: Vec<RingEntry> = all.iter().map(|c| c.own_ring_entry().unwrap()).collect();
    let wallet_key = PrivateKey::from_bytes(&[7u8; 32]).unwrap();
    for c in &mut all {
        c.add_wallet_info(WALLET_ID, "ops", 2, 3, None).unwrap();
        c.add_public_key_ring(ring.clone()).unwrap();
        c.add_wallet_private_key(&wallet_key);
    }
    all
}

fn funding(creds: &Credentials) -> Vec<Utxo> {
    (0..2u32)
        .map(|i| {
            let derived = creds.derive_address(false, i).unwrap();
            Utxo {
                txid: Hash256::digest(format!("funding-{}", i).as_bytes()),
                vout: i,
                satoshis: 150_000,
                address: derived.address,
                path: derived.path,
                confirmations: 6,
                locked: false,
            }
        })
        .collect()
}

fn payee() -> String {
    let key = PrivateKey::from_bytes(&[42u8; 32]).unwrap().public_key();
    merit_wallet_core::address::Address::from_public_key(Network::Testnet, &key).to_string()
}

/// How the stand-in service misbehaves, if at all.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Honest,
    /// Returns a transaction paying more to the first output than agreed.
    SwapsTransaction,
}

#[derive(Default)]
struct ServiceState {
    proposals: HashMap<String, ProposalRecord>,
    sessions: HashMap<String, String>,
    logins: usize,
}

struct FakeService {
    request_keys: HashMap<String, PublicKey>,
    utxos: Vec<Utxo>,
    behaviour: Behaviour,
    state: Mutex<ServiceState>,
}

fn reply(status: u16, body: Value) -> Result<HttpResponse, SyncError> {
    Ok(HttpResponse { status, body })
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap()
}

impl FakeService {
    fn new(copayers: &[Credentials], behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            request_keys: copayers
                .iter()
                .map(|c| (c.copayer_id().to_string(), c.request_public_key().unwrap()))
                .collect(),
            utxos: funding(&copayers[0]),
            behaviour,
            state: Mutex::new(ServiceState::default()),
        })
    }

    fn authenticate(&self, request: &HttpRequest) -> Option<String> {
        let identity = request.header(HEADER_IDENTITY)?.to_string();
        if let Some(token) = request.header(HEADER_SESSION) {
            let state = self.state.lock();
            return (state.sessions.get(token) == Some(&identity)).then_some(identity);
        }
        let signature = Signature::from_hex(request.header(HEADER_SIGNATURE)?).ok()?;
        let key = self.request_keys.get(&identity)?;
        verify_request(
            request.method.as_str(),
            &request.url,
            request.body.as_ref(),
            &signature,
            key,
        )
        .then_some(identity)
    }

    fn tamper(&self, record: &mut ProposalRecord) {
        if self.behaviour != Behaviour::SwapsTransaction {
            return;
        }
        if let Some(raw) = record.raw.as_deref() {
            let mut tx = Transaction::decode(&hex::decode(raw).unwrap()).unwrap();
            tx.outputs[0].value += 10_000;
            record.raw = Some(tx.encode_hex());
        }
    }

    fn route(&self, identity: &str, request: &HttpRequest) -> Result<HttpResponse, SyncError> {
        let body = request.body.clone().unwrap_or(Value::Null);
        let path = request.url.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let mut state = self.state.lock();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["v1", "login"]) => {
                state.logins += 1;
                let token = format!("session-{}", state.logins);
                state.sessions.insert(token.clone(), identity.to_string());
                reply(200, json!({ "session": token }))
            }
            (Method::Get, ["v2", "feelevels"]) => reply(
                200,
                json!([
                    {"level": "priority", "feePerKb": 40000},
                    {"level": "normal", "feePerKb": 20000},
                    {"level": "economy", "feePerKb": 10000}
                ]),
            ),
            (Method::Get, ["v1", "utxos"]) => reply(200, to_value(&self.utxos)),
            (Method::Post, ["v2", "txproposals"]) => {
                let record: ProposalRecord = serde_json::from_value(body).unwrap();
                let stored = state
                    .proposals
                    .entry(record.body.id.clone())
                    .or_insert(record)
                    .clone();
                reply(200, to_value(&stored))
            }
            (Method::Get, ["v1", "txproposals", id]) => match state.proposals.get(*id) {
                Some(record) => {
                    let mut record = record.clone();
                    self.tamper(&mut record);
                    reply(200, to_value(&record))
                }
                None => reply(404, json!({"code": "TX_NOT_FOUND", "message": "no such proposal"})),
            },
            (Method::Post, ["v1", "txproposals", id, action]) => {
                let Some(record) = state.proposals.get_mut(*id) else {
                    return reply(404, json!({"code": "TX_NOT_FOUND", "message": "no such proposal"}));
                };
                match *action {
                    "publish" => {
                        let publish: PublishRequest = serde_json::from_value(body).unwrap();
                        record.proposal_signature = Some(publish.proposal_signature);
                        record.status = ProposalStatus::Pending;
                    }
                    "signatures" => {
                        if record.actions.iter().any(|a| a.copayer_id == identity) {
                            return reply(400, json!({"code": "COPAYER_VOTED", "message": "already voted"}));
                        }
                        let signed: SignaturesRequest = serde_json::from_value(body).unwrap();
                        record.actions.push(merit_wallet_core::proposal::Action {
                            copayer_id: identity.to_string(),
                            kind: ActionKind::Accept {
                                signatures: signed.signatures,
                            },
                            created_on: 0,
                        });
                        let accepts = record.actions.iter().filter(|a| a.is_accept()).count();
                        if accepts >= record.body.required_signatures {
                            record.status = ProposalStatus::Accepted;
                        }
                    }
                    "broadcast" => {
                        let broadcast: BroadcastRequest = serde_json::from_value(body).unwrap();
                        let tx = Transaction::decode(&hex::decode(&broadcast.raw).unwrap()).unwrap();
                        record.txid = Some(tx.txid());
                        record.raw = Some(broadcast.raw);
                        record.status = ProposalStatus::Broadcasted;
                    }
                    _ => return reply(404, Value::Null),
                }
                reply(200, to_value(&*record))
            }
            _ => reply(404, Value::Null),
        }
    }
}

#[async_trait]
impl Transport for FakeService {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SyncError> {
        match self.authenticate(&request) {
            Some(identity) => self.route(&identity, &request),
            None => reply(401, json!({"code": "NOT_AUTHORIZED", "message": "bad credentials"})),
        }
    }
}

fn client(service: &Arc<FakeService>, creds: &Credentials) -> RemoteClient {
    let config = ClientConfig {
        network: Network::Testnet,
        ..ClientConfig::default()
    };
    RemoteClient::new(service.clone(), creds, config).unwrap()
}

async fn propose(service: &Arc<FakeService>, creator: &Credentials) -> String {
    let c = client(service, creator);
    let utxos = c.utxos().await.unwrap();
    let request = ProposalRequest::new(
        vec![OutputRequest {
            address: payee(),
            amount: 120_000,
            message: Some("rent".into()),
        }],
        utxos,
    );
    let pending = c.propose(creator, request).await.unwrap();
    pending.id().to_string()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_of_three_proposal_reaches_broadcast() {
    let copayers = wallet();
    let service = FakeService::new(&copayers, Behaviour::Honest);
    let id = propose(&service, &copayers[0]).await;

    // First signature: still pending.
    let alice = client(&service, &copayers[0]);
    let record = alice.proposal(&id).await.unwrap();
    let after_first = alice.sign(&copayers[0], record, None).await.unwrap();
    assert!(matches!(after_first, Proposal::Pending(ref p) if p.accept_count() == 1));

    // Second signature reaches the threshold.
    let bob = client(&service, &copayers[1]);
    let record = bob.proposal(&id).await.unwrap();
    let Proposal::Accepted(accepted) = bob.sign(&copayers[1], record, None).await.unwrap() else {
        panic!("proposal should be accepted after two signatures");
    };

    // The third copayer never signed but can still assemble and broadcast.
    let carol = client(&service, &copayers[2]);
    let broadcast = carol.broadcast(&copayers[2], accepted).await.unwrap();

    let stored = service.state.lock().proposals[&id].clone();
    assert_eq!(stored.status, ProposalStatus::Broadcasted);
    assert_eq!(stored.txid, Some(broadcast.txid()));

    let tx = Transaction::decode(broadcast.raw()).unwrap();
    assert!(!tx.inputs.is_empty());
    assert!(tx.inputs.iter().all(|i| !i.script_sig.is_empty()));
    assert_eq!(tx.outputs[0].value, 120_000);
}

#[tokio::test]
async fn tampered_transaction_is_refused_before_signing() {
    let copayers = wallet();
    let service = FakeService::new(&copayers, Behaviour::SwapsTransaction);
    let id = propose(&service, &copayers[0]).await;

    let bob = client(&service, &copayers[1]);
    let record = bob.proposal(&id).await.unwrap();
    let err = bob.sign(&copayers[1], record, None).await.unwrap_err();
    assert!(matches!(err, SyncError::Proposal(ProposalError::ServerCompromised(_))));
    assert!(matches!(WalletError::from(err), WalletError::ServerCompromised(_)));

    // Nothing reached the service.
    assert!(service.state.lock().proposals[&id].actions.is_empty());
}

#[tokio::test]
async fn signing_twice_is_refused_locally() {
    let copayers = wallet();
    let service = FakeService::new(&copayers, Behaviour::Honest);
    let id = propose(&service, &copayers[0]).await;

    let bob = client(&service, &copayers[1]);
    let record = bob.proposal(&id).await.unwrap();
    bob.sign(&copayers[1], record, None).await.unwrap();

    let record = bob.proposal(&id).await.unwrap();
    let err = bob.sign(&copayers[1], record, None).await.unwrap_err();
    assert!(matches!(err, SyncError::Proposal(ProposalError::AlreadyActed(_))));
}

#[tokio::test]
async fn unknown_copayer_is_not_authorized() {
    let copayers = wallet();
    let service = FakeService::new(&copayers[..2], Behaviour::Honest);
    let outsider = client(&service, &copayers[2]);
    let err = outsider.utxos().await.unwrap_err();
    assert!(matches!(err, SyncError::NotAuthorized(_)));
    assert!(WalletError::from(err).is_transient());
}

#[tokio::test]
async fn missing_proposal_maps_to_not_found() {
    let copayers = wallet();
    let service = FakeService::new(&copayers, Behaviour::Honest);
    let alice = client(&service, &copayers[0]);
    assert!(matches!(alice.proposal("nope").await, Err(SyncError::NotFound(_))));
}
