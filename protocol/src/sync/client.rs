//! Authenticated client for the coordinating service.
//!
//! [`RemoteClient`] owns the request key, the session cell and the fee
//! cache of one wallet instance. Low-level endpoint methods map one to
//! one onto the wire contract; the proposal round-trips on top of them
//! ([`RemoteClient::submit`], [`RemoteClient::sign`],
//! [`RemoteClient::broadcast`]) run every local check before anything is
//! sent.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::session::{Session, SessionCell};
use super::signing::sign_request;
use super::transport::{HttpRequest, HttpResponse, Method, Transport};
use super::wire::{
    AddressInfo, BroadcastRequest, CreateWalletRequest, CreateWalletResponse, ErrorBody, JoinWalletRequest,
    JoinWalletResponse, LoginResponse, Notification, Preferences, PublishRequest, PushSubscription, ReferralRequest,
    ReferralResponse, RejectRequest, SignaturesRequest, ValidateAddressResponse, WalletInfo,
};
use super::{map_error_code, SyncError};
use crate::address::Network;
use crate::codec::{Encodable, Referral, Transaction};
use crate::config::{ClientConfig, CLIENT_VERSION};
use crate::credentials::{Credentials, CredentialsError, RingEntry, WalletSecret};
use crate::crypto::encryption::{decrypt_message_lossy, encrypt_message};
use crate::crypto::keys::PrivateKey;
use crate::proposal::verify::server_compromised;
use crate::proposal::{
    create_draft, Accepted, ActionKind, Broadcast, Draft, FeeCache, FeeLevelQuote, FeePolicy, FeeRate, Pending,
    Proposal, ProposalError, ProposalRecord, ProposalRequest, Utxo,
};
use crate::vault::Vault;

pub const HEADER_IDENTITY: &str = "x-identity";
pub const HEADER_SIGNATURE: &str = "x-signature";
pub const HEADER_SESSION: &str = "x-session";
pub const HEADER_CLIENT_VERSION: &str = "x-client-version";

pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    identity: String,
    request_key: PrivateKey,
    session: SessionCell,
    fees: FeeCache,
    config: ClientConfig,
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, SyncError> {
    serde_json::to_value(value).map_err(|e| SyncError::InvalidResponse(format!("unserializable body: {}", e)))
}

/// Turn a non-auth response into data or a taxonomy error.
fn classify(response: HttpResponse) -> Result<HttpResponse, SyncError> {
    match response.status {
        200..=299 => Ok(response),
        500..=599 => Err(SyncError::ServerUnavailable(response.status)),
        400..=499 => match serde_json::from_value::<ErrorBody>(response.body.clone()) {
            Ok(err) => Err(map_error_code(&err.code, &err.message)),
            Err(_) => Err(SyncError::Http {
                status: response.status,
                message: response.body.to_string(),
            }),
        },
        status => Err(SyncError::Http {
            status,
            message: response.body.to_string(),
        }),
    }
}

impl RemoteClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: &Credentials,
        config: ClientConfig,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            transport,
            identity: credentials.copayer_id().to_string(),
            request_key: credentials.request_private_key()?,
            session: SessionCell::new(),
            fees: FeeCache::new(config.fee_cache_ttl()),
            config,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn fee_cache(&self) -> &FeeCache {
        &self.fees
    }

    // -- plumbing -----------------------------------------------------------

    fn build(&self, method: Method, url: &str, body: Option<Value>, session: Option<&Session>) -> HttpRequest {
        let mut request = HttpRequest::new(method, url, body);
        request.set_header(HEADER_CLIENT_VERSION, CLIENT_VERSION);
        request.set_header(HEADER_IDENTITY, self.identity.as_str());
        match session {
            Some(session) => request.set_header(HEADER_SESSION, session.token.as_str()),
            None => {
                let signature = sign_request(method.as_str(), url, request.body.as_ref(), &self.request_key);
                request.set_header(HEADER_SIGNATURE, signature.to_hex());
            }
        }
        request
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, SyncError> {
        tokio::time::timeout(self.config.request_timeout(), self.transport.send(request))
            .await
            .map_err(|_| SyncError::Timeout)?
    }

    async fn login(&self) -> Result<String, SyncError> {
        let request = self.build(Method::Post, "/v1/login/", Some(json!({})), None);
        let response = self.dispatch(request).await?;
        if response.status == 401 {
            return Err(SyncError::NotAuthorized("login rejected".into()));
        }
        Ok(classify(response)?.json::<LoginResponse>()?.session)
    }

    /// Send an authenticated request. An auth failure triggers one
    /// re-login and one retry, never more.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<T, SyncError> {
        let mut relogged = false;
        loop {
            let session = self.session.current();
            let request = self.build(method, url, body.clone(), session.as_ref());
            let response = self.dispatch(request).await?;
            if response.status != 401 {
                return classify(response)?.json();
            }
            if relogged {
                warn!(url, "request rejected after re-login");
                return Err(SyncError::NotAuthorized(format!("{} {}", method.as_str(), url)));
            }
            relogged = true;
            let stale = session
                .map(|s| s.generation)
                .unwrap_or_else(|| self.session.generation());
            self.session.invalidate(stale);
            self.session
                .refresh(stale, self.config.request_timeout(), || self.login())
                .await?;
            debug!(url, "retrying after re-login");
        }
    }

    // -- wallets ------------------------------------------------------------

    pub async fn create_wallet_raw(&self, request: &CreateWalletRequest) -> Result<CreateWalletResponse, SyncError> {
        self.request(Method::Post, "/v2/wallets/", Some(to_json(request)?)).await
    }

    pub async fn join_wallet_raw(&self, request: &JoinWalletRequest) -> Result<JoinWalletResponse, SyncError> {
        let url = format!("/v2/wallets/{}/copayers/", request.wallet_id);
        self.request(Method::Post, &url, Some(to_json(request)?)).await
    }

    pub async fn wallet_status(&self) -> Result<WalletInfo, SyncError> {
        self.request(Method::Get, "/v2/wallets/", None).await
    }

    /// Register a new shared wallet and join it as its first copayer.
    /// Returns the secret to hand to the other copayers.
    pub async fn create_wallet(
        &self,
        credentials: &mut Credentials,
        wallet_name: &str,
        copayer_name: &str,
        m: usize,
        n: usize,
    ) -> Result<WalletSecret, SyncError> {
        let wallet_key = PrivateKey::generate();
        credentials.add_wallet_private_key(&wallet_key);
        let shared = credentials
            .shared_encrypting_key()?
            .ok_or(ProposalError::NoEncryptingKey)?;
        let created = self
            .create_wallet_raw(&CreateWalletRequest {
                name: encrypt_message(&shared, wallet_name).map_err(ProposalError::from)?,
                m,
                n,
                pub_key: wallet_key.public_key(),
                network: credentials.network(),
                parent_address: None,
            })
            .await?;
        info!(wallet_id = %created.wallet_id, m, n, "wallet created");
        credentials.add_wallet_info(&created.wallet_id, wallet_name, m, n, Some(copayer_name.to_string()))?;
        let secret = credentials
            .wallet_secret()?
            .ok_or_else(|| SyncError::InvalidResponse("wallet id is not a valid secret id".into()))?;
        self.join_wallet(credentials, &secret, copayer_name).await?;
        Ok(secret)
    }

    /// Join with a secret, then install whatever ring the service knows.
    pub async fn join_wallet(
        &self,
        credentials: &mut Credentials,
        secret: &WalletSecret,
        copayer_name: &str,
    ) -> Result<WalletInfo, SyncError> {
        if secret.network != credentials.network() {
            return Err(CredentialsError::InvalidSecret("secret is for another network".into()).into());
        }
        credentials.add_wallet_private_key(&secret.wallet_priv_key);
        let shared = credentials
            .shared_encrypting_key()?
            .ok_or(ProposalError::NoEncryptingKey)?;
        let name = encrypt_message(&shared, copayer_name).map_err(ProposalError::from)?;
        let own = credentials.own_ring_entry()?;
        let proof = format!("{}|{}|{}", name, own.xpub_key, own.request_pub_key);
        let joined = self
            .join_wallet_raw(&JoinWalletRequest {
                wallet_id: secret.wallet_id.to_string(),
                name,
                xpub_key: own.xpub_key,
                request_pub_key: own.request_pub_key,
                tx_request_pub_key: own.tx_request_pub_key,
                copayer_signature: secret.wallet_priv_key.sign_message(proof.as_bytes()),
            })
            .await?;
        info!(wallet_id = %joined.wallet.id, copayer_id = %joined.copayer_id, "joined wallet");
        self.apply_wallet_info(credentials, &joined.wallet, Some(copayer_name))?;
        Ok(joined.wallet)
    }

    /// Refresh wallet membership, installing the ring once complete.
    pub async fn sync_wallet(&self, credentials: &mut Credentials) -> Result<WalletInfo, SyncError> {
        let info = self.wallet_status().await?;
        self.apply_wallet_info(credentials, &info, None)?;
        Ok(info)
    }

    fn apply_wallet_info(
        &self,
        credentials: &mut Credentials,
        info: &WalletInfo,
        copayer_name: Option<&str>,
    ) -> Result<(), SyncError> {
        let shared = credentials.shared_encrypting_key()?;
        let reveal = |text: &str| match &shared {
            Some(key) => decrypt_message_lossy(key, text),
            None => text.to_string(),
        };
        credentials.add_wallet_info(
            &info.id,
            &reveal(&info.name),
            info.m,
            info.n,
            copayer_name.map(str::to_string),
        )?;
        if info.n > 1 && info.copayers.len() == info.n {
            let ring = info
                .copayers
                .iter()
                .map(|c| RingEntry {
                    xpub_key: c.xpub_key.clone(),
                    request_pub_key: c.request_pub_key,
                    tx_request_pub_key: c.tx_request_pub_key,
                    copayer_name: c.name.as_deref().map(&reveal),
                })
                .collect();
            credentials.add_public_key_ring(ring)?;
            debug!(wallet_id = %info.id, "public key ring complete");
        }
        Ok(())
    }

    // -- referrals, addresses, utxos ----------------------------------------

    pub async fn broadcast_referral(&self, referral: &Referral) -> Result<ReferralResponse, SyncError> {
        let body = ReferralRequest {
            raw: referral.encode_hex(),
        };
        self.request(Method::Post, "/v1/referral/", Some(to_json(&body)?)).await
    }

    pub async fn create_address(&self) -> Result<AddressInfo, SyncError> {
        self.request(Method::Post, "/v3/addresses/", Some(json!({}))).await
    }

    pub async fn validate_address(&self, address: &str) -> Result<ValidateAddressResponse, SyncError> {
        self.request(Method::Get, &format!("/v1/addresses/{}/validate/", address), None)
            .await
    }

    pub async fn utxos(&self) -> Result<Vec<Utxo>, SyncError> {
        self.request(Method::Get, "/v1/utxos/", None).await
    }

    // -- fees ---------------------------------------------------------------

    pub async fn fee_levels(&self) -> Result<Vec<FeeLevelQuote>, SyncError> {
        let url = format!("/v2/feelevels/?network={}", self.config.network.as_str());
        self.request(Method::Get, &url, None).await
    }

    /// Concrete rate for `policy`, through the fee cache.
    pub async fn resolve_fee(&self, policy: FeePolicy) -> Result<FeeRate, SyncError> {
        self.fees
            .resolve(self.config.network, policy, || self.fee_levels())
            .await
    }

    // -- proposals: endpoints -----------------------------------------------

    pub async fn create_proposal(&self, record: &ProposalRecord) -> Result<ProposalRecord, SyncError> {
        self.request(Method::Post, "/v2/txproposals/", Some(to_json(record)?)).await
    }

    pub async fn publish_proposal(&self, id: &str, body: &PublishRequest) -> Result<ProposalRecord, SyncError> {
        let url = format!("/v1/txproposals/{}/publish/", id);
        self.request(Method::Post, &url, Some(to_json(body)?)).await
    }

    pub async fn sign_proposal(&self, id: &str, body: &SignaturesRequest) -> Result<ProposalRecord, SyncError> {
        let url = format!("/v1/txproposals/{}/signatures/", id);
        self.request(Method::Post, &url, Some(to_json(body)?)).await
    }

    pub async fn reject_proposal(&self, id: &str, body: &RejectRequest) -> Result<ProposalRecord, SyncError> {
        let url = format!("/v1/txproposals/{}/rejections/", id);
        self.request(Method::Post, &url, Some(to_json(body)?)).await
    }

    pub async fn broadcast_proposal(&self, id: &str, body: &BroadcastRequest) -> Result<ProposalRecord, SyncError> {
        let url = format!("/v1/txproposals/{}/broadcast/", id);
        self.request(Method::Post, &url, Some(to_json(body)?)).await
    }

    pub async fn remove_proposal(&self, id: &str) -> Result<(), SyncError> {
        let url = format!("/v1/txproposals/{}/", id);
        self.request::<Value>(Method::Delete, &url, None).await?;
        Ok(())
    }

    pub async fn proposal(&self, id: &str) -> Result<ProposalRecord, SyncError> {
        self.request(Method::Get, &format!("/v1/txproposals/{}/", id), None)
            .await
    }

    pub async fn pending_proposals(&self) -> Result<Vec<ProposalRecord>, SyncError> {
        self.request(Method::Get, "/v1/txproposals/", None).await
    }

    // -- proposals: round-trips ---------------------------------------------

    /// Resolve the fee, build the draft locally and submit it.
    pub async fn propose(&self, credentials: &Credentials, request: ProposalRequest) -> Result<Pending, SyncError> {
        let rate = self.resolve_fee(request.fee_policy).await?;
        let draft = create_draft(credentials, request, rate)?;
        self.submit(credentials, draft).await
    }

    /// Store a draft with the service and publish it.
    ///
    /// Both calls are keyed by the proposal id, so repeating them after a
    /// transient failure is safe.
    pub async fn submit(&self, credentials: &Credentials, draft: Draft) -> Result<Pending, SyncError> {
        let stored = self.create_proposal(&ProposalRecord::from(&draft)).await?;
        if let Some(raw) = stored.raw_bytes()? {
            if raw != draft.transaction().encode() {
                return Err(server_compromised(draft.id(), "service stored a different transaction").into());
            }
        }
        let pending = draft.publish(credentials)?;
        self.publish_proposal(
            pending.id(),
            &PublishRequest {
                proposal_signature: *pending.proposal_signature(),
            },
        )
        .await?;
        Ok(pending)
    }

    /// Verify and sign a proposal fetched from the service, returning
    /// its state after the service recorded the signatures.
    pub async fn sign(
        &self,
        credentials: &Credentials,
        record: ProposalRecord,
        password: Option<&str>,
    ) -> Result<Proposal, SyncError> {
        let server_tx = record
            .raw_bytes()?
            .ok_or_else(|| SyncError::InvalidResponse("proposal without transaction".into()))?;
        let pending = match Proposal::try_from(record)? {
            Proposal::Pending(p) => p,
            other => {
                return Err(ProposalError::InvalidRecord(format!("proposal {} is not pending", other.id())).into())
            }
        };
        let action = pending.sign(credentials, password, &server_tx)?;
        let ActionKind::Accept { signatures } = action.kind else {
            return Err(SyncError::InvalidResponse("sign produced a rejection".into()));
        };
        let updated = self
            .sign_proposal(pending.id(), &SignaturesRequest { signatures })
            .await?;
        Ok(Proposal::try_from(updated)?)
    }

    pub async fn reject(
        &self,
        credentials: &Credentials,
        pending: &Pending,
        reason: Option<String>,
    ) -> Result<Proposal, SyncError> {
        pending.reject(credentials, reason.clone())?;
        let updated = self.reject_proposal(pending.id(), &RejectRequest { reason }).await?;
        Ok(Proposal::try_from(updated)?)
    }

    /// Assemble the final transaction and hand it to the service.
    pub async fn broadcast(&self, credentials: &Credentials, accepted: Accepted) -> Result<Broadcast, SyncError> {
        let tx = accepted.assemble(credentials)?;
        let updated = self
            .broadcast_proposal(accepted.id(), &BroadcastRequest { raw: tx.encode_hex() })
            .await?;
        if let Some(txid) = updated.txid {
            if txid != tx.txid() {
                return Err(SyncError::InvalidResponse(format!(
                    "service reported txid {} for {}",
                    txid.to_hex(),
                    accepted.id()
                )));
            }
        }
        Ok(accepted.into_broadcast(&tx))
    }

    // -- notifications, preferences, vaults, push ---------------------------

    /// Notifications after `after`, or within the last `window_secs`
    /// seconds when there is no previous id.
    pub async fn notifications(&self, after: Option<&str>, window_secs: u64) -> Result<Vec<Notification>, SyncError> {
        let url = match after {
            Some(id) => format!("/v1/notifications/?notificationId={}", id),
            None => format!("/v1/notifications/?timeSpan={}", window_secs),
        };
        self.request(Method::Get, &url, None).await
    }

    pub async fn preferences(&self) -> Result<Preferences, SyncError> {
        self.request(Method::Get, "/v1/preferences/", None).await
    }

    pub async fn save_preferences(&self, preferences: &Preferences) -> Result<Preferences, SyncError> {
        self.request(Method::Put, "/v1/preferences/", Some(to_json(preferences)?))
            .await
    }

    pub async fn vaults(&self) -> Result<Vec<Vault>, SyncError> {
        self.request(Method::Get, "/v1/vaults/", None).await
    }

    pub async fn create_vault(&self, vault: &Vault) -> Result<Vault, SyncError> {
        self.request(Method::Post, "/v1/vaults/", Some(to_json(vault)?)).await
    }

    /// Register the successor vault together with the master-key sweep
    /// that moves the funds into it.
    pub async fn renew_vault(&self, next: &Vault, sweep: &Transaction) -> Result<Vault, SyncError> {
        let vault = to_json(next)?;
        let body = json!({ "vault": vault, "raw": sweep.encode_hex() });
        self.request(Method::Put, &format!("/v1/vaults/{}/", next.id), Some(body))
            .await
    }

    pub async fn subscribe_push(&self, subscription: &PushSubscription) -> Result<(), SyncError> {
        self.request::<Value>(
            Method::Post,
            "/v1/pushnotifications/subscriptions/",
            Some(to_json(subscription)?),
        )
        .await?;
        Ok(())
    }

    pub async fn unsubscribe_push(&self, token: &str) -> Result<(), SyncError> {
        let url = format!("/v1/pushnotifications/subscriptions/{}/", token);
        self.request::<Value>(Method::Delete, &url, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::signing::verify_request;
    use super::super::testing::{status, unauthorized, MockService};
    use super::*;
    use crate::proposal::fixtures::{pay, utxo, wallet};
    use crate::proposal::FeeLevel;
    use crate::crypto::keys::Signature;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> ClientConfig {
        ClientConfig {
            network: Network::Testnet,
            ..ClientConfig::default()
        }
    }

    fn client(creds: &Credentials, service: Arc<MockService>) -> RemoteClient {
        RemoteClient::new(service, creds, config()).unwrap()
    }

    #[tokio::test]
    async fn unsigned_requests_carry_a_valid_signature() {
        let w = wallet(2, 3);
        let service = MockService::new(|_| status(200, json!([])));
        let c = client(&w[0], service.clone());
        let _: Vec<Utxo> = c.utxos().await.unwrap();

        let seen = service.requests.lock()[0].clone();
        assert_eq!(seen.header(HEADER_IDENTITY), Some(w[0].copayer_id()));
        assert_eq!(seen.header(HEADER_CLIENT_VERSION), Some(CLIENT_VERSION));
        assert!(seen.header(HEADER_SESSION).is_none());
        let sig = Signature::from_hex(seen.header(HEADER_SIGNATURE).unwrap()).unwrap();
        let pk = w[0].request_public_key().unwrap();
        assert!(verify_request("GET", "/v1/utxos/", None, &sig, &pk));
    }

    #[tokio::test]
    async fn rejected_request_relogs_once_then_uses_session() {
        let w = wallet(2, 3);
        let service = MockService::new(|req| match req.url.as_str() {
            "/v1/login/" => status(200, json!({"session": "s-1"})),
            _ if req.header(HEADER_SESSION) == Some("s-1") => status(200, json!([])),
            _ => unauthorized(),
        });
        let c = client(&w[0], service.clone());
        let _: Vec<Utxo> = c.utxos().await.unwrap();
        let _: Vec<Utxo> = c.utxos().await.unwrap();
        assert_eq!(service.count("/v1/login/"), 1);
        assert_eq!(service.count("/v1/utxos/"), 3);
    }

    #[tokio::test]
    async fn second_rejection_surfaces_not_authorized() {
        let w = wallet(2, 3);
        let service = MockService::new(|req| match req.url.as_str() {
            "/v1/login/" => status(200, json!({"session": "s"})),
            _ => unauthorized(),
        });
        let c = client(&w[0], service.clone());
        let err = c.utxos().await.unwrap_err();
        assert!(matches!(err, SyncError::NotAuthorized(_)));
        assert_eq!(service.count("/v1/utxos/"), 2);
        assert_eq!(service.count("/v1/login/"), 1);
    }

    #[tokio::test]
    async fn status_classes_map_to_errors() {
        let w = wallet(2, 3);
        let service = MockService::new(|req| match req.url.as_str() {
            "/v1/utxos/" => status(503, Value::Null),
            "/v1/preferences/" => status(400, json!({"code": "WALLET_NOT_FOUND", "message": "gone"})),
            _ => status(404, json!("nope")),
        });
        let c = client(&w[0], service);
        assert_eq!(c.utxos().await.unwrap_err(), SyncError::ServerUnavailable(503));
        assert_eq!(c.preferences().await.unwrap_err(), SyncError::NotFound("gone".into()));
        assert!(matches!(
            c.vaults().await.unwrap_err(),
            SyncError::Http { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn fee_levels_are_cached() {
        let w = wallet(2, 3);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let service = MockService::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            status(200, json!([{"level": "normal", "feePerKb": 20000}]))
        });
        let c = client(&w[0], service);
        for _ in 0..3 {
            assert_eq!(
                c.resolve_fee(FeePolicy::Level(FeeLevel::Normal)).await.unwrap(),
                FeeRate::PerKb(20_000)
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            c.resolve_fee(FeePolicy::Level(FeeLevel::Economy)).await,
            Err(SyncError::Proposal(ProposalError::FeeUnavailable(_)))
        ));
    }

    #[tokio::test]
    async fn submit_rejects_a_swapped_transaction() {
        let w = wallet(2, 3);
        let request = ProposalRequest::new(vec![pay(&w[0], 40_000)], vec![utxo(&w[0], 0, 100_000, 1)]);
        let draft = create_draft(&w[0], request, FeeRate::Fixed(2_000)).unwrap();
        let service = MockService::new(|req| {
            let mut record: ProposalRecord = serde_json::from_value(req.body.clone().unwrap_or_default())
                .map_err(|e| SyncError::InvalidResponse(e.to_string()))?;
            record.raw = Some("0100000000000000000000".into());
            status(200, serde_json::to_value(record).unwrap_or_default())
        });
        let c = client(&w[0], service.clone());
        assert!(matches!(
            c.submit(&w[0], draft).await,
            Err(SyncError::Proposal(ProposalError::ServerCompromised(_)))
        ));
        assert_eq!(service.count("/v1/txproposals/"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_service_times_out() {
        let w = wallet(2, 3);
        struct Stalled;
        #[async_trait::async_trait]
        impl Transport for Stalled {
            async fn send(&self, _: HttpRequest) -> Result<HttpResponse, SyncError> {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(HttpResponse::ok(Value::Null))
            }
        }
        let c = RemoteClient::new(Arc::new(Stalled), &w[0], config()).unwrap();
        assert_eq!(c.utxos().await.unwrap_err(), SyncError::Timeout);
    }
}
