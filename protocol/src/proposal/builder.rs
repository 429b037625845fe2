//! Draft creation.
//!
//! Everything here runs before the service is contacted: address and
//! amount validation, message encryption, input selection, fee and
//! change. A draft that comes out of [`create_draft`] is internally
//! consistent: `inputs = outputs + change + fee`.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::fee::{estimate_size, FeeRate};
use super::types::{ChangeOutput, FeePolicy, ProposalBody, ProposalOutput, SpendSource, Utxo};
use super::verify::check_vault_outputs;
use super::{Draft, ProposalError};
use crate::address::Address;
use crate::config::{DUST_THRESHOLD, MAX_AMOUNT};
use crate::credentials::{Credentials, CredentialsError};
use crate::crypto::encryption::encrypt_message;
use crate::script::ScriptTemplate;

/// One requested payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRequest {
    pub address: String,
    pub amount: u64,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProposalRequest {
    /// Reusing an id makes re-creation idempotent on the service side.
    pub id: Option<String>,
    pub outputs: Vec<OutputRequest>,
    pub message: Option<String>,
    pub fee_policy: FeePolicy,
    /// Candidate inputs. With `use_all_inputs` every one is spent.
    pub utxos: Vec<Utxo>,
    pub use_all_inputs: bool,
    /// Index of the wallet change address to use.
    pub change_index: u32,
    pub source: SpendSource,
}

impl ProposalRequest {
    pub fn new(outputs: Vec<OutputRequest>, utxos: Vec<Utxo>) -> Self {
        Self {
            id: None,
            outputs,
            message: None,
            fee_policy: FeePolicy::default(),
            utxos,
            use_all_inputs: false,
            change_index: 0,
            source: SpendSource::Wallet,
        }
    }
}

/// Validate the outputs against the network and the amount domain.
pub fn validate_outputs(
    credentials: &Credentials,
    outputs: &[OutputRequest],
) -> Result<(Vec<(Address, u64)>, u64), ProposalError> {
    if outputs.is_empty() {
        return Err(ProposalError::NoOutputs);
    }
    let mut total: u64 = 0;
    let mut parsed = Vec::with_capacity(outputs.len());
    for output in outputs {
        let address = Address::parse_for(&output.address, credentials.network())?;
        if output.amount > MAX_AMOUNT {
            return Err(ProposalError::AmountTooLarge(output.amount));
        }
        if output.amount < DUST_THRESHOLD {
            return Err(ProposalError::DustOutput(output.amount));
        }
        total = total
            .checked_add(output.amount)
            .filter(|t| *t <= MAX_AMOUNT)
            .ok_or(ProposalError::AmountTooLarge(total.saturating_add(output.amount)))?;
        parsed.push((address, output.amount));
    }
    Ok((parsed, total))
}

fn seal(credentials: &Credentials, message: &Option<String>) -> Result<Option<String>, ProposalError> {
    let Some(text) = message else {
        return Ok(None);
    };
    let key = credentials
        .shared_encrypting_key()?
        .ok_or(ProposalError::NoEncryptingKey)?;
    Ok(Some(encrypt_message(&key, text)?))
}

fn template_for(
    credentials: &Credentials,
    source: &SpendSource,
    utxo: &Utxo,
) -> Result<ScriptTemplate, ProposalError> {
    Ok(match source {
        SpendSource::Wallet => credentials.derive_address_at(&utxo.path)?.template,
        SpendSource::Vault { params, .. } => ScriptTemplate::VaultP2SH(params.clone()),
    })
}

/// Build a draft from a request and a resolved fee rate.
pub fn create_draft(
    credentials: &Credentials,
    request: ProposalRequest,
    rate: FeeRate,
) -> Result<Draft, ProposalError> {
    let (parsed, amount) = validate_outputs(credentials, &request.outputs)?;
    if let SpendSource::Vault { params, .. } = &request.source {
        check_vault_outputs(params, parsed.iter().map(|(address, amount)| (address, *amount)))?;
    }
    let rate = rate.validate()?;
    let wallet_id = credentials
        .wallet_id()
        .ok_or(CredentialsError::Incomplete)?
        .to_string();
    if matches!(request.source, SpendSource::Wallet) && !credentials.is_complete() {
        return Err(CredentialsError::Incomplete.into());
    }

    let outputs = parsed
        .iter()
        .zip(&request.outputs)
        .map(|((address, amount), req)| {
            Ok(ProposalOutput {
                to_address: *address,
                amount: *amount,
                message: seal(credentials, &req.message)?,
            })
        })
        .collect::<Result<Vec<_>, ProposalError>>()?;

    let change_target = match &request.source {
        SpendSource::Wallet => {
            let derived = credentials.derive_address(true, request.change_index)?;
            (derived.address, Some(derived.path))
        }
        SpendSource::Vault { params, .. } => (
            ScriptTemplate::VaultP2SH(params.clone()).address(credentials.network())?,
            None,
        ),
    };

    let mut candidates: Vec<Utxo> = request.utxos.into_iter().filter(|u| !u.locked).collect();
    if !request.use_all_inputs {
        // Confirmed first, then largest first.
        candidates.sort_by(|a, b| {
            (b.confirmations > 0)
                .cmp(&(a.confirmations > 0))
                .then(b.satoshis.cmp(&a.satoshis))
        });
    }
    let available = candidates.iter().fold(0u64, |sum, u| sum.saturating_add(u.satoshis));

    let mut destinations: Vec<Address> = parsed.iter().map(|(a, _)| *a).collect();
    destinations.push(change_target.0);

    let mut selected = Vec::new();
    let mut templates = Vec::new();
    let mut total: u64 = 0;
    let mut fee = 0;
    for utxo in candidates {
        templates.push(template_for(credentials, &request.source, &utxo)?);
        total = total.saturating_add(utxo.satoshis);
        selected.push(utxo);
        fee = rate.fee_for(estimate_size(&templates, &destinations)?);
        if !request.use_all_inputs && total >= amount.saturating_add(fee) {
            break;
        }
    }
    let needed = amount.saturating_add(fee);
    if selected.is_empty() || total < needed {
        return Err(ProposalError::InsufficientFunds {
            needed: needed.max(amount),
            available,
        });
    }

    let leftover = total - needed;
    let change = if leftover < DUST_THRESHOLD {
        fee += leftover;
        None
    } else {
        Some(ChangeOutput {
            address: change_target.0,
            amount: leftover,
            path: change_target.1,
        })
    };

    let required_signatures = templates
        .first()
        .map(ScriptTemplate::required_signatures)
        .unwrap_or(1);
    let copayers = credentials.n().unwrap_or(1);
    let body = ProposalBody {
        id: request.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        wallet_id,
        creator_id: credentials.copayer_id().to_string(),
        network: credentials.network(),
        outputs,
        inputs: selected,
        change,
        fee,
        fee_policy: request.fee_policy,
        fee_per_kb: rate.per_kb(),
        message: seal(credentials, &request.message)?,
        required_signatures,
        required_rejections: copayers.saturating_sub(required_signatures) + 1,
        source: request.source,
        created_on: Utc::now().timestamp(),
    };
    debug!(
        txp_id = %body.id,
        inputs = body.inputs.len(),
        amount,
        fee = body.fee,
        "draft proposal created"
    );
    Ok(Draft::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::fixtures::{pay, utxo, wallet};
    use crate::address::Network;
    use crate::credentials::DerivationStrategy;
    use crate::crypto::encryption::decrypt_message;
    use crate::crypto::keys::PrivateKey;
    use bip39::Mnemonic;

    #[test]
    fn balanced_draft_with_change() {
        let w = wallet(2, 3);
        let c = &w[0];
        let request = ProposalRequest::new(vec![pay(c, 500_000)], vec![utxo(c, 0, 1_000_000, 3)]);
        let draft = create_draft(c, request, FeeRate::PerKb(10_000)).unwrap();
        let body = draft.body();
        let change = body.change.as_ref().unwrap();
        assert_eq!(body.input_total().unwrap(), body.amount().unwrap() + body.fee + change.amount);
        assert!(body.fee > 0);
        assert_eq!(body.required_signatures, 2);
        assert_eq!(body.required_rejections, 2);
        assert_eq!(change.address, c.derive_address(true, 0).unwrap().address);
    }

    #[test]
    fn prefers_confirmed_then_largest() {
        let w = wallet(2, 3);
        let c = &w[0];
        let utxos = vec![
            utxo(c, 0, 300_000, 1),
            utxo(c, 1, 5_000_000, 0),
            utxo(c, 2, 900_000, 2),
        ];
        let draft = create_draft(c, ProposalRequest::new(vec![pay(c, 500_000)], utxos), FeeRate::PerKb(1_000)).unwrap();
        assert_eq!(draft.body().inputs.len(), 1);
        assert_eq!(draft.body().inputs[0].satoshis, 900_000);
    }

    #[test]
    fn insufficient_funds() {
        let w = wallet(2, 3);
        let c = &w[0];
        let request = ProposalRequest::new(vec![pay(c, 500_000)], vec![utxo(c, 0, 400_000, 1)]);
        assert_eq!(
            create_draft(c, request, FeeRate::Fixed(1_000)).unwrap_err(),
            ProposalError::InsufficientFunds {
                needed: 501_000,
                available: 400_000
            }
        );
        let mut locked = utxo(c, 1, 10_000_000, 1);
        locked.locked = true;
        let request = ProposalRequest::new(vec![pay(c, 500_000)], vec![locked]);
        assert!(matches!(
            create_draft(c, request, FeeRate::Fixed(1_000)),
            Err(ProposalError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn dust_change_folds_into_fee() {
        let w = wallet(2, 3);
        let c = &w[0];
        let request = ProposalRequest::new(vec![pay(c, 500_000)], vec![utxo(c, 0, 501_200, 1)]);
        let draft = create_draft(c, request, FeeRate::Fixed(1_000)).unwrap();
        assert!(draft.body().change.is_none());
        assert_eq!(draft.body().fee, 1_200);
    }

    #[test]
    fn amount_domain_checked_before_anything_else() {
        let w = wallet(2, 3);
        let c = &w[0];
        let request = ProposalRequest::new(vec![pay(c, MAX_AMOUNT + 1)], vec![]);
        assert_eq!(
            create_draft(c, request, FeeRate::Fixed(0)).unwrap_err(),
            ProposalError::AmountTooLarge(MAX_AMOUNT + 1)
        );
        let request = ProposalRequest::new(vec![pay(c, MAX_AMOUNT), pay(c, MAX_AMOUNT)], vec![]);
        assert!(matches!(
            create_draft(c, request, FeeRate::Fixed(0)),
            Err(ProposalError::AmountTooLarge(_))
        ));
        let request = ProposalRequest::new(vec![pay(c, 100)], vec![]);
        assert_eq!(
            create_draft(c, request, FeeRate::Fixed(0)).unwrap_err(),
            ProposalError::DustOutput(100)
        );
    }

    #[test]
    fn fixed_fee_must_be_positive_and_bounded() {
        let w = wallet(2, 3);
        let c = &w[0];
        let request = || ProposalRequest::new(vec![pay(c, 10_000)], vec![utxo(c, 0, 1_000_000, 1)]);
        assert_eq!(
            create_draft(c, request(), FeeRate::Fixed(0)).unwrap_err(),
            ProposalError::ZeroFee
        );
        assert_eq!(
            create_draft(c, request(), FeeRate::Fixed(u64::MAX)).unwrap_err(),
            ProposalError::AmountTooLarge(u64::MAX)
        );
    }

    #[test]
    fn vault_source_enforces_limit_and_whitelist() {
        use crate::script::VaultParams;

        let w = wallet(1, 1);
        let c = &w[0];
        let allowed: Address = pay(c, 1).address.parse().unwrap();
        let other = pay(c, 1);
        let spend = PrivateKey::generate().public_key();
        let params = VaultParams {
            master_pub_key: PrivateKey::generate().public_key(),
            spend_pub_key: spend,
            spend_limit: 50_000,
            whitelist: vec![allowed.hash],
        };
        let vault_address = ScriptTemplate::VaultP2SH(params.clone()).address(c.network()).unwrap();
        let coin = Utxo {
            address: vault_address,
            ..utxo(c, 0, 1_000_000, 3)
        };
        let request = |to: String, amount: u64| {
            let mut r = ProposalRequest::new(
                vec![OutputRequest {
                    address: to,
                    amount,
                    message: None,
                }],
                vec![coin.clone()],
            );
            r.source = SpendSource::Vault {
                vault_id: "v".into(),
                params: params.clone(),
                signer_path: "m/0/0".parse().unwrap(),
            };
            r
        };

        assert_eq!(
            create_draft(c, request(allowed.to_string(), 50_001), FeeRate::Fixed(1_000)).unwrap_err(),
            ProposalError::SpendLimitExceeded {
                amount: 50_001,
                limit: 50_000
            }
        );
        assert!(matches!(
            create_draft(c, request(other.address, 10_000), FeeRate::Fixed(1_000)),
            Err(ProposalError::NotWhitelisted(_))
        ));
        let draft = create_draft(c, request(allowed.to_string(), 50_000), FeeRate::Fixed(1_000)).unwrap();
        assert_eq!(draft.body().amount().unwrap(), 50_000);
    }

    #[test]
    fn wrong_network_address_rejected() {
        let w = wallet(2, 3);
        let c = &w[0];
        let livenet = Address::from_public_key(Network::Livenet, &PrivateKey::generate().public_key());
        let request = ProposalRequest::new(
            vec![OutputRequest {
                address: livenet.to_string(),
                amount: 10_000,
                message: None,
            }],
            vec![utxo(c, 0, 1_000_000, 1)],
        );
        assert!(matches!(
            create_draft(c, request, FeeRate::Fixed(1_000)),
            Err(ProposalError::InvalidAddress(_))
        ));
    }

    #[test]
    fn messages_encrypted_with_shared_key() {
        let w = wallet(2, 3);
        let c = &w[0];
        let mut out = pay(c, 20_000);
        out.message = Some("rent".into());
        let mut request = ProposalRequest::new(vec![out], vec![utxo(c, 0, 1_000_000, 1)]);
        request.message = Some("march".into());
        let draft = create_draft(c, request, FeeRate::Fixed(1_000)).unwrap();
        let key = w[1].shared_encrypting_key().unwrap().unwrap();
        let sealed = draft.body().outputs[0].message.as_deref().unwrap();
        assert_ne!(sealed, "rent");
        assert_eq!(decrypt_message(&key, sealed).unwrap(), "rent");
        assert_eq!(decrypt_message(&key, draft.body().message.as_deref().unwrap()).unwrap(), "march");
    }

    #[test]
    fn incomplete_wallet_cannot_draft() {
        let phrase = Mnemonic::from_entropy(&[42u8; 16]).unwrap().to_string();
        let mut c = Credentials::from_mnemonic(Network::Testnet, &phrase, "", 0, DerivationStrategy::Bip44).unwrap();
        c.add_wallet_info("w", "w", 2, 3, None).unwrap();
        let request = ProposalRequest::new(vec![pay(&c, 10_000)], vec![]);
        assert_eq!(
            create_draft(&c, request, FeeRate::Fixed(1_000)).unwrap_err(),
            ProposalError::Credentials(CredentialsError::Incomplete)
        );
    }
}
