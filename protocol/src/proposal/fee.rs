//! Fee computation.
//!
//! Sizes are estimated from the exact redeem scripts being spent, with
//! signatures assumed at their maximum DER length. The fee is
//! `ceil(size * fee_per_kb / 1000)`.
//!
//! Named levels are quoted by the service and cached for a short TTL. A
//! missing or zero quote is never cached and never turned into a free
//! transaction: it surfaces as [`ProposalError::FeeUnavailable`], which
//! callers treat as retryable.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::types::{FeeLevel, FeeLevelQuote, FeePolicy};
use super::ProposalError;
use crate::address::{Address, Network};
use crate::codec::varint::varint_size;
use crate::config::{FEE_CACHE_TTL, MAX_AMOUNT, MAX_FEE_PER_KB, PUBLIC_KEY_LENGTH};
use crate::script::{Script, ScriptError, ScriptTemplate};

/// DER signature upper bound plus the sighash byte.
const MAX_SIG_PUSH: usize = 1 + 72 + 1;
const KEY_PUSH: usize = 1 + PUBLIC_KEY_LENGTH;

/// What a [`FeePolicy`] resolves to once level quotes are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeRate {
    Fixed(u64),
    PerKb(u64),
}

impl FeeRate {
    pub fn fee_for(&self, size: usize) -> u64 {
        match self {
            FeeRate::Fixed(fee) => *fee,
            FeeRate::PerKb(rate) => fee_for_size(size, *rate),
        }
    }

    pub fn per_kb(&self) -> u64 {
        match self {
            FeeRate::Fixed(_) => 0,
            FeeRate::PerKb(rate) => *rate,
        }
    }

    /// A fixed fee is positive and at most [`MAX_AMOUNT`]; a rate passes
    /// the same checks as a quoted one.
    pub fn validate(self) -> Result<Self, ProposalError> {
        match self {
            FeeRate::Fixed(0) => Err(ProposalError::ZeroFee),
            FeeRate::Fixed(fee) if fee > MAX_AMOUNT => Err(ProposalError::AmountTooLarge(fee)),
            FeeRate::Fixed(_) => Ok(self),
            FeeRate::PerKb(rate) => Ok(FeeRate::PerKb(check_rate(rate, "custom rate")?)),
        }
    }
}

pub fn fee_for_size(size: usize, fee_per_kb: u64) -> u64 {
    (size as u64).saturating_mul(fee_per_kb).div_ceil(1000)
}

fn push_size(len: usize) -> usize {
    let prefix = match len {
        0..=75 => 1,
        76..=0xff => 2,
        0x100..=0xffff => 3,
        _ => 5,
    };
    prefix + len
}

/// Encoded size of one fully signed input spending `template`.
pub fn estimate_input_size(template: &ScriptTemplate) -> Result<usize, ScriptError> {
    let script_sig = match template {
        ScriptTemplate::PubKeyHash { .. } => MAX_SIG_PUSH + KEY_PUSH,
        ScriptTemplate::MultisigP2SH { m, .. } => {
            let redeem = template.redeem_script()?.unwrap_or_default();
            1 + m * MAX_SIG_PUSH + push_size(redeem.len())
        }
        ScriptTemplate::VaultP2SH(_) => {
            let redeem = template.redeem_script()?.unwrap_or_default();
            MAX_SIG_PUSH + 1 + push_size(redeem.len())
        }
        ScriptTemplate::EasySendP2SH(_) => {
            let redeem = template.redeem_script()?.unwrap_or_default();
            MAX_SIG_PUSH + KEY_PUSH + push_size(redeem.len())
        }
    };
    Ok(36 + varint_size(script_sig as u64) + script_sig + 4)
}

/// Encoded size of a transaction spending `inputs` to `outputs`.
pub fn estimate_size(inputs: &[ScriptTemplate], outputs: &[Address]) -> Result<usize, ScriptError> {
    let mut size = 4 + varint_size(inputs.len() as u64) + varint_size(outputs.len() as u64) + 4;
    for template in inputs {
        size += estimate_input_size(template)?;
    }
    for address in outputs {
        let script_len = Script::for_address(address).len();
        size += 8 + varint_size(script_len as u64) + script_len;
    }
    Ok(size)
}

fn check_rate(rate: u64, level: &str) -> Result<u64, ProposalError> {
    match rate {
        0 => Err(ProposalError::FeeUnavailable(format!("no fee quoted for {}", level))),
        r if r > MAX_FEE_PER_KB => Err(ProposalError::FeeTooHigh(r)),
        r => Ok(r),
    }
}

// ---------------------------------------------------------------------------
// FeeCache
// ---------------------------------------------------------------------------

struct CachedQuote {
    fee_per_kb: u64,
    fetched_at: Instant,
}

/// Per-network cache of fee-level quotes.
pub struct FeeCache {
    ttl: Duration,
    entries: Mutex<HashMap<(Network, FeeLevel), CachedQuote>>,
}

impl Default for FeeCache {
    fn default() -> Self {
        Self::new(FEE_CACHE_TTL)
    }
}

impl FeeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A fresh cached rate, if any.
    pub fn get(&self, network: Network, level: FeeLevel) -> Option<u64> {
        let entries = self.entries.lock();
        entries
            .get(&(network, level))
            .filter(|q| q.fetched_at.elapsed() < self.ttl)
            .map(|q| q.fee_per_kb)
    }

    /// Store a fee table. Zero rates are dropped.
    pub fn store(&self, network: Network, quotes: &[FeeLevelQuote]) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        for quote in quotes.iter().filter(|q| q.fee_per_kb > 0) {
            entries.insert(
                (network, quote.level),
                CachedQuote {
                    fee_per_kb: quote.fee_per_kb,
                    fetched_at: now,
                },
            );
        }
    }

    pub fn invalidate(&self) {
        self.entries.lock().clear();
    }

    /// Rate for `level`, fetching the table through `fetch` when the
    /// cache has nothing fresh.
    pub async fn fee_per_kb<F, Fut, E>(&self, network: Network, level: FeeLevel, fetch: F) -> Result<u64, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<FeeLevelQuote>, E>>,
        E: From<ProposalError>,
    {
        if let Some(rate) = self.get(network, level) {
            return Ok(rate);
        }
        let quotes = fetch().await?;
        debug!(network = %network, quotes = quotes.len(), "fee levels fetched");
        self.store(network, &quotes);
        let rate = quotes
            .iter()
            .find(|q| q.level == level)
            .map(|q| q.fee_per_kb)
            .unwrap_or(0);
        Ok(check_rate(rate, &level.to_string())?)
    }

    /// Resolve a policy to a concrete rate.
    pub async fn resolve<F, Fut, E>(&self, network: Network, policy: FeePolicy, fetch: F) -> Result<FeeRate, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<FeeLevelQuote>, E>>,
        E: From<ProposalError>,
    {
        match policy {
            FeePolicy::Fixed(fee) => Ok(FeeRate::Fixed(fee).validate()?),
            FeePolicy::PerKb(rate) => Ok(FeeRate::PerKb(rate).validate()?),
            FeePolicy::Level(level) => Ok(FeeRate::PerKb(self.fee_per_kb(network, level, fetch).await?)),
        }
    }
}
